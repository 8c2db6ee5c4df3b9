//! Scalar thresholding
//!
//! Binarizes a volume against a scalar: voxels below the threshold become
//! zero, all others the maximum of the output element type. Input and output
//! types are drawn independently from the fused element set.

use std::marker::PhantomData;

use voxseg_core::{
    check_compatible, ElementType, Error, Filter, Result, Volume, VolumeDescriptor, VolumeElement,
};

use crate::maybe_rayon::*;

/// Parameters for thresholding
#[derive(Debug, Clone, Default)]
pub struct ThresholdParams {
    /// Threshold value, cast into the input element type before comparing
    pub value: f64,
}

/// Threshold filter
#[derive(Debug, Clone, Default)]
pub struct Threshold<In, Out = In>(PhantomData<(In, Out)>);

impl<In: VolumeElement, Out: VolumeElement> Filter for Threshold<In, Out> {
    type Input = (Volume<In>, Volume<Out>);
    type Output = Volume<Out>;
    type Params = ThresholdParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Threshold"
    }

    fn description(&self) -> &'static str {
        "Binarize a volume against a scalar threshold"
    }

    fn execute(&self, (image, mut output): Self::Input, params: Self::Params) -> Result<Volume<Out>> {
        threshold(&image, &mut output, params.value)?;
        Ok(output)
    }
}

/// Threshold `image` against `value` into `output`.
///
/// For every voxel: `output[i] = 0` if `image[i] < value`, else the maximum
/// of the output type. The comparison is native in the input type; `value`
/// is clamped into its range first.
///
/// # Arguments
/// * `image` - Input volume
/// * `output` - Output volume of identical shape
/// * `value` - Threshold value
pub fn threshold<In, Out>(image: &Volume<In>, output: &mut Volume<Out>, value: f64) -> Result<()>
where
    In: VolumeElement,
    Out: VolumeElement,
{
    check_compatible(image.shape(), output.shape())?;

    let v = In::from_f64_clamped(value);
    let hi = Out::max_value();
    let plane = image.shape().plane_len().max(1);

    tracing::debug!(shape = %image.shape(), value, "threshold");

    output
        .as_mut_slice()?
        .par_chunks_mut(plane)
        .zip(image.as_slice().par_chunks(plane))
        .for_each(|(out_plane, in_plane)| {
            for (out, &px) in out_plane.iter_mut().zip(in_plane) {
                *out = if px < v { Out::zero() } else { hi };
            }
        });

    Ok(())
}

/// Threshold at the descriptor boundary, dispatching over the fused
/// input x output element-type matrix.
pub fn threshold_descriptors(
    image: &VolumeDescriptor,
    output: &VolumeDescriptor,
    value: f64,
) -> Result<()> {
    macro_rules! run {
        ($in:ty, $out:ty) => {{
            let image = Volume::<$in>::open(image)?;
            let mut output = Volume::<$out>::open_mut(output)?;
            threshold(&image, &mut output, value)
        }};
    }

    macro_rules! with_input {
        ($in:ty) => {
            match output.element_type {
                ElementType::U8 => run!($in, u8),
                ElementType::U16 => run!($in, u16),
                ElementType::U32 => run!($in, u32),
                ElementType::I32 => run!($in, i32),
                ElementType::F32 => run!($in, f32),
                ElementType::F64 => run!($in, f64),
                other => Err(outside_fused_set(other)),
            }
        };
    }

    match image.element_type {
        ElementType::U8 => with_input!(u8),
        ElementType::U16 => with_input!(u16),
        ElementType::U32 => with_input!(u32),
        ElementType::I32 => with_input!(i32),
        ElementType::F32 => with_input!(f32),
        ElementType::F64 => with_input!(f64),
        other => Err(outside_fused_set(other)),
    }
}

pub(crate) fn outside_fused_set(element_type: ElementType) -> Error {
    Error::InvalidParameter {
        name: "element_type",
        value: element_type.to_string(),
        reason: "outside the fused filter element set".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voxseg_core::Shape;

    #[test]
    fn test_threshold_u8_scenario() {
        let shape = Shape::new(2, 2, 2);
        let image = Volume::from_vec(shape, vec![0u8, 1, 2, 3, 4, 5, 6, 7]).unwrap();
        let mut output = Volume::<u8>::zeros(shape);

        threshold(&image, &mut output, 4.0).unwrap();
        assert_eq!(output.as_slice(), &[0, 0, 0, 0, 255, 255, 255, 255]);
    }

    #[test]
    fn test_threshold_bijectivity() {
        let shape = Shape::new(2, 3, 4);
        let data: Vec<u16> = (0..24).map(|i| (i * 37 % 1000) as u16).collect();
        let image = Volume::from_vec(shape, data.clone()).unwrap();
        let mut output = Volume::<u32>::zeros(shape);

        threshold(&image, &mut output, 400.0).unwrap();
        for (i, &v) in output.as_slice().iter().enumerate() {
            assert_eq!(v == 0, data[i] < 400, "voxel {}", i);
        }
    }

    #[test]
    fn test_threshold_float_input() {
        let shape = Shape::new(1, 1, 4);
        let image = Volume::from_vec(shape, vec![-1.5f32, 0.0, 0.5, 2.0]).unwrap();
        let mut output = Volume::<u8>::zeros(shape);

        threshold(&image, &mut output, 0.5).unwrap();
        assert_eq!(output.as_slice(), &[0, 0, 255, 255]);
    }

    #[test]
    fn test_threshold_shape_mismatch() {
        let image = Volume::<u8>::zeros(Shape::new(1, 2, 2));
        let mut output = Volume::<u8>::zeros(Shape::new(1, 2, 3));
        assert!(matches!(
            threshold(&image, &mut output, 1.0).unwrap_err(),
            Error::ShapeMismatch { .. }
        ));
    }

    #[test]
    fn test_threshold_filter_trait() {
        let shape = Shape::new(1, 1, 3);
        let image = Volume::from_vec(shape, vec![1u8, 5, 9]).unwrap();
        let output = Volume::<u8>::zeros(shape);

        let result = Threshold::<u8>::default()
            .execute((image, output), ThresholdParams { value: 5.0 })
            .unwrap();
        assert_eq!(result.as_slice(), &[0, 255, 255]);
    }

    #[test]
    fn test_threshold_descriptors_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let shape = Shape::new(1, 2, 2);

        let src = dir.path().join("src.raw");
        {
            let mut vol: Volume<u16> = Volume::create(&src, shape).unwrap();
            vol.as_mut_slice().unwrap().copy_from_slice(&[10, 20, 30, 40]);
            vol.flush().unwrap();
        }
        let dst = dir.path().join("dst.raw");
        let _ = Volume::<u8>::create(&dst, shape).unwrap();

        let image = VolumeDescriptor::new(&src, 0, shape, ElementType::U16);
        let output = VolumeDescriptor::new(&dst, 0, shape, ElementType::U8);
        threshold_descriptors(&image, &output, 25.0).unwrap();

        let result: Volume<u8> = Volume::open(&output).unwrap();
        assert_eq!(result.as_slice(), &[0, 0, 255, 255]);
    }

    #[test]
    fn test_threshold_descriptors_reject_i64() {
        let dir = tempfile::tempdir().unwrap();
        let shape = Shape::new(1, 1, 1);
        let path = dir.path().join("v.raw");
        let _ = Volume::<i64>::create(&path, shape).unwrap();

        let desc = VolumeDescriptor::new(&path, 0, shape, ElementType::I64);
        assert!(threshold_descriptors(&desc, &desc, 0.0).is_err());
    }
}
