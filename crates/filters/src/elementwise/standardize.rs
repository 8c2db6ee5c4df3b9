//! Volume standardization
//!
//! Rescales a volume to zero mean and unit standard deviation, writing f32.
//! Two accumulation passes (sum, then squared deviations) precede the
//! write pass; the std is the population std over all `Z*Y*X` voxels.

use std::marker::PhantomData;

use voxseg_core::{
    check_compatible, ElementType, Error, Filter, Result, Volume, VolumeDescriptor, VolumeElement,
};

use crate::elementwise::threshold::outside_fused_set;
use crate::maybe_rayon::*;

/// Standardize filter
#[derive(Debug, Clone, Default)]
pub struct Standardize<In>(PhantomData<In>);

/// Parameters for standardization (none)
#[derive(Debug, Clone, Default)]
pub struct StandardizeParams;

impl<In: VolumeElement> Filter for Standardize<In> {
    type Input = (Volume<In>, Volume<f32>);
    type Output = Volume<f32>;
    type Params = StandardizeParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Standardize"
    }

    fn description(&self) -> &'static str {
        "Rescale a volume to zero mean and unit standard deviation"
    }

    fn execute(&self, (image, mut output): Self::Input, _: StandardizeParams) -> Result<Volume<f32>> {
        standardize(&image, &mut output)?;
        Ok(output)
    }
}

/// Standardize `image` into `output` as `(x - mean) / std`.
///
/// Returns the `(mean, std)` pair that was applied. A constant volume has
/// zero variance and is surfaced as an error rather than dividing by zero.
///
/// # Arguments
/// * `image` - Input volume
/// * `output` - f32 output volume of identical shape
pub fn standardize<In: VolumeElement>(
    image: &Volume<In>,
    output: &mut Volume<f32>,
) -> Result<(f64, f64)> {
    check_compatible(image.shape(), output.shape())?;

    let data = image.as_slice();
    let n = data.len();
    if n == 0 {
        return Err(Error::InvalidParameter {
            name: "image",
            value: image.shape().to_string(),
            reason: "cannot standardize an empty volume".to_string(),
        });
    }

    // pass 1: mean
    let sum: f64 = data.iter().map(|&v| v.to_f64()).sum();
    let mean = sum / n as f64;

    // pass 2: population variance
    let squared: f64 = data
        .iter()
        .map(|&v| {
            let d = v.to_f64() - mean;
            d * d
        })
        .sum();
    let std = (squared / n as f64).sqrt();

    if std == 0.0 {
        return Err(Error::Algorithm(
            "zero variance: volume is constant".to_string(),
        ));
    }

    // pass 3: write, parallel over Z-slabs
    let plane = image.shape().plane_len().max(1);
    output
        .as_mut_slice()?
        .par_chunks_mut(plane)
        .zip(data.par_chunks(plane))
        .for_each(|(out_plane, in_plane)| {
            for (out, &px) in out_plane.iter_mut().zip(in_plane) {
                *out = ((px.to_f64() - mean) / std) as f32;
            }
        });

    tracing::debug!(shape = %image.shape(), mean, std, "standardized volume");
    Ok((mean, std))
}

/// Standardize at the descriptor boundary, dispatching over the fused input
/// element types. The output descriptor must be f32.
pub fn standardize_descriptors(
    image: &VolumeDescriptor,
    output: &VolumeDescriptor,
) -> Result<(f64, f64)> {
    if output.element_type != ElementType::F32 {
        return Err(Error::TypeMismatch {
            expected: ElementType::F32,
            actual: output.element_type,
        });
    }

    macro_rules! run {
        ($in:ty) => {{
            let image = Volume::<$in>::open(image)?;
            let mut output = Volume::<f32>::open_mut(output)?;
            standardize(&image, &mut output)
        }};
    }

    match image.element_type {
        ElementType::U8 => run!(u8),
        ElementType::U16 => run!(u16),
        ElementType::U32 => run!(u32),
        ElementType::I32 => run!(i32),
        ElementType::F32 => run!(f32),
        ElementType::F64 => run!(f64),
        other => Err(outside_fused_set(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voxseg_core::Shape;

    #[test]
    fn test_standardize_moments() {
        // 10x10x10 ramp, N = 1000
        let shape = Shape::new(10, 10, 10);
        let data: Vec<u16> = (0..1000).map(|i| (i % 113) as u16).collect();
        let image = Volume::from_vec(shape, data).unwrap();
        let mut output = Volume::<f32>::zeros(shape);

        standardize(&image, &mut output).unwrap();

        let out = output.as_slice();
        let n = out.len() as f64;
        let mean: f64 = out.iter().map(|&v| v as f64).sum::<f64>() / n;
        let var: f64 = out
            .iter()
            .map(|&v| {
                let d = v as f64 - mean;
                d * d
            })
            .sum::<f64>()
            / n;

        assert!(mean.abs() < 1e-4, "mean {} not near zero", mean);
        assert!((var.sqrt() - 1.0).abs() < 1e-4, "std {} not near one", var.sqrt());
    }

    #[test]
    fn test_standardize_returns_input_moments() {
        let shape = Shape::new(1, 1, 4);
        let image = Volume::from_vec(shape, vec![1.0f64, 3.0, 5.0, 7.0]).unwrap();
        let mut output = Volume::<f32>::zeros(shape);

        let (mean, std) = standardize(&image, &mut output).unwrap();
        assert!((mean - 4.0).abs() < 1e-12);
        // population std of {1,3,5,7}
        assert!((std - 5.0f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_standardize_constant_volume_errors() {
        let shape = Shape::new(2, 2, 2);
        let image = Volume::from_vec(shape, vec![7u8; 8]).unwrap();
        let mut output = Volume::<f32>::zeros(shape);

        assert!(matches!(
            standardize(&image, &mut output).unwrap_err(),
            Error::Algorithm(_)
        ));
    }
}
