//! Maximum intensity projection
//!
//! Collapses a volume along Z by taking the per-pixel maximum, producing a
//! `(1, Y, X)` volume. Used for quick QC views of detection stages.

use std::marker::PhantomData;

use voxseg_core::{check_compatible, Error, Filter, Result, Shape, Volume, VolumeElement};

/// Max projection filter
#[derive(Debug, Clone, Default)]
pub struct MaxProjection<T>(PhantomData<T>);

/// Parameters for max projection (none)
#[derive(Debug, Clone, Default)]
pub struct MaxProjectionParams;

impl<T: VolumeElement> Filter for MaxProjection<T> {
    type Input = (Volume<T>, Volume<T>);
    type Output = Volume<T>;
    type Params = MaxProjectionParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "MaxProjection"
    }

    fn description(&self) -> &'static str {
        "Per-pixel maximum along the Z axis"
    }

    fn execute(&self, (image, mut output): Self::Input, _: MaxProjectionParams) -> Result<Volume<T>> {
        max_projection(&image, &mut output)?;
        Ok(output)
    }
}

/// Project `image` along Z into `output`, which must be `(1, Y, X)`.
pub fn max_projection<T: VolumeElement>(image: &Volume<T>, output: &mut Volume<T>) -> Result<()> {
    let shape = image.shape();
    check_compatible(Shape::new(1, shape.y, shape.x), output.shape())?;
    if shape.z == 0 {
        return Err(Error::InvalidParameter {
            name: "image",
            value: shape.to_string(),
            reason: "cannot project an empty stack".to_string(),
        });
    }

    let out = output.as_mut_slice()?;
    out.copy_from_slice(image.plane(0)?);
    for z in 1..shape.z {
        for (acc, &px) in out.iter_mut().zip(image.plane(z)?) {
            if px > *acc {
                *acc = px;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_projection_picks_peak_plane() {
        let shape = Shape::new(3, 1, 4);
        let data = vec![
            1u8, 9, 0, 4, // z=0
            5, 2, 3, 4, // z=1
            0, 0, 7, 4, // z=2
        ];
        let image = Volume::from_vec(shape, data).unwrap();
        let mut output = Volume::<u8>::zeros(Shape::new(1, 1, 4));

        max_projection(&image, &mut output).unwrap();
        assert_eq!(output.as_slice(), &[5, 9, 7, 4]);
    }

    #[test]
    fn test_max_projection_rejects_bad_output_shape() {
        let image = Volume::<u8>::zeros(Shape::new(2, 2, 2));
        let mut output = Volume::<u8>::zeros(Shape::new(2, 2, 2));
        assert!(max_projection(&image, &mut output).is_err());
    }
}
