//! In-place scalar helpers
//!
//! Small single-pass mutations used between the heavier filters. Both are
//! documented in-place safe: they stream the mapped buffer once and touch
//! no other volume.

use voxseg_core::{Result, Volume, VolumeElement};

/// Zero out voxels below `value`; voxels at or above it are untouched.
pub fn min_threshold_in_place<T: VolumeElement>(volume: &mut Volume<T>, value: f64) -> Result<()> {
    let v = T::from_f64_clamped(value);
    for px in volume.as_mut_slice()? {
        if *px < v {
            *px = T::zero();
        }
    }
    Ok(())
}

/// Add `delta` to every non-zero voxel, saturating at the element range;
/// zeros are untouched.
pub fn increment_nonzero<T: VolumeElement>(volume: &mut Volume<T>, delta: f64) -> Result<()> {
    let zero = T::zero();
    for px in volume.as_mut_slice()? {
        if *px != zero {
            *px = T::from_f64_clamped(px.to_f64() + delta);
        }
    }
    Ok(())
}
