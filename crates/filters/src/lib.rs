//! # VoxSeg Filters
//!
//! Out-of-core volumetric filters for light-sheet microscopy cell
//! segmentation. Filters read and write [`voxseg_core::Volume`] windows
//! over mmap-backed raster files; no filter materializes a whole volume.
//!
//! ## Available filter categories
//!
//! - **elementwise**: threshold, standardize, in-place scalar helpers,
//!   nonzero coordinates, max projection
//! - **background**: rolling-ball background subtraction
//! - **label**: connected components stitching, size filtering, seeded
//!   watershed, two-threshold overlap reconciliation
//! - **diffusion**: mask-constrained diffusion flooding

pub mod background;
pub mod diffusion;
pub mod elementwise;
pub mod label;

mod heap;
mod maybe_rayon;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::background::{subtract_background, BackgroundSubtract, RollingBall};
    pub use crate::diffusion::{diffuse, Diffuse, DiffuseInput, DiffuseParams};
    pub use crate::elementwise::{
        increment_nonzero, max_projection, min_threshold_in_place, nonzero_coords, standardize,
        threshold, MaxProjection, Standardize, Threshold, ThresholdParams,
    };
    pub use crate::label::{
        connect, label_by_size, overlap, overlap_in_place, size_filter, size_filter_in_place,
        watershed, Connect, Overlap, SizeFilter, SizeFilterParams, SizeFilterReport, Watershed,
        WatershedInput, WatershedParams,
    };
    pub use voxseg_core::prelude::*;
}
