//! Elementwise volume filters
//!
//! Single-pass primitives that stream a raveled volume through its mmap
//! window:
//! - **Threshold**: binarize against a scalar, fused input x output types
//! - **Standardize**: zero mean, unit population std, f32 output
//! - **In-place helpers**: min-threshold, increment-nonzero
//! - **Nonzero coordinates**: raveled indices of foreground voxels
//! - **Max projection**: collapse along Z

mod inplace;
mod nonzero;
mod projection;
mod standardize;
pub(crate) mod threshold;

pub use inplace::{increment_nonzero, min_threshold_in_place};
pub use nonzero::nonzero_coords;
pub use projection::{max_projection, MaxProjection, MaxProjectionParams};
pub use standardize::{standardize, standardize_descriptors, Standardize, StandardizeParams};
pub use threshold::{threshold, threshold_descriptors, Threshold, ThresholdParams};
