//! Label-volume filters
//!
//! Operations over i32 label volumes, where `0` is background and non-zero
//! values name connected components:
//! - **Connect**: slice-by-slice connected components with 3D stitching
//! - **SizeFilter** / `label_by_size`: component size windows
//! - **Watershed**: seeded flooding (classical, compact, watershed-line)
//! - **Overlap**: two-threshold label reconciliation

mod connect;
mod overlap;
mod size_filter;
mod watershed;

pub use connect::{connect, label_plane, Connect, ConnectParams};
pub use overlap::{overlap, overlap_in_place, Overlap, OverlapParams};
pub use size_filter::{
    label_by_size, size_filter, size_filter_in_place, SizeFilter, SizeFilterParams,
    SizeFilterReport,
};
pub use watershed::{watershed, Watershed, WatershedInput, WatershedParams};
