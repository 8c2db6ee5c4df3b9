//! # VoxSeg Core
//!
//! Core types and traits for the VoxSeg out-of-core volumetric filters.
//!
//! This crate provides:
//! - `Volume<T>`: scoped typed window over an mmap-backed raster volume
//! - `VolumeDescriptor`: the file/offset/shape/type handle passed across
//!   filter boundaries
//! - `Shape`, `Connectivity`: raveled-index geometry and neighborhood
//!   structures
//! - `Filter` trait for a consistent API across filters

pub mod error;
pub mod volume;

pub use error::{Error, Result};
pub use volume::{
    check_compatible, Connectivity, ElementType, Shape, Volume, VolumeDescriptor, VolumeElement,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::volume::{
        check_compatible, Connectivity, ElementType, Shape, Volume, VolumeDescriptor,
        VolumeElement,
    };
    pub use crate::Filter;
}

/// Core trait for all filters in VoxSeg.
///
/// Filters transform input volumes according to parameters. Volumes are
/// handles over backing storage, so moving them through `execute` is cheap
/// and keeps ownership of each mapping inside the invocation that opened it.
pub trait Filter {
    /// Input type for the filter
    type Input;
    /// Output type for the filter
    type Output;
    /// Parameters controlling filter behavior
    type Params: Default;
    /// Error type for filter execution
    type Error: std::error::Error;

    /// Returns the filter name
    fn name(&self) -> &'static str;

    /// Returns a description of what the filter does
    fn description(&self) -> &'static str;

    /// Execute the filter
    fn execute(
        &self,
        input: Self::Input,
        params: Self::Params,
    ) -> std::result::Result<Self::Output, Self::Error>;

    /// Execute with default parameters
    fn execute_default(&self, input: Self::Input) -> std::result::Result<Self::Output, Self::Error> {
        self.execute(input, Self::Params::default())
    }
}
