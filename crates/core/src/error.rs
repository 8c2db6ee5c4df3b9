//! Error types for VoxSeg

use std::path::PathBuf;

use thiserror::Error;

use crate::volume::{ElementType, Shape};

/// Main error type for VoxSeg operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("short file: {path} holds {actual} bytes, raster needs {needed}")]
    ShortFile {
        path: PathBuf,
        needed: u64,
        actual: u64,
    },

    #[error("element offset {offset} is not aligned to {align} bytes")]
    Misaligned { offset: u64, align: usize },

    #[error("shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: Shape, actual: Shape },

    #[error("element type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        expected: ElementType,
        actual: ElementType,
    },

    #[error("index {index} out of bounds for volume of {len} voxels")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("seed index {seed} out of range for volume of {len} voxels")]
    SeedOutOfRange { seed: usize, len: usize },

    #[error("volume was mapped read-only")]
    ReadOnlyVolume,

    #[error("label value {value} exceeds the representable label range")]
    LabelOverflow { value: u64 },

    #[error("invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("filter error: {0}")]
    Algorithm(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for VoxSeg operations
pub type Result<T> = std::result::Result<T, Error>;
