//! Element types storable in a raster volume

use std::fmt;
use std::fmt::Debug;

use bytemuck::Pod;
use num_traits::{NumCast, Zero};
use serde::{Deserialize, Serialize};

/// On-disk element type of a raster volume.
///
/// Volume payloads use the six types of the fused filter set; `I64` exists
/// for the nonzero-coordinates side file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementType {
    U8,
    U16,
    U32,
    I32,
    I64,
    F32,
    F64,
}

impl ElementType {
    /// Size of one element in bytes
    pub const fn byte_len(self) -> usize {
        match self {
            ElementType::U8 => 1,
            ElementType::U16 => 2,
            ElementType::U32 | ElementType::I32 | ElementType::F32 => 4,
            ElementType::I64 | ElementType::F64 => 8,
        }
    }

    /// Whether this is a floating point type
    pub const fn is_float(self) -> bool {
        matches!(self, ElementType::F32 | ElementType::F64)
    }

    pub const fn name(self) -> &'static str {
        match self {
            ElementType::U8 => "u8",
            ElementType::U16 => "u16",
            ElementType::U32 => "u32",
            ElementType::I32 => "i32",
            ElementType::I64 => "i64",
            ElementType::F32 => "f32",
            ElementType::F64 => "f64",
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Trait for types that can live in a raster volume cell.
///
/// Bounds the voxel types the filters accept: plain-old-data scalars that
/// cast to and from `f64` and compare natively.
pub trait VolumeElement:
    Copy + Debug + PartialOrd + PartialEq + NumCast + Zero + Pod + Send + Sync + 'static
{
    /// The matching on-disk element type
    const TYPE: ElementType;

    /// Minimum value representable by this type
    fn min_value() -> Self;

    /// Maximum value representable by this type
    fn max_value() -> Self;

    /// Whether this type is a floating point type
    fn is_float() -> bool {
        Self::TYPE.is_float()
    }

    /// Lossy widening to f64
    fn to_f64(self) -> f64;

    /// Narrow an f64 into this type's range.
    ///
    /// Integer targets truncate toward zero after clamping; NaN becomes 0.
    fn from_f64_clamped(v: f64) -> Self;
}

macro_rules! impl_element_int {
    ($t:ty, $variant:ident) => {
        impl VolumeElement for $t {
            const TYPE: ElementType = ElementType::$variant;

            fn min_value() -> Self {
                <$t>::MIN
            }

            fn max_value() -> Self {
                <$t>::MAX
            }

            fn to_f64(self) -> f64 {
                self as f64
            }

            fn from_f64_clamped(v: f64) -> Self {
                if v <= <$t>::MIN as f64 {
                    <$t>::MIN
                } else if v >= <$t>::MAX as f64 {
                    <$t>::MAX
                } else {
                    v as $t
                }
            }
        }
    };
}

macro_rules! impl_element_float {
    ($t:ty, $variant:ident) => {
        impl VolumeElement for $t {
            const TYPE: ElementType = ElementType::$variant;

            fn min_value() -> Self {
                <$t>::MIN
            }

            fn max_value() -> Self {
                <$t>::MAX
            }

            fn to_f64(self) -> f64 {
                self as f64
            }

            fn from_f64_clamped(v: f64) -> Self {
                if v <= <$t>::MIN as f64 {
                    <$t>::MIN
                } else if v >= <$t>::MAX as f64 {
                    <$t>::MAX
                } else {
                    v as $t
                }
            }
        }
    };
}

impl_element_int!(u8, U8);
impl_element_int!(u16, U16);
impl_element_int!(u32, U32);
impl_element_int!(i32, I32);
impl_element_int!(i64, I64);
impl_element_float!(f32, F32);
impl_element_float!(f64, F64);
