//! Raster volume handles
//!
//! A *raster volume* is a contiguous `(Z, Y, X)` grid of typed elements
//! living in a backing file at a byte offset, in row-major order with X
//! innermost and native (little-endian) byte order. [`Volume`] is the scoped
//! window over such a raster: it owns the memory mapping and yields plain
//! slices over the element payload. Small intermediates and test fixtures
//! can instead live resident in memory.

mod connectivity;
mod element;
mod mmap;
mod shape;

use std::mem;
use std::path::{Path, PathBuf};

use ndarray::{ArrayView3, ArrayViewMut3};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub use connectivity::Connectivity;
pub use element::{ElementType, VolumeElement};
pub use shape::Shape;

/// Locates a raster volume inside a backing file.
///
/// This is the handle the surrounding pipeline passes across every filter
/// boundary: file path, byte offset of the first element, shape and element
/// type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeDescriptor {
    pub path: PathBuf,
    /// Byte offset of the first element from the file origin
    pub offset: u64,
    pub shape: Shape,
    pub element_type: ElementType,
}

impl VolumeDescriptor {
    pub fn new<P: Into<PathBuf>>(
        path: P,
        offset: u64,
        shape: Shape,
        element_type: ElementType,
    ) -> Self {
        Self {
            path: path.into(),
            offset,
            shape,
            element_type,
        }
    }

    /// Number of elements, `Z·Y·X`
    pub fn size(&self) -> usize {
        self.shape.len()
    }

    /// Length of the element payload in bytes
    pub fn byte_len(&self) -> u64 {
        self.size() as u64 * self.element_type.byte_len() as u64
    }
}

/// Check two volumes agree on shape, surfacing [`Error::ShapeMismatch`].
pub fn check_compatible(expected: Shape, actual: Shape) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(Error::ShapeMismatch { expected, actual })
    }
}

#[derive(Debug)]
enum Storage<T> {
    Resident(Vec<T>),
    Mapped {
        region: mmap::MappedRegion,
        byte_offset: usize,
    },
}

/// A typed window over a raster volume.
///
/// Mapped variants hold the mapping for their whole lifetime and release it
/// on drop, on every exit path. Direct element access never copies: slices
/// point into the mapping itself, so filters stream tens-of-gigabyte
/// volumes without resident buffers.
#[derive(Debug)]
pub struct Volume<T: VolumeElement> {
    shape: Shape,
    origin: Option<(PathBuf, u64)>,
    storage: Storage<T>,
}

impl<T: VolumeElement> Volume<T> {
    /// Map an existing raster read-only.
    pub fn open(desc: &VolumeDescriptor) -> Result<Self> {
        Self::check_descriptor(desc)?;
        let region = mmap::map_readonly(&desc.path, desc.offset + desc.byte_len())?;
        tracing::debug!(
            path = %desc.path.display(),
            shape = %desc.shape,
            element = %desc.element_type,
            "mapped volume read-only"
        );
        Ok(Self {
            shape: desc.shape,
            origin: Some((desc.path.clone(), desc.offset)),
            storage: Storage::Mapped {
                region,
                byte_offset: desc.offset as usize,
            },
        })
    }

    /// Map an existing raster read-write.
    pub fn open_mut(desc: &VolumeDescriptor) -> Result<Self> {
        Self::check_descriptor(desc)?;
        let region = mmap::map_readwrite(&desc.path, desc.offset + desc.byte_len())?;
        tracing::debug!(
            path = %desc.path.display(),
            shape = %desc.shape,
            element = %desc.element_type,
            "mapped volume read-write"
        );
        Ok(Self {
            shape: desc.shape,
            origin: Some((desc.path.clone(), desc.offset)),
            storage: Storage::Mapped {
                region,
                byte_offset: desc.offset as usize,
            },
        })
    }

    /// Create a zero-filled backing file for `shape` and map it read-write.
    pub fn create<P: AsRef<Path>>(path: P, shape: Shape) -> Result<Self> {
        let path = path.as_ref();
        let byte_len = shape.len() as u64 * T::TYPE.byte_len() as u64;
        let region = mmap::create_backing(path, byte_len)?;
        tracing::debug!(
            path = %path.display(),
            shape = %shape,
            element = %T::TYPE,
            "created backing volume"
        );
        Ok(Self {
            shape,
            origin: Some((path.to_path_buf(), 0)),
            storage: Storage::Mapped {
                region,
                byte_offset: 0,
            },
        })
    }

    /// Wrap an in-memory buffer.
    pub fn from_vec(shape: Shape, data: Vec<T>) -> Result<Self> {
        if data.len() != shape.len() {
            return Err(Error::InvalidParameter {
                name: "data",
                value: data.len().to_string(),
                reason: format!("expected {} elements for shape {}", shape.len(), shape),
            });
        }
        Ok(Self {
            shape,
            origin: None,
            storage: Storage::Resident(data),
        })
    }

    /// An in-memory volume of zeros.
    pub fn zeros(shape: Shape) -> Self {
        Self {
            shape,
            origin: None,
            storage: Storage::Resident(vec![T::zero(); shape.len()]),
        }
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    /// Total number of voxels
    pub fn len(&self) -> usize {
        self.shape.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shape.is_empty()
    }

    /// The element payload in raveled order.
    pub fn as_slice(&self) -> &[T] {
        match &self.storage {
            Storage::Resident(data) => data,
            Storage::Mapped {
                region,
                byte_offset,
            } => {
                let len = self.shape.len() * mem::size_of::<T>();
                bytemuck::cast_slice(&region.bytes()[*byte_offset..byte_offset + len])
            }
        }
    }

    /// The element payload, writable. Read-only mappings refuse.
    pub fn as_mut_slice(&mut self) -> Result<&mut [T]> {
        let len = self.shape.len() * mem::size_of::<T>();
        match &mut self.storage {
            Storage::Resident(data) => Ok(data),
            Storage::Mapped {
                region,
                byte_offset,
            } => {
                let offset = *byte_offset;
                let bytes = region.bytes_mut()?;
                Ok(bytemuck::cast_slice_mut(&mut bytes[offset..offset + len]))
            }
        }
    }

    /// One Z-plane in raveled `(Y, X)` order.
    pub fn plane(&self, z: usize) -> Result<&[T]> {
        let plane = self.shape.plane_len();
        if z >= self.shape.z {
            return Err(Error::IndexOutOfBounds {
                index: z * plane,
                len: self.len(),
            });
        }
        Ok(&self.as_slice()[z * plane..(z + 1) * plane])
    }

    /// One Z-plane, writable.
    pub fn plane_mut(&mut self, z: usize) -> Result<&mut [T]> {
        let plane = self.shape.plane_len();
        if z >= self.shape.z {
            return Err(Error::IndexOutOfBounds {
                index: z * plane,
                len: self.len(),
            });
        }
        let slice = self.as_mut_slice()?;
        Ok(&mut slice[z * plane..(z + 1) * plane])
    }

    /// Borrowed 3D view of the payload.
    pub fn view(&self) -> ArrayView3<'_, T> {
        let Shape { z, y, x } = self.shape;
        // Shape and payload length agree by construction.
        ArrayView3::from_shape((z, y, x), self.as_slice()).expect("shape matches payload")
    }

    /// Borrowed mutable 3D view of the payload.
    pub fn view_mut(&mut self) -> Result<ArrayViewMut3<'_, T>> {
        let Shape { z, y, x } = self.shape;
        let slice = self.as_mut_slice()?;
        Ok(ArrayViewMut3::from_shape((z, y, x), slice).expect("shape matches payload"))
    }

    /// The descriptor locating this volume, if it is file-backed.
    pub fn descriptor(&self) -> Option<VolumeDescriptor> {
        self.origin.as_ref().map(|(path, offset)| VolumeDescriptor {
            path: path.clone(),
            offset: *offset,
            shape: self.shape,
            element_type: T::TYPE,
        })
    }

    /// Flush dirty pages of a read-write mapping to the backing file.
    pub fn flush(&self) -> Result<()> {
        match &self.storage {
            Storage::Resident(_) => Ok(()),
            Storage::Mapped { region, .. } => region.flush(),
        }
    }

    fn check_descriptor(desc: &VolumeDescriptor) -> Result<()> {
        if desc.element_type != T::TYPE {
            return Err(Error::TypeMismatch {
                expected: T::TYPE,
                actual: desc.element_type,
            });
        }
        let align = mem::align_of::<T>();
        if desc.offset % align as u64 != 0 {
            return Err(Error::Misaligned {
                offset: desc.offset,
                align,
            });
        }
        Ok(())
    }
}
