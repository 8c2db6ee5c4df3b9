//! Non-zero coordinate extraction
//!
//! Streams a volume and appends the raveled index of every non-zero voxel
//! to a side file as native-endian signed 8-byte integers. The downstream
//! pipeline reads the side file back as seed lists for the watershed and
//! diffusion filters.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use voxseg_core::{ElementType, Result, Shape, Volume, VolumeDescriptor, VolumeElement};

/// Write the raveled indices of all non-zero voxels of `image` to `path`.
///
/// Returns the 1D `i64` raster handle over the side file, shaped
/// `(1, 1, count)`. An all-zero volume yields an empty resident handle
/// (there is nothing to map).
pub fn nonzero_coords<T: VolumeElement, P: AsRef<Path>>(
    image: &Volume<T>,
    path: P,
) -> Result<Volume<i64>> {
    let path = path.as_ref();
    let mut writer = BufWriter::new(File::create(path)?);

    let zero = T::zero();
    let mut count: usize = 0;
    for (index, &px) in image.as_slice().iter().enumerate() {
        if px != zero {
            writer.write_all(&(index as i64).to_ne_bytes())?;
            count += 1;
        }
    }
    writer.flush()?;
    drop(writer);

    tracing::debug!(shape = %image.shape(), count, path = %path.display(), "extracted nonzero coords");

    if count == 0 {
        return Volume::from_vec(Shape::new(1, 1, 0), Vec::new());
    }

    let desc = VolumeDescriptor::new(path, 0, Shape::new(1, 1, count), ElementType::I64);
    Volume::open(&desc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nonzero_coords_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let shape = Shape::new(2, 2, 3);
        let data = vec![0u8, 3, 0, 1, 0, 0, 7, 0, 0, 0, 0, 2];
        let image = Volume::from_vec(shape, data.clone()).unwrap();

        let coords = nonzero_coords(&image, dir.path().join("coords.i64")).unwrap();
        assert_eq!(coords.as_slice(), &[1, 3, 6, 11]);

        // reconstruct a binarized volume from the side file
        let mut rebuilt = vec![0u8; shape.len()];
        for &index in coords.as_slice() {
            rebuilt[index as usize] = 1;
        }
        for (i, &orig) in data.iter().enumerate() {
            assert_eq!(rebuilt[i] != 0, orig != 0, "voxel {}", i);
        }
    }

    #[test]
    fn test_nonzero_coords_empty() {
        let dir = tempfile::tempdir().unwrap();
        let image = Volume::<u16>::zeros(Shape::new(2, 2, 2));
        let coords = nonzero_coords(&image, dir.path().join("empty.i64")).unwrap();
        assert_eq!(coords.len(), 0);
    }

    #[test]
    fn test_nonzero_coords_file_is_native_endian() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("coords.i64");
        let image = Volume::from_vec(Shape::new(1, 1, 3), vec![0f32, 2.5, 0.0]).unwrap();

        let _coords = nonzero_coords(&image, &path).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes.len(), 8);
        assert_eq!(i64::from_ne_bytes(bytes[..8].try_into().unwrap()), 1);
    }
}
