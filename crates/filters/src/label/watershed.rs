//! Seeded 3D watershed
//!
//! Floods labels outward from seed voxels over a raveled image, visiting
//! voxels in `(age, value)` order from a locally owned min-heap. Three
//! variants share the loop:
//! - **classical**: neighbors are labelled eagerly as they are pushed
//! - **compact**: an additive Euclidean penalty toward the seed biases
//!   basins round; voxels settle lazily on first pop
//! - **wsl**: voxels whose neighborhood already carries two different
//!   labels become watershed lines, masked out and left unlabelled
//!
//! Border voxels must be masked out by the caller; the inner loop applies
//! raveled offsets without bounds checks beyond Rust's own.

use std::marker::PhantomData;

use voxseg_core::{check_compatible, Error, Filter, Result, Volume, VolumeElement};

use crate::heap::{Heapitem, VoxelHeap};

/// Parameters for the seeded watershed
#[derive(Debug, Clone)]
pub struct WatershedParams {
    /// Additive Euclidean penalty toward the source seed; `0` disables
    pub compactness: f64,
    /// Preserve watershed lines between basins
    pub wsl: bool,
    /// Negate image values (flood bright-to-dark)
    pub invert: bool,
}

impl Default for WatershedParams {
    fn default() -> Self {
        Self {
            compactness: 0.0,
            wsl: false,
            invert: false,
        }
    }
}

/// Bundled inputs for the watershed filter.
///
/// `output` must already carry the seed labels at the seed positions;
/// `structure` is the signed raveled neighborhood and `mask` a 0/1 volume
/// with every border voxel zero.
#[derive(Debug)]
pub struct WatershedInput<T: VolumeElement> {
    pub image: Volume<T>,
    pub seeds: Vec<usize>,
    pub structure: Vec<isize>,
    pub mask: Volume<u8>,
    pub output: Volume<i32>,
}

/// Seeded watershed filter
#[derive(Debug, Clone, Default)]
pub struct Watershed<T>(PhantomData<T>);

impl<T: VolumeElement> Filter for Watershed<T> {
    type Input = WatershedInput<T>;
    type Output = (Volume<i32>, Volume<u8>);
    type Params = WatershedParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Watershed"
    }

    fn description(&self) -> &'static str {
        "Flood seed labels over a volume in (age, value) order"
    }

    fn execute(&self, mut input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        watershed(
            &input.image,
            &input.seeds,
            &input.structure,
            &mut input.mask,
            &mut input.output,
            &params,
        )?;
        Ok((input.output, input.mask))
    }
}

/// Euclidean distance between two raveled voxels.
///
/// Decomposes both indices axis by axis through the outermost-first strides
/// and sums squared per-axis differences.
fn raveled_distance(p: usize, q: usize, strides: &[isize; 3]) -> f64 {
    let mut p = p as isize;
    let mut q = q as isize;
    let mut sum = 0.0f64;
    for &stride in strides {
        let dp = p / stride;
        let dq = q / stride;
        let d = (dp - dq) as f64;
        sum += d * d;
        p %= stride;
        q %= stride;
    }
    sum.sqrt()
}

/// True when the neighborhood of `index` already carries two different
/// labels, i.e. two basins meet here.
fn differing_neighbors(output: &[i32], mask: &[u8], structure: &[isize], index: usize) -> bool {
    let mut first = 0i32;
    for &offset in structure {
        let n = (index as isize + offset) as usize;
        if mask[n] == 0 {
            continue;
        }
        let label = output[n];
        if label == 0 {
            continue;
        }
        if first == 0 {
            first = label;
        } else if label != first {
            return true;
        }
    }
    false
}

/// Flood seed labels over `image`.
///
/// Every seed is pushed at age 0 with its (possibly inverted) image value;
/// the loop then settles the oldest, cheapest heap item until the heap
/// drains. In the classical variant neighbors are labelled the moment they
/// are pushed; with compactness or watershed lines enabled, voxels settle
/// on their first pop and later, more expensive pushes are discarded.
///
/// # Arguments
/// * `image` - Intensity volume
/// * `seeds` - Raveled seed indices; `output` must be non-zero at each
/// * `structure` - Signed raveled neighbor offsets
/// * `mask` - 0/1 volume, zero on every border voxel; `wsl` writes
///   watershed lines back into it
/// * `output` - Label volume carrying seed labels, filled in place
/// * `params` - Compactness, watershed-line and inversion switches
pub fn watershed<T: VolumeElement>(
    image: &Volume<T>,
    seeds: &[usize],
    structure: &[isize],
    mask: &mut Volume<u8>,
    output: &mut Volume<i32>,
    params: &WatershedParams,
) -> Result<()> {
    check_compatible(image.shape(), mask.shape())?;
    check_compatible(image.shape(), output.shape())?;

    let len = image.len();
    let data = image.as_slice();
    let mask = mask.as_mut_slice()?;
    let out = output.as_mut_slice()?;
    let strides = image.shape().strides();

    let factor = if params.invert { -1.0 } else { 1.0 };
    let compact = params.compactness;
    let lazy = compact > 0.0 || params.wsl;

    tracing::debug!(
        shape = %image.shape(),
        seeds = seeds.len(),
        neighbors = structure.len(),
        compactness = compact,
        wsl = params.wsl,
        "watershed"
    );

    let mut heap = VoxelHeap::with_capacity(seeds.len() * (structure.len() + 1));
    for &seed in seeds {
        if seed >= len {
            return Err(Error::SeedOutOfRange { seed, len });
        }
        if out[seed] == 0 {
            return Err(Error::InvalidParameter {
                name: "seeds",
                value: seed.to_string(),
                reason: "seed voxel carries no label in the output volume".to_string(),
            });
        }
        heap.push(Heapitem {
            value: factor * data[seed].to_f64(),
            age: 0,
            index: seed,
            source: seed,
        });
    }
    let mut age: u64 = 1;

    while let Some(elem) = heap.pop() {
        if lazy {
            // settled by a cheaper push already
            if out[elem.index] != 0 && elem.index != elem.source {
                continue;
            }
            if params.wsl && differing_neighbors(out, mask, structure, elem.index) {
                mask[elem.index] = 0;
                continue;
            }
            out[elem.index] = out[elem.source];
        }

        for &offset in structure {
            let n = (elem.index as isize + offset) as usize;
            if mask[n] == 0 {
                continue;
            }
            if out[n] != 0 {
                continue;
            }

            let mut value = factor * data[n].to_f64();
            if compact > 0.0 {
                value += compact * raveled_distance(n, elem.source, &strides);
            }
            if !lazy {
                // nothing cheaper can reach n: label it now
                out[n] = out[elem.index];
            }

            age += 1;
            heap.push(Heapitem {
                value,
                age,
                index: n,
                source: elem.source,
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use voxseg_core::{Connectivity, Shape};

    /// 1D line embedded as (len, 1, 1) with masked end voxels.
    fn line_setup(values: &[f64]) -> (Volume<f64>, Volume<u8>, Volume<i32>) {
        let shape = Shape::new(values.len(), 1, 1);
        let image = Volume::from_vec(shape, values.to_vec()).unwrap();
        let mut mask_data = vec![1u8; values.len()];
        mask_data[0] = 0;
        *mask_data.last_mut().unwrap() = 0;
        let mask = Volume::from_vec(shape, mask_data).unwrap();
        let output = Volume::<i32>::zeros(shape);
        (image, mask, output)
    }

    #[test]
    fn test_watershed_line_scenario() {
        // interior [0,1,2,1,0], seeds 7 and 9 at the ends: the split lands
        // between indices 3 and 4 because seed 7 pops first
        let (image, mut mask, mut output) =
            line_setup(&[0.0, 0.0, 1.0, 2.0, 1.0, 0.0, 0.0]);
        output.as_mut_slice().unwrap()[1] = 7;
        output.as_mut_slice().unwrap()[5] = 9;

        watershed(
            &image,
            &[1, 5],
            &[-1, 1],
            &mut mask,
            &mut output,
            &WatershedParams::default(),
        )
        .unwrap();

        assert_eq!(&output.as_slice()[1..6], &[7, 7, 7, 9, 9]);
    }

    #[test]
    fn test_watershed_compact_same_split() {
        let (image, mut mask, mut output) =
            line_setup(&[0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        output.as_mut_slice().unwrap()[1] = 7;
        output.as_mut_slice().unwrap()[5] = 9;

        watershed(
            &image,
            &[1, 5],
            &[-1, 1],
            &mut mask,
            &mut output,
            &WatershedParams {
                compactness: 1.0,
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(&output.as_slice()[1..6], &[7, 7, 7, 9, 9]);
    }

    #[test]
    fn test_watershed_wsl_masks_meeting_point() {
        let (image, mut mask, mut output) =
            line_setup(&[0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        output.as_mut_slice().unwrap()[1] = 7;
        output.as_mut_slice().unwrap()[5] = 9;

        watershed(
            &image,
            &[1, 5],
            &[-1, 1],
            &mut mask,
            &mut output,
            &WatershedParams {
                wsl: true,
                ..Default::default()
            },
        )
        .unwrap();

        // fronts meet in the middle: the line voxel stays unlabelled and is
        // masked out
        assert_eq!(&output.as_slice()[1..6], &[7, 7, 0, 9, 9]);
        assert_eq!(mask.as_slice()[3], 0);
    }

    #[test]
    fn test_watershed_covering() {
        // every interior mask voxel must receive a label
        let shape = Shape::new(5, 5, 5);
        let data: Vec<f32> = (0..shape.len()).map(|i| (i % 17) as f32).collect();
        let image = Volume::from_vec(shape, data).unwrap();

        let mut mask_data = vec![0u8; shape.len()];
        for z in 1..4 {
            for y in 1..4 {
                for x in 1..4 {
                    mask_data[shape.ravel(z, y, x)] = 1;
                }
            }
        }
        let mut mask = Volume::from_vec(shape, mask_data.clone()).unwrap();

        let mut output = Volume::<i32>::zeros(shape);
        let seed_a = shape.ravel(1, 1, 1);
        let seed_b = shape.ravel(3, 3, 3);
        output.as_mut_slice().unwrap()[seed_a] = 11;
        output.as_mut_slice().unwrap()[seed_b] = 22;

        let structure = Connectivity::Six.raveled_offsets(&shape);
        watershed(
            &image,
            &[seed_a, seed_b],
            &structure,
            &mut mask,
            &mut output,
            &WatershedParams::default(),
        )
        .unwrap();

        for (i, &m) in mask_data.iter().enumerate() {
            if m != 0 {
                let label = output.as_slice()[i];
                assert!(label == 11 || label == 22, "voxel {} unlabelled", i);
            } else {
                assert_eq!(output.as_slice()[i], 0, "masked voxel {} labelled", i);
            }
        }
    }

    #[test]
    fn test_watershed_invert_keeps_covering() {
        let (image, mut mask, mut output) =
            line_setup(&[0.0, 5.0, 3.0, 1.0, 3.0, 5.0, 0.0]);
        output.as_mut_slice().unwrap()[1] = 1;
        output.as_mut_slice().unwrap()[5] = 2;

        watershed(
            &image,
            &[1, 5],
            &[-1, 1],
            &mut mask,
            &mut output,
            &WatershedParams {
                invert: true,
                ..Default::default()
            },
        )
        .unwrap();

        for &v in &output.as_slice()[1..6] {
            assert!(v == 1 || v == 2);
        }
    }

    #[test]
    fn test_watershed_rejects_seed_out_of_range() {
        let (image, mut mask, mut output) = line_setup(&[0.0, 0.0, 0.0]);
        let err = watershed(
            &image,
            &[99],
            &[-1, 1],
            &mut mask,
            &mut output,
            &WatershedParams::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::SeedOutOfRange { seed: 99, .. }));
    }

    #[test]
    fn test_watershed_rejects_unlabelled_seed() {
        let (image, mut mask, mut output) = line_setup(&[0.0, 0.0, 0.0]);
        let err = watershed(
            &image,
            &[1],
            &[-1, 1],
            &mut mask,
            &mut output,
            &WatershedParams::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { .. }));
    }

    #[test]
    fn test_raveled_distance() {
        let shape = Shape::new(4, 5, 6);
        let strides = shape.strides();
        let p = shape.ravel(1, 2, 3);
        let q = shape.ravel(3, 0, 3);
        // dz = 2, dy = 2, dx = 0
        assert!((raveled_distance(p, q, &strides) - 8.0f64.sqrt()).abs() < 1e-12);
        assert_eq!(raveled_distance(p, p, &strides), 0.0);
    }
}
