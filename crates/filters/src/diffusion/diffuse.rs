//! Mask-constrained isotropic diffusion
//!
//! Floods a soft concentration field outward from seed voxels, shaping
//! regions of interest inside a tissue mask. Each settled voxel takes
//! `(neighbor mean * k + current) / 2`; fronts die where the value drops
//! below the threshold. The mask doubles as the queue bookkeeping: `1`
//! means floodable, `2` in-queue, `0` outside the tissue. The in-queue
//! marks are restored before returning.

use voxseg_core::{check_compatible, Error, Filter, Result, Volume};

use crate::heap::{Heapitem, VoxelHeap};

/// Parameters for the diffusion flooder
#[derive(Debug, Clone)]
pub struct DiffuseParams {
    /// Concentration below which a front dies
    pub threshold: f64,
    /// Neighbor-mean gain
    pub k: f64,
    /// Number of flood repetitions over the same seeds
    pub iterations: usize,
}

impl Default for DiffuseParams {
    fn default() -> Self {
        Self {
            threshold: 0.0,
            k: 1.0,
            iterations: 1,
        }
    }
}

/// Bundled inputs for the diffusion filter.
#[derive(Debug)]
pub struct DiffuseInput {
    pub mask: Volume<u8>,
    pub image: Volume<f32>,
    pub seeds: Vec<usize>,
    pub structure: Vec<isize>,
}

/// Diffusion flooder filter
#[derive(Debug, Clone, Default)]
pub struct Diffuse;

impl Filter for Diffuse {
    type Input = DiffuseInput;
    type Output = (Volume<f32>, Volume<u8>);
    type Params = DiffuseParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Diffuse"
    }

    fn description(&self) -> &'static str {
        "Flood a soft concentration field from seeds inside a mask"
    }

    fn execute(&self, mut input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        diffuse(
            &mut input.mask,
            &mut input.image,
            &input.seeds,
            &input.structure,
            &params,
        )?;
        Ok((input.image, input.mask))
    }
}

/// Diffuse seed concentration through `image` inside `mask`.
///
/// Voxels outside the mask are set to concentration 1 first (the tissue
/// boundary is saturated), then each iteration floods from the seeds.
/// Border voxels must be outside the mask; the inner loop applies raveled
/// offsets without bounds checks beyond Rust's own.
///
/// # Arguments
/// * `mask` - 0/1 volume; `2` is used internally and restored
/// * `image` - f32 concentration volume, mutated in place
/// * `seeds` - Raveled seed indices, set to concentration 1
/// * `structure` - Signed raveled neighbor offsets
/// * `params` - Threshold, gain and iteration count
pub fn diffuse(
    mask: &mut Volume<u8>,
    image: &mut Volume<f32>,
    seeds: &[usize],
    structure: &[isize],
    params: &DiffuseParams,
) -> Result<()> {
    check_compatible(mask.shape(), image.shape())?;
    if structure.is_empty() {
        return Err(Error::InvalidParameter {
            name: "structure",
            value: "0".to_string(),
            reason: "neighborhood must not be empty".to_string(),
        });
    }

    let len = image.len();
    for &seed in seeds {
        if seed >= len {
            return Err(Error::SeedOutOfRange { seed, len });
        }
    }

    let mask = mask.as_mut_slice()?;
    let img = image.as_mut_slice()?;

    // concentration is saturated outside the tissue
    for (m, px) in mask.iter().zip(img.iter_mut()) {
        if *m == 0 {
            *px = 1.0;
        }
    }

    tracing::debug!(
        seeds = seeds.len(),
        threshold = params.threshold,
        k = params.k,
        iterations = params.iterations,
        "diffusion flood"
    );

    for _ in 0..params.iterations {
        flood(mask, img, seeds, structure, params);
    }

    Ok(())
}

fn flood(mask: &mut [u8], img: &mut [f32], seeds: &[usize], structure: &[isize], params: &DiffuseParams) {
    let mut heap = VoxelHeap::with_capacity(seeds.len() * structure.len());
    for &seed in seeds {
        img[seed] = 1.0;
        heap.push(Heapitem {
            value: 1.0,
            age: 0,
            index: seed,
            source: seed,
        });
    }
    let mut age: u64 = 0;

    while let Some(elem) = heap.pop() {
        let mut sum = 0.0f64;
        for &offset in structure {
            let n = (elem.index as isize + offset) as usize;
            sum += img[n] as f64;
        }
        let mean = sum / structure.len() as f64;
        let value = (mean * params.k + img[elem.index] as f64) / 2.0;

        if value < params.threshold {
            continue;
        }
        img[elem.index] = value as f32;

        for &offset in structure {
            let n = (elem.index as isize + offset) as usize;
            if mask[n] != 1 {
                continue;
            }
            mask[n] = 2;
            age += 1;
            heap.push(Heapitem {
                value,
                age,
                index: n,
                source: elem.source,
            });
        }
    }

    // the in-band in-queue flag must not leak
    for m in mask.iter_mut() {
        if *m == 2 {
            *m = 1;
        }
    }
}
