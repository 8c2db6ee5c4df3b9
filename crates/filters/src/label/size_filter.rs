//! Label size filtering
//!
//! Keeps labelled components whose voxel count lies inside an inclusive
//! size window, and the `label_by_size` variant that rewrites every label
//! to its component size. Lookup tables are hash maps over the observed
//! label space; label identity is sparse and need not be dense.

use std::collections::HashMap;

use voxseg_core::{check_compatible, Error, Filter, Result, Volume};

use crate::maybe_rayon::*;

/// Result of a size-filter pass: how many distinct labels were observed,
/// and the voxel count of every label that was kept.
#[derive(Debug, Clone)]
pub struct SizeFilterReport {
    pub total_labels: usize,
    pub counts: HashMap<i32, u64>,
}

/// Parameters for size filtering
#[derive(Debug, Clone)]
pub struct SizeFilterParams {
    /// Inclusive lower bound on component voxel count
    pub min_size: u64,
    /// Inclusive upper bound on component voxel count
    pub max_size: u64,
}

impl Default for SizeFilterParams {
    fn default() -> Self {
        Self {
            min_size: 0,
            max_size: u64::MAX,
        }
    }
}

/// Size filter
#[derive(Debug, Clone, Default)]
pub struct SizeFilter;

impl Filter for SizeFilter {
    type Input = (Volume<i32>, Volume<i32>);
    type Output = (Volume<i32>, SizeFilterReport);
    type Params = SizeFilterParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "SizeFilter"
    }

    fn description(&self) -> &'static str {
        "Drop labelled components outside an inclusive size window"
    }

    fn execute(&self, (labels, mut output): Self::Input, params: Self::Params) -> Result<Self::Output> {
        let report = size_filter(&labels, &mut output, params.min_size, params.max_size)?;
        Ok((output, report))
    }
}

/// Histogram of voxel counts per non-zero label.
fn label_areas(data: &[i32]) -> HashMap<i32, u64> {
    let mut areas = HashMap::new();
    for &label in data {
        if label != 0 {
            *areas.entry(label).or_insert(0u64) += 1;
        }
    }
    areas
}

/// Decide which labels survive the window.
fn keep_table(areas: &HashMap<i32, u64>, min_size: u64, max_size: u64) -> HashMap<i32, u64> {
    areas
        .iter()
        .filter(|(_, &count)| min_size <= count && count <= max_size)
        .map(|(&label, &count)| (label, count))
        .collect()
}

/// Apply a keep table, writing `label` where kept and `0` elsewhere.
fn apply_keep(data: &[i32], output: &mut [i32], plane: usize, keep: &HashMap<i32, u64>) {
    output
        .par_chunks_mut(plane)
        .zip(data.par_chunks(plane))
        .for_each(|(out_plane, in_plane)| {
            for (out, &label) in out_plane.iter_mut().zip(in_plane) {
                *out = if label != 0 && keep.contains_key(&label) {
                    label
                } else {
                    0
                };
            }
        });
}

/// Filter `labels` by component size into `output`.
///
/// Components with voxel counts in `[min_size, max_size]` keep their label;
/// every other voxel becomes background.
///
/// # Arguments
/// * `labels` - Input label volume
/// * `output` - Output label volume of identical shape
/// * `min_size` - Inclusive lower voxel-count bound
/// * `max_size` - Inclusive upper voxel-count bound
pub fn size_filter(
    labels: &Volume<i32>,
    output: &mut Volume<i32>,
    min_size: u64,
    max_size: u64,
) -> Result<SizeFilterReport> {
    check_compatible(labels.shape(), output.shape())?;

    let data = labels.as_slice();
    let areas = label_areas(data);
    let keep = keep_table(&areas, min_size, max_size);
    let plane = labels.shape().plane_len().max(1);

    apply_keep(data, output.as_mut_slice()?, plane, &keep);

    tracing::debug!(
        shape = %labels.shape(),
        observed = areas.len(),
        kept = keep.len(),
        "size filter"
    );

    Ok(SizeFilterReport {
        total_labels: areas.len(),
        counts: keep,
    })
}

/// In-place variant of [`size_filter`]; the histogram pass runs before any
/// voxel is rewritten, so aliasing input and output is safe.
pub fn size_filter_in_place(
    labels: &mut Volume<i32>,
    min_size: u64,
    max_size: u64,
) -> Result<SizeFilterReport> {
    let areas = label_areas(labels.as_slice());
    let keep = keep_table(&areas, min_size, max_size);
    let plane = labels.shape().plane_len().max(1);

    let data = labels.as_mut_slice()?;
    data.par_chunks_mut(plane).for_each(|out_plane| {
        for label in out_plane.iter_mut() {
            if *label != 0 && !keep.contains_key(label) {
                *label = 0;
            }
        }
    });

    Ok(SizeFilterReport {
        total_labels: areas.len(),
        counts: keep,
    })
}

/// Rewrite every label to its component's voxel count.
///
/// Useful for picking size-window bounds: the output volume carries
/// component sizes where labels used to be.
pub fn label_by_size(labels: &Volume<i32>, output: &mut Volume<i32>) -> Result<()> {
    check_compatible(labels.shape(), output.shape())?;

    let data = labels.as_slice();
    let areas = label_areas(data);
    for &count in areas.values() {
        if count > i32::MAX as u64 {
            return Err(Error::LabelOverflow { value: count });
        }
    }

    let plane = labels.shape().plane_len().max(1);
    output
        .as_mut_slice()?
        .par_chunks_mut(plane)
        .zip(data.par_chunks(plane))
        .for_each(|(out_plane, in_plane)| {
            for (out, &label) in out_plane.iter_mut().zip(in_plane) {
                *out = if label != 0 {
                    areas[&label] as i32
                } else {
                    0
                };
            }
        });

    Ok(())
}
