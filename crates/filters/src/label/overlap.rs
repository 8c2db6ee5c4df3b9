//! Two-threshold label reconciliation
//!
//! Keeps low-threshold components only where a high-confidence component
//! overlaps them: a component of `label_1` survives if any of its voxels
//! coincides with a non-zero voxel of `label_0`. The keep lookup is a dense
//! bit table grown to the observed label space.

use voxseg_core::{check_compatible, Error, Filter, Result, Volume};

/// Overlap filter
#[derive(Debug, Clone, Default)]
pub struct Overlap;

/// Parameters for overlap (none)
#[derive(Debug, Clone, Default)]
pub struct OverlapParams;

impl Filter for Overlap {
    type Input = (Volume<i32>, Volume<i32>, Volume<i32>);
    type Output = Volume<i32>;
    type Params = OverlapParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Overlap"
    }

    fn description(&self) -> &'static str {
        "Keep low-threshold labels that overlap high-confidence labels"
    }

    fn execute(&self, (label_0, label_1, mut output): Self::Input, _: OverlapParams) -> Result<Volume<i32>> {
        overlap(&label_0, &label_1, &mut output)?;
        Ok(output)
    }
}

/// Mark every `label_1` value that co-occurs with a non-zero `label_0` voxel.
fn keep_table(label_0: &[i32], label_1: &[i32]) -> Vec<bool> {
    let mut keep: Vec<bool> = Vec::new();
    for (&hi, &lo) in label_0.iter().zip(label_1) {
        if hi != 0 && lo > 0 {
            let index = lo as usize;
            if index >= keep.len() {
                keep.resize(index + 1, false);
            }
            keep[index] = true;
        }
    }
    keep
}

fn apply_keep(label_1: &[i32], output: &mut [i32], keep: &[bool]) {
    for (out, &lo) in output.iter_mut().zip(label_1) {
        *out = if lo > 0 && keep.get(lo as usize).copied().unwrap_or(false) {
            lo
        } else {
            0
        };
    }
}

/// Reconcile `label_1` against `label_0` into `output`.
///
/// Every output voxel is either `label_1[i]` or `0`.
///
/// # Arguments
/// * `label_0` - High-confidence (size-filtered) label volume
/// * `label_1` - Low-threshold label volume
/// * `output` - Output label volume of identical shape
pub fn overlap(
    label_0: &Volume<i32>,
    label_1: &Volume<i32>,
    output: &mut Volume<i32>,
) -> Result<()> {
    check_compatible(label_0.shape(), label_1.shape())?;
    check_compatible(label_0.shape(), output.shape())?;

    let keep = keep_table(label_0.as_slice(), label_1.as_slice());
    apply_keep(label_1.as_slice(), output.as_mut_slice()?, &keep);

    tracing::debug!(
        shape = %label_0.shape(),
        kept = keep.iter().filter(|&&k| k).count(),
        "overlap reconciliation"
    );
    Ok(())
}

/// In-place variant of [`overlap`]; the keep table is complete before any
/// voxel of `label_1` is rewritten, so aliasing is safe.
pub fn overlap_in_place(label_0: &Volume<i32>, label_1: &mut Volume<i32>) -> Result<()> {
    check_compatible(label_0.shape(), label_1.shape())?;

    let keep = keep_table(label_0.as_slice(), label_1.as_slice());
    let data = label_1.as_mut_slice()?;
    for px in data.iter_mut() {
        if !(*px > 0 && keep.get(*px as usize).copied().unwrap_or(false)) {
            *px = 0;
        }
    }
    Ok(())
}
