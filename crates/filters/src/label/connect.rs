//! Slice-by-slice connected components
//!
//! Labels a binary 3D mask by running a 2D union-find labeller on each
//! Z-slice and stitching the per-slice labellings into one global labelling
//! through inter-slice equivalences: a forward lookup records, first writer
//! wins, which previous-slice label each new-slice component touches;
//! per-layer reverse lookups record the equivalences the forward remap could
//! not absorb; a final chain-chase flattens them across the whole stack.

use std::collections::HashMap;

use voxseg_core::{check_compatible, Error, Filter, Result, Volume, VolumeElement};

/// Connected-components stitcher
#[derive(Debug, Clone, Default)]
pub struct Connect;

/// Parameters for the stitcher (none)
#[derive(Debug, Clone, Default)]
pub struct ConnectParams;

impl Filter for Connect {
    type Input = (Volume<u8>, Volume<i32>);
    type Output = (Volume<i32>, i32);
    type Params = ConnectParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Connect"
    }

    fn description(&self) -> &'static str {
        "Label connected components of a binary mask slice by slice"
    }

    fn execute(&self, (mask, mut output): Self::Input, _: ConnectParams) -> Result<Self::Output> {
        let last_label = connect(&mask, &mut output)?;
        Ok((output, last_label))
    }
}

fn find(parent: &mut [i32], mut label: i32) -> i32 {
    // path halving
    while parent[label as usize] != label {
        let grand = parent[parent[label as usize] as usize];
        parent[label as usize] = grand;
        label = grand;
    }
    label
}

fn union(parent: &mut [i32], a: i32, b: i32) {
    let root_a = find(parent, a);
    let root_b = find(parent, b);
    if root_a == root_b {
        return;
    }
    let (lo, hi) = if root_a < root_b {
        (root_a, root_b)
    } else {
        (root_b, root_a)
    };
    parent[hi as usize] = lo;
}

/// Two-pass 8-connected labeller for one plane.
///
/// Writes consecutive labels `1..=count` into `labels` and returns `count`.
pub fn label_plane<T: VolumeElement>(
    mask: &[T],
    rows: usize,
    cols: usize,
    labels: &mut [i32],
) -> i32 {
    let zero = T::zero();
    let mut parent: Vec<i32> = vec![0];
    let mut next = 0i32;

    // first pass: provisional labels from the already-visited half of the
    // 8-neighborhood (W, NW, N, NE)
    for y in 0..rows {
        for x in 0..cols {
            let i = y * cols + x;
            if mask[i] == zero {
                labels[i] = 0;
                continue;
            }

            // already-visited half of the 8-neighborhood: W, NW, N, NE
            let mut seen = [0i32; 4];
            let mut seen_len = 0;
            if x > 0 {
                seen[seen_len] = labels[i - 1];
                seen_len += 1;
            }
            if y > 0 {
                if x > 0 {
                    seen[seen_len] = labels[i - cols - 1];
                    seen_len += 1;
                }
                seen[seen_len] = labels[i - cols];
                seen_len += 1;
                if x + 1 < cols {
                    seen[seen_len] = labels[i - cols + 1];
                    seen_len += 1;
                }
            }

            let mut best = 0i32;
            for &label in &seen[..seen_len] {
                if label > 0 && (best == 0 || label < best) {
                    best = label;
                }
            }

            if best == 0 {
                next += 1;
                parent.push(next);
                labels[i] = next;
            } else {
                labels[i] = best;
                for &label in &seen[..seen_len] {
                    if label > 0 && label != best {
                        union(&mut parent, best, label);
                    }
                }
            }
        }
    }

    // second pass: flatten and renumber consecutively
    let mut remap = vec![0i32; parent.len()];
    let mut count = 0i32;
    for label in 1..parent.len() as i32 {
        let root = find(&mut parent, label);
        if remap[root as usize] == 0 {
            count += 1;
            remap[root as usize] = count;
        }
        remap[label as usize] = remap[root as usize];
    }

    for label in labels.iter_mut() {
        if *label > 0 {
            *label = remap[*label as usize];
        }
    }

    count
}

/// Label the connected components of `mask` into `output`.
///
/// Slices are labelled independently in 2D (8-connected) and stitched along
/// Z by positionwise overlap. Returns the high-water-mark label id; the
/// label set of the output is a sparse subset of `[1, last_label]`.
///
/// # Arguments
/// * `mask` - Binary volume; non-zero voxels are foreground
/// * `output` - i32 label volume of identical shape
pub fn connect<T: VolumeElement>(mask: &Volume<T>, output: &mut Volume<i32>) -> Result<i32> {
    check_compatible(mask.shape(), output.shape())?;

    let shape = mask.shape();
    let (depth, rows, cols) = (shape.z, shape.y, shape.x);
    let plane = shape.plane_len();
    if depth == 0 || plane == 0 {
        return Ok(0);
    }

    let data = mask.as_slice();
    let out = output.as_mut_slice()?;

    // slice 0 is labelled straight into the output
    let mut last_label = label_plane(&data[..plane], rows, cols, &mut out[..plane]);

    let mut scratch = vec![0i32; plane];
    let mut reverse: Vec<HashMap<i32, i32>> = Vec::with_capacity(depth.saturating_sub(1));

    for z in 0..depth.saturating_sub(1) {
        let lower = (z + 1) * plane;
        let slice_count = label_plane(&data[lower..lower + plane], rows, cols, &mut scratch);
        if last_label as i64 + slice_count as i64 > i32::MAX as i64 {
            return Err(Error::LabelOverflow {
                value: last_label as u64 + slice_count as u64,
            });
        }

        // shift the fresh 2D labels to global ids in first-seen raveled order
        let mut new_ids: HashMap<i32, i32> = HashMap::new();
        {
            let below = &mut out[lower..lower + plane];
            for (out_px, &b) in below.iter_mut().zip(scratch.iter()) {
                *out_px = if b > 0 {
                    *new_ids.entry(b).or_insert_with(|| {
                        last_label += 1;
                        last_label
                    })
                } else {
                    0
                };
            }
        }

        let (head, tail) = out.split_at_mut(lower);
        let above = &head[z * plane..];
        let below = &mut tail[..plane];

        // forward lookup, first writer wins
        let mut lookup: HashMap<i32, i32> = HashMap::new();
        for (&a, &b) in above.iter().zip(below.iter()) {
            if a > 0 && b > 0 {
                lookup.entry(b).or_insert(a);
            }
        }

        // remap the new slice through the forward lookup
        for b in below.iter_mut() {
            if *b > 0 {
                if let Some(&mapped) = lookup.get(b) {
                    *b = mapped;
                }
            }
        }

        // reverse lookup for this layer: equivalences the remap left behind
        let mut layer: HashMap<i32, i32> = HashMap::new();
        for (&a, &b) in above.iter().zip(below.iter()) {
            if a > 0 && b > 0 && a != b {
                layer.entry(a).or_insert(b);
            }
        }
        reverse.push(layer);
    }

    // flatten: chase every recorded equivalence through the later layers
    let mut flat: HashMap<i32, i32> = HashMap::new();
    for z in 0..reverse.len() {
        for (&old, &first) in &reverse[z] {
            let mut resolved = first;
            for later in &reverse[z + 1..] {
                if let Some(&next) = later.get(&resolved) {
                    resolved = next;
                }
            }
            flat.insert(old, resolved);
        }
    }

    if !flat.is_empty() {
        for px in out.iter_mut() {
            if let Some(&mapped) = flat.get(px) {
                *px = mapped;
            }
        }
    }

    tracing::debug!(shape = %shape, last_label, merged = flat.len(), "connected components");
    Ok(last_label)
}
