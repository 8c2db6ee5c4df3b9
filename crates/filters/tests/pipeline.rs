//! End-to-end detection chain over mmap-backed volumes.
//!
//! Runs the filters in the order the cell-detection pipeline wires them:
//! background subtraction, double thresholding, connected components, size
//! filtering, overlap reconciliation, watershed, and diffusion shaping.
//! Every stage works on file-backed volumes in a temp dir, so the mmap
//! window path is exercised the way production data flows through it.

use voxseg_core::{Connectivity, ElementType, Shape, Volume, VolumeDescriptor};
use voxseg_filters::background::subtract_background;
use voxseg_filters::diffusion::{diffuse, DiffuseParams};
use voxseg_filters::elementwise::{
    max_projection, nonzero_coords, standardize_descriptors, threshold_descriptors,
};
use voxseg_filters::label::{connect, overlap, size_filter, watershed, WatershedParams};

const SHAPE: Shape = Shape::new(8, 48, 48);

/// Two bright cells and one faint one on a flat background. All three stay
/// strictly inside the volume border, where the watershed mask contract
/// requires zeros.
const CELL_A: (usize, usize, usize) = (3, 14, 14);
const CELL_B: (usize, usize, usize) = (4, 34, 34);
const FAINT_C: (usize, usize, usize) = (4, 24, 24);

fn blob(center: (usize, usize, usize), at: (usize, usize, usize), radius: f64) -> bool {
    let dz = center.0 as f64 - at.0 as f64;
    let dy = center.1 as f64 - at.1 as f64;
    let dx = center.2 as f64 - at.2 as f64;
    (dz * dz + dy * dy + dx * dx).sqrt() <= radius
}

/// Build the raw stack on disk and return its descriptor.
fn write_source(dir: &std::path::Path) -> VolumeDescriptor {
    let path = dir.join("raw.u16");
    let mut volume: Volume<u16> = Volume::create(&path, SHAPE).unwrap();
    let data = volume.as_mut_slice().unwrap();

    for z in 0..SHAPE.z {
        for y in 0..SHAPE.y {
            for x in 0..SHAPE.x {
                let at = (z, y, x);
                let mut value = 100u16;
                if blob(CELL_A, at, 2.0) || blob(CELL_B, at, 2.0) {
                    value += 500;
                } else if blob(FAINT_C, at, 1.5) {
                    value += 60;
                }
                data[SHAPE.ravel(z, y, x)] = value;
            }
        }
    }
    volume.flush().unwrap();
    volume.descriptor().unwrap()
}

fn zero_borders(mask: &mut Volume<u8>) {
    let shape = mask.shape();
    let data = mask.as_mut_slice().unwrap();
    for z in 0..shape.z {
        for y in 0..shape.y {
            for x in 0..shape.x {
                if z == 0
                    || y == 0
                    || x == 0
                    || z == shape.z - 1
                    || y == shape.y - 1
                    || x == shape.x - 1
                {
                    data[shape.ravel(z, y, x)] = 0;
                }
            }
        }
    }
}

#[test]
fn detection_chain_over_mapped_volumes() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_source(dir.path());

    // --- background subtraction, in place on the mapped file
    {
        let mut raw: Volume<u16> = Volume::open_mut(&source).unwrap();
        subtract_background(&mut raw, 10.0).unwrap();
        raw.flush().unwrap();
    }
    {
        let raw: Volume<u16> = Volume::open(&source).unwrap();
        let flat = raw.as_slice()[SHAPE.ravel(0, 5, 5)];
        assert!(flat <= 2, "background survived subtraction: {}", flat);
        let peak = raw.as_slice()[SHAPE.ravel(CELL_A.0, CELL_A.1, CELL_A.2)];
        assert!(peak >= 400, "cell flattened by subtraction: {}", peak);
    }

    // --- double threshold through the descriptor boundary
    let hi_desc = VolumeDescriptor::new(dir.path().join("hi.u8"), 0, SHAPE, ElementType::U8);
    let lo_desc = VolumeDescriptor::new(dir.path().join("lo.u8"), 0, SHAPE, ElementType::U8);
    Volume::<u8>::create(&hi_desc.path, SHAPE).unwrap();
    Volume::<u8>::create(&lo_desc.path, SHAPE).unwrap();
    threshold_descriptors(&source, &hi_desc, 250.0).unwrap();
    threshold_descriptors(&source, &lo_desc, 30.0).unwrap();

    // --- connected components on both thresholds
    let hi_mask: Volume<u8> = Volume::open(&hi_desc).unwrap();
    let lo_mask: Volume<u8> = Volume::open(&lo_desc).unwrap();

    let mut labels_hi: Volume<i32> =
        Volume::create(dir.path().join("labels_hi.i32"), SHAPE).unwrap();
    let mut labels_lo: Volume<i32> =
        Volume::create(dir.path().join("labels_lo.i32"), SHAPE).unwrap();
    connect(&hi_mask, &mut labels_hi).unwrap();
    connect(&lo_mask, &mut labels_lo).unwrap();

    let a_index = SHAPE.ravel(CELL_A.0, CELL_A.1, CELL_A.2);
    let b_index = SHAPE.ravel(CELL_B.0, CELL_B.1, CELL_B.2);
    let c_index = SHAPE.ravel(FAINT_C.0, FAINT_C.1, FAINT_C.2);

    let label_a = labels_hi.as_slice()[a_index];
    let label_b = labels_hi.as_slice()[b_index];
    assert!(label_a > 0 && label_b > 0);
    assert_ne!(label_a, label_b, "separate cells must get separate labels");
    assert_eq!(
        labels_hi.as_slice()[c_index], 0,
        "faint cell must not pass the high threshold"
    );
    assert!(labels_lo.as_slice()[c_index] > 0);

    // --- size filter the confident labels
    let mut filtered: Volume<i32> =
        Volume::create(dir.path().join("filtered.i32"), SHAPE).unwrap();
    let report = size_filter(&labels_hi, &mut filtered, 10, 10_000).unwrap();
    assert_eq!(report.total_labels, 2);
    assert_eq!(report.counts.len(), 2);
    assert!(report.counts.values().all(|&count| count >= 10));

    // --- overlap: low-threshold components survive only over confident ones
    let mut reconciled: Volume<i32> =
        Volume::create(dir.path().join("reconciled.i32"), SHAPE).unwrap();
    overlap(&filtered, &labels_lo, &mut reconciled).unwrap();
    assert_eq!(
        reconciled.as_slice()[a_index],
        labels_lo.as_slice()[a_index]
    );
    assert_eq!(
        reconciled.as_slice()[c_index], 0,
        "faint cell must be dropped by overlap"
    );

    // --- seeds for the watershed come from the filtered labels
    let seeds_volume = nonzero_coords(&filtered, dir.path().join("seeds.i64")).unwrap();
    let seeds: Vec<usize> = seeds_volume
        .as_slice()
        .iter()
        .map(|&index| index as usize)
        .collect();
    assert_eq!(seeds.len() as u64, report.counts.values().sum::<u64>());

    // --- watershed floods the confident labels over the low mask
    let structure = Connectivity::TwentySix.raveled_offsets(&SHAPE);
    let mut flood_mask: Volume<u8> =
        Volume::create(dir.path().join("flood_mask.u8"), SHAPE).unwrap();
    flood_mask
        .as_mut_slice()
        .unwrap()
        .iter_mut()
        .zip(lo_mask.as_slice())
        .for_each(|(out, &m)| *out = u8::from(m != 0));
    zero_borders(&mut flood_mask);

    let mut basins: Volume<i32> = Volume::create(dir.path().join("basins.i32"), SHAPE).unwrap();
    basins
        .as_mut_slice()
        .unwrap()
        .copy_from_slice(filtered.as_slice());

    let raw: Volume<u16> = Volume::open(&source).unwrap();
    watershed(
        &raw,
        &seeds,
        &structure,
        &mut flood_mask,
        &mut basins,
        &WatershedParams::default(),
    )
    .unwrap();

    assert_eq!(basins.as_slice()[a_index], label_a);
    assert_eq!(basins.as_slice()[b_index], label_b);
    // the faint cell's component carries no seed: it stays unlabelled
    assert_eq!(basins.as_slice()[c_index], 0);
    // seeded components are fully covered
    for (i, &m) in flood_mask.as_slice().iter().enumerate() {
        let label = basins.as_slice()[i];
        if m != 0 && label != 0 {
            assert!(label == label_a || label == label_b);
        }
    }

    // --- QC projection: both cells must show up in the flattened view
    let mut qc: Volume<u16> =
        Volume::create(dir.path().join("qc.u16"), Shape::new(1, SHAPE.y, SHAPE.x)).unwrap();
    max_projection(&raw, &mut qc).unwrap();
    assert!(qc.as_slice()[CELL_A.1 * SHAPE.x + CELL_A.2] >= 400);
    assert!(qc.as_slice()[CELL_B.1 * SHAPE.x + CELL_B.2] >= 400);

    // --- standardize through the descriptor boundary
    let std_desc = VolumeDescriptor::new(dir.path().join("std.f32"), 0, SHAPE, ElementType::F32);
    Volume::<f32>::create(&std_desc.path, SHAPE).unwrap();
    let (_, std) = standardize_descriptors(&source, &std_desc).unwrap();
    assert!(std > 0.0);
    let standardized: Volume<f32> = Volume::open(&std_desc).unwrap();
    let n = standardized.len() as f64;
    let mean: f64 = standardized.as_slice().iter().map(|&v| v as f64).sum::<f64>() / n;
    assert!(mean.abs() < 1e-4);

    // --- diffusion shapes a soft region around the first cell
    let mut tissue: Volume<u8> = Volume::create(dir.path().join("tissue.u8"), SHAPE).unwrap();
    tissue.as_mut_slice().unwrap().fill(1);
    zero_borders(&mut tissue);
    let mut concentration: Volume<f32> =
        Volume::create(dir.path().join("concentration.f32"), SHAPE).unwrap();

    diffuse(
        &mut tissue,
        &mut concentration,
        &[a_index],
        &structure,
        &DiffuseParams {
            threshold: 0.2,
            k: 1.0,
            iterations: 1,
        },
    )
    .unwrap();

    assert!(tissue.as_slice().iter().all(|&m| m != 2));
    let max = concentration
        .as_slice()
        .iter()
        .cloned()
        .fold(f32::MIN, f32::max);
    assert_eq!(max, 1.0);
    for &v in concentration.as_slice() {
        if v != 0.0 {
            assert!(v >= 0.2);
        }
    }
}
