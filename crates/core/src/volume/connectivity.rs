//! 3D neighborhood structures over raveled volumes

use super::Shape;

/// Voxel neighborhood connectivity in three dimensions.
///
/// `Six` reaches face neighbors, `Eighteen` adds edge neighbors, and
/// `TwentySix` the full 3x3x3 shell. Offsets are emitted in `(dz, dy, dx)`
/// lexicographic order with the center excluded, so a given connectivity
/// always yields the same structure array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
    Six,
    Eighteen,
    TwentySix,
}

impl Connectivity {
    /// Largest `|dz| + |dy| + |dx|` reached by this neighborhood
    const fn reach(self) -> isize {
        match self {
            Connectivity::Six => 1,
            Connectivity::Eighteen => 2,
            Connectivity::TwentySix => 3,
        }
    }

    /// Number of neighbors
    pub const fn num_neighbors(self) -> usize {
        match self {
            Connectivity::Six => 6,
            Connectivity::Eighteen => 18,
            Connectivity::TwentySix => 26,
        }
    }

    /// Coordinate offsets of every neighbor, center excluded
    pub fn offsets(self) -> Vec<(isize, isize, isize)> {
        let reach = self.reach();
        let mut offsets = Vec::with_capacity(self.num_neighbors());

        for dz in -1isize..=1 {
            for dy in -1isize..=1 {
                for dx in -1isize..=1 {
                    if dz == 0 && dy == 0 && dx == 0 {
                        continue;
                    }
                    if dz.abs() + dy.abs() + dx.abs() <= reach {
                        offsets.push((dz, dy, dx));
                    }
                }
            }
        }

        offsets
    }

    /// Signed raveled offsets for a volume of the given shape.
    ///
    /// This is the `structure` array the watershed and diffusion filters
    /// consume. Border voxels must be masked out by the caller; applying an
    /// offset to a border voxel indexes outside the volume.
    pub fn raveled_offsets(self, shape: &Shape) -> Vec<isize> {
        let [sz, sy, sx] = shape.strides();
        self.offsets()
            .into_iter()
            .map(|(dz, dy, dx)| dz * sz + dy * sy + dx * sx)
            .collect()
    }
}
