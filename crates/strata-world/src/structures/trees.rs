//! Trees with layered canopies.

use noise::Perlin;
use strata_common::{BlockId, VoxelPos};

use super::{column_rng, fractal, plantable_blocks, surface, PeakField};
use crate::blocks::{names, BlockError, BlockRegistry};
use crate::builder::{Neighborhood, StructureGenerator, VoxelUpdate};

const PLACEMENT_FREQUENCY: f64 = 0.21;
const PLACEMENT_THRESHOLD: f64 = 0.1;
const CANOPY_FREQUENCY: f64 = 0.137;
const AUTUMN_FREQUENCY: f64 = 0.0073;
const SALT: u64 = 0x7472_6565_73;

/// Places trees on plantable surface columns that are local peaks of a
/// placement field.
///
/// A trunk of 2 or 3 blocks carries a canopy of alternating radius 1 and 2
/// layers, so canopies reach up to 2 voxels into adjacent chunks.
pub struct Trees {
    seed: u32,
    placement: PeakField,
    canopy: Perlin,
    autumn: Perlin,
    plantable: Vec<BlockId>,
    trunk: BlockId,
    leaves: BlockId,
    leaves_orange: BlockId,
}

impl Trees {
    /// Resolves trunk and leaf blocks from the registry.
    pub fn new(registry: &BlockRegistry, seed: u32) -> Result<Self, BlockError> {
        Ok(Self {
            seed,
            placement: PeakField::new(
                seed.wrapping_add(20),
                PLACEMENT_FREQUENCY,
                PLACEMENT_THRESHOLD,
            ),
            canopy: Perlin::new(seed.wrapping_add(21)),
            autumn: Perlin::new(seed.wrapping_add(22)),
            plantable: plantable_blocks(registry),
            trunk: registry.require(names::TRUNK)?,
            leaves: registry.require(names::LEAVES)?,
            leaves_orange: registry.require(names::LEAVES_ORANGE)?,
        })
    }

    fn tree(&self, vx: i32, top: i32, vz: i32, updates: &mut Vec<VoxelUpdate>) {
        let mut rng = column_rng(self.seed, vx, vz, SALT);
        let height: i32 = if rng.bool() { 3 } else { 2 };
        let bush_height = match rng.u8(0..10) {
            0 => 8,
            1..=2 => 5,
            _ => height,
        };

        let autumn = fractal(
            &self.autumn,
            [f64::from(vx), 0.0, f64::from(vz)],
            AUTUMN_FREQUENCY,
            1,
        ) > 0.1;
        let leaves = if autumn { self.leaves_orange } else { self.leaves };

        let base = top + 1;
        for dy in 0..height {
            updates.push(VoxelUpdate::new(VoxelPos::new(vx, base + dy, vz), self.trunk));
        }

        let crown = base + height;
        let wide_phase = if height == 2 { 0 } else { 2 };
        for j in 0..=bush_height {
            let wide = j % 3 == 1 || (j % 3 == wide_phase && j != bush_height);
            let limit: i32 = if wide { 2 } else { 1 };

            for i in -limit..=limit {
                for k in -limit..=limit {
                    if i.abs() == limit && k.abs() == limit {
                        continue;
                    }
                    let center = i == 0 && k == 0;
                    let position = VoxelPos::new(vx + i, crown + j, vz + k);
                    if !center && self.is_gap(position) {
                        continue;
                    }
                    let block = if center && j != bush_height {
                        self.trunk
                    } else {
                        leaves
                    };
                    updates.push(VoxelUpdate::new(position, block));
                }
            }
        }
    }

    fn is_gap(&self, position: VoxelPos) -> bool {
        let point = [
            f64::from(position.x),
            f64::from(position.y),
            f64::from(position.z),
        ];
        fractal(&self.canopy, point, CANOPY_FREQUENCY, 4) > 0.4
    }
}

impl StructureGenerator for Trees {
    fn name(&self) -> &str {
        "trees"
    }

    fn generate(&self, neighborhood: &Neighborhood<'_>) -> Vec<VoxelUpdate> {
        let mut updates = Vec::new();
        for (vx, top, vz) in surface(neighborhood) {
            let stand = neighborhood.voxel(VoxelPos::new(vx, top, vz));
            if self.plantable.contains(&stand) && self.placement.is_peak(vx, vz) {
                self.tree(vx, top, vz, &mut updates);
            }
        }
        updates
    }
}
