//! Lamp markers.

use strata_common::{BlockId, VoxelPos};

use super::{plantable_blocks, surface, PeakField};
use crate::blocks::{names, BlockError, BlockRegistry};
use crate::builder::{Neighborhood, StructureGenerator, VoxelUpdate};

const PLACEMENT_FREQUENCY: f64 = 0.053;
const PLACEMENT_THRESHOLD: f64 = 0.3;

/// Replaces the surface block with a lamp at sparse peaks of a placement field.
pub struct Lamps {
    placement: PeakField,
    plantable: Vec<BlockId>,
    lamp: BlockId,
}

impl Lamps {
    /// Resolves the lamp block from the registry.
    pub fn new(registry: &BlockRegistry, seed: u32) -> Result<Self, BlockError> {
        Ok(Self {
            placement: PeakField::new(
                seed.wrapping_add(30),
                PLACEMENT_FREQUENCY,
                PLACEMENT_THRESHOLD,
            ),
            plantable: plantable_blocks(registry),
            lamp: registry.require(names::LAMP)?,
        })
    }
}

impl StructureGenerator for Lamps {
    fn name(&self) -> &str {
        "lamps"
    }

    fn generate(&self, neighborhood: &Neighborhood<'_>) -> Vec<VoxelUpdate> {
        surface(neighborhood)
            .into_iter()
            .filter(|&(vx, top, vz)| {
                self.plantable
                    .contains(&neighborhood.voxel(VoxelPos::new(vx, top, vz)))
                    && self.placement.is_peak(vx, vz)
            })
            .map(|(vx, top, vz)| VoxelUpdate::new(VoxelPos::new(vx, top, vz), self.lamp))
            .collect()
    }
}
