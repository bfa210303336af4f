//! Ground cover: grasses and mushrooms.

use noise::Perlin;
use strata_common::{BlockId, VoxelPos};

use super::{column_rng, fractal, plantable_blocks, surface};
use crate::blocks::{names, BlockError, BlockRegistry};
use crate::builder::{Neighborhood, StructureGenerator, VoxelUpdate};

const DENSITY_FREQUENCY: f64 = 0.043;
const VARIETY_FREQUENCY: f64 = 0.091;
const PLANT_CHANCE: f32 = 0.3;
const SALT: u64 = 0x706C_616E_7473;

#[derive(Debug, Clone, Copy)]
struct PlantBlocks {
    dirt: BlockId,
    grass: BlockId,
    tan_grass: BlockId,
    brown_grass: BlockId,
    brown_mushroom: BlockId,
    red_mushroom: BlockId,
    tan_mushroom: BlockId,
}

/// Places a single plant on top of plantable surface blocks.
///
/// Plants cluster in patches of a low-frequency density field; the variety is
/// chosen from a second noise field, with brown grass and brown mushrooms
/// only growing on bare dirt.
pub struct Plants {
    seed: u32,
    density: Perlin,
    variety: Perlin,
    plantable: Vec<BlockId>,
    blocks: PlantBlocks,
}

impl Plants {
    /// Resolves the plant blocks from the registry.
    pub fn new(registry: &BlockRegistry, seed: u32) -> Result<Self, BlockError> {
        let blocks = PlantBlocks {
            dirt: registry.require(names::DIRT)?,
            grass: registry.require(names::GRASS)?,
            tan_grass: registry.require(names::TAN_GRASS)?,
            brown_grass: registry.require(names::BROWN_GRASS)?,
            brown_mushroom: registry.require(names::BROWN_MUSHROOM)?,
            red_mushroom: registry.require(names::RED_MUSHROOM)?,
            tan_mushroom: registry.require(names::TAN_MUSHROOM)?,
        };
        let plantable = plantable_blocks(registry);

        Ok(Self {
            seed,
            density: Perlin::new(seed.wrapping_add(10)),
            variety: Perlin::new(seed.wrapping_add(11)),
            plantable,
            blocks,
        })
    }

    fn variety(&self, position: VoxelPos, stand: BlockId) -> BlockId {
        let point = [
            f64::from(position.x),
            f64::from(position.y),
            f64::from(position.z),
        ];
        let on_dirt = stand == self.blocks.dirt;
        let sample = |scale: f64, octaves: u32| {
            fractal(&self.variety, point, VARIETY_FREQUENCY * scale, octaves)
        };

        if sample(2.46, 3) > 0.3 {
            self.blocks.red_mushroom
        } else if on_dirt && sample(10.852, 6) > 0.33 {
            self.blocks.brown_mushroom
        } else if sample(9.012, 4) > 0.3 {
            self.blocks.tan_grass
        } else if sample(6.45, 2) > 0.36 {
            self.blocks.tan_mushroom
        } else if on_dirt && sample(4.44, 1) > 0.25 {
            self.blocks.brown_grass
        } else {
            self.blocks.grass
        }
    }
}

impl StructureGenerator for Plants {
    fn name(&self) -> &str {
        "plants"
    }

    fn generate(&self, neighborhood: &Neighborhood<'_>) -> Vec<VoxelUpdate> {
        let mut updates = Vec::new();
        for (vx, top, vz) in surface(neighborhood) {
            let stand = neighborhood.voxel(VoxelPos::new(vx, top, vz));
            if !self.plantable.contains(&stand) {
                continue;
            }
            let density = fractal(
                &self.density,
                [f64::from(vx), 0.0, f64::from(vz)],
                DENSITY_FREQUENCY,
                3,
            );
            if density <= 0.0 || column_rng(self.seed, vx, vz, SALT).f32() >= PLANT_CHANCE {
                continue;
            }
            let position = VoxelPos::new(vx, top + 1, vz);
            updates.push(VoxelUpdate::new(position, self.variety(position, stand)));
        }
        updates
    }
}
