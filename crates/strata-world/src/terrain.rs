//! Terrain generation capability.
//!
//! [`TerrainGenerator`] is the seam the chunk registry calls to populate a
//! chunk's voxel volume. Implementations must be deterministic in the chunk
//! coordinate. [`NoiseTerrain`] is the default Perlin heightfield.

use noise::{NoiseFn, Perlin};
use serde::{Deserialize, Serialize};
use strata_common::{BlockId, ChunkCoord, TerrainError};

use crate::blocks::{names, BlockError, BlockRegistry};
use crate::chunk::ChunkVolume;
use crate::config::WorldConfig;

/// Populates a chunk's voxel volume.
///
/// Called on a blocking worker thread with exclusive access to the volume,
/// which is zero-filled on entry. An error leaves the chunk ungenerated so a
/// later load cycle retries it.
pub trait TerrainGenerator: Send + Sync {
    /// Fills `volume` for the chunk at `coord`.
    fn generate(&self, coord: ChunkCoord, volume: &mut ChunkVolume) -> Result<(), TerrainError>;
}

impl<F> TerrainGenerator for F
where
    F: Fn(ChunkCoord, &mut ChunkVolume) -> Result<(), TerrainError> + Send + Sync,
{
    fn generate(&self, coord: ChunkCoord, volume: &mut ChunkVolume) -> Result<(), TerrainError> {
        self(coord, volume)
    }
}

/// Heightfield shaping parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainConfig {
    /// Mean surface height in voxels
    pub base_height: u32,
    /// Maximum deviation from the base height
    pub height_variation: f64,
    /// Horizontal scale of the main noise (larger = smoother)
    pub terrain_scale: f64,
    /// Weight of the high-frequency detail noise
    pub detail_weight: f64,
    /// Air below this height is filled with water
    pub sea_level: u32,
    /// Soil depth above stone
    pub dirt_depth: u32,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            base_height: 44,
            height_variation: 16.0,
            terrain_scale: 96.0,
            detail_weight: 0.15,
            sea_level: 40,
            dirt_depth: 3,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct TerrainBlocks {
    stone: BlockId,
    dirt: BlockId,
    grass: BlockId,
    sand: BlockId,
    water: BlockId,
}

/// Perlin heightfield terrain: stone, a soil layer, grass or sand on top,
/// and water up to sea level.
pub struct NoiseTerrain {
    config: TerrainConfig,
    chunk_size: u32,
    max_height: u32,
    terrain_noise: Perlin,
    detail_noise: Perlin,
    blocks: TerrainBlocks,
}

impl NoiseTerrain {
    /// Creates a generator for the given world, resolving its blocks by name.
    pub fn new(world: &WorldConfig, registry: &BlockRegistry) -> Result<Self, BlockError> {
        let blocks = TerrainBlocks {
            stone: registry.require(names::STONE)?,
            dirt: registry.require(names::DIRT)?,
            grass: registry.require(names::GRASS_BLOCK)?,
            sand: registry.require(names::SAND)?,
            water: registry.require(names::WATER)?,
        };

        Ok(Self {
            config: world.terrain.clone(),
            chunk_size: world.chunk_size,
            max_height: world.max_height,
            terrain_noise: Perlin::new(world.seed),
            detail_noise: Perlin::new(world.seed.wrapping_add(1)),
            blocks,
        })
    }

    /// Surface height (topmost solid voxel) for an absolute column.
    #[must_use]
    pub fn surface_height(&self, vx: i32, vz: i32) -> u32 {
        let wx = f64::from(vx) / self.config.terrain_scale;
        let wz = f64::from(vz) / self.config.terrain_scale;

        let height = self.terrain_noise.get([wx, wz]);
        let detail = self.detail_noise.get([wx * 4.0, wz * 4.0]) * self.config.detail_weight;
        let offset = (height + detail) * self.config.height_variation;

        (f64::from(self.config.base_height) + offset).round().max(1.0) as u32
    }
}

impl TerrainGenerator for NoiseTerrain {
    fn generate(&self, coord: ChunkCoord, volume: &mut ChunkVolume) -> Result<(), TerrainError> {
        let size = volume.size();
        let expected =
            (self.chunk_size as usize) * (self.chunk_size as usize) * (self.max_height as usize);
        if size != self.chunk_size || volume.max_height() != self.max_height {
            return Err(TerrainError::VolumeMismatch {
                expected,
                actual: volume.len(),
            });
        }

        let top_limit = volume.max_height().saturating_sub(1);
        let sea_level = self.config.sea_level.min(top_limit);
        let origin = coord.min_voxel(size);

        for x in 0..size {
            for z in 0..size {
                let surface = self
                    .surface_height(origin.x + x as i32, origin.z + z as i32)
                    .min(top_limit);
                let soil_start = surface.saturating_sub(self.config.dirt_depth);

                volume.fill_column(x, z, 0..soil_start, self.blocks.stone);
                volume.fill_column(x, z, soil_start..surface, self.blocks.dirt);

                let top = if surface <= sea_level + 1 {
                    self.blocks.sand
                } else {
                    self.blocks.grass
                };
                volume.fill_column(x, z, surface..surface + 1, top);

                if surface < sea_level {
                    volume.fill_column(x, z, surface + 1..sea_level + 1, self.blocks.water);
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_common::LocalPos;

    fn terrain(seed: u32) -> NoiseTerrain {
        let config = WorldConfig {
            seed,
            ..WorldConfig::default()
        };
        NoiseTerrain::new(&config, &BlockRegistry::default()).expect("terrain")
    }

    fn generated(terrain: &NoiseTerrain, coord: ChunkCoord) -> ChunkVolume {
        let mut volume = ChunkVolume::new(16, 128);
        terrain.generate(coord, &mut volume).expect("generate");
        volume
    }

    #[test]
    fn test_generation_deterministic() {
        let coord = ChunkCoord::new(3, -2);
        let a = generated(&terrain(42), coord);
        let b = generated(&terrain(42), coord);
        assert_eq!(a, b);
    }

    #[test]
    fn test_different_seeds_different_terrain() {
        let coord = ChunkCoord::new(5, 5);
        let a = generated(&terrain(42), coord);
        let b = generated(&terrain(999), coord);
        assert_ne!(a, b);
    }

    #[test]
    fn test_columns_are_layered() {
        let registry = BlockRegistry::default();
        let gen = terrain(7);
        let volume = generated(&gen, ChunkCoord::new(0, 0));
        let stone = registry.id_of(names::STONE).expect("stone");

        for x in 0..16 {
            for z in 0..16 {
                let top = volume.column_top(x, z).expect("non-empty column");
                assert!(top < 128);
                assert_eq!(volume.get(LocalPos::new(x, 0, z)), stone);
            }
        }
    }

    #[test]
    fn test_columns_seamless_across_chunks() {
        let gen = terrain(11);
        let left = generated(&gen, ChunkCoord::new(0, 0));
        let right = generated(&gen, ChunkCoord::new(1, 0));
        let edge = gen.surface_height(15, 4);
        let across = gen.surface_height(16, 4);

        assert!(edge.abs_diff(across) <= 2);
        assert!(left.column_top(15, 4).is_some());
        assert!(right.column_top(0, 4).is_some());
    }

    #[test]
    fn test_volume_mismatch_reported() {
        let gen = terrain(1);
        let mut volume = ChunkVolume::new(8, 128);
        assert!(matches!(
            gen.generate(ChunkCoord::new(0, 0), &mut volume),
            Err(TerrainError::VolumeMismatch {
                expected: 32768,
                actual: 8192
            })
        ));
    }
}
