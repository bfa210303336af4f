//! World façade.
//!
//! Bundles the block registry and the chunk registry and routes voxel
//! reads and writes. Gameplay code holds a [`World`]; the load algorithm and
//! chunk lifecycle live in [`Chunks`].

use std::sync::Arc;

use strata_common::{BlockId, ChunkCoord, VoxelPos, WorldResult};
use tracing::{info, trace};

use crate::blocks::{BlockError, BlockRegistry};
use crate::builder::Builder;
use crate::chunk::Chunk;
use crate::chunks::{ChunkStats, Chunks, LoadReport};
use crate::client::ClientView;
use crate::config::WorldConfig;
use crate::terrain::{NoiseTerrain, TerrainGenerator};

/// A voxel world.
#[derive(Debug)]
pub struct World {
    registry: BlockRegistry,
    chunks: Chunks,
}

impl World {
    /// Creates a world from explicit generators.
    #[must_use]
    pub fn new(
        config: WorldConfig,
        registry: BlockRegistry,
        terrain: Arc<dyn TerrainGenerator>,
        builder: Builder,
    ) -> Self {
        Self {
            registry,
            chunks: Chunks::new(config, terrain, builder),
        }
    }

    /// Creates a world with the built-in palette, noise terrain, and the
    /// standard decorations.
    pub fn standard(config: WorldConfig) -> Result<Self, BlockError> {
        Self::with_registry(config, BlockRegistry::default())
    }

    /// Creates a world with noise terrain and the standard decorations over
    /// a custom palette. The palette must define the blocks they place.
    pub fn with_registry(config: WorldConfig, registry: BlockRegistry) -> Result<Self, BlockError> {
        let terrain = NoiseTerrain::new(&config, &registry)?;
        let builder = Builder::standard(&registry, config.seed)?;
        info!(
            seed = config.seed,
            chunk_size = config.chunk_size,
            max_height = config.max_height,
            blocks = registry.len(),
            "World created"
        );
        Ok(Self::new(config, registry, Arc::new(terrain), builder))
    }

    /// World configuration.
    #[must_use]
    pub const fn config(&self) -> &WorldConfig {
        self.chunks.config()
    }

    /// Block types.
    #[must_use]
    pub const fn registry(&self) -> &BlockRegistry {
        &self.registry
    }

    /// The chunk registry.
    #[must_use]
    pub const fn chunks(&self) -> &Chunks {
        &self.chunks
    }

    /// Writes a block into an existing chunk.
    ///
    /// Fails with `VoxelWriteOutOfBounds` when no chunk holds the position or
    /// `y` is outside `[0, max_height)`.
    pub fn set_voxel(&self, position: VoxelPos, block: BlockId) -> WorldResult<()> {
        self.chunks.set_voxel(position, block)?;
        trace!(%position, %block, "Voxel set");
        Ok(())
    }

    /// Reads a block. `None` when no chunk holds the position.
    #[must_use]
    pub fn voxel(&self, position: VoxelPos) -> Option<BlockId> {
        self.chunks.voxel(position)
    }

    /// Height of the topmost non-empty voxel in the column `(vx, vz)`.
    #[must_use]
    pub fn max_height(&self, vx: i32, vz: i32) -> Option<u32> {
        self.chunks.max_height(vx, vz)
    }

    /// A fully built chunk, or `None` if it is not ready yet.
    #[must_use]
    pub fn get(&self, coord: ChunkCoord) -> Option<Arc<Chunk>> {
        self.chunks.get(coord)
    }

    /// A chunk in any stage.
    #[must_use]
    pub fn raw(&self, coord: ChunkCoord) -> Option<Arc<Chunk>> {
        self.chunks.raw(coord)
    }

    /// Loads the area around a client.
    pub async fn generate(&self, view: &ClientView) -> WorldResult<LoadReport> {
        self.chunks.generate(view).await
    }

    /// Resident chunk counts by stage.
    #[must_use]
    pub fn stats(&self) -> ChunkStats {
        self.chunks.stats()
    }
}
