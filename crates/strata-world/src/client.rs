//! Per-client view of the world.

use glam::Vec3;
use serde::{Deserialize, Serialize};
use strata_common::{ChunkCoord, ClientId, VoxelPos};

/// Where a client is and how far it sees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClientView {
    /// Client identity
    pub id: ClientId,
    /// Position in world units
    pub position: Vec3,
    /// Render radius in chunks
    pub render_radius: u32,
}

impl ClientView {
    /// Creates a view.
    #[must_use]
    pub const fn new(id: ClientId, position: Vec3, render_radius: u32) -> Self {
        Self {
            id,
            position,
            render_radius,
        }
    }

    /// Voxel containing the client.
    #[must_use]
    pub fn voxel(&self, dimension: f32) -> VoxelPos {
        VoxelPos::from_world(self.position, dimension)
    }

    /// Chunk containing the client.
    #[must_use]
    pub fn chunk(&self, chunk_size: u32, dimension: f32) -> ChunkCoord {
        self.voxel(dimension).to_chunk_coord(chunk_size)
    }
}
