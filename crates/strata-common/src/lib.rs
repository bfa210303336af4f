//! # Strata Common
//!
//! Common types shared by the Strata world server crates:
//! - Coordinate types (voxel, chunk, local)
//! - ID types (ClientId, BlockId)
//! - Error types
//! - Prelude for convenient imports

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod coords;
pub mod error;
pub mod ids;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::coords::*;
    pub use crate::error::*;
    pub use crate::ids::*;
}

pub use prelude::*;

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_voxel_to_chunk_conversion() {
        let voxel = VoxelPos::new(100, 5, 200);
        assert_eq!(voxel.to_chunk_coord(32), ChunkCoord::new(3, 6));
        assert_eq!(voxel.to_local(32), LocalPos::new(4, 5, 8));
    }

    #[test]
    fn test_negative_voxels_map_to_negative_chunks() {
        let voxel = VoxelPos::new(-1, 0, -16);
        assert_eq!(voxel.to_chunk_coord(16), ChunkCoord::new(-1, -1));
        assert_eq!(voxel.to_local(16), LocalPos::new(15, 0, 0));

        let voxel = VoxelPos::new(-17, 0, 0);
        assert_eq!(voxel.to_chunk_coord(16), ChunkCoord::new(-2, 0));
    }

    #[test]
    fn test_world_to_voxel_uses_dimension() {
        let voxel = VoxelPos::from_world(Vec3::new(1.5, 3.0, -0.5), 0.5);
        assert_eq!(voxel, VoxelPos::new(3, 6, -1));
    }

    #[test]
    fn test_chunk_name_round_trip() {
        let coord = ChunkCoord::new(-4, 17);
        assert_eq!(coord.name(), "-4|17");
        assert_eq!(ChunkCoord::from_name(&coord.name()), Some(coord));
        assert_eq!(ChunkCoord::from_name("nope"), None);
    }

    #[test]
    fn test_neighbor_offsets_are_symmetric() {
        for (i, (dx, dz)) in NEIGHBOR_OFFSETS.iter().enumerate() {
            let (ox, oz) = NEIGHBOR_OFFSETS[opposite_neighbor(i)];
            assert_eq!((ox, oz), (-dx, -dz));
        }
    }

    #[test]
    fn test_client_id_generation() {
        let id1 = ClientId::new();
        let id2 = ClientId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_block_id_air() {
        assert!(BlockId::AIR.is_empty());
        assert!(BlockId::default().is_empty());
        assert!(!BlockId::new(3).is_empty());
    }
}
