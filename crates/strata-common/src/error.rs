//! Error types for Strata.

use thiserror::Error;

use crate::coords::{ChunkCoord, VoxelPos};

/// World and chunk lifecycle errors.
#[derive(Debug, Error)]
pub enum WorldError {
    /// Two claims were made for the same coordinate
    #[error("Chunk {coord} was constructed twice")]
    ChunkCreationRace {
        /// Contested coordinate
        coord: ChunkCoord,
    },

    /// Terrain generation for a single chunk failed
    #[error("Terrain generation failed for chunk {coord}: {source}")]
    TerrainGenerationFailure {
        /// Chunk that failed
        coord: ChunkCoord,
        /// Underlying terrain error
        #[source]
        source: TerrainError,
    },

    /// Decoration was attempted while a neighbor still needs terrain
    #[error("Chunk {coord} cannot be decorated: neighbor {neighbor} is not terrain-ready")]
    DecorationPrecondition {
        /// Chunk being decorated
        coord: ChunkCoord,
        /// Neighbor that is missing or still needs terrain
        neighbor: ChunkCoord,
    },

    /// Height map requested before decoration finished
    #[error("Chunk {coord} has no height map before decoration")]
    HeightMapPrecondition {
        /// Chunk in question
        coord: ChunkCoord,
    },

    /// Voxel write outside any existing chunk or outside the height range
    #[error("Voxel write out of bounds at {position}")]
    VoxelWriteOutOfBounds {
        /// Target position
        position: VoxelPos,
    },
}

/// Errors reported by a terrain generator.
#[derive(Debug, Error)]
pub enum TerrainError {
    /// The supplied volume does not match the generator's expectations
    #[error("Volume mismatch: expected {expected} cells, got {actual}")]
    VolumeMismatch {
        /// Expected cell count
        expected: usize,
        /// Actual cell count
        actual: usize,
    },

    /// Generator-specific failure
    #[error("Terrain generator failed: {0}")]
    Failed(String),
}

/// Result type alias for world operations.
pub type WorldResult<T> = Result<T, WorldError>;
