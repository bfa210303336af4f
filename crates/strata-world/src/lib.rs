//! # Strata World
//!
//! World management for the Strata server.
//!
//! This crate handles:
//! - The chunk registry and its radius-based load algorithm
//! - Chunk lifecycle: terrain, decoration, height maps
//! - Terrain and structure generation
//! - Block types and world configuration

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod blocks;
pub mod builder;
pub mod chunk;
pub mod chunks;
pub mod client;
pub mod config;
pub mod structures;
pub mod terrain;
pub mod world;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::blocks::{BlockError, BlockRegistry, BlockType};
    pub use crate::builder::{BuildReport, Builder, Neighborhood, StructureGenerator, VoxelUpdate};
    pub use crate::chunk::{Chunk, ChunkStage, ChunkVolume, HeightMap, TerrainClaim};
    pub use crate::chunks::{ChunkStats, Chunks, LoadReport};
    pub use crate::client::ClientView;
    pub use crate::config::{ConfigError, WorldConfig, MIN_TERRAIN_MARGIN};
    pub use crate::terrain::{NoiseTerrain, TerrainConfig, TerrainGenerator};
    pub use crate::world::World;
}

pub use prelude::*;
