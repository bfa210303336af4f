//! Coordinate types for world, voxel, chunk, and local positions.

use std::fmt;

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Offsets of the 8 compass-adjacent chunks, ordered so that the opposite
/// of index `i` is `7 - i`.
pub const NEIGHBOR_OFFSETS: [(i32, i32); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

/// Returns the index in [`NEIGHBOR_OFFSETS`] pointing back from a neighbor.
#[must_use]
pub const fn opposite_neighbor(index: usize) -> usize {
    7 - index
}

/// Absolute voxel coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct VoxelPos {
    /// X coordinate in voxel space
    pub x: i32,
    /// Y coordinate (height) in voxel space
    pub y: i32,
    /// Z coordinate in voxel space
    pub z: i32,
}

impl VoxelPos {
    /// Creates a new voxel position.
    #[must_use]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Maps a world-space position to the voxel containing it.
    ///
    /// `dimension` is the edge length of one voxel in world units.
    #[must_use]
    pub fn from_world(position: Vec3, dimension: f32) -> Self {
        let scaled = (position / dimension).floor();
        Self {
            x: scaled.x as i32,
            y: scaled.y as i32,
            z: scaled.z as i32,
        }
    }

    /// Converts to the coordinate of the owning chunk.
    #[must_use]
    pub const fn to_chunk_coord(self, chunk_size: u32) -> ChunkCoord {
        let size = chunk_size as i32;
        ChunkCoord {
            x: self.x.div_euclid(size),
            z: self.z.div_euclid(size),
        }
    }

    /// Converts to a position local to the owning chunk.
    ///
    /// The `y` component is passed through unchanged; callers check it
    /// against the chunk height.
    #[must_use]
    pub const fn to_local(self, chunk_size: u32) -> LocalPos {
        let size = chunk_size as i32;
        LocalPos {
            x: self.x.rem_euclid(size) as u32,
            y: self.y as u32,
            z: self.z.rem_euclid(size) as u32,
        }
    }

    /// Returns this position shifted by the given deltas.
    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            z: self.z + dz,
        }
    }
}

impl fmt::Display for VoxelPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Chunk coordinate (identifies a column of voxels in the world grid).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct ChunkCoord {
    /// X coordinate in chunk space
    pub x: i32,
    /// Z coordinate in chunk space
    pub z: i32,
}

impl ChunkCoord {
    /// Creates a new chunk coordinate.
    #[must_use]
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Returns the stable name of this chunk, `"x|z"`.
    #[must_use]
    pub fn name(self) -> String {
        format!("{}|{}", self.x, self.z)
    }

    /// Parses a name produced by [`ChunkCoord::name`].
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let (x, z) = name.split_once('|')?;
        Some(Self::new(x.parse().ok()?, z.parse().ok()?))
    }

    /// Returns the coordinate shifted by the given chunk offsets.
    #[must_use]
    pub const fn offset(self, dx: i32, dz: i32) -> Self {
        Self {
            x: self.x + dx,
            z: self.z + dz,
        }
    }

    /// Returns the 8 adjacent coordinates in [`NEIGHBOR_OFFSETS`] order.
    #[must_use]
    pub fn neighbors(self) -> [Self; 8] {
        NEIGHBOR_OFFSETS.map(|(dx, dz)| self.offset(dx, dz))
    }

    /// Squared Euclidean distance to another chunk coordinate.
    #[must_use]
    pub const fn distance_squared(self, other: Self) -> i64 {
        let dx = (self.x - other.x) as i64;
        let dz = (self.z - other.z) as i64;
        dx * dx + dz * dz
    }

    /// Returns the smallest voxel position (at `y = 0`) inside the chunk.
    #[must_use]
    pub const fn min_voxel(self, chunk_size: u32) -> VoxelPos {
        let size = chunk_size as i32;
        VoxelPos {
            x: self.x * size,
            y: 0,
            z: self.z * size,
        }
    }
}

impl fmt::Display for ChunkCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.z)
    }
}

/// Local coordinate within a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocalPos {
    /// X coordinate within chunk (0..size)
    pub x: u32,
    /// Y coordinate within chunk (0..max_height)
    pub y: u32,
    /// Z coordinate within chunk (0..size)
    pub z: u32,
}

impl LocalPos {
    /// Creates a new local position.
    #[must_use]
    pub const fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }

    /// Converts to a linear index into a `size × max_height × size` volume.
    ///
    /// Layout is y-major, then z, then x.
    #[must_use]
    pub const fn to_index(self, chunk_size: u32) -> usize {
        let size = chunk_size as usize;
        ((self.y as usize) * size + self.z as usize) * size + self.x as usize
    }

    /// Inverse of [`LocalPos::to_index`].
    #[must_use]
    pub const fn from_index(index: usize, chunk_size: u32) -> Self {
        let size = chunk_size as usize;
        Self {
            x: (index % size) as u32,
            z: ((index / size) % size) as u32,
            y: (index / (size * size)) as u32,
        }
    }
}
