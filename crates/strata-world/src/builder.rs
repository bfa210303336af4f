//! Decoration: structure generators and the builder that applies them.
//!
//! A [`Builder`] owns an ordered list of [`StructureGenerator`]s. Building a
//! chunk read-locks the chunk and its 8 neighbors as a [`Neighborhood`],
//! collects every generator's placements, releases the locks, and then writes
//! the placements through the registry one voxel at a time.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLockReadGuard;
use strata_common::{BlockId, ChunkCoord, LocalPos, VoxelPos, WorldError, WorldResult};
use tracing::trace;

use crate::blocks::{BlockError, BlockRegistry};
use crate::chunk::{Chunk, ChunkData};
use crate::chunks::Chunks;
use crate::structures::{Lamps, Plants, Trees};

/// A single voxel placement produced by a structure generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VoxelUpdate {
    /// Absolute voxel position
    pub position: VoxelPos,
    /// Block to place
    pub block: BlockId,
}

impl VoxelUpdate {
    /// Creates a placement.
    #[must_use]
    pub const fn new(position: VoxelPos, block: BlockId) -> Self {
        Self { position, block }
    }
}

/// Places structures for one chunk.
///
/// Must be a pure function of the neighborhood: the same voxels yield the
/// same placements. Placements may extend into neighbor chunks.
pub trait StructureGenerator: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Computes placements for the neighborhood's center chunk.
    fn generate(&self, neighborhood: &Neighborhood<'_>) -> Vec<VoxelUpdate>;
}

/// Read-only view of a chunk and its 8 neighbors.
///
/// Holds a read lock on each of the 9 chunks for its lifetime. Locks are taken
/// in coordinate order so concurrent neighborhoods never deadlock.
pub struct Neighborhood<'a> {
    center: &'a Chunk,
    // Sorted by coordinate.
    chunks: Vec<(ChunkCoord, RwLockReadGuard<'a, ChunkData>)>,
}

impl<'a> Neighborhood<'a> {
    /// Read-locks `center` and `neighbors`.
    #[must_use]
    pub fn lock(center: &'a Chunk, neighbors: &'a [Arc<Chunk>]) -> Self {
        let mut members: Vec<&'a Chunk> = Vec::with_capacity(neighbors.len() + 1);
        members.push(center);
        members.extend(neighbors.iter().map(AsRef::as_ref));
        members.sort_by_key(|chunk| chunk.coord());
        members.dedup_by_key(|chunk| chunk.coord());

        let chunks = members
            .into_iter()
            .map(|chunk| (chunk.coord(), chunk.read()))
            .collect();

        Self { center, chunks }
    }

    /// Coordinate of the chunk being decorated.
    #[must_use]
    pub fn coord(&self) -> ChunkCoord {
        self.center.coord()
    }

    /// Chunk edge length in voxels.
    #[must_use]
    pub fn chunk_size(&self) -> u32 {
        self.center.size()
    }

    /// Chunk height in voxels.
    #[must_use]
    pub fn max_height(&self) -> u32 {
        self.center.max_height()
    }

    /// Smallest voxel of the center chunk.
    #[must_use]
    pub fn min(&self) -> VoxelPos {
        self.center.min()
    }

    /// Exclusive upper corner of the center chunk.
    #[must_use]
    pub fn max(&self) -> VoxelPos {
        self.center.max()
    }

    /// Whether a position lies in one of the locked chunks and in height range.
    #[must_use]
    pub fn contains(&self, position: VoxelPos) -> bool {
        position.y >= 0
            && position.y < self.max_height() as i32
            && self.data(position.to_chunk_coord(self.chunk_size())).is_some()
    }

    /// Block at an absolute position. Air outside the neighborhood.
    #[must_use]
    pub fn voxel(&self, position: VoxelPos) -> BlockId {
        if position.y < 0 {
            return BlockId::AIR;
        }
        let size = self.chunk_size();
        self.data(position.to_chunk_coord(size))
            .map_or(BlockId::AIR, |data| data.volume.get(position.to_local(size)))
    }

    /// Topmost non-empty voxel height of the absolute column `(vx, vz)`.
    #[must_use]
    pub fn column_top(&self, vx: i32, vz: i32) -> Option<i32> {
        let size = self.chunk_size();
        let position = VoxelPos::new(vx, 0, vz);
        let LocalPos { x, z, .. } = position.to_local(size);
        self.data(position.to_chunk_coord(size))
            .and_then(|data| data.volume.column_top(x, z))
            .map(|top| top as i32)
    }

    fn data(&self, coord: ChunkCoord) -> Option<&ChunkData> {
        self.chunks
            .binary_search_by_key(&coord, |(key, _)| *key)
            .ok()
            .map(|index| &*self.chunks[index].1)
    }
}

/// Outcome of building one chunk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// Placements written
    pub applied: usize,
    /// Placements dropped for falling outside the neighborhood or height range
    pub clipped: usize,
}

/// Ordered collection of structure generators.
#[derive(Default)]
pub struct Builder {
    generators: Vec<Box<dyn StructureGenerator>>,
}

impl Builder {
    /// Creates a builder with no generators.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The default decorations: plants, then trees, then lamps.
    pub fn standard(registry: &BlockRegistry, seed: u32) -> Result<Self, BlockError> {
        Ok(Self::new()
            .with_generator(Plants::new(registry, seed)?)
            .with_generator(Trees::new(registry, seed)?)
            .with_generator(Lamps::new(registry, seed)?))
    }

    /// Appends a generator.
    #[must_use]
    pub fn with_generator(mut self, generator: impl StructureGenerator + 'static) -> Self {
        self.register(Box::new(generator));
        self
    }

    /// Appends a generator.
    pub fn register(&mut self, generator: Box<dyn StructureGenerator>) {
        self.generators.push(generator);
    }

    /// Names of the registered generators, in run order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.generators.iter().map(|generator| generator.name())
    }

    /// Number of registered generators.
    #[must_use]
    pub fn len(&self) -> usize {
        self.generators.len()
    }

    /// Whether no generators are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.generators.is_empty()
    }

    /// Runs every generator in order and concatenates their placements.
    #[must_use]
    pub fn collect(&self, neighborhood: &Neighborhood<'_>) -> Vec<VoxelUpdate> {
        let mut updates = Vec::new();
        for generator in &self.generators {
            let placed = generator.generate(neighborhood);
            trace!(
                chunk = %neighborhood.coord(),
                generator = generator.name(),
                count = placed.len(),
                "Structure placements"
            );
            updates.extend(placed);
        }
        updates
    }

    /// Decorates `chunk` and writes the placements through `chunks`.
    ///
    /// Placements are applied in order, so a later generator overwrites an
    /// earlier one at the same position.
    pub fn build(
        &self,
        chunks: &Chunks,
        chunk: &Chunk,
        neighbors: &[Arc<Chunk>],
    ) -> WorldResult<BuildReport> {
        let mut report = BuildReport::default();

        let updates: Vec<VoxelUpdate> = {
            let neighborhood = Neighborhood::lock(chunk, neighbors);
            self.collect(&neighborhood)
                .into_iter()
                .filter(|update| {
                    let inside = neighborhood.contains(update.position);
                    if !inside {
                        trace!(position = %update.position, "Clipped placement");
                        report.clipped += 1;
                    }
                    inside
                })
                .collect()
        };

        for update in updates {
            match chunks.set_voxel(update.position, update.block) {
                Ok(()) => report.applied += 1,
                Err(WorldError::VoxelWriteOutOfBounds { position }) => {
                    trace!(%position, "Clipped placement");
                    report.clipped += 1;
                },
                Err(e) => return Err(e),
            }
        }

        Ok(report)
    }
}

impl fmt::Debug for Builder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
