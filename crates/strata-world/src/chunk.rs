//! Chunk storage and lifecycle.
//!
//! A [`Chunk`] owns a dense voxel volume, an optional height map, links to
//! its 8 neighbors (stored as coordinates), and a [`ChunkStage`]. Stage
//! transitions are compare-and-set so that terrain and decoration are each
//! claimed by exactly one load cycle.

use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use strata_common::{BlockId, ChunkCoord, LocalPos, VoxelPos, WorldError, WorldResult};
use tracing::{debug, trace};

use crate::chunks::Chunks;
use crate::terrain::TerrainGenerator;

/// Lifecycle stage of a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum ChunkStage {
    /// Volume allocated and empty
    #[default]
    Created,
    /// Terrain claimed by a load cycle and in flight
    TerrainPending,
    /// Terrain populated, not yet decorated
    TerrainReady,
    /// Decoration claimed and running
    DecorationPending,
    /// Structures placed
    Decorated,
    /// Height map computed
    HeightMapped,
}

impl ChunkStage {
    /// Terrain has not completed yet.
    #[must_use]
    pub const fn needs_terrain(self) -> bool {
        matches!(self, Self::Created | Self::TerrainPending)
    }

    /// Decoration has not completed yet.
    #[must_use]
    pub const fn needs_decoration(self) -> bool {
        !matches!(self, Self::Decorated | Self::HeightMapped)
    }

    /// Terrain generation is claimed and running.
    #[must_use]
    pub const fn generation_in_flight(self) -> bool {
        matches!(self, Self::TerrainPending)
    }
}

/// Dense `size × max_height × size` voxel volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkVolume {
    size: u32,
    max_height: u32,
    voxels: Vec<BlockId>,
}

impl ChunkVolume {
    /// Creates a zero-filled (all air) volume.
    #[must_use]
    pub fn new(size: u32, max_height: u32) -> Self {
        let cells = (size as usize) * (size as usize) * (max_height as usize);
        Self {
            size,
            max_height,
            voxels: vec![BlockId::AIR; cells],
        }
    }

    /// Edge length in x and z.
    #[must_use]
    pub const fn size(&self) -> u32 {
        self.size
    }

    /// Height in y.
    #[must_use]
    pub const fn max_height(&self) -> u32 {
        self.max_height
    }

    /// Number of cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.voxels.len()
    }

    /// Whether the volume has no cells.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.voxels.is_empty()
    }

    /// Whether a local position lies inside the volume.
    #[must_use]
    pub const fn contains(&self, local: LocalPos) -> bool {
        local.x < self.size && local.z < self.size && local.y < self.max_height
    }

    /// Gets the block at a local position. Out-of-range reads return air.
    #[must_use]
    pub fn get(&self, local: LocalPos) -> BlockId {
        if !self.contains(local) {
            return BlockId::AIR;
        }
        self.voxels[local.to_index(self.size)]
    }

    /// Sets the block at a local position. Returns false when out of range.
    pub fn set(&mut self, local: LocalPos, block: BlockId) -> bool {
        if !self.contains(local) {
            return false;
        }
        let index = local.to_index(self.size);
        self.voxels[index] = block;
        true
    }

    /// Fills `ys` of the column at local `(x, z)`, clamped to the volume.
    pub fn fill_column(&mut self, x: u32, z: u32, ys: Range<u32>, block: BlockId) {
        if x >= self.size || z >= self.size {
            return;
        }
        for y in ys.start..ys.end.min(self.max_height) {
            let index = LocalPos::new(x, y, z).to_index(self.size);
            self.voxels[index] = block;
        }
    }

    /// Height of the topmost non-empty voxel in the column at local `(x, z)`.
    #[must_use]
    pub fn column_top(&self, x: u32, z: u32) -> Option<u32> {
        if x >= self.size || z >= self.size {
            return None;
        }
        (0..self.max_height)
            .rev()
            .find(|&y| !self.voxels[LocalPos::new(x, y, z).to_index(self.size)].is_empty())
    }

    /// Resets every cell to air.
    pub fn clear(&mut self) {
        self.voxels.fill(BlockId::AIR);
    }

    /// Raw cells in [`LocalPos::to_index`] order.
    #[must_use]
    pub fn as_slice(&self) -> &[BlockId] {
        &self.voxels
    }

    /// Raw mutable cells in [`LocalPos::to_index`] order.
    pub fn as_mut_slice(&mut self) -> &mut [BlockId] {
        &mut self.voxels
    }
}

/// Surface height per `(x, z)` column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeightMap {
    size: u32,
    heights: Vec<Option<u32>>,
}

impl HeightMap {
    /// Scans every column of a volume top-down.
    #[must_use]
    pub fn from_volume(volume: &ChunkVolume) -> Self {
        let size = volume.size();
        let mut heights = Vec::with_capacity((size * size) as usize);
        for z in 0..size {
            for x in 0..size {
                heights.push(volume.column_top(x, z));
            }
        }
        Self { size, heights }
    }

    /// Height of the topmost non-empty voxel, `None` for an empty column.
    #[must_use]
    pub fn get(&self, x: u32, z: u32) -> Option<u32> {
        if x >= self.size || z >= self.size {
            return None;
        }
        self.heights[(z * self.size + x) as usize]
    }

    /// Keeps the column of `local` exact after a write of `block`.
    fn record_write(&mut self, volume: &ChunkVolume, local: LocalPos, block: BlockId) {
        let index = (local.z * self.size + local.x) as usize;
        let current = self.heights[index];
        if !block.is_empty() {
            if current.map_or(true, |top| local.y > top) {
                self.heights[index] = Some(local.y);
            }
        } else if current == Some(local.y) {
            self.heights[index] = volume.column_top(local.x, local.z);
        }
    }
}

/// Voxel state guarded by the chunk's lock.
#[derive(Debug)]
pub(crate) struct ChunkData {
    pub(crate) volume: ChunkVolume,
    pub(crate) height_map: Option<HeightMap>,
}

/// A grid cell of voxel data with lifecycle stage and neighbor links.
pub struct Chunk {
    coord: ChunkCoord,
    name: String,
    size: u32,
    max_height: u32,
    data: RwLock<ChunkData>,
    neighbors: Mutex<[Option<ChunkCoord>; 8]>,
    stage: Mutex<ChunkStage>,
}

impl Chunk {
    /// Creates an empty chunk in the `Created` stage.
    #[must_use]
    pub fn new(coord: ChunkCoord, size: u32, max_height: u32) -> Self {
        Self {
            coord,
            name: coord.name(),
            size,
            max_height,
            data: RwLock::new(ChunkData {
                volume: ChunkVolume::new(size, max_height),
                height_map: None,
            }),
            neighbors: Mutex::new([None; 8]),
            stage: Mutex::new(ChunkStage::Created),
        }
    }

    /// Returns the chunk coordinate.
    #[must_use]
    pub const fn coord(&self) -> ChunkCoord {
        self.coord
    }

    /// Returns the stable chunk name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Edge length in voxels.
    #[must_use]
    pub const fn size(&self) -> u32 {
        self.size
    }

    /// Height in voxels.
    #[must_use]
    pub const fn max_height(&self) -> u32 {
        self.max_height
    }

    /// Smallest voxel position owned by this chunk.
    #[must_use]
    pub const fn min(&self) -> VoxelPos {
        self.coord.min_voxel(self.size)
    }

    /// Exclusive upper corner of the voxels owned by this chunk.
    #[must_use]
    pub const fn max(&self) -> VoxelPos {
        self.coord.min_voxel(self.size).offset(
            self.size as i32,
            self.max_height as i32,
            self.size as i32,
        )
    }

    /// Current lifecycle stage.
    #[must_use]
    pub fn stage(&self) -> ChunkStage {
        *self.stage.lock()
    }

    /// Terrain has not completed yet.
    #[must_use]
    pub fn needs_terrain(&self) -> bool {
        self.stage().needs_terrain()
    }

    /// Decoration has not completed yet.
    #[must_use]
    pub fn needs_decoration(&self) -> bool {
        self.stage().needs_decoration()
    }

    /// Terrain generation is claimed and running.
    #[must_use]
    pub fn generation_in_flight(&self) -> bool {
        self.stage().generation_in_flight()
    }

    /// Coordinates of linked neighbors.
    #[must_use]
    pub fn neighbors(&self) -> Vec<ChunkCoord> {
        self.neighbors.lock().iter().flatten().copied().collect()
    }

    /// Number of linked neighbors (at most 8).
    #[must_use]
    pub fn neighbor_count(&self) -> usize {
        self.neighbors.lock().iter().flatten().count()
    }

    /// Fully built: all neighbors linked, terrain and decoration complete.
    #[must_use]
    pub fn is_servable(&self) -> bool {
        self.neighbor_count() == 8 && !self.needs_terrain() && !self.needs_decoration()
    }

    /// Gets the block at an absolute position inside this chunk.
    #[must_use]
    pub fn voxel(&self, position: VoxelPos) -> Option<BlockId> {
        let data = self.data.read();
        let local = self.local_of(position)?;
        Some(data.volume.get(local))
    }

    /// Writes a block at an absolute position inside this chunk.
    ///
    /// Keeps the height map exact once it exists.
    pub fn set_voxel(&self, position: VoxelPos, block: BlockId) -> WorldResult<()> {
        let mut data = self.data.write();
        let ChunkData { volume, height_map } = &mut *data;
        let local = self
            .local_of(position)
            .ok_or(WorldError::VoxelWriteOutOfBounds { position })?;
        volume.set(local, block);
        if let Some(map) = height_map {
            map.record_write(volume, local, block);
        }
        Ok(())
    }

    /// A copy of the height map, available once the chunk is height-mapped.
    #[must_use]
    pub fn height_map(&self) -> Option<HeightMap> {
        self.data.read().height_map.clone()
    }

    /// Runs `f` against the voxel volume under a read lock.
    pub fn read_volume<R>(&self, f: impl FnOnce(&ChunkVolume) -> R) -> R {
        f(&self.data.read().volume)
    }

    /// Claims terrain generation. `None` if already terrained or in flight.
    #[must_use]
    pub fn claim_terrain(self: &Arc<Self>) -> Option<TerrainClaim> {
        self.transition(ChunkStage::Created, ChunkStage::TerrainPending)
            .then(|| TerrainClaim {
                chunk: Arc::clone(self),
                completed: false,
            })
    }

    /// Claims and runs terrain generation on the calling thread.
    ///
    /// Returns `Ok(false)` when the terrain is already done or in flight.
    pub fn generate(self: &Arc<Self>, terrain: &dyn TerrainGenerator) -> WorldResult<bool> {
        match self.claim_terrain() {
            Some(claim) => claim.generate(terrain).map(|()| true),
            None => Ok(false),
        }
    }

    /// Places structures via the registry's builder.
    ///
    /// Requires this chunk and all 8 neighbors to be terrain-ready. Returns
    /// `Ok(false)` when the chunk is already decorated or being decorated.
    pub fn decorate(self: &Arc<Self>, chunks: &Chunks) -> WorldResult<bool> {
        if !self.needs_decoration() {
            return Ok(false);
        }
        let neighbors = self.ready_neighbors(chunks)?;
        let Some(mut claim) = self.claim_decoration() else {
            return Ok(false);
        };

        let report = chunks.builder().build(chunks, self, &neighbors)?;
        claim.complete();
        debug!(
            chunk = %self.coord,
            applied = report.applied,
            clipped = report.clipped,
            "Decorated chunk"
        );
        Ok(true)
    }

    /// Computes the height map. Requires decoration to be complete.
    pub fn generate_height_map(&self) -> WorldResult<()> {
        if self.needs_decoration() {
            return Err(WorldError::HeightMapPrecondition { coord: self.coord });
        }
        {
            let mut data = self.data.write();
            let map = HeightMap::from_volume(&data.volume);
            data.height_map = Some(map);
        }
        self.transition(ChunkStage::Decorated, ChunkStage::HeightMapped);
        trace!(chunk = %self.coord, "Height map generated");
        Ok(())
    }

    /// Neighbors in [`strata_common::NEIGHBOR_OFFSETS`] order, all terrain-ready.
    ///
    /// Fails with the first neighbor that is unlinked or still needs terrain.
    pub(crate) fn ready_neighbors(&self, chunks: &Chunks) -> WorldResult<Vec<Arc<Chunk>>> {
        if self.needs_terrain() {
            return Err(WorldError::DecorationPrecondition {
                coord: self.coord,
                neighbor: self.coord,
            });
        }
        let links = *self.neighbors.lock();
        let mut ready = Vec::with_capacity(links.len());
        for (link, expected) in links.iter().zip(self.coord.neighbors()) {
            match link.and_then(|coord| chunks.raw(coord)) {
                Some(neighbor) if !neighbor.needs_terrain() => ready.push(neighbor),
                _ => {
                    return Err(WorldError::DecorationPrecondition {
                        coord: self.coord,
                        neighbor: expected,
                    })
                },
            }
        }
        Ok(ready)
    }

    pub(crate) fn link_neighbor(&self, index: usize, coord: ChunkCoord) {
        self.neighbors.lock()[index] = Some(coord);
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, ChunkData> {
        self.data.read()
    }

    fn claim_decoration(&self) -> Option<DecorationClaim<'_>> {
        self.transition(ChunkStage::TerrainReady, ChunkStage::DecorationPending)
            .then_some(DecorationClaim {
                chunk: self,
                completed: false,
            })
    }

    fn transition(&self, from: ChunkStage, to: ChunkStage) -> bool {
        let mut stage = self.stage.lock();
        if *stage == from {
            *stage = to;
            true
        } else {
            false
        }
    }

    fn local_of(&self, position: VoxelPos) -> Option<LocalPos> {
        if position.to_chunk_coord(self.size) != self.coord
            || position.y < 0
            || position.y >= self.max_height as i32
        {
            return None;
        }
        Some(position.to_local(self.size))
    }
}

impl fmt::Debug for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chunk")
            .field("coord", &self.coord)
            .field("stage", &self.stage())
            .field("neighbors", &self.neighbor_count())
            .finish_non_exhaustive()
    }
}

/// Exclusive right to generate a chunk's terrain.
///
/// Dropping the claim without completing it releases the chunk back to
/// `Created`, so a failed or abandoned generation is retried later.
pub struct TerrainClaim {
    chunk: Arc<Chunk>,
    completed: bool,
}

impl TerrainClaim {
    /// Coordinate of the claimed chunk.
    #[must_use]
    pub fn coord(&self) -> ChunkCoord {
        self.chunk.coord
    }

    /// The claimed chunk.
    #[must_use]
    pub fn chunk(&self) -> &Arc<Chunk> {
        &self.chunk
    }

    /// Populates the volume and moves the chunk to `TerrainReady`.
    pub fn generate(mut self, terrain: &dyn TerrainGenerator) -> WorldResult<()> {
        let coord = self.chunk.coord;
        {
            let mut data = self.chunk.data.write();
            data.volume.clear();
            terrain
                .generate(coord, &mut data.volume)
                .map_err(|source| WorldError::TerrainGenerationFailure { coord, source })?;
        }
        self.chunk
            .transition(ChunkStage::TerrainPending, ChunkStage::TerrainReady);
        self.completed = true;
        Ok(())
    }
}

impl Drop for TerrainClaim {
    fn drop(&mut self) {
        if !self.completed {
            self.chunk
                .transition(ChunkStage::TerrainPending, ChunkStage::Created);
        }
    }
}

impl fmt::Debug for TerrainClaim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TerrainClaim")
            .field("coord", &self.chunk.coord)
            .field("completed", &self.completed)
            .finish()
    }
}

struct DecorationClaim<'a> {
    chunk: &'a Chunk,
    completed: bool,
}

impl DecorationClaim<'_> {
    fn complete(&mut self) {
        self.chunk
            .transition(ChunkStage::DecorationPending, ChunkStage::Decorated);
        self.completed = true;
    }
}

impl Drop for DecorationClaim<'_> {
    fn drop(&mut self) {
        if !self.completed {
            self.chunk
                .transition(ChunkStage::DecorationPending, ChunkStage::TerrainReady);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_common::TerrainError;

    const SIZE: u32 = 4;
    const HEIGHT: u32 = 8;

    fn flat(level: u32) -> impl TerrainGenerator {
        move |_coord: ChunkCoord, volume: &mut ChunkVolume| -> Result<(), TerrainError> {
            for x in 0..volume.size() {
                for z in 0..volume.size() {
                    volume.fill_column(x, z, 0..level, BlockId::new(1));
                }
            }
            Ok(())
        }
    }

    #[test]
    fn test_stage_flags() {
        assert!(ChunkStage::Created.needs_terrain());
        assert!(ChunkStage::TerrainPending.generation_in_flight());
        assert!(!ChunkStage::TerrainReady.needs_terrain());
        assert!(ChunkStage::DecorationPending.needs_decoration());
        assert!(!ChunkStage::Decorated.needs_decoration());
        assert!(!ChunkStage::HeightMapped.needs_decoration());
    }

    #[test]
    fn test_new_chunk_is_empty() {
        let chunk = Chunk::new(ChunkCoord::new(2, -1), SIZE, HEIGHT);
        assert_eq!(chunk.name(), "2|-1");
        assert_eq!(chunk.stage(), ChunkStage::Created);
        assert_eq!(chunk.min(), VoxelPos::new(8, 0, -4));
        assert_eq!(chunk.max(), VoxelPos::new(12, 8, 0));
        assert!(!chunk.is_servable());
        assert!(chunk.read_volume(|v| v.as_slice().iter().all(|b| b.is_empty())));
    }

    #[test]
    fn test_volume_column_top() {
        let mut volume = ChunkVolume::new(SIZE, HEIGHT);
        assert_eq!(volume.column_top(1, 1), None);
        volume.fill_column(1, 1, 0..3, BlockId::new(2));
        assert!(volume.set(LocalPos::new(1, 6, 1), BlockId::new(5)));
        assert_eq!(volume.column_top(1, 1), Some(6));
        assert!(!volume.set(LocalPos::new(1, HEIGHT, 1), BlockId::new(5)));
        assert_eq!(volume.get(LocalPos::new(SIZE, 0, 0)), BlockId::AIR);
    }

    #[test]
    fn test_generate_claims_once() {
        let chunk = Arc::new(Chunk::new(ChunkCoord::new(0, 0), SIZE, HEIGHT));
        let terrain = flat(3);

        assert!(chunk.generate(&terrain).expect("generate"));
        assert_eq!(chunk.stage(), ChunkStage::TerrainReady);
        assert!(!chunk.generate(&terrain).expect("second generate"));
        assert_eq!(chunk.voxel(VoxelPos::new(0, 2, 0)), Some(BlockId::new(1)));
        assert_eq!(chunk.voxel(VoxelPos::new(0, 3, 0)), Some(BlockId::AIR));
    }

    #[test]
    fn test_in_flight_claim_blocks_second_claim() {
        let chunk = Arc::new(Chunk::new(ChunkCoord::new(0, 0), SIZE, HEIGHT));
        let claim = chunk.claim_terrain().expect("first claim");
        assert!(chunk.generation_in_flight());
        assert!(chunk.claim_terrain().is_none());
        drop(claim);
        assert_eq!(chunk.stage(), ChunkStage::Created);
        assert!(chunk.claim_terrain().is_some());
    }

    #[test]
    fn test_failed_generation_is_released() {
        let chunk = Arc::new(Chunk::new(ChunkCoord::new(3, 3), SIZE, HEIGHT));
        let failing = |_: ChunkCoord, volume: &mut ChunkVolume| -> Result<(), TerrainError> {
            volume.fill_column(0, 0, 0..HEIGHT, BlockId::new(9));
            Err(TerrainError::Failed("boom".into()))
        };

        let err = chunk.generate(&failing).expect_err("must fail");
        assert!(matches!(
            err,
            WorldError::TerrainGenerationFailure { coord, .. } if coord == ChunkCoord::new(3, 3)
        ));
        assert_eq!(chunk.stage(), ChunkStage::Created);

        assert!(chunk.generate(&flat(1)).expect("retry"));
        assert_eq!(chunk.voxel(VoxelPos::new(12, 5, 12)), Some(BlockId::AIR));
    }

    #[test]
    fn test_height_map_requires_decoration() {
        let chunk = Arc::new(Chunk::new(ChunkCoord::new(0, 0), SIZE, HEIGHT));
        chunk.generate(&flat(2)).expect("generate");
        assert!(matches!(
            chunk.generate_height_map(),
            Err(WorldError::HeightMapPrecondition { .. })
        ));
        assert!(chunk.height_map().is_none());
    }

    #[test]
    fn test_height_map_tracks_writes() {
        let chunk = Arc::new(Chunk::new(ChunkCoord::new(0, 0), SIZE, HEIGHT));
        chunk.generate(&flat(2)).expect("generate");
        chunk.transition(ChunkStage::TerrainReady, ChunkStage::Decorated);
        chunk.generate_height_map().expect("height map");
        assert_eq!(chunk.stage(), ChunkStage::HeightMapped);

        let map = chunk.height_map().expect("map");
        assert_eq!(map.get(0, 0), Some(1));

        chunk
            .set_voxel(VoxelPos::new(0, 5, 0), BlockId::new(4))
            .expect("raise");
        assert_eq!(chunk.height_map().and_then(|m| m.get(0, 0)), Some(5));

        chunk
            .set_voxel(VoxelPos::new(0, 5, 0), BlockId::AIR)
            .expect("lower");
        assert_eq!(chunk.height_map().and_then(|m| m.get(0, 0)), Some(1));
    }

    #[test]
    fn test_set_voxel_outside_chunk() {
        let chunk = Chunk::new(ChunkCoord::new(0, 0), SIZE, HEIGHT);
        for position in [
            VoxelPos::new(SIZE as i32, 0, 0),
            VoxelPos::new(0, -1, 0),
            VoxelPos::new(0, HEIGHT as i32, 0),
        ] {
            assert!(matches!(
                chunk.set_voxel(position, BlockId::new(1)),
                Err(WorldError::VoxelWriteOutOfBounds { position: p }) if p == position
            ));
        }
    }
}
