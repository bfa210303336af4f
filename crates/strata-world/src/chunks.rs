//! Chunk registry and the radius-based load algorithm.
//!
//! [`Chunks`] owns every chunk ever created, keyed by coordinate. A load
//! cycle ([`Chunks::generate`]) creates the chunks around a client, terrains
//! them concurrently on the blocking pool, waits for all of them, and only
//! then decorates and height-maps the chunks inside the render radius.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use strata_common::{
    opposite_neighbor, BlockId, ChunkCoord, VoxelPos, WorldError, WorldResult,
};
use tokio::task::JoinSet;
use tracing::{debug, error, info, trace, warn};

use crate::builder::Builder;
use crate::chunk::{Chunk, ChunkStage};
use crate::client::ClientView;
use crate::config::{WorldConfig, MIN_TERRAIN_MARGIN};
use crate::terrain::TerrainGenerator;

/// Per-phase counts of one load cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Chunk the client stands in
    pub center: ChunkCoord,
    /// Chunks constructed by this cycle
    pub created: usize,
    /// Terrain claims that completed
    pub terrain_generated: usize,
    /// Terrain claims that failed and were released for retry
    pub terrain_failed: usize,
    /// Chunks decorated by this cycle
    pub decorated: usize,
    /// Chunks left for a later cycle because a neighbor is not terrained
    pub deferred: usize,
    /// Height maps computed
    pub height_mapped: usize,
}

/// Resident chunk counts by stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChunkStats {
    /// All resident chunks
    pub total: usize,
    /// Awaiting terrain
    pub created: usize,
    /// Terrain in flight
    pub terrain_pending: usize,
    /// Terrained, not decorated
    pub terrain_ready: usize,
    /// Decoration in flight
    pub decoration_pending: usize,
    /// Decorated, no height map yet
    pub decorated: usize,
    /// Fully generated
    pub height_mapped: usize,
    /// Fully generated with all 8 neighbors linked
    pub servable: usize,
}

/// The coordinate to chunk map.
pub struct Chunks {
    config: WorldConfig,
    chunks: DashMap<ChunkCoord, Arc<Chunk>>,
    terrain: Arc<dyn TerrainGenerator>,
    builder: Builder,
    constructed: AtomicUsize,
}

impl Chunks {
    /// Creates an empty registry.
    #[must_use]
    pub fn new(config: WorldConfig, terrain: Arc<dyn TerrainGenerator>, builder: Builder) -> Self {
        Self {
            config,
            chunks: DashMap::new(),
            terrain,
            builder,
            constructed: AtomicUsize::new(0),
        }
    }

    /// World configuration.
    #[must_use]
    pub const fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Structure generators run during decoration.
    #[must_use]
    pub const fn builder(&self) -> &Builder {
        &self.builder
    }

    /// The chunk at `coord` if it is fully built, else `None` (try again later).
    #[must_use]
    pub fn get(&self, coord: ChunkCoord) -> Option<Arc<Chunk>> {
        self.raw(coord).filter(|chunk| chunk.is_servable())
    }

    /// The chunk at `coord` regardless of its stage.
    #[must_use]
    pub fn raw(&self, coord: ChunkCoord) -> Option<Arc<Chunk>> {
        self.chunks.get(&coord).map(|entry| Arc::clone(entry.value()))
    }

    /// Every resident chunk, in no particular order.
    #[must_use]
    pub fn all(&self) -> Vec<Arc<Chunk>> {
        self.chunks
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    /// Number of resident chunks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Whether no chunk has been created.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Number of chunk constructions since startup.
    ///
    /// Equals [`Chunks::len`] because chunks are never constructed twice.
    #[must_use]
    pub fn constructed_count(&self) -> usize {
        self.constructed.load(Ordering::Relaxed)
    }

    /// Counts resident chunks by stage.
    #[must_use]
    pub fn stats(&self) -> ChunkStats {
        let mut stats = ChunkStats::default();
        for chunk in self.all() {
            stats.total += 1;
            match chunk.stage() {
                ChunkStage::Created => stats.created += 1,
                ChunkStage::TerrainPending => stats.terrain_pending += 1,
                ChunkStage::TerrainReady => stats.terrain_ready += 1,
                ChunkStage::DecorationPending => stats.decoration_pending += 1,
                ChunkStage::Decorated => stats.decorated += 1,
                ChunkStage::HeightMapped => stats.height_mapped += 1,
            }
            if chunk.is_servable() {
                stats.servable += 1;
            }
        }
        stats
    }

    /// Creates the chunk at `coord`, failing if one already exists.
    pub fn create(&self, coord: ChunkCoord) -> WorldResult<Arc<Chunk>> {
        let chunk = match self.chunks.entry(coord) {
            Entry::Occupied(_) => {
                return Err(WorldError::ChunkCreationRace { coord });
            },
            Entry::Vacant(entry) => {
                let chunk = Arc::new(self.construct(coord));
                entry.insert(Arc::clone(&chunk));
                chunk
            },
        };
        self.link_neighbors(&chunk);
        Ok(chunk)
    }

    /// Returns the chunk at `coord`, creating it if absent.
    ///
    /// Creation is a single atomic insert, so concurrent callers always
    /// receive the same chunk. The flag is true for the one caller that
    /// constructed it.
    pub fn get_or_create(&self, coord: ChunkCoord) -> (Arc<Chunk>, bool) {
        let mut created = false;
        let chunk = {
            let entry = self.chunks.entry(coord).or_insert_with(|| {
                created = true;
                Arc::new(self.construct(coord))
            });
            Arc::clone(entry.value())
        };
        self.link_neighbors(&chunk);
        (chunk, created)
    }

    /// Writes a block. Never creates a chunk.
    pub fn set_voxel(&self, position: VoxelPos, block: BlockId) -> WorldResult<()> {
        self.raw(position.to_chunk_coord(self.config.chunk_size))
            .ok_or(WorldError::VoxelWriteOutOfBounds { position })?
            .set_voxel(position, block)
    }

    /// Reads a block. `None` when no chunk holds the position.
    #[must_use]
    pub fn voxel(&self, position: VoxelPos) -> Option<BlockId> {
        self.raw(position.to_chunk_coord(self.config.chunk_size))?
            .voxel(position)
    }

    /// Height of the topmost non-empty voxel in the absolute column `(vx, vz)`.
    #[must_use]
    pub fn max_height(&self, vx: i32, vz: i32) -> Option<u32> {
        let size = self.config.chunk_size;
        let column = VoxelPos::new(vx, 0, vz);
        let chunk = self.raw(column.to_chunk_coord(size))?;
        let local = column.to_local(size);
        match chunk.height_map() {
            Some(map) => map.get(local.x, local.z),
            None => chunk.read_volume(|volume| volume.column_top(local.x, local.z)),
        }
    }

    /// Loads the area around a client.
    ///
    /// Chunks within `render_radius + terrain_margin` are created and
    /// terrained; chunks within `render_radius` are then decorated and
    /// height-mapped. Decoration of a chunk whose neighborhood is still being
    /// terrained by another cycle, or failed to terrain, is deferred. A
    /// missing neighbor is an invariant violation.
    pub async fn generate(&self, view: &ClientView) -> WorldResult<LoadReport> {
        let center = view.chunk(self.config.chunk_size, self.config.dimension);
        let render = i64::from(view.render_radius);
        let margin = self.config.terrain_margin.max(MIN_TERRAIN_MARGIN);
        let terrain = render + i64::from(margin);
        let reach = i32::try_from(terrain).unwrap_or(i32::MAX);

        let mut report = LoadReport {
            center,
            ..LoadReport::default()
        };
        let mut terrain_batch = Vec::new();
        let mut decoration_batch = Vec::new();

        for x in -reach..=reach {
            for z in -reach..=reach {
                let distance = i64::from(x) * i64::from(x) + i64::from(z) * i64::from(z);
                if distance >= terrain * terrain {
                    continue;
                }
                let (chunk, created) = self.get_or_create(center.offset(x, z));
                if created {
                    report.created += 1;
                }
                if let Some(claim) = chunk.claim_terrain() {
                    terrain_batch.push(claim);
                }
                if distance < render * render {
                    decoration_batch.push(chunk);
                }
            }
        }

        let mut tasks = JoinSet::new();
        for claim in terrain_batch {
            let generator = Arc::clone(&self.terrain);
            tasks.spawn_blocking(move || {
                let coord = claim.coord();
                (coord, claim.generate(generator.as_ref()))
            });
        }
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(()))) => report.terrain_generated += 1,
                Ok((coord, Err(e))) => {
                    warn!(chunk = %coord, "{e}, will retry");
                    report.terrain_failed += 1;
                },
                Err(e) => {
                    warn!("Terrain task did not complete: {e}");
                    report.terrain_failed += 1;
                },
            }
        }

        for chunk in &decoration_batch {
            if !chunk.needs_decoration() {
                continue;
            }
            match chunk.decorate(self) {
                Ok(true) => report.decorated += 1,
                Ok(false) => {},
                Err(WorldError::DecorationPrecondition { coord, neighbor })
                    if self.raw(neighbor).is_some() =>
                {
                    debug!(chunk = %coord, %neighbor, "Decoration deferred");
                    report.deferred += 1;
                },
                Err(e) => {
                    error!(chunk = %chunk.coord(), "Decoration failed: {e}");
                    debug_assert!(
                        !matches!(e, WorldError::DecorationPrecondition { .. }),
                        "decoration invariant violated: {e}"
                    );
                    return Err(e);
                },
            }
        }

        for chunk in &decoration_batch {
            if chunk.stage() == ChunkStage::Decorated {
                chunk.generate_height_map()?;
                report.height_mapped += 1;
            }
        }

        if report.created > 0 || report.decorated > 0 {
            info!(
                client = %view.id,
                center = %center,
                created = report.created,
                terrained = report.terrain_generated,
                failed = report.terrain_failed,
                decorated = report.decorated,
                deferred = report.deferred,
                "Loaded area"
            );
        } else {
            debug!(client = %view.id, center = %center, "Area already loaded");
        }

        Ok(report)
    }

    fn construct(&self, coord: ChunkCoord) -> Chunk {
        self.constructed.fetch_add(1, Ordering::Relaxed);
        trace!(chunk = %coord, "Chunk created");
        Chunk::new(coord, self.config.chunk_size, self.config.max_height)
    }

    /// Links `chunk` with every existing adjacent chunk, both ways.
    ///
    /// Idempotent. Runs after the insert, so of two adjacent chunks created
    /// concurrently at least one sees the other.
    fn link_neighbors(&self, chunk: &Chunk) {
        let coord = chunk.coord();
        for (index, neighbor_coord) in coord.neighbors().into_iter().enumerate() {
            if let Some(neighbor) = self.raw(neighbor_coord) {
                chunk.link_neighbor(index, neighbor_coord);
                neighbor.link_neighbor(opposite_neighbor(index), coord);
            }
        }
    }
}

impl std::fmt::Debug for Chunks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chunks")
            .field("len", &self.len())
            .field("builder", &self.builder)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;

    use glam::Vec3;
    use parking_lot::Mutex;
    use strata_common::{ClientId, TerrainError};

    use crate::builder::{Neighborhood, StructureGenerator, VoxelUpdate};
    use crate::chunk::ChunkVolume;

    const SIZE: u32 = 4;
    const HEIGHT: u32 = 16;
    const GROUND: u32 = 5;
    const STONE: BlockId = BlockId::new(1);
    const LEAVES: BlockId = BlockId::new(7);

    fn config() -> WorldConfig {
        WorldConfig {
            chunk_size: SIZE,
            max_height: HEIGHT,
            terrain: crate::terrain::TerrainConfig {
                sea_level: 2,
                ..Default::default()
            },
            ..WorldConfig::default()
        }
    }

    fn fill(volume: &mut ChunkVolume) {
        for x in 0..volume.size() {
            for z in 0..volume.size() {
                volume.fill_column(x, z, 0..GROUND, STONE);
            }
        }
    }

    fn flat() -> Arc<dyn TerrainGenerator> {
        Arc::new(|_: ChunkCoord, volume: &mut ChunkVolume| -> Result<(), TerrainError> {
            fill(volume);
            Ok(())
        })
    }

    fn slow() -> Arc<dyn TerrainGenerator> {
        Arc::new(|_: ChunkCoord, volume: &mut ChunkVolume| -> Result<(), TerrainError> {
            std::thread::sleep(Duration::from_millis(2));
            fill(volume);
            Ok(())
        })
    }

    fn view_at_chunk(coord: ChunkCoord, radius: u32) -> ClientView {
        let min = coord.min_voxel(SIZE);
        ClientView::new(
            ClientId::from_raw(1),
            Vec3::new(min.x as f32 + 0.5, 20.0, min.z as f32 + 0.5),
            radius,
        )
    }

    /// Records which chunks were decorated and whether any neighborhood was
    /// missing terrain at decoration time.
    #[derive(Default)]
    struct Probe {
        decorated: Mutex<Vec<ChunkCoord>>,
        violations: AtomicUsize,
    }

    struct ProbeGenerator(Arc<Probe>);

    impl StructureGenerator for ProbeGenerator {
        fn name(&self) -> &str {
            "probe"
        }

        fn generate(&self, neighborhood: &Neighborhood<'_>) -> Vec<VoxelUpdate> {
            let center = neighborhood.coord();
            let mut coords = center.neighbors().to_vec();
            coords.push(center);
            for coord in coords {
                let min = coord.min_voxel(SIZE);
                if neighborhood.voxel(min) != STONE {
                    self.0.violations.fetch_add(1, Ordering::SeqCst);
                }
            }
            self.0.decorated.lock().push(center);
            Vec::new()
        }
    }

    fn probed(terrain: Arc<dyn TerrainGenerator>) -> (Chunks, Arc<Probe>) {
        let probe = Arc::new(Probe::default());
        let builder = Builder::new().with_generator(ProbeGenerator(Arc::clone(&probe)));
        (Chunks::new(config(), terrain, builder), probe)
    }

    #[tokio::test]
    async fn test_origin_radius_one() {
        let (chunks, probe) = probed(flat());
        let report = chunks
            .generate(&view_at_chunk(ChunkCoord::new(0, 0), 1))
            .await
            .expect("generate");

        assert_eq!(report.center, ChunkCoord::new(0, 0));
        assert_eq!(report.created, 25);
        assert_eq!(report.terrain_generated, 25);
        assert_eq!(report.decorated, 1);
        assert_eq!(report.height_mapped, 1);
        assert_eq!(chunks.len(), 25);

        for x in -2..=2 {
            for z in -2..=2 {
                let chunk = chunks.raw(ChunkCoord::new(x, z)).expect("created");
                assert!(!chunk.needs_terrain());
            }
        }
        assert!(chunks.raw(ChunkCoord::new(5, 5)).is_none());
        assert!(chunks.raw(ChunkCoord::new(3, 0)).is_none());

        assert!(chunks.get(ChunkCoord::new(0, 0)).is_some());
        assert!(chunks.get(ChunkCoord::new(1, 0)).is_none());
        assert_eq!(*probe.decorated.lock(), vec![ChunkCoord::new(0, 0)]);
    }

    #[tokio::test]
    async fn test_render_radius_servable_and_terrain_radius_bounded() {
        let (chunks, probe) = probed(flat());
        let center = ChunkCoord::new(-7, 12);
        chunks
            .generate(&view_at_chunk(center, 3))
            .await
            .expect("generate");

        for chunk in chunks.all() {
            assert!(center.distance_squared(chunk.coord()) < 25);
        }
        for x in -3..=3 {
            for z in -3..=3 {
                let coord = center.offset(x, z);
                if x * x + z * z < 9 {
                    assert!(chunks.get(coord).is_some(), "{coord} not servable");
                }
            }
        }
        assert_eq!(probe.violations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_small_terrain_margin_still_terrains_every_neighbor() {
        let probe = Arc::new(Probe::default());
        let config = WorldConfig {
            terrain_margin: 1,
            ..config()
        };
        let builder = Builder::new().with_generator(ProbeGenerator(Arc::clone(&probe)));
        let chunks = Chunks::new(config, flat(), builder);

        let report = chunks
            .generate(&view_at_chunk(ChunkCoord::new(0, 0), 3))
            .await
            .expect("generate");
        assert_eq!(report.deferred, 0);
        assert_eq!(report.decorated, report.height_mapped);

        for x in -2..=2 {
            for z in -2..=2 {
                if x * x + z * z < 9 {
                    let coord = ChunkCoord::new(x, z);
                    assert!(chunks.get(coord).is_some(), "{coord} not servable");
                }
            }
        }
        assert!(chunks.raw(ChunkCoord::new(3, 3)).is_some());
        assert_eq!(probe.violations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_generate_is_idempotent() {
        let (chunks, probe) = probed(flat());
        let view = view_at_chunk(ChunkCoord::new(2, 2), 2);

        chunks.generate(&view).await.expect("first");
        let len = chunks.len();
        let decorated = probe.decorated.lock().len();
        chunks
            .set_voxel(VoxelPos::new(8, 9, 8), LEAVES)
            .expect("write");

        let report = chunks.generate(&view).await.expect("second");
        assert_eq!(report.created, 0);
        assert_eq!(report.terrain_generated, 0);
        assert_eq!(report.decorated, 0);
        assert_eq!(report.height_mapped, 0);
        assert_eq!(chunks.len(), len);
        assert_eq!(chunks.constructed_count(), len);
        assert_eq!(probe.decorated.lock().len(), decorated);
        assert_eq!(chunks.voxel(VoxelPos::new(8, 9, 8)), Some(LEAVES));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_players_construct_once() {
        let (chunks, probe) = probed(slow());
        let chunks = Arc::new(chunks);

        let views: Vec<_> = (0..8)
            .map(|i| view_at_chunk(ChunkCoord::new(i % 3, i / 3), 2))
            .collect();

        let tasks = views.iter().map(|view| {
            let chunks = Arc::clone(&chunks);
            let view = *view;
            tokio::spawn(async move { chunks.generate(&view).await })
        });
        for result in futures::future::join_all(tasks).await {
            result.expect("join").expect("generate");
        }

        assert_eq!(chunks.constructed_count(), chunks.len());
        assert_eq!(probe.violations.load(Ordering::SeqCst), 0);

        // Deferred chunks are picked up by a later cycle.
        for view in &views {
            chunks.generate(view).await.expect("settle");
        }
        let decorated = probe.decorated.lock().clone();
        let unique: HashSet<_> = decorated.iter().copied().collect();
        assert_eq!(unique.len(), decorated.len(), "a chunk was decorated twice");

        for view in &views {
            let center = view.chunk(SIZE, 1.0);
            for x in -1..=1 {
                for z in -1..=1 {
                    if x * x + z * z < 4 {
                        assert!(chunks.get(center.offset(x, z)).is_some());
                    }
                }
            }
        }
        let stats = chunks.stats();
        assert_eq!(stats.total, chunks.len());
        assert_eq!(stats.terrain_pending + stats.decoration_pending, 0);
    }

    #[tokio::test]
    async fn test_height_map_matches_topmost_voxel() {
        let chunks = Chunks::new(
            config(),
            flat(),
            Builder::new().with_generator(Pillar),
        );
        chunks
            .generate(&view_at_chunk(ChunkCoord::new(0, 0), 2))
            .await
            .expect("generate");

        for chunk in chunks.all().into_iter().filter(|c| c.is_servable()) {
            let map = chunk.height_map().expect("height map");
            chunk.read_volume(|volume| {
                for x in 0..SIZE {
                    for z in 0..SIZE {
                        assert_eq!(map.get(x, z), volume.column_top(x, z));
                    }
                }
            });
        }

        assert_eq!(chunks.max_height(0, 0), Some(GROUND + 3));
        assert_eq!(chunks.max_height(1, 0), Some(GROUND - 1));

        chunks
            .set_voxel(VoxelPos::new(1, 12, 0), LEAVES)
            .expect("raise");
        assert_eq!(chunks.max_height(1, 0), Some(12));
        chunks
            .set_voxel(VoxelPos::new(1, 12, 0), BlockId::AIR)
            .expect("lower");
        assert_eq!(chunks.max_height(1, 0), Some(GROUND - 1));
    }

    /// Stacks 3 leaves on the first column of every decorated chunk.
    struct Pillar;

    impl StructureGenerator for Pillar {
        fn name(&self) -> &str {
            "pillar"
        }

        fn generate(&self, neighborhood: &Neighborhood<'_>) -> Vec<VoxelUpdate> {
            let min = neighborhood.min();
            (0..3)
                .map(|dy| VoxelUpdate::new(min.offset(0, GROUND as i32 + dy + 1, 0), LEAVES))
                .collect()
        }
    }

    /// A tree on the east edge of chunk (0, 0) whose canopy reaches 2 voxels
    /// into chunks (1, -1) and (1, 0).
    struct SeamTree;

    impl SeamTree {
        fn canopy() -> Vec<VoxelPos> {
            let trunk_x = SIZE as i32 - 1;
            let mut leaves = Vec::new();
            for dx in -2..=2 {
                for dz in -2..=2 {
                    leaves.push(VoxelPos::new(trunk_x + dx, GROUND as i32 + 4, dz));
                }
            }
            leaves
        }
    }

    impl StructureGenerator for SeamTree {
        fn name(&self) -> &str {
            "seam-tree"
        }

        fn generate(&self, neighborhood: &Neighborhood<'_>) -> Vec<VoxelUpdate> {
            if neighborhood.coord() != ChunkCoord::new(0, 0) {
                return Vec::new();
            }
            let trunk_x = SIZE as i32 - 1;
            let top = neighborhood.column_top(trunk_x, 0).unwrap_or(0);
            let mut updates: Vec<_> = (1..=3)
                .map(|dy| VoxelUpdate::new(VoxelPos::new(trunk_x, top + dy, 0), STONE))
                .collect();
            updates.extend(
                Self::canopy()
                    .into_iter()
                    .map(|position| VoxelUpdate::new(position, LEAVES)),
            );
            updates
        }
    }

    #[tokio::test]
    async fn test_tree_on_seam_survives_neighbor_decoration() {
        let chunks = Chunks::new(config(), flat(), Builder::new().with_generator(SeamTree));

        chunks
            .generate(&view_at_chunk(ChunkCoord::new(0, 0), 1))
            .await
            .expect("origin");
        let east = chunks.raw(ChunkCoord::new(1, 0)).expect("east");
        assert_eq!(east.stage(), ChunkStage::TerrainReady);
        for position in SeamTree::canopy() {
            assert_eq!(chunks.voxel(position), Some(LEAVES), "{position}");
        }

        chunks
            .generate(&view_at_chunk(ChunkCoord::new(1, 0), 1))
            .await
            .expect("east");
        assert!(chunks.get(ChunkCoord::new(1, 0)).is_some());
        for position in SeamTree::canopy() {
            assert_eq!(chunks.voxel(position), Some(LEAVES), "{position}");
        }
        assert_eq!(
            chunks.max_height(SIZE as i32 + 1, 0),
            Some(GROUND + 4),
            "height map includes the overhanging canopy"
        );
    }

    #[tokio::test]
    async fn test_terrain_failure_is_retried() {
        let failed_once = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&failed_once);
        let terrain: Arc<dyn TerrainGenerator> = Arc::new(
            move |coord: ChunkCoord, volume: &mut ChunkVolume| -> Result<(), TerrainError> {
                if coord == ChunkCoord::new(1, 1) && !flag.swap(true, Ordering::SeqCst) {
                    return Err(TerrainError::Failed("transient".into()));
                }
                fill(volume);
                Ok(())
            },
        );
        let (chunks, probe) = probed(terrain);
        let view = view_at_chunk(ChunkCoord::new(0, 0), 1);

        let first = chunks.generate(&view).await.expect("first");
        assert_eq!(first.terrain_failed, 1);
        assert_eq!(first.terrain_generated, 24);
        assert_eq!(first.decorated, 0);
        assert_eq!(first.deferred, 1);
        assert!(chunks.raw(ChunkCoord::new(1, 1)).expect("exists").needs_terrain());
        assert!(chunks.get(ChunkCoord::new(0, 0)).is_none());

        let second = chunks.generate(&view).await.expect("second");
        assert_eq!(second.terrain_generated, 1);
        assert_eq!(second.decorated, 1);
        assert!(chunks.get(ChunkCoord::new(0, 0)).is_some());
        assert_eq!(probe.violations.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_neighbors_link_both_ways() {
        let (chunks, _) = probed(flat());
        let (origin, created) = chunks.get_or_create(ChunkCoord::new(0, 0));
        assert!(created);
        assert_eq!(origin.neighbor_count(), 0);

        let (east, _) = chunks.get_or_create(ChunkCoord::new(1, 0));
        let (_, created) = chunks.get_or_create(ChunkCoord::new(0, 0));
        assert!(!created);
        assert_eq!(origin.neighbors(), vec![ChunkCoord::new(1, 0)]);
        assert_eq!(east.neighbors(), vec![ChunkCoord::new(0, 0)]);
        assert_eq!(chunks.constructed_count(), 2);
    }

    #[test]
    fn test_create_twice_is_rejected() {
        let (chunks, _) = probed(flat());
        chunks.create(ChunkCoord::new(4, 4)).expect("first");
        assert!(matches!(
            chunks.create(ChunkCoord::new(4, 4)),
            Err(WorldError::ChunkCreationRace { coord }) if coord == ChunkCoord::new(4, 4)
        ));
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn test_set_voxel_never_creates() {
        let (chunks, _) = probed(flat());
        chunks.create(ChunkCoord::new(0, 0)).expect("create");

        assert!(chunks.set_voxel(VoxelPos::new(1, 1, 1), STONE).is_ok());
        assert_eq!(chunks.voxel(VoxelPos::new(1, 1, 1)), Some(STONE));
        for position in [
            VoxelPos::new(SIZE as i32, 1, 1),
            VoxelPos::new(1, -1, 1),
            VoxelPos::new(1, HEIGHT as i32, 1),
        ] {
            assert!(matches!(
                chunks.set_voxel(position, STONE),
                Err(WorldError::VoxelWriteOutOfBounds { .. })
            ));
        }
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks.voxel(VoxelPos::new(-1, 0, 0)), None);
    }
}
