//! Player tracking.
//!
//! Keeps each connected client's [`ClientView`] and asks the world to load
//! the surrounding area when a client joins, changes its render radius, or
//! crosses into another chunk. Movement within a chunk loads nothing.

use std::sync::Arc;

use dashmap::DashMap;
use glam::Vec3;
use strata_common::{ChunkCoord, ClientId, WorldError};
use strata_world::{ClientView, LoadReport, World};
use thiserror::Error;
use tracing::{debug, info};

/// Player tracking errors.
#[derive(Debug, Error)]
pub enum PlayerError {
    /// No client with this ID has joined
    #[error("Unknown client: {0}")]
    UnknownClient(ClientId),
    /// Loading the client's area failed
    #[error(transparent)]
    World(#[from] WorldError),
}

/// Tracks connected clients and drives area loading.
pub struct PlayerTracker {
    world: Arc<World>,
    players: DashMap<ClientId, ClientView>,
}

impl PlayerTracker {
    /// Creates a tracker with no clients.
    #[must_use]
    pub fn new(world: Arc<World>) -> Self {
        Self {
            world,
            players: DashMap::new(),
        }
    }

    /// Registers a client and loads its area.
    pub async fn join(
        &self,
        id: ClientId,
        position: Vec3,
        render_radius: u32,
    ) -> Result<LoadReport, PlayerError> {
        let view = ClientView::new(id, position, render_radius);
        self.players.insert(id, view);
        info!(client = %id, chunk = %self.chunk_of(&view), render_radius, "Client joined");
        Ok(self.world.generate(&view).await?)
    }

    /// Moves a client. Loads its area only when it entered another chunk.
    pub async fn update_position(
        &self,
        id: ClientId,
        position: Vec3,
    ) -> Result<Option<LoadReport>, PlayerError> {
        let (previous, view) = {
            let mut entry = self
                .players
                .get_mut(&id)
                .ok_or(PlayerError::UnknownClient(id))?;
            let previous = self.chunk_of(&entry);
            entry.position = position;
            (previous, *entry)
        };

        let current = self.chunk_of(&view);
        if current == previous {
            return Ok(None);
        }
        debug!(client = %id, from = %previous, to = %current, "Client crossed chunk boundary");
        Ok(Some(self.world.generate(&view).await?))
    }

    /// Changes a client's render radius and loads its area.
    pub async fn set_render_radius(
        &self,
        id: ClientId,
        render_radius: u32,
    ) -> Result<LoadReport, PlayerError> {
        let view = {
            let mut entry = self
                .players
                .get_mut(&id)
                .ok_or(PlayerError::UnknownClient(id))?;
            entry.render_radius = render_radius;
            *entry
        };
        Ok(self.world.generate(&view).await?)
    }

    /// Forgets a client. Its chunks stay resident.
    pub fn leave(&self, id: ClientId) -> Result<ClientView, PlayerError> {
        let (_, view) = self
            .players
            .remove(&id)
            .ok_or(PlayerError::UnknownClient(id))?;
        info!(client = %id, "Client left");
        Ok(view)
    }

    /// A client's current view.
    #[must_use]
    pub fn view(&self, id: ClientId) -> Option<ClientView> {
        self.players.get(&id).map(|entry| *entry)
    }

    /// Number of connected clients.
    #[must_use]
    pub fn len(&self) -> usize {
        self.players.len()
    }

    /// Whether no client is connected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    fn chunk_of(&self, view: &ClientView) -> ChunkCoord {
        let config = self.world.config();
        view.chunk(config.chunk_size, config.dimension)
    }
}
