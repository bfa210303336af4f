//! Line-oriented operator console.
//!
//! Commands:
//! - `join <x> <y> <z> [radius]` registers a client at a world position
//! - `move <client> <x> <y> <z>` moves a client
//! - `radius <client> <radius>` changes a client's render radius
//! - `leave <client>` forgets a client
//! - `set <x> <y> <z> <block>` writes a voxel (block by name or ID)
//! - `get <x> <y> <z>` reads a voxel
//! - `chunk <cx> <cz>` shows a chunk's stage
//! - `stats` shows chunk counts by stage
//! - `help`, `quit`

use std::str::FromStr;
use std::sync::Arc;

use glam::Vec3;
use strata_common::{BlockId, ChunkCoord, ClientId, VoxelPos, WorldError};
use strata_world::{LoadReport, World};
use thiserror::Error;

use crate::players::{PlayerError, PlayerTracker};

/// Console errors.
#[derive(Debug, Error)]
pub enum ConsoleError {
    /// Blank line
    #[error("Empty command")]
    Empty,
    /// First word is not a command
    #[error("Unknown command: {0} (try `help`)")]
    UnknownCommand(String),
    /// A required argument is missing
    #[error("Missing argument <{0}>")]
    MissingArgument(&'static str),
    /// More arguments than the command takes
    #[error("Unexpected argument: {0}")]
    UnexpectedArgument(String),
    /// An argument failed to parse
    #[error("Invalid <{name}>: {value}")]
    InvalidArgument {
        /// Argument name
        name: &'static str,
        /// Offending text
        value: String,
    },
    /// Block name or ID not in the registry
    #[error("Unknown block: {0}")]
    UnknownBlock(String),
    /// Player tracking failed
    #[error(transparent)]
    Player(#[from] PlayerError),
    /// World operation failed
    #[error(transparent)]
    World(#[from] WorldError),
}

/// A parsed console command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Register a client
    Join {
        /// World position
        position: Vec3,
        /// Render radius, the configured default when absent
        radius: Option<u32>,
    },
    /// Move a client
    Move {
        /// Client
        client: ClientId,
        /// New world position
        position: Vec3,
    },
    /// Change a client's render radius
    Radius {
        /// Client
        client: ClientId,
        /// New render radius
        radius: u32,
    },
    /// Forget a client
    Leave {
        /// Client
        client: ClientId,
    },
    /// Write a voxel
    Set {
        /// Voxel position
        position: VoxelPos,
        /// Block name or numeric ID
        block: String,
    },
    /// Read a voxel
    Get {
        /// Voxel position
        position: VoxelPos,
    },
    /// Show a chunk's stage
    Chunk {
        /// Chunk coordinate
        coord: ChunkCoord,
    },
    /// Show chunk counts
    Stats,
    /// Show usage
    Help,
    /// Stop the server
    Quit,
}

struct Args<'a> {
    words: std::str::SplitWhitespace<'a>,
}

impl<'a> Args<'a> {
    fn word(&mut self, name: &'static str) -> Result<&'a str, ConsoleError> {
        self.words.next().ok_or(ConsoleError::MissingArgument(name))
    }

    fn parse<T: FromStr>(&mut self, name: &'static str) -> Result<T, ConsoleError> {
        let value = self.word(name)?;
        value.parse().map_err(|_| ConsoleError::InvalidArgument {
            name,
            value: value.to_owned(),
        })
    }

    fn optional<T: FromStr>(&mut self, name: &'static str) -> Result<Option<T>, ConsoleError> {
        match self.words.next() {
            Some(value) => value.parse().map(Some).map_err(|_| ConsoleError::InvalidArgument {
                name,
                value: value.to_owned(),
            }),
            None => Ok(None),
        }
    }

    fn client(&mut self) -> Result<ClientId, ConsoleError> {
        self.parse("client").map(ClientId::from_raw)
    }

    fn position(&mut self) -> Result<Vec3, ConsoleError> {
        Ok(Vec3::new(
            self.parse("x")?,
            self.parse("y")?,
            self.parse("z")?,
        ))
    }

    fn voxel(&mut self) -> Result<VoxelPos, ConsoleError> {
        Ok(VoxelPos::new(
            self.parse("x")?,
            self.parse("y")?,
            self.parse("z")?,
        ))
    }

    fn rest(&mut self, name: &'static str) -> Result<String, ConsoleError> {
        let words: Vec<&str> = self.words.by_ref().collect();
        if words.is_empty() {
            return Err(ConsoleError::MissingArgument(name));
        }
        Ok(words.join(" "))
    }

    fn finish(mut self) -> Result<(), ConsoleError> {
        match self.words.next() {
            Some(extra) => Err(ConsoleError::UnexpectedArgument(extra.to_owned())),
            None => Ok(()),
        }
    }
}

impl Command {
    /// Parses one console line.
    pub fn parse(line: &str) -> Result<Self, ConsoleError> {
        let mut words = line.split_whitespace();
        let name = words.next().ok_or(ConsoleError::Empty)?;
        let mut args = Args { words };

        let command = match name.to_ascii_lowercase().as_str() {
            "join" => Self::Join {
                position: args.position()?,
                radius: args.optional("radius")?,
            },
            "move" => Self::Move {
                client: args.client()?,
                position: args.position()?,
            },
            "radius" => Self::Radius {
                client: args.client()?,
                radius: args.parse("radius")?,
            },
            "leave" => Self::Leave {
                client: args.client()?,
            },
            "set" => Self::Set {
                position: args.voxel()?,
                block: args.rest("block")?,
            },
            "get" => Self::Get {
                position: args.voxel()?,
            },
            "chunk" => Self::Chunk {
                coord: ChunkCoord::new(args.parse("cx")?, args.parse("cz")?),
            },
            "stats" => Self::Stats,
            "help" | "?" => Self::Help,
            "quit" | "exit" => Self::Quit,
            _ => return Err(ConsoleError::UnknownCommand(name.to_owned())),
        };
        args.finish()?;
        Ok(command)
    }
}

/// Result of running a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Text for the operator
    Text(String),
    /// Stop reading commands
    Quit,
}

/// Executes commands against a world and its clients.
pub struct Console {
    world: Arc<World>,
    players: PlayerTracker,
    default_radius: u32,
}

impl Console {
    /// Creates a console with no clients.
    #[must_use]
    pub fn new(world: Arc<World>, default_radius: u32) -> Self {
        Self {
            players: PlayerTracker::new(Arc::clone(&world)),
            world,
            default_radius,
        }
    }

    /// Connected clients.
    #[must_use]
    pub const fn players(&self) -> &PlayerTracker {
        &self.players
    }

    /// Runs one command.
    pub async fn execute(&self, command: Command) -> Result<Reply, ConsoleError> {
        let text = match command {
            Command::Join { position, radius } => {
                let id = ClientId::new();
                let radius = radius.unwrap_or(self.default_radius);
                let report = self.players.join(id, position, radius).await?;
                format!("{id} joined; {}", describe(&report))
            },
            Command::Move { client, position } => {
                match self.players.update_position(client, position).await? {
                    Some(report) => format!("{client} moved; {}", describe(&report)),
                    None => format!("{client} moved within its chunk"),
                }
            },
            Command::Radius { client, radius } => {
                let report = self.players.set_render_radius(client, radius).await?;
                format!("{client} radius {radius}; {}", describe(&report))
            },
            Command::Leave { client } => {
                self.players.leave(client)?;
                format!("{client} left")
            },
            Command::Set { position, block } => {
                let id = self.block_id(&block)?;
                self.world.set_voxel(position, id)?;
                format!("{position} = {}", self.block_name(id))
            },
            Command::Get { position } => match self.world.voxel(position) {
                Some(id) => format!("{position} = {} ({id})", self.block_name(id)),
                None => format!("{position} is not loaded"),
            },
            Command::Chunk { coord } => match self.world.raw(coord) {
                Some(chunk) => format!(
                    "chunk {coord}: {:?}, {} neighbors, servable: {}",
                    chunk.stage(),
                    chunk.neighbor_count(),
                    chunk.is_servable()
                ),
                None => format!("chunk {coord} does not exist"),
            },
            Command::Stats => {
                let stats = self.world.stats();
                format!(
                    "{} chunks ({} servable): {} created, {} terrain pending, {} terrain ready, \
                     {} decoration pending, {} decorated, {} height-mapped; {} clients",
                    stats.total,
                    stats.servable,
                    stats.created,
                    stats.terrain_pending,
                    stats.terrain_ready,
                    stats.decoration_pending,
                    stats.decorated,
                    stats.height_mapped,
                    self.players.len()
                )
            },
            Command::Help => HELP.to_owned(),
            Command::Quit => return Ok(Reply::Quit),
        };
        Ok(Reply::Text(text))
    }

    fn block_id(&self, block: &str) -> Result<BlockId, ConsoleError> {
        let registry = self.world.registry();
        let id = match block.parse::<u32>() {
            Ok(raw) => Some(BlockId::new(raw)).filter(|id| registry.get(*id).is_some()),
            Err(_) => registry.id_of(block),
        };
        id.ok_or_else(|| ConsoleError::UnknownBlock(block.to_owned()))
    }

    fn block_name(&self, id: BlockId) -> &str {
        self.world
            .registry()
            .get(id)
            .map_or("?", |block| block.name.as_str())
    }
}

const HELP: &str = "\
join <x> <y> <z> [radius]   register a client
move <client> <x> <y> <z>   move a client
radius <client> <radius>    change a client's render radius
leave <client>              forget a client
set <x> <y> <z> <block>     write a voxel (block name or ID)
get <x> <y> <z>             read a voxel
chunk <cx> <cz>             show a chunk's stage
stats                       chunk counts by stage
quit                        stop the server";

fn describe(report: &LoadReport) -> String {
    format!(
        "center {}: {} created, {} terrained, {} failed, {} decorated, {} deferred",
        report.center,
        report.created,
        report.terrain_generated,
        report.terrain_failed,
        report.decorated,
        report.deferred
    )
}
