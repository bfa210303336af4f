//! Block type registry.
//!
//! Maps block names to [`BlockId`]s and carries the per-type flags that
//! terrain and structure generators consult (e.g. whether plants may grow on
//! a block). ID `0` is always the empty voxel.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use strata_common::BlockId;
use thiserror::Error;

/// Names of the built-in palette.
pub mod names {
    /// Empty voxel
    pub const AIR: &str = "Air";
    /// Bedrock-like filler
    pub const STONE: &str = "Stone";
    /// Sub-surface soil
    pub const DIRT: &str = "Dirt";
    /// Surface soil above sea level
    pub const GRASS_BLOCK: &str = "Grass Block";
    /// Surface near and below sea level
    pub const SAND: &str = "Sand";
    /// Fills air below sea level
    pub const WATER: &str = "Water";
    /// Tree trunk
    pub const TRUNK: &str = "Trunk";
    /// Tree canopy
    pub const LEAVES: &str = "Leaves";
    /// Autumn canopy
    pub const LEAVES_ORANGE: &str = "Leaves Orange";
    /// Short grass plant
    pub const GRASS: &str = "Grass";
    /// Dry grass plant
    pub const TAN_GRASS: &str = "Tan Grass";
    /// Dead grass plant
    pub const BROWN_GRASS: &str = "Brown Grass";
    /// Mushroom variant
    pub const BROWN_MUSHROOM: &str = "Brown Mushroom";
    /// Mushroom variant
    pub const RED_MUSHROOM: &str = "Red Mushroom";
    /// Mushroom variant
    pub const TAN_MUSHROOM: &str = "Tan Mushroom";
    /// Light-emitting marker block
    pub const LAMP: &str = "Lamp";
}

/// Registry errors.
#[derive(Debug, Error)]
pub enum BlockError {
    /// A block with this name already exists
    #[error("Block name taken: {0}")]
    NameTaken(String),
    /// No block with this name exists
    #[error("Unknown block: {0}")]
    Unknown(String),
    /// Palette file could not be parsed
    #[error("Block palette parse failed: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Properties of a block type.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockType {
    /// Unique display name
    pub name: String,
    /// Occupies no space
    pub is_empty: bool,
    /// Blocks movement
    pub is_solid: bool,
    /// Flows
    pub is_fluid: bool,
    /// Lets light through
    pub is_transparent: bool,
    /// Emits light
    pub is_light: bool,
    /// Is a plant (non-full block)
    pub is_plant: bool,
    /// Plants and trees may grow on top of it
    pub is_plantable: bool,
}

impl BlockType {
    /// Creates a solid opaque block with the given name.
    #[must_use]
    pub fn solid(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            is_solid: true,
            ..Self::default()
        }
    }

    fn plantable(mut self) -> Self {
        self.is_plantable = true;
        self
    }

    fn transparent(mut self) -> Self {
        self.is_transparent = true;
        self
    }

    fn plant(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            is_transparent: true,
            is_plant: true,
            ..Self::default()
        }
    }
}

#[derive(Debug, Deserialize)]
struct Palette {
    #[serde(default, rename = "block")]
    blocks: Vec<BlockType>,
}

/// Registry of block types indexed by [`BlockId`].
#[derive(Debug, Clone)]
pub struct BlockRegistry {
    blocks: Vec<BlockType>,
    by_name: AHashMap<String, BlockId>,
}

impl BlockRegistry {
    /// Creates a registry containing only air.
    #[must_use]
    pub fn empty() -> Self {
        let air = BlockType {
            name: names::AIR.to_owned(),
            is_empty: true,
            is_transparent: true,
            ..BlockType::default()
        };
        let mut by_name = AHashMap::new();
        by_name.insert(air.name.clone(), BlockId::AIR);
        Self {
            blocks: vec![air],
            by_name,
        }
    }

    /// Parses a palette of `[[block]]` tables, registered after air in file order.
    pub fn from_toml_str(contents: &str) -> Result<Self, BlockError> {
        let palette: Palette = toml::from_str(contents)?;
        let mut registry = Self::empty();
        for block in palette.blocks {
            registry.register(block)?;
        }
        Ok(registry)
    }

    /// Registers a new block type and returns its ID.
    pub fn register(&mut self, block: BlockType) -> Result<BlockId, BlockError> {
        if self.by_name.contains_key(&block.name) {
            return Err(BlockError::NameTaken(block.name));
        }
        Ok(self.push(block))
    }

    fn push(&mut self, block: BlockType) -> BlockId {
        let id = BlockId::new(self.blocks.len() as u32);
        self.by_name.insert(block.name.clone(), id);
        self.blocks.push(block);
        id
    }

    /// Gets a block type by ID.
    #[must_use]
    pub fn get(&self, id: BlockId) -> Option<&BlockType> {
        self.blocks.get(id.raw() as usize)
    }

    /// Gets a block ID by name.
    #[must_use]
    pub fn id_of(&self, name: &str) -> Option<BlockId> {
        self.by_name.get(name).copied()
    }

    /// Gets a block ID by name, failing if it is not registered.
    pub fn require(&self, name: &str) -> Result<BlockId, BlockError> {
        self.id_of(name)
            .ok_or_else(|| BlockError::Unknown(name.to_owned()))
    }

    /// Whether plants and trees may be placed on top of this block.
    #[must_use]
    pub fn is_plantable(&self, id: BlockId) -> bool {
        self.get(id).is_some_and(|block| block.is_plantable)
    }

    /// Number of registered types, including air.
    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Always false: air is always registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Iterates over `(id, type)` pairs in ID order.
    pub fn iter(&self) -> impl Iterator<Item = (BlockId, &BlockType)> {
        self.blocks
            .iter()
            .enumerate()
            .map(|(i, block)| (BlockId::new(i as u32), block))
    }
}

impl Default for BlockRegistry {
    /// The built-in palette used by the default terrain and structures.
    fn default() -> Self {
        let palette = [
            BlockType::solid(names::STONE),
            BlockType::solid(names::DIRT).plantable(),
            BlockType::solid(names::GRASS_BLOCK).plantable(),
            BlockType::solid(names::SAND),
            BlockType {
                name: names::WATER.to_owned(),
                is_fluid: true,
                is_transparent: true,
                ..BlockType::default()
            },
            BlockType::solid(names::TRUNK),
            BlockType::solid(names::LEAVES).transparent(),
            BlockType::solid(names::LEAVES_ORANGE).transparent(),
            BlockType::plant(names::GRASS),
            BlockType::plant(names::TAN_GRASS),
            BlockType::plant(names::BROWN_GRASS),
            BlockType::plant(names::BROWN_MUSHROOM),
            BlockType::plant(names::RED_MUSHROOM),
            BlockType::plant(names::TAN_MUSHROOM),
            BlockType {
                name: names::LAMP.to_owned(),
                is_solid: true,
                is_light: true,
                ..BlockType::default()
            },
        ];

        let mut registry = Self::empty();
        for block in palette {
            registry.push(block);
        }
        registry
    }
}
