use crate::entities::item::ItemTypeId;
use crate::world::tile::{StackLayer, TileError};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemGroup {
    #[default]
    None,
    Ground,
    Splash,
    Fluid,
    Container,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemFlag {
    BlockSolid,
    BlockProjectile,
    BlockPathFind,
    BlockLay,
    Collision,
    Separation,
    Stackable,
    AlwaysOnTop,
}

/// Field damage bits, matched against the avoid mask of a walk check.
pub mod damage {
    pub const FIRE: u8 = 1 << 0;
    pub const ENERGY: u8 = 1 << 1;
    pub const POISON: u8 = 1 << 2;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct DecayRule {
    pub duration_secs: u32,
    #[serde(default)]
    pub target: Option<ItemTypeId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ItemType {
    pub id: ItemTypeId,
    pub client_id: u16,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub group: ItemGroup,
    #[serde(default)]
    pub flags: Vec<ItemFlag>,
    #[serde(default)]
    pub always_on_top_order: u8,
    #[serde(default)]
    pub speed: u16,
    #[serde(default)]
    pub floor_change: Option<String>,
    #[serde(default)]
    pub field_damage: u8,
    #[serde(default)]
    pub decay: Option<DecayRule>,
}

impl ItemType {
    pub fn new(id: u16, client_id: u16) -> Self {
        Self {
            id: ItemTypeId(id),
            client_id,
            name: String::new(),
            group: ItemGroup::None,
            flags: Vec::new(),
            always_on_top_order: 0,
            speed: 0,
            floor_change: None,
            field_damage: 0,
            decay: None,
        }
    }

    pub fn with_group(mut self, group: ItemGroup) -> Self {
        self.group = group;
        self
    }

    pub fn with_flag(mut self, flag: ItemFlag) -> Self {
        if !self.flags.contains(&flag) {
            self.flags.push(flag);
        }
        self
    }

    pub fn on_top(self, order: u8) -> Self {
        let mut item_type = self.with_flag(ItemFlag::AlwaysOnTop);
        item_type.always_on_top_order = order;
        item_type
    }

    pub fn with_speed(mut self, speed: u16) -> Self {
        self.speed = speed;
        self
    }

    pub fn with_floor_change(mut self, token: &str) -> Self {
        self.floor_change = Some(token.to_string());
        self
    }

    pub fn with_field_damage(mut self, mask: u8) -> Self {
        self.field_damage = mask;
        self
    }

    pub fn with_decay(mut self, duration_secs: u32, target: Option<u16>) -> Self {
        self.decay = Some(DecayRule {
            duration_secs,
            target: target.map(ItemTypeId),
        });
        self
    }

    pub fn has_flag(&self, flag: ItemFlag) -> bool {
        self.flags.contains(&flag)
    }

    pub fn is_ground(&self) -> bool {
        self.group == ItemGroup::Ground
    }

    pub fn is_cumulative(&self) -> bool {
        self.has_flag(ItemFlag::Stackable)
    }

    pub fn is_liquid_pool(&self) -> bool {
        self.group == ItemGroup::Splash
    }

    pub fn is_liquid_container(&self) -> bool {
        self.group == ItemGroup::Fluid
    }

    pub fn has_collision(&self) -> bool {
        self.has_flag(ItemFlag::Collision)
    }

    pub fn has_separation(&self) -> bool {
        self.has_flag(ItemFlag::Separation)
    }

    pub fn blocks_pass(&self) -> bool {
        self.has_flag(ItemFlag::BlockSolid)
    }

    pub fn blocks_throw(&self) -> bool {
        self.has_flag(ItemFlag::BlockProjectile)
    }

    pub fn blocks_lay(&self) -> bool {
        self.has_flag(ItemFlag::BlockLay)
    }

    pub fn is_path_blocking(&self, avoid_damage: u8) -> bool {
        self.blocks_pass()
            || self.has_collision()
            || self.has_flag(ItemFlag::BlockPathFind)
            || self.field_damage & avoid_damage != 0
    }

    /// Which tile layer instances of this type are placed on.
    pub fn layer(&self) -> Result<StackLayer, TileError> {
        let on_top = self.has_flag(ItemFlag::AlwaysOnTop);
        match (self.is_ground(), on_top, self.always_on_top_order) {
            (true, false, _) => Ok(StackLayer::Ground),
            (false, false, _) => Ok(StackLayer::Down),
            (false, true, 1) => Ok(StackLayer::TopA),
            (false, true, 2 | 3) => Ok(StackLayer::TopB),
            _ => Err(TileError::InvalidClassification(self.id)),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read item catalog {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid item catalog: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("item type {0} defined twice")]
    Duplicate(u16),
    #[error("item type rejected: {0}")]
    Classification(#[from] TileError),
}

#[derive(Debug, Deserialize)]
struct ItemCatalog {
    #[serde(default)]
    items: Vec<ItemType>,
}

#[derive(Debug, Default, Clone)]
pub struct ItemTypeIndex {
    types: HashMap<ItemTypeId, Arc<ItemType>>,
}

impl ItemTypeIndex {
    pub fn get(&self, id: ItemTypeId) -> Option<&Arc<ItemType>> {
        self.types.get(&id)
    }

    pub fn insert(&mut self, item_type: ItemType) -> Result<(), LoadError> {
        if self.types.contains_key(&item_type.id) {
            return Err(LoadError::Duplicate(item_type.id.0));
        }
        item_type.layer()?;
        self.types.insert(item_type.id, Arc::new(item_type));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

pub fn load_item_types(path: &Path) -> Result<ItemTypeIndex, LoadError> {
    let content = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_item_types(&content)
}

pub fn parse_item_types(content: &str) -> Result<ItemTypeIndex, LoadError> {
    let catalog: ItemCatalog = serde_yaml::from_str(content)?;
    let mut index = ItemTypeIndex::default();
    for item_type in catalog.items {
        index.insert(item_type)?;
    }
    tracing::debug!(types = index.len(), "item catalog parsed");
    Ok(index)
}
