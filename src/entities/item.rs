use crate::entities::decay::Decay;
use crate::entities::thing::Placeable;
use crate::world::item_types::ItemType;
use crate::world::position::Position;
use serde::Deserialize;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Largest amount a cumulative item holds in one stack entry.
pub const MAX_STACK_AMOUNT: u8 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ItemId(pub u32);

static NEXT_ITEM_ID: AtomicU32 = AtomicU32::new(1);

impl ItemId {
    pub fn next() -> Self {
        let id = NEXT_ITEM_ID.fetch_add(1, Ordering::Relaxed);
        ItemId(id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(transparent)]
pub struct ItemTypeId(pub u16);

impl fmt::Display for ItemTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum LiquidType {
    #[default]
    None = 0,
    Water = 1,
    Blood = 2,
    Beer = 3,
    Slime = 4,
    Lemonade = 5,
    Milk = 6,
    Mana = 7,
    Life = 10,
    Oil = 11,
    Urine = 13,
    Wine = 15,
    Mud = 19,
    Lava = 26,
}

impl LiquidType {
    pub fn wire_byte(self) -> u8 {
        self as u8
    }

    pub fn from_wire(byte: u8) -> Option<Self> {
        let liquid = match byte {
            0 => LiquidType::None,
            1 => LiquidType::Water,
            2 => LiquidType::Blood,
            3 => LiquidType::Beer,
            4 => LiquidType::Slime,
            5 => LiquidType::Lemonade,
            6 => LiquidType::Milk,
            7 => LiquidType::Mana,
            10 => LiquidType::Life,
            11 => LiquidType::Oil,
            13 => LiquidType::Urine,
            15 => LiquidType::Wine,
            19 => LiquidType::Mud,
            26 => LiquidType::Lava,
            _ => return None,
        };
        Some(liquid)
    }
}

#[derive(Debug, Clone)]
pub struct Item {
    pub id: ItemId,
    item_type: Arc<ItemType>,
    pub amount: u8,
    pub liquid: LiquidType,
    pub decay: Option<Decay>,
    tile: Option<Position>,
}

impl PartialEq for Item {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Item {}

impl Item {
    pub fn new(item_type: Arc<ItemType>) -> Self {
        let decay = item_type.decay.as_ref().map(Decay::from_rule);
        Self {
            id: ItemId::next(),
            item_type,
            amount: 1,
            liquid: LiquidType::None,
            decay,
            tile: None,
        }
    }

    pub fn with_amount(mut self, amount: u8) -> Self {
        self.amount = amount;
        self
    }

    pub fn with_liquid(mut self, liquid: LiquidType) -> Self {
        self.liquid = liquid;
        self
    }

    pub fn item_type(&self) -> &ItemType {
        &self.item_type
    }

    pub fn shared_type(&self) -> &Arc<ItemType> {
        &self.item_type
    }

    pub fn type_id(&self) -> ItemTypeId {
        self.item_type.id
    }

    pub fn client_id(&self) -> u16 {
        self.item_type.client_id
    }

    pub fn is_cumulative(&self) -> bool {
        self.item_type.is_cumulative()
    }

    pub fn is_liquid(&self) -> bool {
        self.item_type.is_liquid_pool() || self.item_type.is_liquid_container()
    }

    /// Same type and still room below the stack cap.
    pub fn can_absorb(&self, other: &Item) -> bool {
        self.is_cumulative() && self.type_id() == other.type_id() && self.amount < MAX_STACK_AMOUNT
    }
}

impl Placeable for Item {
    fn tile(&self) -> Option<Position> {
        self.tile
    }

    fn set_tile(&mut self, tile: Option<Position>) {
        self.tile = tile;
    }

    fn added(&mut self) {
        if let Some(decay) = self.decay.as_mut() {
            decay.start(Instant::now());
        }
    }

    fn removed(&mut self) {
        if let Some(decay) = self.decay.as_mut() {
            decay.pause(Instant::now());
        }
    }
}
