use crate::entities::thing::Placeable;
use crate::world::position::Position;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CreatureId(pub u32);

impl fmt::Display for CreatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Creature {
    pub id: CreatureId,
    pub name: String,
    tile: Option<Position>,
}

impl Creature {
    pub fn new(id: u32, name: &str) -> Self {
        Self {
            id: CreatureId(id),
            name: name.to_string(),
            tile: None,
        }
    }
}

impl Placeable for Creature {
    fn tile(&self) -> Option<Position> {
        self.tile
    }

    fn set_tile(&mut self, tile: Option<Position>) {
        self.tile = tile;
    }
}
