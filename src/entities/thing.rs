use crate::entities::creature::{Creature, CreatureId};
use crate::entities::item::{Item, ItemId};
use crate::world::position::Position;

/// Anything that can sit on a tile. The tile position is a lookup key kept
/// current by the tile on add/remove, never an ownership link.
pub trait Placeable {
    fn tile(&self) -> Option<Position>;

    fn set_tile(&mut self, tile: Option<Position>);

    fn added(&mut self) {}

    fn removed(&mut self) {}
}

/// An occupant handed to a tile. Items move into the tile; creatures stay
/// owned by the caller and only their id is recorded.
#[derive(Debug)]
pub enum Thing<'a> {
    Item(Item),
    Creature(&'a mut Creature),
}

impl<'a> From<Item> for Thing<'a> {
    fn from(item: Item) -> Self {
        Thing::Item(item)
    }
}

impl<'a> From<&'a mut Creature> for Thing<'a> {
    fn from(creature: &'a mut Creature) -> Self {
        Thing::Creature(creature)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThingKey {
    Item(ItemId),
    Creature(CreatureId),
}

impl From<ItemId> for ThingKey {
    fn from(id: ItemId) -> Self {
        ThingKey::Item(id)
    }
}

impl From<CreatureId> for ThingKey {
    fn from(id: CreatureId) -> Self {
        ThingKey::Creature(id)
    }
}

/// A borrowed view of whatever occupies one stack position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackEntry<'a> {
    Item(&'a Item),
    Creature(CreatureId),
}

impl<'a> StackEntry<'a> {
    pub fn key(&self) -> ThingKey {
        match self {
            StackEntry::Item(item) => ThingKey::Item(item.id),
            StackEntry::Creature(id) => ThingKey::Creature(*id),
        }
    }

    pub fn as_item(self) -> Option<&'a Item> {
        match self {
            StackEntry::Item(item) => Some(item),
            StackEntry::Creature(_) => None,
        }
    }
}
