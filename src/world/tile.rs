use crate::entities::creature::{Creature, CreatureId};
use crate::entities::item::{Item, ItemId, ItemTypeId, MAX_STACK_AMOUNT};
use crate::entities::thing::{Placeable, StackEntry, Thing, ThingKey};
use crate::net::buffer_pool::BufferPool;
use crate::net::packet::PacketWriter;
use crate::world::floor_change::FloorChangeDirection;
use crate::world::position::Position;
use std::sync::Arc;

/// Objects the client draws per cell; the cached description stops here.
pub const MAX_CACHED_OBJECTS: usize = 9;
/// Two id bytes plus one suffix byte for every cached object.
pub const MAX_CACHE_BYTES: usize = MAX_CACHED_OBJECTS * 3;
pub const DEFAULT_GROUND_SPEED: u16 = 150;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StackLayer {
    Ground,
    TopA,
    TopB,
    Creature,
    Down,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TileError {
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    #[error("{0:?} is not on this tile")]
    NotFound(ThingKey),
    #[error("cannot take {requested} from item {item:?} holding {amount} without splitting it")]
    UnsupportedOperation {
        item: ItemId,
        amount: u8,
        requested: u8,
    },
    #[error("item type {0} has no valid stack layer")]
    InvalidClassification(ItemTypeId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct TileFlags(u8);

impl TileFlags {
    pub const PROTECTION_ZONE: TileFlags = TileFlags(1 << 0);
    pub const NO_LOGOUT: TileFlags = TileFlags(1 << 1);
    pub const REFRESH: TileFlags = TileFlags(1 << 2);

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn contains(self, flag: TileFlags) -> bool {
        self.0 & flag.0 != 0
    }

    pub fn insert(&mut self, flag: TileFlags) {
        self.0 |= flag.0;
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathError {
    None,
    NotEnoughRoom,
}

/// Everything occupying one map coordinate.
///
/// Item layers are stored bottom first, so the newest entry is the last
/// element. Stack positions count ground as 0 and everything else from 1
/// in the order ground, top A, top B, creatures, down items, each item layer
/// newest first. Creatures keep insertion order.
#[derive(Debug)]
pub struct Tile {
    position: Position,
    flags: TileFlags,
    ground: Option<Item>,
    top_a: Vec<Item>,
    top_b: Vec<Item>,
    down: Vec<Item>,
    creatures: Vec<CreatureId>,
    cache: Option<Arc<[u8]>>,
}

impl Tile {
    pub fn new(position: Position) -> Self {
        Self {
            position,
            flags: TileFlags::default(),
            ground: None,
            top_a: Vec::new(),
            top_b: Vec::new(),
            down: Vec::new(),
            creatures: Vec::new(),
            cache: None,
        }
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn flags(&self) -> TileFlags {
        self.flags
    }

    pub fn set_flag(&mut self, flag: TileFlags) {
        self.flags.insert(flag);
    }

    pub fn has_flag(&self, flag: TileFlags) -> bool {
        self.flags.contains(flag)
    }

    pub fn cannot_logout(&self) -> bool {
        self.has_flag(TileFlags::NO_LOGOUT)
    }

    pub fn is_protection_zone(&self) -> bool {
        self.has_flag(TileFlags::PROTECTION_ZONE)
    }

    pub fn ground(&self) -> Option<&Item> {
        self.ground.as_ref()
    }

    pub fn top_items_a(&self) -> impl Iterator<Item = &Item> + '_ {
        self.top_a.iter().rev()
    }

    pub fn top_items_b(&self) -> impl Iterator<Item = &Item> + '_ {
        self.top_b.iter().rev()
    }

    pub fn down_items(&self) -> impl Iterator<Item = &Item> + '_ {
        self.down.iter().rev()
    }

    pub fn creature_ids(&self) -> impl Iterator<Item = CreatureId> + '_ {
        self.creatures.iter().copied()
    }

    pub fn has_creatures(&self) -> bool {
        !self.creatures.is_empty()
    }

    pub fn ground_step_speed(&self) -> u16 {
        match self.ground.as_ref().map(|ground| ground.item_type().speed) {
            Some(speed) if speed != 0 => speed,
            _ => DEFAULT_GROUND_SPEED,
        }
    }

    pub fn add_thing(&mut self, thing: Thing<'_>, count: u8) -> Result<(), TileError> {
        if count == 0 {
            return Err(TileError::InvalidArgument("count must be at least 1"));
        }
        match thing {
            Thing::Creature(creature) => self.place_creature(creature),
            Thing::Item(item) => self.place_item(item, count)?,
        }
        self.invalidate_cache();
        Ok(())
    }

    fn place_creature(&mut self, creature: &mut Creature) {
        if self.creatures.contains(&creature.id) {
            tracing::debug!(tile = %self.position, creature = %creature.id, "creature already on tile");
        } else {
            self.creatures.push(creature.id);
        }
        creature.set_tile(Some(self.position));
        creature.added();
        tracing::trace!(tile = %self.position, creature = %creature.id, name = %creature.name, "creature added");
    }

    fn place_item(&mut self, mut item: Item, count: u8) -> Result<(), TileError> {
        let layer = item.item_type().layer()?;
        item.set_tile(Some(self.position));
        tracing::trace!(tile = %self.position, item_type = %item.type_id(), ?layer, count, "item added");

        match layer {
            StackLayer::Ground => {
                item.added();
                if let Some(previous) = self.ground.replace(item) {
                    tracing::debug!(
                        tile = %self.position,
                        previous = %previous.type_id(),
                        "ground overwritten"
                    );
                }
            }
            StackLayer::TopA => {
                item.added();
                self.top_a.push(item);
            }
            StackLayer::TopB => {
                item.added();
                self.top_b.push(item);
            }
            StackLayer::Down if item.is_cumulative() => match self.down.last_mut() {
                Some(top) if top.can_absorb(&item) => {
                    let total = u16::from(top.amount) + u16::from(count);
                    let merged = total.min(u16::from(MAX_STACK_AMOUNT));
                    top.amount = merged as u8;
                    let remainder = total - merged;
                    if remainder > 0 {
                        item.amount = remainder as u8;
                        item.added();
                        self.down.push(item);
                    }
                }
                _ => {
                    item.amount = count;
                    item.added();
                    self.down.push(item);
                }
            },
            StackLayer::Down => {
                item.added();
                self.down.push(item);
            }
            StackLayer::Creature => {
                return Err(TileError::InvalidClassification(item.type_id()));
            }
        }
        Ok(())
    }

    /// Takes an item off the tile. Cumulative down items must be removed
    /// whole; use `split_item` first to take part of a stack.
    pub fn remove_item(&mut self, id: ItemId, count: u8) -> Result<Item, TileError> {
        if count == 0 {
            return Err(TileError::InvalidArgument("count must be at least 1"));
        }
        let (layer, index) = self
            .locate_item(id)
            .ok_or(TileError::NotFound(ThingKey::Item(id)))?;

        if layer == StackLayer::Down {
            let item = &self.down[index];
            if item.is_cumulative() && item.amount > count {
                return Err(TileError::UnsupportedOperation {
                    item: id,
                    amount: item.amount,
                    requested: count,
                });
            }
        }

        let mut item = self.take_at(layer, index)?;
        item.set_tile(None);
        item.removed();
        self.invalidate_cache();
        tracing::trace!(tile = %self.position, item_type = %item.type_id(), ?layer, "item removed");
        Ok(item)
    }

    /// Takes a creature off the tile. Creatures do not subdivide, so any
    /// non-zero `count` removes it whole.
    pub fn remove_creature(&mut self, creature: &mut Creature, count: u8) -> Result<(), TileError> {
        if count == 0 {
            return Err(TileError::InvalidArgument("count must be at least 1"));
        }
        let index = self
            .creatures
            .iter()
            .position(|id| *id == creature.id)
            .ok_or(TileError::NotFound(ThingKey::Creature(creature.id)))?;
        self.creatures.remove(index);
        creature.set_tile(None);
        creature.removed();
        self.invalidate_cache();
        tracing::trace!(tile = %self.position, creature = %creature.id, "creature removed");
        Ok(())
    }

    /// Takes `count` off a cumulative down item and returns it as a new,
    /// detached item. The original entry keeps its stack position.
    pub fn split_item(&mut self, id: ItemId, count: u8) -> Result<Item, TileError> {
        if count == 0 {
            return Err(TileError::InvalidArgument("count must be at least 1"));
        }
        let (layer, index) = self
            .locate_item(id)
            .ok_or(TileError::NotFound(ThingKey::Item(id)))?;
        if layer != StackLayer::Down || !self.down[index].is_cumulative() {
            return Err(TileError::InvalidArgument("only cumulative items can be split"));
        }
        let source = &mut self.down[index];
        if count >= source.amount {
            return Err(TileError::InvalidArgument(
                "split count must be below the stack amount",
            ));
        }
        source.amount -= count;
        let split = Item::new(Arc::clone(source.shared_type()))
            .with_amount(count)
            .with_liquid(source.liquid);
        self.invalidate_cache();
        Ok(split)
    }

    pub fn item(&self, id: ItemId) -> Option<&Item> {
        let (layer, index) = self.locate_item(id)?;
        match layer {
            StackLayer::Ground => self.ground.as_ref(),
            StackLayer::TopA => self.top_a.get(index),
            StackLayer::TopB => self.top_b.get(index),
            StackLayer::Down => self.down.get(index),
            StackLayer::Creature => None,
        }
    }

    /// Whether `add_thing` would place `item` without displacing anything.
    /// A ground only goes onto a tile that has none.
    pub fn check_placement(&self, item: &Item, count: u8) -> Result<(), TileError> {
        if count == 0 {
            return Err(TileError::InvalidArgument("count must be at least 1"));
        }
        if item.item_type().layer()? == StackLayer::Ground && self.ground.is_some() {
            return Err(TileError::InvalidArgument("tile already has a ground"));
        }
        Ok(())
    }

    pub fn has_thing(&self, key: ThingKey, count: u8) -> Result<bool, TileError> {
        if count == 0 {
            return Err(TileError::InvalidArgument("count must be at least 1"));
        }
        let found = match key {
            ThingKey::Creature(id) => self.creatures.contains(&id),
            ThingKey::Item(id) => [&self.top_a, &self.top_b, &self.down]
                .into_iter()
                .filter_map(|stack| stack.last())
                .any(|item| item.id == id && item.amount >= count),
        };
        Ok(found)
    }

    /// First item of the given type, searching ground, top A, top B and then
    /// down items, each layer newest first.
    pub fn find_item(&self, type_id: ItemTypeId) -> Option<&Item> {
        self.items_in_search_order()
            .find(|item| item.type_id() == type_id)
    }

    pub fn remove_item_with_type(&mut self, type_id: ItemTypeId) -> Option<Item> {
        let (layer, index) = if self
            .ground
            .as_ref()
            .is_some_and(|ground| ground.type_id() == type_id)
        {
            (StackLayer::Ground, 0)
        } else {
            [
                (StackLayer::TopA, &self.top_a),
                (StackLayer::TopB, &self.top_b),
                (StackLayer::Down, &self.down),
            ]
            .into_iter()
            .find_map(|(layer, stack)| {
                stack
                    .iter()
                    .rposition(|item| item.type_id() == type_id)
                    .map(|index| (layer, index))
            })?
        };
        let mut item = self.take_at(layer, index).ok()?;
        item.set_tile(None);
        item.removed();
        self.invalidate_cache();
        Some(item)
    }

    pub fn stack_entries(&self) -> impl Iterator<Item = StackEntry<'_>> + '_ {
        self.ground
            .iter()
            .map(StackEntry::Item)
            .chain(self.stacked_entries())
    }

    pub fn address_of(&self, key: ThingKey) -> Result<u8, TileError> {
        if let (ThingKey::Item(id), Some(ground)) = (key, self.ground.as_ref()) {
            if ground.id == id {
                return Ok(0);
            }
        }
        self.stacked_entries()
            .position(|entry| entry.key() == key)
            .and_then(|index| u8::try_from(index + 1).ok())
            .ok_or(TileError::NotFound(key))
    }

    pub fn entity_at(&self, stack_position: u8) -> Option<StackEntry<'_>> {
        if stack_position == 0 {
            return self.ground.as_ref().map(StackEntry::Item);
        }
        self.stacked_entries()
            .nth(usize::from(stack_position) - 1)
    }

    pub fn has_collision(&self) -> bool {
        self.all_items().any(|item| item.item_type().has_collision())
    }

    pub fn items_with_collision(&self) -> Vec<&Item> {
        self.all_items()
            .filter(|item| item.item_type().has_collision())
            .collect()
    }

    pub fn has_separation(&self) -> bool {
        self.all_items().any(|item| item.item_type().has_separation())
    }

    pub fn items_with_separation(&self) -> Vec<&Item> {
        self.all_items()
            .filter(|item| item.item_type().has_separation())
            .collect()
    }

    pub fn blocks_pass(&self) -> bool {
        self.has_creatures() || self.all_items().any(|item| item.item_type().blocks_pass())
    }

    pub fn blocks_throw(&self) -> bool {
        self.all_items().any(|item| item.item_type().blocks_throw())
    }

    pub fn blocks_lay(&self) -> bool {
        self.all_items().any(|item| item.item_type().blocks_lay())
    }

    pub fn path_error(&self) -> PathError {
        if self.has_collision() {
            PathError::NotEnoughRoom
        } else {
            PathError::None
        }
    }

    pub fn can_be_walked(&self, avoid_damage: u8) -> bool {
        let Some(ground) = self.ground.as_ref() else {
            return false;
        };
        !self.has_creatures()
            && !ground.item_type().is_path_blocking(avoid_damage)
            && !self
                .top_a
                .iter()
                .chain(&self.top_b)
                .chain(&self.down)
                .any(|item| item.item_type().is_path_blocking(avoid_damage))
    }

    /// The ground decides if it carries a floor change; otherwise the newest
    /// top A item that carries one does.
    pub fn floor_change_direction(&self) -> FloorChangeDirection {
        self.ground
            .iter()
            .chain(self.top_items_a())
            .find_map(|item| item.item_type().floor_change.as_deref())
            .map(FloorChangeDirection::parse)
            .unwrap_or_default()
    }

    pub fn has_floor_destination(&self, direction: FloorChangeDirection) -> bool {
        self.floor_change_direction() == direction
    }

    pub fn has_any_floor_destination(&self) -> bool {
        !self.floor_change_direction().is_none()
    }

    /// The cached item description, rebuilt if a mutation dropped it.
    /// Always `None` while a creature stands here.
    pub fn cache(&mut self) -> Option<Arc<[u8]>> {
        if self.has_creatures() {
            return None;
        }
        if self.cache.is_none() {
            self.cache = self.build_cache(BufferPool::shared());
        }
        self.cache.clone()
    }

    /// The cached description as it stands, without rebuilding.
    pub fn peek_cache(&self) -> Option<&Arc<[u8]>> {
        self.cache.as_ref()
    }

    pub fn invalidate_cache(&mut self) {
        self.cache = None;
    }

    fn build_cache(&self, pool: &BufferPool) -> Option<Arc<[u8]>> {
        if self.has_creatures() {
            return None;
        }
        let mut writer = PacketWriter::from_buffer(pool.rent(MAX_CACHE_BYTES));
        for item in self.all_items().take(MAX_CACHED_OBJECTS) {
            write_item(&mut writer, item);
        }

        let snapshot: Arc<[u8]> = Arc::from(writer.as_slice());
        pool.give_back(writer.into_vec());
        Some(snapshot)
    }

    /// Occupants in description order: ground, then each top tier, the
    /// creatures and the down items, every layer bottom-first.
    pub fn wire_entries(&self) -> impl Iterator<Item = StackEntry<'_>> + '_ {
        self.ground
            .iter()
            .chain(&self.top_a)
            .chain(&self.top_b)
            .map(StackEntry::Item)
            .chain(self.creatures.iter().copied().map(StackEntry::Creature))
            .chain(self.down.iter().map(StackEntry::Item))
    }

    fn all_items(&self) -> impl Iterator<Item = &Item> + '_ {
        self.ground
            .iter()
            .chain(&self.top_a)
            .chain(&self.top_b)
            .chain(&self.down)
    }

    fn items_in_search_order(&self) -> impl Iterator<Item = &Item> + '_ {
        self.ground
            .iter()
            .chain(self.top_items_a())
            .chain(self.top_items_b())
            .chain(self.down_items())
    }

    fn stacked_entries(&self) -> impl Iterator<Item = StackEntry<'_>> + '_ {
        self.top_items_a()
            .chain(self.top_items_b())
            .map(StackEntry::Item)
            .chain(self.creatures.iter().copied().map(StackEntry::Creature))
            .chain(self.down_items().map(StackEntry::Item))
    }

    fn locate_item(&self, id: ItemId) -> Option<(StackLayer, usize)> {
        if self.ground.as_ref().is_some_and(|ground| ground.id == id) {
            return Some((StackLayer::Ground, 0));
        }
        [
            (StackLayer::TopA, &self.top_a),
            (StackLayer::TopB, &self.top_b),
            (StackLayer::Down, &self.down),
        ]
        .into_iter()
        .find_map(|(layer, stack)| {
            stack
                .iter()
                .position(|item| item.id == id)
                .map(|index| (layer, index))
        })
    }

    fn take_at(&mut self, layer: StackLayer, index: usize) -> Result<Item, TileError> {
        let taken = match layer {
            StackLayer::Ground => self.ground.take(),
            StackLayer::TopA => Some(self.top_a.remove(index)),
            StackLayer::TopB => Some(self.top_b.remove(index)),
            StackLayer::Down => Some(self.down.remove(index)),
            StackLayer::Creature => None,
        };
        taken.ok_or(TileError::InvalidArgument("layer holds no items"))
    }
}

/// Client id, then amount for cumulative items or liquid type for pools and
/// containers.
pub(crate) fn write_item(writer: &mut PacketWriter, item: &Item) {
    writer.write_u16_le(item.client_id());
    if item.is_cumulative() {
        writer.write_u8(item.amount);
    } else if item.is_liquid() {
        writer.write_u8(item.liquid.wire_byte());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::item::LiquidType;
    use crate::net::packet::PacketReader;
    use crate::world::item_types::{damage, ItemFlag, ItemGroup, ItemType};

    fn origin() -> Position {
        Position::new(32000, 32000, 7)
    }

    fn item(item_type: ItemType) -> Item {
        Item::new(Arc::new(item_type))
    }

    fn grass() -> Item {
        item(ItemType::new(100, 102).with_group(ItemGroup::Ground).with_speed(120))
    }

    fn plain(id: u16) -> Item {
        item(ItemType::new(id, id + 1000))
    }

    fn coins() -> Arc<ItemType> {
        Arc::new(ItemType::new(2148, 3031).with_flag(ItemFlag::Stackable))
    }

    fn add(tile: &mut Tile, item: Item) -> ItemId {
        let id = item.id;
        tile.add_thing(Thing::Item(item), 1).expect("add");
        id
    }

    fn creature(id: u32) -> Creature {
        Creature::new(id, "rat")
    }

    #[test]
    fn zero_count_is_rejected() {
        let mut tile = Tile::new(origin());
        assert!(matches!(
            tile.add_thing(Thing::Item(plain(1)), 0),
            Err(TileError::InvalidArgument(_))
        ));
        let id = add(&mut tile, plain(1));
        assert!(matches!(
            tile.remove_item(id, 0),
            Err(TileError::InvalidArgument(_))
        ));
        assert!(matches!(
            tile.has_thing(ThingKey::Item(id), 0),
            Err(TileError::InvalidArgument(_))
        ));

        let mut rat = creature(40);
        tile.add_thing(Thing::Creature(&mut rat), 1).expect("creature");
        assert!(matches!(
            tile.remove_creature(&mut rat, 0),
            Err(TileError::InvalidArgument(_))
        ));
        assert_eq!(rat.tile(), Some(origin()));
        assert!(tile.has_creatures());
    }

    #[test]
    fn placement_check_refuses_a_second_ground() {
        let mut tile = Tile::new(origin());
        let other_ground = grass();
        assert_eq!(tile.check_placement(&other_ground, 1), Ok(()));
        let ground_id = add(&mut tile, grass());
        assert!(matches!(
            tile.check_placement(&other_ground, 1),
            Err(TileError::InvalidArgument(_))
        ));
        assert_eq!(tile.check_placement(&plain(7), 1), Ok(()));
        assert!(tile.check_placement(&plain(7), 0).is_err());
        assert!(matches!(
            tile.check_placement(&item(ItemType::new(9, 9).on_top(5)), 1),
            Err(TileError::InvalidClassification(_))
        ));
        assert_eq!(tile.item(ground_id).map(|ground| ground.id), Some(ground_id));
        assert!(tile.item(other_ground.id).is_none());
    }

    #[test]
    fn items_go_to_their_layers() {
        let mut tile = Tile::new(origin());
        add(&mut tile, grass());
        add(&mut tile, item(ItemType::new(1, 1).on_top(1)));
        add(&mut tile, item(ItemType::new(2, 2).on_top(2)));
        add(&mut tile, plain(3));

        assert_eq!(tile.ground().map(Item::type_id), Some(ItemTypeId(100)));
        assert_eq!(tile.top_items_a().count(), 1);
        assert_eq!(tile.top_items_b().count(), 1);
        assert_eq!(tile.down_items().count(), 1);
        assert!(tile
            .stack_entries()
            .filter_map(StackEntry::as_item)
            .all(|item| item.tile() == Some(origin())));
    }

    #[test]
    fn ground_is_overwritten() {
        let mut tile = Tile::new(origin());
        add(&mut tile, grass());
        let replacement = item(ItemType::new(101, 103).with_group(ItemGroup::Ground));
        let id = add(&mut tile, replacement);
        assert_eq!(tile.ground().map(|ground| ground.id), Some(id));
        assert_eq!(tile.stack_entries().count(), 1);
    }

    #[test]
    fn cumulative_merge_caps_at_hundred() {
        let mut tile = Tile::new(origin());
        let coins = coins();
        tile.add_thing(Thing::Item(Item::new(Arc::clone(&coins))), 50)
            .expect("add 50");
        tile.add_thing(Thing::Item(Item::new(Arc::clone(&coins))), 60)
            .expect("add 60");

        let amounts: Vec<u8> = tile.down_items().map(|item| item.amount).collect();
        assert_eq!(amounts, vec![10, 100]);
        assert_eq!(amounts.iter().map(|a| u32::from(*a)).sum::<u32>(), 110);
    }

    #[test]
    fn cumulative_merge_absorbs_without_overflow() {
        let mut tile = Tile::new(origin());
        let coins = coins();
        tile.add_thing(Thing::Item(Item::new(Arc::clone(&coins))), 30)
            .expect("add");
        tile.add_thing(Thing::Item(Item::new(Arc::clone(&coins))), 70)
            .expect("add");
        let amounts: Vec<u8> = tile.down_items().map(|item| item.amount).collect();
        assert_eq!(amounts, vec![100]);

        tile.add_thing(Thing::Item(Item::new(Arc::clone(&coins))), 5)
            .expect("add onto full stack");
        let amounts: Vec<u8> = tile.down_items().map(|item| item.amount).collect();
        assert_eq!(amounts, vec![5, 100]);
    }

    #[test]
    fn cumulative_does_not_merge_across_types_or_under_other_items() {
        let mut tile = Tile::new(origin());
        let coins = coins();
        tile.add_thing(Thing::Item(Item::new(Arc::clone(&coins))), 10)
            .expect("add");
        add(&mut tile, plain(7));
        tile.add_thing(Thing::Item(Item::new(Arc::clone(&coins))), 10)
            .expect("add");
        let platinum = Arc::new(ItemType::new(2152, 3035).with_flag(ItemFlag::Stackable));
        tile.add_thing(Thing::Item(Item::new(platinum)), 3)
            .expect("add");

        let amounts: Vec<(u16, u8)> = tile
            .down_items()
            .map(|item| (item.type_id().0, item.amount))
            .collect();
        assert_eq!(amounts, vec![(2152, 3), (2148, 10), (7, 1), (2148, 10)]);
    }

    #[test]
    fn mutations_invalidate_cache() {
        let mut tile = Tile::new(origin());
        add(&mut tile, grass());
        assert!(tile.cache().is_some());
        assert!(tile.peek_cache().is_some());

        let id = add(&mut tile, plain(5));
        assert!(tile.peek_cache().is_none());
        assert!(tile.cache().is_some());

        tile.remove_item(id, 1).expect("remove");
        assert!(tile.peek_cache().is_none());

        let mut rat = creature(1);
        tile.cache();
        tile.add_thing(Thing::Creature(&mut rat), 1).expect("add creature");
        assert!(tile.peek_cache().is_none());
        tile.remove_creature(&mut rat, 1).expect("remove creature");
        assert!(tile.peek_cache().is_none());
        assert!(tile.cache().is_some());
    }

    #[test]
    fn no_cache_while_creatures_present() {
        let mut tile = Tile::new(origin());
        add(&mut tile, grass());
        assert!(tile.cache().is_some());

        let mut rat = creature(1);
        tile.add_thing(Thing::Creature(&mut rat), 1).expect("add");
        assert!(tile.cache().is_none());
        assert!(tile.cache().is_none());
        assert!(tile.peek_cache().is_none());
    }

    #[test]
    fn cache_layout_ground_then_items_bottom_up() {
        let mut tile = Tile::new(origin());
        add(&mut tile, grass());
        add(&mut tile, item(ItemType::new(1, 500).on_top(1)));
        add(&mut tile, item(ItemType::new(2, 501).on_top(1)));
        add(&mut tile, item(ItemType::new(3, 600).on_top(2)));
        tile.add_thing(Thing::Item(Item::new(coins())), 42).expect("coins");
        add(
            &mut tile,
            item(ItemType::new(2016, 2016).with_group(ItemGroup::Splash))
                .with_liquid(LiquidType::Blood),
        );
        add(&mut tile, plain(9));

        let bytes = tile.cache().expect("cache");
        let mut reader = PacketReader::new(&bytes);
        assert_eq!(reader.read_u16_le(), Some(102));
        assert_eq!(reader.read_u16_le(), Some(500));
        assert_eq!(reader.read_u16_le(), Some(501));
        assert_eq!(reader.read_u16_le(), Some(600));
        assert_eq!(reader.read_u16_le(), Some(3031));
        assert_eq!(reader.read_u8(), Some(42));
        assert_eq!(reader.read_u16_le(), Some(2016));
        assert_eq!(reader.read_u8(), Some(LiquidType::Blood.wire_byte()));
        assert_eq!(reader.read_u16_le(), Some(1009));
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn cache_caps_at_nine_objects() {
        let mut tile = Tile::new(origin());
        add(&mut tile, grass());
        for id in 1..=9 {
            add(&mut tile, plain(id));
        }
        let bytes = tile.cache().expect("cache");
        assert_eq!(bytes.len(), MAX_CACHED_OBJECTS * 2);

        let mut reader = PacketReader::new(&bytes);
        assert_eq!(reader.read_u16_le(), Some(102));
        for id in 1..=8u16 {
            assert_eq!(reader.read_u16_le(), Some(id + 1000));
        }
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn empty_tile_caches_empty_description() {
        let mut tile = Tile::new(origin());
        assert_eq!(tile.cache().as_deref(), Some(&[][..]));
    }

    #[test]
    fn addressing_follows_fixed_order() {
        let mut tile = Tile::new(origin());
        let ground = add(&mut tile, grass());
        let top_a_old = add(&mut tile, item(ItemType::new(1, 1).on_top(1)));
        let top_a_new = add(&mut tile, item(ItemType::new(2, 2).on_top(1)));
        let top_b = add(&mut tile, item(ItemType::new(3, 3).on_top(3)));
        let down_old = add(&mut tile, plain(4));
        let down_new = add(&mut tile, plain(5));
        let mut first = creature(10);
        let mut second = creature(11);
        tile.add_thing(Thing::Creature(&mut first), 1).expect("add");
        tile.add_thing(Thing::Creature(&mut second), 1).expect("add");

        let expected = [
            (ThingKey::Item(ground), 0),
            (ThingKey::Item(top_a_new), 1),
            (ThingKey::Item(top_a_old), 2),
            (ThingKey::Item(top_b), 3),
            (ThingKey::Creature(first.id), 4),
            (ThingKey::Creature(second.id), 5),
            (ThingKey::Item(down_new), 6),
            (ThingKey::Item(down_old), 7),
        ];
        for (key, position) in expected {
            assert_eq!(tile.address_of(key).expect("address"), position);
            assert_eq!(tile.entity_at(position).map(|entry| entry.key()), Some(key));
        }
        assert_eq!(tile.entity_at(8), None);
    }

    #[test]
    fn addressing_roundtrips_without_creatures() {
        let mut tile = Tile::new(origin());
        add(&mut tile, grass());
        add(&mut tile, item(ItemType::new(1, 1).on_top(1)));
        add(&mut tile, item(ItemType::new(2, 2).on_top(2)));
        for id in 10..15 {
            add(&mut tile, plain(id));
        }
        for position in 0..=7u8 {
            let entry = tile.entity_at(position).expect("entry");
            assert_eq!(tile.address_of(entry.key()).expect("address"), position);
        }
    }

    #[test]
    fn groundless_tile_starts_at_one() {
        let mut tile = Tile::new(origin());
        let id = add(&mut tile, plain(1));
        assert_eq!(tile.entity_at(0), None);
        assert_eq!(tile.address_of(ThingKey::Item(id)), Ok(1));
    }

    #[test]
    fn address_of_missing_is_not_found() {
        let tile = Tile::new(origin());
        let key = ThingKey::Item(ItemId(u32::MAX));
        assert_eq!(tile.address_of(key), Err(TileError::NotFound(key)));
    }

    #[test]
    fn removing_middle_creature_keeps_order() {
        let mut tile = Tile::new(origin());
        let mut a = creature(1);
        let mut b = creature(2);
        let mut c = creature(3);
        for creature in [&mut a, &mut b, &mut c] {
            tile.add_thing(Thing::Creature(creature), 1).expect("add");
        }
        assert_eq!(b.tile(), Some(origin()));

        tile.remove_creature(&mut b, 1).expect("remove");
        let ids: Vec<CreatureId> = tile.creature_ids().collect();
        assert_eq!(ids, vec![a.id, c.id]);
        assert_eq!(b.tile(), None);
        assert_eq!(
            tile.remove_creature(&mut b, 1),
            Err(TileError::NotFound(ThingKey::Creature(b.id)))
        );
    }

    #[test]
    fn removal_clears_back_reference() {
        let mut tile = Tile::new(origin());
        let ground = add(&mut tile, grass());
        let top = add(&mut tile, item(ItemType::new(1, 1).on_top(1)));
        let removed = tile.remove_item(top, 1).expect("remove top");
        assert_eq!(removed.tile(), None);
        let removed = tile.remove_item(ground, 5).expect("remove ground");
        assert_eq!(removed.tile(), None);
        assert!(tile.ground().is_none());
        assert_eq!(
            tile.remove_item(ground, 1),
            Err(TileError::NotFound(ThingKey::Item(ground)))
        );
    }

    #[test]
    fn partial_cumulative_removal_is_unsupported() {
        let mut tile = Tile::new(origin());
        tile.add_thing(Thing::Item(Item::new(coins())), 40).expect("add");
        let id = tile.down_items().next().expect("coins").id;

        assert_eq!(
            tile.remove_item(id, 10),
            Err(TileError::UnsupportedOperation {
                item: id,
                amount: 40,
                requested: 10
            })
        );
        let removed = tile.remove_item(id, 40).expect("remove whole");
        assert_eq!(removed.amount, 40);
        assert_eq!(tile.down_items().count(), 0);
    }

    #[test]
    fn split_takes_part_of_a_stack() {
        let mut tile = Tile::new(origin());
        tile.add_thing(Thing::Item(Item::new(coins())), 40).expect("add");
        let id = tile.down_items().next().expect("coins").id;
        tile.cache();

        let split = tile.split_item(id, 15).expect("split");
        assert_eq!(split.amount, 15);
        assert_eq!(split.tile(), None);
        assert_ne!(split.id, id);
        assert_eq!(tile.down_items().next().map(|item| item.amount), Some(25));
        assert!(tile.peek_cache().is_none());

        assert!(matches!(
            tile.split_item(id, 25),
            Err(TileError::InvalidArgument(_))
        ));
        let plain_id = add(&mut tile, plain(3));
        assert!(matches!(
            tile.split_item(plain_id, 1),
            Err(TileError::InvalidArgument(_))
        ));
    }

    #[test]
    fn remove_from_middle_preserves_order() {
        let mut tile = Tile::new(origin());
        let first = add(&mut tile, plain(1));
        let middle = add(&mut tile, plain(2));
        let last = add(&mut tile, plain(3));
        tile.remove_item(middle, 1).expect("remove");
        let ids: Vec<ItemId> = tile.down_items().map(|item| item.id).collect();
        assert_eq!(ids, vec![last, first]);
    }

    #[test]
    fn has_thing_checks_layer_tops() {
        let mut tile = Tile::new(origin());
        let bottom = add(&mut tile, plain(1));
        let top = add(&mut tile, plain(2));
        let mut rat = creature(1);
        tile.add_thing(Thing::Creature(&mut rat), 1).expect("add");

        assert_eq!(tile.has_thing(ThingKey::Item(top), 1), Ok(true));
        assert_eq!(tile.has_thing(ThingKey::Item(top), 2), Ok(false));
        assert_eq!(tile.has_thing(ThingKey::Item(bottom), 1), Ok(false));
        assert_eq!(tile.has_thing(ThingKey::Creature(rat.id), 1), Ok(true));
        assert_eq!(
            tile.has_thing(ThingKey::Creature(CreatureId(99)), 1),
            Ok(false)
        );
    }

    #[test]
    fn find_and_remove_by_type() {
        let mut tile = Tile::new(origin());
        add(&mut tile, grass());
        add(&mut tile, item(ItemType::new(1, 1).on_top(1)));
        let older = add(&mut tile, plain(7));
        add(&mut tile, plain(8));
        let newer = add(&mut tile, plain(7));

        assert_eq!(tile.find_item(ItemTypeId(7)).map(|item| item.id), Some(newer));
        assert_eq!(
            tile.find_item(ItemTypeId(100)).map(Item::type_id),
            Some(ItemTypeId(100))
        );
        assert!(tile.find_item(ItemTypeId(999)).is_none());

        tile.cache();
        let removed = tile.remove_item_with_type(ItemTypeId(7)).expect("removed");
        assert_eq!(removed.id, newer);
        assert_eq!(removed.tile(), None);
        assert!(tile.peek_cache().is_none());

        let order: Vec<u16> = tile.down_items().map(|item| item.type_id().0).collect();
        assert_eq!(order, vec![8, 7]);
        assert_eq!(tile.find_item(ItemTypeId(7)).map(|item| item.id), Some(older));

        assert!(tile.remove_item_with_type(ItemTypeId(999)).is_none());
        assert!(tile.remove_item_with_type(ItemTypeId(100)).is_some());
        assert!(tile.ground().is_none());
    }

    #[test]
    fn collision_is_an_or_over_all_layers() {
        let collidable = |id| item(ItemType::new(id, id).with_flag(ItemFlag::Collision));

        let mut tile = Tile::new(origin());
        add(&mut tile, grass());
        add(&mut tile, plain(1));
        assert!(!tile.has_collision());
        assert!(tile.items_with_collision().is_empty());
        assert_eq!(tile.path_error(), PathError::None);

        add(&mut tile, collidable(2));
        assert!(tile.has_collision());
        assert_eq!(tile.items_with_collision().len(), 1);
        assert_eq!(tile.path_error(), PathError::NotEnoughRoom);

        add(&mut tile, item(ItemType::new(3, 3).on_top(2).with_flag(ItemFlag::Collision)));
        add(&mut tile, collidable(4));
        assert!(tile.has_collision());
        assert_eq!(tile.items_with_collision().len(), 3);

        let mut bare = Tile::new(origin());
        add(&mut bare, item(ItemType::new(5, 5).with_group(ItemGroup::Ground).with_flag(ItemFlag::Collision)));
        assert!(bare.has_collision());
    }

    #[test]
    fn blocking_predicates() {
        let mut tile = Tile::new(origin());
        add(&mut tile, grass());
        assert!(!tile.blocks_pass());
        assert!(!tile.blocks_throw());
        assert!(!tile.blocks_lay());
        assert!(!tile.has_separation());

        let mut rat = creature(1);
        tile.add_thing(Thing::Creature(&mut rat), 1).expect("add");
        assert!(tile.blocks_pass());
        assert!(!tile.blocks_throw());
        assert!(!tile.blocks_lay());
        tile.remove_creature(&mut rat, 1).expect("remove");

        add(&mut tile, item(ItemType::new(1, 1).with_flag(ItemFlag::BlockProjectile)));
        add(&mut tile, item(ItemType::new(2, 2).on_top(1).with_flag(ItemFlag::BlockLay)));
        add(&mut tile, item(ItemType::new(3, 3).on_top(2).with_flag(ItemFlag::Separation)));
        assert!(tile.blocks_throw());
        assert!(tile.blocks_lay());
        assert!(tile.has_separation());
        assert_eq!(tile.items_with_separation().len(), 1);
        assert!(!tile.blocks_pass());

        add(&mut tile, item(ItemType::new(4, 4).with_flag(ItemFlag::BlockSolid)));
        assert!(tile.blocks_pass());
    }

    #[test]
    fn walkability_scenario() {
        let mut tile = Tile::new(origin());
        assert!(!tile.can_be_walked(0));

        add(&mut tile, grass());
        assert!(tile.can_be_walked(0));

        add(
            &mut tile,
            item(ItemType::new(1, 1).on_top(1).with_flag(ItemFlag::Collision)),
        );
        assert!(!tile.can_be_walked(0));
        assert!(tile.has_collision());
        assert_eq!(tile.ground().map(Item::type_id), Some(ItemTypeId(100)));
    }

    #[test]
    fn walkability_respects_creatures_and_fields() {
        let mut tile = Tile::new(origin());
        add(&mut tile, grass());
        add(&mut tile, item(ItemType::new(1492, 1492).with_field_damage(damage::FIRE)));
        assert!(tile.can_be_walked(0));
        assert!(tile.can_be_walked(damage::ENERGY));
        assert!(!tile.can_be_walked(damage::FIRE | damage::POISON));

        let mut rat = creature(1);
        tile.add_thing(Thing::Creature(&mut rat), 1).expect("add");
        assert!(!tile.can_be_walked(0));
    }

    #[test]
    fn floor_change_prefers_ground_then_newest_top_a() {
        let mut tile = Tile::new(origin());
        assert_eq!(tile.floor_change_direction(), FloorChangeDirection::None);
        assert!(!tile.has_any_floor_destination());

        add(&mut tile, grass());
        add(&mut tile, item(ItemType::new(1, 1).on_top(1).with_floor_change("north")));
        add(&mut tile, item(ItemType::new(2, 2).on_top(1).with_floor_change("east")));
        add(&mut tile, item(ItemType::new(3, 3).on_top(2).with_floor_change("down")));
        assert!(tile.has_floor_destination(FloorChangeDirection::East));

        let mut hole = Tile::new(origin());
        add(
            &mut hole,
            item(ItemType::new(5, 5).with_group(ItemGroup::Ground).with_floor_change("down")),
        );
        add(&mut hole, item(ItemType::new(1, 1).on_top(1).with_floor_change("north")));
        assert_eq!(hole.floor_change_direction(), FloorChangeDirection::Down);

        let mut odd = Tile::new(origin());
        add(&mut odd, item(ItemType::new(6, 6).on_top(1).with_floor_change("sideways")));
        assert_eq!(odd.floor_change_direction(), FloorChangeDirection::None);
        assert!(!odd.has_any_floor_destination());
    }

    #[test]
    fn ground_speed_defaults() {
        let mut tile = Tile::new(origin());
        assert_eq!(tile.ground_step_speed(), DEFAULT_GROUND_SPEED);
        add(&mut tile, grass());
        assert_eq!(tile.ground_step_speed(), 120);

        let mut zero = Tile::new(origin());
        add(&mut zero, item(ItemType::new(1, 1).with_group(ItemGroup::Ground)));
        assert_eq!(zero.ground_step_speed(), DEFAULT_GROUND_SPEED);
    }

    #[test]
    fn flags_accumulate() {
        let mut tile = Tile::new(origin());
        assert!(tile.flags().is_empty());
        tile.set_flag(TileFlags::NO_LOGOUT);
        tile.set_flag(TileFlags::PROTECTION_ZONE);
        assert!(tile.cannot_logout());
        assert!(tile.is_protection_zone());
        assert!(!tile.has_flag(TileFlags::REFRESH));
        assert_eq!(tile.flags().bits(), 0b011);
    }

    #[test]
    fn added_hook_starts_decay() {
        let mut tile = Tile::new(origin());
        let field = item(ItemType::new(1492, 1492).with_decay(120, Some(1493)));
        let id = add(&mut tile, field);
        let placed = tile.down_items().next().expect("field");
        assert!(placed.decay.as_ref().expect("decay").started());

        let removed = tile.remove_item(id, 1).expect("remove");
        assert!(!removed.decay.as_ref().expect("decay").started());
    }
}
