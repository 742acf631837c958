use crate::entities::creature::Creature;
use crate::entities::item::ItemId;
use crate::entities::thing::{Thing, ThingKey};
use crate::world::position::Position;
use crate::world::tile::{Tile, TileError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GridError {
    #[error("world grid lock poisoned")]
    LockPoisoned,
    #[error("no tile at {0}")]
    MissingTile(Position),
    #[error(transparent)]
    Tile(#[from] TileError),
}

/// Coordinate-indexed tiles. Each tile sits behind its own mutex, so
/// mutations of one tile are serialized while different tiles proceed in
/// parallel. Tiles are never dropped once created.
#[derive(Debug, Default)]
pub struct WorldGrid {
    tiles: RwLock<HashMap<Position, Arc<Mutex<Tile>>>>,
}

impl WorldGrid {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<Position, Arc<Mutex<Tile>>>>, GridError> {
        self.tiles.read().map_err(|_| GridError::LockPoisoned)
    }

    pub fn len(&self) -> Result<usize, GridError> {
        Ok(self.read()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, GridError> {
        Ok(self.len()? == 0)
    }

    pub fn tile(&self, position: Position) -> Result<Option<Arc<Mutex<Tile>>>, GridError> {
        Ok(self.read()?.get(&position).cloned())
    }

    fn existing(&self, position: Position) -> Result<Arc<Mutex<Tile>>, GridError> {
        self.tile(position)?
            .ok_or(GridError::MissingTile(position))
    }

    pub fn get_or_create(&self, position: Position) -> Result<Arc<Mutex<Tile>>, GridError> {
        if let Some(tile) = self.tile(position)? {
            return Ok(tile);
        }
        let mut tiles = self.tiles.write().map_err(|_| GridError::LockPoisoned)?;
        let tile = tiles
            .entry(position)
            .or_insert_with(|| Arc::new(Mutex::new(Tile::new(position))));
        Ok(Arc::clone(tile))
    }

    pub fn positions(&self) -> Result<Vec<Position>, GridError> {
        let mut positions: Vec<Position> = self.read()?.keys().copied().collect();
        positions.sort();
        Ok(positions)
    }

    /// Runs `f` with exclusive access to an existing tile.
    pub fn with_tile<R>(
        &self,
        position: Position,
        f: impl FnOnce(&mut Tile) -> R,
    ) -> Result<R, GridError> {
        let tile = self.existing(position)?;
        let mut guard = tile.lock().map_err(|_| GridError::LockPoisoned)?;
        Ok(f(&mut guard))
    }

    /// Moves `count` of an item between existing tiles, splitting cumulative
    /// stacks when only part of one moves. A ground only moves onto a tile
    /// without one. When the target refuses the item it goes back to the
    /// source.
    pub fn move_item(
        &self,
        from: Position,
        to: Position,
        id: ItemId,
        count: u8,
    ) -> Result<(), GridError> {
        let source = self.existing(from)?;
        if from == to {
            let source = source.lock().map_err(|_| GridError::LockPoisoned)?;
            source
                .item(id)
                .ok_or(TileError::NotFound(ThingKey::Item(id)))?;
            return Ok(());
        }
        let target = self.existing(to)?;
        let (mut source, mut target) = lock_pair(&source, from, &target, to)?;

        let item = match source.remove_item(id, count) {
            Err(TileError::UnsupportedOperation { .. }) => source.split_item(id, count)?,
            other => other?,
        };
        let amount = if item.is_cumulative() { item.amount } else { 1 };
        if let Err(err) = target.check_placement(&item, amount) {
            source.add_thing(Thing::Item(item), amount)?;
            tracing::debug!(%from, %to, item = id.0, %err, "item move refused");
            return Err(err.into());
        }
        target.add_thing(Thing::Item(item), amount)?;
        tracing::debug!(%from, %to, item = id.0, count, "item moved");
        Ok(())
    }

    pub fn move_creature(
        &self,
        from: Position,
        to: Position,
        creature: &mut Creature,
    ) -> Result<(), GridError> {
        if from == to {
            return Ok(());
        }
        let source = self.existing(from)?;
        let target = self.existing(to)?;
        let (mut source, mut target) = lock_pair(&source, from, &target, to)?;

        source.remove_creature(creature, 1)?;
        target.add_thing(Thing::Creature(&mut *creature), 1)?;
        tracing::debug!(%from, %to, creature = %creature.id, "creature moved");
        Ok(())
    }
}

/// Locks two distinct tiles in coordinate order so opposing moves cannot
/// deadlock.
fn lock_pair<'a>(
    first: &'a Mutex<Tile>,
    first_position: Position,
    second: &'a Mutex<Tile>,
    second_position: Position,
) -> Result<(MutexGuard<'a, Tile>, MutexGuard<'a, Tile>), GridError> {
    let lock = |tile: &'a Mutex<Tile>| tile.lock().map_err(|_| GridError::LockPoisoned);
    if first_position < second_position {
        let a = lock(first)?;
        let b = lock(second)?;
        Ok((a, b))
    } else {
        let b = lock(second)?;
        let a = lock(first)?;
        Ok((a, b))
    }
}
