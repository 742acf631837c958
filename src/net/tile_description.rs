use crate::entities::creature::CreatureId;
use crate::entities::thing::StackEntry;
use crate::net::packet::PacketWriter;
use crate::world::tile::{write_item, Tile, MAX_CACHED_OBJECTS};

/// Writes the object list of a tile for a map description packet and returns
/// how many objects went out. Creature-free tiles reuse the tile's cached
/// bytes; otherwise the layers are walked live and creature encoding is left
/// to `write_creature`.
pub fn write_tile_description<F>(
    tile: &mut Tile,
    writer: &mut PacketWriter,
    mut write_creature: F,
) -> usize
where
    F: FnMut(&mut PacketWriter, CreatureId),
{
    if let Some(cached) = tile.cache() {
        writer.write_bytes(&cached);
        return tile.wire_entries().take(MAX_CACHED_OBJECTS).count();
    }

    let mut written = 0;
    for entry in tile.wire_entries().take(MAX_CACHED_OBJECTS) {
        match entry {
            StackEntry::Item(item) => write_item(writer, item),
            StackEntry::Creature(id) => write_creature(writer, id),
        }
        written += 1;
    }
    written
}
