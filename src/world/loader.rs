//! Text sector loader. Each `X-Y-Z.sec` file holds one 32x32 sector with
//! lines of the form `x-y: Flag, Flag, Content={typeid, typeid(n)}`, where
//! `n` is the amount of a cumulative item or the liquid of a pool or
//! container. Every item goes through `Tile::add_thing`.

use crate::entities::item::{Item, ItemTypeId, LiquidType};
use crate::entities::thing::Thing;
use crate::world::grid::WorldGrid;
use crate::world::item_types::ItemTypeIndex;
use crate::world::position::Position;
use crate::world::tile::TileFlags;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectorFile {
    pub x: u16,
    pub y: u16,
    pub z: u8,
    pub path: PathBuf,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoadSummary {
    pub sectors: usize,
    pub tiles: usize,
    pub items: usize,
}

pub fn load_sector_index(map_dir: &Path) -> Result<Vec<SectorFile>, String> {
    let mut sectors = Vec::new();

    let entries = std::fs::read_dir(map_dir)
        .map_err(|err| format!("failed to read map dir {}: {}", map_dir.display(), err))?;

    for entry in entries {
        let entry = entry.map_err(|err| format!("failed to read map dir entry: {}", err))?;
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("sec") {
            continue;
        }

        let Some(file_stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
            continue;
        };

        let mut parts = file_stem.split('-');
        let x = parts.next().and_then(|value| value.parse::<u16>().ok());
        let y = parts.next().and_then(|value| value.parse::<u16>().ok());
        let z = parts.next().and_then(|value| value.parse::<u8>().ok());
        let (Some(x), Some(y), Some(z)) = (x, y, z) else {
            continue;
        };
        if parts.next().is_some() {
            continue;
        }

        sectors.push(SectorFile { x, y, z, path });
    }

    sectors.sort_by_key(|sector| (sector.z, sector.y, sector.x));
    Ok(sectors)
}

pub fn load_map(
    map_dir: &Path,
    item_types: &ItemTypeIndex,
    grid: &WorldGrid,
) -> Result<LoadSummary, String> {
    let sectors = load_sector_index(map_dir)?;
    let mut summary = LoadSummary::default();

    for sector in &sectors {
        let content = std::fs::read_to_string(&sector.path).map_err(|err| {
            format!("failed to read sector {}: {}", sector.path.display(), err)
        })?;
        let loaded = load_sector_content(&content, sector, item_types, grid)?;
        summary.sectors += 1;
        summary.tiles += loaded.tiles;
        summary.items += loaded.items;
    }

    tracing::info!(
        sectors = summary.sectors,
        tiles = summary.tiles,
        items = summary.items,
        "map loaded"
    );
    Ok(summary)
}

pub fn load_sector_content(
    content: &str,
    sector: &SectorFile,
    item_types: &ItemTypeIndex,
    grid: &WorldGrid,
) -> Result<LoadSummary, String> {
    let mut summary = LoadSummary::default();

    for (line_no, raw_line) in content.lines().enumerate() {
        let line_no = line_no + 1;
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let context = |err: String| format!("sector {} line {}: {}", sector.path.display(), line_no, err);

        let (coord, remainder) = line
            .split_once(':')
            .ok_or_else(|| context("missing ':'".to_string()))?;
        let (local_x, local_y) = parse_tile_coord(coord.trim()).map_err(context)?;
        let position = Position::from_sector(sector.x, sector.y, sector.z, local_x, local_y)
            .ok_or_else(|| context("position out of range".to_string()))?;
        let entry = parse_tile_entry(remainder).map_err(context)?;
        if entry.items.is_empty() && entry.flags.is_empty() {
            continue;
        }

        let tile = grid
            .get_or_create(position)
            .map_err(|err| context(err.to_string()))?;
        let mut tile = tile
            .lock()
            .map_err(|_| context("tile lock poisoned".to_string()))?;
        for flag in [
            TileFlags::PROTECTION_ZONE,
            TileFlags::NO_LOGOUT,
            TileFlags::REFRESH,
        ] {
            if entry.flags.contains(flag) {
                tile.set_flag(flag);
            }
        }
        for (type_id, extra) in entry.items {
            let item_type = item_types
                .get(type_id)
                .ok_or_else(|| context(format!("unknown item type {}", type_id)))?;
            let mut item = Item::new(Arc::clone(item_type));
            let mut count = 1;
            if let Some(extra) = extra {
                if item.is_cumulative() {
                    count = extra;
                } else if item.is_liquid() {
                    item.liquid = LiquidType::from_wire(extra)
                        .ok_or_else(|| context(format!("unknown liquid {}", extra)))?;
                }
            }
            tile.add_thing(Thing::Item(item), count)
                .map_err(|err| context(err.to_string()))?;
            summary.items += 1;
        }
        summary.tiles += 1;
    }

    Ok(summary)
}

fn parse_tile_coord(coord: &str) -> Result<(u16, u16), String> {
    let (x_raw, y_raw) = coord
        .split_once('-')
        .ok_or_else(|| "missing '-'".to_string())?;
    let x = x_raw
        .trim()
        .parse::<u16>()
        .map_err(|_| "invalid x".to_string())?;
    let y = y_raw
        .trim()
        .parse::<u16>()
        .map_err(|_| "invalid y".to_string())?;
    Ok((x, y))
}

struct TileEntry {
    flags: TileFlags,
    items: Vec<(ItemTypeId, Option<u8>)>,
}

fn parse_tile_entry(remainder: &str) -> Result<TileEntry, String> {
    let mut entry = TileEntry {
        flags: TileFlags::default(),
        items: Vec::new(),
    };
    let (prefix, content) = match remainder.find("Content") {
        Some(content_idx) => {
            let open = remainder[content_idx..]
                .find('{')
                .map(|offset| content_idx + offset)
                .ok_or_else(|| "missing '{'".to_string())?;
            let close = remainder[open..]
                .find('}')
                .map(|offset| open + offset)
                .ok_or_else(|| "missing '}'".to_string())?;
            (&remainder[..content_idx], Some(&remainder[open + 1..close]))
        }
        None => (remainder, None),
    };

    for token in prefix.split(',').map(str::trim).filter(|token| !token.is_empty()) {
        match token {
            value if value.eq_ignore_ascii_case("Refresh") => entry.flags.insert(TileFlags::REFRESH),
            value if value.eq_ignore_ascii_case("ProtectionZone") => {
                entry.flags.insert(TileFlags::PROTECTION_ZONE)
            }
            value if value.eq_ignore_ascii_case("NoLogout") => entry.flags.insert(TileFlags::NO_LOGOUT),
            other => tracing::warn!(flag = other, "ignoring unknown tile flag"),
        }
    }

    if let Some(content) = content {
        for raw in content.split(',').map(str::trim).filter(|raw| !raw.is_empty()) {
            entry.items.push(parse_content_item(raw)?);
        }
    }

    Ok(entry)
}

fn parse_content_item(raw: &str) -> Result<(ItemTypeId, Option<u8>), String> {
    let (id_raw, extra_raw) = match raw.split_once('(') {
        Some((id_raw, rest)) => {
            let extra = rest
                .strip_suffix(')')
                .ok_or_else(|| format!("missing ')' in {}", raw))?;
            (id_raw, Some(extra))
        }
        None => (raw, None),
    };
    let type_id = id_raw
        .trim()
        .parse::<u16>()
        .map_err(|_| format!("invalid item id {}", raw))?;
    let extra = extra_raw
        .map(|value| {
            value
                .trim()
                .parse::<u8>()
                .map_err(|_| format!("invalid item value {}", raw))
        })
        .transpose()?;
    Ok((ItemTypeId(type_id), extra))
}
