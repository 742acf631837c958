mod config;
pub mod entities;
pub mod net;
pub mod telemetry;
pub mod world;

pub use config::{AppConfig, ServerConfig};
pub use net::packet::{PacketReader, PacketWriter};
pub use world::grid::{GridError, WorldGrid};
pub use world::tile::{Tile, TileError};

pub fn run(args: &[String]) -> Result<(), String> {
    let config = config::AppConfig::from_args(args)?;
    telemetry::logging::init(&config.root, &config.log_level)?;
    tracing::info!(server = %config.server_name, root = %config.root.display(), "starting");

    let item_types = world::item_types::load_item_types(&config.items_file)
        .map_err(|err| err.to_string())?;
    let grid = WorldGrid::new();
    let summary = world::loader::load_map(&config.map_dir, &item_types, &grid)?;

    let mut cached = 0;
    let mut with_creatures = 0;
    let mut floor_changes = 0;
    let mut protection_zones = 0;
    let positions = grid.positions().map_err(|err| err.to_string())?;
    for position in &positions {
        grid.with_tile(*position, |tile| {
            if tile.cache().is_some() {
                cached += 1;
            }
            if tile.has_creatures() {
                with_creatures += 1;
            }
            if tile.has_any_floor_destination() {
                floor_changes += 1;
            }
            if tile.is_protection_zone() {
                protection_zones += 1;
            }
        })
        .map_err(|err| err.to_string())?;
    }

    println!("{}: map load", config.server_name);
    println!("- root: {}", config.root.display());
    println!(
        "- item types: {} ({})",
        item_types.len(),
        config.items_file.display()
    );
    println!("- map sectors: {}", summary.sectors);
    println!("- tiles: {}", positions.len());
    println!("- items placed: {}", summary.items);
    println!("- cached descriptions: {}", cached);
    println!("- tiles with creatures: {}", with_creatures);
    println!("- floor changes: {}", floor_changes);
    println!("- protection zones: {}", protection_zones);
    tracing::info!(tiles = positions.len(), cached, "world ready");
    Ok(())
}
