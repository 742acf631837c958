pub mod floor_change;
pub mod grid;
pub mod item_types;
pub mod loader;
pub mod position;
pub mod tile;
