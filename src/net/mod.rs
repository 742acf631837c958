pub mod buffer_pool;
pub mod packet;
pub mod tile_description;
