pub mod pnts;
pub mod tile_info;
pub mod tileset;
