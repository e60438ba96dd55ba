pub mod block_geometry;
pub mod frame;
pub mod importance_map;
pub mod overlay;
pub mod utils;
