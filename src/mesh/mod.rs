//! Mesh storage and processing

pub mod buffer;
pub mod meshlet;
pub mod utils;
pub mod obj;
pub mod optimize;
pub mod primitives;

pub use buffer::{MeshBuffer, VertexAttrs, REMAP_NONE};
pub use meshlet::Meshlet;
