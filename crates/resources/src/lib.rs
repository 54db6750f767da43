//! Render resources.
//!
//! This crate defines the data the renderer uploads and draws:
//! - Constant records as laid out in GPU memory
//! - Vertex formats
//! - Materials and mesh geometry
//! - Per-entity dirty counters

pub mod constants;
pub mod dirty;
pub mod material;
pub mod mesh;
pub mod vertex;

pub use constants::{LightConstants, MAX_LIGHTS, MaterialConstants, ObjectConstants, PassConstants};
pub use dirty::DirtyCounter;
pub use material::{Material, MaterialDesc};
pub use mesh::{MeshGeometry, SubmeshGeometry};
pub use vertex::{SpriteVertex, Vertex};
