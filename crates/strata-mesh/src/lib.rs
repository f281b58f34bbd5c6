//! Greedy meshing with per-vertex ambient occlusion: turns a chunk and its
//! neighbourhood into GPU-ready vertex and index buffers.

mod ambient_occlusion;
mod atlas;
mod face_direction;
mod greedy;
mod mesh_buffer;

pub use ambient_occlusion::{AO_CORNERS, corner_ao_samples, should_flip_ao_diagonal, vertex_ao};
pub use atlas::{AtlasLookup, PlainVertices, VertexDecorator, WorldSpaceVertices};
pub use face_direction::FaceDirection;
pub use greedy::{GreedyMesher, MeshError};
pub use mesh_buffer::{MeshBuffer, MeshVertex, Quad, QuadInfo};
