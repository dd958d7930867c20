//! This module contains the thin layer over SDL2 and OpenGL the demo is
//! built on: window and context setup, shader loading, and meshes.

pub mod app;
pub mod mesh;
pub mod shader;

pub use app::*;
pub use mesh::*;
pub use shader::*;
