//! Pedon is a minimal OpenGL rendering demo: an SDL2 window, a GLSL shader
//! loader, and a render loop drawing one static quad.
//!
//! The interesting part is [`abs::shader`], which compiles a vertex and a
//! fragment stage from files on disk and links them into a program.

pub mod abs;
pub mod config;
pub mod logging;
