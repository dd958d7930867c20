//! Mesh management module.
//!
//! This module defines the [`Mesh`] struct for managing indexed vertex data
//! on the GPU side, and the static quad the demo draws. Vertices implement
//! the [`Vertex`] trait.

use std::sync::Arc;

use glam::{Mat4, Vec2, Vec3, vec2};
use glow::HasContext;

/// Trait that defines the attribute layout of a vertex type.
pub trait Vertex: Copy {
    /// Sets up the vertex attribute pointers. Called with the VAO and VBO
    /// bound.
    fn vertex_attribs(gl: &glow::Context);
}

/// Represents a mesh stored on the GPU side.
pub struct Mesh {
    gl: Arc<glow::Context>,
    draw_mode: u32,
    vao: glow::VertexArray,
    vbo: glow::Buffer,
    ebo: glow::Buffer,
    index_count: usize,
}

fn as_bytes<T: Copy>(data: &[T]) -> &[u8] {
    unsafe { std::slice::from_raw_parts(data.as_ptr() as *const u8, std::mem::size_of_val(data)) }
}

impl Mesh {
    /// Uploads vertex and index data into new GPU buffers.
    pub fn new<V: Vertex>(
        gl: &Arc<glow::Context>,
        vertices: &[V],
        indices: &[u32],
        draw_mode: u32,
    ) -> Result<Self, String> {
        unsafe {
            let vao = gl.create_vertex_array()?;
            let vbo = gl.create_buffer()?;
            let ebo = gl.create_buffer()?;

            gl.bind_vertex_array(Some(vao));
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(vbo));
            gl.buffer_data_u8_slice(glow::ARRAY_BUFFER, as_bytes(vertices), glow::STATIC_DRAW);

            gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, Some(ebo));
            gl.buffer_data_u8_slice(
                glow::ELEMENT_ARRAY_BUFFER,
                as_bytes(indices),
                glow::STATIC_DRAW,
            );

            V::vertex_attribs(gl);

            gl.bind_vertex_array(None);
            gl.bind_buffer(glow::ARRAY_BUFFER, None);
            gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, None);

            Ok(Self {
                gl: Arc::clone(gl),
                draw_mode,
                vao,
                vbo,
                ebo,
                index_count: indices.len(),
            })
        }
    }

    /// Draws the mesh with whatever program is bound.
    pub fn draw(&self) {
        unsafe {
            self.gl.bind_vertex_array(Some(self.vao));
            self.gl
                .draw_elements(self.draw_mode, self.index_count as i32, glow::UNSIGNED_INT, 0);
            self.gl.bind_vertex_array(None);
        }
    }
}

impl Drop for Mesh {
    fn drop(&mut self) {
        unsafe {
            self.gl.delete_buffer(self.vbo);
            self.gl.delete_buffer(self.ebo);
            self.gl.delete_vertex_array(self.vao);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(C)]
pub struct QuadVertex {
    pub position: Vec2,
    pub uv: Vec2,
}

impl Vertex for QuadVertex {
    fn vertex_attribs(gl: &glow::Context) {
        unsafe {
            let stride = std::mem::size_of::<QuadVertex>() as i32;

            gl.vertex_attrib_pointer_f32(0, 2, glow::FLOAT, false, stride, 0);
            gl.enable_vertex_attrib_array(0);

            gl.vertex_attrib_pointer_f32(
                1,
                2,
                glow::FLOAT,
                false,
                stride,
                std::mem::offset_of!(QuadVertex, uv) as i32,
            );
            gl.enable_vertex_attrib_array(1);
        }
    }
}

/// Half the side length of the quad in normalized device coordinates.
pub const QUAD_HALF_EXTENT: f32 = 0.5;

pub const QUAD_VERTICES: [QuadVertex; 4] = [
    QuadVertex {
        position: vec2(-QUAD_HALF_EXTENT, -QUAD_HALF_EXTENT),
        uv: vec2(0.0, 0.0),
    },
    QuadVertex {
        position: vec2(QUAD_HALF_EXTENT, -QUAD_HALF_EXTENT),
        uv: vec2(1.0, 0.0),
    },
    QuadVertex {
        position: vec2(QUAD_HALF_EXTENT, QUAD_HALF_EXTENT),
        uv: vec2(1.0, 1.0),
    },
    QuadVertex {
        position: vec2(-QUAD_HALF_EXTENT, QUAD_HALF_EXTENT),
        uv: vec2(0.0, 1.0),
    },
];

// Counter-clockwise
pub const QUAD_INDICES: [u32; 6] = [0, 1, 2, 0, 2, 3];

/// Builds the static quad mesh.
pub fn quad_mesh(gl: &Arc<glow::Context>) -> Result<Mesh, String> {
    Mesh::new(gl, &QUAD_VERTICES, &QUAD_INDICES, glow::TRIANGLES)
}

/// Scale that keeps the quad square in a `width` x `height` viewport.
pub fn quad_transform(width: u32, height: u32) -> Mat4 {
    if width == 0 || height == 0 {
        return Mat4::IDENTITY;
    }
    let aspect = width as f32 / height as f32;
    let scale = if aspect >= 1.0 {
        Vec3::new(1.0 / aspect, 1.0, 1.0)
    } else {
        Vec3::new(1.0, aspect, 1.0)
    };
    Mat4::from_scale(scale)
}
