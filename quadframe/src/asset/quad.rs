/// Quad geometry: vertex type, the four corners and the six indices

use bytemuck::{Pod, Zeroable};

use crate::graphics_device::{Format, InputElementDesc};

/// Vertex as laid out in the vertex buffer (20 bytes)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex {
    pub const fn new(position: [f32; 3], uv: [f32; 2]) -> Self {
        Self { position, uv }
    }
}

/// Corners of the clip-space square, texture V flipped so the image is upright
pub const QUAD_VERTICES: [Vertex; 4] = [
    Vertex::new([-1.0, -1.0, 0.0], [0.0, 1.0]),
    Vertex::new([-1.0, 1.0, 0.0], [0.0, 0.0]),
    Vertex::new([1.0, -1.0, 0.0], [1.0, 1.0]),
    Vertex::new([1.0, 1.0, 0.0], [1.0, 0.0]),
];

/// Two triangles sharing the 1-2 diagonal
pub const QUAD_INDICES: [u16; 6] = [0, 1, 2, 2, 1, 3];

pub const QUAD_INDEX_COUNT: u32 = QUAD_INDICES.len() as u32;

/// Input layout matching `Vertex`: POSITION at 0, TEXCOORD appended (12)
pub fn quad_input_layout() -> [InputElementDesc; 2] {
    [
        InputElementDesc::per_vertex("POSITION", Format::R32G32B32_FLOAT),
        InputElementDesc::per_vertex("TEXCOORD", Format::R32G32_FLOAT),
    ]
}

#[cfg(test)]
#[path = "quad_tests.rs"]
mod tests;
