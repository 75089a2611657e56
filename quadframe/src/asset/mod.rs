//! Asset module - inputs consumed by the frame pipeline.
//!
//! Quad geometry, shader byte code and decoded images. Producing them from
//! files (compiling shader source, decoding image files) belongs to external
//! collaborators; this module defines the records they hand over.

pub mod image;
pub mod quad;
pub mod shader;

pub use image::{DecodedImage, ImageMetadata};
pub use quad::{quad_input_layout, Vertex, QUAD_INDICES, QUAD_INDEX_COUNT, QUAD_VERTICES};
pub use shader::{
    compile_shader, decode_error_blob, ShaderCompileError, ShaderCompiler, ShaderSource,
    SpirvFileLoader,
};
