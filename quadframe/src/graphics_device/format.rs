/// Pixel and element formats shared by textures, render targets, vertex
/// attributes and index buffers

/// Data format of a texel, vertex attribute or index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum Format {
    /// No format (untyped buffers)
    UNKNOWN,

    // Color formats
    R8G8B8A8_UNORM,
    R8G8B8A8_UNORM_SRGB,
    B8G8R8A8_UNORM,
    B8G8R8A8_UNORM_SRGB,
    R32G32B32A32_FLOAT,

    // Vertex attribute formats
    R32G32_FLOAT,
    R32G32B32_FLOAT,

    // Index formats
    R16_UINT,
    R32_UINT,
}

impl Format {
    /// Size in bytes of one element (texel, attribute or index)
    pub fn size_bytes(&self) -> u32 {
        match self {
            Format::UNKNOWN => 0,
            Format::R16_UINT => 2,
            Format::R8G8B8A8_UNORM
            | Format::R8G8B8A8_UNORM_SRGB
            | Format::B8G8R8A8_UNORM
            | Format::B8G8R8A8_UNORM_SRGB
            | Format::R32_UINT => 4,
            Format::R32G32_FLOAT => 8,
            Format::R32G32B32_FLOAT => 12,
            Format::R32G32B32A32_FLOAT => 16,
        }
    }

    pub fn is_srgb(&self) -> bool {
        matches!(self, Format::R8G8B8A8_UNORM_SRGB | Format::B8G8R8A8_UNORM_SRGB)
    }

    /// True for the two formats an index buffer view accepts
    pub fn is_index_format(&self) -> bool {
        matches!(self, Format::R16_UINT | Format::R32_UINT)
    }

    /// True for formats usable as a render target
    pub fn is_color_target(&self) -> bool {
        matches!(
            self,
            Format::R8G8B8A8_UNORM
                | Format::R8G8B8A8_UNORM_SRGB
                | Format::B8G8R8A8_UNORM
                | Format::B8G8R8A8_UNORM_SRGB
                | Format::R32G32B32A32_FLOAT
        )
    }
}
