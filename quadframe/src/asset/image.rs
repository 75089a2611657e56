/// Decoded image record handed over by the image-decoding collaborator

use crate::error::{Error, Result};
use crate::graphics_device::Format;

/// Shape and pixel format of a decoded image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageMetadata {
    pub width: u32,
    pub height: u32,
    pub array_size: u16,
    pub mip_levels: u16,
    pub format: Format,
}

impl ImageMetadata {
    /// Single 2D image without mips
    pub fn texture_2d(width: u32, height: u32, format: Format) -> Self {
        Self { width, height, array_size: 1, mip_levels: 1, format }
    }

    /// Bytes of one tightly packed row
    pub fn tight_row_pitch(&self) -> u32 {
        self.width * self.format.size_bytes()
    }
}

/// Fully decoded pixel rows of the top mip
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedImage {
    metadata: ImageMetadata,
    row_pitch: u32,
    slice_pitch: u32,
    pixels: Vec<u8>,
}

impl DecodedImage {
    /// Wrap decoded pixels
    ///
    /// # Errors
    ///
    /// `Error::InvalidResource` when the image is empty, the format has no
    /// texel size, a row pitch is shorter than a row, or `pixels` does not
    /// cover `row_pitch * height`.
    pub fn new(metadata: ImageMetadata, row_pitch: u32, slice_pitch: u32, pixels: Vec<u8>) -> Result<Self> {
        if metadata.width == 0 || metadata.height == 0 {
            return Err(Error::InvalidResource(format!(
                "image has no pixels ({}x{})",
                metadata.width, metadata.height
            )));
        }
        if metadata.format.size_bytes() == 0 || !metadata.format.is_color_target() {
            return Err(Error::InvalidResource(format!("{:?} is not a texel format", metadata.format)));
        }
        if row_pitch < metadata.tight_row_pitch() {
            return Err(Error::InvalidResource(format!(
                "row pitch {} shorter than a {} byte row",
                row_pitch,
                metadata.tight_row_pitch()
            )));
        }
        let covered = row_pitch as u64 * metadata.height as u64;
        if (slice_pitch as u64) < covered || (pixels.len() as u64) < covered {
            return Err(Error::InvalidResource(format!(
                "{} pixel bytes (slice pitch {}) do not cover {} rows of {} bytes",
                pixels.len(),
                slice_pitch,
                metadata.height,
                row_pitch
            )));
        }
        Ok(Self { metadata, row_pitch, slice_pitch, pixels })
    }

    /// Tightly packed RGBA8 image
    pub fn from_rgba8(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        let metadata = ImageMetadata::texture_2d(width, height, Format::R8G8B8A8_UNORM);
        let row_pitch = metadata.tight_row_pitch();
        Self::new(metadata, row_pitch, row_pitch * height, pixels)
    }

    pub fn metadata(&self) -> &ImageMetadata {
        &self.metadata
    }

    pub fn row_pitch(&self) -> u32 {
        self.row_pitch
    }

    pub fn slice_pitch(&self) -> u32 {
        self.slice_pitch
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}

#[cfg(test)]
#[path = "image_tests.rs"]
mod tests;
