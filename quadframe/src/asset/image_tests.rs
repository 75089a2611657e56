use super::*;

// ============================================================================
// Validation
// ============================================================================

#[test]
fn test_from_rgba8() {
    let image = DecodedImage::from_rgba8(2, 3, vec![0xAB; 24]).unwrap();

    assert_eq!(image.metadata().width, 2);
    assert_eq!(image.metadata().height, 3);
    assert_eq!(image.metadata().array_size, 1);
    assert_eq!(image.metadata().mip_levels, 1);
    assert_eq!(image.row_pitch(), 8);
    assert_eq!(image.slice_pitch(), 24);
    assert_eq!(image.pixels().len(), 24);
}

#[test]
fn test_padded_rows_are_accepted() {
    let metadata = ImageMetadata::texture_2d(3, 2, Format::B8G8R8A8_UNORM);
    let image = DecodedImage::new(metadata, 16, 32, vec![0; 32]).unwrap();
    assert_eq!(image.row_pitch(), 16);
}

#[test]
fn test_short_pixel_buffer_rejected() {
    let result = DecodedImage::from_rgba8(4, 4, vec![0; 63]);
    assert!(matches!(result, Err(Error::InvalidResource(_))));
}

#[test]
fn test_short_row_pitch_rejected() {
    let metadata = ImageMetadata::texture_2d(4, 1, Format::R8G8B8A8_UNORM);
    assert!(DecodedImage::new(metadata, 12, 16, vec![0; 16]).is_err());
}

#[test]
fn test_empty_image_rejected() {
    assert!(DecodedImage::from_rgba8(0, 4, vec![]).is_err());
}

#[test]
fn test_non_texel_format_rejected() {
    let metadata = ImageMetadata::texture_2d(2, 2, Format::R16_UINT);
    assert!(DecodedImage::new(metadata, 4, 8, vec![0; 8]).is_err());
}
