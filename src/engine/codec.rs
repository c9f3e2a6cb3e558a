//! PNG encode/decode service backed by the `image` crate

use std::io::Cursor;

use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, ImageFormat};

use crate::engine::raster::Raster;
use crate::error::{PaintError, Result};

/// Encode a raster as an RGBA PNG
///
/// # Errors
/// `EmptyImage` for a zero-sized raster, `ImageEncode` if the encoder fails.
pub fn encode_png(raster: &Raster) -> Result<Vec<u8>> {
    if raster.is_empty() {
        return Err(PaintError::EmptyImage);
    }
    let mut out = Vec::new();
    PngEncoder::new(&mut out)
        .write_image(
            raster.pixels(),
            raster.width(),
            raster.height(),
            ExtendedColorType::Rgba8,
        )
        .map_err(|e| PaintError::ImageEncode {
            reason: e.to_string(),
        })?;
    Ok(out)
}

/// Decode PNG bytes into an RGBA raster (any PNG color type is accepted)
pub fn decode_png(bytes: &[u8]) -> Result<Raster> {
    let image = image::load(Cursor::new(bytes), ImageFormat::Png).map_err(|e| {
        PaintError::ImageDecode {
            reason: e.to_string(),
        }
    })?;
    Ok(Raster::from_rgba_image(image.to_rgba8()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::color::Rgba;

    #[test]
    fn test_png_is_lossless() {
        let mut raster = Raster::new(5, 3);
        raster.set(0, 0, Rgba::new(1, 2, 3, 4));
        raster.set(4, 2, Rgba::new(250, 128, 7, 255));

        let bytes = encode_png(&raster).unwrap();
        assert_eq!(&bytes[1..4], b"PNG");
        assert_eq!(decode_png(&bytes).unwrap(), raster);
    }

    #[test]
    fn test_encode_empty_rejected() {
        assert!(matches!(
            encode_png(&Raster::new(0, 4)),
            Err(PaintError::EmptyImage)
        ));
    }

    #[test]
    fn test_decode_garbage() {
        let err = decode_png(b"definitely not a png").unwrap_err();
        assert_eq!(err.error_code(), "IMAGE_DECODE");
    }
}
