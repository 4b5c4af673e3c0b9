use headshot_contracts::export::ExportEncoding;
use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};

use crate::error::CompositeError;

pub const JPEG_QUALITY: u8 = 95;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedImage {
    pub bytes: Vec<u8>,
    /// `None` when the input was passed through and its format is unknown.
    pub encoding: Option<ExportEncoding>,
}

/// Flattens a foreground image onto an opaque color and re-encodes it as
/// JPEG. Without a color the input is returned byte-for-byte.
pub fn composite(image: &[u8], color: Option<[u8; 3]>) -> Result<ComposedImage, CompositeError> {
    let Some([br, bg, bb]) = color else {
        let encoding = image::guess_format(image)
            .ok()
            .and_then(|format| ExportEncoding::from_mime(format.to_mime_type()));
        return Ok(ComposedImage {
            bytes: image.to_vec(),
            encoding,
        });
    };

    let foreground = image::load_from_memory(image)
        .map_err(CompositeError::Decode)?
        .to_rgba8();
    let (width, height) = foreground.dimensions();
    let mut canvas = RgbImage::from_pixel(width, height, Rgb([br, bg, bb]));
    for (x, y, pixel) in foreground.enumerate_pixels() {
        let [fr, fg, fb, fa] = pixel.0;
        let alpha = fa as u32;
        let blend = |front: u8, back: u8| -> u8 {
            ((front as u32 * alpha + back as u32 * (255 - alpha) + 127) / 255) as u8
        };
        canvas.put_pixel(x, y, Rgb([blend(fr, br), blend(fg, bg), blend(fb, bb)]));
    }

    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, JPEG_QUALITY)
        .encode_image(&canvas)
        .map_err(CompositeError::Encode)?;
    Ok(ComposedImage {
        bytes,
        encoding: Some(ExportEncoding::Jpeg),
    })
}

#[cfg(test)]
mod tests {
    use headshot_contracts::export::ExportEncoding;
    use image::{Rgba, RgbaImage};

    use super::composite;
    use crate::error::CompositeError;
    use crate::image_input::fixtures::png_bytes;

    fn half_transparent() -> Vec<u8> {
        let mut image = RgbaImage::from_pixel(16, 16, Rgba([0, 0, 0, 0]));
        for y in 4..12 {
            for x in 4..12 {
                image.put_pixel(x, y, Rgba([200, 10, 10, 255]));
            }
        }
        png_bytes(&image)
    }

    #[test]
    fn no_color_returns_input_unchanged() -> anyhow::Result<()> {
        let input = half_transparent();
        let composed = composite(&input, None)?;
        assert_eq!(composed.bytes, input);
        assert_eq!(composed.encoding, Some(ExportEncoding::Png));
        Ok(())
    }

    #[test]
    fn no_color_passes_through_even_undecodable_bytes() -> anyhow::Result<()> {
        let composed = composite(b"opaque blob", None)?;
        assert_eq!(composed.bytes, b"opaque blob".to_vec());
        assert_eq!(composed.encoding, None);
        Ok(())
    }

    #[test]
    fn color_flattens_to_opaque_jpeg() -> anyhow::Result<()> {
        let composed = composite(&half_transparent(), Some([255, 255, 255]))?;
        assert_eq!(composed.encoding, Some(ExportEncoding::Jpeg));
        assert_eq!(image::guess_format(&composed.bytes)?, image::ImageFormat::Jpeg);
        let decoded = image::load_from_memory(&composed.bytes)?;
        assert!(!decoded.color().has_alpha());
        let rgba = decoded.to_rgba8();
        assert!(rgba.pixels().all(|pixel| pixel.0[3] == 255));
        let corner = rgba.get_pixel(0, 0).0;
        assert!(corner[0] > 240 && corner[1] > 240 && corner[2] > 240);
        Ok(())
    }

    #[test]
    fn color_composite_is_deterministic() -> anyhow::Result<()> {
        let input = half_transparent();
        let a = composite(&input, Some([0x22, 0xc5, 0x5e]))?;
        let b = composite(&input, Some([0x22, 0xc5, 0x5e]))?;
        assert_eq!(a, b);
        Ok(())
    }

    #[test]
    fn undecodable_input_with_color_is_decode_error() {
        assert!(matches!(
            composite(b"not pixels", Some([0, 0, 0])),
            Err(CompositeError::Decode(_))
        ));
    }
}
