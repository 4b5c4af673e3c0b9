use std::collections::VecDeque;
use std::io::Cursor;

use image::{ImageFormat, Rgba, RgbaImage};

use super::BackgroundRemover;
use crate::error::BackgroundError;

const DEFAULT_TOLERANCE: f32 = 48.0;
const SOFT_EDGE_FACTOR: f32 = 1.5;

/// Keys out the region connected to the image border whose color is close to
/// the border's median color. Pixels inside the tolerance become fully
/// transparent; pixels in the soft band around it get partial alpha but do
/// not extend the fill.
#[derive(Debug, Clone)]
pub struct BorderKeyRemover {
    tolerance: f32,
}

impl Default for BorderKeyRemover {
    fn default() -> Self {
        Self::new(DEFAULT_TOLERANCE)
    }
}

impl BorderKeyRemover {
    pub fn new(tolerance: f32) -> Self {
        let tolerance = if tolerance.is_finite() {
            tolerance.clamp(1.0, 255.0)
        } else {
            DEFAULT_TOLERANCE
        };
        Self { tolerance }
    }

    pub fn tolerance(&self) -> f32 {
        self.tolerance
    }

    pub(crate) fn key_out(&self, image: &mut RgbaImage) {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return;
        }
        let key = border_median(image);
        let soft = self.tolerance * SOFT_EDGE_FACTOR;
        let idx = |x: u32, y: u32| (y as usize) * (width as usize) + x as usize;
        let mut visited = vec![false; (width as usize) * (height as usize)];
        let mut queue = VecDeque::new();

        for (x, y) in border_coords(width, height) {
            if !visited[idx(x, y)] {
                visited[idx(x, y)] = true;
                queue.push_back((x, y));
            }
        }

        while let Some((x, y)) = queue.pop_front() {
            let pixel = *image.get_pixel(x, y);
            let distance = color_distance(pixel, key);
            if distance > soft {
                continue;
            }
            let keep = if distance <= self.tolerance {
                0.0
            } else {
                (distance - self.tolerance) / (soft - self.tolerance)
            };
            let Rgba([r, g, b, a]) = pixel;
            let alpha = (a as f32 * keep).round().clamp(0.0, 255.0) as u8;
            image.put_pixel(x, y, Rgba([r, g, b, alpha]));

            if distance > self.tolerance {
                continue;
            }
            for (nx, ny) in neighbors(x, y, width, height) {
                let slot = idx(nx, ny);
                if !visited[slot] {
                    visited[slot] = true;
                    queue.push_back((nx, ny));
                }
            }
        }
    }
}

impl BackgroundRemover for BorderKeyRemover {
    fn name(&self) -> &str {
        "border-key"
    }

    fn remove_background(&self, image: &[u8]) -> Result<Vec<u8>, BackgroundError> {
        let decoded = image::load_from_memory(image)
            .map_err(|err| BackgroundError::Unsupported(format!("decode failed: {err}")))?;
        let mut rgba = decoded.to_rgba8();
        if rgba.width() == 0 || rgba.height() == 0 {
            return Err(BackgroundError::Unsupported("image has no pixels".to_string()));
        }
        self.key_out(&mut rgba);
        let mut cursor = Cursor::new(Vec::new());
        rgba.write_to(&mut cursor, ImageFormat::Png)
            .map_err(|err| BackgroundError::Unsupported(format!("encode failed: {err}")))?;
        Ok(cursor.into_inner())
    }
}

fn border_coords(width: u32, height: u32) -> Vec<(u32, u32)> {
    let mut coords = Vec::new();
    for x in 0..width {
        coords.push((x, 0));
        coords.push((x, height - 1));
    }
    for y in 0..height {
        coords.push((0, y));
        coords.push((width - 1, y));
    }
    coords
}

fn neighbors(x: u32, y: u32, width: u32, height: u32) -> impl Iterator<Item = (u32, u32)> {
    let left = x.checked_sub(1).map(|nx| (nx, y));
    let right = (x + 1 < width).then_some((x + 1, y));
    let up = y.checked_sub(1).map(|ny| (x, ny));
    let down = (y + 1 < height).then_some((x, y + 1));
    [left, right, up, down].into_iter().flatten()
}

fn border_median(image: &RgbaImage) -> Rgba<u8> {
    let (width, height) = image.dimensions();
    let mut channels: [Vec<u8>; 3] = [Vec::new(), Vec::new(), Vec::new()];
    for (x, y) in border_coords(width, height) {
        let Rgba([r, g, b, _]) = *image.get_pixel(x, y);
        channels[0].push(r);
        channels[1].push(g);
        channels[2].push(b);
    }
    let mut median = [0u8; 3];
    for (slot, values) in median.iter_mut().zip(channels.iter_mut()) {
        values.sort_unstable();
        *slot = values[values.len() / 2];
    }
    Rgba([median[0], median[1], median[2], 255])
}

fn color_distance(a: Rgba<u8>, b: Rgba<u8>) -> f32 {
    let Rgba([ar, ag, ab, _]) = a;
    let Rgba([br, bg, bb, _]) = b;
    let dr = ar as f32 - br as f32;
    let dg = ag as f32 - bg as f32;
    let db = ab as f32 - bb as f32;
    (dr * dr + dg * dg + db * db).sqrt()
}

#[cfg(test)]
mod tests {
    use image::{GenericImageView, Rgba, RgbaImage};

    use super::BorderKeyRemover;
    use crate::background::BackgroundRemover;
    use crate::error::BackgroundError;
    use crate::image_input::fixtures::{png_bytes, portrait_png};

    #[test]
    fn flat_backdrop_becomes_transparent_and_subject_stays() -> anyhow::Result<()> {
        let output = BorderKeyRemover::default().remove_background(&portrait_png(40, 40))?;
        let decoded = image::load_from_memory(&output)?;
        assert!(decoded.color().has_alpha());
        assert_eq!(decoded.get_pixel(0, 0).0[3], 0);
        assert_eq!(decoded.get_pixel(39, 39).0[3], 0);
        assert_eq!(decoded.get_pixel(20, 20), Rgba([120, 60, 30, 255]));
        Ok(())
    }

    #[test]
    fn enclosed_backdrop_colored_region_is_kept() -> anyhow::Result<()> {
        let mut image = RgbaImage::from_pixel(30, 30, Rgba([240, 240, 240, 255]));
        for y in 5..25 {
            for x in 5..25 {
                image.put_pixel(x, y, Rgba([20, 20, 20, 255]));
            }
        }
        // backdrop-colored hole not connected to the border
        image.put_pixel(15, 15, Rgba([240, 240, 240, 255]));
        let output = BorderKeyRemover::default().remove_background(&png_bytes(&image))?;
        let decoded = image::load_from_memory(&output)?.to_rgba8();
        assert_eq!(decoded.get_pixel(15, 15).0[3], 255);
        assert_eq!(decoded.get_pixel(2, 2).0[3], 0);
        Ok(())
    }

    #[test]
    fn soft_band_gets_partial_alpha() {
        let remover = BorderKeyRemover::new(20.0);
        let mut image = RgbaImage::from_pixel(5, 5, Rgba([100, 100, 100, 255]));
        // distance 25 from the key: inside the soft band (20..30)
        image.put_pixel(2, 1, Rgba([125, 100, 100, 255]));
        remover.key_out(&mut image);
        let alpha = image.get_pixel(2, 1).0[3];
        assert!(alpha > 0 && alpha < 255, "alpha {alpha}");
        assert_eq!(image.get_pixel(0, 0).0[3], 0);
    }

    #[test]
    fn undecodable_input_is_reported_not_panicked() {
        let err = BorderKeyRemover::default()
            .remove_background(b"definitely not an image")
            .err();
        assert!(matches!(err, Some(BackgroundError::Unsupported(_))));
    }

    #[test]
    fn tolerance_is_clamped() {
        assert_eq!(BorderKeyRemover::new(-5.0).tolerance(), 1.0);
        assert_eq!(BorderKeyRemover::new(f32::NAN).tolerance(), 48.0);
    }
}
