use std::io::Cursor;

use image::{ImageFormat, Rgba};
use sha2::{Digest, Sha256};

use super::{GeneratedImage, ImageGenerator};
use crate::error::GenerationError;
use crate::image_input::InputImage;

/// Offline generator: blends the input toward a color derived from the
/// prompt. Same input and prompt always give the same bytes.
#[derive(Debug, Clone, Default)]
pub struct DryrunGenerator;

impl DryrunGenerator {
    pub fn new() -> Self {
        Self
    }
}

impl ImageGenerator for DryrunGenerator {
    fn name(&self) -> &str {
        "dryrun"
    }

    fn generate(&self, image: &InputImage, prompt: &str) -> Result<GeneratedImage, GenerationError> {
        let decoded = image::load_from_memory(&image.bytes).map_err(|err| {
            GenerationError::Transport(format!("dryrun could not decode input image: {err}"))
        })?;
        let (r, g, b) = color_from_prompt(prompt);
        let mut tinted = decoded.to_rgba8();
        for pixel in tinted.pixels_mut() {
            let Rgba([pr, pg, pb, pa]) = *pixel;
            *pixel = Rgba([mix(pr, r), mix(pg, g), mix(pb, b), pa]);
        }
        let mut cursor = Cursor::new(Vec::new());
        tinted
            .write_to(&mut cursor, ImageFormat::Png)
            .map_err(|err| GenerationError::Transport(format!("dryrun encode failed: {err}")))?;
        Ok(GeneratedImage {
            bytes: cursor.into_inner(),
            mime_type: "image/png".to_string(),
        })
    }
}

fn mix(base: u8, tint: u8) -> u8 {
    ((base as u16 * 3 + tint as u16) / 4) as u8
}

fn color_from_prompt(prompt: &str) -> (u8, u8, u8) {
    let mut hasher = Sha256::new();
    hasher.update(prompt.as_bytes());
    let digest = hasher.finalize();
    (digest[0], digest[1], digest[2])
}
