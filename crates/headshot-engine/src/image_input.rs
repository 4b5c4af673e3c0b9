use std::io::Cursor;
use std::path::Path;

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::ImageReader;

use crate::error::ValidationError;

/// Encoded image bytes plus their MIME type, as held by a session.
#[derive(Clone, PartialEq, Eq)]
pub struct InputImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl std::fmt::Debug for InputImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputImage")
            .field("bytes", &format_args!("{} bytes", self.bytes.len()))
            .field("mime_type", &self.mime_type)
            .finish()
    }
}

impl InputImage {
    /// Accepts bytes only if they carry a known image signature and a
    /// readable header. Anything else is rejected before a session leaves
    /// the upload screen.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, ValidationError> {
        let format = image::guess_format(&bytes).map_err(|_| ValidationError::NotAnImage)?;
        let (width, height) = ImageReader::with_format(Cursor::new(bytes.as_slice()), format)
            .into_dimensions()
            .map_err(|_| ValidationError::NotAnImage)?;
        if width == 0 || height == 0 {
            return Err(ValidationError::NotAnImage);
        }
        Ok(Self {
            mime_type: format.to_mime_type().to_string(),
            bytes,
        })
    }

    /// Parses `data:image/<type>;base64,<payload>`. A bare base64 payload is
    /// accepted as well.
    pub fn from_data_url(raw: &str) -> Result<Self, ValidationError> {
        let trimmed = raw.trim();
        let payload = match trimmed.strip_prefix("data:") {
            Some(rest) => {
                let (header, data) = rest.split_once(',').ok_or_else(|| {
                    ValidationError::MalformedDataUrl("missing ',' separator".to_string())
                })?;
                let media_type = header.split(';').next().unwrap_or_default();
                if !media_type.to_ascii_lowercase().starts_with("image/") {
                    return Err(ValidationError::NotAnImage);
                }
                if !header
                    .split(';')
                    .any(|param| param.eq_ignore_ascii_case("base64"))
                {
                    return Err(ValidationError::MalformedDataUrl(
                        "only base64 payloads are supported".to_string(),
                    ));
                }
                data
            }
            None => trimmed,
        };
        let bytes = BASE64
            .decode(payload.trim().as_bytes())
            .map_err(|err| ValidationError::MalformedDataUrl(err.to_string()))?;
        Self::from_bytes(bytes)
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, BASE64.encode(&self.bytes))
    }

    pub fn dimensions(&self) -> Option<(u32, u32)> {
        ImageReader::new(Cursor::new(self.bytes.as_slice()))
            .with_guessed_format()
            .ok()?
            .into_dimensions()
            .ok()
    }
}

/// Reads a file from disk; I/O failures are errors, non-image content is a
/// validation failure reported by [`InputImage::from_bytes`].
pub fn read_image_file(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("failed reading {}", path.display()))
}


#[cfg(test)]
mod tests {
    use super::fixtures::{jpeg_bytes, portrait_png};
    use super::InputImage;
    use crate::error::ValidationError;

    #[test]
    fn jpeg_bytes_are_accepted_with_mime() -> anyhow::Result<()> {
        let image = InputImage::from_bytes(jpeg_bytes(40, 50))?;
        assert_eq!(image.mime_type, "image/jpeg");
        assert_eq!(image.dimensions(), Some((40, 50)));
        Ok(())
    }

    #[test]
    fn text_bytes_are_rejected() {
        let err = InputImage::from_bytes(b"hello, not an image".to_vec()).err();
        assert_eq!(err, Some(ValidationError::NotAnImage));
    }

    #[test]
    fn truncated_png_signature_is_rejected() {
        let mut bytes = portrait_png(8, 8);
        bytes.truncate(10);
        assert_eq!(
            InputImage::from_bytes(bytes).err(),
            Some(ValidationError::NotAnImage)
        );
    }

    #[test]
    fn data_url_round_trips_through_session_encoding() -> anyhow::Result<()> {
        let original = InputImage::from_bytes(portrait_png(8, 8))?;
        let parsed = InputImage::from_data_url(&original.to_data_url())?;
        assert_eq!(parsed, original);
        Ok(())
    }

    #[test]
    fn data_url_with_non_image_media_type_is_rejected() {
        let err = InputImage::from_data_url("data:text/plain;base64,aGVsbG8=").err();
        assert_eq!(err, Some(ValidationError::NotAnImage));
    }

    #[test]
    fn data_url_without_separator_is_malformed() {
        let err = InputImage::from_data_url("data:image/png;base64").err();
        assert!(matches!(err, Some(ValidationError::MalformedDataUrl(_))));
    }
}
