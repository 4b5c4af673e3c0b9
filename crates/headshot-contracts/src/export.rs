use std::fmt;

use chrono::Utc;
use serde::Serialize;

use crate::backdrop::Backdrop;

pub const RESULT_PREFIX: &str = "ai-headshot";
pub const EDITED_PREFIX: &str = "headshot";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportEncoding {
    /// Lossless, alpha preserved.
    Png,
    /// Lossy, opaque.
    Jpeg,
    Webp,
}

impl ExportEncoding {
    pub fn extension(self) -> &'static str {
        match self {
            ExportEncoding::Png => "png",
            ExportEncoding::Jpeg => "jpg",
            ExportEncoding::Webp => "webp",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ExportEncoding::Png => "image/png",
            ExportEncoding::Jpeg => "image/jpeg",
            ExportEncoding::Webp => "image/webp",
        }
    }

    pub fn from_mime(mime: &str) -> Option<Self> {
        let lowered = mime.trim().to_ascii_lowercase();
        if lowered.contains("jpeg") || lowered.contains("jpg") {
            return Some(ExportEncoding::Jpeg);
        }
        if lowered.contains("png") {
            return Some(ExportEncoding::Png);
        }
        if lowered.contains("webp") {
            return Some(ExportEncoding::Webp);
        }
        None
    }
}

impl fmt::Display for ExportEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// A named, ready-to-write download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFile {
    pub file_name: String,
    pub encoding: ExportEncoding,
    pub bytes: Vec<u8>,
}

/// `ai-headshot-<ts>.<ext>` for the plain generated result.
pub fn result_file_name(timestamp_ms: i64, encoding: ExportEncoding) -> String {
    format!("{RESULT_PREFIX}-{timestamp_ms}.{}", encoding.extension())
}

/// `headshot-bg-removed-<ts>.png` for a transparent export,
/// `headshot-<backdrop>-<ts>.<ext>` otherwise.
pub fn edited_file_name(backdrop: Backdrop, timestamp_ms: i64, encoding: ExportEncoding) -> String {
    let qualifier = match backdrop {
        Backdrop::Transparent => "bg-removed",
        other => other.id(),
    };
    format!(
        "{EDITED_PREFIX}-{qualifier}-{timestamp_ms}.{}",
        encoding.extension()
    )
}

pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::{edited_file_name, result_file_name, ExportEncoding};
    use crate::backdrop::Backdrop;

    #[test]
    fn result_name_uses_fixed_prefix() {
        assert_eq!(
            result_file_name(1_700_000_000_000, ExportEncoding::Jpeg),
            "ai-headshot-1700000000000.jpg"
        );
    }

    #[test]
    fn transparent_export_is_named_bg_removed_png() {
        assert_eq!(
            edited_file_name(Backdrop::Transparent, 42, ExportEncoding::Png),
            "headshot-bg-removed-42.png"
        );
    }

    #[test]
    fn colored_export_names_backdrop() {
        assert_eq!(
            edited_file_name(Backdrop::White, 42, ExportEncoding::Jpeg),
            "headshot-white-42.jpg"
        );
    }

    #[test]
    fn encoding_from_mime() {
        assert_eq!(ExportEncoding::from_mime("image/JPEG"), Some(ExportEncoding::Jpeg));
        assert_eq!(ExportEncoding::from_mime("image/png"), Some(ExportEncoding::Png));
        assert_eq!(ExportEncoding::from_mime("image/webp"), Some(ExportEncoding::Webp));
        assert_eq!(ExportEncoding::from_mime("text/plain"), None);
    }
}
