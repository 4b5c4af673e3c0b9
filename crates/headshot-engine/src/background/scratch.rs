use std::io::Write;
use std::path::Path;

use tempfile::{Builder as TempBuilder, NamedTempFile};

/// Temp file holding a processed image for previews. The file lives exactly
/// as long as this handle.
#[derive(Debug)]
pub struct ScratchImage {
    file: NamedTempFile,
}

impl ScratchImage {
    pub fn acquire(bytes: &[u8], extension: &str) -> std::io::Result<Self> {
        let mut file = TempBuilder::new()
            .prefix("headshot-preview-")
            .suffix(&format!(".{extension}"))
            .tempfile()?;
        file.write_all(bytes)?;
        file.flush()?;
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Deletes the file now, surfacing any error instead of ignoring it on
    /// drop.
    pub fn release(self) -> std::io::Result<()> {
        self.file.close()
    }
}
