mod border_key;
mod scratch;

pub use border_key::BorderKeyRemover;
pub use scratch::ScratchImage;

use crate::error::BackgroundError;

/// image → foreground-only image, normally PNG with alpha. Local only; a
/// failure is reported to the caller and never retried here.
pub trait BackgroundRemover: Send + Sync {
    fn name(&self) -> &str;
    fn remove_background(&self, image: &[u8]) -> Result<Vec<u8>, BackgroundError>;
}
