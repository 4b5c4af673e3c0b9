use std::path::Path;

use headshot_contracts::backdrop::Backdrop;
use headshot_contracts::export::{edited_file_name, ExportEncoding, ExportFile};

use super::session::SessionError;
use crate::background::{BackgroundRemover, ScratchImage};
use crate::compositor::composite;
use crate::error::{BackgroundError, ExportError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum EditState {
    #[default]
    Idle,
    Processing,
    Edited,
    Failed,
}

impl EditState {
    pub fn id(self) -> &'static str {
        match self {
            EditState::Idle => "idle",
            EditState::Processing => "processing",
            EditState::Edited => "edited",
            EditState::Failed => "failed",
        }
    }
}

/// Identifies one removal attempt of one sub-workflow entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RemovalKey {
    pub(crate) entry: u64,
    pub(crate) attempt: u64,
}

/// A removal call that was started but not yet applied. It owns a copy of
/// its source, so it can run on another thread.
#[derive(Debug, Clone)]
pub struct RemovalTicket {
    key: RemovalKey,
    source: Vec<u8>,
}

impl RemovalTicket {
    pub fn key(&self) -> RemovalKey {
        self.key
    }

    pub fn source(&self) -> &[u8] {
        &self.source
    }

    pub fn run(&self, remover: &dyn BackgroundRemover) -> Result<Vec<u8>, BackgroundError> {
        remover.remove_background(&self.source)
    }
}

#[derive(Debug)]
struct ProcessedImage {
    bytes: Vec<u8>,
    preview: ScratchImage,
}

/// Nested sub-workflow: `Idle → Processing → Edited`, or `Failed`. One value
/// per entry; its preview file is released on cancel, close, or drop.
#[derive(Debug)]
pub struct BackgroundEdit {
    key: RemovalKey,
    state: EditState,
    processed: Option<ProcessedImage>,
    selected_backdrop: Backdrop,
    last_error: Option<SessionError>,
}

impl Default for BackgroundEdit {
    fn default() -> Self {
        Self::new()
    }
}

impl BackgroundEdit {
    pub fn new() -> Self {
        Self::for_entry(0)
    }

    pub(crate) fn for_entry(entry: u64) -> Self {
        Self {
            key: RemovalKey { entry, attempt: 0 },
            state: EditState::Idle,
            processed: None,
            selected_backdrop: Backdrop::default(),
            last_error: None,
        }
    }

    pub fn state(&self) -> EditState {
        self.state
    }

    pub fn busy(&self) -> bool {
        self.state == EditState::Processing
    }

    pub fn processed_image(&self) -> Option<&[u8]> {
        self.processed.as_ref().map(|processed| processed.bytes.as_slice())
    }

    pub fn preview_path(&self) -> Option<&Path> {
        self.processed
            .as_ref()
            .map(|processed| processed.preview.path())
    }

    pub fn selected_backdrop(&self) -> Backdrop {
        self.selected_backdrop
    }

    pub fn last_error(&self) -> Option<&SessionError> {
        self.last_error.as_ref()
    }

    pub(crate) fn entry(&self) -> u64 {
        self.key.entry
    }

    /// Settable in any state; only used once `Edited`.
    pub fn select_backdrop(&mut self, backdrop: Backdrop) {
        self.selected_backdrop = backdrop;
    }

    /// `Idle`/`Failed` → `Processing`. Returns `None` while processing or
    /// once a result is cached; cancel first to recompute.
    pub fn begin_start(&mut self, source: &[u8]) -> Option<RemovalTicket> {
        match self.state {
            EditState::Processing | EditState::Edited => {
                tracing::debug!(state = self.state.id(), "background removal already started");
                None
            }
            EditState::Idle | EditState::Failed => {
                self.key.attempt += 1;
                self.state = EditState::Processing;
                self.last_error = None;
                Some(RemovalTicket {
                    key: self.key,
                    source: source.to_vec(),
                })
            }
        }
    }

    /// Applies the outcome of `key` if it is still the pending attempt.
    /// Returns whether it was applied.
    pub fn complete_start(
        &mut self,
        key: RemovalKey,
        outcome: Result<Vec<u8>, BackgroundError>,
    ) -> bool {
        if self.state != EditState::Processing || key != self.key {
            tracing::warn!(
                entry = key.entry,
                attempt = key.attempt,
                current_entry = self.key.entry,
                current_attempt = self.key.attempt,
                "discarding stale background removal result"
            );
            return false;
        }
        let acquired = outcome.and_then(|bytes| {
            if bytes.is_empty() {
                return Err(BackgroundError::Unsupported("remover returned no bytes".to_string()));
            }
            ScratchImage::acquire(&bytes, ExportEncoding::Png.extension())
                .map(|preview| ProcessedImage { bytes, preview })
                .map_err(|err| BackgroundError::Unsupported(format!("preview file: {err}")))
        });
        match acquired {
            Ok(processed) => {
                self.processed = Some(processed);
                self.last_error = None;
                self.state = EditState::Edited;
            }
            Err(err) => {
                tracing::warn!(error = %err, "background removal failed");
                self.processed = None;
                self.last_error = Some(SessionError::from(&err));
                self.state = EditState::Failed;
            }
        }
        true
    }

    /// Blocking `begin_start` + `complete_start`. The remover runs at most
    /// once per cached result.
    pub fn start(&mut self, source: &[u8], remover: &dyn BackgroundRemover) -> bool {
        let Some(ticket) = self.begin_start(source) else {
            return false;
        };
        let outcome = ticket.run(remover);
        self.complete_start(ticket.key(), outcome)
    }

    /// `Edited`/`Failed` → `Idle`, dropping the processed image and its
    /// preview file. Ignored in `Idle` and while processing.
    pub fn cancel(&mut self) -> bool {
        match self.state {
            EditState::Edited | EditState::Failed => {
                self.release();
                self.last_error = None;
                self.state = EditState::Idle;
                self.key.attempt += 1;
                true
            }
            EditState::Idle | EditState::Processing => false,
        }
    }

    /// Releases the preview file now.
    pub(crate) fn release(&mut self) {
        if let Some(processed) = self.processed.take() {
            let path = processed.preview.path().to_path_buf();
            if let Err(err) = processed.preview.release() {
                tracing::warn!(?err, ?path, "failed to remove background preview file");
            }
        }
    }

    /// Transparent backdrop: processed bytes unchanged as PNG. Any color:
    /// flattened JPEG.
    pub fn download(&self, timestamp_ms: i64) -> Result<ExportFile, ExportError> {
        let processed = match (self.state, self.processed.as_ref()) {
            (EditState::Edited, Some(processed)) => processed,
            _ => return Err(ExportError::NotReady("background has not been removed")),
        };
        let Some(color) = self.selected_backdrop.rgb() else {
            return Ok(ExportFile {
                file_name: edited_file_name(self.selected_backdrop, timestamp_ms, ExportEncoding::Png),
                encoding: ExportEncoding::Png,
                bytes: processed.bytes.clone(),
            });
        };
        let composed = composite(&processed.bytes, Some(color)).map_err(|err| {
            tracing::error!(error = %err, "compositing background edit failed");
            ExportError::from(err)
        })?;
        let encoding = composed.encoding.unwrap_or(ExportEncoding::Jpeg);
        Ok(ExportFile {
            file_name: edited_file_name(self.selected_backdrop, timestamp_ms, encoding),
            encoding,
            bytes: composed.bytes,
        })
    }
}

impl Drop for BackgroundEdit {
    fn drop(&mut self) {
        self.release();
    }
}
