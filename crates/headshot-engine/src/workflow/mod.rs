mod background_edit;
mod observe;
mod session;

use std::sync::mpsc::Receiver;

use anyhow::bail;
use headshot_contracts::backdrop::Backdrop;
use headshot_contracts::events::{EventWriter, SessionEvent};
use headshot_contracts::export::{result_file_name, ExportEncoding, ExportFile};
use headshot_contracts::styles::{EffectivePrompt, StyleCatalog, StyleSpec};

pub use background_edit::{BackgroundEdit, EditState, RemovalKey, RemovalTicket};
pub use observe::{BackgroundChange, SessionChange};
pub use session::{ErrorKind, Screen, Session, SessionError};

use crate::background::BackgroundRemover;
use crate::error::{BackgroundError, ExportError, GenerationError, ValidationError};
use crate::generation::{GeneratedImage, ImageGenerator};
use crate::image_input::InputImage;
use observe::Subscribers;

/// A generation call that has been started but not yet applied. Owns its
/// inputs so it can run on a worker thread.
#[derive(Debug, Clone)]
pub struct GenerationTicket {
    token: u64,
    image: InputImage,
    prompt: String,
    style_id: String,
}

impl GenerationTicket {
    pub fn token(&self) -> u64 {
        self.token
    }

    pub fn image(&self) -> &InputImage {
        &self.image
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn style_id(&self) -> &str {
        &self.style_id
    }

    pub fn run(&self, generator: &dyn ImageGenerator) -> Result<GeneratedImage, GenerationError> {
        generator.generate(&self.image, &self.prompt)
    }
}

/// Owns one headshot session and its optional background-edit entry. Every
/// mutation goes through a transition method; ignored events return `false`
/// (or `None`) and leave the state untouched.
pub struct Workflow {
    catalog: StyleCatalog,
    default_style: StyleSpec,
    session: Session,
    token: u64,
    next_edit_entry: u64,
    background_edit: Option<BackgroundEdit>,
    subscribers: Subscribers,
    events: Option<EventWriter>,
}

impl Workflow {
    pub fn new(catalog: StyleCatalog) -> anyhow::Result<Self> {
        let Some(default_style) = catalog.default_style().cloned() else {
            bail!("style catalog is empty");
        };
        Ok(Self {
            session: Session::new(default_style.clone()),
            default_style,
            catalog,
            token: 0,
            next_edit_entry: 0,
            background_edit: None,
            subscribers: Subscribers::default(),
            events: None,
        })
    }

    pub fn with_events(mut self, events: EventWriter) -> Self {
        self.events = Some(events);
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn catalog(&self) -> &StyleCatalog {
        &self.catalog
    }

    pub fn screen(&self) -> Screen {
        self.session.screen
    }

    pub fn busy(&self) -> bool {
        self.session.screen == Screen::Generating
    }

    pub fn subscribe(&mut self) -> Receiver<SessionChange> {
        self.subscribers.subscribe()
    }

    /// `Upload → Configure` for valid image bytes. Outside `Upload` the
    /// event is ignored (`Ok(false)`).
    pub fn select_image(&mut self, bytes: Vec<u8>) -> Result<bool, ValidationError> {
        if self.session.screen != Screen::Upload {
            tracing::debug!(screen = self.session.screen.id(), "ignoring image selection");
            return Ok(false);
        }
        match InputImage::from_bytes(bytes) {
            Ok(image) => {
                self.emit(SessionEvent::ImageSelected {
                    mime_type: image.mime_type.clone(),
                    bytes: image.bytes.len(),
                });
                self.session.original_image = Some(image);
                self.session.last_error = None;
                self.session.screen = Screen::Configure;
                self.publish();
                Ok(true)
            }
            Err(err) => {
                self.session.last_error = Some(SessionError::from(&err));
                self.publish();
                Err(err)
            }
        }
    }

    pub fn select_style(&mut self, style: &StyleSpec) -> bool {
        if self.busy() {
            tracing::debug!(style = %style.id, "ignoring style change while generating");
            return false;
        }
        self.session.selected_style = style.clone();
        self.publish();
        true
    }

    pub fn set_custom_prompt(&mut self, text: &str) -> bool {
        if self.busy() {
            tracing::debug!("ignoring prompt change while generating");
            return false;
        }
        self.session.custom_prompt = text.to_string();
        self.publish();
        true
    }

    /// `Configure → Generating`. Returns `None` when not in `Configure`, when
    /// no image is held, or when the effective prompt is blank (which also
    /// records a validation error).
    pub fn begin_generation(&mut self) -> Option<GenerationTicket> {
        if self.session.screen != Screen::Configure {
            tracing::debug!(screen = self.session.screen.id(), "ignoring generate request");
            return None;
        }
        let Some(image) = self.session.original_image.clone() else {
            tracing::debug!("ignoring generate request without an image");
            return None;
        };
        let prompt = match self.session.effective_prompt() {
            EffectivePrompt::Ready(prompt) => prompt,
            EffectivePrompt::Missing => {
                let err = ValidationError::PromptRequired;
                self.session.last_error = Some(SessionError::from(&err));
                self.emit(SessionEvent::PromptRejected {
                    style: self.session.selected_style.id.clone(),
                });
                self.publish();
                return None;
            }
        };

        self.token += 1;
        self.session.last_error = None;
        self.session.screen = Screen::Generating;
        let ticket = GenerationTicket {
            token: self.token,
            image,
            prompt,
            style_id: self.session.selected_style.id.clone(),
        };
        tracing::info!(token = ticket.token, style = %ticket.style_id, "generation started");
        self.emit(SessionEvent::GenerationStarted {
            token: ticket.token,
            style: ticket.style_id.clone(),
            prompt_chars: ticket.prompt.chars().count(),
        });
        self.publish();
        Some(ticket)
    }

    /// Applies `Generating → Result` or `Generating → Configure` if `token`
    /// is still current. Returns whether the outcome was applied.
    pub fn complete_generation(
        &mut self,
        token: u64,
        outcome: Result<GeneratedImage, GenerationError>,
    ) -> bool {
        if self.session.screen != Screen::Generating || token != self.token {
            tracing::warn!(
                token,
                current = self.token,
                screen = self.session.screen.id(),
                ok = outcome.is_ok(),
                "discarding stale generation result"
            );
            self.emit(SessionEvent::GenerationDiscarded { token });
            return false;
        }
        let outcome = outcome.and_then(|image| {
            if image.bytes.is_empty() {
                Err(GenerationError::EmptyResponse)
            } else {
                Ok(image)
            }
        });
        match outcome {
            Ok(image) => {
                self.emit(SessionEvent::GenerationSucceeded {
                    token,
                    mime_type: image.mime_type.clone(),
                    bytes: image.bytes.len(),
                });
                self.session.generated_image = Some(image);
                self.session.last_error = None;
                self.session.screen = Screen::Result;
            }
            Err(err) => {
                tracing::warn!(token, error = %err, "generation failed");
                let error = SessionError::from(&err);
                self.emit(SessionEvent::GenerationFailed {
                    token,
                    kind: error.kind.id().to_string(),
                    message: error.message.clone(),
                });
                self.session.last_error = Some(error);
                self.session.screen = Screen::Configure;
            }
        }
        debug_assert!(self.session.invariants_hold());
        self.publish();
        true
    }

    /// Blocking `begin_generation` + `complete_generation`.
    pub fn generate(&mut self, generator: &dyn ImageGenerator) -> bool {
        let Some(ticket) = self.begin_generation() else {
            return false;
        };
        let outcome = ticket.run(generator);
        self.complete_generation(ticket.token, outcome)
    }

    /// `Result → Configure`, keeping the uploaded image and style.
    pub fn try_again(&mut self) -> bool {
        if self.session.screen != Screen::Result {
            tracing::debug!(screen = self.session.screen.id(), "ignoring try again");
            return false;
        }
        self.drop_background_edit();
        self.session.generated_image = None;
        self.session.last_error = None;
        self.session.screen = Screen::Configure;
        self.emit(SessionEvent::TryAgain {
            style: self.session.selected_style.id.clone(),
        });
        self.publish();
        true
    }

    /// Back to a fresh session from any state. Any in-flight generation is
    /// invalidated.
    pub fn reset(&mut self) {
        self.drop_background_edit();
        self.token += 1;
        self.session = Session::new(self.default_style.clone());
        self.emit(SessionEvent::SessionReset { token: self.token });
        self.publish();
    }

    /// The generated image as a download, named after its own encoding.
    pub fn export_result(&self, timestamp_ms: i64) -> Option<ExportFile> {
        let image = self.session.generated_image.as_ref()?;
        let encoding = ExportEncoding::from_mime(&image.mime_type)
            .or_else(|| {
                image::guess_format(&image.bytes)
                    .ok()
                    .and_then(|format| ExportEncoding::from_mime(format.to_mime_type()))
            })
            .unwrap_or(ExportEncoding::Png);
        Some(ExportFile {
            file_name: result_file_name(timestamp_ms, encoding),
            encoding,
            bytes: image.bytes.clone(),
        })
    }

    pub fn background_edit(&self) -> Option<&BackgroundEdit> {
        self.background_edit.as_ref()
    }

    /// Enters a fresh background-edit entry. Only valid in `Result`; an
    /// already open entry is kept.
    pub fn open_background_edit(&mut self) -> bool {
        if self.session.screen != Screen::Result || self.background_edit.is_some() {
            tracing::debug!(
                screen = self.session.screen.id(),
                open = self.background_edit.is_some(),
                "ignoring background edit open"
            );
            return false;
        }
        self.next_edit_entry += 1;
        self.background_edit = Some(BackgroundEdit::for_entry(self.next_edit_entry));
        self.emit(SessionEvent::BackgroundEditOpened {
            entry: self.next_edit_entry,
        });
        self.publish();
        true
    }

    pub fn close_background_edit(&mut self) -> bool {
        if self.background_edit.is_none() {
            return false;
        }
        self.drop_background_edit();
        self.emit(SessionEvent::BackgroundEditClosed);
        self.publish();
        true
    }

    pub fn select_backdrop(&mut self, backdrop: Backdrop) -> bool {
        let Some(edit) = self.background_edit.as_mut() else {
            return false;
        };
        edit.select_backdrop(backdrop);
        self.publish();
        true
    }

    pub fn begin_background_removal(&mut self) -> Option<RemovalTicket> {
        let source = self.session.generated_image.as_ref()?;
        let edit = self.background_edit.as_mut()?;
        let ticket = edit.begin_start(&source.bytes)?;
        let key = ticket.key();
        self.emit(SessionEvent::BackgroundEditStarted {
            entry: key.entry,
            attempt: key.attempt,
        });
        self.publish();
        Some(ticket)
    }

    /// Applies a removal outcome to the entry it was started for. Outcomes for
    /// a closed or replaced entry, or a cancelled attempt, are discarded.
    pub fn complete_background_removal(
        &mut self,
        key: RemovalKey,
        outcome: Result<Vec<u8>, BackgroundError>,
    ) -> bool {
        let applied = match self.background_edit.as_mut() {
            Some(edit) if edit.entry() == key.entry => edit.complete_start(key, outcome),
            _ => {
                tracing::warn!(
                    entry = key.entry,
                    attempt = key.attempt,
                    "discarding background removal result for a closed entry"
                );
                false
            }
        };
        if !applied {
            self.emit(SessionEvent::BackgroundEditDiscarded {
                entry: key.entry,
                attempt: key.attempt,
            });
            return false;
        }
        let state = self
            .background_edit
            .as_ref()
            .map(|edit| edit.state())
            .unwrap_or_default();
        let message = self
            .background_edit
            .as_ref()
            .and_then(|edit| edit.last_error())
            .map(|error| error.message.clone());
        self.emit(SessionEvent::BackgroundEditFinished {
            entry: key.entry,
            attempt: key.attempt,
            state: state.id().to_string(),
            message,
        });
        self.publish();
        true
    }

    /// Blocking `begin_background_removal` + `complete_background_removal`.
    pub fn remove_background(&mut self, remover: &dyn BackgroundRemover) -> bool {
        let Some(ticket) = self.begin_background_removal() else {
            return false;
        };
        let outcome = ticket.run(remover);
        self.complete_background_removal(ticket.key(), outcome)
    }

    pub fn cancel_background_edit(&mut self) -> bool {
        let cancelled = self
            .background_edit
            .as_mut()
            .map(|edit| edit.cancel())
            .unwrap_or(false);
        if cancelled {
            self.emit(SessionEvent::BackgroundEditCancelled);
            self.publish();
        }
        cancelled
    }

    pub fn download_background_edit(&self, timestamp_ms: i64) -> Result<ExportFile, ExportError> {
        let edit = self
            .background_edit
            .as_ref()
            .ok_or(ExportError::NotReady("background edit is not open"))?;
        let file = edit.download(timestamp_ms)?;
        self.emit(SessionEvent::BackgroundEditDownloaded {
            file_name: file.file_name.clone(),
            backdrop: edit.selected_backdrop(),
        });
        Ok(file)
    }

    pub fn snapshot(&self) -> SessionChange {
        SessionChange {
            screen: self.session.screen,
            style_id: self.session.selected_style.id.clone(),
            last_error: self.session.last_error.clone(),
            has_generated_image: self.session.generated_image.is_some(),
            background: self.background_edit.as_ref().map(|edit| BackgroundChange {
                state: edit.state(),
                backdrop: edit.selected_backdrop(),
                last_error: edit.last_error().cloned(),
            }),
        }
    }

    fn drop_background_edit(&mut self) {
        if let Some(mut edit) = self.background_edit.take() {
            edit.release();
        }
    }

    fn publish(&mut self) {
        let change = self.snapshot();
        self.subscribers.publish(&change);
    }

    fn emit(&self, event: SessionEvent) {
        let Some(events) = self.events.as_ref() else {
            return;
        };
        let name = event.name();
        if let Err(err) = events.emit(event) {
            tracing::warn!(event = name, error = %err, "failed to write session event");
        }
    }
}
