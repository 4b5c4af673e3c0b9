use headshot_contracts::styles::{effective_prompt, EffectivePrompt, StyleCatalog, StyleSpec};

use crate::error::{BackgroundError, GenerationError, ValidationError};
use crate::generation::GeneratedImage;
use crate::image_input::InputImage;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Screen {
    #[default]
    Upload,
    Configure,
    Generating,
    Result,
}

impl Screen {
    pub fn id(self) -> &'static str {
        match self {
            Screen::Upload => "upload",
            Screen::Configure => "configure",
            Screen::Generating => "generating",
            Screen::Result => "result",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    Configuration,
    ModelDeclined,
    EmptyResponse,
    Transport,
    LocalProcessing,
}

impl ErrorKind {
    pub fn id(self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Configuration => "configuration",
            ErrorKind::ModelDeclined => "model_declined",
            ErrorKind::EmptyResponse => "empty_response",
            ErrorKind::Transport => "transport",
            ErrorKind::LocalProcessing => "local_processing",
        }
    }
}

/// What a user sees in an error slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionError {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&ValidationError> for SessionError {
    fn from(err: &ValidationError) -> Self {
        Self {
            kind: ErrorKind::Validation,
            message: err.to_string(),
        }
    }
}

impl From<&GenerationError> for SessionError {
    fn from(err: &GenerationError) -> Self {
        let kind = match err {
            GenerationError::Configuration(_) => ErrorKind::Configuration,
            GenerationError::EmptyResponse => ErrorKind::EmptyResponse,
            GenerationError::TextOnlyResponse(_) => ErrorKind::ModelDeclined,
            GenerationError::Transport(_) => ErrorKind::Transport,
        };
        Self {
            kind,
            message: err.to_string(),
        }
    }
}

impl From<&BackgroundError> for SessionError {
    fn from(err: &BackgroundError) -> Self {
        Self {
            kind: ErrorKind::LocalProcessing,
            message: err.to_string(),
        }
    }
}

/// State owned by the workflow controller. Fields are only written by
/// [`super::Workflow`] transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub(crate) screen: Screen,
    pub(crate) original_image: Option<InputImage>,
    pub(crate) generated_image: Option<GeneratedImage>,
    pub(crate) selected_style: StyleSpec,
    pub(crate) custom_prompt: String,
    pub(crate) last_error: Option<SessionError>,
}

impl Session {
    pub(crate) fn new(default_style: StyleSpec) -> Self {
        Self {
            screen: Screen::Upload,
            original_image: None,
            generated_image: None,
            selected_style: default_style,
            custom_prompt: String::new(),
            last_error: None,
        }
    }

    /// Fresh session for `catalog`, or `None` if the catalog is empty.
    pub fn fresh(catalog: &StyleCatalog) -> Option<Self> {
        catalog.default_style().cloned().map(Self::new)
    }

    pub fn screen(&self) -> Screen {
        self.screen
    }

    pub fn original_image(&self) -> Option<&InputImage> {
        self.original_image.as_ref()
    }

    pub fn generated_image(&self) -> Option<&GeneratedImage> {
        self.generated_image.as_ref()
    }

    pub fn selected_style(&self) -> &StyleSpec {
        &self.selected_style
    }

    pub fn custom_prompt(&self) -> &str {
        &self.custom_prompt
    }

    pub fn last_error(&self) -> Option<&SessionError> {
        self.last_error.as_ref()
    }

    pub fn effective_prompt(&self) -> EffectivePrompt {
        effective_prompt(&self.selected_style, &self.custom_prompt)
    }

    /// Checks the screen/image invariants; used by tests and debug asserts.
    pub fn invariants_hold(&self) -> bool {
        let generated_ok = self.generated_image.is_none() || self.screen == Screen::Result;
        let original_ok = match self.screen {
            Screen::Upload => self.original_image.is_none(),
            _ => self.original_image.is_some(),
        };
        generated_ok && original_ok
    }
}

#[cfg(test)]
mod tests {
    use headshot_contracts::styles::StyleCatalog;

    use super::{ErrorKind, Screen, Session, SessionError};
    use crate::error::{BackgroundError, GenerationError, ValidationError};

    #[test]
    fn fresh_session_starts_on_upload_with_first_style() {
        let catalog = StyleCatalog::default();
        let session = Session::fresh(&catalog).unwrap_or_else(|| panic!("empty catalog"));
        assert_eq!(session.screen(), Screen::Upload);
        assert_eq!(session.selected_style().id, "corporate-grey");
        assert!(session.original_image().is_none());
        assert!(session.generated_image().is_none());
        assert!(session.last_error().is_none());
        assert!(session.invariants_hold());
    }

    #[test]
    fn empty_catalog_has_no_fresh_session() {
        let catalog = StyleCatalog::new(Some(Default::default()));
        assert!(Session::fresh(&catalog).is_none());
    }

    #[test]
    fn error_kinds_follow_failure_source() {
        assert_eq!(
            SessionError::from(&ValidationError::PromptRequired).kind,
            ErrorKind::Validation
        );
        assert_eq!(
            SessionError::from(&GenerationError::TextOnlyResponse("no".to_string())).kind,
            ErrorKind::ModelDeclined
        );
        assert_eq!(
            SessionError::from(&GenerationError::Configuration("missing".to_string())).kind,
            ErrorKind::Configuration
        );
        assert_eq!(
            SessionError::from(&BackgroundError::Unsupported("blocked".to_string())).kind,
            ErrorKind::LocalProcessing
        );
    }
}
