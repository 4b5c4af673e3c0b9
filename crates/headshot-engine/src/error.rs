use serde_json::Value;
use thiserror::Error;

pub const TRANSPORT_FALLBACK_MESSAGE: &str = "Something went wrong during generation.";
pub const PROMPT_REQUIRED_MESSAGE: &str = "Please enter a custom prompt.";
pub const NOT_AN_IMAGE_MESSAGE: &str = "The selected file is not a supported image.";
pub const REMOVAL_FAILED_MESSAGE: &str =
    "Failed to remove background. The environment might block the required resources.";

/// User-correctable input problems; the user is re-prompted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{}", PROMPT_REQUIRED_MESSAGE)]
    PromptRequired,
    #[error("{}", NOT_AN_IMAGE_MESSAGE)]
    NotAnImage,
    #[error("Malformed data URL: {0}")]
    MalformedDataUrl(String),
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("{0}")]
    Configuration(String),
    #[error("No content generated.")]
    EmptyResponse,
    #[error("Model returned text instead of image: {0}")]
    TextOnlyResponse(String),
    #[error("{}", transport_message(.0))]
    Transport(String),
}

fn transport_message(message: &str) -> &str {
    let trimmed = message.trim();
    if trimmed.is_empty() {
        return TRANSPORT_FALLBACK_MESSAGE;
    }
    trimmed
}

impl GenerationError {
    pub fn transport(err: &anyhow::Error) -> Self {
        GenerationError::Transport(error_chain_text(err, 512))
    }

    /// Builds a transport error from a non-success HTTP reply, preferring the
    /// API's own `error.message` over the raw body.
    pub fn http_status(provider: &str, code: u16, body: &str) -> Self {
        let api_message = serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|parsed| {
                parsed
                    .get("error")
                    .and_then(|error| error.get("message"))
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .filter(|message| !message.trim().is_empty());
        let detail = api_message.unwrap_or_else(|| truncate_text(body.trim(), 512));
        if detail.is_empty() {
            return GenerationError::Transport(format!("{provider} request failed ({code})"));
        }
        GenerationError::Transport(format!("{provider} request failed ({code}): {detail}"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackgroundError {
    #[error("{} ({})", REMOVAL_FAILED_MESSAGE, .0)]
    Unsupported(String),
}

#[derive(Debug, Error)]
pub enum CompositeError {
    #[error("processed image could not be decoded: {0}")]
    Decode(#[source] image::ImageError),
    #[error("composited image could not be encoded: {0}")]
    Encode(#[source] image::ImageError),
}

/// Download failures. A compositor failure is fatal for that download and is
/// not retried.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("nothing to export: {0}")]
    NotReady(&'static str),
    #[error(transparent)]
    Composite(#[from] CompositeError),
}

pub(crate) fn error_chain_text(err: &anyhow::Error, max_chars: usize) -> String {
    let mut parts: Vec<String> = Vec::new();
    for cause in err.chain() {
        let text = cause.to_string();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            continue;
        }
        if parts
            .last()
            .map(|existing| existing == trimmed)
            .unwrap_or(false)
        {
            continue;
        }
        parts.push(trimmed.to_string());
    }
    if parts.is_empty() {
        return truncate_text(&err.to_string(), max_chars);
    }
    truncate_text(&parts.join(" | caused by: "), max_chars)
}

pub(crate) fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}
