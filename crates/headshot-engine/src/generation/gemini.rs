use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use serde_json::{json, Value};

use super::{GeneratedImage, ImageGenerator};
use crate::config::GeminiConfig;
use crate::error::GenerationError;
use crate::image_input::InputImage;

const PROVIDER: &str = "Gemini";

/// One entry of `candidates[0].content.parts`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponsePart {
    Text(String),
    InlineImage { data: String, mime_type: Option<String> },
    Other,
}

pub struct GeminiGenerator {
    config: GeminiConfig,
    http: HttpClient,
}

impl GeminiGenerator {
    pub fn new(config: GeminiConfig) -> Self {
        Self {
            config,
            http: HttpClient::new(),
        }
    }

    pub fn from_env() -> Self {
        Self::new(GeminiConfig::from_env())
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    fn endpoint(&self) -> String {
        let trimmed = self.config.model.trim();
        let model_path = if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{trimmed}")
        };
        format!("{}/{}:generateContent", self.config.api_base, model_path)
    }

    /// Prompt first, then the single input image.
    pub(crate) fn build_payload(image: &InputImage, prompt: &str) -> Value {
        json!({
            "contents": [{
                "role": "user",
                "parts": [
                    { "text": prompt },
                    {
                        "inlineData": {
                            "mimeType": image.mime_type,
                            "data": BASE64.encode(&image.bytes),
                        }
                    }
                ]
            }],
            "generationConfig": {
                "responseModalities": ["TEXT", "IMAGE"],
            },
        })
    }

    /// Parts of the first candidate only. Missing or empty parts is an
    /// empty response.
    pub fn response_parts(payload: &Value) -> Result<Vec<ResponsePart>, GenerationError> {
        let parts = payload
            .get("candidates")
            .and_then(Value::as_array)
            .and_then(|candidates| candidates.first())
            .and_then(|candidate| candidate.get("content"))
            .and_then(|content| content.get("parts"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        if parts.is_empty() {
            return Err(GenerationError::EmptyResponse);
        }
        Ok(parts.iter().map(classify_part).collect())
    }

    /// First image part wins; later image parts are ignored. With
    /// no image, the first text part is returned as the model's explanation.
    pub fn parse_response(payload: &Value) -> Result<GeneratedImage, GenerationError> {
        let parts = Self::response_parts(payload)?;
        let mut images = parts.iter().filter_map(|part| match part {
            ResponsePart::InlineImage { data, mime_type } => Some((data, mime_type)),
            _ => None,
        });
        if let Some((data, mime_type)) = images.next() {
            let skipped = images.count();
            if skipped > 0 {
                tracing::debug!(skipped, "gemini returned extra image parts; using the first");
            }
            let bytes = BASE64.decode(data.as_bytes()).map_err(|err| {
                GenerationError::Transport(format!("{PROVIDER} image base64 decode failed: {err}"))
            })?;
            let mime_type = mime_type
                .clone()
                .or_else(|| {
                    image::guess_format(&bytes)
                        .ok()
                        .map(|format| format.to_mime_type().to_string())
                })
                .unwrap_or_else(|| "image/png".to_string());
            return Ok(GeneratedImage { bytes, mime_type });
        }

        let explanation = parts.iter().find_map(|part| match part {
            ResponsePart::Text(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
            _ => None,
        });
        match explanation {
            Some(text) => Err(GenerationError::TextOnlyResponse(text)),
            None => Err(GenerationError::EmptyResponse),
        }
    }

    fn post(&self, api_key: &str, payload: &Value) -> Result<HttpResponse, GenerationError> {
        self.http
            .post(self.endpoint())
            .query(&[("key", api_key)])
            .timeout(self.config.request_timeout)
            .json(payload)
            .send()
            .map_err(|raw| {
                let err = anyhow::Error::new(raw.without_url())
                    .context(format!("{PROVIDER} request failed ({})", self.config.model));
                GenerationError::transport(&err)
            })
    }
}

fn classify_part(part: &Value) -> ResponsePart {
    let inline = part
        .get("inlineData")
        .or_else(|| part.get("inline_data"))
        .and_then(Value::as_object);
    if let Some(inline) = inline {
        let data = inline
            .get("data")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if !data.is_empty() {
            let mime_type = inline
                .get("mimeType")
                .or_else(|| inline.get("mime_type"))
                .and_then(Value::as_str)
                .map(str::to_string);
            return ResponsePart::InlineImage {
                data: data.to_string(),
                mime_type,
            };
        }
    }
    if let Some(text) = part.get("text").and_then(Value::as_str) {
        return ResponsePart::Text(text.to_string());
    }
    ResponsePart::Other
}

fn response_json(response: HttpResponse) -> Result<Value, GenerationError> {
    let status = response.status();
    let body = response.text().map_err(|raw| {
        let err = anyhow::Error::new(raw.without_url())
            .context(format!("{PROVIDER} response body read failed"));
        GenerationError::transport(&err)
    })?;
    if !status.is_success() {
        return Err(GenerationError::http_status(PROVIDER, status.as_u16(), &body));
    }
    serde_json::from_str(&body).map_err(|err| {
        GenerationError::Transport(format!("{PROVIDER} returned invalid JSON payload: {err}"))
    })
}

impl ImageGenerator for GeminiGenerator {
    fn name(&self) -> &str {
        "gemini"
    }

    fn generate(&self, image: &InputImage, prompt: &str) -> Result<GeneratedImage, GenerationError> {
        let api_key = self.config.require_api_key()?;
        let payload = Self::build_payload(image, prompt);
        tracing::debug!(
            model = %self.config.model,
            input_bytes = image.bytes.len(),
            "gemini generateContent"
        );
        let response = self.post(api_key, &payload)?;
        let response_payload = response_json(response)?;
        Self::parse_response(&response_payload)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use base64::Engine as _;
    use serde_json::{json, Value};

    use super::{GeminiGenerator, ResponsePart, BASE64};
    use crate::config::GeminiConfig;
    use crate::error::GenerationError;
    use crate::generation::ImageGenerator;
    use crate::image_input::fixtures::{jpeg_bytes, portrait_png};
    use crate::image_input::InputImage;

    fn candidate(parts: Value) -> Value {
        json!({ "candidates": [{ "content": { "role": "model", "parts": parts } }] })
    }

    #[test]
    fn payload_sends_prompt_then_inline_image() -> anyhow::Result<()> {
        let image = InputImage::from_bytes(jpeg_bytes(16, 20))?;
        let payload = GeminiGenerator::build_payload(&image, "Transform this person");
        let parts = &payload["contents"][0]["parts"];
        assert_eq!(parts[0]["text"], json!("Transform this person"));
        assert_eq!(parts[1]["inlineData"]["mimeType"], json!("image/jpeg"));
        let sent = BASE64.decode(parts[1]["inlineData"]["data"].as_str().unwrap_or(""))?;
        assert_eq!(sent, image.bytes);
        assert_eq!(
            payload["generationConfig"]["responseModalities"],
            json!(["TEXT", "IMAGE"])
        );
        Ok(())
    }

    #[test]
    fn endpoint_prefixes_models_path() {
        let generator = GeminiGenerator::new(GeminiConfig::default().with_model("gemini-x"));
        assert_eq!(
            generator.endpoint(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-x:generateContent"
        );
        let generator = GeminiGenerator::new(GeminiConfig::default().with_model("models/gemini-y"));
        assert!(generator.endpoint().ends_with("/models/gemini-y:generateContent"));
    }

    #[test]
    fn parse_returns_single_inline_image() -> anyhow::Result<()> {
        let bytes = portrait_png(4, 4);
        let payload = candidate(json!([
            { "inlineData": { "mimeType": "image/png", "data": BASE64.encode(&bytes) } }
        ]));
        let image = GeminiGenerator::parse_response(&payload)?;
        assert_eq!(image.bytes, bytes);
        assert_eq!(image.mime_type, "image/png");
        Ok(())
    }

    #[test]
    fn parse_takes_first_image_after_text() -> anyhow::Result<()> {
        let payload = candidate(json!([
            { "text": "Here is your headshot" },
            { "inline_data": { "mime_type": "image/jpeg", "data": BASE64.encode(b"first") } },
            { "inlineData": { "mimeType": "image/png", "data": BASE64.encode(b"second") } }
        ]));
        let image = GeminiGenerator::parse_response(&payload)?;
        assert_eq!(image.bytes, b"first".to_vec());
        assert_eq!(image.mime_type, "image/jpeg");
        Ok(())
    }

    #[test]
    fn parse_guesses_mime_when_missing() -> anyhow::Result<()> {
        let bytes = jpeg_bytes(4, 4);
        let payload = candidate(json!([{ "inlineData": { "data": BASE64.encode(&bytes) } }]));
        assert_eq!(GeminiGenerator::parse_response(&payload)?.mime_type, "image/jpeg");
        Ok(())
    }

    #[test]
    fn parse_text_only_reports_model_explanation() {
        let payload = candidate(json!([{ "text": "I cannot process this image" }]));
        match GeminiGenerator::parse_response(&payload) {
            Err(GenerationError::TextOnlyResponse(text)) => {
                assert_eq!(text, "I cannot process this image")
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn parse_without_parts_is_empty_response() {
        for payload in [
            json!({}),
            json!({ "candidates": [] }),
            candidate(json!([])),
            json!({ "candidates": [{ "finishReason": "SAFETY" }] }),
        ] {
            assert!(matches!(
                GeminiGenerator::parse_response(&payload),
                Err(GenerationError::EmptyResponse)
            ));
        }
    }

    #[test]
    fn parse_parts_without_image_or_text_is_empty_response() {
        let payload = candidate(json!([{ "inlineData": { "data": "" } }, { "thought": true }]));
        assert!(matches!(
            GeminiGenerator::parse_response(&payload),
            Err(GenerationError::EmptyResponse)
        ));
    }

    #[test]
    fn parse_bad_base64_is_transport_error() {
        let payload = candidate(json!([{ "inlineData": { "data": "***" } }]));
        assert!(matches!(
            GeminiGenerator::parse_response(&payload),
            Err(GenerationError::Transport(_))
        ));
    }

    #[test]
    fn response_parts_classifies_each_part() -> anyhow::Result<()> {
        let payload = candidate(json!([
            { "text": "hi" },
            { "inlineData": { "mimeType": "image/png", "data": "AAAA" } },
            { "functionCall": {} }
        ]));
        assert_eq!(
            GeminiGenerator::response_parts(&payload)?,
            vec![
                ResponsePart::Text("hi".to_string()),
                ResponsePart::InlineImage {
                    data: "AAAA".to_string(),
                    mime_type: Some("image/png".to_string()),
                },
                ResponsePart::Other,
            ]
        );
        Ok(())
    }

    #[test]
    fn generate_without_credential_fails_before_any_request() -> anyhow::Result<()> {
        let generator = GeminiGenerator::new(GeminiConfig {
            api_base: "http://127.0.0.1:1".to_string(),
            ..GeminiConfig::default()
        });
        let image = InputImage::from_bytes(jpeg_bytes(8, 8))?;
        assert!(matches!(
            generator.generate(&image, "prompt"),
            Err(GenerationError::Configuration(_))
        ));
        Ok(())
    }

    #[test]
    fn unreachable_endpoint_is_transport_error_without_key_leak() -> anyhow::Result<()> {
        let generator = GeminiGenerator::new(GeminiConfig {
            api_key: Some("super-secret".to_string()),
            api_base: "http://127.0.0.1:1".to_string(),
            request_timeout: Duration::from_secs(15),
            ..GeminiConfig::default()
        });
        let image = InputImage::from_bytes(jpeg_bytes(8, 8))?;
        match generator.generate(&image, "prompt") {
            Err(GenerationError::Transport(message)) => {
                assert!(message.starts_with("Gemini request failed"));
                assert!(!message.contains("super-secret"));
            }
            other => panic!("unexpected: {other:?}"),
        }
        Ok(())
    }
}
