mod dryrun;
mod gemini;

use std::collections::BTreeMap;

pub use dryrun::DryrunGenerator;
pub use gemini::{GeminiGenerator, ResponsePart};

use crate::error::GenerationError;
use crate::image_input::InputImage;

/// Image returned by a generator, with the MIME type it reported.
#[derive(Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl std::fmt::Debug for GeneratedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneratedImage")
            .field("bytes", &format_args!("{} bytes", self.bytes.len()))
            .field("mime_type", &self.mime_type)
            .finish()
    }
}

/// (image, prompt) → image. Implementations perform no retries; a failure
/// surfaces directly to the caller.
pub trait ImageGenerator: Send + Sync {
    fn name(&self) -> &str;
    fn generate(&self, image: &InputImage, prompt: &str) -> Result<GeneratedImage, GenerationError>;
}

#[derive(Default)]
pub struct ImageGeneratorRegistry {
    generators: BTreeMap<String, Box<dyn ImageGenerator>>,
}

impl ImageGeneratorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<G: ImageGenerator + 'static>(&mut self, generator: G) {
        self.generators
            .insert(generator.name().to_string(), Box::new(generator));
    }

    pub fn get(&self, name: &str) -> Option<&dyn ImageGenerator> {
        self.generators
            .get(name.trim())
            .map(|generator| generator.as_ref())
    }

    pub fn names(&self) -> Vec<String> {
        self.generators.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{DryrunGenerator, ImageGeneratorRegistry};

    #[test]
    fn registry_lists_sorted_names_and_trims_lookup() {
        let mut registry = ImageGeneratorRegistry::new();
        registry.register(DryrunGenerator::new());
        assert_eq!(registry.names(), vec!["dryrun"]);
        assert!(registry.get(" dryrun ").is_some());
        assert!(registry.get("gemini").is_none());
    }
}
