pub mod background;
pub mod compositor;
pub mod config;
pub mod error;
pub mod generation;
pub mod image_input;
pub mod workflow;

pub use background::{BackgroundRemover, BorderKeyRemover, ScratchImage};
pub use compositor::{composite, ComposedImage};
pub use config::GeminiConfig;
pub use error::{BackgroundError, CompositeError, ExportError, GenerationError, ValidationError};
pub use generation::{
    DryrunGenerator, GeminiGenerator, GeneratedImage, ImageGenerator, ImageGeneratorRegistry,
};
pub use image_input::{read_image_file, InputImage};
pub use workflow::{
    BackgroundEdit, EditState, ErrorKind, GenerationTicket, RemovalKey, RemovalTicket, Screen,
    Session, SessionChange, SessionError, Workflow,
};

/// Registry holding the built-in generators: `gemini` (configured from the
/// environment) and the offline `dryrun`.
pub fn default_generators(config: GeminiConfig) -> ImageGeneratorRegistry {
    let mut registry = ImageGeneratorRegistry::new();
    registry.register(GeminiGenerator::new(config));
    registry.register(DryrunGenerator::new());
    registry
}
