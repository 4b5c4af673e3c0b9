mod catalog;
mod prompt;

pub use catalog::{StyleCatalog, StyleSpec, CUSTOM_STYLE_ID};
pub use prompt::{effective_prompt, EffectivePrompt};
