use super::catalog::StyleSpec;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EffectivePrompt {
    Ready(String),
    /// Resolved text was empty or whitespace only.
    Missing,
}

impl EffectivePrompt {
    pub fn text(&self) -> Option<&str> {
        match self {
            EffectivePrompt::Ready(text) => Some(text.as_str()),
            EffectivePrompt::Missing => None,
        }
    }
}

/// Resolves the text sent to the generator: the user's text for the custom
/// style, the template otherwise. The returned text is not trimmed; only the
/// emptiness check is.
pub fn effective_prompt(style: &StyleSpec, custom_prompt: &str) -> EffectivePrompt {
    let source = if style.is_custom() {
        custom_prompt
    } else {
        style.prompt_template.as_str()
    };
    if source.trim().is_empty() {
        return EffectivePrompt::Missing;
    }
    EffectivePrompt::Ready(source.to_string())
}

#[cfg(test)]
mod tests {
    use super::{effective_prompt, EffectivePrompt};
    use crate::styles::{StyleCatalog, CUSTOM_STYLE_ID};

    #[test]
    fn preset_style_ignores_custom_text() {
        let catalog = StyleCatalog::default();
        let style = catalog.get("studio-black").cloned().unwrap_or_else(|| panic!("missing"));
        let resolved = effective_prompt(&style, "make me a pirate");
        assert_eq!(resolved.text(), Some(style.prompt_template.as_str()));
    }

    #[test]
    fn custom_style_uses_user_text() {
        let catalog = StyleCatalog::default();
        let style = catalog.get(CUSTOM_STYLE_ID).cloned().unwrap_or_else(|| panic!("missing"));
        assert_eq!(
            effective_prompt(&style, "add film grain"),
            EffectivePrompt::Ready("add film grain".to_string())
        );
    }

    #[test]
    fn custom_style_with_whitespace_is_missing() {
        let catalog = StyleCatalog::default();
        let style = catalog.get(CUSTOM_STYLE_ID).cloned().unwrap_or_else(|| panic!("missing"));
        assert_eq!(effective_prompt(&style, ""), EffectivePrompt::Missing);
        assert_eq!(effective_prompt(&style, " \n\t "), EffectivePrompt::Missing);
    }
}
