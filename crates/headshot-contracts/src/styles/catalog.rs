use indexmap::IndexMap;
use serde::Serialize;

pub const CUSTOM_STYLE_ID: &str = "custom";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StyleSpec {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Text sent to the generator. Empty for the custom entry.
    pub prompt_template: String,
    pub preview_color: String,
    pub icon: Option<String>,
}

impl StyleSpec {
    pub fn is_custom(&self) -> bool {
        self.id == CUSTOM_STYLE_ID
    }
}

/// Ordered, immutable set of headshot styles. The first entry is the default
/// selection for a fresh session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleCatalog {
    styles: IndexMap<String, StyleSpec>,
}

impl Default for StyleCatalog {
    fn default() -> Self {
        Self::new(None)
    }
}

impl StyleCatalog {
    /// Builds a catalog from explicit entries, or the built-in styles when
    /// `styles` is `None`. Returns an empty catalog only if given one.
    pub fn new(styles: Option<IndexMap<String, StyleSpec>>) -> Self {
        Self {
            styles: styles.unwrap_or_else(default_styles),
        }
    }

    pub fn get(&self, id: &str) -> Option<&StyleSpec> {
        self.styles.get(id.trim())
    }

    pub fn list(&self) -> impl Iterator<Item = &StyleSpec> {
        self.styles.values()
    }

    pub fn ids(&self) -> Vec<String> {
        self.styles.keys().cloned().collect()
    }

    pub fn default_style(&self) -> Option<&StyleSpec> {
        self.styles.values().next()
    }

    pub fn custom(&self) -> Option<&StyleSpec> {
        self.styles.values().find(|style| style.is_custom())
    }

    pub fn len(&self) -> usize {
        self.styles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }
}

fn default_styles() -> IndexMap<String, StyleSpec> {
    let mut map = IndexMap::new();

    let mut insert = |id: &str,
                      name: &str,
                      description: &str,
                      prompt_template: &str,
                      preview_color: &str,
                      icon: &str| {
        map.insert(
            id.to_string(),
            StyleSpec {
                id: id.to_string(),
                name: name.to_string(),
                description: description.to_string(),
                prompt_template: prompt_template.to_string(),
                preview_color: preview_color.to_string(),
                icon: Some(icon.to_string()),
            },
        );
    };

    insert(
        "corporate-grey",
        "Corporate Grey",
        "Professional grey studio backdrop, suit and tie or formal blouse.",
        "Transform this person into a professional corporate headshot. They should be wearing \
         a sharp, dark business suit. The background should be a clean, neutral grey studio \
         backdrop. High quality, photorealistic, 8k resolution, soft studio lighting.",
        "bg-slate-400",
        "🏢",
    );
    insert(
        "modern-office",
        "Modern Tech",
        "Casual yet professional look with a blurred modern office background.",
        "Transform this person into a modern tech industry professional. They should be wearing \
         smart casual attire like a polo or blazer with a t-shirt. The background should be a \
         bright, blurred modern open-plan office with glass and greenery. Natural lighting, \
         approachable vibe.",
        "bg-blue-200",
        "💻",
    );
    insert(
        "outdoor-natural",
        "Outdoor Natural",
        "Fresh outdoor setting with natural lighting and bokeh.",
        "Transform this person into a professional outdoor portrait. They should be wearing \
         business casual clothing. The background should be a blurred park or city street with \
         beautiful natural bokeh and golden hour lighting. Warm, friendly, and trustworthy.",
        "bg-green-200",
        "🌳",
    );
    insert(
        "islamic-traditional",
        "Islamic Traditional",
        "Traditional attire with Panjabi, Tupi, and well-groomed beard.",
        "Transform this person into a dignified professional portrait with traditional Islamic \
         styling. The subject should be wearing a crisp Panjabi and a prayer cap (Tupi). Feature \
         a well-groomed beard (Dari). The background should be a clean, neutral studio backdrop. \
         High quality, photorealistic, 8k resolution, soft studio lighting.",
        "bg-emerald-200",
        "🕌",
    );
    insert(
        "studio-black",
        "Dramatic Black",
        "High-contrast studio lighting with a black background.",
        "Transform this person into a dramatic, high-end studio portrait. Dark, solid black \
         background. Rim lighting on the hair and shoulders. Serious and confident expression. \
         Wearing a black turtleneck or dark formal wear. Artistic and bold.",
        "bg-slate-900",
        "🎭",
    );
    insert(
        CUSTOM_STYLE_ID,
        "Custom Prompt",
        "Describe your own style or edit.",
        "",
        "bg-indigo-500",
        "✨",
    );

    map
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;

    use super::{StyleCatalog, StyleSpec, CUSTOM_STYLE_ID};

    #[test]
    fn default_catalog_starts_with_corporate_grey() {
        let catalog = StyleCatalog::default();
        let first = catalog.default_style().cloned().unwrap_or_else(|| panic!("empty catalog"));
        assert_eq!(first.id, "corporate-grey");
        assert_eq!(first.name, "Corporate Grey");
        assert!(first
            .prompt_template
            .starts_with("Transform this person into a professional corporate headshot."));
    }

    #[test]
    fn default_catalog_has_single_custom_entry_with_empty_template() {
        let catalog = StyleCatalog::default();
        let customs: Vec<&StyleSpec> = catalog.list().filter(|style| style.is_custom()).collect();
        assert_eq!(customs.len(), 1);
        assert!(customs[0].prompt_template.is_empty());
        assert_eq!(catalog.custom().map(|style| style.id.as_str()), Some(CUSTOM_STYLE_ID));
    }

    #[test]
    fn preset_templates_do_not_contain_line_continuation_gaps() {
        for style in StyleCatalog::default().list() {
            assert!(!style.prompt_template.contains("  "), "{}", style.id);
        }
    }

    #[test]
    fn catalog_preserves_insertion_order() {
        let ids = StyleCatalog::default().ids();
        assert_eq!(
            ids,
            vec![
                "corporate-grey",
                "modern-office",
                "outdoor-natural",
                "islamic-traditional",
                "studio-black",
                "custom",
            ]
        );
    }

    #[test]
    fn lookup_trims_identifier() {
        let catalog = StyleCatalog::default();
        assert_eq!(
            catalog.get("  studio-black ").map(|style| style.name.as_str()),
            Some("Dramatic Black")
        );
        assert!(catalog.get("missing").is_none());
    }

    #[test]
    fn explicit_catalog_replaces_builtins() {
        let mut styles = IndexMap::new();
        styles.insert(
            "only".to_string(),
            StyleSpec {
                id: "only".to_string(),
                name: "Only".to_string(),
                description: String::new(),
                prompt_template: "make it blue".to_string(),
                preview_color: String::new(),
                icon: None,
            },
        );
        let catalog = StyleCatalog::new(Some(styles));
        assert_eq!(catalog.len(), 1);
        assert!(catalog.custom().is_none());
    }
}
