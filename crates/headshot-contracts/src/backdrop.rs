use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Solid color (or none) placed behind a background-removed image on export.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backdrop {
    #[default]
    Transparent,
    White,
    Grey,
    Dark,
    Blue,
    Green,
}

impl Backdrop {
    pub const ALL: [Backdrop; 6] = [
        Backdrop::Transparent,
        Backdrop::White,
        Backdrop::Grey,
        Backdrop::Dark,
        Backdrop::Blue,
        Backdrop::Green,
    ];

    pub fn id(self) -> &'static str {
        match self {
            Backdrop::Transparent => "transparent",
            Backdrop::White => "white",
            Backdrop::Grey => "grey",
            Backdrop::Dark => "dark",
            Backdrop::Blue => "blue",
            Backdrop::Green => "green",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Backdrop::Transparent => "Transparent",
            Backdrop::White => "White",
            Backdrop::Grey => "Grey",
            Backdrop::Dark => "Dark",
            Backdrop::Blue => "Blue",
            Backdrop::Green => "Green",
        }
    }

    /// Opaque fill color, or `None` for a transparent backdrop.
    pub fn rgb(self) -> Option<[u8; 3]> {
        match self {
            Backdrop::Transparent => None,
            Backdrop::White => Some([0xff, 0xff, 0xff]),
            Backdrop::Grey => Some([0x94, 0xa3, 0xb8]),
            Backdrop::Dark => Some([0x1e, 0x29, 0x3b]),
            Backdrop::Blue => Some([0xdb, 0xea, 0xfe]),
            Backdrop::Green => Some([0x22, 0xc5, 0x5e]),
        }
    }

    pub fn hex(self) -> Option<String> {
        self.rgb()
            .map(|[r, g, b]| format!("#{r:02x}{g:02x}{b:02x}"))
    }

    pub fn is_transparent(self) -> bool {
        matches!(self, Backdrop::Transparent)
    }
}

impl fmt::Display for Backdrop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Backdrop {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_lowercase();
        let alias = match normalized.as_str() {
            "none" | "alpha" => "transparent",
            "gray" => "grey",
            other => other,
        };
        Backdrop::ALL
            .into_iter()
            .find(|backdrop| backdrop.id() == alias)
            .ok_or_else(|| {
                let known = Backdrop::ALL
                    .iter()
                    .map(|backdrop| backdrop.id())
                    .collect::<Vec<&str>>()
                    .join(", ");
                format!("Unknown backdrop '{}'. Expected one of: {known}.", raw.trim())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::Backdrop;

    #[test]
    fn only_transparent_has_no_color() {
        for backdrop in Backdrop::ALL {
            assert_eq!(backdrop.rgb().is_none(), backdrop.is_transparent());
        }
    }

    #[test]
    fn hex_matches_palette() {
        assert_eq!(Backdrop::Grey.hex().as_deref(), Some("#94a3b8"));
        assert_eq!(Backdrop::Green.hex().as_deref(), Some("#22c55e"));
        assert_eq!(Backdrop::Transparent.hex(), None);
    }

    #[test]
    fn parses_ids_and_aliases() {
        assert_eq!("white".parse::<Backdrop>(), Ok(Backdrop::White));
        assert_eq!(" Gray ".parse::<Backdrop>(), Ok(Backdrop::Grey));
        assert_eq!("none".parse::<Backdrop>(), Ok(Backdrop::Transparent));
        let err = "purple".parse::<Backdrop>().err().unwrap_or_default();
        assert!(err.contains("Unknown backdrop 'purple'"));
    }

    #[test]
    fn serializes_as_lowercase_id() -> anyhow::Result<()> {
        assert_eq!(serde_json::to_string(&Backdrop::Dark)?, "\"dark\"");
        let parsed: Backdrop = serde_json::from_str("\"blue\"")?;
        assert_eq!(parsed, Backdrop::Blue);
        Ok(())
    }
}
