use std::{fmt, path::Path};

use serde::{Deserialize, Serialize};

#[derive(Debug)]
pub enum SettingsError {
    Io(std::io::Error),
    Parsing(toml::de::Error),
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingsError::Io(e) => write!(f, "IO error: {}", e),
            SettingsError::Parsing(e) => write!(f, "TOML parse error: {}", e),
        }
    }
}

impl std::error::Error for SettingsError {}

impl From<std::io::Error> for SettingsError {
    fn from(value: std::io::Error) -> Self {
        SettingsError::Io(value)
    }
}

impl From<toml::de::Error> for SettingsError {
    fn from(value: toml::de::Error) -> Self {
        SettingsError::Parsing(value)
    }
}

/// Site-level settings consumed by index synthesis, theming and
/// reconciliation.
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct Settings {
    pub site_title: String,
    pub copyright_text: String,
    /// Name of the destination subfolder that note pages land in.
    pub pages_dir: String,
    /// Tag (without `#`) that marks a note as publishable.
    pub publish_tag: String,
    /// Strip tag-only lines from published page bodies.
    pub hide_tags: bool,
    /// Omit creation dates from the chronological index.
    pub hide_chrono_dates: bool,
    pub colors: ColorSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            site_title: "Zettelkasten".to_string(),
            copyright_text: String::new(),
            pages_dir: "pages".to_string(),
            publish_tag: "published".to_string(),
            hide_tags: true,
            hide_chrono_dates: true,
            colors: ColorSettings::default(),
        }
    }
}

impl Settings {
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let data = std::fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&data)?;

        Ok(settings)
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct ColorSettings {
    pub body_background: String,
    pub header_background: String,
    pub header_text: String,
    pub header_hover: String,
    pub body_link: String,
    pub body_hover: String,
}

impl Default for ColorSettings {
    fn default() -> Self {
        Self {
            body_background: "#fffafa".to_string(),
            header_background: "#81b622".to_string(),
            header_text: "#ecf87f".to_string(),
            header_hover: "#3d550c".to_string(),
            body_link: "#59981a".to_string(),
            body_hover: "#3d550c".to_string(),
        }
    }
}
