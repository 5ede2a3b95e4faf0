use std::fs;
use std::io::{Read, Write};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Typeface applied to window text areas. egui ships a proportional and a
/// monospace family; custom font loading stays out of scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FontChoice {
    Proportional,
    Monospace,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditorSettings {
    pub auto_save: bool,
    pub font_family: FontChoice,
    pub font_size: f32,
    pub line_height: f32,
    pub letter_spacing: f32,
    // Colors as #rrggbb so the settings file stays hand-editable
    pub background_color: String,
    pub text_color: String,
    #[serde(default = "EditorSettings::default_highlight")]
    pub highlight_color: String,
    #[serde(default = "EditorSettings::default_true")]
    pub auto_close_quotes: bool,
    #[serde(default = "EditorSettings::default_editor_width")]
    pub editor_width: f32,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            auto_save: true,
            font_family: FontChoice::Proportional,
            font_size: 18.0,
            line_height: 1.75,
            letter_spacing: 0.0,
            background_color: "#ffffff".to_string(),
            text_color: "#1f2937".to_string(),
            highlight_color: Self::default_highlight(),
            auto_close_quotes: true,
            editor_width: Self::default_editor_width(),
        }
    }
}

impl EditorSettings {
    fn config_dir() -> PathBuf {
        // Cross-platform user config dir
        #[cfg(target_os = "macos")]
        {
            // ~/Library/Application Support/Story-Loom
            let home = std::env::var_os("HOME").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("~"));
            return home.join("Library").join("Application Support").join("Story-Loom");
        }
        #[cfg(target_os = "windows")]
        {
            // %APPDATA%\Story-Loom
            if let Ok(appdata) = std::env::var("APPDATA") {
                return PathBuf::from(appdata).join("Story-Loom");
            }
            return PathBuf::from("Story-Loom");
        }
        #[cfg(all(unix, not(target_os = "macos")))]
        {
            // $XDG_CONFIG_HOME/Story-Loom or ~/.config/Story-Loom
            if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
                return PathBuf::from(xdg).join("Story-Loom");
            }
            let home = std::env::var_os("HOME").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("~"));
            return home.join(".config").join("Story-Loom");
        }
    }

    pub fn load() -> anyhow::Result<Self> {
        let json_path = Self::config_dir().join("settings.json");
        if json_path.exists() {
            let mut f = std::fs::File::open(json_path)?;
            let mut s = String::new();
            f.read_to_string(&mut s)?;
            let v: Self = serde_json::from_str(&s)?;
            return Ok(v);
        }
        Ok(Self::default())
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let dir = Self::config_dir();
        fs::create_dir_all(&dir)?;
        let path = dir.join("settings.json");
        let s = serde_json::to_string_pretty(self)?;
        let mut f = std::fs::File::create(path)?;
        f.write_all(s.as_bytes())?;
        Ok(())
    }

    pub(crate) fn default_highlight() -> String { "#2563eb".to_string() }
    pub(crate) fn default_true() -> bool { true }
    pub(crate) fn default_editor_width() -> f32 { 900.0 }
}
