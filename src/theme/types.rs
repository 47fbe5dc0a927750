//! Theme preference types

use serde::{Deserialize, Serialize};

/// Light/dark mode selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    Light,
    Dark,
    /// Follow the host's color scheme preference
    #[default]
    System,
}

/// Accent color key
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorTheme {
    #[default]
    Blue,
    Orange,
    Yellow,
    Green,
    Purple,
    Rose,
}

/// The mode actually applied once `system` is resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EffectiveTheme {
    Light,
    Dark,
}

/// Persisted theme preference
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemePreference {
    #[serde(default)]
    pub theme: ThemeMode,
    #[serde(rename = "colorTheme", default)]
    pub color_theme: ColorTheme,
}

/// Partial preference change; absent fields are left alone
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct ThemeUpdate {
    #[serde(default)]
    pub theme: Option<ThemeMode>,
    #[serde(rename = "colorTheme", default)]
    pub color_theme: Option<ColorTheme>,
}

impl ThemeMode {
    /// Resolve against the host's dark-mode preference
    pub fn resolve(self, system_prefers_dark: bool) -> EffectiveTheme {
        match self {
            ThemeMode::Light => EffectiveTheme::Light,
            ThemeMode::Dark => EffectiveTheme::Dark,
            ThemeMode::System if system_prefers_dark => EffectiveTheme::Dark,
            ThemeMode::System => EffectiveTheme::Light,
        }
    }
}
