//! Theme preference
//!
//! Light/dark/system mode plus an accent color, persisted the same way as
//! annotations.

mod store;
mod types;

pub use store::{ThemeStore, THEME_NAMESPACE};
pub use types::{ColorTheme, EffectiveTheme, ThemeMode, ThemePreference, ThemeUpdate};
