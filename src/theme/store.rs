//! Persisted theme preference store

use std::sync::Arc;

use super::types::{ColorTheme, EffectiveTheme, ThemeMode, ThemePreference, ThemeUpdate};
use crate::events::{SubscriptionId, Subscribers};
use crate::persistence::{Persister, StorageBackend};

/// Namespace key the theme preference is stored under
pub const THEME_NAMESPACE: &str = "pdf-theme";

/// Holds the current theme preference
pub struct ThemeStore {
    preference: ThemePreference,
    persister: Option<Persister<ThemePreference>>,
    subscribers: Subscribers<ThemePreference>,
    persistence_healthy: bool,
}

impl ThemeStore {
    /// Open a store; missing or corrupt data gives the defaults
    pub fn open(persister: Option<Persister<ThemePreference>>) -> Self {
        let preference = persister
            .as_ref()
            .and_then(|p| p.load())
            .unwrap_or_default();

        tracing::debug!(
            theme = ?preference.theme,
            color_theme = ?preference.color_theme,
            "Opened theme store"
        );

        Self {
            preference,
            persister,
            subscribers: Subscribers::new(),
            persistence_healthy: true,
        }
    }

    pub fn in_memory() -> Self {
        Self::open(None)
    }

    /// Store persisted to `backend` under [`THEME_NAMESPACE`]
    pub fn with_backend(backend: Arc<dyn StorageBackend>) -> Self {
        Self::open(Some(Persister::new(backend, THEME_NAMESPACE)))
    }

    pub fn get(&self) -> ThemePreference {
        self.preference
    }

    pub fn set_theme(&mut self, theme: ThemeMode) {
        self.preference.theme = theme;
        self.commit();
    }

    pub fn set_color_theme(&mut self, color_theme: ColorTheme) {
        self.preference.color_theme = color_theme;
        self.commit();
    }

    /// Apply the fields present in `update` with a single write
    pub fn apply(&mut self, update: ThemeUpdate) -> ThemePreference {
        if let Some(theme) = update.theme {
            self.preference.theme = theme;
        }
        if let Some(color_theme) = update.color_theme {
            self.preference.color_theme = color_theme;
        }
        self.commit();
        self.preference
    }

    /// Back to the defaults
    pub fn reset(&mut self) {
        self.preference = ThemePreference::default();
        self.commit();
    }

    /// Mode to render with, given the host's dark-mode preference
    pub fn effective_theme(&self, system_prefers_dark: bool) -> EffectiveTheme {
        self.preference.theme.resolve(system_prefers_dark)
    }

    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: Fn(&ThemePreference) + Send + Sync + 'static,
    {
        self.subscribers.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscribers.unsubscribe(id)
    }

    /// False after the last write failed; the preference still lives in memory
    pub fn persistence_healthy(&self) -> bool {
        self.persistence_healthy
    }

    pub fn is_persistent(&self) -> bool {
        self.persister.is_some()
    }

    fn commit(&mut self) {
        if let Some(persister) = &self.persister {
            match persister.save(&self.preference) {
                Ok(()) => self.persistence_healthy = true,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to persist theme preference");
                    self.persistence_healthy = false;
                }
            }
        }
        self.subscribers.notify(&self.preference);
    }
}
