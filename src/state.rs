//! Application state management

use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use tokio::sync::broadcast;

use crate::annotations::{AnnotationStore, StoreEvent};
use crate::collaborator::{DocumentExporter, JsonSidecarExporter};
use crate::error::{AppError, Result};
use crate::persistence::StorageBackend;
use crate::theme::ThemeStore;

/// Buffered change events per stream before slow listeners start lagging
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    annotations: Mutex<AnnotationStore>,
    theme: Mutex<ThemeStore>,
    events: broadcast::Sender<StoreEvent>,
    exporter: Box<dyn DocumentExporter>,
}

impl AppState {
    /// Create the stores over `backend`, or memory-only stores when `None`
    pub fn new(backend: Option<Arc<dyn StorageBackend>>) -> Self {
        let (mut annotations, theme) = match backend {
            Some(backend) => (
                AnnotationStore::with_backend(backend.clone()),
                ThemeStore::with_backend(backend),
            ),
            None => (AnnotationStore::in_memory(), ThemeStore::in_memory()),
        };

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let sender = events.clone();
        annotations.subscribe(move |event| {
            // No receivers just means nobody is listening
            let _ = sender.send(event.clone());
        });

        tracing::info!(
            annotations = annotations.len(),
            persistent = annotations.is_persistent(),
            "Application state ready"
        );

        Self {
            inner: Arc::new(AppStateInner {
                annotations: Mutex::new(annotations),
                theme: Mutex::new(theme),
                events,
                exporter: Box::new(JsonSidecarExporter::new()),
            }),
        }
    }

    /// Lock the annotation store
    ///
    /// Do not hold the guard across an `.await`.
    pub fn annotations(&self) -> MutexGuard<'_, AnnotationStore> {
        self.inner.annotations.lock()
    }

    /// Lock the theme store
    pub fn theme(&self) -> MutexGuard<'_, ThemeStore> {
        self.inner.theme.lock()
    }

    /// Run `f` on the annotation store from the blocking pool
    ///
    /// Mutations write to the storage backend before returning, so async
    /// handlers go through here instead of locking on a runtime thread.
    pub async fn with_annotations<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut AnnotationStore) -> T + Send + 'static,
        T: Send + 'static,
    {
        let state = self.clone();
        tokio::task::spawn_blocking(move || f(&mut state.annotations()))
            .await
            .map_err(|e| AppError::Internal(format!("Annotation store task failed: {}", e)))
    }

    /// Run `f` on the theme store from the blocking pool
    pub async fn with_theme<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut ThemeStore) -> T + Send + 'static,
        T: Send + 'static,
    {
        let state = self.clone();
        tokio::task::spawn_blocking(move || f(&mut state.theme()))
            .await
            .map_err(|e| AppError::Internal(format!("Theme store task failed: {}", e)))
    }

    /// Receive every annotation change from now on
    pub fn subscribe_events(&self) -> broadcast::Receiver<StoreEvent> {
        self.inner.events.subscribe()
    }

    pub fn exporter(&self) -> &dyn DocumentExporter {
        self.inner.exporter.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotations::{NewAnnotation, Scaled, ScaledPosition};
    use crate::persistence::MemoryStorage;
    use crate::theme::ThemeMode;

    fn note() -> NewAnnotation {
        NewAnnotation::freetext(
            ScaledPosition::from_rect(1, Scaled::new(0.0, 0.0, 1.0, 1.0, 10.0, 10.0)),
            "hello",
        )
    }

    #[test]
    fn test_events_reach_receivers() {
        let state = AppState::new(None);
        let mut rx = state.subscribe_events();

        let added = state.annotations().add(note());
        state.annotations().reset();

        assert_eq!(rx.try_recv().unwrap(), StoreEvent::Added(added));
        assert_eq!(rx.try_recv().unwrap(), StoreEvent::Reset);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_store_tasks_run_off_the_runtime() {
        let state = AppState::new(None);

        let added = state.with_annotations(|store| store.add(note())).await.unwrap();
        state.with_theme(|theme| theme.set_theme(ThemeMode::Dark)).await.unwrap();

        assert_eq!(state.annotations().get(&added.id), Some(added));
        assert_eq!(state.theme().get().theme, ThemeMode::Dark);
    }

    #[test]
    fn test_shared_backend() {
        let backend: Arc<dyn StorageBackend> = Arc::new(MemoryStorage::new());

        let state = AppState::new(Some(backend.clone()));
        state.annotations().add(note());
        state.theme().set_theme(ThemeMode::Dark);

        let reopened = AppState::new(Some(backend));
        assert_eq!(reopened.annotations().len(), 1);
        assert_eq!(reopened.theme().get().theme, ThemeMode::Dark);
    }
}
