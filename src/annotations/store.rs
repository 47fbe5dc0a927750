//! Persisted annotation store
//!
//! Holds the authoritative, newest-first list of annotations. Every effective
//! mutation updates memory, writes the whole collection through the
//! persister, then notifies subscribers, all before returning. Persistence
//! failures are logged and otherwise ignored: the store keeps working from
//! memory.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize};

use super::types::{Annotation, AnnotationUpdate, NewAnnotation};
use crate::collaborator::{DocumentExporter, DocumentHandle, ExportError};
use crate::events::{SubscriptionId, Subscribers};
use crate::persistence::{Persister, StorageBackend};

/// Namespace key the annotation collection is stored under
pub const ANNOTATIONS_NAMESPACE: &str = "pdf-highlights-storage";

/// Persisted shape of the annotation collection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnnotationState {
    #[serde(default, deserialize_with = "deserialize_records")]
    pub highlights: Vec<Annotation>,
}

/// Parse records one at a time so a single bad record doesn't discard the rest
fn deserialize_records<'de, D>(deserializer: D) -> Result<Vec<Annotation>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Vec::<serde_json::Value>::deserialize(deserializer)?;
    let mut records = Vec::with_capacity(raw.len());

    for (index, value) in raw.into_iter().enumerate() {
        match serde_json::from_value::<Annotation>(value) {
            Ok(annotation) => records.push(annotation),
            Err(e) => tracing::warn!(index, error = %e, "Skipping unreadable annotation record"),
        }
    }

    Ok(records)
}

/// Change notification emitted by [`AnnotationStore`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "lowercase")]
pub enum StoreEvent {
    Added(Annotation),
    Updated(Annotation),
    Deleted(String),
    Reset,
}

impl StoreEvent {
    /// Same as the serialized `event` tag
    pub fn name(&self) -> &'static str {
        match self {
            StoreEvent::Added(_) => "added",
            StoreEvent::Updated(_) => "updated",
            StoreEvent::Deleted(_) => "deleted",
            StoreEvent::Reset => "reset",
        }
    }
}

/// The annotation store
pub struct AnnotationStore {
    state: AnnotationState,
    persister: Option<Persister<AnnotationState>>,
    subscribers: Subscribers<StoreEvent>,
    persistence_healthy: bool,
}

impl AnnotationStore {
    /// Open a store, loading whatever the persister holds
    ///
    /// `None` gives a memory-only store. Missing or corrupt data yields an
    /// empty collection.
    pub fn open(persister: Option<Persister<AnnotationState>>) -> Self {
        let mut state = persister
            .as_ref()
            .and_then(|p| p.load())
            .unwrap_or_default();

        let mut seen = HashSet::new();
        let before = state.highlights.len();
        state.highlights.retain(|a| seen.insert(a.id.clone()));
        if state.highlights.len() != before {
            tracing::warn!(
                dropped = before - state.highlights.len(),
                "Dropped annotations with duplicate ids"
            );
        }

        tracing::debug!(
            count = state.highlights.len(),
            persisted = persister.is_some(),
            "Opened annotation store"
        );

        Self {
            state,
            persister,
            subscribers: Subscribers::new(),
            persistence_healthy: true,
        }
    }

    /// Memory-only store
    pub fn in_memory() -> Self {
        Self::open(None)
    }

    /// Store persisted to `backend` under [`ANNOTATIONS_NAMESPACE`]
    pub fn with_backend(backend: Arc<dyn StorageBackend>) -> Self {
        Self::open(Some(Persister::new(backend, ANNOTATIONS_NAMESPACE)))
    }

    /// Snapshot of all annotations, newest first
    pub fn list(&self) -> Vec<Annotation> {
        self.state.highlights.clone()
    }

    /// Snapshot of one annotation
    pub fn get(&self, id: &str) -> Option<Annotation> {
        self.state.highlights.iter().find(|a| a.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.state.highlights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.highlights.is_empty()
    }

    /// Add an annotation with a fresh id and return the stored record
    pub fn add(&mut self, new: NewAnnotation) -> Annotation {
        let annotation = Annotation::from_new(new);

        tracing::debug!(
            id = %annotation.id,
            annotation_type = ?annotation.annotation_type(),
            page = annotation.page_number(),
            "Adding annotation"
        );

        self.state.highlights.insert(0, annotation.clone());
        self.commit(StoreEvent::Added(annotation.clone()));
        annotation
    }

    /// Merge `update` into the annotation with `id`; unknown ids are ignored
    pub fn update(&mut self, id: &str, update: AnnotationUpdate) {
        let Some(annotation) = self.state.highlights.iter_mut().find(|a| a.id == id) else {
            tracing::debug!(id = %id, "Ignoring update for unknown annotation");
            return;
        };

        if !annotation.apply(update) {
            tracing::warn!(
                id = %id,
                annotation_type = ?annotation.annotation_type(),
                "Ignoring content or style fields this annotation type doesn't have"
            );
        }

        let updated = annotation.clone();
        tracing::debug!(id = %id, "Updated annotation");
        self.commit(StoreEvent::Updated(updated));
    }

    /// Remove the annotation with `id`; unknown ids are ignored
    pub fn delete(&mut self, id: &str) {
        let before = self.state.highlights.len();
        self.state.highlights.retain(|a| a.id != id);

        if self.state.highlights.len() == before {
            tracing::debug!(id = %id, "Ignoring delete for unknown annotation");
            return;
        }

        tracing::debug!(id = %id, "Deleted annotation");
        self.commit(StoreEvent::Deleted(id.to_string()));
    }

    /// Remove every annotation
    pub fn reset(&mut self) {
        tracing::debug!(count = self.state.highlights.len(), "Resetting annotations");
        self.state.highlights.clear();
        self.commit(StoreEvent::Reset);
    }

    /// Annotations whose text or comment contains `query`, ignoring case
    ///
    /// An empty query matches everything.
    pub fn search(&self, query: &str) -> Vec<Annotation> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return self.list();
        }

        self.state
            .highlights
            .iter()
            .filter(|a| a.matches_lowercase(&needle))
            .cloned()
            .collect()
    }

    /// Search results grouped by page number, pages ascending
    pub fn by_page(&self, query: &str) -> BTreeMap<u32, Vec<Annotation>> {
        let mut pages: BTreeMap<u32, Vec<Annotation>> = BTreeMap::new();
        for annotation in self.search(query) {
            pages
                .entry(annotation.page_number())
                .or_default()
                .push(annotation);
        }
        pages
    }

    /// Register a listener called after every effective mutation
    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: Fn(&StoreEvent) + Send + Sync + 'static,
    {
        self.subscribers.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscribers.unsubscribe(id)
    }

    /// Whether the most recent write reached storage
    ///
    /// Always `true` for a memory-only store.
    pub fn persistence_healthy(&self) -> bool {
        self.persistence_healthy
    }

    pub fn is_persistent(&self) -> bool {
        self.persister.is_some()
    }

    /// Run `exporter` over the current collection
    pub fn export_with(
        &self,
        exporter: &dyn DocumentExporter,
        document: &DocumentHandle,
    ) -> Result<Vec<u8>, ExportError> {
        let annotations = self.list();
        tracing::info!(
            document = %document.name,
            count = annotations.len(),
            "Exporting annotations"
        );
        exporter.export(document, &annotations)
    }

    fn commit(&mut self, event: StoreEvent) {
        self.persist();
        self.subscribers.notify(&event);
    }

    fn persist(&mut self) {
        let Some(persister) = &self.persister else {
            return;
        };

        match persister.save(&self.state) {
            Ok(()) => {
                if !self.persistence_healthy {
                    tracing::info!(namespace = %persister.name(), "Annotation persistence recovered");
                }
                self.persistence_healthy = true;
            }
            Err(e) => {
                tracing::warn!(
                    namespace = %persister.name(),
                    error = %e,
                    "Failed to persist annotations, continuing in memory"
                );
                self.persistence_healthy = false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotations::types::{
        AnnotationKind, ContentUpdate, FreetextStyle, HighlightStyle, Scaled, ScaledPosition,
    };
    use crate::persistence::{MemoryStorage, PersistError};
    use parking_lot::Mutex;

    fn position(page: u32) -> ScaledPosition {
        ScaledPosition::from_rect(page, Scaled::new(0.0, 0.0, 50.0, 20.0, 600.0, 800.0))
    }

    fn note(text: &str) -> NewAnnotation {
        NewAnnotation::freetext(position(1), text)
    }

    fn persistent_store(storage: &Arc<MemoryStorage>) -> AnnotationStore {
        AnnotationStore::with_backend(storage.clone() as Arc<dyn StorageBackend>)
    }

    #[test]
    fn test_add_returns_stored_record() {
        let mut store = AnnotationStore::in_memory();

        let added = store.add(note("hello"));

        assert!(!added.id.is_empty());
        assert_eq!(added.kind.text(), Some("hello"));
        assert_eq!(added.comment.as_deref(), Some(""));
        assert_eq!(store.len(), 1);
        assert_eq!(store.list()[0], added);
    }

    #[test]
    fn test_ids_are_unique() {
        let mut store = AnnotationStore::in_memory();
        let mut ids = HashSet::new();

        for i in 0..200 {
            let added = store.add(note(&format!("note {}", i)));
            assert!(ids.insert(added.id));
        }
    }

    #[test]
    fn test_newest_first() {
        let mut store = AnnotationStore::in_memory();
        let a = store.add(note("A"));
        let b = store.add(note("B"));

        let ids: Vec<String> = store.list().into_iter().map(|x| x.id).collect();
        assert_eq!(ids, vec![b.id, a.id]);
    }

    #[test]
    fn test_update_comment() {
        let mut store = AnnotationStore::in_memory();
        let first = store.add(note("one"));
        let second = store.add(note("two"));

        store.update(&second.id, AnnotationUpdate::comment("note"));

        assert_eq!(
            store.get(&second.id).unwrap().comment.as_deref(),
            Some("note")
        );
        assert_eq!(store.get(&first.id).unwrap(), first);
    }

    #[test]
    fn test_update_is_idempotent() {
        let mut store = AnnotationStore::in_memory();
        let added = store.add(note("x"));

        store.update(&added.id, AnnotationUpdate::comment("x"));
        let once = store.list();
        store.update(&added.id, AnnotationUpdate::comment("x"));

        assert_eq!(store.list(), once);
    }

    #[test]
    fn test_update_replaces_content_of_same_type() {
        let mut store = AnnotationStore::in_memory();
        let added = store.add(note("draft"));

        store.update(
            &added.id,
            AnnotationUpdate {
                content: Some(ContentUpdate {
                    text: Some("final".to_string()),
                    ..Default::default()
                }),
                freetext: FreetextStyle {
                    font_size: Some("18px".to_string()),
                    ..Default::default()
                },
                ..Default::default()
            },
        );

        let stored = store.get(&added.id).unwrap();
        assert_eq!(stored.kind.text(), Some("final"));
        match &stored.kind {
            AnnotationKind::Freetext { style, .. } => {
                assert_eq!(style.font_size.as_deref(), Some("18px"))
            }
            other => panic!("unexpected kind: {:?}", other),
        }
        assert_eq!(stored.id, added.id);
        assert_eq!(stored.created_at, added.created_at);
    }

    #[test]
    fn test_unknown_id_is_noop() {
        let mut store = AnnotationStore::in_memory();
        store.add(note("keep"));
        let before = store.list();

        store.update("999", AnnotationUpdate::comment("x"));
        store.delete("999");

        assert_eq!(store.list(), before);
    }

    #[test]
    fn test_delete_is_terminal() {
        let mut store = AnnotationStore::in_memory();
        let first = store.add(note("1"));
        let second = store.add(note("2"));

        store.delete(&first.id);
        assert_eq!(store.list(), vec![second.clone()]);

        store.update(&first.id, AnnotationUpdate::comment("late"));
        store.delete(&first.id);
        assert_eq!(store.list(), vec![second]);
    }

    #[test]
    fn test_reset() {
        let mut store = AnnotationStore::in_memory();
        for i in 0..5 {
            store.add(note(&i.to_string()));
        }

        store.reset();

        assert!(store.list().is_empty());
        assert!(store.is_empty());
    }

    #[test]
    fn test_snapshots_are_isolated() {
        let mut store = AnnotationStore::in_memory();
        let added = store.add(note("original"));

        let mut snapshot = store.list();
        snapshot[0].comment = Some("mutated".to_string());
        snapshot.clear();

        assert_eq!(store.get(&added.id).unwrap().comment.as_deref(), Some(""));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_reload_round_trip() {
        let storage = Arc::new(MemoryStorage::new());
        let mut store = persistent_store(&storage);
        store.add(NewAnnotation::text_highlight(position(1), "first"));
        store.add(note("second").with_comment("c"));
        store.add(NewAnnotation::image(position(3), "data:image/png;base64,AAAA"));
        let before = store.list();

        let reloaded = persistent_store(&storage);

        assert_eq!(reloaded.list(), before);
        assert_eq!(reloaded.len(), 3);
    }

    #[test]
    fn test_loads_records_written_by_the_viewer() {
        let storage = Arc::new(MemoryStorage::new());
        let saved = r##"{"state":{"highlights":[
            {
                "id": "0.5213",
                "type": "text",
                "position": {
                    "boundingRect": {"x1": 10, "y1": 20, "x2": 200, "y2": 40, "width": 612, "height": 792, "pageNumber": 2},
                    "rects": [{"x1": 10, "y1": 20, "x2": 200, "y2": 40, "width": 612, "height": 792, "pageNumber": 2}]
                },
                "content": {"text": "Attention is all you need"},
                "comment": "key idea",
                "highlightColor": "#ff0000",
                "highlightStyle": "underline"
            },
            {
                "id": "0.8877",
                "type": "freetext",
                "position": {
                    "boundingRect": {"x1": 50, "y1": 60, "x2": 250, "y2": 110, "width": 612, "height": 792, "pageNumber": 1},
                    "rects": []
                },
                "content": {"text": "New note"},
                "comment": "",
                "fontSize": "18px",
                "backgroundColor": "#ffffcc"
            }
        ]},"version":0}"##;
        storage.set_item(ANNOTATIONS_NAMESPACE, saved).unwrap();

        let mut store = persistent_store(&storage);
        assert_eq!(store.len(), 2);

        let highlight = store.get("0.5213").unwrap();
        assert_eq!(highlight.page_number(), 2);
        assert_eq!(highlight.comment.as_deref(), Some("key idea"));
        match &highlight.kind {
            AnnotationKind::Text { style, .. } => {
                assert_eq!(style.highlight_color.as_deref(), Some("#ff0000"));
            }
            other => panic!("unexpected kind: {:?}", other),
        }
        assert_eq!(store.get("0.8877").unwrap().page_number(), 1);

        // Rewriting keeps the viewer's layout
        store.update(
            "0.5213",
            AnnotationUpdate {
                highlight: HighlightStyle {
                    highlight_color: Some("#00ff00".to_string()),
                    ..Default::default()
                },
                ..Default::default()
            },
        );

        let raw = storage.get_item(ANNOTATIONS_NAMESPACE).unwrap().unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        let records = json["state"]["highlights"].as_array().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["highlightColor"], "#00ff00");
        assert_eq!(records[0]["highlightStyle"], "underline");
        assert_eq!(records[0]["position"]["boundingRect"]["pageNumber"], 2);
        assert_eq!(records[1]["fontSize"], "18px");
    }

    #[test]
    fn test_corrupt_storage_opens_empty() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set_item(ANNOTATIONS_NAMESPACE, "{not json").unwrap();

        let mut store = persistent_store(&storage);
        assert!(store.is_empty());

        // Store stays usable and overwrites the bad data
        store.add(note("fresh"));
        assert_eq!(persistent_store(&storage).len(), 1);
    }

    #[test]
    fn test_bad_records_are_skipped_on_load() {
        let storage = Arc::new(MemoryStorage::new());
        let mut store = persistent_store(&storage);
        let kept = store.add(note("good"));

        let mut raw: serde_json::Value =
            serde_json::from_str(&storage.get_item(ANNOTATIONS_NAMESPACE).unwrap().unwrap())
                .unwrap();
        raw["state"]["highlights"]
            .as_array_mut()
            .unwrap()
            .push(serde_json::json!({"id": "broken", "type": "unknown"}));
        storage
            .set_item(ANNOTATIONS_NAMESPACE, &raw.to_string())
            .unwrap();

        let reloaded = persistent_store(&storage);
        assert_eq!(reloaded.list(), vec![kept]);
    }

    #[test]
    fn test_duplicate_ids_dropped_on_load() {
        let storage = Arc::new(MemoryStorage::new());
        let mut store = persistent_store(&storage);
        let added = store.add(note("dup"));

        let state = AnnotationState {
            highlights: vec![added.clone(), added.clone()],
        };
        Persister::new(storage.clone() as Arc<dyn StorageBackend>, ANNOTATIONS_NAMESPACE)
            .save(&state)
            .unwrap();

        assert_eq!(persistent_store(&storage).list(), vec![added]);
    }

    #[test]
    fn test_write_failure_keeps_memory_state() {
        let storage = Arc::new(MemoryStorage::with_quota(80));
        let mut store = persistent_store(&storage);

        let added = store.add(note("this record does not fit in the quota"));

        assert!(!store.persistence_healthy());
        assert_eq!(store.list(), vec![added.clone()]);

        store.update(&added.id, AnnotationUpdate::comment("still works"));
        assert_eq!(
            store.get(&added.id).unwrap().comment.as_deref(),
            Some("still works")
        );

        store.reset();
        assert!(store.persistence_healthy());
    }

    #[test]
    fn test_each_mutation_writes_once() {
        struct CountingStorage {
            inner: MemoryStorage,
            writes: Mutex<usize>,
        }

        impl StorageBackend for CountingStorage {
            fn get_item(&self, key: &str) -> Result<Option<String>, PersistError> {
                self.inner.get_item(key)
            }
            fn set_item(&self, key: &str, value: &str) -> Result<(), PersistError> {
                *self.writes.lock() += 1;
                self.inner.set_item(key, value)
            }
            fn remove_item(&self, key: &str) -> Result<(), PersistError> {
                self.inner.remove_item(key)
            }
        }

        let storage = Arc::new(CountingStorage {
            inner: MemoryStorage::new(),
            writes: Mutex::new(0),
        });
        let mut store = AnnotationStore::with_backend(storage.clone());

        let a = store.add(note("a"));
        store.update(&a.id, AnnotationUpdate::comment("b"));
        store.update("missing", AnnotationUpdate::comment("c"));
        store.delete("missing");
        store.delete(&a.id);
        store.reset();

        assert_eq!(*storage.writes.lock(), 4);
    }

    #[test]
    fn test_subscribers_see_effective_mutations() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let mut store = AnnotationStore::in_memory();

        let sink = events.clone();
        let sub = store.subscribe(move |event| sink.lock().push(event.clone()));

        let added = store.add(note("a"));
        store.update(&added.id, AnnotationUpdate::comment("c"));
        store.update("missing", AnnotationUpdate::comment("c"));
        store.delete(&added.id);
        store.delete(&added.id);
        store.reset();

        {
            let events = events.lock();
            assert_eq!(events.len(), 4);
            assert_eq!(events[0], StoreEvent::Added(added.clone()));
            assert!(matches!(
                &events[1],
                StoreEvent::Updated(a) if a.comment.as_deref() == Some("c")
            ));
            assert_eq!(events[2], StoreEvent::Deleted(added.id.clone()));
            assert_eq!(events[3], StoreEvent::Reset);
        }

        assert!(store.unsubscribe(sub));
        store.add(note("b"));
        assert_eq!(events.lock().len(), 4);
    }

    #[test]
    fn test_search_and_group_by_page() {
        let mut store = AnnotationStore::in_memory();
        let intro = store.add(NewAnnotation::text_highlight(position(2), "Introduction"));
        let summary = store.add(
            NewAnnotation::text_highlight(position(1), "Summary").with_comment("see intro"),
        );
        store.add(NewAnnotation::image(position(1), "data:image/png;base64,"));

        let hits = store.search("INTRO");
        assert_eq!(hits, vec![summary.clone(), intro.clone()]);
        assert_eq!(store.search("  ").len(), 3);

        let pages = store.by_page("intro");
        assert_eq!(pages.keys().copied().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(pages[&1], vec![summary]);
        assert_eq!(pages[&2], vec![intro]);
    }

    #[test]
    fn test_event_serialization() {
        let json = serde_json::to_value(StoreEvent::Deleted("abc".to_string())).unwrap();
        assert_eq!(json, serde_json::json!({"event": "deleted", "data": "abc"}));

        let json = serde_json::to_value(StoreEvent::Reset).unwrap();
        assert_eq!(json, serde_json::json!({"event": "reset"}));

        let added = StoreEvent::Added(Annotation::from_new(note("x")));
        assert_eq!(serde_json::to_value(&added).unwrap()["event"], added.name());
    }
}
