//! Chunk store: documents, chunks, lifecycle
//!
//! Chunks live in a stable arena of slots; deleting a document only marks
//! its slots as tombstones so concurrent readers never see indices move.
//! [`ChunkStore::compact`] is the explicit admin operation that physically
//! reclaims tombstoned slots; it rewrites the whole arena and is O(n).
//!
//! The store is the single source of truth. The lexical tables and the
//! vector cache are derived state keyed off [`ChunkStore::generation`],
//! which advances on every mutation that can change search results.

use std::collections::HashMap;

use chrono::Utc;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use ragkit_core::{
    Chunk, ChunkMetadata, DocumentInfo, Error, Result, Snapshot, SnapshotChunk, SNAPSHOT_VERSION,
};

/// One arena slot. Tombstoned slots keep their chunk until compaction but
/// are invisible to every read path.
#[derive(Debug, Clone)]
pub(crate) struct Slot {
    pub chunk: Chunk,
    pub tombstone: bool,
}

#[derive(Default)]
pub(crate) struct StoreInner {
    pub slots: Vec<Slot>,
    /// chunk id -> slot index; never points at a tombstoned slot
    pub by_id: HashMap<String, usize>,
    pub docs: HashMap<String, DocumentInfo>,
    pub generation: u64,
}

impl StoreInner {
    /// Iterate live slot indices.
    pub fn live(&self) -> impl Iterator<Item = usize> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.tombstone)
            .map(|(i, _)| i)
    }

    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|s| !s.tombstone).count()
    }
}

/// Search-time metadata filter. Disabled chunks are always excluded.
#[derive(Debug, Clone, Default)]
pub struct SearchFilter {
    pub namespace: Option<String>,
    pub tags_any: Option<Vec<String>>,
    pub tags_all: Option<Vec<String>>,
}

impl SearchFilter {
    pub fn matches(&self, meta: &ChunkMetadata) -> bool {
        if meta.disabled {
            return false;
        }
        if let Some(ref ns) = self.namespace {
            if meta.namespace.as_deref() != Some(ns.as_str()) {
                return false;
            }
        }
        if let Some(ref any) = self.tags_any {
            if !any.iter().any(|t| meta.tags.contains(t)) {
                return false;
            }
        }
        if let Some(ref all) = self.tags_all {
            if !all.iter().all(|t| meta.tags.contains(t)) {
                return false;
            }
        }
        true
    }
}

/// In-memory chunk store with tombstone deletes.
#[derive(Default)]
pub struct ChunkStore {
    inner: RwLock<StoreInner>,
}

impl ChunkStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, StoreInner> {
        self.inner.read()
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, StoreInner> {
        self.inner.write()
    }

    /// Monotonic mutation counter; derived indexes rebuild when it moves.
    pub fn generation(&self) -> u64 {
        self.inner.read().generation
    }

    /// Insert a fully chunked document. Replacing an existing doc_id first
    /// tombstones its previous chunks.
    pub fn insert_document(&self, doc_id: &str, chunks: Vec<Chunk>) -> usize {
        let mut inner = self.inner.write();

        if inner.docs.contains_key(doc_id) {
            Self::tombstone_doc(&mut inner, doc_id);
        }

        // union of chunk metadata becomes the doc registry entry
        let mut namespace = None;
        let mut tags: Vec<String> = Vec::new();
        for c in &chunks {
            if c.metadata.namespace.is_some() {
                namespace = c.metadata.namespace.clone();
            }
            for t in &c.metadata.tags {
                if !tags.contains(t) {
                    tags.push(t.clone());
                }
            }
        }
        tags.sort();

        let count = chunks.len();
        inner.docs.insert(
            doc_id.to_string(),
            DocumentInfo {
                doc_id: doc_id.to_string(),
                namespace,
                tags,
                chunk_count: count,
                created_at: Utc::now(),
            },
        );

        for chunk in chunks {
            let index = inner.slots.len();
            inner.by_id.insert(chunk.id.clone(), index);
            inner.slots.push(Slot {
                chunk,
                tombstone: false,
            });
        }

        inner.generation += 1;
        tracing::debug!(doc_id, chunks = count, "document inserted");
        count
    }

    fn tombstone_doc(inner: &mut StoreInner, doc_id: &str) -> usize {
        let mut removed = 0;
        let prefix = format!("{doc_id}:");
        for slot in inner.slots.iter_mut() {
            if !slot.tombstone && slot.chunk.id.starts_with(&prefix) {
                slot.tombstone = true;
                removed += 1;
            }
        }
        inner.by_id.retain(|id, _| !id.starts_with(&prefix));
        inner.docs.remove(doc_id);
        removed
    }

    /// Sorted by chunk_count desc, then doc_id.
    pub fn list_documents(&self, namespace: Option<&str>) -> Vec<DocumentInfo> {
        let inner = self.inner.read();
        let mut docs: Vec<DocumentInfo> = inner
            .docs
            .values()
            .filter(|d| namespace.is_none() || d.namespace.as_deref() == namespace)
            .cloned()
            .collect();
        docs.sort_by(|a, b| {
            b.chunk_count
                .cmp(&a.chunk_count)
                .then_with(|| a.doc_id.cmp(&b.doc_id))
        });
        docs
    }

    /// Tombstone a document's chunks. Unknown ids are a no-op returning 0.
    pub fn delete_document(&self, doc_id: &str) -> usize {
        let mut inner = self.inner.write();
        let had_doc = inner.docs.contains_key(doc_id);
        let removed = Self::tombstone_doc(&mut inner, doc_id);
        if removed > 0 || had_doc {
            inner.generation += 1;
        }
        if removed > 0 {
            tracing::debug!(doc_id, removed, "document tombstoned");
        }
        removed
    }

    /// Toggle a chunk's disabled flag. Returns whether the chunk exists.
    pub fn set_chunk_disabled(&self, chunk_id: &str, disabled: bool) -> bool {
        let mut inner = self.inner.write();
        let Some(&index) = inner.by_id.get(chunk_id) else {
            return false;
        };
        inner.slots[index].chunk.metadata.disabled = disabled;
        inner.generation += 1;
        true
    }

    /// Physically reclaim tombstoned slots. O(n): the whole arena is
    /// rewritten and the id map rebuilt. Returns the slots reclaimed.
    pub fn compact(&self) -> usize {
        let mut inner = self.inner.write();
        let before = inner.slots.len();

        let slots: Vec<Slot> = std::mem::take(&mut inner.slots)
            .into_iter()
            .filter(|s| !s.tombstone)
            .collect();
        inner.by_id = slots
            .iter()
            .enumerate()
            .map(|(i, s)| (s.chunk.id.clone(), i))
            .collect();
        inner.slots = slots;
        inner.generation += 1;

        let reclaimed = before - inner.slots.len();
        tracing::info!(reclaimed, live = inner.slots.len(), "store compacted");
        reclaimed
    }

    pub fn document_count(&self) -> usize {
        self.inner.read().docs.len()
    }

    pub fn chunk_count(&self) -> usize {
        self.inner.read().live_count()
    }

    /// Chunk ids passing a filter, in arena order.
    pub fn filtered_ids(&self, filter: &SearchFilter) -> Vec<String> {
        let inner = self.inner.read();
        inner
            .live()
            .filter(|&i| filter.matches(&inner.slots[i].chunk.metadata))
            .map(|i| inner.slots[i].chunk.id.clone())
            .collect()
    }

    /// Turn scored chunk ids into hits. Ids deleted since scoring are
    /// silently skipped rather than erroring.
    pub fn hydrate(&self, scored: &[(String, f32)]) -> Vec<ragkit_core::RetrievalHit> {
        let inner = self.inner.read();
        scored
            .iter()
            .filter_map(|(id, score)| {
                let &index = inner.by_id.get(id)?;
                let slot = &inner.slots[index];
                (!slot.tombstone).then(|| ragkit_core::RetrievalHit {
                    id: slot.chunk.id.clone(),
                    content: slot.chunk.text.clone(),
                    score: *score,
                    metadata: slot.chunk.metadata.clone(),
                })
            })
            .collect()
    }

    /// Content-preserving snapshot. Vectors are omitted by design.
    pub fn export(&self) -> Snapshot {
        let inner = self.inner.read();
        let mut docs: Vec<DocumentInfo> = inner.docs.values().cloned().collect();
        docs.sort_by(|a, b| a.doc_id.cmp(&b.doc_id));

        let chunks = inner
            .live()
            .map(|i| {
                let c = &inner.slots[i].chunk;
                SnapshotChunk {
                    id: c.id.clone(),
                    text: c.text.clone(),
                    metadata: c.metadata.clone(),
                }
            })
            .collect();

        Snapshot {
            version: SNAPSHOT_VERSION,
            exported_at: Utc::now(),
            docs,
            chunks,
        }
    }

    /// Replace store contents with a snapshot. The doc registry is rebuilt
    /// from chunk ids for any document the snapshot's `docs` list omits.
    pub fn import(&self, snapshot: Snapshot) -> Result<()> {
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(Error::Validation(format!(
                "unsupported snapshot version {} (expected {})",
                snapshot.version, SNAPSHOT_VERSION
            )));
        }

        let mut inner = self.inner.write();
        inner.slots.clear();
        inner.by_id.clear();
        inner.docs.clear();

        for doc in snapshot.docs {
            inner.docs.insert(doc.doc_id.clone(), doc);
        }

        let mut counted: HashMap<String, usize> = HashMap::new();
        for sc in snapshot.chunks {
            let doc_id = sc
                .id
                .rsplit_once(':')
                .map(|(d, _)| d.to_string())
                .unwrap_or_else(|| sc.id.clone());
            *counted.entry(doc_id.clone()).or_default() += 1;

            let index = inner.slots.len();
            inner.by_id.insert(sc.id.clone(), index);
            inner.slots.push(Slot {
                chunk: Chunk {
                    id: sc.id,
                    doc_id,
                    text: sc.text,
                    metadata: sc.metadata,
                    vector: None,
                },
                tombstone: false,
            });
        }

        // reconcile the registry against what the chunks actually say
        for (doc_id, count) in counted {
            if let Some(entry) = inner.docs.get_mut(&doc_id) {
                entry.chunk_count = count;
                continue;
            }
            let Some(slot) = inner.slots.iter().find(|s| s.chunk.doc_id == doc_id) else {
                continue;
            };
            let info = DocumentInfo {
                doc_id: doc_id.clone(),
                namespace: slot.chunk.metadata.namespace.clone(),
                tags: slot.chunk.metadata.tags.clone(),
                chunk_count: count,
                created_at: Utc::now(),
            };
            inner.docs.insert(doc_id, info);
        }

        inner.generation += 1;
        tracing::info!(
            docs = inner.docs.len(),
            chunks = inner.slots.len(),
            "snapshot imported"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as Map;

    fn chunk(doc: &str, order: usize, text: &str, tags: Vec<&str>) -> Chunk {
        Chunk {
            id: format!("{doc}:{order}"),
            doc_id: doc.to_string(),
            text: text.to_string(),
            metadata: ChunkMetadata {
                namespace: None,
                tags: tags.into_iter().map(String::from).collect(),
                order,
                disabled: false,
                source: Map::new(),
            },
            vector: None,
        }
    }

    fn seeded() -> ChunkStore {
        let store = ChunkStore::new();
        store.insert_document("a", vec![chunk("a", 0, "alpha text", vec!["news"])]);
        store.insert_document(
            "b",
            vec![
                chunk("b", 0, "beta one", vec![]),
                chunk("b", 1, "beta two", vec![]),
            ],
        );
        store
    }

    #[test]
    fn test_list_documents_ordering() {
        let docs = seeded().list_documents(None);
        // chunk_count desc, then doc_id
        assert_eq!(docs[0].doc_id, "b");
        assert_eq!(docs[1].doc_id, "a");
    }

    #[test]
    fn test_delete_unknown_doc_is_noop() {
        let store = seeded();
        assert_eq!(store.delete_document("nope"), 0);
        assert_eq!(store.document_count(), 2);
    }

    #[test]
    fn test_delete_tombstones_without_moving_slots() {
        let store = seeded();
        let slots_before = store.read().slots.len();
        assert_eq!(store.delete_document("b"), 2);
        assert_eq!(store.read().slots.len(), slots_before);
        assert_eq!(store.chunk_count(), 1);
        assert!(store.list_documents(None).iter().all(|d| d.doc_id != "b"));
    }

    #[test]
    fn test_compact_reclaims_tombstones() {
        let store = seeded();
        store.delete_document("b");
        assert_eq!(store.compact(), 2);
        assert_eq!(store.read().slots.len(), 1);
        // surviving chunk still addressable
        assert!(store.set_chunk_disabled("a:0", true));
    }

    #[test]
    fn test_set_chunk_disabled_idempotent_and_reports_existence() {
        let store = seeded();
        assert!(store.set_chunk_disabled("a:0", true));
        assert!(store.set_chunk_disabled("a:0", true));
        assert!(!store.set_chunk_disabled("missing:0", true));
    }

    #[test]
    fn test_filter_excludes_disabled_and_mismatched_tags() {
        let store = seeded();
        let filter = SearchFilter {
            tags_any: Some(vec!["sports".to_string()]),
            ..Default::default()
        };
        assert!(store.filtered_ids(&filter).is_empty());

        let news = SearchFilter {
            tags_any: Some(vec!["news".to_string()]),
            ..Default::default()
        };
        assert_eq!(store.filtered_ids(&news), vec!["a:0"]);

        store.set_chunk_disabled("a:0", true);
        assert!(store.filtered_ids(&news).is_empty());
    }

    #[test]
    fn test_export_import_roundtrip_is_content_preserving() {
        let store = seeded();
        let snap = store.export();

        let restored = ChunkStore::new();
        restored.import(snap).unwrap();

        assert_eq!(restored.document_count(), store.document_count());
        assert_eq!(restored.chunk_count(), store.chunk_count());
        let original = store.hydrate(&[("b:1".to_string(), 0.0)]);
        let roundtrip = restored.hydrate(&[("b:1".to_string(), 0.0)]);
        assert_eq!(original[0].content, roundtrip[0].content);
    }

    #[test]
    fn test_import_rebuilds_missing_doc_registry() {
        let store = seeded();
        let mut snap = store.export();
        snap.docs.clear();

        let restored = ChunkStore::new();
        restored.import(snap).unwrap();
        assert_eq!(restored.document_count(), 2);
        let docs = restored.list_documents(None);
        assert_eq!(docs[0].chunk_count, 2);
    }

    #[test]
    fn test_import_rejects_unknown_version() {
        let store = ChunkStore::new();
        let mut snap = seeded().export();
        snap.version = 99;
        assert!(store.import(snap).is_err());
    }

    #[test]
    fn test_reingest_same_doc_replaces_chunks() {
        let store = seeded();
        store.insert_document("a", vec![chunk("a", 0, "alpha v2", vec![])]);
        assert_eq!(store.document_count(), 2);
        let hits = store.hydrate(&[("a:0".to_string(), 0.0)]);
        assert_eq!(hits[0].content, "alpha v2");
    }

    #[test]
    fn test_generation_advances_on_mutation() {
        let store = seeded();
        let g0 = store.generation();
        store.set_chunk_disabled("a:0", true);
        let g1 = store.generation();
        assert!(g1 > g0);
        store.delete_document("a");
        assert!(store.generation() > g1);
    }
}
