use dashmap::DashMap;
use model::core::{entity::EntityKind, identifiers::TargetId};

/// Run-scoped `source id -> target id` table for one entity type.
#[derive(Debug)]
pub struct IdCrossMapping {
    kind: EntityKind,
    ids: DashMap<String, TargetId>,
}

impl IdCrossMapping {
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            ids: DashMap::new(),
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Records where a source document landed. A later registration for the
    /// same source id replaces the earlier one.
    pub fn register(&self, source_id: impl Into<String>, target_id: TargetId) {
        self.ids.insert(source_id.into(), target_id);
    }

    pub fn get(&self, source_id: &str) -> Option<TargetId> {
        self.ids.get(source_id).map(|entry| *entry.value())
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn clear(&self) {
        self.ids.clear();
    }
}
