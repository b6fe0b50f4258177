use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc};

/// Surrogate key assigned by the target store.
pub type TargetId = i64;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(Arc<str>);

impl RunId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(Arc::from(id.into()))
    }

    /// Fresh identifier for a migration run.
    pub fn generate() -> Self {
        Self::new(format!("run-{}", uuid::Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for RunId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for RunId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Document identifier in the source store.
///
/// Generated ids are UUIDv7 strings, so lexicographic order follows insertion
/// order the same way an object id does in a document database.
pub fn new_document_id() -> String {
    uuid::Uuid::now_v7().simple().to_string()
}
