use crate::records::target::TargetRecord;

/// One processed record, still paired with the source id it came from so the
/// writer can register the `source id -> target id` cross mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct Transformed {
    pub source_id: String,
    pub record: TargetRecord,
}

impl Transformed {
    pub fn new(source_id: impl Into<String>, record: TargetRecord) -> Self {
        Self {
            source_id: source_id.into(),
            record,
        }
    }
}

/// A bounded, ordered group of records committed as one transaction.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub seq: u64,
    pub items: Vec<Transformed>, // already transformed, in read order
    pub ts: chrono::DateTime<chrono::Utc>,
}

impl Chunk {
    pub fn new(seq: u64, items: Vec<Transformed>) -> Self {
        Self {
            seq,
            items,
            ts: chrono::Utc::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
