//! Snapshot construction.
//!
//! A [`Snapshot`] is built in one pass from parsed rows and is never mutated
//! afterwards. Duplicate RNCs resolve last-write-wins in file order.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::models::{IndexedRecord, RawRecord};

/// One complete, immutable build of the lookup map.
#[derive(Debug, Clone)]
pub struct Snapshot {
    records: HashMap<String, IndexedRecord>,
    built_at: DateTime<Utc>,
}

impl Snapshot {
    /// Exact-match lookup by RNC.
    pub fn get(&self, rnc: &str) -> Option<&IndexedRecord> {
        self.records.get(rnc)
    }

    /// Number of distinct RNCs.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// When this snapshot was constructed.
    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    /// Iterates over all records in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &IndexedRecord)> {
        self.records.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Folds raw rows into a [`Snapshot`]. Pure; no I/O.
pub fn build(rows: Vec<RawRecord>) -> Snapshot {
    let mut records = HashMap::with_capacity(rows.len());
    for raw in rows {
        let key = raw.rnc.clone();
        records.insert(key, IndexedRecord::from(raw));
    }
    Snapshot {
        records,
        built_at: Utc::now(),
    }
}
