//! The static in-memory record table: `(RecordType, lowercased name) -> answers`.

use rustc_hash::FxHashMap;

use crate::records::RecordType;

/// Case-insensitive on ASCII, per RFC 1035 domain-name equivalence.
fn normalize(name: &str) -> String {
    name.to_ascii_lowercase()
}

/// Built once at startup and never mutated afterward the reactor is running
/// (spec §5: "the record table is populated before `start()` and not
/// mutated afterwards") — so no locking is needed once it is handed to the
/// reactor.
#[derive(Debug, Default, Clone)]
pub struct RecordTable {
    records: FxHashMap<(RecordType, String), Vec<String>>,
}

impl RecordTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces any prior answer list for `(rtype, name)`.
    pub fn add_record(&mut self, rtype: RecordType, name: &str, answers: Vec<String>) {
        self.records.insert((rtype, normalize(name)), answers);
    }

    pub fn lookup(&self, rtype: RecordType, name: &str) -> Option<&[String]> {
        self.records.get(&(rtype, normalize(name))).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
