//! Point-in-time view of records and relationships.
//!
//! A [`Snapshot`] is what the storage collaborator hands the graph engine:
//! a flat list of records, a flat list of relationships, and a version
//! number that advances on every committed write. The engine never keeps
//! a snapshot between calls; caches key on [`Snapshot::version`].

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::{Record, RecordId, Relationship, Status};
use crate::store::StoreError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Monotonic write counter maintained by the store.
    #[serde(default)]
    pub version: u64,
    #[serde(default)]
    pub records: Vec<Record>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

impl Snapshot {
    #[must_use]
    pub fn new(records: Vec<Record>, relationships: Vec<Relationship>) -> Self {
        Self {
            version: 0,
            records,
            relationships,
        }
    }

    /// Parse a JSON snapshot and check record ids.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Json`] for malformed input and
    /// [`StoreError::InvalidSnapshot`] for zero or duplicate record ids.
    pub fn from_json_str(input: &str) -> Result<Self, StoreError> {
        let snapshot: Self = serde_json::from_str(input).map_err(StoreError::Json)?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    /// Serialize as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Json`] if serialization fails.
    pub fn to_json_string(&self) -> Result<String, StoreError> {
        serde_json::to_string_pretty(self).map_err(StoreError::Json)
    }

    /// Check that every record id is positive and unique.
    ///
    /// Relationships are not checked: dangling edges are tolerated and
    /// dropped by the graph builder.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidSnapshot`] naming the offending id.
    pub fn validate(&self) -> Result<(), StoreError> {
        let mut seen: HashSet<RecordId> = HashSet::with_capacity(self.records.len());
        for record in &self.records {
            if !record.id.is_valid() {
                return Err(StoreError::InvalidSnapshot(format!(
                    "record id must be positive, got {}",
                    record.id
                )));
            }
            if !seen.insert(record.id) {
                return Err(StoreError::InvalidSnapshot(format!(
                    "duplicate record id {}",
                    record.id
                )));
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn record(&self, id: RecordId) -> Option<&Record> {
        self.records.iter().find(|r| r.id == id)
    }

    #[must_use]
    pub fn contains(&self, id: RecordId) -> bool {
        self.record(id).is_some()
    }

    /// Index records by id. Later duplicates win, which cannot happen for a
    /// validated snapshot.
    #[must_use]
    pub fn records_by_id(&self) -> HashMap<RecordId, &Record> {
        self.records.iter().map(|r| (r.id, r)).collect()
    }

    /// All relationships touching `id`, of every kind, in stored order.
    #[must_use]
    pub fn relationships_of(&self, id: RecordId) -> Vec<&Relationship> {
        self.relationships.iter().filter(|rel| rel.touches(id)).collect()
    }

    /// Add a record.
    ///
    /// # Errors
    ///
    /// Fails on a zero id or an id already present.
    pub fn insert_record(&mut self, record: Record) -> Result<(), StoreError> {
        if !record.id.is_valid() {
            return Err(StoreError::InvalidSnapshot(format!(
                "record id must be positive, got {}",
                record.id
            )));
        }
        if self.contains(record.id) {
            return Err(StoreError::DuplicateRecord(record.id));
        }
        self.records.push(record);
        Ok(())
    }

    /// Change the status of an existing record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::RecordNotFound`] if `id` is unknown.
    pub fn set_status(&mut self, id: RecordId, status: Status) -> Result<(), StoreError> {
        let record = self
            .records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(StoreError::RecordNotFound(id))?;
        record.status = status;
        Ok(())
    }

    /// Permanently delete a record and cascade-remove every relationship
    /// that references it. Returns the removed relationships.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::RecordNotFound`] if `id` is unknown.
    pub fn delete_record(&mut self, id: RecordId) -> Result<Vec<Relationship>, StoreError> {
        let before = self.records.len();
        self.records.retain(|r| r.id != id);
        if self.records.len() == before {
            return Err(StoreError::RecordNotFound(id));
        }

        let (removed, kept): (Vec<Relationship>, Vec<Relationship>) = self
            .relationships
            .drain(..)
            .partition(|rel| rel.touches(id));
        self.relationships = kept;

        debug!(record = %id, cascaded = removed.len(), "deleted record");
        Ok(removed)
    }

    /// Store a relationship. Returns `false` when the exact relationship
    /// was already present.
    ///
    /// No graph validation happens here; callers on the write path validate
    /// first, under the same store write.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::RecordNotFound`] if either endpoint is unknown.
    pub fn insert_relationship(&mut self, rel: Relationship) -> Result<bool, StoreError> {
        for endpoint in [rel.source, rel.target] {
            if !self.contains(endpoint) {
                return Err(StoreError::RecordNotFound(endpoint));
            }
        }
        if self.relationships.contains(&rel) {
            return Ok(false);
        }
        self.relationships.push(rel);
        Ok(true)
    }

    /// Remove a relationship.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::RelationshipNotFound`] if it is not stored.
    pub fn remove_relationship(&mut self, rel: &Relationship) -> Result<(), StoreError> {
        let before = self.relationships.len();
        self.relationships.retain(|existing| existing != rel);
        if self.relationships.len() == before {
            return Err(StoreError::RelationshipNotFound(*rel));
        }
        Ok(())
    }
}
