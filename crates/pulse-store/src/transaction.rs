//! Optimistic read-modify-write transactions.
//!
//! A transaction declares the documents it reads up front. The store hands
//! the transaction function a [`TxSnapshot`] of those documents together
//! with their versions; the function returns a [`TxOutcome`] holding the
//! writes to apply and a value for the caller. The commit succeeds only if
//! none of the read documents changed since the snapshot was taken.
//! Otherwise the store takes a fresh snapshot and calls the function again.
//!
//! Transaction functions must therefore be free of side effects: they may
//! run several times for a single logical operation.

use std::collections::BTreeMap;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::StoreError;

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// A consistent view of a transaction's read set.
#[derive(Debug, Clone, Default)]
pub struct TxSnapshot {
    docs: BTreeMap<String, Option<Value>>,
    versions: BTreeMap<String, u64>,
}

impl TxSnapshot {
    pub(crate) fn insert(&mut self, path: String, data: Option<Value>, version: u64) {
        self.versions.insert(path.clone(), version);
        self.docs.insert(path, data);
    }

    pub(crate) fn versions(&self) -> impl Iterator<Item = (&String, &u64)> {
        self.versions.iter()
    }

    /// Raw document at `path`, if it exists and was part of the read set.
    pub fn get(&self, path: &str) -> Option<&Value> {
        self.docs.get(path).and_then(Option::as_ref)
    }

    /// Whether the document at `path` exists.
    pub fn exists(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    /// Decode the document at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Serialization`] if the document does not match `T`.
    pub fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, StoreError> {
        self.get(path)
            .map(|value| serde_json::from_value(value.clone()))
            .transpose()
            .map_err(StoreError::from)
    }
}

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

/// A single document mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum Write {
    /// Create or overwrite the document.
    Set {
        /// Document path.
        path: String,
        /// New document contents.
        data: Value,
    },
    /// Remove the document if it exists.
    Delete {
        /// Document path.
        path: String,
    },
}

impl Write {
    /// The path this write touches.
    pub fn path(&self) -> &str {
        match self {
            Self::Set { path, .. } | Self::Delete { path } => path,
        }
    }
}

/// Ordered list of writes committed atomically.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteSet {
    writes: Vec<Write>,
}

impl WriteSet {
    /// Create an empty write set.
    pub const fn new() -> Self {
        Self { writes: Vec::new() }
    }

    /// Queue a raw document write.
    pub fn set(&mut self, path: String, data: Value) -> &mut Self {
        self.writes.push(Write::Set { path, data });
        self
    }

    /// Serialize `value` and queue it as a document write.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Serialization`] if `value` cannot be serialized.
    pub fn set_json<T: Serialize>(&mut self, path: String, value: &T) -> Result<&mut Self, StoreError> {
        let data = serde_json::to_value(value)?;
        Ok(self.set(path, data))
    }

    /// Queue a document deletion.
    pub fn delete(&mut self, path: String) -> &mut Self {
        self.writes.push(Write::Delete { path });
        self
    }

    /// Whether no writes are queued.
    pub const fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// Number of queued writes.
    pub const fn len(&self) -> usize {
        self.writes.len()
    }

    pub(crate) fn into_writes(self) -> Vec<Write> {
        self.writes
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// What a transaction function decided for one attempt.
#[derive(Debug, Clone)]
pub struct TxOutcome<T> {
    /// Writes to commit. Empty for a read-only decision.
    pub writes: WriteSet,
    /// Value returned to the caller once the attempt is final.
    pub value: T,
}

impl<T> TxOutcome<T> {
    /// Commit `writes` and return `value`.
    pub const fn commit(writes: WriteSet, value: T) -> Self {
        Self { writes, value }
    }

    /// Commit nothing and return `value`.
    pub const fn read_only(value: T) -> Self {
        Self {
            writes: WriteSet::new(),
            value,
        }
    }
}
