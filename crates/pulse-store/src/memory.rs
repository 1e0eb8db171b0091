//! In-process implementation of the real-time store contract.
//!
//! [`MemoryStore`] keeps every document in a [`BTreeMap`] guarded by a
//! mutex that is never held across an `.await`. It offers the three
//! capabilities the engine relies on:
//!
//! - point reads and writes (`get`, `set`, `delete`, `list`)
//! - live subscriptions with an initial snapshot ([`MemoryStore::subscribe`])
//! - optimistic multi-document transactions ([`MemoryStore::transact`])
//!
//! Every committed write bumps a global commit sequence and stamps the
//! written document with it. A transaction records the version of each
//! document in its read set and commits only if all of them are unchanged,
//! otherwise it retries with a fresh snapshot.
//!
//! The store also supports fault injection (forced conflicts, transient
//! failures, failing deletes) so callers can exercise their retry and
//! partial-failure paths in tests.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::paths;
use crate::subscription::{Change, ChangeKind, Listener, Subscription, Watch};
use crate::transaction::{TxOutcome, TxSnapshot, Write};

/// Default number of attempts a transaction makes before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 25;

/// A stored document and the commit sequence that last wrote it.
#[derive(Debug, Clone)]
struct Doc {
    data: Value,
    version: u64,
}

/// Faults to inject into upcoming operations.
#[derive(Debug, Default)]
struct Faults {
    conflicts: u32,
    failures: u32,
    delete_failures: u32,
    prefix_failures: Option<(String, u32)>,
}

/// Shared mutable state behind a [`MemoryStore`].
#[derive(Debug, Default)]
pub(crate) struct Inner {
    docs: BTreeMap<String, Doc>,
    /// Versions of deleted documents, so re-creation is detected as a
    /// conflict by transactions that read the document as absent.
    tombstones: BTreeMap<String, u64>,
    commit_seq: u64,
    listeners: Vec<Listener>,
    next_listener_id: u64,
    faults: Faults,
}

impl Inner {
    fn version(&self, path: &str) -> u64 {
        self.docs
            .get(path)
            .map(|doc| doc.version)
            .or_else(|| self.tombstones.get(path).copied())
            .unwrap_or(0)
    }

    pub(crate) fn remove_listener(&mut self, id: u64) {
        self.listeners.retain(|listener| listener.id != id);
    }

    fn take_failure(&mut self) -> bool {
        if self.faults.failures > 0 {
            self.faults.failures = self.faults.failures.saturating_sub(1);
            return true;
        }
        false
    }

    fn take_conflict(&mut self) -> bool {
        if self.faults.conflicts > 0 {
            self.faults.conflicts = self.faults.conflicts.saturating_sub(1);
            return true;
        }
        false
    }

    fn take_prefix_failure(&mut self, path: &str) -> bool {
        let Some((prefix, remaining)) = self.faults.prefix_failures.as_mut() else {
            return false;
        };
        if *remaining == 0 || !path.starts_with(prefix.as_str()) {
            return false;
        }
        *remaining = remaining.saturating_sub(1);
        true
    }

    fn take_delete_failure(&mut self) -> bool {
        if self.faults.delete_failures > 0 {
            self.faults.delete_failures = self.faults.delete_failures.saturating_sub(1);
            return true;
        }
        false
    }

    fn next_seq(&mut self) -> Result<u64, StoreError> {
        self.commit_seq = self
            .commit_seq
            .checked_add(1)
            .ok_or(StoreError::SequenceOverflow)?;
        Ok(self.commit_seq)
    }

    /// Apply writes in order under one commit sequence and notify
    /// listeners. Caller holds the lock, so the batch is atomic.
    fn apply(&mut self, writes: Vec<Write>) -> Result<(), StoreError> {
        let seq = self.next_seq()?;
        for write in writes {
            let change = match write {
                Write::Set { path, data } => {
                    self.tombstones.remove(&path);
                    let previous = self.docs.insert(
                        path.clone(),
                        Doc {
                            data: data.clone(),
                            version: seq,
                        },
                    );
                    let kind = if previous.is_some() {
                        ChangeKind::Modified
                    } else {
                        ChangeKind::Added
                    };
                    Change {
                        kind,
                        path,
                        data: Some(data),
                    }
                }
                Write::Delete { path } => {
                    if self.docs.remove(&path).is_none() {
                        continue;
                    }
                    self.tombstones.insert(path.clone(), seq);
                    Change {
                        kind: ChangeKind::Removed,
                        path,
                        data: None,
                    }
                }
            };
            self.notify(&change);
        }
        Ok(())
    }

    fn notify(&mut self, change: &Change) {
        // A failed send means the receiver is gone; drop the listener.
        self.listeners.retain(|listener| {
            if listener.watch.matches(&change.path) {
                listener.tx.send(change.clone()).is_ok()
            } else {
                true
            }
        });
    }

    fn children(&self, collection: &str) -> Vec<(String, Value)> {
        let prefix = format!("{collection}/");
        self.docs
            .range(prefix.clone()..)
            .take_while(|(path, _)| path.starts_with(&prefix))
            .filter(|(path, _)| paths::is_child_of(path, collection))
            .map(|(path, doc)| (path.clone(), doc.data.clone()))
            .collect()
    }

    fn descendants(&self, prefix: &str) -> Vec<(String, Value)> {
        self.docs
            .range(prefix.to_owned()..)
            .take_while(|(path, _)| path.starts_with(prefix))
            .map(|(path, doc)| (path.clone(), doc.data.clone()))
            .collect()
    }
}

/// Result of a single commit attempt.
enum CommitAttempt {
    Committed,
    Conflict { path: String },
}

/// In-process real-time document store.
///
/// Cheap to clone; clones share the same documents and listeners.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
    max_attempts: u32,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty store with the default transaction attempt limit.
    pub fn new() -> Self {
        Self::with_max_attempts(DEFAULT_MAX_ATTEMPTS)
    }

    /// Create an empty store whose transactions give up after
    /// `max_attempts` conflicting attempts (minimum 1).
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            max_attempts: max_attempts.max(1),
        }
    }

    /// The configured transaction attempt limit.
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner.lock().map_err(|_poisoned| StoreError::Poisoned)
    }

    // =========================================================================
    // Point reads and writes
    // =========================================================================

    /// Read the raw document at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Poisoned`] if the store state is poisoned.
    pub fn get(&self, path: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.lock()?.docs.get(path).map(|doc| doc.data.clone()))
    }

    /// Read and decode the document at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Serialization`] if the document does not match `T`.
    pub fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, StoreError> {
        self.get(path)?
            .map(serde_json::from_value)
            .transpose()
            .map_err(StoreError::from)
    }

    /// Create or overwrite the document at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if a failure was injected.
    pub fn set(&self, path: &str, data: Value) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        if inner.take_failure() || inner.take_prefix_failure(path) {
            return Err(StoreError::Unavailable(format!("write to {path} failed")));
        }
        inner.apply(vec![Write::Set {
            path: path.to_owned(),
            data,
        }])
    }

    /// Serialize `value` and store it at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Serialization`] if serialization fails, or
    /// [`StoreError::Unavailable`] if the write fails.
    pub fn set_json<T: Serialize>(&self, path: &str, value: &T) -> Result<(), StoreError> {
        let data = serde_json::to_value(value)?;
        self.set(path, data)
    }

    /// Shallow-merge the fields of `patch` into the document at `path`,
    /// creating it if missing. A non-object patch or target is replaced.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if a failure was injected.
    pub fn merge(&self, path: &str, patch: Value) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        if inner.take_failure() || inner.take_prefix_failure(path) {
            return Err(StoreError::Unavailable(format!("merge into {path} failed")));
        }
        let merged = match (inner.docs.get(path).map(|doc| doc.data.clone()), patch) {
            (Some(Value::Object(mut current)), Value::Object(fields)) => {
                current.extend(fields);
                Value::Object(current)
            }
            (_, replacement) => replacement,
        };
        inner.apply(vec![Write::Set {
            path: path.to_owned(),
            data: merged,
        }])
    }

    /// Delete the document at `path`. Deleting a missing document is not
    /// an error.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if a failure was injected.
    pub fn delete(&self, path: &str) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        if inner.take_delete_failure() || inner.take_failure() {
            return Err(StoreError::Unavailable(format!("delete of {path} failed")));
        }
        inner.apply(vec![Write::Delete {
            path: path.to_owned(),
        }])
    }

    /// List the direct children of `collection`, ordered by path.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Poisoned`] if the store state is poisoned.
    pub fn list(&self, collection: &str) -> Result<Vec<(String, Value)>, StoreError> {
        Ok(self.lock()?.children(collection))
    }

    /// List and decode the direct children of `collection`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Serialization`] if any child does not match `T`.
    pub fn list_json<T: DeserializeOwned>(&self, collection: &str) -> Result<Vec<T>, StoreError> {
        self.list(collection)?
            .into_iter()
            .map(|(_, value)| serde_json::from_value(value).map_err(StoreError::from))
            .collect()
    }

    /// List every document whose path starts with `prefix`, at any depth.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Poisoned`] if the store state is poisoned.
    pub fn list_prefix(&self, prefix: &str) -> Result<Vec<(String, Value)>, StoreError> {
        Ok(self.lock()?.descendants(prefix))
    }

    /// Total number of stored documents.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Poisoned`] if the store state is poisoned.
    pub fn document_count(&self) -> Result<usize, StoreError> {
        Ok(self.lock()?.docs.len())
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    /// Open a live subscription.
    ///
    /// The current state of the watched documents is queued immediately as
    /// [`ChangeKind::Added`] changes (in path order), followed by every
    /// later change.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Poisoned`] if the store state is poisoned.
    pub fn subscribe(&self, watch: Watch) -> Result<Subscription, StoreError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.lock()?;

        let initial: Vec<(String, Value)> = match &watch {
            Watch::Document(path) => inner
                .docs
                .get(path)
                .map(|doc| vec![(path.clone(), doc.data.clone())])
                .unwrap_or_default(),
            Watch::Collection(collection) => inner.children(collection),
        };
        for (path, data) in initial {
            // The receiver is alive: we still own it.
            let _ = tx.send(Change {
                kind: ChangeKind::Added,
                path,
                data: Some(data),
            });
        }

        let id = inner.next_listener_id;
        inner.next_listener_id = id.saturating_add(1);
        inner.listeners.push(Listener {
            id,
            watch: watch.clone(),
            tx,
        });
        drop(inner);

        debug!(listener = id, ?watch, "subscription opened");
        Ok(Subscription::new(id, watch, rx, Arc::downgrade(&self.inner)))
    }

    /// Number of open subscriptions.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Poisoned`] if the store state is poisoned.
    pub fn listener_count(&self) -> Result<usize, StoreError> {
        Ok(self.lock()?.listeners.len())
    }

    // =========================================================================
    // Transactions
    // =========================================================================

    /// Run an optimistic read-modify-write transaction over `read_set`.
    ///
    /// `f` is called with a snapshot of the read set and decides which
    /// writes to commit. If any document in the read set was changed by
    /// another commit in the meantime, the attempt is discarded and `f` is
    /// called again on a fresh snapshot, up to the configured attempt
    /// limit. An outcome with no writes finishes immediately without a
    /// commit.
    ///
    /// # Errors
    ///
    /// Returns any error produced by `f`, [`StoreError::Contention`] when
    /// every attempt conflicted, or [`StoreError::Unavailable`] if a
    /// failure was injected.
    pub async fn transact<T, F>(&self, read_set: &[String], mut f: F) -> Result<T, StoreError>
    where
        F: FnMut(&TxSnapshot) -> Result<TxOutcome<T>, StoreError> + Send,
        T: Send,
    {
        self.check_available()?;

        for attempt in 1..=self.max_attempts {
            let snapshot = self.snapshot(read_set)?;
            let outcome = f(&snapshot)?;
            if outcome.writes.is_empty() {
                return Ok(outcome.value);
            }

            match self.try_commit(&snapshot, outcome.writes.into_writes())? {
                CommitAttempt::Committed => {
                    if attempt > 1 {
                        debug!(attempt, "transaction committed after retry");
                    }
                    return Ok(outcome.value);
                }
                CommitAttempt::Conflict { path } => {
                    debug!(attempt, %path, "transaction conflict, retrying");
                    tokio::task::yield_now().await;
                }
            }
        }

        warn!(
            attempts = self.max_attempts,
            "transaction abandoned after repeated conflicts"
        );
        Err(StoreError::Contention {
            attempts: self.max_attempts,
        })
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.lock()?.take_failure() {
            return Err(StoreError::Unavailable(
                "transaction could not reach the store".to_owned(),
            ));
        }
        Ok(())
    }

    fn snapshot(&self, read_set: &[String]) -> Result<TxSnapshot, StoreError> {
        let inner = self.lock()?;
        let mut snapshot = TxSnapshot::default();
        for path in read_set {
            let data = inner.docs.get(path).map(|doc| doc.data.clone());
            snapshot.insert(path.clone(), data, inner.version(path));
        }
        Ok(snapshot)
    }

    fn try_commit(
        &self,
        snapshot: &TxSnapshot,
        writes: Vec<Write>,
    ) -> Result<CommitAttempt, StoreError> {
        let mut inner = self.lock()?;

        if inner.take_conflict() {
            return Ok(CommitAttempt::Conflict {
                path: "<injected>".to_owned(),
            });
        }

        for (path, version) in snapshot.versions() {
            if inner.version(path) != *version {
                return Ok(CommitAttempt::Conflict { path: path.clone() });
            }
        }

        inner.apply(writes)?;
        Ok(CommitAttempt::Committed)
    }

    // =========================================================================
    // Fault injection
    // =========================================================================

    /// Force the next `n` transaction commits to fail with a conflict.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Poisoned`] if the store state is poisoned.
    pub fn inject_conflicts(&self, n: u32) -> Result<(), StoreError> {
        self.lock()?.faults.conflicts = n;
        Ok(())
    }

    /// Make the next `n` writes or transactions fail as unavailable.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Poisoned`] if the store state is poisoned.
    pub fn inject_failures(&self, n: u32) -> Result<(), StoreError> {
        self.lock()?.faults.failures = n;
        Ok(())
    }

    /// Make the next `n` point writes under `prefix` fail as unavailable.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Poisoned`] if the store state is poisoned.
    pub fn inject_prefix_failures(&self, prefix: &str, n: u32) -> Result<(), StoreError> {
        self.lock()?.faults.prefix_failures = Some((prefix.to_owned(), n));
        Ok(())
    }

    /// Make the next `n` deletes fail as unavailable.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Poisoned`] if the store state is poisoned.
    pub fn inject_delete_failures(&self, n: u32) -> Result<(), StoreError> {
        self.lock()?.faults.delete_failures = n;
        Ok(())
    }
}
