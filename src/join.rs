//! Join engine for referencing object maps.
//!
//! While a child pipeline runs, rows that cite a referencing object map
//! are buffered in a child-side store together with their evaluated join
//! values and emit context. While the parent pipeline runs, every
//! generated parent subject is registered under its evaluated join
//! values. Once both sides complete, a symmetric hash join produces the
//! deferred triples.
//!
//! Both stores sit behind provider traits so deployments can spill to
//! disk; the in-memory stores are the defaults and a newline-delimited
//! JSON file store demonstrates the spill interface.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::error::{Result, RmlError};
use crate::term::{Statement, Term};

/// The evaluated join values of one row: one value list per join
/// condition, in condition order. Empty when the referencing object map
/// has no conditions.
pub type JoinKey = Vec<Vec<String>>;

/// A buffered child-side row: the subjects and emit context of one child
/// record, waiting for matching parent subjects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildRow {
    /// Subjects generated from the child record.
    pub subjects: Vec<Term>,
    /// Predicates of the owning predicate-object map, in declaration
    /// order.
    pub predicates: Vec<Term>,
    /// Graphs of the owning predicate-object map; `None` is the default
    /// graph.
    pub graphs: Vec<Option<Term>>,
    /// The evaluated child-side join values.
    pub key: JoinKey,
}

/// Child-side store: appends rows during child processing, drains them
/// for the join.
pub trait ChildSideJoinStore: Send {
    /// Buffers one row.
    ///
    /// # Errors
    ///
    /// Store I/O failures are fatal join store errors.
    fn append(&mut self, row: ChildRow) -> Result<()>;

    /// Removes and returns all buffered rows in append order.
    ///
    /// # Errors
    ///
    /// Store I/O failures are fatal join store errors.
    fn drain(&mut self) -> Result<Vec<ChildRow>>;
}

/// Provider constructing one child-side store per referencing object map.
pub trait ChildSideJoinStoreProvider: Send + Sync {
    /// Creates an empty store.
    ///
    /// # Errors
    ///
    /// Store I/O failures are fatal join store errors.
    fn create(&self) -> Result<Box<dyn ChildSideJoinStore>>;
}

/// The in-memory child-side store.
#[derive(Debug, Default)]
pub struct MemoryChildStore {
    rows: Vec<ChildRow>,
}

impl ChildSideJoinStore for MemoryChildStore {
    fn append(&mut self, row: ChildRow) -> Result<()> {
        self.rows.push(row);
        Ok(())
    }

    fn drain(&mut self) -> Result<Vec<ChildRow>> {
        Ok(std::mem::take(&mut self.rows))
    }
}

/// Provider for [`MemoryChildStore`]; the default.
#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryChildStoreProvider;

impl ChildSideJoinStoreProvider for MemoryChildStoreProvider {
    fn create(&self) -> Result<Box<dyn ChildSideJoinStore>> {
        Ok(Box::new(MemoryChildStore::default()))
    }
}

static SPILL_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A child-side store spilling rows to a newline-delimited JSON file.
#[derive(Debug)]
pub struct SpillingChildStore {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    rows: u64,
}

impl SpillingChildStore {
    fn new(dir: &std::path::Path) -> Result<Self> {
        let path = dir.join(format!(
            "rmlx-join-{}-{}.jsonl",
            std::process::id(),
            SPILL_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        let file = File::create(&path).map_err(join_store_error)?;
        Ok(Self {
            path,
            writer: Some(BufWriter::new(file)),
            rows: 0,
        })
    }
}

impl ChildSideJoinStore for SpillingChildStore {
    fn append(&mut self, row: ChildRow) -> Result<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| RmlError::JoinStore("store already drained".to_string()))?;
        let line = serde_json::to_string(&row)
            .map_err(|e| RmlError::JoinStore(e.to_string()))?;
        writeln!(writer, "{line}").map_err(join_store_error)?;
        self.rows += 1;
        Ok(())
    }

    fn drain(&mut self) -> Result<Vec<ChildRow>> {
        let Some(mut writer) = self.writer.take() else {
            return Ok(Vec::new());
        };
        writer.flush().map_err(join_store_error)?;
        drop(writer);

        let file = File::open(&self.path).map_err(join_store_error)?;
        let mut rows = Vec::with_capacity(usize::try_from(self.rows).unwrap_or_default());
        for line in BufReader::new(file).lines() {
            let line = line.map_err(join_store_error)?;
            rows.push(
                serde_json::from_str(&line).map_err(|e| RmlError::JoinStore(e.to_string()))?,
            );
        }
        Ok(rows)
    }
}

impl Drop for SpillingChildStore {
    fn drop(&mut self) {
        self.writer.take();
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Provider for [`SpillingChildStore`].
#[derive(Debug, Clone, Default)]
pub struct SpillingChildStoreProvider {
    dir: Option<PathBuf>,
}

impl SpillingChildStoreProvider {
    /// Spills into the system temporary directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Spills into the given directory.
    #[must_use]
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
        }
    }
}

impl ChildSideJoinStoreProvider for SpillingChildStoreProvider {
    fn create(&self) -> Result<Box<dyn ChildSideJoinStore>> {
        let dir = self
            .dir
            .clone()
            .unwrap_or_else(std::env::temp_dir);
        Ok(Box::new(SpillingChildStore::new(&dir)?))
    }
}

/// Parent-side store: parent subjects indexed by their evaluated join
/// values.
pub trait ParentSideJoinConditionStore: Send {
    /// Registers a parent subject under its join values. Duplicate
    /// subjects under one key collapse.
    ///
    /// # Errors
    ///
    /// Store I/O failures are fatal join store errors.
    fn register(&mut self, key: &JoinKey, subject: &Term) -> Result<()>;

    /// The subjects registered under a key, in registration order.
    ///
    /// # Errors
    ///
    /// Store I/O failures are fatal join store errors.
    fn subjects_for(&self, key: &JoinKey) -> Result<Vec<Term>>;
}

/// Provider constructing one parent-side store per referencing object
/// map.
pub trait ParentSideJoinConditionStoreProvider: Send + Sync {
    /// Creates an empty store.
    ///
    /// # Errors
    ///
    /// Store I/O failures are fatal join store errors.
    fn create(&self) -> Result<Box<dyn ParentSideJoinConditionStore>>;
}

/// The in-memory parent-side store.
#[derive(Debug, Default)]
pub struct MemoryParentStore {
    subjects: HashMap<JoinKey, IndexSet<Term>>,
}

impl ParentSideJoinConditionStore for MemoryParentStore {
    fn register(&mut self, key: &JoinKey, subject: &Term) -> Result<()> {
        self.subjects
            .entry(key.clone())
            .or_default()
            .insert(subject.clone());
        Ok(())
    }

    fn subjects_for(&self, key: &JoinKey) -> Result<Vec<Term>> {
        Ok(self
            .subjects
            .get(key)
            .map(|subjects| subjects.iter().cloned().collect())
            .unwrap_or_default())
    }
}

/// Provider for [`MemoryParentStore`]; the default.
#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryParentStoreProvider;

impl ParentSideJoinConditionStoreProvider for MemoryParentStoreProvider {
    fn create(&self) -> Result<Box<dyn ParentSideJoinConditionStore>> {
        Ok(Box::new(MemoryParentStore::default()))
    }
}

/// Identifies one referencing object map's pair of stores.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JoinSlotId {
    /// Display form of the referencing object map's resource.
    pub ref_object_map: String,
    /// Display form of the parent triples map's resource.
    pub parent_map: String,
}

struct JoinSlot {
    child: Box<dyn ChildSideJoinStore>,
    parent: Box<dyn ParentSideJoinConditionStore>,
}

/// The join engine shared by all pipelines of one mapper run.
///
/// Each side has at most one writer at a time plus one joiner at
/// completion; a mutex serializes access.
pub struct JoinEngine {
    child_provider: Arc<dyn ChildSideJoinStoreProvider>,
    parent_provider: Arc<dyn ParentSideJoinConditionStoreProvider>,
    slots: Mutex<HashMap<JoinSlotId, JoinSlot>>,
}

impl std::fmt::Debug for JoinEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("JoinEngine")
    }
}

impl JoinEngine {
    /// Creates an engine with the given store providers.
    #[must_use]
    pub fn new(
        child_provider: Arc<dyn ChildSideJoinStoreProvider>,
        parent_provider: Arc<dyn ParentSideJoinConditionStoreProvider>,
    ) -> Self {
        Self {
            child_provider,
            parent_provider,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// An engine with in-memory stores.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryChildStoreProvider),
            Arc::new(MemoryParentStoreProvider),
        )
    }

    fn with_slot<T>(
        &self,
        id: &JoinSlotId,
        f: impl FnOnce(&mut JoinSlot) -> Result<T>,
    ) -> Result<T> {
        let mut slots = self
            .slots
            .lock()
            .map_err(|_| RmlError::JoinStore("join store mutex poisoned".to_string()))?;
        if !slots.contains_key(id) {
            let slot = JoinSlot {
                child: self.child_provider.create()?,
                parent: self.parent_provider.create()?,
            };
            slots.insert(id.clone(), slot);
        }
        let slot = slots
            .get_mut(id)
            .ok_or_else(|| RmlError::JoinStore("join slot vanished".to_string()))?;
        f(slot)
    }

    /// Buffers a child-side row.
    ///
    /// # Errors
    ///
    /// Store I/O failures are fatal join store errors.
    pub fn push_child(&self, id: &JoinSlotId, row: ChildRow) -> Result<()> {
        self.with_slot(id, |slot| slot.child.append(row))
    }

    /// Registers parent subjects under their evaluated join values.
    ///
    /// # Errors
    ///
    /// Store I/O failures are fatal join store errors.
    pub fn register_parent(
        &self,
        id: &JoinSlotId,
        key: &JoinKey,
        subjects: &[Term],
    ) -> Result<()> {
        self.with_slot(id, |slot| {
            for subject in subjects {
                slot.parent.register(key, subject)?;
            }
            Ok(())
        })
    }

    /// Joins both sides of every slot and returns the deferred
    /// statements.
    ///
    /// Output order across slots and child rows is unspecified, but the
    /// predicate order within one child row is preserved.
    ///
    /// # Errors
    ///
    /// Store I/O failures are fatal join store errors.
    pub fn complete(&self) -> Result<Vec<Statement>> {
        let mut slots = self
            .slots
            .lock()
            .map_err(|_| RmlError::JoinStore("join store mutex poisoned".to_string()))?;

        let mut statements = Vec::new();
        for slot in slots.values_mut() {
            for row in slot.child.drain()? {
                let parents = slot.parent.subjects_for(&row.key)?;
                if parents.is_empty() {
                    continue;
                }
                for subject in &row.subjects {
                    for predicate in &row.predicates {
                        for parent in &parents {
                            for graph in &row.graphs {
                                statements.push(Statement::new_in_graph(
                                    subject.clone(),
                                    predicate.clone(),
                                    parent.clone(),
                                    graph.clone(),
                                ));
                            }
                        }
                    }
                }
            }
        }
        slots.clear();
        Ok(statements)
    }
}

fn join_store_error(e: std::io::Error) -> RmlError {
    RmlError::JoinStore(e.to_string())
}
