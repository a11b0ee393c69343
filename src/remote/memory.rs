//! In-process [`RemoteStore`] backed by a mutex-guarded map.
//!
//! Collections keep insertion order, so ordered reads break timestamp ties the
//! same way the hosted backends do. Individual operations can be made to fail
//! for exercising error paths.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::{new_key, order_value, Document, RemoteError, RemoteResult, RemoteStore};

/// Operations that can be forced to fail with [`MemoryStore::fail_on`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Read,
    Count,
    GenerateId,
    Write,
    Delete,
    RemoveAll,
}

#[derive(Default)]
pub struct MemoryStore {
    collections: Mutex<BTreeMap<String, Vec<Document>>>,
    failing: Mutex<HashSet<Operation>>,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `op` return a storage error.
    pub fn fail_on(&self, op: Operation) {
        lock(&self.failing).insert(op);
    }

    pub fn recover(&self, op: Operation) {
        lock(&self.failing).remove(&op);
    }

    /// Number of successful `write` calls so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Snapshot of a collection in insertion order.
    pub fn documents(&self, path: &str) -> Vec<Document> {
        lock(&self.collections)
            .get(path)
            .cloned()
            .unwrap_or_default()
    }

    fn check(&self, op: Operation) -> RemoteResult<()> {
        if lock(&self.failing).contains(&op) {
            return Err(RemoteError::Storage(format!("injected {op:?} failure")));
        }
        Ok(())
    }

    fn sorted(&self, path: &str, order_field: &str) -> Vec<Document> {
        let mut docs = self.documents(path);
        // Stable: equal keys keep insertion order.
        docs.sort_by_key(|d| d.fields.get(order_field).and_then(order_value));
        docs
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn ordered_last(
        &self,
        path: &str,
        order_field: &str,
        n: usize,
    ) -> RemoteResult<Vec<Document>> {
        self.check(Operation::Read)?;
        let docs = self.sorted(path, order_field);
        let skip = docs.len().saturating_sub(n);
        Ok(docs.into_iter().skip(skip).collect())
    }

    async fn ordered_first(
        &self,
        path: &str,
        order_field: &str,
        n: usize,
    ) -> RemoteResult<Vec<Document>> {
        self.check(Operation::Read)?;
        Ok(self.sorted(path, order_field).into_iter().take(n).collect())
    }

    async fn ordered_all(&self, path: &str, order_field: &str) -> RemoteResult<Vec<Document>> {
        self.check(Operation::Read)?;
        Ok(self.sorted(path, order_field))
    }

    async fn count(&self, path: &str) -> RemoteResult<usize> {
        self.check(Operation::Count)?;
        Ok(lock(&self.collections).get(path).map_or(0, Vec::len))
    }

    async fn generate_id(&self, _path: &str) -> RemoteResult<String> {
        self.check(Operation::GenerateId)?;
        Ok(new_key())
    }

    async fn write(&self, path: &str, id: &str, value: Map<String, Value>) -> RemoteResult<()> {
        self.check(Operation::Write)?;
        let mut collections = lock(&self.collections);
        let docs = collections.entry(path.to_string()).or_default();
        match docs.iter_mut().find(|d| d.key == id) {
            Some(existing) => existing.fields = value,
            None => docs.push(Document::new(id, value)),
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete(&self, path: &str, id: &str) -> RemoteResult<()> {
        self.check(Operation::Delete)?;
        if let Some(docs) = lock(&self.collections).get_mut(path) {
            docs.retain(|d| d.key != id);
        }
        Ok(())
    }

    async fn remove_all(&self, path: &str) -> RemoteResult<()> {
        self.check(Operation::RemoveAll)?;
        lock(&self.collections).remove(path);
        Ok(())
    }
}
