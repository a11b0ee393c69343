//! Capacity enforcement by oldest-first eviction.
//!
//! Called on the append path before a new record is written. Failures here are
//! logged and swallowed: ingestion of the newer sample always proceeds.

use std::sync::Arc;
use tokio::task::JoinSet;

use super::types::ORDER_FIELD;
use crate::remote::RemoteStore;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EvictionReport {
    /// Records present before eviction, if the count could be read.
    pub count_before: Option<usize>,
    pub removed: usize,
    pub failed: usize,
}

/// Number of records to drop so that one more append stays within `capacity`.
pub fn excess_for_append(count: usize, capacity: usize) -> usize {
    if count >= capacity {
        count - capacity + 1
    } else {
        0
    }
}

/// Delete the oldest records at `path` so that `count + 1 <= capacity`.
///
/// All deletes are issued concurrently and awaited together; the function only
/// returns once every delete has completed or failed.
pub async fn make_room(
    remote: &Arc<dyn RemoteStore>,
    path: &str,
    capacity: usize,
) -> EvictionReport {
    let mut report = EvictionReport::default();

    let count = match remote.count(path).await {
        Ok(count) => count,
        Err(e) => {
            tracing::warn!(path, error = %e, "retention: count failed, skipping eviction");
            return report;
        }
    };
    report.count_before = Some(count);

    let to_remove = excess_for_append(count, capacity);
    if to_remove == 0 {
        return report;
    }

    let oldest = match remote.ordered_first(path, ORDER_FIELD, to_remove).await {
        Ok(docs) => docs,
        Err(e) => {
            tracing::warn!(path, to_remove, error = %e, "retention: fetching oldest records failed");
            return report;
        }
    };

    let mut deletes = JoinSet::new();
    for doc in oldest {
        let remote = Arc::clone(remote);
        let path = path.to_string();
        deletes.spawn(async move {
            let result = remote.delete(&path, &doc.key).await;
            (doc.key, result)
        });
    }

    while let Some(joined) = deletes.join_next().await {
        match joined {
            Ok((_, Ok(()))) => report.removed += 1,
            Ok((key, Err(e))) => {
                report.failed += 1;
                tracing::warn!(path, id = %key, error = %e, "retention: delete failed");
            }
            Err(e) => {
                report.failed += 1;
                tracing::warn!(path, error = %e, "retention: delete task aborted");
            }
        }
    }

    tracing::debug!(
        path,
        count,
        capacity,
        removed = report.removed,
        failed = report.failed,
        "retention: evicted oldest records"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::memory::{MemoryStore, Operation};
    use serde_json::json;

    async fn seeded(n: i64) -> (Arc<MemoryStore>, Arc<dyn RemoteStore>) {
        let store = Arc::new(MemoryStore::new());
        for ts in 0..n {
            let fields = json!({ "timestamp": ts }).as_object().cloned().unwrap();
            store.write("locations", &format!("k{ts}"), fields).await.unwrap();
        }
        let remote: Arc<dyn RemoteStore> = store.clone();
        (store, remote)
    }

    #[test]
    fn excess_math() {
        assert_eq!(excess_for_append(0, 1000), 0);
        assert_eq!(excess_for_append(999, 1000), 0);
        assert_eq!(excess_for_append(1000, 1000), 1);
        assert_eq!(excess_for_append(1005, 1000), 6);
    }

    #[tokio::test]
    async fn under_capacity_removes_nothing() {
        let (store, remote) = seeded(3).await;
        let report = make_room(&remote, "locations", 5).await;
        assert_eq!(report.removed, 0);
        assert_eq!(report.count_before, Some(3));
        assert_eq!(store.documents("locations").len(), 3);
    }

    #[tokio::test]
    async fn over_capacity_removes_oldest_first() {
        let (store, remote) = seeded(7).await;
        let report = make_room(&remote, "locations", 5).await;
        assert_eq!(report.removed, 3);
        assert_eq!(report.failed, 0);

        let keys: Vec<_> = store
            .documents("locations")
            .into_iter()
            .map(|d| d.key)
            .collect();
        assert_eq!(keys, ["k3", "k4", "k5", "k6"]);
    }

    #[tokio::test]
    async fn delete_failures_are_counted_not_raised() {
        let (store, remote) = seeded(4).await;
        store.fail_on(Operation::Delete);
        let report = make_room(&remote, "locations", 4).await;
        assert_eq!(report.removed, 0);
        assert_eq!(report.failed, 1);
    }

    #[tokio::test]
    async fn count_failure_skips_eviction() {
        let (store, remote) = seeded(4).await;
        store.fail_on(Operation::Count);
        let report = make_room(&remote, "locations", 2).await;
        assert_eq!(report, EvictionReport::default());
        assert_eq!(store.documents("locations").len(), 4);
    }
}
