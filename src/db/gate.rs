//! Coordination between writers, backups and restores.
//!
//! - Ingest and delete take a shared *mutation* permit.
//! - A backup takes the exclusive mutation permit, so the index and the
//!   document store are captured at the same logical point.
//! - A restore takes both exclusive permits; queries hold a shared *query*
//!   permit and never observe a half-restored state.

use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Default)]
pub struct ConsistencyGate {
    mutations: RwLock<()>,
    queries: RwLock<()>,
}

/// Held by a restore for the whole swap.
pub struct RestoreGuard<'a> {
    _mutations: RwLockWriteGuard<'a, ()>,
    _queries: RwLockWriteGuard<'a, ()>,
}

impl ConsistencyGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn mutation(&self) -> RwLockReadGuard<'_, ()> {
        self.mutations.read().await
    }

    pub async fn query(&self) -> RwLockReadGuard<'_, ()> {
        self.queries.read().await
    }

    /// Blocks new mutations and waits for in-flight ones to finish.
    pub async fn quiesce(&self) -> RwLockWriteGuard<'_, ()> {
        self.mutations.write().await
    }

    /// Mutations first, then queries, in that order everywhere.
    pub async fn exclusive(&self) -> RestoreGuard<'_> {
        let mutations = self.mutations.write().await;
        let queries = self.queries.write().await;
        RestoreGuard {
            _mutations: mutations,
            _queries: queries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_quiesce_waits_for_mutations() {
        let gate = Arc::new(ConsistencyGate::new());
        let permit = gate.mutation().await;

        let g = Arc::clone(&gate);
        let waiter = tokio::spawn(async move {
            let _q = g.quiesce().await;
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(permit);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_exclusive_blocks_queries() {
        let gate = Arc::new(ConsistencyGate::new());
        let guard = gate.exclusive().await;

        let g = Arc::clone(&gate);
        let reader = tokio::spawn(async move {
            let _r = g.query().await;
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!reader.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), reader)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_queries_do_not_block_each_other() {
        let gate = ConsistencyGate::new();
        let _a = gate.query().await;
        let _b = tokio::time::timeout(Duration::from_millis(100), gate.query())
            .await
            .unwrap();
    }
}
