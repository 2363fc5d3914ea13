//! Generic storage participant
//!
//! Wraps any forkable record store in the two-phase contract: operations
//! inside a transaction run against a per-transaction change set
//! (isolation), the operation outcome becomes the readiness vote, and the
//! broadcast decision merges or discards the staged changes (atomicity).

use std::sync::Arc;

use dashmap::DashMap;

use crate::core::errors::Result;
use crate::model::{Decision, TransactionId};
use crate::tree::node::CoordinationNode;

/// Outcome of a store operation; doubles as the readiness vote.
pub trait StoreResponse {
    fn success(&self) -> bool;
    fn message(&self) -> Option<String> {
        None
    }
}

/// A record store that can fork an isolated change set and merge it back.
pub trait RecordStore: Send + Sync {
    type Op: Send;
    type Response: StoreResponse + Send;

    /// Fork an isolated view holding one transaction's staged changes.
    fn fork_change_set(&self) -> Self
    where
        Self: Sized;

    /// Run one operation against this view.
    fn apply(&self, op: Self::Op) -> Self::Response;

    /// Fold a committed change set back into this store.
    fn merge_change_set(&self, changes: &Self)
    where
        Self: Sized;
}

/// Two-phase participant wrapping a [`RecordStore`].
///
/// Change sets are keyed by transaction id, so a repeated attempt for the
/// same transaction lands in the already-staged state instead of forking
/// twice.
pub struct TwoPhaseParticipant<S> {
    store: Arc<S>,
    pending: Arc<DashMap<TransactionId, Arc<S>>>,
}

impl<S> Clone for TwoPhaseParticipant<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            pending: self.pending.clone(),
        }
    }
}

impl<S: RecordStore + 'static> TwoPhaseParticipant<S> {
    pub fn new(store: S) -> Self {
        Self {
            store: Arc::new(store),
            pending: Arc::new(DashMap::new()),
        }
    }

    /// Committed view of the store, untouched by staged changes.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Number of transactions with staged changes.
    pub fn pending_transactions(&self) -> usize {
        self.pending.len()
    }

    /// Run `op`.
    ///
    /// Without a node the base store is hit directly. Within a transaction
    /// the op runs on that transaction's change set, the response's
    /// success and message become the readiness vote, and a decision
    /// subscription merges the staged changes on `Commit` and clears the
    /// pending entry either way.
    pub fn execute(&self, node: Option<&CoordinationNode>, op: S::Op) -> Result<S::Response> {
        let Some(node) = node else {
            return Ok(self.store.apply(op));
        };
        let id = node.transaction_id().clone();
        let change_set = self
            .pending
            .entry(id.clone())
            .or_insert_with(|| Arc::new(self.store.fork_change_set()))
            .clone();

        let response = change_set.apply(op);
        if let Err(err) = node.report_ready(response.success(), response.message()) {
            self.pending.remove(&id);
            return Err(err);
        }

        let store = self.store.clone();
        let pending = self.pending.clone();
        node.decision().subscribe(move |decision: &Decision| {
            if *decision == Decision::Commit {
                store.merge_change_set(&change_set);
            }
            pending.remove(&id);
        });
        Ok(response)
    }
}
