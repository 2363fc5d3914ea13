//! The recursive coordination tree
//!
//! Each node owns its local channel set, shares an edge channel set with
//! its parent, and owns one edge per branch. Progress and readiness are
//! aggregated over the local value plus every branch edge and pushed up
//! the parent edge; the decision arriving on the parent edge is
//! rebroadcast locally and down every branch edge. All delivery is
//! synchronous and inline on the calling thread; there is no scheduler
//! and no event queue.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::core::errors::{Result, TxTreeError};
use crate::model::{Decision, Percent, ReadinessReport, TransactionId};
use crate::signal::Receiver;
use crate::tree::channels::ChannelSet;

/// A node of the coordination tree.
///
/// Cheap to clone; clones share state, so one node can be handed to
/// several workers. Holding any descendant keeps the whole ancestor chain
/// (and with it the root's decision wiring) alive.
#[derive(Clone)]
pub struct CoordinationNode {
    inner: Arc<NodeInner>,
}

struct NodeInner {
    /// Local signal surface; participants subscribe to `own.decision`.
    own: ChannelSet,
    /// Edge shared with the parent (the controller's set at the root).
    parent: Arc<ChannelSet>,
    /// Keeps ancestors alive while any descendant handle exists.
    _parent_node: Option<Arc<NodeInner>>,
    state: Mutex<NodeState>,
}

#[derive(Default)]
struct NodeState {
    branches: Vec<Arc<ChannelSet>>,
    decided: Option<Decision>,
}

impl CoordinationNode {
    /// Attach a root node under a controller-owned channel set.
    pub(crate) fn attach(parent: Arc<ChannelSet>) -> Self {
        Self::new_inner(parent, None)
    }

    fn new_inner(parent: Arc<ChannelSet>, parent_node: Option<Arc<NodeInner>>) -> Self {
        let inner = Arc::new(NodeInner {
            own: ChannelSet::new(parent.transaction_id().clone()),
            parent,
            _parent_node: parent_node,
            state: Mutex::new(NodeState::default()),
        });
        // A decision arriving on the parent edge is terminal; rebroadcast
        // it locally and to every branch, present or future.
        let weak = Arc::downgrade(&inner);
        inner.parent.decision.subscribe(move |decision: &Decision| {
            if let Some(node) = weak.upgrade() {
                node.rebroadcast(*decision);
            }
        });
        Self { inner }
    }

    pub fn transaction_id(&self) -> &TransactionId {
        self.inner.own.transaction_id()
    }

    /// Record this node's own progress and push the recomputed average to
    /// the parent. Valid range is `0.0..=100.0`.
    pub fn report_progress(&self, percent: Percent) -> Result<()> {
        if !(0.0..=100.0).contains(&percent) {
            return Err(TxTreeError::InvalidPercent {
                transaction: self.transaction_id().clone(),
                value: percent,
            });
        }
        tracing::trace!("progress {}% at {}", percent, self.transaction_id());
        self.inner.own.progress.push(percent);
        self.inner.transmit_progress();
        Ok(())
    }

    /// Record this node's readiness vote and run the aggregation gate.
    ///
    /// A veto propagates to the parent immediately; a positive vote
    /// propagates once every branch has also voted positive. Reporting
    /// again before the decision overwrites the stored vote and
    /// re-evaluates, so a participant can correct itself.
    pub fn report_ready(&self, can_commit: bool, message: Option<String>) -> Result<()> {
        if let Some(decision) = self.inner.state.lock().decided {
            return Err(TxTreeError::AlreadyDecided {
                transaction: self.transaction_id().clone(),
                decision,
            });
        }
        let report = ReadinessReport::new(can_commit, message);
        tracing::debug!("readiness {} at {}", report, self.transaction_id());
        self.inner.own.result.push(report.clone());
        self.inner.transmit_result(report);
        Ok(())
    }

    /// Read-only handle to this node's decision signal.
    ///
    /// Poll it to notice a rollback early, or subscribe to apply or
    /// discard staged work once the outcome arrives.
    pub fn decision(&self) -> Receiver<'_, Decision> {
        Receiver::new(&self.inner.own.decision)
    }

    /// Resolve once the decision reaches this node.
    ///
    /// The core has no watchdog; wrap this in `tokio::time::timeout` for a
    /// bounded wait. Takes the decision signal's single subscriber slot,
    /// so it replaces (and is replaced by) any `decision().subscribe`
    /// registration; a replaced or discarded wait resolves `Rollback`.
    pub async fn decided(&self) -> Decision {
        let (tx, rx) = oneshot::channel();
        let tx = Mutex::new(Some(tx));
        self.inner.own.decision.subscribe(move |decision: &Decision| {
            if let Some(tx) = tx.lock().take() {
                let _ = tx.send(*decision);
            }
        });
        rx.await.unwrap_or(Decision::Rollback)
    }

    /// Create a child node participating in this node's aggregation.
    ///
    /// The child shares the transaction identity and can itself be
    /// branched further, growing the tree to arbitrary depth. Branching is
    /// allowed while reports are already flowing; a branch created after
    /// the decision hears that decision immediately.
    pub fn branch(&self) -> CoordinationNode {
        let edge = Arc::new(ChannelSet::new(self.transaction_id().clone()));

        // Any push on the edge re-runs this node's aggregation.
        let weak = Arc::downgrade(&self.inner);
        edge.progress.subscribe(move |_: &Percent| {
            if let Some(node) = weak.upgrade() {
                node.transmit_progress();
            }
        });
        let weak = Arc::downgrade(&self.inner);
        edge.result.subscribe(move |report: &ReadinessReport| {
            if let Some(node) = weak.upgrade() {
                node.transmit_result(report.clone());
            }
        });

        let decided = {
            let mut state = self.inner.state.lock();
            state.branches.push(edge.clone());
            state.decided
        };
        if let Some(decision) = decided {
            edge.decision.push(decision);
        }
        tracing::debug!("new branch under {}", self.transaction_id());
        Self::new_inner(edge, Some(self.inner.clone()))
    }
}

impl NodeInner {
    /// Mean over the local value and every branch edge, serialized on the
    /// parent edge so concurrent reports cannot leave a stale average
    /// upstream. Unreported contributors count as 0.
    fn transmit_progress(&self) {
        self.parent.progress.push_with(|| {
            let branches = self.state.lock().branches.clone();
            let mut sum = self.own.progress.poll().unwrap_or(0.0);
            for branch in &branches {
                sum += branch.progress.poll().unwrap_or(0.0);
            }
            sum / (1 + branches.len()) as f64
        });
    }

    /// Forward `trigger` to the parent when it is a veto, or when the
    /// local vote and every branch vote are positive. Anything else means
    /// the subtree is still voting, so stay quiet.
    fn transmit_result(&self, trigger: ReadinessReport) {
        let all_ready = {
            let state = self.state.lock();
            self.own
                .result
                .poll()
                .map_or(false, |report| report.can_commit)
                && state
                    .branches
                    .iter()
                    .all(|branch| branch.result.poll().map_or(false, |report| report.can_commit))
        };
        if trigger.can_commit {
            if !all_ready {
                return;
            }
            // Committing implies completion.
            self.own.progress.push(100.0);
            self.transmit_progress();
        }
        self.parent.result.push(trigger);
    }

    /// Record the decision, then push it to the local surface and down
    /// every branch edge. The branch list is snapshotted under the same
    /// lock that `branch` appends under, so a branch created concurrently
    /// with the broadcast hears the decision exactly once.
    fn rebroadcast(&self, decision: Decision) {
        let branches = {
            let mut state = self.state.lock();
            state.decided = Some(decision);
            state.branches.clone()
        };
        tracing::debug!(
            "{} rebroadcasting {:?} to {} branches",
            self.own.transaction_id(),
            decision,
            branches.len()
        );
        self.own.decision.push(decision);
        for branch in branches {
            branch.decision.push(decision);
        }
    }
}
