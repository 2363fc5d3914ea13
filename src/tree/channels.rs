//! Per-node signal bundle

use crate::model::{Decision, Percent, ReadinessReport, TransactionId};
use crate::signal::Signal;

/// One tree node's communication surface: three signals under one
/// transaction identity. Pure data, no behavior beyond construction.
///
/// Progress and readiness flow through `progress` and `result` toward the
/// root; the final outcome comes back through `decision`.
pub struct ChannelSet {
    id: TransactionId,
    pub progress: Signal<Percent>,
    pub result: Signal<ReadinessReport>,
    pub decision: Signal<Decision>,
}

impl ChannelSet {
    pub fn new(id: TransactionId) -> Self {
        Self {
            id,
            progress: Signal::new(),
            result: Signal::new(),
            decision: Signal::new(),
        }
    }

    /// Transaction identity shared by every node of this tree.
    pub fn transaction_id(&self) -> &TransactionId {
        &self.id
    }
}
