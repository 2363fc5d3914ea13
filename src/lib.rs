// Core infrastructure modules
pub mod core {
    pub mod errors;
}

// The coordination engine and its data model
pub mod model;
pub mod participant;
pub mod signal;
pub mod tree;

// Re-exports for convenience
pub use crate::core::errors::{Result, TxTreeError};
pub use model::{Decision, Percent, ReadinessReport, TransactionId, TransactionIdGenerator};
pub use participant::{RecordStore, StoreResponse, TwoPhaseParticipant};
pub use signal::{Receiver, Signal};
pub use tree::{initiate_controller, ChannelSet, CoordinationNode};

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn end_to_end_commit() {
        let generator = TransactionIdGenerator::new("lib-test");
        let trace = Arc::new(Mutex::new(Vec::new()));
        let sink = trace.clone();
        let root = initiate_controller(generator.generate(), move |line| sink.lock().push(line));

        let first = root.branch();
        let second = root.branch();

        first.report_progress(40.0).unwrap();
        second.report_progress(60.0).unwrap();
        first.report_ready(true, None).unwrap();
        second.report_ready(true, None).unwrap();
        root.report_ready(true, None).unwrap();

        assert_eq!(root.decision().poll(), Some(Decision::Commit));
        assert_eq!(first.decision().poll(), Some(Decision::Commit));
        assert_eq!(second.decision().poll(), Some(Decision::Commit));

        let trace = trace.lock();
        assert!(trace.iter().any(|line| line.contains("decision Commit")));
        assert!(trace.iter().any(|line| line.contains("progress 100.0%")));
    }
}
