//! Root construction: turning aggregated readiness into a decision

use std::sync::Arc;

use crate::model::{ReadinessReport, TransactionId};
use crate::tree::channels::ChannelSet;
use crate::tree::node::CoordinationNode;

/// Build the root of a coordination tree.
///
/// The returned node is the entry point for branching and for the root's
/// own contribution. `trace_sink` receives human-readable progress,
/// readiness, and decision lines as they reach the top of the tree.
///
/// The first readiness report that survives aggregation at the root is
/// turned into the decision (`Commit` iff `can_commit`) and broadcast down
/// the whole tree. The decision fires once; readiness arriving afterwards
/// is ignored.
pub fn initiate_controller(
    id: TransactionId,
    trace_sink: impl Fn(String) + Send + Sync + 'static,
) -> CoordinationNode {
    let top = Arc::new(ChannelSet::new(id));
    let sink = Arc::new(trace_sink);

    let progress_sink = sink.clone();
    let progress_id = top.transaction_id().clone();
    top.progress.subscribe(move |percent: &f64| {
        (*progress_sink)(format!("{} progress {:.1}%", progress_id, percent));
    });

    let weak = Arc::downgrade(&top);
    let id = top.transaction_id().clone();
    top.result.subscribe(move |report: &ReadinessReport| {
        (*sink)(format!("{} readiness {}", id, report));
        let Some(top) = weak.upgrade() else { return };
        if top.decision.poll().is_some() {
            tracing::debug!("{} ignoring readiness after decision", id);
            return;
        }
        let decision = report.to_decision();
        (*sink)(format!("{} decision {:?}", id, decision));
        tracing::info!("{} decided {:?}", id, decision);
        top.decision.push(decision);
    });

    CoordinationNode::attach(top)
}
