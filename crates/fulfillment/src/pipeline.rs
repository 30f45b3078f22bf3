//! The propagation pipeline: groups requests, then drives each group through
//! the ordered stages.

use tracing::{info, info_span, warn};

use slabtrace_inventory::{LotId, LotNaming, MoveLineId, StockMoveId};
use slabtrace_products::{ProductCatalog, TrackingClassifier};
use slabtrace_purchasing::PurchaseLineId;

use crate::grouping::{Group, GroupingPolicy};
use crate::guard::{ConsistencyGuard, GuardSettings, Reconcile, ReconcileReport, ReconcileScope};
use crate::host::HostPlatform;
use crate::request::{FulfillmentRequest, RequestId};
use crate::stage::{
    Handoff, Lineage, LotStage, MoveLineStage, MoveStage, ProcurementStage, PurchaseStage, Stage,
};

/// A request the pipeline gave up on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedRequest {
    pub request_id: RequestId,
    pub stage: &'static str,
    pub reason: String,
}

/// Outcome of one pipeline run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineReport {
    pub groups: usize,
    pub succeeded: Vec<RequestId>,
    pub failed: Vec<FailedRequest>,
    pub purchase_lines: Vec<PurchaseLineId>,
    pub moves: Vec<StockMoveId>,
    pub move_lines: Vec<MoveLineId>,
    pub lots: Vec<LotId>,
    pub reconciliation: ReconcileReport,
}

impl PipelineReport {
    pub fn failed_ids(&self) -> Vec<RequestId> {
        self.failed.iter().map(|f| f.request_id).collect()
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    fn record(&mut self, handoff: &Handoff) {
        fn push_new<T: PartialEq + Copy>(items: &mut Vec<T>, item: T) {
            if !items.contains(&item) {
                items.push(item);
            }
        }
        match handoff {
            Handoff::PurchaseLine(id) => push_new(&mut self.purchase_lines, *id),
            Handoff::Move(id) => push_new(&mut self.moves, *id),
            Handoff::MoveLine(id) => push_new(&mut self.move_lines, *id),
            Handoff::Lot(id) => push_new(&mut self.lots, *id),
            Handoff::Request(_) | Handoff::Procurement(_) => {}
        }
    }
}

/// Drives fulfillment requests through the stages, one group at a time.
pub struct PropagationPipeline<C> {
    policy: GroupingPolicy<C>,
    stages: Vec<Box<dyn Stage>>,
    guard: Option<Box<dyn Reconcile>>,
}

impl<C: ProductCatalog> PropagationPipeline<C> {
    pub fn new(policy: GroupingPolicy<C>, stages: Vec<Box<dyn Stage>>) -> Self {
        Self {
            policy,
            stages,
            guard: None,
        }
    }

    /// Reconcile the records each group touched once the group is through.
    pub fn with_guard(mut self, guard: impl Reconcile + 'static) -> Self {
        self.guard = Some(Box::new(guard));
        self
    }

    pub fn policy(&self) -> &GroupingPolicy<C> {
        &self.policy
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Partition `requests` and run every group through all stages.
    ///
    /// Singleton groups are submitted alone; a mergeable group moves through
    /// each stage as one batch so the host can combine its requests. A
    /// failing request is reported and the run continues.
    pub fn run(&self, requests: Vec<FulfillmentRequest>) -> PipelineReport {
        let mut report = PipelineReport::default();
        let groups = self.policy.partition(requests);
        report.groups = groups.len();

        for group in &groups {
            self.run_group(group, &mut report);
        }

        info!(
            groups = report.groups,
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            lots = report.lots.len(),
            "propagation finished"
        );
        report
    }

    fn run_group(&self, group: &Group, report: &mut PipelineReport) {
        let span = info_span!("group", size = group.len(), singleton = group.is_singleton());
        let _entered = span.enter();

        let forbid_reuse = group.forbids_reuse();
        let mut frontier: Vec<(Lineage, Handoff)> = group
            .requests()
            .iter()
            .map(|request| (Lineage::of(request, forbid_reuse), Handoff::Request(request.clone())))
            .collect();
        let mut failed: Vec<RequestId> = Vec::new();
        let mut moves: Vec<StockMoveId> = Vec::new();
        let mut move_lines: Vec<MoveLineId> = Vec::new();

        for stage in &self.stages {
            let mut next: Vec<(Lineage, Handoff)> = Vec::with_capacity(frontier.len());
            for (lineage, handoff) in frontier {
                match stage.propagate(&lineage, handoff) {
                    Ok(outputs) => {
                        for output in outputs {
                            report.record(&output);
                            match &output {
                                Handoff::Move(id) if !moves.contains(id) => moves.push(*id),
                                Handoff::MoveLine(id) if !move_lines.contains(id) => {
                                    move_lines.push(*id)
                                }
                                _ => {}
                            }
                            merge_into(&mut next, lineage.clone(), output);
                        }
                    }
                    Err(err) => {
                        warn!(
                            stage = err.stage(),
                            error = %err,
                            back_reference = %lineage.back_reference,
                            "request failed, isolating it"
                        );
                        for request_id in &lineage.requests {
                            failed.push(*request_id);
                            report.failed.push(FailedRequest {
                                request_id: *request_id,
                                stage: err.stage(),
                                reason: err.to_string(),
                            });
                        }
                    }
                }
            }
            frontier = next;
        }

        report.succeeded.extend(
            group
                .request_ids()
                .into_iter()
                .filter(|id| !failed.contains(id)),
        );

        if let Some(guard) = &self.guard {
            if !moves.is_empty() || !move_lines.is_empty() {
                let pass = guard.reconcile(&ReconcileScope::Records { moves, move_lines });
                report.reconciliation.absorb(pass);
            }
        }
    }
}

impl<H> PropagationPipeline<H>
where
    H: HostPlatform + Clone + 'static,
{
    /// Procurement, purchase, stock move, move line and lot stages against
    /// one host, with the guard reconciling after every group.
    pub fn standard(host: H, naming: LotNaming, settings: GuardSettings) -> Self {
        let stages: Vec<Box<dyn Stage>> = vec![
            Box::new(ProcurementStage),
            Box::new(PurchaseStage::new(host.clone())),
            Box::new(MoveStage::new(host.clone())),
            Box::new(MoveLineStage::new(host.clone())),
            Box::new(LotStage::new(host.clone(), naming)),
        ];
        let policy = GroupingPolicy::new(TrackingClassifier::new(host.clone()));
        Self::new(policy, stages).with_guard(ConsistencyGuard::with_settings(host, settings))
    }
}

/// Records the host merged reach the next stage once, serving every request
/// that led to them.
fn merge_into(next: &mut Vec<(Lineage, Handoff)>, lineage: Lineage, output: Handoff) {
    if output.is_record() {
        if let Some((existing, _)) = next.iter_mut().find(|(_, h)| *h == output) {
            existing.absorb(lineage);
            return;
        }
    }
    next.push((lineage, output));
}
