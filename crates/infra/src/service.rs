//! Wiring of the fulfillment stack against one host.

use std::sync::Arc;

use tracing::{info, warn};

use slabtrace_core::{DomainError, DomainResult};
use slabtrace_fulfillment::{ConsistencyGuard, PipelineReport, PropagationPipeline, ReconcileReport};
use slabtrace_inventory::{LotId, LotRegistry, LotStore, PickingId, PickingKind, StockStore};
use slabtrace_sales::{SaleLineSettings, SaleOrder};

use crate::config::FulfillmentConfig;
use crate::host::InMemoryHost;

/// Outcome of validating a transfer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    /// Reconciliation before the stock was booked.
    pub before_validate: ReconcileReport,
    /// Reconciliation of the done lines, after customs numbers were attached.
    pub before_done: ReconcileReport,
    pub lots_moved: Vec<LotId>,
    pub customs_attached: Vec<LotId>,
}

/// Sale confirmation, transfer saves and transfer validation, each followed
/// by the checkpoints that keep records aligned with their lots.
pub struct FulfillmentService {
    host: Arc<InMemoryHost>,
    pipeline: PropagationPipeline<Arc<InMemoryHost>>,
    guard: ConsistencyGuard<Arc<InMemoryHost>>,
    registry: LotRegistry<Arc<InMemoryHost>, Arc<InMemoryHost>>,
    sale_settings: SaleLineSettings,
}

impl FulfillmentService {
    pub fn new(host: Arc<InMemoryHost>, config: &FulfillmentConfig) -> Self {
        Self {
            pipeline: PropagationPipeline::standard(host.clone(), config.lot_naming(), config.guard_settings()),
            guard: ConsistencyGuard::with_settings(host.clone(), config.guard_settings()),
            registry: LotRegistry::with_naming(host.clone(), host.clone(), config.lot_naming()),
            sale_settings: config.sale_settings(),
            host,
        }
    }

    pub fn host(&self) -> &Arc<InMemoryHost> {
        &self.host
    }

    pub fn pipeline(&self) -> &PropagationPipeline<Arc<InMemoryHost>> {
        &self.pipeline
    }

    /// Sell a specific lot on a draft order line.
    pub fn select_lot(&self, order: &mut SaleOrder, line_no: u32, lot_id: LotId) -> DomainResult<()> {
        let lot = self
            .host
            .lot(lot_id)
            .ok_or_else(|| DomainError::not_found(format!("lot {lot_id}")))?;
        order
            .line_mut(line_no)?
            .select_lot(&lot, &*self.host, &self.sale_settings)
    }

    /// Confirm the order and propagate every line it emits.
    pub fn confirm_sale(&self, order: &mut SaleOrder) -> DomainResult<PipelineReport> {
        let requests = order.confirm(&*self.host, &*self.host)?;
        let report = self.pipeline.run(requests);
        if !report.is_success() {
            warn!(order = %order.name(), failed = report.failed.len(), "sale confirmed with failed lines");
        }
        Ok(report)
    }

    /// Save hook of an open transfer.
    pub fn save_picking(&self, picking_id: PickingId) -> ReconcileReport {
        self.guard.on_save(picking_id)
    }

    /// Validate a transfer: reconcile, book the stock, attach the customs
    /// number to lots that were received, reconcile the done lines and close
    /// the transfer.
    pub fn validate_picking(
        &self,
        picking_id: PickingId,
        customs_number: Option<&str>,
    ) -> DomainResult<ValidationReport> {
        let picking = self
            .host
            .picking(picking_id)
            .ok_or_else(|| DomainError::not_found(format!("transfer {picking_id}")))?;

        let mut report = ValidationReport {
            before_validate: self.guard.before_validate(picking_id),
            ..ValidationReport::default()
        };
        report.lots_moved = self.host.apply_transfer(picking_id, customs_number)?;

        if picking.kind() == PickingKind::Incoming {
            for lot_id in &report.lots_moved {
                if self.registry.attach_customs_number(&*self.host, *lot_id)? {
                    report.customs_attached.push(*lot_id);
                }
            }
        }

        report.before_done = self.guard.before_done(picking_id);
        self.host.mark_done(picking_id)?;
        info!(
            picking = %picking.name(),
            lots = report.lots_moved.len(),
            customs = report.customs_attached.len(),
            "transfer validated"
        );
        Ok(report)
    }
}
