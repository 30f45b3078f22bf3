//! Contract of the host ERP platform as seen by the pipeline.
//!
//! The host owns persistence and its own workflow. Creation entrypoints take
//! payloads and return handles; they may apply the platform's native behavior
//! (merging into a proposed line, recomputing derived fields) which the
//! pipeline then corrects.

use std::sync::Arc;

use thiserror::Error;

use slabtrace_core::DomainError;
use slabtrace_inventory::{
    LotStore, MoveLineId, MoveLinePayload, QuantQuery, SequenceService, StockMove, StockMoveId,
    StockMovePayload, StockStore,
};
use slabtrace_products::{BackReference, ProductCatalog};
use slabtrace_purchasing::{PurchaseLine, PurchaseLineId, PurchaseLinePayload, PurchaseOrder, PurchaseOrderId};

use crate::stage::Procurement;

pub type HostResult<T> = Result<T, HostError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum HostError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("rejected by host: {0}")]
    Rejected(String),

    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// Everything the pipeline and the guard consume from the host.
pub trait HostPlatform:
    ProductCatalog + StockStore + LotStore + QuantQuery + SequenceService
{
    /// Native purchase-line payload for a buy procurement, including the
    /// open line the host would fold it into (if any). Attributes are left
    /// blank; the host knows nothing about them.
    fn propose_purchase_line(&self, procurement: &Procurement) -> HostResult<PurchaseLinePayload>;

    /// Create a line, or merge into `payload.reuse_line` when set.
    fn create_purchase_line(&self, payload: PurchaseLinePayload) -> HostResult<PurchaseLineId>;

    fn purchase_line(&self, id: PurchaseLineId) -> Option<PurchaseLine>;

    fn purchase_order(&self, id: PurchaseOrderId) -> Option<PurchaseOrder>;

    /// Lines produced for (or merged with) the demand behind `key`.
    fn purchase_lines_for(&self, key: &BackReference) -> Vec<PurchaseLine>;

    fn save_purchase_line(&self, line: PurchaseLine) -> HostResult<()>;

    /// Native receipt-move payload for a purchase line.
    fn prepare_receipt_move(&self, line: &PurchaseLine) -> HostResult<StockMovePayload>;

    /// Native delivery-move payload for a procurement served from stock.
    fn prepare_delivery_move(&self, procurement: &Procurement) -> HostResult<StockMovePayload>;

    fn create_move(&self, payload: StockMovePayload) -> HostResult<StockMoveId>;

    /// Moves produced for the demand behind `key`.
    fn moves_for(&self, key: &BackReference) -> Vec<StockMove>;

    fn create_move_line(&self, payload: MoveLinePayload) -> HostResult<MoveLineId>;
}

impl<H> HostPlatform for Arc<H>
where
    H: HostPlatform + ?Sized,
{
    fn propose_purchase_line(&self, procurement: &Procurement) -> HostResult<PurchaseLinePayload> {
        (**self).propose_purchase_line(procurement)
    }

    fn create_purchase_line(&self, payload: PurchaseLinePayload) -> HostResult<PurchaseLineId> {
        (**self).create_purchase_line(payload)
    }

    fn purchase_line(&self, id: PurchaseLineId) -> Option<PurchaseLine> {
        (**self).purchase_line(id)
    }

    fn purchase_order(&self, id: PurchaseOrderId) -> Option<PurchaseOrder> {
        (**self).purchase_order(id)
    }

    fn purchase_lines_for(&self, key: &BackReference) -> Vec<PurchaseLine> {
        (**self).purchase_lines_for(key)
    }

    fn save_purchase_line(&self, line: PurchaseLine) -> HostResult<()> {
        (**self).save_purchase_line(line)
    }

    fn prepare_receipt_move(&self, line: &PurchaseLine) -> HostResult<StockMovePayload> {
        (**self).prepare_receipt_move(line)
    }

    fn prepare_delivery_move(&self, procurement: &Procurement) -> HostResult<StockMovePayload> {
        (**self).prepare_delivery_move(procurement)
    }

    fn create_move(&self, payload: StockMovePayload) -> HostResult<StockMoveId> {
        (**self).create_move(payload)
    }

    fn moves_for(&self, key: &BackReference) -> Vec<StockMove> {
        (**self).moves_for(key)
    }

    fn create_move_line(&self, payload: MoveLinePayload) -> HostResult<MoveLineId> {
        (**self).create_move_line(payload)
    }
}
