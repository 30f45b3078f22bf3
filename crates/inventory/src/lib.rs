//! Inventory domain module.
//!
//! Lots and their sequential naming, stock quantities, transfer documents
//! (pickings), stock moves and move lines, plus the store contracts through
//! which the host platform exposes them. No IO lives here.

pub mod lot;
pub mod move_line;
pub mod picking;
pub mod quant;
pub mod registry;
pub mod sequence;
pub mod stock_move;
pub mod store;

pub use lot::{Lot, LotId};
pub use move_line::{MoveLine, MoveLineId, MoveLinePayload};
pub use picking::{Picking, PickingId, PickingKind, PickingState};
pub use quant::{
    LocationUsage, QuantFilter, QuantId, QuantQuery, StockQuant, available_lots,
    customs_number_for_lot, earliest_receipt, latest_receipt,
};
pub use registry::{LotNaming, LotRegistry};
pub use sequence::{InMemorySequences, SequenceDefinition, SequenceService};
pub use stock_move::{DemandSnapshot, StockMove, StockMoveId, StockMovePayload};
pub use store::{LotStore, StockStore};
