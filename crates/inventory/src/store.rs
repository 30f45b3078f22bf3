//! Host store contracts for inventory records.

use std::sync::Arc;

use slabtrace_core::DomainResult;
use slabtrace_products::ProductId;

use crate::lot::{Lot, LotId};
use crate::move_line::{MoveLine, MoveLineId};
use crate::picking::{Picking, PickingId};
use crate::stock_move::{StockMove, StockMoveId};

/// Persistence of lots.
pub trait LotStore: Send + Sync {
    /// Persist a new lot. Fails with `Conflict` when the product already has a
    /// lot of the same name.
    fn insert_lot(&self, lot: Lot) -> DomainResult<()>;

    /// Replace an existing lot. Fails with `NotFound` for unknown lots.
    fn replace_lot(&self, lot: Lot) -> DomainResult<()>;

    fn lot(&self, id: LotId) -> Option<Lot>;

    fn lot_by_name(&self, product_id: ProductId, name: &str) -> Option<Lot>;
}

impl<L> LotStore for Arc<L>
where
    L: LotStore + ?Sized,
{
    fn insert_lot(&self, lot: Lot) -> DomainResult<()> {
        (**self).insert_lot(lot)
    }

    fn replace_lot(&self, lot: Lot) -> DomainResult<()> {
        (**self).replace_lot(lot)
    }

    fn lot(&self, id: LotId) -> Option<Lot> {
        (**self).lot(id)
    }

    fn lot_by_name(&self, product_id: ProductId, name: &str) -> Option<Lot> {
        (**self).lot_by_name(product_id, name)
    }
}

/// Read/write access to transfers, moves and move lines.
///
/// Writes store the record verbatim; they never trigger the host's own field
/// recomputation.
pub trait StockStore: Send + Sync {
    fn picking(&self, id: PickingId) -> Option<Picking>;

    fn stock_move(&self, id: StockMoveId) -> Option<StockMove>;

    fn move_line(&self, id: MoveLineId) -> Option<MoveLine>;

    /// Moves of a transfer, in creation order.
    fn moves_of_picking(&self, id: PickingId) -> Vec<StockMove>;

    /// Lines of a move, in creation order.
    fn lines_of_move(&self, id: StockMoveId) -> Vec<MoveLine>;

    fn save_move(&self, stock_move: StockMove) -> DomainResult<()>;

    fn save_move_line(&self, line: MoveLine) -> DomainResult<()>;
}

impl<S> StockStore for Arc<S>
where
    S: StockStore + ?Sized,
{
    fn picking(&self, id: PickingId) -> Option<Picking> {
        (**self).picking(id)
    }

    fn stock_move(&self, id: StockMoveId) -> Option<StockMove> {
        (**self).stock_move(id)
    }

    fn move_line(&self, id: MoveLineId) -> Option<MoveLine> {
        (**self).move_line(id)
    }

    fn moves_of_picking(&self, id: PickingId) -> Vec<StockMove> {
        (**self).moves_of_picking(id)
    }

    fn lines_of_move(&self, id: StockMoveId) -> Vec<MoveLine> {
        (**self).lines_of_move(id)
    }

    fn save_move(&self, stock_move: StockMove) -> DomainResult<()> {
        (**self).save_move(stock_move)
    }

    fn save_move_line(&self, line: MoveLine) -> DomainResult<()> {
        (**self).save_move_line(line)
    }
}
