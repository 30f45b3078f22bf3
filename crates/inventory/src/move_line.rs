use serde::{Deserialize, Serialize};

use slabtrace_core::{AttributeSet, DomainError, DomainResult, Entity};
use slabtrace_products::ProductId;

use crate::lot::{Lot, LotId};
use crate::picking::PickingKind;
use crate::stock_move::StockMoveId;

slabtrace_core::record_id!(
    /// Move line (detailed operation) identifier.
    MoveLineId
);

/// Field values handed to the host's move-line creation entrypoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveLinePayload {
    pub move_id: StockMoveId,
    pub product_id: ProductId,
    pub kind: PickingKind,
    pub quantity: f64,
    pub lot_id: Option<LotId>,
    pub attributes: AttributeSet,
}

/// Reservation of a quantity of a move, optionally of one lot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveLine {
    id: MoveLineId,
    move_id: StockMoveId,
    product_id: ProductId,
    kind: PickingKind,
    quantity: f64,
    lot_id: Option<LotId>,
    attributes: AttributeSet,
}

impl MoveLine {
    pub fn from_payload(id: MoveLineId, payload: MoveLinePayload) -> DomainResult<Self> {
        if !payload.quantity.is_finite() || payload.quantity < 0.0 {
            return Err(DomainError::validation("move line quantity cannot be negative"));
        }
        Ok(Self {
            id,
            move_id: payload.move_id,
            product_id: payload.product_id,
            kind: payload.kind,
            quantity: payload.quantity,
            lot_id: payload.lot_id,
            attributes: payload.attributes,
        })
    }

    pub fn id_typed(&self) -> MoveLineId {
        self.id
    }

    pub fn move_id(&self) -> StockMoveId {
        self.move_id
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn kind(&self) -> PickingKind {
        self.kind
    }

    pub fn quantity(&self) -> f64 {
        self.quantity
    }

    pub fn lot_id(&self) -> Option<LotId> {
        self.lot_id
    }

    pub fn attributes(&self) -> &AttributeSet {
        &self.attributes
    }

    /// Incoming line with a lot label but no lot yet: receiving it mints one.
    pub fn needs_lot(&self) -> bool {
        self.kind == PickingKind::Incoming
            && self.lot_id.is_none()
            && !self.attributes.lot_label.trim().is_empty()
    }

    /// Attach a lot minted for (or selected for) this line.
    pub fn assign_lot(&mut self, lot: &Lot) -> DomainResult<()> {
        if lot.product_id() != self.product_id {
            return Err(DomainError::invariant("lot belongs to another product"));
        }
        if let Some(current) = self.lot_id {
            if current != lot.id_typed() {
                return Err(DomainError::conflict("move line already carries another lot"));
            }
        }
        self.lot_id = Some(lot.id_typed());
        Ok(())
    }

    /// Set the lot label typed at receipt time.
    pub fn set_lot_label(&mut self, label: impl Into<String>) {
        self.attributes.lot_label = label.into().trim().to_string();
    }

    pub fn set_lot(&mut self, lot_id: Option<LotId>) {
        self.lot_id = lot_id;
    }

    /// Overwrite the stored attributes verbatim.
    pub fn set_attributes(&mut self, attributes: AttributeSet) {
        self.attributes = attributes;
    }
}

impl Entity for MoveLine {
    type Id = MoveLineId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
