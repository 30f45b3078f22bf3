use serde::{Deserialize, Serialize};

use slabtrace_core::{AttributeSet, DomainError, DomainResult, Entity};
use slabtrace_products::{BackReference, ProductId};
use slabtrace_purchasing::{PurchaseLine, PurchaseLineId};

use crate::lot::{Lot, LotId};
use crate::move_line::MoveLinePayload;
use crate::picking::{Picking, PickingId, PickingKind};

slabtrace_core::record_id!(
    /// Stock move identifier.
    StockMoveId
);

/// What the sale line asked for, kept on a delivery move so an emptied move
/// can be restored before validation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DemandSnapshot {
    pub attributes: AttributeSet,
    pub lot_id: Option<LotId>,
}

/// Field values handed to the host's stock-move creation entrypoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockMovePayload {
    pub name: String,
    pub origin: String,
    pub product_id: ProductId,
    pub quantity: f64,
    pub uom: String,
    pub picking_id: PickingId,
    pub kind: PickingKind,
    pub purchase_line_id: Option<PurchaseLineId>,
    pub back_reference: Option<BackReference>,
    pub lot_id: Option<LotId>,
    pub attributes: AttributeSet,
    pub demand: Option<DemandSnapshot>,
}

impl StockMovePayload {
    /// The single receipt move of a purchase line.
    pub fn for_purchase_line(
        line: &PurchaseLine,
        order_name: &str,
        product_name: &str,
        picking: &Picking,
    ) -> Self {
        Self {
            name: line.receipt_move_name(order_name, product_name),
            origin: line.receipt_origin(order_name),
            product_id: line.product_id(),
            quantity: line.quantity(),
            uom: line.uom().to_string(),
            picking_id: picking.id_typed(),
            kind: picking.kind(),
            purchase_line_id: Some(line.id_typed()),
            back_reference: line.back_references().first().cloned(),
            lot_id: None,
            attributes: line.attributes().clone(),
            demand: None,
        }
    }
}

/// Planned movement of one product between two locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockMove {
    id: StockMoveId,
    name: String,
    origin: String,
    product_id: ProductId,
    quantity: f64,
    uom: String,
    picking_id: PickingId,
    kind: PickingKind,
    purchase_line_id: Option<PurchaseLineId>,
    back_reference: Option<BackReference>,
    lot_id: Option<LotId>,
    attributes: AttributeSet,
    demand: Option<DemandSnapshot>,
}

impl StockMove {
    /// Store the payload as given. Any field recomputation is the host's call.
    pub fn from_payload(id: StockMoveId, payload: StockMovePayload) -> DomainResult<Self> {
        if !(payload.quantity > 0.0) {
            return Err(DomainError::validation("move quantity must be positive"));
        }
        if payload.name.trim().is_empty() {
            return Err(DomainError::validation("move name cannot be empty"));
        }
        Ok(Self {
            id,
            name: payload.name,
            origin: payload.origin,
            product_id: payload.product_id,
            quantity: payload.quantity,
            uom: payload.uom,
            picking_id: payload.picking_id,
            kind: payload.kind,
            purchase_line_id: payload.purchase_line_id,
            back_reference: payload.back_reference,
            lot_id: payload.lot_id,
            attributes: payload.attributes,
            demand: payload.demand,
        })
    }

    pub fn id_typed(&self) -> StockMoveId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn quantity(&self) -> f64 {
        self.quantity
    }

    pub fn uom(&self) -> &str {
        &self.uom
    }

    pub fn picking_id(&self) -> PickingId {
        self.picking_id
    }

    pub fn kind(&self) -> PickingKind {
        self.kind
    }

    pub fn purchase_line_id(&self) -> Option<PurchaseLineId> {
        self.purchase_line_id
    }

    pub fn back_reference(&self) -> Option<&BackReference> {
        self.back_reference.as_ref()
    }

    pub fn lot_id(&self) -> Option<LotId> {
        self.lot_id
    }

    pub fn attributes(&self) -> &AttributeSet {
        &self.attributes
    }

    pub fn demand(&self) -> Option<&DemandSnapshot> {
        self.demand.as_ref()
    }

    pub fn is_outgoing(&self) -> bool {
        self.kind == PickingKind::Outgoing
    }

    /// Overwrite the stored attributes verbatim.
    pub fn set_attributes(&mut self, attributes: AttributeSet) {
        self.attributes = attributes;
    }

    pub fn set_lot(&mut self, lot_id: Option<LotId>) {
        self.lot_id = lot_id;
    }

    /// Take the lot as the move's unit: lot reference and lot attributes with
    /// the given customs number.
    pub fn adopt_lot(&mut self, lot: &Lot, customs_number: &str) {
        self.lot_id = Some(lot.id_typed());
        self.attributes = lot.attributes().with_resolved_customs(customs_number);
    }

    /// Restore an emptied delivery move from its demand snapshot.
    ///
    /// Only outgoing moves with blank attributes are touched. A lot already on
    /// the move is kept. Returns `true` when the move changed.
    pub fn backfill_from_demand(&mut self) -> bool {
        if !self.is_outgoing() || !self.attributes.is_blank() {
            return false;
        }
        let Some(demand) = self.demand.as_ref() else {
            return false;
        };
        if demand.attributes.is_blank() && demand.lot_id.is_none() {
            return false;
        }
        self.attributes = demand.attributes.clone();
        if self.lot_id.is_none() {
            self.lot_id = demand.lot_id;
        }
        true
    }

    /// Payload for a move line of this move. Delivery lines inherit the
    /// move's lot; receipt lines get theirs when the unit is received.
    pub fn move_line_payload(&self, quantity: f64) -> MoveLinePayload {
        MoveLinePayload {
            move_id: self.id,
            product_id: self.product_id,
            kind: self.kind,
            quantity,
            lot_id: if self.is_outgoing() { self.lot_id } else { None },
            attributes: self.attributes.clone(),
        }
    }
}

impl Entity for StockMove {
    type Id = StockMoveId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use slabtrace_core::CompanyId;

    fn payload(kind: PickingKind) -> StockMovePayload {
        StockMovePayload {
            name: "SO1 - Carrara".to_string(),
            origin: "SO1".to_string(),
            product_id: ProductId::generate(),
            quantity: 1.0,
            uom: "Units".to_string(),
            picking_id: PickingId::generate(),
            kind,
            purchase_line_id: None,
            back_reference: None,
            lot_id: None,
            attributes: AttributeSet::default(),
            demand: None,
        }
    }

    #[test]
    fn payload_is_stored_verbatim() {
        let mut p = payload(PickingKind::Incoming);
        p.attributes = AttributeSet::from_area(4.0).unwrap();
        p.attributes.height = 1.0;
        let m = StockMove::from_payload(StockMoveId::generate(), p.clone()).unwrap();
        assert_eq!(m.attributes(), &p.attributes);
    }

    #[test]
    fn backfill_restores_blank_delivery_move() {
        let lot_id = LotId::generate();
        let mut p = payload(PickingKind::Outgoing);
        p.demand = Some(DemandSnapshot {
            attributes: AttributeSet::from_dimensions(1.2, 0.8, 2.0).unwrap(),
            lot_id: Some(lot_id),
        });
        let mut m = StockMove::from_payload(StockMoveId::generate(), p).unwrap();

        assert!(m.backfill_from_demand());
        assert_eq!(m.attributes().area, 1.2 * 0.8);
        assert_eq!(m.lot_id(), Some(lot_id));
        assert!(!m.backfill_from_demand());
    }

    #[test]
    fn backfill_ignores_receipts() {
        let mut p = payload(PickingKind::Incoming);
        p.demand = Some(DemandSnapshot {
            attributes: AttributeSet::from_area(2.0).unwrap(),
            lot_id: None,
        });
        let mut m = StockMove::from_payload(StockMoveId::generate(), p).unwrap();
        assert!(!m.backfill_from_demand());
        assert!(m.attributes().is_blank());
    }

    #[test]
    fn move_line_payload_carries_lot_only_for_deliveries() {
        let lot_id = LotId::generate();
        let mut out = payload(PickingKind::Outgoing);
        out.lot_id = Some(lot_id);
        let out = StockMove::from_payload(StockMoveId::generate(), out).unwrap();
        assert_eq!(out.move_line_payload(1.0).lot_id, Some(lot_id));

        let mut inc = payload(PickingKind::Incoming);
        inc.lot_id = Some(lot_id);
        let inc = StockMove::from_payload(StockMoveId::generate(), inc).unwrap();
        assert_eq!(inc.move_line_payload(1.0).lot_id, None);
    }

    #[test]
    fn adopt_lot_copies_frozen_attributes_and_customs() {
        let attrs = AttributeSet::from_dimensions(2.0, 1.5, 2.0).unwrap().with_lot_label("UYI");
        let lot = Lot::new(LotId::generate(), "UYI-001", ProductId::generate(), CompanyId::new(), attrs.clone(), Utc::now())
            .unwrap();
        let mut m = StockMove::from_payload(StockMoveId::generate(), payload(PickingKind::Incoming)).unwrap();
        m.adopt_lot(&lot, "24 47 3485 4000123");
        assert_eq!(m.lot_id(), Some(lot.id_typed()));
        assert!(m.attributes().describes_same_unit(&attrs));
        assert_eq!(m.attributes().customs_number, "24 47 3485 4000123");
    }

    #[test]
    fn zero_quantity_is_rejected() {
        let mut p = payload(PickingKind::Incoming);
        p.quantity = 0.0;
        match StockMove::from_payload(StockMoveId::generate(), p).unwrap_err() {
            DomainError::Validation(_) => {}
            _ => panic!("Expected Validation error for zero quantity"),
        }
    }
}
