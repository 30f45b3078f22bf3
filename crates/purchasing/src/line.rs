use serde::{Deserialize, Serialize};

use slabtrace_core::{AttributeSet, DomainError, DomainResult, Entity};
use slabtrace_products::{BackReference, ProductId};

use crate::order::PurchaseOrderId;

slabtrace_core::record_id!(
    /// Purchase order line identifier.
    PurchaseLineId
);

/// Field values handed to the host's purchase-line creation entrypoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseLinePayload {
    pub order_id: PurchaseOrderId,
    pub product_id: ProductId,
    pub quantity: f64,
    pub uom: String,
    pub name: String,
    pub back_reference: BackReference,
    pub procurement_group: Option<String>,
    pub attributes: AttributeSet,
    /// Open line the platform proposes to fold this demand into.
    pub reuse_line: Option<PurchaseLineId>,
}

impl PurchaseLinePayload {
    /// Drop any reuse proposal so the host must create a fresh line.
    ///
    /// Returns the proposal that was removed.
    pub fn forbid_reuse(&mut self) -> Option<PurchaseLineId> {
        self.reuse_line.take()
    }
}

/// Purchase order line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseLine {
    id: PurchaseLineId,
    order_id: PurchaseOrderId,
    line_no: u32,
    product_id: ProductId,
    quantity: f64,
    uom: String,
    name: String,
    back_references: Vec<BackReference>,
    procurement_group: Option<String>,
    attributes: AttributeSet,
}

impl PurchaseLine {
    /// Build a new line from a creation payload.
    ///
    /// Area is re-derived only when both dimensions are present, so a demand
    /// sold purely by area keeps the value it arrived with.
    pub fn from_payload(
        id: PurchaseLineId,
        line_no: u32,
        payload: PurchaseLinePayload,
    ) -> DomainResult<Self> {
        if !(payload.quantity > 0.0) {
            return Err(DomainError::validation("quantity must be positive"));
        }
        if payload.back_reference.product_id != payload.product_id {
            return Err(DomainError::invariant(
                "back reference must point at the line's product",
            ));
        }

        let mut attributes = payload.attributes;
        attributes.recompute_area();

        Ok(Self {
            id,
            order_id: payload.order_id,
            line_no,
            product_id: payload.product_id,
            quantity: payload.quantity,
            uom: payload.uom,
            name: payload.name,
            back_references: vec![payload.back_reference],
            procurement_group: payload.procurement_group,
            attributes,
        })
    }

    /// Fold another demand for the same product into this line (native merge).
    ///
    /// The line keeps its own attributes; only quantity and back references
    /// accumulate.
    pub fn absorb(&mut self, payload: &PurchaseLinePayload) -> DomainResult<()> {
        if payload.product_id != self.product_id {
            return Err(DomainError::invariant("cannot merge lines of different products"));
        }
        if payload.order_id != self.order_id {
            return Err(DomainError::invariant("cannot merge lines across purchase orders"));
        }
        if !(payload.quantity > 0.0) {
            return Err(DomainError::validation("quantity must be positive"));
        }
        self.quantity += payload.quantity;
        if !self.back_references.contains(&payload.back_reference) {
            self.back_references.push(payload.back_reference.clone());
        }
        Ok(())
    }

    pub fn id_typed(&self) -> PurchaseLineId {
        self.id
    }

    pub fn order_id(&self) -> PurchaseOrderId {
        self.order_id
    }

    pub fn line_no(&self) -> u32 {
        self.line_no
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

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn back_references(&self) -> &[BackReference] {
        &self.back_references
    }

    pub fn procurement_group(&self) -> Option<&str> {
        self.procurement_group.as_deref()
    }

    pub fn attributes(&self) -> &AttributeSet {
        &self.attributes
    }

    /// Overwrite the stored attributes verbatim (no recompute).
    pub fn set_attributes(&mut self, attributes: AttributeSet) {
        self.attributes = attributes;
    }

    /// The line was produced for (or merged with) this demand.
    pub fn serves(&self, key: &BackReference) -> bool {
        self.back_references.contains(key)
    }

    /// More than one demand was folded into this line.
    pub fn is_shared(&self) -> bool {
        self.back_references.len() > 1
    }

    /// Name of the single receipt move this line produces.
    pub fn receipt_move_name(&self, order_name: &str, product_name: &str) -> String {
        format!("{order_name} - {product_name} [Line {}]", self.line_no)
    }

    /// Origin of the receipt move; unique per line so moves are never grouped.
    pub fn receipt_origin(&self, order_name: &str) -> String {
        format!("{order_name} - Line {}", self.line_no)
    }
}

impl Entity for PurchaseLine {
    type Id = PurchaseLineId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
