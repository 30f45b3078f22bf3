use serde::{Deserialize, Serialize};

use slabtrace_core::{AttributeSet, CompanyId, DomainError, DomainResult, LocationId, PartnerId};
use slabtrace_inventory::LotId;
use slabtrace_products::{BackReference, ProductId};

slabtrace_core::record_id!(
    /// Fulfillment request identifier.
    RequestId
);

/// How the demand is satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Replenishment {
    /// Bought from a supplier for this demand.
    #[default]
    Buy,
    /// Delivered from units already on hand.
    Stock,
}

/// Input for a [`FulfillmentRequest`], as produced by order confirmation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewFulfillmentRequest {
    pub product_id: ProductId,
    pub quantity: f64,
    pub uom: String,
    pub location_id: LocationId,
    pub name: String,
    /// Origin document reference, unique per sale line.
    pub origin: String,
    pub company_id: CompanyId,
    pub partner_id: Option<PartnerId>,
    pub order_group: Option<String>,
    pub attributes: AttributeSet,
    pub lot_id: Option<LotId>,
    pub replenishment: Replenishment,
}

/// One unit of demand flowing through the pipeline. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FulfillmentRequest {
    id: RequestId,
    product_id: ProductId,
    quantity: f64,
    uom: String,
    location_id: LocationId,
    name: String,
    origin: String,
    company_id: CompanyId,
    partner_id: Option<PartnerId>,
    order_group: Option<String>,
    attributes: AttributeSet,
    lot_id: Option<LotId>,
    back_reference: BackReference,
    replenishment: Replenishment,
}

impl FulfillmentRequest {
    pub fn new(input: NewFulfillmentRequest) -> DomainResult<Self> {
        Self::with_id(RequestId::generate(), input)
    }

    pub fn with_id(id: RequestId, input: NewFulfillmentRequest) -> DomainResult<Self> {
        if !input.quantity.is_finite() || input.quantity <= 0.0 {
            return Err(DomainError::validation(format!(
                "quantity must be positive (got {})",
                input.quantity
            )));
        }
        if input.uom.trim().is_empty() {
            return Err(DomainError::validation("unit of measure is required"));
        }
        if input.name.trim().is_empty() {
            return Err(DomainError::validation("name is required"));
        }
        let origin = input.origin.trim().to_string();
        if origin.is_empty() {
            return Err(DomainError::validation("origin reference is required"));
        }
        let order_group = input
            .order_group
            .map(|g| g.trim().to_string())
            .filter(|g| !g.is_empty());

        Ok(Self {
            id,
            back_reference: BackReference::new(input.product_id, origin.clone()),
            product_id: input.product_id,
            quantity: input.quantity,
            uom: input.uom,
            location_id: input.location_id,
            name: input.name,
            origin,
            company_id: input.company_id,
            partner_id: input.partner_id,
            order_group,
            attributes: input.attributes,
            lot_id: input.lot_id,
            replenishment: input.replenishment,
        })
    }

    pub fn id(&self) -> RequestId {
        self.id
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

    pub fn location_id(&self) -> LocationId {
        self.location_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn company_id(&self) -> CompanyId {
        self.company_id
    }

    pub fn partner_id(&self) -> Option<PartnerId> {
        self.partner_id
    }

    pub fn order_group(&self) -> Option<&str> {
        self.order_group.as_deref()
    }

    pub fn attributes(&self) -> &AttributeSet {
        &self.attributes
    }

    pub fn lot_id(&self) -> Option<LotId> {
        self.lot_id
    }

    pub fn back_reference(&self) -> &BackReference {
        &self.back_reference
    }

    pub fn replenishment(&self) -> Replenishment {
        self.replenishment
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn input(product_id: ProductId, origin: &str) -> NewFulfillmentRequest {
        NewFulfillmentRequest {
            product_id,
            quantity: 1.0,
            uom: "Units".to_string(),
            location_id: LocationId::new(),
            name: "Carrara slab".to_string(),
            origin: origin.to_string(),
            company_id: CompanyId::new(),
            partner_id: None,
            order_group: Some("SO001".to_string()),
            attributes: AttributeSet::default(),
            lot_id: None,
            replenishment: Replenishment::Buy,
        }
    }

    #[test]
    fn back_reference_is_product_and_origin() {
        let product_id = ProductId::generate();
        let request = FulfillmentRequest::new(input(product_id, " SO001/L1 ")).unwrap();
        assert_eq!(request.origin(), "SO001/L1");
        assert_eq!(request.back_reference(), &BackReference::new(product_id, "SO001/L1"));
    }

    #[test]
    fn missing_required_fields_are_rejected() {
        let product_id = ProductId::generate();

        let mut no_qty = input(product_id, "SO001/L1");
        no_qty.quantity = 0.0;
        let mut no_uom = input(product_id, "SO001/L1");
        no_uom.uom = " ".to_string();
        let no_origin = input(product_id, "");

        for bad in [no_qty, no_uom, no_origin] {
            match FulfillmentRequest::new(bad).unwrap_err() {
                DomainError::Validation(_) => {}
                _ => panic!("Expected Validation error"),
            }
        }
    }

    #[test]
    fn blank_order_group_becomes_none() {
        let mut i = input(ProductId::generate(), "SO001/L1");
        i.order_group = Some("   ".to_string());
        assert_eq!(FulfillmentRequest::new(i).unwrap().order_group(), None);
    }
}
