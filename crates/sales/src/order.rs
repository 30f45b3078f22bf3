use serde::{Deserialize, Serialize};
use tracing::info;

use slabtrace_core::{CompanyId, DomainError, DomainResult, Entity, LocationId, PartnerId};
use slabtrace_fulfillment::{FulfillmentRequest, NewFulfillmentRequest, Replenishment};
use slabtrace_inventory::QuantQuery;
use slabtrace_products::{Product, ProductCatalog, ProductId};

use crate::line::SaleOrderLine;

slabtrace_core::record_id!(
    /// Sale order identifier.
    SaleOrderId
);

/// Sale order status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaleOrderStatus {
    Draft,
    Confirmed,
    Cancelled,
}

/// Command: AddLine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddLine {
    pub product_id: ProductId,
    pub quantity: f64,
    pub uom: String,
}

/// Sale order header with its lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleOrder {
    id: SaleOrderId,
    name: String,
    company_id: CompanyId,
    partner_id: Option<PartnerId>,
    /// Location the order ships from.
    location_id: LocationId,
    status: SaleOrderStatus,
    lines: Vec<SaleOrderLine>,
    procurement_group: Option<String>,
}

impl SaleOrder {
    pub fn new(
        id: SaleOrderId,
        name: impl Into<String>,
        company_id: CompanyId,
        partner_id: Option<PartnerId>,
        location_id: LocationId,
    ) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("sale order name cannot be empty"));
        }
        Ok(Self {
            id,
            name,
            company_id,
            partner_id,
            location_id,
            status: SaleOrderStatus::Draft,
            lines: Vec::new(),
            procurement_group: None,
        })
    }

    pub fn id_typed(&self) -> SaleOrderId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> SaleOrderStatus {
        self.status
    }

    pub fn lines(&self) -> &[SaleOrderLine] {
        &self.lines
    }

    pub fn procurement_group(&self) -> Option<&str> {
        self.procurement_group.as_deref()
    }

    pub fn is_modifiable(&self) -> bool {
        matches!(self.status, SaleOrderStatus::Draft)
    }

    /// Append a line; returns its number.
    pub fn add_line<C>(&mut self, catalog: &C, cmd: AddLine) -> DomainResult<u32>
    where
        C: ProductCatalog + ?Sized,
    {
        if !self.is_modifiable() {
            return Err(DomainError::invariant(
                "cannot modify order once it is confirmed or cancelled",
            ));
        }
        let product = catalog
            .product(cmd.product_id)
            .ok_or_else(|| DomainError::not_found(format!("product {}", cmd.product_id)))?;

        let line_no = (self.lines.len() as u32) + 1;
        self.lines
            .push(SaleOrderLine::new(line_no, cmd.product_id, product.name(), cmd.quantity, cmd.uom)?);
        Ok(line_no)
    }

    pub fn line(&self, line_no: u32) -> Option<&SaleOrderLine> {
        self.lines.iter().find(|l| l.line_no() == line_no)
    }

    /// Editable access to a line of a draft order.
    pub fn line_mut(&mut self, line_no: u32) -> DomainResult<&mut SaleOrderLine> {
        if !self.is_modifiable() {
            return Err(DomainError::invariant(
                "cannot modify order once it is confirmed or cancelled",
            ));
        }
        self.lines
            .iter_mut()
            .find(|l| l.line_no() == line_no)
            .ok_or_else(|| DomainError::not_found(format!("line {line_no}")))
    }

    /// Save hook: every line that must name a lot does.
    pub fn validate_lines<C, Q>(&self, catalog: &C, quants: &Q) -> DomainResult<()>
    where
        C: ProductCatalog + ?Sized,
        Q: QuantQuery + ?Sized,
    {
        self.checked_products(catalog, quants).map(|_| ())
    }

    fn checked_products<C, Q>(&self, catalog: &C, quants: &Q) -> DomainResult<Vec<Product>>
    where
        C: ProductCatalog + ?Sized,
        Q: QuantQuery + ?Sized,
    {
        let mut products = Vec::with_capacity(self.lines.len());
        for line in &self.lines {
            let product = catalog
                .product(line.product_id())
                .ok_or_else(|| DomainError::not_found(format!("product {}", line.product_id())))?;
            line.check_lot_requirement(&product, quants)?;
            products.push(product);
        }
        Ok(products)
    }

    /// Confirm the order and emit one fulfillment request per line.
    ///
    /// Every line must pass its lot-selection check first. An existing
    /// procurement group (from an earlier confirmation) is kept so the
    /// purchase orders already linked to it stay linked.
    pub fn confirm<C, Q>(&mut self, catalog: &C, quants: &Q) -> DomainResult<Vec<FulfillmentRequest>>
    where
        C: ProductCatalog + ?Sized,
        Q: QuantQuery + ?Sized,
    {
        if self.status != SaleOrderStatus::Draft {
            return Err(DomainError::invariant("only draft orders can be confirmed"));
        }
        if self.lines.is_empty() {
            return Err(DomainError::invariant("cannot confirm an order with no lines"));
        }

        let products = self.checked_products(catalog, quants)?;

        let group = match &self.procurement_group {
            Some(existing) => {
                info!(order = %self.name, group = %existing, "reusing existing procurement group");
                existing.clone()
            }
            None => self.name.clone(),
        };

        let requests = self
            .lines
            .iter()
            .zip(&products)
            .map(|(line, product)| {
                // Units sold from a chosen lot ship from stock; everything
                // not bought to order does too.
                let replenishment = if product.is_bought_to_order() && line.lot_id().is_none() {
                    Replenishment::Buy
                } else {
                    Replenishment::Stock
                };
                FulfillmentRequest::new(NewFulfillmentRequest {
                    product_id: line.product_id(),
                    quantity: line.quantity(),
                    uom: line.uom().to_string(),
                    location_id: self.location_id,
                    name: line.name().to_string(),
                    origin: line.origin(&self.name),
                    company_id: self.company_id,
                    partner_id: self.partner_id,
                    order_group: Some(group.clone()),
                    attributes: line.attributes().clone(),
                    lot_id: line.lot_id(),
                    replenishment,
                })
            })
            .collect::<DomainResult<Vec<_>>>()?;

        self.procurement_group = Some(group);
        self.status = SaleOrderStatus::Confirmed;
        info!(order = %self.name, lines = requests.len(), "sale order confirmed");
        Ok(requests)
    }

    /// Cancel the order. The procurement group survives so a later
    /// re-confirmation finds the purchase orders it already produced.
    pub fn cancel(&mut self) -> DomainResult<()> {
        if self.status == SaleOrderStatus::Cancelled {
            return Ok(());
        }
        self.status = SaleOrderStatus::Cancelled;
        info!(order = %self.name, group = ?self.procurement_group, "sale order cancelled");
        Ok(())
    }

    /// Back to draft from cancelled, keeping the procurement group.
    pub fn reset_to_draft(&mut self) -> DomainResult<()> {
        if self.status != SaleOrderStatus::Cancelled {
            return Err(DomainError::invariant("only cancelled orders can return to draft"));
        }
        self.status = SaleOrderStatus::Draft;
        Ok(())
    }
}

impl Entity for SaleOrder {
    type Id = SaleOrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
