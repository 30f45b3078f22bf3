use serde::{Deserialize, Serialize};

use slabtrace_core::{AttributeSet, DomainError, DomainResult};
use slabtrace_inventory::{LocationUsage, Lot, LotId, QuantQuery, available_lots, customs_number_for_lot};
use slabtrace_products::{Product, ProductId};

/// Where a sale line looks for the customs number of the selected lot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleLineSettings {
    pub customs_usages: Vec<LocationUsage>,
}

impl Default for SaleLineSettings {
    fn default() -> Self {
        Self {
            customs_usages: vec![LocationUsage::Internal, LocationUsage::Transit],
        }
    }
}

/// One sold unit (or quantity of a fungible product).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleOrderLine {
    line_no: u32,
    product_id: ProductId,
    name: String,
    quantity: f64,
    uom: String,
    attributes: AttributeSet,
    lot_id: Option<LotId>,
}

impl SaleOrderLine {
    pub fn new(
        line_no: u32,
        product_id: ProductId,
        name: impl Into<String>,
        quantity: f64,
        uom: impl Into<String>,
    ) -> DomainResult<Self> {
        if !quantity.is_finite() || quantity <= 0.0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        let uom = uom.into();
        if uom.trim().is_empty() {
            return Err(DomainError::validation("unit of measure is required"));
        }
        Ok(Self {
            line_no,
            product_id,
            name: name.into(),
            quantity,
            uom,
            attributes: AttributeSet::default(),
            lot_id: None,
        })
    }

    pub fn line_no(&self) -> u32 {
        self.line_no
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn quantity(&self) -> f64 {
        self.quantity
    }

    pub fn uom(&self) -> &str {
        &self.uom
    }

    pub fn attributes(&self) -> &AttributeSet {
        &self.attributes
    }

    pub fn lot_id(&self) -> Option<LotId> {
        self.lot_id
    }

    /// `<order>/L<line>`: origin of the line's demand and name of its
    /// dedicated procurement group.
    pub fn origin(&self, order_name: &str) -> String {
        format!("{order_name}/L{}", self.line_no)
    }

    /// Set height and width; the area follows.
    pub fn set_dimensions(&mut self, height: f64, width: f64) -> DomainResult<()> {
        self.attributes.set_dimensions(height, width)
    }

    pub fn set_manual_area(&mut self, area: f64) -> DomainResult<()> {
        self.attributes.set_manual_area(area)
    }

    pub fn set_thickness(&mut self, thickness: f64) -> DomainResult<()> {
        self.attributes = self.attributes.clone().with_thickness(thickness)?;
        Ok(())
    }

    pub fn set_lot_label(&mut self, label: impl Into<String>) {
        self.attributes.lot_label = label.into().trim().to_string();
    }

    pub fn set_container(&mut self, container: impl Into<String>) {
        self.attributes.container = container.into();
    }

    /// Sell this specific lot: its attributes replace the line's, and the
    /// customs number is taken from the lot's latest receipt in `settings`'
    /// locations (empty when there is none).
    pub fn select_lot<Q>(&mut self, lot: &Lot, quants: &Q, settings: &SaleLineSettings) -> DomainResult<()>
    where
        Q: QuantQuery + ?Sized,
    {
        if lot.product_id() != self.product_id {
            return Err(DomainError::validation(format!(
                "lot {} belongs to another product",
                lot.name()
            )));
        }
        let customs = customs_number_for_lot(quants, lot.id_typed(), &settings.customs_usages).unwrap_or_default();
        self.attributes = lot.attributes().with_resolved_customs(&customs);
        self.lot_id = Some(lot.id_typed());
        tracing::debug!(line_no = self.line_no, lot = %lot.name(), customs = %customs, "lot selected on sale line");
        Ok(())
    }

    /// Drop the selected lot; the line keeps its attributes minus the customs
    /// number, which belonged to the lot.
    pub fn clear_lot(&mut self) {
        self.lot_id = None;
        self.attributes.customs_number.clear();
    }

    /// Lots of this product currently on hand in internal locations.
    pub fn available_lots<Q>(&self, quants: &Q) -> Vec<LotId>
    where
        Q: QuantQuery + ?Sized,
    {
        available_lots(quants, self.product_id)
    }

    /// A tracked product that must be sold by lot has units on hand, so the
    /// line must name one. Products bought to order are exempt.
    pub fn check_lot_requirement<Q>(&self, product: &Product, quants: &Q) -> DomainResult<()>
    where
        Q: QuantQuery + ?Sized,
    {
        if product.id_typed() != self.product_id {
            return Err(DomainError::invariant("product does not match the sale line"));
        }
        if !product.tracking().is_tracked() || product.is_bought_to_order() {
            return Ok(());
        }
        if product.requires_lot_selection_on_sale()
            && self.lot_id.is_none()
            && !self.available_lots(quants).is_empty()
        {
            return Err(DomainError::LotSelectionRequired {
                product: product.name().to_string(),
            });
        }
        Ok(())
    }
}
