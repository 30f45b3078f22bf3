//! Stock quantities (on-hand records) and the host query over them.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use slabtrace_core::LocationId;
use slabtrace_products::ProductId;

use crate::lot::LotId;

slabtrace_core::record_id!(
    /// Stock quantity identifier.
    QuantId
);

/// Role of a stock location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationUsage {
    Supplier,
    Internal,
    Transit,
    Customer,
    Inventory,
}

impl core::str::FromStr for LocationUsage {
    type Err = slabtrace_core::DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "supplier" => Ok(Self::Supplier),
            "internal" => Ok(Self::Internal),
            "transit" => Ok(Self::Transit),
            "customer" => Ok(Self::Customer),
            "inventory" => Ok(Self::Inventory),
            other => Err(slabtrace_core::DomainError::validation(format!(
                "unknown location usage: {other}"
            ))),
        }
    }
}

/// Quantity of a product (optionally of one lot) held in one location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockQuant {
    pub id: QuantId,
    pub product_id: ProductId,
    pub lot_id: Option<LotId>,
    pub location_id: LocationId,
    pub location_usage: LocationUsage,
    pub quantity: f64,
    /// Receipt date of the units.
    pub in_date: DateTime<Utc>,
    pub customs_number: Option<String>,
}

/// Selection over positive on-hand quantities.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QuantFilter {
    pub product_id: Option<ProductId>,
    pub lot_id: Option<LotId>,
    /// Empty means any usage.
    pub usages: Vec<LocationUsage>,
    pub require_lot: bool,
}

impl QuantFilter {
    pub fn for_lot(lot_id: LotId, usages: &[LocationUsage]) -> Self {
        Self {
            lot_id: Some(lot_id),
            usages: usages.to_vec(),
            ..Self::default()
        }
    }

    pub fn for_product_lots(product_id: ProductId, usages: &[LocationUsage]) -> Self {
        Self {
            product_id: Some(product_id),
            usages: usages.to_vec(),
            require_lot: true,
            ..Self::default()
        }
    }

    /// Positive quantity and every set criterion satisfied.
    pub fn matches(&self, quant: &StockQuant) -> bool {
        quant.quantity > 0.0
            && self.product_id.is_none_or(|p| p == quant.product_id)
            && self.lot_id.is_none_or(|l| quant.lot_id == Some(l))
            && (self.usages.is_empty() || self.usages.contains(&quant.location_usage))
            && (!self.require_lot || quant.lot_id.is_some())
    }
}

/// Host stock-quantity query.
///
/// Returns the positive quantities matching `filter`, in the order the host
/// registered them.
pub trait QuantQuery: Send + Sync {
    fn positive_quants(&self, filter: &QuantFilter) -> Vec<StockQuant>;
}

impl<Q> QuantQuery for Arc<Q>
where
    Q: QuantQuery + ?Sized,
{
    fn positive_quants(&self, filter: &QuantFilter) -> Vec<StockQuant> {
        (**self).positive_quants(filter)
    }
}

/// Most recent receipt. On equal receipt dates the later-registered quant wins.
pub fn latest_receipt<'a>(quants: impl IntoIterator<Item = &'a StockQuant>) -> Option<&'a StockQuant> {
    // `max_by_key` yields the last of several equal maxima.
    quants.into_iter().max_by_key(|q| q.in_date)
}

/// First receipt. On equal receipt dates the earlier-registered quant wins.
pub fn earliest_receipt<'a>(quants: impl IntoIterator<Item = &'a StockQuant>) -> Option<&'a StockQuant> {
    quants.into_iter().min_by_key(|q| q.in_date)
}

/// Customs number of the lot's latest positive receipt in `usages`.
///
/// `None` when the lot has no such quantity; `Some("")` when the latest
/// quantity carries no customs number.
pub fn customs_number_for_lot<Q: QuantQuery + ?Sized>(
    quants: &Q,
    lot_id: LotId,
    usages: &[LocationUsage],
) -> Option<String> {
    let found = quants.positive_quants(&QuantFilter::for_lot(lot_id, usages));
    latest_receipt(&found).map(|q| q.customs_number.clone().unwrap_or_default())
}

/// Lots with positive stock in internal locations, first-seen order.
pub fn available_lots<Q: QuantQuery + ?Sized>(quants: &Q, product_id: ProductId) -> Vec<LotId> {
    let mut lots: Vec<LotId> = Vec::new();
    for quant in quants.positive_quants(&QuantFilter::for_product_lots(product_id, &[LocationUsage::Internal])) {
        if let Some(lot_id) = quant.lot_id {
            if !lots.contains(&lot_id) {
                lots.push(lot_id);
            }
        }
    }
    lots
}
