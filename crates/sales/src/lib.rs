//! Sales orders and their slab lines.
//!
//! Sale lines carry the attribute bundle of the unit being sold, pick lots
//! from stock, and turn into fulfillment requests when the order is
//! confirmed. Pure domain logic; stock is read through [`QuantQuery`].
//!
//! [`QuantQuery`]: slabtrace_inventory::QuantQuery

pub mod line;
pub mod order;

pub use line::{SaleLineSettings, SaleOrderLine};
pub use order::{AddLine, SaleOrder, SaleOrderId, SaleOrderStatus};
