//! Purchasing domain module (purchase orders and their lines).
//!
//! Pure domain logic: line payloads, the native merge of a payload into an
//! existing line, and the per-line receipt naming. Persistence belongs to the
//! host platform.

pub mod line;
pub mod order;

pub use line::{PurchaseLine, PurchaseLineId, PurchaseLinePayload};
pub use order::{PurchaseOrder, PurchaseOrderId, PurchaseOrderStatus};
