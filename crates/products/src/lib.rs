//! Product domain module.
//!
//! Product metadata the fulfillment pipeline consults: how units are tracked
//! and how the product is replenished. Catalog maintenance itself belongs to
//! the host platform.

pub mod catalog;
pub mod product;
pub mod reference;
pub mod tracking;

pub use catalog::{InMemoryCatalog, ProductCatalog};
pub use product::{ProcureMethod, Product, ProductId, RouteRule, RuleAction, TrackingMode};
pub use reference::BackReference;
pub use tracking::TrackingClassifier;
