//! `slabtrace-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives shared by every fulfillment
//! module (no infrastructure concerns).

pub mod attributes;
pub mod entity;
pub mod error;
pub mod id;
pub mod value_object;

pub use attributes::{AttributeSet, PartialAttributes};
pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{CompanyId, LocationId, PartnerId, RecordId};
pub use value_object::ValueObject;
