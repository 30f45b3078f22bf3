//! Back-reference key linking downstream records to the demand that caused them.

use serde::{Deserialize, Serialize};

use crate::product::ProductId;

/// Product + origin document reference.
///
/// Unique per sale line, so after the host has created (or merged) records the
/// pipeline can find exactly the ones a given demand produced.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BackReference {
    pub product_id: ProductId,
    pub origin: String,
}

impl BackReference {
    pub fn new(product_id: ProductId, origin: impl Into<String>) -> Self {
        Self {
            product_id,
            origin: origin.into(),
        }
    }
}

impl core::fmt::Display for BackReference {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}@{}", self.product_id, self.origin)
    }
}
