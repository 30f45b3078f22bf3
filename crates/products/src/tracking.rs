//! Tracked-vs-fungible classification.

use slabtrace_core::{DomainError, DomainResult};

use crate::catalog::ProductCatalog;
use crate::product::ProductId;

/// Decides whether a product's units are individually tracked.
///
/// Tracked units carry their own attributes and must never be merged with
/// other units of the same product.
#[derive(Debug, Clone)]
pub struct TrackingClassifier<C> {
    catalog: C,
}

impl<C: ProductCatalog> TrackingClassifier<C> {
    pub fn new(catalog: C) -> Self {
        Self { catalog }
    }

    /// `true` when the product's tracking mode is anything but `none`.
    ///
    /// An unknown product is an input error, never a silent `false`.
    pub fn is_tracked(&self, product_id: ProductId) -> DomainResult<bool> {
        let product = self
            .catalog
            .product(product_id)
            .ok_or_else(|| DomainError::not_found(format!("product {product_id}")))?;

        let tracked = product.tracking().is_tracked();
        tracing::trace!(product = %product.name(), tracked, "classified product");
        Ok(tracked)
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryCatalog;
    use crate::product::{Product, TrackingMode};
    use proptest::prelude::*;
    use std::sync::Arc;

    fn catalog_with(tracking: TrackingMode) -> (Arc<InMemoryCatalog>, ProductId) {
        let catalog = Arc::new(InMemoryCatalog::new());
        let id = ProductId::generate();
        catalog.register(
            Product::new(id, "SKU-1", "Slab")
                .unwrap()
                .with_tracking(tracking),
        );
        (catalog, id)
    }

    #[test]
    fn serial_product_is_tracked() {
        let (catalog, id) = catalog_with(TrackingMode::Serial);
        let classifier = TrackingClassifier::new(catalog);
        assert!(classifier.is_tracked(id).unwrap());
    }

    #[test]
    fn fungible_product_is_not_tracked() {
        let (catalog, id) = catalog_with(TrackingMode::None);
        let classifier = TrackingClassifier::new(catalog);
        assert!(!classifier.is_tracked(id).unwrap());
    }

    #[test]
    fn unknown_product_is_an_input_error() {
        let (catalog, _) = catalog_with(TrackingMode::Lot);
        let classifier = TrackingClassifier::new(catalog);
        let err = classifier.is_tracked(ProductId::generate()).unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
        assert!(err.is_input_error());
    }

    proptest! {
        /// Property: classification agrees with the tracking mode and is stable.
        #[test]
        fn classification_matches_mode(mode in prop_oneof![
            Just(TrackingMode::None),
            Just(TrackingMode::Lot),
            Just(TrackingMode::Serial),
        ]) {
            let (catalog, id) = catalog_with(mode);
            let classifier = TrackingClassifier::new(catalog);
            let first = classifier.is_tracked(id).unwrap();
            prop_assert_eq!(first, mode != TrackingMode::None);
            prop_assert_eq!(classifier.is_tracked(id).unwrap(), first);
        }
    }
}
