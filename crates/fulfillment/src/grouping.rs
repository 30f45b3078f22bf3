//! Partitioning of a request batch into mergeable and singleton groups.

use thiserror::Error;
use tracing::{debug, info, warn};

use slabtrace_core::{CompanyId, DomainError, LocationId, PartnerId};
use slabtrace_products::{ProductCatalog, ProductId, TrackingClassifier};

use crate::request::{FulfillmentRequest, RequestId};

/// Why the tracking mode of a request could not be determined.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClassificationError {
    #[error("request {request}: unknown product {product}")]
    UnknownProduct { request: RequestId, product: ProductId },

    #[error("request {request}: {source}")]
    Catalog {
        request: RequestId,
        #[source]
        source: DomainError,
    },
}

/// Fields on which the host merges demand for fungible products.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MergeKey {
    pub product_id: ProductId,
    pub location_id: LocationId,
    pub company_id: CompanyId,
    pub partner_id: Option<PartnerId>,
    pub order_group: Option<String>,
}

impl MergeKey {
    pub fn of(request: &FulfillmentRequest) -> Self {
        Self {
            product_id: request.product_id(),
            location_id: request.location_id(),
            company_id: request.company_id(),
            partner_id: request.partner_id(),
            order_group: request.order_group().map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SingletonReason {
    Tracked,
    ClassificationFailed,
}

/// Requests the host may process together.
#[derive(Debug, Clone, PartialEq)]
pub enum Group {
    /// Processed alone; the host must create fresh records for it.
    Singleton {
        request: FulfillmentRequest,
        reason: SingletonReason,
    },
    /// Untracked requests sharing a merge key (possibly just one).
    Mergeable {
        key: MergeKey,
        requests: Vec<FulfillmentRequest>,
    },
}

impl Group {
    pub fn requests(&self) -> &[FulfillmentRequest] {
        match self {
            Group::Singleton { request, .. } => std::slice::from_ref(request),
            Group::Mergeable { requests, .. } => requests,
        }
    }

    pub fn request_ids(&self) -> Vec<RequestId> {
        self.requests().iter().map(FulfillmentRequest::id).collect()
    }

    pub fn len(&self) -> usize {
        self.requests().len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests().is_empty()
    }

    pub fn is_singleton(&self) -> bool {
        matches!(self, Group::Singleton { .. })
    }

    /// The host's "reuse an existing line" shortcut must not be honored.
    pub fn forbids_reuse(&self) -> bool {
        self.is_singleton()
    }
}

/// Splits batches so that tracked units are never combined.
#[derive(Debug, Clone)]
pub struct GroupingPolicy<C> {
    classifier: TrackingClassifier<C>,
}

impl<C: ProductCatalog> GroupingPolicy<C> {
    pub fn new(classifier: TrackingClassifier<C>) -> Self {
        Self { classifier }
    }

    pub fn classifier(&self) -> &TrackingClassifier<C> {
        &self.classifier
    }

    pub fn classify(&self, request: &FulfillmentRequest) -> Result<bool, ClassificationError> {
        self.classifier
            .is_tracked(request.product_id())
            .map_err(|source| match source {
                DomainError::NotFound(_) => ClassificationError::UnknownProduct {
                    request: request.id(),
                    product: request.product_id(),
                },
                source => ClassificationError::Catalog {
                    request: request.id(),
                    source,
                },
            })
    }

    /// Partition `requests` in first-appearance order.
    ///
    /// Tracked requests always form their own group, whatever they share with
    /// other requests. Untracked requests are grouped by [`MergeKey`]. A
    /// request that cannot be classified is logged and isolated.
    pub fn partition(&self, requests: Vec<FulfillmentRequest>) -> Vec<Group> {
        let mut groups: Vec<Group> = Vec::with_capacity(requests.len());

        for request in requests {
            match self.classify(&request) {
                Ok(true) => {
                    info!(request_id = %request.id(), origin = %request.origin(), "tracked request routed to its own group");
                    groups.push(Group::Singleton {
                        request,
                        reason: SingletonReason::Tracked,
                    });
                }
                Ok(false) => {
                    let key = MergeKey::of(&request);
                    let existing = groups.iter_mut().find_map(|group| match group {
                        Group::Mergeable { key: k, requests } if *k == key => Some(requests),
                        _ => None,
                    });
                    match existing {
                        Some(members) => {
                            debug!(request_id = %request.id(), "request joins existing merge group");
                            members.push(request);
                        }
                        None => groups.push(Group::Mergeable {
                            key,
                            requests: vec![request],
                        }),
                    }
                }
                Err(err) => {
                    warn!(error = %err, "classification failed, isolating request");
                    groups.push(Group::Singleton {
                        request,
                        reason: SingletonReason::ClassificationFailed,
                    });
                }
            }
        }

        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::tests::input;
    use proptest::prelude::*;
    use slabtrace_products::{InMemoryCatalog, Product, TrackingMode};
    use std::sync::Arc;

    fn catalog() -> (Arc<InMemoryCatalog>, ProductId, ProductId) {
        let catalog = Arc::new(InMemoryCatalog::new());
        let tracked = ProductId::generate();
        let plain = ProductId::generate();
        catalog.register(
            Product::new(tracked, "MRB-CARRARA", "Carrara slab")
                .unwrap()
                .with_tracking(TrackingMode::Serial),
        );
        catalog.register(Product::new(plain, "ADH-01", "Adhesive").unwrap());
        (catalog, tracked, plain)
    }

    fn policy(catalog: Arc<InMemoryCatalog>) -> GroupingPolicy<Arc<InMemoryCatalog>> {
        GroupingPolicy::new(TrackingClassifier::new(catalog))
    }

    /// Requests that differ only by origin share every merge-key field.
    fn same_key_requests(product_id: ProductId, n: usize) -> Vec<FulfillmentRequest> {
        let template = input(product_id, "SO001/L0");
        (0..n)
            .map(|i| {
                let mut i_input = template.clone();
                i_input.origin = format!("SO001/L{}", i + 1);
                FulfillmentRequest::new(i_input).unwrap()
            })
            .collect()
    }

    #[test]
    fn untracked_requests_with_same_key_form_one_group() {
        let (catalog, _, plain) = catalog();
        let groups = policy(catalog).partition(same_key_requests(plain, 2));

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 2);
        assert!(!groups[0].forbids_reuse());
    }

    #[test]
    fn tracked_requests_are_never_grouped() {
        let (catalog, tracked, _) = catalog();
        let groups = policy(catalog).partition(same_key_requests(tracked, 3));

        assert_eq!(groups.len(), 3);
        for group in &groups {
            match group {
                Group::Singleton { reason, .. } => assert_eq!(*reason, SingletonReason::Tracked),
                _ => panic!("Expected singleton group for tracked request"),
            }
        }
    }

    #[test]
    fn unknown_product_degrades_to_singleton_and_batch_continues() {
        let (catalog, _, plain) = catalog();
        let unknown = FulfillmentRequest::new(input(ProductId::generate(), "SO9/L1")).unwrap();
        let mut batch = vec![unknown.clone()];
        batch.extend(same_key_requests(plain, 2));

        let groups = policy(catalog).partition(batch);

        assert_eq!(groups.len(), 2);
        match &groups[0] {
            Group::Singleton { request, reason } => {
                assert_eq!(request.id(), unknown.id());
                assert_eq!(*reason, SingletonReason::ClassificationFailed);
            }
            _ => panic!("Expected singleton for unclassifiable request"),
        }
        assert_eq!(groups[1].len(), 2);
    }

    #[test]
    fn classify_maps_missing_product() {
        let (catalog, _, _) = catalog();
        let request = FulfillmentRequest::new(input(ProductId::generate(), "SO9/L1")).unwrap();
        match policy(catalog).classify(&request).unwrap_err() {
            ClassificationError::UnknownProduct { request: id, .. } => assert_eq!(id, request.id()),
            other => panic!("Expected UnknownProduct, got {other:?}"),
        }
    }

    #[test]
    fn groups_follow_first_appearance() {
        let (catalog, tracked, plain) = catalog();
        let mut plain_a = same_key_requests(plain, 2);
        let t = FulfillmentRequest::new(input(tracked, "SO001/L9")).unwrap();
        let second_plain = plain_a.pop().unwrap();
        let first_plain = plain_a.pop().unwrap();

        let groups = policy(catalog).partition(vec![first_plain.clone(), t.clone(), second_plain.clone()]);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].request_ids(), vec![first_plain.id(), second_plain.id()]);
        assert_eq!(groups[1].request_ids(), vec![t.id()]);
    }

    #[test]
    fn differing_partner_splits_untracked_groups() {
        let (catalog, _, plain) = catalog();
        let mut requests = same_key_requests(plain, 2);
        let mut other = input(plain, "SO002/L1");
        other.partner_id = Some(PartnerId::new());
        other.company_id = requests[0].company_id();
        other.location_id = requests[0].location_id();
        requests.push(FulfillmentRequest::new(other).unwrap());

        let groups = policy(catalog).partition(requests);
        assert_eq!(groups.len(), 2);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 64,
            ..ProptestConfig::default()
        })]

        /// Property: no group ever holds more than one tracked request, and
        /// every request lands in exactly one group.
        #[test]
        fn tracked_requests_never_share_a_group(kinds in proptest::collection::vec(any::<bool>(), 0..24)) {
            let (catalog, tracked, plain) = catalog();
            let template = input(plain, "SO001/L0");
            let requests: Vec<FulfillmentRequest> = kinds
                .iter()
                .enumerate()
                .map(|(i, is_tracked)| {
                    let mut r = template.clone();
                    r.product_id = if *is_tracked { tracked } else { plain };
                    r.origin = format!("SO001/L{i}");
                    FulfillmentRequest::new(r).unwrap()
                })
                .collect();
            let expected: Vec<RequestId> = requests.iter().map(FulfillmentRequest::id).collect();

            let groups = policy(catalog).partition(requests);

            let mut seen: Vec<RequestId> = Vec::new();
            for group in &groups {
                let tracked_members = group.requests().iter().filter(|r| r.product_id() == tracked).count();
                prop_assert!(tracked_members <= 1);
                if tracked_members == 1 {
                    prop_assert_eq!(group.len(), 1);
                }
                seen.extend(group.request_ids());
            }
            seen.sort();
            let mut expected = expected;
            expected.sort();
            prop_assert_eq!(seen, expected);
        }
    }
}
