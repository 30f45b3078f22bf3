use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};

use std::sync::Arc;

use slabtrace_core::AttributeSet;
use slabtrace_fulfillment::{FulfillmentRequest, GroupingPolicy, NewFulfillmentRequest, Replenishment};
use slabtrace_infra::{FulfillmentConfig, FulfillmentService, InMemoryHost};
use slabtrace_products::{Product, ProductId, RouteRule, TrackingClassifier, TrackingMode};

/// A host with one tracked and one untracked buy-to-order product.
fn seeded_host() -> (Arc<InMemoryHost>, ProductId, ProductId) {
    let host = Arc::new(InMemoryHost::new());
    let slab = Product::new(ProductId::generate(), "MRB-CARRARA", "Carrara slab")
        .unwrap()
        .with_tracking(TrackingMode::Lot)
        .with_rule(RouteRule::buy_to_order());
    let grout = Product::new(ProductId::generate(), "GROUT-WHITE", "White grout")
        .unwrap()
        .with_rule(RouteRule::buy_to_order());
    let ids = (slab.id_typed(), grout.id_typed());
    host.register_product(slab);
    host.register_product(grout);
    (host, ids.0, ids.1)
}

/// `size` requests, every third one for the untracked product.
fn requests(host: &InMemoryHost, slab: ProductId, grout: ProductId, size: usize) -> Vec<FulfillmentRequest> {
    (0..size)
        .map(|i| {
            let product_id = if i % 3 == 0 { grout } else { slab };
            let attributes = AttributeSet::from_dimensions(1.0 + (i % 7) as f64 * 0.1, 0.8, 2.0)
                .unwrap()
                .with_lot_label("UYI");
            FulfillmentRequest::new(NewFulfillmentRequest {
                product_id,
                quantity: 1.0,
                uom: "Units".to_string(),
                location_id: host.stock_location(),
                name: "slab".to_string(),
                origin: format!("SO-BENCH/L{}", i + 1),
                company_id: host.company_id(),
                partner_id: None,
                order_group: Some("SO-BENCH".to_string()),
                attributes,
                lot_id: None,
                replenishment: Replenishment::Buy,
            })
            .unwrap()
        })
        .collect()
}

fn bench_partition(c: &mut Criterion) {
    let mut group = c.benchmark_group("partition");
    let (host, slab, grout) = seeded_host();
    let policy = GroupingPolicy::new(TrackingClassifier::new(host.clone()));

    for size in [10usize, 100, 1000].iter() {
        group.throughput(Throughput::Elements(*size as u64));
        let batch = requests(&host, slab, grout, *size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &batch, |b, batch| {
            b.iter(|| black_box(policy.partition(batch.clone())));
        });
    }

    group.finish();
}

fn bench_pipeline_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline_run");
    group.sample_size(20);

    for size in [10usize, 50].iter() {
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter_batched(
                || {
                    let (host, slab, grout) = seeded_host();
                    let batch = requests(&host, slab, grout, size);
                    (FulfillmentService::new(host, &FulfillmentConfig::default()), batch)
                },
                |(service, batch)| black_box(service.pipeline().run(batch)),
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

criterion_group!(benches, bench_partition, bench_pipeline_run);
criterion_main!(benches);
