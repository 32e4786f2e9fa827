//! # Resolution Benchmarks
//!
//! Performance benchmarks for selector resolution and dispatch.
//!
//! Run with: `cargo bench -p facetry-core`

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use facetry_core::facets::ConstantFacet;
use facetry_core::{Address, FacetCut, FacetHandle, InstanceId, Registry, Selector};
use std::hint::black_box;
use std::sync::Arc;

const SELECTORS: u32 = 64;

/// Root with `SELECTORS` mapped selectors and a chain of `depth` clones.
///
/// Returns the registry and the deepest instance.
fn create_chain(depth: usize) -> (Registry, InstanceId) {
    let owner = Address::from_low_u64(1);
    let facet = FacetHandle::from_low_u64(1);
    let mut reg = Registry::new();
    reg.deploy_module(
        facet,
        Arc::new(ConstantFacet::new(Selector::from_u32(0), vec![1])),
    )
    .expect("deploy");

    let root = reg.create_instance(owner).expect("create");
    let selectors = (0..SELECTORS).map(Selector::from_u32).collect();
    reg.apply_cuts(root, &[FacetCut::add(facet, selectors)], None, owner)
        .expect("cut");

    let mut last = root;
    for _ in 0..depth {
        last = reg.clone_instance(last, owner).expect("clone");
    }
    (reg, last)
}

// =============================================================================
// BENCHMARKS
// =============================================================================

fn bench_resolve_depth(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve_depth");

    for depth in [0, 1, 4, 16, 64] {
        let (reg, leaf) = create_chain(depth);
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, _| {
            b.iter(|| reg.resolve(black_box(leaf), black_box(Selector::from_u32(SELECTORS / 2))));
        });
    }

    group.finish();
}

fn bench_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch");
    let caller = Address::from_low_u64(2);
    let args: &[u8] = &[];

    for depth in [0, 16] {
        let (mut reg, leaf) = create_chain(depth);
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, _| {
            b.iter(|| {
                reg.dispatch(
                    black_box(leaf),
                    Selector::from_u32(0),
                    black_box(args),
                    caller,
                )
            });
        });
    }

    group.finish();
}

fn bench_cut_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("cut_batch");
    let owner = Address::from_low_u64(1);
    let facet = FacetHandle::from_low_u64(1);

    for size in [16u32, 256, 1024] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let (mut reg, _) = create_chain(0);
                let child = reg.clone_instance(InstanceId(0), owner).expect("clone");
                let selectors = (0..size).map(Selector::from_u32).collect();
                reg.apply_cuts(child, &[FacetCut::add(facet, selectors)], None, owner)
                    .expect("cut");
                black_box(reg)
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_resolve_depth, bench_dispatch, bench_cut_batch);
criterion_main!(benches);
