//! # Property-Based Tests
//!
//! Batch atomicity, shadowing and determinism over random selector sets.

use facetry_core::facets::ConstantFacet;
use facetry_core::{
    Address, FacetCut, FacetHandle, InstanceId, Registry, Selector, snapshot_from_bytes,
    snapshot_to_bytes,
};
use proptest::collection::btree_set;
use proptest::prelude::*;
use std::sync::Arc;

// =============================================================================
// FIXTURES
// =============================================================================

const PARENT_FACET: u64 = 1;
const CHILD_FACET: u64 = 2;

fn owner() -> Address {
    Address::from_low_u64(7)
}

fn registry() -> Registry {
    let mut reg = Registry::new();
    for n in [PARENT_FACET, CHILD_FACET] {
        reg.deploy_module(
            FacetHandle::from_low_u64(n),
            Arc::new(ConstantFacet::new(Selector::from_u32(0), vec![n as u8])),
        )
        .expect("deploy");
    }
    reg
}

fn selectors(raw: &std::collections::BTreeSet<u32>) -> Vec<Selector> {
    raw.iter().copied().map(Selector::from_u32).collect()
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    /// Every selector added to the root resolves from a clone, and only those.
    #[test]
    fn clone_sees_exactly_parent_mapping(
        mapped in btree_set(any::<u32>(), 1..40),
        candidate in any::<u32>(),
    ) {
        let mut reg = registry();
        let root = reg.create_instance(owner()).expect("create");
        reg.apply_cuts(
            root,
            &[FacetCut::add(FacetHandle::from_low_u64(PARENT_FACET), selectors(&mapped))],
            None,
            owner(),
        ).expect("cut");
        let child = reg.clone_instance(root, owner()).expect("clone");

        for &raw in &mapped {
            prop_assert_eq!(
                reg.resolve(child, Selector::from_u32(raw)).expect("resolve"),
                FacetHandle::from_low_u64(PARENT_FACET)
            );
        }
        prop_assert_eq!(
            reg.resolve(child, Selector::from_u32(candidate)).is_ok(),
            mapped.contains(&candidate)
        );
    }

    /// Shadow then unshadow returns resolution to the parent's facet.
    #[test]
    fn shadow_and_unshadow(
        mapped in btree_set(any::<u32>(), 1..30),
    ) {
        let mut reg = registry();
        let root = reg.create_instance(owner()).expect("create");
        let sels = selectors(&mapped);
        reg.apply_cuts(
            root,
            &[FacetCut::add(FacetHandle::from_low_u64(PARENT_FACET), sels.clone())],
            None,
            owner(),
        ).expect("cut");
        let child = reg.clone_instance(root, owner()).expect("clone");

        reg.apply_cuts(
            child,
            &[FacetCut::add(FacetHandle::from_low_u64(CHILD_FACET), sels.clone())],
            None,
            owner(),
        ).expect("shadow");
        for s in &sels {
            prop_assert_eq!(
                reg.resolve(child, *s).expect("resolve"),
                FacetHandle::from_low_u64(CHILD_FACET)
            );
        }

        reg.apply_cuts(child, &[FacetCut::remove(sels.clone())], None, owner())
            .expect("unshadow");
        for s in &sels {
            prop_assert_eq!(
                reg.resolve(child, *s).expect("resolve"),
                FacetHandle::from_low_u64(PARENT_FACET)
            );
        }
    }

    /// A batch that fails anywhere leaves the registry byte-identical.
    #[test]
    fn failed_batch_changes_nothing(
        existing in btree_set(any::<u32>(), 1..20),
        fresh in btree_set(any::<u32>(), 1..20),
    ) {
        let mut reg = registry();
        let root = reg.create_instance(owner()).expect("create");
        reg.apply_cuts(
            root,
            &[FacetCut::add(FacetHandle::from_low_u64(PARENT_FACET), selectors(&existing))],
            None,
            owner(),
        ).expect("cut");
        let before = snapshot_to_bytes(&reg.snapshot()).expect("encode");

        // The last cut re-adds a selector that is already mapped.
        let clash = existing.first().copied().map(Selector::from_u32).expect("non-empty");
        let fresh: Vec<Selector> = selectors(&fresh)
            .into_iter()
            .filter(|s| !existing.contains(&s.to_u32()))
            .collect();
        let mut batch = Vec::new();
        if !fresh.is_empty() {
            batch.push(FacetCut::add(FacetHandle::from_low_u64(CHILD_FACET), fresh));
        }
        batch.push(FacetCut::add(FacetHandle::from_low_u64(CHILD_FACET), vec![clash]));

        prop_assert!(reg.apply_cuts(root, &batch, None, owner()).is_err());
        let after = snapshot_to_bytes(&reg.snapshot()).expect("encode");
        prop_assert_eq!(before, after);
    }

    /// Identical operation sequences produce identical snapshots.
    #[test]
    fn determinism(
        mapped in btree_set(any::<u32>(), 1..30),
        clones in 0usize..5,
    ) {
        let build = || {
            let mut reg = registry();
            let mut last = reg.create_instance(owner()).expect("create");
            reg.apply_cuts(
                last,
                &[FacetCut::add(FacetHandle::from_low_u64(PARENT_FACET), selectors(&mapped))],
                None,
                owner(),
            ).expect("cut");
            for _ in 0..clones {
                last = reg.clone_instance(last, owner()).expect("clone");
            }
            snapshot_to_bytes(&reg.snapshot()).expect("encode")
        };

        let first = build();
        prop_assert_eq!(&first, &build());

        let decoded = snapshot_from_bytes(&first).expect("decode");
        prop_assert_eq!(decoded.instances.len(), clones + 1);
        prop_assert_eq!(decoded.instances[clones].id, InstanceId(clones as u64));
    }
}
