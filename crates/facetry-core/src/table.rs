//! # Facet Table
//!
//! Per-instance mapping from [`Selector`] to [`FacetHandle`].
//!
//! Mutation happens in two phases:
//! 1. [`FacetTable::plan`] validates a whole cut batch against a staged view
//!    and produces the net list of [`TableChange`]s. Nothing is mutated.
//! 2. The registry commits the changes through its journal so that a later
//!    failure (e.g. the init hook) can undo them.
//!
//! A selector present in the table always maps to a non-null handle.

use crate::cut::{FacetCut, FacetCutAction};
use crate::{FacetHandle, RegistryError, Selector};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The net effect of a cut batch on one selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableChange {
    pub selector: Selector,
    /// Mapping before the batch.
    pub previous: Option<FacetHandle>,
    /// Mapping after the batch.
    pub next: Option<FacetHandle>,
}

/// Selector → facet mapping of one resolver instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetTable {
    entries: BTreeMap<Selector, FacetHandle>,
}

impl FacetTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Local mapping for a selector.
    #[must_use]
    pub fn get(&self, selector: Selector) -> Option<FacetHandle> {
        self.entries.get(&selector).copied()
    }

    /// Check for a local mapping.
    #[must_use]
    pub fn contains(&self, selector: Selector) -> bool {
        self.entries.contains_key(&selector)
    }

    /// Number of mapped selectors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing is mapped.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All mappings in selector order.
    pub fn iter(&self) -> impl Iterator<Item = (Selector, FacetHandle)> + '_ {
        self.entries.iter().map(|(s, f)| (*s, *f))
    }

    /// Selectors mapped to one facet, in selector order.
    #[must_use]
    pub fn selectors_of(&self, facet: FacetHandle) -> Vec<Selector> {
        self.iter()
            .filter(|(_, f)| *f == facet)
            .map(|(s, _)| s)
            .collect()
    }

    /// Mappings grouped by facet, in facet order.
    #[must_use]
    pub fn by_facet(&self) -> BTreeMap<FacetHandle, Vec<Selector>> {
        let mut groups: BTreeMap<FacetHandle, Vec<Selector>> = BTreeMap::new();
        for (selector, facet) in self.iter() {
            groups.entry(facet).or_default().push(selector);
        }
        groups
    }

    /// Validate a cut batch and compute its net changes.
    ///
    /// Cuts are evaluated in order against a staged view, so a later cut sees
    /// the effect of an earlier one (Add then Replace of the same selector is
    /// legal). The first violated precondition aborts the plan.
    ///
    /// Preconditions:
    /// - Add: every selector absent
    /// - Replace: every selector present, mapped to a different facet
    /// - Remove: every selector present, target is the null sentinel
    pub fn plan(&self, cuts: &[FacetCut]) -> Result<Vec<TableChange>, RegistryError> {
        let mut staged: BTreeMap<Selector, Option<FacetHandle>> = BTreeMap::new();

        for (index, cut) in cuts.iter().enumerate() {
            cut.validate_shape(index)?;

            for &selector in &cut.selectors {
                let existing = match staged.get(&selector) {
                    Some(pending) => *pending,
                    None => self.get(selector),
                };

                let next = match (cut.action, existing) {
                    (FacetCutAction::Add, Some(_)) => {
                        return Err(RegistryError::SelectorAlreadyMapped(selector));
                    }
                    (FacetCutAction::Add, None) => Some(cut.target),
                    (FacetCutAction::Replace | FacetCutAction::Remove, None) => {
                        return Err(RegistryError::SelectorNotMapped(selector));
                    }
                    (FacetCutAction::Replace, Some(current)) if current == cut.target => {
                        return Err(RegistryError::NoOpReplace {
                            selector,
                            facet: current,
                        });
                    }
                    (FacetCutAction::Replace, Some(_)) => Some(cut.target),
                    (FacetCutAction::Remove, Some(_)) => None,
                };
                staged.insert(selector, next);
            }
        }

        Ok(staged
            .into_iter()
            .filter_map(|(selector, next)| {
                let previous = self.get(selector);
                (previous != next).then_some(TableChange {
                    selector,
                    previous,
                    next,
                })
            })
            .collect())
    }

    /// Set or clear one mapping, returning the previous value.
    ///
    /// A `Some(FacetHandle::NULL)` value clears the mapping, keeping the
    /// non-null invariant.
    pub fn set(&mut self, selector: Selector, facet: Option<FacetHandle>) -> Option<FacetHandle> {
        match facet {
            Some(handle) if !handle.is_null() => self.entries.insert(selector, handle),
            _ => self.entries.remove(&selector),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sel(n: u32) -> Selector {
        Selector::from_u32(n)
    }

    fn facet(n: u64) -> FacetHandle {
        FacetHandle::from_low_u64(n)
    }

    fn commit(table: &mut FacetTable, cuts: &[FacetCut]) -> Result<(), RegistryError> {
        for change in table.plan(cuts)? {
            table.set(change.selector, change.next);
        }
        Ok(())
    }

    #[test]
    fn add_then_get() {
        let mut table = FacetTable::new();
        commit(&mut table, &[FacetCut::add(facet(1), vec![sel(1), sel(2)])]).expect("add");

        assert_eq!(table.get(sel(1)), Some(facet(1)));
        assert_eq!(table.get(sel(2)), Some(facet(1)));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn add_existing_rejected() {
        let mut table = FacetTable::new();
        commit(&mut table, &[FacetCut::add(facet(1), vec![sel(1)])]).expect("add");

        let result = table.plan(&[FacetCut::add(facet(2), vec![sel(1)])]);
        assert!(matches!(result, Err(RegistryError::SelectorAlreadyMapped(s)) if s == sel(1)));
    }

    #[test]
    fn replace_requires_presence_and_change() {
        let mut table = FacetTable::new();
        commit(&mut table, &[FacetCut::add(facet(1), vec![sel(1)])]).expect("add");

        assert!(matches!(
            table.plan(&[FacetCut::replace(facet(2), vec![sel(9)])]),
            Err(RegistryError::SelectorNotMapped(_))
        ));
        assert!(matches!(
            table.plan(&[FacetCut::replace(facet(1), vec![sel(1)])]),
            Err(RegistryError::NoOpReplace { .. })
        ));

        commit(&mut table, &[FacetCut::replace(facet(2), vec![sel(1)])]).expect("replace");
        assert_eq!(table.get(sel(1)), Some(facet(2)));
    }

    #[test]
    fn remove_clears_key() {
        let mut table = FacetTable::new();
        commit(&mut table, &[FacetCut::add(facet(1), vec![sel(1)])]).expect("add");
        commit(&mut table, &[FacetCut::remove(vec![sel(1)])]).expect("remove");

        assert!(!table.contains(sel(1)));
        assert!(table.is_empty());
    }

    #[test]
    fn plan_does_not_mutate_on_failure() {
        let mut table = FacetTable::new();
        commit(&mut table, &[FacetCut::add(facet(1), vec![sel(1)])]).expect("add");
        let before = table.clone();

        let result = table.plan(&[
            FacetCut::add(facet(2), vec![sel(2)]),
            FacetCut::add(facet(3), vec![sel(1)]),
        ]);

        assert!(result.is_err());
        assert_eq!(table, before);
    }

    #[test]
    fn later_cuts_see_earlier_ones() {
        let table = FacetTable::new();
        let changes = table
            .plan(&[
                FacetCut::add(facet(1), vec![sel(1)]),
                FacetCut::replace(facet(2), vec![sel(1)]),
            ])
            .expect("plan");

        assert_eq!(
            changes,
            vec![TableChange {
                selector: sel(1),
                previous: None,
                next: Some(facet(2)),
            }]
        );
    }

    #[test]
    fn add_then_remove_nets_to_nothing() {
        let table = FacetTable::new();
        let changes = table
            .plan(&[
                FacetCut::add(facet(1), vec![sel(1)]),
                FacetCut::remove(vec![sel(1)]),
            ])
            .expect("plan");
        assert!(changes.is_empty());
    }

    #[test]
    fn duplicate_selector_in_one_add_rejected() {
        let table = FacetTable::new();
        let result = table.plan(&[FacetCut::add(facet(1), vec![sel(1), sel(1)])]);
        assert!(matches!(result, Err(RegistryError::SelectorAlreadyMapped(_))));
    }

    #[test]
    fn by_facet_groups_selectors() {
        let mut table = FacetTable::new();
        commit(
            &mut table,
            &[
                FacetCut::add(facet(1), vec![sel(3), sel(1)]),
                FacetCut::add(facet(2), vec![sel(2)]),
            ],
        )
        .expect("add");

        let groups = table.by_facet();
        assert_eq!(groups.get(&facet(1)), Some(&vec![sel(1), sel(3)]));
        assert_eq!(groups.get(&facet(2)), Some(&vec![sel(2)]));
        assert_eq!(table.selectors_of(facet(2)), vec![sel(2)]);
    }
}
