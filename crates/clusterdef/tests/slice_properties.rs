//! Property tests for slice parsing and index resolution

use clusterdef::{IndexedCollection, SliceSpec};
use clusterdef_types::{compose_run_lists, AttributeStore, Placement, RunList};
use proptest::prelude::*;
use serde_json::Value;
use std::collections::BTreeSet;

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

/// `lo-hi` or a bare index, as a user would type it
fn arb_token() -> impl Strategy<Value = (String, u32, u32)> {
    prop_oneof![
        (0u32..40).prop_map(|i| (i.to_string(), i, i)),
        (0u32..40, 0u32..40).prop_map(|(lo, hi)| (format!("{lo}-{hi}"), lo, hi)),
    ]
}

fn arb_placement() -> impl Strategy<Value = Placement> {
    prop_oneof![
        Just(Placement::First),
        Just(Placement::Normal),
        Just(Placement::Last),
    ]
}

fn resolve(collection: &mut IndexedCollection<u32>, spec: &SliceSpec) -> Vec<u32> {
    collection.resolve_with(spec, |index, _| index)
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn prop_text_slice_matches_interval_union(
        instances in 0u32..20,
        tokens in prop::collection::vec(arb_token(), 1..5),
    ) {
        let text = tokens.iter().map(|(t, _, _)| t.as_str()).collect::<Vec<_>>().join(",");
        let spec = SliceSpec::parse(&text).unwrap();
        let mut servers = IndexedCollection::new(instances);

        let expected: Vec<u32> = (0..instances)
            .filter(|i| tokens.iter().any(|(_, lo, hi)| lo <= i && i <= hi))
            .collect();
        prop_assert_eq!(resolve(&mut servers, &spec), expected);
        // text ranges never create out-of-range entries
        prop_assert!(servers.iter().all(|(i, _)| i < instances));
    }

    #[test]
    fn prop_list_slice_is_sorted_dedup_and_never_creates_bogus(
        instances in 0u32..20,
        list in prop::collection::vec(0u32..40, 1..10),
    ) {
        let mut servers = IndexedCollection::new(instances);
        let got = resolve(&mut servers, &SliceSpec::Indexes(list.clone()));

        let expected: Vec<u32> = list
            .iter()
            .copied()
            .filter(|i| *i < instances)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        prop_assert_eq!(got, expected);
        prop_assert!(servers.iter().all(|(i, _)| servers.is_valid(i)));
    }

    #[test]
    fn prop_single_index_always_materializes(instances in 0u32..20, index in 0u32..60) {
        let mut servers = IndexedCollection::new(instances);
        let got = resolve(&mut servers, &SliceSpec::Index(index));
        prop_assert_eq!(got, vec![index]);
        prop_assert!(servers.contains(index));
        prop_assert_eq!(servers.valid_indexes(), (0..instances).collect::<Vec<_>>());
        prop_assert!(servers.indexes().contains(&index));
    }

    #[test]
    fn prop_garbage_tokens_are_rejected(word in "[a-z]{1,6}") {
        prop_assert!(SliceSpec::parse(&word).is_err());
    }

    #[test]
    fn prop_run_list_is_grouped_by_placement_then_rank(
        adds in prop::collection::vec(("[a-e]", arb_placement()), 1..20),
    ) {
        let mut run_list = RunList::new();
        for (rank, (item, placement)) in adds.iter().enumerate() {
            run_list.add(format!("role[{item}]"), *placement, rank as u64 + 1);
        }

        let ordered = run_list.ordered();
        let unique: BTreeSet<&String> = ordered.iter().collect();
        prop_assert_eq!(unique.len(), ordered.len());

        let classes: Vec<Placement> = ordered
            .iter()
            .map(|item| run_list.get(item).map(|e| e.placement).unwrap_or_default())
            .collect();
        let mut sorted = classes.clone();
        sorted.sort();
        prop_assert_eq!(classes, sorted);
    }

    #[test]
    fn prop_composition_keeps_first_occurrence(
        levels in prop::collection::vec(prop::collection::vec("[a-f]", 0..6), 1..4),
    ) {
        let composed = compose_run_lists(levels.clone());
        let mut seen = BTreeSet::new();
        let expected: Vec<String> = levels
            .into_iter()
            .flatten()
            .filter(|item| seen.insert(item.clone()))
            .collect();
        prop_assert_eq!(composed, expected);
    }

    #[test]
    fn prop_reverse_merge_never_overwrites(
        own in prop::collection::btree_map("[a-d]", 0i64..100, 0..4),
        parent in prop::collection::btree_map("[a-d]", 0i64..100, 0..4),
    ) {
        let mut child = AttributeStore::new();
        for (k, v) in &own {
            child.set(k.as_str(), *v);
        }
        let mut base = AttributeStore::new();
        for (k, v) in &parent {
            base.set(k.as_str(), *v);
        }

        child.reverse_merge(&base);
        for (k, v) in &own {
            prop_assert_eq!(child.get(k), Some(&Value::from(*v)));
        }
        for (k, v) in &parent {
            if !own.contains_key(k) {
                prop_assert_eq!(child.get(k), Some(&Value::from(*v)));
            }
        }
    }
}
