//! Properties that must hold for every input

use answer_coalesce::stats::TailCache;
use answer_coalesce::{Opportunity, TailStrategy};
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

/// Answer index -> one to three distinct curies drawn from a small pool
fn answers() -> impl Strategy<Value = BTreeMap<usize, Vec<String>>> {
    prop::collection::btree_map(
        0usize..40,
        prop::collection::btree_set(0u32..30, 1..=3)
            .prop_map(|ids| ids.into_iter().map(|i| format!("NCBIGene:{}", i)).collect::<Vec<_>>()),
        1..12,
    )
}

fn strategy() -> impl Strategy<Value = TailStrategy> {
    prop_oneof![Just(TailStrategy::Poisson), Just(TailStrategy::Hypergeometric)]
}

proptest! {
    #[test]
    fn filter_with_every_curie_is_noop(map in answers()) {
        let opportunity = Opportunity::new("h", "qg_0", "biolink:Gene", map).unwrap();
        let all: BTreeSet<String> = opportunity.kg_ids().iter().cloned().collect();
        let filtered = opportunity.filter(&all).unwrap();
        prop_assert_eq!(filtered.kg_ids(), opportunity.kg_ids());
        prop_assert_eq!(filtered.answer_indices(), opportunity.answer_indices());
    }

    #[test]
    fn dropping_one_curie_drops_whole_answers(map in answers(), pick in any::<prop::sample::Index>()) {
        let opportunity = Opportunity::new("h", "qg_0", "biolink:Gene", map.clone()).unwrap();
        let removed = pick.get(opportunity.kg_ids()).clone();
        let keep: BTreeSet<String> = opportunity.kg_ids().iter().filter(|c| **c != removed).cloned().collect();

        let surviving: Vec<usize> = opportunity
            .filter(&keep)
            .map(|o| o.answer_indices().to_vec())
            .unwrap_or_default();
        for (index, curies) in &map {
            prop_assert_eq!(surviving.contains(index), !curies.contains(&removed));
        }
    }

    #[test]
    fn p_value_grows_as_observations_shrink(
        strategy in strategy(),
        population in 100u64..50_000,
        successes in 1u64..100,
        draws in 1u64..100,
        x in 1u64..20,
    ) {
        let mut cache = TailCache::new(strategy);
        let population = population as f64;
        let fewer = cache.upper_tail(x, population, successes, draws);
        let more = cache.upper_tail(x + 1, population, successes, draws);
        // allow last-bit noise from the incomplete gamma evaluation
        prop_assert!(fewer * (1.0 + 1e-9) >= more, "P(X>={}) = {} < P(X>={}) = {}", x, fewer, x + 1, more);
        prop_assert!((0.0..=1.0).contains(&fewer));
    }
}
