//! Property-based enrichment: shared qualitative properties (chemical roles
//! and the like) instead of shared graph neighbors.

use super::config::EngineConfig;
use super::engine::CoalesceResult;
use super::enrichment::{Enrichment, EnrichmentKind};
use crate::stats::TailCache;
use crate::storage::PropertyStore;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

pub struct PropertyEnricher<'a> {
    store: &'a dyn PropertyStore,
    config: &'a EngineConfig,
    cache: TailCache,
}

impl<'a> PropertyEnricher<'a> {
    pub fn new(store: &'a dyn PropertyStore, config: &'a EngineConfig) -> Self {
        Self {
            store,
            config,
            cache: TailCache::new(config.tail_strategy),
        }
    }

    /// Properties shared by two or more of `pool` with `p < threshold`, best first
    ///
    /// `excluded` always loses; a non-empty `constraints` list is the only
    /// set of properties that may win.
    pub fn enrich(
        &mut self,
        pool: &[String],
        semantic_type: &str,
        excluded: &BTreeSet<String>,
        constraints: &[String],
        threshold: f64,
    ) -> CoalesceResult<Vec<Enrichment>> {
        if !self.config.property_semantic_types.contains(semantic_type) {
            debug!(semantic_type, "no property table for type");
            return Ok(Vec::new());
        }

        let mut seen = BTreeSet::new();
        let pool: Vec<&String> = pool.iter().filter(|c| seen.insert(c.as_str())).collect();
        let prefixes: BTreeSet<&str> = pool.iter().copied().map(|c| prefix(c)).collect();
        if pool.len() < 2 || prefixes.len() > 1 {
            debug!(pool = pool.len(), prefixes = prefixes.len(), "pool not eligible for property enrichment");
            return Ok(Vec::new());
        }

        let mut shared: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut draws = 0u64;
        for curie in &pool {
            let properties = self.store.get_properties(curie, semantic_type)?;
            if !properties.is_empty() {
                draws += 1;
            }
            for property in properties {
                shared.entry(property).or_default().push((*curie).clone());
            }
        }
        if shared.is_empty() {
            return Ok(Vec::new());
        }

        let population = match self.store.get_population(semantic_type)? {
            Some(p) if p > 0 => p as f64,
            other => {
                warn!(semantic_type, population = ?other, "no usable property population, skipping enrichment");
                return Ok(Vec::new());
            }
        };

        let mut winners = Vec::new();
        for (property, supporting) in shared {
            if supporting.len() < 2
                || excluded.contains(&property)
                || (!constraints.is_empty() && !constraints.contains(&property))
            {
                continue;
            }
            let x = supporting.len() as u64;
            let n = self.store.get_property_count(&property, semantic_type)?.unwrap_or(0);
            if n == 0 || (x as f64) < n as f64 * draws as f64 / population {
                continue;
            }
            let p_value = self.cache.upper_tail(x, population, n, draws);
            if p_value < threshold {
                winners.push(Enrichment {
                    p_value,
                    enriched_id: property,
                    predicate: None,
                    enriched_is_source: false,
                    draws,
                    population_hits: n,
                    population,
                    supporting,
                    enriched_types: Vec::new(),
                    kind: EnrichmentKind::Property,
                });
            }
        }
        winners.sort_by(|a, b| a.p_value.total_cmp(&b.p_value));
        Ok(winners)
    }
}

fn prefix(curie: &str) -> &str {
    curie.split_once(':').map_or(curie, |(p, _)| p)
}
