//! Graph-based enrichment
//!
//! Inverts the candidates' link lists, keeps links shared by two or more
//! candidates, and scores each by how surprising that sharing is given how
//! common the link is in the whole population.

use super::config::EngineConfig;
use super::engine::CoalesceResult;
use super::opportunity::satisfies;
use crate::graph::{Link, PredicateSpec};
use crate::stats::TailCache;
use crate::storage::LookupStore;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// Which engine produced an enrichment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrichmentKind {
    Graph,
    Property,
}

impl EnrichmentKind {
    /// Value of the study-method attribute on patches
    pub fn method_name(self) -> &'static str {
        match self {
            Self::Graph => "graph_enrichment",
            Self::Property => "property_enrichment",
        }
    }
}

/// One statistically enriched neighbor or property
#[derive(Debug, Clone, PartialEq)]
pub struct Enrichment {
    pub p_value: f64,
    /// Neighbor curie for graph enrichment, property name for property enrichment
    pub enriched_id: String,
    /// Link predicate; `None` for properties
    pub predicate: Option<PredicateSpec>,
    /// Whether the enriched entity is the subject of the member edges
    pub enriched_is_source: bool,
    pub draws: u64,
    pub population_hits: u64,
    pub population: f64,
    /// Candidates sharing the link or property, in pool order
    pub supporting: Vec<String>,
    pub enriched_types: Vec<String>,
    pub kind: EnrichmentKind,
}

/// Which links may take part in a graph enrichment
#[derive(Debug, Clone, Default)]
pub struct LinkFilter {
    excluded_predicates: BTreeSet<String>,
    allowed: Vec<PredicateSpec>,
    member_is_subject: Option<bool>,
    excluded_entities: BTreeSet<String>,
    answer_type: Option<String>,
}

impl LinkFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn excluding_predicates(mut self, predicates: BTreeSet<String>) -> Self {
        self.excluded_predicates = predicates;
        self
    }

    /// Only links satisfying one of these constraints count
    pub fn allowing(mut self, constraints: Vec<PredicateSpec>) -> Self {
        self.allowed = constraints;
        self
    }

    /// Members must sit on this side of the edge, unless the predicate is symmetric
    pub fn with_member_orientation(mut self, member_is_subject: bool) -> Self {
        self.member_is_subject = Some(member_is_subject);
        self
    }

    pub fn excluding_entities(mut self, entities: impl IntoIterator<Item = String>) -> Self {
        self.excluded_entities.extend(entities);
        self
    }

    pub fn with_answer_type(mut self, answer_type: Option<String>) -> Self {
        self.answer_type = answer_type;
        self
    }

    fn accepts(&self, link: &Link, config: &EngineConfig) -> bool {
        let predicate = link.predicate.predicate();
        if self.excluded_predicates.contains(predicate) {
            return false;
        }
        if self.excluded_entities.contains(&link.other) || config.generic_concepts.contains(&link.other) {
            return false;
        }
        if let Some(member_is_subject) = self.member_is_subject {
            if link.is_source != member_is_subject && !config.is_symmetric(predicate) {
                return false;
            }
        }
        self.allowed.is_empty() || self.allowed.iter().any(|c| satisfies(&link.predicate, c))
    }

    fn accepts_types(&self, types: &[String]) -> bool {
        match &self.answer_type {
            Some(wanted) => types.iter().any(|t| t == wanted),
            None => true,
        }
    }
}

/// Shared-neighbor enrichment over a [`LookupStore`]
///
/// Owns the tail cache for one run; build a fresh enricher per request.
pub struct GraphEnricher<'a> {
    store: &'a dyn LookupStore,
    config: &'a EngineConfig,
    cache: TailCache,
}

type LinkKey = (String, PredicateSpec, bool);

impl<'a> GraphEnricher<'a> {
    pub fn new(store: &'a dyn LookupStore, config: &'a EngineConfig) -> Self {
        Self {
            store,
            config,
            cache: TailCache::new(config.tail_strategy),
        }
    }

    pub fn cache(&self) -> &TailCache {
        &self.cache
    }

    /// Enrichments with `p < threshold` for `pool`, best first
    pub fn enrich(
        &mut self,
        pool: &[String],
        semantic_type: &str,
        filter: &LinkFilter,
        threshold: f64,
    ) -> CoalesceResult<Vec<Enrichment>> {
        let mut seen = BTreeSet::new();
        let pool: Vec<String> = pool.iter().filter(|c| seen.insert(c.as_str())).cloned().collect();
        if pool.len() < 2 {
            return Ok(Vec::new());
        }

        let population = match self.store.get_population(semantic_type)? {
            Some(p) if p > 0.0 && p.is_finite() => p,
            other => {
                warn!(semantic_type, population = ?other, "no usable population, skipping enrichment");
                return Ok(Vec::new());
            }
        };

        let members: BTreeSet<&str> = pool.iter().map(String::as_str).collect();
        let link_lists = self.store.get_links_batch(&pool)?;

        // (enriched, predicate, enriched_is_source) -> supporters in pool order;
        // symmetric links are grouped as if every member were the subject
        let mut shared: BTreeMap<LinkKey, Vec<String>> = BTreeMap::new();
        for (member, links) in pool.iter().zip(link_lists) {
            for link in links {
                if members.contains(link.other.as_str()) || !filter.accepts(&link, self.config) {
                    continue;
                }
                let enriched_is_source =
                    !link.is_source && !self.config.is_symmetric(link.predicate.predicate());
                let supporters = shared
                    .entry((link.other, link.predicate, enriched_is_source))
                    .or_default();
                if supporters.last() != Some(member) {
                    supporters.push(member.clone());
                }
            }
        }

        let draws = pool.len() as u64;
        let mut sparse = 0usize;
        let mut below_chance = 0usize;
        let mut candidates = Vec::new();

        for ((enriched, predicate, enriched_is_source), supporting) in shared {
            if supporting.len() < 2 {
                continue;
            }
            let x = supporting.len() as u64;
            let n = self.population_hits(&enriched, &predicate, enriched_is_source, semantic_type)?;
            if n == 0 {
                sparse += 1;
                continue;
            }
            if (x as f64) < n as f64 * draws as f64 / population {
                below_chance += 1;
                continue;
            }
            let p_value = self.cache.upper_tail(x, population, n, draws);
            if p_value < threshold {
                candidates.push(Enrichment {
                    p_value,
                    enriched_id: enriched,
                    predicate: Some(predicate),
                    enriched_is_source,
                    draws,
                    population_hits: n,
                    population,
                    supporting,
                    enriched_types: Vec::new(),
                    kind: EnrichmentKind::Graph,
                });
            }
        }

        let ids: Vec<String> = candidates
            .iter()
            .map(|c| c.enriched_id.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let types: BTreeMap<String, Vec<String>> = ids.iter().cloned().zip(self.store.get_types_batch(&ids)?).collect();

        let mut winners: Vec<Enrichment> = candidates
            .into_iter()
            .filter_map(|mut c| {
                c.enriched_types = types.get(&c.enriched_id).cloned().unwrap_or_default();
                filter.accepts_types(&c.enriched_types).then_some(c)
            })
            .collect();
        winners.sort_by(|a, b| a.p_value.total_cmp(&b.p_value));

        debug!(
            pool = pool.len(),
            winners = winners.len(),
            sparse,
            below_chance,
            cached = self.cache.len(),
            cache_hits = self.cache.hits(),
            "graph enrichment finished"
        );
        Ok(winners)
    }

    /// Population count for a link, tallying both orientations for `related_to`
    /// and symmetric predicates
    fn population_hits(
        &self,
        enriched: &str,
        predicate: &PredicateSpec,
        enriched_is_source: bool,
        semantic_type: &str,
    ) -> CoalesceResult<u64> {
        let mut n = self
            .store
            .get_count(enriched, predicate, enriched_is_source, semantic_type)?
            .unwrap_or(0);
        if predicate.is_related_to() || self.config.is_symmetric(predicate.predicate()) {
            n += self
                .store
                .get_count(enriched, predicate, !enriched_is_source, semantic_type)?
                .unwrap_or(0);
        }
        Ok(n)
    }
}
