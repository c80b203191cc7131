//! Patches: one unit of change per winning enrichment
//!
//! A patch carries everything the assembler needs (new nodes, new edges with
//! resolved provenance, the attributes describing the enrichment) so applying
//! it never touches a store.

use super::config::EngineConfig;
use super::engine::CoalesceResult;
use super::enrichment::{Enrichment, EnrichmentKind};
use super::opportunity::{Opportunity, SetQuery};
use crate::graph::{reverse_key, EdgeKey, PredicateSpec};
use crate::storage::{LookupStore, ProvenanceRecord};
use crate::trapi::Attribute;
use std::collections::BTreeSet;
use tracing::{debug, warn};

pub const METHOD_ATTRIBUTE: &str = "biolink:supporting_study_method_type";
pub const P_VALUE_ATTRIBUTE: &str = "biolink:p_value";
pub const COHORT_ATTRIBUTE: &str = "biolink:supporting_study_cohort";
pub const DIRECTION_ATTRIBUTE: &str = "biolink:enrichment_direction";
pub const PREDICATE_ATTRIBUTE: &str = "biolink:predicate";
pub const PROPERTY_ATTRIBUTE: &str = "biolink:has_attribute";

/// A node introduced by a patch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNode {
    pub id: String,
    pub name: Option<String>,
    pub categories: Vec<String>,
}

/// A member edge implied by an enrichment, with its knowledge sources
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEdge {
    pub key: EdgeKey,
    pub sources: Vec<ProvenanceRecord>,
}

impl NewEdge {
    pub fn subject(&self) -> &str {
        &self.key.subject
    }

    pub fn object(&self) -> &str {
        &self.key.object
    }

    pub fn predicate(&self) -> &PredicateSpec {
        &self.key.predicate
    }
}

/// The change one winning enrichment makes to an answer set
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyPatch {
    pub qg_id: String,
    /// Entities the enrichment summarizes
    pub set_curies: Vec<String>,
    pub new_props: Vec<Attribute>,
    /// Original answers covered; empty in query mode
    pub answer_indices: Vec<usize>,
    pub added_nodes: Vec<NewNode>,
    pub added_edges: Vec<NewEdge>,
    pub enrichment: Enrichment,
}

impl PropertyPatch {
    pub fn p_value(&self) -> f64 {
        self.enrichment.p_value
    }

    pub fn enriched_id(&self) -> &str {
        &self.enrichment.enriched_id
    }
}

/// Turns ranked enrichments into patches, resolving names and provenance
pub struct PatchBuilder<'a> {
    store: &'a dyn LookupStore,
    config: &'a EngineConfig,
}

impl<'a> PatchBuilder<'a> {
    pub fn new(store: &'a dyn LookupStore, config: &'a EngineConfig) -> Self {
        Self { store, config }
    }

    /// Patches for a coalesce-mode opportunity, at most `limit` of them
    ///
    /// An enrichment whose supporters cover no whole answer is dropped.
    pub fn build(
        &self,
        opportunity: &Opportunity,
        enrichments: &[Enrichment],
        limit: Option<usize>,
    ) -> CoalesceResult<Vec<PropertyPatch>> {
        enrichments
            .iter()
            .filter_map(|enrichment| {
                let keep: BTreeSet<String> = enrichment.supporting.iter().cloned().collect();
                let covered = opportunity.filter(&keep);
                if covered.is_none() {
                    debug!(enriched = %enrichment.enriched_id, "enrichment covers no whole answer");
                }
                covered.map(|c| (enrichment, c))
            })
            .take(limit.unwrap_or(usize::MAX))
            .map(|(enrichment, covered)| self.patch(opportunity.qg_id(), covered.answer_indices().to_vec(), enrichment))
            .collect()
    }

    /// Patches for a set query, at most `limit` of them
    pub fn build_for_set(
        &self,
        query: &SetQuery,
        enrichments: &[Enrichment],
        limit: Option<usize>,
    ) -> CoalesceResult<Vec<PropertyPatch>> {
        enrichments
            .iter()
            .take(limit.unwrap_or(usize::MAX))
            .map(|e| self.patch(&query.set_qnode, Vec::new(), e))
            .collect()
    }

    fn patch(&self, qg_id: &str, answer_indices: Vec<usize>, enrichment: &Enrichment) -> CoalesceResult<PropertyPatch> {
        let (added_nodes, added_edges) = match (&enrichment.kind, &enrichment.predicate) {
            (EnrichmentKind::Graph, Some(predicate)) => {
                let name = self.store.get_name(&enrichment.enriched_id)?;
                let node = NewNode {
                    id: enrichment.enriched_id.clone(),
                    name,
                    categories: enrichment.enriched_types.clone(),
                };
                let edges = enrichment
                    .supporting
                    .iter()
                    .map(|member| self.member_edge(member, predicate, enrichment))
                    .collect::<CoalesceResult<Vec<_>>>()?;
                (vec![node], edges)
            }
            _ => (Vec::new(), Vec::new()),
        };

        Ok(PropertyPatch {
            qg_id: qg_id.to_string(),
            set_curies: enrichment.supporting.clone(),
            new_props: self.attributes(qg_id, enrichment),
            answer_indices,
            added_nodes,
            added_edges,
            enrichment: enrichment.clone(),
        })
    }

    fn member_edge(&self, member: &str, predicate: &PredicateSpec, enrichment: &Enrichment) -> CoalesceResult<NewEdge> {
        let key = if enrichment.enriched_is_source {
            EdgeKey::new(&enrichment.enriched_id, predicate.clone(), member)
        } else {
            EdgeKey::new(member, predicate.clone(), &enrichment.enriched_id)
        };
        let sources = self.provenance(&key)?;
        Ok(NewEdge { key, sources })
    }

    /// Sources for an edge key, falling back to its reversed form
    fn provenance(&self, key: &EdgeKey) -> CoalesceResult<Vec<ProvenanceRecord>> {
        let forward = key.to_string();
        if let Some(records) = self.store.get_provenance(&forward)? {
            return Ok(records);
        }
        let reversed = reverse_key(&forward)?;
        match self.store.get_provenance(&reversed)? {
            Some(records) => Ok(records),
            None => {
                warn!(edge = %forward, "no provenance in either orientation");
                Ok(Vec::new())
            }
        }
    }

    fn attributes(&self, qg_id: &str, enrichment: &Enrichment) -> Vec<Attribute> {
        let source = &self.config.resource_id;
        let mut attributes = vec![
            Attribute::new(METHOD_ATTRIBUTE, enrichment.kind.method_name()).with_source(source),
            Attribute::new(P_VALUE_ATTRIBUTE, enrichment.p_value)
                .with_value_type("EDAM-DATA:1669")
                .with_source(source),
            Attribute::new(COHORT_ATTRIBUTE, qg_id).with_source(source),
        ];

        match &enrichment.predicate {
            Some(predicate) => {
                let direction = if enrichment.enriched_is_source { "subject" } else { "object" };
                attributes.push(
                    Attribute::new(DIRECTION_ATTRIBUTE, direction)
                        .with_original_name("enrichment_direction")
                        .with_source(source),
                );
                attributes.push(Attribute::new(PREDICATE_ATTRIBUTE, predicate.predicate()).with_source(source));
                attributes.extend(
                    predicate
                        .namespaced_qualifiers()
                        .map(|(k, v)| Attribute::new(k, v).with_source(source)),
                );
            }
            None => {
                // the shared property belongs to the members
                attributes.push(
                    Attribute::new(DIRECTION_ATTRIBUTE, "subject")
                        .with_original_name("enrichment_direction")
                        .with_source(source),
                );
                attributes.push(
                    Attribute::new(PROPERTY_ATTRIBUTE, enrichment.enriched_id.as_str())
                        .with_original_name("shared_property")
                        .with_source(source),
                );
            }
        }
        attributes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryLookupStore;
    use std::collections::BTreeMap;

    fn affects() -> PredicateSpec {
        PredicateSpec::new("biolink:affects").with_qualifier("object_aspect_qualifier", "activity")
    }

    fn enrichment(supporting: &[&str]) -> Enrichment {
        Enrichment {
            p_value: 1e-9,
            enriched_id: "GO:1".to_string(),
            predicate: Some(affects()),
            enriched_is_source: false,
            draws: 3,
            population_hits: 5,
            population: 20000.0,
            supporting: supporting.iter().map(|s| s.to_string()).collect(),
            enriched_types: vec!["biolink:BiologicalProcess".to_string()],
            kind: EnrichmentKind::Graph,
        }
    }

    fn opportunity() -> Opportunity {
        let mut map = BTreeMap::new();
        map.insert(0, vec!["G:1".to_string()]);
        map.insert(1, vec!["G:2".to_string()]);
        map.insert(2, vec!["G:3".to_string(), "G:9".to_string()]);
        Opportunity::new("h", "qg_0", "biolink:Gene", map).unwrap()
    }

    #[test]
    fn patch_carries_node_edges_and_attributes() {
        let mut store = MemoryLookupStore::new();
        store.set_name("GO:1", "some process");
        let config = EngineConfig::default();
        let builder = PatchBuilder::new(&store, &config);

        let patches = builder.build(&opportunity(), &[enrichment(&["G:1", "G:2"])], None).unwrap();
        assert_eq!(patches.len(), 1);
        let patch = &patches[0];
        assert_eq!(patch.qg_id, "qg_0");
        assert_eq!(patch.answer_indices, vec![0, 1]);
        assert_eq!(patch.added_nodes.len(), 1);
        assert_eq!(patch.added_nodes[0].name.as_deref(), Some("some process"));
        assert_eq!(patch.added_edges.len(), 2);
        assert_eq!(patch.added_edges[0].subject(), "G:1");
        assert_eq!(patch.added_edges[0].object(), "GO:1");

        let types: Vec<&str> = patch.new_props.iter().map(|a| a.attribute_type_id.as_str()).collect();
        assert!(types.contains(&METHOD_ATTRIBUTE));
        assert!(types.contains(&P_VALUE_ATTRIBUTE));
        assert!(types.contains(&COHORT_ATTRIBUTE));
        assert!(types.contains(&"biolink:object_aspect_qualifier"));
    }

    #[test]
    fn provenance_found_under_reversed_key() {
        let mut store = MemoryLookupStore::new();
        let key = EdgeKey::new("GO:1", affects(), "G:1");
        store.set_provenance(&key, vec![ProvenanceRecord::primary("infores:go")]);
        let config = EngineConfig::default();
        let builder = PatchBuilder::new(&store, &config);

        let patches = builder.build(&opportunity(), &[enrichment(&["G:1", "G:2"])], None).unwrap();
        assert_eq!(patches[0].added_edges[0].sources, vec![ProvenanceRecord::primary("infores:go")]);
        assert!(patches[0].added_edges[1].sources.is_empty());
    }

    #[test]
    fn partial_multi_curie_answer_is_not_covered() {
        let store = MemoryLookupStore::new();
        let config = EngineConfig::default();
        let builder = PatchBuilder::new(&store, &config);
        let patches = builder.build(&opportunity(), &[enrichment(&["G:1", "G:3"])], None).unwrap();
        assert_eq!(patches[0].answer_indices, vec![0]);

        let none = builder.build(&opportunity(), &[enrichment(&["G:3", "G:8"])], None).unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn limit_caps_patch_count() {
        let store = MemoryLookupStore::new();
        let config = EngineConfig::default();
        let builder = PatchBuilder::new(&store, &config);
        let winners = vec![enrichment(&["G:1", "G:2"]), enrichment(&["G:1", "G:2"])];
        assert_eq!(builder.build(&opportunity(), &winners, Some(1)).unwrap().len(), 1);
        assert_eq!(builder.build(&opportunity(), &winners, None).unwrap().len(), 2);
    }

    #[test]
    fn limit_counts_only_enrichments_that_cover_answers() {
        let store = MemoryLookupStore::new();
        let config = EngineConfig::default();
        let builder = PatchBuilder::new(&store, &config);
        let winners = vec![enrichment(&["G:3", "G:8"]), enrichment(&["G:1", "G:2"])];
        let patches = builder.build(&opportunity(), &winners, Some(1)).unwrap();
        assert_eq!(patches.len(), 1);
        assert_eq!(patches[0].answer_indices, vec![0, 1]);
    }

    #[test]
    fn property_patch_has_no_graph_changes() {
        let store = MemoryLookupStore::new();
        let config = EngineConfig::default();
        let builder = PatchBuilder::new(&store, &config);
        let mut e = enrichment(&["G:1", "G:2"]);
        e.kind = EnrichmentKind::Property;
        e.predicate = None;
        e.enriched_id = "CHEBI_ROLE_antifungal".to_string();
        let patch = &builder.build(&opportunity(), &[e], None).unwrap()[0];
        assert!(patch.added_nodes.is_empty());
        assert!(patch.added_edges.is_empty());
        assert!(patch
            .new_props
            .iter()
            .any(|a| a.attribute_type_id == PROPERTY_ATTRIBUTE && a.value == "CHEBI_ROLE_antifungal"));
        assert!(patch
            .new_props
            .iter()
            .any(|a| a.attribute_type_id == DIRECTION_ATTRIBUTE && a.value == "subject"));
    }
}
