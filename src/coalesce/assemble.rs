//! Applying patches to a message
//!
//! The assembler owns the output message. Its knowledge graph starts as the
//! input's and only grows; the query graph is never touched.

use super::config::EngineConfig;
use super::opportunity::SetQuery;
use super::patch::{NewEdge, PropertyPatch};
use crate::graph::{EdgeKey, PredicateSpec};
use crate::storage::ProvenanceRecord;
use crate::trapi::{
    Analysis, Attribute, AuxiliaryGraph, EdgeBinding, KEdge, KNode, Message, NodeBinding, Qualifier,
    RetrievalSource, TrapiResult,
};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

pub const MEMBER_OF: &str = "biolink:member_of";
const PRIMARY: &str = "primary_knowledge_source";
const AGGREGATOR: &str = "aggregator_knowledge_source";

pub struct ResultAssembler<'a> {
    message: Message,
    config: &'a EngineConfig,
    added_results: usize,
}

impl<'a> ResultAssembler<'a> {
    pub fn new(message: Message, config: &'a EngineConfig) -> Self {
        Self {
            message,
            config,
            added_results: 0,
        }
    }

    pub fn added_results(&self) -> usize {
        self.added_results
    }

    /// Coalesce mode: append one result summarizing the patch's answers
    pub fn apply(&mut self, patch: &PropertyPatch) {
        self.add_patch_nodes(patch);
        let edge_ids = self.add_member_edges(&patch.added_edges);

        let mut node_bindings: BTreeMap<String, Vec<NodeBinding>> = BTreeMap::new();
        let mut edge_bindings: BTreeMap<String, Vec<EdgeBinding>> = BTreeMap::new();
        for index in &patch.answer_indices {
            let Some(answer) = self.message.results.get(*index) else {
                continue;
            };
            for (qnode, bindings) in &answer.node_bindings {
                merge_bindings(node_bindings.entry(qnode.clone()).or_default(), bindings, |b| &b.id);
            }
            for analysis in &answer.analyses {
                for (qedge, bindings) in &analysis.edge_bindings {
                    merge_bindings(edge_bindings.entry(qedge.clone()).or_default(), bindings, |b| &b.id);
                }
            }
        }

        let mut analysis = Analysis::new(&self.config.resource_id);
        analysis.edge_bindings = edge_bindings;
        analysis.score = Some(score(patch.p_value()));
        analysis.attributes = Some(patch.new_props.clone());
        if !edge_ids.is_empty() {
            analysis.support_graphs = Some(vec![self.add_aux_graph(patch, edge_ids)]);
        }

        self.push_result(TrapiResult {
            node_bindings,
            analyses: vec![analysis],
            ..Default::default()
        });
    }

    /// Query mode: bind the set node and the enriched node, joined by an
    /// inferred edge supported by the member edges
    pub fn apply_set(&mut self, query: &SetQuery, patch: &PropertyPatch) {
        let Some(predicate) = patch.enrichment.predicate.as_ref() else {
            return;
        };

        let kg = &mut self.message.knowledge_graph;
        kg.add_node_once(
            &query.set_id,
            KNode {
                categories: vec![query.set_category.clone()],
                is_set: Some(true),
                ..Default::default()
            },
        );
        for member in &query.members {
            kg.add_node_once(
                member,
                KNode {
                    categories: vec![query.set_category.clone()],
                    ..Default::default()
                },
            );
        }
        self.add_patch_nodes(patch);

        let mut support = self.add_member_edges(&patch.added_edges);
        for member in &patch.set_curies {
            let key = EdgeKey::new(member.as_str(), PredicateSpec::new(MEMBER_OF), query.set_id.as_str());
            support.push(self.add_edge(&key, self.own_sources(), Vec::new()));
        }
        let aux_id = self.add_aux_graph(patch, support);

        let enriched = patch.enriched_id();
        let inferred = if query.set_is_subject {
            EdgeKey::new(query.set_id.as_str(), predicate.clone(), enriched)
        } else {
            EdgeKey::new(enriched, predicate.clone(), query.set_id.as_str())
        };
        let mut attributes = patch.new_props.clone();
        attributes.push(Attribute::new("biolink:knowledge_level", "statistical_association"));
        attributes.push(Attribute::new("biolink:agent_type", "computational_model"));
        attributes.push(Attribute::new("biolink:support_graphs", vec![aux_id]));
        let inferred_id = self.add_edge(&inferred, self.own_sources(), attributes);

        let mut analysis = Analysis::new(&self.config.resource_id);
        analysis.edge_bindings.insert(query.qedge_id.clone(), vec![EdgeBinding::new(inferred_id)]);
        analysis.score = Some(score(patch.p_value()));

        let mut node_bindings = BTreeMap::new();
        node_bindings.insert(query.set_qnode.clone(), vec![NodeBinding::new(&query.set_id)]);
        node_bindings.insert(query.answer_qnode.clone(), vec![NodeBinding::new(enriched)]);
        self.push_result(TrapiResult {
            node_bindings,
            analyses: vec![analysis],
            ..Default::default()
        });
    }

    pub fn finish(self) -> Message {
        self.message
    }

    fn push_result(&mut self, result: TrapiResult) {
        self.message.results.push(result);
        self.added_results += 1;
    }

    fn add_patch_nodes(&mut self, patch: &PropertyPatch) {
        let kg = &mut self.message.knowledge_graph;
        for node in &patch.added_nodes {
            kg.add_node_once(
                &node.id,
                KNode {
                    name: node.name.clone(),
                    categories: node.categories.clone(),
                    ..Default::default()
                },
            );
        }
        for edge in &patch.added_edges {
            for end in [edge.subject(), edge.object()] {
                kg.add_node_once(end, KNode::default());
            }
        }
    }

    fn add_member_edges(&mut self, edges: &[NewEdge]) -> Vec<String> {
        edges
            .iter()
            .map(|edge| {
                let sources = self.sources(&edge.sources);
                self.add_edge(&edge.key, sources, Vec::new())
            })
            .collect()
    }

    /// Insert an edge under its key-derived id; returns the id
    fn add_edge(&mut self, key: &EdgeKey, sources: Vec<RetrievalSource>, attributes: Vec<Attribute>) -> String {
        let id = Uuid::new_v5(&Uuid::NAMESPACE_OID, key.to_string().as_bytes()).to_string();
        let qualifiers = key
            .predicate
            .namespaced_qualifiers()
            .map(|(qualifier_type_id, value)| Qualifier {
                qualifier_type_id,
                qualifier_value: value.to_string(),
            })
            .collect();
        self.message.knowledge_graph.add_edge_once(
            &id,
            KEdge {
                subject: key.subject.clone(),
                predicate: key.predicate.predicate().to_string(),
                object: key.object.clone(),
                sources,
                attributes,
                qualifiers,
                ..Default::default()
            },
        );
        id
    }

    fn add_aux_graph(&mut self, patch: &PropertyPatch, edges: Vec<String>) -> String {
        let predicate = patch
            .enrichment
            .predicate
            .as_ref()
            .map(PredicateSpec::canonical_json)
            .unwrap_or_default();
        let seed = format!("{}|{}|{}|{}", patch.qg_id, patch.enriched_id(), predicate, patch.set_curies.join(","));
        let id = format!("aux_{}", Uuid::new_v5(&Uuid::NAMESPACE_OID, seed.as_bytes()));
        self.message.auxiliary_graphs.entry(id.clone()).or_insert(AuxiliaryGraph {
            edges,
            ..Default::default()
        });
        id
    }

    /// Stored provenance plus ourselves as aggregator; ourselves as primary when unknown
    fn sources(&self, records: &[ProvenanceRecord]) -> Vec<RetrievalSource> {
        if !records.iter().any(|r| r.resource_role == PRIMARY) {
            let mut sources = self.own_sources();
            sources.extend(records.iter().map(|r| RetrievalSource::new(&r.resource_id, &r.resource_role)));
            return sources;
        }
        let upstream: Vec<String> = records.iter().map(|r| r.resource_id.clone()).collect();
        let mut sources: Vec<RetrievalSource> = records
            .iter()
            .map(|r| RetrievalSource::new(&r.resource_id, &r.resource_role))
            .collect();
        sources.push(RetrievalSource::new(&self.config.resource_id, AGGREGATOR).with_upstream(upstream));
        sources
    }

    fn own_sources(&self) -> Vec<RetrievalSource> {
        vec![RetrievalSource::new(&self.config.resource_id, PRIMARY)]
    }
}

fn score(p_value: f64) -> f64 {
    (1.0 - p_value).clamp(0.0, 1.0)
}

fn merge_bindings<T: Clone>(into: &mut Vec<T>, from: &[T], id: impl Fn(&T) -> &String) {
    let mut seen: BTreeSet<String> = into.iter().map(|b| id(b).clone()).collect();
    for binding in from {
        if seen.insert(id(binding).clone()) {
            into.push(binding.clone());
        }
    }
}
