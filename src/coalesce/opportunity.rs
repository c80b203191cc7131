//! Opportunities: the answer slots coalescence can summarize
//!
//! Coalesce mode groups existing results that agree everywhere except one
//! query node; the entities bound at that node across the group form the
//! candidate pool. Query mode reads the pool straight off a "many" set node.

use super::config::NAMED_THING;
use super::engine::{CoalesceError, CoalesceResult};
use crate::graph::{bare, PredicateSpec};
use crate::trapi::{Message, QEdge, QueryGraph};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

/// Predicate assumed when a query edge names none
pub const RELATED_TO: &str = "biolink:related_to";

/// One coalescable slot in an answer set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opportunity {
    hash: String,
    qg_id: String,
    semantic_type: String,
    kg_ids: Vec<String>,
    answer_indices: Vec<usize>,
    index_to_curies: BTreeMap<usize, Vec<String>>,
    bound_elsewhere: BTreeSet<String>,
}

impl Opportunity {
    /// Build an opportunity; every answer must contribute at least one curie
    pub fn new(
        hash: impl Into<String>,
        qg_id: impl Into<String>,
        semantic_type: impl Into<String>,
        index_to_curies: BTreeMap<usize, Vec<String>>,
    ) -> CoalesceResult<Self> {
        let qg_id = qg_id.into();
        if index_to_curies.is_empty() {
            return Err(CoalesceError::InvalidOpportunity(format!("{}: no answers", qg_id)));
        }
        if let Some((index, _)) = index_to_curies.iter().find(|(_, curies)| curies.is_empty()) {
            return Err(CoalesceError::InvalidOpportunity(format!(
                "{}: answer {} contributes no curies",
                qg_id, index
            )));
        }

        let mut seen = BTreeSet::new();
        let kg_ids = index_to_curies
            .values()
            .flatten()
            .filter(|c| seen.insert(c.as_str()))
            .cloned()
            .collect();

        Ok(Self {
            hash: hash.into(),
            qg_id,
            semantic_type: semantic_type.into(),
            kg_ids,
            answer_indices: index_to_curies.keys().copied().collect(),
            index_to_curies,
            bound_elsewhere: BTreeSet::new(),
        })
    }

    /// Entities bound at the other query nodes of these answers
    pub fn with_bound_elsewhere(mut self, ids: BTreeSet<String>) -> Self {
        self.bound_elsewhere = ids;
        self
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn qg_id(&self) -> &str {
        &self.qg_id
    }

    pub fn semantic_type(&self) -> &str {
        &self.semantic_type
    }

    pub fn kg_ids(&self) -> &[String] {
        &self.kg_ids
    }

    pub fn answer_indices(&self) -> &[usize] {
        &self.answer_indices
    }

    pub fn index_to_curies(&self) -> &BTreeMap<usize, Vec<String>> {
        &self.index_to_curies
    }

    pub fn bound_elsewhere(&self) -> &BTreeSet<String> {
        &self.bound_elsewhere
    }

    /// Keep only answers whose every curie survives `keep`
    ///
    /// Answers are atomic: losing one curie of a multi-curie answer drops the
    /// whole answer. Returns `None` when nothing is left.
    pub fn filter(&self, keep: &BTreeSet<String>) -> Option<Opportunity> {
        let surviving: BTreeMap<usize, Vec<String>> = self
            .index_to_curies
            .iter()
            .filter(|(_, curies)| curies.iter().all(|c| keep.contains(c)))
            .map(|(i, curies)| (*i, curies.clone()))
            .collect();
        if surviving.is_empty() {
            return None;
        }
        Opportunity::new(self.hash.clone(), self.qg_id.clone(), self.semantic_type.clone(), surviving)
            .ok()
            .map(|o| o.with_bound_elsewhere(self.bound_elsewhere.clone()))
    }
}

/// A multi-curie set query: members in, enriched answers out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetQuery {
    pub set_qnode: String,
    /// Identifier the set node is bound to in results
    pub set_id: String,
    /// Semantic type of the members
    pub set_category: String,
    pub members: Vec<String>,
    pub answer_qnode: String,
    /// Required category of enriched answers; `None` accepts anything
    pub answer_type: Option<String>,
    pub qedge_id: String,
    /// Acceptable predicate + qualifier combinations
    pub answer_edge: Vec<PredicateSpec>,
    /// Whether the set node is the subject of the query edge
    pub set_is_subject: bool,
}

/// Find the set node, its answer node and the edge between them
///
/// Returns `None` without a "many" set node, or when that node has no ids.
pub fn extract_set_query(qg: &QueryGraph) -> Option<SetQuery> {
    let (set_qnode, set_node) = qg.nodes.iter().find(|(_, n)| n.is_many_set())?;
    let ids = set_node.ids.as_ref().filter(|ids| !ids.is_empty())?;

    let (set_id, members) = match &set_node.member_ids {
        Some(members) if !members.is_empty() => (ids[0].clone(), dedup(members)),
        Some(_) => return None,
        None => (set_identifier(ids), dedup(ids)),
    };

    let (qedge_id, qedge) = qg
        .edges
        .iter()
        .find(|(_, e)| (e.subject == *set_qnode) != (e.object == *set_qnode))?;
    let set_is_subject = qedge.subject == *set_qnode;
    let answer_qnode = if set_is_subject { &qedge.object } else { &qedge.subject };
    let answer_node = qg.nodes.get(answer_qnode)?;

    Some(SetQuery {
        set_qnode: set_qnode.clone(),
        set_id,
        set_category: set_node.category().unwrap_or(NAMED_THING).to_string(),
        members,
        answer_qnode: answer_qnode.clone(),
        answer_type: answer_node
            .category()
            .filter(|c| *c != NAMED_THING)
            .map(str::to_string),
        qedge_id: qedge_id.clone(),
        answer_edge: predicate_constraints(qedge),
        set_is_subject,
    })
}

/// Every predicate × qualifier-set combination a query edge accepts
pub fn predicate_constraints(qedge: &QEdge) -> Vec<PredicateSpec> {
    let predicates: Vec<&str> = match &qedge.predicates {
        Some(p) if !p.is_empty() => p.iter().map(String::as_str).collect(),
        _ => vec![RELATED_TO],
    };

    let mut specs = Vec::new();
    for predicate in predicates {
        if qedge.qualifier_constraints.is_empty() {
            specs.push(PredicateSpec::new(predicate));
            continue;
        }
        for constraint in &qedge.qualifier_constraints {
            let spec = constraint
                .qualifier_set
                .iter()
                .fold(PredicateSpec::new(predicate), |spec, q| {
                    spec.with_qualifier(bare(&q.qualifier_type_id), q.qualifier_value.clone())
                });
            specs.push(spec);
        }
    }
    specs
}

/// Does a link predicate satisfy a query constraint?
///
/// `related_to` accepts any predicate; otherwise predicates must match and
/// every constrained qualifier must be present with the same value.
pub fn satisfies(link: &PredicateSpec, constraint: &PredicateSpec) -> bool {
    let predicate_ok = constraint.predicate() == RELATED_TO || constraint.predicate() == link.predicate();
    predicate_ok
        && constraint
            .qualifiers()
            .iter()
            .all(|(k, v)| link.qualifiers().get(k) == Some(v))
}

/// Group results that differ only at one query node
pub fn extract_opportunities(message: &Message) -> Vec<Opportunity> {
    let qg = &message.query_graph;
    let mut opportunities = Vec::new();

    for (qg_id, qnode) in &qg.nodes {
        // descriptor of the other bindings -> (answer index -> curies at qg_id)
        let mut groups: BTreeMap<String, BTreeMap<usize, Vec<String>>> = BTreeMap::new();
        let mut elsewhere: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

        for (index, result) in message.results.iter().enumerate() {
            let curies = dedup_str(&result.bound_ids(qg_id));
            if curies.is_empty() {
                continue;
            }
            let mut descriptor = String::new();
            let mut others = BTreeSet::new();
            for other in qg.nodes.keys().filter(|k| *k != qg_id) {
                let mut ids: Vec<&str> = result.bound_ids(other);
                ids.sort_unstable();
                ids.dedup();
                descriptor.push_str(&format!("{}=[{}];", other, ids.join(",")));
                others.extend(ids.into_iter().map(str::to_string));
            }
            groups.entry(descriptor.clone()).or_default().insert(index, curies);
            elsewhere.entry(descriptor).or_default().extend(others);
        }

        for (descriptor, index_to_curies) in groups {
            let distinct: BTreeSet<&String> = index_to_curies.values().flatten().collect();
            if distinct.len() < 2 {
                continue;
            }
            let hash = Uuid::new_v5(&Uuid::NAMESPACE_OID, format!("{}|{}", qg_id, descriptor).as_bytes());
            let semantic_type = qnode.category().unwrap_or(NAMED_THING);
            if let Ok(opportunity) = Opportunity::new(hash.to_string(), qg_id.clone(), semantic_type, index_to_curies) {
                let bound = elsewhere.remove(&descriptor).unwrap_or_default();
                opportunities.push(opportunity.with_bound_elsewhere(bound));
            }
        }
    }

    opportunities
}

/// Stable identifier for an unnamed set of members
fn set_identifier(members: &[String]) -> String {
    let mut sorted: Vec<&str> = members.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    format!("uuid:{}", Uuid::new_v5(&Uuid::NAMESPACE_OID, sorted.join(",").as_bytes()))
}

fn dedup(items: &[String]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    items.iter().filter(|i| seen.insert(i.as_str())).cloned().collect()
}

fn dedup_str(items: &[&str]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    items
        .iter()
        .filter(|i| seen.insert(**i))
        .map(|i| i.to_string())
        .collect()
}
