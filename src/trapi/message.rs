//! TRAPI message shapes consumed and produced by coalescence
//!
//! Only the fields coalescence reads or writes are typed. Everything else
//! rides along in the `extra` maps so a message survives a round trip intact.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

type Extra = Map<String, Value>;

/// Treat an explicit `null` like a missing field
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Request envelope: `{"message": {...}, ...}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    pub message: Message,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default, deserialize_with = "nullable")]
    pub query_graph: QueryGraph,
    #[serde(default, deserialize_with = "nullable")]
    pub knowledge_graph: KnowledgeGraph,
    #[serde(default, deserialize_with = "nullable")]
    pub results: Vec<TrapiResult>,
    #[serde(default, deserialize_with = "nullable")]
    pub auxiliary_graphs: BTreeMap<String, AuxiliaryGraph>,
    #[serde(flatten)]
    pub extra: Extra,
}

// ---------------------------------------------------------------------------
// Query graph
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryGraph {
    #[serde(default)]
    pub nodes: BTreeMap<String, QNode>,
    #[serde(default)]
    pub edges: BTreeMap<String, QEdge>,
}

/// How a query node's `ids` are to be read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SetInterpretation {
    Batch,
    All,
    Many,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QNode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ids: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_set: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member_ids: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set_interpretation: Option<SetInterpretation>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl QNode {
    /// First declared category, if any
    pub fn category(&self) -> Option<&str> {
        self.categories.as_ref()?.first().map(String::as_str)
    }

    /// Pinned to identifiers
    pub fn is_bound(&self) -> bool {
        self.ids.as_ref().map_or(false, |ids| !ids.is_empty())
    }

    /// A "many" set node: bound, and either flagged `is_set` or carrying members
    pub fn is_many_set(&self) -> bool {
        let flagged = self.is_set.unwrap_or(false) || self.member_ids.is_some();
        self.set_interpretation == Some(SetInterpretation::Many) && flagged
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Qualifier {
    pub qualifier_type_id: String,
    pub qualifier_value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualifierConstraint {
    #[serde(default)]
    pub qualifier_set: Vec<Qualifier>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QEdge {
    pub subject: String,
    pub object: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predicates: Option<Vec<String>>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Vec::is_empty")]
    pub qualifier_constraints: Vec<QualifierConstraint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub knowledge_type: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

// ---------------------------------------------------------------------------
// Knowledge graph
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeGraph {
    #[serde(default)]
    pub nodes: BTreeMap<String, KNode>,
    #[serde(default)]
    pub edges: BTreeMap<String, KEdge>,
}

impl KnowledgeGraph {
    /// Insert a node unless one with the same id exists. Returns true if inserted.
    pub fn add_node_once(&mut self, id: &str, node: KNode) -> bool {
        if self.nodes.contains_key(id) {
            return false;
        }
        self.nodes.insert(id.to_string(), node);
        true
    }

    /// Insert an edge unless one with the same id exists. Returns true if inserted.
    pub fn add_edge_once(&mut self, id: &str, edge: KEdge) -> bool {
        if self.edges.contains_key(id) {
            return false;
        }
        self.edges.insert(id.to_string(), edge);
        true
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KNode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub categories: Vec<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub attributes: Vec<Attribute>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_set: Option<bool>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalSource {
    pub resource_id: String,
    pub resource_role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstream_resource_ids: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl RetrievalSource {
    pub fn new(resource_id: impl Into<String>, resource_role: impl Into<String>) -> Self {
        Self {
            resource_id: resource_id.into(),
            resource_role: resource_role.into(),
            upstream_resource_ids: None,
            extra: Extra::new(),
        }
    }

    pub fn with_upstream(mut self, upstream: Vec<String>) -> Self {
        self.upstream_resource_ids = Some(upstream);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KEdge {
    pub subject: String,
    pub predicate: String,
    pub object: String,
    #[serde(default, deserialize_with = "nullable")]
    pub sources: Vec<RetrievalSource>,
    #[serde(default, deserialize_with = "nullable")]
    pub attributes: Vec<Attribute>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Vec::is_empty")]
    pub qualifiers: Vec<Qualifier>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub attribute_type_id: String,
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_type_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_attribute_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute_source: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl Attribute {
    pub fn new(attribute_type_id: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            attribute_type_id: attribute_type_id.into(),
            value: value.into(),
            value_type_id: None,
            original_attribute_name: None,
            attribute_source: None,
            extra: Extra::new(),
        }
    }

    pub fn with_value_type(mut self, value_type_id: impl Into<String>) -> Self {
        self.value_type_id = Some(value_type_id.into());
        self
    }

    pub fn with_original_name(mut self, name: impl Into<String>) -> Self {
        self.original_attribute_name = Some(name.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.attribute_source = Some(source.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeBinding {
    pub id: String,
    #[serde(default, deserialize_with = "nullable")]
    pub attributes: Vec<Attribute>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl NodeBinding {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            attributes: Vec::new(),
            extra: Extra::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeBinding {
    pub id: String,
    #[serde(default, deserialize_with = "nullable")]
    pub attributes: Vec<Attribute>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl EdgeBinding {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            attributes: Vec::new(),
            extra: Extra::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub resource_id: String,
    #[serde(default, deserialize_with = "nullable")]
    pub edge_bindings: BTreeMap<String, Vec<EdgeBinding>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub support_graphs: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Vec<Attribute>>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl Analysis {
    pub fn new(resource_id: impl Into<String>) -> Self {
        Self {
            resource_id: resource_id.into(),
            edge_bindings: BTreeMap::new(),
            score: None,
            support_graphs: None,
            attributes: None,
            extra: Extra::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrapiResult {
    #[serde(default)]
    pub node_bindings: BTreeMap<String, Vec<NodeBinding>>,
    #[serde(default, deserialize_with = "nullable")]
    pub analyses: Vec<Analysis>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl TrapiResult {
    /// Identifiers bound to a query node, in binding order
    pub fn bound_ids(&self, qnode_id: &str) -> Vec<&str> {
        self.node_bindings
            .get(qnode_id)
            .map(|bindings| bindings.iter().map(|b| b.id.as_str()).collect())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuxiliaryGraph {
    pub edges: Vec<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub attributes: Vec<Attribute>,
    #[serde(flatten)]
    pub extra: Extra,
}
