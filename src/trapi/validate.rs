//! Structural checks on an assembled message
//!
//! Full schema validation lives outside this crate. These checks cover the
//! invariants coalescence itself is responsible for keeping.

use super::message::Message;
use crate::graph::BIOLINK_PREFIX;

/// Every structural problem found, empty when the message is consistent
pub fn structural_problems(message: &Message) -> Vec<String> {
    let mut problems = Vec::new();
    let kg = &message.knowledge_graph;

    for (id, edge) in &kg.edges {
        if !edge.predicate.starts_with(BIOLINK_PREFIX) {
            problems.push(format!("edge {} has non-namespaced predicate {}", id, edge.predicate));
        }
        for endpoint in [&edge.subject, &edge.object] {
            if !kg.nodes.contains_key(endpoint) {
                problems.push(format!("edge {} references missing node {}", id, endpoint));
            }
        }
        for q in &edge.qualifiers {
            if !q.qualifier_type_id.starts_with(BIOLINK_PREFIX) {
                problems.push(format!("edge {} has non-namespaced qualifier {}", id, q.qualifier_type_id));
            }
        }
    }

    for (i, result) in message.results.iter().enumerate() {
        for (qnode, bindings) in &result.node_bindings {
            for b in bindings {
                if !kg.nodes.contains_key(&b.id) {
                    problems.push(format!("result {} binds {} to missing node {}", i, qnode, b.id));
                }
            }
        }
        for analysis in &result.analyses {
            for (qedge, bindings) in &analysis.edge_bindings {
                for b in bindings {
                    if !kg.edges.contains_key(&b.id) {
                        problems.push(format!("result {} binds {} to missing edge {}", i, qedge, b.id));
                    }
                }
            }
            for aux in analysis.support_graphs.iter().flatten() {
                if !message.auxiliary_graphs.contains_key(aux) {
                    problems.push(format!("result {} references missing auxiliary graph {}", i, aux));
                }
            }
        }
    }

    for (aux_id, aux) in &message.auxiliary_graphs {
        for edge_id in &aux.edges {
            if !kg.edges.contains_key(edge_id) {
                problems.push(format!("auxiliary graph {} references missing edge {}", aux_id, edge_id));
            }
        }
    }

    problems
}
