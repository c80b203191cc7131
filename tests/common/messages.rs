//! TRAPI message builders

use answer_coalesce::Message;
use serde_json::{json, Map, Value};

pub const DISEASE: &str = "MONDO:0005148";

/// One result per id at `qg_0`, every result sharing the disease at `qg_1`
pub fn answer_message(category: &str, ids: &[&str]) -> Message {
    let mut nodes = Map::new();
    let mut edges = Map::new();
    nodes.insert(DISEASE.to_string(), json!({"categories": ["biolink:Disease"]}));

    let mut results = Vec::new();
    for (i, id) in ids.iter().enumerate() {
        let edge_id = format!("kg_{}", i);
        nodes.insert(id.to_string(), json!({"categories": [category]}));
        edges.insert(
            edge_id.clone(),
            json!({
                "subject": id,
                "predicate": "biolink:related_to",
                "object": DISEASE,
                "sources": [{"resource_id": "infores:upstream", "resource_role": "primary_knowledge_source"}]
            }),
        );
        results.push(json!({
            "node_bindings": {"qg_0": [{"id": id}], "qg_1": [{"id": DISEASE}]},
            "analyses": [{"resource_id": "infores:upstream", "edge_bindings": {"e0": [{"id": edge_id}]}}]
        }));
    }

    from_json(json!({
        "query_graph": {
            "nodes": {
                "qg_0": {"categories": [category]},
                "qg_1": {"ids": [DISEASE], "categories": ["biolink:Disease"]}
            },
            "edges": {"e0": {"subject": "qg_0", "object": "qg_1", "predicates": ["biolink:related_to"]}}
        },
        "knowledge_graph": {"nodes": Value::Object(nodes), "edges": Value::Object(edges)},
        "results": results
    }))
}

/// A "many" set of members connected to an unbound answer node
pub fn set_query_message(set_id: &str, members: &[&str], answer_category: &str, predicate: &str) -> Message {
    from_json(json!({
        "query_graph": {
            "nodes": {
                "genes": {
                    "ids": [set_id],
                    "member_ids": members,
                    "is_set": true,
                    "set_interpretation": "MANY",
                    "categories": ["biolink:Gene"]
                },
                "answer": {"categories": [answer_category]}
            },
            "edges": {"e0": {"subject": "genes", "object": "answer", "predicates": [predicate]}}
        },
        "knowledge_graph": {"nodes": {}, "edges": {}},
        "results": []
    }))
}

fn from_json(value: Value) -> Message {
    serde_json::from_value(value).expect("fixture message must deserialize")
}
