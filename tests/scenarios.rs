//! End-to-end coalescence scenarios over fixture stores

mod common;

use answer_coalesce::coalesce::{EnrichmentMethod, P_VALUE_ATTRIBUTE};
use answer_coalesce::stats::TailCache;
use answer_coalesce::storage::{LookupStore, ProvenanceRecord, StorageError};
use answer_coalesce::trapi::structural_problems;
use answer_coalesce::{
    CoalesceMode, CoalesceParams, Coalescer, EdgeKey, Link, MemoryLookupStore, OpenStore, PredicateSpec, SqliteLookupStore,
    StorageResult, TailStrategy,
};
use common::{
    answer_message, overlapping_neighbor_store, property_store, set_query_message, shared_neighbor_store,
    CHEMICAL, GENE, POPULATION,
};
use std::sync::Arc;

const THREE_GENES: [&str; 3] = ["NCBIGene:106632262", "NCBIGene:106632263", "NCBIGene:106632261"];

fn p_value_of(attributes: &[answer_coalesce::trapi::Attribute]) -> f64 {
    attributes
        .iter()
        .find(|a| a.attribute_type_id == P_VALUE_ATTRIBUTE)
        .and_then(|a| a.value.as_f64())
        .expect("p-value attribute")
}

#[test]
fn three_genes_sharing_a_neighbor_coalesce_once() {
    let store = shared_neighbor_store(&THREE_GENES, "GO:0001", 5);
    let coalescer = Coalescer::new(Arc::new(store));
    let message = answer_message(GENE, &THREE_GENES);

    let outcome = coalescer.coalesce(&message, &CoalesceParams::default()).unwrap();

    assert_eq!(outcome.mode, CoalesceMode::Coalesce);
    assert_eq!(outcome.patches.len(), 1);
    let patch = &outcome.patches[0];
    assert_eq!(patch.qg_id, "qg_0");
    assert_eq!(patch.set_curies.len(), 3);
    assert!(p_value_of(&patch.new_props) < 1e-10);
    assert_eq!(patch.added_nodes.len(), 1);
    assert_eq!(patch.added_nodes[0].id, "GO:0001");

    // symmetric provenance fallback found the reverse-stored record
    let first = patch
        .added_edges
        .iter()
        .find(|e| e.subject() == THREE_GENES[0])
        .unwrap();
    assert_eq!(first.sources, vec![ProvenanceRecord::primary("infores:go-cam")]);

    let out = &outcome.message;
    assert_eq!(out.results.len(), 4);
    assert_eq!(out.query_graph, message.query_graph);
    assert!(structural_problems(out).is_empty(), "{:?}", structural_problems(out));
}

#[test]
fn fourteen_genes_with_overlapping_neighbors_yield_fifteen_patches() {
    let genes: Vec<String> = (1..=14).map(|i| format!("NCBIGene:{}", 1000 + i)).collect();
    let ids: Vec<&str> = genes.iter().map(String::as_str).collect();
    let coalescer = Coalescer::new(Arc::new(overlapping_neighbor_store(&genes)));

    let outcome = coalescer.coalesce(&answer_message(GENE, &ids), &CoalesceParams::default()).unwrap();

    assert_eq!(outcome.patches.len(), 15);
    let mut enriched: Vec<&str> = outcome.patches.iter().map(|p| p.enriched_id()).collect();
    enriched.sort_unstable();
    enriched.dedup();
    assert_eq!(enriched.len(), 15);
    for patch in &outcome.patches {
        assert!(p_value_of(&patch.new_props) < 1e-10);
        assert_eq!(patch.answer_indices.len(), 4);
    }
    assert!(structural_problems(&outcome.message).is_empty());
}

#[test]
fn property_enrichment_orders_shared_roles_by_p_value() {
    let chemicals = ["CHEBI:1", "CHEBI:2", "CHEBI:3", "CHEBI:4"];
    let coalescer = Coalescer::new(Arc::new(answer_coalesce::MemoryLookupStore::new()))
        .with_property_store(Arc::new(property_store()));
    let params = CoalesceParams::new().with_method(EnrichmentMethod::Property);

    let outcome = coalescer.coalesce(&answer_message(CHEMICAL, &chemicals), &params).unwrap();

    assert_eq!(outcome.patches.len(), 2);
    assert_eq!(outcome.patches[0].enriched_id(), "CHEBI_ROLE_antifungal_agent");
    assert_eq!(outcome.patches[1].enriched_id(), "CHEBI_ROLE_antibacterial_agent");
    assert!(outcome.patches[0].p_value() < outcome.patches[1].p_value());
    assert_eq!(outcome.patches[0].answer_indices, vec![0, 1, 2]);
}

#[test]
fn property_constraints_and_exclusions_apply() {
    let chemicals = ["CHEBI:1", "CHEBI:2", "CHEBI:3", "CHEBI:4"];
    let coalescer = Coalescer::new(Arc::new(answer_coalesce::MemoryLookupStore::new()))
        .with_property_store(Arc::new(property_store()));
    let message = answer_message(CHEMICAL, &chemicals);

    let excluded = CoalesceParams::new()
        .with_method(EnrichmentMethod::Property)
        .excluding_property("CHEBI_ROLE_antifungal_agent");
    let outcome = coalescer.coalesce(&message, &excluded).unwrap();
    assert_eq!(outcome.patches.len(), 1);
    assert_eq!(outcome.patches[0].enriched_id(), "CHEBI_ROLE_antibacterial_agent");

    let mut constrained = CoalesceParams::new().with_method(EnrichmentMethod::Property);
    constrained.property_constraints = vec!["CHEBI_ROLE_antifungal_agent".to_string()];
    let outcome = coalescer.coalesce(&message, &constrained).unwrap();
    assert_eq!(outcome.patches.len(), 1);
    assert_eq!(outcome.patches[0].enriched_id(), "CHEBI_ROLE_antifungal_agent");
}

#[test]
fn no_shared_links_leaves_results_unchanged() {
    let mut store = answer_coalesce::MemoryLookupStore::new();
    store.set_population(GENE, POPULATION);
    for (i, gene) in THREE_GENES.iter().enumerate() {
        store.add_edge(gene, PredicateSpec::new("biolink:affects"), &format!("GO:{}", i));
    }
    let coalescer = Coalescer::new(Arc::new(store));
    let message = answer_message(GENE, &THREE_GENES);

    let outcome = coalescer.coalesce(&message, &CoalesceParams::default()).unwrap();

    assert!(outcome.patches.is_empty());
    assert_eq!(outcome.message.results.len(), message.results.len());
    assert_eq!(outcome.message, message);
}

#[test]
fn threshold_equal_to_p_value_excludes() {
    let p = TailCache::new(TailStrategy::Poisson).upper_tail(3, POPULATION, 5, 3);
    let coalescer = Coalescer::new(Arc::new(shared_neighbor_store(&THREE_GENES, "GO:0001", 5)));
    let message = answer_message(GENE, &THREE_GENES);

    let at = coalescer
        .coalesce(&message, &CoalesceParams::new().with_pvalue_threshold(p))
        .unwrap();
    assert!(at.patches.is_empty());

    let above = coalescer
        .coalesce(&message, &CoalesceParams::new().with_pvalue_threshold(p * 1.000_001))
        .unwrap();
    assert_eq!(above.patches.len(), 1);
}

#[test]
fn excluded_predicate_suppresses_enrichment() {
    let coalescer = Coalescer::new(Arc::new(shared_neighbor_store(&THREE_GENES, "GO:0001", 5)));
    let params = CoalesceParams::new().excluding_predicate("biolink:affects");
    let outcome = coalescer.coalesce(&answer_message(GENE, &THREE_GENES), &params).unwrap();
    assert!(outcome.patches.is_empty());
}

#[test]
fn result_length_caps_patches() {
    let genes: Vec<String> = (1..=14).map(|i| format!("NCBIGene:{}", 1000 + i)).collect();
    let ids: Vec<&str> = genes.iter().map(String::as_str).collect();
    let coalescer = Coalescer::new(Arc::new(overlapping_neighbor_store(&genes)));
    let params = CoalesceParams::new().with_result_length(3);
    let outcome = coalescer.coalesce(&answer_message(GENE, &ids), &params).unwrap();
    assert_eq!(outcome.patches.len(), 3);
}

#[test]
fn running_twice_gives_identical_output() {
    let genes: Vec<String> = (1..=14).map(|i| format!("NCBIGene:{}", 1000 + i)).collect();
    let ids: Vec<&str> = genes.iter().map(String::as_str).collect();
    let coalescer = Coalescer::new(Arc::new(overlapping_neighbor_store(&genes)));
    let message = answer_message(GENE, &ids);

    let a = coalescer.coalesce(&message, &CoalesceParams::default()).unwrap();
    let b = coalescer.coalesce(&message, &CoalesceParams::default()).unwrap();

    let ranked = |o: &answer_coalesce::CoalesceOutcome| -> Vec<(f64, String)> {
        o.patches.iter().map(|p| (p.p_value(), p.enriched_id().to_string())).collect()
    };
    assert_eq!(ranked(&a), ranked(&b));
    assert_eq!(a.message, b.message);
}

#[test]
fn set_query_answers_with_enriched_neighbor() {
    let members = ["NCBIGene:1", "NCBIGene:2", "NCBIGene:3"];
    let mut store = shared_neighbor_store(&members, "GO:0001", 5);
    // shared, symmetric, but not the predicate the query asks for
    let interacts = PredicateSpec::new("biolink:interacts_with");
    for member in members {
        store.add_edge(member, interacts.clone(), "PR:1");
    }
    store.set_count("PR:1", &interacts, false, GENE, 3);
    let coalescer = Coalescer::new(Arc::new(store));
    let message = set_query_message("uuid:members", &members, "biolink:BiologicalProcess", "biolink:affects");

    let outcome = coalescer.coalesce(&message, &CoalesceParams::default()).unwrap();

    assert_eq!(outcome.mode, CoalesceMode::Query);
    assert_eq!(outcome.patches.len(), 1);
    let out = &outcome.message;
    assert_eq!(out.results.len(), 1);
    assert_eq!(out.results[0].bound_ids("genes"), vec!["uuid:members"]);
    assert_eq!(out.results[0].bound_ids("answer"), vec!["GO:0001"]);
    assert_eq!(out.auxiliary_graphs.len(), 1);
    assert_eq!(out.query_graph, message.query_graph);
    assert!(structural_problems(out).is_empty(), "{:?}", structural_problems(out));
}

#[test]
fn set_query_groups_symmetric_links_stored_both_ways() {
    let members = ["NCBIGene:1", "NCBIGene:2", "NCBIGene:3", "NCBIGene:4"];
    let interacts = PredicateSpec::new("biolink:interacts_with");
    let mut store = MemoryLookupStore::new();
    store.set_population(GENE, POPULATION);
    store.set_types("PR:1", &["biolink:Protein"]);
    store.add_edge(members[0], interacts.clone(), "PR:1");
    store.add_edge(members[1], interacts.clone(), "PR:1");
    store.add_edge("PR:1", interacts.clone(), members[2]);
    store.add_edge("PR:1", interacts.clone(), members[3]);
    store.set_count("PR:1", &interacts, false, GENE, 2);
    store.set_count("PR:1", &interacts, true, GENE, 2);
    let coalescer = Coalescer::new(Arc::new(store));
    let message = set_query_message("uuid:members", &members, "biolink:Protein", "biolink:interacts_with");

    let outcome = coalescer.coalesce(&message, &CoalesceParams::default()).unwrap();

    assert_eq!(outcome.patches.len(), 1);
    assert_eq!(outcome.patches[0].set_curies.len(), 4);
    let out = &outcome.message;
    assert_eq!(out.results.len(), 1);
    assert_eq!(out.auxiliary_graphs.len(), 1);
    let inferred = out.knowledge_graph.edges.values().find(|e| e.subject == "uuid:members").expect("inferred edge");
    let referenced = inferred
        .attributes
        .iter()
        .find(|a| a.attribute_type_id == "biolink:support_graphs")
        .and_then(|a| a.value.as_array())
        .expect("support graphs");
    assert_eq!(referenced.len(), 1);
    assert!(referenced[0].as_str().is_some_and(|id| out.auxiliary_graphs.contains_key(id)));
    assert!(structural_problems(out).is_empty(), "{:?}", structural_problems(out));
}

#[test]
fn set_query_rejects_wrong_answer_type() {
    let members = ["NCBIGene:1", "NCBIGene:2", "NCBIGene:3"];
    let coalescer = Coalescer::new(Arc::new(shared_neighbor_store(&members, "GO:0001", 5)));
    let message = set_query_message("uuid:members", &members, "biolink:Disease", "biolink:affects");
    let outcome = coalescer.coalesce(&message, &CoalesceParams::default()).unwrap();
    assert!(outcome.patches.is_empty());
    assert!(outcome.message.results.is_empty());
}

/// Answers links but fails every provenance lookup
struct FlakyProvenance(answer_coalesce::MemoryLookupStore);

impl LookupStore for FlakyProvenance {
    fn get_links(&self, entity: &str) -> StorageResult<Vec<Link>> {
        self.0.get_links(entity)
    }
    fn get_types(&self, entity: &str) -> StorageResult<Vec<String>> {
        self.0.get_types(entity)
    }
    fn get_name(&self, entity: &str) -> StorageResult<Option<String>> {
        self.0.get_name(entity)
    }
    fn get_count(&self, entity: &str, predicate: &PredicateSpec, is_source: bool, semantic_type: &str) -> StorageResult<Option<u64>> {
        self.0.get_count(entity, predicate, is_source, semantic_type)
    }
    fn get_population(&self, semantic_type: &str) -> StorageResult<Option<f64>> {
        self.0.get_population(semantic_type)
    }
    fn get_provenance(&self, _: &str) -> StorageResult<Option<Vec<ProvenanceRecord>>> {
        Err(StorageError::Unavailable("provenance service timed out".into()))
    }
}

#[test]
fn late_store_failure_applies_nothing() {
    let store = FlakyProvenance(shared_neighbor_store(&THREE_GENES, "GO:0001", 5));
    let coalescer = Coalescer::new(Arc::new(store));
    let message = answer_message(GENE, &THREE_GENES);

    assert!(coalescer.coalesce(&message, &CoalesceParams::default()).is_err());
    assert_eq!(coalescer.coalesce_or_passthrough(message.clone(), &CoalesceParams::default()), message);
}

#[test]
fn sqlite_store_matches_memory_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lookup.db");
    {
        let store = SqliteLookupStore::open(&path).unwrap();
        store.insert_population(GENE, POPULATION).unwrap();
        let affects = PredicateSpec::new("biolink:affects");
        for gene in THREE_GENES {
            store.insert_edge(gene, &affects, "GO:0001").unwrap();
        }
        store.insert_count("GO:0001", &affects, false, GENE, 5).unwrap();
        store.insert_types("GO:0001", &["biolink:BiologicalProcess"]).unwrap();
        store
            .insert_provenance(
                &EdgeKey::new(THREE_GENES[0], affects, "GO:0001"),
                &[ProvenanceRecord::primary("infores:go-cam")],
            )
            .unwrap();
    }

    let reopened = SqliteLookupStore::open(&path).unwrap();
    let coalescer = Coalescer::new(Arc::new(reopened));
    let sqlite = coalescer
        .coalesce(&answer_message(GENE, &THREE_GENES), &CoalesceParams::default())
        .unwrap();

    let memory = Coalescer::new(Arc::new(shared_neighbor_store(&THREE_GENES, "GO:0001", 5)))
        .coalesce(&answer_message(GENE, &THREE_GENES), &CoalesceParams::default())
        .unwrap();

    assert_eq!(sqlite.patches.len(), 1);
    assert_eq!(sqlite.patches[0].p_value(), memory.patches[0].p_value());
    assert_eq!(sqlite.patches[0].enriched_id(), "GO:0001");
}
