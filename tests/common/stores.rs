//! Store fixtures
//!
//! Counts are chosen so the Poisson tail lands well clear of the default
//! thresholds: with `n == x` and a population of 20000, three supporters out
//! of three draws give p ≈ 7e-11 and four out of fourteen give p ≈ 2.6e-12.

use answer_coalesce::storage::ProvenanceRecord;
use answer_coalesce::{EdgeKey, MemoryLookupStore, MemoryPropertyStore, PredicateSpec};

pub const GENE: &str = "biolink:Gene";
pub const CHEMICAL: &str = "biolink:SmallMolecule";
pub const POPULATION: f64 = 20000.0;

pub fn affects() -> PredicateSpec {
    PredicateSpec::new("biolink:affects")
}

/// Every gene affects `neighbor`; each also has one neighbor of its own
pub fn shared_neighbor_store(genes: &[&str], neighbor: &str, hits: u64) -> MemoryLookupStore {
    let mut store = MemoryLookupStore::new();
    store.set_population(GENE, POPULATION);
    store.set_types(neighbor, &["biolink:BiologicalProcess"]);
    store.set_name(neighbor, "shared process");
    store.set_count(neighbor, &affects(), false, GENE, hits);

    for (i, gene) in genes.iter().enumerate() {
        store.add_edge(gene, affects(), neighbor);
        let private = format!("GO:90000{}", i);
        store.add_edge(gene, affects(), &private);
        store.set_count(&private, &affects(), false, GENE, 1);
    }
    // provenance stored against the reverse orientation for the first gene
    if let Some(first) = genes.first() {
        store.set_provenance(
            &EdgeKey::new(neighbor, affects(), *first),
            vec![ProvenanceRecord::primary("infores:go-cam")],
        );
    }
    store
}

/// Fifteen neighbors over a ring of genes, neighbor `k` shared by genes
/// `k..k+4` (mod the ring size)
pub fn overlapping_neighbor_store(genes: &[String]) -> MemoryLookupStore {
    let mut store = MemoryLookupStore::new();
    store.set_population(GENE, POPULATION);
    for k in 0..15 {
        let neighbor = format!("GO:{:07}", 100 + k);
        store.set_types(&neighbor, &["biolink:BiologicalProcess"]);
        store.set_count(&neighbor, &affects(), false, GENE, 4);
        for offset in 0..4 {
            let gene = &genes[(k + offset) % genes.len()];
            store.add_edge(gene, affects(), &neighbor);
        }
    }
    store
}

/// Four chemicals; the first three share two roles, the rarer one listed
/// as `"CHEBI_ROLE_antifungal_agent"`
pub fn property_store() -> MemoryPropertyStore {
    let mut store = MemoryPropertyStore::new();
    store.set_population(CHEMICAL, 10000);
    let shared = ["CHEBI_ROLE_antifungal_agent", "CHEBI_ROLE_antibacterial_agent"];
    store.set_properties("CHEBI:1", CHEMICAL, &[shared[0], shared[1], "CHEBI_ROLE_dye"]);
    store.set_properties("CHEBI:2", CHEMICAL, &[shared[0], shared[1]]);
    store.set_properties("CHEBI:3", CHEMICAL, &[shared[0], shared[1], "CHEBI_ROLE_solvent"]);
    store.set_properties("CHEBI:4", CHEMICAL, &["CHEBI_ROLE_fuel"]);
    store.set_property_count(shared[0], CHEMICAL, 10);
    store.set_property_count(shared[1], CHEMICAL, 20);
    store
}
