//! Engine configuration and per-request parameters
//!
//! `EngineConfig` holds the product decisions (denylists, symmetric
//! predicates, the tail strategy) and is fixed for the life of a
//! [`Coalescer`](super::Coalescer). `CoalesceParams` arrives with each request.

use super::engine::{CoalesceError, CoalesceResult};
use crate::stats::TailStrategy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

/// Resource id stamped on everything coalescence creates
pub const DEFAULT_RESOURCE_ID: &str = "infores:answercoalesce";

/// Default p-value cut for a winning enrichment
pub const DEFAULT_PVALUE_THRESHOLD: f64 = 1e-6;

/// Category assumed when a query node declares none
pub const NAMED_THING: &str = "biolink:NamedThing";

fn strings(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Process-level configuration, immutable once the engine is built
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Concepts too generic to be meaningful enrichment winners
    pub generic_concepts: BTreeSet<String>,
    /// Chemical roles too generic to be meaningful shared properties
    pub bad_properties: BTreeSet<String>,
    /// Predicates always excluded, whatever the request says
    pub default_excluded_predicates: BTreeSet<String>,
    /// Predicates whose edges may be read in either orientation
    pub symmetric_predicates: BTreeSet<String>,
    /// Semantic types the property store covers
    pub property_semantic_types: BTreeSet<String>,
    pub tail_strategy: TailStrategy,
    pub resource_id: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            generic_concepts: strings(&[
                "MONDO:0000001",
                "MONDO:0700096",
                "HP:0000001",
                "HP:0000118",
                "UBERON:0000061",
                "UBERON:0000465",
                "UBERON:0000468",
                "UBERON:0001062",
                "GO:0003674",
                "GO:0005575",
                "GO:0008150",
                "NCBITaxon:9606",
                "CHEBI:23367",
                "CHEBI:24431",
                "CHEBI:33579",
                "CHEBI:36357",
                "CL:0000000",
                "PR:000000001",
            ]),
            bad_properties: strings(&[
                "CHEBI_ROLE_role",
                "CHEBI_ROLE_biological_role",
                "CHEBI_ROLE_chemical_role",
                "CHEBI_ROLE_application",
                "CHEBI_ROLE_pharmaceutical",
                "CHEBI_ROLE_drug",
                "CHEBI_ROLE_metabolite",
            ]),
            default_excluded_predicates: strings(&[
                "biolink:related_to_at_concept_level",
                "biolink:related_to_at_instance_level",
            ]),
            symmetric_predicates: strings(&[
                "biolink:related_to",
                "biolink:associated_with",
                "biolink:correlated_with",
                "biolink:coexists_with",
                "biolink:interacts_with",
                "biolink:physically_interacts_with",
                "biolink:genetically_interacts_with",
                "biolink:similar_to",
                "biolink:close_match",
                "biolink:same_as",
            ]),
            property_semantic_types: strings(&[
                "biolink:ChemicalEntity",
                "biolink:SmallMolecule",
                "biolink:Drug",
                "biolink:MolecularMixture",
                "biolink:ChemicalMixture",
                "biolink:ComplexMolecularMixture",
            ]),
            tail_strategy: TailStrategy::default(),
            resource_id: DEFAULT_RESOURCE_ID.to_string(),
        }
    }
}

impl EngineConfig {
    /// Parse a YAML document; absent fields keep their defaults
    pub fn from_yaml_str(yaml: &str) -> CoalesceResult<Self> {
        serde_yaml::from_str(yaml).map_err(|e| CoalesceError::Config(e.to_string()))
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> CoalesceResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| CoalesceError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_yaml_str(&text)
    }

    pub fn is_symmetric(&self, predicate: &str) -> bool {
        self.symmetric_predicates.contains(predicate)
    }
}

/// Which shape of input coalescence works on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoalesceMode {
    /// Group existing results and summarize each group
    Coalesce,
    /// Answer a multi-curie set query from its member list
    Query,
}

/// Which enrichment engines run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnrichmentMethod {
    #[default]
    Graph,
    Property,
    All,
}

impl EnrichmentMethod {
    pub fn includes_graph(self) -> bool {
        matches!(self, Self::Graph | Self::All)
    }

    pub fn includes_property(self) -> bool {
        matches!(self, Self::Property | Self::All)
    }
}

/// Per-request workflow parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoalesceParams {
    /// `None` picks query mode when the query graph has a set node
    pub mode: Option<CoalesceMode>,
    pub method: EnrichmentMethod,
    pub pvalue_threshold: f64,
    pub predicates_to_exclude: Vec<String>,
    /// Cap on winning enrichments per opportunity and method; `None` is unlimited
    #[serde(alias = "coalesce_threshold")]
    pub result_length: Option<usize>,
    pub properties_to_exclude: Vec<String>,
    /// When non-empty, only these properties may win
    pub property_constraints: Vec<String>,
}

impl Default for CoalesceParams {
    fn default() -> Self {
        Self {
            mode: None,
            method: EnrichmentMethod::default(),
            pvalue_threshold: DEFAULT_PVALUE_THRESHOLD,
            predicates_to_exclude: Vec::new(),
            result_length: None,
            properties_to_exclude: Vec::new(),
            property_constraints: Vec::new(),
        }
    }
}

impl CoalesceParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mode(mut self, mode: CoalesceMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn with_method(mut self, method: EnrichmentMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_pvalue_threshold(mut self, threshold: f64) -> Self {
        self.pvalue_threshold = threshold;
        self
    }

    pub fn with_result_length(mut self, length: usize) -> Self {
        self.result_length = Some(length);
        self
    }

    pub fn excluding_predicate(mut self, predicate: impl Into<String>) -> Self {
        self.predicates_to_exclude.push(predicate.into());
        self
    }

    pub fn excluding_property(mut self, property: impl Into<String>) -> Self {
        self.properties_to_exclude.push(property.into());
        self
    }

    pub fn validate(&self) -> CoalesceResult<()> {
        if !(self.pvalue_threshold > 0.0 && self.pvalue_threshold <= 1.0) {
            return Err(CoalesceError::Config(format!(
                "pvalue_threshold must be in (0, 1], got {}",
                self.pvalue_threshold
            )));
        }
        Ok(())
    }

    /// Request exclusions merged with the engine's defaults
    pub fn excluded_predicates(&self, config: &EngineConfig) -> BTreeSet<String> {
        config
            .default_excluded_predicates
            .iter()
            .chain(&self.predicates_to_exclude)
            .cloned()
            .collect()
    }

    /// Request exclusions merged with the engine's generic roles
    pub fn excluded_properties(&self, config: &EngineConfig) -> BTreeSet<String> {
        config
            .bad_properties
            .iter()
            .chain(&self.properties_to_exclude)
            .cloned()
            .collect()
    }
}
