//! The coalescence entry point

use super::assemble::ResultAssembler;
use super::config::{CoalesceMode, CoalesceParams, EngineConfig};
use super::enrichment::{GraphEnricher, LinkFilter};
use super::opportunity::{extract_opportunities, extract_set_query, SetQuery};
use super::patch::{PatchBuilder, PropertyPatch};
use super::property::PropertyEnricher;
use crate::graph::ParseError;
use crate::storage::{LookupStore, PropertyStore, StorageError};
use crate::trapi::Message;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors that abort a coalescence run
#[derive(Debug, Error)]
pub enum CoalesceError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Invalid predicate spec: {0}")]
    InvalidPredicateSpec(String),

    #[error("Invalid edge key: {0}")]
    InvalidEdgeKey(String),

    #[error("Invalid opportunity: {0}")]
    InvalidOpportunity(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<ParseError> for CoalesceError {
    fn from(e: ParseError) -> Self {
        match e {
            ParseError::PredicateSpec(s) => Self::InvalidPredicateSpec(s),
            ParseError::EdgeKey(s) => Self::InvalidEdgeKey(s),
        }
    }
}

/// Result type for coalescence operations
pub type CoalesceResult<T> = Result<T, CoalesceError>;

/// What a run produced
#[derive(Debug, Clone)]
pub struct CoalesceOutcome {
    pub message: Message,
    pub mode: CoalesceMode,
    /// Patches in application order
    pub patches: Vec<PropertyPatch>,
    pub opportunities: usize,
}

/// Coalesces TRAPI answer sets against read-only knowledge stores
///
/// Holds no per-request state: every call builds its own enrichers (and so
/// its own tail caches), which makes a shared `Coalescer` safe to use from
/// concurrent requests.
pub struct Coalescer {
    lookup: Arc<dyn LookupStore>,
    properties: Option<Arc<dyn PropertyStore>>,
    config: EngineConfig,
}

impl Coalescer {
    pub fn new(lookup: Arc<dyn LookupStore>) -> Self {
        Self {
            lookup,
            properties: None,
            config: EngineConfig::default(),
        }
    }

    pub fn with_property_store(mut self, store: Arc<dyn PropertyStore>) -> Self {
        self.properties = Some(store);
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run one coalescence
    ///
    /// Every enrichment and patch is computed before the message is touched,
    /// so a store failure leaves nothing half-applied. A message with nothing
    /// to coalesce comes back unchanged.
    pub fn coalesce(&self, message: &Message, params: &CoalesceParams) -> CoalesceResult<CoalesceOutcome> {
        params.validate()?;

        let set_query = extract_set_query(&message.query_graph);
        let mode = params.mode.unwrap_or(if set_query.is_some() {
            CoalesceMode::Query
        } else {
            CoalesceMode::Coalesce
        });

        let outcome = match mode {
            CoalesceMode::Query => match set_query {
                Some(query) => self.answer_set(message, &query, params)?,
                None => {
                    info!("no set node in query graph, nothing to coalesce");
                    self.unchanged(message, mode)
                }
            },
            CoalesceMode::Coalesce => self.coalesce_results(message, params)?,
        };

        info!(
            mode = ?outcome.mode,
            opportunities = outcome.opportunities,
            patches = outcome.patches.len(),
            results = outcome.message.results.len(),
            "coalescence finished"
        );
        Ok(outcome)
    }

    /// Like [`coalesce`](Self::coalesce), but any failure returns the input unchanged
    pub fn coalesce_or_passthrough(&self, message: Message, params: &CoalesceParams) -> Message {
        match self.coalesce(&message, params) {
            Ok(outcome) => outcome.message,
            Err(e) => {
                warn!("coalescence failed, returning message unchanged: {}", e);
                message
            }
        }
    }

    fn unchanged(&self, message: &Message, mode: CoalesceMode) -> CoalesceOutcome {
        CoalesceOutcome {
            message: message.clone(),
            mode,
            patches: Vec::new(),
            opportunities: 0,
        }
    }

    fn answer_set(&self, message: &Message, query: &SetQuery, params: &CoalesceParams) -> CoalesceResult<CoalesceOutcome> {
        if !params.method.includes_graph() {
            debug!(method = ?params.method, "set queries only support graph enrichment");
            return Ok(self.unchanged(message, CoalesceMode::Query));
        }

        let filter = LinkFilter::new()
            .excluding_predicates(params.excluded_predicates(&self.config))
            .allowing(query.answer_edge.clone())
            .with_member_orientation(query.set_is_subject)
            .excluding_entities([query.set_id.clone()])
            .with_answer_type(query.answer_type.clone());
        let mut enricher = GraphEnricher::new(self.lookup.as_ref(), &self.config);
        let enrichments = enricher.enrich(&query.members, &query.set_category, &filter, params.pvalue_threshold)?;

        let builder = PatchBuilder::new(self.lookup.as_ref(), &self.config);
        let patches = builder.build_for_set(query, &enrichments, params.result_length)?;

        let mut assembler = ResultAssembler::new(message.clone(), &self.config);
        for patch in &patches {
            assembler.apply_set(query, patch);
        }
        Ok(CoalesceOutcome {
            message: assembler.finish(),
            mode: CoalesceMode::Query,
            patches,
            opportunities: 1,
        })
    }

    fn coalesce_results(&self, message: &Message, params: &CoalesceParams) -> CoalesceResult<CoalesceOutcome> {
        let opportunities = extract_opportunities(message);
        let excluded_predicates = params.excluded_predicates(&self.config);
        let excluded_properties = params.excluded_properties(&self.config);

        let builder = PatchBuilder::new(self.lookup.as_ref(), &self.config);
        let mut graph = GraphEnricher::new(self.lookup.as_ref(), &self.config);
        let mut property = match (&self.properties, params.method.includes_property()) {
            (Some(store), true) => Some(PropertyEnricher::new(store.as_ref(), &self.config)),
            (None, true) => {
                debug!("property enrichment requested without a property store");
                None
            }
            _ => None,
        };

        let mut patches = Vec::new();
        for opportunity in &opportunities {
            if params.method.includes_graph() {
                let filter = LinkFilter::new()
                    .excluding_predicates(excluded_predicates.clone())
                    .excluding_entities(opportunity.bound_elsewhere().iter().cloned());
                let enrichments = graph.enrich(
                    opportunity.kg_ids(),
                    opportunity.semantic_type(),
                    &filter,
                    params.pvalue_threshold,
                )?;
                patches.extend(builder.build(opportunity, &enrichments, params.result_length)?);
            }
            if let Some(enricher) = property.as_mut() {
                let enrichments = enricher.enrich(
                    opportunity.kg_ids(),
                    opportunity.semantic_type(),
                    &excluded_properties,
                    &params.property_constraints,
                    params.pvalue_threshold,
                )?;
                patches.extend(builder.build(opportunity, &enrichments, params.result_length)?);
            }
        }

        let mut assembler = ResultAssembler::new(message.clone(), &self.config);
        for patch in &patches {
            assembler.apply(patch);
        }
        debug!(added = assembler.added_results(), "patches applied");
        Ok(CoalesceOutcome {
            message: assembler.finish(),
            mode: CoalesceMode::Coalesce,
            patches,
            opportunities: opportunities.len(),
        })
    }
}
