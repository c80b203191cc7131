//! Answer coalescence
//!
//! Finds the graph neighbors or properties statistically over-represented
//! among a group of answers and folds them back into the message:
//!
//! 1. [`extract_opportunities`] / [`extract_set_query`] pick the candidate pools
//! 2. [`GraphEnricher`] and [`PropertyEnricher`] score shared links and properties
//! 3. [`PatchBuilder`] turns winners into [`PropertyPatch`]es
//! 4. [`ResultAssembler`] applies them to the output message
//!
//! [`Coalescer`] runs the whole pipeline for one request.

mod assemble;
mod config;
mod engine;
mod enrichment;
mod opportunity;
mod patch;
mod property;

pub use assemble::{ResultAssembler, MEMBER_OF};
pub use config::{
    CoalesceMode, CoalesceParams, EngineConfig, EnrichmentMethod, DEFAULT_PVALUE_THRESHOLD,
    DEFAULT_RESOURCE_ID, NAMED_THING,
};
pub use engine::{CoalesceError, CoalesceOutcome, CoalesceResult, Coalescer};
pub use enrichment::{Enrichment, EnrichmentKind, GraphEnricher, LinkFilter};
pub use opportunity::{
    extract_opportunities, extract_set_query, predicate_constraints, satisfies, Opportunity, SetQuery,
    RELATED_TO,
};
pub use patch::{
    NewEdge, NewNode, PatchBuilder, PropertyPatch, COHORT_ATTRIBUTE, DIRECTION_ATTRIBUTE,
    METHOD_ATTRIBUTE, PREDICATE_ATTRIBUTE, PROPERTY_ATTRIBUTE, P_VALUE_ATTRIBUTE,
};
pub use property::PropertyEnricher;
