//! TRAPI message model

mod message;
pub mod validate;

pub use message::{
    Analysis, Attribute, AuxiliaryGraph, EdgeBinding, KEdge, KNode, KnowledgeGraph, Message,
    NodeBinding, QEdge, QNode, Qualifier, QualifierConstraint, Query, QueryGraph,
    RetrievalSource, SetInterpretation, TrapiResult,
};
pub use validate::structural_problems;
