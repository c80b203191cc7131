//! Statistical primitives: enrichment tail probabilities and p-value combination

pub mod combine;
mod tail;

pub use combine::{clip, combine, CombineMethod, MIN_P};
pub use tail::{TailCache, TailStrategy};
