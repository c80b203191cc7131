//! Upper-tail probabilities for enrichment tests
//!
//! The question asked of every candidate is: drawing `draws` entities from a
//! population of `population` that contains `successes` hits, how likely is
//! seeing `x` or more hits? The exact answer is the hypergeometric survival
//! function. The Poisson survival function with `λ = successes·draws/population`
//! approximates it much faster and is the default; it can be off by around a
//! factor of two in the tail, so the choice is configuration, not code.

use serde::{Deserialize, Serialize};
use statrs::distribution::{DiscreteCDF, Hypergeometric, Poisson};
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use tracing::debug;

/// Which distribution evaluates `P(X ≥ x)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TailStrategy {
    #[default]
    Poisson,
    Hypergeometric,
}

impl std::str::FromStr for TailStrategy {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "poisson" => Ok(Self::Poisson),
            "hypergeometric" => Ok(Self::Hypergeometric),
            _ => Err(format!("unknown tail strategy: {}", s)),
        }
    }
}

/// Cache key: `(x - 1, population, successes, draws)`
#[derive(Debug, Clone, Copy)]
struct TailKey {
    above: u64,
    population: f64,
    successes: u64,
    draws: u64,
}

impl PartialEq for TailKey {
    fn eq(&self, other: &Self) -> bool {
        self.above == other.above
            && self.population.to_bits() == other.population.to_bits()
            && self.successes == other.successes
            && self.draws == other.draws
    }
}

impl Eq for TailKey {}

impl Hash for TailKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.above.hash(state);
        self.population.to_bits().hash(state);
        self.successes.hash(state);
        self.draws.hash(state);
    }
}

/// Memoized tail evaluations for one coalescence run
///
/// Owned by a single run and dropped with it; never shared between requests.
#[derive(Debug, Default)]
pub struct TailCache {
    strategy: TailStrategy,
    entries: HashMap<TailKey, f64>,
    hits: usize,
}

impl TailCache {
    pub fn new(strategy: TailStrategy) -> Self {
        Self {
            strategy,
            entries: HashMap::new(),
            hits: 0,
        }
    }

    pub fn strategy(&self) -> TailStrategy {
        self.strategy
    }

    /// Distinct parameter sets evaluated so far
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Lookups answered from the cache
    pub fn hits(&self) -> usize {
        self.hits
    }

    /// `P(X ≥ x)`, always finite and within `[0, 1]`
    pub fn upper_tail(&mut self, x: u64, population: f64, successes: u64, draws: u64) -> f64 {
        if x == 0 {
            return 1.0;
        }
        let key = TailKey {
            above: x - 1,
            population,
            successes,
            draws,
        };
        if let Some(p) = self.entries.get(&key) {
            self.hits += 1;
            return *p;
        }
        let p = sanitize(match self.strategy {
            TailStrategy::Poisson => poisson_sf(key),
            TailStrategy::Hypergeometric => hypergeometric_sf(key),
        });
        self.entries.insert(key, p);
        p
    }
}

fn poisson_sf(key: TailKey) -> f64 {
    let lambda = key.successes as f64 * key.draws as f64 / key.population;
    if !(lambda > 0.0 && lambda.is_finite()) {
        return 1.0;
    }
    match Poisson::new(lambda) {
        Ok(dist) => dist.sf(key.above),
        Err(_) => 1.0,
    }
}

fn hypergeometric_sf(key: TailKey) -> f64 {
    let population = key.population.round().max(0.0) as u64;
    match Hypergeometric::new(population, key.successes, key.draws) {
        Ok(dist) => dist.sf(key.above),
        Err(e) => {
            debug!(
                population,
                successes = key.successes,
                draws = key.draws,
                "hypergeometric parameters rejected ({}), using poisson",
                e
            );
            poisson_sf(key)
        }
    }
}

fn sanitize(p: f64) -> f64 {
    if p.is_nan() {
        1.0
    } else {
        p.clamp(0.0, 1.0)
    }
}
