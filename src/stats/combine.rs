//! Combining independent enrichment p-values
//!
//! Used when several enrichments support the same conclusion. All functions
//! are pure, clip their inputs to `[MIN_P, 1]`, and return `None` for an
//! empty input.

use statrs::distribution::{ChiSquared, ContinuousCDF, Normal};
use statrs::function::beta::beta_reg;

/// Smallest p-value allowed into combination math
pub const MIN_P: f64 = 1e-15;

/// Available combination methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombineMethod {
    Stouffer,
    Simes,
    Fisher,
    WeightedFisher,
    OrderStatistics,
}

impl std::str::FromStr for CombineMethod {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stouffer" => Ok(Self::Stouffer),
            "simes" => Ok(Self::Simes),
            "fisher" => Ok(Self::Fisher),
            "weighted-fisher" | "weighted_fisher" => Ok(Self::WeightedFisher),
            "order-statistics" | "order_statistics" => Ok(Self::OrderStatistics),
            _ => Err(format!("unknown combination method: {}", s)),
        }
    }
}

/// Combine with the given method. `threshold` is the significance level used
/// for Stouffer weights and the Simes α; weighted Fisher derives its weights
/// the same way Stouffer does.
pub fn combine(method: CombineMethod, pvalues: &[f64], threshold: f64) -> Option<f64> {
    match method {
        CombineMethod::Stouffer => stouffer(pvalues, threshold),
        CombineMethod::Simes => simes(pvalues, threshold),
        CombineMethod::Fisher => fisher(pvalues),
        CombineMethod::WeightedFisher => {
            let weights = threshold_weights(pvalues, threshold);
            weighted_fisher(pvalues, &weights)
        }
        CombineMethod::OrderStatistics => order_statistics(pvalues),
    }
}

/// Clip a p-value into `[MIN_P, 1]`; NaN reads as 1
pub fn clip(p: f64) -> f64 {
    if p.is_nan() {
        1.0
    } else {
        p.clamp(MIN_P, 1.0)
    }
}

/// `threshold / p` per input, normalized to sum to 1
fn threshold_weights(pvalues: &[f64], threshold: f64) -> Vec<f64> {
    let raw: Vec<f64> = pvalues.iter().map(|p| threshold / clip(*p)).collect();
    let total: f64 = raw.iter().sum();
    if total > 0.0 && total.is_finite() {
        raw.iter().map(|w| w / total).collect()
    } else {
        vec![1.0 / pvalues.len() as f64; pvalues.len()]
    }
}

/// Weighted Stouffer Z: `Z = Σ wᵢ zᵢ / sqrt(Σ wᵢ²)` with `zᵢ = Φ⁻¹(1 − pᵢ)`
pub fn stouffer(pvalues: &[f64], threshold: f64) -> Option<f64> {
    if pvalues.is_empty() {
        return None;
    }
    let normal = Normal::new(0.0, 1.0).ok()?;
    let weights = threshold_weights(pvalues, threshold);

    let mut numerator = 0.0;
    let mut squares = 0.0;
    for (p, w) in pvalues.iter().zip(&weights) {
        // Keep Φ⁻¹ away from ±∞
        let upper = (1.0 - clip(*p)).clamp(MIN_P, 1.0 - MIN_P);
        numerator += w * normal.inverse_cdf(upper);
        squares += w * w;
    }
    let z = numerator / squares.sqrt();
    Some(clip(normal.sf(z)))
}

/// Simes: the largest sorted `p(i)` with `p(i) ≤ (i/n)·α`, else the smallest p
pub fn simes(pvalues: &[f64], alpha: f64) -> Option<f64> {
    let sorted = sorted_clipped(pvalues);
    let n = sorted.len() as f64;
    let smallest = *sorted.first()?;
    let hit = sorted
        .iter()
        .enumerate()
        .rev()
        .find(|(i, p)| **p <= (*i as f64 + 1.0) / n * alpha)
        .map(|(_, p)| *p);
    Some(hit.unwrap_or(smallest))
}

/// Fisher: `-2 Σ ln pᵢ ~ χ²(2k)`
pub fn fisher(pvalues: &[f64]) -> Option<f64> {
    let weights = vec![1.0; pvalues.len()];
    weighted_fisher(pvalues, &weights)
}

/// Weighted Fisher: weights rescaled to sum to `k`, statistic `-2 Σ wᵢ ln pᵢ`
/// referred to `χ²(2k)`. Equal weights reduce to plain Fisher.
pub fn weighted_fisher(pvalues: &[f64], weights: &[f64]) -> Option<f64> {
    if pvalues.is_empty() || pvalues.len() != weights.len() {
        return None;
    }
    let k = pvalues.len() as f64;
    let total: f64 = weights.iter().sum();
    if !(total > 0.0) {
        return None;
    }
    let statistic: f64 = pvalues
        .iter()
        .zip(weights)
        .map(|(p, w)| -2.0 * (w * k / total) * clip(*p).ln())
        .sum();
    let chi2 = ChiSquared::new(2.0 * k).ok()?;
    Some(clip(chi2.sf(statistic)))
}

/// Order statistics: `ρ = min_r I_{p(r)}(r, n − r + 1)`, Bonferroni-corrected by `n`
pub fn order_statistics(pvalues: &[f64]) -> Option<f64> {
    let sorted = sorted_clipped(pvalues);
    if sorted.is_empty() {
        return None;
    }
    let n = sorted.len();
    let rho = sorted
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let r = (i + 1) as f64;
            beta_reg(r, (n - i) as f64, *p)
        })
        .fold(1.0_f64, f64::min);
    Some(clip(rho * n as f64))
}

fn sorted_clipped(pvalues: &[f64]) -> Vec<f64> {
    let mut sorted: Vec<f64> = pvalues.iter().map(|p| clip(*p)).collect();
    sorted.sort_by(|a, b| a.total_cmp(b));
    sorted
}
