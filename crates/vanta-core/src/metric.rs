//! Vector math for similarity search.
//!
//! All functions operate on `f64` components. Vectors of unequal length are
//! zero-padded on the shorter side; the collection layer rejects mismatched
//! dimensions before they reach this module.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Distance metric for vector similarity search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// Cosine similarity, in [-1, 1].
    Cosine,
    /// Euclidean (L2) distance.
    Euclidean,
    /// Dot product.
    Dot,
}

impl DistanceMetric {
    /// Returns the canonical lowercase string form.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Cosine => "cosine",
            Self::Euclidean => "euclidean",
            Self::Dot => "dot",
        }
    }

    /// Computes the unified score between two vectors.
    ///
    /// Higher is always more similar: Euclidean distance is negated so that
    /// every call site can sort descending regardless of metric.
    #[must_use]
    pub fn score(&self, a: &[f64], b: &[f64]) -> f64 {
        score(a, b, *self)
    }
}

impl Default for DistanceMetric {
    fn default() -> Self {
        Self::Cosine
    }
}

impl FromStr for DistanceMetric {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cosine" => Ok(Self::Cosine),
            "euclidean" => Ok(Self::Euclidean),
            "dot" => Ok(Self::Dot),
            _ => Err(()),
        }
    }
}

#[inline]
fn component(v: &[f64], i: usize) -> f64 {
    v.get(i).copied().unwrap_or(0.0)
}

/// Computes the dot product between two vectors.
#[must_use]
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    (0..a.len().max(b.len()))
        .map(|i| component(a, i) * component(b, i))
        .sum()
}

/// Computes the L2 magnitude of a vector.
#[must_use]
pub fn magnitude(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

/// Computes the cosine similarity between two vectors.
///
/// Returns 0 when either vector has zero magnitude.
#[must_use]
pub fn cosine(a: &[f64], b: &[f64]) -> f64 {
    let norm_a = magnitude(a);
    let norm_b = magnitude(b);
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot(a, b) / (norm_a * norm_b)
}

/// Computes the Euclidean (L2) distance between two vectors.
#[must_use]
pub fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    (0..a.len().max(b.len()))
        .map(|i| {
            let d = component(a, i) - component(b, i);
            d * d
        })
        .sum::<f64>()
        .sqrt()
}

/// Returns a unit-length copy of the vector.
///
/// The zero vector is returned unchanged.
#[must_use]
pub fn normalize(v: &[f64]) -> Vec<f64> {
    let norm = magnitude(v);
    if norm == 0.0 {
        return v.to_vec();
    }
    v.iter().map(|x| x / norm).collect()
}

/// Computes the unified similarity score; higher is always more similar.
#[must_use]
pub fn score(a: &[f64], b: &[f64], metric: DistanceMetric) -> f64 {
    match metric {
        DistanceMetric::Cosine => cosine(a, b),
        DistanceMetric::Euclidean => -euclidean(a, b),
        DistanceMetric::Dot => dot(a, b),
    }
}
