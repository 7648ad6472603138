//! Similarity metrics.
//!
//! Every metric is reported as a score where higher means more similar, so the
//! index ranks results the same way whichever metric an index was created with.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Similarity metric, fixed per index.
///
/// - **Cosine**: angle between vectors; the usual choice for text embeddings.
/// - **DotProduct**: raw inner product; equals cosine for unit-length vectors.
/// - **Euclidean**: L2 distance mapped to `1 / (1 + d)`.
/// - **Manhattan**: L1 distance mapped to `1 / (1 + d)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// Cosine similarity, range [-1, 1].
    #[default]
    Cosine,
    /// Inner product, unbounded.
    DotProduct,
    /// Euclidean distance as a (0, 1] similarity.
    Euclidean,
    /// Manhattan distance as a (0, 1] similarity.
    Manhattan,
}

impl DistanceMetric {
    /// Score `a` against `b`. Callers guarantee equal lengths.
    #[inline]
    pub fn similarity(&self, a: &[f32], b: &[f32]) -> f32 {
        debug_assert_eq!(a.len(), b.len(), "Vector dimensions must match");

        match self {
            DistanceMetric::Cosine => cosine(a, b),
            DistanceMetric::DotProduct => dot(a, b),
            DistanceMetric::Euclidean => 1.0 / (1.0 + l2(a, b)),
            DistanceMetric::Manhattan => 1.0 / (1.0 + l1(a, b)),
        }
    }

    /// Get the name of this metric as written in config files.
    pub fn name(&self) -> &'static str {
        match self {
            DistanceMetric::Cosine => "cosine",
            DistanceMetric::DotProduct => "dot_product",
            DistanceMetric::Euclidean => "euclidean",
            DistanceMetric::Manhattan => "manhattan",
        }
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for DistanceMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cosine" | "cos" => Ok(DistanceMetric::Cosine),
            "dot" | "dot_product" | "inner" => Ok(DistanceMetric::DotProduct),
            "euclidean" | "l2" => Ok(DistanceMetric::Euclidean),
            "manhattan" | "l1" => Ok(DistanceMetric::Manhattan),
            _ => Err(format!("Unknown distance metric: {}", s)),
        }
    }
}

#[inline]
fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[inline]
fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let (mut ab, mut aa, mut bb) = (0.0f32, 0.0f32, 0.0f32);
    for (x, y) in a.iter().zip(b) {
        ab += x * y;
        aa += x * x;
        bb += y * y;
    }

    let denom = (aa * bb).sqrt();
    // Zero vectors are orthogonal to everything.
    if denom == 0.0 {
        0.0
    } else {
        ab / denom
    }
}

#[inline]
fn l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

#[inline]
fn l1(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_identical_and_orthogonal() {
        let a = [1.0, 0.0, 0.0];
        assert!((DistanceMetric::Cosine.similarity(&a, &a) - 1.0).abs() < 1e-5);
        assert!(DistanceMetric::Cosine.similarity(&a, &[0.0, 1.0, 0.0]).abs() < 1e-5);
    }

    #[test]
    fn test_cosine_zero_vector() {
        assert_eq!(DistanceMetric::Cosine.similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_dot_product() {
        let sim = DistanceMetric::DotProduct.similarity(&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]);
        assert!((sim - 32.0).abs() < 1e-5);
    }

    #[test]
    fn test_distance_metrics_higher_is_closer() {
        let origin = [0.0, 0.0, 0.0];
        let near = [1.0, 0.0, 0.0];
        let far = [1.0, 2.0, 3.0];
        for metric in [DistanceMetric::Euclidean, DistanceMetric::Manhattan] {
            assert!(metric.similarity(&origin, &near) > metric.similarity(&origin, &far));
            assert!((metric.similarity(&origin, &origin) - 1.0).abs() < 1e-5);
        }
        // L1 of (1, 2, 3) is 6
        assert!((DistanceMetric::Manhattan.similarity(&origin, &far) - 1.0 / 7.0).abs() < 1e-5);
    }

    #[test]
    fn test_metric_from_str() {
        assert_eq!("cosine".parse::<DistanceMetric>().unwrap(), DistanceMetric::Cosine);
        assert_eq!("l2".parse::<DistanceMetric>().unwrap(), DistanceMetric::Euclidean);
        assert_eq!("dot".parse::<DistanceMetric>().unwrap(), DistanceMetric::DotProduct);
        assert_eq!("L1".parse::<DistanceMetric>().unwrap(), DistanceMetric::Manhattan);
        assert!("hamming".parse::<DistanceMetric>().is_err());
    }

    #[test]
    fn test_name_round_trips() {
        for metric in [
            DistanceMetric::Cosine,
            DistanceMetric::DotProduct,
            DistanceMetric::Euclidean,
            DistanceMetric::Manhattan,
        ] {
            assert_eq!(metric.name().parse::<DistanceMetric>().unwrap(), metric);
        }
    }
}
