//! Re-ranking of retrieved passages.
//!
//! A strategy adjusts scores in place; the retrieval engine re-sorts
//! afterwards. Strategies see candidates in descending score order.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::types::RetrievalResult;
use crate::utils::toml_config::{RerankConfig, RerankKind};

pub trait RerankStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn rerank(&self, results: &mut [RetrievalResult], now: DateTime<Utc>);
}

/// Build the strategy selected in `[retrieval.rerank]`.
pub fn from_config(config: &RerankConfig) -> Box<dyn RerankStrategy> {
    match config.strategy {
        RerankKind::None => Box::new(ScoreOrder),
        RerankKind::Recency => Box::new(RecencyBoost {
            weight: config.recency_weight,
            half_life_days: config.half_life_days,
        }),
        RerankKind::SourceDiversity => Box::new(SourceDiversity {
            penalty: config.diversity_penalty,
        }),
    }
}

/// Leaves similarity scores untouched.
pub struct ScoreOrder;

impl RerankStrategy for ScoreOrder {
    fn name(&self) -> &'static str {
        "none"
    }

    fn rerank(&self, _results: &mut [RetrievalResult], _now: DateTime<Utc>) {}
}

/// `score * (1 + weight * 2^(-age / half_life))`, age measured from the
/// document's ingestion time.
pub struct RecencyBoost {
    pub weight: f32,
    pub half_life_days: f32,
}

impl RerankStrategy for RecencyBoost {
    fn name(&self) -> &'static str {
        "recency"
    }

    fn rerank(&self, results: &mut [RetrievalResult], now: DateTime<Utc>) {
        for result in results.iter_mut() {
            let age_days = (now - result.ingested_at).num_seconds().max(0) as f32 / 86_400.0;
            let decay = 2f32.powf(-age_days / self.half_life_days);
            result.score *= 1.0 + self.weight * decay;
        }
    }
}

/// Each further passage from an already-seen source is scaled by
/// `(1 - penalty)^n`, where `n` counts earlier passages from that source.
pub struct SourceDiversity {
    pub penalty: f32,
}

impl RerankStrategy for SourceDiversity {
    fn name(&self) -> &'static str {
        "source-diversity"
    }

    fn rerank(&self, results: &mut [RetrievalResult], _now: DateTime<Utc>) {
        let mut seen: HashMap<String, i32> = HashMap::new();
        for result in results.iter_mut() {
            let count = seen.entry(result.source_uri.clone()).or_insert(0);
            result.score *= (1.0 - self.penalty).powi(*count);
            *count += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn result(id: &str, source: &str, score: f32, age_days: i64) -> RetrievalResult {
        RetrievalResult {
            chunk_id: id.to_string(),
            score,
            text_span: String::new(),
            source_uri: source.to_string(),
            document_id: source.to_string(),
            document_title: source.to_string(),
            header: None,
            sequence_index: 0,
            ingested_at: Utc::now() - Duration::days(age_days),
        }
    }

    #[test]
    fn test_score_order_is_identity() {
        let mut results = vec![result("a", "s", 0.9, 0), result("b", "s", 0.5, 0)];
        let before = results.clone();
        ScoreOrder.rerank(&mut results, Utc::now());
        assert_eq!(results, before);
    }

    #[test]
    fn test_recency_prefers_newer() {
        let strategy = RecencyBoost {
            weight: 0.5,
            half_life_days: 30.0,
        };
        let mut results = vec![result("old", "a", 0.8, 365), result("new", "b", 0.8, 0)];
        strategy.rerank(&mut results, Utc::now());
        assert!(results[1].score > results[0].score);
        assert!((results[1].score - 1.2).abs() < 1e-3);
    }

    #[test]
    fn test_source_diversity_penalizes_repeats() {
        let strategy = SourceDiversity { penalty: 0.5 };
        let mut results = vec![
            result("a1", "a", 0.9, 0),
            result("a2", "a", 0.8, 0),
            result("b1", "b", 0.7, 0),
            result("a3", "a", 0.6, 0),
        ];
        strategy.rerank(&mut results, Utc::now());
        assert!((results[0].score - 0.9).abs() < 1e-6);
        assert!((results[1].score - 0.4).abs() < 1e-6);
        assert!((results[2].score - 0.7).abs() < 1e-6);
        assert!((results[3].score - 0.15).abs() < 1e-6);
    }

    #[test]
    fn test_from_config() {
        let mut config = RerankConfig::default();
        assert_eq!(from_config(&config).name(), "none");
        config.strategy = RerankKind::SourceDiversity;
        assert_eq!(from_config(&config).name(), "source-diversity");
    }
}
