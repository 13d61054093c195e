use crate::error::{AgentError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lower bound of every risk score.
pub const RISK_SCORE_MIN: f64 = 0.0;
/// Upper bound of every risk score.
pub const RISK_SCORE_MAX: f64 = 100.0;

/// Checks that `score` lies in `[0, 100]`.
///
/// # Errors
/// Returns `ScoreOutOfBounds` for NaN or out-of-range values.
pub fn validate_score(score: f64) -> Result<f64> {
    if score.is_finite() && (RISK_SCORE_MIN..=RISK_SCORE_MAX).contains(&score) {
        Ok(score)
    } else {
        Err(AgentError::ScoreOutOfBounds { score })
    }
}

/// Clamps a finite score into `[0, 100]`; NaN maps to the upper bound.
#[must_use]
pub fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        RISK_SCORE_MAX
    } else {
        score.clamp(RISK_SCORE_MIN, RISK_SCORE_MAX)
    }
}

/// One stored historical assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskMemoryEntry {
    /// Monotonic insertion id.
    pub id: i64,
    pub token: String,
    pub risk_score: f64,
    pub embedding: Vec<f32>,
    pub created_at: DateTime<Utc>,
}

/// An assessment to append to memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRiskMemoryEntry {
    pub token: String,
    pub risk_score: f64,
    pub embedding: Vec<f32>,
}

/// A memory entry paired with its distance to a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    pub entry: RiskMemoryEntry,
    /// Cosine distance, `1 - cos(query, entry)`, in `[0, 2]`.
    pub distance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskCategory {
    Low,
    Medium,
    High,
}

impl fmt::Display for RiskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => f.write_str("low"),
            Self::Medium => f.write_str("medium"),
            Self::High => f.write_str("high"),
        }
    }
}

/// Fixed cut-offs that map a score to a [`RiskCategory`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CategoryThresholds {
    /// Scores strictly below this are `Low`.
    pub low_below: f64,
    /// Scores at or above this are `High`.
    pub high_at_or_above: f64,
}

impl Default for CategoryThresholds {
    fn default() -> Self {
        Self {
            low_below: 40.0,
            high_at_or_above: 70.0,
        }
    }
}

impl CategoryThresholds {
    #[must_use]
    pub fn categorize(&self, score: f64) -> RiskCategory {
        if score < self.low_below {
            RiskCategory::Low
        } else if score >= self.high_at_or_above {
            RiskCategory::High
        } else {
            RiskCategory::Medium
        }
    }
}

/// Result of a risk assessment for one token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub token: String,
    /// Final blended score in `[0, 100]`.
    pub score: f64,
    pub category: RiskCategory,
    /// Score from the risk model on current features alone.
    pub fresh_score: f64,
    /// Distance-weighted score of retrieved neighbours, if any were found.
    pub memory_score: Option<f64>,
    /// Retrieved neighbours, nearest first.
    pub evidence: Vec<Neighbor>,
    /// Embedding of the assessed features, reusable for `record`.
    #[serde(skip)]
    pub embedding: Vec<f32>,
    pub assessed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_score_bounds() {
        assert!(validate_score(0.0).is_ok());
        assert!(validate_score(100.0).is_ok());
        assert!(validate_score(-0.1).is_err());
        assert!(validate_score(100.5).is_err());
        assert!(validate_score(f64::NAN).is_err());
    }

    #[test]
    fn test_clamp_score() {
        assert!((clamp_score(130.0) - 100.0).abs() < f64::EPSILON);
        assert!(clamp_score(-3.0).abs() < f64::EPSILON);
        assert!((clamp_score(f64::NAN) - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_categorize_thresholds() {
        let thresholds = CategoryThresholds::default();
        assert_eq!(thresholds.categorize(39.9), RiskCategory::Low);
        assert_eq!(thresholds.categorize(40.0), RiskCategory::Medium);
        assert_eq!(thresholds.categorize(69.99), RiskCategory::Medium);
        assert_eq!(thresholds.categorize(70.0), RiskCategory::High);
    }
}
