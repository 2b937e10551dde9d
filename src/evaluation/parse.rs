//! Model reply parsing and the error fallback.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::evaluation::model::ModelError;

#[derive(Debug, thiserror::Error)]
pub enum EvaluationError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("model reply contains no JSON object")]
    NoJson,

    #[error("model reply is not valid evaluation JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("model reply has no numeric score")]
    MissingScore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Decision {
    Approved,
    Rejected,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Approved => "APPROVED",
            Decision::Rejected => "REJECTED",
        }
    }

    fn from_score(score: u8, threshold: u8) -> Self {
        if score >= threshold {
            Decision::Approved
        } else {
            Decision::Rejected
        }
    }
}

/// A normalized model evaluation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    pub score: u8,
    pub decision: Decision,
    pub reasoning: String,
    pub category_match: String,
    pub market_potential: String,
    pub evaluation_method: &'static str,
}

#[derive(Debug, Deserialize)]
struct RawEvaluation {
    score: Option<Value>,
    decision: Option<String>,
    reasoning: Option<String>,
    category_match: Option<String>,
    market_potential: Option<String>,
}

/// Parse the first JSON object in `reply`.
///
/// Score is clamped to 0..=100. Unrecognized or missing decisions are
/// derived from `threshold`.
pub fn parse_evaluation(reply: &str, threshold: u8) -> Result<Evaluation, EvaluationError> {
    let start = reply.find('{').ok_or(EvaluationError::NoJson)?;
    let end = reply.rfind('}').ok_or(EvaluationError::NoJson)?;
    if end < start {
        return Err(EvaluationError::NoJson);
    }

    let raw: RawEvaluation = serde_json::from_str(&reply[start..=end])?;

    let score = match raw.score {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|s| s.is_finite())
    .ok_or(EvaluationError::MissingScore)?;
    let score = score.round().clamp(0.0, 100.0) as u8;

    let decision = match raw.decision.as_deref().map(|d| d.trim().to_ascii_uppercase()) {
        Some(d) if d == "APPROVED" => Decision::Approved,
        Some(d) if d == "REJECTED" => Decision::Rejected,
        _ => Decision::from_score(score, threshold),
    };

    let market_potential = match raw.market_potential.as_deref().map(str::trim) {
        Some(p) if p.eq_ignore_ascii_case("high") => "High",
        Some(p) if p.eq_ignore_ascii_case("low") => "Low",
        _ => "Medium",
    };

    Ok(Evaluation {
        score,
        decision,
        reasoning: raw
            .reasoning
            .unwrap_or_else(|| "No reasoning provided".to_string()),
        category_match: raw
            .category_match
            .unwrap_or_else(|| "Not assessed".to_string()),
        market_potential: market_potential.to_string(),
        evaluation_method: "ai_model",
    })
}

/// Evaluation returned alongside a 500 when the model path fails.
#[derive(Debug, Clone, Serialize)]
pub struct FallbackEvaluation {
    pub score: u8,
    pub decision: Decision,
    pub reasoning: &'static str,
    pub category_match: &'static str,
    pub market_potential: &'static str,
    pub error: bool,
    pub evaluation_method: &'static str,
    pub processing_time_ms: u64,
}

impl FallbackEvaluation {
    pub fn new(processing_time_ms: u64) -> Self {
        Self {
            score: 75,
            decision: Decision::Approved,
            reasoning: "Automatic approval due to AI service error - manual review recommended",
            category_match: "Unable to assess due to system error",
            market_potential: "Medium",
            error: true,
            evaluation_method: "error_fallback",
            processing_time_ms,
        }
    }
}
