use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Long,
    Short,
    Hold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HoldReason {
    ModelUnavailable,
    NoSequences,
}

/// One inference decision. Ephemeral; never persisted by the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub symbol: String,
    pub timeframe: String,
    pub direction: Direction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probability: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<HoldReason>,
}

impl Signal {
    pub fn hold(symbol: &str, timeframe: &str, reason: HoldReason) -> Self {
        Self {
            symbol: symbol.to_string(),
            timeframe: timeframe.to_string(),
            direction: Direction::Hold,
            probability: None,
            threshold: None,
            reason: Some(reason),
        }
    }

    pub fn decision(symbol: &str, timeframe: &str, probability: f64, threshold: f64) -> Self {
        let direction = if probability >= threshold {
            Direction::Long
        } else {
            Direction::Short
        };
        Self {
            symbol: symbol.to_string(),
            timeframe: timeframe.to_string(),
            direction,
            probability: Some(probability),
            threshold: Some(threshold),
            reason: None,
        }
    }
}
