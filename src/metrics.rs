//! Derived per-row scores: next-zero probability, ghost value, shaving.

use serde::Serialize;
use thiserror::Error;

use crate::dataset::{CurrencyEvent, ZERO_NORMALIZER};
use crate::feed::rates::RateTable;

const RISK_WEIGHT: f64 = 0.5;
const ZEROS_WEIGHT: f64 = 0.3;
const INSTABILITY_WEIGHT: f64 = 0.2;

/// Probability above which a risk card is drawn in the primary colour.
pub const HIGHLIGHT_THRESHOLD: f64 = 70.0;

/// Weighted "next zero" score as a percentage.
pub fn next_zero_probability(event: &CurrencyEvent) -> f64 {
    let zeros = f64::from(event.zeros_removed) / ZERO_NORMALIZER;
    (event.risk * RISK_WEIGHT + zeros * ZEROS_WEIGHT + (1.0 - event.stability) * INSTABILITY_WEIGHT)
        * 100.0
}

/// Events ordered by probability, highest first. Ties keep input order.
pub fn rank_by_risk(events: &[CurrencyEvent]) -> Vec<&CurrencyEvent> {
    let mut scored: Vec<(f64, &CurrencyEvent)> =
        events.iter().map(|e| (next_zero_probability(e), e)).collect();
    // sort_by is stable
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored.into_iter().map(|(_, e)| e).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskCard {
    pub country: String,
    pub probability: f64,
    pub highlighted: bool,
}

pub fn top_risks(events: &[CurrencyEvent], n: usize) -> Vec<RiskCard> {
    rank_by_risk(events)
        .into_iter()
        .take(n)
        .map(|e| {
            let probability = next_zero_probability(e);
            RiskCard {
                country: e.country.clone(),
                probability,
                highlighted: probability > HIGHLIGHT_THRESHOLD,
            }
        })
        .collect()
}

/// Pre-redenomination units per USD. Unknown currencies use a rate of 1.0.
pub fn ghost_value(event: &CurrencyEvent, rates: &RateTable) -> f64 {
    let rate = rates.rate_or(&event.base_currency, 1.0);
    rate * 10f64.powi(event.zeros_removed as i32)
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ShaveError {
    #[error("unsupported redaction level 10^{0}; expected one of 3, 6, 9, 12, 15, 29")]
    UnsupportedExponent(u32),
}

/// The allowed "divide by 10^N" levels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum ShaveLevel {
    #[default]
    Thousand,
    Million,
    Billion,
    Trillion,
    Quadrillion,
    Pengo,
}

impl ShaveLevel {
    pub const ALL: [ShaveLevel; 6] = [
        ShaveLevel::Thousand,
        ShaveLevel::Million,
        ShaveLevel::Billion,
        ShaveLevel::Trillion,
        ShaveLevel::Quadrillion,
        ShaveLevel::Pengo,
    ];

    pub fn exponent(self) -> u32 {
        match self {
            ShaveLevel::Thousand => 3,
            ShaveLevel::Million => 6,
            ShaveLevel::Billion => 9,
            ShaveLevel::Trillion => 12,
            ShaveLevel::Quadrillion => 15,
            ShaveLevel::Pengo => 29,
        }
    }
}

impl TryFrom<u32> for ShaveLevel {
    type Error = ShaveError;

    fn try_from(exponent: u32) -> Result<Self, Self::Error> {
        ShaveLevel::ALL
            .into_iter()
            .find(|l| l.exponent() == exponent)
            .ok_or(ShaveError::UnsupportedExponent(exponent))
    }
}

pub fn shave(value: f64, level: ShaveLevel) -> f64 {
    value / 10f64.powi(level.exponent() as i32)
}
