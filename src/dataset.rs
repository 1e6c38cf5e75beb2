//! The static redenomination dataset.

use serde::{Deserialize, Serialize};

/// Normalization constant for `zeros_removed` in the probability score.
///
/// Equals the largest value in the dataset (Hungary 1946). It is pinned here rather
/// than recomputed so that adding a row cannot silently rescale every score;
/// [`validate`] flags rows that exceed it.
pub const ZERO_NORMALIZER: f64 = 29.0;

/// One historical redenomination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrencyEvent {
    pub country: String,
    pub year: i32,
    pub zeros_removed: u32,
    pub iso_code: String,
    pub base_currency: String,
    pub risk: f64,
    pub stability: f64,
    pub faith: f64,
}

impl CurrencyEvent {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        country: &str,
        year: i32,
        zeros_removed: u32,
        iso_code: &str,
        base_currency: &str,
        risk: f64,
        stability: f64,
        faith: f64,
    ) -> Self {
        Self {
            country: country.to_string(),
            year,
            zeros_removed,
            iso_code: iso_code.to_string(),
            base_currency: base_currency.to_string(),
            risk,
            stability,
            faith,
        }
    }
}

// (country, year, zeros, iso, currency, risk, stability, faith)
type Row = (&'static str, i32, u32, &'static str, &'static str, f64, f64, f64);

const ROWS: [Row; 26] = [
    ("Hungary", 1946, 29, "HUN", "HUF", 0.9, 0.1, 0.05),
    ("Zimbabwe", 2009, 12, "ZWE", "ZWL", 0.95, 0.05, 0.1),
    ("Germany", 1923, 12, "DEU", "EUR", 0.1, 0.9, 0.95),
    ("Greece", 1944, 11, "GRC", "EUR", 0.2, 0.8, 0.8),
    ("Venezuela", 2021, 6, "VEN", "VES", 0.9, 0.1, 0.1),
    ("Bolivia", 1987, 6, "BOL", "BOB", 0.4, 0.6, 0.5),
    ("Peru", 1991, 6, "PER", "PEN", 0.3, 0.7, 0.7),
    ("Turkey", 2005, 6, "TUR", "TRY", 0.4, 0.6, 0.5),
    ("Argentina", 1992, 4, "ARG", "ARS", 0.8, 0.2, 0.3),
    ("Brazil", 1994, 3, "BRA", "BRL", 0.3, 0.7, 0.8),
    ("Russia", 1998, 3, "RUS", "RUB", 0.5, 0.5, 0.4),
    ("Mexico", 1993, 3, "MEX", "MXN", 0.2, 0.8, 0.8),
    ("Poland", 1995, 4, "POL", "PLN", 0.1, 0.9, 0.9),
    ("Ghana", 2007, 4, "GHA", "GHS", 0.5, 0.5, 0.5),
    ("Israel", 1985, 3, "ISR", "ILS", 0.1, 0.9, 0.9),
    ("Romania", 2005, 4, "ROU", "RON", 0.2, 0.8, 0.8),
    ("Iran", 2025, 4, "IRN", "IRR", 0.7, 0.3, 0.2),
    ("Ukraine", 1996, 5, "UKR", "UAH", 0.6, 0.4, 0.3),
    ("Yugoslavia", 1994, 7, "SRB", "RSD", 0.9, 0.1, 0.1),
    ("Nicaragua", 1991, 6, "NIC", "NIO", 0.7, 0.3, 0.3),
    ("Angola", 1999, 6, "AGO", "AOA", 0.8, 0.2, 0.2),
    ("France", 1960, 2, "FRA", "EUR", 0.05, 0.95, 0.98),
    ("Sudan", 2007, 2, "SDN", "SDG", 0.8, 0.2, 0.2),
    ("South Korea", 1962, 1, "KOR", "KRW", 0.1, 0.9, 0.95),
    ("Mozambique", 2006, 3, "MOZ", "MZN", 0.4, 0.6, 0.6),
    ("Madagascar", 2003, 1, "MDG", "MGA", 0.5, 0.5, 0.5),
];

/// The full dataset in display order.
pub fn historical_events() -> Vec<CurrencyEvent> {
    ROWS.iter()
        .map(|&(country, year, zeros, iso, curr, risk, stability, faith)| {
            CurrencyEvent::new(country, year, zeros, iso, curr, risk, stability, faith)
        })
        .collect()
}

/// Country names for the selector menu, in dataset order.
pub fn countries(events: &[CurrencyEvent]) -> Vec<&str> {
    events.iter().map(|e| e.country.as_str()).collect()
}

pub fn find_country<'a>(events: &'a [CurrencyEvent], name: &str) -> Option<&'a CurrencyEvent> {
    events.iter().find(|e| e.country.eq_ignore_ascii_case(name))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationIssue {
    pub country: String,
    pub message: String,
}

/// Range and uniqueness checks over a dataset.
pub fn validate(events: &[CurrencyEvent]) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    let mut seen = std::collections::HashSet::new();
    for e in events {
        let mut push = |message: String| {
            issues.push(ValidationIssue {
                country: e.country.clone(),
                message,
            })
        };
        if !seen.insert(e.country.as_str()) {
            push("duplicate country".to_string());
        }
        for (name, v) in [("risk", e.risk), ("stability", e.stability), ("faith", e.faith)] {
            if !(0.0..=1.0).contains(&v) {
                push(format!("{} out of [0,1]: {}", name, v));
            }
        }
        if f64::from(e.zeros_removed) > ZERO_NORMALIZER {
            push(format!(
                "zeros_removed {} exceeds normalizer {}",
                e.zeros_removed, ZERO_NORMALIZER
            ));
        }
        if e.iso_code.len() != 3 || e.base_currency.len() != 3 {
            push("codes must be 3 letters".to_string());
        }
    }
    issues
}
