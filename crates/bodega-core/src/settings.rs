//! # Business Settings
//!
//! Organization-wide settings backed by key/value rows.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │  key              value (JSON)                                │
//! │  ───────────────  ──────────────────────────────────────────  │
//! │  main_currency    "USD"                                       │
//! │  exchange_rates   { "VES": 36.5, "COP": 3900 }                │
//! │  subtypes         ["Botella", "Botella Tercio", "Lata ..."]   │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! Some rows arrive with the JSON document stored as a string; both forms are
//! accepted.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;

use crate::conversion::{BOTELLA, BOTELLA_TERCIO};
use crate::error::ValidationError;
use crate::validation::ValidationResult;

pub const MAIN_CURRENCY_KEY: &str = "main_currency";
pub const EXCHANGE_RATES_KEY: &str = "exchange_rates";
pub const SUBTYPES_KEY: &str = "subtypes";

const DEFAULT_CURRENCY: &str = "USD";

/// Settings shared by every terminal of an organization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct BusinessSettings {
    pub main_currency: String,
    pub exchange_rates: BTreeMap<String, f64>,
    pub subtypes: Vec<String>,
}

impl Default for BusinessSettings {
    fn default() -> Self {
        BusinessSettings {
            main_currency: DEFAULT_CURRENCY.to_string(),
            exchange_rates: BTreeMap::new(),
            subtypes: vec![
                BOTELLA.to_string(),
                BOTELLA_TERCIO.to_string(),
                "Lata Pequeña".to_string(),
                "Lata Grande".to_string(),
            ],
        }
    }
}

impl BusinessSettings {
    /// Builds settings from backend rows; unknown keys are ignored.
    ///
    /// A malformed row keeps the default and is returned with its error.
    pub fn from_rows<'a, I>(rows: I) -> (Self, Vec<(String, ValidationError)>)
    where
        I: IntoIterator<Item = (&'a str, &'a Value)>,
    {
        let mut settings = BusinessSettings::default();
        let mut rejected = Vec::new();
        for (key, value) in rows {
            if let Err(e) = settings.apply(key, value) {
                rejected.push((key.to_string(), e));
            }
        }
        (settings, rejected)
    }

    /// Applies one row. Returns `Ok(false)` for keys this type does not own.
    pub fn apply(&mut self, key: &str, value: &Value) -> ValidationResult<bool> {
        let document = unwrap_string_document(value);
        match key {
            MAIN_CURRENCY_KEY => {
                let currency = document
                    .as_str()
                    .or_else(|| value.as_str())
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| invalid(key, "expected a non-empty string"))?;
                self.main_currency = currency.to_string();
            }
            EXCHANGE_RATES_KEY => {
                self.exchange_rates = serde_json::from_value(document)
                    .map_err(|e| invalid(key, &e.to_string()))?;
            }
            SUBTYPES_KEY => {
                self.subtypes =
                    serde_json::from_value(document).map_err(|e| invalid(key, &e.to_string()))?;
            }
            _ => return Ok(false),
        }
        Ok(true)
    }

    /// Restores the default for a deleted row.
    pub fn reset(&mut self, key: &str) -> bool {
        let defaults = BusinessSettings::default();
        match key {
            MAIN_CURRENCY_KEY => self.main_currency = defaults.main_currency,
            EXCHANGE_RATES_KEY => self.exchange_rates = defaults.exchange_rates,
            SUBTYPES_KEY => self.subtypes = defaults.subtypes,
            _ => return false,
        }
        true
    }
}

fn unwrap_string_document(value: &Value) -> Value {
    match value {
        Value::String(raw) => serde_json::from_str(raw).unwrap_or_else(|_| value.clone()),
        other => other.clone(),
    }
}

fn invalid(field: &str, reason: &str) -> ValidationError {
    ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}
