//! # Conversion Resolver
//!
//! Answers "how many base units does one emission-unit represent?".
//!
//! ## Resolution Order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  units_per_emission(emission, subtype)                                  │
//! │                                                                         │
//! │  1. "Unidad" | "Libre"                          → 1                     │
//! │  2. "Six Pack"                                  → 6                     │
//! │  3. exact (emission, subtype) rule              → rule.units            │
//! │  4. subtype is a can: same-name rule whose                              │
//! │     subtype is also a can                       → rule.units            │
//! │  5. same-name rule without subtype (legacy)     → rule.units            │
//! │  6. "Caja": 24 for cans / Botella Tercio, else 36                       │
//! │     "Media Caja": half of the Caja default                              │
//! │  7. anything else                               → 1                     │
//! │                                                                         │
//! │  NEVER returns 0: callers divide by this value.                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreResult, ValidationError};
use crate::key::{loose_eq, ConversionKey};
use crate::validation::{validate_key_segment, validate_units};

// =============================================================================
// Well-known Emissions and Subtypes
// =============================================================================

pub const UNIDAD: &str = "Unidad";
pub const LIBRE: &str = "Libre";
pub const SIX_PACK: &str = "Six Pack";
pub const CAJA: &str = "Caja";
pub const MEDIA_CAJA: &str = "Media Caja";
pub const PACK: &str = "Pack";
pub const BULTO: &str = "Bulto";

pub const BOTELLA: &str = "Botella";
pub const BOTELLA_TERCIO: &str = "Botella Tercio";

/// Emission assumed when none is given.
pub const DEFAULT_EMISSION: &str = UNIDAD;

/// Subtype assumed when none is given.
pub const DEFAULT_SUBTYPE: &str = BOTELLA;

const SIX_PACK_UNITS: u32 = 6;
const CAN_CASE_UNITS: u32 = 24;
const BOTTLE_CASE_UNITS: u32 = 36;

/// True when the subtype names any can variant ("Lata", "Lata Pequeña", "Can 355").
pub fn is_can(subtype: &str) -> bool {
    let lower = subtype.to_lowercase();
    lower.contains("lata") || lower.contains("can")
}

// =============================================================================
// Emission Records
// =============================================================================

/// A user-defined conversion rule as stored by the backend.
///
/// Records without a subtype are legacy rules that apply to every subtype.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct EmissionRecord {
    pub name: String,
    #[serde(default)]
    pub subtype: Option<String>,
    pub units: u32,
}

impl EmissionRecord {
    pub fn new(name: impl Into<String>, subtype: Option<&str>, units: u32) -> Self {
        EmissionRecord {
            name: name.into().trim().to_string(),
            subtype: subtype
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            units,
        }
    }

    /// Checks a rule entered by an operator.
    ///
    /// ## Rules
    /// - units >= 1, names free of the key delimiter
    /// - "Six Pack" is a built-in for cans; a record on any other subtype is
    ///   rejected
    pub fn validate(&self) -> CoreResult<()> {
        validate_key_segment("emission", &self.name)?;
        if let Some(subtype) = &self.subtype {
            validate_key_segment("subtype", subtype)?;
        }
        validate_units(self.units)?;

        if loose_eq(&self.name, SIX_PACK) && !self.subtype.as_deref().is_some_and(is_can) {
            return Err(ValidationError::NotAllowed {
                field: "emission".to_string(),
                value: self.name.clone(),
                reason: format!(
                    "{} is only defined for can subtypes, not '{}'",
                    SIX_PACK,
                    self.subtype.as_deref().unwrap_or("(any)")
                ),
            }
            .into());
        }
        Ok(())
    }

    fn same_pair(&self, name: &str, subtype: Option<&str>) -> bool {
        loose_eq(&self.name, name)
            && match (self.subtype.as_deref(), subtype) {
                (Some(a), Some(b)) => loose_eq(a, b),
                (None, None) => true,
                _ => false,
            }
    }
}

// =============================================================================
// Conversion Table
// =============================================================================

/// Raw emission records plus an exact-match index over them.
#[derive(Debug, Clone, Default)]
pub struct ConversionTable {
    records: Vec<EmissionRecord>,
    exact: HashMap<ConversionKey, u32>,
}

impl ConversionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a table from backend rows, skipping rules with zero units.
    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = EmissionRecord>,
    {
        let mut table = ConversionTable::new();
        for record in records {
            table.upsert(record);
        }
        table
    }

    pub fn records(&self) -> &[EmissionRecord] {
        &self.records
    }

    /// Resolves units per emission. Always >= 1.
    pub fn units_per_emission(&self, emission: &str, subtype: &str) -> u32 {
        let emission = emission.trim();
        let subtype = subtype.trim();

        if emission == UNIDAD || emission == LIBRE {
            return 1;
        }
        if emission == SIX_PACK {
            return SIX_PACK_UNITS;
        }

        if let Some(&units) = self.exact.get(&ConversionKey::new(emission, subtype)) {
            return units;
        }

        if is_can(subtype) {
            let fuzzy = self.records.iter().find(|r| {
                loose_eq(&r.name, emission) && r.subtype.as_deref().is_some_and(is_can)
            });
            if let Some(record) = fuzzy {
                return record.units;
            }
        }

        let legacy = self
            .records
            .iter()
            .find(|r| r.subtype.is_none() && loose_eq(&r.name, emission));
        if let Some(record) = legacy {
            return record.units;
        }

        default_units(emission, subtype).unwrap_or(1)
    }

    /// Adds a new rule.
    ///
    /// The record must pass [`EmissionRecord::validate`] and the
    /// (name, subtype) pair must not exist yet.
    pub fn add(&mut self, record: EmissionRecord) -> CoreResult<()> {
        record.validate()?;

        if self.find(&record.name, record.subtype.as_deref()).is_some() {
            return Err(ValidationError::Duplicate {
                field: "emission".to_string(),
                value: format!(
                    "{} / {}",
                    record.name,
                    record.subtype.as_deref().unwrap_or("(any)")
                ),
            }
            .into());
        }

        self.insert_unchecked(record);
        Ok(())
    }

    /// Inserts or replaces a rule without validation.
    ///
    /// Used when merging backend rows, where last write wins. Returns false
    /// for rules with zero units, which are ignored. A replaced rule keeps
    /// the spelling it was first stored with.
    pub fn upsert(&mut self, record: EmissionRecord) -> bool {
        if record.units == 0 {
            return false;
        }
        if let Some(index) = self.find(&record.name, record.subtype.as_deref()) {
            self.records[index].units = record.units;
            self.reindex();
        } else {
            self.insert_unchecked(record);
        }
        true
    }

    /// Removes the matching rule. Returns false when nothing matched.
    pub fn remove(&mut self, name: &str, subtype: Option<&str>) -> bool {
        let Some(index) = self.find(name, subtype) else {
            return false;
        };
        self.records.remove(index);
        self.reindex();
        true
    }

    /// Every emission that applies to a subtype: built-ins first, then
    /// custom rules for that subtype or for any subtype.
    pub fn emissions_for(&self, subtype: &str) -> Vec<String> {
        let mut names: Vec<String> = vec![UNIDAD.to_string(), CAJA.to_string(), MEDIA_CAJA.to_string()];
        if is_can(subtype) {
            names.push(SIX_PACK.to_string());
        }

        for record in &self.records {
            let applies = record
                .subtype
                .as_deref()
                .map_or(true, |s| loose_eq(s, subtype));
            if applies && !names.iter().any(|n| loose_eq(n, &record.name)) {
                names.push(record.name.clone());
            }
        }

        names
    }

    fn find(&self, name: &str, subtype: Option<&str>) -> Option<usize> {
        self.records.iter().position(|r| r.same_pair(name, subtype))
    }

    fn insert_unchecked(&mut self, record: EmissionRecord) {
        if let Some(subtype) = &record.subtype {
            self.exact
                .insert(ConversionKey::new(record.name.clone(), subtype.clone()), record.units);
        }
        self.records.push(record);
    }

    fn reindex(&mut self) {
        self.exact = self
            .records
            .iter()
            .filter_map(|r| {
                r.subtype
                    .as_ref()
                    .map(|s| (ConversionKey::new(r.name.clone(), s.clone()), r.units))
            })
            .collect();
    }
}

/// Hard-coded case sizes used when no rule exists.
pub fn default_units(emission: &str, subtype: &str) -> Option<u32> {
    let case_units = if is_can(subtype) || subtype == BOTELLA_TERCIO {
        CAN_CASE_UNITS
    } else {
        BOTTLE_CASE_UNITS
    };

    match emission {
        CAJA => Some(case_units),
        MEDIA_CAJA => Some(case_units / 2),
        _ => None,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_emissions() {
        let table = ConversionTable::new();
        assert_eq!(table.units_per_emission(UNIDAD, BOTELLA), 1);
        assert_eq!(table.units_per_emission(LIBRE, "Lata"), 1);
        assert_eq!(table.units_per_emission(SIX_PACK, "Lata"), 6);
    }

    #[test]
    fn test_defaults_without_rules() {
        let table = ConversionTable::new();
        assert_eq!(table.units_per_emission(CAJA, "Lata Pequeña"), 24);
        assert_eq!(table.units_per_emission(CAJA, BOTELLA_TERCIO), 24);
        assert_eq!(table.units_per_emission(CAJA, BOTELLA), 36);
        assert_eq!(table.units_per_emission(MEDIA_CAJA, BOTELLA), 18);
        assert_eq!(table.units_per_emission(MEDIA_CAJA, "Lata"), 12);
        assert_eq!(table.units_per_emission("Barril", BOTELLA), 1);
    }

    #[test]
    fn test_six_pack_constant_beats_rules() {
        let mut table = ConversionTable::new();
        table.upsert(EmissionRecord::new(SIX_PACK, Some("Lata"), 12));
        assert_eq!(table.units_per_emission(SIX_PACK, "Lata"), 6);
    }

    #[test]
    fn test_exact_rule_wins_over_default() {
        let mut table = ConversionTable::new();
        table.add(EmissionRecord::new(CAJA, Some(BOTELLA), 30)).unwrap();
        assert_eq!(table.units_per_emission(CAJA, BOTELLA), 30);
        // Media Caja still uses the hard-coded default
        assert_eq!(table.units_per_emission(MEDIA_CAJA, BOTELLA), 18);
    }

    #[test]
    fn test_fuzzy_can_fallback() {
        let mut table = ConversionTable::new();
        table.add(EmissionRecord::new(CAJA, Some("Lata Grande"), 12)).unwrap();
        assert_eq!(table.units_per_emission(CAJA, "Lata Pequeña"), 12);
        // Bottles are not cans
        assert_eq!(table.units_per_emission(CAJA, BOTELLA), 36);
    }

    #[test]
    fn test_legacy_rule_without_subtype() {
        let mut table = ConversionTable::new();
        table.add(EmissionRecord::new("Bandeja", None, 15)).unwrap();
        assert_eq!(table.units_per_emission("Bandeja", BOTELLA), 15);
        assert_eq!(table.units_per_emission("Bandeja", "Lata"), 15);
    }

    #[test]
    fn test_add_rejects_duplicates_and_bad_six_packs() {
        let mut table = ConversionTable::new();
        table.add(EmissionRecord::new(PACK, Some(BOTELLA), 4)).unwrap();
        assert!(table.add(EmissionRecord::new("pack", Some("botella"), 8)).is_err());
        assert!(table.add(EmissionRecord::new(SIX_PACK, Some(BOTELLA), 6)).is_err());
        assert!(table.add(EmissionRecord::new(SIX_PACK, None, 6)).is_err());
        assert!(table.add(EmissionRecord::new(SIX_PACK, Some("Lata"), 6)).is_ok());
        assert!(table.add(EmissionRecord::new(BULTO, Some(BOTELLA), 0)).is_err());
        assert_eq!(table.records().len(), 2);
    }

    #[test]
    fn test_remove_is_noop_when_missing() {
        let mut table = ConversionTable::new();
        assert!(!table.remove(PACK, Some(BOTELLA)));
        table.add(EmissionRecord::new(PACK, Some(BOTELLA), 4)).unwrap();
        assert!(table.remove(PACK, Some(BOTELLA)));
        assert_eq!(table.units_per_emission(PACK, BOTELLA), 1);
    }

    #[test]
    fn test_upsert_replaces_and_ignores_zero() {
        let mut table = ConversionTable::new();
        assert!(table.upsert(EmissionRecord::new(PACK, Some(BOTELLA), 4)));
        assert!(table.upsert(EmissionRecord::new(PACK, Some(BOTELLA), 8)));
        assert!(!table.upsert(EmissionRecord::new(BULTO, Some(BOTELLA), 0)));
        assert_eq!(table.records().len(), 1);
        assert_eq!(table.units_per_emission(PACK, BOTELLA), 8);
    }

    #[test]
    fn test_upsert_keeps_stored_casing() {
        let mut table = ConversionTable::new();
        table.add(EmissionRecord::new(CAJA, Some(BOTELLA), 30)).unwrap();
        assert!(table.upsert(EmissionRecord::new("caja", Some("botella"), 20)));

        assert_eq!(table.records().len(), 1);
        assert_eq!(table.records()[0].name, CAJA);
        assert_eq!(table.units_per_emission(CAJA, BOTELLA), 20);
    }

    #[test]
    fn test_validate_rejects_delimiter_and_bad_six_packs() {
        assert!(EmissionRecord::new("Caja_24", Some(BOTELLA), 24).validate().is_err());
        assert!(EmissionRecord::new(PACK, Some("Lata_Grande"), 4).validate().is_err());
        assert!(EmissionRecord::new(SIX_PACK, Some(BOTELLA), 6).validate().is_err());
        assert!(EmissionRecord::new(PACK, Some(BOTELLA), 0).validate().is_err());
        assert!(EmissionRecord::new(SIX_PACK, Some("Lata"), 6).validate().is_ok());
    }

    #[test]
    fn test_emissions_for_subtype() {
        let mut table = ConversionTable::new();
        table.add(EmissionRecord::new(PACK, Some("Lata"), 4)).unwrap();
        table.add(EmissionRecord::new("Bandeja", None, 15)).unwrap();

        let cans = table.emissions_for("Lata");
        assert_eq!(cans, vec![UNIDAD, CAJA, MEDIA_CAJA, SIX_PACK, PACK, "Bandeja"]);

        let bottles = table.emissions_for(BOTELLA);
        assert_eq!(bottles, vec![UNIDAD, CAJA, MEDIA_CAJA, "Bandeja"]);
    }
}
