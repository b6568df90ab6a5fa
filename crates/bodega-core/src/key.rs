//! # Composite Keys
//!
//! Structured keys for every map in the engine, plus the codec for their
//! delimiter-joined string form.
//!
//! ## In Memory vs. At the Boundary
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  IN MEMORY: structured tuples (derive Eq + Hash)                        │
//! │    ItemKey  { product, emission, subtype }                              │
//! │    PriceKey { item, locality }                                          │
//! │    StockKey { product, subtype }                                        │
//! │    Product names may contain ANY character.                             │
//! │                                                                         │
//! │  AT THE BOUNDARY: "_"-joined strings (cache file, store keys)           │
//! │    Polar_Caja_Botella            ← ItemKey                              │
//! │    Polar_Caja_Botella_local      ← PriceKey (Local)                     │
//! │    Polar_Botella                 ← StockKey                             │
//! │                                                                         │
//! │  Parsing pops from the RIGHT:                                           │
//! │    "Zulia_Light_Caja_Botella"                                           │
//! │       subtype  = "Botella"                                              │
//! │       emission = "Caja"                                                 │
//! │       product  = "Zulia_Light"   (remainder, rejoined)                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Emission and subtype values containing `_` are rejected at encode time,
//! which keeps right-popping unambiguous.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::types::Locality;
use crate::validation::{validate_key_segment, validate_product_name};

/// Segment delimiter of the string form.
pub const DELIMITER: char = '_';

/// Trailing segment marking a local price key.
pub const LOCAL_SEGMENT: &str = "local";

// =============================================================================
// Structured Keys
// =============================================================================

/// (product, emission, subtype) keys costs and pending stock deltas.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemKey {
    pub product: String,
    pub emission: String,
    pub subtype: String,
}

impl ItemKey {
    pub fn new(
        product: impl Into<String>,
        emission: impl Into<String>,
        subtype: impl Into<String>,
    ) -> Self {
        ItemKey {
            product: product.into(),
            emission: emission.into(),
            subtype: subtype.into(),
        }
    }

    /// The inventory record this item moves.
    pub fn stock_key(&self) -> StockKey {
        StockKey::new(self.product.clone(), self.subtype.clone())
    }

    /// Same item under a different emission.
    pub fn with_emission(&self, emission: impl Into<String>) -> Self {
        ItemKey::new(self.product.clone(), emission, self.subtype.clone())
    }

    /// Case-insensitive, whitespace-tolerant comparison.
    pub fn matches_loosely(&self, other: &ItemKey) -> bool {
        loose_eq(&self.product, &other.product)
            && loose_eq(&self.emission, &other.emission)
            && loose_eq(&self.subtype, &other.subtype)
    }
}

/// (product, emission, subtype, locality) keys prices.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PriceKey {
    pub item: ItemKey,
    pub locality: Locality,
}

impl PriceKey {
    pub fn new(item: ItemKey, locality: Locality) -> Self {
        PriceKey { item, locality }
    }

    /// The standard-locality key for the same item.
    pub fn standard(&self) -> Self {
        PriceKey::new(self.item.clone(), Locality::Standard)
    }
}

/// (product, subtype) keys inventory records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StockKey {
    pub product: String,
    pub subtype: String,
}

impl StockKey {
    pub fn new(product: impl Into<String>, subtype: impl Into<String>) -> Self {
        StockKey {
            product: product.into(),
            subtype: subtype.into(),
        }
    }
}

/// (emission, subtype) keys exact conversion rules.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConversionKey {
    pub emission: String,
    pub subtype: String,
}

impl ConversionKey {
    pub fn new(emission: impl Into<String>, subtype: impl Into<String>) -> Self {
        ConversionKey {
            emission: emission.into(),
            subtype: subtype.into(),
        }
    }
}

pub(crate) fn loose_eq(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

// =============================================================================
// Encoding
// =============================================================================

/// Encodes an item key as `product_emission_subtype`.
pub fn encode_item(key: &ItemKey) -> CoreResult<String> {
    validate_product_name(&key.product)?;
    validate_key_segment("emission", &key.emission)?;
    validate_key_segment("subtype", &key.subtype)?;
    Ok(format!(
        "{}{d}{}{d}{}",
        key.product,
        key.emission,
        key.subtype,
        d = DELIMITER
    ))
}

/// Encodes a price key; local prices get a trailing `_local`.
pub fn encode_price(key: &PriceKey) -> CoreResult<String> {
    let base = encode_item(&key.item)?;
    Ok(match key.locality {
        Locality::Standard => base,
        Locality::Local => format!("{}{}{}", base, DELIMITER, LOCAL_SEGMENT),
    })
}

/// Encodes a stock key as `product_subtype`.
pub fn encode_stock(key: &StockKey) -> CoreResult<String> {
    validate_product_name(&key.product)?;
    validate_key_segment("subtype", &key.subtype)?;
    Ok(format!("{}{}{}", key.product, DELIMITER, key.subtype))
}

// =============================================================================
// Decoding
// =============================================================================

/// Decodes `product_emission_subtype`, popping from the right.
///
/// ## Example
/// ```rust
/// use bodega_core::key::decode_item;
///
/// let key = decode_item("Zulia_Light_Caja_Botella").unwrap();
/// assert_eq!(key.product, "Zulia_Light");
/// assert_eq!(key.emission, "Caja");
/// assert_eq!(key.subtype, "Botella");
/// ```
pub fn decode_item(raw: &str) -> CoreResult<ItemKey> {
    let malformed = || CoreError::MalformedKey {
        kind: "item",
        key: raw.to_string(),
    };

    let mut parts = raw.rsplitn(3, DELIMITER);
    let subtype = parts.next().filter(|s| !s.is_empty()).ok_or_else(malformed)?;
    let emission = parts.next().filter(|s| !s.is_empty()).ok_or_else(malformed)?;
    let product = parts.next().filter(|s| !s.is_empty()).ok_or_else(malformed)?;

    Ok(ItemKey::new(product, emission, subtype))
}

/// Decodes a price key, stripping the `_local` suffix first.
pub fn decode_price(raw: &str) -> CoreResult<PriceKey> {
    let local_suffix = format!("{}{}", DELIMITER, LOCAL_SEGMENT);

    match raw.strip_suffix(&local_suffix) {
        Some(rest) => Ok(PriceKey::new(decode_item(rest)?, Locality::Local)),
        None => Ok(PriceKey::new(decode_item(raw)?, Locality::Standard)),
    }
}

/// Decodes `product_subtype`, preferring the longest known product name that
/// prefixes the key; falls back to splitting at the last delimiter.
pub fn decode_stock<'a, I>(raw: &str, known_products: I) -> CoreResult<StockKey>
where
    I: IntoIterator<Item = &'a str>,
{
    let best = known_products
        .into_iter()
        .filter_map(|product| {
            let rest = raw.strip_prefix(product)?;
            let subtype = rest.strip_prefix(DELIMITER)?;
            (!subtype.is_empty()).then_some((product, subtype))
        })
        .max_by_key(|(product, _)| product.len());

    if let Some((product, subtype)) = best {
        return Ok(StockKey::new(product, subtype));
    }

    match raw.rsplit_once(DELIMITER) {
        Some((product, subtype)) if !product.is_empty() && !subtype.is_empty() => {
            Ok(StockKey::new(product, subtype))
        }
        _ => Err(CoreError::MalformedKey {
            kind: "stock",
            key: raw.to_string(),
        }),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_item() {
        let key = ItemKey::new("Polar", "Caja", "Botella");
        assert_eq!(encode_item(&key).unwrap(), "Polar_Caja_Botella");
    }

    #[test]
    fn test_product_name_may_contain_delimiter() {
        let key = ItemKey::new("Zulia_Light", "Media Caja", "Lata Pequeña");
        let raw = encode_item(&key).unwrap();
        assert_eq!(decode_item(&raw).unwrap(), key);
    }

    #[test]
    fn test_encode_rejects_delimiter_in_segments() {
        let key = ItemKey::new("Polar", "Caja_24", "Botella");
        assert!(encode_item(&key).is_err());

        let key = StockKey::new("Polar", "Lata_Grande");
        assert!(encode_stock(&key).is_err());
    }

    #[test]
    fn test_local_suffix_stripped_first() {
        let key = decode_price("Polar_Unidad_Botella_local").unwrap();
        assert_eq!(key.locality, Locality::Local);
        assert_eq!(key.item, ItemKey::new("Polar", "Unidad", "Botella"));

        let key = decode_price("Polar_Unidad_Botella").unwrap();
        assert_eq!(key.locality, Locality::Standard);

        let local = PriceKey::new(ItemKey::new("Polar", "Unidad", "Botella"), Locality::Local);
        assert_eq!(encode_price(&local).unwrap(), "Polar_Unidad_Botella_local");
    }

    #[test]
    fn test_decode_rejects_short_keys() {
        assert!(decode_item("Polar_Caja").is_err());
        assert!(decode_item("_Caja_Botella").is_err());
        assert!(decode_stock("Polar", std::iter::empty()).is_err());
    }

    #[test]
    fn test_decode_stock_prefers_known_products() {
        let known = ["Zulia", "Zulia_Light"];
        let key = decode_stock("Zulia_Light_Botella", known.iter().copied()).unwrap();
        assert_eq!(key, StockKey::new("Zulia_Light", "Botella"));

        // Unknown product: naive right split
        let key = decode_stock("Solera_Verde_Lata Pequeña", known.iter().copied()).unwrap();
        assert_eq!(key, StockKey::new("Solera_Verde", "Lata Pequeña"));
    }

    #[test]
    fn test_matches_loosely() {
        let a = ItemKey::new("Polar", "Caja", "Botella");
        let b = ItemKey::new(" polar ", "CAJA", "botella");
        assert!(a.matches_loosely(&b));
        assert!(!a.matches_loosely(&b.with_emission("Unidad")));
    }
}
