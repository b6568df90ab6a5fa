//! # Product Catalog
//!
//! Products keyed by name, with an id↔name index for change-feed rows that
//! only carry the backend id.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │   by_name: "Polar"  → Product { id: "p-1", ... }                        │
//! │   by_id:   "p-1"    → "Polar"                                           │
//! │                                                                         │
//! │   upsert(Product { id: "p-1", name: "Polar Pilsen" })                   │
//! │       → CatalogChange::Renamed { old: "Polar", new: "Polar Pilsen" }    │
//! │       (caller re-keys prices, costs, stock and pending edits)           │
//! │                                                                         │
//! │   upsert(Product { id: "p-1", name: "Solera" })  // "Solera" is p-2     │
//! │       → CatalogChange::NameTaken { name: "Solera", holder: "p-2" }      │
//! │       (catalog untouched)                                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;

use crate::error::{CoreError, CoreResult};
use crate::types::Product;
use crate::validation::validate_product_name;

/// What an upsert did to the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogChange {
    Inserted,
    Updated,
    Renamed { old: String, new: String },
    /// The name already belongs to another id. Nothing was changed.
    NameTaken { name: String, holder: String },
}

/// All known products.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    by_name: HashMap<String, Product>,
    by_id: HashMap<String, String>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_products<I>(products: I) -> Self
    where
        I: IntoIterator<Item = Product>,
    {
        let mut catalog = Catalog::new();
        for product in products {
            catalog.upsert(product);
        }
        catalog
    }

    pub fn get(&self, name: &str) -> Option<&Product> {
        self.by_name.get(name)
    }

    pub fn name_for_id(&self, id: &str) -> Option<&str> {
        self.by_id.get(id).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Case-insensitive name lookup, used for duplicate checks.
    pub fn find_ignore_case(&self, name: &str) -> Option<&Product> {
        let wanted = name.trim().to_lowercase();
        self.by_name
            .values()
            .find(|product| product.name.to_lowercase() == wanted)
    }

    /// Every product name, including inactive ones.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.by_name.keys().map(String::as_str)
    }

    /// Active products sorted by name.
    pub fn active(&self) -> Vec<&Product> {
        let mut products: Vec<&Product> =
            self.by_name.values().filter(|product| product.active).collect();
        products.sort_by(|a, b| a.name.cmp(&b.name));
        products
    }

    /// Every product, sorted by name.
    pub fn all(&self) -> Vec<&Product> {
        let mut products: Vec<&Product> = self.by_name.values().collect();
        products.sort_by(|a, b| a.name.cmp(&b.name));
        products
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Validates a new product against the catalog.
    ///
    /// Returns the trimmed name on success.
    pub fn check_new(&self, name: &str) -> CoreResult<String> {
        let name = validate_product_name(name)?;
        if let Some(existing) = self.find_ignore_case(&name) {
            return Err(CoreError::DuplicateProduct(existing.name.clone()));
        }
        Ok(name)
    }

    /// Inserts or replaces by id. A changed name is reported as a rename.
    ///
    /// Two ids never share a name: when the name is held by another id the
    /// catalog is left as it was and `NameTaken` is returned.
    pub fn upsert(&mut self, product: Product) -> CatalogChange {
        if let Some(holder) = self.by_name.get(&product.name) {
            if holder.id != product.id {
                return CatalogChange::NameTaken {
                    name: product.name,
                    holder: holder.id.clone(),
                };
            }
        }

        let previous_name = self.by_id.get(&product.id).cloned();
        let change = match previous_name {
            Some(old) if old != product.name => {
                self.by_name.remove(&old);
                CatalogChange::Renamed {
                    old,
                    new: product.name.clone(),
                }
            }
            Some(_) => CatalogChange::Updated,
            None => CatalogChange::Inserted,
        };

        self.by_id.insert(product.id.clone(), product.name.clone());
        self.by_name.insert(product.name.clone(), product);
        change
    }

    /// Marks a product inactive. Returns its name when the id was known.
    pub fn soft_delete(&mut self, id: &str) -> Option<String> {
        let name = self.by_id.get(id)?.clone();
        if let Some(product) = self.by_name.get_mut(&name) {
            product.active = false;
        }
        Some(name)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsert_and_lookup_both_ways() {
        let mut catalog = Catalog::new();
        assert_eq!(catalog.upsert(Product::new("p-1", "Polar")), CatalogChange::Inserted);

        assert_eq!(catalog.get("Polar").map(|p| p.id.as_str()), Some("p-1"));
        assert_eq!(catalog.name_for_id("p-1"), Some("Polar"));
        assert_eq!(catalog.upsert(Product::new("p-1", "Polar")), CatalogChange::Updated);
    }

    #[test]
    fn test_duplicate_names_are_case_insensitive() {
        let mut catalog = Catalog::new();
        catalog.upsert(Product::new("p-1", "Polar"));

        let err = catalog.check_new(" polar ").unwrap_err();
        assert!(matches!(err, CoreError::DuplicateProduct(name) if name == "Polar"));
        assert_eq!(catalog.check_new(" Solera ").unwrap(), "Solera");
    }

    #[test]
    fn test_blank_name_rejected() {
        let catalog = Catalog::new();
        assert!(matches!(catalog.check_new("   "), Err(CoreError::Validation(_))));
    }

    #[test]
    fn test_upsert_detects_rename() {
        let mut catalog = Catalog::new();
        catalog.upsert(Product::new("p-1", "Polar"));

        let change = catalog.upsert(Product::new("p-1", "Polar Pilsen"));
        assert_eq!(
            change,
            CatalogChange::Renamed {
                old: "Polar".to_string(),
                new: "Polar Pilsen".to_string()
            }
        );
        assert!(!catalog.contains("Polar"));
        assert_eq!(catalog.name_for_id("p-1"), Some("Polar Pilsen"));
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn test_soft_delete_hides_from_active() {
        let mut catalog = Catalog::new();
        catalog.upsert(Product::new("p-1", "Polar"));
        catalog.upsert(Product::new("p-2", "Solera"));

        assert_eq!(catalog.soft_delete("p-1").as_deref(), Some("Polar"));
        let active: Vec<&str> = catalog.active().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(active, vec!["Solera"]);
        assert!(catalog.contains("Polar"));
        assert_eq!(catalog.soft_delete("missing"), None);
    }

    #[test]
    fn test_rename_onto_another_products_name_is_refused() {
        let mut catalog = Catalog::new();
        catalog.upsert(Product::new("p-1", "Polar"));
        catalog.upsert(Product::new("p-2", "Solera"));

        let change = catalog.upsert(Product::new("p-1", "Solera"));
        assert_eq!(
            change,
            CatalogChange::NameTaken {
                name: "Solera".to_string(),
                holder: "p-2".to_string()
            }
        );
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.name_for_id("p-1"), Some("Polar"));
        assert_eq!(catalog.name_for_id("p-2"), Some("Solera"));
        assert_eq!(catalog.get("Solera").map(|p| p.id.as_str()), Some("p-2"));

        // A new id with a taken name is refused the same way
        assert!(matches!(
            catalog.upsert(Product::new("p-3", "Polar")),
            CatalogChange::NameTaken { .. }
        ));
        assert_eq!(catalog.name_for_id("p-3"), None);
    }
}
