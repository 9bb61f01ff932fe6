//! Job category reference data.
//!
//! Categories form a closed set seeded by `jobboard init`. The catalog is
//! loaded once and never grows; names that match nothing resolve to the
//! unknown-category sentinel.

use std::collections::HashMap;

use tracing::debug;

use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::JobCategory;

pub const UNKNOWN_CATEGORY_NAME: &str = "unknown";

/// `(name, display_name)` pairs in display order. The sentinel comes first.
pub const SEED_CATEGORIES: &[(&str, &str)] = &[
    (UNKNOWN_CATEGORY_NAME, "Unknown"),
    ("Software Development", "Software Development"),
    ("Design", "Design"),
    ("Data Science", "Data Science"),
    ("Product Management", "Product Management"),
    ("Marketing", "Marketing"),
    ("Sales", "Sales"),
    ("Customer Support", "Customer Support"),
    ("Operations", "Operations"),
    ("Finance", "Finance"),
];

#[derive(Debug, Clone)]
pub struct CategoryCatalog {
    categories: Vec<JobCategory>,
    by_name: HashMap<String, usize>,
    unknown: usize,
}

impl CategoryCatalog {
    pub fn load(db: &Database) -> Result<Self> {
        Self::from_categories(db.list_categories()?)
    }

    pub fn from_categories(categories: Vec<JobCategory>) -> Result<Self> {
        let by_name: HashMap<String, usize> = categories
            .iter()
            .enumerate()
            .map(|(idx, c)| (c.name.clone(), idx))
            .collect();
        let unknown = *by_name
            .get(UNKNOWN_CATEGORY_NAME)
            .ok_or(Error::MissingUnknownCategory)?;
        Ok(Self {
            categories,
            by_name,
            unknown,
        })
    }

    pub fn find(&self, name: &str) -> Option<&JobCategory> {
        self.by_name.get(name).map(|&idx| &self.categories[idx])
    }

    /// Like [`find`](Self::find), falling back to the sentinel.
    pub fn resolve(&self, name: &str) -> &JobCategory {
        self.find(name).unwrap_or_else(|| {
            debug!(name, "no such category, using unknown");
            self.unknown()
        })
    }

    pub fn unknown(&self) -> &JobCategory {
        &self.categories[self.unknown]
    }

    pub fn all(&self) -> &[JobCategory] {
        &self.categories
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_known_category() {
        let db = Database::open_in_memory().unwrap();
        let catalog = CategoryCatalog::load(&db).unwrap();

        let category = catalog.resolve("Software Development");
        assert_eq!(category.display_name, "Software Development");
        assert_ne!(category, catalog.unknown());
    }

    #[test]
    fn test_resolve_falls_back_to_unknown() {
        let db = Database::open_in_memory().unwrap();
        let catalog = CategoryCatalog::load(&db).unwrap();

        assert!(catalog.find("acompletelynewkindofjob").is_none());
        assert_eq!(catalog.resolve("acompletelynewkindofjob"), catalog.unknown());
        assert_eq!(catalog.unknown().display_name, "Unknown");
    }

    #[test]
    fn test_all_keeps_seed_order() {
        let db = Database::open_in_memory().unwrap();
        let catalog = CategoryCatalog::load(&db).unwrap();

        let names: Vec<_> = catalog.all().iter().map(|c| c.name.as_str()).collect();
        let seeded: Vec<_> = SEED_CATEGORIES.iter().map(|(name, _)| *name).collect();
        assert_eq!(names, seeded);
    }

    #[test]
    fn test_missing_sentinel_is_an_error() {
        let categories = vec![JobCategory {
            id: 1,
            name: "Design".to_string(),
            display_name: "Design".to_string(),
        }];
        assert!(matches!(
            CategoryCatalog::from_categories(categories),
            Err(Error::MissingUnknownCategory)
        ));
    }
}
