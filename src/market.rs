//! Typical market values per product category.

use crate::ScoutError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, info};

pub const UNKNOWN_CATEGORY: &str = "unknown";

fn price_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"[$€£]?\s*(\d{1,3}(?:,\d{3})+(?:\.\d+)?|\d+(?:\.\d+)?)").expect("static regex")
    })
}

/// Parses the first amount in `text`: `"$1,299.99"` → `1299.99`.
pub fn parse_price(text: &str) -> Option<f64> {
    let caps = price_pattern().captures(text)?;
    caps.get(1)?.as_str().replace(',', "").parse().ok()
}

/// One category, its typical price and the words that identify it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryEntry {
    pub name: String,
    pub market_value: f64,
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// Category → typical market value table.
///
/// Entries are kept in priority order: detection returns the first entry
/// whose keyword appears, so "headphones" is listed before "phone".
#[derive(Debug, Clone, PartialEq)]
pub struct MarketCatalog {
    entries: Vec<CategoryEntry>,
}

impl Default for MarketCatalog {
    fn default() -> Self {
        let entry = |name: &str, value: f64, keywords: &[&str]| CategoryEntry {
            name: name.to_string(),
            market_value: value,
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        };

        Self {
            entries: vec![
                entry(
                    "headphones",
                    150.0,
                    &["headphone", "headset", "earbud", "earphone", "airpods"],
                ),
                entry(
                    "laptop",
                    1000.0,
                    &["laptop", "notebook", "macbook", "thinkpad", "chromebook", "xps"],
                ),
                entry("monitor", 300.0, &["monitor"]),
                entry("keyboard", 100.0, &["keyboard"]),
                entry("mouse", 50.0, &["mouse", "mice"]),
                entry("desk", 400.0, &["desk"]),
                entry(
                    "phone",
                    700.0,
                    &["phone", "iphone", "smartphone", "galaxy", "pixel"],
                ),
            ],
        }
    }
}

impl MarketCatalog {
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Loads a catalog file.
    ///
    /// Two layouts are accepted: a flat `{"laptop": 1000, ...}` object, whose
    /// names double as their own keyword, or a list of [`CategoryEntry`].
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ScoutError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let catalog = Self::from_json_str(&raw)?;
        info!(path = %path.display(), categories = catalog.len(), "Loaded market catalog");
        Ok(catalog)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ScoutError> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum CatalogFile {
            Flat(BTreeMap<String, f64>),
            Entries(Vec<CategoryEntry>),
        }

        let mut catalog = Self::empty();
        match serde_json::from_str::<CatalogFile>(raw)? {
            CatalogFile::Flat(values) => {
                for (name, value) in values {
                    catalog.insert(name, value, Vec::new());
                }
            }
            CatalogFile::Entries(entries) => {
                for e in entries {
                    catalog.insert(e.name, e.market_value, e.keywords);
                }
            }
        }
        Ok(catalog)
    }

    /// Adds or replaces a category. A category is always its own keyword.
    pub fn insert(&mut self, name: impl Into<String>, market_value: f64, keywords: Vec<String>) {
        let name = name.into().to_lowercase();
        let mut keywords: Vec<String> = keywords.into_iter().map(|k| k.to_lowercase()).collect();
        if !keywords.contains(&name) {
            keywords.insert(0, name.clone());
        }

        if let Some(existing) = self.entries.iter_mut().find(|e| e.name == name) {
            existing.market_value = market_value;
            existing.keywords = keywords;
        } else {
            self.entries.push(CategoryEntry {
                name,
                market_value,
                keywords,
            });
        }
    }

    pub fn value_of(&self, category: &str) -> Option<f64> {
        let category = category.to_lowercase();
        self.entries
            .iter()
            .find(|e| e.name == category)
            .map(|e| e.market_value)
    }

    pub fn contains(&self, category: &str) -> bool {
        self.value_of(category).is_some()
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    pub fn entries(&self) -> &[CategoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First category with a keyword matching a whole word of `text`.
    ///
    /// A word also matches its keyword with a plural `s`/`es` ending.
    pub fn detect_category(&self, text: &str) -> Option<&str> {
        let words: Vec<String> = text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_string)
            .collect();

        let hit = self.entries.iter().find(|entry| {
            entry
                .keywords
                .iter()
                .any(|kw| words.iter().any(|w| word_matches(w, kw)))
        });

        debug!(category = ?hit.map(|e| &e.name), "Keyword category detection");
        hit.map(|e| e.name.as_str())
    }
}

fn word_matches(word: &str, keyword: &str) -> bool {
    match word.strip_prefix(keyword) {
        Some(rest) => rest.is_empty() || rest == "s" || rest == "es",
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_prices() {
        assert_eq!(parse_price("$450"), Some(450.0));
        assert_eq!(parse_price("$1,299.99"), Some(1299.99));
        assert_eq!(parse_price("Price: 1,200"), Some(1200.0));
        assert_eq!(parse_price("€ 89.5"), Some(89.5));
        assert_eq!(parse_price("450.00"), Some(450.0));
        assert_eq!(parse_price("call for price"), None);
    }

    #[test]
    fn default_values() {
        let catalog = MarketCatalog::default();
        assert_eq!(catalog.value_of("laptop"), Some(1000.0));
        assert_eq!(catalog.value_of("Headphones"), Some(150.0));
        assert_eq!(catalog.value_of("mouse"), Some(50.0));
        assert_eq!(catalog.value_of("toaster"), None);
        assert_eq!(catalog.len(), 7);
    }

    #[test]
    fn headphones_are_not_phones() {
        let catalog = MarketCatalog::default();
        assert_eq!(
            catalog.detect_category("Sony WH-1000XM5 Wireless Headphones"),
            Some("headphones")
        );
        assert_eq!(catalog.detect_category("iPhone 12 64GB - Used"), Some("phone"));
        assert_eq!(
            catalog.detect_category("Dell XPS 13 Laptop - Intel i7"),
            Some("laptop")
        );
        assert_eq!(catalog.detect_category("Vintage oak chair"), None);
    }

    #[test]
    fn keywords_match_whole_words() {
        let catalog = MarketCatalog::default();
        assert_eq!(catalog.detect_category("Dell OptiPlex desktop computer"), None);
        assert_eq!(
            catalog.detect_category("iPhone 13 with OLED display"),
            Some("phone")
        );
        assert_eq!(catalog.detect_category("gaming mousepad"), None);
        assert_eq!(catalog.detect_category("Standing desks, two left"), Some("desk"));
        assert_eq!(catalog.detect_category("Pair of earbuds"), Some("headphones"));
        assert_eq!(catalog.detect_category("Dual monitors"), Some("monitor"));
    }

    #[test]
    fn loads_flat_and_entry_files() {
        let flat = MarketCatalog::from_json_str(r#"{"tablet": 400, "Laptop": 1100}"#).unwrap();
        assert_eq!(flat.value_of("tablet"), Some(400.0));
        assert_eq!(flat.value_of("laptop"), Some(1100.0));
        assert_eq!(flat.detect_category("Old tablet, cracked"), Some("tablet"));

        let entries = MarketCatalog::from_json_str(
            r#"[{"name": "camera", "market_value": 650, "keywords": ["dslr", "mirrorless"]}]"#,
        )
        .unwrap();
        assert_eq!(entries.detect_category("Canon DSLR body"), Some("camera"));
        assert_eq!(entries.detect_category("A camera"), Some("camera"));
    }

    #[test]
    fn insert_replaces_existing() {
        let mut catalog = MarketCatalog::default();
        catalog.insert("laptop", 800.0, vec![]);
        assert_eq!(catalog.value_of("laptop"), Some(800.0));
        assert_eq!(catalog.len(), 7);
    }

    #[test]
    fn rejects_malformed_file() {
        assert!(matches!(
            MarketCatalog::from_json_str("[1, 2"),
            Err(ScoutError::ParseError(_))
        ));
    }
}
