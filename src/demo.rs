//! Offline listings for demos and tests. No network access.

use crate::{Listing, ListingSource, ScoutError};
use async_trait::async_trait;
use tracing::debug;

struct DemoProduct {
    keywords: &'static [&'static str],
    title: &'static str,
    price: &'static str,
    description: &'static str,
    market_value: f64,
}

const PRODUCTS: &[DemoProduct] = &[
    DemoProduct {
        keywords: &["laptop", "deal"],
        title: "Dell XPS 13 Laptop - Intel i7, 16GB RAM, 512GB SSD",
        price: "$450",
        description: "Excellent condition Dell XPS 13 with Intel Core i7 processor, 16GB RAM, \
                      and 512GB SSD. Barely used, comes with original charger and box.",
        market_value: 900.0,
    },
    DemoProduct {
        keywords: &["headphones"],
        title: "Sony WH-1000XM5 Wireless Headphones",
        price: "$220",
        description: "Premium noise-cancelling wireless headphones with 30-hour battery life. \
                      Great sound quality.",
        market_value: 350.0,
    },
    DemoProduct {
        keywords: &["phone"],
        title: "iPhone 12 64GB - Used",
        price: "$750",
        description: "iPhone 12 in decent condition, some cosmetic scratches but fully functional.",
        market_value: 500.0,
    },
];

static GENERIC: DemoProduct = DemoProduct {
    keywords: &[],
    title: "Generic Product",
    price: "$100",
    description: "A product listing",
    market_value: 150.0,
};

/// Sample URLs, one per demo product, with a short label.
pub const DEMO_URLS: &[(&str, &str)] = &[
    ("Underpriced Laptop", "https://marketplace.example/laptop-dell-xps-13"),
    ("Discounted Headphones", "https://marketplace.example/headphones-sony"),
    ("Overpriced Phone", "https://marketplace.example/iphone-12-used"),
];

/// Picks a canned listing from keywords in the URL.
#[derive(Debug, Clone, Copy, Default)]
pub struct DemoListingSource;

impl DemoListingSource {
    pub fn new() -> Self {
        Self
    }

    fn product_for(url: &str) -> &'static DemoProduct {
        let url = url.to_lowercase();
        PRODUCTS
            .iter()
            .find(|p| p.keywords.iter().any(|k| url.contains(k)))
            .unwrap_or(&GENERIC)
    }
}

#[async_trait]
impl ListingSource for DemoListingSource {
    fn name(&self) -> &str {
        "demo"
    }

    async fn load(&self, url: &str) -> Result<Listing, ScoutError> {
        let product = Self::product_for(url);
        debug!(url = %url, title = product.title, "Serving demo listing");

        Ok(Listing {
            url: url.to_string(),
            title: Some(product.title.to_string()),
            price_text: Some(product.price.to_string()),
            description: Some(product.description.to_string()),
            reference_value: Some(product.market_value),
        })
    }
}
