//! Percentage-threshold price classification.

use crate::market::{parse_price, MarketCatalog};
use crate::Listing;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Discount boundaries, as fractions of the market value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    /// At least this far below market is an alert.
    pub underpriced: f64,
    /// At least this far below market is a good deal.
    pub good_deal: f64,
    /// Up to this far above market still counts as fair.
    pub fair_band: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            underpriced: 0.20,
            good_deal: 0.10,
            fair_band: 0.10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "reason", rename_all = "snake_case")]
pub enum Verdict {
    Underpriced,
    GoodDeal,
    FairlyPriced,
    Overpriced,
    /// Not enough data to compare; carries the reason.
    Unrated(String),
}

impl Verdict {
    pub fn label(&self) -> &'static str {
        match self {
            Verdict::Underpriced => "UNDERPRICED",
            Verdict::GoodDeal => "GOOD DEAL",
            Verdict::FairlyPriced => "FAIRLY PRICED",
            Verdict::Overpriced => "OVERPRICED",
            Verdict::Unrated(_) => "UNRATED",
        }
    }

    pub fn recommendation(&self) -> Recommendation {
        match self {
            Verdict::Underpriced | Verdict::GoodDeal => Recommendation::Buy,
            Verdict::FairlyPriced | Verdict::Unrated(_) => Recommendation::Consider,
            Verdict::Overpriced => Recommendation::Avoid,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Recommendation {
    Buy,
    Consider,
    Avoid,
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Recommendation::Buy => "BUY",
            Recommendation::Consider => "CONSIDER",
            Recommendation::Avoid => "AVOID",
        })
    }
}

/// Everything the agent concluded about one listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assessment {
    pub listing: Listing,
    pub price: Option<f64>,
    pub category: Option<String>,
    pub market_value: Option<f64>,
    /// `(market - price) / market`; negative when above market.
    pub discount: Option<f64>,
    pub verdict: Verdict,
    pub recommendation: Recommendation,
}

impl Assessment {
    pub fn is_alert(&self) -> bool {
        self.verdict == Verdict::Underpriced
    }

    /// Discount as a whole percentage, rounded.
    pub fn percent_off(&self) -> Option<i64> {
        self.discount.map(|d| (d * 100.0).round() as i64)
    }

    /// "40% below market" or "10% above market".
    pub fn market_change(&self) -> Option<String> {
        self.percent_off().map(|pct| {
            if pct >= 0 {
                format!("{pct}% below market")
            } else {
                format!("{}% above market", -pct)
            }
        })
    }
}

pub fn classify(price: f64, market_value: f64, thresholds: &Thresholds) -> (Verdict, Option<f64>) {
    if !(price.is_finite() && price > 0.0) {
        return (Verdict::Unrated(format!("invalid price {price}")), None);
    }
    if !(market_value.is_finite() && market_value > 0.0) {
        return (
            Verdict::Unrated(format!("invalid market value {market_value}")),
            None,
        );
    }

    let discount = (market_value - price) / market_value;
    let verdict = if discount >= thresholds.underpriced {
        Verdict::Underpriced
    } else if discount >= thresholds.good_deal {
        Verdict::GoodDeal
    } else if discount >= -thresholds.fair_band {
        Verdict::FairlyPriced
    } else {
        Verdict::Overpriced
    };
    (verdict, Some(discount))
}

/// Compares a listing against the catalog.
///
/// `category` is the caller's best guess; when `None`, keyword detection on
/// the title and then the description is used. A reference value carried by
/// the listing itself takes precedence over the catalog.
pub fn assess(
    listing: Listing,
    category: Option<String>,
    catalog: &MarketCatalog,
    thresholds: &Thresholds,
) -> Assessment {
    let price = listing.price_text.as_deref().and_then(parse_price);

    let category = category.or_else(|| {
        [listing.title.as_deref(), listing.description.as_deref()]
            .into_iter()
            .flatten()
            .find_map(|text| catalog.detect_category(text))
            .map(str::to_string)
    });

    let market_value = listing
        .reference_value
        .or_else(|| category.as_deref().and_then(|c| catalog.value_of(c)));

    let (verdict, discount) = match (price, market_value) {
        (Some(p), Some(m)) => classify(p, m, thresholds),
        (None, _) => (Verdict::Unrated("listing price not found".into()), None),
        (Some(_), None) => (
            Verdict::Unrated(match &category {
                Some(c) => format!("no market value for category '{c}'"),
                None => "product category not recognised".to_string(),
            }),
            None,
        ),
    };

    Assessment {
        recommendation: verdict.recommendation(),
        listing,
        price,
        category,
        market_value,
        discount,
        verdict,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(title: &str, price: &str) -> Listing {
        Listing {
            url: "https://shop.example/1".into(),
            title: Some(title.into()),
            price_text: Some(price.into()),
            description: None,
            reference_value: None,
        }
    }

    #[test]
    fn threshold_boundaries() {
        let t = Thresholds::default();
        assert_eq!(classify(800.0, 1000.0, &t).0, Verdict::Underpriced);
        assert_eq!(classify(800.01, 1000.0, &t).0, Verdict::GoodDeal);
        assert_eq!(classify(900.0, 1000.0, &t).0, Verdict::GoodDeal);
        assert_eq!(classify(950.0, 1000.0, &t).0, Verdict::FairlyPriced);
        assert_eq!(classify(1100.0, 1000.0, &t).0, Verdict::FairlyPriced);
        assert_eq!(classify(1100.5, 1000.0, &t).0, Verdict::Overpriced);
    }

    #[test]
    fn invalid_numbers_are_unrated() {
        let t = Thresholds::default();
        assert!(matches!(classify(0.0, 1000.0, &t).0, Verdict::Unrated(_)));
        assert!(matches!(classify(10.0, -1.0, &t).0, Verdict::Unrated(_)));
        assert!(matches!(classify(f64::NAN, 10.0, &t).0, Verdict::Unrated(_)));
    }

    #[test]
    fn recommendations() {
        assert_eq!(Verdict::Underpriced.recommendation(), Recommendation::Buy);
        assert_eq!(Verdict::GoodDeal.recommendation(), Recommendation::Buy);
        assert_eq!(Verdict::FairlyPriced.recommendation(), Recommendation::Consider);
        assert_eq!(Verdict::Overpriced.recommendation(), Recommendation::Avoid);
        assert_eq!(
            Verdict::Unrated("x".into()).recommendation(),
            Recommendation::Consider
        );
    }

    #[test]
    fn assess_uses_catalog() {
        let catalog = MarketCatalog::default();
        let a = assess(
            listing("Dell XPS 13 Laptop", "$450"),
            None,
            &catalog,
            &Thresholds::default(),
        );
        assert_eq!(a.category.as_deref(), Some("laptop"));
        assert_eq!(a.market_value, Some(1000.0));
        assert_eq!(a.verdict, Verdict::Underpriced);
        assert_eq!(a.percent_off(), Some(55));
        assert_eq!(a.market_change().as_deref(), Some("55% below market"));
        assert!(a.is_alert());
    }

    #[test]
    fn reference_value_overrides_catalog() {
        let mut l = listing("iPhone 12 64GB - Used", "$750");
        l.reference_value = Some(500.0);
        let a = assess(l, None, &MarketCatalog::default(), &Thresholds::default());
        assert_eq!(a.market_value, Some(500.0));
        assert_eq!(a.verdict, Verdict::Overpriced);
        assert_eq!(a.recommendation, Recommendation::Avoid);
        assert_eq!(a.percent_off(), Some(-50));
        assert_eq!(a.market_change().as_deref(), Some("50% above market"));
    }

    #[test]
    fn missing_data_is_unrated() {
        let catalog = MarketCatalog::default();
        let t = Thresholds::default();

        let mut no_price = listing("Laptop", "");
        no_price.price_text = None;
        assert!(matches!(
            assess(no_price, None, &catalog, &t).verdict,
            Verdict::Unrated(reason) if reason.contains("price")
        ));

        let unknown = assess(listing("Oak chair", "$40"), None, &catalog, &t);
        assert!(matches!(unknown.verdict, Verdict::Unrated(ref r) if r.contains("category")));
        assert!(!unknown.is_alert());
    }

    #[test]
    fn explicit_category_wins() {
        let a = assess(
            listing("Wireless thing", "$44"),
            Some("mouse".into()),
            &MarketCatalog::default(),
            &Thresholds::default(),
        );
        assert_eq!(a.market_value, Some(50.0));
        assert_eq!(a.verdict, Verdict::GoodDeal);
    }
}
