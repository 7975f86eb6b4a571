use crate::utils::{collapse_whitespace, take_chars};
use crate::Listing;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::OnceLock;
use tracing::debug;

/// Descriptions longer than this are cut before they reach the LLM or a reply.
pub const MAX_DESCRIPTION_CHARS: usize = 500;

struct Patterns {
    title_class: Regex,
    description_class: Regex,
    dollar_amount: Regex,
    labelled_price: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        title_class: Regex::new(r"(?i)title|product|name").expect("static regex"),
        description_class: Regex::new(r"(?i)description|details|info").expect("static regex"),
        dollar_amount: Regex::new(r"\$[\d,]+\.?\d*").expect("static regex"),
        labelled_price: Regex::new(r"(?i)price[:\s]*\$?[\d,]+\.?\d*").expect("static regex"),
    })
}

/// Listing extractor, pulls title, price and description out of a product page.
///
/// Structured metadata (Open Graph, schema.org microdata) wins when present;
/// otherwise common class-name conventions and finally a text scan are used.
#[derive(Clone, Default)]
pub struct ListingExtractor;

impl ListingExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn extract(&self, html: &str, url: &str) -> Listing {
        let document = Html::parse_document(html);

        let title = self.extract_title(&document);
        let price_text = self.extract_price(&document);
        let description = self.extract_description(&document);

        debug!(
            url = %url,
            title = ?title,
            price = ?price_text,
            has_description = description.is_some(),
            "Listing extraction finished"
        );

        Listing {
            url: url.to_string(),
            title,
            price_text,
            description,
            reference_value: None,
        }
    }

    fn extract_title(&self, document: &Html) -> Option<String> {
        if let Some(title) = meta_content(document, "meta[property='og:title']") {
            return Some(title);
        }

        for tag in ["h1", "h2"] {
            let Ok(selector) = Selector::parse(tag) else {
                continue;
            };
            let hit = document
                .select(&selector)
                .find(|el| class_matches(el, &patterns().title_class));
            if let Some(el) = hit.and_then(element_text) {
                return Some(el);
            }
        }

        first_text(document, "h1").or_else(|| first_text(document, "title"))
    }

    fn extract_price(&self, document: &Html) -> Option<String> {
        let structured = meta_content(document, "meta[property='product:price:amount']")
            .or_else(|| meta_content(document, "meta[property='og:price:amount']"))
            .or_else(|| {
                let selector = Selector::parse("[itemprop='price']").ok()?;
                let el = document.select(&selector).next()?;
                el.value()
                    .attr("content")
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .or_else(|| element_text(el))
            });
        if structured.is_some() {
            return structured;
        }

        let p = patterns();
        if let Ok(selector) = Selector::parse("[class*='price'], [class*='Price']") {
            let candidates: Vec<ElementRef<'_>> = document.select(&selector).collect();
            let innermost = candidates.iter().filter(|el| {
                !is_struck(el.value().name())
                    && !candidates.iter().any(|other| {
                        other.id() != el.id()
                            && !is_struck(other.value().name())
                            && other.ancestors().any(|a| a.id() == el.id())
                    })
            });
            for el in innermost {
                let text = current_price_text(*el);
                if let Some(m) = p.dollar_amount.find(&text) {
                    return Some(m.as_str().to_string());
                }
                if text.chars().any(|c| c.is_ascii_digit()) {
                    return Some(text);
                }
            }
        }

        for tag in ["span", "div", "p"] {
            let Ok(selector) = Selector::parse(tag) else {
                continue;
            };
            for el in document.select(&selector) {
                let text = el.text().collect::<String>();
                for pattern in [&p.dollar_amount, &p.labelled_price] {
                    if let Some(m) = pattern.find(&text) {
                        return Some(m.as_str().to_string());
                    }
                }
            }
        }

        None
    }

    fn extract_description(&self, document: &Html) -> Option<String> {
        let from_meta = meta_content(document, "meta[property='og:description']")
            .or_else(|| meta_content(document, "meta[name='description']"));

        let from_body = || {
            for tag in ["div", "p", "section"] {
                let Ok(selector) = Selector::parse(tag) else {
                    continue;
                };
                let hit = document
                    .select(&selector)
                    .find(|el| class_matches(el, &patterns().description_class))
                    .and_then(element_text);
                if hit.is_some() {
                    return hit;
                }
            }
            first_text(document, "p")
        };

        from_meta
            .or_else(from_body)
            .map(|d| take_chars(&d, MAX_DESCRIPTION_CHARS))
    }
}

fn meta_content(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document
        .select(&selector)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(collapse_whitespace)
        .filter(|s| !s.is_empty())
}

fn first_text(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document.select(&selector).find_map(element_text)
}

fn element_text(el: ElementRef<'_>) -> Option<String> {
    let text = collapse_whitespace(&el.text().collect::<String>());
    (!text.is_empty()).then_some(text)
}

/// Text of a price element, leaving out struck-through old prices.
fn current_price_text(el: ElementRef<'_>) -> String {
    let text: String = el
        .descendants()
        .filter_map(|node| node.value().as_text().map(|t| (node, t)))
        .filter(|(node, _)| {
            !node
                .ancestors()
                .take_while(|a| a.id() != el.id())
                .any(|a| {
                    a.value()
                        .as_element()
                        .is_some_and(|e| is_struck(e.name()))
                })
        })
        .map(|(_, t)| &**t)
        .collect();
    collapse_whitespace(&text)
}

fn is_struck(tag: &str) -> bool {
    matches!(tag, "s" | "del" | "strike")
}

fn class_matches(el: &ElementRef<'_>, pattern: &Regex) -> bool {
    el.value()
        .attr("class")
        .map(|class| pattern.is_match(class))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://shop.example/item/1";

    #[test]
    fn prefers_open_graph() {
        let html = r#"<html><head>
            <meta property="og:title" content="Dell XPS 13">
            <meta property="product:price:amount" content="450.00">
            <meta property="og:description" content="Barely used.">
            <title>Shop - Dell</title></head>
            <body><h1 class="product-title">Other</h1><span>$999</span></body></html>"#;
        let listing = ListingExtractor::new().extract(html, URL);
        assert_eq!(listing.title.as_deref(), Some("Dell XPS 13"));
        assert_eq!(listing.price_text.as_deref(), Some("450.00"));
        assert_eq!(listing.description.as_deref(), Some("Barely used."));
    }

    #[test]
    fn class_based_fallbacks() {
        let html = r#"<html><head><title>Page</title></head><body>
            <h1>Site banner</h1>
            <h2 class="Product-Name">Sony WH-1000XM5</h2>
            <div class="listing-price"> $220 </div>
            <section class="item-details">Noise cancelling, 30h battery.</section>
            </body></html>"#;
        let listing = ListingExtractor::new().extract(html, URL);
        assert_eq!(listing.title.as_deref(), Some("Sony WH-1000XM5"));
        assert_eq!(listing.price_text.as_deref(), Some("$220"));
        assert_eq!(
            listing.description.as_deref(),
            Some("Noise cancelling, 30h battery.")
        );
    }

    #[test]
    fn struck_price_is_skipped() {
        let html = r#"<html><body>
            <div class="price-box"><s>$999</s> $450</div>
            </body></html>"#;
        let listing = ListingExtractor::new().extract(html, URL);
        assert_eq!(listing.price_text.as_deref(), Some("$450"));

        let nested = r#"<html><body>
            <div class="product-price">
                <span class="price-label">Now only</span>
                <del class="price-old">$1,299</del>
                <span class="price-current">$1,049.99</span>
            </div>
            </body></html>"#;
        let listing = ListingExtractor::new().extract(nested, URL);
        assert_eq!(listing.price_text.as_deref(), Some("$1,049.99"));

        let tagged_old = r#"<html><body>
            <div class="price-box"><del class="price-was">$999</del> $450</div>
            </body></html>"#;
        let listing = ListingExtractor::new().extract(tagged_old, URL);
        assert_eq!(listing.price_text.as_deref(), Some("$450"));
    }

    #[test]
    fn text_scan_fallbacks() {
        let html = r#"<html><head><title> Used iPhone 12 </title></head><body>
            <p>Selling my phone, works great.</p>
            <p>Asking $750 or best offer</p>
            </body></html>"#;
        let listing = ListingExtractor::new().extract(html, URL);
        assert_eq!(listing.title.as_deref(), Some("Used iPhone 12"));
        assert_eq!(listing.price_text.as_deref(), Some("$750"));
        assert_eq!(
            listing.description.as_deref(),
            Some("Selling my phone, works great.")
        );
    }

    #[test]
    fn labelled_price_without_sign() {
        let html = "<html><body><div>Price: 1,200</div></body></html>";
        let listing = ListingExtractor::new().extract(html, URL);
        assert_eq!(listing.price_text.as_deref(), Some("Price: 1,200"));
    }

    #[test]
    fn long_description_truncated() {
        let html = format!(
            "<html><body><p class=\"description\">{}</p></body></html>",
            "x".repeat(2000)
        );
        let listing = ListingExtractor::new().extract(&html, URL);
        assert_eq!(listing.description.unwrap().len(), MAX_DESCRIPTION_CHARS);
    }

    #[test]
    fn empty_page() {
        let listing = ListingExtractor::new().extract("<html></html>", URL);
        assert!(listing.title.is_none());
        assert!(listing.price_text.is_none());
        assert!(listing.description.is_none());
        assert_eq!(listing.url, URL);
    }
}
