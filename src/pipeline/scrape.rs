//! HTML → [`SourceProduct`].
//!
//! Three layers are read in order of reliability and merged field by field:
//!
//! 1. JSON-LD `Product` / `ProductGroup` blocks (including `@graph` and
//!    `hasVariant`),
//! 2. Open Graph and `product:*` meta tags,
//! 3. the configurable CSS selectors in [`ScrapeSelectors`].
//!
//! A field already filled by an earlier layer is kept; list fields (images,
//! sizes, colors) are unioned in first-seen order.

use crate::config::ScrapeSelectors;
use crate::error::ListingError;
use crate::pipeline::source::SourcePage;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, warn};

/// Product data pulled from a source page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceProduct {
    pub url: String,
    pub title: String,
    pub description: String,
    /// Lowest listed price in cents.
    pub price_cents: Option<u64>,
    /// ISO 4217 code when the page states or implies one.
    pub currency: Option<String>,
    /// Absolute URLs (or file paths for local pages), deduplicated.
    pub images: Vec<String>,
    pub sizes: Vec<String>,
    pub colors: Vec<String>,
    /// Free-form attributes such as `Material` or `Brand`.
    pub attributes: BTreeMap<String, String>,
    pub sku: Option<String>,
}

static SEL_LD_JSON: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"script[type="application/ld+json"]"#).unwrap());
static SEL_META: Lazy<Selector> = Lazy::new(|| Selector::parse("meta").unwrap());
static SEL_TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("title").unwrap());

static RE_THUMB_SUFFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\.(?:jpe?g|png|webp|gif))_(?:\d+x\d+[^/?#]*|\.webp)$").unwrap()
});
static RE_PRICE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d{1,3}(?:,\d{3})+(?:\.\d+)?|\d+(?:\.\d+)?").unwrap());
static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Extract a [`SourceProduct`] from a loaded page.
pub fn scrape_product(
    page: &SourcePage,
    selectors: &ScrapeSelectors,
) -> Result<SourceProduct, ListingError> {
    let document = Html::parse_document(&page.html);
    let mut product = SourceProduct {
        url: page.origin.clone(),
        ..Default::default()
    };
    let mut images = Vec::new();

    for node in json_ld_products(&document) {
        merge_json_ld(&mut product, &mut images, &node);
    }
    merge_meta(&mut product, &mut images, &document);
    merge_selectors(&mut product, &mut images, &document, selectors);

    if product.title.is_empty() {
        if let Some(title) = document.select(&SEL_TITLE).next().map(element_text) {
            product.title = title;
        }
    }

    product.images = normalise_images(page, images);
    product.sizes = dedup(std::mem::take(&mut product.sizes));
    product.colors = dedup(std::mem::take(&mut product.colors));

    if product.title.is_empty() && product.images.is_empty() {
        return Err(ListingError::NoProductData {
            url: page.origin.clone(),
        });
    }

    debug!(
        "Scraped '{}': {} images, {} sizes, {} colors, price {:?}",
        product.title,
        product.images.len(),
        product.sizes.len(),
        product.colors.len(),
        product.price_cents
    );
    Ok(product)
}

// ── JSON-LD ──────────────────────────────────────────────────────────────

fn json_ld_products(document: &Html) -> Vec<Value> {
    let mut out = Vec::new();
    for script in document.select(&SEL_LD_JSON) {
        let text = script.text().collect::<String>();
        match serde_json::from_str::<Value>(text.trim()) {
            Ok(value) => collect_products(&value, &mut out),
            Err(e) => debug!("Skipping unparsable JSON-LD block: {}", e),
        }
    }
    out
}

fn collect_products(value: &Value, out: &mut Vec<Value>) {
    match value {
        Value::Array(items) => items.iter().for_each(|v| collect_products(v, out)),
        Value::Object(obj) => {
            if has_type(value, &["Product", "ProductGroup"]) {
                out.push(value.clone());
            } else if let Some(graph) = obj.get("@graph") {
                collect_products(graph, out);
            }
        }
        _ => {}
    }
}

fn has_type(value: &Value, wanted: &[&str]) -> bool {
    match value.get("@type") {
        Some(Value::String(t)) => wanted.contains(&t.as_str()),
        Some(Value::Array(ts)) => ts
            .iter()
            .filter_map(Value::as_str)
            .any(|t| wanted.contains(&t)),
        _ => false,
    }
}

fn merge_json_ld(product: &mut SourceProduct, images: &mut Vec<String>, node: &Value) {
    fill(&mut product.title, node.get("name").and_then(Value::as_str));
    fill(&mut product.description, node.get("description").and_then(Value::as_str));
    json_images(node.get("image"), images);

    if product.sku.is_none() {
        product.sku = node.get("sku").and_then(scalar_string);
    }
    if let Some(offers) = node.get("offers") {
        merge_offers(product, offers);
    }
    if let Some(brand) = node
        .get("brand")
        .and_then(|b| b.get("name").and_then(scalar_string).or_else(|| scalar_string(b)))
    {
        product.attributes.entry("Brand".into()).or_insert(brand);
    }
    if let Some(material) = node.get("material").and_then(scalar_string) {
        product.attributes.entry("Material".into()).or_insert(material);
    }
    if let Some(props) = node.get("additionalProperty").and_then(Value::as_array) {
        for prop in props {
            if let (Some(name), Some(value)) = (
                prop.get("name").and_then(scalar_string),
                prop.get("value").and_then(scalar_string),
            ) {
                product.attributes.entry(name).or_insert(value);
            }
        }
    }

    push_values(&mut product.colors, node.get("color"));
    push_values(&mut product.sizes, node.get("size"));

    if let Some(variants) = node.get("hasVariant").and_then(Value::as_array) {
        for variant in variants {
            push_values(&mut product.colors, variant.get("color"));
            push_values(&mut product.sizes, variant.get("size"));
            json_images(variant.get("image"), images);
            if let Some(offers) = variant.get("offers") {
                merge_offers(product, offers);
            }
        }
    }
}

/// Keep the lowest price seen across offers and variants.
fn merge_offers(product: &mut SourceProduct, offers: &Value) {
    let list: Vec<&Value> = match offers {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    };
    for offer in list {
        let price = ["price", "lowPrice"]
            .iter()
            .find_map(|k| offer.get(*k).and_then(scalar_string))
            .and_then(|p| parse_price_cents(&p));
        if let Some(cents) = price {
            product.price_cents = Some(product.price_cents.map_or(cents, |c| c.min(cents)));
        }
        if product.currency.is_none() {
            product.currency = offer
                .get("priceCurrency")
                .and_then(Value::as_str)
                .map(|c| c.trim().to_uppercase());
        }
    }
}

fn json_images(value: Option<&Value>, images: &mut Vec<String>) {
    match value {
        Some(Value::String(s)) => images.push(s.clone()),
        Some(Value::Array(items)) => items.iter().for_each(|v| json_images(Some(v), images)),
        Some(obj @ Value::Object(_)) => {
            if let Some(url) = obj
                .get("url")
                .or_else(|| obj.get("contentUrl"))
                .and_then(Value::as_str)
            {
                images.push(url.to_string());
            }
        }
        _ => {}
    }
}

fn push_values(target: &mut Vec<String>, value: Option<&Value>) {
    match value {
        Some(Value::Array(items)) => target.extend(items.iter().filter_map(scalar_string)),
        Some(v) => target.extend(scalar_string(v)),
        None => {}
    }
}

fn scalar_string(value: &Value) -> Option<String> {
    let s = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!s.is_empty()).then_some(s)
}

// ── Meta tags ────────────────────────────────────────────────────────────

fn merge_meta(product: &mut SourceProduct, images: &mut Vec<String>, document: &Html) {
    let mut price = None;
    let mut currency = None;

    for meta in document.select(&SEL_META) {
        let el = meta.value();
        let key = el.attr("property").or_else(|| el.attr("name")).unwrap_or("");
        let Some(content) = el.attr("content").map(str::trim).filter(|c| !c.is_empty()) else {
            continue;
        };
        match key {
            "og:title" => fill(&mut product.title, Some(content)),
            "og:description" | "description" => fill(&mut product.description, Some(content)),
            "og:image" | "og:image:url" | "og:image:secure_url" => images.push(content.into()),
            "product:price:amount" | "og:price:amount" => price = price.or(parse_price_cents(content)),
            "product:price:currency" | "og:price:currency" => {
                currency = currency.or(Some(content.to_uppercase()))
            }
            _ => {}
        }
    }

    if product.price_cents.is_none() {
        product.price_cents = price;
    }
    if product.currency.is_none() {
        product.currency = currency;
    }
}

// ── CSS selectors ────────────────────────────────────────────────────────

fn merge_selectors(
    product: &mut SourceProduct,
    images: &mut Vec<String>,
    document: &Html,
    selectors: &ScrapeSelectors,
) {
    if let Some(sel) = parse_selector("title", &selectors.title) {
        if let Some(text) = document.select(&sel).map(element_text).find(|t| !t.is_empty()) {
            fill(&mut product.title, Some(text.as_str()));
        }
    }
    if let Some(sel) = parse_selector("description", &selectors.description) {
        if let Some(text) = document.select(&sel).map(element_text).find(|t| !t.is_empty()) {
            fill(&mut product.description, Some(text.as_str()));
        }
    }
    if let Some(sel) = parse_selector("gallery", &selectors.gallery) {
        for img in document.select(&sel) {
            let el = img.value();
            if let Some(src) = ["data-src", "data-original", "data-lazy-src", "src"]
                .iter()
                .find_map(|a| el.attr(a))
            {
                images.push(src.to_string());
            }
        }
    }
    if let Some(sel) = parse_selector("price", &selectors.price) {
        for el in document.select(&sel) {
            let text = el
                .value()
                .attr("content")
                .map(str::to_string)
                .unwrap_or_else(|| element_text(el));
            if let Some(cents) = parse_price_cents(&text) {
                if product.price_cents.is_none() {
                    product.price_cents = Some(cents);
                }
                if product.currency.is_none() {
                    product.currency = detect_currency(&text);
                }
                break;
            }
        }
    }
    if let Some(sel) = parse_selector("sizes", &selectors.sizes) {
        product
            .sizes
            .extend(document.select(&sel).filter_map(|el| variant_label(el, "data-size")));
    }
    if let Some(sel) = parse_selector("colors", &selectors.colors) {
        product
            .colors
            .extend(document.select(&sel).filter_map(|el| variant_label(el, "data-color")));
    }
}

fn parse_selector(field: &str, css: &str) -> Option<Selector> {
    if css.trim().is_empty() {
        return None;
    }
    match Selector::parse(css) {
        Ok(sel) => Some(sel),
        Err(e) => {
            warn!("Ignoring invalid {} selector '{}': {:?}", field, css, e);
            None
        }
    }
}

fn variant_label(el: ElementRef<'_>, attr: &str) -> Option<String> {
    el.value()
        .attr(attr)
        .or_else(|| el.value().attr("title"))
        .map(|s| s.trim().to_string())
        .or_else(|| Some(element_text(el)))
        .filter(|s| !s.is_empty())
}

fn element_text(el: ElementRef<'_>) -> String {
    let text = el.text().collect::<Vec<_>>().join(" ");
    RE_WHITESPACE.replace_all(text.trim(), " ").into_owned()
}

// ── Helpers ──────────────────────────────────────────────────────────────

fn fill(target: &mut String, value: Option<&str>) {
    if target.is_empty() {
        if let Some(v) = value {
            *target = RE_WHITESPACE.replace_all(v.trim(), " ").into_owned();
        }
    }
}

fn normalise_images(page: &SourcePage, raw: Vec<String>) -> Vec<String> {
    let resolved = raw
        .iter()
        .filter_map(|src| page.resolve_link(src))
        .map(|url| strip_thumbnail_suffix(&url));
    dedup(resolved.collect())
}

/// `a.jpg_60x60q90.jpg` → `a.jpg`, `a.jpg_.webp` → `a.jpg`.
pub fn strip_thumbnail_suffix(url: &str) -> String {
    RE_THUMB_SUFFIX.replace(url, "$1").into_owned()
}

fn dedup(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty() && seen.insert(s.clone()))
        .collect()
}

/// Parse the first amount in a price string into cents.
///
/// `"¥ 1,299.50"` → `129950`, `"$19.9 - $25"` → `1990`. Integer arithmetic
/// only, so no float rounding creeps into prices.
pub fn parse_price_cents(text: &str) -> Option<u64> {
    let m = RE_PRICE.find(text)?;
    let digits = m.as_str().replace(',', "");
    let (whole, frac) = digits.split_once('.').unwrap_or((&digits, ""));
    let whole: u64 = whole.parse().ok()?;
    let mut frac: String = frac.chars().take(2).collect();
    while frac.len() < 2 {
        frac.push('0');
    }
    let frac: u64 = frac.parse().ok()?;
    whole.checked_mul(100)?.checked_add(frac)
}

/// Currency implied by a symbol in a price string.
pub fn detect_currency(text: &str) -> Option<String> {
    let code = if text.contains('¥') || text.contains('￥') || text.contains('元') {
        "CNY"
    } else if text.contains('€') {
        "EUR"
    } else if text.contains('£') {
        "GBP"
    } else if text.contains('$') {
        "USD"
    } else {
        return None;
    };
    Some(code.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::source::PageBase;
    use reqwest::Url;

    fn page(html: &str) -> SourcePage {
        SourcePage {
            origin: "https://shop.example/item/42.html".into(),
            base: PageBase::Url(Url::parse("https://shop.example/item/42.html").unwrap()),
            html: html.into(),
        }
    }

    #[test]
    fn price_parsing() {
        assert_eq!(parse_price_cents("¥ 1,299.50"), Some(129_950));
        assert_eq!(parse_price_cents("$19.9 - $25"), Some(1_990));
        assert_eq!(parse_price_cents("39"), Some(3_900));
        assert_eq!(parse_price_cents("12.345"), Some(1_234));
        assert_eq!(parse_price_cents("free"), None);
    }

    #[test]
    fn currency_detection() {
        assert_eq!(detect_currency("￥88").as_deref(), Some("CNY"));
        assert_eq!(detect_currency("US $5").as_deref(), Some("USD"));
        assert_eq!(detect_currency("12.00"), None);
    }

    #[test]
    fn thumbnail_suffixes_are_stripped() {
        assert_eq!(
            strip_thumbnail_suffix("https://img.example/a.jpg_60x60q90.jpg"),
            "https://img.example/a.jpg"
        );
        assert_eq!(
            strip_thumbnail_suffix("https://img.example/b.png_.webp"),
            "https://img.example/b.png"
        );
        assert_eq!(
            strip_thumbnail_suffix("https://img.example/c.jpg"),
            "https://img.example/c.jpg"
        );
    }

    #[test]
    fn json_ld_product_group_with_variants() {
        let html = r#"<html><head>
            <script type="application/ld+json">
            {"@context":"https://schema.org","@graph":[
              {"@type":"BreadcrumbList"},
              {"@type":"ProductGroup","name":"Linen Summer Dress",
               "description":"Light and airy.",
               "brand":{"@type":"Brand","name":"Acme"},
               "material":"Linen",
               "image":["/img/1.jpg", {"@type":"ImageObject","url":"//cdn.example/2.jpg"}],
               "hasVariant":[
                 {"@type":"Product","color":"Blue","size":"M",
                  "offers":{"@type":"Offer","price":"59.90","priceCurrency":"cny"}},
                 {"@type":"Product","color":"Blue","size":"L",
                  "offers":{"@type":"Offer","price":49.5}}
               ]}
            ]}
            </script></head><body></body></html>"#;

        let p = scrape_product(&page(html), &ScrapeSelectors::default()).unwrap();
        assert_eq!(p.title, "Linen Summer Dress");
        assert_eq!(p.description, "Light and airy.");
        assert_eq!(
            p.images,
            vec!["https://shop.example/img/1.jpg", "https://cdn.example/2.jpg"]
        );
        assert_eq!(p.colors, vec!["Blue"]);
        assert_eq!(p.sizes, vec!["M", "L"]);
        assert_eq!(p.price_cents, Some(4_950));
        assert_eq!(p.currency.as_deref(), Some("CNY"));
        assert_eq!(p.attributes.get("Brand").map(String::as_str), Some("Acme"));
        assert_eq!(p.attributes.get("Material").map(String::as_str), Some("Linen"));
    }

    #[test]
    fn meta_and_selectors_fill_the_gaps() {
        let html = r#"<html><head>
            <meta property="og:title" content="Cotton Tee">
            <meta property="og:image" content="https://img.example/main.jpg_220x220.jpg">
            <meta property="product:price:amount" content="19.99">
            <meta property="product:price:currency" content="USD">
            </head><body>
            <div class="product-gallery">
              <img data-src="https://img.example/main.jpg">
              <img src="/g/2.jpg">
            </div>
            <ul class="size-list"><li>S</li><li> M </li><li>S</li></ul>
            <ul class="color-list"><li data-color="White">w</li></ul>
            </body></html>"#;

        let p = scrape_product(&page(html), &ScrapeSelectors::default()).unwrap();
        assert_eq!(p.title, "Cotton Tee");
        assert_eq!(
            p.images,
            vec!["https://img.example/main.jpg", "https://shop.example/g/2.jpg"]
        );
        assert_eq!(p.price_cents, Some(1_999));
        assert_eq!(p.currency.as_deref(), Some("USD"));
        assert_eq!(p.sizes, vec!["S", "M"]);
        assert_eq!(p.colors, vec!["White"]);
    }

    #[test]
    fn empty_page_is_no_product_data() {
        let err = scrape_product(&page("<html><body><p>hi</p></body></html>"), &ScrapeSelectors::default())
            .unwrap_err();
        assert!(matches!(err, ListingError::NoProductData { .. }));
    }

    #[test]
    fn invalid_custom_selector_is_ignored() {
        let selectors = ScrapeSelectors {
            title: "h1[".into(),
            ..Default::default()
        };
        let p = scrape_product(&page("<html><title>Fallback Title</title></html>"), &selectors).unwrap();
        assert_eq!(p.title, "Fallback Title");
    }
}
