//! Configuration types for a Temu listing run.
//!
//! All listing behaviour is controlled through [`ListingConfig`], built via
//! [`ListingConfigBuilder`]. One struct holds every knob (credentials, API
//! generation, image limits, OCR, pricing) so a run can be logged, cloned into
//! a batch and compared against another run.
//!
//! Values that are per-shop rather than per-run (property defaults, size
//! overrides, the category path) usually live in a JSON [`ListingProfile`]
//! and are merged with [`ListingConfigBuilder::profile`].

use crate::api::client::TemuCredentials;
use crate::api::generation::TemuApi;
use crate::api::signature::SignMethod;
use crate::error::ListingError;
use crate::pipeline::ocr::TextDetector;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Configuration for one listing run.
///
/// # Example
/// ```rust
/// use temu_lister::{ApiGeneration, ListingConfig};
///
/// let config = ListingConfig::builder()
///     .api_generation(ApiGeneration::Old)
///     .category_id(30_012)
///     .dry_run(true)
///     .build()
///     .unwrap();
/// assert!(config.dry_run);
/// ```
#[derive(Clone)]
pub struct ListingConfig {
    // ── Temu API ─────────────────────────────────────────────────────────
    /// App key / secret / access token. `None` reads `TEMU_APP_KEY`,
    /// `TEMU_APP_SECRET` and `TEMU_ACCESS_TOKEN` when the client is built.
    pub credentials: Option<TemuCredentials>,

    /// Gateway region. Default: [`Region::Cn`].
    pub region: Region,

    /// Explicit router URL; overrides [`Region::router_url`].
    pub router_url: Option<String>,

    /// Which API generation handles calls first. Default: [`ApiGeneration::New`].
    pub api_generation: ApiGeneration,

    /// When to fall back to the other generation. Default: [`FallbackPolicy::OnUnsupported`].
    pub fallback: FallbackPolicy,

    /// Keep using the fallback generation once it has succeeded. Default: true.
    pub sticky_fallback: bool,

    /// Request signing scheme. Default: MD5.
    pub sign_method: SignMethod,

    /// Per-request HTTP timeout in seconds. Default: 30.
    pub api_timeout_secs: u64,

    /// Retries after the first attempt on a transient API failure, so the
    /// number of attempts is one more. Default: 2 (three attempts).
    pub max_retries: u32,

    /// Initial backoff in milliseconds; doubles per retry. Default: 1000.
    pub retry_backoff_ms: u64,

    /// Upper bound for a single backoff sleep. Default: 30 000.
    pub max_backoff_ms: u64,

    /// Random spread applied to each backoff, as a fraction. Default: 0.1.
    pub retry_jitter: f64,

    /// Temu error codes treated as transient (retried).
    pub transient_error_codes: Vec<i64>,

    /// Temu error codes meaning "this API is not available to you" (fallback trigger).
    pub unsupported_error_codes: Vec<i64>,

    /// Per-operation API name overrides.
    pub api_types: ApiTypeOverrides,

    /// Pre-built API implementation. Takes precedence over everything above.
    pub api: Option<Arc<dyn TemuApi>>,

    // ── Source scraping ──────────────────────────────────────────────────
    /// Timeout for fetching the source page and its images. Default: 30.
    pub fetch_timeout_secs: u64,

    /// `User-Agent` sent to the source site.
    pub user_agent: String,

    /// CSS selectors used when structured data is missing.
    pub selectors: ScrapeSelectors,

    // ── Images ───────────────────────────────────────────────────────────
    /// Maximum number of source images considered. Default: 10.
    pub max_source_images: usize,

    /// Concurrent image downloads. Default: 4.
    pub image_concurrency: usize,

    /// Minimum accepted side length in pixels. Default: 800.
    pub min_image_side: u32,

    /// Images above this side length are downscaled. Default: 2000.
    pub max_image_side: u32,

    /// Smallest short side that may still be upscaled. Default: 500.
    pub upscale_floor: u32,

    /// Pad images with a disallowed aspect ratio onto a white square. Default: true.
    pub pad_to_square: bool,

    /// Size limit of an encoded image. Default: 3 MiB.
    pub max_image_bytes: usize,

    /// Starting JPEG quality. Default: 90.
    pub jpeg_quality: u8,

    // ── OCR ──────────────────────────────────────────────────────────────
    /// Run the Chinese-text filter. Default: true.
    pub ocr_enabled: bool,

    /// Pre-built text detector. Takes precedence over the LLM settings.
    pub text_detector: Option<Arc<dyn TextDetector>>,

    /// Pre-built vision LLM used by the default detector.
    pub ocr_provider: Option<Arc<dyn LLMProvider>>,

    /// Vision LLM provider name (e.g. "openai").
    pub ocr_provider_name: Option<String>,

    /// Vision LLM model id. Default: provider default.
    pub ocr_model: Option<String>,

    /// Han characters needed to reject an image. Default: 2.
    pub chinese_char_threshold: usize,

    /// Keep an image when text detection itself fails. Default: true.
    pub ocr_fail_open: bool,

    // ── Product mapping ──────────────────────────────────────────────────
    /// Explicit leaf category id.
    pub category_id: Option<u64>,

    /// Category names from the root down to a leaf.
    pub category_path: Vec<String>,

    /// Raw size label → Temu size name, applied before the built-in rules.
    pub size_overrides: HashMap<String, String>,

    /// Template property name → value used when the source has none.
    pub property_defaults: HashMap<String, String>,

    /// Fill any remaining required property with its first allowed value. Default: false.
    pub auto_fill_required: bool,

    /// Replaces the scraped title.
    pub title_override: Option<String>,

    /// Multiplier applied to the scraped price. Default: 1.0.
    pub price_multiplier: f64,

    /// Price used when the page has none, in cents.
    pub fallback_price_cents: Option<u64>,

    /// Currency of supplier prices. Default: "CNY".
    pub currency: String,

    /// Stock declared per SKU. Default: 100.
    pub default_stock: u32,

    /// Prefix for generated out-SKU codes. Default: "TL".
    pub sku_prefix: String,

    /// Outer package dimensions and weight.
    pub package: PackageSpec,

    /// Shipment promise (days) for the old API. Default: 2.
    pub shipment_limit_days: u32,

    // ── Compliance ───────────────────────────────────────────────────────
    /// Longest accepted title. Default: 250.
    pub max_title_chars: usize,

    /// Fewest carousel images accepted. Default: 3.
    pub min_carousel_images: usize,

    /// Call the remote compliance API after local checks. Default: true.
    pub remote_compliance: bool,

    // ── Run mode ─────────────────────────────────────────────────────────
    /// Do everything read-only; skip image upload and product creation. Default: false.
    pub dry_run: bool,

    /// Optional workflow progress callback.
    pub progress_callback: Option<ProgressCallback>,
}

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
(KHTML, like Gecko) Chrome/124.0 Safari/537.36";

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            credentials: None,
            region: Region::default(),
            router_url: None,
            api_generation: ApiGeneration::default(),
            fallback: FallbackPolicy::default(),
            sticky_fallback: true,
            sign_method: SignMethod::default(),
            api_timeout_secs: 30,
            max_retries: 2,
            retry_backoff_ms: 1000,
            max_backoff_ms: 30_000,
            retry_jitter: 0.1,
            transient_error_codes: vec![7_000_001, 7_000_002, 4_000_004],
            unsupported_error_codes: vec![3_000_000, 3_000_001, 3_000_002],
            api_types: ApiTypeOverrides::default(),
            api: None,
            fetch_timeout_secs: 30,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            selectors: ScrapeSelectors::default(),
            max_source_images: 10,
            image_concurrency: 4,
            min_image_side: 800,
            max_image_side: 2000,
            upscale_floor: 500,
            pad_to_square: true,
            max_image_bytes: 3 * 1024 * 1024,
            jpeg_quality: 90,
            ocr_enabled: true,
            text_detector: None,
            ocr_provider: None,
            ocr_provider_name: None,
            ocr_model: None,
            chinese_char_threshold: 2,
            ocr_fail_open: true,
            category_id: None,
            category_path: Vec::new(),
            size_overrides: HashMap::new(),
            property_defaults: HashMap::new(),
            auto_fill_required: false,
            title_override: None,
            price_multiplier: 1.0,
            fallback_price_cents: None,
            currency: "CNY".to_string(),
            default_stock: 100,
            sku_prefix: "TL".to_string(),
            package: PackageSpec::default(),
            shipment_limit_days: 2,
            max_title_chars: 250,
            min_carousel_images: 3,
            remote_compliance: true,
            dry_run: false,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ListingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListingConfig")
            .field("credentials", &self.credentials)
            .field("region", &self.region)
            .field("router_url", &self.router_url)
            .field("api_generation", &self.api_generation)
            .field("fallback", &self.fallback)
            .field("sign_method", &self.sign_method)
            .field("max_retries", &self.max_retries)
            .field("api", &self.api.as_ref().map(|_| "<dyn TemuApi>"))
            .field("ocr_enabled", &self.ocr_enabled)
            .field("text_detector", &self.text_detector.as_ref().map(|_| "<dyn TextDetector>"))
            .field("ocr_model", &self.ocr_model)
            .field("category_id", &self.category_id)
            .field("category_path", &self.category_path)
            .field("price_multiplier", &self.price_multiplier)
            .field("currency", &self.currency)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl ListingConfig {
    /// Create a new builder for `ListingConfig`.
    pub fn builder() -> ListingConfigBuilder {
        ListingConfigBuilder {
            config: Self::default(),
        }
    }

    /// Router URL actually used for API calls.
    pub fn effective_router_url(&self) -> &str {
        self.router_url
            .as_deref()
            .unwrap_or_else(|| self.region.router_url())
    }
}

/// Builder for [`ListingConfig`].
pub struct ListingConfigBuilder {
    config: ListingConfig,
}

impl fmt::Debug for ListingConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListingConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl ListingConfigBuilder {
    pub fn credentials(mut self, credentials: TemuCredentials) -> Self {
        self.config.credentials = Some(credentials);
        self
    }

    pub fn region(mut self, region: Region) -> Self {
        self.config.region = region;
        self
    }

    pub fn router_url(mut self, url: impl Into<String>) -> Self {
        self.config.router_url = Some(url.into());
        self
    }

    pub fn api_generation(mut self, generation: ApiGeneration) -> Self {
        self.config.api_generation = generation;
        self
    }

    pub fn fallback(mut self, policy: FallbackPolicy) -> Self {
        self.config.fallback = policy;
        self
    }

    pub fn sticky_fallback(mut self, v: bool) -> Self {
        self.config.sticky_fallback = v;
        self
    }

    pub fn sign_method(mut self, method: SignMethod) -> Self {
        self.config.sign_method = method;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn max_backoff_ms(mut self, ms: u64) -> Self {
        self.config.max_backoff_ms = ms;
        self
    }

    pub fn retry_jitter(mut self, fraction: f64) -> Self {
        self.config.retry_jitter = fraction.clamp(0.0, 1.0);
        self
    }

    pub fn api(mut self, api: Arc<dyn TemuApi>) -> Self {
        self.config.api = Some(api);
        self
    }

    pub fn api_types(mut self, overrides: ApiTypeOverrides) -> Self {
        self.config.api_types = overrides;
        self
    }

    pub fn fetch_timeout_secs(mut self, secs: u64) -> Self {
        self.config.fetch_timeout_secs = secs;
        self
    }

    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.config.user_agent = ua.into();
        self
    }

    pub fn selectors(mut self, selectors: ScrapeSelectors) -> Self {
        self.config.selectors = selectors;
        self
    }

    pub fn max_source_images(mut self, n: usize) -> Self {
        self.config.max_source_images = n.max(1);
        self
    }

    pub fn image_concurrency(mut self, n: usize) -> Self {
        self.config.image_concurrency = n.max(1);
        self
    }

    pub fn min_image_side(mut self, px: u32) -> Self {
        self.config.min_image_side = px;
        self
    }

    pub fn max_image_side(mut self, px: u32) -> Self {
        self.config.max_image_side = px;
        self
    }

    pub fn upscale_floor(mut self, px: u32) -> Self {
        self.config.upscale_floor = px;
        self
    }

    pub fn pad_to_square(mut self, v: bool) -> Self {
        self.config.pad_to_square = v;
        self
    }

    pub fn max_image_bytes(mut self, bytes: usize) -> Self {
        self.config.max_image_bytes = bytes;
        self
    }

    pub fn jpeg_quality(mut self, q: u8) -> Self {
        self.config.jpeg_quality = q.clamp(1, 100);
        self
    }

    pub fn ocr_enabled(mut self, v: bool) -> Self {
        self.config.ocr_enabled = v;
        self
    }

    pub fn text_detector(mut self, detector: Arc<dyn TextDetector>) -> Self {
        self.config.text_detector = Some(detector);
        self
    }

    pub fn ocr_provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.ocr_provider = Some(provider);
        self
    }

    pub fn ocr_provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.ocr_provider_name = Some(name.into());
        self
    }

    pub fn ocr_model(mut self, model: impl Into<String>) -> Self {
        self.config.ocr_model = Some(model.into());
        self
    }

    pub fn chinese_char_threshold(mut self, n: usize) -> Self {
        self.config.chinese_char_threshold = n.max(1);
        self
    }

    pub fn ocr_fail_open(mut self, v: bool) -> Self {
        self.config.ocr_fail_open = v;
        self
    }

    pub fn category_id(mut self, id: u64) -> Self {
        self.config.category_id = Some(id);
        self
    }

    pub fn category_path<I, S>(mut self, path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.category_path = path.into_iter().map(Into::into).collect();
        self
    }

    pub fn size_override(mut self, raw: impl Into<String>, mapped: impl Into<String>) -> Self {
        self.config.size_overrides.insert(raw.into(), mapped.into());
        self
    }

    pub fn property_default(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.property_defaults.insert(name.into(), value.into());
        self
    }

    pub fn auto_fill_required(mut self, v: bool) -> Self {
        self.config.auto_fill_required = v;
        self
    }

    pub fn title_override(mut self, title: impl Into<String>) -> Self {
        self.config.title_override = Some(title.into());
        self
    }

    pub fn price_multiplier(mut self, m: f64) -> Self {
        self.config.price_multiplier = m;
        self
    }

    pub fn fallback_price_cents(mut self, cents: u64) -> Self {
        self.config.fallback_price_cents = Some(cents);
        self
    }

    pub fn currency(mut self, currency: impl Into<String>) -> Self {
        self.config.currency = currency.into();
        self
    }

    pub fn default_stock(mut self, n: u32) -> Self {
        self.config.default_stock = n;
        self
    }

    pub fn sku_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.sku_prefix = prefix.into();
        self
    }

    pub fn package(mut self, package: PackageSpec) -> Self {
        self.config.package = package;
        self
    }

    pub fn shipment_limit_days(mut self, days: u32) -> Self {
        self.config.shipment_limit_days = days;
        self
    }

    pub fn max_title_chars(mut self, n: usize) -> Self {
        self.config.max_title_chars = n;
        self
    }

    pub fn min_carousel_images(mut self, n: usize) -> Self {
        self.config.min_carousel_images = n;
        self
    }

    pub fn remote_compliance(mut self, v: bool) -> Self {
        self.config.remote_compliance = v;
        self
    }

    pub fn dry_run(mut self, v: bool) -> Self {
        self.config.dry_run = v;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Merge a per-shop profile. Profile maps extend (and override) what the
    /// builder already holds; scalar fields replace only when present.
    pub fn profile(mut self, profile: ListingProfile) -> Self {
        let c = &mut self.config;
        if let Some(id) = profile.category_id {
            c.category_id = Some(id);
        }
        if !profile.category_path.is_empty() {
            c.category_path = profile.category_path;
        }
        c.size_overrides.extend(profile.size_overrides);
        c.property_defaults.extend(profile.property_defaults);
        if let Some(v) = profile.auto_fill_required {
            c.auto_fill_required = v;
        }
        if let Some(t) = profile.title_override {
            c.title_override = Some(t);
        }
        if let Some(m) = profile.price_multiplier {
            c.price_multiplier = m;
        }
        if let Some(p) = profile.fallback_price_cents {
            c.fallback_price_cents = Some(p);
        }
        if let Some(cur) = profile.currency {
            c.currency = cur;
        }
        if let Some(prefix) = profile.sku_prefix {
            c.sku_prefix = prefix;
        }
        if let Some(pkg) = profile.package {
            c.package = pkg;
        }
        if let Some(sel) = profile.selectors {
            c.selectors = sel;
        }
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ListingConfig, ListingError> {
        let c = &self.config;
        if c.min_image_side == 0 || c.min_image_side > c.max_image_side {
            return Err(ListingError::InvalidConfig(format!(
                "min_image_side must be 1..=max_image_side ({}), got {}",
                c.max_image_side, c.min_image_side
            )));
        }
        if c.upscale_floor > c.min_image_side {
            return Err(ListingError::InvalidConfig(format!(
                "upscale_floor ({}) must not exceed min_image_side ({})",
                c.upscale_floor, c.min_image_side
            )));
        }
        if !(c.price_multiplier.is_finite() && c.price_multiplier > 0.0) {
            return Err(ListingError::InvalidConfig(format!(
                "price_multiplier must be > 0, got {}",
                c.price_multiplier
            )));
        }
        if c.retry_backoff_ms > c.max_backoff_ms {
            return Err(ListingError::InvalidConfig(
                "retry_backoff_ms must not exceed max_backoff_ms".into(),
            ));
        }
        if c.currency.trim().is_empty() {
            return Err(ListingError::InvalidConfig("currency must not be empty".into()));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// The two generations of Temu's goods API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiGeneration {
    /// `bg.goods.*` — `bg.goods.add`. (default)
    #[default]
    New,
    /// `bg.local.goods.*` — `bg.local.goods.add`.
    Old,
}

impl ApiGeneration {
    /// The generation a fallback would switch to.
    pub fn other(self) -> Self {
        match self {
            ApiGeneration::New => ApiGeneration::Old,
            ApiGeneration::Old => ApiGeneration::New,
        }
    }
}

impl fmt::Display for ApiGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiGeneration::New => f.write_str("new (bg.goods)"),
            ApiGeneration::Old => f.write_str("old (bg.local.goods)"),
        }
    }
}

/// When the adapter retries a failed call on the other generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FallbackPolicy {
    /// Never fall back.
    Never,
    /// Only when the primary reports the API as unavailable. (default)
    #[default]
    OnUnsupported,
    /// On any remote failure.
    OnAnyError,
}

/// Temu open-API gateway region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Region {
    /// Mainland seller centre. (default)
    #[default]
    Cn,
    Us,
    Eu,
    Global,
}

impl Region {
    pub fn router_url(&self) -> &'static str {
        match self {
            Region::Cn => "https://openapi.kuajingmaihuo.com/openapi/router",
            Region::Us => "https://openapi-b-us.temu.com/openapi/router",
            Region::Eu => "https://openapi-b-eu.temu.com/openapi/router",
            Region::Global => "https://openapi-b-global.temu.com/openapi/router",
        }
    }
}

// ── Plain data ───────────────────────────────────────────────────────────

/// Per-operation API name overrides; `None` keeps the generation default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiTypeOverrides {
    pub categories: Option<String>,
    pub template: Option<String>,
    pub spec_id: Option<String>,
    pub upload_image: Option<String>,
    pub compliance: Option<String>,
    pub add_goods: Option<String>,
}

/// Outer package dimensions (millimetres) and weight (grams).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PackageSpec {
    pub length_mm: u32,
    pub width_mm: u32,
    pub height_mm: u32,
    pub weight_g: u32,
}

impl Default for PackageSpec {
    fn default() -> Self {
        Self {
            length_mm: 300,
            width_mm: 200,
            height_mm: 50,
            weight_g: 300,
        }
    }
}

/// CSS selectors tried when a page has no usable structured data.
///
/// Each field is a comma-separated selector group, as accepted by `scraper`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapeSelectors {
    pub title: String,
    pub description: String,
    pub gallery: String,
    pub price: String,
    pub sizes: String,
    pub colors: String,
}

impl Default for ScrapeSelectors {
    fn default() -> Self {
        Self {
            title: "h1, .product-title, .d-title, [itemprop=name]".into(),
            description: "[itemprop=description], .product-description, #description".into(),
            gallery: ".product-gallery img, .gallery img, [data-gallery] img, .detail-gallery img"
                .into(),
            price: "[itemprop=price], .price, .product-price".into(),
            sizes: "[data-size], .size-list li, .sku-size li".into(),
            colors: "[data-color], .color-list li, .sku-color li".into(),
        }
    }
}

/// Per-shop settings loaded from a JSON file.
///
/// ```json
/// {
///   "category_path": ["Women's Clothing", "Dresses"],
///   "property_defaults": { "Material": "Polyester" },
///   "size_overrides": { "大码": "XL" },
///   "price_multiplier": 1.35
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingProfile {
    pub category_id: Option<u64>,
    pub category_path: Vec<String>,
    pub size_overrides: HashMap<String, String>,
    pub property_defaults: HashMap<String, String>,
    pub auto_fill_required: Option<bool>,
    pub title_override: Option<String>,
    pub price_multiplier: Option<f64>,
    pub fallback_price_cents: Option<u64>,
    pub currency: Option<String>,
    pub sku_prefix: Option<String>,
    pub package: Option<PackageSpec>,
    pub selectors: Option<ScrapeSelectors>,
}

impl ListingProfile {
    /// Parse a profile from JSON text.
    pub fn from_json(text: &str) -> Result<Self, ListingError> {
        serde_json::from_str(text)
            .map_err(|e| ListingError::InvalidConfig(format!("invalid listing profile: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ListingConfig::builder().build().expect("defaults build");
        assert_eq!(config.api_generation, ApiGeneration::New);
        assert_eq!(config.fallback, FallbackPolicy::OnUnsupported);
        assert_eq!(config.min_image_side, 800);
        assert!(config.ocr_enabled);
    }

    #[test]
    fn rejects_inverted_image_limits() {
        let err = ListingConfig::builder()
            .min_image_side(2500)
            .max_image_side(2000)
            .build()
            .unwrap_err();
        assert!(matches!(err, ListingError::InvalidConfig(_)));
    }

    #[test]
    fn rejects_non_positive_multiplier() {
        assert!(ListingConfig::builder().price_multiplier(0.0).build().is_err());
        assert!(ListingConfig::builder().price_multiplier(f64::NAN).build().is_err());
    }

    #[test]
    fn router_url_override_wins() {
        let config = ListingConfig::builder()
            .region(Region::Us)
            .build()
            .unwrap();
        assert!(config.effective_router_url().contains("openapi-b-us"));

        let config = ListingConfig::builder()
            .router_url("http://localhost:9999/router")
            .build()
            .unwrap();
        assert_eq!(config.effective_router_url(), "http://localhost:9999/router");
    }

    #[test]
    fn profile_merges_maps_and_scalars() {
        let profile = ListingProfile::from_json(
            r#"{
                "category_path": ["Women", "Dresses"],
                "property_defaults": {"Material": "Cotton"},
                "size_overrides": {"大码": "XL"},
                "price_multiplier": 1.5
            }"#,
        )
        .unwrap();

        let config = ListingConfig::builder()
            .property_default("Style", "Casual")
            .profile(profile)
            .build()
            .unwrap();

        assert_eq!(config.category_path, vec!["Women", "Dresses"]);
        assert_eq!(config.property_defaults.len(), 2);
        assert_eq!(config.size_overrides.get("大码").map(String::as_str), Some("XL"));
        assert_eq!(config.price_multiplier, 1.5);
    }

    #[test]
    fn bad_profile_is_config_error() {
        let err = ListingProfile::from_json("{ not json").unwrap_err();
        assert!(err.to_string().contains("listing profile"));
    }

    #[test]
    fn generation_other_flips() {
        assert_eq!(ApiGeneration::New.other(), ApiGeneration::Old);
        assert_eq!(ApiGeneration::Old.other(), ApiGeneration::New);
    }
}
