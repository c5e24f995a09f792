//! # temu-lister
//!
//! List products on the Temu marketplace from a source product page.
//!
//! Given a product URL (or a saved HTML page) the library scrapes title,
//! description, price, images, colors and sizes; cleans the images so they
//! pass Temu's review (dimensions, aspect ratio, no Chinese text); maps sizes
//! to Temu size names; and drives Temu's signed open API from category lookup
//! to product creation.
//!
//! ## Workflow Overview
//!
//! ```text
//! Source page
//!  │
//!  ├─ 1. Scrape      JSON-LD → meta tags → CSS selectors
//!  ├─ 2. Images      download, pad to 1:1, resize, re-encode JPEG
//!  ├─ 3. OCR         vision LLM reads each image, Chinese text is dropped
//!  ├─ 4. Sizes       "XXL", "均码", "EU 38" → Temu size names
//!  ├─ 5-7. Category  leaf category, template, spec ids
//!  ├─ 8. Upload      images → Temu-hosted URLs
//!  ├─ 9. Compliance  local checks + remote compliance API
//!  └─ 10. Create     bg.goods.add  (or bg.local.goods.add)
//! ```
//!
//! Temu exposes two generations of the goods API. [`api::ApiAdapter`] picks
//! the configured one and falls back to the other when the shop has no
//! access to it (see [`FallbackPolicy`]).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use temu_lister::{ListingConfig, ProductManager};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Credentials from TEMU_APP_KEY / TEMU_APP_SECRET / TEMU_ACCESS_TOKEN,
//!     // OCR provider auto-detected from OPENAI_API_KEY and friends.
//!     let config = ListingConfig::builder()
//!         .category_path(["Women's Clothing", "Tops", "T-Shirts"])
//!         .price_multiplier(1.8)
//!         .build()?;
//!     let manager = ProductManager::new(config)?;
//!     let output = manager.list_product("https://example.com/p/123").await?;
//!     println!("goods id: {:?}", output.goods_id());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `temu-list` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! temu-lister = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod api;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod workflow;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use api::{ApiAdapter, SignMethod, TemuApi, TemuClient, TemuCredentials};
pub use config::{
    ApiGeneration, FallbackPolicy, ListingConfig, ListingConfigBuilder, ListingProfile, PackageSpec,
    Region, ScrapeSelectors,
};
pub use error::{ImageIssue, ListingError};
pub use output::{ImageResult, ListingOutput, ListingStats, StepRecord, StepStatus};
pub use pipeline::ocr::TextDetector;
pub use pipeline::scrape::SourceProduct;
pub use progress::{NoopProgressCallback, ProgressCallback, WorkflowProgressCallback};
pub use workflow::{save_payload, ProductManager};
