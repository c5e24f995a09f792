//! Offline integration tests for the listing workflow.
//!
//! Each test writes a product page and its images into a temp dir, then runs
//! [`ProductManager`] against an in-memory Temu API and a canned text
//! detector. No network access and no credentials are needed.

use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use temu_lister::api::types::{
    Category, CategoryTemplate, CreatedGoods, PropertyValue, RemoteCompliance, SpecRef,
    TemplateProperty, UploadedImage,
};
use temu_lister::pipeline::images::ProcessedImage;
use temu_lister::pipeline::transform::GoodsDraft;
use temu_lister::{
    save_payload, ApiAdapter, ApiGeneration, FallbackPolicy, ImageIssue, ListingConfig, ListingError, ProductManager,
    StepStatus, TemuApi, TextDetector, WorkflowProgressCallback,
};

// ── Fixtures ─────────────────────────────────────────────────────────────────

const PAGE: &str = r#"<!doctype html>
<html>
<head>
  <title>Shop</title>
  <script type="application/ld+json">
  {
    "@context": "https://schema.org",
    "@type": "ProductGroup",
    "name": "Linen Summer Shirt",
    "description": "Breathable linen shirt.",
    "sku": "LS-001",
    "material": "Linen",
    "image": ["img/front.png", "img/back.png", "img/side.png", "img/promo.png", "img/thumb.png"],
    "hasVariant": [
      {"@type": "Product", "color": "Red",  "size": "S", "offers": {"price": "19.90", "priceCurrency": "USD"}},
      {"@type": "Product", "color": "Red",  "size": "M", "offers": {"price": "19.90", "priceCurrency": "USD"}},
      {"@type": "Product", "color": "Blue", "size": "L", "offers": {"price": "21.50", "priceCurrency": "USD"}}
    ]
  }
  </script>
</head>
<body><h1>Linen Summer Shirt</h1></body>
</html>"#;

/// Writes the page and five images: three good, one with a promo sticker,
/// one far too small.
fn write_fixture(dir: &Path) -> PathBuf {
    let img_dir = dir.join("img");
    std::fs::create_dir_all(&img_dir).unwrap();
    for (name, side) in [
        ("front.png", 1000),
        ("back.png", 1000),
        ("side.png", 1000),
        ("promo.png", 1000),
        ("thumb.png", 100),
    ] {
        image::RgbImage::from_pixel(side, side, image::Rgb([180, 40, 40]))
            .save(img_dir.join(name))
            .unwrap();
    }
    let page = dir.join("product.html");
    std::fs::write(&page, PAGE).unwrap();
    page
}

fn material_template(cat_id: u64) -> CategoryTemplate {
    CategoryTemplate {
        cat_id,
        properties: vec![TemplateProperty {
            template_pid: 7,
            pid: 12,
            ref_pid: 120,
            name: "Material".into(),
            required: true,
            values: vec![
                PropertyValue {
                    vid: 1,
                    value: "Cotton".into(),
                },
                PropertyValue {
                    vid: 2,
                    value: "Linen".into(),
                },
            ],
            value_unit: vec![],
        }],
        parent_specs: vec![],
    }
}

// ── Fakes ────────────────────────────────────────────────────────────────────

/// Category tree `Men (1) → Shirts (11, leaf)`; counts every write call.
struct FakeApi {
    generation: ApiGeneration,
    /// Error code `add_goods` fails with, if any.
    add_error: Option<i64>,
    template: CategoryTemplate,
    specs: Mutex<Vec<String>>,
    uploads: AtomicUsize,
    compliance_calls: AtomicUsize,
    adds: AtomicUsize,
}

impl FakeApi {
    fn new(template: CategoryTemplate) -> Arc<Self> {
        Self::serving(ApiGeneration::New, None, template)
    }

    fn serving(
        generation: ApiGeneration,
        add_error: Option<i64>,
        template: CategoryTemplate,
    ) -> Arc<Self> {
        Arc::new(Self {
            generation,
            add_error,
            template,
            specs: Mutex::new(Vec::new()),
            uploads: AtomicUsize::new(0),
            compliance_calls: AtomicUsize::new(0),
            adds: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl TemuApi for FakeApi {
    fn generation(&self) -> ApiGeneration {
        self.generation
    }

    async fn categories(&self, parent_id: u64) -> Result<Vec<Category>, ListingError> {
        let cat = |cat_id, name: &str, is_leaf| Category {
            cat_id,
            name: name.into(),
            parent_id,
            level: 1,
            is_leaf,
        };
        Ok(match parent_id {
            0 => vec![cat(1, "Men", false)],
            1 => vec![cat(11, "Shirts", true)],
            _ => vec![],
        })
    }

    async fn template(&self, cat_id: u64) -> Result<CategoryTemplate, ListingError> {
        Ok(CategoryTemplate {
            cat_id,
            ..self.template.clone()
        })
    }

    async fn spec_id(
        &self,
        _cat_id: u64,
        parent_spec_id: u64,
        name: &str,
    ) -> Result<SpecRef, ListingError> {
        let mut specs = self.specs.lock().unwrap();
        specs.push(name.to_string());
        Ok(SpecRef {
            parent_spec_id,
            parent_spec_name: if parent_spec_id == 1001 { "Color" } else { "Size" }.into(),
            spec_id: parent_spec_id * 100 + specs.len() as u64,
            spec_name: name.to_string(),
        })
    }

    async fn upload_image(&self, bytes: &[u8], mime: &str) -> Result<UploadedImage, ListingError> {
        assert_eq!(mime, "image/jpeg");
        assert!(bytes.starts_with(&[0xFF, 0xD8]), "uploads are JPEG");
        let n = self.uploads.fetch_add(1, Ordering::SeqCst);
        Ok(UploadedImage {
            url: format!("https://img.test/upload/{n}.jpg"),
            width: 1000,
            height: 1000,
        })
    }

    async fn compliance(&self, _draft: &GoodsDraft) -> Result<RemoteCompliance, ListingError> {
        self.compliance_calls.fetch_add(1, Ordering::SeqCst);
        Ok(RemoteCompliance {
            passed: true,
            issues: vec![],
        })
    }

    async fn add_goods(&self, draft: &GoodsDraft) -> Result<CreatedGoods, ListingError> {
        self.adds.fetch_add(1, Ordering::SeqCst);
        if let Some(code) = self.add_error {
            return Err(ListingError::Api {
                api_type: "bg.goods.add".into(),
                code,
                message: "type not exists".into(),
            });
        }
        Ok(CreatedGoods {
            goods_id: 555,
            sku_ids: (1..=draft.sku_count() as u64).collect(),
            generation: self.generation,
        })
    }
}

/// Reports Chinese text on any image whose file name contains "promo".
struct FakeDetector;

#[async_trait]
impl TextDetector for FakeDetector {
    async fn detect_text(&self, image: &ProcessedImage) -> Result<String, ListingError> {
        Ok(if image.source.contains("promo") {
            "限时包邮 SALE".to_string()
        } else {
            String::new()
        })
    }
}

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
}

impl WorkflowProgressCallback for Recorder {
    fn on_step_complete(&self, step: usize, _name: &str, _detail: &str) {
        self.events.lock().unwrap().push(format!("done {step}"));
    }

    fn on_step_skipped(&self, step: usize, _name: &str) {
        self.events.lock().unwrap().push(format!("skip {step}"));
    }

    fn on_step_error(&self, step: usize, _name: &str, _error: &str) {
        self.events.lock().unwrap().push(format!("error {step}"));
    }

    fn on_workflow_complete(&self, goods_id: Option<u64>) {
        self.events.lock().unwrap().push(format!("complete {goods_id:?}"));
    }
}

fn base_config(api: Arc<FakeApi>) -> temu_lister::ListingConfigBuilder {
    // RUST_LOG=temu_lister=debug cargo test --test workflow -- --nocapture
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
    ListingConfig::builder()
        .api(api)
        .text_detector(Arc::new(FakeDetector))
        .category_path(["Men", "Shirts"])
        .price_multiplier(2.0)
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn full_listing_creates_goods() {
    let dir = tempfile::tempdir().unwrap();
    let page = write_fixture(dir.path());
    let api = FakeApi::new(material_template(0));
    let recorder = Arc::new(Recorder::default());
    let config = base_config(api.clone())
        .progress_callback(recorder.clone())
        .build()
        .unwrap();

    let output = ProductManager::new(config)
        .unwrap()
        .list_product(page.to_str().unwrap())
        .await
        .expect("listing succeeds");

    assert_eq!(output.goods_id(), Some(555));
    assert_eq!(output.category.cat_id, 11);
    assert_eq!(output.generation, ApiGeneration::New);
    assert!(output.compliance.passed());

    // Images: 3 kept, promo dropped by OCR, thumbnail too small.
    let s = &output.stats;
    assert_eq!(
        (s.source_images, s.accepted_images, s.rejected_images, s.text_rejected_images),
        (5, 3, 2, 1)
    );
    assert_eq!(s.uploaded_images, 3);
    assert!(matches!(output.images[3].issue, Some(ImageIssue::ChineseText { index: 3, .. })));
    assert!(matches!(output.images[4].issue, Some(ImageIssue::TooSmall { index: 4, .. })));
    assert_eq!(
        output.images[0].uploaded_url.as_deref(),
        Some("https://img.test/upload/0.jpg")
    );

    // Two colors × three sizes, price 19.90 × 2.
    assert_eq!(s.sku_count, 6);
    assert_eq!(output.draft.currency, "USD");
    assert!(output.draft.skus().all(|sku| sku.price_cents == 3980));
    let sizes: Vec<&str> = output.sizes.names();
    assert_eq!(sizes, vec!["S", "M", "L"]);
    assert_eq!(
        *api.specs.lock().unwrap(),
        vec!["Red", "Blue", "S", "M", "L"]
    );

    let material = &output.draft.properties[0];
    assert_eq!((material.name.as_str(), material.vid), ("Material", Some(2)));

    // Payload is the bg.goods.add shape with Temu-hosted images.
    let payload = &output.payload;
    assert_eq!(payload["catId"], 11);
    assert_eq!(payload["productName"], "Linen Summer Shirt");
    let carousel: Vec<&str> = payload["carouselImageUrls"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap())
        .collect();
    assert_eq!(
        carousel,
        vec![
            "https://img.test/upload/0.jpg",
            "https://img.test/upload/1.jpg",
            "https://img.test/upload/2.jpg"
        ]
    );
    assert_eq!(payload["productSkcReqs"].as_array().unwrap().len(), 2);

    assert_eq!(output.steps.len(), 10);
    assert!(output.steps.iter().all(|r| r.status == StepStatus::Done));
    assert_eq!(api.compliance_calls.load(Ordering::SeqCst), 1);
    assert_eq!(api.adds.load(Ordering::SeqCst), 1);

    let events = recorder.events.lock().unwrap();
    assert_eq!(events.len(), 11);
    assert_eq!(events.last().unwrap(), "complete Some(555)");
}

#[tokio::test]
async fn dry_run_skips_writes_and_reports_issues() {
    let dir = tempfile::tempdir().unwrap();
    let page = write_fixture(dir.path());

    let mut template = material_template(0);
    template.properties.push(TemplateProperty {
        template_pid: 8,
        pid: 13,
        ref_pid: 130,
        name: "Pattern".into(),
        required: true,
        values: vec![PropertyValue {
            vid: 5,
            value: "Solid".into(),
        }],
        value_unit: vec![],
    });
    let api = FakeApi::new(template);
    let config = base_config(api.clone())
        .ocr_enabled(false)
        .dry_run(true)
        .build()
        .unwrap();

    let output = ProductManager::new(config)
        .unwrap()
        .list_product(page.to_str().unwrap())
        .await
        .expect("dry runs report instead of failing");

    assert!(output.dry_run);
    assert_eq!(output.goods_id(), None);
    assert_eq!(api.uploads.load(Ordering::SeqCst), 0);
    assert_eq!(api.adds.load(Ordering::SeqCst), 0);

    // Without OCR the promo image survives; source paths stand in for URLs.
    assert_eq!(output.draft.carousel_images.len(), 4);
    assert!(output.draft.carousel_images[0].ends_with("front.png"));

    assert_eq!(
        output.compliance.issues,
        vec!["required property 'Pattern' is not filled".to_string()]
    );

    let skipped: Vec<&str> = output
        .steps
        .iter()
        .filter(|r| r.status == StepStatus::Skipped)
        .map(|r| r.name.as_str())
        .collect();
    assert_eq!(skipped, vec!["ocr", "upload", "create"]);

    // save_payload creates missing directories and leaves no temp file.
    let target = dir.path().join("out").join("payload.json");
    save_payload(&output, &target).await.unwrap();
    let written: Value = serde_json::from_str(&std::fs::read_to_string(&target).unwrap()).unwrap();
    assert_eq!(written, output.payload);
    assert!(!target.with_extension("json.tmp").exists());
}

#[tokio::test]
async fn missing_required_property_stops_a_real_run() {
    let dir = tempfile::tempdir().unwrap();
    let page = write_fixture(dir.path());

    let mut template = material_template(0);
    template.properties[0].name = "Fabric Weight".into();
    let api = FakeApi::new(template);
    let recorder = Arc::new(Recorder::default());
    let config = base_config(api.clone())
        .progress_callback(recorder.clone())
        .build()
        .unwrap();

    let err = ProductManager::new(config)
        .unwrap()
        .list_product(page.to_str().unwrap())
        .await
        .unwrap_err();

    assert!(
        matches!(err, ListingError::MissingRequiredProperty { ref name } if name == "Fabric Weight")
    );
    assert_eq!(api.adds.load(Ordering::SeqCst), 0);
    assert_eq!(recorder.events.lock().unwrap().last().unwrap(), "error 9");
}

#[tokio::test]
async fn unknown_category_lists_siblings() {
    let dir = tempfile::tempdir().unwrap();
    let page = write_fixture(dir.path());
    let api = FakeApi::new(material_template(0));
    let config = base_config(api)
        .category_path(["Women", "Dresses"])
        .build()
        .unwrap();

    let err = ProductManager::new(config)
        .unwrap()
        .list_product(page.to_str().unwrap())
        .await
        .unwrap_err();

    let msg = err.to_string();
    assert!(msg.contains("Category 'Women' not found"), "got: {msg}");
    assert!(msg.contains("Available: Men"), "got: {msg}");
}

#[tokio::test]
async fn inspect_needs_no_credentials() {
    let dir = tempfile::tempdir().unwrap();
    let page = write_fixture(dir.path());

    let manager = ProductManager::new(ListingConfig::default()).unwrap();
    let product = manager.inspect(page.to_str().unwrap()).await.unwrap();

    assert_eq!(product.title, "Linen Summer Shirt");
    assert_eq!(product.price_cents, Some(1990));
    assert_eq!(product.currency.as_deref(), Some("USD"));
    assert_eq!(product.colors, vec!["Red", "Blue"]);
    assert_eq!(product.sizes, vec!["S", "M", "L"]);
    assert_eq!(product.attributes.get("Material").map(String::as_str), Some("Linen"));
    assert_eq!(product.images.len(), 5);
    assert!(product.images[0].ends_with("front.png"));
}

#[tokio::test]
async fn batch_keeps_going_after_a_failure() {
    let dir = tempfile::tempdir().unwrap();
    let page = write_fixture(dir.path());
    let missing = dir.path().join("missing.html");
    let api = FakeApi::new(material_template(0));
    let config = base_config(api.clone()).dry_run(true).build().unwrap();

    let inputs = [
        missing.to_string_lossy().into_owned(),
        page.to_string_lossy().into_owned(),
    ];
    let results = ProductManager::new(config)
        .unwrap()
        .list_many(&inputs[..])
        .await;

    assert_eq!(results.len(), 2);
    assert!(matches!(results[0].1, Err(ListingError::SourceNotFound { .. })));
    assert!(results[1].1.is_ok());
}

#[tokio::test]
async fn non_sticky_fallback_reports_the_generation_that_created_the_goods() {
    let dir = tempfile::tempdir().unwrap();
    let page = write_fixture(dir.path());
    let new = FakeApi::serving(ApiGeneration::New, Some(3_000_000), material_template(0));
    let old = FakeApi::serving(ApiGeneration::Old, None, material_template(0));
    let adapter = ApiAdapter::new(new.clone(), Some(old.clone()))
        .with_policy(FallbackPolicy::OnUnsupported)
        .with_unsupported_codes(vec![3_000_000])
        .with_sticky(false);
    let config = base_config(new.clone())
        .api(Arc::new(adapter))
        .build()
        .unwrap();

    let output = ProductManager::new(config)
        .unwrap()
        .list_product(page.to_str().unwrap())
        .await
        .expect("old API creates the goods");

    assert_eq!(new.adds.load(Ordering::SeqCst), 1);
    assert_eq!(old.adds.load(Ordering::SeqCst), 1);
    assert_eq!(output.created.as_ref().map(|c| c.generation), Some(ApiGeneration::Old));
    assert_eq!(output.generation, ApiGeneration::Old);
    // bg.local.goods.add body, not bg.goods.add.
    assert!(output.payload.get("goodsBasic").is_some());
    assert!(output.payload.get("productSkcReqs").is_none());
}
