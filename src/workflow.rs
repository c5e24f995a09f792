//! The listing workflow.
//!
//! [`ProductManager`] walks a product from its source page to a created Temu
//! listing in ten steps. Every step is timed into a [`StepRecord`] and
//! reported to the progress callback; the first fatal error stops the run.
//!
//! ```text
//!  1 scrape      source page → SourceProduct
//!  2 images      download, validate, normalise
//!  3 ocr         drop images with Chinese text        (skipped: --no-ocr)
//!  4 sizes       raw sizes → Temu size names
//!  5 category    id, or walk the category path to a leaf
//!  6 template    properties + parent specs of the leaf
//!  7 specs       spec id for every color and size
//!  8 upload      images → Temu-hosted URLs            (skipped: dry run)
//!  9 compliance  draft + local and remote checks
//! 10 create      goods.add                            (skipped: dry run)
//! ```

use crate::api::adapter::build_api;
use crate::api::generation::TemuApi;
use crate::api::types::{Category, CategoryTemplate, CreatedGoods};
use crate::config::ListingConfig;
use crate::error::{ImageIssue, ListingError};
use crate::output::{ImageResult, ListingOutput, ListingStats, StepRecord, StepStatus};
use crate::pipeline::compliance::{self, ComplianceReport};
use crate::pipeline::images::{self, ProcessedImage};
use crate::pipeline::ocr::{self, TextDetector, VlmTextDetector};
use crate::pipeline::scrape::{scrape_product, SourceProduct};
use crate::pipeline::sizes::{SizeMapper, SizeMapping};
use crate::pipeline::source::{http_client, resolve_source};
use crate::pipeline::transform::{build_draft, to_payload, GoodsDraft, ResolvedSpecs, DEFAULT_COLOR};
use crate::progress::ProgressCallback;
use once_cell::sync::OnceCell;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Step names, in execution order.
pub const STEPS: [&str; 10] = [
    "scrape",
    "images",
    "ocr",
    "sizes",
    "category",
    "template",
    "specs",
    "upload",
    "compliance",
    "create",
];

/// Drives listing runs for one configuration.
///
/// The Temu API and the text detector are built on first use, so
/// [`ProductManager::inspect`] works without credentials or an LLM key.
pub struct ProductManager {
    config: ListingConfig,
    http: reqwest::Client,
    api: OnceCell<Arc<dyn TemuApi>>,
    detector: OnceCell<Arc<dyn TextDetector>>,
}

impl std::fmt::Debug for ProductManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProductManager")
            .field("config", &self.config)
            .field("api_ready", &self.api.get().is_some())
            .field("detector_ready", &self.detector.get().is_some())
            .finish()
    }
}

impl ProductManager {
    pub fn new(config: ListingConfig) -> Result<Self, ListingError> {
        let http = http_client(&config.user_agent, config.fetch_timeout_secs)?;
        Ok(Self {
            config,
            http,
            api: OnceCell::new(),
            detector: OnceCell::new(),
        })
    }

    pub fn config(&self) -> &ListingConfig {
        &self.config
    }

    fn api(&self) -> Result<&Arc<dyn TemuApi>, ListingError> {
        self.api.get_or_try_init(|| build_api(&self.config))
    }

    fn detector(&self) -> Result<&Arc<dyn TextDetector>, ListingError> {
        self.detector.get_or_try_init(|| match &self.config.text_detector {
            Some(d) => Ok(Arc::clone(d)),
            None => VlmTextDetector::from_config(&self.config)
                .map(|d| Arc::new(d) as Arc<dyn TextDetector>),
        })
    }

    /// Scrape `input` without touching Temu.
    pub async fn inspect(&self, input: &str) -> Result<SourceProduct, ListingError> {
        let page = resolve_source(input, &self.http, self.config.fetch_timeout_secs).await?;
        scrape_product(&page, &self.config.selectors)
    }

    /// Children of `parent_id` (0 for the root).
    pub async fn list_categories(&self, parent_id: u64) -> Result<Vec<Category>, ListingError> {
        self.api()?.categories(parent_id).await
    }

    /// List several products one after another.
    ///
    /// A failed input does not stop the batch; results keep input order.
    pub async fn list_many<S: AsRef<str>>(
        &self,
        inputs: &[S],
    ) -> Vec<(String, Result<ListingOutput, ListingError>)> {
        let mut results = Vec::with_capacity(inputs.len());
        for (i, input) in inputs.iter().enumerate() {
            let input = input.as_ref();
            info!("Listing {}/{}: {}", i + 1, inputs.len(), input);
            let result = self.list_product(input).await;
            if let Err(e) = &result {
                warn!("Listing '{}' failed: {}", input, e);
            }
            results.push((input.to_string(), result));
        }
        let ok = results.iter().filter(|(_, r)| r.is_ok()).count();
        info!("Batch complete: {}/{} listed", ok, results.len());
        results
    }

    /// Run the full workflow for one product.
    pub async fn list_product(&self, input: &str) -> Result<ListingOutput, ListingError> {
        let total_start = Instant::now();
        let config = &self.config;
        let mut steps = StepTracker::new(config.progress_callback.clone());
        if let Some(cb) = &config.progress_callback {
            cb.on_workflow_start(input, STEPS.len());
        }
        info!("Listing product from {}", input);

        // ── Step 1: Scrape ───────────────────────────────────────────────
        let product = steps
            .run(1, self.inspect(input), |p: &SourceProduct| {
                format!(
                    "'{}': {} images, {} sizes, {} colors",
                    p.title,
                    p.images.len(),
                    p.sizes.len(),
                    p.colors.len()
                )
            })
            .await?;

        // ── Step 2: Images ───────────────────────────────────────────────
        let (outcomes, mut kept) = steps
            .run(
                2,
                async {
                    let outcomes = images::download_images(&product.images, &self.http, config).await;
                    let kept = images::accepted(&outcomes)?;
                    Ok::<_, ListingError>((outcomes, kept))
                },
                |(o, k): &(Vec<images::ImageOutcome>, Vec<ProcessedImage>)| {
                    format!("{}/{} images usable", k.len(), o.len())
                },
            )
            .await?;
        let mut image_results: Vec<ImageResult> = outcomes
            .iter()
            .map(|o| match &o.result {
                Ok(img) => ImageResult::accepted(img),
                Err(issue) => ImageResult::rejected(o.index, o.source.clone(), issue.clone()),
            })
            .collect();

        // ── Step 3: OCR ──────────────────────────────────────────────────
        if config.ocr_enabled {
            let detector = steps.check(3, self.detector().map(Arc::clone))?;
            let (total, before) = (outcomes.len(), kept.len());
            let (filtered, issues) = steps
                .run(
                    3,
                    async {
                        let (filtered, issues) =
                            ocr::filter_chinese_text(kept, detector.as_ref(), config).await;
                        if filtered.is_empty() {
                            return Err(ListingError::NoUsableImages {
                                total,
                                rejected: total,
                                first_issue: issues.first().map(ToString::to_string).unwrap_or_default(),
                            });
                        }
                        Ok::<_, ListingError>((filtered, issues))
                    },
                    |(k, _): &(Vec<ProcessedImage>, Vec<ImageIssue>)| {
                        format!("{}/{} images free of Chinese text", k.len(), before)
                    },
                )
                .await?;
            for issue in issues {
                if let Some(result) = image_results.iter_mut().find(|r| r.index == issue.index()) {
                    *result = ImageResult::rejected(result.index, result.source.clone(), issue);
                }
            }
            kept = filtered;
        } else {
            steps.skip(3, "OCR disabled");
        }

        // ── Step 4: Sizes ────────────────────────────────────────────────
        let sizes = steps
            .run(
                4,
                async { Ok::<_, ListingError>(SizeMapper::new(&config.size_overrides).map_all(&product.sizes)) },
                |m: &SizeMapping| {
                    format!("{} sizes mapped, {} unmapped", m.sizes.len(), m.unmapped.len())
                },
            )
            .await?;

        let api = steps.check(5, self.api().map(Arc::clone))?;

        // ── Step 5: Category ─────────────────────────────────────────────
        let category = steps
            .run(5, self.resolve_category(api.as_ref()), |c: &Category| {
                format!("{} ({})", c.name, c.cat_id)
            })
            .await?;

        // ── Step 6: Template ─────────────────────────────────────────────
        let template = steps
            .run(6, api.template(category.cat_id), |t: &CategoryTemplate| {
                format!(
                    "{} properties ({} required)",
                    t.properties.len(),
                    t.required_properties().count()
                )
            })
            .await?;

        // ── Step 7: Spec ids ─────────────────────────────────────────────
        let specs = steps
            .run(
                7,
                resolve_specs(api.as_ref(), &template, &product, &sizes),
                |s: &ResolvedSpecs| format!("{} colors, {} sizes", s.colors.len(), s.sizes.len()),
            )
            .await?;

        // ── Step 8: Upload ───────────────────────────────────────────────
        let image_urls = if config.dry_run {
            steps.skip(8, "dry run: using source URLs");
            kept.iter().map(|img| img.source.clone()).collect::<Vec<_>>()
        } else {
            let urls = steps
                .run(8, upload_images(api.as_ref(), &kept), |u: &Vec<String>| {
                    format!("{} images uploaded", u.len())
                })
                .await?;
            for (img, url) in kept.iter().zip(&urls) {
                if let Some(result) = image_results.iter_mut().find(|r| r.index == img.index) {
                    result.uploaded_url = Some(url.clone());
                }
            }
            urls
        };

        // ── Step 9: Draft + compliance ───────────────────────────────────
        let (draft, compliance) = steps
            .run(
                9,
                self.check_compliance(api.as_ref(), &product, &template, &specs, &image_urls),
                |(_, r): &(GoodsDraft, ComplianceReport)| {
                    if r.passed() {
                        "passed".to_string()
                    } else {
                        format!("{} issues (dry run)", r.issues.len())
                    }
                },
            )
            .await?;

        // ── Step 10: Create ──────────────────────────────────────────────
        let created = if config.dry_run {
            steps.skip(10, "dry run");
            None
        } else {
            Some(
                steps
                    .run(10, api.add_goods(&draft), |c: &CreatedGoods| {
                        format!("goods {} with {} SKUs", c.goods_id, c.sku_ids.len())
                    })
                    .await?,
            )
        };

        // The adapter may have served `add_goods` from the other generation
        // without switching to it.
        let generation = created
            .as_ref()
            .map(|c| c.generation)
            .unwrap_or_else(|| api.generation());
        let payload = to_payload(&draft, generation);
        debug!("Final payload: {} bytes", payload.to_string().len());

        let rejected_images = image_results.iter().filter(|r| !r.accepted).count();
        let stats = ListingStats {
            source_images: image_results.len(),
            accepted_images: image_results.len() - rejected_images,
            rejected_images,
            text_rejected_images: image_results
                .iter()
                .filter(|r| r.issue.as_ref().is_some_and(ImageIssue::is_text_rejection))
                .count(),
            uploaded_images: image_results.iter().filter(|r| r.uploaded_url.is_some()).count(),
            sku_count: draft.sku_count(),
            total_duration_ms: total_start.elapsed().as_millis() as u64,
        };

        match &created {
            Some(c) => info!(
                "Listed goods {} via {} in {}ms",
                c.goods_id, generation, stats.total_duration_ms
            ),
            None => info!("Dry run complete in {}ms", stats.total_duration_ms),
        }
        if let Some(cb) = &config.progress_callback {
            cb.on_workflow_complete(created.as_ref().map(|c| c.goods_id));
        }

        Ok(ListingOutput {
            input: input.to_string(),
            product,
            sizes,
            category,
            draft,
            payload,
            generation,
            created,
            compliance,
            images: image_results,
            steps: steps.into_records(),
            stats,
            dry_run: config.dry_run,
        })
    }

    /// Explicit `category_id`, else walk `category_path` from the root.
    ///
    /// Names match case-insensitively. The walk must end on a leaf.
    async fn resolve_category(&self, api: &dyn TemuApi) -> Result<Category, ListingError> {
        if let Some(cat_id) = self.config.category_id {
            debug!("Using configured category {}", cat_id);
            return Ok(Category {
                cat_id,
                name: self
                    .config
                    .category_path
                    .last()
                    .cloned()
                    .unwrap_or_else(|| format!("#{cat_id}")),
                parent_id: 0,
                level: self.config.category_path.len() as u32,
                is_leaf: true,
            });
        }
        if self.config.category_path.is_empty() {
            return Err(ListingError::CategoryNotConfigured);
        }

        let mut parent_id = 0;
        let mut current: Option<Category> = None;
        for segment in &self.config.category_path {
            let children = api.categories(parent_id).await?;
            let wanted = segment.trim().to_lowercase();
            let found = children
                .iter()
                .find(|c| c.name.trim().to_lowercase() == wanted)
                .cloned()
                .ok_or_else(|| ListingError::CategoryNotFound {
                    segment: segment.clone(),
                    parent_id,
                    available: available_names(&children),
                })?;
            debug!("Category '{}' → {}", segment, found.cat_id);
            parent_id = found.cat_id;
            current = Some(found);
        }
        let category = current.ok_or(ListingError::CategoryNotConfigured)?;

        if !category.is_leaf && !api.categories(category.cat_id).await?.is_empty() {
            return Err(ListingError::CategoryNotLeaf {
                cat_id: category.cat_id,
                name: category.name,
            });
        }
        Ok(Category {
            is_leaf: true,
            ..category
        })
    }

    async fn check_compliance(
        &self,
        api: &dyn TemuApi,
        product: &SourceProduct,
        template: &CategoryTemplate,
        specs: &ResolvedSpecs,
        image_urls: &[String],
    ) -> Result<(GoodsDraft, ComplianceReport), ListingError> {
        let config = &self.config;
        let draft = build_draft(product, template, specs, image_urls, config)?;
        let mut report = compliance::check(&draft, config);
        if config.remote_compliance {
            report.merge_remote(api.compliance(&draft).await?);
        }
        if config.dry_run {
            for issue in &report.issues {
                warn!("Compliance: {}", issue);
            }
            Ok((draft, report))
        } else {
            Ok((draft, report.into_result()?))
        }
    }
}

/// Resolve a spec id for every color and mapped size.
async fn resolve_specs(
    api: &dyn TemuApi,
    template: &CategoryTemplate,
    product: &SourceProduct,
    sizes: &SizeMapping,
) -> Result<ResolvedSpecs, ListingError> {
    let color_parent = template.color_parent_spec();
    let size_parent = template.size_parent_spec();

    let mut colors: Vec<&str> = Vec::new();
    for color in product.colors.iter().map(|c| c.trim()).filter(|c| !c.is_empty()) {
        if !colors.iter().any(|c| c.eq_ignore_ascii_case(color)) {
            colors.push(color);
        }
    }
    if colors.is_empty() {
        colors.push(DEFAULT_COLOR);
    }

    let mut resolved = ResolvedSpecs::default();
    for color in colors {
        resolved
            .colors
            .push(api.spec_id(template.cat_id, color_parent, color).await?);
    }
    for size in sizes.names() {
        resolved
            .sizes
            .push(api.spec_id(template.cat_id, size_parent, size).await?);
    }
    Ok(resolved)
}

/// Upload in carousel order; the first failure aborts.
async fn upload_images(
    api: &dyn TemuApi,
    images: &[ProcessedImage],
) -> Result<Vec<String>, ListingError> {
    let mut urls = Vec::with_capacity(images.len());
    for img in images {
        let uploaded = api.upload_image(&img.jpeg, img.mime()).await?;
        debug!("Image {} uploaded: {}", img.index, uploaded.url);
        urls.push(uploaded.url);
    }
    Ok(urls)
}

fn available_names(children: &[Category]) -> String {
    const SHOWN: usize = 20;
    let mut names: Vec<&str> = children.iter().take(SHOWN).map(|c| c.name.as_str()).collect();
    if children.len() > SHOWN {
        names.push("…");
    }
    if names.is_empty() {
        "(none)".to_string()
    } else {
        names.join(", ")
    }
}

/// Write the final payload as pretty JSON.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn save_payload(output: &ListingOutput, path: impl AsRef<Path>) -> Result<(), ListingError> {
    let path = path.as_ref();
    let write_err = |source| ListingError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let json = serde_json::to_string_pretty(&output.payload)
        .map_err(|e| ListingError::Internal(format!("payload serialisation: {e}")))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }
    let tmp_path = path.with_extension("json.tmp");
    tokio::fs::write(&tmp_path, json).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
    info!("Payload written to {}", path.display());
    Ok(())
}

// ── Step bookkeeping ─────────────────────────────────────────────────────

struct StepTracker {
    callback: Option<ProgressCallback>,
    records: Vec<StepRecord>,
}

impl StepTracker {
    fn new(callback: Option<ProgressCallback>) -> Self {
        Self {
            callback,
            records: Vec::with_capacity(STEPS.len()),
        }
    }

    /// Run one step, recording its duration and outcome.
    async fn run<T, Fut, D>(&mut self, step: usize, fut: Fut, describe: D) -> Result<T, ListingError>
    where
        Fut: Future<Output = Result<T, ListingError>>,
        D: FnOnce(&T) -> String,
    {
        let name = STEPS[step - 1];
        info!("Step {}/{}: {}", step, STEPS.len(), name);
        if let Some(cb) = &self.callback {
            cb.on_step_start(step, name);
        }

        let started = Instant::now();
        match fut.await {
            Ok(value) => {
                let detail = describe(&value);
                debug!("Step {} ({}) done: {}", step, name, detail);
                self.push(step, started, StepStatus::Done, detail.clone());
                if let Some(cb) = &self.callback {
                    cb.on_step_complete(step, name, &detail);
                }
                Ok(value)
            }
            Err(e) => {
                self.push(step, started, StepStatus::Failed, e.to_string());
                if let Some(cb) = &self.callback {
                    cb.on_step_error(step, name, &e.to_string());
                }
                Err(e)
            }
        }
    }

    /// Report a failure that happens outside [`StepTracker::run`].
    fn check<T>(&mut self, step: usize, result: Result<T, ListingError>) -> Result<T, ListingError> {
        result.inspect_err(|e| {
            self.push(step, Instant::now(), StepStatus::Failed, e.to_string());
            if let Some(cb) = &self.callback {
                cb.on_step_error(step, STEPS[step - 1], &e.to_string());
            }
        })
    }

    fn skip(&mut self, step: usize, reason: &str) {
        let name = STEPS[step - 1];
        info!("Step {}/{}: {} skipped ({})", step, STEPS.len(), name, reason);
        self.push(step, Instant::now(), StepStatus::Skipped, reason.to_string());
        if let Some(cb) = &self.callback {
            cb.on_step_skipped(step, name);
        }
    }

    fn push(&mut self, step: usize, started: Instant, status: StepStatus, detail: String) {
        self.records.push(StepRecord {
            step,
            name: STEPS[step - 1].to_string(),
            duration_ms: started.elapsed().as_millis() as u64,
            status,
            detail,
        });
    }

    fn into_records(self) -> Vec<StepRecord> {
        self.records
    }
}
