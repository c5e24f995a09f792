//! CLI binary for temu-lister.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ListingConfig` and prints results.

use anyhow::{bail, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use temu_lister::{
    save_payload, ApiGeneration, FallbackPolicy, ListingConfig, ListingOutput, ListingProfile,
    ProductManager, ProgressCallback, Region, SignMethod, TemuCredentials, WorkflowProgressCallback,
};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// One bar per product; one log line per finished step.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:30.green/238}] {pos:>2}/{len} steps  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        let bar = ProgressBar::new(0);
        bar.set_style(style);
        bar.set_prefix("Listing");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl WorkflowProgressCallback for CliProgressCallback {
    fn on_workflow_start(&self, input: &str, total_steps: usize) {
        self.bar.reset();
        self.bar.set_length(total_steps as u64);
        self.bar
            .println(format!("{} {}", cyan("◆"), bold(&format!("Listing {input}"))));
    }

    fn on_step_start(&self, _step: usize, name: &str) {
        self.bar.set_message(name.to_string());
    }

    fn on_step_complete(&self, step: usize, name: &str, detail: &str) {
        self.bar.println(format!(
            "  {} {:>2} {:<11} {}",
            green("✓"),
            step,
            name,
            dim(detail)
        ));
        self.bar.inc(1);
    }

    fn on_step_skipped(&self, step: usize, name: &str) {
        self.bar
            .println(format!("  {} {:>2} {:<11} {}", dim("–"), step, name, dim("skipped")));
        self.bar.inc(1);
    }

    fn on_step_error(&self, step: usize, name: &str, error: &str) {
        let first_line = error.lines().next().unwrap_or_default();
        let msg = if first_line.chars().count() > 80 {
            format!("{}\u{2026}", first_line.chars().take(79).collect::<String>())
        } else {
            first_line.to_string()
        };
        self.bar
            .println(format!("  {} {:>2} {:<11} {}", red("✗"), step, name, red(&msg)));
        self.bar.finish_and_clear();
    }

    fn on_workflow_complete(&self, goods_id: Option<u64>) {
        self.bar.finish_and_clear();
        match goods_id {
            Some(id) => eprintln!("{} listed as goods {}", green("✔"), bold(&id.to_string())),
            None => eprintln!("{} dry run complete", green("✔")),
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Dry run: scrape, clean images, resolve category and specs, print the payload
  temu-list --dry-run --category-path "Women's Clothing > Tops > T-Shirts" https://shop.example/p/123

  # Real listing with a per-shop profile, saving the submitted payload
  temu-list --profile shop.json --save-payload payload.json https://shop.example/p/123

  # Several products in one run
  temu-list --profile shop.json page1.html page2.html page3.html

  # Force the old API (bg.local.goods.*) with no fallback
  temu-list --api old --fallback never --category-id 30012 page.html

  # Scrape only (no credentials needed)
  temu-list --inspect-only --json https://shop.example/p/123

  # Browse the category tree (0 = root)
  temu-list --list-categories 0

ENVIRONMENT VARIABLES:
  TEMU_APP_KEY            Open-API app key
  TEMU_APP_SECRET         Open-API app secret
  TEMU_ACCESS_TOKEN       Shop access token
  TEMU_OCR_PROVIDER       Vision LLM provider for text detection (openai, anthropic, gemini, ollama)
  TEMU_OCR_MODEL          Vision LLM model (default gpt-4.1-nano)
  OPENAI_API_KEY          OpenAI API key (used for OCR when no provider is named)
  RUST_LOG                Overrides --verbose / --quiet log filtering
"#;

/// List products on Temu from a source product page.
#[derive(Parser, Debug)]
#[command(
    name = "temu-list",
    version,
    about = "List products on Temu from a source product page",
    long_about = "Scrape a product page (URL or saved HTML), clean its images, drop images \
with Chinese text, map sizes, and create the product through Temu's signed open API. \
Supports both the bg.goods.* and the bg.local.goods.* API generations.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Product page URLs or saved HTML files.
    #[arg(required_unless_present = "list_categories")]
    inputs: Vec<String>,

    /// Open-API app key.
    #[arg(long, env = "TEMU_APP_KEY", hide_env_values = true)]
    app_key: Option<String>,

    /// Open-API app secret.
    #[arg(long, env = "TEMU_APP_SECRET", hide_env_values = true)]
    app_secret: Option<String>,

    /// Shop access token.
    #[arg(long, env = "TEMU_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,

    /// API gateway region.
    #[arg(long, env = "TEMU_REGION", value_enum, default_value = "cn")]
    region: RegionArg,

    /// Override the router URL (testing gateways).
    #[arg(long, env = "TEMU_ROUTER_URL")]
    router_url: Option<String>,

    /// Preferred API generation.
    #[arg(long = "api", env = "TEMU_API", value_enum, default_value = "new")]
    api: ApiArg,

    /// When to retry a call on the other API generation.
    #[arg(long, env = "TEMU_FALLBACK", value_enum, default_value = "unsupported")]
    fallback: FallbackArg,

    /// Request signature digest.
    #[arg(long, env = "TEMU_SIGN_METHOD", value_enum, default_value = "md5")]
    sign_method: SignArg,

    /// Leaf category id; skips the category path walk.
    #[arg(long, env = "TEMU_CATEGORY_ID")]
    category_id: Option<u64>,

    /// Category names from the root, separated by '>' or '/'.
    #[arg(long, env = "TEMU_CATEGORY_PATH")]
    category_path: Option<String>,

    /// JSON listing profile (property defaults, size overrides, category…).
    #[arg(long, env = "TEMU_PROFILE")]
    profile: Option<PathBuf>,

    /// Multiply the source price by this factor.
    #[arg(long, env = "TEMU_PRICE_MULTIPLIER")]
    price_multiplier: Option<f64>,

    /// Skip Chinese-text detection on images.
    #[arg(long, env = "TEMU_NO_OCR")]
    no_ocr: bool,

    /// Vision LLM provider for text detection.
    #[arg(long, env = "TEMU_OCR_PROVIDER")]
    ocr_provider: Option<String>,

    /// Vision LLM model for text detection.
    #[arg(long, env = "TEMU_OCR_MODEL")]
    ocr_model: Option<String>,

    /// Skip the remote compliance API (local checks still run).
    #[arg(long, env = "TEMU_NO_REMOTE_COMPLIANCE")]
    no_remote_compliance: bool,

    /// Run every step except image upload and product creation.
    #[arg(long, env = "TEMU_DRY_RUN")]
    dry_run: bool,

    /// Write the final goods.add payload to this file.
    #[arg(long, env = "TEMU_SAVE_PAYLOAD")]
    save_payload: Option<PathBuf>,

    /// Retries per API call on transient errors (attempts = retries + 1).
    #[arg(long, env = "TEMU_MAX_RETRIES", default_value_t = 2)]
    max_retries: u32,

    /// Per-call API timeout in seconds.
    #[arg(long, env = "TEMU_API_TIMEOUT", default_value_t = 30)]
    api_timeout: u64,

    /// Page and image download timeout in seconds.
    #[arg(long, env = "TEMU_FETCH_TIMEOUT", default_value_t = 30)]
    fetch_timeout: u64,

    /// Print the scraped product only; no Temu calls.
    #[arg(long)]
    inspect_only: bool,

    /// Print the children of a category id (0 = root) and exit.
    #[arg(long, value_name = "PARENT")]
    list_categories: Option<u64>,

    /// Output structured JSON instead of a summary.
    #[arg(long, env = "TEMU_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "TEMU_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "TEMU_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "TEMU_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ApiArg {
    New,
    Old,
}

impl From<ApiArg> for ApiGeneration {
    fn from(v: ApiArg) -> Self {
        match v {
            ApiArg::New => ApiGeneration::New,
            ApiArg::Old => ApiGeneration::Old,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FallbackArg {
    Never,
    Unsupported,
    Any,
}

impl From<FallbackArg> for FallbackPolicy {
    fn from(v: FallbackArg) -> Self {
        match v {
            FallbackArg::Never => FallbackPolicy::Never,
            FallbackArg::Unsupported => FallbackPolicy::OnUnsupported,
            FallbackArg::Any => FallbackPolicy::OnAnyError,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum RegionArg {
    Cn,
    Us,
    Eu,
    Global,
}

impl From<RegionArg> for Region {
    fn from(v: RegionArg) -> Self {
        match v {
            RegionArg::Cn => Region::Cn,
            RegionArg::Us => Region::Us,
            RegionArg::Eu => Region::Eu,
            RegionArg::Global => Region::Global,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum SignArg {
    Md5,
    Hmac,
}

impl From<SignArg> for SignMethod {
    fn from(v: SignArg) -> Self {
        match v {
            SignArg::Md5 => SignMethod::Md5,
            SignArg::Hmac => SignMethod::HmacSha256,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level step logs.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.inspect_only;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn WorkflowProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb).await?;
    let manager = ProductManager::new(config).context("Failed to initialise the workflow")?;

    // ── Category browsing ────────────────────────────────────────────────
    if let Some(parent) = cli.list_categories {
        let categories = manager
            .list_categories(parent)
            .await
            .with_context(|| format!("Failed to list categories under {parent}"))?;
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&categories).context("Failed to serialise categories")?
            );
        } else {
            for c in &categories {
                println!(
                    "{:>10}  {}{}",
                    c.cat_id,
                    c.name,
                    if c.is_leaf { dim("  (leaf)") } else { String::new() }
                );
            }
        }
        return Ok(());
    }

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        for input in &cli.inputs {
            let product = manager
                .inspect(input)
                .await
                .with_context(|| format!("Failed to scrape '{input}'"))?;
            if cli.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&product).context("Failed to serialise product")?
                );
            } else {
                println!("Source:       {}", product.url);
                println!("Title:        {}", product.title);
                if let Some(cents) = product.price_cents {
                    println!(
                        "Price:        {}.{:02} {}",
                        cents / 100,
                        cents % 100,
                        product.currency.as_deref().unwrap_or("")
                    );
                }
                println!("Images:       {}", product.images.len());
                println!("Colors:       {}", product.colors.join(", "));
                println!("Sizes:        {}", product.sizes.join(", "));
                for (k, v) in &product.attributes {
                    println!("  {k}: {v}");
                }
            }
        }
        return Ok(());
    }

    // ── Listing ──────────────────────────────────────────────────────────
    if cli.inputs.len() == 1 {
        let output = manager
            .list_product(&cli.inputs[0])
            .await
            .context("Listing failed")?;
        finish(&cli, &output, cli.save_payload.clone()).await?;
        return Ok(());
    }

    let results = manager.list_many(cli.inputs.as_slice()).await;
    let mut failed = 0;
    for (i, (input, result)) in results.iter().enumerate() {
        match result {
            Ok(output) => {
                let path = cli.save_payload.as_ref().map(|p| numbered(p, i + 1));
                finish(&cli, output, path).await?;
            }
            Err(e) => {
                failed += 1;
                eprintln!("{} {}: {}", red("✘"), input, e);
            }
        }
    }
    if failed > 0 {
        bail!("{failed}/{} listings failed", results.len());
    }
    Ok(())
}

/// Print one result and save its payload.
async fn finish(cli: &Cli, output: &ListingOutput, payload_path: Option<PathBuf>) -> Result<()> {
    if let Some(path) = payload_path {
        save_payload(output, &path)
            .await
            .with_context(|| format!("Failed to save payload to {}", path.display()))?;
    }

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(output).context("Failed to serialise output")?
        );
        return Ok(());
    }

    if output.dry_run {
        println!(
            "{}",
            serde_json::to_string_pretty(&output.payload).context("Failed to serialise payload")?
        );
    }
    if !cli.quiet {
        let s = &output.stats;
        eprintln!(
            "{}  {}  →  {}",
            match output.goods_id() {
                Some(_) => green("✔"),
                None => cyan("◇"),
            },
            bold(&output.draft.title),
            match output.goods_id() {
                Some(id) => format!("goods {id} via {}", output.generation),
                None => "dry run".to_string(),
            }
        );
        eprintln!(
            "   {}",
            dim(&format!(
                "category {}  ·  {} SKUs  ·  {}/{} images ({} with Chinese text)  ·  {}ms",
                output.category.cat_id,
                s.sku_count,
                s.accepted_images,
                s.source_images,
                s.text_rejected_images,
                s.total_duration_ms
            ))
        );
        for issue in &output.compliance.issues {
            eprintln!("   {} {}", cyan("⚠"), issue);
        }
        if !output.sizes.unmapped.is_empty() {
            eprintln!(
                "   {} unmapped sizes: {}",
                cyan("⚠"),
                output.sizes.unmapped.join(", ")
            );
        }
    }
    Ok(())
}

/// `payload.json` → `payload-2.json` for the second product of a batch.
fn numbered(path: &std::path::Path, n: usize) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "payload".into());
    let name = match path.extension() {
        Some(ext) => format!("{stem}-{n}.{}", ext.to_string_lossy()),
        None => format!("{stem}-{n}"),
    };
    path.with_file_name(name)
}

/// Map CLI args to `ListingConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ListingConfig> {
    let mut builder = ListingConfig::builder()
        .region(cli.region.into())
        .api_generation(cli.api.into())
        .fallback(cli.fallback.into())
        .sign_method(cli.sign_method.into())
        .max_retries(cli.max_retries)
        .api_timeout_secs(cli.api_timeout)
        .fetch_timeout_secs(cli.fetch_timeout)
        .ocr_enabled(!cli.no_ocr)
        .remote_compliance(!cli.no_remote_compliance)
        .dry_run(cli.dry_run);

    if let Some(ref path) = cli.profile {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read profile from {:?}", path))?;
        let profile = ListingProfile::from_json(&text)
            .with_context(|| format!("Failed to parse profile {:?}", path))?;
        builder = builder.profile(profile);
    }

    // Flags override the profile.
    if let (Some(key), Some(secret), Some(token)) = (&cli.app_key, &cli.app_secret, &cli.access_token)
    {
        builder = builder.credentials(TemuCredentials::new(key, secret, token));
    }
    if let Some(ref url) = cli.router_url {
        builder = builder.router_url(url);
    }
    if let Some(id) = cli.category_id {
        builder = builder.category_id(id);
    }
    if let Some(ref path) = cli.category_path {
        builder = builder.category_path(split_category_path(path));
    }
    if let Some(m) = cli.price_multiplier {
        builder = builder.price_multiplier(m);
    }
    if let Some(ref p) = cli.ocr_provider {
        builder = builder.ocr_provider_name(p);
    }
    if let Some(ref m) = cli.ocr_model {
        builder = builder.ocr_model(m);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn split_category_path(path: &str) -> Vec<String> {
    path.split(['>', '/'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
