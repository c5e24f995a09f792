//! Result types returned by the listing workflow.

use crate::api::types::{Category, CreatedGoods};
use crate::config::ApiGeneration;
use crate::error::ImageIssue;
use crate::pipeline::compliance::ComplianceReport;
use crate::pipeline::images::ProcessedImage;
use crate::pipeline::scrape::SourceProduct;
use crate::pipeline::sizes::SizeMapping;
use crate::pipeline::transform::GoodsDraft;
use serde::{Deserialize, Serialize};

/// Everything a listing run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingOutput {
    /// The page or file that was listed.
    pub input: String,
    pub product: SourceProduct,
    pub sizes: SizeMapping,
    /// Leaf category the product was listed under.
    pub category: Category,
    pub draft: GoodsDraft,
    /// The exact request body for the generation that handled the run.
    pub payload: serde_json::Value,
    /// Generation active at the end of the run (after any fallback).
    pub generation: ApiGeneration,
    /// `None` for dry runs.
    pub created: Option<CreatedGoods>,
    pub compliance: ComplianceReport,
    /// One entry per source image, in source order.
    pub images: Vec<ImageResult>,
    pub steps: Vec<StepRecord>,
    pub stats: ListingStats,
    pub dry_run: bool,
}

impl ListingOutput {
    pub fn goods_id(&self) -> Option<u64> {
        self.created.as_ref().map(|c| c.goods_id)
    }
}

/// Aggregate counters for a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListingStats {
    pub source_images: usize,
    pub accepted_images: usize,
    pub rejected_images: usize,
    /// Subset of `rejected_images` dropped for Chinese text.
    pub text_rejected_images: usize,
    pub uploaded_images: usize,
    pub sku_count: usize,
    pub total_duration_ms: u64,
}

/// Outcome of one workflow step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Done,
    Skipped,
    Failed,
}

/// Timing and outcome of one workflow step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    /// 1-based step number.
    pub step: usize,
    pub name: String,
    pub duration_ms: u64,
    pub status: StepStatus,
    pub detail: String,
}

/// What happened to one source image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageResult {
    /// 0-based position on the source page.
    pub index: usize,
    pub source: String,
    pub accepted: bool,
    /// Final dimensions; zero for rejected images.
    pub width: u32,
    pub height: u32,
    /// Size of the re-encoded JPEG.
    pub bytes: usize,
    pub padded: bool,
    /// Temu-hosted URL once uploaded.
    pub uploaded_url: Option<String>,
    pub issue: Option<ImageIssue>,
}

impl ImageResult {
    pub fn accepted(image: &ProcessedImage) -> Self {
        Self {
            index: image.index,
            source: image.source.clone(),
            accepted: true,
            width: image.width,
            height: image.height,
            bytes: image.jpeg.len(),
            padded: image.padded,
            uploaded_url: None,
            issue: None,
        }
    }

    pub fn rejected(index: usize, source: impl Into<String>, issue: ImageIssue) -> Self {
        Self {
            index,
            source: source.into(),
            accepted: false,
            width: 0,
            height: 0,
            bytes: 0,
            padded: false,
            uploaded_url: None,
            issue: Some(issue),
        }
    }
}
