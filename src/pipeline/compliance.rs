//! Local pre-submit checks.
//!
//! These catch the rejections Temu reports most often before a round-trip
//! is spent on the remote compliance API.

use crate::api::types::RemoteCompliance;
use crate::config::ListingConfig;
use crate::error::ListingError;
use crate::pipeline::ocr::count_han;
use crate::pipeline::transform::GoodsDraft;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Temu caps the carousel at ten images.
pub const MAX_CAROUSEL_IMAGES: usize = 10;

/// Problems found in a draft, local and remote.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComplianceReport {
    pub issues: Vec<String>,
    /// Result of the remote check, when one ran.
    pub remote: Option<RemoteCompliance>,
}

impl ComplianceReport {
    pub fn passed(&self) -> bool {
        self.issues.is_empty()
    }

    /// Fold a remote result into the report.
    pub fn merge_remote(&mut self, remote: RemoteCompliance) {
        if !remote.passed && remote.issues.is_empty() {
            self.issues.push("remote: compliance check failed without details".into());
        }
        self.issues
            .extend(remote.issues.iter().map(|i| format!("remote: {i}")));
        self.remote = Some(remote);
    }

    /// `Err(ComplianceFailed)` if any issue was found.
    pub fn into_result(self) -> Result<Self, ListingError> {
        if self.passed() {
            Ok(self)
        } else {
            Err(ListingError::ComplianceFailed {
                issues: self.issues,
            })
        }
    }
}

/// Run every local check against `draft`.
pub fn check(draft: &GoodsDraft, config: &ListingConfig) -> ComplianceReport {
    let mut issues = Vec::new();

    let title = draft.title.trim();
    let title_chars = title.chars().count();
    if title.is_empty() {
        issues.push("title is empty".to_string());
    } else if title_chars > config.max_title_chars {
        // Only hand-built drafts get here: `build_draft` truncates.
        issues.push(format!(
            "title has {title_chars} characters (max {})",
            config.max_title_chars
        ));
    }
    let han = count_han(title);
    if han > 0 {
        issues.push(format!("title contains {han} Chinese characters"));
    }

    let images = draft.carousel_images.len();
    if images < config.min_carousel_images {
        issues.push(format!(
            "{images} carousel images (min {})",
            config.min_carousel_images
        ));
    }
    if images > MAX_CAROUSEL_IMAGES {
        issues.push(format!("{images} carousel images (max {MAX_CAROUSEL_IMAGES})"));
    }

    if draft.sku_count() == 0 {
        issues.push("product has no SKU".to_string());
    }
    let mut seen = HashSet::new();
    for sku in draft.skus() {
        if !seen.insert(sku.out_sku_sn.as_str()) {
            issues.push(format!("SKU code {} is used more than once", sku.out_sku_sn));
        }
        if sku.price_cents == 0 {
            issues.push(format!("SKU {} has no price", sku.out_sku_sn));
        }
        if sku.specs.is_empty() || sku.specs.iter().any(|s| s.spec_id == 0) {
            issues.push(format!("SKU {} is missing a spec id", sku.out_sku_sn));
        }
    }

    for name in &draft.missing_properties {
        issues.push(format!("required property '{name}' is not filled"));
    }

    ComplianceReport {
        issues,
        remote: None,
    }
}
