//! Size-string normalisation.
//!
//! Source shops write the same size a dozen ways (`XXL`, `2X`, `２ＸＬ`,
//! `XL码`, `175/96A`, `均码`). Temu wants one canonical name per size, so
//! every raw string is folded to one of:
//!
//! * a letter size `XXS`, `XS` … `6XL`,
//! * a number (`38`, `110`, `8.5`), kept as written,
//! * `One Size`,
//! * some other Latin label passed through unchanged.
//!
//! Strings that still contain Han characters after normalisation cannot be
//! listed and are reported as unmapped.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use tracing::warn;

pub const ONE_SIZE: &str = "One Size";

/// Letter sizes in ascending order.
pub const LETTER_SIZES: [&str; 11] = [
    "XXS", "XS", "S", "M", "L", "XL", "2XL", "3XL", "4XL", "5XL", "6XL",
];

const ONE_SIZE_MARKERS: [&str; 8] = [
    "均码", "均碼", "FREE", "FREE SIZE", "F", "ONE SIZE", "ONESIZE", "OS",
];

static RE_HEIGHT_BUST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{3})\s*/\s*\d{2,3}\s*[A-Z]?$").unwrap());
static RE_NOTE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[(（\[【].*?[)）\]】]").unwrap());
static RE_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*(码|碼|号|號|CM)$").unwrap());
static RE_X_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(X+)(S|L)$").unwrap());
static RE_DIGIT_X: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d)\s*X(S|L)?$").unwrap());
static RE_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+(?:\.\d+)?$").unwrap());
static RE_HAN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\p{Han}").unwrap());

/// What kind of size a mapped name is; drives sort order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SizeKind {
    /// Index into [`LETTER_SIZES`].
    Letter(usize),
    Numeric(f64),
    Other,
    OneSize,
}

/// A raw size and its canonical Temu name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappedSize {
    pub raw: String,
    pub name: String,
    pub kind: SizeKind,
}

impl MappedSize {
    fn sort_key(&self) -> (u8, f64) {
        match self.kind {
            SizeKind::Letter(rank) => (0, rank as f64),
            SizeKind::Numeric(n) => (1, n),
            SizeKind::Other => (2, 0.0),
            SizeKind::OneSize => (3, 0.0),
        }
    }

    fn cmp_order(&self, other: &Self) -> Ordering {
        let (ga, va) = self.sort_key();
        let (gb, vb) = other.sort_key();
        ga.cmp(&gb)
            .then(va.total_cmp(&vb))
            .then_with(|| self.name.cmp(&other.name))
    }
}

/// Normalise one raw size string.
pub fn normalize_size(raw: &str) -> Option<MappedSize> {
    let name_kind = |name: String, kind: SizeKind| {
        Some(MappedSize {
            raw: raw.to_string(),
            name,
            kind,
        })
    };

    let folded = fold_width(raw.trim()).to_uppercase();
    let folded = folded.trim();
    if folded.is_empty() {
        return None;
    }
    if ONE_SIZE_MARKERS.contains(&folded) {
        return name_kind(ONE_SIZE.into(), SizeKind::OneSize);
    }

    // 165/88A: the leading number is body height in cm.
    if let Some(caps) = RE_HEIGHT_BUST.captures(folded) {
        let height: u32 = caps[1].parse().ok()?;
        let letter = height_to_letter(height);
        return name_kind(letter.into(), SizeKind::Letter(letter_rank(letter)?));
    }

    let stripped = RE_NOTE.replace_all(folded, "");
    let stripped = RE_SUFFIX.replace(stripped.trim(), "");
    let s = stripped.trim();
    if s.is_empty() {
        return None;
    }
    if ONE_SIZE_MARKERS.contains(&s) {
        return name_kind(ONE_SIZE.into(), SizeKind::OneSize);
    }

    if let Some(letter) = letter_size(s) {
        return name_kind(letter.clone(), SizeKind::Letter(letter_rank(&letter)?));
    }
    if RE_X_RUN.is_match(s) || RE_DIGIT_X.is_match(s) {
        // 7XL and beyond
        return None;
    }
    if RE_NUMBER.is_match(s) {
        let value: f64 = s.parse().ok()?;
        return name_kind(s.to_string(), SizeKind::Numeric(value));
    }
    if RE_HAN.is_match(s) {
        return None;
    }
    name_kind(s.to_string(), SizeKind::Other)
}

/// Canonical letter for `S`, `XXL`, `3X`, `2XS`, …; `None` beyond 6XL.
fn letter_size(s: &str) -> Option<String> {
    let s = s.replace(' ', "");
    if matches!(s.as_str(), "S" | "M" | "L") {
        return Some(s);
    }
    if let Some(caps) = RE_X_RUN.captures(&s) {
        let xs = caps[1].len();
        return match (&caps[2], xs) {
            ("S", 1) => Some("XS".into()),
            ("S", 2) => Some("XXS".into()),
            ("L", 1) => Some("XL".into()),
            ("L", n) if n <= 6 => Some(format!("{n}XL")),
            _ => None,
        };
    }
    if let Some(caps) = RE_DIGIT_X.captures(&s) {
        let n: usize = caps[1].parse().ok()?;
        return match (caps.get(2).map(|m| m.as_str()), n) {
            (Some("S"), 1) => Some("XS".into()),
            (Some("S"), 2) => Some("XXS".into()),
            (Some("L") | None, 1) => Some("XL".into()),
            (Some("L") | None, 2..=6) => Some(format!("{n}XL")),
            _ => None,
        };
    }
    None
}

fn letter_rank(letter: &str) -> Option<usize> {
    LETTER_SIZES.iter().position(|l| *l == letter)
}

/// Chinese national standard heights (cm) to letter sizes.
fn height_to_letter(height: u32) -> &'static str {
    match height {
        0..=155 => "S",
        156..=160 => "M",
        161..=165 => "L",
        166..=170 => "XL",
        171..=175 => "2XL",
        176..=180 => "3XL",
        _ => "4XL",
    }
}

/// Full-width ASCII (`ＸＬ`, `３８`) to half-width.
fn fold_width(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '\u{FF01}'..='\u{FF5E}' => char::from_u32(c as u32 - 0xFEE0).unwrap_or(c),
            '\u{3000}' => ' ',
            _ => c,
        })
        .collect()
}

/// Result of mapping a product's sizes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SizeMapping {
    /// Unique, sorted sizes.
    pub sizes: Vec<MappedSize>,
    /// Raw strings that could not be mapped.
    pub unmapped: Vec<String>,
}

impl SizeMapping {
    pub fn names(&self) -> Vec<&str> {
        self.sizes.iter().map(|s| s.name.as_str()).collect()
    }
}

/// Applies per-shop overrides, then [`normalize_size`].
#[derive(Debug, Clone, Default)]
pub struct SizeMapper {
    overrides: HashMap<String, String>,
}

impl SizeMapper {
    /// Override keys match case-insensitively after trimming.
    pub fn new(overrides: &HashMap<String, String>) -> Self {
        Self {
            overrides: overrides
                .iter()
                .map(|(k, v)| (k.trim().to_uppercase(), v.trim().to_string()))
                .collect(),
        }
    }

    pub fn map_one(&self, raw: &str) -> Option<MappedSize> {
        if let Some(target) = self.overrides.get(&raw.trim().to_uppercase()) {
            // Standard sizes are canonicalised; anything else is kept as typed.
            let (name, kind) = match normalize_size(target) {
                Some(m) if m.kind != SizeKind::Other => (m.name, m.kind),
                _ => (target.clone(), SizeKind::Other),
            };
            return Some(MappedSize {
                raw: raw.to_string(),
                name,
                kind,
            });
        }
        normalize_size(raw)
    }

    /// Map, deduplicate by canonical name, and sort.
    pub fn map_all<S: AsRef<str>>(&self, raws: &[S]) -> SizeMapping {
        let mut seen = HashSet::new();
        let mut mapping = SizeMapping::default();
        for raw in raws {
            let raw = raw.as_ref();
            match self.map_one(raw) {
                Some(size) => {
                    if seen.insert(size.name.clone()) {
                        mapping.sizes.push(size);
                    }
                }
                None => {
                    warn!("Size '{}' cannot be mapped to a Temu size", raw);
                    mapping.unmapped.push(raw.to_string());
                }
            }
        }
        mapping.sizes.sort_by(MappedSize::cmp_order);
        mapping
    }
}
