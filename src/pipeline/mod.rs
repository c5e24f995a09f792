//! Pipeline stages for turning a source product page into a Temu listing.
//!
//! Each submodule implements one transformation step and is testable on its
//! own; the API calls between them live in [`crate::workflow`].
//!
//! ## Data Flow
//!
//! ```text
//! source ──▶ scrape ──▶ images ──▶ ocr ──▶ sizes ──▶ transform ──▶ compliance
//! (URL/path)  (HTML)    (resize)   (VLM)   (map)     (payload)     (checks)
//! ```
//!
//! 1. [`source`]     — fetch the page (or read a saved file), resolve links
//! 2. [`scrape`]     — JSON-LD, meta tags and CSS selectors → `SourceProduct`
//! 3. [`images`]     — download, check and normalise images; CPU work runs in
//!    `spawn_blocking`
//! 4. [`ocr`]        — drop images carrying Chinese text
//! 5. [`sizes`]      — fold raw size strings to Temu size names
//! 6. [`transform`]  — build the generation-neutral draft and render payloads
//! 7. [`compliance`] — local checks before the remote one

pub mod compliance;
pub mod images;
pub mod ocr;
pub mod scrape;
pub mod sizes;
pub mod source;
pub mod transform;
