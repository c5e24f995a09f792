//! Prompts for the vision LLM used as a text detector.
//!
//! Kept here rather than inline in [`crate::pipeline::ocr`] so a prompt
//! change never touches retry or filtering logic, and so tests can inspect
//! the exact wording.

/// Sentinel the model returns when an image carries no text.
pub const NO_TEXT_SENTINEL: &str = "NONE";

/// System prompt: transcribe every visible character, nothing else.
///
/// Han characters must come back verbatim (no translation, no pinyin), since
/// the caller counts them to decide whether the image may be listed.
pub const TEXT_DETECTION_PROMPT: &str = r#"You are an OCR engine. Transcribe every piece of visible text in the image exactly as written.

Rules:
1. Output only the transcribed text, one line per text block, in reading order.
2. Keep the original script. Never translate, romanise or add pinyin.
3. Include watermarks, logos, stickers, price tags and size charts.
4. Do not describe the image and do not add commentary or formatting.
5. If the image contains no text at all, reply with exactly: NONE"#;
