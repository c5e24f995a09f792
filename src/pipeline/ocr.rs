//! Chinese-text detection on product images.
//!
//! Temu's review rejects listings whose images carry Chinese text (supplier
//! watermarks, promo stickers, Chinese size charts). Images go through a
//! [`TextDetector`]; any image whose transcription holds at least
//! `chinese_char_threshold` Han characters is dropped.
//!
//! The default detector is a vision LLM reached through `edgequake-llm`,
//! the same way the rest of the stack talks to LLMs. Tests and callers with
//! their own OCR engine inject a [`TextDetector`] instead.

use crate::api::retry::{retry_with_backoff, RetryDisposition, RetryPolicy};
use crate::config::ListingConfig;
use crate::error::{ImageIssue, ListingError};
use crate::pipeline::images::ProcessedImage;
use crate::prompts::{NO_TEXT_SENTINEL, TEXT_DETECTION_PROMPT};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use futures::stream::{self, StreamExt};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, info, warn};

const DEFAULT_OCR_MODEL: &str = "gpt-4.1-nano";

static RE_HAN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\p{Han}").unwrap());

/// Anything that can read the text on an image.
#[async_trait]
pub trait TextDetector: Send + Sync {
    /// All text visible on `image`; empty when there is none.
    async fn detect_text(&self, image: &ProcessedImage) -> Result<String, ListingError>;
}

/// Vision-LLM text detector.
pub struct VlmTextDetector {
    provider: Arc<dyn LLMProvider>,
    retry: RetryPolicy,
}

impl std::fmt::Debug for VlmTextDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VlmTextDetector")
            .field("provider", &"<dyn LLMProvider>")
            .field("retry", &self.retry)
            .finish()
    }
}

impl VlmTextDetector {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self {
            provider,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Resolve the provider from the config and environment.
    pub fn from_config(config: &ListingConfig) -> Result<Self, ListingError> {
        Ok(Self::new(resolve_ocr_provider(config)?).with_retry(RetryPolicy::from_config(config)))
    }
}

#[async_trait]
impl TextDetector for VlmTextDetector {
    async fn detect_text(&self, image: &ProcessedImage) -> Result<String, ListingError> {
        let messages = vec![
            ChatMessage::system(TEXT_DETECTION_PROMPT),
            ChatMessage::user_with_images(
                "",
                vec![ImageData::new(image.to_base64(), image.mime()).with_detail("high")],
            ),
        ];
        let options = CompletionOptions {
            temperature: Some(0.0),
            max_tokens: Some(512),
            ..Default::default()
        };

        let label = format!("ocr image {}", image.index);
        let (provider, messages, options) = (&self.provider, &messages, &options);
        let reply = retry_with_backoff(
            &self.retry,
            &label,
            |_| async move {
                provider
                    .chat(messages, Some(options))
                    .await
                    .map_err(|e| ListingError::TextDetection {
                        detail: e.to_string(),
                    })
            },
            |_| RetryDisposition::Retry,
        )
        .await?;

        debug!(
            "Image {}: OCR used {} input / {} output tokens",
            image.index, reply.prompt_tokens, reply.completion_tokens
        );
        Ok(interpret_reply(&reply.content))
    }
}

/// Normalise a model reply: strip fences, map the sentinel to empty.
pub fn interpret_reply(content: &str) -> String {
    let text = content
        .trim()
        .trim_start_matches("```text")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();
    if text.eq_ignore_ascii_case(NO_TEXT_SENTINEL) {
        String::new()
    } else {
        text.to_string()
    }
}

/// Number of CJK Han characters in `text`.
pub fn count_han(text: &str) -> usize {
    RE_HAN.find_iter(text).count()
}

/// The first `n` Han characters, for log and issue messages.
pub fn han_sample(text: &str, n: usize) -> String {
    RE_HAN.find_iter(text).take(n).map(|m| m.as_str()).collect()
}

/// Split images into those free of Chinese text and the issues of the rest.
///
/// Detection runs concurrently (`image_concurrency`) but the surviving
/// images keep their order.
pub async fn filter_chinese_text(
    images: Vec<ProcessedImage>,
    detector: &dyn TextDetector,
    config: &ListingConfig,
) -> (Vec<ProcessedImage>, Vec<ImageIssue>) {
    let threshold = config.chinese_char_threshold.max(1);
    let fail_open = config.ocr_fail_open;

    let verdicts: Vec<(ProcessedImage, Option<ImageIssue>)> = stream::iter(images)
        .map(|image| async move {
            let issue = match detector.detect_text(&image).await {
                Ok(text) => {
                    let han_chars = count_han(&text);
                    if han_chars >= threshold {
                        Some(ImageIssue::ChineseText {
                            index: image.index,
                            han_chars,
                            sample: han_sample(&text, 12),
                        })
                    } else {
                        None
                    }
                }
                Err(e) if fail_open => {
                    warn!("Image {}: text detection failed, keeping image: {}", image.index, e);
                    None
                }
                Err(e) => Some(ImageIssue::OcrFailed {
                    index: image.index,
                    detail: e.to_string(),
                }),
            };
            (image, issue)
        })
        .buffered(config.image_concurrency.max(1))
        .collect()
        .await;

    let mut kept = Vec::new();
    let mut issues = Vec::new();
    for (image, issue) in verdicts {
        match issue {
            Some(issue) => {
                warn!("{}", issue);
                issues.push(issue);
            }
            None => kept.push(image),
        }
    }
    info!("OCR filter kept {}/{} images", kept.len(), kept.len() + issues.len());
    (kept, issues)
}

/// Resolve the vision provider, from most to least specific:
///
/// 1. `config.ocr_provider` (pre-built),
/// 2. `config.ocr_provider_name` + `config.ocr_model`,
/// 3. `TEMU_OCR_PROVIDER` + `TEMU_OCR_MODEL` when both are set,
/// 4. OpenAI when `OPENAI_API_KEY` is set,
/// 5. `ProviderFactory::from_env` auto-detection.
pub fn resolve_ocr_provider(config: &ListingConfig) -> Result<Arc<dyn LLMProvider>, ListingError> {
    if let Some(provider) = &config.ocr_provider {
        return Ok(Arc::clone(provider));
    }

    let model = config.ocr_model.as_deref().unwrap_or(DEFAULT_OCR_MODEL);
    if let Some(name) = &config.ocr_provider_name {
        return create_provider(name, model);
    }

    if let (Ok(provider), Ok(env_model)) = (
        std::env::var("TEMU_OCR_PROVIDER"),
        std::env::var("TEMU_OCR_MODEL"),
    ) {
        if !provider.is_empty() && !env_model.is_empty() {
            return create_provider(&provider, &env_model);
        }
    }

    if std::env::var("OPENAI_API_KEY").is_ok_and(|k| !k.is_empty()) {
        return create_provider("openai", model);
    }

    let (provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| ListingError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No vision LLM could be auto-detected for text detection.\n\
                 Set OPENAI_API_KEY (or TEMU_OCR_PROVIDER + TEMU_OCR_MODEL), or pass --no-ocr.\n\
                 Error: {e}"
            ),
        })?;
    Ok(provider)
}

fn create_provider(name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, ListingError> {
    ProviderFactory::create_llm_provider(name, model).map_err(|e| {
        ListingError::ProviderNotConfigured {
            provider: name.to_string(),
            hint: e.to_string(),
        }
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Returns canned text per image index; `None` entries fail.
    pub(crate) struct FakeDetector {
        pub(crate) texts: HashMap<usize, Option<String>>,
    }

    #[async_trait]
    impl TextDetector for FakeDetector {
        async fn detect_text(&self, image: &ProcessedImage) -> Result<String, ListingError> {
            match self.texts.get(&image.index) {
                Some(Some(text)) => Ok(text.clone()),
                Some(None) => Err(ListingError::TextDetection {
                    detail: "model unavailable".into(),
                }),
                None => Ok(String::new()),
            }
        }
    }

    fn image(index: usize) -> ProcessedImage {
        ProcessedImage {
            index,
            source: format!("img-{index}"),
            original_width: 800,
            original_height: 800,
            width: 800,
            height: 800,
            quality: 90,
            padded: false,
            resized: false,
            jpeg: vec![0xFF, 0xD8],
        }
    }

    #[test]
    fn han_counting() {
        assert_eq!(count_han("包邮 Free shipping"), 2);
        assert_eq!(count_han("SALE 50% OFF"), 0);
        assert_eq!(count_han("ｓａｌｅ"), 0);
        assert_eq!(han_sample("限时特价 hot 包邮", 3), "限时特");
    }

    #[test]
    fn sentinel_and_fences() {
        assert_eq!(interpret_reply("NONE"), "");
        assert_eq!(interpret_reply("  none \n"), "");
        assert_eq!(interpret_reply("```\n新品\n```"), "新品");
        assert_eq!(interpret_reply("BRAND"), "BRAND");
    }

    #[tokio::test]
    async fn images_with_chinese_text_are_removed() {
        let detector = FakeDetector {
            texts: HashMap::from([
                (0, Some("BRAND".to_string())),
                (1, Some("厂家直销 包邮".to_string())),
                (2, Some("S 码".to_string())),
            ]),
        };
        let config = ListingConfig::default();
        let (kept, issues) =
            filter_chinese_text(vec![image(0), image(1), image(2)], &detector, &config).await;

        let kept: Vec<usize> = kept.iter().map(|i| i.index).collect();
        assert_eq!(kept, vec![0, 2], "a single Han character stays under the threshold");
        assert!(matches!(issues[0], ImageIssue::ChineseText { index: 1, han_chars: 6, .. }));
    }

    #[tokio::test]
    async fn detector_failure_respects_fail_open() {
        let detector = FakeDetector {
            texts: HashMap::from([(0, None)]),
        };

        let open = ListingConfig::default();
        let (kept, issues) = filter_chinese_text(vec![image(0)], &detector, &open).await;
        assert_eq!(kept.len(), 1);
        assert!(issues.is_empty());

        let closed = ListingConfig::builder().ocr_fail_open(false).build().unwrap();
        let (kept, issues) = filter_chinese_text(vec![image(0)], &detector, &closed).await;
        assert!(kept.is_empty());
        assert!(matches!(issues[0], ImageIssue::OcrFailed { index: 0, .. }));
    }
}
