//! Generation fallback.
//!
//! [`ApiAdapter`] serves every call from the active generation and, when the
//! [`FallbackPolicy`] allows it, replays a failed call on the other one.
//! With `sticky` set, a successful fallback makes the other generation
//! active for the rest of the run, so a shop that only has the old API pays
//! the failed round-trip once instead of on every call.

use crate::api::client::TemuClient;
use crate::api::generation::{GoodsApi, LocalGoodsApi, TemuApi};
use crate::api::types::{Category, CategoryTemplate, CreatedGoods, RemoteCompliance, SpecRef, UploadedImage};
use crate::config::{ApiGeneration, FallbackPolicy, ListingConfig};
use crate::error::ListingError;
use crate::pipeline::transform::GoodsDraft;
use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Message fragments Temu uses when an API is not open to the caller.
const UNSUPPORTED_MARKERS: &[&str] = &[
    "not exist",
    "no permission",
    "not supported",
    "not authorized",
    "unauthorized api",
    "无权限",
    "不存在",
];

/// Build the API the workflow talks to.
///
/// An injected [`ListingConfig::api`] wins; otherwise a reqwest-backed
/// client is wrapped in an [`ApiAdapter`] for the configured generation.
pub fn build_api(config: &ListingConfig) -> Result<Arc<dyn TemuApi>, ListingError> {
    if let Some(api) = &config.api {
        return Ok(Arc::clone(api));
    }

    let client = TemuClient::from_config(config)?;
    let make = |generation: ApiGeneration| -> Arc<dyn TemuApi> {
        match generation {
            ApiGeneration::New => Arc::new(GoodsApi::with_overrides(client.clone(), &config.api_types)),
            ApiGeneration::Old => {
                Arc::new(LocalGoodsApi::with_overrides(client.clone(), &config.api_types))
            }
        }
    };

    let primary = make(config.api_generation);
    let secondary =
        (config.fallback != FallbackPolicy::Never).then(|| make(config.api_generation.other()));

    Ok(Arc::new(
        ApiAdapter::new(primary, secondary)
            .with_policy(config.fallback)
            .with_sticky(config.sticky_fallback)
            .with_unsupported_codes(config.unsupported_error_codes.clone()),
    ))
}

/// Routes calls to the active generation with optional fallback.
pub struct ApiAdapter {
    primary: Arc<dyn TemuApi>,
    secondary: Option<Arc<dyn TemuApi>>,
    policy: FallbackPolicy,
    sticky: bool,
    unsupported_codes: Vec<i64>,
    /// `true` once the secondary has become the active generation.
    switched: AtomicBool,
}

impl fmt::Debug for ApiAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiAdapter")
            .field("primary", &self.primary.generation())
            .field("secondary", &self.secondary.as_ref().map(|s| s.generation()))
            .field("policy", &self.policy)
            .field("sticky", &self.sticky)
            .field("active", &self.active())
            .finish()
    }
}

impl ApiAdapter {
    pub fn new(primary: Arc<dyn TemuApi>, secondary: Option<Arc<dyn TemuApi>>) -> Self {
        Self {
            primary,
            secondary,
            policy: FallbackPolicy::default(),
            sticky: true,
            unsupported_codes: Vec::new(),
            switched: AtomicBool::new(false),
        }
    }

    pub fn with_policy(mut self, policy: FallbackPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_sticky(mut self, sticky: bool) -> Self {
        self.sticky = sticky;
        self
    }

    pub fn with_unsupported_codes(mut self, codes: Vec<i64>) -> Self {
        self.unsupported_codes = codes;
        self
    }

    /// Generation that will serve the next call.
    pub fn active(&self) -> ApiGeneration {
        match (&self.secondary, self.switched.load(Ordering::Acquire)) {
            (Some(secondary), true) => secondary.generation(),
            _ => self.primary.generation(),
        }
    }

    /// Make `generation` active. Returns `false` if no such generation is
    /// configured.
    pub fn switch_to(&self, generation: ApiGeneration) -> bool {
        if self.primary.generation() == generation {
            self.switched.store(false, Ordering::Release);
            return true;
        }
        match &self.secondary {
            Some(secondary) if secondary.generation() == generation => {
                self.switched.store(true, Ordering::Release);
                true
            }
            _ => false,
        }
    }

    /// Whether Temu's answer means the API itself is unavailable.
    pub fn is_unsupported(&self, err: &ListingError) -> bool {
        match err {
            ListingError::Api { code, message, .. } => {
                if self.unsupported_codes.contains(code) {
                    return true;
                }
                let message = message.to_lowercase();
                UNSUPPORTED_MARKERS.iter().any(|m| message.contains(m))
            }
            ListingError::HttpStatus { status, .. } => *status == 404,
            _ => false,
        }
    }

    fn should_fall_back(&self, err: &ListingError) -> bool {
        match self.policy {
            FallbackPolicy::Never => false,
            FallbackPolicy::OnUnsupported => self.is_unsupported(err),
            FallbackPolicy::OnAnyError => matches!(
                err,
                ListingError::Api { .. }
                    | ListingError::HttpStatus { .. }
                    | ListingError::InvalidResponse { .. }
                    | ListingError::Transport { .. }
                    | ListingError::SpecNotResolved { .. }
            ),
        }
    }

    fn ordered(&self) -> (&Arc<dyn TemuApi>, Option<&Arc<dyn TemuApi>>) {
        match (&self.secondary, self.switched.load(Ordering::Acquire)) {
            (Some(secondary), true) => (secondary, Some(&self.primary)),
            (secondary, _) => (&self.primary, secondary.as_ref()),
        }
    }

    async fn dispatch<'a, T, F, Fut>(&'a self, operation: &str, call: F) -> Result<T, ListingError>
    where
        F: Fn(&'a dyn TemuApi) -> Fut,
        Fut: Future<Output = Result<T, ListingError>>,
    {
        let (first, second) = self.ordered();
        let err = match call(first.as_ref()).await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        let Some(second) = second else {
            return Err(err);
        };
        if !self.should_fall_back(&err) {
            return Err(err);
        }

        warn!(
            operation,
            from = %first.generation(),
            to = %second.generation(),
            error = %err,
            "falling back to the other API generation"
        );

        match call(second.as_ref()).await {
            Ok(value) => {
                if self.sticky && self.switch_to(second.generation()) {
                    info!("Switched to {} API for the rest of the run", second.generation());
                }
                Ok(value)
            }
            // Both unavailable: the first error names the configured generation.
            Err(fallback_err) if self.is_unsupported(&fallback_err) => Err(err),
            Err(fallback_err) => Err(fallback_err),
        }
    }
}

#[async_trait]
impl TemuApi for ApiAdapter {
    fn generation(&self) -> ApiGeneration {
        self.active()
    }

    async fn categories(&self, parent_id: u64) -> Result<Vec<Category>, ListingError> {
        self.dispatch("categories", |api| api.categories(parent_id)).await
    }

    async fn template(&self, cat_id: u64) -> Result<CategoryTemplate, ListingError> {
        self.dispatch("template", |api| api.template(cat_id)).await
    }

    async fn spec_id(
        &self,
        cat_id: u64,
        parent_spec_id: u64,
        name: &str,
    ) -> Result<SpecRef, ListingError> {
        self.dispatch("spec_id", |api| api.spec_id(cat_id, parent_spec_id, name))
            .await
    }

    async fn upload_image(&self, bytes: &[u8], mime: &str) -> Result<UploadedImage, ListingError> {
        self.dispatch("upload_image", |api| api.upload_image(bytes, mime))
            .await
    }

    async fn compliance(&self, draft: &GoodsDraft) -> Result<RemoteCompliance, ListingError> {
        self.dispatch("compliance", |api| api.compliance(draft)).await
    }

    async fn add_goods(&self, draft: &GoodsDraft) -> Result<CreatedGoods, ListingError> {
        self.dispatch("add_goods", |api| api.add_goods(draft)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    /// Answers `categories` with one node named after its generation, or
    /// fails with a fixed API error.
    struct FakeApi {
        generation: ApiGeneration,
        fail: Option<(i64, &'static str)>,
        calls: AtomicUsize,
    }

    impl FakeApi {
        fn ok(generation: ApiGeneration) -> Arc<Self> {
            Arc::new(Self {
                generation,
                fail: None,
                calls: AtomicUsize::new(0),
            })
        }

        fn failing(generation: ApiGeneration, code: i64, message: &'static str) -> Arc<Self> {
            Arc::new(Self {
                generation,
                fail: Some((code, message)),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TemuApi for FakeApi {
        fn generation(&self) -> ApiGeneration {
            self.generation
        }

        async fn categories(&self, parent_id: u64) -> Result<Vec<Category>, ListingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some((code, message)) = self.fail {
                return Err(ListingError::Api {
                    api_type: "fake".into(),
                    code,
                    message: message.into(),
                });
            }
            Ok(vec![Category {
                cat_id: 1,
                name: self.generation.to_string(),
                parent_id,
                level: 1,
                is_leaf: true,
            }])
        }

        async fn template(&self, _: u64) -> Result<CategoryTemplate, ListingError> {
            Err(ListingError::Internal("unused".into()))
        }

        async fn spec_id(&self, _: u64, _: u64, _: &str) -> Result<SpecRef, ListingError> {
            Err(ListingError::Internal("unused".into()))
        }

        async fn upload_image(&self, _: &[u8], _: &str) -> Result<UploadedImage, ListingError> {
            Err(ListingError::Internal("unused".into()))
        }

        async fn compliance(&self, _: &GoodsDraft) -> Result<RemoteCompliance, ListingError> {
            Err(ListingError::Internal("unused".into()))
        }

        async fn add_goods(&self, _: &GoodsDraft) -> Result<CreatedGoods, ListingError> {
            Err(ListingError::Internal("unused".into()))
        }
    }

    #[tokio::test]
    async fn primary_success_never_touches_secondary() {
        let new = FakeApi::ok(ApiGeneration::New);
        let old = FakeApi::ok(ApiGeneration::Old);
        let adapter = ApiAdapter::new(new.clone(), Some(old.clone()));

        adapter.categories(0).await.unwrap();
        assert_eq!(new.calls(), 1);
        assert_eq!(old.calls(), 0);
        assert_eq!(adapter.active(), ApiGeneration::New);
    }

    #[tokio::test]
    async fn unsupported_code_falls_back_and_sticks() {
        let new = FakeApi::failing(ApiGeneration::New, 3_000_000, "type not exists");
        let old = FakeApi::ok(ApiGeneration::Old);
        let adapter = ApiAdapter::new(new.clone(), Some(old.clone()))
            .with_unsupported_codes(vec![3_000_000]);

        let cats = adapter.categories(0).await.unwrap();
        assert_eq!(cats[0].name, ApiGeneration::Old.to_string());
        assert_eq!(adapter.active(), ApiGeneration::Old);

        adapter.categories(0).await.unwrap();
        assert_eq!(new.calls(), 1, "sticky fallback skips the primary");
        assert_eq!(old.calls(), 2);
    }

    #[tokio::test]
    async fn non_sticky_retries_primary_each_time() {
        let new = FakeApi::failing(ApiGeneration::New, 1, "no permission for this api");
        let old = FakeApi::ok(ApiGeneration::Old);
        let adapter = ApiAdapter::new(new.clone(), Some(old.clone())).with_sticky(false);

        adapter.categories(0).await.unwrap();
        adapter.categories(0).await.unwrap();
        assert_eq!(new.calls(), 2);
        assert_eq!(adapter.active(), ApiGeneration::New);
    }

    #[tokio::test]
    async fn business_errors_do_not_fall_back_by_default() {
        let new = FakeApi::failing(ApiGeneration::New, 4_000_010, "title is invalid");
        let old = FakeApi::ok(ApiGeneration::Old);
        let adapter = ApiAdapter::new(new.clone(), Some(old.clone()));

        let err = adapter.categories(0).await.unwrap_err();
        assert_eq!(err.api_code(), Some(4_000_010));
        assert_eq!(old.calls(), 0);
    }

    #[tokio::test]
    async fn any_error_policy_falls_back_on_business_errors() {
        let new = FakeApi::failing(ApiGeneration::New, 4_000_010, "title is invalid");
        let old = FakeApi::ok(ApiGeneration::Old);
        let adapter =
            ApiAdapter::new(new, Some(old.clone())).with_policy(FallbackPolicy::OnAnyError);

        adapter.categories(0).await.unwrap();
        assert_eq!(old.calls(), 1);
    }

    #[tokio::test]
    async fn never_policy_keeps_primary_error() {
        let new = FakeApi::failing(ApiGeneration::New, 3_000_000, "type not exists");
        let old = FakeApi::ok(ApiGeneration::Old);
        let adapter = ApiAdapter::new(new, Some(old.clone()))
            .with_policy(FallbackPolicy::Never)
            .with_unsupported_codes(vec![3_000_000]);

        assert!(adapter.categories(0).await.is_err());
        assert_eq!(old.calls(), 0);
    }

    #[tokio::test]
    async fn both_unsupported_reports_primary_error() {
        let new = FakeApi::failing(ApiGeneration::New, 3_000_000, "type not exists");
        let old = FakeApi::failing(ApiGeneration::Old, 3_000_001, "no permission");
        let adapter =
            ApiAdapter::new(new, Some(old)).with_unsupported_codes(vec![3_000_000, 3_000_001]);

        let err = adapter.categories(0).await.unwrap_err();
        assert_eq!(err.api_code(), Some(3_000_000));
        assert_eq!(adapter.active(), ApiGeneration::New);
    }

    #[test]
    fn switch_to_unknown_generation_is_refused() {
        let adapter = ApiAdapter::new(FakeApi::ok(ApiGeneration::New), None);
        assert!(!adapter.switch_to(ApiGeneration::Old));
        assert!(adapter.switch_to(ApiGeneration::New));
        assert_eq!(adapter.active(), ApiGeneration::New);
    }
}
