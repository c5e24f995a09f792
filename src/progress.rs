//! Progress-callback trait for workflow step events.
//!
//! Inject an [`Arc<dyn WorkflowProgressCallback>`] via
//! [`crate::config::ListingConfigBuilder::progress_callback`] to receive an
//! event as each workflow step starts, finishes or fails. The CLI uses it to
//! drive its progress bar; a service could forward the same events to a job
//! record or a websocket.
//!
//! # Example
//!
//! ```rust
//! use temu_lister::{ListingConfig, WorkflowProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     done: AtomicUsize,
//! }
//!
//! impl WorkflowProgressCallback for CountingCallback {
//!     fn on_step_complete(&self, step: usize, name: &str, detail: &str) {
//!         self.done.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("step {step} ({name}): {detail}");
//!     }
//! }
//!
//! let config = ListingConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { done: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by [`crate::workflow::ProductManager`] as it runs each step.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Steps are numbered from 1.
pub trait WorkflowProgressCallback: Send + Sync {
    /// Called once before the first step.
    fn on_workflow_start(&self, input: &str, total_steps: usize) {
        let _ = (input, total_steps);
    }

    fn on_step_start(&self, step: usize, name: &str) {
        let _ = (step, name);
    }

    /// `detail` is a short human-readable summary ("5/6 images kept").
    fn on_step_complete(&self, step: usize, name: &str, detail: &str) {
        let _ = (step, name, detail);
    }

    /// A step was skipped by configuration (dry run, OCR disabled).
    fn on_step_skipped(&self, step: usize, name: &str) {
        let _ = (step, name);
    }

    /// The step failed; the workflow stops after this call.
    fn on_step_error(&self, step: usize, name: &str, error: &str) {
        let _ = (step, name, error);
    }

    /// Called once after the last step succeeded.
    ///
    /// `goods_id` is `None` for dry runs.
    fn on_workflow_complete(&self, goods_id: Option<u64>) {
        let _ = goods_id;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl WorkflowProgressCallback for NoopProgressCallback {}

/// Alias matching the type stored in [`crate::config::ListingConfig`].
pub type ProgressCallback = Arc<dyn WorkflowProgressCallback>;
