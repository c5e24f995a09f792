//! Temu open-API access: signing, retry, transport and the two API generations.
//!
//! ## Call Flow
//!
//! ```text
//! workflow ──▶ adapter ──▶ generation ──▶ client ──▶ transport
//!              (fallback)  (new / old)    (sign+retry) (reqwest)
//! ```
//!
//! 1. [`signature`]  — canonicalise parameters and compute the `sign` field
//! 2. [`retry`]      — exponential backoff with jitter around every call
//! 3. [`client`]     — common parameters, envelope parsing, error mapping
//! 4. [`generation`] — `bg.goods.*` and `bg.local.goods.*` behind [`TemuApi`]
//! 5. [`adapter`]    — pick a generation, fall back to the other one
//! 6. [`types`]      — normalised response types shared by both generations

pub mod adapter;
pub mod client;
pub mod generation;
pub mod retry;
pub mod signature;
pub mod types;

pub use adapter::{build_api, ApiAdapter};
pub use client::{HttpTransport, ReqwestTransport, TemuClient, TemuCredentials};
pub use generation::{GoodsApi, LocalGoodsApi, TemuApi};
pub use retry::{retry_with_backoff, RetryDisposition, RetryPolicy};
pub use signature::SignMethod;
