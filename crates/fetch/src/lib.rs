//! Outbound HTTP for the ingestion pipeline: a pluggable transport, a
//! retry/backoff policy, a per-source rate limiter, and the tagged
//! api/fallback/empty fetch outcome.

pub mod error;
pub mod fetcher;
pub mod policy;
#[cfg(any(test, feature = "test-utils"))]
pub mod scripted;
pub mod transport;

pub use error::FetchError;
pub use fetcher::{FetchOrigin, FetchOutcome, FetchRequest, Fetcher};
pub use policy::{RateLimiter, RetryPolicy};
#[cfg(any(test, feature = "test-utils"))]
pub use scripted::ScriptedTransport;
pub use transport::{HttpResponse, HttpTransport, ReqwestTransport, TransportError};
