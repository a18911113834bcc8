//! # bibliofetch
//!
//! Resilient bibliographic metadata fetching from Google Scholar and Scopus.
//!
//! Every fetch returns a [`FetchResult`] holding whatever was collected plus
//! the errors met along the way. Proxy rotation, CAPTCHA challenges, session
//! refresh and cancellation are handled inside the fetchers.
//!
//! ## Architecture
//!
//! - [`models`]: Fetch requests and results, provider entities
//! - [`sources`]: The [`Fetcher`] trait and one fetcher per provider
//! - [`orchestrator`]: Retry and proxy rotation policy, cancellation
//! - [`utils`]: HTTP client construction, proxy rotation, dump files
//! - [`config`]: Configuration management

pub mod config;
pub mod models;
pub mod orchestrator;
pub mod sources;
pub mod utils;

// Re-export commonly used types
pub use models::{FetchPayload, FetchRequest, FetchResult};
pub use orchestrator::CancelSignal;
pub use sources::{Fetcher, FetcherRegistry, SourceError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
