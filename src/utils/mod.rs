//! Utility modules supporting fetch operations.
//!
//! - [`HttpClient`]: reqwest client bound to one egress proxy, with TLS and timeout settings
//! - [`ProxyRotator`]: cyclic selection over the configured proxy list
//! - [`write_dump`] / [`read_dump`]: raw payload files
//!
//! # Proxy rotation
//!
//! ```rust
//! use bibliofetch::utils::ProxyRotator;
//!
//! let mut rotator = ProxyRotator::new(vec!["http://a:8080".into(), "http://b:8080".into()]);
//! assert_eq!(rotator.next_proxy().as_deref(), Some("http://a:8080"));
//! assert_eq!(rotator.next_proxy().as_deref(), Some("http://b:8080"));
//! assert_eq!(rotator.next_proxy().as_deref(), Some("http://a:8080"));
//! ```

mod dump;
mod http;
mod proxy;

pub use dump::{read_dump, write_dump};
pub use http::{HttpClient, HttpClientBuilder, DEFAULT_TIMEOUT};
pub use proxy::ProxyRotator;
