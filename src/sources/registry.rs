//! Registry for running several fetchers side by side.

use std::sync::Arc;

use futures_util::future::join_all;
use tracing::{error, info};

use super::Fetcher;
use crate::models::{FetchRequest, FetchResult};
use crate::orchestrator::CancelSignal;

/// Set of fetchers run together on one request
///
/// Each fetcher runs as its own task. A fetcher that panics becomes a failed
/// [`FetchResult`] for its module; the other tasks are left alone.
#[derive(Debug, Clone, Default)]
pub struct FetcherRegistry {
    fetchers: Vec<Arc<dyn Fetcher>>,
}

impl FetcherRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fetcher
    pub fn register(&mut self, fetcher: Arc<dyn Fetcher>) {
        self.fetchers.push(fetcher);
    }

    /// Builder-style [`register`](Self::register)
    pub fn with(mut self, fetcher: impl Fetcher + 'static) -> Self {
        self.register(Arc::new(fetcher));
        self
    }

    /// Registered fetcher ids, in registration order
    pub fn ids(&self) -> Vec<&str> {
        self.fetchers.iter().map(|f| f.id()).collect()
    }

    pub fn len(&self) -> usize {
        self.fetchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fetchers.is_empty()
    }

    /// Run every fetcher concurrently and collect one result per fetcher.
    ///
    /// Results come back in registration order.
    pub async fn run_all(&self, request: &FetchRequest, cancel: CancelSignal) -> Vec<FetchResult> {
        let request = Arc::new(request.clone());

        let handles: Vec<_> = self
            .fetchers
            .iter()
            .map(|fetcher| {
                let fetcher = Arc::clone(fetcher);
                let request = Arc::clone(&request);
                let cancel = cancel.clone();
                tokio::spawn(async move { fetcher.fetch(&request, cancel).await })
            })
            .collect();

        info!(tasks = handles.len(), "started fetch tasks");
        let joined = join_all(handles).await;

        joined
            .into_iter()
            .zip(self.fetchers.iter())
            .map(|(outcome, fetcher)| match outcome {
                Ok(result) => result,
                Err(e) => {
                    error!(module = fetcher.id(), "fetch task failed: {}", e);
                    FetchResult::failed(fetcher.id(), format!("fetch task failed: {}", e))
                }
            })
            .collect()
    }
}
