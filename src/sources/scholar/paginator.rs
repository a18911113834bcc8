//! Page-by-page driver for the Scholar pipeline.

use super::merge::merge_entries;
use super::session::ScholarSession;
use crate::models::{DetailEntry, MergedEntry};
use crate::orchestrator::{CancelSignal, FetchOrchestrator, RetryDecision};
use crate::sources::SourceError;

/// Results per search page
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Drives a [`ScholarSession`] through consecutive result pages.
///
/// A failed page is retried at the same offset after rotation; a challenged
/// detail fetch retries only that entry. Entries already merged are never
/// refetched, and whatever was merged is returned when the leg aborts.
#[derive(Debug)]
pub struct Paginator<S> {
    session: S,
    page_size: usize,
}

impl<S: ScholarSession> Paginator<S> {
    pub fn new(session: S, page_size: usize) -> Self {
        Self {
            session,
            page_size: page_size.max(1),
        }
    }

    pub async fn run(
        mut self,
        query: &str,
        orchestrator: &mut FetchOrchestrator,
        cancel: &CancelSignal,
    ) -> Vec<MergedEntry> {
        let mut merged = Vec::new();
        let mut offset = 0;

        if self
            .bind(orchestrator.current_proxy(), orchestrator, cancel)
            .await
        {
            while let Some(page) = self.next_page(query, offset, orchestrator, cancel).await {
                let complete = page.complete;
                merged.extend(page.entries);
                if !complete {
                    break;
                }
                offset += self.page_size;
            }
        }

        self.session.close();
        tracing::info!(entries = merged.len(), "Scholar pagination finished");
        merged
    }

    /// Fetch and enrich the page at `offset`; `None` ends pagination
    async fn next_page(
        &mut self,
        query: &str,
        offset: usize,
        orchestrator: &mut FetchOrchestrator,
        cancel: &CancelSignal,
    ) -> Option<Page> {
        let step = format!("page at offset {}", offset);
        let listing = loop {
            let fetched = cancel.run(self.session.fetch_page(query, offset)).await;
            match fetched {
                Ok(listing) => {
                    orchestrator.on_success();
                    break listing;
                }
                Err(SourceError::Cancelled) => {
                    orchestrator.record(format!("{}: {}", step, SourceError::Cancelled));
                    return None;
                }
                Err(err) => match orchestrator.on_failure(&step, &err) {
                    RetryDecision::Rotate(proxy) => {
                        if !self.bind(proxy, orchestrator, cancel).await {
                            return None;
                        }
                    }
                    RetryDecision::Abort => return None,
                },
            }
        };

        if listing.is_empty() {
            tracing::info!(offset, "empty page, no more results");
            return None;
        }
        tracing::info!(offset, count = listing.len(), "fetched result page");

        let mut details: Vec<DetailEntry> = Vec::with_capacity(listing.len());
        let mut complete = true;
        let mut index = 0;
        while index < listing.len() {
            let entry = &listing[index];
            let step = format!("detail {}", entry.id);
            let fetched = cancel.run(self.session.fetch_detail(entry)).await;
            match fetched {
                Ok(detail) => {
                    orchestrator.on_success();
                    details.extend(detail);
                    index += 1;
                }
                Err(SourceError::Cancelled) => {
                    orchestrator.record(format!("{}: {}", step, SourceError::Cancelled));
                    complete = false;
                    break;
                }
                Err(err) if err.is_rotatable() => match orchestrator.on_failure(&step, &err) {
                    RetryDecision::Rotate(proxy) => {
                        if !self.bind(proxy, orchestrator, cancel).await {
                            complete = false;
                            break;
                        }
                    }
                    RetryDecision::Abort => {
                        complete = false;
                        break;
                    }
                },
                Err(err) if err.is_fatal() => {
                    orchestrator.record(format!("{}: {}", step, err));
                    complete = false;
                    break;
                }
                // One bad citation file leaves that entry listing-only
                Err(err) => {
                    orchestrator.record(format!("{}: {}", step, err));
                    index += 1;
                }
            }
        }

        Some(Page {
            entries: merge_entries(listing, details),
            complete,
        })
    }

    /// Rebuild the session on `proxy`, rotating further while init fails
    async fn bind(
        &mut self,
        proxy: Option<String>,
        orchestrator: &mut FetchOrchestrator,
        cancel: &CancelSignal,
    ) -> bool {
        let mut proxy = proxy;
        loop {
            let bound = cancel.run(self.session.init(proxy.clone())).await;
            match bound {
                Ok(()) => return true,
                Err(SourceError::Cancelled) => {
                    orchestrator.record(format!("session init: {}", SourceError::Cancelled));
                    return false;
                }
                Err(err) => match orchestrator.on_failure("session init", &err) {
                    RetryDecision::Rotate(next) => proxy = next,
                    RetryDecision::Abort => return false,
                },
            }
        }
    }
}

struct Page {
    entries: Vec<MergedEntry>,
    complete: bool,
}


#[cfg(test)]
mod tests {
    use super::fake::{details_by_id, FakeSession};
    use super::*;
    use std::collections::HashSet;

    fn proxies(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[tokio::test]
    async fn test_stops_at_first_empty_page() {
        let session = FakeSession::new(3, 10);
        let calls = session.calls.clone();
        let mut orchestrator = FetchOrchestrator::new("scholar", Vec::new());

        let merged = Paginator::new(session, 10)
            .run("graphene", &mut orchestrator, &CancelSignal::never())
            .await;

        assert_eq!(merged.len(), 30);
        assert!(merged.iter().all(|m| m.enriched));
        let calls = calls.lock().unwrap();
        let offsets: Vec<_> = calls.pages.iter().map(|(_, o)| *o).collect();
        assert_eq!(offsets, vec![0, 10, 20, 30]);
        assert!(calls.closed);
        assert!(orchestrator.errors().is_empty());
    }

    #[tokio::test]
    async fn test_challenged_page_retried_on_next_proxy() {
        let mut session = FakeSession::new(3, 10);
        session.challenged_pages =
            HashSet::from([(Some("http://a:1".to_string()), 10)]);
        let calls = session.calls.clone();
        let mut orchestrator = FetchOrchestrator::new("scholar", proxies(&["http://a:1", "http://b:2"]));

        let merged = Paginator::new(session, 10)
            .run("graphene", &mut orchestrator, &CancelSignal::never())
            .await;

        let ids: Vec<_> = merged.iter().map(|m| m.id.clone()).collect();
        let expected: Vec<_> = (0..30).map(|i| format!("cid{}", i)).collect();
        assert_eq!(ids, expected);

        let calls = calls.lock().unwrap();
        assert_eq!(
            calls.inits,
            vec![Some("http://a:1".to_string()), Some("http://b:2".to_string())]
        );
        assert!(details_by_id(&calls).values().all(|&n| n == 1));
        assert!(orchestrator.errors().is_empty());
    }

    #[tokio::test]
    async fn test_challenged_detail_retries_only_that_entry() {
        let mut session = FakeSession::new(1, 10);
        session.challenged_details = HashSet::from([(Some("http://a:1".to_string()), "cid4".to_string())]);
        let calls = session.calls.clone();
        let mut orchestrator = FetchOrchestrator::new("scholar", proxies(&["http://a:1", "http://b:2"]));

        let merged = Paginator::new(session, 10)
            .run("graphene", &mut orchestrator, &CancelSignal::never())
            .await;

        assert_eq!(merged.len(), 10);
        assert!(merged.iter().all(|m| m.enriched));

        let calls = calls.lock().unwrap();
        let counts = details_by_id(&calls);
        assert_eq!(counts["cid4"], 2);
        assert_eq!(counts["cid3"], 1);
        assert_eq!(counts["cid5"], 1);
        // The page itself was fetched once
        assert_eq!(calls.pages.iter().filter(|(_, o)| *o == 0).count(), 1);
    }

    #[tokio::test]
    async fn test_single_proxy_exhaustion_keeps_earlier_pages() {
        let mut session = FakeSession::new(5, 10);
        session.challenged_pages = HashSet::from([(Some("http://only:1".to_string()), 20)]);
        let mut orchestrator = FetchOrchestrator::new("scholar", proxies(&["http://only:1"]));

        let merged = Paginator::new(session, 10)
            .run("graphene", &mut orchestrator, &CancelSignal::never())
            .await;

        assert_eq!(merged.len(), 20);
        assert_eq!(merged.last().unwrap().id, "cid19");
        let errors = orchestrator.into_errors();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("Proxy pool exhausted"));
    }

    #[tokio::test]
    async fn test_detail_exhaustion_keeps_partial_page() {
        let mut session = FakeSession::new(2, 10);
        session.challenged_details = HashSet::from([(None, "cid13".to_string())]);
        let mut orchestrator = FetchOrchestrator::new("scholar", Vec::new());

        let merged = Paginator::new(session, 10)
            .run("graphene", &mut orchestrator, &CancelSignal::never())
            .await;

        // Page two is kept whole; entries from cid13 on stay listing-only
        assert_eq!(merged.len(), 20);
        assert!(merged[12].enriched);
        assert!(!merged[13].enriched);
        assert!(!merged[19].enriched);
        assert!(orchestrator.errors().entries()[0].contains("detail cid13"));
    }

    #[tokio::test]
    async fn test_rejected_detail_ends_pagination() {
        let mut session = FakeSession::new(3, 10);
        session.rejected_details = HashSet::from(["cid12".to_string()]);
        let calls = session.calls.clone();
        let mut orchestrator = FetchOrchestrator::new("scholar", Vec::new());

        let merged = Paginator::new(session, 10)
            .run("graphene", &mut orchestrator, &CancelSignal::never())
            .await;

        // The page in progress is kept; later pages are never requested
        assert_eq!(merged.len(), 20);
        assert!(merged[11].enriched);
        assert!(!merged[12].enriched);
        assert!(!merged[13].enriched);

        let calls = calls.lock().unwrap();
        let offsets: Vec<_> = calls.pages.iter().map(|(_, o)| *o).collect();
        assert_eq!(offsets, vec![0, 10]);
        assert!(!details_by_id(&calls).contains_key("cid13"));

        let errors = orchestrator.into_errors();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("detail cid12"));
    }

    #[tokio::test]
    async fn test_missing_detail_is_listing_only() {
        let mut session = FakeSession::new(1, 3);
        session.missing_details = HashSet::from(["cid1".to_string()]);
        let mut orchestrator = FetchOrchestrator::new("scholar", Vec::new());

        let merged = Paginator::new(session, 3)
            .run("graphene", &mut orchestrator, &CancelSignal::never())
            .await;

        assert_eq!(merged.len(), 3);
        assert!(!merged[1].enriched);
        assert_eq!(merged[1].title, "title 1");
        assert!(orchestrator.errors().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let (tx, cancel) = CancelSignal::channel();
        tx.send(true).unwrap();
        let session = FakeSession::new(3, 10);
        let calls = session.calls.clone();
        let mut orchestrator = FetchOrchestrator::new("scholar", Vec::new());

        let merged = Paginator::new(session, 10)
            .run("graphene", &mut orchestrator, &cancel)
            .await;

        assert!(merged.is_empty());
        assert!(calls.lock().unwrap().pages.is_empty());
        assert!(orchestrator.errors().entries()[0].contains("Cancelled"));
    }
}
