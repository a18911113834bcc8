//! Id enumeration and chunked export.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::json;

use super::auth::AuthLifecycle;
use super::batch::{batch_id, batch_id_prefix, MAX_EIDS_PER_EXPORT, MAX_EIDS_PER_SEARCH};
use crate::models::{EidPage, ExportChunk, ExportFileType, FieldGroup};
use crate::orchestrator::{CancelSignal, FetchOrchestrator, RetryDecision};
use crate::sources::SourceError;

pub const SEARCH_PATH: &str = "/api/documents/search/eids";
pub const EXPORT_PATH: &str = "/gateway/export-service/export";

/// Default cap on id re-searches per run
pub const DEFAULT_MAX_ITERATIONS: usize = 1000;

/// What an export run produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportOutcome {
    /// Concatenated raw export text
    pub raw: String,
    /// Number of ids exported
    pub exported: usize,
    /// Last total reported by the provider
    pub total_found: usize,
}

/// Exports every document matching a query.
///
/// Ids are searched in pages of up to 2000 and exported in chunks of up to
/// 100. After each held page the ids are searched again at the exported
/// offset, re-reading the provider's total each time.
#[derive(Debug)]
pub struct BatchExportEngine {
    auth: AuthLifecycle,
    prefix: String,
    file_type: ExportFileType,
    fields: Vec<FieldGroup>,
    max_iterations: usize,
    next_transaction: AtomicU64,
}

impl BatchExportEngine {
    pub fn new(auth: AuthLifecycle) -> Self {
        Self {
            auth,
            prefix: batch_id_prefix(),
            file_type: ExportFileType::Csv,
            fields: FieldGroup::all(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            next_transaction: AtomicU64::new(1),
        }
    }

    /// Fix the batch id prefix instead of a random one
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn file_type(mut self, file_type: ExportFileType) -> Self {
        self.file_type = file_type;
        self
    }

    pub fn fields(mut self, fields: Vec<FieldGroup>) -> Self {
        self.fields = fields;
        self
    }

    pub fn max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    pub fn auth(&self) -> &AuthLifecycle {
        &self.auth
    }

    /// Run the export; partial output is kept when a step gives up
    pub async fn export_all(
        &self,
        query: &str,
        orchestrator: &mut FetchOrchestrator,
        cancel: &CancelSignal,
    ) -> ExportOutcome {
        let search_query = format!("TITLE-ABS-KEY({})", query);
        let q = search_query.as_str();
        let mut outcome = ExportOutcome::default();
        tracing::debug!(prefix = %self.prefix, "using batch prefix");

        let Some(mut page) = self
            .attempt("id search at offset 0", orchestrator, cancel, move || {
                self.search_eids(q, 0)
            })
            .await
        else {
            return outcome;
        };
        outcome.total_found = page.total_found;
        tracing::info!(total = page.total_found, "documents to export");

        let mut iterations = 0;
        'pages: while outcome.exported < outcome.total_found {
            if page.eids.is_empty() {
                orchestrator.record(format!(
                    "id search at offset {} returned no ids with {}/{} exported",
                    outcome.exported, outcome.exported, outcome.total_found
                ));
                break;
            }

            for eids in page.eids.chunks(MAX_EIDS_PER_EXPORT) {
                let chunk = ExportChunk {
                    batch_id: batch_id(&self.prefix, outcome.exported),
                    eids: eids.to_vec(),
                    fields: self.fields.clone(),
                    transaction: self.next_transaction.fetch_add(1, Ordering::SeqCst),
                    hide_headers: outcome.exported > 0,
                    total_docs: outcome.total_found,
                };
                let step = format!("export batch {}", chunk.batch_id);
                let chunk_ref = &chunk;
                let Some(text) = self
                    .attempt(&step, orchestrator, cancel, move || {
                        self.export_chunk(chunk_ref)
                    })
                    .await
                else {
                    break 'pages;
                };

                outcome.raw.push_str(&text);
                outcome.exported += chunk.eids.len();
                tracing::info!(
                    exported = outcome.exported,
                    total = outcome.total_found,
                    "exported batch {}",
                    chunk.batch_id
                );
            }

            iterations += 1;
            if iterations >= self.max_iterations {
                if outcome.exported < outcome.total_found {
                    orchestrator.record(format!(
                        "stopped after {} id searches with {}/{} exported",
                        iterations, outcome.exported, outcome.total_found
                    ));
                }
                break;
            }

            let offset = outcome.exported;
            tracing::debug!(offset, "searching ids again");
            let step = format!("id search at offset {}", offset);
            match self
                .attempt(&step, orchestrator, cancel, move || {
                    self.search_eids(q, offset)
                })
                .await
            {
                Some(next) => {
                    outcome.total_found = next.total_found;
                    page = next;
                }
                None => break,
            }
        }

        tracing::info!(exported = outcome.exported, "export finished");
        outcome
    }

    async fn search_eids(&self, query: &str, offset: usize) -> Result<EidPage, SourceError> {
        let payload = json!({
            "documentClassificationEnum": "primary",
            "itemcount": MAX_EIDS_PER_SEARCH,
            "offset": offset,
            "query": query,
            "sort": "plf-f",
        });
        let text = self.auth.guarded_post(SEARCH_PATH, &[], &payload).await?;
        Ok(serde_json::from_str(&text)?)
    }

    async fn export_chunk(&self, chunk: &ExportChunk) -> Result<String, SourceError> {
        let session_id = self.auth.session_id().await;
        let payload = json!({
            "eids": chunk.eids,
            "fileType": self.file_type,
            "fieldGroupIdentifiers": chunk.fields,
            "keyEvent": {
                "sessionId": session_id,
                "transactionId": format!("{}:{}", session_id, chunk.transaction),
                "origin": "resultsList",
                "zone": "resultsListHeader",
                "primary": "",
                "totalDocs": chunk.total_docs,
            },
            "locale": "en-US",
            "hideHeaders": chunk.hide_headers,
        });
        tracing::debug!(batch_id = %chunk.batch_id, ids = chunk.eids.len(), "exporting chunk");
        self.auth
            .guarded_post(EXPORT_PATH, &[("batchId", chunk.batch_id.as_str())], &payload)
            .await
    }

    /// Run one step, rotating the egress proxy on rotatable failures
    async fn attempt<T, F, Fut>(
        &self,
        step: &str,
        orchestrator: &mut FetchOrchestrator,
        cancel: &CancelSignal,
        mut op: F,
    ) -> Option<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SourceError>>,
    {
        loop {
            match cancel.run(op()).await {
                Ok(value) => {
                    orchestrator.on_success();
                    return Some(value);
                }
                Err(SourceError::Cancelled) => {
                    orchestrator.record(format!("{}: {}", step, SourceError::Cancelled));
                    return None;
                }
                Err(err) => match orchestrator.on_failure(step, &err) {
                    RetryDecision::Rotate(proxy) => {
                        if let Err(e) = self.auth.rebind(proxy).await {
                            orchestrator.record(format!("{}: {}", step, e));
                            return None;
                        }
                    }
                    RetryDecision::Abort => return None,
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AuthMaterial;
    use crate::sources::scopus_batch::auth::ClientSettings;
    use mockito::{Matcher, Server, ServerGuard};
    use std::time::Duration;
    use url::Url;

    fn engine(server: &ServerGuard) -> BatchExportEngine {
        let auth = AuthLifecycle::new(
            Url::parse(&server.url()).unwrap(),
            AuthMaterial::new("agent/1.0", "jwt", "sid", "elb", "uuid"),
            ClientSettings {
                timeout: Duration::from_secs(5),
                verify_ssl: true,
            },
            None,
        )
        .unwrap();
        BatchExportEngine::new(auth).with_prefix("abc123")
    }

    fn eids(range: std::ops::Range<usize>) -> Vec<String> {
        range.map(|i| format!("2-s2.0-{}", i)).collect()
    }

    async fn mock_search(
        server: &mut ServerGuard,
        offset: usize,
        total: usize,
        docs: Vec<String>,
    ) -> mockito::Mock {
        server
            .mock("POST", SEARCH_PATH)
            .match_body(Matcher::PartialJson(json!({
                "offset": offset,
                "itemcount": 2000,
                "query": "TITLE-ABS-KEY(graphene)",
            })))
            .with_status(200)
            .with_body(json!({"response": {"numFound": total, "docs": docs}}).to_string())
            .expect(1)
            .create_async()
            .await
    }

    async fn mock_export(
        server: &mut ServerGuard,
        batch: &str,
        hide_headers: bool,
        transaction: &str,
        body: &str,
    ) -> mockito::Mock {
        server
            .mock("POST", EXPORT_PATH)
            .match_query(Matcher::UrlEncoded("batchId".into(), batch.into()))
            .match_body(Matcher::PartialJson(json!({
                "hideHeaders": hide_headers,
                "fileType": "CSV",
                "keyEvent": {"transactionId": transaction, "totalDocs": 250},
            })))
            .with_status(200)
            .with_body(body)
            .expect(1)
            .create_async()
            .await
    }

    #[tokio::test]
    async fn test_exports_in_chunks_of_100() {
        let mut server = Server::new_async().await;
        let first = mock_search(&mut server, 0, 250, eids(0..250)).await;
        let again = mock_search(&mut server, 250, 250, Vec::new()).await;
        let c1 = mock_export(&mut server, "abc123_0_0", false, "sid:1", "header\nrow-a\n").await;
        let c2 = mock_export(&mut server, "abc123_0_1", true, "sid:2", "row-b\n").await;
        let c3 = mock_export(&mut server, "abc123_0_2", true, "sid:3", "row-c\n").await;

        let engine = engine(&server);
        let mut orchestrator = FetchOrchestrator::new("scopus_batch", Vec::new());
        let outcome = engine
            .export_all("graphene", &mut orchestrator, &CancelSignal::never())
            .await;

        assert_eq!(outcome.exported, 250);
        assert_eq!(outcome.total_found, 250);
        assert_eq!(outcome.raw, "header\nrow-a\nrow-b\nrow-c\n");
        assert!(orchestrator.errors().is_empty());

        for mock in [first, again, c1, c2, c3] {
            mock.assert_async().await;
        }
    }

    #[tokio::test]
    async fn test_no_results() {
        let mut server = Server::new_async().await;
        let search = mock_search(&mut server, 0, 0, Vec::new()).await;
        let export = server
            .mock("POST", EXPORT_PATH)
            .match_query(Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let engine = engine(&server);
        let mut orchestrator = FetchOrchestrator::new("scopus_batch", Vec::new());
        let outcome = engine
            .export_all("graphene", &mut orchestrator, &CancelSignal::never())
            .await;

        assert_eq!(outcome, ExportOutcome::default());
        search.assert_async().await;
        export.assert_async().await;
    }

    #[tokio::test]
    async fn test_failed_chunk_keeps_earlier_output() {
        let mut server = Server::new_async().await;
        mock_search(&mut server, 0, 250, eids(0..250)).await;
        mock_export(&mut server, "abc123_0_0", false, "sid:1", "header\nrow-a\n").await;
        server
            .mock("POST", EXPORT_PATH)
            .match_query(Matcher::UrlEncoded("batchId".into(), "abc123_0_1".into()))
            .with_status(500)
            .create_async()
            .await;

        let engine = engine(&server);
        let mut orchestrator = FetchOrchestrator::new("scopus_batch", Vec::new());
        let outcome = engine
            .export_all("graphene", &mut orchestrator, &CancelSignal::never())
            .await;

        assert_eq!(outcome.exported, 100);
        assert_eq!(outcome.raw, "header\nrow-a\n");
        let errors = orchestrator.into_errors();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("export batch abc123_0_1"));
    }

    #[tokio::test]
    async fn test_empty_research_stops() {
        let mut server = Server::new_async().await;
        mock_search(&mut server, 0, 300, eids(0..100)).await;
        mock_search(&mut server, 100, 300, Vec::new()).await;
        server
            .mock("POST", EXPORT_PATH)
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("rows\n")
            .expect(1)
            .create_async()
            .await;

        let engine = engine(&server);
        let mut orchestrator = FetchOrchestrator::new("scopus_batch", Vec::new());
        let outcome = engine
            .export_all("graphene", &mut orchestrator, &CancelSignal::never())
            .await;

        assert_eq!(outcome.exported, 100);
        assert!(orchestrator.errors().entries()[0].contains("returned no ids"));
    }

    #[tokio::test]
    async fn test_iteration_cap() {
        let mut server = Server::new_async().await;
        mock_search(&mut server, 0, 1000, eids(0..100)).await;
        server
            .mock("POST", EXPORT_PATH)
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("rows\n")
            .create_async()
            .await;

        let engine = engine(&server).max_iterations(1);
        let mut orchestrator = FetchOrchestrator::new("scopus_batch", Vec::new());
        let outcome = engine
            .export_all("graphene", &mut orchestrator, &CancelSignal::never())
            .await;

        assert_eq!(outcome.exported, 100);
        assert!(orchestrator.errors().entries()[0].contains("stopped after 1 id searches"));
    }

    #[tokio::test]
    async fn test_iteration_cap_on_completed_export_is_not_an_error() {
        let mut server = Server::new_async().await;
        let search = mock_search(&mut server, 0, 250, eids(0..250)).await;
        let c1 = mock_export(&mut server, "abc123_0_0", false, "sid:1", "header\nrow-a\n").await;
        let c2 = mock_export(&mut server, "abc123_0_1", true, "sid:2", "row-b\n").await;
        let c3 = mock_export(&mut server, "abc123_0_2", true, "sid:3", "row-c\n").await;

        let engine = engine(&server).max_iterations(1);
        let mut orchestrator = FetchOrchestrator::new("scopus_batch", Vec::new());
        let outcome = engine
            .export_all("graphene", &mut orchestrator, &CancelSignal::never())
            .await;

        assert_eq!(outcome.exported, 250);
        assert_eq!(outcome.total_found, 250);
        assert!(orchestrator.errors().is_empty(), "{:?}", orchestrator.errors());

        for mock in [search, c1, c2, c3] {
            mock.assert_async().await;
        }
    }
}
