//! Integration tests for bibliofetch
//!
//! These tests drive the public fetchers end to end against local mock servers.

use bibliofetch::models::FetchPayload;
use bibliofetch::sources::{ScholarFetcher, ScopusApiFetcher, ScopusBatchFetcher};
use bibliofetch::{CancelSignal, FetchRequest, Fetcher, FetcherRegistry};
use mockito::{Matcher, Server, ServerGuard};
use serde_json::json;

const SETTINGS_PAGE: &str = r#"<html><body>
    <form id="gs_bdy_frm" action="/scholar_setprefs">
      <input type="hidden" name="scisig" value="sig-123">
    </form>
</body></html>"#;

fn result_block(id: &str, title: &str) -> String {
    format!(
        r#"<div class="gs_r gs_or gs_scl" data-cid="{id}">
             <div class="gs_ri">
               <h3 class="gs_rt"><a href="https://example.org/{id}">{title}</a></h3>
               <div class="gs_a">J Doe - Example Journal, 2020 - example.org</div>
               <a class="gs_nta gs_nph" href="/scholar.bib?q=info:{id}:scholar.google.com/&amp;output=citation">Import into BibTeX</a>
             </div>
           </div>"#
    )
}

async fn mock_scholar(server: &mut ServerGuard) {
    server
        .mock("GET", "/")
        .with_status(200)
        .with_body("<html></html>")
        .create_async()
        .await;
    server
        .mock("GET", "/scholar_settings")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(SETTINGS_PAGE)
        .create_async()
        .await;
    server
        .mock("GET", "/scholar_setprefs")
        .match_query(Matcher::UrlEncoded("scisig".into(), "sig-123".into()))
        .with_status(200)
        .create_async()
        .await;

    let page = format!(
        "<html><body>{}{}</body></html>",
        result_block("aaa", "Graphene transistors"),
        result_block("bbb", "Graphene sensors")
    );
    server
        .mock("GET", "/scholar")
        .match_query(Matcher::UrlEncoded("start".into(), "0".into()))
        .with_status(200)
        .with_body(page)
        .expect(1)
        .create_async()
        .await;
    server
        .mock("GET", "/scholar")
        .match_query(Matcher::UrlEncoded("start".into(), "10".into()))
        .with_status(200)
        .with_body("<html><body></body></html>")
        .expect(1)
        .create_async()
        .await;

    server
        .mock("GET", "/scholar.bib")
        .match_query(Matcher::UrlEncoded(
            "q".into(),
            "info:aaa:scholar.google.com/".into(),
        ))
        .with_status(200)
        .with_body("@article{doe2020graphene,\n  title={Graphene transistors},\n  author={Doe, Jane},\n  journal={Example Journal},\n  year={2020}\n}")
        .create_async()
        .await;
    server
        .mock("GET", "/scholar.bib")
        .match_query(Matcher::UrlEncoded(
            "q".into(),
            "info:bbb:scholar.google.com/".into(),
        ))
        .with_status(404)
        .create_async()
        .await;
}

#[tokio::test]
async fn test_scholar_end_to_end() {
    let mut server = Server::new_async().await;
    mock_scholar(&mut server).await;

    let result = ScholarFetcher::new()
        .base_uri(server.url())
        .fetch(&FetchRequest::new("graphene"), CancelSignal::never())
        .await;

    assert_eq!(result.module, "scholar");
    assert!(!result.has_errors(), "{:?}", result.errors);
    match result.payload {
        FetchPayload::Scholar(entries) => {
            assert_eq!(entries.len(), 2);
            assert_eq!(entries[0].id, "aaa");
            assert!(entries[0].enriched);
            assert_eq!(entries[0].citation_key.as_deref(), Some("doe2020graphene"));
            assert_eq!(entries[0].venue.as_deref(), Some("Example Journal"));
            assert_eq!(entries[1].id, "bbb");
            assert!(!entries[1].enriched);
        }
        other => panic!("unexpected payload: {:?}", other),
    }
}

#[tokio::test]
async fn test_scholar_captcha_without_proxies() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/")
        .with_status(200)
        .with_body(r#"<html><form id="gs_captcha_f"></form></html>"#)
        .create_async()
        .await;

    let result = ScholarFetcher::new()
        .base_uri(server.url())
        .fetch(&FetchRequest::new("graphene"), CancelSignal::never())
        .await;

    assert!(result.payload.is_empty());
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].contains("Proxy pool exhausted"));
}

#[tokio::test]
async fn test_registry_runs_providers_independently() {
    let mut scholar = Server::new_async().await;
    mock_scholar(&mut scholar).await;

    let mut api = Server::new_async().await;
    api.mock("GET", "/content/search/scopus")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(
            json!({
                "search-results": {
                    "opensearch:totalResults": "1",
                    "opensearch:startIndex": "0",
                    "opensearch:itemsPerPage": "1",
                    "entry": [{ "eid": "2-s2.0-42", "dc:title": "Graphene" }]
                }
            })
            .to_string(),
        )
        .create_async()
        .await;

    let registry = FetcherRegistry::new()
        .with(ScholarFetcher::new().base_uri(scholar.url()))
        // no cookie file: fails on its own without touching the others
        .with(ScopusBatchFetcher::new().base_uri("http://127.0.0.1:9"))
        .with(ScopusApiFetcher::new().base_uri(api.url()).api_key("key"));

    let results = registry
        .run_all(&FetchRequest::new("graphene"), CancelSignal::never())
        .await;

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].payload.len(), 2);
    assert!(!results[0].has_errors());

    assert_eq!(results[1].module, "scopus_batch");
    assert!(results[1].has_errors());

    assert_eq!(results[2].payload.len(), 1);
    assert!(!results[2].has_errors());
}

#[tokio::test]
async fn test_cancelled_before_start_returns_partial_result() {
    let (tx, cancel) = CancelSignal::channel();
    tx.send(true).unwrap();

    let registry = FetcherRegistry::new().with(ScholarFetcher::new().base_uri("http://127.0.0.1:9"));
    let results = registry
        .run_all(&FetchRequest::new("graphene"), cancel)
        .await;

    assert!(results[0].payload.is_empty());
    assert!(results[0].errors[0].contains("Cancelled"));
}
