//! REST search provider models.

use serde::{Deserialize, Serialize};

/// One entry of the REST search provider
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchEntry {
    #[serde(default)]
    pub eid: Option<String>,

    #[serde(rename = "dc:title", default)]
    pub title: Option<String>,

    #[serde(rename = "dc:creator", default)]
    pub creator: Option<String>,

    #[serde(rename = "dc:description", default)]
    pub description: Option<String>,

    #[serde(rename = "prism:publicationName", default)]
    pub publication_name: Option<String>,

    #[serde(rename = "prism:issn", default)]
    pub issn: Option<String>,

    #[serde(rename = "prism:volume", default)]
    pub volume: Option<String>,

    #[serde(rename = "prism:issueIdentifier", default)]
    pub issue: Option<String>,

    #[serde(rename = "prism:pageRange", default)]
    pub page_range: Option<String>,

    #[serde(rename = "prism:coverDate", default)]
    pub cover_date: Option<String>,

    #[serde(rename = "prism:doi", default)]
    pub doi: Option<String>,

    #[serde(rename = "citedby-count", default)]
    pub cited_by_count: Option<String>,

    #[serde(rename = "subtypeDescription", default)]
    pub subtype_description: Option<String>,

    /// Author keywords, ` | `-separated on the wire
    #[serde(default)]
    pub authkeywords: Option<String>,
}

/// One page of REST search results
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResults {
    pub total_results: usize,
    pub start_index: usize,
    pub items_per_page: usize,
    pub entries: Vec<SearchEntry>,
}

#[derive(Deserialize)]
struct SearchEnvelope {
    #[serde(rename = "search-results")]
    results: SearchBody,
}

#[derive(Deserialize)]
struct SearchBody {
    #[serde(rename = "opensearch:totalResults")]
    total_results: String,
    #[serde(rename = "opensearch:startIndex")]
    start_index: String,
    #[serde(rename = "opensearch:itemsPerPage")]
    items_per_page: String,
    #[serde(default)]
    entry: Vec<SearchEntry>,
}

impl SearchResults {
    /// Parse a response body.
    ///
    /// An empty result set comes back as a single entry carrying only an
    /// `error` field; entries without an `eid` are dropped.
    pub fn from_json(body: &str) -> Result<Self, String> {
        let envelope: SearchEnvelope =
            serde_json::from_str(body).map_err(|e| format!("JSON: {}", e))?;
        let body = envelope.results;

        let number = |field: &str, value: &str| {
            value
                .trim()
                .parse::<usize>()
                .map_err(|e| format!("{} is not a number ({:?}): {}", field, value, e))
        };

        Ok(Self {
            total_results: number("totalResults", &body.total_results)?,
            start_index: number("startIndex", &body.start_index)?,
            items_per_page: number("itemsPerPage", &body.items_per_page)?,
            entries: body.entry.into_iter().filter(|e| e.eid.is_some()).collect(),
        })
    }
}
