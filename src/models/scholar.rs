//! Google Scholar listing, detail and merged entry models.

use serde::{Deserialize, Serialize};

/// Coarse entry scraped from a search result page
///
/// Title and author text on the listing page are frequently truncated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingEntry {
    /// Provider-assigned opaque id (`data-cid`)
    pub id: String,

    /// Possibly truncated title
    pub title: String,

    /// Possibly truncated author/venue line
    pub authors: String,

    /// Link to the result itself
    pub link: String,

    /// File-type hint such as `PDF` or `HTML`; empty when absent
    pub file_type: String,

    /// Absolute URI of the detail (BibTeX) resource
    pub detail_uri: String,
}

/// Enriched entry parsed from the per-result detail resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailEntry {
    /// Opaque id of the listing entry this detail belongs to
    pub id: String,

    /// Full title
    pub title: String,

    /// Full author string (`and`-separated)
    pub author: String,

    /// Entry kind (`article`, `inproceedings`, ...)
    pub entry_type: String,

    /// Citation key from the detail resource
    pub citation_key: String,

    pub year: Option<String>,

    /// Journal or other venue
    pub venue: Option<String>,

    pub organization: Option<String>,
}

/// One listing entry, enriched with its detail when one was found
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedEntry {
    pub id: String,
    pub link: String,
    pub file_type: String,
    pub detail_uri: String,

    pub title: String,
    pub authors: String,
    pub entry_type: Option<String>,
    pub citation_key: Option<String>,
    pub year: Option<String>,
    pub venue: Option<String>,
    pub organization: Option<String>,

    /// Whether descriptive fields came from a detail entry
    pub enriched: bool,
}

impl MergedEntry {
    /// Listing-only entry: truncated text kept, descriptive fields empty
    pub fn from_listing(listing: ListingEntry) -> Self {
        Self {
            id: listing.id,
            link: listing.link,
            file_type: listing.file_type,
            detail_uri: listing.detail_uri,
            title: listing.title,
            authors: listing.authors,
            entry_type: None,
            citation_key: None,
            year: None,
            venue: None,
            organization: None,
            enriched: false,
        }
    }

    /// Structural fields from the listing, descriptive fields from the detail
    pub fn enriched(listing: ListingEntry, detail: DetailEntry) -> Self {
        Self {
            id: listing.id,
            link: listing.link,
            file_type: listing.file_type,
            detail_uri: listing.detail_uri,
            title: detail.title,
            authors: detail.author,
            entry_type: Some(detail.entry_type),
            citation_key: Some(detail.citation_key),
            year: detail.year,
            venue: detail.venue,
            organization: detail.organization,
            enriched: true,
        }
    }
}
