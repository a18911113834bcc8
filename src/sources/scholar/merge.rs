//! Cross-reference listing entries with their detail entries.

use std::collections::{HashMap, VecDeque};

use crate::models::{DetailEntry, ListingEntry, MergedEntry};

/// Merge listing entries with detail entries by opaque id.
///
/// Produces exactly one entry per listing entry, in listing order. Each
/// detail entry is consumed at most once; when two listing entries share an
/// id, the first one takes the detail and the second stays listing-only.
pub fn merge_entries(listing: Vec<ListingEntry>, details: Vec<DetailEntry>) -> Vec<MergedEntry> {
    let mut pending: HashMap<String, VecDeque<DetailEntry>> = HashMap::new();
    for detail in details {
        pending.entry(detail.id.clone()).or_default().push_back(detail);
    }

    listing
        .into_iter()
        .map(|entry| match pending.get_mut(&entry.id).and_then(VecDeque::pop_front) {
            Some(detail) => MergedEntry::enriched(entry, detail),
            None => {
                tracing::debug!(id = %entry.id, "no detail entry, keeping listing fields");
                MergedEntry::from_listing(entry)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(id: &str) -> ListingEntry {
        ListingEntry {
            id: id.to_string(),
            title: format!("Truncated {}…", id),
            authors: "A Author…".to_string(),
            link: format!("https://example.org/{}", id),
            file_type: "PDF".to_string(),
            detail_uri: format!("https://scholar.google.com/scholar.bib?q=info:{}:", id),
        }
    }

    fn detail(id: &str) -> DetailEntry {
        DetailEntry {
            id: id.to_string(),
            title: format!("Full title {}", id),
            author: "Author, A and Author, B".to_string(),
            entry_type: "article".to_string(),
            citation_key: format!("key{}", id),
            year: Some("2020".to_string()),
            venue: Some("Journal".to_string()),
            organization: None,
        }
    }

    #[test]
    fn test_merge_keeps_listing_order() {
        let merged = merge_entries(
            vec![listing("a"), listing("b"), listing("c")],
            vec![detail("b"), detail("a")],
        );

        let ids: Vec<_> = merged.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert!(merged[0].enriched);
        assert!(merged[1].enriched);
        assert!(!merged[2].enriched);

        assert_eq!(merged[0].title, "Full title a");
        assert_eq!(merged[0].link, "https://example.org/a");
        assert_eq!(merged[2].title, "Truncated c…");
        assert_eq!(merged[2].year, None);
    }

    #[test]
    fn test_duplicate_listing_ids_consume_detail_once() {
        let merged = merge_entries(vec![listing("a"), listing("a")], vec![detail("a")]);
        assert_eq!(merged.len(), 2);
        assert!(merged[0].enriched);
        assert!(!merged[1].enriched);
    }

    #[test]
    fn test_unmatched_details_are_dropped() {
        let merged = merge_entries(vec![listing("a")], vec![detail("z")]);
        assert_eq!(merged.len(), 1);
        assert!(!merged[0].enriched);
    }
}
