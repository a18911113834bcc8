//! Publication rows parsed from the batch export payload.

use serde::{Deserialize, Serialize};

/// Header row the export payload must carry, in this exact order
pub const EXPORT_COLUMNS: [&str; 46] = [
    "Authors",
    "Author full names",
    "Author(s) ID",
    "Title",
    "Year",
    "Source title",
    "Volume",
    "Issue",
    "Art. No.",
    "Page start",
    "Page end",
    "Page count",
    "Cited by",
    "DOI",
    "Link",
    "Affiliations",
    "Authors with affiliations",
    "Abstract",
    "Author Keywords",
    "Index Keywords",
    "Molecular Sequence Numbers",
    "Chemicals/CAS",
    "Tradenames",
    "Manufacturers",
    "Funding Details",
    "Funding Texts",
    "References",
    "Correspondence Address",
    "Editors",
    "Publisher",
    "Sponsors",
    "Conference name",
    "Conference date",
    "Conference location",
    "Conference code",
    "ISSN",
    "ISBN",
    "CODEN",
    "PubMed ID",
    "Language of Original Document",
    "Abbreviated Source Title",
    "Document Type",
    "Publication Stage",
    "Open Access",
    "Source",
    "EID",
];

/// One exported publication
///
/// Multi-valued cells are split on `;` into lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportPublication {
    pub eid: String,
    pub title: String,
    pub year: String,
    pub source_title: String,
    pub volume: String,
    pub issue: String,
    pub article_number: String,
    pub page_start: String,
    pub page_end: String,
    pub page_count: String,
    pub cited_by: String,
    pub doi: String,
    pub link: String,
    pub r#abstract: String,
    pub funding_details: String,
    pub funding_texts: String,
    pub references: String,
    pub correspondence_address: String,
    pub publisher: String,
    pub issn: String,
    pub isbn: String,
    pub coden: String,
    pub pubmed_id: String,
    pub language_of_original_document: String,
    pub abbreviated_source_title: String,
    pub document_type: String,
    pub publication_stage: String,
    pub source: String,

    pub authors: Vec<String>,
    pub affiliations: Vec<String>,
    pub author_keywords: Vec<String>,
    pub index_keywords: Vec<String>,
    pub tradenames: Vec<String>,
    pub manufacturers: Vec<String>,
    pub editors: Vec<String>,
    pub sponsors: Vec<String>,
    pub open_access: Vec<String>,
}
