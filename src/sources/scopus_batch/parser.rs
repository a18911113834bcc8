//! CSV export parsing against the fixed column schema.

use csv::{ReaderBuilder, StringRecord};

use crate::models::{ExportPublication, EXPORT_COLUMNS};
use crate::sources::SourceError;

fn split_cell(cell: &str) -> Vec<String> {
    if cell.is_empty() {
        return Vec::new();
    }
    cell.split(';').map(|v| v.trim().to_string()).collect()
}

fn check_header(header: &StringRecord) -> Result<(), SourceError> {
    let actual: Vec<&str> = header.iter().collect();
    if actual == EXPORT_COLUMNS {
        return Ok(());
    }

    let first_difference = EXPORT_COLUMNS
        .iter()
        .zip(actual.iter())
        .position(|(expected, actual)| expected != actual);
    let detail = match first_difference {
        Some(i) => format!(
            "column {} is {:?}, expected {:?}",
            i + 1,
            actual[i],
            EXPORT_COLUMNS[i]
        ),
        None => format!(
            "{} columns, expected {}",
            actual.len(),
            EXPORT_COLUMNS.len()
        ),
    };
    Err(SourceError::SchemaMismatch(detail))
}

/// Parse exported CSV text into publications.
///
/// The header must match the expected columns exactly; otherwise column
/// positions are unknown and nothing is parsed.
pub fn parse_export(raw: &str) -> Result<Vec<ExportPublication>, SourceError> {
    let text = raw.strip_prefix('\u{feff}').unwrap_or(raw);
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_reader(text.as_bytes());

    check_header(reader.headers()?)?;

    let mut publications = Vec::new();
    for record in reader.records() {
        let record = record?;
        let cell = |i: usize| record.get(i).unwrap_or_default().to_string();

        publications.push(ExportPublication {
            authors: split_cell(record.get(1).unwrap_or_default()),
            title: cell(3),
            year: cell(4),
            source_title: cell(5),
            volume: cell(6),
            issue: cell(7),
            article_number: cell(8),
            page_start: cell(9),
            page_end: cell(10),
            page_count: cell(11),
            cited_by: cell(12),
            doi: cell(13),
            link: cell(14),
            affiliations: split_cell(record.get(15).unwrap_or_default()),
            r#abstract: cell(17),
            author_keywords: split_cell(record.get(18).unwrap_or_default()),
            index_keywords: split_cell(record.get(19).unwrap_or_default()),
            tradenames: split_cell(record.get(22).unwrap_or_default()),
            manufacturers: split_cell(record.get(23).unwrap_or_default()),
            funding_details: cell(24),
            funding_texts: cell(25),
            references: cell(26),
            correspondence_address: cell(27),
            editors: split_cell(record.get(28).unwrap_or_default()),
            publisher: cell(29),
            sponsors: split_cell(record.get(30).unwrap_or_default()),
            issn: cell(35),
            isbn: cell(36),
            coden: cell(37),
            pubmed_id: cell(38),
            language_of_original_document: cell(39),
            abbreviated_source_title: cell(40),
            document_type: cell(41),
            publication_stage: cell(42),
            open_access: split_cell(record.get(43).unwrap_or_default()),
            source: cell(44),
            eid: cell(45),
        });
    }

    tracing::info!(count = publications.len(), "parsed exported publications");
    Ok(publications)
}
