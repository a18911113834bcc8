//! HTML extraction for the Scholar search surface.

use reqwest::StatusCode;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::models::ListingEntry;
use crate::sources::SourceError;

/// Anchor text of the per-result citation link enabled by the preferences
const BIBTEX_LINK_TEXT: &str = "Import into BibTeX";

/// Forms served instead of results when automation is suspected
const CAPTCHA_FORMS: &str = "form#gs_captcha_f, form#captcha-form";

/// Outcome of inspecting a response for anti-automation markers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Ok,
    Challenged(String),
}

fn selector(css: &str) -> Result<Selector, SourceError> {
    Selector::parse(css).map_err(|e| SourceError::Parse(format!("selector {:?}: {}", css, e)))
}

fn text_of(element: &ElementRef) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Classify a response as challenged or ok.
///
/// HTTP 403 and a CAPTCHA form in the body both count as a challenge.
pub fn classify(status: StatusCode, body: &str) -> Verdict {
    if status == StatusCode::FORBIDDEN {
        return Verdict::Challenged(format!("status {}", status));
    }
    if body.contains("captcha") || body.contains("gs_captcha") {
        let document = Html::parse_document(body);
        if let Ok(forms) = Selector::parse(CAPTCHA_FORMS) {
            if document.select(&forms).next().is_some() {
                return Verdict::Challenged("CAPTCHA form in response".to_string());
            }
        }
    }
    Verdict::Ok
}

/// Hidden values of the settings form needed to save preferences
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsForm {
    pub scisig: String,
    pub inst: String,
}

/// Extract `scisig` and the library-links `inst` value from the settings page
pub fn parse_settings_form(html: &str) -> Result<SettingsForm, SourceError> {
    let document = Html::parse_document(html);

    let scisig = document
        .select(&selector("form#gs_bdy_frm input[name=scisig]")?)
        .next()
        .and_then(|input| input.value().attr("value"))
        .map(str::to_string)
        .ok_or_else(|| SourceError::Parse("settings form has no scisig".to_string()))?;

    let inst = document
        .select(&selector("#gs_settings_liblinks_lst input[name=inst]")?)
        .next()
        .and_then(|input| input.value().attr("value"))
        .unwrap_or_default()
        .to_string();

    Ok(SettingsForm { scisig, inst })
}

/// Parse the result blocks of a search page.
///
/// Every result must carry a BibTeX link; its absence means the session
/// preferences were not applied and the page is rejected.
pub fn parse_listing(html: &str, base: &Url) -> Result<Vec<ListingEntry>, SourceError> {
    let document = Html::parse_document(html);

    let result_sel = selector(".gs_r.gs_or.gs_scl[data-cid]")?;
    let title_sel = selector(".gs_rt a")?;
    let title_block_sel = selector(".gs_rt")?;
    let authors_sel = selector(".gs_a")?;
    let file_type_sel = selector(".gs_ctc")?;
    let bibtex_sel = selector("a.gs_nta.gs_nph")?;

    let mut entries = Vec::new();
    for result in document.select(&result_sel) {
        let Some(id) = result.value().attr("data-cid") else {
            continue;
        };

        let title_link = result.select(&title_sel).next();
        let title = match title_link {
            Some(link) => text_of(&link),
            // Citation-only results have no link, just text
            None => result
                .select(&title_block_sel)
                .next()
                .map(|block| text_of(&block))
                .unwrap_or_default(),
        };
        let link = title_link
            .and_then(|a| a.value().attr("href"))
            .unwrap_or_default()
            .to_string();

        let authors = result
            .select(&authors_sel)
            .next()
            .map(|a| text_of(&a))
            .unwrap_or_default();

        // The first child holds the visible hint; a hidden duplicate follows it
        let file_type = result
            .select(&file_type_sel)
            .next()
            .and_then(|block| block.children().find_map(ElementRef::wrap))
            .map(|hint| {
                text_of(&hint)
                    .trim_matches(|c| c == '[' || c == ']')
                    .to_string()
            })
            .unwrap_or_default();

        let bibtex_href = result
            .select(&bibtex_sel)
            .find(|a| text_of(a) == BIBTEX_LINK_TEXT)
            .and_then(|a| a.value().attr("href"))
            .ok_or_else(|| {
                SourceError::Parse(format!(
                    "result {} has no BibTeX link; citation preferences not applied",
                    id
                ))
            })?;
        let detail_uri = base.join(bibtex_href)?.to_string();

        entries.push(ListingEntry {
            id: id.to_string(),
            title,
            authors,
            link,
            file_type,
            detail_uri,
        });
    }

    Ok(entries)
}
