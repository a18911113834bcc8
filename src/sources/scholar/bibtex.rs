//! Minimal BibTeX reader for per-result citation files.
//!
//! Only the first entry is read. Field values may be brace-delimited (with
//! nesting), quoted, or bare; inner braces are dropped and whitespace is
//! collapsed.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::models::DetailEntry;

#[allow(clippy::expect_used)]
static ENTRY_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"@(\w+)\s*\{\s*([^,\s]*)\s*,").expect("BibTeX header regex is valid") // Static pattern
});

/// One parsed BibTeX entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BibEntry {
    pub entry_type: String,
    pub key: String,
    pub fields: HashMap<String, String>,
}

impl BibEntry {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    fn optional(&self, name: &str) -> Option<String> {
        self.field(name).filter(|v| !v.is_empty()).map(str::to_string)
    }

    /// Convert into a detail entry correlated with listing id `id`
    pub fn into_detail(self, id: &str) -> DetailEntry {
        DetailEntry {
            id: id.to_string(),
            title: self.field("title").unwrap_or_default().to_string(),
            author: self.field("author").unwrap_or_default().to_string(),
            year: self.optional("year"),
            venue: self.optional("journal"),
            organization: self.optional("organization"),
            entry_type: self.entry_type,
            citation_key: self.key,
        }
    }
}

/// Parse the first entry of a BibTeX document, `None` when there is none
pub fn parse_first_entry(text: &str) -> Option<BibEntry> {
    let captures = ENTRY_HEADER.captures(text)?;
    let entry_type = captures.get(1)?.as_str().to_ascii_lowercase();
    let key = captures.get(2)?.as_str().to_string();
    let body = &text[captures.get(0)?.end()..];

    Some(BibEntry {
        entry_type,
        key,
        fields: parse_fields(body),
    })
}

fn parse_fields(body: &str) -> HashMap<String, String> {
    let bytes = body.as_bytes();
    let mut fields = HashMap::new();
    let mut i = 0;

    loop {
        while i < bytes.len() && (bytes[i].is_ascii_whitespace() || bytes[i] == b',') {
            i += 1;
        }
        if i >= bytes.len() || bytes[i] == b'}' {
            break;
        }

        let name_start = i;
        while i < bytes.len()
            && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_' || bytes[i] == b'-')
        {
            i += 1;
        }
        if i == name_start {
            break;
        }
        let name = body[name_start..i].to_ascii_lowercase();

        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() || bytes[i] != b'=' {
            break;
        }
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }

        let Some((start, end, next)) = read_value(bytes, i) else {
            break;
        };
        fields.insert(name, normalize(&body[start..end]));
        i = next;
    }

    fields
}

/// Locate one value starting at `i`: returns (start, end, resume position)
fn read_value(bytes: &[u8], i: usize) -> Option<(usize, usize, usize)> {
    match *bytes.get(i)? {
        b'{' => {
            let mut depth = 0usize;
            for (j, &b) in bytes.iter().enumerate().skip(i) {
                match b {
                    b'{' => depth += 1,
                    b'}' => {
                        depth -= 1;
                        if depth == 0 {
                            return Some((i + 1, j, j + 1));
                        }
                    }
                    _ => {}
                }
            }
            None
        }
        b'"' => {
            let mut depth = 0usize;
            let mut j = i + 1;
            while j < bytes.len() {
                match bytes[j] {
                    b'{' => depth += 1,
                    b'}' => depth = depth.saturating_sub(1),
                    b'\\' => j += 1,
                    b'"' if depth == 0 => return Some((i + 1, j, j + 1)),
                    _ => {}
                }
                j += 1;
            }
            None
        }
        _ => {
            let end = bytes[i..]
                .iter()
                .position(|&b| b == b',' || b == b'}' || b.is_ascii_whitespace())
                .map(|p| i + p)
                .unwrap_or(bytes.len());
            Some((i, end, end))
        }
    }
}

fn normalize(value: &str) -> String {
    value
        .replace(['{', '}'], "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARTICLE: &str = r#"@article{novoselov2004electric,
  title={Electric field effect in atomically thin carbon films},
  author={Novoselov, Kostya S and Geim, Andre K and Morozov, Sergei V},
  journal={science},
  volume={306},
  number={5696},
  pages={666--669},
  year={2004},
  publisher={American Association for the Advancement of Science}
}
"#;

    #[test]
    fn test_parse_article() {
        let entry = parse_first_entry(ARTICLE).unwrap();
        assert_eq!(entry.entry_type, "article");
        assert_eq!(entry.key, "novoselov2004electric");
        assert_eq!(
            entry.field("title"),
            Some("Electric field effect in atomically thin carbon films")
        );
        assert_eq!(entry.field("year"), Some("2004"));
        assert_eq!(entry.field("pages"), Some("666--669"));

        let detail = entry.into_detail("cid42");
        assert_eq!(detail.id, "cid42");
        assert_eq!(detail.venue.as_deref(), Some("science"));
        assert_eq!(detail.organization, None);
        assert!(detail.author.starts_with("Novoselov, Kostya S and"));
    }

    #[test]
    fn test_nested_braces_quotes_and_bare_values() {
        let text = r#"@InProceedings{key1, title = "A {GPU} study of {\"U}ber",
            year = 2020, organization={IEEE {Computer} Society}}"#;
        let entry = parse_first_entry(text).unwrap();
        assert_eq!(entry.entry_type, "inproceedings");
        assert_eq!(entry.field("title"), Some(r#"A GPU study of \"Uber"#));
        assert_eq!(entry.field("year"), Some("2020"));
        assert_eq!(entry.field("organization"), Some("IEEE Computer Society"));
    }

    #[test]
    fn test_no_entry() {
        assert!(parse_first_entry("").is_none());
        assert!(parse_first_entry("<html>not bibtex</html>").is_none());
    }

    #[test]
    fn test_repeated_parses_share_header_pattern() {
        let keys: Vec<_> = (0..50)
            .map(|i| format!("@book{{key{}, title={{Book {}}}}}", i, i))
            .map(|text| parse_first_entry(&text).unwrap().key)
            .collect();
        assert_eq!(keys.first().map(String::as_str), Some("key0"));
        assert_eq!(keys.last().map(String::as_str), Some("key49"));
        assert!(ENTRY_HEADER.is_match("@misc{k,"));
    }

    #[test]
    fn test_truncated_entry_keeps_complete_fields() {
        let entry = parse_first_entry("@misc{k, title={Kept}, note={never closed").unwrap();
        assert_eq!(entry.field("title"), Some("Kept"));
        assert_eq!(entry.field("note"), None);
    }
}
