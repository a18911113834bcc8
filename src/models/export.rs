//! Authenticated export provider models: credentials, id pages and export chunks.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Session cookies and bearer token for the authenticated export provider
///
/// Values are secrets: the `Debug` impl redacts them and they are never logged.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthMaterial {
    user_agent: String,
    jwt: String,
    session_id: String,
    awselb: String,
    session_uuid: String,
    cookie_domain: String,
}

impl AuthMaterial {
    pub const COOKIE_JWT: &'static str = "SCOPUS_JWT";
    pub const COOKIE_AWSELB: &'static str = "AWSELB";
    pub const COOKIE_SESSION_ID: &'static str = "SCSessionID";
    pub const COOKIE_SESSION_UUID: &'static str = "scopusSessionUUID";

    /// Default domain the JWT cookie is scoped to
    pub const DEFAULT_COOKIE_DOMAIN: &'static str = ".scopus.com";

    pub fn new(
        user_agent: impl Into<String>,
        jwt: impl Into<String>,
        session_id: impl Into<String>,
        awselb: impl Into<String>,
        session_uuid: impl Into<String>,
    ) -> Self {
        Self {
            user_agent: user_agent.into(),
            jwt: jwt.into(),
            session_id: session_id.into(),
            awselb: awselb.into(),
            session_uuid: session_uuid.into(),
            cookie_domain: Self::DEFAULT_COOKIE_DOMAIN.to_string(),
        }
    }

    /// Override the cookie domain
    pub fn cookie_domain(mut self, domain: impl Into<String>) -> Self {
        self.cookie_domain = domain.into();
        self
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Bearer JWT value (sensitive)
    pub fn jwt(&self) -> &str {
        &self.jwt
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn awselb(&self) -> &str {
        &self.awselb
    }

    pub fn session_uuid(&self) -> &str {
        &self.session_uuid
    }

    /// Whether a cookie scoped to `domain` belongs to this session.
    ///
    /// Leading dots are ignored on both sides; subdomains match.
    pub fn covers_domain(&self, domain: &str) -> bool {
        let own = self.cookie_domain.trim_start_matches('.').to_ascii_lowercase();
        let other = domain.trim_start_matches('.').to_ascii_lowercase();
        other == own || other.ends_with(&format!(".{}", own))
    }

    /// Value of the `Cookie` request header for this material
    pub fn cookie_header(&self) -> String {
        format!(
            "{}={}; {}={}; {}={}; at_check=true; {}={}",
            Self::COOKIE_SESSION_ID,
            self.session_id,
            Self::COOKIE_SESSION_UUID,
            self.session_uuid,
            Self::COOKIE_AWSELB,
            self.awselb,
            Self::COOKIE_JWT,
            self.jwt
        )
    }

    /// Replace the value of a known cookie. Returns false for unknown names.
    pub fn apply_cookie(&mut self, name: &str, value: &str) -> bool {
        let slot = match name {
            Self::COOKIE_JWT => &mut self.jwt,
            Self::COOKIE_AWSELB => &mut self.awselb,
            Self::COOKIE_SESSION_ID => &mut self.session_id,
            Self::COOKIE_SESSION_UUID => &mut self.session_uuid,
            _ => return false,
        };
        *slot = value.to_string();
        true
    }
}

impl fmt::Debug for AuthMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthMaterial")
            .field("user_agent", &self.user_agent)
            .field("jwt", &"[REDACTED]")
            .field("session_id", &"[REDACTED]")
            .field("awselb", &"[REDACTED]")
            .field("session_uuid", &"[REDACTED]")
            .field("cookie_domain", &self.cookie_domain)
            .finish()
    }
}

/// One page of document ids from the id search endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EidPage {
    /// Total number of matching documents, as declared by the provider
    pub total_found: usize,

    /// Document ids on this page
    pub eids: Vec<String>,
}

#[derive(Deserialize)]
struct EidSearchEnvelope {
    response: EidSearchBody,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EidSearchBody {
    num_found: usize,
    #[serde(default)]
    docs: Vec<String>,
}

impl<'de> Deserialize<'de> for EidPage {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let envelope = EidSearchEnvelope::deserialize(deserializer)?;
        Ok(Self {
            total_found: envelope.response.num_found,
            eids: envelope.response.docs,
        })
    }
}

/// Export file format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExportFileType {
    Csv,
    Ris,
    Bib,
}

/// Field groups that can be requested from the export endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldGroup {
    Authors,
    Title,
    Year,
    Eid,
    SourceTitle,
    VolumeIssuePages,
    CitedBy,
    Source,
    DocumentType,
    PublicationStage,
    Doi,
    AccessType,
    Affiliations,
    SerialIdentifiers,
    PubmedId,
    Publisher,
    Editors,
    Language,
    CorrespondenceAddress,
    AbbreviatedSourceTitle,
    Abstract,
    AuthorKeywords,
    IndexKeywords,
    FundingDetails,
    FundingText,
    TradenamesManufacturers,
    AccessionNumbersChemicals,
    Conference,
    IncludeReferences,
}

impl FieldGroup {
    /// Every field group; requesting all of them yields the full column schema
    pub fn all() -> Vec<FieldGroup> {
        use FieldGroup::*;
        vec![
            Authors,
            Title,
            Year,
            Eid,
            SourceTitle,
            VolumeIssuePages,
            CitedBy,
            Source,
            DocumentType,
            PublicationStage,
            Doi,
            AccessType,
            Affiliations,
            SerialIdentifiers,
            PubmedId,
            Publisher,
            Editors,
            Language,
            CorrespondenceAddress,
            AbbreviatedSourceTitle,
            Abstract,
            AuthorKeywords,
            IndexKeywords,
            FundingDetails,
            FundingText,
            TradenamesManufacturers,
            AccessionNumbersChemicals,
            Conference,
            IncludeReferences,
        ]
    }
}

/// One export request worth of ids
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportChunk {
    /// Groups all chunks of one export run
    pub batch_id: String,

    /// At most the provider's per-export limit
    pub eids: Vec<String>,

    pub fields: Vec<FieldGroup>,

    /// Per-session transaction sequence number
    pub transaction: u64,

    /// Suppress column headers (every chunk after the first)
    pub hide_headers: bool,

    /// Total documents in the export run, echoed back to the provider
    pub total_docs: usize,
}
