use std::fmt;

use camino::Utf8PathBuf;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputRecord {
    pub reference_id: String,
    pub cross_ref: CrossRef,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrossRef {
    Id(String),
    Missing,
}

impl CrossRef {
    pub fn parse(field: &str) -> Self {
        let trimmed = field.trim();
        let lowered = trimmed.to_ascii_lowercase();
        if trimmed.is_empty() || matches!(lowered.as_str(), "missing" | "na" | "-") {
            return CrossRef::Missing;
        }
        CrossRef::Id(trimmed.to_string())
    }

    pub fn as_id(&self) -> Option<&str> {
        match self {
            CrossRef::Id(value) => Some(value),
            CrossRef::Missing => None,
        }
    }
}

/// Ordered candidate identifiers for a raw cross-reference token: the
/// uppercased token first, then the isoform-stripped base when a trailing
/// `-<digits>` suffix is present. The isoform-specific id must be tried
/// before the base id.
pub fn candidates(raw: &str) -> Vec<String> {
    let upper = raw.trim().to_uppercase();
    if upper.is_empty() {
        return Vec::new();
    }
    let mut out = vec![upper.clone()];
    if let Some(base) = strip_isoform_suffix(&upper) {
        if base != upper {
            out.push(base.to_string());
        }
    }
    out
}

fn strip_isoform_suffix(id: &str) -> Option<&str> {
    let (base, suffix) = id.rsplit_once('-')?;
    if base.is_empty() || suffix.is_empty() {
        return None;
    }
    if suffix.chars().all(|ch| ch.is_ascii_digit()) {
        return Some(base);
    }
    None
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Mechanism {
    #[serde(rename = "files")]
    StaticFiles,
    #[serde(rename = "api")]
    PredictionApi,
    #[serde(rename = "html")]
    EntryPage,
    #[serde(rename = "swiss-model")]
    SwissModel,
}

impl fmt::Display for Mechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mechanism::StaticFiles => write!(f, "files"),
            Mechanism::PredictionApi => write!(f, "api"),
            Mechanism::EntryPage => write!(f, "html"),
            Mechanism::SwissModel => write!(f, "swiss-model"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedArtifact {
    pub source_id: String,
    pub mechanism: Mechanism,
    pub primary_file: Utf8PathBuf,
    pub auxiliary_files: Vec<Utf8PathBuf>,
}

#[derive(Debug, Clone)]
pub enum FetchOutcome {
    Resolved(ResolvedArtifact),
    Skipped,
    Exhausted,
}
