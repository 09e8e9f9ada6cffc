use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use serde::Deserialize;

use crate::domain::{Mechanism, ResolvedArtifact};
use crate::error::HarvestError;
use crate::http::HttpTransport;

const FILES_BASE: &str = "https://alphafold.ebi.ac.uk/files";
const API_BASE: &str = "https://alphafold.ebi.ac.uk/api";
const ENTRY_BASE: &str = "https://alphafold.ebi.ac.uk/entry";

/// Model format versions, newest first.
pub const MODEL_VERSIONS: [&str; 3] = ["v6", "v5", "v4"];
/// Multimer fragment indices probed per version.
pub const MAX_FRAGMENTS: u32 = 5;

#[derive(Debug, Deserialize)]
struct PredictionEntry {
    #[serde(rename = "pdbUrl")]
    pdb_url: Option<String>,
    #[serde(rename = "paeDocUrl")]
    pae_doc_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    docs: Vec<SearchDoc>,
}

#[derive(Debug, Deserialize)]
struct SearchDoc {
    #[serde(rename = "uniprotAccession")]
    uniprot_accession: Option<String>,
}

pub struct AlphaFoldClient<T: HttpTransport> {
    transport: T,
}

impl<T: HttpTransport> AlphaFoldClient<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Tries the three retrieval mechanisms in priority order for one
    /// candidate, stopping at the first that yields a structure URL. A
    /// failed download after a successful probe/API/scrape step fails the
    /// candidate outright; the remaining mechanisms are not consulted.
    pub fn resolve(
        &self,
        reference_id: &str,
        candidate: &str,
        out_dir: &Utf8Path,
    ) -> Result<Option<ResolvedArtifact>, HarvestError> {
        tracing::info!(
            record = reference_id,
            candidate,
            stage = "alphafold",
            "attempt"
        );

        if let Some((model_url, confidence_url)) = self.probe_static_files(candidate)? {
            return self.save(
                reference_id,
                candidate,
                Mechanism::StaticFiles,
                &model_url,
                confidence_url.as_deref(),
                out_dir,
            );
        }
        tracing::debug!(record = reference_id, candidate, mechanism = "files", outcome = "miss");

        if let Some((model_url, confidence_url)) = self.query_prediction_api(candidate)? {
            return self.save(
                reference_id,
                candidate,
                Mechanism::PredictionApi,
                &model_url,
                confidence_url.as_deref(),
                out_dir,
            );
        }
        tracing::debug!(record = reference_id, candidate, mechanism = "api", outcome = "miss");

        if let Some((model_url, confidence_url)) = self.scrape_entry_page(candidate)? {
            return self.save(
                reference_id,
                candidate,
                Mechanism::EntryPage,
                &model_url,
                confidence_url.as_deref(),
                out_dir,
            );
        }
        tracing::debug!(record = reference_id, candidate, mechanism = "html", outcome = "miss");

        tracing::info!(
            record = reference_id,
            candidate,
            stage = "alphafold",
            outcome = "miss"
        );
        Ok(None)
    }

    /// Full-text search mapping: recovers a canonical accession when the
    /// input token is valid but not the exact string AlphaFold indexes.
    pub fn search_accession(&self, query: &str) -> Result<Option<String>, HarvestError> {
        let url = format!("{API_BASE}/search?q={query}&type=main&start=0&rows=1");
        let value = match self.transport.get_json(&url) {
            Ok(Some(value)) => value,
            Ok(None) => return Ok(None),
            Err(err) if err.is_recoverable() => {
                tracing::warn!(query, error = %err, "search mapping failed");
                return Ok(None);
            }
            Err(err) => return Err(err),
        };
        let response: SearchResponse = match serde_json::from_value(value) {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(query, error = %err, "unexpected search payload");
                return Ok(None);
            }
        };
        Ok(response
            .docs
            .into_iter()
            .find_map(|doc| doc.uniprot_accession))
    }

    fn probe_static_files(
        &self,
        candidate: &str,
    ) -> Result<Option<(String, Option<String>)>, HarvestError> {
        for version in MODEL_VERSIONS {
            for fragment in 1..=MAX_FRAGMENTS {
                let url = model_url(candidate, fragment, version);
                if self.transport.exists(&url)? {
                    let confidence = confidence_url(candidate, fragment, version);
                    return Ok(Some((url, Some(confidence))));
                }
            }
        }
        Ok(None)
    }

    fn query_prediction_api(
        &self,
        candidate: &str,
    ) -> Result<Option<(String, Option<String>)>, HarvestError> {
        let url = format!("{API_BASE}/prediction/{candidate}");
        let value = match self.transport.get_json(&url) {
            Ok(Some(value)) => value,
            Ok(None) => return Ok(None),
            Err(err) if err.is_recoverable() => {
                tracing::warn!(candidate, error = %err, "prediction api failed");
                return Ok(None);
            }
            Err(err) => return Err(err),
        };
        let entries: Vec<PredictionEntry> = match serde_json::from_value(value) {
            Ok(entries) => entries,
            Err(err) => {
                tracing::warn!(candidate, error = %err, "unexpected prediction payload");
                return Ok(None);
            }
        };
        let Some(entry) = entries.into_iter().next() else {
            return Ok(None);
        };
        let Some(pdb_url) = entry.pdb_url else {
            return Ok(None);
        };
        Ok(Some((pdb_url, entry.pae_doc_url)))
    }

    fn scrape_entry_page(
        &self,
        candidate: &str,
    ) -> Result<Option<(String, Option<String>)>, HarvestError> {
        let url = format!("{ENTRY_BASE}/{candidate}");
        let page = match self.transport.get_text(&url) {
            Ok(Some(page)) => page,
            Ok(None) => return Ok(None),
            Err(err) if err.is_recoverable() => {
                tracing::warn!(candidate, error = %err, "entry page fetch failed");
                return Ok(None);
            }
            Err(err) => return Err(err),
        };
        let Some(model) = extract_model_url(&page) else {
            return Ok(None);
        };
        Ok(Some((model, extract_confidence_url(&page))))
    }

    fn save(
        &self,
        reference_id: &str,
        candidate: &str,
        mechanism: Mechanism,
        model_url: &str,
        confidence_url: Option<&str>,
        out_dir: &Utf8Path,
    ) -> Result<Option<ResolvedArtifact>, HarvestError> {
        let Some(primary) = output_path(out_dir, reference_id, model_url) else {
            tracing::warn!(
                record = reference_id,
                candidate,
                url = model_url,
                "structure url has no basename"
            );
            return Ok(None);
        };
        if !self.transport.download(model_url, &primary)? {
            tracing::warn!(
                record = reference_id,
                candidate,
                mechanism = %mechanism,
                outcome = "download-failed"
            );
            return Ok(None);
        }

        let mut auxiliary_files = Vec::new();
        if let Some(confidence_url) = confidence_url {
            if self.transport.exists(confidence_url)? {
                match output_path(out_dir, reference_id, confidence_url) {
                    Some(aux) => {
                        if self.transport.download(confidence_url, &aux)? {
                            auxiliary_files.push(aux);
                        } else {
                            tracing::warn!(
                                record = reference_id,
                                url = confidence_url,
                                "confidence download failed"
                            );
                        }
                    }
                    None => {
                        tracing::warn!(
                            record = reference_id,
                            url = confidence_url,
                            "confidence url has no basename"
                        );
                    }
                }
            }
        }

        tracing::info!(
            record = reference_id,
            candidate,
            stage = "alphafold",
            mechanism = %mechanism,
            outcome = "resolved",
            file = %primary
        );
        Ok(Some(ResolvedArtifact {
            source_id: candidate.to_string(),
            mechanism,
            primary_file: primary,
            auxiliary_files,
        }))
    }
}

pub fn model_url(id: &str, fragment: u32, version: &str) -> String {
    format!("{FILES_BASE}/AF-{id}-F{fragment}-model_{version}.pdb")
}

fn confidence_url(id: &str, fragment: u32, version: &str) -> String {
    format!("{FILES_BASE}/AF-{id}-F{fragment}-confidence_{version}.json")
}

fn output_path(out_dir: &Utf8Path, reference_id: &str, url: &str) -> Option<Utf8PathBuf> {
    let basename = url_basename(url)?;
    Some(out_dir.join(format!("{reference_id}__{basename}")))
}

pub fn url_basename(url: &str) -> Option<&str> {
    let trimmed = url.split(['?', '#']).next().unwrap_or(url);
    let name = trimmed.rsplit('/').next()?;
    if name.is_empty() { None } else { Some(name) }
}

/// Expected pattern: an absolute files-host URL of the form
/// `AF-<accession>-F<n>-model_v<n>.pdb` (or `.cif`) embedded in the entry
/// page. Returns the first match.
fn extract_model_url(page: &str) -> Option<String> {
    let re = Regex::new(r"https://alphafold\.ebi\.ac\.uk/files/AF-[A-Z0-9-]+-F\d+-model_v\d+\.(?:pdb|cif)")
        .unwrap();
    re.find(page).map(|m| m.as_str().to_string())
}

/// Expected pattern: the matching confidence companion
/// `AF-<accession>-F<n>-confidence_v<n>.json`. Returns the first match.
fn extract_confidence_url(page: &str) -> Option<String> {
    let re = Regex::new(
        r"https://alphafold\.ebi\.ac\.uk/files/AF-[A-Z0-9-]+-F\d+-confidence_v\d+\.json",
    )
    .unwrap();
    re.find(page).map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_url_shape() {
        assert_eq!(
            model_url("P69905", 1, "v6"),
            "https://alphafold.ebi.ac.uk/files/AF-P69905-F1-model_v6.pdb"
        );
        assert_eq!(
            confidence_url("P69905", 2, "v4"),
            "https://alphafold.ebi.ac.uk/files/AF-P69905-F2-confidence_v4.json"
        );
    }

    #[test]
    fn versions_newest_first() {
        assert_eq!(MODEL_VERSIONS[0], "v6");
        assert!(MODEL_VERSIONS.len() >= 2);
    }

    #[test]
    fn basename_extraction() {
        assert_eq!(
            url_basename("https://alphafold.ebi.ac.uk/files/AF-P69905-F1-model_v6.pdb"),
            Some("AF-P69905-F1-model_v6.pdb")
        );
        assert_eq!(
            url_basename("https://example.org/download/model.pdb?token=abc"),
            Some("model.pdb")
        );
        assert_eq!(url_basename("https://example.org/files/"), None);
    }

    #[test]
    fn model_url_from_entry_page() {
        let page = r#"<a href="https://alphafold.ebi.ac.uk/files/AF-Q8WZ42-F1-model_v4.pdb">PDB</a>
            <a href="https://alphafold.ebi.ac.uk/files/AF-Q8WZ42-F1-confidence_v4.json">conf</a>"#;
        assert_eq!(
            extract_model_url(page).as_deref(),
            Some("https://alphafold.ebi.ac.uk/files/AF-Q8WZ42-F1-model_v4.pdb")
        );
        assert_eq!(
            extract_confidence_url(page).as_deref(),
            Some("https://alphafold.ebi.ac.uk/files/AF-Q8WZ42-F1-confidence_v4.json")
        );
    }

    #[test]
    fn entry_page_without_model_link() {
        assert_eq!(extract_model_url("<html><body>no entry</body></html>"), None);
    }

    #[test]
    fn prediction_payload_decode() {
        let raw = r#"[{"entryId":"AF-P69905-F1","pdbUrl":"https://alphafold.ebi.ac.uk/files/AF-P69905-F1-model_v4.pdb","paeDocUrl":"https://alphafold.ebi.ac.uk/files/AF-P69905-F1-predicted_aligned_error_v4.json"}]"#;
        let value: serde_json::Value = serde_json::from_str(raw).unwrap();
        let entries: Vec<PredictionEntry> = serde_json::from_value(value).unwrap();
        assert_eq!(
            entries[0].pdb_url.as_deref(),
            Some("https://alphafold.ebi.ac.uk/files/AF-P69905-F1-model_v4.pdb")
        );
        assert!(entries[0].pae_doc_url.is_some());
    }

    #[test]
    fn search_payload_decode() {
        let raw = r#"{"docs":[{"uniprotAccession":"P69905","uniprotId":"HBA_HUMAN"}]}"#;
        let value: serde_json::Value = serde_json::from_str(raw).unwrap();
        let response: SearchResponse = serde_json::from_value(value).unwrap();
        assert_eq!(
            response.docs[0].uniprot_accession.as_deref(),
            Some("P69905")
        );
    }

    #[test]
    fn search_payload_without_docs() {
        let value: serde_json::Value = serde_json::from_str(r#"{"numFound":0}"#).unwrap();
        let response: SearchResponse = serde_json::from_value(value).unwrap();
        assert!(response.docs.is_empty());
    }
}
