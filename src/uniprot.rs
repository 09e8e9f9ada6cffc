use serde::Deserialize;

use crate::error::HarvestError;
use crate::http::HttpTransport;

const API_BASE: &str = "https://rest.uniprot.org/uniprotkb";

#[derive(Debug, Deserialize)]
struct UniprotEntry {
    #[serde(rename = "primaryAccession")]
    primary_accession: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UniprotSearchResponse {
    #[serde(default)]
    results: Vec<UniprotEntry>,
}

pub struct UniprotClient<T: HttpTransport> {
    transport: T,
}

impl<T: HttpTransport> UniprotClient<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Resolves a token to its primary accession: the entry endpoint first,
    /// then the accession-or-id search endpoint when the entry is absent.
    pub fn resolve_accession(&self, candidate: &str) -> Result<Option<String>, HarvestError> {
        if let Some(accession) = self.entry_accession(candidate)? {
            return Ok(Some(accession));
        }
        self.search_accession(candidate)
    }

    fn entry_accession(&self, candidate: &str) -> Result<Option<String>, HarvestError> {
        let url = format!("{API_BASE}/{candidate}.json");
        let Some(value) = self.fetch_json(candidate, &url)? else {
            return Ok(None);
        };
        let entry: UniprotEntry = match serde_json::from_value(value) {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!(candidate, error = %err, "unexpected uniprot entry payload");
                return Ok(None);
            }
        };
        Ok(entry.primary_accession)
    }

    fn search_accession(&self, candidate: &str) -> Result<Option<String>, HarvestError> {
        let url = format!(
            "{API_BASE}/search?query=accession:{candidate}%20OR%20id:{candidate}&fields=accession&format=json&size=1"
        );
        let Some(value) = self.fetch_json(candidate, &url)? else {
            return Ok(None);
        };
        let response: UniprotSearchResponse = match serde_json::from_value(value) {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(candidate, error = %err, "unexpected uniprot search payload");
                return Ok(None);
            }
        };
        Ok(response
            .results
            .into_iter()
            .find_map(|entry| entry.primary_accession))
    }

    fn fetch_json(
        &self,
        candidate: &str,
        url: &str,
    ) -> Result<Option<serde_json::Value>, HarvestError> {
        match self.transport.get_json(url) {
            Ok(value) => Ok(value),
            Err(err) if err.is_recoverable() => {
                tracing::warn!(candidate, error = %err, "uniprot lookup failed");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }
}
