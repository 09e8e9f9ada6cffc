use camino::Utf8Path;
use regex::Regex;

use crate::domain::{Mechanism, ResolvedArtifact};
use crate::error::HarvestError;
use crate::http::HttpTransport;

const REPOSITORY_BASE: &str = "https://swissmodel.expasy.org/repository";

pub struct SwissModelClient<T: HttpTransport> {
    transport: T,
    max_models: usize,
}

impl<T: HttpTransport> SwissModelClient<T> {
    pub fn new(transport: T, max_models: usize) -> Self {
        Self {
            transport,
            max_models,
        }
    }

    /// Scrapes the repository page for the uppercased token and downloads at
    /// most `max_models` homology-model structures. Succeeds when at least
    /// one file was saved.
    pub fn fetch_models(
        &self,
        reference_id: &str,
        token: &str,
        out_dir: &Utf8Path,
    ) -> Result<Option<ResolvedArtifact>, HarvestError> {
        let uniprot_id = token.trim().to_uppercase();
        let url = format!("{REPOSITORY_BASE}/uniprot/{uniprot_id}");
        tracing::info!(
            record = reference_id,
            id = %uniprot_id,
            stage = "swiss-model",
            "attempt"
        );

        let page = match self.transport.get_text(&url) {
            Ok(Some(page)) => page,
            Ok(None) => {
                tracing::info!(
                    record = reference_id,
                    id = %uniprot_id,
                    stage = "swiss-model",
                    outcome = "miss"
                );
                return Ok(None);
            }
            Err(err) if err.is_recoverable() => {
                tracing::warn!(record = reference_id, error = %err, "repository page fetch failed");
                return Ok(None);
            }
            Err(err) => return Err(err),
        };

        let links = collect_model_links(&page);
        if links.is_empty() {
            tracing::info!(
                record = reference_id,
                id = %uniprot_id,
                stage = "swiss-model",
                outcome = "no-links"
            );
            return Ok(None);
        }

        let mut saved = Vec::new();
        for link in links.iter().take(self.max_models) {
            let tag = coordinate_tag(link);
            let destination = out_dir.join(format!("{reference_id}__SWM-{uniprot_id}-{tag}.pdb"));
            if self.transport.download(link, &destination)? {
                saved.push(destination);
            } else {
                tracing::warn!(record = reference_id, url = %link, "model download failed");
            }
        }
        if saved.is_empty() {
            return Ok(None);
        }

        let primary_file = saved.remove(0);
        tracing::info!(
            record = reference_id,
            id = %uniprot_id,
            stage = "swiss-model",
            outcome = "resolved",
            file = %primary_file
        );
        Ok(Some(ResolvedArtifact {
            source_id: uniprot_id,
            mechanism: Mechanism::SwissModel,
            primary_file,
            auxiliary_files: saved,
        }))
    }
}

/// Direct links and reconstructed coordinate links combined, deduplicated
/// preserving first-seen order.
pub fn collect_model_links(page: &str) -> Vec<String> {
    let mut links = extract_direct_links(page);
    links.extend(extract_coordinate_links(page));
    let mut seen = std::collections::HashSet::new();
    links.retain(|link| seen.insert(link.clone()));
    links
}

/// Expected pattern: an absolute repository URL ending in `.pdb`.
fn extract_direct_links(page: &str) -> Vec<String> {
    let re = Regex::new(r"https://swissmodel\.expasy\.org/repository/[A-Za-z0-9/._-]+\.pdb")
        .unwrap();
    re.find_iter(page).map(|m| m.as_str().to_string()).collect()
}

/// Expected pattern: a hex content-identifier in a `coordinate_id` field,
/// reconstructed into the canonical coordinates URL.
fn extract_coordinate_links(page: &str) -> Vec<String> {
    let re = Regex::new(r#""coordinate_id"\s*:\s*"([0-9a-f]{12,64})""#).unwrap();
    re.captures_iter(page)
        .map(|caps| format!("{REPOSITORY_BASE}/coordinates/{}.pdb", &caps[1]))
        .collect()
}

/// Short stable tag for the output filename: the link's basename stem, with
/// long hex hashes truncated to 12 characters.
fn coordinate_tag(link: &str) -> String {
    let stem = link
        .rsplit('/')
        .next()
        .unwrap_or(link)
        .trim_end_matches(".pdb");
    if stem.len() > 12 && stem.chars().all(|ch| ch.is_ascii_hexdigit()) {
        return stem[..12].to_string();
    }
    stem.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <a href="https://swissmodel.expasy.org/repository/ab12cd/models/model_01.pdb">model 1</a>
        {"coordinate_id": "0123456789abcdef0123"}
        <a href="https://swissmodel.expasy.org/repository/ab12cd/models/model_01.pdb">again</a>
        {"coordinate_id": "fedcba98765432100123"}
    "#;

    #[test]
    fn collects_both_patterns_deduplicated() {
        let links = collect_model_links(PAGE);
        assert_eq!(
            links,
            vec![
                "https://swissmodel.expasy.org/repository/ab12cd/models/model_01.pdb".to_string(),
                "https://swissmodel.expasy.org/repository/coordinates/0123456789abcdef0123.pdb"
                    .to_string(),
                "https://swissmodel.expasy.org/repository/coordinates/fedcba98765432100123.pdb"
                    .to_string(),
            ]
        );
    }

    #[test]
    fn no_links_on_empty_page() {
        assert!(collect_model_links("<html><body>not found</body></html>").is_empty());
    }

    #[test]
    fn coordinate_tag_truncates_hashes() {
        assert_eq!(
            coordinate_tag(
                "https://swissmodel.expasy.org/repository/coordinates/0123456789abcdef0123.pdb"
            ),
            "0123456789ab"
        );
        assert_eq!(
            coordinate_tag("https://swissmodel.expasy.org/repository/ab12cd/models/model_01.pdb"),
            "model_01"
        );
    }
}
