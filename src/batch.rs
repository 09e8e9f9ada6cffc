use std::collections::HashSet;
use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;

use crate::alphafold::AlphaFoldClient;
use crate::config::HarvestConfig;
use crate::domain::{CrossRef, FetchOutcome, InputRecord, Mechanism, ResolvedArtifact, candidates};
use crate::error::HarvestError;
use crate::http::HttpTransport;
use crate::swissmodel::SwissModelClient;
use crate::uniprot::UniprotClient;

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub started_at: String,
    pub finished_at: String,
    pub records: Vec<RecordReport>,
}

impl BatchReport {
    pub fn counts(&self) -> (usize, usize, usize) {
        let resolved = self
            .records
            .iter()
            .filter(|r| r.outcome == "resolved")
            .count();
        let skipped = self
            .records
            .iter()
            .filter(|r| r.outcome == "skipped")
            .count();
        let exhausted = self
            .records
            .iter()
            .filter(|r| r.outcome == "exhausted")
            .count();
        (resolved, skipped, exhausted)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RecordReport {
    pub reference_id: String,
    pub cross_ref: Option<String>,
    pub outcome: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mechanism: Option<Mechanism>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,
}

pub struct Harvester<T: HttpTransport> {
    alphafold: AlphaFoldClient<T>,
    uniprot: UniprotClient<T>,
    swissmodel: SwissModelClient<T>,
    output_dir: Utf8PathBuf,
}

impl<T: HttpTransport + Clone> Harvester<T> {
    pub fn new(transport: T, config: &HarvestConfig) -> Self {
        Self {
            alphafold: AlphaFoldClient::new(transport.clone()),
            uniprot: UniprotClient::new(transport.clone()),
            swissmodel: SwissModelClient::new(transport, config.swm_max),
            output_dir: config.output_dir.clone(),
        }
    }
}

impl<T: HttpTransport> Harvester<T> {
    /// Processes every row of the input table in order. Per-row failures
    /// never abort the batch; only an unreadable table or an unusable output
    /// directory is fatal.
    pub fn run(&self, table_path: &Utf8Path) -> Result<BatchReport, HarvestError> {
        let content = fs::read_to_string(table_path.as_std_path())
            .map_err(|_| HarvestError::InputRead(table_path.to_owned()))?;
        fs::create_dir_all(self.output_dir.as_std_path())
            .map_err(|err| HarvestError::OutputDir(err.to_string()))?;

        let started_at = chrono::Utc::now().to_rfc3339();
        let mut records = Vec::new();
        for record in parse_table(&content) {
            let outcome = self.resolve_record(&record)?;
            records.push(record_report(&record, &outcome));
        }
        Ok(BatchReport {
            started_at,
            finished_at: chrono::Utc::now().to_rfc3339(),
            records,
        })
    }

    fn resolve_record(&self, record: &InputRecord) -> Result<FetchOutcome, HarvestError> {
        let Some(raw) = record.cross_ref.as_id() else {
            tracing::info!(
                record = %record.reference_id,
                stage = "input",
                outcome = "skipped",
                "no cross-reference id"
            );
            return Ok(FetchOutcome::Skipped);
        };

        let mut seen = HashSet::new();

        if let Some(artifact) = self.try_alphafold(record, candidates(raw), &mut seen)? {
            return Ok(FetchOutcome::Resolved(artifact));
        }

        let primary = raw.trim().to_uppercase();
        if let Some(mapped) = self.alphafold.search_accession(&primary)? {
            tracing::info!(
                record = %record.reference_id,
                stage = "cross-ref",
                mapped = %mapped,
                "search mapping"
            );
            if let Some(artifact) = self.try_alphafold(record, candidates(&mapped), &mut seen)? {
                return Ok(FetchOutcome::Resolved(artifact));
            }
        }
        if let Some(accession) = self.uniprot.resolve_accession(&primary)? {
            tracing::info!(
                record = %record.reference_id,
                stage = "cross-ref",
                mapped = %accession,
                "uniprot mapping"
            );
            if let Some(artifact) = self.try_alphafold(record, candidates(&accession), &mut seen)? {
                return Ok(FetchOutcome::Resolved(artifact));
            }
        }

        if let Some(artifact) =
            self.swissmodel
                .fetch_models(&record.reference_id, &primary, &self.output_dir)?
        {
            return Ok(FetchOutcome::Resolved(artifact));
        }

        tracing::info!(
            record = %record.reference_id,
            stage = "final",
            outcome = "exhausted"
        );
        Ok(FetchOutcome::Exhausted)
    }

    fn try_alphafold(
        &self,
        record: &InputRecord,
        candidate_ids: Vec<String>,
        seen: &mut HashSet<String>,
    ) -> Result<Option<ResolvedArtifact>, HarvestError> {
        for candidate in candidate_ids {
            if !seen.insert(candidate.clone()) {
                continue;
            }
            if let Some(artifact) =
                self.alphafold
                    .resolve(&record.reference_id, &candidate, &self.output_dir)?
            {
                return Ok(Some(artifact));
            }
        }
        Ok(None)
    }
}

/// Parses the two-column tab-separated table, tolerating trailing carriage
/// returns, skipping blank lines and header-like lines.
pub fn parse_table(content: &str) -> Vec<InputRecord> {
    let mut records = Vec::new();
    for line in content.lines() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        let mut fields = line.split('\t');
        let reference = fields.next().unwrap_or("").trim();
        let cross_ref = fields.next().unwrap_or("").trim();
        if reference.is_empty() || is_header_keyword(reference) {
            continue;
        }
        records.push(InputRecord {
            reference_id: reference.to_string(),
            cross_ref: CrossRef::parse(cross_ref),
        });
    }
    records
}

fn is_header_keyword(field: &str) -> bool {
    matches!(
        field.to_ascii_lowercase().as_str(),
        "reference" | "reference_id" | "referenceid" | "ref" | "id" | "name" | "label" | "seqid"
    )
}

fn record_report(record: &InputRecord, outcome: &FetchOutcome) -> RecordReport {
    let cross_ref = record.cross_ref.as_id().map(|id| id.to_string());
    match outcome {
        FetchOutcome::Resolved(artifact) => {
            let mut files = vec![artifact.primary_file.to_string()];
            files.extend(artifact.auxiliary_files.iter().map(|f| f.to_string()));
            RecordReport {
                reference_id: record.reference_id.clone(),
                cross_ref,
                outcome: "resolved".to_string(),
                mechanism: Some(artifact.mechanism),
                source_id: Some(artifact.source_id.clone()),
                files,
            }
        }
        FetchOutcome::Skipped => RecordReport {
            reference_id: record.reference_id.clone(),
            cross_ref,
            outcome: "skipped".to_string(),
            mechanism: None,
            source_id: None,
            files: Vec::new(),
        },
        FetchOutcome::Exhausted => RecordReport {
            reference_id: record.reference_id.clone(),
            cross_ref,
            outcome: "exhausted".to_string(),
            mechanism: None,
            source_id: None,
            files: Vec::new(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_table_basic() {
        let table = "SEQ_001\tP69905\nSEQ_002\tQ8WZ42-3\n";
        let records = parse_table(table);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].reference_id, "SEQ_001");
        assert_eq!(records[0].cross_ref, CrossRef::Id("P69905".to_string()));
        assert_eq!(records[1].cross_ref, CrossRef::Id("Q8WZ42-3".to_string()));
    }

    #[test]
    fn parse_table_skips_header_and_blanks() {
        let table = "id\tuniprot\n\nSEQ_001\tP69905\n   \n";
        let records = parse_table(table);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].reference_id, "SEQ_001");
    }

    #[test]
    fn parse_table_tolerates_carriage_returns() {
        let table = "SEQ_001\tP69905\r\nSEQ_002\tMISSING\r\n";
        let records = parse_table(table);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].cross_ref, CrossRef::Id("P69905".to_string()));
        assert_eq!(records[1].cross_ref, CrossRef::Missing);
    }

    #[test]
    fn parse_table_missing_second_column() {
        let records = parse_table("SEQ_001\n");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].cross_ref, CrossRef::Missing);
    }

    #[test]
    fn header_keywords() {
        assert!(is_header_keyword("ID"));
        assert!(is_header_keyword("Reference"));
        assert!(is_header_keyword("seqid"));
        assert!(!is_header_keyword("SEQ_001"));
        assert!(!is_header_keyword("P69905"));
    }

    #[test]
    fn report_counts() {
        let report = BatchReport {
            started_at: String::new(),
            finished_at: String::new(),
            records: vec![
                RecordReport {
                    reference_id: "A".to_string(),
                    cross_ref: Some("P1".to_string()),
                    outcome: "resolved".to_string(),
                    mechanism: Some(Mechanism::StaticFiles),
                    source_id: Some("P1".to_string()),
                    files: vec!["A__f.pdb".to_string()],
                },
                RecordReport {
                    reference_id: "B".to_string(),
                    cross_ref: None,
                    outcome: "skipped".to_string(),
                    mechanism: None,
                    source_id: None,
                    files: Vec::new(),
                },
                RecordReport {
                    reference_id: "C".to_string(),
                    cross_ref: Some("X9".to_string()),
                    outcome: "exhausted".to_string(),
                    mechanism: None,
                    source_id: None,
                    files: Vec::new(),
                },
            ],
        };
        assert_eq!(report.counts(), (1, 1, 1));
    }
}
