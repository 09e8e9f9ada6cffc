use camino::Utf8PathBuf;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum HarvestError {
    #[error("failed to read input table at {0}")]
    InputRead(Utf8PathBuf),

    #[error("failed to prepare output directory: {0}")]
    OutputDir(String),

    #[error("http request failed: {0}")]
    Http(String),

    #[error("remote returned status {status}: {message}")]
    HttpStatus { status: u16, message: String },

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}

impl HarvestError {
    /// Failures the resolution chain recovers from by falling through to the
    /// next mechanism, candidate, or fallback tier.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            HarvestError::Http(_)
                | HarvestError::HttpStatus { .. }
                | HarvestError::MalformedResponse(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recoverable_classes() {
        assert!(HarvestError::Http("timeout".to_string()).is_recoverable());
        assert!(
            HarvestError::HttpStatus {
                status: 403,
                message: "forbidden".to_string(),
            }
            .is_recoverable()
        );
        assert!(HarvestError::MalformedResponse("no field".to_string()).is_recoverable());
        assert!(!HarvestError::InputRead(Utf8PathBuf::from("table.tsv")).is_recoverable());
        assert!(!HarvestError::Filesystem("disk full".to_string()).is_recoverable());
    }
}
