use std::time::Duration;

use camino::Utf8PathBuf;

#[derive(Debug, Clone, Copy)]
pub struct HttpConfig {
    pub connect_timeout: Duration,
    pub total_timeout: Duration,
    pub max_retries: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            total_timeout: Duration::from_secs(60),
            max_retries: 3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HarvestConfig {
    pub output_dir: Utf8PathBuf,
    pub http: HttpConfig,
    /// Upper bound on SWISS-MODEL downloads per record.
    pub swm_max: usize,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            output_dir: Utf8PathBuf::from("structures"),
            http: HttpConfig::default(),
            swm_max: 1,
        }
    }
}
