//! Run configuration, optionally loaded from a CONL file

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::browser::Timeouts;
use crate::types::OperatorTarget;

pub const DEFAULT_CONFIG_FILE: &str = "outage-tracker.conl";

// Existing rows in this sheet use Russian labels, which the English row keys
// never match; see outage-tracker.example.conl.
const DEFAULT_SPREADSHEET_ID: &str = "1wARq0np7YLN2RNM3kNDd0Y_b725OPUixJ1lUwTk-Kbg";
const DEFAULT_SHEET_NAME: &str = "Sheet1";
const DEFAULT_CREDENTIALS: &str = "service-account.json";
const DEFAULT_HEADER_LABEL: &str = "Operator/Metric";

const DEFAULT_OPERATORS: &[(&str, &str)] = &[
    ("MTS", "https://downdetector.su/mts"),
    ("Tele2", "https://downdetector.su/tele2"),
    ("Rostelecom", "https://downdetector.su/rostelekom"),
    ("Beeline", "https://downdetector.su/bilajn"),
    ("MegaFon", "https://downdetector.su/megafon"),
    ("Dom.ru", "https://downdetector.su/domru"),
];

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub spreadsheet_id: String,
    pub sheet_name: String,
    /// Service-account key file
    pub credentials: PathBuf,
    /// First cell of the header row
    pub header_label: String,
    pub page_load_timeout_secs: u64,
    pub landmark_timeout_secs: u64,
    /// Pause between two operator pages
    pub delay_ms: u64,
    /// Chromium binary to use instead of the one found on the system
    pub chrome_executable: Option<PathBuf>,
    /// Operator display name -> page URL
    pub operators: BTreeMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            spreadsheet_id: DEFAULT_SPREADSHEET_ID.to_string(),
            sheet_name: DEFAULT_SHEET_NAME.to_string(),
            credentials: PathBuf::from(DEFAULT_CREDENTIALS),
            header_label: DEFAULT_HEADER_LABEL.to_string(),
            page_load_timeout_secs: 45,
            landmark_timeout_secs: 40,
            delay_ms: 1000,
            chrome_executable: None,
            operators: DEFAULT_OPERATORS
                .iter()
                .map(|(name, url)| (name.to_string(), url.to_string()))
                .collect(),
        }
    }
}

impl Config {
    /// Load from `path`, falling back to defaults when the file does not exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config = Self::from_conl(&content)
            .with_context(|| format!("Invalid config: {}", path.display()))?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_conl(content: &str) -> Result<Self> {
        let config: Config = serde_conl::from_str(content).context("Failed to parse CONL")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.spreadsheet_id.trim().is_empty() {
            bail!("spreadsheet_id must not be empty");
        }
        if self.sheet_name.trim().is_empty() {
            bail!("sheet_name must not be empty");
        }
        if self.operators.is_empty() {
            bail!("at least one operator is required");
        }
        for (name, url) in &self.operators {
            if name.trim().is_empty() {
                bail!("operator names must not be empty");
            }
            let parsed = reqwest::Url::parse(url)
                .with_context(|| format!("Invalid URL for operator '{}': {}", name, url))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                bail!("URL for operator '{}' must be http(s): {}", name, url);
            }
        }
        if let Some(path) = &self.chrome_executable {
            if path.as_os_str().is_empty() {
                bail!("chrome_executable must not be empty when set");
            }
        }
        if self.page_load_timeout_secs == 0 || self.landmark_timeout_secs == 0 {
            bail!("timeouts must be greater than zero");
        }
        Ok(())
    }

    pub fn targets(&self) -> Vec<OperatorTarget> {
        self.operators
            .iter()
            .map(|(name, url)| OperatorTarget::new(name.as_str(), url.as_str()))
            .collect()
    }

    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            page_load: Duration::from_secs(self.page_load_timeout_secs),
            landmark: Duration::from_secs(self.landmark_timeout_secs),
        }
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    /// Browser link to the spreadsheet
    pub fn spreadsheet_url(&self) -> String {
        format!(
            "https://docs.google.com/spreadsheets/d/{}/edit",
            self.spreadsheet_id
        )
    }
}
