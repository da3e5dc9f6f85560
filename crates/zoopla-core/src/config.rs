use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::extract::ExtractorConfig;
use crate::models::{ExtractionTarget, RecordKind};
use crate::proxy::ProxyRotator;

/// JSON Schema every configuration is validated against before use.
pub const INPUT_SCHEMA: &str = include_str!("../schema/input_schema.json");

/// Which page kinds a run scrapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Property,
    Agent,
    HousePrices,
    All,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Property => "property",
            Mode::Agent => "agent",
            Mode::HousePrices => "house_prices",
            Mode::All => "all",
        }
    }

    /// Record kinds covered by this mode, in run order.
    pub fn kinds(&self) -> &'static [RecordKind] {
        match self {
            Mode::Property => &[RecordKind::Property],
            Mode::Agent => &[RecordKind::Agent],
            Mode::HousePrices => &[RecordKind::HousePrice],
            Mode::All => &RecordKind::ALL,
        }
    }

    pub fn includes(&self, kind: RecordKind) -> bool {
        self.kinds().contains(&kind)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "property" => Ok(Mode::Property),
            "agent" => Ok(Mode::Agent),
            "house_prices" => Ok(Mode::HousePrices),
            "all" => Ok(Mode::All),
            _ => Err(format!("Unsupported mode: {}", s)),
        }
    }
}

/// Serialization format for output files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Json,
    Csv,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
        }
    }

    /// Output file name for records of `kind`.
    pub fn file_name(&self, kind: RecordKind) -> String {
        format!(
            "{}.{}",
            kind.output_stem(*self == OutputFormat::Json),
            self.as_str()
        )
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(format!("Unsupported output format: {}", s)),
        }
    }
}

/// Scraper run configuration, as read from the JSON config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScraperConfig {
    pub mode: Mode,
    #[serde(default)]
    pub property_urls: Vec<String>,
    #[serde(default)]
    pub agent_urls: Vec<String>,
    #[serde(default)]
    pub house_price_urls: Vec<String>,
    pub output_format: OutputFormat,
    pub output_dir: PathBuf,
    /// 0 means unbounded.
    #[serde(default)]
    pub max_items: u64,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub use_proxies: bool,
    #[serde(default)]
    pub proxies: Vec<String>,
}

fn default_concurrency() -> usize {
    5
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            mode: Mode::All,
            property_urls: vec!["https://www.zoopla.co.uk/for-sale/property/london/".to_string()],
            agent_urls: vec!["https://www.zoopla.co.uk/find-agents/london/".to_string()],
            house_price_urls: vec!["https://www.zoopla.co.uk/house-prices/london/".to_string()],
            output_format: OutputFormat::Json,
            output_dir: PathBuf::from("data"),
            max_items: 100,
            concurrency: default_concurrency(),
            timeout_secs: default_timeout_secs(),
            use_proxies: false,
            proxies: Vec::new(),
        }
    }
}

impl ScraperConfig {
    /// Load the config at `path`, or the built-in default when `path` is
    /// `None`, and validate it against [`INPUT_SCHEMA`].
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        let raw = match path {
            Some(path) => {
                if !path.is_file() {
                    return Err(AppError::ConfigError(format!(
                        "Config file not found: {}",
                        path.display()
                    )));
                }
                let text = std::fs::read_to_string(path).map_err(|e| {
                    AppError::ConfigError(format!(
                        "Failed to read config file {}: {e}",
                        path.display()
                    ))
                })?;
                serde_json::from_str::<serde_json::Value>(&text).map_err(|e| {
                    AppError::ConfigError(format!(
                        "Invalid JSON in config file {}: {e}",
                        path.display()
                    ))
                })?
            }
            None => serde_json::to_value(Self::default())?,
        };

        Self::from_value(raw)
    }

    /// Validate a raw JSON config and deserialize it.
    pub fn from_value(raw: serde_json::Value) -> Result<Self, AppError> {
        validate(&raw)?;
        serde_json::from_value(raw)
            .map_err(|e| AppError::ConfigError(format!("Config validation error: {e}")))
    }

    /// Apply command-line overrides.
    pub fn with_overrides(mut self, mode: Option<Mode>, output_format: Option<OutputFormat>) -> Self {
        if let Some(mode) = mode {
            self.mode = mode;
        }
        if let Some(output_format) = output_format {
            self.output_format = output_format;
        }
        self
    }

    pub fn max_items(&self) -> Option<usize> {
        match self.max_items {
            0 => None,
            n => Some(usize::try_from(n).unwrap_or(usize::MAX)),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency.max(1)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    pub fn urls_for(&self, kind: RecordKind) -> &[String] {
        match kind {
            RecordKind::Property => &self.property_urls,
            RecordKind::Agent => &self.agent_urls,
            RecordKind::HousePrice => &self.house_price_urls,
        }
    }

    /// Every URL the configured mode should scrape, tagged with its kind.
    pub fn targets(&self) -> Vec<ExtractionTarget> {
        self.mode
            .kinds()
            .iter()
            .flat_map(|&kind| {
                self.urls_for(kind)
                    .iter()
                    .filter(|u| !u.trim().is_empty())
                    .map(move |u| ExtractionTarget::new(u.clone(), kind))
            })
            .collect()
    }

    pub fn extractor_config(&self) -> ExtractorConfig {
        ExtractorConfig::new(self.concurrency(), self.max_items())
    }

    pub fn proxy_rotator(&self) -> ProxyRotator {
        ProxyRotator::new(self.proxies.iter().cloned(), self.use_proxies)
    }
}

/// Check a raw config against [`INPUT_SCHEMA`], collecting every violation.
pub fn validate(instance: &serde_json::Value) -> Result<(), AppError> {
    let schema: serde_json::Value = serde_json::from_str(INPUT_SCHEMA)?;
    let validator = jsonschema::validator_for(&schema)
        .map_err(|e| AppError::ConfigError(format!("Invalid input schema: {e}")))?;

    let errors: Vec<String> = validator
        .iter_errors(instance)
        .map(|e| e.to_string())
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::ConfigError(format!(
            "Config validation error: {}",
            errors.join("; ")
        )))
    }
}
