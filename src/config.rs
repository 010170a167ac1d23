// src/config.rs
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono_tz::Tz;
use serde::Deserialize;

use crate::utils::AppError;

pub const FILING_DATES_FILE: &str = "filing_dates.json";
pub const COMPANY_MENTIONS_FILE: &str = "company_mentions.json";
pub const FILINGS_TABLE_FILE: &str = "df_filings.csv";
pub const FILING_MENTIONS_FILE: &str = "df_filing_mentions.csv";
pub const MENTIONS_AGG_FILE: &str = "df_mentions_agg.csv";
pub const ANNUAL_RETURNS_FILE: &str = "annual_stock_return.csv";
pub const REGRESSION_RESULTS_FILE: &str = "regression_results.csv";
pub const REGRESSION_SUMMARY_FILE: &str = "regression_summary.json";

const FILINGS_SUBDIR: &str = "sec-edgar-filings";
const PRICE_SUBDIR: &str = "price";

/// A tracked company and the brand names the classifier looks for.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CompanyConfig {
    pub names: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub endpoint: String,
    pub model: String,
    pub max_tokens: u32,
    /// Filing text beyond this many characters is not sent.
    pub max_content_chars: usize,
    /// Never read from the config file, only from `OPENAI_API_KEY`.
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-3.5-turbo".to_string(),
            max_tokens: 500,
            max_content_chars: 15_000,
            api_key: None,
        }
    }
}

/// Everything a pipeline stage needs to know, passed explicitly into each stage.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub data_dir: PathBuf,
    pub companies: BTreeMap<String, CompanyConfig>,
    /// Form types treated as annual reports.
    pub annual_forms: Vec<String>,
    pub start_year: Option<i32>,
    pub end_year: Option<i32>,
    /// IANA name of the zone price timestamps are normalized to.
    pub reference_timezone: String,
    pub edgar_user_agent: String,
    pub edgar_request_delay_ms: u64,
    pub classifier: ClassifierConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            companies: default_companies(),
            annual_forms: vec!["10-K".to_string(), "20-F".to_string()],
            start_year: None,
            end_year: None,
            reference_timezone: "America/New_York".to_string(),
            edgar_user_agent: "popularity-return research contact@example.com".to_string(),
            // SEC asks for 10 requests/second max.
            edgar_request_delay_ms: 150,
            classifier: ClassifierConfig::default(),
        }
    }
}

fn default_companies() -> BTreeMap<String, CompanyConfig> {
    let table: [(&str, &[&str]); 7] = [
        ("BKNG", &["Booking Holdings", "Booking.com", "Priceline", "Kayak", "Agoda", "OpenTable"]),
        ("EXPE", &["Expedia Group", "Expedia", "Hotels.com", "Vrbo", "Orbitz", "Travelocity", "Hotwire"]),
        ("TCOM", &["Trip.com", "Ctrip", "Skyscanner", "Qunar"]),
        ("TRIP", &["Tripadvisor", "TripAdvisor"]),
        ("TRVG", &["Trivago"]),
        ("MMYT", &["MakeMyTrip", "Goibibo"]),
        ("YTRA", &["Yatra", "Yatra Online"]),
    ];
    table
        .iter()
        .map(|(ticker, names)| {
            (
                ticker.to_string(),
                CompanyConfig { names: names.iter().map(|n| n.to_string()).collect() },
            )
        })
        .collect()
}

impl PipelineConfig {
    /// Loads the config file if one is given (missing keys fall back to defaults),
    /// then applies `EDGAR_USER_AGENT` and `OPENAI_API_KEY` from the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|e| {
                    AppError::Config(format!("Failed to read config file {}: {}", path.display(), e))
                })?;
                serde_json::from_str::<PipelineConfig>(&raw).map_err(|e| {
                    AppError::Config(format!("Failed to parse config file {}: {}", path.display(), e))
                })?
            }
            None => PipelineConfig::default(),
        };

        if let Ok(agent) = std::env::var("EDGAR_USER_AGENT") {
            if !agent.trim().is_empty() {
                config.edgar_user_agent = agent;
            }
        }
        config.classifier.api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty());

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.companies.is_empty() {
            return Err(AppError::Config("No companies configured".to_string()));
        }
        if let (Some(start), Some(end)) = (self.start_year, self.end_year) {
            if start > end {
                return Err(AppError::Config(format!(
                    "start_year {} is after end_year {}",
                    start, end
                )));
            }
        }
        self.reference_tz()?;
        Ok(())
    }

    pub fn reference_tz(&self) -> Result<Tz, AppError> {
        self.reference_timezone.parse::<Tz>().map_err(|e| {
            AppError::Config(format!("Unknown time zone '{}': {}", self.reference_timezone, e))
        })
    }

    pub fn tickers(&self) -> impl Iterator<Item = &str> {
        self.companies.keys().map(String::as_str)
    }

    /// Brand names of every configured company except `filing_ticker`.
    pub fn competitors_of(&self, filing_ticker: &str) -> BTreeMap<String, Vec<String>> {
        self.companies
            .iter()
            .filter(|(ticker, _)| !ticker.eq_ignore_ascii_case(filing_ticker))
            .map(|(ticker, company)| (ticker.clone(), company.names.clone()))
            .collect()
    }

    pub fn filings_dir(&self) -> PathBuf {
        self.data_dir.join(FILINGS_SUBDIR)
    }

    pub fn price_dir(&self) -> PathBuf {
        self.data_dir.join(PRICE_SUBDIR)
    }
}
