// src/analysis/returns.rs
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::storage::Tabular;
use crate::utils::error::AnalysisError;

// Price files carry their ticker as "<TICKER>" somewhere in the name
static TICKER_IN_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<([^>]+)>").expect("Failed to compile TICKER_IN_NAME_RE"));

const OFFSET_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%:z", "%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%z"];
const NAIVE_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"];

/// One daily bar, timestamp already in the reference time zone.
#[derive(Debug, Clone, PartialEq)]
pub struct PricePoint {
    pub ticker: String,
    pub date: DateTime<FixedOffset>,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: f64,
    pub volume: Option<u64>,
}

/// Close-to-close change from the first trading day of `year` to the first
/// trading day of the next year present in the series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnualReturn {
    pub ticker: String,
    pub year: i32,
    pub start_date: DateTime<FixedOffset>,
    pub end_date: DateTime<FixedOffset>,
    pub start_price: f64,
    pub end_price: f64,
    pub annual_return_pct: f64,
}

impl Tabular for AnnualReturn {
    const COLUMNS: &'static [&'static str] = &[
        "ticker",
        "year",
        "start_date",
        "end_date",
        "start_price",
        "end_price",
        "annual_return_pct",
    ];
}

/// Combined output of a price directory scan.
#[derive(Debug, Default)]
pub struct PriceTables {
    pub prices: Vec<PricePoint>,
    pub returns: Vec<AnnualReturn>,
}

pub fn ticker_from_file_name(name: &str) -> Option<String> {
    TICKER_IN_NAME_RE
        .captures(name)
        .map(|c| c[1].trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Parses a price timestamp into the reference zone.
///
/// Offset-bearing timestamps are converted, naive date-times are read as UTC
/// and converted, bare dates are taken as that calendar day in `tz`.
pub fn parse_timestamp(raw: &str, tz: Tz) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();

    let with_offset = DateTime::parse_from_rfc3339(raw).ok().or_else(|| {
        OFFSET_FORMATS
            .iter()
            .find_map(|fmt| DateTime::parse_from_str(raw, fmt).ok())
    });
    if let Some(dt) = with_offset {
        return Some(dt.with_timezone(&tz).fixed_offset());
    }

    if let Some(naive) = NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
    {
        return Some(Utc.from_utc_datetime(&naive).with_timezone(&tz).fixed_offset());
    }

    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?;
    tz.from_local_datetime(&date.and_hms_opt(0, 0, 0)?)
        .earliest()
        .map(|dt| dt.fixed_offset())
}

/// Reads one price CSV. `Date` and `Close` are required columns; rows whose
/// date or close cannot be used are skipped. The result is sorted by date.
pub fn read_price_series(path: &Path, ticker: &str, tz: Tz) -> Result<Vec<PricePoint>, AnalysisError> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();
    let column = |name: &str| headers.iter().position(|h| h.trim().eq_ignore_ascii_case(name));
    let missing = |name: &str| AnalysisError::MissingColumn {
        file: path.display().to_string(),
        column: name.to_string(),
    };

    let date_idx = column("Date").ok_or_else(|| missing("Date"))?;
    let close_idx = column("Close").ok_or_else(|| missing("Close"))?;
    let (open_idx, high_idx, low_idx, volume_idx) =
        (column("Open"), column("High"), column("Low"), column("Volume"));

    let mut series = Vec::new();
    let mut skipped = 0usize;
    for (line, record) in reader.records().enumerate() {
        let record = record?;
        let field = |idx: Option<usize>| idx.and_then(|i| record.get(i)).map(str::trim).filter(|s| !s.is_empty());
        let number = |idx: Option<usize>| field(idx).and_then(|s| s.parse::<f64>().ok()).filter(|v| v.is_finite());

        let date = field(Some(date_idx)).and_then(|raw| parse_timestamp(raw, tz));
        let close = number(Some(close_idx));
        let (Some(date), Some(close)) = (date, close) else {
            tracing::debug!("{}: skipping row {} (unusable Date or Close)", path.display(), line + 2);
            skipped += 1;
            continue;
        };

        series.push(PricePoint {
            ticker: ticker.to_string(),
            date,
            open: number(open_idx),
            high: number(high_idx),
            low: number(low_idx),
            close,
            volume: number(volume_idx).filter(|v| *v >= 0.0).map(|v| v as u64),
        });
    }

    if skipped > 0 {
        tracing::warn!("{}: skipped {} rows with unusable Date or Close", path.display(), skipped);
    }
    series.sort_by_key(|p| p.date);
    Ok(series)
}

/// One observation per pair of consecutive years present in the series.
///
/// Years are paired by position, so a year missing from the data is skipped
/// rather than bridged with a zero. A zero start price, or one so small the
/// return overflows, yields no observation.
pub fn annual_returns(ticker: &str, series: &[PricePoint]) -> Vec<AnnualReturn> {
    let mut first_of_year: BTreeMap<i32, &PricePoint> = BTreeMap::new();
    for point in series {
        first_of_year
            .entry(point.date.year())
            .and_modify(|first| {
                if point.date < first.date {
                    *first = point;
                }
            })
            .or_insert(point);
    }

    let firsts: Vec<(i32, &PricePoint)> = first_of_year.into_iter().collect();
    let mut returns = Vec::new();
    for pair in firsts.windows(2) {
        let (year, start) = pair[0];
        let (_, end) = pair[1];

        if start.close == 0.0 {
            tracing::warn!("  {} {}: start price is zero, no return computed", ticker, year);
            continue;
        }
        let annual_return_pct = (end.close - start.close) * 100.0 / start.close;
        if !annual_return_pct.is_finite() {
            tracing::warn!(
                "  {} {}: return from {} to {} is not finite, no return computed",
                ticker,
                year,
                start.close,
                end.close
            );
            continue;
        }
        tracing::info!("  {} {}: {:.2}%", ticker, year, annual_return_pct);

        returns.push(AnnualReturn {
            ticker: ticker.to_string(),
            year,
            start_date: start.date,
            end_date: end.date,
            start_price: start.close,
            end_price: end.close,
            annual_return_pct,
        });
    }

    returns
}

/// Reads every `*.csv` in `dir` and computes annual returns per ticker.
///
/// A missing directory gives empty tables. Files without a `<TICKER>` in the
/// name, or that fail to parse, are logged and skipped. Returns come back
/// sorted by (ticker, year).
pub fn process_price_dir(dir: &Path, tz: Tz) -> Result<PriceTables, AnalysisError> {
    if !dir.is_dir() {
        tracing::warn!("Price folder not found: {}", dir.display());
        return Ok(PriceTables::default());
    }

    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("csv")))
        .collect();
    files.sort();
    tracing::info!("Found {} price files in {}", files.len(), dir.display());

    let mut tables = PriceTables::default();
    for path in files {
        let file_name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        let Some(ticker) = ticker_from_file_name(&file_name) else {
            tracing::warn!("Could not extract ticker from filename: {}", file_name);
            continue;
        };

        tracing::info!("Processing {} from {}", ticker, file_name);
        match read_price_series(&path, &ticker, tz) {
            Ok(series) => {
                tables.returns.extend(annual_returns(&ticker, &series));
                tables.prices.extend(series);
            }
            Err(e) => tracing::error!("Failed to read prices for {}: {}", ticker, e),
        }
    }

    tables
        .returns
        .sort_by(|a, b| a.ticker.cmp(&b.ticker).then(a.year.cmp(&b.year)));
    Ok(tables)
}
