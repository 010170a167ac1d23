// src/analysis/filings.rs
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::storage::models::FilingMetadataStore;
use crate::storage::Tabular;

/// One filing per (ticker, year).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilingRow {
    pub ticker: String,
    pub year: i32,
    pub accession_number: Option<String>,
    pub filing_type: Option<String>,
    pub filed_date: Option<NaiveDate>,
    pub period_end: Option<NaiveDate>,
    pub acceptance_datetime: Option<NaiveDateTime>,
    pub company_name: Option<String>,
    pub cik: Option<String>,
    pub state_incorporation: Option<String>,
}

impl Tabular for FilingRow {
    const COLUMNS: &'static [&'static str] = &[
        "ticker",
        "year",
        "accession_number",
        "filing_type",
        "filed_date",
        "period_end",
        "acceptance_datetime",
        "company_name",
        "cik",
        "state_incorporation",
    ];
}

/// Flattens `ticker -> year -> metadata` into rows.
///
/// Year keys that are not integers are skipped with a warning. Dates that are
/// absent or unparsable become `None`.
pub fn build_filing_table(store: &FilingMetadataStore) -> Vec<FilingRow> {
    let mut rows = Vec::new();

    for (ticker, years) in store {
        for (year_key, meta) in years {
            let Some(year) = parse_year(year_key) else {
                tracing::warn!("Skipping filing {} '{}': year key is not an integer", ticker, year_key);
                continue;
            };

            rows.push(FilingRow {
                ticker: ticker.clone(),
                year,
                accession_number: meta.accession_number.clone(),
                filing_type: meta.filing_type.clone(),
                filed_date: parse_date(meta.dates.filed_date.as_deref()),
                period_end: parse_date(meta.dates.period_end.as_deref()),
                acceptance_datetime: parse_datetime(meta.dates.acceptance_datetime.as_deref()),
                company_name: meta.company_info.company_name.clone(),
                cik: meta.company_info.cik.clone(),
                state_incorporation: meta.company_info.state_incorporation.clone(),
            });
        }
    }

    rows
}

pub(crate) fn parse_year(raw: &str) -> Option<i32> {
    raw.trim().parse::<i32>().ok()
}

/// Accepts `YYYY-MM-DD`, `YYYYMMDD`, or a timestamp whose date part is `YYYY-MM-DD`.
pub(crate) fn parse_date(raw: Option<&str>) -> Option<NaiveDate> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }

    let parsed = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y%m%d"))
        .ok()
        .or_else(|| parse_datetime(Some(raw)).map(|dt| dt.date()));
    if parsed.is_none() {
        tracing::warn!("Unparsable date '{}', storing null", raw);
    }
    parsed
}

pub(crate) fn parse_datetime(raw: Option<&str>) -> Option<NaiveDateTime> {
    let raw = raw?.trim();
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y%m%d%H%M%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> FilingMetadataStore {
        serde_json::from_value(json!({
            "EXPE": {
                "2020": {
                    "accession_number": "0001324424-20-000004",
                    "filing_type": "10-K",
                    "dates": {"filed_date": "2020-02-14", "period_end": "2019-12-31",
                              "acceptance_datetime": "2020-02-13 18:02:11"},
                    "company_info": {"company_name": "Expedia Group, Inc.", "cik": "0001324424",
                                     "sic_code": "4700", "state_incorporation": "DE", "fiscal_year_end": "1231"}
                },
                "2021": {"dates": {"filed_date": "not a date"}}
            },
            "TRVG": {
                "20xx": {"dates": {"filed_date": "2019-03-01"}},
                "2019": {"dates": {"filed_date": null}}
            }
        }))
        .unwrap()
    }

    #[test]
    fn one_row_per_ticker_year() {
        let rows = build_filing_table(&store());
        let keys: Vec<(&str, i32)> = rows.iter().map(|r| (r.ticker.as_str(), r.year)).collect();
        assert_eq!(keys, vec![("EXPE", 2020), ("EXPE", 2021), ("TRVG", 2019)]);

        let expe = &rows[0];
        assert_eq!(expe.filed_date, NaiveDate::from_ymd_opt(2020, 2, 14));
        assert_eq!(expe.period_end, NaiveDate::from_ymd_opt(2019, 12, 31));
        assert_eq!(
            expe.acceptance_datetime,
            NaiveDate::from_ymd_opt(2020, 2, 13).and_then(|d| d.and_hms_opt(18, 2, 11))
        );
        assert_eq!(expe.state_incorporation.as_deref(), Some("DE"));
    }

    #[test]
    fn bad_or_missing_dates_become_null() {
        let rows = build_filing_table(&store());
        assert_eq!(rows[1].filed_date, None);
        assert_eq!(rows[2].filed_date, None);
    }

    #[test]
    fn empty_store_gives_empty_table() {
        assert!(build_filing_table(&FilingMetadataStore::new()).is_empty());
    }

    #[test]
    fn date_formats() {
        let d = NaiveDate::from_ymd_opt(2021, 2, 12);
        assert_eq!(parse_date(Some("2021-02-12")), d);
        assert_eq!(parse_date(Some("20210212")), d);
        assert_eq!(parse_date(Some("2021-02-12 09:30:00")), d);
        assert_eq!(parse_date(Some("")), None);
        assert_eq!(parse_date(None), None);
    }

    #[test]
    fn filing_table_survives_csv_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = crate::storage::StorageManager::new(dir.path()).unwrap();
        let rows = build_filing_table(&store());

        storage.save_csv("df_filings.csv", &rows).unwrap();
        let reloaded: Vec<FilingRow> = storage.load_csv("df_filings.csv").unwrap();
        assert_eq!(reloaded, rows);
        assert!(reloaded[0].acceptance_datetime.is_some());
        assert!(reloaded[1].company_name.is_none());
    }
}
