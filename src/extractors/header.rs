// src/extractors/header.rs
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::storage::models::{CompanyInfo, FilingDates, FilingMetadata, FilingMetadataStore};
use crate::storage::{FilingStore, StoredFiling};
use crate::utils::error::{ExtractError, StorageError};

// The SEC header always sits in the first few KB of a full submission.
const HEADER_BYTES: u64 = 5000;

// --- Regex Patterns for SEC header fields (Lazy Static) ---
static FILED_DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"FILED AS OF DATE:\s+(\d{4})(\d{2})(\d{2})").expect("Failed to compile FILED_DATE_RE")
});

static PERIOD_END_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"CONFORMED PERIOD OF REPORT:\s+(\d{4})(\d{2})(\d{2})")
        .expect("Failed to compile PERIOD_END_RE")
});

static ACCEPTANCE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<ACCEPTANCE-DATETIME>(\d{4})(\d{2})(\d{2})(\d{2})(\d{2})(\d{2})")
        .expect("Failed to compile ACCEPTANCE_RE")
});

static COMPANY_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"COMPANY CONFORMED NAME:\s+(.+)").expect("Failed to compile COMPANY_NAME_RE")
});

static CIK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"CENTRAL INDEX KEY:\s+(\d+)").expect("Failed to compile CIK_RE")
});

static SIC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"STANDARD INDUSTRIAL CLASSIFICATION:\s+(.+?)\s+\[(\d+)\]")
        .expect("Failed to compile SIC_RE")
});

static STATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"STATE OF INCORPORATION:\s+(\w+)").expect("Failed to compile STATE_RE")
});

static FISCAL_YEAR_END_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"FISCAL YEAR END:\s+(\d+)").expect("Failed to compile FISCAL_YEAR_END_RE")
});

/// Pulls the filed date, period end and acceptance timestamp out of a header.
/// Dates come out as `YYYY-MM-DD`, the timestamp as `YYYY-MM-DD HH:MM:SS`.
pub fn extract_dates(header: &str) -> FilingDates {
    let ymd = |re: &Regex| {
        re.captures(header)
            .map(|c| format!("{}-{}-{}", &c[1], &c[2], &c[3]))
    };

    FilingDates {
        filed_date: ymd(&*FILED_DATE_RE),
        period_end: ymd(&*PERIOD_END_RE),
        acceptance_datetime: ACCEPTANCE_RE.captures(header).map(|c| {
            format!("{}-{}-{} {}:{}:{}", &c[1], &c[2], &c[3], &c[4], &c[5], &c[6])
        }),
    }
}

pub fn extract_company_info(header: &str) -> CompanyInfo {
    let group = |re: &Regex, idx: usize| {
        re.captures(header)
            .and_then(|c| c.get(idx))
            .map(|m| m.as_str().trim().to_string())
            .filter(|s| !s.is_empty())
    };

    CompanyInfo {
        company_name: group(&*COMPANY_NAME_RE, 1),
        cik: group(&*CIK_RE, 1),
        sic_code: group(&*SIC_RE, 2),
        state_incorporation: group(&*STATE_RE, 1),
        fiscal_year_end: group(&*FISCAL_YEAR_END_RE, 1),
    }
}

/// Reads the header portion of a stored submission.
pub fn read_header(filing: &StoredFiling) -> Result<String, ExtractError> {
    let read_err = |source: std::io::Error| ExtractError::Read {
        path: filing.path.display().to_string(),
        source,
    };

    let mut buf = Vec::new();
    File::open(&filing.path)
        .map_err(read_err)?
        .take(HEADER_BYTES)
        .read_to_end(&mut buf)
        .map_err(read_err)?;

    Ok(String::from_utf8_lossy(&buf).into_owned())
}

pub fn extract_filing_metadata(filing: &StoredFiling) -> Result<FilingMetadata, ExtractError> {
    let header = read_header(filing)?;
    Ok(FilingMetadata {
        accession_number: Some(filing.accession.to_string()),
        filing_type: Some(filing.filing_type.clone()),
        dates: extract_dates(&header),
        company_info: extract_company_info(&header),
    })
}

/// Builds the filing metadata store for every ticker in `tickers`.
///
/// An unreadable filing is logged and left out; tickers with no filings are
/// omitted from the result.
pub fn extract_all_dates<'a>(
    store: &FilingStore,
    tickers: impl IntoIterator<Item = &'a str>,
) -> Result<FilingMetadataStore, StorageError> {
    let mut all_results = FilingMetadataStore::new();

    for ticker in tickers {
        tracing::info!("=== Extracting filing dates for {} ===", ticker);
        let mut years = BTreeMap::new();

        for filing in store.filings_for(ticker)? {
            let year = filing.year();
            match extract_filing_metadata(&filing) {
                Ok(meta) => {
                    tracing::info!(
                        "  {} {}: filed {:?}, period end {:?}",
                        ticker,
                        year,
                        meta.dates.filed_date,
                        meta.dates.period_end
                    );
                    if years.insert(year.to_string(), meta).is_some() {
                        tracing::warn!("  {} has more than one filing for {}, keeping {}", ticker, year, filing.accession);
                    }
                }
                Err(e) => tracing::error!("  Failed to extract header of {}: {}", filing.path.display(), e),
            }
        }

        if !years.is_empty() {
            all_results.insert(ticker.to_uppercase(), years);
        }
    }

    Ok(all_results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edgar::models::AccessionNumber;

    const HEADER: &str = "<SEC-DOCUMENT>0001324424-21-000010.txt : 20210212
<SEC-HEADER>0001324424-21-000010.hdr.sgml : 20210212
<ACCEPTANCE-DATETIME>20210211185006
ACCESSION NUMBER:\t\t0001324424-21-000010
CONFORMED SUBMISSION TYPE:\t10-K
CONFORMED PERIOD OF REPORT:\t20201231
FILED AS OF DATE:\t\t20210212

FILER:

\tCOMPANY DATA:\t
\t\tCOMPANY CONFORMED NAME:\t\t\tExpedia Group, Inc.
\t\tCENTRAL INDEX KEY:\t\t\t0001324424
\t\tSTANDARD INDUSTRIAL CLASSIFICATION:\tSERVICES-TRAVEL AGENCIES [4700]
\t\tSTATE OF INCORPORATION:\t\t\tDE
\t\tFISCAL YEAR END:\t\t\t1231
</SEC-HEADER>";

    #[test]
    fn parses_header_dates() {
        let dates = extract_dates(HEADER);
        assert_eq!(dates.filed_date.as_deref(), Some("2021-02-12"));
        assert_eq!(dates.period_end.as_deref(), Some("2020-12-31"));
        assert_eq!(dates.acceptance_datetime.as_deref(), Some("2021-02-11 18:50:06"));
    }

    #[test]
    fn parses_company_info() {
        let info = extract_company_info(HEADER);
        assert_eq!(info.company_name.as_deref(), Some("Expedia Group, Inc."));
        assert_eq!(info.cik.as_deref(), Some("0001324424"));
        assert_eq!(info.sic_code.as_deref(), Some("4700"));
        assert_eq!(info.state_incorporation.as_deref(), Some("DE"));
        assert_eq!(info.fiscal_year_end.as_deref(), Some("1231"));
    }

    #[test]
    fn absent_fields_stay_none() {
        let dates = extract_dates("FILED AS OF DATE: 2021");
        assert_eq!(dates, FilingDates::default());
        assert_eq!(extract_company_info("nothing here"), CompanyInfo::default());
    }

    #[test]
    fn builds_store_keyed_by_accession_year() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilingStore::new(dir.path());
        let acc = AccessionNumber::parse("0001324424-21-000010").unwrap();
        store.save_submission("EXPE", "10-K", &acc, HEADER).unwrap();

        let result = extract_all_dates(&store, ["EXPE", "TRIP"]).unwrap();
        assert_eq!(result.len(), 1);
        let meta = &result["EXPE"]["2021"];
        assert_eq!(meta.accession_number.as_deref(), Some("0001324424-21-000010"));
        assert_eq!(meta.filing_type.as_deref(), Some("10-K"));
        assert_eq!(meta.dates.filed_date.as_deref(), Some("2021-02-12"));
    }
}
