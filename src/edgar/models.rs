// src/edgar/models.rs
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

// NNNNNNNNNN-YY-NNNNNN: filer id, two-digit year, sequence
static ACCESSION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{10}-(\d{2})-\d{6}$").expect("Failed to compile ACCESSION_RE")
});

/// SEC accession number in dashed form, e.g. `0001075531-21-000009`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccessionNumber(String);

impl AccessionNumber {
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        ACCESSION_RE.is_match(raw).then(|| Self(raw.to_string()))
    }

    /// Filing year encoded in the accession number ("20" + YY).
    pub fn year(&self) -> i32 {
        // Validated by ACCESSION_RE, the two digits always sit at 11..13.
        2000 + self.0[11..13].parse::<i32>().unwrap_or_default()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn without_dashes(&self) -> String {
        self.0.replace('-', "")
    }
}

impl fmt::Display for AccessionNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for AccessionNumber {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        AccessionNumber::parse(&value).ok_or_else(|| format!("invalid accession number '{}'", value))
    }
}

impl From<AccessionNumber> for String {
    fn from(value: AccessionNumber) -> Self {
        value.0
    }
}

/// The parts of the EDGAR company submission index we use.
/// Example: https://data.sec.gov/submissions/CIK0000320193.json
#[derive(Debug, Deserialize)]
pub struct CompanySubmission {
    pub name: String,
    pub filings: Filings,
}

#[derive(Debug, Deserialize)]
pub struct Filings {
    pub recent: FilingsList,
}

/// Column-oriented listing: index `i` of every vector describes the same filing.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilingsList {
    pub accession_number: Vec<String>,
    pub filing_date: Vec<String>,
    pub form: Vec<String>,
}

/// One annual filing selected for download
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilingInfo {
    pub accession_number: AccessionNumber,
    pub filing_date: String,
    pub form_type: String,
    pub ticker: String,
    pub company_name: String,
    pub cik: String,
    pub year: i32, // Year of the filing date
}

impl FilingInfo {
    /// URL of the complete submission text file (SEC header + all documents).
    pub fn full_submission_url(&self) -> String {
        format!(
            "https://www.sec.gov/Archives/edgar/data/{}/{}/{}.txt",
            self.cik.trim_start_matches('0'),
            self.accession_number.without_dashes(),
            self.accession_number
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accession_year_is_prefixed_with_20() {
        let acc = AccessionNumber::parse("0001075531-21-000009").unwrap();
        assert_eq!(acc.year(), 2021);
        assert_eq!(acc.without_dashes(), "000107553121000009");

        assert_eq!(AccessionNumber::parse(" 0001193125-09-012345 ").unwrap().year(), 2009);
    }

    #[test]
    fn rejects_malformed_accessions() {
        assert!(AccessionNumber::parse("full-submission").is_none());
        assert!(AccessionNumber::parse("0001075531-2021-000009").is_none());
        assert!(AccessionNumber::parse("1075531-21-000009").is_none());
    }

    #[test]
    fn full_submission_url_strips_cik_padding() {
        let info = FilingInfo {
            accession_number: AccessionNumber::parse("0001075531-21-000009").unwrap(),
            filing_date: "2021-02-25".to_string(),
            form_type: "10-K".to_string(),
            ticker: "BKNG".to_string(),
            company_name: "Booking Holdings Inc.".to_string(),
            cik: "0001075531".to_string(),
            year: 2021,
        };
        assert_eq!(
            info.full_submission_url(),
            "https://www.sec.gov/Archives/edgar/data/1075531/000107553121000009/0001075531-21-000009.txt"
        );
    }

    #[test]
    fn filings_list_reads_camel_case_columns() {
        let json = r#"{
            "accessionNumber": ["0001075531-21-000009"],
            "filingDate": ["2021-02-25"],
            "reportDate": ["2020-12-31"],
            "form": ["10-K"],
            "primaryDocument": ["bkng-20201231.htm"],
            "size": [123]
        }"#;
        let list: FilingsList = serde_json::from_str(json).unwrap();
        assert_eq!(list.accession_number.len(), 1);
        assert_eq!(list.form[0], "10-K");
    }
}
