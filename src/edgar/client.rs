// src/edgar/client.rs
use crate::edgar::models::{AccessionNumber, CompanySubmission, FilingInfo};
use crate::utils::error::EdgarError;
use reqwest::header;
use std::time::Duration;

const COMPANY_TICKERS_URL: &str = "https://www.sec.gov/files/company_tickers.json";

/// reqwest client configured for EDGAR interaction: mandatory User-Agent and
/// a fixed delay before every request.
pub struct EdgarClient {
    http: reqwest::Client,
    user_agent: String,
    request_delay: Duration,
}

impl EdgarClient {
    pub fn new(user_agent: &str, request_delay_ms: u64) -> Result<Self, EdgarError> {
        let http = reqwest::Client::builder()
            .user_agent(user_agent) // SEC rejects anonymous clients
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            http,
            user_agent: user_agent.to_string(),
            request_delay: Duration::from_millis(request_delay_ms),
        })
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response, EdgarError> {
        tracing::debug!("GET {} (User-Agent: {})", url, self.user_agent);

        // --- Basic Rate Limiting ---
        tokio::time::sleep(self.request_delay).await;

        let response = self
            .http
            .get(url)
            .header(header::ACCEPT, "application/json,text/html,text/plain,*/*")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            tracing::error!("HTTP error status: {} for URL: {}", status, url);
            if status == reqwest::StatusCode::FORBIDDEN {
                tracing::warn!("Received 403 Forbidden - check User-Agent and rate limits.");
                return Err(EdgarError::RateLimited);
            }
            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(EdgarError::FilingDocNotFound(url.to_string()));
            }
            return Err(EdgarError::Http(status));
        }

        Ok(response)
    }

    /// Gets the zero-padded CIK (Central Index Key) for a ticker symbol
    pub async fn get_cik_from_ticker(&self, ticker: &str) -> Result<String, EdgarError> {
        let json: serde_json::Value = self.get(COMPANY_TICKERS_URL).await?.json().await?;
        cik_for_ticker(&json, ticker)
    }

    /// Fetches the company submission data for a given CIK
    pub async fn get_company_submissions(&self, cik: &str) -> Result<CompanySubmission, EdgarError> {
        let url = format!("https://data.sec.gov/submissions/CIK{}.json", cik);
        let submission: CompanySubmission = self.get(&url).await?.json().await?;
        Ok(submission)
    }

    /// Finds annual filings (any of `forms`) for a ticker whose filing year lies in the range
    pub async fn find_annual_filings(
        &self,
        ticker: &str,
        forms: &[String],
        start_year: Option<i32>,
        end_year: Option<i32>,
    ) -> Result<Vec<FilingInfo>, EdgarError> {
        let cik = self.get_cik_from_ticker(ticker).await?;
        let submissions = self.get_company_submissions(&cik).await?;
        select_annual_filings(ticker, &cik, &submissions, forms, start_year, end_year)
    }

    /// Downloads the full submission text (header plus every document) of a filing.
    pub async fn download_full_submission(&self, filing: &FilingInfo) -> Result<String, EdgarError> {
        let url = filing.full_submission_url();
        tracing::info!("Downloading {} {} from: {}", filing.ticker, filing.accession_number, url);

        let body = self.get(&url).await?.text().await?;
        tracing::debug!("Successfully downloaded {} bytes from {}", body.len(), url);
        Ok(body)
    }
}

/// Looks a ticker up in the `company_tickers.json` document.
pub fn cik_for_ticker(json: &serde_json::Value, ticker: &str) -> Result<String, EdgarError> {
    let ticker = ticker.to_uppercase();
    let companies = json
        .as_object()
        .ok_or_else(|| EdgarError::Parse("Invalid company tickers structure".to_string()))?;

    for company in companies.values() {
        let matches = company
            .get("ticker")
            .and_then(|t| t.as_str())
            .is_some_and(|t| t.eq_ignore_ascii_case(&ticker));
        if matches {
            let cik_num = company
                .get("cik_str")
                .and_then(|c| c.as_u64())
                .ok_or_else(|| EdgarError::Parse(format!("Invalid CIK format for {}", ticker)))?;
            // Format CIK with leading zeros to 10 digits
            return Ok(format!("{:010}", cik_num));
        }
    }

    Err(EdgarError::CikNotFound(ticker))
}

/// Picks the annual filings out of a submission index, newest first.
pub fn select_annual_filings(
    ticker: &str,
    cik: &str,
    submissions: &CompanySubmission,
    forms: &[String],
    start_year: Option<i32>,
    end_year: Option<i32>,
) -> Result<Vec<FilingInfo>, EdgarError> {
    let recent = &submissions.filings.recent;
    let mut filings = Vec::new();

    for (i, form) in recent.form.iter().enumerate() {
        if !forms.iter().any(|f| f == form) {
            continue;
        }

        let filing_date = recent
            .filing_date
            .get(i)
            .ok_or_else(|| EdgarError::Parse("Missing filing date".to_string()))?;
        let year = filing_date
            .get(0..4)
            .and_then(|y| y.parse::<i32>().ok())
            .ok_or_else(|| EdgarError::Parse(format!("Invalid filing date '{}'", filing_date)))?;

        if start_year.is_some_and(|start| year < start) || end_year.is_some_and(|end| year > end) {
            continue;
        }

        let raw_accession = recent
            .accession_number
            .get(i)
            .ok_or_else(|| EdgarError::Parse("Missing accession number".to_string()))?;
        let Some(accession_number) = AccessionNumber::parse(raw_accession) else {
            tracing::warn!("Skipping filing with malformed accession number '{}'", raw_accession);
            continue;
        };

        filings.push(FilingInfo {
            accession_number,
            filing_date: filing_date.clone(),
            form_type: form.clone(),
            ticker: ticker.to_uppercase(),
            company_name: submissions.name.clone(),
            cik: cik.to_string(),
            year,
        });
    }

    // Sort by year (newest first)
    filings.sort_by(|a, b| b.year.cmp(&a.year));

    Ok(filings)
}
