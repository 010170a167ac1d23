// src/extractors/mentions.rs
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::{ClassifierConfig, PipelineConfig};
use crate::extractors::content::{read_filing_content, truncate_chars};
use crate::extractors::header::{extract_dates, read_header};
use crate::storage::models::{MentionRecord, MentionRecordStore};
use crate::storage::FilingStore;
use crate::utils::error::{ExtractError, StorageError};

const SYSTEM_PROMPT: &str =
    "You are a financial analyst expert at analyzing SEC filings. Return only valid JSON.";

/// Counts how often competitors are mentioned in a filing's text.
///
/// Implementations return `mentioned ticker -> count`; tickers that are not
/// mentioned may be omitted.
#[allow(async_fn_in_trait)]
pub trait MentionClassifier {
    async fn count_mentions(
        &self,
        content: &str,
        filing_ticker: &str,
    ) -> Result<BTreeMap<String, u64>, ExtractError>;
}

/// Chat-completions classifier (OpenAI-compatible endpoint).
pub struct OpenAiClassifier {
    http: reqwest::Client,
    settings: ClassifierConfig,
    api_key: String,
    companies: BTreeMap<String, Vec<String>>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    content: Option<String>,
}

impl OpenAiClassifier {
    pub fn new(config: &PipelineConfig, api_key: String) -> Result<Self, ExtractError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()?;
        let companies = config
            .companies
            .iter()
            .map(|(ticker, company)| (ticker.clone(), company.names.clone()))
            .collect();

        Ok(Self {
            http,
            settings: config.classifier.clone(),
            api_key,
            companies,
        })
    }
}

impl MentionClassifier for OpenAiClassifier {
    async fn count_mentions(
        &self,
        content: &str,
        filing_ticker: &str,
    ) -> Result<BTreeMap<String, u64>, ExtractError> {
        let targets: BTreeMap<String, Vec<String>> = self
            .companies
            .iter()
            .filter(|(ticker, _)| !ticker.eq_ignore_ascii_case(filing_ticker))
            .map(|(ticker, names)| (ticker.clone(), names.clone()))
            .collect();
        let prompt = build_prompt(content, &targets, self.settings.max_content_chars);

        let request = ChatRequest {
            model: &self.settings.model,
            messages: vec![
                ChatMessage { role: "system", content: SYSTEM_PROMPT },
                ChatMessage { role: "user", content: &prompt },
            ],
            max_tokens: self.settings.max_tokens,
            temperature: 0.0,
        };

        let response = self
            .http
            .post(&self.settings.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExtractError::ClassifierStatus(status));
        }

        let body: ChatResponse = response.json().await?;
        let reply = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ExtractError::ClassifierResponse("response has no message content".to_string()))?;

        parse_classifier_response(&reply)
    }
}

/// Builds the user prompt listing every target company's brand names.
pub fn build_prompt(content: &str, targets: &BTreeMap<String, Vec<String>>, max_chars: usize) -> String {
    let company_list = targets
        .iter()
        .map(|(ticker, names)| format!("{}: {}", ticker, names.join(", ")))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "\nAnalyze the following SEC filing text and count how many times each of these companies is mentioned:\n\n\
         {}\n\n\
         For each company, count all mentions of any of their brand names or variations. \
         Return the results as a JSON object with ticker symbols as keys and counts as values. \
         Only include companies that are mentioned at least once.\n\n\
         Here's the filing text (truncated if too long):\n{}...\n",
        company_list,
        truncate_chars(content, max_chars)
    )
}

/// Parses the model's reply into counts. A ```json fence is tolerated; values
/// that are not non-negative integers (or digit strings) are dropped.
pub fn parse_classifier_response(reply: &str) -> Result<BTreeMap<String, u64>, ExtractError> {
    let mut text = reply.trim();
    if let Some(rest) = text.strip_prefix("```json").or_else(|| text.strip_prefix("```")) {
        text = rest.trim_end().strip_suffix("```").unwrap_or(rest).trim();
    }

    let value: Value = serde_json::from_str(text)
        .map_err(|e| ExtractError::ClassifierResponse(format!("{}: {}", e, text)))?;
    let Value::Object(map) = value else {
        return Err(ExtractError::ClassifierResponse(format!("expected a JSON object, got: {}", text)));
    };

    Ok(map
        .into_iter()
        .filter_map(|(ticker, count)| {
            let count = match count {
                Value::Number(n) => n.as_u64(),
                Value::String(s) if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) => s.parse().ok(),
                _ => None,
            }?;
            Some((ticker, count))
        })
        .collect())
}

/// Runs the classifier over every stored filing of every configured company.
///
/// A filing that cannot be read or classified is logged and left out; it
/// does not stop the remaining filings.
pub async fn extract_all_mentions<C: MentionClassifier>(
    classifier: &C,
    config: &PipelineConfig,
    store: &FilingStore,
) -> Result<MentionRecordStore, StorageError> {
    let mut all_results = MentionRecordStore::new();

    for ticker in config.tickers() {
        tracing::info!("=== Extracting mentions for {} ===", ticker);
        let mut years = BTreeMap::new();

        for filing in store.filings_for(ticker)? {
            let year = filing.year();
            tracing::info!("  Processing {} {} filing ({})", ticker, year, filing.accession);

            let content = match read_filing_content(&filing) {
                Ok(content) => content,
                Err(e) => {
                    tracing::warn!("  Skipping {} {}: {}", ticker, year, e);
                    continue;
                }
            };
            let mentions = match classifier.count_mentions(&content, ticker).await {
                Ok(mentions) => mentions,
                Err(e) => {
                    tracing::error!("  Classifier failed for {} {}: {}", ticker, year, e);
                    continue;
                }
            };
            tracing::info!("    Found mentions: {:?}", mentions);

            let dates = read_header(&filing)
                .map(|header| extract_dates(&header))
                .unwrap_or_default();
            years.insert(
                year.to_string(),
                MentionRecord {
                    accession_number: Some(filing.accession.to_string()),
                    filing_type: Some(filing.filing_type.clone()),
                    competitor_mentions: mentions,
                    dates,
                },
            );
        }

        if !years.is_empty() {
            all_results.insert(ticker.to_uppercase(), years);
        }
    }

    Ok(all_results)
}
