// src/pipeline.rs
//! Pipeline stages. Each stage reads its inputs from the data directory and
//! persists its outputs there, so any stage can be rerun on its own.
use crate::analysis::regression::RegressionOutput;
use crate::analysis::{
    aggregate_mentions, assemble_regression_input, build_filing_table, build_mention_table,
    join_filings_mentions, process_price_dir, regression_results, AggregatedMentionRow, AnnualReturn,
};
use crate::config::{
    PipelineConfig, ANNUAL_RETURNS_FILE, COMPANY_MENTIONS_FILE, FILINGS_TABLE_FILE, FILING_DATES_FILE,
    FILING_MENTIONS_FILE, MENTIONS_AGG_FILE, REGRESSION_RESULTS_FILE, REGRESSION_SUMMARY_FILE,
};
use crate::edgar::EdgarClient;
use crate::extractors::header::extract_all_dates;
use crate::extractors::mentions::extract_all_mentions;
use crate::extractors::{MentionClassifier, OpenAiClassifier};
use crate::storage::models::{FilingMetadataStore, MentionRecordStore, MentionStore};
use crate::storage::{FilingStore, StorageManager};
use crate::utils::AppError;

#[derive(Debug, Default, PartialEq)]
pub struct DownloadSummary {
    pub downloaded: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Downloads every annual filing of `tickers` in the configured year range.
///
/// Filings already on disk are skipped. A failed lookup or download is
/// logged and counted; it does not stop the other tickers.
pub async fn download(config: &PipelineConfig, tickers: &[String]) -> Result<DownloadSummary, AppError> {
    let client = EdgarClient::new(&config.edgar_user_agent, config.edgar_request_delay_ms)?;
    let store = FilingStore::new(config.filings_dir());
    let mut summary = DownloadSummary::default();

    for ticker in tickers {
        tracing::info!("=== Downloading {} filings for {} ===", config.annual_forms.join("/"), ticker);
        let filings = match client
            .find_annual_filings(ticker, &config.annual_forms, config.start_year, config.end_year)
            .await
        {
            Ok(filings) => filings,
            Err(e) => {
                tracing::error!("Failed to list filings for {}: {}", ticker, e);
                summary.failed += 1;
                continue;
            }
        };
        tracing::info!("Found {} annual filings for {}", filings.len(), ticker);

        for filing in filings {
            if store.contains(&filing.ticker, &filing.form_type, &filing.accession_number) {
                tracing::debug!("Already have {} {}, skipping", filing.ticker, filing.accession_number);
                summary.skipped += 1;
                continue;
            }

            let saved = match client.download_full_submission(&filing).await {
                Ok(content) => store
                    .save_submission(&filing.ticker, &filing.form_type, &filing.accession_number, &content)
                    .map_err(AppError::from),
                Err(e) => Err(AppError::from(e)),
            };
            match saved {
                Ok(_) => summary.downloaded += 1,
                Err(e) => {
                    tracing::error!("Failed to fetch {} {} ({}): {}", filing.ticker, filing.year, filing.accession_number, e);
                    summary.failed += 1;
                }
            }
        }
    }

    tracing::info!(
        "Download finished. Downloaded: {}, already present: {}, failures: {}",
        summary.downloaded,
        summary.skipped,
        summary.failed
    );
    Ok(summary)
}

/// Reads the SEC header of every stored filing and writes `filing_dates.json`.
pub fn extract_dates(config: &PipelineConfig, storage: &StorageManager) -> Result<FilingMetadataStore, AppError> {
    let store = FilingStore::new(config.filings_dir());
    let dates = extract_all_dates(&store, config.tickers())?;
    storage.save_json(FILING_DATES_FILE, &dates)?;
    Ok(dates)
}

/// Classifies every stored filing with the chat-completions classifier and
/// writes `company_mentions.json`. Requires `OPENAI_API_KEY`.
pub async fn extract_mentions(config: &PipelineConfig, storage: &StorageManager) -> Result<MentionRecordStore, AppError> {
    let api_key = config
        .classifier
        .api_key
        .clone()
        .ok_or_else(|| AppError::Config("OPENAI_API_KEY is not set".to_string()))?;
    let classifier = OpenAiClassifier::new(config, api_key)?;
    extract_mentions_with(&classifier, config, storage).await
}

pub async fn extract_mentions_with<C: MentionClassifier>(
    classifier: &C,
    config: &PipelineConfig,
    storage: &StorageManager,
) -> Result<MentionRecordStore, AppError> {
    let store = FilingStore::new(config.filings_dir());
    let mentions = extract_all_mentions(classifier, config, &store).await?;
    storage.save_json(COMPANY_MENTIONS_FILE, &mentions)?;
    Ok(mentions)
}

/// Builds the filing and mention tables, joins and aggregates them.
/// Writes `df_filings.csv`, `df_filing_mentions.csv` and `df_mentions_agg.csv`.
pub fn mention_tables(storage: &StorageManager) -> Result<Vec<AggregatedMentionRow>, AppError> {
    let filing_dates: FilingMetadataStore = storage.load_json(FILING_DATES_FILE)?;
    let company_mentions: MentionStore = storage.load_json(COMPANY_MENTIONS_FILE)?;

    let filings = build_filing_table(&filing_dates);
    let mentions = build_mention_table(&company_mentions, &filing_dates);
    tracing::info!("Built {} filing rows and {} mention rows", filings.len(), mentions.len());

    let joined = join_filings_mentions(&filings, &mentions);
    let aggregated = aggregate_mentions(&joined);

    storage.save_csv(FILINGS_TABLE_FILE, &filings)?;
    storage.save_csv(FILING_MENTIONS_FILE, &joined)?;
    storage.save_csv(MENTIONS_AGG_FILE, &aggregated)?;
    Ok(aggregated)
}

/// Computes annual returns from the price directory and writes `annual_stock_return.csv`.
pub fn returns(config: &PipelineConfig, storage: &StorageManager) -> Result<Vec<AnnualReturn>, AppError> {
    let tz = config.reference_tz()?;
    let tables = process_price_dir(&config.price_dir(), tz)?;
    tracing::info!(
        "Read {} price rows, computed {} annual returns",
        tables.prices.len(),
        tables.returns.len()
    );

    storage.save_csv(ANNUAL_RETURNS_FILE, &tables.returns)?;
    Ok(tables.returns)
}

/// Regresses year-demeaned returns on mention counts from the persisted tables.
pub fn regress(storage: &StorageManager) -> Result<RegressionOutput, AppError> {
    let returns: Vec<AnnualReturn> = storage.load_csv(ANNUAL_RETURNS_FILE)?;
    let mentions: Vec<AggregatedMentionRow> = storage.load_csv(MENTIONS_AGG_FILE)?;

    let inputs = assemble_regression_input(&returns, &mentions);
    let output = regression_results(&inputs)?;

    storage.save_csv(REGRESSION_RESULTS_FILE, &output.rows)?;
    storage.save_json(REGRESSION_SUMMARY_FILE, &output.summary())?;
    Ok(output)
}

/// Runs mentions, returns and regress in order. Every stage runs even when
/// an earlier one failed; only a failure of all three is an error.
pub fn analyze(config: &PipelineConfig, storage: &StorageManager) -> Result<(), AppError> {
    let outcomes = [
        ("mentions", mention_tables(storage).map(|_| ())),
        ("returns", returns(config, storage).map(|_| ())),
        ("regress", regress(storage).map(|_| ())),
    ];

    let mut failed = 0;
    for (stage, outcome) in &outcomes {
        match outcome {
            Ok(()) => tracing::info!("Stage {} completed", stage),
            Err(e) => {
                tracing::error!("Stage {} failed: {}", stage, e);
                failed += 1;
            }
        }
    }

    if failed == outcomes.len() {
        return Err(AppError::Processing("Every analysis stage failed".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::regression::RegressionResultRow;
    use crate::edgar::models::AccessionNumber;
    use serde_json::json;
    use std::fs;

    fn setup() -> (tempfile::TempDir, PipelineConfig, StorageManager) {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig {
            data_dir: dir.path().to_path_buf(),
            ..PipelineConfig::default()
        };
        let storage = StorageManager::new(&config.data_dir).unwrap();
        (dir, config, storage)
    }

    fn write_prices(config: &PipelineConfig, ticker: &str, closes: [f64; 3]) {
        let price_dir = config.price_dir();
        fs::create_dir_all(&price_dir).unwrap();
        let body = format!(
            "Date,Open,High,Low,Close,Volume\n2019-01-02,0,0,0,{},1\n2020-01-02,0,0,0,{},1\n2021-01-04,0,0,0,{},1\n",
            closes[0], closes[1], closes[2]
        );
        fs::write(price_dir.join(format!("daily_<{}>.csv", ticker)), body).unwrap();
    }

    #[test]
    fn analyze_runs_end_to_end() {
        let (_dir, config, storage) = setup();
        storage
            .save_json(
                FILING_DATES_FILE,
                &json!({
                    "BKNG": {"2019": {"dates": {"filed_date": "2019-02-26"}}},
                    "EXPE": {"2019": {"dates": {"filed_date": "2019-02-08"}}}
                }),
            )
            .unwrap();
        storage
            .save_json(
                COMPANY_MENTIONS_FILE,
                &json!({
                    "BKNG": {"2019": {"EXPE": 3, "TRIP": 1, "TRVG": 0}},
                    "EXPE": {"2019": {"competitor_mentions": {"BKNG": 2}, "dates": {"filed_date": "2019-02-08"}}},
                    "TRIP": {"2020": {"BKNG": 5}}
                }),
            )
            .unwrap();
        write_prices(&config, "BKNG", [100.0, 110.0, 99.0]);
        write_prices(&config, "EXPE", [50.0, 60.0, 30.0]);
        write_prices(&config, "TRIP", [40.0, 38.0, 19.0]);

        analyze(&config, &storage).unwrap();

        let aggregated: Vec<AggregatedMentionRow> = storage.load_csv(MENTIONS_AGG_FILE).unwrap();
        assert_eq!(aggregated.iter().map(|r| r.num_mention).sum::<u64>(), 11);

        let returns: Vec<AnnualReturn> = storage.load_csv(ANNUAL_RETURNS_FILE).unwrap();
        assert_eq!(returns.len(), 6);
        assert_eq!(returns[0].ticker, "BKNG");
        assert_eq!(returns[0].annual_return_pct, 10.0);

        let results: Vec<RegressionResultRow> = storage.load_csv(REGRESSION_RESULTS_FILE).unwrap();
        assert_eq!(results.len(), 6);
        let bkng_2020 = results.iter().find(|r| r.ticker == "BKNG" && r.year == 2020).unwrap();
        assert_eq!(bkng_2020.num_mention, 5);
        let trip_2020 = results.iter().find(|r| r.ticker == "TRIP" && r.year == 2020).unwrap();
        assert_eq!(trip_2020.num_mention, 0);

        let year_sum: f64 = results.iter().filter(|r| r.year == 2019).map(|r| r.res_return).sum();
        assert!(year_sum.abs() < 1e-9);
        assert!(storage.path(REGRESSION_SUMMARY_FILE).is_file());
    }

    #[test]
    fn mention_tables_survive_odd_filing_fields() {
        let (_dir, _config, storage) = setup();
        storage
            .save_json(
                FILING_DATES_FILE,
                &json!({
                    "BKNG": {"2019": {"dates": {"filed_date": 20190226}}},
                    "EXPE": {"2019": {"dates": null, "company_info": null}}
                }),
            )
            .unwrap();
        storage
            .save_json(
                COMPANY_MENTIONS_FILE,
                &json!({"BKNG": {"2019": {"EXPE": 2}}, "EXPE": {"2019": {"BKNG": 4}}}),
            )
            .unwrap();

        let aggregated = mention_tables(&storage).unwrap();

        let expe = aggregated.iter().find(|r| r.mentioned_company == "EXPE").unwrap();
        assert_eq!(expe.filed_date, chrono::NaiveDate::from_ymd_opt(2019, 2, 26));
        let bkng = aggregated.iter().find(|r| r.mentioned_company == "BKNG").unwrap();
        assert_eq!(bkng.filed_date, None);
        assert!(storage.path(FILINGS_TABLE_FILE).is_file());
        assert!(storage.path(FILING_MENTIONS_FILE).is_file());
    }

    #[test]
    fn analyze_on_empty_data_dir_writes_empty_tables() {
        let (_dir, config, storage) = setup();

        // regress fails for lack of observations, the other stages succeed
        analyze(&config, &storage).unwrap();

        let header = fs::read_to_string(storage.path(ANNUAL_RETURNS_FILE)).unwrap();
        assert_eq!(
            header.trim(),
            "ticker,year,start_date,end_date,start_price,end_price,annual_return_pct"
        );
        assert!(storage.path(MENTIONS_AGG_FILE).is_file());
        assert!(!storage.path(REGRESSION_RESULTS_FILE).exists());
    }

    #[test]
    fn regress_reports_too_few_observations() {
        let (_dir, _config, storage) = setup();
        assert!(matches!(
            regress(&storage),
            Err(AppError::Analysis(crate::utils::error::AnalysisError::TooFewObservations { got: 0, .. }))
        ));
    }

    #[test]
    fn extract_dates_writes_filing_dates_json() {
        let (_dir, config, storage) = setup();
        let store = FilingStore::new(config.filings_dir());
        store
            .save_submission(
                "TRVG",
                "20-F",
                &AccessionNumber::parse("0001628280-21-004360").unwrap(),
                "<SEC-HEADER>\nCONFORMED PERIOD OF REPORT:\t20201231\nFILED AS OF DATE:\t\t20210303\n</SEC-HEADER>",
            )
            .unwrap();

        let dates = extract_dates(&config, &storage).unwrap();
        assert_eq!(dates["TRVG"]["2021"].dates.filed_date.as_deref(), Some("2021-03-03"));

        let reloaded: FilingMetadataStore = storage.load_json(FILING_DATES_FILE).unwrap();
        assert_eq!(reloaded["TRVG"]["2021"].dates.period_end.as_deref(), Some("2020-12-31"));
    }

    #[test]
    fn extract_mentions_requires_api_key() {
        let (_dir, mut config, storage) = setup();
        config.classifier.api_key = None;
        let result = tokio_test::block_on(extract_mentions(&config, &storage));
        assert!(matches!(result, Err(AppError::Config(_))));
    }
}
