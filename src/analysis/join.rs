// src/analysis/join.rs
use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::analysis::filings::FilingRow;
use crate::analysis::mentions::MentionRow;
use crate::storage::Tabular;

/// A mention row with the filing date of the filing it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilingMentionRow {
    pub ticker: String,
    pub year: i32,
    pub filed_date: Option<NaiveDate>,
    pub mentioned_company: String,
    pub num_mention: u64,
}

impl Tabular for FilingMentionRow {
    const COLUMNS: &'static [&'static str] =
        &["ticker", "year", "filed_date", "mentioned_company", "num_mention"];
}

/// Total mentions a company received from all filers in one year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedMentionRow {
    pub mentioned_company: String,
    pub filed_date: Option<NaiveDate>,
    pub year: i32,
    pub num_mention: u64,
}

impl Tabular for AggregatedMentionRow {
    const COLUMNS: &'static [&'static str] = &["mentioned_company", "filed_date", "year", "num_mention"];
}

/// Right join of filings onto mentions on (ticker, year).
///
/// Every mention row comes through in input order; `filed_date` is `None`
/// when no filing matches. Filings without mentions do not appear.
pub fn join_filings_mentions(filings: &[FilingRow], mentions: &[MentionRow]) -> Vec<FilingMentionRow> {
    let filed_dates: HashMap<(&str, i32), Option<NaiveDate>> = filings
        .iter()
        .map(|f| ((f.ticker.as_str(), f.year), f.filed_date))
        .collect();

    mentions
        .iter()
        .map(|m| {
            let filed_date = filed_dates
                .get(&(m.ticker.as_str(), m.year))
                .copied()
                .flatten();
            if filed_date.is_none() {
                tracing::debug!("No filed date for {} {}", m.ticker, m.year);
            }
            FilingMentionRow {
                ticker: m.ticker.clone(),
                year: m.year,
                filed_date,
                mentioned_company: m.mentioned_company.clone(),
                num_mention: m.num_mention,
            }
        })
        .collect()
}

/// Sums `num_mention` per (mentioned_company, filed_date, year).
///
/// A missing filed date is a group of its own, so every joined row is
/// counted exactly once. Output is ordered by the group key.
pub fn aggregate_mentions(joined: &[FilingMentionRow]) -> Vec<AggregatedMentionRow> {
    let mut groups: BTreeMap<(&str, Option<NaiveDate>, i32), u64> = BTreeMap::new();
    for row in joined {
        *groups
            .entry((row.mentioned_company.as_str(), row.filed_date, row.year))
            .or_default() += row.num_mention;
    }

    groups
        .into_iter()
        .map(|((company, filed_date, year), num_mention)| AggregatedMentionRow {
            mentioned_company: company.to_string(),
            filed_date,
            year,
            num_mention,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filing(ticker: &str, year: i32, filed: Option<(i32, u32, u32)>) -> FilingRow {
        FilingRow {
            ticker: ticker.to_string(),
            year,
            accession_number: None,
            filing_type: None,
            filed_date: filed.and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d)),
            period_end: None,
            acceptance_datetime: None,
            company_name: None,
            cik: None,
            state_incorporation: None,
        }
    }

    fn mention(ticker: &str, year: i32, company: &str, n: u64) -> MentionRow {
        MentionRow {
            ticker: ticker.to_string(),
            year,
            mentioned_company: company.to_string(),
            num_mention: n,
        }
    }

    #[test]
    fn right_join_keeps_every_mention_and_drops_unmentioned_filings() {
        let filings = vec![
            filing("BKNG", 2020, Some((2020, 2, 26))),
            filing("EXPE", 2020, Some((2020, 2, 14))),
            filing("TRIP", 2020, Some((2020, 2, 21))), // no mentions
        ];
        let mentions = vec![
            mention("BKNG", 2020, "EXPE", 4),
            mention("EXPE", 2020, "BKNG", 2),
            mention("MMYT", 2020, "BKNG", 1), // no filing metadata
        ];

        let joined = join_filings_mentions(&filings, &mentions);
        assert_eq!(joined.len(), mentions.len());
        assert_eq!(joined[0].filed_date, NaiveDate::from_ymd_opt(2020, 2, 26));
        assert_eq!(joined[2].filed_date, None);
        assert!(joined.iter().all(|r| r.ticker != "TRIP"));
    }

    #[test]
    fn aggregation_conserves_totals() {
        let joined = join_filings_mentions(
            &[filing("BKNG", 2020, Some((2020, 2, 26))), filing("EXPE", 2020, Some((2020, 2, 26)))],
            &[
                mention("BKNG", 2020, "TRIP", 4),
                mention("EXPE", 2020, "TRIP", 3),
                mention("MMYT", 2020, "TRIP", 5),
                mention("BKNG", 2021, "TRIP", 1),
            ],
        );
        let agg = aggregate_mentions(&joined);

        let total_2020: u64 = agg
            .iter()
            .filter(|r| r.mentioned_company == "TRIP" && r.year == 2020)
            .map(|r| r.num_mention)
            .sum();
        assert_eq!(total_2020, 12);
        assert_eq!(agg.iter().map(|r| r.num_mention).sum::<u64>(), 13);

        let same_day = agg
            .iter()
            .find(|r| r.filed_date == NaiveDate::from_ymd_opt(2020, 2, 26))
            .unwrap();
        assert_eq!(same_day.num_mention, 7);
        assert_eq!(agg.len(), 3);
    }

    #[test]
    fn empty_inputs_give_empty_outputs() {
        assert!(join_filings_mentions(&[filing("BKNG", 2020, None)], &[]).is_empty());
        assert!(aggregate_mentions(&[]).is_empty());
    }

    #[test]
    fn joined_and_aggregated_tables_survive_csv_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = crate::storage::StorageManager::new(dir.path()).unwrap();
        let joined = join_filings_mentions(
            &[filing("BKNG", 2020, Some((2020, 2, 26)))],
            &[mention("BKNG", 2020, "EXPE", 4), mention("MMYT", 2020, "EXPE", 1)],
        );
        let agg = aggregate_mentions(&joined);
        assert!(agg.iter().any(|r| r.filed_date.is_none()));

        storage.save_csv("df_filing_mentions.csv", &joined).unwrap();
        storage.save_csv("df_mentions_agg.csv", &agg).unwrap();
        assert_eq!(storage.load_csv::<FilingMentionRow>("df_filing_mentions.csv").unwrap(), joined);
        assert_eq!(storage.load_csv::<AggregatedMentionRow>("df_mentions_agg.csv").unwrap(), agg);
    }
}
