// src/analysis/mentions.rs
use serde::{Deserialize, Serialize};

use crate::analysis::filings::parse_year;
use crate::storage::models::{FilingMetadataStore, MentionStore};
use crate::storage::Tabular;

/// `ticker`'s filing for `year` mentioned `mentioned_company` `num_mention` times.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MentionRow {
    pub ticker: String,
    pub year: i32,
    pub mentioned_company: String,
    pub num_mention: u64,
}

impl Tabular for MentionRow {
    const COLUMNS: &'static [&'static str] = &["ticker", "year", "mentioned_company", "num_mention"];
}

/// Flattens the mention store into one row per strictly positive count.
///
/// `_filings` is not consulted; the join with filing metadata happens in
/// [`join_filings_mentions`](crate::analysis::join::join_filings_mentions).
pub fn build_mention_table(mentions: &MentionStore, _filings: &FilingMetadataStore) -> Vec<MentionRow> {
    let mut rows = Vec::new();

    for (filing_ticker, years) in mentions {
        for (year_key, source) in years {
            let Some(year) = parse_year(year_key) else {
                tracing::warn!("Skipping mentions {} '{}': year key is not an integer", filing_ticker, year_key);
                continue;
            };

            for (mentioned, &count) in source.counts() {
                if count <= 0 {
                    continue;
                }
                rows.push(MentionRow {
                    ticker: filing_ticker.clone(),
                    year,
                    mentioned_company: mentioned.clone(),
                    num_mention: count.unsigned_abs(),
                });
            }
        }
    }

    rows
}
