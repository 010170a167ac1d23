// src/analysis/assemble.rs
use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::analysis::join::AggregatedMentionRow;
use crate::analysis::returns::AnnualReturn;
use crate::storage::Tabular;

/// One regression observation: mentions a company received in `year` and its
/// return for that year relative to the cross-sectional mean.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionInputRow {
    pub ticker: String,
    pub year: i32,
    pub num_mention: u64,
    pub res_return: f64,
}

impl Tabular for RegressionInputRow {
    const COLUMNS: &'static [&'static str] = &["ticker", "year", "num_mention", "res_return"];
}

/// Left-joins mention totals onto the return observations on
/// (ticker = mentioned_company, year) and demeans returns within each year.
///
/// Mentions are first collapsed across filed dates so a return row is never
/// duplicated. Returns without mentions get `num_mention = 0`.
pub fn assemble_regression_input(
    returns: &[AnnualReturn],
    mentions: &[AggregatedMentionRow],
) -> Vec<RegressionInputRow> {
    let mut totals: HashMap<(&str, i32), u64> = HashMap::new();
    for row in mentions {
        *totals.entry((row.mentioned_company.as_str(), row.year)).or_default() += row.num_mention;
    }

    let mut by_year: BTreeMap<i32, (f64, usize)> = BTreeMap::new();
    for r in returns {
        let (sum, n) = by_year.entry(r.year).or_default();
        *sum += r.annual_return_pct;
        *n += 1;
    }

    let rows: Vec<RegressionInputRow> = returns
        .iter()
        .map(|r| {
            let (sum, n) = by_year[&r.year];
            RegressionInputRow {
                ticker: r.ticker.clone(),
                year: r.year,
                num_mention: totals.get(&(r.ticker.as_str(), r.year)).copied().unwrap_or(0),
                res_return: r.annual_return_pct - sum / n as f64,
            }
        })
        .collect();

    let unmatched = rows.iter().filter(|r| r.num_mention == 0).count();
    tracing::info!(
        "Assembled {} regression rows ({} with no mentions, zero-filled)",
        rows.len(),
        unmatched
    );
    rows
}
