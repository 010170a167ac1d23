// src/analysis/mod.rs
pub mod assemble;
pub mod filings;
pub mod join;
pub mod mentions;
pub mod regression;
pub mod returns;

pub use assemble::assemble_regression_input;
pub use filings::build_filing_table;
pub use join::{aggregate_mentions, join_filings_mentions, AggregatedMentionRow};
pub use mentions::build_mention_table;
pub use regression::regression_results;
pub use returns::{process_price_dir, AnnualReturn};
