// src/storage/filings.rs
use std::fs;
use std::path::{Path, PathBuf};

use crate::edgar::models::AccessionNumber;
use crate::utils::error::StorageError;

const SUBMISSION_FILE: &str = "full-submission.txt";

/// A filing on disk at `<root>/<TICKER>/<FORM>/<ACCESSION>/full-submission.txt`.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredFiling {
    pub ticker: String,
    pub filing_type: String,
    pub accession: AccessionNumber,
    pub path: PathBuf,
}

impl StoredFiling {
    pub fn year(&self) -> i32 {
        self.accession.year()
    }
}

/// Local store of downloaded SEC submissions.
pub struct FilingStore {
    root: PathBuf,
}

impl FilingStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }

    fn submission_path(&self, ticker: &str, form: &str, accession: &AccessionNumber) -> PathBuf {
        self.root
            .join(ticker.to_uppercase())
            .join(form)
            .join(accession.as_str())
            .join(SUBMISSION_FILE)
    }

    pub fn contains(&self, ticker: &str, form: &str, accession: &AccessionNumber) -> bool {
        self.submission_path(ticker, form, accession).is_file()
    }

    /// Saves a downloaded submission, creating the directory layout as needed
    pub fn save_submission(
        &self,
        ticker: &str,
        form: &str,
        accession: &AccessionNumber,
        content: &str,
    ) -> Result<PathBuf, StorageError> {
        let path = self.submission_path(ticker, form, accession);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content)?;

        tracing::info!("Saved submission to {}", path.display());
        Ok(path)
    }

    /// Lists every stored filing of a ticker, ordered by form then accession.
    ///
    /// A ticker without a directory has no filings. Directories whose name is
    /// not an accession number are skipped with a warning.
    pub fn filings_for(&self, ticker: &str) -> Result<Vec<StoredFiling>, StorageError> {
        let company_path = self.root.join(ticker.to_uppercase());
        if !company_path.is_dir() {
            tracing::warn!("No filings found for {} under {}", ticker, self.root.display());
            return Ok(Vec::new());
        }

        let mut filings = Vec::new();
        for form_dir in sorted_subdirs(&company_path)? {
            let filing_type = dir_name(&form_dir);
            tracing::debug!("Scanning {} {} filings", ticker, filing_type);

            for accession_dir in sorted_subdirs(&form_dir)? {
                let path = accession_dir.join(SUBMISSION_FILE);
                if !path.is_file() {
                    continue;
                }
                let name = dir_name(&accession_dir);
                let Some(accession) = AccessionNumber::parse(&name) else {
                    tracing::warn!("Skipping {}: '{}' is not an accession number", path.display(), name);
                    continue;
                };
                filings.push(StoredFiling {
                    ticker: ticker.to_uppercase(),
                    filing_type: filing_type.clone(),
                    accession,
                    path,
                });
            }
        }

        Ok(filings)
    }
}

fn sorted_subdirs(dir: &Path) -> Result<Vec<PathBuf>, StorageError> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}

fn dir_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
