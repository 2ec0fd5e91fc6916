//! Dataset acquisition command

use anyhow::{Context, Result};
use housing_core::dataset::{acquire_dataset, EXPECTED_ROWS};
use std::path::Path;

use crate::output::{print_info, print_json, print_success, print_warning, OutputFormat};

/// Download the raw table and write the training CSV
pub async fn fetch_dataset(url: &str, output: &Path, format: OutputFormat) -> Result<()> {
    let report = acquire_dataset(url, output)
        .await
        .with_context(|| format!("Failed to fetch dataset from {}", url))?;

    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Table => {
            print_success(&format!(
                "Saved {} rows to {}",
                report.rows,
                report.path.display()
            ));
            print_info(&format!("Archive SHA-256: {}", report.archive_sha256));
            if report.rows != EXPECTED_ROWS {
                print_warning(&format!(
                    "Expected {} rows in the published table, got {}",
                    EXPECTED_ROWS, report.rows
                ));
            }
        }
    }

    Ok(())
}
