//! Tracking store inspection commands

use anyhow::{Context, Result};
use housing_core::tracking::{open_store, RunStatus, TrackingStore};
use tabled::Tabled;

use crate::output::{
    color_r2, color_status, format_metric, format_timestamp, print_json, print_table, short_id,
    OutputFormat,
};

/// Row for registered versions table
#[derive(Tabled)]
struct VersionRow {
    #[tabled(rename = "Version")]
    version: u32,
    #[tabled(rename = "Model")]
    family: String,
    #[tabled(rename = "Run ID")]
    run_id: String,
    #[tabled(rename = "Checksum")]
    checksum: String,
    #[tabled(rename = "Registered")]
    created_at: String,
}

/// Row for runs table
#[derive(Tabled)]
struct RunRow {
    #[tabled(rename = "Run ID")]
    run_id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "RMSE")]
    rmse: String,
    #[tabled(rename = "MAE")]
    mae: String,
    #[tabled(rename = "R²")]
    r2: String,
    #[tabled(rename = "Started")]
    started_at: String,
}

fn open(tracking_uri: &str) -> Result<impl TrackingStore> {
    open_store(tracking_uri)
        .with_context(|| format!("Failed to open tracking store at {}", tracking_uri))
}

/// List registered versions of a model
pub fn list_models(tracking_uri: &str, model_name: &str, format: OutputFormat) -> Result<()> {
    let versions = open(tracking_uri)?.list_versions(model_name)?;

    match format {
        OutputFormat::Json => print_json(&versions)?,
        OutputFormat::Table => {
            let rows: Vec<VersionRow> = versions
                .iter()
                .map(|v| VersionRow {
                    version: v.version,
                    family: v.family.to_string(),
                    run_id: short_id(&v.run_id),
                    checksum: short_id(&v.checksum),
                    created_at: format_timestamp(v.created_at),
                })
                .collect();
            print_table(
                &rows,
                &format!("No registered versions of '{}'", model_name),
            );
        }
    }

    Ok(())
}

/// List tracked runs of an experiment
pub fn list_runs(tracking_uri: &str, experiment: &str, format: OutputFormat) -> Result<()> {
    let runs = open(tracking_uri)?.list_runs(experiment)?;

    match format {
        OutputFormat::Json => print_json(&runs)?,
        OutputFormat::Table => {
            let rows: Vec<RunRow> = runs
                .iter()
                .map(|run| RunRow {
                    run_id: short_id(&run.run_id),
                    name: run.run_name.clone(),
                    status: color_status(status_label(run.status)),
                    rmse: format_metric(run.metric("rmse")),
                    mae: format_metric(run.metric("mae")),
                    r2: color_r2(run.metric("r2")),
                    started_at: format_timestamp(run.started_at),
                })
                .collect();
            print_table(&rows, &format!("No runs in experiment '{}'", experiment));
        }
    }

    Ok(())
}

fn status_label(status: RunStatus) -> &'static str {
    match status {
        RunStatus::Running => "running",
        RunStatus::Finished => "finished",
        RunStatus::Failed => "failed",
    }
}
