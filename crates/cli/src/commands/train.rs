//! Training command

use anyhow::{Context, Result};
use colored::Colorize;
use housing_core::pipeline::{PipelineConfig, PipelineReport, TrainingPipeline};
use housing_core::tracking::open_store;
use serde::Serialize;
use tabled::Tabled;

use crate::output::{
    color_r2, format_dollars, format_metric, print_info, print_json, print_success, print_table,
    short_id, OutputFormat,
};

/// Row for the candidate runs table
#[derive(Tabled)]
struct CandidateRow {
    #[tabled(rename = "Model")]
    family: String,
    #[tabled(rename = "Run ID")]
    run_id: String,
    #[tabled(rename = "RMSE")]
    rmse: String,
    #[tabled(rename = "MAE")]
    mae: String,
    #[tabled(rename = "R²")]
    r2: String,
}

#[derive(Serialize)]
struct CandidateSummary<'a> {
    family: String,
    run_id: &'a str,
    rmse: f64,
    mae: f64,
    r2: f64,
}

#[derive(Serialize)]
struct TrainSummary<'a> {
    experiment: &'a str,
    runs: Vec<CandidateSummary<'a>>,
    best_model: String,
    model_name: &'a str,
    version: u32,
    checksum: &'a str,
}

/// Run the pipeline against the configured tracking store
pub async fn train_models(
    tracking_uri: &str,
    config: PipelineConfig,
    format: OutputFormat,
) -> Result<()> {
    let store = open_store(tracking_uri)
        .with_context(|| format!("Failed to open tracking store at {}", tracking_uri))?;
    let experiment = config.experiment.clone();

    // Fitting is CPU-bound; keep it off the async workers
    let report = tokio::task::spawn_blocking(move || TrainingPipeline::new(&store, config).run())
        .await
        .context("Training task panicked")??;

    match format {
        OutputFormat::Json => print_json(&summary(&experiment, &report))?,
        OutputFormat::Table => print_report(&experiment, &report),
    }

    Ok(())
}

fn summary<'a>(experiment: &'a str, report: &'a PipelineReport) -> TrainSummary<'a> {
    TrainSummary {
        experiment,
        runs: report
            .runs
            .iter()
            .map(|c| CandidateSummary {
                family: c.family.to_string(),
                run_id: &c.run.run_id,
                rmse: c.metrics.rmse,
                mae: c.metrics.mae,
                r2: c.metrics.r2,
            })
            .collect(),
        best_model: report.best().family.to_string(),
        model_name: &report.registered.name,
        version: report.registered.version,
        checksum: &report.registered.checksum,
    }
}

fn print_report(experiment: &str, report: &PipelineReport) {
    println!("{} {}", "Experiment:".bold(), experiment.cyan());

    let rows: Vec<CandidateRow> = report
        .runs
        .iter()
        .map(|c| CandidateRow {
            family: c.family.to_string(),
            run_id: short_id(&c.run.run_id),
            rmse: format_metric(Some(c.metrics.rmse)),
            mae: format_metric(Some(c.metrics.mae)),
            r2: color_r2(Some(c.metrics.r2)),
        })
        .collect();
    print_table(&rows, "No runs completed");

    let best = report.best();
    print_info(&format!(
        "Best model: {} (R² = {:.4}, RMSE ≈ {})",
        best.family,
        best.metrics.r2,
        format_dollars(best.metrics.rmse)
    ));
    print_success(&format!(
        "Registered {} version {}",
        report.registered.name.cyan(),
        report.registered.version
    ));
}
