//! Smoke-check command against a running prediction service

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use housing_core::models::FeatureRecord;

use crate::client::ApiClient;
use crate::output::{format_dollars, print_info, print_json, print_success, OutputFormat};

/// Arguments for `housing predict`; unset features keep the sample values
#[derive(Args, Debug, Default)]
pub struct PredictArgs {
    /// Prediction service URL
    #[arg(long, env = "HOUSING_API_URL", default_value = "http://localhost:8000")]
    pub api_url: String,

    /// Median income in the block group (tens of thousands of USD)
    #[arg(long, allow_hyphen_values = true)]
    pub med_inc: Option<f64>,

    /// Median house age in the block group
    #[arg(long, allow_hyphen_values = true)]
    pub house_age: Option<f64>,

    /// Average number of rooms per household
    #[arg(long, allow_hyphen_values = true)]
    pub ave_rooms: Option<f64>,

    /// Average number of bedrooms per household
    #[arg(long, allow_hyphen_values = true)]
    pub ave_bedrms: Option<f64>,

    /// Block group population
    #[arg(long, allow_hyphen_values = true)]
    pub population: Option<f64>,

    /// Average number of household members
    #[arg(long, allow_hyphen_values = true)]
    pub ave_occup: Option<f64>,

    /// Block group latitude
    #[arg(long, allow_hyphen_values = true)]
    pub latitude: Option<f64>,

    /// Block group longitude
    #[arg(long, allow_hyphen_values = true)]
    pub longitude: Option<f64>,
}

impl PredictArgs {
    /// The documented sample record with any overrides applied
    pub fn record(&self) -> FeatureRecord {
        let sample = FeatureRecord::sample();
        FeatureRecord {
            med_inc: self.med_inc.unwrap_or(sample.med_inc),
            house_age: self.house_age.unwrap_or(sample.house_age),
            ave_rooms: self.ave_rooms.unwrap_or(sample.ave_rooms),
            ave_bedrms: self.ave_bedrms.unwrap_or(sample.ave_bedrms),
            population: self.population.unwrap_or(sample.population),
            ave_occup: self.ave_occup.unwrap_or(sample.ave_occup),
            latitude: self.latitude.unwrap_or(sample.latitude),
            longitude: self.longitude.unwrap_or(sample.longitude),
        }
    }
}

/// Send one record to `POST /predict/` and print the response
pub async fn predict_sample(args: PredictArgs, format: OutputFormat) -> Result<()> {
    let client = ApiClient::new(&args.api_url)?;
    let record = args.record();

    let banner = client
        .status()
        .await
        .with_context(|| format!("Service at {} is not reachable", args.api_url))?;

    if let OutputFormat::Table = format {
        print_info(&format!("{} ({})", banner.message, args.api_url.cyan()));
        println!("{}", serde_json::to_string_pretty(&record)?);
    }

    let response = client.predict(&record).await?;

    match format {
        OutputFormat::Json => print_json(&response)?,
        OutputFormat::Table => print_success(&format!(
            "Predicted median house value: {:.4} ({})",
            response.predicted_median_house_value,
            format_dollars(response.predicted_median_house_value)
        )),
    }

    Ok(())
}
