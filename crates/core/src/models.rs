//! Core data models for the housing price predictor

use crate::error::{Error, Result};
use ndarray::{Array2, Axis};
use serde::{de::Error as _, Deserialize, Deserializer, Serialize};

/// Feature column names, in the order models are trained on
pub const FEATURE_COLUMNS: [&str; 8] = [
    "MedInc",
    "HouseAge",
    "AveRooms",
    "AveBedrms",
    "Population",
    "AveOccup",
    "Latitude",
    "Longitude",
];

/// Target column: median house value in units of 100 000 USD
pub const TARGET_COLUMN: &str = "MedHouseVal";

/// One housing sample, as received by the prediction endpoint
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    #[serde(rename = "MedInc", deserialize_with = "coerce_f64")]
    pub med_inc: f64,
    #[serde(rename = "HouseAge", deserialize_with = "coerce_f64")]
    pub house_age: f64,
    #[serde(rename = "AveRooms", deserialize_with = "coerce_f64")]
    pub ave_rooms: f64,
    #[serde(rename = "AveBedrms", deserialize_with = "coerce_f64")]
    pub ave_bedrms: f64,
    #[serde(rename = "Population", deserialize_with = "coerce_f64")]
    pub population: f64,
    #[serde(rename = "AveOccup", deserialize_with = "coerce_f64")]
    pub ave_occup: f64,
    #[serde(rename = "Latitude", deserialize_with = "coerce_f64")]
    pub latitude: f64,
    #[serde(rename = "Longitude", deserialize_with = "coerce_f64")]
    pub longitude: f64,
}

impl FeatureRecord {
    /// Values in `FEATURE_COLUMNS` order
    pub fn values(&self) -> [f64; 8] {
        [
            self.med_inc,
            self.house_age,
            self.ave_rooms,
            self.ave_bedrms,
            self.population,
            self.ave_occup,
            self.latitude,
            self.longitude,
        ]
    }

    /// Wrap the record as a one-row matrix with the canonical column names
    pub fn to_matrix(&self) -> FeatureMatrix {
        let row = self.values();
        let values = Array2::from_shape_fn((1, row.len()), |(_, j)| row[j]);
        FeatureMatrix {
            names: canonical_names(),
            values,
        }
    }

    /// High-value coastal block group used for smoke checks
    pub fn sample() -> Self {
        Self {
            med_inc: 8.3252,
            house_age: 41.0,
            ave_rooms: 6.984127,
            ave_bedrms: 1.02381,
            population: 322.0,
            ave_occup: 2.555556,
            latitude: 37.88,
            longitude: -122.23,
        }
    }
}

/// Accept JSON numbers or strings holding a finite float
fn coerce_f64<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrText {
        Number(f64),
        Text(String),
    }

    let value = match NumberOrText::deserialize(deserializer)? {
        NumberOrText::Number(v) => v,
        NumberOrText::Text(text) => text
            .trim()
            .parse::<f64>()
            .map_err(|_| D::Error::custom(format!("'{text}' is not a valid number")))?,
    };

    if !value.is_finite() {
        return Err(D::Error::custom("value must be a finite number"));
    }
    Ok(value)
}

/// Response body of a successful prediction
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub predicted_median_house_value: f64,
}

/// Named columns over a row-major matrix of feature values
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    names: Vec<String>,
    values: Array2<f64>,
}

impl FeatureMatrix {
    pub fn new(names: Vec<String>, values: Array2<f64>) -> Result<Self> {
        if names.len() != values.ncols() {
            return Err(Error::InvalidDataset(format!(
                "{} column names for {} columns",
                names.len(),
                values.ncols()
            )));
        }
        Ok(Self { names, values })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn nrows(&self) -> usize {
        self.values.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.values.ncols()
    }

    /// Copy the given rows into a new matrix
    pub fn select_rows(&self, rows: &[usize]) -> Self {
        Self {
            names: self.names.clone(),
            values: self.values.select(Axis(0), rows),
        }
    }
}

pub(crate) fn canonical_names() -> Vec<String> {
    FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_accepts_numbers_and_numeric_strings() {
        let json = r#"{"MedInc": "8.3252", "HouseAge": 41, "AveRooms": 6.98,
            "AveBedrms": 1.02, "Population": 322.0, "AveOccup": 2.55,
            "Latitude": 37.88, "Longitude": -122.23}"#;
        let record: FeatureRecord = serde_json::from_str(json).unwrap();

        assert_eq!(record.med_inc, 8.3252);
        assert_eq!(record.house_age, 41.0);
        assert_eq!(record.longitude, -122.23);
    }

    #[test]
    fn test_record_rejects_missing_field() {
        let json = r#"{"MedInc": 8.3, "HouseAge": 41.0, "AveRooms": 6.98,
            "AveBedrms": 1.02, "Population": 322.0, "AveOccup": 2.55,
            "Latitude": 37.88}"#;
        let err = serde_json::from_str::<FeatureRecord>(json).unwrap_err();
        assert!(err.to_string().contains("Longitude"));
    }

    #[test]
    fn test_record_rejects_non_numeric_text() {
        let json = r#"{"MedInc": "lots", "HouseAge": 41.0, "AveRooms": 6.98,
            "AveBedrms": 1.02, "Population": 322.0, "AveOccup": 2.55,
            "Latitude": 37.88, "Longitude": -122.23}"#;
        let err = serde_json::from_str::<FeatureRecord>(json).unwrap_err();
        assert!(err.to_string().contains("not a valid number"));
    }

    #[test]
    fn test_record_rejects_non_finite_text() {
        let json = r#"{"MedInc": "NaN", "HouseAge": 41.0, "AveRooms": 6.98,
            "AveBedrms": 1.02, "Population": 322.0, "AveOccup": 2.55,
            "Latitude": 37.88, "Longitude": -122.23}"#;
        assert!(serde_json::from_str::<FeatureRecord>(json).is_err());
    }

    #[test]
    fn test_to_matrix_uses_canonical_columns() {
        let matrix = FeatureRecord::sample().to_matrix();

        assert_eq!(matrix.nrows(), 1);
        assert_eq!(matrix.names(), canonical_names().as_slice());
        assert_eq!(matrix.values()[[0, 0]], 8.3252);
        assert_eq!(matrix.values()[[0, 7]], -122.23);
    }

    #[test]
    fn test_matrix_rejects_name_count_mismatch() {
        let result = FeatureMatrix::new(vec!["a".into()], Array2::zeros((2, 3)));
        assert!(result.is_err());
    }
}
