use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single sensor glucose value (SGV) as reported by the data server
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GlucoseReading {
    /// Observation time in epoch milliseconds
    pub timestamp_ms: i64,

    /// Glucose value in mg/dL
    pub value: f64,
}

impl GlucoseReading {
    pub fn new(timestamp_ms: i64, value: f64) -> Self {
        Self { timestamp_ms, value }
    }

    /// Build a reading from a raw `entries.json` record.
    ///
    /// Returns `None` when the `sgv` field is absent or not a JSON number.
    /// A missing `date` sorts as the epoch.
    pub fn from_entry(entry: &Value) -> Option<Self> {
        let value = entry.get("sgv").filter(|v| v.is_number())?.as_f64()?;
        let timestamp_ms = entry
            .get("date")
            .and_then(Value::as_f64)
            .map(|d| d as i64)
            .unwrap_or(0);
        Some(Self { timestamp_ms, value })
    }
}

/// An insulin and/or carbohydrate treatment record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Treatment {
    /// Carbohydrates in grams
    pub carbs: Option<f64>,

    /// Bolus insulin in units
    pub insulin: Option<f64>,
}

impl Treatment {
    pub fn new(carbs: Option<f64>, insulin: Option<f64>) -> Self {
        Self { carbs, insulin }
    }

    /// Build a treatment from a raw `treatments.json` record.
    ///
    /// Non-numeric `carbs`/`insulin` fields (strings, nulls, objects) are
    /// treated as absent rather than rejected.
    pub fn from_record(record: &Value) -> Self {
        let numeric = |key: &str| record.get(key).filter(|v| v.is_number()).and_then(Value::as_f64);
        Self {
            carbs: numeric("carbs"),
            insulin: numeric("insulin"),
        }
    }
}

/// Glucose values in observation order.
///
/// Episode counting only makes sense over chronologically ordered values, so
/// the analyzer accepts this type rather than a bare slice.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GlucoseSeries {
    values: Vec<f64>,
}

impl GlucoseSeries {
    /// Sort readings by observation time and keep only their values.
    ///
    /// The sort is stable: readings sharing a timestamp keep server order.
    pub fn from_readings(mut readings: Vec<GlucoseReading>) -> Self {
        readings.sort_by_key(|r| r.timestamp_ms);
        Self {
            values: readings.into_iter().map(|r| r.value).collect(),
        }
    }

    /// Wrap values the caller already holds in chronological order.
    pub fn from_chronological(values: Vec<f64>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Glycemic-control statistics for one evaluation day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlycemicMetrics {
    /// Number of readings
    pub count: usize,

    /// Arithmetic mean (mg/dL)
    pub mean: f64,

    /// Population standard deviation (mg/dL)
    pub sd: f64,

    /// Coefficient of variation in percent; NaN when mean <= 0
    pub cv: f64,

    /// Time in range 70-180 mg/dL (%)
    pub tir: f64,

    /// Time below 70 mg/dL (%)
    pub tbr: f64,

    /// Time below 54 mg/dL (%)
    pub tbr54: f64,

    /// Time above 180 mg/dL (%)
    pub tar: f64,

    /// Time above 250 mg/dL (%)
    pub tar250: f64,

    pub min: f64,
    pub max: f64,

    /// 5th percentile (mg/dL)
    pub p5: f64,

    /// 95th percentile (mg/dL)
    pub p95: f64,

    /// Contiguous runs below 70 mg/dL
    pub hypo_episodes: usize,

    /// Contiguous runs above 180 mg/dL
    pub hyper_episodes: usize,

    /// Total carbohydrates (g)
    pub carbs: f64,

    /// Total bolus insulin (U)
    pub bolus: f64,
}

/// Result of analyzing one day: the metrics bundle and the recommendation list.
///
/// `metrics` is `None` when no glucose readings were available; the
/// recommendation list then holds only the no-data message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyAnalysis {
    pub metrics: Option<GlycemicMetrics>,
    pub recommendations: Vec<String>,
}

impl DailyAnalysis {
    pub fn is_empty(&self) -> bool {
        self.metrics.is_none()
    }
}
