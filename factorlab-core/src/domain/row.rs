//! PanelRow: one (entity, date) observation of the OHLCV panel.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// OHLCV observation for a single entity on a single date.
///
/// Missing prices are carried as `f64::NAN`; they become undefined values in
/// every series derived from the panel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanelRow {
    pub entity: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl PanelRow {
    /// Returns true if any OHLCV field is NaN.
    pub fn is_void(&self) -> bool {
        self.open.is_nan()
            || self.high.is_nan()
            || self.low.is_nan()
            || self.close.is_nan()
            || self.volume.is_nan()
    }

    /// First negative field, if any. NaN is not negative.
    pub fn negative_field(&self) -> Option<&'static str> {
        [
            ("open", self.open),
            ("high", self.high),
            ("low", self.low),
            ("close", self.close),
            ("volume", self.volume),
        ]
        .into_iter()
        .find(|(_, v)| *v < 0.0)
        .map(|(name, _)| name)
    }

    /// Value of a base column by name.
    pub fn field(&self, column: &str) -> Option<f64> {
        match column {
            "open" => Some(self.open),
            "high" => Some(self.high),
            "low" => Some(self.low),
            "close" => Some(self.close),
            "volume" => Some(self.volume),
            _ => None,
        }
    }
}
