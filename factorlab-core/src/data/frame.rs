//! DataFrame ingestion: validate a long-format polars frame and convert it
//! into a [`PanelStore`].

use chrono::NaiveDate;
use polars::prelude::*;

use super::panel::{PanelError, PanelStore};
use crate::domain::{PanelRow, BASE_COLUMNS};

/// Expected layout of a panel frame: `date` (Date), `ticker` (String) and the
/// five numeric OHLCV columns. Numeric columns may be any integer or float
/// width; they are cast to f64 on ingest.
pub struct PanelSchema;

impl PanelSchema {
    pub const DATE: &'static str = "date";
    pub const TICKER: &'static str = "ticker";

    pub fn validate(df: &DataFrame) -> Result<(), SchemaError> {
        let date = df
            .column(Self::DATE)
            .map_err(|_| SchemaError::MissingColumn(Self::DATE.to_string()))?;
        if date.dtype() != &DataType::Date {
            return Err(SchemaError::TypeMismatch {
                column: Self::DATE.to_string(),
                expected: "Date".to_string(),
                actual: format!("{:?}", date.dtype()),
            });
        }

        let ticker = df
            .column(Self::TICKER)
            .map_err(|_| SchemaError::MissingColumn(Self::TICKER.to_string()))?;
        if ticker.dtype() != &DataType::String {
            return Err(SchemaError::TypeMismatch {
                column: Self::TICKER.to_string(),
                expected: "String".to_string(),
                actual: format!("{:?}", ticker.dtype()),
            });
        }

        for name in BASE_COLUMNS {
            let col = df
                .column(name)
                .map_err(|_| SchemaError::MissingColumn(name.to_string()))?;
            if !is_numeric(col.dtype()) {
                return Err(SchemaError::TypeMismatch {
                    column: name.to_string(),
                    expected: "numeric".to_string(),
                    actual: format!("{:?}", col.dtype()),
                });
            }
        }
        Ok(())
    }
}

fn is_numeric(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Float64
            | DataType::Float32
            | DataType::Int64
            | DataType::Int32
            | DataType::Int16
            | DataType::Int8
            | DataType::UInt64
            | DataType::UInt32
            | DataType::UInt16
            | DataType::UInt8
    )
}

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("Missing required column: {0}")]
    MissingColumn(String),

    #[error("Type mismatch in column {column}: expected {expected}, got {actual}")]
    TypeMismatch {
        column: String,
        expected: String,
        actual: String,
    },

    #[error("null {column} at row {row}")]
    NullKey { column: String, row: usize },

    #[error("column read: {0}")]
    Read(String),
}

impl From<SchemaError> for PanelError {
    fn from(e: SchemaError) -> Self {
        PanelError::Schema(e.to_string())
    }
}

impl PanelStore {
    /// Build a panel from a long-format DataFrame (`date`, `ticker`, OHLCV).
    ///
    /// Null numeric cells become NaN; null keys are rejected.
    pub fn from_dataframe(df: &DataFrame) -> Result<Self, PanelError> {
        PanelSchema::validate(df)?;
        let read_err = |e: PolarsError| SchemaError::Read(e.to_string());

        let date_ca = df
            .column(PanelSchema::DATE)
            .map_err(read_err)?
            .date()
            .map_err(read_err)?;
        let ticker_ca = df
            .column(PanelSchema::TICKER)
            .map_err(read_err)?
            .str()
            .map_err(read_err)?;

        let mut numeric = Vec::with_capacity(BASE_COLUMNS.len());
        for name in BASE_COLUMNS {
            let cast = df
                .column(name)
                .map_err(read_err)?
                .cast(&DataType::Float64)
                .map_err(read_err)?;
            let values: Vec<f64> = cast
                .f64()
                .map_err(read_err)?
                .into_iter()
                .map(|v| v.unwrap_or(f64::NAN))
                .collect();
            numeric.push(values);
        }

        let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default();
        let mut rows = Vec::with_capacity(df.height());
        for i in 0..df.height() {
            let days = date_ca.get(i).ok_or_else(|| SchemaError::NullKey {
                column: PanelSchema::DATE.to_string(),
                row: i,
            })?;
            let ticker = ticker_ca.get(i).ok_or_else(|| SchemaError::NullKey {
                column: PanelSchema::TICKER.to_string(),
                row: i,
            })?;
            rows.push(PanelRow {
                entity: ticker.to_string(),
                date: epoch + chrono::Duration::days(days as i64),
                open: numeric[0][i],
                high: numeric[1][i],
                low: numeric[2][i],
                close: numeric[3][i],
                volume: numeric[4][i],
            });
        }

        Self::from_rows(rows)
    }
}
