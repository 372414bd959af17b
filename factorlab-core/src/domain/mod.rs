//! Domain types for FactorLab

pub mod ids;
pub mod row;

pub use ids::{DatasetHash, FormulaId};
pub use row::PanelRow;

/// Base panel columns every formula may reference.
pub const BASE_COLUMNS: [&str; 5] = ["open", "high", "low", "close", "volume"];
