//! Regression model and correlation helpers used to score factors.

pub mod gbm;
pub mod ic;

pub use gbm::{BoostedTrees, GbmParams, ModelError};
pub use ic::pearson;
