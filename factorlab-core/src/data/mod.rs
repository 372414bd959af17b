//! Panel data: the immutable store, DataFrame ingestion and synthetic panels.

pub mod frame;
pub mod panel;
pub mod synthetic;

pub use frame::{PanelSchema, SchemaError};
pub use panel::{PanelError, PanelIndex, PanelStore};
pub use synthetic::SyntheticPanel;
