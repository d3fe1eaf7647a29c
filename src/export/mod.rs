//! Export module for OptiVault
//!
//! Provides ledger export functionality in multiple formats:
//! - CSV: For reservation history and plans (spreadsheet-compatible)
//! - JSON: For machine-readable full ledger export
//! - YAML: For human-readable full ledger export

pub mod csv;
pub mod json;
pub mod yaml;

pub use csv::{export_plans_csv, export_reservations_csv};
pub use json::{export_full_json, import_from_json, FullExport, EXPORT_SCHEMA_VERSION};
pub use yaml::{export_full_yaml, import_from_yaml};
