//! Display formatting for terminal output
//!
//! Provides utilities for formatting plans, explanations, funding sources
//! and the reservation ledger for terminal display.

pub mod explanation;
pub mod ledger;
pub mod plan;
pub mod source;

pub use explanation::format_explanation;
pub use ledger::{format_ledger_history, format_reservation_set};
pub use plan::{format_plan, format_plan_list, format_plan_options, format_trace};
pub use source::{format_source_details, format_source_list};
