//! Audit logging system for OptiVault
//!
//! Records every plan decision and every change to the reservation ledger
//! in an append-only audit log.
//!
//! # Architecture
//!
//! - `AuditEntry`: a single entry with timestamp, operation, entity
//!   information, a one-line summary and an optional JSON payload.
//! - `AuditLogger`: writes entries to the audit log file as line-delimited
//!   JSON (JSONL).
//!
//! # Example
//!
//! ```rust,ignore
//! use optivault::audit::{AuditEntry, AuditLogger};
//!
//! let logger = AuditLogger::new(audit_log_path);
//! logger.log(&AuditEntry::plan_created(&plan))?;
//! logger.log(&AuditEntry::committed(&set, &plan))?;
//! ```

mod entry;
mod logger;

pub use entry::{AuditEntry, EntityType, Operation};
pub use logger::AuditLogger;
