//! OptiVault - payment allocation engine
//!
//! This library decides, for a single purchase, which of a user's funding
//! sources (current accounts, VRP-gated savings, credit cards, overseas
//! accounts) should pay and how much. Plans are committed against a
//! concurrency-safe reservation ledger so two purchases can never spend the
//! same headroom twice.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - `config`: Configuration, preferences and path management
//! - `error`: Custom error types
//! - `models`: Core data models (sources, constraints, transactions, plans)
//! - `storage`: Reservation ledger, plan store and snapshot providers
//! - `services`: Cost model, capacity validation, optimizer, explainer and engine
//! - `audit`: Audit logging system
//! - `display`, `export`, `cli`: Terminal output and command handlers
//!
//! # Example
//!
//! ```rust,ignore
//! use optivault::config::Settings;
//! use optivault::services::PaymentEngine;
//! use optivault::storage::demo_snapshot;
//!
//! let engine = PaymentEngine::new(demo_snapshot(chrono::Utc::now()), Settings::default());
//! let outcome = engine.pay(&transaction)?;
//! ```

pub mod audit;
pub mod cli;
pub mod config;
pub mod display;
pub mod error;
pub mod export;
pub mod models;
pub mod services;
pub mod storage;

pub use error::{VaultError, VaultResult};
