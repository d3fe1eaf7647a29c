//! Service layer for OptiVault
//!
//! The service layer holds the allocation logic on top of the storage
//! layer: per-source cost evaluation, constraint validation, the
//! five-step optimizer, plan explanations and the engine that ties them
//! to the reservation ledger.

pub mod capacity;
pub mod cost;
pub mod engine;
pub mod explainer;
pub mod optimizer;

pub use capacity::{Capacity, CapacityValidator};
pub use cost::CostModel;
pub use engine::{CommitOutcome, PaymentEngine, SourceCapacity};
pub use explainer::{Comparison, Explainer, Explanation, SourceRationale};
pub use optimizer::{AllocationRequest, Candidate, Optimizer};
