//! Policy evaluation engine.
//!
//! This module evaluates loaded policies against request contexts.

mod audit;
mod context;
mod decision;
mod evaluator;
mod policy_engine;

pub use audit::PolicyAudit;
pub use context::EvaluationContext;
pub use decision::{DecisionAggregator, RuleState};
pub use evaluator::{apply_operator, ConstraintEvaluator};
pub use policy_engine::PolicyEngine;
