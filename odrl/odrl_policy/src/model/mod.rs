//! Policy models.
//!
//! This module defines the in-memory form of a parsed ODRL policy and the
//! results of evaluating it.

pub mod constraint;
pub mod evaluation;
pub mod party;
pub mod policy;
pub mod rule;
pub mod value;
mod writer;

pub use constraint::{
    Constraint, ConstraintArena, ConstraintNode, Literal, LogicalConstraint, LogicalOperator,
    NodeId, Operator, RightOperand, RightSource,
};
pub use evaluation::{Decision, Evaluation, Outcome, Reason, RuleRef, Satisfaction};
pub use party::{Party, PartyKind};
pub use policy::{ConflictStrategy, Policy, PolicyType};
pub use rule::{Action, Rule, RuleKind};
pub use value::{DataType, TypeMismatch, Value};
