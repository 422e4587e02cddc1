//! Policy evaluation model.
//!
//! This module defines the outcomes of constraint evaluation and the
//! decisions of the policy engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::rule::RuleKind;
use crate::id::PolicyHandle;
use crate::vocab::Iri;

/// The outcome of evaluating a constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Satisfaction {
    /// The constraint holds.
    Satisfied,

    /// The constraint does not hold.
    NotSatisfied,

    /// The constraint cannot be decided.
    Indeterminate,
}

impl Satisfaction {
    /// Combine two outcomes conjunctively.
    ///
    /// NotSatisfied dominates Indeterminate, which dominates Satisfied.
    pub fn and(self, other: Satisfaction) -> Satisfaction {
        match (self, other) {
            (Satisfaction::NotSatisfied, _) | (_, Satisfaction::NotSatisfied) => {
                Satisfaction::NotSatisfied
            }
            (Satisfaction::Indeterminate, _) | (_, Satisfaction::Indeterminate) => {
                Satisfaction::Indeterminate
            }
            _ => Satisfaction::Satisfied,
        }
    }

    /// Convert a decided comparison into an outcome.
    pub fn from_bool(holds: bool) -> Satisfaction {
        if holds {
            Satisfaction::Satisfied
        } else {
            Satisfaction::NotSatisfied
        }
    }
}

impl fmt::Display for Satisfaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Satisfied => write!(f, "Satisfied"),
            Self::NotSatisfied => write!(f, "NotSatisfied"),
            Self::Indeterminate => write!(f, "Indeterminate"),
        }
    }
}

/// Why a constraint or rule was not decided, or not effective.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reason {
    /// The left operand has no value in the evaluation context.
    AbsentOperand {
        /// The left operand.
        operand: Iri,
    },

    /// An operand could not be coerced or compared.
    TypeMismatch {
        /// The left operand of the constraint.
        operand: Iri,

        /// What went wrong.
        detail: String,
    },

    /// An external reference has no value in the evaluation context.
    UnresolvedReference {
        /// The reference.
        reference: Iri,
    },

    /// The children of an `andSequence` did not occur in order.
    OutOfSequence {
        /// The uid of the sequence constraint, if any.
        constraint: Option<Iri>,
    },

    /// Constraint nesting exceeded the configured depth at evaluation time.
    DepthLimitExceeded {
        /// The configured limit.
        limit: usize,
    },

    /// A duty of a permission has not been performed.
    DutyNotPerformed {
        /// The action of the duty.
        action: Iri,
    },

    /// An inherited policy is not loaded.
    InheritedPolicyMissing {
        /// The inherited policy uid.
        uid: Iri,
    },
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AbsentOperand { operand } => write!(f, "no value for operand {}", operand),
            Self::TypeMismatch { operand, detail } => {
                write!(f, "type mismatch on operand {}: {}", operand, detail)
            }
            Self::UnresolvedReference { reference } => {
                write!(f, "no value for reference {}", reference)
            }
            Self::OutOfSequence { constraint: Some(uid) } => {
                write!(f, "sequence {} out of order", uid)
            }
            Self::OutOfSequence { constraint: None } => write!(f, "sequence out of order"),
            Self::DepthLimitExceeded { limit } => write!(f, "nesting deeper than {}", limit),
            Self::DutyNotPerformed { action } => write!(f, "duty {} not performed", action),
            Self::InheritedPolicyMissing { uid } => {
                write!(f, "inherited policy {} not loaded", uid)
            }
        }
    }
}

/// The outcome of evaluating a constraint, with the reasons collected on
/// the way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    /// The outcome.
    pub satisfaction: Satisfaction,

    /// Reasons for indeterminate or unsatisfied sub-results.
    pub reasons: Vec<Reason>,
}

/// The final decision for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Decision {
    /// The action is permitted.
    Permitted,

    /// The action is prohibited.
    Prohibited,

    /// No rule decides the action.
    Undetermined,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Permitted => write!(f, "Permitted"),
            Self::Prohibited => write!(f, "Prohibited"),
            Self::Undetermined => write!(f, "Undetermined"),
        }
    }
}

/// A reference to a top-level rule of a loaded policy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RuleRef {
    /// The uid of the policy that declares the rule.
    pub policy: Iri,

    /// The kind of rule.
    pub kind: RuleKind,

    /// The position of the rule among the policy's rules of its kind.
    pub index: usize,
}

impl fmt::Display for RuleRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}[{}]", self.policy, self.kind.policy_key(), self.index)
    }
}

/// A policy evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// The evaluated policy.
    pub handle: PolicyHandle,

    /// The uid of the evaluated policy.
    pub policy_uid: Iri,

    /// The requested action.
    pub action: Iri,

    /// The decision.
    pub decision: Decision,

    /// The rule that decided, if any.
    pub decided_by: Option<RuleRef>,

    /// Reasons collected while evaluating.
    pub reasons: Vec<Reason>,

    /// Actions of obligations that are in force and not yet performed.
    pub pending_obligations: Vec<Iri>,

    /// The evaluation time taken from the context.
    pub evaluated_at: DateTime<Utc>,
}

impl Evaluation {
    /// Check whether the action is permitted.
    pub fn is_permitted(&self) -> bool {
        self.decision == Decision::Permitted
    }
}
