//! Rule model.
//!
//! This module defines permissions, prohibitions and duties.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::constraint::NodeId;
use super::party::Party;
use crate::vocab::Iri;

/// The kind of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    /// The action may be exercised.
    Permission,

    /// The action must not be exercised.
    Prohibition,

    /// The action must be exercised.
    Duty,
}

impl RuleKind {
    /// Get the key this kind is listed under at policy level.
    pub fn policy_key(&self) -> &'static str {
        match self {
            RuleKind::Permission => "permission",
            RuleKind::Prohibition => "prohibition",
            RuleKind::Duty => "obligation",
        }
    }

    /// Get the key under which rules of this kind nest their duties.
    pub fn nested_duty_key(&self) -> &'static str {
        match self {
            RuleKind::Permission => "duty",
            RuleKind::Prohibition => "remedy",
            RuleKind::Duty => "consequence",
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleKind::Permission => write!(f, "permission"),
            RuleKind::Prohibition => write!(f, "prohibition"),
            RuleKind::Duty => write!(f, "duty"),
        }
    }
}

/// An action, possibly refined.
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    /// The action IRI.
    pub iri: Iri,

    /// Constraints on how the action is exercised.
    pub refinement: Option<NodeId>,
}

impl Action {
    /// Create an unrefined action.
    pub fn new(iri: impl Into<Iri>) -> Self {
        Self {
            iri: iri.into(),
            refinement: None,
        }
    }
}

/// A rule.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    /// The kind of rule.
    pub kind: RuleKind,

    /// The rule uid.
    pub uid: Option<Iri>,

    /// The actions the rule is about. A rule applies to each of them.
    pub actions: Vec<Action>,

    /// The target asset, overriding the policy target.
    pub target: Option<Iri>,

    /// The assigner, overriding the policy assigner.
    pub assigner: Option<Party>,

    /// The assignee, overriding the policy assignee.
    pub assignee: Option<Party>,

    /// The constraint under which the rule applies.
    pub constraint: Option<NodeId>,

    /// Nested duties: duties of a permission, remedies of a prohibition or
    /// consequences of a duty.
    pub duties: Vec<Rule>,
}

impl Rule {
    /// Create a new unconditional rule.
    ///
    /// # Arguments
    ///
    /// * `kind` - The kind of rule.
    /// * `action` - The action IRI.
    ///
    /// # Returns
    ///
    /// A rule with no constraint, parties or target.
    pub fn new(kind: RuleKind, action: impl Into<Iri>) -> Self {
        Self {
            kind,
            uid: None,
            actions: vec![Action::new(action)],
            target: None,
            assigner: None,
            assignee: None,
            constraint: None,
            duties: Vec::new(),
        }
    }

    /// Check whether the rule has no constraint.
    pub fn is_unconditional(&self) -> bool {
        self.constraint.is_none()
    }
}
