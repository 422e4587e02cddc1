//! Evaluation context.
//!
//! This module defines the caller-supplied facts a policy is evaluated
//! against. A context is owned by the caller and never retained by the
//! engine.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};

use crate::model::Value;
use crate::vocab::{Iri, TermDictionary};

/// The facts a policy is evaluated against.
///
/// Operand names passed to the setters may be ODRL short names (`count`),
/// compact IRIs (`odrl:count`) or full IRIs.
///
/// # Examples
///
/// ```
/// use odrl_policy::EvaluationContext;
///
/// let context = EvaluationContext::new()
///     .with_operand("count", 3i64)
///     .with_assignee("http://example.com/alice");
///
/// assert!(context.lookup(&odrl_policy::Iri::odrl("count")).is_some());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationContext {
    /// The current time, used for `dateTime`.
    now: DateTime<Utc>,

    /// When the usage started, used for `elapsedTime`.
    started_at: Option<DateTime<Utc>>,

    /// Operand values by IRI.
    operands: HashMap<Iri, Value>,

    /// The party requesting the action.
    assignee: Option<Iri>,

    /// The asset the action is requested on.
    target: Option<Iri>,

    /// Collections the assignee belongs to.
    memberships: HashSet<Iri>,

    /// Duties already performed, by uid or action IRI.
    performed: HashSet<Iri>,

    /// When each constraint of a sequence occurred, by constraint uid.
    event_times: HashMap<Iri, DateTime<Utc>>,
}

impl EvaluationContext {
    /// Create a context at the current time.
    pub fn new() -> Self {
        Self::at(Utc::now())
    }

    /// Create a context at a fixed time.
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now,
            started_at: None,
            operands: HashMap::new(),
            assignee: None,
            target: None,
            memberships: HashSet::new(),
            performed: HashSet::new(),
            event_times: HashMap::new(),
        }
    }

    /// Set an operand value.
    pub fn with_operand(mut self, operand: &str, value: impl Into<Value>) -> Self {
        self.set_operand(operand, value);
        self
    }

    /// Set an operand value in place.
    pub fn set_operand(&mut self, operand: &str, value: impl Into<Value>) {
        self.operands.insert(expand(operand), value.into());
    }

    /// Set the start of the usage.
    pub fn with_started_at(mut self, started_at: DateTime<Utc>) -> Self {
        self.started_at = Some(started_at);
        self
    }

    /// Set the requesting party.
    pub fn with_assignee(mut self, assignee: impl Into<Iri>) -> Self {
        self.assignee = Some(assignee.into());
        self
    }

    /// Set the requested asset.
    pub fn with_target(mut self, target: impl Into<Iri>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Declare that the assignee belongs to a party collection.
    pub fn with_membership(mut self, collection: impl Into<Iri>) -> Self {
        self.memberships.insert(collection.into());
        self
    }

    /// Declare a duty as performed, by duty uid or action.
    pub fn with_performed(mut self, duty: &str) -> Self {
        self.performed.insert(expand(duty));
        self
    }

    /// Record when the constraint with the given uid occurred.
    pub fn with_event_time(mut self, constraint: impl Into<Iri>, at: DateTime<Utc>) -> Self {
        self.event_times.insert(constraint.into(), at);
        self
    }

    /// Get the current time.
    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// Get the requesting party.
    pub fn assignee(&self) -> Option<&Iri> {
        self.assignee.as_ref()
    }

    /// Get the requested asset.
    pub fn target(&self) -> Option<&Iri> {
        self.target.as_ref()
    }

    /// Check whether the assignee belongs to a collection.
    pub fn is_member_of(&self, collection: &Iri) -> bool {
        self.memberships.contains(collection)
    }

    /// Check whether a duty has been performed.
    pub fn has_performed(&self, duty: &Iri) -> bool {
        self.performed.contains(duty)
    }

    /// Get when a constraint occurred.
    pub fn event_time(&self, constraint: &Iri) -> Option<DateTime<Utc>> {
        self.event_times.get(constraint).copied()
    }

    /// Look up the value of an operand.
    ///
    /// Explicit values win. Otherwise `dateTime` is the current time and
    /// `elapsedTime` is the time since the usage started.
    pub fn lookup(&self, operand: &Iri) -> Option<Value> {
        if let Some(value) = self.operands.get(operand) {
            return Some(value.clone());
        }

        match operand.odrl_local_name() {
            Some("dateTime") => Some(Value::from(self.now)),
            Some("elapsedTime") => self
                .started_at
                .map(|started| Value::Duration(self.now - started)),
            _ => None,
        }
    }
}

impl Default for EvaluationContext {
    fn default() -> Self {
        Self::new()
    }
}

fn expand(name: &str) -> Iri {
    TermDictionary::builtin()
        .expand(name)
        .unwrap_or_else(|| Iri::new(name))
}
