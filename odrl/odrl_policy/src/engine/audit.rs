//! Policy auditing.
//!
//! This module records policy evaluations.

use dashmap::DashMap;
use std::sync::Arc;

use crate::id::PolicyHandle;
use crate::model::{Decision, Evaluation, RuleRef};

/// A policy audit.
///
/// This audit keeps the most recent evaluations of each policy.
#[derive(Clone)]
pub struct PolicyAudit {
    /// The audit entries.
    entries: Arc<DashMap<PolicyHandle, Vec<Evaluation>>>,

    /// The maximum number of entries to keep per policy.
    max_entries_per_policy: usize,
}

impl PolicyAudit {
    /// Create a new policy audit.
    ///
    /// # Arguments
    ///
    /// * `max_entries_per_policy` - The maximum number of entries to keep per policy.
    ///
    /// # Returns
    ///
    /// A new policy audit.
    pub fn new(max_entries_per_policy: usize) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            max_entries_per_policy,
        }
    }

    /// Record an evaluation.
    ///
    /// The oldest entries of the policy are dropped once the limit is reached.
    pub fn record(&self, evaluation: Evaluation) {
        if self.max_entries_per_policy == 0 {
            return;
        }

        let mut policy_entries = self.entries.entry(evaluation.handle).or_default();
        policy_entries.push(evaluation);

        // Trim the entries if necessary
        if policy_entries.len() > self.max_entries_per_policy {
            let to_remove = policy_entries.len() - self.max_entries_per_policy;
            policy_entries.drain(0..to_remove);
        }
    }

    /// Get the evaluations of a policy, oldest first.
    ///
    /// # Arguments
    ///
    /// * `handle` - The policy.
    ///
    /// # Returns
    ///
    /// The evaluations, empty if none were recorded.
    pub fn evaluations(&self, handle: &PolicyHandle) -> Vec<Evaluation> {
        match self.entries.get(handle) {
            Some(entries) => entries.clone(),
            None => Vec::new(),
        }
    }

    /// Clear the evaluations of a policy.
    pub fn clear(&self, handle: &PolicyHandle) {
        self.entries.remove(handle);
    }

    /// Get all evaluations.
    pub fn all(&self) -> Vec<Evaluation> {
        let mut evaluations = Vec::new();

        for entry in self.entries.iter() {
            evaluations.extend(entry.value().iter().cloned());
        }

        evaluations
    }

    /// Get evaluations filtered by decision.
    ///
    /// # Arguments
    ///
    /// * `decision` - The decision to filter by.
    ///
    /// # Returns
    ///
    /// The matching evaluations.
    pub fn by_decision(&self, decision: Decision) -> Vec<Evaluation> {
        self.filter(|evaluation| evaluation.decision == decision)
    }

    /// Get evaluations decided by a rule.
    ///
    /// # Arguments
    ///
    /// * `rule` - The deciding rule to filter by.
    ///
    /// # Returns
    ///
    /// The matching evaluations.
    pub fn by_rule(&self, rule: &RuleRef) -> Vec<Evaluation> {
        self.filter(|evaluation| evaluation.decided_by.as_ref() == Some(rule))
    }

    fn filter<F>(&self, matcher: F) -> Vec<Evaluation>
    where
        F: Fn(&Evaluation) -> bool,
    {
        let mut evaluations = Vec::new();

        for entry in self.entries.iter() {
            for evaluation in entry.value() {
                if matcher(evaluation) {
                    evaluations.push(evaluation.clone());
                }
            }
        }

        evaluations
    }
}

impl Default for PolicyAudit {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RuleKind;
    use crate::vocab::Iri;
    use chrono::{Duration, TimeZone, Utc};

    fn evaluation(handle: PolicyHandle, decision: Decision, minute: i64) -> Evaluation {
        Evaluation {
            handle,
            policy_uid: Iri::new("http://example.com/policy"),
            action: Iri::odrl("play"),
            decision,
            decided_by: None,
            reasons: Vec::new(),
            pending_obligations: Vec::new(),
            evaluated_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minute),
        }
    }

    #[test]
    fn test_record_and_get_evaluations() {
        let audit = PolicyAudit::new(10);
        let handle = PolicyHandle::new();

        // Record an evaluation
        audit.record(evaluation(handle, Decision::Permitted, 0));

        // Check the recorded evaluation
        let evaluations = audit.evaluations(&handle);
        assert_eq!(evaluations.len(), 1);
        assert_eq!(evaluations[0].handle, handle);
        assert!(evaluations[0].is_permitted());

        // Other policies have none
        assert!(audit.evaluations(&PolicyHandle::new()).is_empty());
    }

    #[test]
    fn test_clear() {
        let audit = PolicyAudit::new(10);
        let handle = PolicyHandle::new();

        audit.record(evaluation(handle, Decision::Permitted, 0));
        audit.clear(&handle);

        assert!(audit.evaluations(&handle).is_empty());
        assert!(audit.all().is_empty());
    }

    #[test]
    fn test_max_entries_per_policy() {
        let audit = PolicyAudit::new(2);
        let handle = PolicyHandle::new();

        for minute in 0..3 {
            audit.record(evaluation(handle, Decision::Undetermined, minute));
        }

        // The oldest evaluation was removed
        let evaluations = audit.evaluations(&handle);
        assert_eq!(evaluations.len(), 2);
        assert_eq!(evaluations[0].evaluated_at.timestamp() % 3600, 60);
        assert_eq!(evaluations[1].evaluated_at.timestamp() % 3600, 120);
    }

    #[test]
    fn test_zero_capacity_records_nothing() {
        let audit = PolicyAudit::new(0);
        let handle = PolicyHandle::new();

        audit.record(evaluation(handle, Decision::Permitted, 0));
        assert!(audit.evaluations(&handle).is_empty());
    }

    #[test]
    fn test_filters() {
        let audit = PolicyAudit::new(10);
        let first = PolicyHandle::new();
        let second = PolicyHandle::new();

        let rule = RuleRef {
            policy: Iri::new("http://example.com/policy"),
            kind: RuleKind::Prohibition,
            index: 0,
        };
        let mut prohibited = evaluation(second, Decision::Prohibited, 1);
        prohibited.decided_by = Some(rule.clone());

        audit.record(evaluation(first, Decision::Permitted, 0));
        audit.record(prohibited);

        assert_eq!(audit.all().len(), 2);
        assert_eq!(audit.by_decision(Decision::Permitted).len(), 1);
        assert_eq!(audit.by_decision(Decision::Prohibited)[0].handle, second);
        assert_eq!(audit.by_rule(&rule).len(), 1);
        assert!(audit.by_decision(Decision::Undetermined).is_empty());
    }
}
