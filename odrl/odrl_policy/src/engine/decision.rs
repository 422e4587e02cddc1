//! Decision aggregation.
//!
//! This module combines the states of the applicable permissions and
//! prohibitions of a policy into one decision, using the policy's conflict
//! strategy.

use crate::error::EngineError;
use crate::model::{ConflictStrategy, Decision, RuleKind, RuleRef, Satisfaction};
use crate::vocab::Iri;

/// The combined state of the rules of one kind that apply to a request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RuleState {
    /// At least one rule is satisfied. The first one is kept.
    Satisfied(RuleRef),

    /// No rule is satisfied, but at least one may be.
    Indeterminate,

    /// No rule applies, or none is satisfied.
    #[default]
    NotApplicable,
}

impl RuleState {
    /// Fold the state of one more rule into this state.
    ///
    /// # Arguments
    ///
    /// * `rule` - The rule.
    /// * `satisfaction` - Whether its constraints hold.
    pub fn add(&mut self, rule: RuleRef, satisfaction: Satisfaction) {
        if matches!(self, RuleState::Satisfied(_)) {
            return;
        }
        match satisfaction {
            Satisfaction::Satisfied => *self = RuleState::Satisfied(rule),
            Satisfaction::Indeterminate => *self = RuleState::Indeterminate,
            Satisfaction::NotSatisfied => {}
        }
    }

    /// Get the deciding rule, if any.
    pub fn rule(&self) -> Option<&RuleRef> {
        match self {
            RuleState::Satisfied(rule) => Some(rule),
            _ => None,
        }
    }
}

/// Collect rule states for one request.
#[derive(Debug, Clone, Default)]
pub struct DecisionAggregator {
    /// The combined permission state.
    permission: RuleState,

    /// The combined prohibition state.
    prohibition: RuleState,
}

impl DecisionAggregator {
    /// Create a new aggregator with no rules.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the evaluation of one applicable rule.
    pub fn add(&mut self, rule: RuleRef, satisfaction: Satisfaction) {
        match rule.kind {
            RuleKind::Permission => self.permission.add(rule, satisfaction),
            RuleKind::Prohibition => self.prohibition.add(rule, satisfaction),
            RuleKind::Duty => {}
        }
    }

    /// Get the combined permission state.
    pub fn permission(&self) -> &RuleState {
        &self.permission
    }

    /// Get the combined prohibition state.
    pub fn prohibition(&self) -> &RuleState {
        &self.prohibition
    }

    /// Resolve the decision.
    ///
    /// # Arguments
    ///
    /// * `policy` - The uid of the evaluated policy.
    /// * `strategy` - The conflict strategy of the evaluated policy.
    ///
    /// # Returns
    ///
    /// * `Ok((Decision, Option<RuleRef>))` - The decision and the rule that made it.
    /// * `Err(EngineError::ConflictingRules)` - If a permission and a prohibition
    ///   both hold under the `invalid` strategy.
    pub fn resolve(
        self,
        policy: &Iri,
        strategy: ConflictStrategy,
    ) -> Result<(Decision, Option<RuleRef>), EngineError> {
        use RuleState::*;

        let decided = match (self.permission, self.prohibition) {
            (Satisfied(permission), Satisfied(prohibition)) => match strategy {
                ConflictStrategy::Perm => (Decision::Permitted, Some(permission)),
                ConflictStrategy::Prohibit => (Decision::Prohibited, Some(prohibition)),
                ConflictStrategy::Invalid => {
                    return Err(EngineError::ConflictingRules {
                        policy: policy.clone(),
                        permission,
                        prohibition,
                    })
                }
            },
            (Satisfied(permission), NotApplicable) => (Decision::Permitted, Some(permission)),
            (NotApplicable, Satisfied(prohibition)) => (Decision::Prohibited, Some(prohibition)),

            // A prohibition that may hold blocks a permission unless
            // permissions win
            (Satisfied(permission), Indeterminate) => match strategy {
                ConflictStrategy::Perm => (Decision::Permitted, Some(permission)),
                _ => (Decision::Undetermined, None),
            },
            (Indeterminate, Satisfied(prohibition)) => match strategy {
                ConflictStrategy::Prohibit => (Decision::Prohibited, Some(prohibition)),
                _ => (Decision::Undetermined, None),
            },

            _ => (Decision::Undetermined, None),
        };

        Ok(decided)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(kind: RuleKind) -> RuleRef {
        RuleRef {
            policy: Iri::new("http://example.com/policy"),
            kind,
            index: 0,
        }
    }

    fn resolve(
        permission: Option<Satisfaction>,
        prohibition: Option<Satisfaction>,
        strategy: ConflictStrategy,
    ) -> Result<Decision, EngineError> {
        let mut aggregator = DecisionAggregator::new();
        if let Some(s) = permission {
            aggregator.add(rule(RuleKind::Permission), s);
        }
        if let Some(s) = prohibition {
            aggregator.add(rule(RuleKind::Prohibition), s);
        }
        aggregator
            .resolve(&Iri::new("http://example.com/policy"), strategy)
            .map(|(decision, _)| decision)
    }

    #[test]
    fn test_both_satisfied() {
        use Satisfaction::Satisfied;

        assert_eq!(
            resolve(Some(Satisfied), Some(Satisfied), ConflictStrategy::Perm),
            Ok(Decision::Permitted)
        );
        assert_eq!(
            resolve(Some(Satisfied), Some(Satisfied), ConflictStrategy::Prohibit),
            Ok(Decision::Prohibited)
        );
        assert!(matches!(
            resolve(Some(Satisfied), Some(Satisfied), ConflictStrategy::Invalid),
            Err(EngineError::ConflictingRules { .. })
        ));
    }

    #[test]
    fn test_single_side() {
        use Satisfaction::*;

        for strategy in [ConflictStrategy::Perm, ConflictStrategy::Prohibit, ConflictStrategy::Invalid] {
            assert_eq!(resolve(Some(Satisfied), None, strategy), Ok(Decision::Permitted));
            assert_eq!(resolve(None, Some(Satisfied), strategy), Ok(Decision::Prohibited));
            assert_eq!(resolve(Some(Satisfied), Some(NotSatisfied), strategy), Ok(Decision::Permitted));
            assert_eq!(resolve(None, None, strategy), Ok(Decision::Undetermined));
            assert_eq!(resolve(Some(NotSatisfied), None, strategy), Ok(Decision::Undetermined));
            assert_eq!(resolve(Some(Indeterminate), None, strategy), Ok(Decision::Undetermined));
        }
    }

    #[test]
    fn test_indeterminate_opposition() {
        use Satisfaction::*;

        assert_eq!(
            resolve(Some(Satisfied), Some(Indeterminate), ConflictStrategy::Perm),
            Ok(Decision::Permitted)
        );
        assert_eq!(
            resolve(Some(Satisfied), Some(Indeterminate), ConflictStrategy::Prohibit),
            Ok(Decision::Undetermined)
        );
        assert_eq!(
            resolve(Some(Indeterminate), Some(Satisfied), ConflictStrategy::Prohibit),
            Ok(Decision::Prohibited)
        );
        assert_eq!(
            resolve(Some(Indeterminate), Some(Satisfied), ConflictStrategy::Invalid),
            Ok(Decision::Undetermined)
        );
    }

    #[test]
    fn test_first_satisfied_rule_decides() {
        let mut aggregator = DecisionAggregator::new();
        let first = RuleRef { index: 1, ..rule(RuleKind::Permission) };
        let second = RuleRef { index: 2, ..rule(RuleKind::Permission) };

        aggregator.add(rule(RuleKind::Permission), Satisfaction::NotSatisfied);
        aggregator.add(first.clone(), Satisfaction::Satisfied);
        aggregator.add(second, Satisfaction::Satisfied);

        assert_eq!(aggregator.permission().rule(), Some(&first));
    }
}
