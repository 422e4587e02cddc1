//! Policy engine.
//!
//! This module provides the facade that owns the loaded policies and
//! answers permission requests against them.

use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

use super::audit::PolicyAudit;
use super::context::EvaluationContext;
use super::decision::DecisionAggregator;
use super::evaluator::ConstraintEvaluator;
use crate::config::EngineConfig;
use crate::diagnostics::{self, DiagnosticEvent, DiagnosticKind};
use crate::error::{ConfigError, EngineError, Result};
use crate::id::PolicyHandle;
use crate::model::{
    Evaluation, Party, Policy, Reason, Rule, RuleKind, RuleRef, Satisfaction,
};
use crate::parser::{ParserOptions, PolicyParser};
use crate::store::{InMemoryPolicyStore, PolicyStore};
use crate::vocab::{odrl, Iri, TermDictionary};

/// A policy engine.
///
/// The engine parses policy documents into its store and evaluates requests
/// against them. Evaluation only reads the store, so any number of
/// evaluations may run at once.
///
/// # Examples
///
/// ```
/// use odrl_policy::{Decision, EngineConfig, EvaluationContext, PolicyEngine};
///
/// let engine = PolicyEngine::new(EngineConfig::default());
/// let handle = engine.load_policy(br#"{
///     "@context": "http://www.w3.org/ns/odrl.jsonld",
///     "type": "Set",
///     "uid": "http://example.com/policy/1",
///     "permission": [{ "target": "http://example.com/asset/1", "action": "play" }]
/// }"#).unwrap();
///
/// let evaluation = engine.evaluate(handle, "play", &EvaluationContext::new()).unwrap();
/// assert_eq!(evaluation.decision, Decision::Permitted);
/// ```
pub struct PolicyEngine<P: PolicyStore = InMemoryPolicyStore> {
    /// The loaded policies.
    store: P,

    /// The document parser.
    parser: PolicyParser,

    /// The engine configuration.
    config: EngineConfig,

    /// Recent evaluations.
    audit: PolicyAudit,
}

impl PolicyEngine<InMemoryPolicyStore> {
    /// Create a new engine with an empty in-memory store.
    ///
    /// # Arguments
    ///
    /// * `config` - The engine configuration.
    ///
    /// # Returns
    ///
    /// A new policy engine.
    pub fn new(config: EngineConfig) -> Self {
        Self::with_store(InMemoryPolicyStore::new(), config)
    }

    /// Create a new engine with an empty in-memory store, validating the
    /// configuration first.
    ///
    /// # Arguments
    ///
    /// * `config` - The engine configuration.
    ///
    /// # Returns
    ///
    /// * `Ok(PolicyEngine)` - A new policy engine.
    /// * `Err(ConfigError)` - If a configuration value is out of range.
    pub fn try_new(config: EngineConfig) -> std::result::Result<Self, ConfigError> {
        Self::try_with_store(InMemoryPolicyStore::new(), config)
    }
}

impl Default for PolicyEngine<InMemoryPolicyStore> {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl<P> PolicyEngine<P>
where
    P: PolicyStore,
{
    /// Create a new engine over a policy store.
    ///
    /// If the configuration asks for verbose diagnostics they are turned on
    /// for the whole process.
    ///
    /// # Arguments
    ///
    /// * `store` - The policy store.
    /// * `config` - The engine configuration.
    ///
    /// # Returns
    ///
    /// A new policy engine.
    pub fn with_store(store: P, config: EngineConfig) -> Self {
        if config.verbose {
            diagnostics::enable_verbose_logging(true);
        }

        Self {
            store,
            parser: PolicyParser::new(ParserOptions::from(&config)),
            audit: PolicyAudit::new(config.audit_capacity),
            config,
        }
    }

    /// Create a new engine over a policy store, validating the configuration
    /// first.
    ///
    /// # Returns
    ///
    /// * `Ok(PolicyEngine)` - A new policy engine.
    /// * `Err(ConfigError)` - If a configuration value is out of range.
    pub fn try_with_store(store: P, config: EngineConfig) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::with_store(store, config))
    }

    /// Get the engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Get the policy store.
    pub fn store(&self) -> &P {
        &self.store
    }

    /// Get the evaluation audit.
    pub fn audit(&self) -> &PolicyAudit {
        &self.audit
    }

    /// Turn diagnostic trace emission on or off.
    ///
    /// The toggle is process-wide and never changes a decision.
    pub fn enable_verbose_logging(&self, enabled: bool) {
        diagnostics::enable_verbose_logging(enabled);
    }

    /// Parse a policy document and load it.
    ///
    /// # Arguments
    ///
    /// * `raw` - The document bytes.
    ///
    /// # Returns
    ///
    /// * `Ok(PolicyHandle)` - The handle of the loaded policy.
    /// * `Err(Error::Parse)` - If the document is invalid. Nothing is loaded.
    /// * `Err(Error::Engine)` - If a policy with the same uid is loaded.
    pub fn load_policy(&self, raw: &[u8]) -> Result<PolicyHandle> {
        let policy = match self.parser.parse(raw) {
            Ok(policy) => policy,
            Err(e) => {
                warn!("Rejected policy document at {}: {}", e.location(), e);
                diagnostics::emit(|| DiagnosticEvent::new(DiagnosticKind::PolicyRejected, e.to_string()));
                return Err(e.into());
            }
        };

        Ok(self.load_parsed(policy)?)
    }

    /// Load a policy that has already been parsed.
    ///
    /// # Arguments
    ///
    /// * `policy` - The policy to load.
    ///
    /// # Returns
    ///
    /// * `Ok(PolicyHandle)` - The handle of the loaded policy.
    /// * `Err(EngineError::DuplicateUid)` - If a policy with the same uid is loaded.
    pub fn load_parsed(&self, policy: Policy) -> std::result::Result<PolicyHandle, EngineError> {
        let uid = policy.uid.clone();
        let rules = policy.rule_count();

        match self.store.insert(policy) {
            Ok(handle) => {
                debug!("Loaded policy {} as {} with {} rules", uid, handle, rules);
                diagnostics::emit(|| {
                    DiagnosticEvent::new(
                        DiagnosticKind::PolicyLoaded,
                        format!("loaded as {} with {} rules", handle, rules),
                    )
                    .with_policy(&uid)
                });
                Ok(handle)
            }
            Err(e) => {
                warn!("Rejected policy {}: {}", uid, e);
                diagnostics::emit(|| {
                    DiagnosticEvent::new(DiagnosticKind::PolicyRejected, e.to_string()).with_policy(&uid)
                });
                Err(e)
            }
        }
    }

    /// Unload a policy.
    ///
    /// Its audit entries are dropped with it.
    ///
    /// # Arguments
    ///
    /// * `handle` - The handle of the policy.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - If the policy was unloaded.
    /// * `Err(EngineError::UnknownHandle)` - If the handle is not loaded.
    pub fn unload(&self, handle: PolicyHandle) -> std::result::Result<(), EngineError> {
        let policy = self.store.remove(&handle)?;
        self.audit.clear(&handle);

        debug!("Unloaded policy {} ({})", policy.uid, handle);
        diagnostics::emit(|| {
            DiagnosticEvent::new(DiagnosticKind::PolicyUnloaded, format!("unloaded {}", handle))
                .with_policy(&policy.uid)
        });

        Ok(())
    }

    /// Get a loaded policy.
    pub fn get(&self, handle: PolicyHandle) -> Option<Arc<Policy>> {
        self.store.get(&handle)
    }

    /// Get the handle of the policy with a uid.
    pub fn handle_for_uid(&self, uid: &str) -> Option<PolicyHandle> {
        self.store.get_by_uid(uid).map(|(handle, _)| handle)
    }

    /// Get the number of loaded policies.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Check whether no policy is loaded.
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Evaluate a request.
    ///
    /// The rules of the policy and of every policy it inherits from are
    /// pooled, local rules first. Rules that apply to the action, target and
    /// assignee of the request are evaluated, and the policy's conflict
    /// strategy turns their states into a decision.
    ///
    /// # Arguments
    ///
    /// * `handle` - The policy to evaluate.
    /// * `action` - The requested action: an ODRL action name, a compact IRI
    ///   or a full IRI.
    /// * `context` - The request facts.
    ///
    /// # Returns
    ///
    /// * `Ok(Evaluation)` - The decision with its justification.
    /// * `Err(EngineError)` - If the handle is unknown, the inheritance chain
    ///   is cyclic or too deep, or rules conflict under the `invalid` strategy.
    pub fn evaluate(
        &self,
        handle: PolicyHandle,
        action: &str,
        context: &EvaluationContext,
    ) -> std::result::Result<Evaluation, EngineError> {
        let policy = self
            .store
            .get(&handle)
            .ok_or(EngineError::UnknownHandle(handle))?;
        let action = TermDictionary::builtin()
            .expand(action)
            .unwrap_or_else(|| Iri::new(action));

        let mut reasons = Vec::new();
        let lineage = self.lineage(&policy, &mut reasons)?;

        // Evaluate the applicable rules, local rules first
        let mut aggregator = DecisionAggregator::new();
        for member in &lineage {
            for kind in [RuleKind::Permission, RuleKind::Prohibition] {
                for (index, rule) in member.rules(kind).iter().enumerate() {
                    if !self.applies(member, rule, &action, context) {
                        continue;
                    }

                    let rule_ref = RuleRef {
                        policy: member.uid.clone(),
                        kind,
                        index,
                    };
                    let satisfaction = self.rule_state(member, rule, &action, context, &mut reasons);
                    diagnostics::emit(|| {
                        DiagnosticEvent::new(
                            DiagnosticKind::RuleEvaluated,
                            format!("{}: {}", rule_ref, satisfaction),
                        )
                        .with_policy(&policy.uid)
                    });
                    aggregator.add(rule_ref, satisfaction);
                }
            }
        }

        let (decision, decided_by) = match aggregator.resolve(&policy.uid, policy.conflict) {
            Ok(decided) => decided,
            Err(e) => {
                warn!("Evaluation of {} on {} failed: {}", action, policy.uid, e);
                diagnostics::emit(|| {
                    DiagnosticEvent::new(DiagnosticKind::Decision, e.to_string()).with_policy(&policy.uid)
                });
                return Err(e);
            }
        };

        let pending_obligations = self.pending_obligations(&lineage, context, &mut reasons);

        let evaluation = Evaluation {
            handle,
            policy_uid: policy.uid.clone(),
            action,
            decision,
            decided_by,
            reasons,
            pending_obligations,
            evaluated_at: context.now(),
        };

        diagnostics::emit(|| {
            let by = evaluation
                .decided_by
                .as_ref()
                .map(|rule| format!(" by {}", rule))
                .unwrap_or_default();
            DiagnosticEvent::new(
                DiagnosticKind::Decision,
                format!("{} {}{}", evaluation.action, evaluation.decision, by),
            )
            .with_policy(&policy.uid)
        });
        self.audit.record(evaluation.clone());

        // An unload that ran meanwhile has already cleared the audit
        if self.store.get(&handle).is_none() {
            self.audit.clear(&handle);
        }

        Ok(evaluation)
    }

    /// Collect a policy and the policies it inherits from, depth first,
    /// each once.
    fn lineage(
        &self,
        root: &Arc<Policy>,
        reasons: &mut Vec<Reason>,
    ) -> std::result::Result<Vec<Arc<Policy>>, EngineError> {
        let mut lineage = vec![root.clone()];
        let mut path = vec![root.uid.clone()];
        let mut seen = HashSet::new();
        seen.insert(root.uid.clone());

        self.visit_inherited(root, 0, &mut path, &mut seen, &mut lineage, reasons)?;

        Ok(lineage)
    }

    fn visit_inherited(
        &self,
        policy: &Policy,
        depth: usize,
        path: &mut Vec<Iri>,
        seen: &mut HashSet<Iri>,
        lineage: &mut Vec<Arc<Policy>>,
        reasons: &mut Vec<Reason>,
    ) -> std::result::Result<(), EngineError> {
        for uid in policy.inherited_uids() {
            if path.contains(uid) {
                return Err(EngineError::CyclicInheritance { uid: uid.clone() });
            }
            if seen.contains(uid) {
                continue;
            }

            let parent = match self.store.get_by_uid(uid.as_str()) {
                Some((_, parent)) => parent,
                None => {
                    debug!("Inherited policy {} of {} is not loaded", uid, policy.uid);
                    diagnostics::emit(|| {
                        DiagnosticEvent::new(
                            DiagnosticKind::InheritanceSkipped,
                            format!("inherited policy {} is not loaded", uid),
                        )
                        .with_policy(&policy.uid)
                    });
                    reasons.push(Reason::InheritedPolicyMissing { uid: uid.clone() });
                    seen.insert(uid.clone());
                    continue;
                }
            };

            if depth + 1 > self.config.max_inheritance_depth {
                return Err(EngineError::DepthLimitExceeded {
                    uid: uid.clone(),
                    limit: self.config.max_inheritance_depth,
                });
            }

            seen.insert(uid.clone());
            lineage.push(parent.clone());
            path.push(uid.clone());
            self.visit_inherited(&parent, depth + 1, path, seen, lineage, reasons)?;
            path.pop();
        }

        Ok(())
    }

    /// Check whether a rule is about the requested action, target and
    /// assignee.
    fn applies(&self, policy: &Policy, rule: &Rule, action: &Iri, context: &EvaluationContext) -> bool {
        if !rule.actions.iter().any(|a| action_covers(&a.iri, action)) {
            return false;
        }

        if let (Some(requested), Some(target)) = (context.target(), policy.effective_target(rule)) {
            if requested != target {
                return false;
            }
        }

        match (context.assignee(), policy.effective_assignee(rule)) {
            (Some(requested), Some(party)) => self.party_matches(policy, party, requested, context),
            _ => true,
        }
    }

    /// Check whether the requesting party is, or belongs to, a party.
    fn party_matches(&self, policy: &Policy, party: &Party, requested: &Iri, context: &EvaluationContext) -> bool {
        if party.uid.as_ref() == Some(requested) {
            return true;
        }
        if !party.is_collection() {
            return false;
        }

        if let Some(uid) = &party.uid {
            if context.is_member_of(uid) {
                return true;
            }
        }

        match party.refinement {
            Some(refinement) => {
                let evaluator = ConstraintEvaluator::with_config(&policy.constraints, context, &self.config);
                evaluator.evaluate(refinement).satisfaction == Satisfaction::Satisfied
            }
            None => false,
        }
    }

    /// Evaluate the constraint, action refinement and duties of a rule.
    fn rule_state(
        &self,
        policy: &Policy,
        rule: &Rule,
        action: &Iri,
        context: &EvaluationContext,
        reasons: &mut Vec<Reason>,
    ) -> Satisfaction {
        let evaluator = ConstraintEvaluator::with_config(&policy.constraints, context, &self.config);
        let mut state = Satisfaction::Satisfied;

        if let Some(constraint) = rule.constraint {
            let outcome = evaluator.evaluate(constraint);
            reasons.extend(outcome.reasons);
            state = state.and(outcome.satisfaction);
        }

        let refinement = rule
            .actions
            .iter()
            .find(|a| action_covers(&a.iri, action))
            .and_then(|a| a.refinement);
        if let Some(refinement) = refinement {
            let outcome = evaluator.evaluate(refinement);
            reasons.extend(outcome.reasons);
            state = state.and(outcome.satisfaction);
        }

        if rule.kind == RuleKind::Permission {
            for duty in &rule.duties {
                if !self.duty_fulfilled(policy, duty, context) {
                    if let Some(duty_action) = duty.actions.first() {
                        reasons.push(Reason::DutyNotPerformed {
                            action: duty_action.iri.clone(),
                        });
                    }
                    state = state.and(Satisfaction::NotSatisfied);
                }
            }
        }

        state
    }

    /// Check whether a duty is performed or not in force.
    fn duty_fulfilled(&self, policy: &Policy, duty: &Rule, context: &EvaluationContext) -> bool {
        if is_performed(duty, context) {
            return true;
        }

        // A duty whose constraint does not hold is not owed
        match duty.constraint {
            Some(constraint) => {
                let evaluator = ConstraintEvaluator::with_config(&policy.constraints, context, &self.config);
                evaluator.evaluate(constraint).satisfaction == Satisfaction::NotSatisfied
            }
            None => false,
        }
    }

    /// List the actions of obligations in force for the requesting party
    /// that have not been performed.
    fn pending_obligations(
        &self,
        lineage: &[Arc<Policy>],
        context: &EvaluationContext,
        reasons: &mut Vec<Reason>,
    ) -> Vec<Iri> {
        let mut pending: Vec<Iri> = Vec::new();

        for policy in lineage {
            for obligation in &policy.obligations {
                if let (Some(requested), Some(party)) = (context.assignee(), policy.effective_assignee(obligation)) {
                    if !self.party_matches(policy, party, requested, context) {
                        continue;
                    }
                }
                if is_performed(obligation, context) {
                    continue;
                }

                if let Some(constraint) = obligation.constraint {
                    let evaluator = ConstraintEvaluator::with_config(&policy.constraints, context, &self.config);
                    let outcome = evaluator.evaluate(constraint);
                    if outcome.satisfaction == Satisfaction::NotSatisfied {
                        continue;
                    }
                    reasons.extend(outcome.reasons);
                }

                for action in &obligation.actions {
                    if !pending.contains(&action.iri) {
                        pending.push(action.iri.clone());
                    }
                }
            }
        }

        pending
    }
}

/// Check whether a rule's action covers the requested action.
///
/// `odrl:use` covers every ODRL action except `odrl:transfer`.
fn action_covers(rule_action: &Iri, requested: &Iri) -> bool {
    if rule_action == requested {
        return true;
    }

    rule_action.odrl_local_name() == Some("use")
        && matches!(
            requested.odrl_local_name(),
            Some(name) if name != "transfer" && odrl::ACTIONS.contains(&name)
        )
}

fn is_performed(duty: &Rule, context: &EvaluationContext) -> bool {
    duty.uid.as_ref().map_or(false, |uid| context.has_performed(uid))
        || duty.actions.iter().any(|a| context.has_performed(&a.iri))
}
