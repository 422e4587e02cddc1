//! Policy model.

use std::fmt;

use super::constraint::ConstraintArena;
use super::party::Party;
use super::rule::{Rule, RuleKind};
use crate::vocab::Iri;

/// The class of a policy.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PolicyType {
    /// A generic policy.
    Policy,
    /// A set of rules with no further semantics.
    Set,
    /// Rules offered by an assigner.
    Offer,
    /// Rules agreed between an assigner and an assignee.
    Agreement,
    /// Rules requested by an assignee.
    Request,
    /// Rules granted to the holder of a ticket.
    Ticket,
    /// Rules asserted by a party.
    Assertion,
    /// Rules about the handling of personal data.
    Privacy,
    /// A profile-defined policy class.
    Other(Iri),
}

impl PolicyType {
    /// Look up a policy type by ODRL local name, ignoring case.
    pub fn from_local_name(name: &str) -> Option<Self> {
        let policy_type = match name.to_ascii_lowercase().as_str() {
            "policy" => PolicyType::Policy,
            "set" => PolicyType::Set,
            "offer" => PolicyType::Offer,
            "agreement" => PolicyType::Agreement,
            "request" => PolicyType::Request,
            "ticket" => PolicyType::Ticket,
            "assertion" => PolicyType::Assertion,
            "privacy" => PolicyType::Privacy,
            _ => return None,
        };
        Some(policy_type)
    }

    /// Get the full IRI of this policy type.
    pub fn iri(&self) -> Iri {
        let local = match self {
            PolicyType::Policy => "Policy",
            PolicyType::Set => "Set",
            PolicyType::Offer => "Offer",
            PolicyType::Agreement => "Agreement",
            PolicyType::Request => "Request",
            PolicyType::Ticket => "Ticket",
            PolicyType::Assertion => "Assertion",
            PolicyType::Privacy => "Privacy",
            PolicyType::Other(iri) => return iri.clone(),
        };
        Iri::odrl(local)
    }
}

impl fmt::Display for PolicyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyType::Other(iri) => write!(f, "{}", iri),
            other => f.write_str(other.iri().local_name()),
        }
    }
}

/// How a policy resolves a satisfied permission that meets a satisfied
/// prohibition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConflictStrategy {
    /// Permissions win.
    Perm,

    /// Prohibitions win.
    Prohibit,

    /// The conflict is an error.
    #[default]
    Invalid,
}

impl ConflictStrategy {
    /// Look up a strategy by local name, ignoring case.
    pub fn from_local_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "perm" => Some(ConflictStrategy::Perm),
            "prohibit" => Some(ConflictStrategy::Prohibit),
            "invalid" => Some(ConflictStrategy::Invalid),
            _ => None,
        }
    }

    /// Get the full IRI of this strategy.
    pub fn iri(&self) -> Iri {
        match self {
            ConflictStrategy::Perm => Iri::odrl("perm"),
            ConflictStrategy::Prohibit => Iri::odrl("prohibit"),
            ConflictStrategy::Invalid => Iri::odrl("invalid"),
        }
    }
}

impl fmt::Display for ConflictStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.iri().local_name())
    }
}

/// A parsed policy.
///
/// A policy is immutable once parsed. Constraint trees of every rule and
/// party live in [`Policy::constraints`].
#[derive(Debug, Clone, PartialEq)]
pub struct Policy {
    /// The policy uid.
    pub uid: Iri,

    /// The policy class.
    pub policy_type: PolicyType,

    /// The assigner.
    pub assigner: Option<Party>,

    /// The assignee.
    pub assignee: Option<Party>,

    /// The target asset.
    pub target: Option<Iri>,

    /// A human-readable title.
    pub title: Option<String>,

    /// The conflict strategy.
    pub conflict: ConflictStrategy,

    /// Policies this policy inherits rules from, in document order.
    pub inherit_from: Vec<Iri>,

    /// Profiles the policy conforms to.
    pub profile: Vec<Iri>,

    /// Permissions, in document order.
    pub permissions: Vec<Rule>,

    /// Prohibitions, in document order.
    pub prohibitions: Vec<Rule>,

    /// Obligations, in document order.
    pub obligations: Vec<Rule>,

    /// Storage for every constraint of the policy.
    pub constraints: ConstraintArena,
}

impl Policy {
    /// Create an empty policy.
    ///
    /// # Arguments
    ///
    /// * `uid` - The policy uid.
    /// * `policy_type` - The policy class.
    ///
    /// # Returns
    ///
    /// A policy with no rules.
    pub fn new(uid: impl Into<Iri>, policy_type: PolicyType) -> Self {
        Self {
            uid: uid.into(),
            policy_type,
            assigner: None,
            assignee: None,
            target: None,
            title: None,
            conflict: ConflictStrategy::default(),
            inherit_from: Vec::new(),
            profile: Vec::new(),
            permissions: Vec::new(),
            prohibitions: Vec::new(),
            obligations: Vec::new(),
            constraints: ConstraintArena::new(),
        }
    }

    /// Get the top-level rules of one kind.
    pub fn rules(&self, kind: RuleKind) -> &[Rule] {
        match kind {
            RuleKind::Permission => &self.permissions,
            RuleKind::Prohibition => &self.prohibitions,
            RuleKind::Duty => &self.obligations,
        }
    }

    /// Get the total number of top-level rules.
    pub fn rule_count(&self) -> usize {
        self.permissions.len() + self.prohibitions.len() + self.obligations.len()
    }

    /// Get the inherited policy uids with duplicates removed, keeping the
    /// first occurrence of each.
    pub fn inherited_uids(&self) -> Vec<&Iri> {
        let mut seen = Vec::new();
        for uid in &self.inherit_from {
            if !seen.contains(&uid) {
                seen.push(uid);
            }
        }
        seen
    }

    /// Get the assignee in effect for a rule of this policy.
    pub fn effective_assignee<'a>(&'a self, rule: &'a Rule) -> Option<&'a Party> {
        rule.assignee.as_ref().or(self.assignee.as_ref())
    }

    /// Get the assigner in effect for a rule of this policy.
    pub fn effective_assigner<'a>(&'a self, rule: &'a Rule) -> Option<&'a Party> {
        rule.assigner.as_ref().or(self.assigner.as_ref())
    }

    /// Get the target in effect for a rule of this policy.
    pub fn effective_target<'a>(&'a self, rule: &'a Rule) -> Option<&'a Iri> {
        rule.target.as_ref().or(self.target.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_type_lookup() {
        assert_eq!(PolicyType::from_local_name("Agreement"), Some(PolicyType::Agreement));
        assert_eq!(PolicyType::from_local_name("offer"), Some(PolicyType::Offer));
        assert_eq!(PolicyType::from_local_name("Contract"), None);
        assert_eq!(PolicyType::Set.iri(), Iri::odrl("Set"));
        assert_eq!(PolicyType::Agreement.to_string(), "Agreement");
    }

    #[test]
    fn test_conflict_strategy() {
        assert_eq!(ConflictStrategy::default(), ConflictStrategy::Invalid);
        assert_eq!(ConflictStrategy::from_local_name("Perm"), Some(ConflictStrategy::Perm));
        assert_eq!(ConflictStrategy::from_local_name("deny"), None);
    }

    #[test]
    fn test_inherited_uids_dedup() {
        let mut policy = Policy::new("http://example.com/p", PolicyType::Set);
        policy.inherit_from = vec![
            Iri::new("http://a.com/abc"),
            Iri::new("http://a.com/def"),
            Iri::new("http://a.com/abc"),
        ];

        let uids = policy.inherited_uids();
        assert_eq!(uids.len(), 2);
        assert_eq!(uids[0].as_str(), "http://a.com/abc");
        assert_eq!(uids[1].as_str(), "http://a.com/def");
    }

    #[test]
    fn test_effective_parties() {
        let mut policy = Policy::new("http://example.com/p", PolicyType::Agreement);
        policy.assignee = Some(Party::new("http://example.com/alice"));

        let mut rule = Rule::new(RuleKind::Permission, Iri::odrl("use"));
        assert_eq!(
            policy.effective_assignee(&rule).and_then(|p| p.uid.as_ref()),
            Some(&Iri::new("http://example.com/alice"))
        );

        rule.assignee = Some(Party::new("http://example.com/bob"));
        assert_eq!(
            policy.effective_assignee(&rule).and_then(|p| p.uid.as_ref()),
            Some(&Iri::new("http://example.com/bob"))
        );
    }
}
