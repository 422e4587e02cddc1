//! Policy serialization.
//!
//! Policies are written as ODRL JSON with full IRIs for every value, so the
//! output does not depend on the dictionary of the source document.

use serde_json::{json, Map, Value as JsonValue};

use super::constraint::{ConstraintArena, ConstraintNode, NodeId, RightOperand};
use super::party::{Party, PartyKind};
use super::policy::Policy;
use super::rule::{Action, Rule};
use crate::vocab::odrl::ODRL_CONTEXTS;
use crate::vocab::Iri;

impl Policy {
    /// Write the policy as an ODRL JSON document.
    ///
    /// Parsing the result yields a policy equal to `self`.
    pub fn to_json(&self) -> JsonValue {
        let mut obj = Map::new();

        obj.insert("@context".to_string(), json!(ODRL_CONTEXTS[0]));
        obj.insert("type".to_string(), iri(&self.policy_type.iri()));
        obj.insert("uid".to_string(), iri(&self.uid));

        if let Some(assigner) = &self.assigner {
            obj.insert("assigner".to_string(), party(assigner, &self.constraints));
        }
        if let Some(assignee) = &self.assignee {
            obj.insert("assignee".to_string(), party(assignee, &self.constraints));
        }
        if let Some(target) = &self.target {
            obj.insert("target".to_string(), iri(target));
        }
        if let Some(title) = &self.title {
            obj.insert("title".to_string(), json!(title));
        }
        obj.insert("conflict".to_string(), iri(&self.conflict.iri()));
        if !self.inherit_from.is_empty() {
            obj.insert("inheritFrom".to_string(), iris(&self.inherit_from));
        }
        if !self.profile.is_empty() {
            obj.insert("profile".to_string(), iris(&self.profile));
        }

        for (key, rules) in [
            ("permission", &self.permissions),
            ("prohibition", &self.prohibitions),
            ("obligation", &self.obligations),
        ] {
            if !rules.is_empty() {
                let rules = rules.iter().map(|r| rule(r, &self.constraints)).collect();
                obj.insert(key.to_string(), JsonValue::Array(rules));
            }
        }

        JsonValue::Object(obj)
    }

    /// Write the policy as pretty-printed ODRL JSON.
    pub fn to_json_string(&self) -> String {
        // Serializing a Value cannot fail
        serde_json::to_string_pretty(&self.to_json()).unwrap_or_default()
    }
}

fn iri(value: &Iri) -> JsonValue {
    JsonValue::String(value.as_str().to_string())
}

fn iris(values: &[Iri]) -> JsonValue {
    JsonValue::Array(values.iter().map(iri).collect())
}

fn party(party: &Party, arena: &ConstraintArena) -> JsonValue {
    let mut obj = Map::new();

    let kind = match party.kind {
        PartyKind::Party => Iri::odrl("Party"),
        PartyKind::Collection => Iri::odrl("PartyCollection"),
    };
    obj.insert("type".to_string(), iri(&kind));
    if let Some(uid) = &party.uid {
        obj.insert("uid".to_string(), iri(uid));
    }
    if let Some(source) = &party.source {
        obj.insert("source".to_string(), iri(source));
    }
    if !party.part_of.is_empty() {
        obj.insert("partOf".to_string(), iris(&party.part_of));
    }
    if let Some(refinement) = party.refinement {
        obj.insert("refinement".to_string(), constraint_list(refinement, arena));
    }

    JsonValue::Object(obj)
}

fn rule(rule: &Rule, arena: &ConstraintArena) -> JsonValue {
    let mut obj = Map::new();

    let actions: Vec<JsonValue> = rule.actions.iter().map(|a| action(a, arena)).collect();
    let actions = match <[JsonValue; 1]>::try_from(actions) {
        Ok([single]) => single,
        Err(actions) => JsonValue::Array(actions),
    };
    obj.insert("action".to_string(), actions);

    if let Some(uid) = &rule.uid {
        obj.insert("uid".to_string(), iri(uid));
    }
    if let Some(target) = &rule.target {
        obj.insert("target".to_string(), iri(target));
    }
    if let Some(assigner) = &rule.assigner {
        obj.insert("assigner".to_string(), party(assigner, arena));
    }
    if let Some(assignee) = &rule.assignee {
        obj.insert("assignee".to_string(), party(assignee, arena));
    }
    if let Some(constraint) = rule.constraint {
        obj.insert("constraint".to_string(), constraint_list(constraint, arena));
    }
    if !rule.duties.is_empty() {
        let duties = rule.duties.iter().map(|d| self::rule(d, arena)).collect();
        obj.insert(rule.kind.nested_duty_key().to_string(), JsonValue::Array(duties));
    }

    JsonValue::Object(obj)
}

fn action(action: &Action, arena: &ConstraintArena) -> JsonValue {
    match action.refinement {
        None => iri(&action.iri),
        Some(refinement) => json!({
            "value": iri(&action.iri),
            "refinement": constraint_list(refinement, arena),
        }),
    }
}

/// Write a `constraint` or `refinement` value. An implicit `and` is
/// written back as the bare list it came from.
fn constraint_list(id: NodeId, arena: &ConstraintArena) -> JsonValue {
    match arena.get(id) {
        ConstraintNode::Logical(logical) if logical.implicit => JsonValue::Array(
            logical
                .children
                .iter()
                .map(|child| constraint(*child, arena))
                .collect(),
        ),
        _ => JsonValue::Array(vec![constraint(id, arena)]),
    }
}

fn constraint(id: NodeId, arena: &ConstraintArena) -> JsonValue {
    let mut obj = Map::new();

    match arena.get(id) {
        ConstraintNode::Atomic(c) => {
            if let Some(uid) = &c.uid {
                obj.insert("uid".to_string(), iri(uid));
            }
            obj.insert("leftOperand".to_string(), iri(&c.left_operand));
            obj.insert("operator".to_string(), iri(&c.operator.iri()));
            match &c.right_operand {
                RightOperand::Literal(literal) => {
                    obj.insert("rightOperand".to_string(), literal.raw.clone());
                }
                RightOperand::Reference { iri: reference, .. } => {
                    obj.insert("rightOperandReference".to_string(), iri(reference));
                }
            }
            if let Some(data_type) = &c.data_type {
                obj.insert("dataType".to_string(), iri(&data_type.iri()));
            }
            if let Some(unit) = &c.unit {
                obj.insert("unit".to_string(), iri(unit));
            }
            if let Some(status) = &c.status {
                obj.insert("status".to_string(), status.raw.clone());
            }
        }
        ConstraintNode::Logical(l) => {
            if let Some(uid) = &l.uid {
                obj.insert("uid".to_string(), iri(uid));
            }
            let children = l.children.iter().map(|child| constraint(*child, arena)).collect();
            obj.insert(l.operator.local_name().to_string(), JsonValue::Array(children));
        }
    }

    JsonValue::Object(obj)
}

#[cfg(test)]
mod tests {
    use crate::model::{Constraint, Operator, Policy, PolicyType, Rule, RuleKind};
    use crate::parser::parse;
    use crate::vocab::Iri;

    #[test]
    fn test_written_policy_reparses_equal() {
        let mut policy = Policy::new("http://example.com/policy/1", PolicyType::Set);
        let limit = policy.constraints.push_atomic(Constraint::new(
            Iri::odrl("count"),
            Operator::Lteq,
            10,
        ));
        let mut rule = Rule::new(RuleKind::Permission, Iri::odrl("print"));
        rule.constraint = Some(limit);
        policy.permissions.push(rule);

        let written = policy.to_json_string();
        let reparsed = parse(written.as_bytes()).unwrap();

        assert_eq!(reparsed, policy);
    }

    #[test]
    fn test_written_iris_are_absolute() {
        let mut policy = Policy::new("http://example.com/policy/1", PolicyType::Offer);
        policy.permissions.push(Rule::new(RuleKind::Permission, Iri::odrl("play")));

        let json = policy.to_json();
        assert_eq!(json["type"], "http://www.w3.org/ns/odrl/2/Offer");
        assert_eq!(json["permission"][0]["action"], "http://www.w3.org/ns/odrl/2/play");
        assert_eq!(json["conflict"], "http://www.w3.org/ns/odrl/2/invalid");
    }
}
