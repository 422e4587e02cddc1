//! Integration tests for odrl_policy.

use chrono::{DateTime, TimeZone, Utc};
use odrl_policy::model::{ConflictStrategy, PartyKind, RightOperand};
use odrl_policy::*;

const AGREEMENT: &str = include_str!("data/agreement.json");

fn june_2025() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
}

fn set_policy(uid: &str, body: &str) -> String {
    format!(
        r#"{{
            "@context": "http://www.w3.org/ns/odrl.jsonld",
            "type": "Set",
            "uid": "{}",
            {}
        }}"#,
        uid, body
    )
}

#[test]
fn test_agreement_document_parses() {
    let policy = parser::parse(AGREEMENT.as_bytes()).unwrap();

    // Rule counts
    assert_eq!(policy.permissions.len(), 2);
    assert_eq!(policy.prohibitions.len(), 0);
    assert_eq!(policy.obligations.len(), 0);

    // Policy fields
    assert_eq!(policy.uid.as_str(), "http://abc.tds/policy/demo/1");
    assert_eq!(policy.policy_type, PolicyType::Agreement);
    assert_eq!(policy.conflict, ConflictStrategy::Perm);
    assert_eq!(policy.title.as_deref(), Some("Policy 1"));
    assert_eq!(policy.target, Some(Iri::new("http://ab/a")));
    assert_eq!(policy.inherited_uids().len(), 1);
    assert_eq!(policy.profile, vec![Iri::new("http://a.com/abc")]);

    // Parties
    let assignee = policy.assignee.as_ref().unwrap();
    assert_eq!(assignee.kind, PartyKind::Collection);
    assert_eq!(assignee.source, Some(Iri::new("https://aa.com/aaa")));
    assert!(assignee.refinement.is_some());
    assert_eq!(policy.assigner.as_ref().unwrap().kind, PartyKind::Party);

    // Rules
    let first = &policy.permissions[0];
    assert_eq!(first.actions[0].iri, Iri::odrl("use"));
    assert_eq!(
        first.assignee.as_ref().and_then(|p| p.uid.clone()),
        Some(Iri::new("http://abc/liumazi"))
    );

    let second = &policy.permissions[1];
    let sequence = second.constraint.unwrap();
    match policy.constraints.get(sequence) {
        model::ConstraintNode::Logical(logical) => {
            assert_eq!(logical.operator, LogicalOperator::And);
            assert_eq!(logical.children.len(), 2);
            assert_eq!(logical.uid, Some(Iri::new("http://example.com/constraint/1")));

            // The reference is outside the document
            match policy.constraints.get(logical.children[0]) {
                model::ConstraintNode::Atomic(constraint) => assert_eq!(
                    constraint.right_operand,
                    RightOperand::Reference {
                        iri: Iri::new("http://a/a"),
                        target: None
                    }
                ),
                other => panic!("expected an atomic constraint, got {:?}", other),
            }
        }
        other => panic!("expected a logical constraint, got {:?}", other),
    }
}

#[test]
fn test_agreement_evaluation() {
    let engine = PolicyEngine::default();
    let handle = engine.load_policy(AGREEMENT.as_bytes()).unwrap();

    // Without a value for the external reference, nothing holds for sure
    let context = EvaluationContext::at(june_2025());
    let evaluation = engine.evaluate(handle, "use", &context).unwrap();
    assert_eq!(evaluation.decision, Decision::Undetermined);
    assert!(evaluation.reasons.contains(&Reason::UnresolvedReference {
        reference: Iri::new("http://a/a")
    }));
    assert!(evaluation.reasons.contains(&Reason::InheritedPolicyMissing {
        uid: Iri::new("http://a.com/abc")
    }));

    // The reference supplied by the context: the second permission holds
    let context = context.with_operand("http://a/a", "2025-01-01");
    let evaluation = engine.evaluate(handle, "use", &context).unwrap();
    assert_eq!(evaluation.decision, Decision::Permitted);
    assert_eq!(
        evaluation.decided_by,
        Some(RuleRef {
            policy: Iri::new("http://abc.tds/policy/demo/1"),
            kind: RuleKind::Permission,
            index: 1,
        })
    );

    // use covers print
    let evaluation = engine.evaluate(handle, "print", &context).unwrap();
    assert_eq!(evaluation.decision, Decision::Permitted);

    // After the end date
    let late = EvaluationContext::at(Utc.with_ymd_and_hms(2026, 1, 2, 0, 0, 0).unwrap())
        .with_operand("http://a/a", "2025-01-01");
    let evaluation = engine.evaluate(handle, "use", &late).unwrap();
    assert_eq!(evaluation.decision, Decision::Undetermined);
}

#[test]
fn test_duplicate_uid_keeps_first_policy() {
    let engine = PolicyEngine::default();
    let first = engine.load_policy(AGREEMENT.as_bytes()).unwrap();

    // Load the same document again
    let result = engine.load_policy(AGREEMENT.as_bytes());
    match result {
        Err(Error::Engine(EngineError::DuplicateUid { uid })) => {
            assert_eq!(uid.as_str(), "http://abc.tds/policy/demo/1")
        }
        other => panic!("expected DuplicateUid, got {:?}", other),
    }

    // The first one is still loaded and evaluable
    assert_eq!(engine.len(), 1);
    let context = EvaluationContext::at(june_2025()).with_operand("http://a/a", "2025-01-01");
    assert!(engine.evaluate(first, "use", &context).unwrap().is_permitted());
}

#[test]
fn test_unknown_action_is_undetermined() {
    let engine = PolicyEngine::default();
    let handle = engine
        .load_policy(set_policy("http://example.com/p1", r#""permission": [{"action": "play"}]"#).as_bytes())
        .unwrap();

    let evaluation = engine
        .evaluate(handle, "http://example.com/actions/teleport", &EvaluationContext::new())
        .unwrap();
    assert_eq!(evaluation.decision, Decision::Undetermined);
    assert_eq!(evaluation.decided_by, None);
}

#[test]
fn test_evaluation_is_idempotent() {
    let engine = PolicyEngine::default();
    let handle = engine.load_policy(AGREEMENT.as_bytes()).unwrap();
    let context = EvaluationContext::at(june_2025()).with_operand("http://a/a", "2025-01-01");

    let first = engine.evaluate(handle, "use", &context).unwrap();
    let second = engine.evaluate(handle, "use", &context).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_conflict_strategies() {
    let rules = r#""permission": [{"action": "play"}],
                   "prohibition": [{"action": "play"}]"#;
    let engine = PolicyEngine::default();

    // Permissions win
    let perm = set_policy("http://example.com/perm", &format!(r#""conflict": "perm", {}"#, rules));
    let handle = engine.load_policy(perm.as_bytes()).unwrap();
    let evaluation = engine.evaluate(handle, "play", &EvaluationContext::new()).unwrap();
    assert_eq!(evaluation.decision, Decision::Permitted);

    // Prohibitions win
    let prohibit = set_policy("http://example.com/prohibit", &format!(r#""conflict": "prohibit", {}"#, rules));
    let handle = engine.load_policy(prohibit.as_bytes()).unwrap();
    let evaluation = engine.evaluate(handle, "play", &EvaluationContext::new()).unwrap();
    assert_eq!(evaluation.decision, Decision::Prohibited);

    // Invalid by default
    let invalid = set_policy("http://example.com/invalid", rules);
    let handle = engine.load_policy(invalid.as_bytes()).unwrap();
    let error = engine.evaluate(handle, "play", &EvaluationContext::new()).unwrap_err();
    assert!(matches!(error, EngineError::ConflictingRules { .. }));

    // The conflict affects that evaluation only
    assert_eq!(engine.len(), 3);
    let evaluation = engine.evaluate(handle, "print", &EvaluationContext::new()).unwrap();
    assert_eq!(evaluation.decision, Decision::Undetermined);
}

#[test]
fn test_inherited_rules() {
    let engine = PolicyEngine::default();

    // Parent prohibits printing
    let parent = set_policy(
        "http://example.com/parent",
        r#""prohibition": [{"action": "print"}]"#,
    );
    engine.load_policy(parent.as_bytes()).unwrap();

    // Child permits printing and lets prohibitions win
    let child = set_policy(
        "http://example.com/child",
        r#""conflict": "prohibit",
           "inheritFrom": "http://example.com/parent",
           "permission": [{"action": "print"}, {"action": "play"}]"#,
    );
    let handle = engine.load_policy(child.as_bytes()).unwrap();

    let evaluation = engine.evaluate(handle, "print", &EvaluationContext::new()).unwrap();
    assert_eq!(evaluation.decision, Decision::Prohibited);
    assert_eq!(
        evaluation.decided_by.map(|rule| rule.policy),
        Some(Iri::new("http://example.com/parent"))
    );

    let evaluation = engine.evaluate(handle, "play", &EvaluationContext::new()).unwrap();
    assert_eq!(evaluation.decision, Decision::Permitted);
}

#[test]
fn test_cyclic_inheritance() {
    let engine = PolicyEngine::default();

    let a = set_policy(
        "http://example.com/a",
        r#""inheritFrom": "http://example.com/b", "permission": [{"action": "play"}]"#,
    );
    let b = set_policy(
        "http://example.com/b",
        r#""inheritFrom": "http://example.com/a", "permission": [{"action": "play"}]"#,
    );
    let handle = engine.load_policy(a.as_bytes()).unwrap();
    engine.load_policy(b.as_bytes()).unwrap();

    let error = engine.evaluate(handle, "play", &EvaluationContext::new()).unwrap_err();
    assert!(matches!(error, EngineError::CyclicInheritance { .. }));
}

#[test]
fn test_inheritance_depth_limit() {
    let engine = PolicyEngine::new(EngineConfig {
        max_inheritance_depth: 2,
        ..EngineConfig::default()
    });

    // p0 <- p1 <- p2 <- p3
    for i in 0..4 {
        let inherit = if i > 0 {
            format!(r#""inheritFrom": "http://example.com/p{}","#, i - 1)
        } else {
            String::new()
        };
        let doc = set_policy(
            &format!("http://example.com/p{}", i),
            &format!(r#"{} "permission": [{{"action": "play"}}]"#, inherit),
        );
        engine.load_policy(doc.as_bytes()).unwrap();
    }

    let within = engine.handle_for_uid("http://example.com/p2").unwrap();
    assert!(engine.evaluate(within, "play", &EvaluationContext::new()).is_ok());

    let beyond = engine.handle_for_uid("http://example.com/p3").unwrap();
    let error = engine.evaluate(beyond, "play", &EvaluationContext::new()).unwrap_err();
    assert!(matches!(error, EngineError::DepthLimitExceeded { limit: 2, .. }));
}

#[test]
fn test_parse_errors_carry_locations() {
    let engine = PolicyEngine::default();

    // Malformed JSON
    match engine.load_policy(b"{\n  \"uid\": }") {
        Err(Error::Parse(ParseError::MalformedJson { offset, line, .. })) => {
            assert_eq!(line, 2);
            assert!(offset > 0);
        }
        other => panic!("expected MalformedJson, got {:?}", other),
    }

    // Missing uid
    let doc = r#"{"type": "Set", "permission": [{"action": "play"}]}"#;
    match engine.load_policy(doc.as_bytes()) {
        Err(Error::Parse(error)) => {
            assert_eq!(error, ParseError::MissingRequiredField { path: "uid".to_string() })
        }
        other => panic!("expected MissingRequiredField, got {:?}", other),
    }

    // Invalid operator
    let doc = set_policy(
        "http://example.com/p1",
        r#""permission": [{"action": "play", "constraint": [
            {"leftOperand": "count", "operator": "approximately", "rightOperand": 3}
        ]}]"#,
    );
    match engine.load_policy(doc.as_bytes()) {
        Err(Error::Parse(ParseError::InvalidOperator { path, value })) => {
            assert_eq!(path, "permission[0].constraint[0].operator");
            assert_eq!(value, "approximately");
        }
        other => panic!("expected InvalidOperator, got {:?}", other),
    }

    // Unknown policy type
    let doc = r#"{"type": "Contract", "uid": "http://example.com/p2", "permission": [{"action": "play"}]}"#;
    assert!(matches!(
        engine.load_policy(doc.as_bytes()),
        Err(Error::Parse(ParseError::UnknownPolicyType { .. }))
    ));

    assert!(engine.is_empty());
}

#[test]
fn test_unknown_policy_types_when_accepted() {
    let engine = PolicyEngine::new(EngineConfig {
        accept_unknown_policy_types: true,
        ..EngineConfig::default()
    });

    let doc = r#"{"type": "http://example.com/Contract", "uid": "http://example.com/p2", "permission": [{"action": "play"}]}"#;
    let handle = engine.load_policy(doc.as_bytes()).unwrap();
    assert_eq!(
        engine.get(handle).unwrap().policy_type,
        PolicyType::Other(Iri::new("http://example.com/Contract"))
    );
}

#[test]
fn test_concurrent_evaluations() {
    use std::sync::Arc;
    use std::thread;

    let engine = Arc::new(PolicyEngine::default());
    let handle = engine.load_policy(AGREEMENT.as_bytes()).unwrap();

    let threads: Vec<_> = (0..4)
        .map(|_| {
            let engine = engine.clone();
            thread::spawn(move || {
                let context = EvaluationContext::at(june_2025()).with_operand("http://a/a", "2025-01-01");
                engine.evaluate(handle, "use", &context).unwrap().decision
            })
        })
        .collect();

    for thread in threads {
        assert_eq!(thread.join().unwrap(), Decision::Permitted);
    }
}
