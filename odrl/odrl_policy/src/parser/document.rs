//! Policy, party and rule reading.

use serde_json::{Map, Value as JsonValue};
use std::collections::HashMap;

use super::context::read_context;
use super::ParserOptions;
use crate::error::ParseError;
use crate::model::{
    Action, ConflictStrategy, ConstraintArena, NodeId, Party, PartyKind, Policy, PolicyType,
    Rule, RuleKind,
};
use crate::vocab::odrl::{ODRL_NS, RDF_NS};
use crate::vocab::{Iri, TermDictionary};

pub(crate) type Object = Map<String, JsonValue>;

/// Reader state for one document.
pub(crate) struct DocumentReader<'a> {
    pub(super) options: &'a ParserOptions,

    /// The document's term dictionary.
    pub(super) dictionary: TermDictionary,

    /// Constraint nodes read so far.
    pub(super) arena: ConstraintArena,

    /// Constraint uid to node.
    pub(super) uids: HashMap<Iri, NodeId>,

    /// Nodes with a `rightOperandReference`, with the path of the reference.
    pub(super) references: Vec<(NodeId, String)>,
}

impl<'a> DocumentReader<'a> {
    pub(crate) fn new(options: &'a ParserOptions) -> Self {
        Self {
            options,
            dictionary: TermDictionary::builtin().clone(),
            arena: ConstraintArena::new(),
            uids: HashMap::new(),
            references: Vec::new(),
        }
    }

    /// Read a whole policy document.
    pub(crate) fn read(mut self, value: &JsonValue) -> Result<Policy, ParseError> {
        let obj = value.as_object().ok_or_else(|| ParseError::InvalidField {
            path: "$".to_string(),
            reason: "a policy document must be a JSON object".to_string(),
        })?;

        if let Some(context) = obj.get("@context") {
            let entries = read_context(context, "@context")?;
            self.dictionary = self.dictionary.merge(entries);
        }

        let policy_type = self.read_policy_type(obj)?;

        let uid = match uid_field(obj) {
            Some(value) => self.read_iri(value, "uid")?,
            None => {
                return Err(ParseError::MissingRequiredField {
                    path: "uid".to_string(),
                })
            }
        };

        let mut policy = Policy::new(uid, policy_type);

        if let Some(value) = field(obj, "assigner") {
            policy.assigner = Some(self.read_party(value, "assigner")?);
        }
        if let Some(value) = field(obj, "assignee") {
            policy.assignee = Some(self.read_party(value, "assignee")?);
        }
        if let Some(value) = field(obj, "target") {
            policy.target = Some(self.read_asset(value, "target")?);
        }
        if let Some(value) = field(obj, "title") {
            policy.title = Some(read_text(value, "title")?);
        }
        if let Some(value) = field(obj, "conflict") {
            policy.conflict = self.read_conflict(value, "conflict")?;
        }
        if let Some(value) = field(obj, "inheritFrom") {
            policy.inherit_from = self.read_iri_list(value, "inheritFrom")?;
        }
        if let Some(value) = field(obj, "profile") {
            policy.profile = self.read_iri_list(value, "profile")?;
        }

        policy.permissions = self.read_rules(obj, RuleKind::Permission)?;
        policy.prohibitions = self.read_rules(obj, RuleKind::Prohibition)?;
        policy.obligations = self.read_rules(obj, RuleKind::Duty)?;

        validate_structure(&policy)?;

        self.resolve_references()?;
        policy.constraints = self.arena;

        Ok(policy)
    }

    fn read_policy_type(&self, obj: &Object) -> Result<PolicyType, ParseError> {
        // Set is the default policy subclass
        let value = match type_field(obj) {
            Some(value) => value,
            None => return Ok(PolicyType::Set),
        };

        let names: Vec<&str> = match value {
            JsonValue::String(s) => vec![s.as_str()],
            JsonValue::Array(items) => items.iter().filter_map(JsonValue::as_str).collect(),
            _ => Vec::new(),
        };

        for name in &names {
            if let Some(policy_type) = self.lookup_term(name, PolicyType::from_local_name) {
                return Ok(policy_type);
            }
        }

        match names.first() {
            Some(name) if self.options.accept_unknown_policy_types => Ok(PolicyType::Other(
                self.dictionary
                    .expand(name)
                    .unwrap_or_else(|| Iri::new(*name)),
            )),
            Some(name) => Err(ParseError::UnknownPolicyType {
                path: "type".to_string(),
                value: name.to_string(),
            }),
            None => Err(ParseError::InvalidField {
                path: "type".to_string(),
                reason: "expected a type name".to_string(),
            }),
        }
    }

    fn read_conflict(&self, value: &JsonValue, path: &str) -> Result<ConflictStrategy, ParseError> {
        let name = read_str(value, path)?;
        self.lookup_term(name, ConflictStrategy::from_local_name)
            .ok_or_else(|| ParseError::InvalidField {
                path: path.to_string(),
                reason: format!("unknown conflict strategy '{}'", name),
            })
    }

    /// Look up a vocabulary term written as a bare name, compact IRI or
    /// full ODRL IRI.
    pub(super) fn lookup_term<T>(&self, name: &str, lookup: impl Fn(&str) -> Option<T>) -> Option<T> {
        match self.dictionary.expand(name) {
            Some(iri) => match iri.odrl_local_name() {
                Some(local) => lookup(local),
                None if !name.contains(':') => lookup(name),
                None => None,
            },
            None => lookup(name),
        }
    }

    fn read_party(&mut self, value: &JsonValue, path: &str) -> Result<Party, ParseError> {
        let obj = match value {
            JsonValue::String(_) => return Ok(Party::new(self.read_iri(value, path)?)),
            JsonValue::Object(obj) if obj.contains_key("@id") && obj.len() == 1 => {
                return Ok(Party::new(self.read_iri(value, path)?))
            }
            JsonValue::Object(obj) => obj,
            _ => {
                return Err(ParseError::InvalidField {
                    path: path.to_string(),
                    reason: "expected a party IRI or object".to_string(),
                })
            }
        };

        let mut party = Party::default();

        if let Some(kind) = type_field(obj) {
            let name = read_str(kind, &join(path, "type"))?;
            let is_collection = self
                .dictionary
                .expand(name)
                .map(|iri| iri.local_name() == "PartyCollection")
                .unwrap_or(name == "PartyCollection");
            if is_collection {
                party.kind = PartyKind::Collection;
            }
        }
        if let Some(uid) = uid_field(obj) {
            party.uid = Some(self.read_iri(uid, &join(path, "uid"))?);
        }
        if let Some(source) = field(obj, "source") {
            party.source = Some(self.read_iri(source, &join(path, "source"))?);
        }
        if let Some(part_of) = field(obj, "partOf") {
            party.part_of = self.read_iri_list(part_of, &join(path, "partOf"))?;
        }
        if let Some(refinement) = field(obj, "refinement") {
            party.refinement = Some(self.read_constraint_list(refinement, &join(path, "refinement"), 1)?);
        }

        if party.uid.is_none() && party.refinement.is_none() {
            return Err(ParseError::MissingRequiredField {
                path: join(path, "uid"),
            });
        }

        Ok(party)
    }

    fn read_asset(&self, value: &JsonValue, path: &str) -> Result<Iri, ParseError> {
        match value {
            JsonValue::Object(obj) if !obj.contains_key("@id") => match uid_field(obj) {
                Some(uid) => self.read_iri(uid, &join(path, "uid")),
                None => Err(ParseError::MissingRequiredField {
                    path: join(path, "uid"),
                }),
            },
            _ => self.read_iri(value, path),
        }
    }

    fn read_rules(&mut self, obj: &Object, kind: RuleKind) -> Result<Vec<Rule>, ParseError> {
        match field(obj, kind.policy_key()) {
            Some(value) => self.read_rule_list(value, kind.policy_key(), kind, 1),
            None => Ok(Vec::new()),
        }
    }

    fn read_rule_list(
        &mut self,
        value: &JsonValue,
        path: &str,
        kind: RuleKind,
        depth: usize,
    ) -> Result<Vec<Rule>, ParseError> {
        match value {
            JsonValue::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| self.read_rule(item, &index(path, i), kind, depth))
                .collect(),
            JsonValue::Object(_) => Ok(vec![self.read_rule(value, path, kind, depth)?]),
            _ => Err(ParseError::InvalidField {
                path: path.to_string(),
                reason: "expected a rule object or array of rules".to_string(),
            }),
        }
    }

    fn read_rule(
        &mut self,
        value: &JsonValue,
        path: &str,
        kind: RuleKind,
        depth: usize,
    ) -> Result<Rule, ParseError> {
        if depth > self.options.max_depth {
            return Err(ParseError::DepthLimitExceeded {
                path: path.to_string(),
                limit: self.options.max_depth,
            });
        }

        let obj = value.as_object().ok_or_else(|| ParseError::InvalidField {
            path: path.to_string(),
            reason: "expected a rule object".to_string(),
        })?;

        let actions = match field(obj, "action") {
            Some(action) => self.read_actions(action, &join(path, "action"))?,
            None => {
                return Err(ParseError::MissingRequiredField {
                    path: join(path, "action"),
                })
            }
        };

        let mut rule = Rule {
            kind,
            uid: None,
            actions,
            target: None,
            assigner: None,
            assignee: None,
            constraint: None,
            duties: Vec::new(),
        };

        if let Some(uid) = uid_field(obj) {
            rule.uid = Some(self.read_iri(uid, &join(path, "uid"))?);
        }
        if let Some(target) = field(obj, "target") {
            rule.target = Some(self.read_asset(target, &join(path, "target"))?);
        }
        if let Some(assigner) = field(obj, "assigner") {
            rule.assigner = Some(self.read_party(assigner, &join(path, "assigner"))?);
        }
        if let Some(assignee) = field(obj, "assignee") {
            rule.assignee = Some(self.read_party(assignee, &join(path, "assignee"))?);
        }
        if let Some(constraint) = field(obj, "constraint") {
            rule.constraint = Some(self.read_constraint_list(constraint, &join(path, "constraint"), 1)?);
        }

        let duty_key = kind.nested_duty_key();
        if let Some(duties) = field(obj, duty_key) {
            rule.duties = self.read_rule_list(duties, &join(path, duty_key), RuleKind::Duty, depth + 1)?;
        }

        Ok(rule)
    }

    fn read_actions(&mut self, value: &JsonValue, path: &str) -> Result<Vec<Action>, ParseError> {
        match value {
            JsonValue::Array(items) if items.is_empty() => Err(ParseError::InvalidField {
                path: path.to_string(),
                reason: "expected at least one action".to_string(),
            }),
            JsonValue::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| self.read_action(item, &index(path, i)))
                .collect(),
            _ => Ok(vec![self.read_action(value, path)?]),
        }
    }

    fn read_action(&mut self, value: &JsonValue, path: &str) -> Result<Action, ParseError> {
        let obj = match value {
            JsonValue::Object(obj) if !obj.contains_key("@id") => obj,
            _ => return Ok(Action::new(self.read_iri(value, path)?)),
        };

        let name = obj
            .get("value")
            .or_else(|| obj.get("rdf:value"))
            .or_else(|| obj.get(&format!("{}value", RDF_NS)))
            .ok_or_else(|| ParseError::MissingRequiredField {
                path: join(path, "value"),
            })?;

        let mut action = Action::new(self.read_iri(name, &join(path, "value"))?);
        if let Some(refinement) = field(obj, "refinement") {
            action.refinement = Some(self.read_constraint_list(refinement, &join(path, "refinement"), 1)?);
        }
        Ok(action)
    }

    /// Read an IRI written as a string or an `{"@id": ..}` node.
    ///
    /// Terms that cannot be expanded are kept as opaque IRIs.
    pub(super) fn read_iri(&self, value: &JsonValue, path: &str) -> Result<Iri, ParseError> {
        let name = read_str(value, path)?;
        Ok(self
            .dictionary
            .expand(name)
            .unwrap_or_else(|| Iri::new(name)))
    }

    fn read_iri_list(&self, value: &JsonValue, path: &str) -> Result<Vec<Iri>, ParseError> {
        match value {
            JsonValue::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| self.read_iri(item, &index(path, i)))
                .collect(),
            _ => Ok(vec![self.read_iri(value, path)?]),
        }
    }
}

/// Check the structural rules of each policy type.
fn validate_structure(policy: &Policy) -> Result<(), ParseError> {
    if policy.rule_count() == 0 {
        return Err(ParseError::InvalidPolicy {
            path: "$".to_string(),
            reason: "a policy must declare at least one permission, prohibition or obligation"
                .to_string(),
        });
    }

    let all_rules = || {
        policy
            .permissions
            .iter()
            .chain(&policy.prohibitions)
            .chain(&policy.obligations)
    };
    let has_assigner = policy.assigner.is_some() || all_rules().all(|r| r.assigner.is_some());
    let has_assignee = policy.assignee.is_some() || all_rules().all(|r| r.assignee.is_some());
    let has_target = policy.target.is_some() || all_rules().all(|r| r.target.is_some());

    let missing = |field: &str| ParseError::InvalidPolicy {
        path: field.to_string(),
        reason: format!("{} policies require an {}", policy.policy_type, field),
    };

    match policy.policy_type {
        PolicyType::Agreement => {
            if !has_assigner {
                return Err(missing("assigner"));
            }
            if !has_assignee {
                return Err(missing("assignee"));
            }
            if !has_target {
                return Err(missing("target"));
            }
        }
        PolicyType::Offer => {
            if !has_assigner {
                return Err(missing("assigner"));
            }
            if !has_target {
                return Err(missing("target"));
            }
        }
        PolicyType::Request => {
            if !has_assignee {
                return Err(missing("assignee"));
            }
        }
        _ => {}
    }

    Ok(())
}

/// Get a field by ODRL term, compact IRI or full IRI. `null` counts as absent.
pub(super) fn field<'v>(obj: &'v Object, name: &str) -> Option<&'v JsonValue> {
    obj.get(name)
        .or_else(|| obj.get(&format!("odrl:{}", name)))
        .or_else(|| obj.get(&format!("{}{}", ODRL_NS, name)))
        .filter(|v| !v.is_null())
}

/// Get the `uid` or `@id` of a node.
pub(super) fn uid_field(obj: &Object) -> Option<&JsonValue> {
    field(obj, "uid").or_else(|| obj.get("@id").filter(|v| !v.is_null()))
}

/// Get the `type` or `@type` of a node.
pub(super) fn type_field(obj: &Object) -> Option<&JsonValue> {
    obj.get("type")
        .or_else(|| obj.get("@type"))
        .filter(|v| !v.is_null())
}

/// Read a string written plainly or as an `{"@id": ..}` node.
pub(super) fn read_str<'v>(value: &'v JsonValue, path: &str) -> Result<&'v str, ParseError> {
    match value {
        JsonValue::String(s) => Ok(s),
        JsonValue::Object(obj) => match obj.get("@id") {
            Some(JsonValue::String(s)) => Ok(s),
            _ => Err(ParseError::InvalidField {
                path: path.to_string(),
                reason: "expected an IRI".to_string(),
            }),
        },
        _ => Err(ParseError::InvalidField {
            path: path.to_string(),
            reason: "expected a string".to_string(),
        }),
    }
}

/// Read text written plainly or as an `{"@value": ..}` object.
fn read_text(value: &JsonValue, path: &str) -> Result<String, ParseError> {
    match value {
        JsonValue::String(s) => Ok(s.clone()),
        JsonValue::Object(obj) => match obj.get("@value") {
            Some(JsonValue::String(s)) => Ok(s.clone()),
            _ => Err(ParseError::InvalidField {
                path: path.to_string(),
                reason: "expected text".to_string(),
            }),
        },
        _ => Err(ParseError::InvalidField {
            path: path.to_string(),
            reason: "expected text".to_string(),
        }),
    }
}

pub(super) fn join(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", path, key)
    }
}

pub(super) fn index(path: &str, i: usize) -> String {
    format!("{}[{}]", path, i)
}
