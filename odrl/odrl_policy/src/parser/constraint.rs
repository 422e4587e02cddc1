//! Constraint reading and reference resolution.

use serde_json::Value as JsonValue;

use super::document::{field, index, join, read_str, type_field, uid_field, DocumentReader, Object};
use crate::error::ParseError;
use crate::model::{
    Constraint, ConstraintNode, DataType, Literal, LogicalConstraint, LogicalOperator, NodeId,
    Operator, RightOperand,
};
use crate::vocab::Iri;

/// DFS state of a node during cycle detection.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    Visiting,
    Done,
}

impl<'a> DocumentReader<'a> {
    /// Read a `constraint` or `refinement` value.
    ///
    /// A single object is one constraint. An array of one is that
    /// constraint; an array of several becomes an implicit `and`.
    pub(super) fn read_constraint_list(
        &mut self,
        value: &JsonValue,
        path: &str,
        depth: usize,
    ) -> Result<NodeId, ParseError> {
        match value {
            JsonValue::Array(items) => match items.len() {
                0 => Err(ParseError::InvalidField {
                    path: path.to_string(),
                    reason: "expected at least one constraint".to_string(),
                }),
                1 => self.read_constraint(&items[0], &index(path, 0), depth),
                _ => {
                    self.check_depth(path, depth)?;
                    let children = items
                        .iter()
                        .enumerate()
                        .map(|(i, item)| self.read_constraint(item, &index(path, i), depth + 1))
                        .collect::<Result<Vec<_>, _>>()?;
                    Ok(self.arena.push(ConstraintNode::Logical(LogicalConstraint {
                        uid: None,
                        operator: LogicalOperator::And,
                        children,
                        implicit: true,
                    })))
                }
            },
            _ => self.read_constraint(value, path, depth),
        }
    }

    fn read_constraint(&mut self, value: &JsonValue, path: &str, depth: usize) -> Result<NodeId, ParseError> {
        self.check_depth(path, depth)?;

        let obj = value.as_object().ok_or_else(|| ParseError::InvalidField {
            path: path.to_string(),
            reason: "expected a constraint object".to_string(),
        })?;

        // ODRL-native form: {"and": [..]}
        for operator in LogicalOperator::ALL {
            if let Some(children) = field(obj, operator.local_name()) {
                let children_path = join(path, operator.local_name());
                return self.read_logical(obj, operator, children, path, &children_path, depth);
            }
        }

        // Operator form: {"operator": "and", "constraint": [..]}
        if let (Some(children), Some(operator)) = (field(obj, "constraint"), field(obj, "operator")) {
            let operator_path = join(path, "operator");
            let name = read_str(operator, &operator_path)?;
            let operator = self
                .lookup_term(name, LogicalOperator::from_local_name)
                .ok_or_else(|| ParseError::InvalidOperator {
                    path: operator_path,
                    value: name.to_string(),
                })?;
            let children_path = join(path, "constraint");
            return self.read_logical(obj, operator, children, path, &children_path, depth);
        }

        if let Some(kind) = type_field(obj).and_then(JsonValue::as_str) {
            if kind.ends_with("LogicalConstraint") {
                let missing = if field(obj, "constraint").is_some() {
                    "operator"
                } else {
                    "constraint"
                };
                return Err(ParseError::MissingRequiredField {
                    path: join(path, missing),
                });
            }
        }

        self.read_atomic(obj, path)
    }

    fn read_logical(
        &mut self,
        obj: &Object,
        operator: LogicalOperator,
        children: &JsonValue,
        path: &str,
        children_path: &str,
        depth: usize,
    ) -> Result<NodeId, ParseError> {
        let items = match children {
            JsonValue::Array(items) if !items.is_empty() => items,
            _ => {
                return Err(ParseError::InvalidField {
                    path: children_path.to_string(),
                    reason: "expected a non-empty array of constraints".to_string(),
                })
            }
        };

        let uid = self.read_uid(obj, path)?;
        let children = items
            .iter()
            .enumerate()
            .map(|(i, item)| self.read_constraint(item, &index(children_path, i), depth + 1))
            .collect::<Result<Vec<_>, _>>()?;

        let id = self.arena.push(ConstraintNode::Logical(LogicalConstraint {
            uid: uid.clone(),
            operator,
            children,
            implicit: false,
        }));
        self.register_uid(uid, id, path)?;
        Ok(id)
    }

    fn read_atomic(&mut self, obj: &Object, path: &str) -> Result<NodeId, ParseError> {
        let left_operand = match field(obj, "leftOperand") {
            Some(value) => self.read_iri(value, &join(path, "leftOperand"))?,
            None => {
                return Err(ParseError::MissingRequiredField {
                    path: join(path, "leftOperand"),
                })
            }
        };

        let operator_path = join(path, "operator");
        let operator = match field(obj, "operator") {
            Some(value) => {
                let name = read_str(value, &operator_path)?;
                self.lookup_term(name, Operator::from_local_name)
                    .ok_or_else(|| ParseError::InvalidOperator {
                        path: operator_path,
                        value: name.to_string(),
                    })?
            }
            None => return Err(ParseError::MissingRequiredField { path: operator_path }),
        };

        let mut reference_path = None;
        let right_operand = match (field(obj, "rightOperand"), field(obj, "rightOperandReference")) {
            (Some(_), Some(_)) => {
                return Err(ParseError::InvalidField {
                    path: path.to_string(),
                    reason: "rightOperand and rightOperandReference are mutually exclusive"
                        .to_string(),
                })
            }
            (Some(value), None) => RightOperand::Literal(Literal::new(value.clone())),
            (None, Some(value)) => {
                let ref_path = join(path, "rightOperandReference");
                let iri = self.read_iri(value, &ref_path)?;
                reference_path = Some(ref_path);
                RightOperand::Reference { iri, target: None }
            }
            (None, None) => {
                return Err(ParseError::MissingRequiredField {
                    path: join(path, "rightOperand"),
                })
            }
        };

        let data_type = match field(obj, "dataType") {
            Some(value) => Some(DataType::parse(
                read_str(value, &join(path, "dataType"))?,
                &self.dictionary,
            )),
            None => None,
        };
        let unit = match field(obj, "unit") {
            Some(value) => Some(self.read_iri(value, &join(path, "unit"))?),
            None => None,
        };
        let status = field(obj, "status").map(|value| Literal::new(value.clone()));
        let uid = self.read_uid(obj, path)?;

        let id = self.arena.push(ConstraintNode::Atomic(Constraint {
            uid: uid.clone(),
            left_operand,
            operator,
            right_operand,
            data_type,
            unit,
            status,
        }));
        self.register_uid(uid, id, path)?;
        if let Some(reference_path) = reference_path {
            self.references.push((id, reference_path));
        }
        Ok(id)
    }

    fn read_uid(&self, obj: &Object, path: &str) -> Result<Option<Iri>, ParseError> {
        match uid_field(obj) {
            Some(value) => Ok(Some(self.read_iri(value, &join(path, "uid"))?)),
            None => Ok(None),
        }
    }

    fn register_uid(&mut self, uid: Option<Iri>, id: NodeId, path: &str) -> Result<(), ParseError> {
        if let Some(uid) = uid {
            if self.uids.contains_key(&uid) {
                return Err(ParseError::InvalidField {
                    path: join(path, "uid"),
                    reason: format!("duplicate constraint uid '{}'", uid),
                });
            }
            self.uids.insert(uid, id);
        }
        Ok(())
    }

    fn check_depth(&self, path: &str, depth: usize) -> Result<(), ParseError> {
        if depth > self.options.max_depth {
            return Err(ParseError::DepthLimitExceeded {
                path: path.to_string(),
                limit: self.options.max_depth,
            });
        }
        Ok(())
    }

    /// Resolve every `rightOperandReference` and reject reference cycles.
    ///
    /// A reference naming a constraint uid of this document is linked to
    /// that constraint. Any other absolute IRI is left for the evaluation
    /// context, unless references must be internal.
    pub(super) fn resolve_references(&mut self) -> Result<(), ParseError> {
        let references = std::mem::take(&mut self.references);

        for (id, path) in &references {
            let ConstraintNode::Atomic(constraint) = self.arena.get_mut(*id) else {
                continue;
            };
            let RightOperand::Reference { iri, target } = &mut constraint.right_operand else {
                continue;
            };

            match self.uids.get(iri) {
                Some(node) => *target = Some(*node),
                None if self.options.strict_references || !Iri::is_absolute(iri.as_str()) => {
                    return Err(ParseError::UnresolvedReference {
                        path: path.clone(),
                        reference: iri.to_string(),
                    })
                }
                None => {}
            }
        }

        self.check_cycles(&references)?;
        self.references = references;
        Ok(())
    }

    /// Walk reference and containment edges from every reference, failing
    /// when a node already on the current path is reached again.
    fn check_cycles(&self, references: &[(NodeId, String)]) -> Result<(), ParseError> {
        let mut marks = vec![Mark::Unvisited; self.arena.len()];

        for (start, _) in references {
            if marks[start.index()] != Mark::Unvisited {
                continue;
            }

            // Stack of (node, position of the next edge to follow)
            let mut stack: Vec<(NodeId, usize)> = vec![(*start, 0)];
            marks[start.index()] = Mark::Visiting;

            while let Some((node, next)) = stack.last().copied() {
                let edges = self.edges(node);
                if next >= edges.len() {
                    marks[node.index()] = Mark::Done;
                    stack.pop();
                    continue;
                }
                if let Some(top) = stack.last_mut() {
                    top.1 += 1;
                }

                let successor = edges[next];
                match marks[successor.index()] {
                    Mark::Done => {}
                    Mark::Unvisited => {
                        marks[successor.index()] = Mark::Visiting;
                        stack.push((successor, 0));
                    }
                    Mark::Visiting => {
                        return Err(self.cycle_error(&stack, successor, references));
                    }
                }
            }
        }

        Ok(())
    }

    fn edges(&self, node: NodeId) -> Vec<NodeId> {
        match self.arena.get(node) {
            ConstraintNode::Atomic(Constraint {
                right_operand:
                    RightOperand::Reference {
                        target: Some(target),
                        ..
                    },
                ..
            }) => vec![*target],
            ConstraintNode::Atomic(_) => Vec::new(),
            ConstraintNode::Logical(logical) => logical.children.clone(),
        }
    }

    /// Report the innermost reference on the cycle that returns to `entry`.
    fn cycle_error(
        &self,
        stack: &[(NodeId, usize)],
        entry: NodeId,
        references: &[(NodeId, String)],
    ) -> ParseError {
        let closing = stack
            .iter()
            .rev()
            .take_while(|(node, _)| *node != entry)
            .chain(stack.iter().filter(|(node, _)| *node == entry))
            .find_map(|(node, _)| references.iter().find(|(id, _)| id == node));

        match closing {
            Some((id, path)) => {
                let reference = match self.arena.get(*id) {
                    ConstraintNode::Atomic(Constraint {
                        right_operand: RightOperand::Reference { iri, .. },
                        ..
                    }) => iri.to_string(),
                    _ => String::new(),
                };
                ParseError::CyclicReference {
                    path: path.clone(),
                    reference,
                }
            }
            None => ParseError::CyclicReference {
                path: String::new(),
                reference: entry.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::error::ParseError;
    use crate::model::{ConstraintNode, LogicalOperator, RightOperand};
    use crate::parser::{parse, ParserOptions, PolicyParser};

    fn set_with_constraint(constraint: &str) -> String {
        format!(
            r#"{{
                "uid": "http://example.com/policy/1",
                "type": "Set",
                "permission": [{{ "action": "use", "constraint": {} }}]
            }}"#,
            constraint
        )
    }

    #[test]
    fn test_both_logical_syntaxes() {
        let operator_form = set_with_constraint(
            r#"{ "operator": "or", "constraint": [
                { "leftOperand": "count", "operator": "lt", "rightOperand": 5 },
                { "leftOperand": "count", "operator": "gt", "rightOperand": 10 }
            ] }"#,
        );
        let native_form = set_with_constraint(
            r#"{ "or": [
                { "leftOperand": "count", "operator": "lt", "rightOperand": 5 },
                { "leftOperand": "count", "operator": "gt", "rightOperand": 10 }
            ] }"#,
        );

        let a = parse(operator_form.as_bytes()).unwrap();
        let b = parse(native_form.as_bytes()).unwrap();
        assert_eq!(a.constraints, b.constraints);

        let root = a.permissions[0].constraint.unwrap();
        assert!(matches!(
            a.constraints.get(root),
            ConstraintNode::Logical(l) if l.operator == LogicalOperator::Or && !l.implicit
        ));
    }

    #[test]
    fn test_constraint_array_is_implicit_and() {
        let doc = set_with_constraint(
            r#"[
                { "leftOperand": "count", "operator": "lt", "rightOperand": 5 },
                { "leftOperand": "count", "operator": "gt", "rightOperand": 1 }
            ]"#,
        );
        let policy = parse(doc.as_bytes()).unwrap();

        let root = policy.permissions[0].constraint.unwrap();
        assert!(matches!(
            policy.constraints.get(root),
            ConstraintNode::Logical(l) if l.operator == LogicalOperator::And && l.implicit && l.children.len() == 2
        ));
    }

    #[test]
    fn test_invalid_operator() {
        let doc = set_with_constraint(
            r#"{ "leftOperand": "count", "operator": "between", "rightOperand": 5 }"#,
        );
        let err = parse(doc.as_bytes()).unwrap_err();
        assert_eq!(
            err,
            ParseError::InvalidOperator {
                path: "permission[0].constraint.operator".to_string(),
                value: "between".to_string(),
            }
        );

        // A comparison operator is not a logical operator
        let doc = set_with_constraint(
            r#"{ "operator": "eq", "constraint": [
                { "leftOperand": "count", "operator": "lt", "rightOperand": 5 }
            ] }"#,
        );
        let err = parse(doc.as_bytes()).unwrap_err();
        assert!(matches!(err, ParseError::InvalidOperator { ref value, .. } if value == "eq"));
    }

    #[test]
    fn test_right_operand_exclusive() {
        let doc = set_with_constraint(
            r#"{ "leftOperand": "count", "operator": "lt", "rightOperand": 5,
                 "rightOperandReference": "http://example.com/limit" }"#,
        );
        assert!(matches!(
            parse(doc.as_bytes()).unwrap_err(),
            ParseError::InvalidField { .. }
        ));

        let doc = set_with_constraint(r#"{ "leftOperand": "count", "operator": "lt" }"#);
        assert_eq!(
            parse(doc.as_bytes()).unwrap_err(),
            ParseError::MissingRequiredField {
                path: "permission[0].constraint.rightOperand".to_string()
            }
        );
    }

    #[test]
    fn test_forward_reference_resolves() {
        // The reference appears before the constraint it names
        let doc = set_with_constraint(
            r#"{ "and": [
                { "leftOperand": "count", "operator": "lt",
                  "rightOperandReference": "http://example.com/c/limit" },
                { "uid": "http://example.com/c/limit",
                  "leftOperand": "count", "operator": "lteq", "rightOperand": 10 }
            ] }"#,
        );
        let policy = parse(doc.as_bytes()).unwrap();

        let limit = policy
            .constraints
            .find_uid(&"http://example.com/c/limit".into())
            .unwrap();
        let referencing = policy
            .constraints
            .iter()
            .find_map(|(_, node)| match node {
                ConstraintNode::Atomic(c) => match &c.right_operand {
                    RightOperand::Reference { target, .. } => Some(*target),
                    _ => None,
                },
                _ => None,
            })
            .unwrap();
        assert_eq!(referencing, Some(limit));
    }

    #[test]
    fn test_external_and_strict_references() {
        let doc = set_with_constraint(
            r#"{ "leftOperand": "dateTime", "operator": "gt", "rightOperandReference": "http://a/a" }"#,
        );

        // Lenient parsing keeps the reference for the evaluation context
        let policy = parse(doc.as_bytes()).unwrap();
        let root = policy.permissions[0].constraint.unwrap();
        assert!(matches!(
            policy.constraints.get(root),
            ConstraintNode::Atomic(c) if matches!(c.right_operand, RightOperand::Reference { target: None, .. })
        ));

        // Strict parsing rejects it
        let strict = PolicyParser::new(ParserOptions {
            strict_references: true,
            ..ParserOptions::default()
        });
        assert_eq!(
            strict.parse(doc.as_bytes()).unwrap_err(),
            ParseError::UnresolvedReference {
                path: "permission[0].constraint.rightOperandReference".to_string(),
                reference: "http://a/a".to_string(),
            }
        );
    }

    #[test]
    fn test_relative_reference_unresolved() {
        let doc = set_with_constraint(
            r#"{ "leftOperand": "count", "operator": "lt", "rightOperandReference": "limit" }"#,
        );
        assert!(matches!(
            parse(doc.as_bytes()).unwrap_err(),
            ParseError::UnresolvedReference { ref reference, .. } if reference == "limit"
        ));
    }

    #[test]
    fn test_self_reference_is_cyclic() {
        let doc = set_with_constraint(
            r#"{ "uid": "http://example.com/c/1", "leftOperand": "count", "operator": "lt",
                 "rightOperandReference": "http://example.com/c/1" }"#,
        );
        assert_eq!(
            parse(doc.as_bytes()).unwrap_err(),
            ParseError::CyclicReference {
                path: "permission[0].constraint.rightOperandReference".to_string(),
                reference: "http://example.com/c/1".to_string(),
            }
        );
    }

    #[test]
    fn test_reference_to_enclosing_logical_is_cyclic() {
        let doc = set_with_constraint(
            r#"{ "uid": "http://example.com/c/outer", "and": [
                { "leftOperand": "count", "operator": "lt",
                  "rightOperandReference": "http://example.com/c/outer" }
            ] }"#,
        );
        assert!(matches!(
            parse(doc.as_bytes()).unwrap_err(),
            ParseError::CyclicReference { ref reference, .. } if reference == "http://example.com/c/outer"
        ));
    }

    #[test]
    fn test_duplicate_constraint_uid() {
        let doc = set_with_constraint(
            r#"[
                { "uid": "http://example.com/c/1", "leftOperand": "count", "operator": "lt", "rightOperand": 1 },
                { "uid": "http://example.com/c/1", "leftOperand": "count", "operator": "gt", "rightOperand": 0 }
            ]"#,
        );
        assert_eq!(
            parse(doc.as_bytes()).unwrap_err(),
            ParseError::InvalidField {
                path: "permission[0].constraint[1].uid".to_string(),
                reason: "duplicate constraint uid 'http://example.com/c/1'".to_string(),
            }
        );
    }

    #[test]
    fn test_depth_limit() {
        let mut constraint =
            r#"{ "leftOperand": "count", "operator": "lt", "rightOperand": 1 }"#.to_string();
        for _ in 0..4 {
            constraint = format!(r#"{{ "and": [{}] }}"#, constraint);
        }
        let doc = set_with_constraint(&constraint);

        // Five levels fit in the default limit
        assert!(parse(doc.as_bytes()).is_ok());

        let shallow = PolicyParser::new(ParserOptions {
            max_depth: 3,
            ..ParserOptions::default()
        });
        assert!(matches!(
            shallow.parse(doc.as_bytes()).unwrap_err(),
            ParseError::DepthLimitExceeded { limit: 3, ref path }
                if path == "permission[0].constraint.and[0].and[0].and[0]"
        ));
    }
}
