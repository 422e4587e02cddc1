//! Constraint evaluation.
//!
//! This module decides whether a constraint tree holds in an
//! [`EvaluationContext`]. Evaluation never fails: values that cannot be
//! compared make the constraint indeterminate and add a [`Reason`].

use std::cmp::Ordering;

use super::context::EvaluationContext;
use crate::config::{AbsentOperand, EngineConfig};
use crate::diagnostics::{self, DiagnosticEvent, DiagnosticKind};
use crate::model::{
    Constraint, ConstraintArena, ConstraintNode, DataType, LogicalConstraint, LogicalOperator,
    NodeId, Operator, Outcome, Reason, RightSource, Satisfaction, TypeMismatch, Value,
};

/// Constraint evaluator.
///
/// An evaluator borrows the constraint arena of one policy and the context
/// of one request.
pub struct ConstraintEvaluator<'a> {
    /// The constraints being evaluated.
    arena: &'a ConstraintArena,

    /// The request facts.
    context: &'a EvaluationContext,

    /// Treatment of absent left operands.
    absent_operand: AbsentOperand,

    /// Maximum nesting depth.
    max_depth: usize,
}

impl<'a> ConstraintEvaluator<'a> {
    /// Create a new evaluator with the default configuration.
    ///
    /// # Arguments
    ///
    /// * `arena` - The constraints of the policy.
    /// * `context` - The request facts.
    ///
    /// # Returns
    ///
    /// A new evaluator.
    pub fn new(arena: &'a ConstraintArena, context: &'a EvaluationContext) -> Self {
        Self::with_config(arena, context, &EngineConfig::default())
    }

    /// Create a new evaluator with a specific configuration.
    pub fn with_config(
        arena: &'a ConstraintArena,
        context: &'a EvaluationContext,
        config: &EngineConfig,
    ) -> Self {
        Self {
            arena,
            context,
            absent_operand: config.absent_operand,
            max_depth: config.max_depth,
        }
    }

    /// Evaluate the constraint tree rooted at `id`.
    ///
    /// # Arguments
    ///
    /// * `id` - The root of the tree.
    ///
    /// # Returns
    ///
    /// The outcome, with the reasons for any indeterminate sub-result.
    pub fn evaluate(&self, id: NodeId) -> Outcome {
        let mut reasons = Vec::new();
        let satisfaction = self.evaluate_node(id, 1, &mut reasons);
        Outcome {
            satisfaction,
            reasons,
        }
    }

    fn evaluate_node(&self, id: NodeId, depth: usize, reasons: &mut Vec<Reason>) -> Satisfaction {
        if depth > self.max_depth {
            reasons.push(Reason::DepthLimitExceeded {
                limit: self.max_depth,
            });
            return Satisfaction::Indeterminate;
        }

        match self.arena.get(id) {
            ConstraintNode::Atomic(constraint) => {
                let result = self.evaluate_atomic(id, constraint, reasons);
                diagnostics::emit(|| {
                    DiagnosticEvent::new(
                        DiagnosticKind::ConstraintEvaluated,
                        format!(
                            "{} {} {}: {}",
                            constraint.left_operand.local_name(),
                            constraint.operator,
                            id,
                            result
                        ),
                    )
                });
                result
            }
            ConstraintNode::Logical(logical) => self.evaluate_logical(logical, depth, reasons),
        }
    }

    fn evaluate_logical(
        &self,
        logical: &LogicalConstraint,
        depth: usize,
        reasons: &mut Vec<Reason>,
    ) -> Satisfaction {
        let children = &logical.children;

        match logical.operator {
            LogicalOperator::And => self.evaluate_all(children, depth, reasons),
            LogicalOperator::AndSequence => {
                let result = self.evaluate_all(children, depth, reasons);
                if result == Satisfaction::Satisfied && !self.in_sequence(children) {
                    reasons.push(Reason::OutOfSequence {
                        constraint: logical.uid.clone(),
                    });
                    return Satisfaction::NotSatisfied;
                }
                result
            }
            LogicalOperator::Or => {
                let mut indeterminate = false;
                for child in children {
                    match self.evaluate_node(*child, depth + 1, reasons) {
                        Satisfaction::Satisfied => return Satisfaction::Satisfied,
                        Satisfaction::Indeterminate => indeterminate = true,
                        Satisfaction::NotSatisfied => {}
                    }
                }
                if indeterminate {
                    Satisfaction::Indeterminate
                } else {
                    Satisfaction::NotSatisfied
                }
            }
            LogicalOperator::Xone => {
                // Exactness needs every child
                let mut satisfied = 0;
                let mut indeterminate = false;
                for child in children {
                    match self.evaluate_node(*child, depth + 1, reasons) {
                        Satisfaction::Satisfied => satisfied += 1,
                        Satisfaction::Indeterminate => indeterminate = true,
                        Satisfaction::NotSatisfied => {}
                    }
                }
                if indeterminate {
                    Satisfaction::Indeterminate
                } else {
                    Satisfaction::from_bool(satisfied == 1)
                }
            }
        }
    }

    /// Conjunction with short-circuit on the first unsatisfied child.
    fn evaluate_all(&self, children: &[NodeId], depth: usize, reasons: &mut Vec<Reason>) -> Satisfaction {
        let mut result = Satisfaction::Satisfied;
        for child in children {
            result = result.and(self.evaluate_node(*child, depth + 1, reasons));
            if result == Satisfaction::NotSatisfied {
                break;
            }
        }
        result
    }

    /// Check that the recorded times of the children never decrease.
    /// Children without a uid or a recorded time are not ordered.
    fn in_sequence(&self, children: &[NodeId]) -> bool {
        let times: Vec<_> = children
            .iter()
            .filter_map(|child| self.arena.get(*child).uid())
            .filter_map(|uid| self.context.event_time(uid))
            .collect();
        times.windows(2).all(|pair| pair[0] <= pair[1])
    }

    fn evaluate_atomic(&self, id: NodeId, constraint: &Constraint, reasons: &mut Vec<Reason>) -> Satisfaction {
        let left = match self.context.lookup(&constraint.left_operand) {
            Some(value) => value,
            None => {
                reasons.push(Reason::AbsentOperand {
                    operand: constraint.left_operand.clone(),
                });
                return match self.absent_operand {
                    AbsentOperand::Indeterminate => Satisfaction::Indeterminate,
                    AbsentOperand::NotSatisfied => Satisfaction::NotSatisfied,
                };
            }
        };

        let right = match self.right_value(id, constraint, reasons) {
            Some(value) => value,
            None => return Satisfaction::Indeterminate,
        };

        let compared = coerce_pair(left, right, constraint.data_type.as_ref())
            .and_then(|(left, right)| apply_operator(constraint.operator, &left, &right));

        match compared {
            Ok(holds) => Satisfaction::from_bool(holds),
            Err(mismatch) => {
                reasons.push(Reason::TypeMismatch {
                    operand: constraint.left_operand.clone(),
                    detail: mismatch.to_string(),
                });
                Satisfaction::Indeterminate
            }
        }
    }

    /// Resolve the right-hand side: the literal, or the values a reference
    /// leads to.
    fn right_value(&self, id: NodeId, constraint: &Constraint, reasons: &mut Vec<Reason>) -> Option<Value> {
        let mut values = Vec::new();

        for source in self.arena.right_sources(id) {
            match source {
                RightSource::Literal(literal) => match literal.value() {
                    Some(value) => values.push(value),
                    None => {
                        reasons.push(Reason::TypeMismatch {
                            operand: constraint.left_operand.clone(),
                            detail: format!("right operand {} is not a literal", literal.raw),
                        });
                        return None;
                    }
                },
                RightSource::External(reference) => match self.context.lookup(reference) {
                    Some(value) => values.push(value),
                    None => {
                        reasons.push(Reason::UnresolvedReference {
                            reference: reference.clone(),
                        });
                        return None;
                    }
                },
            }
        }

        match values.len() {
            0 => {
                reasons.push(Reason::TypeMismatch {
                    operand: constraint.left_operand.clone(),
                    detail: "no right operand".to_string(),
                });
                None
            }
            1 => values.pop(),
            _ => Some(Value::List(
                values
                    .iter()
                    .flat_map(|v| v.members().iter().cloned())
                    .collect(),
            )),
        }
    }
}

/// Bring both sides to a common type.
///
/// A declared datatype applies to both sides. Otherwise the right side is
/// coerced to the type of the left side, unless it is already comparable.
fn coerce_pair(left: Value, right: Value, data_type: Option<&DataType>) -> Result<(Value, Value), TypeMismatch> {
    match data_type {
        Some(DataType::Other(_)) | None => {
            let kind = match left.kind() {
                Some(kind) => kind,
                None => return Ok((left, right)),
            };
            if right.members().iter().all(|r| comparable(r, &kind)) {
                Ok((left, right))
            } else {
                let right = right.coerce(&kind)?;
                Ok((left, right))
            }
        }
        Some(data_type) => Ok((left.coerce(data_type)?, right.coerce(data_type)?)),
    }
}

fn comparable(value: &Value, kind: &DataType) -> bool {
    match (value, kind) {
        (Value::Integer(_) | Value::Decimal(_), DataType::Integer | DataType::Decimal) => true,
        _ => value.kind().as_ref() == Some(kind),
    }
}

/// Apply an operator to two values of a common type.
///
/// Comparison operators need scalars, except `eq` and `neq`, which compare
/// lists as sets. Set operators treat a scalar as a one-element set.
///
/// # Returns
///
/// * `Ok(bool)` - Whether the relation holds.
/// * `Err(TypeMismatch)` - If the values cannot be compared.
pub fn apply_operator(operator: Operator, left: &Value, right: &Value) -> Result<bool, TypeMismatch> {
    let contains = |set: &[Value], value: &Value| set.iter().any(|member| member.matches(value));

    match operator {
        Operator::Eq | Operator::Neq => {
            let equal = match (left, right) {
                (Value::List(_), _) | (_, Value::List(_)) => {
                    let (l, r) = (left.members(), right.members());
                    l.iter().all(|v| contains(r, v)) && r.iter().all(|v| contains(l, v))
                }
                _ => left.compare(right)? == Ordering::Equal,
            };
            Ok(equal == (operator == Operator::Eq))
        }
        Operator::Gt | Operator::Gteq | Operator::Lt | Operator::Lteq => {
            if matches!(left, Value::List(_)) || matches!(right, Value::List(_)) {
                return Err(TypeMismatch {
                    expected: format!("a single value for {}", operator),
                    found: format!("{} {} {}", left, operator, right),
                });
            }
            let ordering = left.compare(right)?;
            Ok(match operator {
                Operator::Gt => ordering == Ordering::Greater,
                Operator::Gteq => ordering != Ordering::Less,
                Operator::Lt => ordering == Ordering::Less,
                _ => ordering != Ordering::Greater,
            })
        }
        Operator::IsA => Ok(left
            .members()
            .iter()
            .any(|l| contains(right.members(), l))),
        Operator::HasPart => match (left, right) {
            (Value::String(l), Value::String(r)) => Ok(l.contains(r.as_str())),
            _ => Ok(right.members().iter().all(|r| contains(left.members(), r))),
        },
        Operator::IsPartOf => match (left, right) {
            (Value::String(l), Value::String(r)) => Ok(r.contains(l.as_str())),
            _ => Ok(left.members().iter().all(|l| contains(right.members(), l))),
        },
        Operator::IsAllOf => Ok(right.members().iter().all(|r| contains(left.members(), r))),
        Operator::IsAnyOf => Ok(left.members().iter().any(|l| contains(right.members(), l))),
        Operator::IsNoneOf => Ok(!left.members().iter().any(|l| contains(right.members(), l))),
    }
}
