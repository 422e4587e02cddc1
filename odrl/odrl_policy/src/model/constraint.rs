//! Constraint model.
//!
//! This module defines constraints and logical constraints. The constraints
//! of one policy live in a [`ConstraintArena`] and refer to each other by
//! [`NodeId`]: a logical constraint lists its children, and a
//! `rightOperandReference` to another constraint of the same document is
//! resolved to that constraint's id.

use std::collections::HashSet;
use std::fmt;

use super::value::{DataType, Value};
use crate::vocab::Iri;

/// The index of a node in a [`ConstraintArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    /// Get the position of this node in its arena.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A constraint operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// Equal to.
    Eq,
    /// Greater than.
    Gt,
    /// Greater than or equal to.
    Gteq,
    /// Less than.
    Lt,
    /// Less than or equal to.
    Lteq,
    /// Not equal to.
    Neq,
    /// Is an instance of.
    IsA,
    /// Contains the right operand.
    HasPart,
    /// Is contained by the right operand.
    IsPartOf,
    /// Is all of the right operand.
    IsAllOf,
    /// Is any of the right operand.
    IsAnyOf,
    /// Is none of the right operand.
    IsNoneOf,
}

impl Operator {
    /// Every operator, in vocabulary order.
    pub const ALL: [Operator; 12] = [
        Operator::Eq,
        Operator::Gt,
        Operator::Gteq,
        Operator::Lt,
        Operator::Lteq,
        Operator::Neq,
        Operator::IsA,
        Operator::HasPart,
        Operator::IsPartOf,
        Operator::IsAllOf,
        Operator::IsAnyOf,
        Operator::IsNoneOf,
    ];

    /// Look up an operator by local name, ignoring case.
    pub fn from_local_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|op| op.local_name().eq_ignore_ascii_case(name))
    }

    /// Get the local name of this operator.
    pub fn local_name(&self) -> &'static str {
        match self {
            Operator::Eq => "eq",
            Operator::Gt => "gt",
            Operator::Gteq => "gteq",
            Operator::Lt => "lt",
            Operator::Lteq => "lteq",
            Operator::Neq => "neq",
            Operator::IsA => "isA",
            Operator::HasPart => "hasPart",
            Operator::IsPartOf => "isPartOf",
            Operator::IsAllOf => "isAllOf",
            Operator::IsAnyOf => "isAnyOf",
            Operator::IsNoneOf => "isNoneOf",
        }
    }

    /// Get the full IRI of this operator.
    pub fn iri(&self) -> Iri {
        Iri::odrl(self.local_name())
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.local_name())
    }
}

/// A logical constraint operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalOperator {
    /// All children are satisfied.
    And,
    /// At least one child is satisfied.
    Or,
    /// Exactly one child is satisfied.
    Xone,
    /// All children are satisfied, in order.
    AndSequence,
}

impl LogicalOperator {
    /// Every logical operator, in vocabulary order.
    pub const ALL: [LogicalOperator; 4] = [
        LogicalOperator::And,
        LogicalOperator::Or,
        LogicalOperator::Xone,
        LogicalOperator::AndSequence,
    ];

    /// Look up a logical operator by local name, ignoring case.
    pub fn from_local_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|op| op.local_name().eq_ignore_ascii_case(name))
    }

    /// Get the local name of this operator.
    pub fn local_name(&self) -> &'static str {
        match self {
            LogicalOperator::And => "and",
            LogicalOperator::Or => "or",
            LogicalOperator::Xone => "xone",
            LogicalOperator::AndSequence => "andSequence",
        }
    }

    /// Get the full IRI of this operator.
    pub fn iri(&self) -> Iri {
        Iri::odrl(self.local_name())
    }
}

impl fmt::Display for LogicalOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.local_name())
    }
}

/// A literal as written in the document.
///
/// The raw JSON is kept so the policy can be written back unchanged; the
/// typed value is derived on demand.
#[derive(Debug, Clone, PartialEq)]
pub struct Literal {
    /// The literal JSON value.
    pub raw: serde_json::Value,
}

impl Literal {
    /// Create a new literal.
    pub fn new(raw: impl Into<serde_json::Value>) -> Self {
        Self { raw: raw.into() }
    }

    /// Get the untyped value of this literal.
    pub fn value(&self) -> Option<Value> {
        Value::from_json(&self.raw)
    }
}

/// The right-hand side of a constraint.
#[derive(Debug, Clone, PartialEq)]
pub enum RightOperand {
    /// A literal value or list of values.
    Literal(Literal),

    /// A reference to another operand.
    Reference {
        /// The referenced IRI.
        iri: Iri,

        /// The constraint the reference resolves to, when it names a
        /// constraint of the same document. External references are looked
        /// up in the evaluation context.
        target: Option<NodeId>,
    },
}

/// A plain constraint comparing a left operand with a right operand.
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    /// The constraint uid.
    pub uid: Option<Iri>,

    /// The left operand.
    pub left_operand: Iri,

    /// The operator.
    pub operator: Operator,

    /// The right operand.
    pub right_operand: RightOperand,

    /// The datatype of the right operand.
    pub data_type: Option<DataType>,

    /// The unit of the right operand.
    pub unit: Option<Iri>,

    /// The current value of the left operand, as recorded in the document.
    pub status: Option<Literal>,
}

impl Constraint {
    /// Create a new constraint with a literal right operand.
    pub fn new(left_operand: Iri, operator: Operator, right_operand: impl Into<serde_json::Value>) -> Self {
        Self {
            uid: None,
            left_operand,
            operator,
            right_operand: RightOperand::Literal(Literal::new(right_operand)),
            data_type: None,
            unit: None,
            status: None,
        }
    }

    /// Set the datatype.
    pub fn with_data_type(mut self, data_type: DataType) -> Self {
        self.data_type = Some(data_type);
        self
    }
}

/// A logical combination of constraints.
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalConstraint {
    /// The constraint uid.
    pub uid: Option<Iri>,

    /// The operator.
    pub operator: LogicalOperator,

    /// The operand constraints, in document order.
    pub children: Vec<NodeId>,

    /// Whether this node stands for a bare list of constraints rather than
    /// a LogicalConstraint written in the document.
    pub implicit: bool,
}

/// A node of a constraint tree.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstraintNode {
    /// A plain constraint.
    Atomic(Constraint),

    /// A logical constraint.
    Logical(LogicalConstraint),
}

impl ConstraintNode {
    /// Get the uid of this node.
    pub fn uid(&self) -> Option<&Iri> {
        match self {
            ConstraintNode::Atomic(c) => c.uid.as_ref(),
            ConstraintNode::Logical(l) => l.uid.as_ref(),
        }
    }
}

/// A source of right-hand values, after following references.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RightSource<'a> {
    /// A literal of the document.
    Literal(&'a Literal),

    /// An external reference, looked up in the evaluation context.
    External(&'a Iri),
}

/// Storage for the constraint nodes of one policy.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstraintArena {
    nodes: Vec<ConstraintNode>,
}

impl ConstraintArena {
    /// Create a new, empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node.
    ///
    /// # Returns
    ///
    /// The id of the new node.
    pub fn push(&mut self, node: ConstraintNode) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    /// Add a plain constraint.
    pub fn push_atomic(&mut self, constraint: Constraint) -> NodeId {
        self.push(ConstraintNode::Atomic(constraint))
    }

    /// Add a logical constraint over existing nodes.
    pub fn push_logical(&mut self, operator: LogicalOperator, children: Vec<NodeId>) -> NodeId {
        self.push(ConstraintNode::Logical(LogicalConstraint {
            uid: None,
            operator,
            children,
            implicit: false,
        }))
    }

    /// Get a node.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not issued by this arena.
    pub fn get(&self, id: NodeId) -> &ConstraintNode {
        &self.nodes[id.index()]
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> &mut ConstraintNode {
        &mut self.nodes[id.index()]
    }

    /// Iterate over all nodes with their ids.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &ConstraintNode)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (NodeId(i as u32), node))
    }

    /// Find the node with a given uid.
    pub fn find_uid(&self, uid: &Iri) -> Option<NodeId> {
        self.iter()
            .find(|(_, node)| node.uid() == Some(uid))
            .map(|(id, _)| id)
    }

    /// Get the number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check whether the arena is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Get the nesting depth of the tree rooted at `id`. A plain
    /// constraint has depth 1.
    pub fn depth(&self, id: NodeId) -> usize {
        match self.get(id) {
            ConstraintNode::Atomic(_) => 1,
            ConstraintNode::Logical(l) => {
                1 + l.children.iter().map(|c| self.depth(*c)).max().unwrap_or(0)
            }
        }
    }

    /// Collect the right-hand value sources of the node `id`.
    ///
    /// A plain constraint yields its literal, or follows its reference; a
    /// logical constraint yields the sources of its plain descendants.
    /// Nodes already visited are skipped, so a cyclic arena built by hand
    /// terminates.
    pub fn right_sources(&self, id: NodeId) -> Vec<RightSource<'_>> {
        let mut sources = Vec::new();
        let mut visited = HashSet::new();
        let mut stack = vec![id];

        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            match self.get(current) {
                ConstraintNode::Atomic(c) => match &c.right_operand {
                    RightOperand::Literal(literal) => sources.push(RightSource::Literal(literal)),
                    RightOperand::Reference {
                        target: Some(target),
                        ..
                    } => stack.push(*target),
                    RightOperand::Reference { iri, target: None } => {
                        sources.push(RightSource::External(iri))
                    }
                },
                ConstraintNode::Logical(l) => stack.extend(l.children.iter().rev()),
            }
        }

        sources
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_lookup() {
        assert_eq!(Operator::from_local_name("lt"), Some(Operator::Lt));
        assert_eq!(Operator::from_local_name("ISANYOF"), Some(Operator::IsAnyOf));
        assert_eq!(Operator::from_local_name("between"), None);
        assert_eq!(
            LogicalOperator::from_local_name("andSequence"),
            Some(LogicalOperator::AndSequence)
        );
        assert_eq!(Operator::IsA.iri(), Iri::odrl("isA"));
    }

    #[test]
    fn test_arena_depth_and_lookup() {
        let mut arena = ConstraintArena::new();

        // Build and(c1, or(c2))
        let c1 = arena.push_atomic(Constraint::new(Iri::odrl("count"), Operator::Lt, 10));
        let mut c2 = Constraint::new(Iri::odrl("count"), Operator::Gt, 1);
        c2.uid = Some(Iri::new("http://example.com/c2"));
        let c2 = arena.push_atomic(c2);
        let or = arena.push_logical(LogicalOperator::Or, vec![c2]);
        let and = arena.push_logical(LogicalOperator::And, vec![c1, or]);

        assert_eq!(arena.len(), 4);
        assert_eq!(arena.depth(c1), 1);
        assert_eq!(arena.depth(and), 3);
        assert_eq!(arena.find_uid(&Iri::new("http://example.com/c2")), Some(c2));
    }

    #[test]
    fn test_right_sources_follow_references() {
        let mut arena = ConstraintArena::new();

        // c2 references c1; the logical node collects both
        let c1 = arena.push_atomic(Constraint::new(Iri::odrl("count"), Operator::Lt, 10));
        let mut c2 = Constraint::new(Iri::odrl("count"), Operator::Lt, 0);
        c2.right_operand = RightOperand::Reference {
            iri: Iri::new("http://example.com/c1"),
            target: Some(c1),
        };
        let c2 = arena.push_atomic(c2);
        let ext = arena.push_atomic(Constraint {
            right_operand: RightOperand::Reference {
                iri: Iri::new("http://example.com/limit"),
                target: None,
            },
            ..Constraint::new(Iri::odrl("count"), Operator::Lt, 0)
        });

        let sources = arena.right_sources(c2);
        assert_eq!(sources.len(), 1);
        assert!(matches!(sources[0], RightSource::Literal(l) if l.raw == serde_json::json!(10)));

        let sources = arena.right_sources(ext);
        assert!(matches!(sources[0], RightSource::External(iri) if iri.as_str() == "http://example.com/limit"));
    }

    #[test]
    fn test_right_sources_terminate_on_cycles() {
        let mut arena = ConstraintArena::new();
        let c = arena.push_atomic(Constraint::new(Iri::odrl("count"), Operator::Lt, 0));

        // Point the node at itself
        if let ConstraintNode::Atomic(constraint) = arena.get_mut(c) {
            constraint.right_operand = RightOperand::Reference {
                iri: Iri::new("http://example.com/self"),
                target: Some(c),
            };
        }

        assert!(arena.right_sources(c).is_empty());
    }
}
