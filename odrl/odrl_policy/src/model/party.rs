//! Party model.

use super::constraint::NodeId;
use crate::vocab::Iri;

/// Whether a party is a single identity or a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PartyKind {
    /// A single party.
    #[default]
    Party,

    /// A set of parties matched by criteria.
    Collection,
}

/// A party: an assigner or an assignee.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Party {
    /// The party uid.
    pub uid: Option<Iri>,

    /// Whether this is a single party or a collection.
    pub kind: PartyKind,

    /// Criteria a member of the collection must satisfy.
    pub refinement: Option<NodeId>,

    /// The collection this party was selected from.
    pub source: Option<Iri>,

    /// Collections this party belongs to.
    pub part_of: Vec<Iri>,
}

impl Party {
    /// Create a single party.
    pub fn new(uid: impl Into<Iri>) -> Self {
        Self {
            uid: Some(uid.into()),
            ..Self::default()
        }
    }

    /// Create a party collection.
    pub fn collection(uid: impl Into<Iri>) -> Self {
        Self {
            uid: Some(uid.into()),
            kind: PartyKind::Collection,
            ..Self::default()
        }
    }

    /// Check whether this party is a collection.
    pub fn is_collection(&self) -> bool {
        self.kind == PartyKind::Collection
    }
}
