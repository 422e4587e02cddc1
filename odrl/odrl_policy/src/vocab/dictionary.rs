//! Term dictionary.
//!
//! This module maps short names used in a policy document to full IRIs. A
//! document's dictionary is the built-in ODRL vocabulary with the document's
//! `@context` entries merged on top.

use lazy_static::lazy_static;
use std::collections::HashMap;

use super::odrl;
use super::Iri;

lazy_static! {
    static ref BUILTIN: TermDictionary = TermDictionary::build_builtin();
}

/// Dublin Core terms commonly used as policy metadata.
const DCT_TERMS: &[&str] = &["title", "creator", "description", "issued", "modified"];

/// A single entry of a JSON-LD `@context`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextEntry {
    /// A term definition. `None` removes the term.
    Term {
        /// The short name.
        name: String,

        /// The IRI, compact IRI or term the short name maps to.
        iri: Option<String>,
    },

    /// A `@vocab` declaration. `None` clears the default vocabulary.
    Vocab(Option<String>),

    /// A remote context referenced by IRI.
    Remote(Iri),
}

/// A mapping from short names to IRIs.
///
/// Dictionaries are immutable values: [`TermDictionary::merge`] returns a new
/// dictionary and leaves the receiver untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TermDictionary {
    /// Short name to IRI.
    terms: HashMap<String, Iri>,

    /// Default vocabulary for bare terms.
    vocab: Option<String>,

    /// Remote contexts that were referenced but not fetched.
    remote_contexts: Vec<Iri>,
}

impl TermDictionary {
    /// Create an empty dictionary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the built-in ODRL dictionary.
    pub fn builtin() -> &'static TermDictionary {
        &BUILTIN
    }

    fn build_builtin() -> Self {
        let mut terms = HashMap::new();

        for (prefix, namespace) in odrl::PREFIXES {
            terms.insert(prefix.to_string(), Iri::new(*namespace));
        }
        for term in odrl::terms() {
            terms.insert(term.to_string(), Iri::odrl(term));
        }
        for term in DCT_TERMS {
            terms.insert(term.to_string(), Iri::new(format!("{}{}", odrl::DCT_NS, term)));
        }

        Self {
            terms,
            vocab: None,
            remote_contexts: Vec::new(),
        }
    }

    /// Resolve a short name to its IRI.
    ///
    /// Only exact term definitions are consulted; see [`TermDictionary::expand`]
    /// for compact IRI and `@vocab` handling.
    pub fn resolve(&self, short_name: &str) -> Option<&Iri> {
        self.terms.get(short_name)
    }

    /// Expand a value to a full IRI.
    ///
    /// Expansion tries, in order: an exact term, a compact IRI whose prefix
    /// is a defined term, an absolute IRI, and finally the default
    /// vocabulary for values without a colon.
    ///
    /// # Arguments
    ///
    /// * `value` - The value to expand.
    ///
    /// # Returns
    ///
    /// The expanded IRI, or `None` if the value cannot be expanded.
    pub fn expand(&self, value: &str) -> Option<Iri> {
        if value.is_empty() || value.starts_with('@') {
            return None;
        }

        if let Some(iri) = self.terms.get(value) {
            return Some(iri.clone());
        }

        if let Some((prefix, suffix)) = split_compact(value) {
            if let Some(namespace) = self.terms.get(prefix) {
                return Some(Iri::new(format!("{}{}", namespace, suffix)));
            }
        }

        if Iri::is_absolute(value) {
            return Some(Iri::new(value));
        }

        match &self.vocab {
            Some(vocab) if !value.contains(':') => Some(Iri::new(format!("{}{}", vocab, value))),
            _ => None,
        }
    }

    /// Merge context entries into a copy of this dictionary.
    ///
    /// Entries are applied in order, so later entries win on collision.
    /// Term values are expanded against the dictionary as built so far.
    ///
    /// # Arguments
    ///
    /// * `entries` - The entries to merge.
    ///
    /// # Returns
    ///
    /// The merged dictionary.
    pub fn merge<I>(&self, entries: I) -> TermDictionary
    where
        I: IntoIterator<Item = ContextEntry>,
    {
        let mut merged = self.clone();

        for entry in entries {
            match entry {
                ContextEntry::Term { name, iri: None } => {
                    merged.terms.remove(&name);
                }
                ContextEntry::Term {
                    name,
                    iri: Some(value),
                } => {
                    let iri = merged.expand(&value).unwrap_or_else(|| Iri::new(value));
                    merged.terms.insert(name, iri);
                }
                ContextEntry::Vocab(vocab) => {
                    merged.vocab = vocab.map(|v| match merged.expand(&v) {
                        Some(iri) => iri.as_str().to_string(),
                        None => v,
                    });
                }
                ContextEntry::Remote(iri) => {
                    if !odrl::is_odrl_context(iri.as_str()) && !merged.remote_contexts.contains(&iri)
                    {
                        merged.remote_contexts.push(iri);
                    }
                }
            }
        }

        merged
    }

    /// Get the default vocabulary, if any.
    pub fn vocab(&self) -> Option<&str> {
        self.vocab.as_deref()
    }

    /// Get the remote contexts that were referenced but not fetched.
    pub fn remote_contexts(&self) -> &[Iri] {
        &self.remote_contexts
    }

    /// Check whether a short name is defined.
    pub fn contains(&self, short_name: &str) -> bool {
        self.terms.contains_key(short_name)
    }

    /// Get the number of defined terms.
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    /// Check whether the dictionary defines no terms.
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

/// Split a compact IRI into prefix and suffix.
fn split_compact(value: &str) -> Option<(&str, &str)> {
    let (prefix, suffix) = value.split_once(':')?;
    if prefix.is_empty() || prefix.contains('/') || suffix.starts_with("//") {
        return None;
    }
    Some((prefix, suffix))
}
