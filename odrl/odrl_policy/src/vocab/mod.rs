//! Vocabulary and term resolution.
//!
//! This module provides the [`Iri`] type used for every identifier in the
//! policy model, the built-in ODRL vocabulary, and the [`TermDictionary`]
//! that maps short names from a document's `@context` to full IRIs.

mod dictionary;
pub mod odrl;

pub use dictionary::{ContextEntry, TermDictionary};

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// An Internationalized Resource Identifier.
///
/// The engine does not validate IRIs beyond the scheme check in
/// [`Iri::is_absolute`]; opaque profile terms are carried as-is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Iri(String);

impl Iri {
    /// Create a new IRI.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Create an IRI in the ODRL namespace.
    ///
    /// # Arguments
    ///
    /// * `local` - The local name, e.g. `use` or `dateTime`.
    ///
    /// # Returns
    ///
    /// The IRI `http://www.w3.org/ns/odrl/2/<local>`.
    pub fn odrl(local: &str) -> Self {
        Self(format!("{}{}", odrl::ODRL_NS, local))
    }

    /// Get the IRI as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Get the local name of the IRI: the part after the last `/` or `#`.
    pub fn local_name(&self) -> &str {
        match self.0.rfind(['/', '#']) {
            Some(pos) => &self.0[pos + 1..],
            None => &self.0,
        }
    }

    /// Get the local name if this IRI is in the ODRL namespace.
    pub fn odrl_local_name(&self) -> Option<&str> {
        self.0.strip_prefix(odrl::ODRL_NS)
    }

    /// Check whether a string is an absolute IRI, i.e. starts with an
    /// RFC 3986 scheme followed by `:`.
    pub fn is_absolute(value: &str) -> bool {
        match value.find(':') {
            Some(pos) => {
                let scheme = &value.as_bytes()[..pos];
                !scheme.is_empty()
                    && scheme[0].is_ascii_alphabetic()
                    && scheme
                        .iter()
                        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'-' | b'.'))
                    && pos + 1 < value.len()
            }
            None => false,
        }
    }
}

impl fmt::Display for Iri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Iri {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Iri {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Iri {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Iri {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_absolute() {
        assert!(Iri::is_absolute("http://example.com/a"));
        assert!(Iri::is_absolute("urn:uuid:1234"));
        assert!(Iri::is_absolute("odrl:use"));
        assert!(!Iri::is_absolute("use"));
        assert!(!Iri::is_absolute(":use"));
        assert!(!Iri::is_absolute("1abc:def"));
        assert!(!Iri::is_absolute("http:"));
    }

    #[test]
    fn test_local_name() {
        assert_eq!(Iri::odrl("use").local_name(), "use");
        assert_eq!(
            Iri::new("http://www.w3.org/2001/XMLSchema#integer").local_name(),
            "integer"
        );
        assert_eq!(Iri::new("opaque").local_name(), "opaque");
        assert_eq!(Iri::odrl("dateTime").odrl_local_name(), Some("dateTime"));
        assert_eq!(Iri::new("http://example.com/x").odrl_local_name(), None);
    }
}
