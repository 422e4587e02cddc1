//! Error types for the ODRL policy engine.
//!
//! Errors are organized by subsystem. Parsing failures are reported as
//! [`ParseError`], failures of the engine facade as [`EngineError`] and
//! configuration failures as [`ConfigError`]. The root error type, [`Error`],
//! wraps all of them so callers can handle every failure uniformly.
//!
//! Type mismatches discovered while evaluating constraints are not errors:
//! they are reported as [`crate::model::Reason::TypeMismatch`] alongside an
//! indeterminate outcome.

use crate::id::PolicyHandle;
use crate::model::RuleRef;
use crate::vocab::Iri;
use thiserror::Error;

/// Root error type for the policy engine.
#[derive(Debug, Error)]
pub enum Error {
    /// A policy document could not be parsed.
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// The engine rejected an operation.
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// The engine configuration is invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors raised while turning a raw document into a [`crate::model::Policy`].
///
/// Every variant carries a location: a byte offset for malformed JSON, a
/// field path such as `permission[1].constraint.constraint[0]` otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The document is not syntactically valid JSON.
    #[error("Malformed JSON at byte {offset} (line {line}, column {column}): {message}")]
    MalformedJson {
        /// Byte offset of the failure.
        offset: usize,

        /// Line of the failure (1-based).
        line: usize,

        /// Column of the failure (1-based).
        column: usize,

        /// Message reported by the JSON decoder.
        message: String,
    },

    /// A required field is absent.
    #[error("Missing required field '{path}'")]
    MissingRequiredField {
        /// Path of the missing field.
        path: String,
    },

    /// The policy `type` is not a recognized policy class.
    #[error("Unknown policy type '{value}' at '{path}'")]
    UnknownPolicyType {
        /// Path of the type field.
        path: String,

        /// The type as written in the document.
        value: String,
    },

    /// A constraint operator is outside the fixed operator set.
    #[error("Invalid operator '{value}' at '{path}'")]
    InvalidOperator {
        /// Path of the operator field.
        path: String,

        /// The operator as written in the document.
        value: String,
    },

    /// A `rightOperandReference` names nothing that can be resolved.
    #[error("Unresolved reference '{reference}' at '{path}'")]
    UnresolvedReference {
        /// Path of the reference field.
        path: String,

        /// The reference as written in the document.
        reference: String,
    },

    /// A chain of `rightOperandReference` values loops back on itself.
    #[error("Cyclic reference '{reference}' at '{path}'")]
    CyclicReference {
        /// Path of the reference that closes the cycle.
        path: String,

        /// The reference that closes the cycle.
        reference: String,
    },

    /// Constraint nesting exceeds the configured limit.
    #[error("Nesting depth limit of {limit} exceeded at '{path}'")]
    DepthLimitExceeded {
        /// Path of the node that exceeded the limit.
        path: String,

        /// The configured limit.
        limit: usize,
    },

    /// A field has the wrong shape or an inconsistent value.
    #[error("Invalid field '{path}': {reason}")]
    InvalidField {
        /// Path of the field.
        path: String,

        /// Why the field was rejected.
        reason: String,
    },

    /// The policy violates a structural rule of its policy type.
    #[error("Invalid policy at '{path}': {reason}")]
    InvalidPolicy {
        /// Path of the offending element.
        path: String,

        /// The violated rule.
        reason: String,
    },
}

impl ParseError {
    /// Get the location of this error: the field path, or `@<offset>` for
    /// malformed JSON.
    pub fn location(&self) -> String {
        match self {
            Self::MalformedJson { offset, .. } => format!("@{}", offset),
            Self::MissingRequiredField { path }
            | Self::UnknownPolicyType { path, .. }
            | Self::InvalidOperator { path, .. }
            | Self::UnresolvedReference { path, .. }
            | Self::CyclicReference { path, .. }
            | Self::DepthLimitExceeded { path, .. }
            | Self::InvalidField { path, .. }
            | Self::InvalidPolicy { path, .. } => path.clone(),
        }
    }
}

/// Errors raised by the policy engine facade and the policy store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// A policy with the same uid is already loaded.
    #[error("Policy {uid} is already loaded")]
    DuplicateUid {
        /// The duplicated uid.
        uid: Iri,
    },

    /// The handle does not refer to a loaded policy.
    #[error("Unknown policy handle {0}")]
    UnknownHandle(PolicyHandle),

    /// A permission and a prohibition were both satisfied under the
    /// `invalid` conflict strategy.
    #[error("Conflicting rules in policy {policy}: {permission} and {prohibition}")]
    ConflictingRules {
        /// The policy whose strategy was applied.
        policy: Iri,

        /// The first satisfied permission.
        permission: RuleRef,

        /// The first satisfied prohibition.
        prohibition: RuleRef,
    },

    /// The `inheritFrom` chain is deeper than the configured limit.
    #[error("Inheritance depth limit of {limit} exceeded at policy {uid}")]
    DepthLimitExceeded {
        /// The policy at which the limit was exceeded.
        uid: Iri,

        /// The configured limit.
        limit: usize,
    },

    /// The `inheritFrom` chain loops back on itself.
    #[error("Cyclic inheritance through policy {uid}")]
    CyclicInheritance {
        /// The policy that closes the cycle.
        uid: Iri,
    },
}

/// Errors raised while loading an [`crate::config::EngineConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration is not valid TOML for this engine.
    #[error("Failed to parse configuration: {0}")]
    Toml(#[from] toml::de::Error),

    /// A configuration value is out of range.
    #[error("Invalid configuration value for '{key}': {reason}")]
    InvalidValue {
        /// The offending key.
        key: String,

        /// Why the value was rejected.
        reason: String,
    },
}

/// Result type for the policy engine.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_location() {
        let err = ParseError::MalformedJson {
            offset: 42,
            line: 3,
            column: 7,
            message: "expected value".to_string(),
        };
        assert_eq!(err.location(), "@42");

        let err = ParseError::MissingRequiredField {
            path: "permission[0].action".to_string(),
        };
        assert_eq!(err.location(), "permission[0].action");
    }

    #[test]
    fn test_error_conversion() {
        let err: Error = ParseError::MissingRequiredField {
            path: "uid".to_string(),
        }
        .into();
        assert!(matches!(err, Error::Parse(ParseError::MissingRequiredField { .. })));

        let err: Error = EngineError::DuplicateUid {
            uid: Iri::new("http://example.com/policy/1"),
        }
        .into();
        assert!(matches!(err, Error::Engine(EngineError::DuplicateUid { .. })));
        assert!(err.to_string().contains("already loaded"));
    }
}
