//! Policy document parsing.
//!
//! This module turns an ODRL JSON document into a [`Policy`]. Parsing runs
//! in two phases: the document tree is read into a constraint arena, then
//! every `rightOperandReference` is resolved and checked for cycles. A
//! policy returned by the parser has no dangling internal references and
//! no cycles.

mod constraint;
mod context;
mod document;

use serde_json::Value as JsonValue;

use crate::config::EngineConfig;
use crate::error::ParseError;
use crate::model::Policy;

use document::DocumentReader;

/// Options controlling how strictly documents are parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserOptions {
    /// Maximum nesting depth of constraints and nested duties.
    pub max_depth: usize,

    /// Whether policy types outside the ODRL vocabulary are accepted.
    pub accept_unknown_policy_types: bool,

    /// Whether references to IRIs outside the document are rejected.
    pub strict_references: bool,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

impl From<&EngineConfig> for ParserOptions {
    fn from(config: &EngineConfig) -> Self {
        Self {
            max_depth: config.max_depth,
            accept_unknown_policy_types: config.accept_unknown_policy_types,
            strict_references: config.strict_references,
        }
    }
}

/// A policy document parser.
#[derive(Debug, Clone, Default)]
pub struct PolicyParser {
    options: ParserOptions,
}

impl PolicyParser {
    /// Create a new parser.
    ///
    /// # Arguments
    ///
    /// * `options` - The parser options.
    ///
    /// # Returns
    ///
    /// A new parser.
    pub fn new(options: ParserOptions) -> Self {
        Self { options }
    }

    /// Get the parser options.
    pub fn options(&self) -> &ParserOptions {
        &self.options
    }

    /// Parse a raw policy document.
    ///
    /// # Arguments
    ///
    /// * `raw` - The document bytes, UTF-8 encoded JSON.
    ///
    /// # Returns
    ///
    /// * `Ok(Policy)` - The fully resolved policy.
    /// * `Err(ParseError)` - If the document is malformed or invalid.
    pub fn parse(&self, raw: &[u8]) -> Result<Policy, ParseError> {
        let value: JsonValue = serde_json::from_slice(raw).map_err(|e| malformed(raw, &e))?;
        self.parse_value(&value)
    }

    /// Parse a policy document that has already been decoded.
    ///
    /// # Arguments
    ///
    /// * `value` - The decoded document.
    ///
    /// # Returns
    ///
    /// * `Ok(Policy)` - The fully resolved policy.
    /// * `Err(ParseError)` - If the document is invalid.
    pub fn parse_value(&self, value: &JsonValue) -> Result<Policy, ParseError> {
        DocumentReader::new(&self.options).read(value)
    }
}

/// Parse a raw policy document with default options.
///
/// # Examples
///
/// ```
/// let policy = odrl_policy::parser::parse(br#"{
///     "@context": "http://www.w3.org/ns/odrl.jsonld",
///     "type": "Set",
///     "uid": "http://example.com/policy/1",
///     "permission": [{ "target": "http://example.com/asset/1", "action": "play" }]
/// }"#).unwrap();
///
/// assert_eq!(policy.permissions.len(), 1);
/// ```
pub fn parse(raw: &[u8]) -> Result<Policy, ParseError> {
    PolicyParser::default().parse(raw)
}

/// Build a `MalformedJson` error with the byte offset of the failure.
fn malformed(raw: &[u8], error: &serde_json::Error) -> ParseError {
    let line = error.line();
    let column = error.column();

    let offset = if line == 0 {
        raw.len()
    } else {
        let line_start: usize = raw
            .split(|b| *b == b'\n')
            .take(line - 1)
            .map(|l| l.len() + 1)
            .sum();
        (line_start + column.saturating_sub(1)).min(raw.len())
    };

    ParseError::MalformedJson {
        offset,
        line,
        column,
        message: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_offset() {
        // The error is on the second line, after the colon
        let raw = b"{\n  \"uid\": ,\n}";
        let err = parse(raw).unwrap_err();

        match err {
            ParseError::MalformedJson {
                offset,
                line,
                column,
                ..
            } => {
                assert_eq!(line, 2);
                assert_eq!(offset, 2 + column - 1);
                assert_eq!(raw[offset], b',');
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_truncated_document() {
        let raw = b"{\"uid\": \"http://example.com/p\"";
        let err = parse(raw).unwrap_err();
        assert!(matches!(err, ParseError::MalformedJson { offset, .. } if offset <= raw.len()));
    }

    #[test]
    fn test_options_from_config() {
        let config = EngineConfig {
            max_depth: 4,
            strict_references: true,
            ..EngineConfig::default()
        };
        let options = ParserOptions::from(&config);
        assert_eq!(options.max_depth, 4);
        assert!(options.strict_references);
        assert!(!options.accept_unknown_policy_types);
    }
}
