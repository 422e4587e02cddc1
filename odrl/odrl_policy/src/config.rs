//! Configuration for the policy engine.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;

/// How to treat a constraint whose left operand has no value in the
/// evaluation context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbsentOperand {
    /// The constraint is indeterminate.
    #[default]
    Indeterminate,

    /// The constraint is not satisfied.
    NotSatisfied,
}

/// Configuration for the policy engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum nesting depth of constraints
    pub max_depth: usize,

    /// Maximum length of an `inheritFrom` chain
    pub max_inheritance_depth: usize,

    /// Treatment of absent left operands
    pub absent_operand: AbsentOperand,

    /// Whether policy types outside the ODRL vocabulary are accepted
    pub accept_unknown_policy_types: bool,

    /// Whether references to IRIs outside the document are rejected
    pub strict_references: bool,

    /// Whether verbose diagnostics are enabled at startup
    pub verbose: bool,

    /// Evaluations retained per policy, 0 disables auditing
    pub audit_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_depth: 32,
            max_inheritance_depth: 16,
            absent_operand: AbsentOperand::Indeterminate,
            accept_unknown_policy_types: false,
            strict_references: false,
            verbose: false,
            audit_capacity: 64,
        }
    }
}

impl EngineConfig {
    /// Parse a configuration from a TOML string.
    ///
    /// Missing keys take their default values.
    ///
    /// # Arguments
    ///
    /// * `source` - The TOML source.
    ///
    /// # Returns
    ///
    /// * `Ok(EngineConfig)` - The validated configuration.
    /// * `Err(ConfigError)` - If the source is not valid TOML or a value is
    ///   out of range.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a TOML file.
    ///
    /// # Arguments
    ///
    /// * `path` - The path of the file.
    ///
    /// # Returns
    ///
    /// * `Ok(EngineConfig)` - The validated configuration.
    /// * `Err(ConfigError)` - If the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Check that every value is in range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_depth == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_depth".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.max_inheritance_depth == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_inheritance_depth".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
