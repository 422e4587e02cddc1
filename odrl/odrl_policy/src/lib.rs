//! # ODRL Policy
//!
//! `odrl_policy` parses ODRL policy documents and evaluates requests
//! against them.
//!
//! Key concepts:
//!
//! 1. **Policy**: A set of permissions, prohibitions and obligations over
//!    assets, issued by an assigner to an assignee.
//!
//! 2. **Constraint**: A condition on a rule, compared against facts supplied
//!    in an [`EvaluationContext`]. Constraints combine with `and`, `or`,
//!    `xone` and `andSequence`.
//!
//! 3. **Term Dictionary**: The mapping from short names in a document's
//!    `@context` to IRIs, layered over the ODRL vocabulary.
//!
//! 4. **Policy Engine**: The world of loaded policies, which answers a
//!    request with a [`Decision`] according to each policy's conflict
//!    strategy.
//!
//! # Examples
//!
//! ```
//! use odrl_policy::{Decision, EvaluationContext, PolicyEngine};
//!
//! let engine = PolicyEngine::default();
//! let handle = engine.load_policy(br#"{
//!     "@context": "http://www.w3.org/ns/odrl.jsonld",
//!     "type": "Set",
//!     "uid": "http://example.com/policy/1",
//!     "permission": [{
//!         "action": "print",
//!         "constraint": [{ "leftOperand": "count", "operator": "lteq", "rightOperand": 10 }]
//!     }]
//! }"#).unwrap();
//!
//! let context = EvaluationContext::new().with_operand("count", 3i64);
//! assert_eq!(engine.evaluate(handle, "print", &context).unwrap().decision, Decision::Permitted);
//!
//! let context = EvaluationContext::new().with_operand("count", 11i64);
//! assert_eq!(engine.evaluate(handle, "print", &context).unwrap().decision, Decision::Undetermined);
//! ```

pub mod config;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod id;
pub mod model;
pub mod parser;
pub mod store;
pub mod vocab;

// Re-export key types and traits for convenience
pub use config::{AbsentOperand, EngineConfig};
pub use diagnostics::enable_verbose_logging;
pub use engine::{ConstraintEvaluator, EvaluationContext, PolicyAudit, PolicyEngine};
pub use error::{ConfigError, EngineError, Error, ParseError, Result};
pub use id::PolicyHandle;
pub use model::{
    Constraint, ConstraintArena, Decision, Evaluation, LogicalOperator, Operator, Outcome, Party,
    Policy, PolicyType, Reason, Rule, RuleKind, RuleRef, Satisfaction, Value,
};
pub use parser::{ParserOptions, PolicyParser};
pub use store::{InMemoryPolicyStore, PolicyStore};
pub use vocab::{Iri, TermDictionary};
