//! Diagnostic trace emission.
//!
//! This module holds the process-wide verbose toggle and the sink that
//! receives diagnostic events while it is on. Diagnostics describe what the
//! engine did; they never influence a decision.
//!
//! The default sink forwards events to `tracing`. Embedders can install
//! their own [`DiagnosticSink`] with [`set_sink`].

use lazy_static::lazy_static;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::vocab::Iri;

static VERBOSE: AtomicBool = AtomicBool::new(false);

lazy_static! {
    static ref SINK: RwLock<Arc<dyn DiagnosticSink>> = RwLock::new(Arc::new(TracingSink));
}

/// The kind of a diagnostic event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DiagnosticKind {
    /// A policy was parsed and registered.
    PolicyLoaded,

    /// A policy document was rejected.
    PolicyRejected,

    /// A policy was unloaded.
    PolicyUnloaded,

    /// An inherited policy was not loaded and was skipped.
    InheritanceSkipped,

    /// A constraint was evaluated.
    ConstraintEvaluated,

    /// A rule was evaluated.
    RuleEvaluated,

    /// A decision was reached.
    Decision,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PolicyLoaded => "policy_loaded",
            Self::PolicyRejected => "policy_rejected",
            Self::PolicyUnloaded => "policy_unloaded",
            Self::InheritanceSkipped => "inheritance_skipped",
            Self::ConstraintEvaluated => "constraint_evaluated",
            Self::RuleEvaluated => "rule_evaluated",
            Self::Decision => "decision",
        };
        f.write_str(name)
    }
}

/// A diagnostic event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagnosticEvent {
    /// The kind of event.
    pub kind: DiagnosticKind,

    /// The policy the event concerns, if any.
    pub policy: Option<Iri>,

    /// A human-readable description.
    pub message: String,
}

impl DiagnosticEvent {
    /// Create a new diagnostic event.
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            policy: None,
            message: message.into(),
        }
    }

    /// Attach the policy the event concerns.
    pub fn with_policy(mut self, policy: &Iri) -> Self {
        self.policy = Some(policy.clone());
        self
    }
}

/// Trait for diagnostic sinks.
pub trait DiagnosticSink: Send + Sync {
    /// Receive an event.
    fn emit(&self, event: &DiagnosticEvent);
}

/// A sink that forwards events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn emit(&self, event: &DiagnosticEvent) {
        let policy = event.policy.as_ref().map(Iri::as_str).unwrap_or("-");
        match event.kind {
            DiagnosticKind::ConstraintEvaluated | DiagnosticKind::RuleEvaluated => {
                tracing::trace!(kind = %event.kind, policy, "{}", event.message)
            }
            _ => tracing::debug!(kind = %event.kind, policy, "{}", event.message),
        }
    }
}

/// A sink that keeps events in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<DiagnosticEvent>>,
}

impl MemorySink {
    /// Create a new, empty memory sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a copy of the recorded events.
    pub fn events(&self) -> Vec<DiagnosticEvent> {
        self.events.lock().clone()
    }

    /// Remove all recorded events.
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl DiagnosticSink for MemorySink {
    fn emit(&self, event: &DiagnosticEvent) {
        self.events.lock().push(event.clone());
    }
}

/// Turn diagnostic trace emission on or off for the whole process.
pub fn enable_verbose_logging(enabled: bool) {
    VERBOSE.store(enabled, Ordering::SeqCst);
}

/// Check whether diagnostic trace emission is on.
pub fn is_verbose() -> bool {
    VERBOSE.load(Ordering::SeqCst)
}

/// Replace the diagnostic sink.
///
/// # Arguments
///
/// * `sink` - The new sink.
///
/// # Returns
///
/// The previously installed sink.
pub fn set_sink(sink: Arc<dyn DiagnosticSink>) -> Arc<dyn DiagnosticSink> {
    std::mem::replace(&mut *SINK.write(), sink)
}

/// Restore the default `tracing` sink.
pub fn reset_sink() {
    *SINK.write() = Arc::new(TracingSink);
}

/// Emit an event if verbose logging is on.
///
/// The event is built lazily so disabled diagnostics cost one atomic load.
pub(crate) fn emit<F>(build: F)
where
    F: FnOnce() -> DiagnosticEvent,
{
    if !is_verbose() {
        return;
    }
    let event = build();
    let sink = SINK.read().clone();
    sink.emit(&event);
}
