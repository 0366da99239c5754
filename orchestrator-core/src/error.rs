use std::fmt;

/// Errors surfaced by the reconciliation loop itself (as opposed to
/// `ProviderError`, which wraps adapter failures). Nothing here is fatal
/// except `InvariantViolation` in a development build (see
/// `handle_invariant_violation`).
#[derive(Debug)]
pub enum OrchestratorError {
    UnknownAuth,
    InvariantViolation(String),
}

impl fmt::Display for OrchestratorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrchestratorError::UnknownAuth => write!(f, "unknown auth token"),
            OrchestratorError::InvariantViolation(msg) => {
                write!(f, "invariant violation: {}", msg)
            }
        }
    }
}

impl std::error::Error for OrchestratorError {}

/// Dev-vs-prod handling of an invariant violation (spec §7): development
/// builds abort via `debug_assert!`, which this call performs; production
/// builds (where `debug_assertions` is compiled out) fall through to the
/// caller's log-and-skip path. Returns `true` if the record should be
/// skipped (always, in a release build; never reached in a debug build
/// because the assertion already panicked).
pub fn handle_invariant_violation(context: &str) -> bool {
    debug_assert!(false, "invariant violation: {context}");
    tracing::error!(context, "invariant violation, skipping offending record");
    true
}
