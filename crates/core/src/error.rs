//! Unified error type for the ENCR engine.
//!
//! `EncrError` covers every error named at the external boundary (§6 of
//! spec.md) plus the invariant-violation category from §7. It follows the
//! same shape as the teacher's `StrataError`: one flat enum, a constructor
//! function per variant, and classification helper methods so callers can
//! branch on error *category* without matching every variant by hand.
//!
//! ## Error categories (§7 of spec.md)
//!
//! - *Structural*: [`EncrError::Unknown`], [`EncrError::AlreadyRegistered`],
//!   [`EncrError::CyclicGraph`], [`EncrError::BadPath`],
//!   [`EncrError::NotFound`], [`EncrError::SignatureError`]. Raised
//!   synchronously at registration, resolution, or composition; never
//!   produce a ledger entry beyond a rejection.
//! - *Execution*: [`EncrError::ExecutionFailed`], always recorded in the
//!   ledger before being re-raised to the caller.
//! - *Invariant violation*: [`EncrError::InvariantViolation`], fatal,
//!   aborts the call without partial writes.

use crate::ids::{ContentId, ExecutionId, LineageId};
use thiserror::Error;

/// Result type alias used throughout the engine.
pub type EncrResult<T> = std::result::Result<T, EncrError>;

/// The unified error type for the ENCR engine.
#[derive(Debug, Error)]
pub enum EncrError {
    /// A referenced entity, function, or configuration class is not known
    /// to the store or registry.
    #[error("unknown reference: {what}")]
    Unknown {
        /// Human-readable description of what was looked up.
        what: String,
    },

    /// Registration used a name that is already bound.
    #[error("already registered: {name}")]
    AlreadyRegistered {
        /// The colliding name.
        name: String,
    },

    /// The tree builder detected a cycle while walking an entity graph.
    #[error("cyclic entity graph detected at content id {at}")]
    CyclicGraph {
        /// The content id at which the cycle was detected, if the entity
        /// walked far enough to have one.
        at: Option<ContentId>,
    },

    /// An address string was malformed or a step did not match the target's
    /// shape (e.g. an integer step against a mapping).
    #[error("bad address path: {reason}")]
    BadPath {
        /// Explanation of what made the path invalid.
        reason: String,
    },

    /// An address resolved syntactically but the target does not exist.
    #[error("not found: {what}")]
    NotFound {
        /// Human-readable description of what was missing.
        what: String,
    },

    /// Registration was rejected because the function's return annotation
    /// was missing (§4.4: "registration rejects a function whose return
    /// annotation is missing").
    #[error("signature error for `{function_name}`: {reason}")]
    SignatureError {
        /// Name of the function being registered.
        function_name: String,
        /// Explanation of the signature defect.
        reason: String,
    },

    /// The user function raised during invocation. Always recorded in the
    /// ledger with `succeeded=false` before being surfaced here.
    #[error("execution failed for `{function_name}` (execution {execution_id}): {message}")]
    ExecutionFailed {
        /// Name of the function that was invoked.
        function_name: String,
        /// The execution record this failure was recorded against.
        execution_id: ExecutionId,
        /// The committed input snapshot's root content id.
        input_root_id: ContentId,
        /// The user function's error message.
        message: String,
    },

    /// A breach of invariants I1–I5 was detected at commit time. Fatal;
    /// the call's staging area is discarded rather than partially merged.
    #[error("invariant violation: {reason}")]
    InvariantViolation {
        /// Which invariant was breached and how.
        reason: String,
    },

    /// A configured size or depth limit was exceeded.
    #[error("limit exceeded: {0}")]
    LimitExceeded(#[from] crate::limits::LimitError),
}

impl EncrError {
    /// Construct an [`EncrError::Unknown`].
    pub fn unknown(what: impl Into<String>) -> Self {
        EncrError::Unknown { what: what.into() }
    }

    /// Construct an [`EncrError::AlreadyRegistered`].
    pub fn already_registered(name: impl Into<String>) -> Self {
        EncrError::AlreadyRegistered { name: name.into() }
    }

    /// Construct an [`EncrError::CyclicGraph`] with no known content id yet.
    pub fn cyclic_graph() -> Self {
        EncrError::CyclicGraph { at: None }
    }

    /// Construct an [`EncrError::CyclicGraph`] pinpointing where the cycle
    /// closed.
    pub fn cyclic_graph_at(at: ContentId) -> Self {
        EncrError::CyclicGraph { at: Some(at) }
    }

    /// Construct an [`EncrError::BadPath`].
    pub fn bad_path(reason: impl Into<String>) -> Self {
        EncrError::BadPath { reason: reason.into() }
    }

    /// Construct an [`EncrError::NotFound`].
    pub fn not_found(what: impl Into<String>) -> Self {
        EncrError::NotFound { what: what.into() }
    }

    /// Construct an [`EncrError::SignatureError`].
    pub fn signature_error(function_name: impl Into<String>, reason: impl Into<String>) -> Self {
        EncrError::SignatureError {
            function_name: function_name.into(),
            reason: reason.into(),
        }
    }

    /// Construct an [`EncrError::ExecutionFailed`].
    pub fn execution_failed(
        function_name: impl Into<String>,
        execution_id: ExecutionId,
        input_root_id: ContentId,
        message: impl Into<String>,
    ) -> Self {
        EncrError::ExecutionFailed {
            function_name: function_name.into(),
            execution_id,
            input_root_id,
            message: message.into(),
        }
    }

    /// Construct an [`EncrError::InvariantViolation`].
    pub fn invariant_violation(reason: impl Into<String>) -> Self {
        EncrError::InvariantViolation { reason: reason.into() }
    }

    /// `true` for the structural error category (§7): raised before any
    /// execution attempt, never produces more than a rejection record.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            EncrError::Unknown { .. }
                | EncrError::AlreadyRegistered { .. }
                | EncrError::CyclicGraph { .. }
                | EncrError::BadPath { .. }
                | EncrError::NotFound { .. }
                | EncrError::SignatureError { .. }
                | EncrError::LimitExceeded(_)
        )
    }

    /// `true` for the execution error category (§7): a ledger entry was
    /// already committed before this error was constructed.
    pub fn is_execution(&self) -> bool {
        matches!(self, EncrError::ExecutionFailed { .. })
    }

    /// `true` for the invariant-violation category (§7): fatal, no partial
    /// writes were made.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, EncrError::InvariantViolation { .. })
    }

    /// The lineage id this error concerns, when applicable. Mostly useful
    /// for `NotFound`/`Unknown` errors that were constructed with lineage
    /// context embedded in their `what` string; present as a hook for
    /// embedders doing structured error reporting rather than string
    /// matching.
    pub fn execution_id(&self) -> Option<ExecutionId> {
        match self {
            EncrError::ExecutionFailed { execution_id, .. } => Some(*execution_id),
            _ => None,
        }
    }
}

/// Marker used by callers that want to key error reporting off a lineage
/// rather than a content id; re-exported here since both id kinds are
/// common in error context construction call sites.
pub type LineageContext = LineageId;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structural_classification() {
        assert!(EncrError::unknown("x").is_structural());
        assert!(EncrError::already_registered("f").is_structural());
        assert!(EncrError::cyclic_graph().is_structural());
        assert!(EncrError::bad_path("bad").is_structural());
        assert!(EncrError::not_found("x").is_structural());
        assert!(EncrError::signature_error("f", "missing return").is_structural());
    }

    #[test]
    fn execution_classification() {
        let err = EncrError::execution_failed(
            "divide",
            ExecutionId::from_raw(1),
            ContentId::from_raw(2),
            "division by zero",
        );
        assert!(err.is_execution());
        assert!(!err.is_structural());
        assert_eq!(err.execution_id(), Some(ExecutionId::from_raw(1)));
    }

    #[test]
    fn invariant_violation_classification() {
        let err = EncrError::invariant_violation("lineage drifted across mutation");
        assert!(err.is_invariant_violation());
        assert!(!err.is_structural());
        assert!(!err.is_execution());
    }

    #[test]
    fn display_messages_are_informative() {
        let err = EncrError::already_registered("concat");
        assert!(err.to_string().contains("concat"));
    }
}
