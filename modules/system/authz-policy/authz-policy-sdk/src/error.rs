//! Error types for the `authz_policy` module.

use std::fmt;

use thiserror::Error;

/// Which kind of user-supplied callable failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookStage {
    /// A subscriber hook producing rules during aggregation.
    Subscriber,
    /// A rule condition.
    Condition,
    /// A rule scope resolver.
    Scope,
    /// A rule result transform.
    Transform,
}

impl fmt::Display for HookStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Subscriber => "subscriber",
            Self::Condition => "condition",
            Self::Scope => "scope",
            Self::Transform => "transform",
        };
        f.write_str(name)
    }
}

/// Errors that can occur when aggregating or evaluating policies.
///
/// These are failures of the engine itself. Access denial is expressed via
/// `Decision::effect() == Effect::Deny`, never as an error variant, so the
/// caller can tell "forbidden" apart from "could not decide".
#[derive(Debug, Clone, Error)]
pub enum AuthZPolicyError {
    /// A different policy with the same id is already registered for the
    /// entity/action and the registry rejects duplicates.
    #[error("policy '{policy_id}' is already registered for entity '{entity}'")]
    DuplicatePolicyId { policy_id: String, entity: String },

    /// A subscriber hook or rule callable failed. Always fatal for the
    /// current aggregation/evaluation.
    #[error("{stage} hook '{hook}' failed: {reason}")]
    HookEvaluation {
        hook: String,
        stage: HookStage,
        reason: String,
    },

    /// The entity descriptor does not name an entity.
    #[error("entity '{entity}' cannot be resolved")]
    UnresolvedEntity { entity: String },

    /// Evaluation did not finish within the configured deadline.
    #[error("evaluation timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },

    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthZPolicyError {
    /// Wrap a callable failure, keeping the full error chain as the reason.
    pub fn hook(stage: HookStage, hook: impl Into<String>, error: &anyhow::Error) -> Self {
        Self::HookEvaluation {
            hook: hook.into(),
            stage,
            reason: format!("{error:#}"),
        }
    }
}
