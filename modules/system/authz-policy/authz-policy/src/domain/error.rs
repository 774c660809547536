//! Domain errors for the `AuthZ` policy engine.

use authz_policy_sdk::{AuthZPolicyError, HookStage};

/// Internal domain errors.
#[derive(thiserror::Error, Debug)]
pub enum DomainError {
    #[error("policy '{policy_id}' is already registered for entity '{entity}'")]
    DuplicatePolicyId { policy_id: String, entity: String },

    #[error("{stage} hook '{hook}' failed: {reason}")]
    Hook {
        hook: String,
        stage: HookStage,
        reason: String,
    },

    #[error("entity '{entity}' cannot be resolved")]
    UnresolvedEntity { entity: String },

    #[error("evaluation timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },

    #[error("internal error: {0}")]
    Internal(String),
}

impl DomainError {
    pub(crate) fn hook(stage: HookStage, hook: impl Into<String>, error: &anyhow::Error) -> Self {
        Self::Hook {
            hook: hook.into(),
            stage,
            reason: format!("{error:#}"),
        }
    }
}

impl From<AuthZPolicyError> for DomainError {
    fn from(e: AuthZPolicyError) -> Self {
        match e {
            AuthZPolicyError::DuplicatePolicyId { policy_id, entity } => {
                Self::DuplicatePolicyId { policy_id, entity }
            }
            AuthZPolicyError::HookEvaluation {
                hook,
                stage,
                reason,
            } => Self::Hook {
                hook,
                stage,
                reason,
            },
            AuthZPolicyError::UnresolvedEntity { entity } => Self::UnresolvedEntity { entity },
            AuthZPolicyError::Timeout { after_ms } => Self::Timeout { after_ms },
            AuthZPolicyError::Internal(msg) => Self::Internal(msg),
        }
    }
}

impl From<DomainError> for AuthZPolicyError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::DuplicatePolicyId { policy_id, entity } => {
                Self::DuplicatePolicyId { policy_id, entity }
            }
            DomainError::Hook {
                hook,
                stage,
                reason,
            } => Self::HookEvaluation {
                hook,
                stage,
                reason,
            },
            DomainError::UnresolvedEntity { entity } => Self::UnresolvedEntity { entity },
            DomainError::Timeout { after_ms } => Self::Timeout { after_ms },
            DomainError::Internal(msg) => Self::Internal(msg),
        }
    }
}
