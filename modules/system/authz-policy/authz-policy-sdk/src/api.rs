//! Public API trait for the `authz_policy` module.

use async_trait::async_trait;

use crate::decision::Decision;
use crate::error::AuthZPolicyError;
use crate::models::EvaluationRequest;
use crate::policy::Policy;
use crate::subscriber::SubscriberContext;

/// Public API of the policy engine, consumed by PEPs (guards, query and
/// response layers).
///
/// ```ignore
/// let policy = authz.build_aggregated_policy(&ctx).await?;
/// let decision = authz
///     .evaluate(EvaluationRequest::new(ARTICLE, "read", subject).with_policy(policy))
///     .await?;
/// ```
#[async_trait]
pub trait AuthZPolicyClient: Send + Sync {
    /// Aggregate every static policy and subscriber contribution for the
    /// context's entity and action.
    ///
    /// Returns `Ok(None)` when nothing applies; the caller's default stance
    /// decides what that means.
    ///
    /// # Errors
    ///
    /// - `HookEvaluation` if a subscriber fails (fail-closed)
    /// - `UnresolvedEntity` if the entity descriptor is blank
    async fn build_aggregated_policy(
        &self,
        ctx: &SubscriberContext,
    ) -> Result<Option<Policy>, AuthZPolicyError>;

    /// Evaluate a policy against a subject and optional resource.
    ///
    /// A DENY is returned as a [`Decision`], never as an error.
    ///
    /// # Errors
    ///
    /// - `HookEvaluation` if a condition or scope resolver fails
    /// - `Timeout` if the configured deadline elapses
    async fn evaluate(&self, request: EvaluationRequest) -> Result<Decision, AuthZPolicyError>;
}
