//! Domain service for the `AuthZ` policy engine.

use std::sync::Arc;

use authz_policy_sdk::{Decision, EvaluationRequest, Policy, SubscriberContext};
use tracing::info;

use super::engine::PolicyEngine;
use super::error::DomainError;
use super::registry::PolicyRegistry;
use crate::config::AuthZPolicyConfig;

/// `AuthZ` policy service: one registry plus one engine.
pub struct Service {
    registry: Arc<PolicyRegistry>,
    engine: PolicyEngine,
}

impl Service {
    #[must_use]
    pub fn new(registry: Arc<PolicyRegistry>, engine: PolicyEngine) -> Self {
        Self { registry, engine }
    }

    /// Build a fresh registry and engine from configuration.
    #[must_use]
    pub fn from_config(cfg: &AuthZPolicyConfig) -> Self {
        info!(
            default_effect = %cfg.default_effect,
            duplicate_policy = ?cfg.duplicate_policy,
            hook_failure = ?cfg.hook_failure,
            evaluation_timeout_ms = ?cfg.evaluation_timeout_ms,
            "Creating authz_policy service"
        );
        let registry = Arc::new(PolicyRegistry::new(cfg.duplicate_policy, cfg.hook_failure));
        let engine = PolicyEngine::new(cfg.default_effect).with_timeout(cfg.evaluation_timeout());
        Self::new(registry, engine)
    }

    /// The registry, for bootstrap-time registration.
    #[must_use]
    pub fn registry(&self) -> &Arc<PolicyRegistry> {
        &self.registry
    }

    #[must_use]
    pub fn engine(&self) -> &PolicyEngine {
        &self.engine
    }

    /// Aggregate the policy for the context's entity and action.
    ///
    /// # Errors
    ///
    /// - Subscriber failures (fail-closed)
    /// - Unresolved entity
    #[tracing::instrument(skip_all, fields(entity = ctx.entity().name, action = %ctx.action()))]
    pub async fn build_aggregated_policy(
        &self,
        ctx: &SubscriberContext,
    ) -> Result<Option<Policy>, DomainError> {
        self.registry.build_aggregated_policy_for(ctx).await
    }

    /// Evaluate a request with the configured engine.
    ///
    /// # Errors
    ///
    /// - Rule callable failures
    /// - Timeout
    #[tracing::instrument(skip_all)]
    pub async fn evaluate(&self, request: EvaluationRequest) -> Result<Decision, DomainError> {
        self.engine.evaluate(request).await
    }
}
