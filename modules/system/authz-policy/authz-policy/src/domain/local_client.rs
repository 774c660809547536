//! Local (in-process) client for the `AuthZ` policy engine.

use std::sync::Arc;

use async_trait::async_trait;
use authz_policy_sdk::{
    AuthZPolicyClient, AuthZPolicyError, Decision, EvaluationRequest, Policy, SubscriberContext,
};

use super::{DomainError, Service};

/// Local client wrapping the service.
pub struct AuthZPolicyLocalClient {
    svc: Arc<Service>,
}

impl AuthZPolicyLocalClient {
    #[must_use]
    pub fn new(svc: Arc<Service>) -> Self {
        Self { svc }
    }
}

fn log_and_convert(op: &str, e: DomainError) -> AuthZPolicyError {
    tracing::error!(operation = op, error = %e, "authz_policy call failed");
    e.into()
}

#[async_trait]
impl AuthZPolicyClient for AuthZPolicyLocalClient {
    async fn build_aggregated_policy(
        &self,
        ctx: &SubscriberContext,
    ) -> Result<Option<Policy>, AuthZPolicyError> {
        self.svc
            .build_aggregated_policy(ctx)
            .await
            .map_err(|e| log_and_convert("build_aggregated_policy", e))
    }

    async fn evaluate(&self, request: EvaluationRequest) -> Result<Decision, AuthZPolicyError> {
        self.svc
            .evaluate(request)
            .await
            .map_err(|e| log_and_convert("evaluate", e))
    }
}
