//! Policy Enforcement Point (`PEP`) object.
//!
//! [`PolicyEnforcer`] encapsulates the full PEP flow:
//! aggregate policy → evaluate → split ALLOW from DENY.
//!
//! Constructed once during service initialisation with the `AuthZ` client.
//! The entity is supplied per call via a [`ResourceType`] descriptor, so a
//! single enforcer can serve all entities in a service.

use std::sync::Arc;

use authz_security::Subject;
use serde_json::Value;

use crate::api::AuthZPolicyClient;
use crate::decision::Decision;
use crate::error::AuthZPolicyError;
use crate::models::{EvaluationRequest, ResourceType};
use crate::policy::Policy;
use crate::subscriber::SubscriberContext;

use super::IntoResourceValue;

/// Error from the PEP enforcement flow.
///
/// `Denied` maps to a 403-style rejection, `EvaluationFailed` to a
/// 500-style failure.
#[derive(Debug, thiserror::Error)]
pub enum EnforcerError {
    /// The engine decided DENY.
    #[error("access denied: {} on {}", .decision.action(), .decision.resource_type())]
    Denied {
        /// The full decision, for auditing.
        decision: Box<Decision>,
    },

    /// Aggregation or evaluation could not complete.
    #[error("authorization evaluation failed: {0}")]
    EvaluationFailed(#[from] AuthZPolicyError),
}

/// Per-request evaluation parameters beyond subject, entity and action.
///
/// All fields default to "not set"; only set what you need.
///
/// ```ignore
/// let decision = enforcer
///     .authorize_with(
///         subject, &ARTICLE, "update",
///         &AccessRequest::new().route("update_one").resource(article_json),
///     )
///     .await?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct AccessRequest {
    resource: Option<Value>,
    /// Set when the resource could not be converted; the request is refused.
    resource_error: Option<String>,
    route: Option<String>,
}

impl AccessRequest {
    /// Create a new empty access request (all defaults).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The loaded resource, for instance-level rules.
    ///
    /// A resource that fails to convert makes every decision on this
    /// request fail with [`EnforcerError::EvaluationFailed`].
    #[must_use]
    pub fn resource(mut self, resource: impl IntoResourceValue) -> Self {
        match resource.into_resource_value() {
            Ok(value) => {
                self.resource = Some(value);
                self.resource_error = None;
            }
            Err(e) => {
                self.resource = None;
                self.resource_error = Some(e.to_string());
            }
        }
        self
    }

    /// Route kind, forwarded to subscribers.
    #[must_use]
    pub fn route(mut self, route: impl Into<String>) -> Self {
        self.route = Some(route.into());
        self
    }
}

/// Policy Enforcement Point.
///
/// Holds the `AuthZ` client. Cloneable and cheap to pass around (`Arc`
/// inside).
///
/// # Example
///
/// ```ignore
/// use authz_policy_sdk::pep::PolicyEnforcer;
///
/// let enforcer = PolicyEnforcer::new(authz.clone());
///
/// match enforcer.authorize(subject, &ARTICLE, "read").await {
///     Ok(decision) => { /* narrow query with decision.scope() */ }
///     Err(EnforcerError::Denied { .. }) => { /* 403 */ }
///     Err(EnforcerError::EvaluationFailed(_)) => { /* 500 */ }
/// }
/// ```
#[derive(Clone)]
pub struct PolicyEnforcer {
    authz: Arc<dyn AuthZPolicyClient>,
}

impl PolicyEnforcer {
    /// Create a new enforcer.
    pub fn new(authz: Arc<dyn AuthZPolicyClient>) -> Self {
        Self { authz }
    }

    // ── Low-level: build inputs only ─────────────────────────────────

    /// Build the aggregation context handed to subscribers.
    #[must_use]
    pub fn build_context(
        subject: &Arc<Subject>,
        entity: &ResourceType,
        action: &str,
        request: &AccessRequest,
    ) -> SubscriberContext {
        let ctx = SubscriberContext::new(*entity, action).with_subject(Arc::clone(subject));
        match &request.route {
            Some(route) => ctx.with_route(route.clone()),
            None => ctx,
        }
    }

    /// Build the evaluation request for an aggregated policy.
    #[must_use]
    pub fn build_request(
        subject: &Arc<Subject>,
        entity: &ResourceType,
        action: &str,
        policy: Option<Policy>,
        request: &AccessRequest,
    ) -> EvaluationRequest {
        let eval = EvaluationRequest::new(*entity, action, Arc::clone(subject)).with_policy(policy);
        match &request.resource {
            Some(resource) => eval.with_resource(resource.clone()),
            None => eval,
        }
    }

    // ── High-level: full PEP flow ────────────────────────────────────

    /// Aggregate and evaluate, returning the decision whatever its effect.
    ///
    /// # Errors
    ///
    /// - [`AuthZPolicyError::Internal`] if the request's resource could not
    ///   be converted
    /// - the client's error if aggregation or evaluation fails
    pub async fn decide(
        &self,
        subject: impl Into<Arc<Subject>>,
        entity: &ResourceType,
        action: &str,
        request: &AccessRequest,
    ) -> Result<Decision, AuthZPolicyError> {
        if let Some(reason) = &request.resource_error {
            return Err(AuthZPolicyError::Internal(format!(
                "resource of {} could not be converted: {reason}",
                entity.name
            )));
        }
        let subject = subject.into();
        let ctx = Self::build_context(&subject, entity, action, request);
        let policy = self.authz.build_aggregated_policy(&ctx).await?;
        let eval = Self::build_request(&subject, entity, action, policy, request);
        self.authz.evaluate(eval).await
    }

    /// Execute the full PEP flow with default request parameters.
    ///
    /// # Errors
    ///
    /// - [`EnforcerError::Denied`] if the decision is DENY
    /// - [`EnforcerError::EvaluationFailed`] if the engine could not decide
    pub async fn authorize(
        &self,
        subject: impl Into<Arc<Subject>>,
        entity: &ResourceType,
        action: &str,
    ) -> Result<Decision, EnforcerError> {
        self.authorize_with(subject, entity, action, &AccessRequest::default())
            .await
    }

    /// Execute the full PEP flow with per-request parameters.
    ///
    /// # Errors
    ///
    /// - [`EnforcerError::Denied`] if the decision is DENY
    /// - [`EnforcerError::EvaluationFailed`] if the engine could not decide
    pub async fn authorize_with(
        &self,
        subject: impl Into<Arc<Subject>>,
        entity: &ResourceType,
        action: &str,
        request: &AccessRequest,
    ) -> Result<Decision, EnforcerError> {
        let decision = self.decide(subject, entity, action, request).await?;

        if decision.is_denied() {
            return Err(EnforcerError::Denied {
                decision: Box::new(decision),
            });
        }
        Ok(decision)
    }
}

impl std::fmt::Debug for PolicyEnforcer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyEnforcer").finish_non_exhaustive()
    }
}
