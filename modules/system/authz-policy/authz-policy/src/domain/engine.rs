//! Rule evaluation engine.
//!
//! Precedence: the highest-priority matching rule decides the effect,
//! whatever its kind. DENY does not override ALLOW; a priority-10 ALLOW
//! beats a priority-5 DENY and vice versa. Rules of equal priority keep
//! their registration order.

use std::cmp::Reverse;
use std::sync::Arc;
use std::time::Duration;

use authz_policy_sdk::{Decision, Effect, EvaluationRequest, HookStage, ResourceType, Rule, RuleContext};
use authz_security::{Scope, merge_scopes};
use tracing::debug;

use super::error::DomainError;

/// Rules of `rules` that apply to `action`, in evaluation order: priority
/// descending, ties in original order. Each rule is paired with its position
/// in `rules`.
#[must_use]
pub fn evaluation_order<'a>(rules: &'a [Rule], action: &str) -> Vec<(usize, &'a Rule)> {
    let mut ordered: Vec<_> = rules
        .iter()
        .enumerate()
        .filter(|(_, rule)| rule.applies_to(action))
        .collect();
    // `sort_by_key` is stable.
    ordered.sort_by_key(|(_, rule)| Reverse(rule.priority()));
    ordered
}

/// Evaluates aggregated policies into decisions.
#[derive(Debug, Clone)]
pub struct PolicyEngine {
    default_effect: Effect,
    timeout: Option<Duration>,
}

impl PolicyEngine {
    /// `default_effect` applies when no policy or no rule matches.
    #[must_use]
    pub fn new(default_effect: Effect) -> Self {
        Self {
            default_effect,
            timeout: None,
        }
    }

    /// Fail evaluations that take longer than `timeout`.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn default_effect(&self) -> Effect {
        self.default_effect
    }

    /// Evaluate the request's policy.
    ///
    /// # Errors
    ///
    /// - [`DomainError::Hook`] if a condition or scope resolver fails, or a
    ///   scope references a property the entity does not support
    /// - [`DomainError::UnresolvedEntity`] if the entity descriptor is blank
    /// - [`DomainError::Timeout`] if the configured deadline elapses
    #[tracing::instrument(skip_all, fields(entity = request.entity.name, action = %request.action, effect))]
    pub async fn evaluate(&self, request: EvaluationRequest) -> Result<Decision, DomainError> {
        let decision = match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, self.run(request))
                .await
                .map_err(|_| DomainError::Timeout {
                    after_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                })??,
            None => self.run(request).await?,
        };
        tracing::Span::current().record("effect", tracing::field::display(decision.effect()));
        Ok(decision)
    }

    async fn run(&self, request: EvaluationRequest) -> Result<Decision, DomainError> {
        let EvaluationRequest {
            entity,
            action,
            subject,
            resource,
            policy,
        } = request;

        if !entity.is_resolved() {
            return Err(DomainError::UnresolvedEntity {
                entity: entity.name.to_owned(),
            });
        }

        let Some(policy) = policy else {
            debug!(default_effect = %self.default_effect, "No applicable policy; using default effect");
            return Ok(Decision::new(entity, action, subject, self.default_effect).with_resource(resource));
        };

        if *policy.entity() != entity {
            return Err(DomainError::Internal(format!(
                "policy '{}' was aggregated for entity '{}', not '{}'",
                policy.id(),
                policy.entity().name,
                entity.name
            )));
        }

        let ctx = RuleContext::new(entity, Arc::clone(&subject), resource.clone());

        let mut effect = None;
        let mut applied: Vec<(usize, &Rule)> = Vec::new();
        for (position, rule) in evaluation_order(policy.rules(), &action) {
            let matched = rule
                .matches(ctx.clone())
                .await
                .map_err(|e| DomainError::hook(HookStage::Condition, rule.label(position), &e))?;
            if matched {
                if effect.is_none() {
                    effect = Some(rule.effect());
                }
                applied.push((position, rule));
            }
        }

        let mut scope = None;
        for (position, rule) in &applied {
            let contributed = rule
                .resolve_scope(ctx.clone())
                .await
                .map_err(|e| DomainError::hook(HookStage::Scope, rule.label(*position), &e))?;
            if let Some(contributed) = contributed {
                validate_scope(&entity, &contributed, &rule.label(*position))?;
                scope = merge_scopes(scope, Some(contributed));
            }
        }

        let effect = effect.unwrap_or_else(|| {
            debug!(default_effect = %self.default_effect, "No rule matched; using default effect");
            self.default_effect
        });
        debug!(%effect, policy_id = %policy.id(), applied = applied.len(), "Policy evaluated");

        let applied_rules = applied.into_iter().map(|(position, rule)| (position, rule.clone()));
        Ok(Decision::new(entity, action, subject, effect)
            .with_policy(&policy)
            .with_applied_rules(applied_rules)
            .with_scope(scope)
            .with_resource(resource))
    }
}

fn validate_scope(entity: &ResourceType, scope: &Scope, hook: &str) -> Result<(), DomainError> {
    if let Some(property) = scope.properties().find(|property| !entity.supports(property)) {
        return Err(DomainError::Hook {
            hook: hook.to_owned(),
            stage: HookStage::Scope,
            reason: format!(
                "property '{property}' is not supported by entity '{}'",
                entity.name
            ),
        });
    }
    Ok(())
}
