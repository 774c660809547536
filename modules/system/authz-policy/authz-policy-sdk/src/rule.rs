//! Rules: priority-ordered condition → effect units.
//!
//! A [`Rule`] optionally carries three callables, each of which may be
//! synchronous or asynchronous and may fail:
//!
//! - a **condition** deciding whether the rule matches,
//! - a **scope resolver** narrowing downstream queries,
//! - a **result transform** reshaping the response payload.
//!
//! Callables receive a [`RuleContext`] by value and return boxed futures so
//! that sync and async variants share one representation.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use authz_security::{Scope, Subject};
use futures::FutureExt;
use futures::future::{self, BoxFuture};
use serde_json::Value;

use crate::models::{Effect, ResourceType, action_matches};

/// Future returned by every rule callable.
pub type HookFuture<T> = BoxFuture<'static, anyhow::Result<T>>;

/// Rule condition: does the rule match this context?
pub type Condition = Arc<dyn Fn(RuleContext) -> HookFuture<bool> + Send + Sync>;

/// Scope resolver: which rows may this context see? `None` adds no constraint.
pub type ScopeResolver = Arc<dyn Fn(RuleContext) -> HookFuture<Option<Scope>> + Send + Sync>;

/// Result transform: payload in, reshaped payload out.
pub type ResultTransform = Arc<dyn Fn(Value, RuleContext) -> HookFuture<Value> + Send + Sync>;

/// Per-evaluation input handed to rule callables.
#[derive(Debug, Clone)]
pub struct RuleContext {
    entity: ResourceType,
    subject: Arc<Subject>,
    resource: Option<Arc<Value>>,
}

impl RuleContext {
    #[must_use]
    pub fn new(entity: ResourceType, subject: Arc<Subject>, resource: Option<Arc<Value>>) -> Self {
        Self {
            entity,
            subject,
            resource,
        }
    }

    #[must_use]
    pub fn entity(&self) -> &ResourceType {
        &self.entity
    }

    #[must_use]
    pub fn subject(&self) -> &Subject {
        &self.subject
    }

    #[must_use]
    pub fn resource(&self) -> Option<&Value> {
        self.resource.as_deref()
    }

    /// Field of the resource, when the resource is a loaded JSON object.
    #[must_use]
    pub fn resource_field(&self, field: &str) -> Option<&Value> {
        self.resource().and_then(|r| r.get(field))
    }
}

/// A single condition → effect unit.
///
/// Immutable once built. Construct with [`Rule::allow`] / [`Rule::deny`]:
///
/// ```
/// use authz_policy_sdk::Rule;
///
/// let rule = Rule::deny("delete")
///     .priority(10)
///     .description("only admins delete")
///     .when(|ctx| !ctx.subject().has_role("admin"))
///     .build();
/// assert_eq!(rule.priority(), 10);
/// ```
#[derive(Clone)]
pub struct Rule {
    action: String,
    effect: Effect,
    priority: i32,
    condition: Option<Condition>,
    scope: Option<ScopeResolver>,
    transform: Option<ResultTransform>,
    description: Option<String>,
}

impl Rule {
    /// Start building a rule with the given effect.
    #[must_use]
    pub fn builder(action: impl Into<String>, effect: Effect) -> RuleBuilder {
        RuleBuilder {
            rule: Rule {
                action: action.into(),
                effect,
                priority: 0,
                condition: None,
                scope: None,
                transform: None,
                description: None,
            },
        }
    }

    /// Start building an `Allow` rule.
    #[must_use]
    pub fn allow(action: impl Into<String>) -> RuleBuilder {
        Self::builder(action, Effect::Allow)
    }

    /// Start building a `Deny` rule.
    #[must_use]
    pub fn deny(action: impl Into<String>) -> RuleBuilder {
        Self::builder(action, Effect::Deny)
    }

    #[must_use]
    pub fn action(&self) -> &str {
        &self.action
    }

    #[must_use]
    pub fn effect(&self) -> Effect {
        self.effect
    }

    #[must_use]
    pub fn priority(&self) -> i32 {
        self.priority
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    #[must_use]
    pub fn condition(&self) -> Option<&Condition> {
        self.condition.as_ref()
    }

    #[must_use]
    pub fn scope_resolver(&self) -> Option<&ScopeResolver> {
        self.scope.as_ref()
    }

    #[must_use]
    pub fn transform(&self) -> Option<&ResultTransform> {
        self.transform.as_ref()
    }

    /// Returns `true` if this rule covers `action` (exactly or by wildcard).
    #[must_use]
    pub fn applies_to(&self, action: &str) -> bool {
        action_matches(&self.action, action)
    }

    /// Name used in diagnostics: the description, or the rule's position.
    #[must_use]
    pub fn label(&self, position: usize) -> String {
        self.description
            .clone()
            .unwrap_or_else(|| format!("{}:{}#{position}", self.effect, self.action))
    }

    /// Evaluate the condition. A rule without condition always matches.
    ///
    /// # Errors
    ///
    /// Returns the condition's own error.
    pub async fn matches(&self, ctx: RuleContext) -> anyhow::Result<bool> {
        match &self.condition {
            Some(condition) => condition(ctx).await,
            None => Ok(true),
        }
    }

    /// Resolve the scope contribution of this rule, if it has a resolver.
    ///
    /// # Errors
    ///
    /// Returns the resolver's own error.
    pub async fn resolve_scope(&self, ctx: RuleContext) -> anyhow::Result<Option<Scope>> {
        match &self.scope {
            Some(resolver) => resolver(ctx).await,
            None => Ok(None),
        }
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("action", &self.action)
            .field("effect", &self.effect)
            .field("priority", &self.priority)
            .field("description", &self.description)
            .field("has_condition", &self.condition.is_some())
            .field("has_scope", &self.scope.is_some())
            .field("has_transform", &self.transform.is_some())
            .finish_non_exhaustive()
    }
}

/// Builder for [`Rule`].
#[must_use]
pub struct RuleBuilder {
    rule: Rule,
}

impl RuleBuilder {
    /// Higher priority rules are consulted first. Default `0`.
    pub fn priority(mut self, priority: i32) -> Self {
        self.rule.priority = priority;
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.rule.description = Some(description.into());
        self
    }

    /// Synchronous, infallible condition.
    pub fn when<F>(self, condition: F) -> Self
    where
        F: Fn(&RuleContext) -> bool + Send + Sync + 'static,
    {
        self.try_when(move |ctx| Ok(condition(ctx)))
    }

    /// Synchronous, fallible condition.
    pub fn try_when<F>(mut self, condition: F) -> Self
    where
        F: Fn(&RuleContext) -> anyhow::Result<bool> + Send + Sync + 'static,
    {
        let condition: Condition =
            Arc::new(move |ctx: RuleContext| -> HookFuture<bool> { future::ready(condition(&ctx)).boxed() });
        self.rule.condition = Some(condition);
        self
    }

    /// Asynchronous condition.
    pub fn when_async<F, Fut>(mut self, condition: F) -> Self
    where
        F: Fn(RuleContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<bool>> + Send + 'static,
    {
        let condition: Condition =
            Arc::new(move |ctx: RuleContext| -> HookFuture<bool> { condition(ctx).boxed() });
        self.rule.condition = Some(condition);
        self
    }

    /// Synchronous scope resolver.
    pub fn scope<F>(mut self, resolver: F) -> Self
    where
        F: Fn(&RuleContext) -> Option<Scope> + Send + Sync + 'static,
    {
        let resolver: ScopeResolver = Arc::new(move |ctx: RuleContext| -> HookFuture<Option<Scope>> {
            future::ready(Ok(resolver(&ctx))).boxed()
        });
        self.rule.scope = Some(resolver);
        self
    }

    /// Asynchronous, fallible scope resolver.
    pub fn scope_async<F, Fut>(mut self, resolver: F) -> Self
    where
        F: Fn(RuleContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Option<Scope>>> + Send + 'static,
    {
        let resolver: ScopeResolver =
            Arc::new(move |ctx: RuleContext| -> HookFuture<Option<Scope>> { resolver(ctx).boxed() });
        self.rule.scope = Some(resolver);
        self
    }

    /// Synchronous, infallible result transform.
    pub fn transform<F>(self, transform: F) -> Self
    where
        F: Fn(Value, &RuleContext) -> Value + Send + Sync + 'static,
    {
        self.try_transform(move |payload, ctx| Ok(transform(payload, ctx)))
    }

    /// Synchronous, fallible result transform.
    pub fn try_transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(Value, &RuleContext) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        let transform: ResultTransform =
            Arc::new(move |payload: Value, ctx: RuleContext| -> HookFuture<Value> {
                future::ready(transform(payload, &ctx)).boxed()
            });
        self.rule.transform = Some(transform);
        self
    }

    /// Asynchronous result transform.
    pub fn transform_async<F, Fut>(mut self, transform: F) -> Self
    where
        F: Fn(Value, RuleContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        let transform: ResultTransform =
            Arc::new(move |payload: Value, ctx: RuleContext| -> HookFuture<Value> {
                transform(payload, ctx).boxed()
            });
        self.rule.transform = Some(transform);
        self
    }

    #[must_use]
    pub fn build(self) -> Rule {
        self.rule
    }
}

impl From<RuleBuilder> for Rule {
    fn from(builder: RuleBuilder) -> Self {
        builder.build()
    }
}
