//! Subscriber API: dynamic, hook-based policy contributions.
//!
//! A subscriber is consulted every time the registry aggregates a policy for
//! its entity. It returns rules for the request at hand, or `None` for
//! "no opinion".

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use authz_security::Subject;

use crate::models::ResourceType;
use crate::rule::Rule;

/// What a subscriber gets to see when asked for rules.
#[derive(Debug, Clone)]
pub struct SubscriberContext {
    entity: ResourceType,
    action: String,
    route: Option<String>,
    subject: Option<Arc<Subject>>,
}

impl SubscriberContext {
    #[must_use]
    pub fn new(entity: ResourceType, action: impl Into<String>) -> Self {
        Self {
            entity,
            action: action.into(),
            route: None,
            subject: None,
        }
    }

    /// Route kind that triggered the evaluation (e.g. `"list"`, `"get_one"`).
    #[must_use]
    pub fn with_route(mut self, route: impl Into<String>) -> Self {
        self.route = Some(route.into());
        self
    }

    #[must_use]
    pub fn with_subject(mut self, subject: Arc<Subject>) -> Self {
        self.subject = Some(subject);
        self
    }

    #[must_use]
    pub fn entity(&self) -> &ResourceType {
        &self.entity
    }

    #[must_use]
    pub fn action(&self) -> &str {
        &self.action
    }

    #[must_use]
    pub fn route(&self) -> Option<&str> {
        self.route.as_deref()
    }

    #[must_use]
    pub fn subject(&self) -> Option<&Subject> {
        self.subject.as_deref()
    }
}

/// A dynamic source of rules for one entity.
///
/// Implementations must be cheap to call concurrently: the registry invokes
/// every subscriber of an entity in parallel during aggregation.
#[async_trait]
pub trait PolicySubscriber: Send + Sync {
    /// Rules for this context; `Ok(None)` contributes nothing.
    ///
    /// # Errors
    ///
    /// Any error fails the aggregation unless the registry runs fail-open.
    async fn rules(&self, ctx: &SubscriberContext) -> anyhow::Result<Option<Vec<Rule>>>;
}

/// A named subscriber bound to an entity.
#[derive(Clone)]
pub struct SubscriberRegistration {
    name: String,
    entity: ResourceType,
    priority: i32,
    subscriber: Arc<dyn PolicySubscriber>,
}

impl SubscriberRegistration {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        entity: ResourceType,
        subscriber: Arc<dyn PolicySubscriber>,
    ) -> Self {
        Self {
            name: name.into(),
            entity,
            priority: 0,
            subscriber,
        }
    }

    /// Register a closure as subscriber.
    ///
    /// ```
    /// use authz_policy_sdk::{ResourceType, Rule, SubscriberRegistration};
    ///
    /// const ARTICLE: ResourceType = ResourceType::new("Article");
    ///
    /// let registration = SubscriberRegistration::from_fn("drafts", ARTICLE, |ctx| async move {
    ///     if ctx.route() == Some("list") {
    ///         Ok(Some(vec![Rule::deny("*").priority(100).build()]))
    ///     } else {
    ///         Ok(None)
    ///     }
    /// })
    /// .priority(5);
    /// assert_eq!(registration.name(), "drafts");
    /// ```
    #[must_use]
    pub fn from_fn<F, Fut>(name: impl Into<String>, entity: ResourceType, hook: F) -> Self
    where
        F: Fn(SubscriberContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Option<Vec<Rule>>>> + Send + 'static,
    {
        Self::new(name, entity, Arc::new(FnSubscriber { hook }))
    }

    /// Subscribers with higher priority are merged first. Default `0`.
    #[must_use]
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn entity(&self) -> &ResourceType {
        &self.entity
    }

    #[must_use]
    pub fn priority_value(&self) -> i32 {
        self.priority
    }

    #[must_use]
    pub fn subscriber(&self) -> &Arc<dyn PolicySubscriber> {
        &self.subscriber
    }
}

impl fmt::Debug for SubscriberRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriberRegistration")
            .field("name", &self.name)
            .field("entity", &self.entity.name)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

struct FnSubscriber<F> {
    hook: F,
}

#[async_trait]
impl<F, Fut> PolicySubscriber for FnSubscriber<F>
where
    F: Fn(SubscriberContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Option<Vec<Rule>>>> + Send + 'static,
{
    async fn rules(&self, ctx: &SubscriberContext) -> anyhow::Result<Option<Vec<Rule>>> {
        (self.hook)(ctx.clone()).await
    }
}
