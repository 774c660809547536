//! Policies: the rules governing one entity type's action.

use std::sync::Arc;

use crate::models::{ANY_ACTION, ResourceType, action_matches};
use crate::rule::Rule;

/// An immutable set of [`Rule`]s for one (entity, action) pair.
///
/// Rule order is registration order; evaluation always re-sorts by priority.
/// `Clone` is cheap: the rule list is shared.
///
/// ```
/// use authz_policy_sdk::{Policy, ResourceType, Rule};
///
/// const ARTICLE: ResourceType = ResourceType::new("Article");
///
/// let policy = Policy::builder(ARTICLE)
///     .action("read")
///     .rule(Rule::allow("read").when(|ctx| !ctx.subject().is_anonymous()))
///     .build();
///
/// assert_eq!(policy.id(), "article-policy");
/// assert_eq!(policy.sources(), ["article-policy"]);
/// ```
#[derive(Debug, Clone)]
pub struct Policy {
    id: String,
    entity: ResourceType,
    action: String,
    rules: Arc<[Rule]>,
    description: Option<String>,
    sources: Arc<[String]>,
}

impl Policy {
    #[must_use]
    pub fn builder(entity: ResourceType) -> PolicyBuilder {
        PolicyBuilder {
            id: None,
            entity,
            action: ANY_ACTION.to_owned(),
            rules: Vec::new(),
            description: None,
        }
    }

    /// Assemble the policy produced by registry aggregation.
    #[must_use]
    pub fn aggregated(
        id: String,
        entity: ResourceType,
        action: String,
        rules: Vec<Rule>,
        sources: Vec<String>,
        description: Option<String>,
    ) -> Self {
        Self {
            id,
            entity,
            action,
            rules: rules.into(),
            description,
            sources: sources.into(),
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
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
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Ids of the contributions merged into this policy: static policy ids
    /// and subscriber names. A declared policy lists only its own id.
    #[must_use]
    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    /// Returns `true` if the policy's action covers `action`.
    #[must_use]
    pub fn applies_to(&self, action: &str) -> bool {
        action_matches(&self.action, action)
    }
}

/// Builder for [`Policy`].
#[must_use]
pub struct PolicyBuilder {
    id: Option<String>,
    entity: ResourceType,
    action: String,
    rules: Vec<Rule>,
    description: Option<String>,
}

impl PolicyBuilder {
    /// Defaults to `<lowercased entity name>-policy`.
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Defaults to the `"*"` wildcard.
    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.action = action.into();
        self
    }

    pub fn rule(mut self, rule: impl Into<Rule>) -> Self {
        self.rules.push(rule.into());
        self
    }

    pub fn rules<I, R>(mut self, rules: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<Rule>,
    {
        self.rules.extend(rules.into_iter().map(Into::into));
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn build(self) -> Policy {
        let id = self.id.unwrap_or_else(|| self.entity.default_policy_id());
        Policy {
            sources: Arc::from([id.clone()]),
            id,
            entity: self.entity,
            action: self.action,
            rules: self.rules.into(),
            description: self.description,
        }
    }
}
