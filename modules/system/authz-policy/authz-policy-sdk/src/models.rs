//! Core models for the `authz_policy` module.

use std::fmt;
use std::sync::Arc;

use authz_security::Subject;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::policy::Policy;

/// Action wildcard: a policy or rule with this action applies to every action.
pub const ANY_ACTION: &str = "*";

/// Returns `true` if `pattern` (a policy/rule action) covers `action`.
#[must_use]
pub fn action_matches(pattern: &str, action: &str) -> bool {
    pattern == ANY_ACTION || pattern == action
}

/// Outcome of a rule or decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    Allow,
    Deny,
}

impl Effect {
    #[inline]
    #[must_use]
    pub fn is_allow(self) -> bool {
        matches!(self, Self::Allow)
    }

    #[inline]
    #[must_use]
    pub fn is_deny(self) -> bool {
        matches!(self, Self::Deny)
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allow => f.write_str("allow"),
            Self::Deny => f.write_str("deny"),
        }
    }
}

/// Static descriptor for an entity type governed by policies.
///
/// Resolved once at startup and passed into every rule context, so rules
/// never introspect the storage layer at evaluation time.
///
/// ```
/// use authz_policy_sdk::ResourceType;
///
/// const ARTICLE: ResourceType = ResourceType {
///     name: "Article",
///     supported_properties: &["id", "tenant_id", "author_id"],
/// };
/// assert!(ARTICLE.supports("tenant_id"));
/// assert!(!ARTICLE.supports("salary"));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceType {
    /// Entity type name (e.g. `"Article"`).
    pub name: &'static str,
    /// Properties a scope filter may reference. Empty means unrestricted.
    pub supported_properties: &'static [&'static str],
}

impl ResourceType {
    /// Descriptor without scope property restrictions.
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            supported_properties: &[],
        }
    }

    /// Returns `true` if scope filters may reference `property`.
    #[must_use]
    pub fn supports(&self, property: &str) -> bool {
        self.supported_properties.is_empty() || self.supported_properties.contains(&property)
    }

    /// Returns `true` if the descriptor names an entity.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        !self.name.trim().is_empty()
    }

    /// Policy id used when none is given: `<lowercased name>-policy`.
    #[must_use]
    pub fn default_policy_id(&self) -> String {
        format!("{}-policy", self.name.to_lowercase())
    }
}

/// Input of a single evaluation.
#[derive(Debug, Clone)]
pub struct EvaluationRequest {
    /// The entity type being accessed.
    pub entity: ResourceType,
    /// The action being performed.
    pub action: String,
    /// The acting principal.
    pub subject: Arc<Subject>,
    /// The concrete resource, when already loaded.
    pub resource: Option<Arc<Value>>,
    /// The aggregated policy; `None` means no applicable policy.
    pub policy: Option<Policy>,
}

impl EvaluationRequest {
    #[must_use]
    pub fn new(
        entity: ResourceType,
        action: impl Into<String>,
        subject: impl Into<Arc<Subject>>,
    ) -> Self {
        Self {
            entity,
            action: action.into(),
            subject: subject.into(),
            resource: None,
            policy: None,
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: Option<Policy>) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn with_resource(mut self, resource: Value) -> Self {
        self.resource = Some(Arc::new(resource));
        self
    }
}
