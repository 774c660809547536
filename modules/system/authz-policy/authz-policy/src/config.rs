//! Configuration for the `AuthZ` policy engine.

use std::time::Duration;

use authz_policy_sdk::Effect;
use serde::Deserialize;

/// What the registry does when a policy id is registered twice for the same
/// entity and action.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicyStrategy {
    /// Last registration wins; the previous policy is replaced in place and
    /// a warning is logged.
    #[default]
    Overwrite,
    /// Registration fails with `DuplicatePolicyId`.
    Reject,
}

/// What aggregation does when a subscriber hook fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookFailureMode {
    /// The aggregation fails.
    #[default]
    FailClosed,
    /// The failing subscriber is skipped with a warning.
    FailOpen,
}

/// Configuration.
///
/// `default_effect` has no default: whether "no applicable rule" means
/// allow or deny must be stated explicitly.
///
/// ```
/// use authz_policy::config::{AuthZPolicyConfig, DuplicatePolicyStrategy};
///
/// let cfg: AuthZPolicyConfig = serde_json::from_value(serde_json::json!({
///     "default_effect": "deny",
///     "duplicate_policy": "reject",
/// }))
/// .unwrap();
/// assert_eq!(cfg.duplicate_policy, DuplicatePolicyStrategy::Reject);
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthZPolicyConfig {
    /// Effect when no policy or no rule applies.
    pub default_effect: Effect,
    #[serde(default)]
    pub duplicate_policy: DuplicatePolicyStrategy,
    #[serde(default)]
    pub hook_failure: HookFailureMode,
    /// Deadline for a single evaluation. Unset means no deadline.
    #[serde(default)]
    pub evaluation_timeout_ms: Option<u64>,
}

impl AuthZPolicyConfig {
    #[must_use]
    pub fn new(default_effect: Effect) -> Self {
        Self {
            default_effect,
            duplicate_policy: DuplicatePolicyStrategy::default(),
            hook_failure: HookFailureMode::default(),
            evaluation_timeout_ms: None,
        }
    }

    #[must_use]
    pub fn evaluation_timeout(&self) -> Option<Duration> {
        self.evaluation_timeout_ms.map(Duration::from_millis)
    }
}
