//! Decisions and the utilities callers use to consume them.
//!
//! A [`Decision`] is produced once per evaluation and then threaded through
//! the calling layers: the guard checks [`Decision::effect`], the query layer
//! intersects [`Decision::scope`], and the response layer runs
//! [`Decision::apply_transforms`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use authz_security::{Scope, Subject};
use serde_json::Value;

use crate::error::{AuthZPolicyError, HookStage};
use crate::models::{Effect, ResourceType};
use crate::policy::Policy;
use crate::rule::{ResultTransform, Rule, RuleContext};

/// Well-known key under which a decision is stored in [`AuthzMetadata`].
pub const DECISION_METADATA_KEY: &str = "authz.decision";

/// Result of evaluating a policy. Immutable once returned.
#[derive(Clone)]
pub struct Decision {
    entity: ResourceType,
    action: String,
    subject: Arc<Subject>,
    resource: Option<Arc<Value>>,
    effect: Effect,
    policy_id: Option<String>,
    policy_ids: Vec<String>,
    applied_rules: Vec<Rule>,
    /// Position of each applied rule in the evaluated policy, for labels.
    rule_positions: Vec<usize>,
    scope: Option<Scope>,
    transforms: Vec<ResultTransform>,
}

impl Decision {
    /// A decision without policy, rules or scope.
    #[must_use]
    pub fn new(
        entity: ResourceType,
        action: impl Into<String>,
        subject: Arc<Subject>,
        effect: Effect,
    ) -> Self {
        Self {
            entity,
            action: action.into(),
            subject,
            resource: None,
            effect,
            policy_id: None,
            policy_ids: Vec::new(),
            applied_rules: Vec::new(),
            rule_positions: Vec::new(),
            scope: None,
            transforms: Vec::new(),
        }
    }

    /// Record the policy that produced this decision.
    #[must_use]
    pub fn with_policy(mut self, policy: &Policy) -> Self {
        self.policy_id = Some(policy.id().to_owned());
        self.policy_ids = policy.sources().to_vec();
        self
    }

    /// Record the matched rules, in priority order, each with its position
    /// in the evaluated policy. Transforms are derived from them so the two
    /// lists stay aligned.
    #[must_use]
    pub fn with_applied_rules<I>(mut self, rules: I) -> Self
    where
        I: IntoIterator<Item = (usize, Rule)>,
    {
        let (positions, rules): (Vec<usize>, Vec<Rule>) = rules.into_iter().unzip();
        self.transforms = rules.iter().filter_map(|r| r.transform().cloned()).collect();
        self.applied_rules = rules;
        self.rule_positions = positions;
        self
    }

    #[must_use]
    pub fn with_scope(mut self, scope: Option<Scope>) -> Self {
        self.scope = scope;
        self
    }

    #[must_use]
    pub fn with_resource(mut self, resource: Option<Arc<Value>>) -> Self {
        self.resource = resource;
        self
    }

    #[must_use]
    pub fn entity(&self) -> &ResourceType {
        &self.entity
    }

    /// Entity type name.
    #[must_use]
    pub fn resource_type(&self) -> &str {
        self.entity.name
    }

    #[must_use]
    pub fn action(&self) -> &str {
        &self.action
    }

    #[must_use]
    pub fn subject(&self) -> &Subject {
        &self.subject
    }

    #[must_use]
    pub fn resource(&self) -> Option<&Value> {
        self.resource.as_deref()
    }

    #[must_use]
    pub fn effect(&self) -> Effect {
        self.effect
    }

    #[must_use]
    pub fn is_allowed(&self) -> bool {
        self.effect.is_allow()
    }

    #[must_use]
    pub fn is_denied(&self) -> bool {
        self.effect.is_deny()
    }

    /// Id of the policy that produced the decision; `None` when the default
    /// effect applied for lack of a policy.
    #[must_use]
    pub fn policy_id(&self) -> Option<&str> {
        self.policy_id.as_deref()
    }

    /// Contributing sources of [`Self::policy_id`].
    #[must_use]
    pub fn policy_ids(&self) -> &[String] {
        &self.policy_ids
    }

    #[must_use]
    pub fn applied_rules(&self) -> &[Rule] {
        &self.applied_rules
    }

    #[must_use]
    pub fn scope(&self) -> Option<&Scope> {
        self.scope.as_ref()
    }

    #[must_use]
    pub fn transforms(&self) -> &[ResultTransform] {
        &self.transforms
    }

    /// Context handed to transforms: the decision's subject and resource.
    #[must_use]
    pub fn rule_context(&self) -> RuleContext {
        RuleContext::new(self.entity, Arc::clone(&self.subject), self.resource.clone())
    }

    /// Fold `payload` through the collected transforms, in order.
    ///
    /// Each transform is awaited before the next one starts. The folded
    /// value is only returned once every transform succeeded.
    ///
    /// # Errors
    ///
    /// Returns [`AuthZPolicyError::HookEvaluation`] if any transform fails.
    pub async fn apply_transforms(&self, payload: Value) -> Result<Value, AuthZPolicyError> {
        let mut payload = payload;
        for (rule, position) in self.applied_rules.iter().zip(&self.rule_positions) {
            let Some(transform) = rule.transform() else {
                continue;
            };
            payload = transform(payload, self.rule_context())
                .await
                .map_err(|e| AuthZPolicyError::hook(HookStage::Transform, rule.label(*position), &e))?;
        }
        Ok(payload)
    }
}

impl fmt::Debug for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Decision")
            .field("resource_type", &self.entity.name)
            .field("action", &self.action)
            .field("subject", &self.subject.id())
            .field("effect", &self.effect)
            .field("policy_id", &self.policy_id)
            .field("policy_ids", &self.policy_ids)
            .field("applied_rules", &self.applied_rules.len())
            .field("scope", &self.scope)
            .field("transforms", &self.transforms.len())
            .finish_non_exhaustive()
    }
}

/// Attach a loaded resource to an earlier decision.
///
/// - no decision → `None`
/// - no resource → the same decision (same `Arc`)
/// - otherwise a new decision carrying the resource
#[must_use]
pub fn attach_resource(
    decision: Option<Arc<Decision>>,
    resource: Option<Value>,
) -> Option<Arc<Decision>> {
    let decision = decision?;
    match resource {
        None => Some(decision),
        Some(resource) => Some(Arc::new(
            Decision::clone(&decision).with_resource(Some(Arc::new(resource))),
        )),
    }
}

/// Per-request authorization metadata, stored as an `http` extension.
#[derive(Debug, Clone, Default)]
pub struct AuthzMetadata {
    entries: HashMap<String, Arc<Decision>>,
}

impl AuthzMetadata {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Arc<Decision>> {
        self.entries.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, decision: Arc<Decision>) -> Option<Arc<Decision>> {
        self.entries.insert(key.into(), decision)
    }
}

/// Look up a previously stored decision.
///
/// Checks [`AuthzMetadata`] under [`DECISION_METADATA_KEY`] first, then a
/// bare `Arc<Decision>` extension.
#[must_use]
pub fn resolve_from_extensions(extensions: &http::Extensions) -> Option<Arc<Decision>> {
    extensions
        .get::<AuthzMetadata>()
        .and_then(|meta| meta.get(DECISION_METADATA_KEY))
        .or_else(|| extensions.get::<Arc<Decision>>())
        .cloned()
}

/// See [`resolve_from_extensions`].
#[must_use]
pub fn resolve_from_request<B>(request: &http::Request<B>) -> Option<Arc<Decision>> {
    resolve_from_extensions(request.extensions())
}

/// Store `decision` in the request's [`AuthzMetadata`], keeping other entries.
pub fn store_in_request<B>(request: &mut http::Request<B>, decision: Arc<Decision>) {
    let mut meta = request
        .extensions()
        .get::<AuthzMetadata>()
        .cloned()
        .unwrap_or_default();
    meta.insert(DECISION_METADATA_KEY, decision);
    request.extensions_mut().insert(meta);
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use serde_json::json;

    use super::*;

    const ARTICLE: ResourceType = ResourceType::new("Article");

    fn subject() -> Arc<Subject> {
        Arc::new(Subject::builder().id("u1").role("editor").build())
    }

    fn decision(rules: Vec<Rule>) -> Decision {
        let policy = Policy::builder(ARTICLE).id("articles").build();
        Decision::new(ARTICLE, "read", subject(), Effect::Allow)
            .with_policy(&policy)
            .with_applied_rules(rules.into_iter().enumerate())
    }

    fn add_field(field: &'static str) -> Rule {
        Rule::allow("read")
            .transform(move |mut payload, _| {
                let mut steps = payload["steps"].as_array().cloned().unwrap_or_default();
                steps.push(json!(field));
                payload["steps"] = Value::Array(steps);
                payload
            })
            .build()
    }

    #[tokio::test]
    async fn no_transforms_returns_payload_unchanged() {
        let decision = decision(vec![Rule::allow("read").build()]);
        let payload = json!({ "id": "a1" });

        assert!(decision.transforms().is_empty());
        assert_eq!(decision.apply_transforms(payload.clone()).await.unwrap(), payload);
    }

    #[tokio::test]
    async fn transforms_fold_in_matching_order() {
        let decision = decision(vec![add_field("a"), Rule::allow("read").build(), add_field("b")]);

        assert_eq!(decision.applied_rules().len(), 3);
        assert_eq!(decision.transforms().len(), 2);

        let out = decision.apply_transforms(json!({ "steps": [] })).await.unwrap();
        assert_eq!(out, json!({ "steps": ["a", "b"] }));
    }

    #[tokio::test]
    async fn transforms_see_subject_and_resource() {
        let redact = Rule::allow("read")
            .transform(|mut payload, ctx| {
                if !ctx.subject().has_role("admin") {
                    payload["salary"] = Value::Null;
                }
                if let Some(id) = ctx.resource_field("id") {
                    payload["resource"] = id.clone();
                }
                payload
            })
            .build();
        let decision = decision(vec![redact]).with_resource(Some(Arc::new(json!({ "id": "a1" }))));

        let out = decision
            .apply_transforms(json!({ "salary": 100 }))
            .await
            .unwrap();
        assert_eq!(out, json!({ "salary": null, "resource": "a1" }));
    }

    #[tokio::test]
    async fn failing_transform_fails_whole_application() {
        let failing = Rule::allow("read")
            .description("redactor")
            .try_transform(|_, _| Err(anyhow::anyhow!("schema mismatch")))
            .build();
        let decision = decision(vec![add_field("a"), failing, add_field("b")]);

        let err = decision.apply_transforms(json!({ "steps": [] })).await.unwrap_err();
        match err {
            AuthZPolicyError::HookEvaluation { hook, stage, reason } => {
                assert_eq!(hook, "redactor");
                assert_eq!(stage, HookStage::Transform);
                assert_eq!(reason, "schema mismatch");
            }
            other => panic!("expected HookEvaluation, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn transform_error_uses_recorded_policy_position() {
        let failing = Rule::allow("read")
            .try_transform(|_, _| Err(anyhow::anyhow!("schema mismatch")))
            .build();
        let decision = Decision::new(ARTICLE, "read", subject(), Effect::Allow)
            .with_applied_rules([(0, add_field("a")), (4, failing)]);

        let err = decision.apply_transforms(json!({ "steps": [] })).await.unwrap_err();
        assert!(matches!(
            err,
            AuthZPolicyError::HookEvaluation { ref hook, .. } if hook == "allow:read#4"
        ));
    }

    #[test]
    fn policy_ids_follow_policy_sources() {
        let decision = decision(Vec::new());
        assert_eq!(decision.policy_id(), Some("articles"));
        assert_eq!(decision.policy_ids(), ["articles"]);

        let bare = Decision::new(ARTICLE, "read", subject(), Effect::Deny);
        assert!(bare.policy_id().is_none());
        assert!(bare.policy_ids().is_empty());
        assert!(bare.is_denied());
        assert_eq!(bare.resource_type(), "Article");
    }

    #[test]
    fn attach_resource_without_decision_is_none() {
        assert!(attach_resource(None, Some(json!({ "id": "a1" }))).is_none());
    }

    #[test]
    fn attach_resource_without_resource_keeps_same_decision() {
        let original = Arc::new(decision(Vec::new()));
        let attached = attach_resource(Some(Arc::clone(&original)), None).unwrap();

        assert!(Arc::ptr_eq(&original, &attached));
    }

    #[test]
    fn attach_resource_creates_new_decision() {
        let original = Arc::new(decision(Vec::new()));
        let attached = attach_resource(Some(Arc::clone(&original)), Some(json!({ "id": "a1" }))).unwrap();

        assert!(!Arc::ptr_eq(&original, &attached));
        assert!(original.resource().is_none());
        assert_eq!(attached.resource(), Some(&json!({ "id": "a1" })));
        assert_eq!(attached.policy_id(), original.policy_id());
    }

    #[test]
    fn resolve_prefers_metadata_key() {
        let stored = Arc::new(decision(Vec::new()));
        let fallback = Arc::new(Decision::new(ARTICLE, "list", subject(), Effect::Deny));

        let mut request = http::Request::new(());
        request.extensions_mut().insert(Arc::clone(&fallback));
        store_in_request(&mut request, Arc::clone(&stored));

        let resolved = resolve_from_request(&request).unwrap();
        assert!(Arc::ptr_eq(&resolved, &stored));
    }

    #[test]
    fn resolve_falls_back_to_typed_slot() {
        let fallback = Arc::new(decision(Vec::new()));
        let mut request = http::Request::new(());
        request.extensions_mut().insert(Arc::clone(&fallback));

        let resolved = resolve_from_request(&request).unwrap();
        assert!(Arc::ptr_eq(&resolved, &fallback));
    }

    #[test]
    fn resolve_without_decision_is_none() {
        let request = http::Request::new(());
        assert!(resolve_from_request(&request).is_none());
    }

    #[test]
    fn store_keeps_other_metadata_entries() {
        let other = Arc::new(decision(Vec::new()));
        let mut meta = AuthzMetadata::new();
        meta.insert("authz.parent", Arc::clone(&other));

        let mut request = http::Request::new(());
        request.extensions_mut().insert(meta);
        store_in_request(&mut request, Arc::new(decision(Vec::new())));

        let meta = request.extensions().get::<AuthzMetadata>().unwrap();
        assert!(meta.get("authz.parent").is_some());
        assert!(meta.get(DECISION_METADATA_KEY).is_some());
    }
}
