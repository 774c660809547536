//! Policy registry: static policies, subscriber hooks and aggregation.
//!
//! State is copy-on-write. Writers clone the current [`RegistryState`],
//! modify the clone and publish it with a single `ArcSwap::store`, so a
//! concurrent aggregation always works on one consistent snapshot. Writers
//! are serialized by a mutex; readers never lock.
//!
//! The static part of an aggregate is cached per (entity, action) and tagged
//! with the snapshot generation it was computed from. Every write bumps the
//! generation, so a stale entry is never served. Only actions named by a
//! registered policy or rule get an entry, so the cache is bounded by the
//! registrations, not by the actions callers ask about.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use authz_policy_sdk::{
    HookStage, Policy, ResourceType, Rule, SubscriberContext, SubscriberRegistration,
};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::future::join_all;
use parking_lot::Mutex;
use tracing::{debug, warn};

use super::error::DomainError;
use crate::config::{DuplicatePolicyStrategy, HookFailureMode};

#[derive(Clone, Default)]
struct RegistryState {
    generation: u64,
    /// Static policies per entity name, in registration order.
    policies: HashMap<String, Vec<Policy>>,
    /// Subscribers per entity name, by priority descending then
    /// registration order.
    subscribers: HashMap<String, Vec<SubscriberRegistration>>,
}

/// Static rules for one (entity, action), as of one generation.
struct StaticAggregate {
    generation: u64,
    rules: Vec<Rule>,
    /// Ids of the policies that matched the action.
    sources: Vec<String>,
    /// Description of the single matching policy, if exactly one matched.
    description: Option<String>,
}

/// Central catalog of policy contributions.
///
/// Construct one per process and share it (`Arc<PolicyRegistry>`).
pub struct PolicyRegistry {
    state: ArcSwap<RegistryState>,
    write_lock: Mutex<()>,
    cache: DashMap<(String, String), Arc<StaticAggregate>>,
    duplicate_policy: DuplicatePolicyStrategy,
    hook_failure: HookFailureMode,
}

impl Default for PolicyRegistry {
    fn default() -> Self {
        Self::new(DuplicatePolicyStrategy::default(), HookFailureMode::default())
    }
}

impl PolicyRegistry {
    #[must_use]
    pub fn new(duplicate_policy: DuplicatePolicyStrategy, hook_failure: HookFailureMode) -> Self {
        Self {
            state: ArcSwap::from_pointee(RegistryState::default()),
            write_lock: Mutex::new(()),
            cache: DashMap::new(),
            duplicate_policy,
            hook_failure,
        }
    }

    /// Register a statically declared policy under its entity.
    ///
    /// A policy whose id is already registered for the same entity and action
    /// either replaces the previous one in place (`overwrite`, logged) or is
    /// refused (`reject`).
    ///
    /// # Errors
    ///
    /// - [`DomainError::UnresolvedEntity`] if the policy's entity is blank
    /// - [`DomainError::DuplicatePolicyId`] under the `reject` strategy
    #[tracing::instrument(skip_all, fields(policy_id = %policy.id(), entity = policy.entity().name))]
    pub fn register_policy(&self, policy: Policy) -> Result<(), DomainError> {
        let entity = resolve_entity(policy.entity())?;

        self.update(|state| {
            let policies = state.policies.entry(entity.to_owned()).or_default();
            let existing = policies
                .iter()
                .position(|p| p.id() == policy.id() && p.action() == policy.action());

            match (existing, self.duplicate_policy) {
                (None, _) => policies.push(policy),
                (Some(_), DuplicatePolicyStrategy::Reject) => {
                    return Err(DomainError::DuplicatePolicyId {
                        policy_id: policy.id().to_owned(),
                        entity: entity.to_owned(),
                    });
                }
                (Some(index), DuplicatePolicyStrategy::Overwrite) => {
                    warn!(
                        policy_id = %policy.id(),
                        entity,
                        action = %policy.action(),
                        "Policy id already registered; replacing previous registration"
                    );
                    policies[index] = policy;
                }
            }
            Ok(())
        })?;

        self.invalidate(entity);
        Ok(())
    }

    /// Register a dynamic rule source for its entity.
    ///
    /// # Errors
    ///
    /// - [`DomainError::UnresolvedEntity`] if the registration's entity is blank
    #[tracing::instrument(skip_all, fields(subscriber = %registration.name(), entity = registration.entity().name))]
    pub fn register_subscriber(&self, registration: SubscriberRegistration) -> Result<(), DomainError> {
        let entity = resolve_entity(registration.entity())?;

        self.update(|state| {
            let subscribers = state.subscribers.entry(entity.to_owned()).or_default();
            // After every existing subscriber of equal or higher priority.
            let index = subscribers
                .iter()
                .position(|s| s.priority_value() < registration.priority_value())
                .unwrap_or(subscribers.len());
            subscribers.insert(index, registration);
            Ok(())
        })?;

        self.invalidate(entity);
        Ok(())
    }

    /// Aggregate every contribution for `entity` and `action`.
    ///
    /// # Errors
    ///
    /// See [`Self::build_aggregated_policy_for`].
    pub async fn build_aggregated_policy(
        &self,
        entity: ResourceType,
        action: &str,
    ) -> Result<Option<Policy>, DomainError> {
        self.build_aggregated_policy_for(&SubscriberContext::new(entity, action))
            .await
    }

    /// Aggregate static rules and subscriber rules into one policy.
    ///
    /// Static rules come first, in policy registration order, followed by
    /// each subscriber's rules in subscriber order. Subscribers run
    /// concurrently. Returns `Ok(None)` if no static policy matched and no
    /// subscriber had an opinion.
    ///
    /// # Errors
    ///
    /// - [`DomainError::UnresolvedEntity`] if the context's entity is blank
    /// - [`DomainError::Hook`] if a subscriber fails and the registry is
    ///   fail-closed
    #[tracing::instrument(skip_all, fields(entity = ctx.entity().name, action = %ctx.action()))]
    pub async fn build_aggregated_policy_for(
        &self,
        ctx: &SubscriberContext,
    ) -> Result<Option<Policy>, DomainError> {
        let entity = resolve_entity(ctx.entity())?;
        let action = ctx.action();
        let snapshot = self.state.load_full();

        let static_part = self.static_aggregate(&snapshot, entity, action);
        let mut rules = static_part.rules.clone();
        let mut sources = static_part.sources.clone();
        let mut subscribed = false;

        let subscribers = snapshot.subscribers.get(entity).map_or(&[][..], Vec::as_slice);
        let results = join_all(subscribers.iter().map(|s| s.subscriber().rules(ctx))).await;

        for (registration, result) in subscribers.iter().zip(results) {
            match result {
                Ok(None) => {}
                Ok(Some(contributed)) => {
                    subscribed = true;
                    sources.push(registration.name().to_owned());
                    rules.extend(contributed.into_iter().filter(|r| r.applies_to(action)));
                }
                Err(e) => match self.hook_failure {
                    HookFailureMode::FailClosed => {
                        return Err(DomainError::hook(HookStage::Subscriber, registration.name(), &e));
                    }
                    HookFailureMode::FailOpen => {
                        warn!(
                            subscriber = %registration.name(),
                            error = %format!("{e:#}"),
                            "Subscriber failed; skipping it (fail-open)"
                        );
                    }
                },
            }
        }

        if static_part.sources.is_empty() && !subscribed {
            debug!("No applicable policy");
            return Ok(None);
        }

        let (id, description) = match static_part.sources.as_slice() {
            [single] if !subscribed => (single.clone(), static_part.description.clone()),
            _ => (ctx.entity().default_policy_id(), None),
        };
        debug!(policy_id = %id, rules = rules.len(), sources = sources.len(), "Aggregated policy");

        Ok(Some(Policy::aggregated(
            id,
            *ctx.entity(),
            action.to_owned(),
            rules,
            sources,
            description,
        )))
    }

    /// Drop every registration and cached aggregate.
    pub fn clear(&self) {
        let _write = self.write_lock.lock();
        let generation = self.state.load().generation + 1;
        self.state.store(Arc::new(RegistryState {
            generation,
            ..RegistryState::default()
        }));
        self.cache.clear();
        debug!(generation, "Policy registry cleared");
    }

    /// Number of static policies registered for `entity`.
    #[must_use]
    pub fn policy_count(&self, entity: &ResourceType) -> usize {
        self.state.load().policies.get(entity.name).map_or(0, Vec::len)
    }

    /// Number of subscribers registered for `entity`.
    #[must_use]
    pub fn subscriber_count(&self, entity: &ResourceType) -> usize {
        self.state.load().subscribers.get(entity.name).map_or(0, Vec::len)
    }

    /// Copy-on-write update under the writer lock.
    fn update<F>(&self, apply: F) -> Result<(), DomainError>
    where
        F: FnOnce(&mut RegistryState) -> Result<(), DomainError>,
    {
        let _write = self.write_lock.lock();
        let mut next = RegistryState::clone(&self.state.load());
        apply(&mut next)?;
        next.generation += 1;
        self.state.store(Arc::new(next));
        Ok(())
    }

    fn invalidate(&self, entity: &str) {
        self.cache.retain(|(cached, _), _| cached != entity);
    }

    fn static_aggregate(
        &self,
        snapshot: &RegistryState,
        entity: &str,
        action: &str,
    ) -> Arc<StaticAggregate> {
        let key = (entity.to_owned(), action.to_owned());
        if let Some(cached) = self.cache.get(&key)
            && cached.generation == snapshot.generation
        {
            return Arc::clone(&cached);
        }

        let computed = Arc::new(collect_static(snapshot, entity, action));
        if !names_action(snapshot, entity, action) {
            return computed;
        }
        match self.cache.entry(key) {
            Entry::Occupied(mut slot) => {
                if slot.get().generation < computed.generation {
                    slot.insert(Arc::clone(&computed));
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(Arc::clone(&computed));
            }
        }
        computed
    }
}

/// Whether a registered policy or rule of `entity` names `action` explicitly.
fn names_action(snapshot: &RegistryState, entity: &str, action: &str) -> bool {
    snapshot.policies.get(entity).is_some_and(|policies| {
        policies
            .iter()
            .any(|p| p.action() == action || p.rules().iter().any(|r| r.action() == action))
    })
}

fn collect_static(snapshot: &RegistryState, entity: &str, action: &str) -> StaticAggregate {
    let matching: Vec<&Policy> = snapshot
        .policies
        .get(entity)
        .map(|policies| policies.iter().filter(|p| p.applies_to(action)).collect())
        .unwrap_or_default();

    let description = match matching.as_slice() {
        [single] => single.description().map(ToOwned::to_owned),
        _ => None,
    };

    StaticAggregate {
        generation: snapshot.generation,
        rules: matching
            .iter()
            .flat_map(|p| p.rules().iter().filter(|r| r.applies_to(action)).cloned())
            .collect(),
        sources: matching.iter().map(|p| p.id().to_owned()).collect(),
        description,
    }
}

fn resolve_entity(entity: &ResourceType) -> Result<&'static str, DomainError> {
    if entity.is_resolved() {
        Ok(entity.name)
    } else {
        Err(DomainError::UnresolvedEntity {
            entity: entity.name.to_owned(),
        })
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use authz_policy_sdk::{Effect, Rule};
    use tracing_test::traced_test;

    use super::*;

    const ARTICLE: ResourceType = ResourceType::new("Article");
    const COMMENT: ResourceType = ResourceType::new("Comment");

    fn described(rules: &[Rule]) -> Vec<&str> {
        rules.iter().filter_map(Rule::description).collect()
    }

    fn policy(id: &str, action: &str, rule: &str) -> Policy {
        Policy::builder(ARTICLE)
            .id(id)
            .action(action)
            .rule(Rule::allow(action).description(rule))
            .build()
    }

    fn reject_registry() -> PolicyRegistry {
        PolicyRegistry::new(DuplicatePolicyStrategy::Reject, HookFailureMode::FailClosed)
    }

    // ── aggregation ──────────────────────────────────────────────────

    #[tokio::test]
    async fn empty_registry_has_no_policy() {
        let registry = PolicyRegistry::default();
        let policy = registry.build_aggregated_policy(ARTICLE, "read").await.unwrap();
        assert!(policy.is_none());
    }

    #[tokio::test]
    async fn single_static_policy_keeps_its_id() {
        let registry = PolicyRegistry::default();
        registry
            .register_policy(
                Policy::builder(ARTICLE)
                    .id("articles-read")
                    .action("read")
                    .description("readers")
                    .rule(Rule::allow("read").description("r1"))
                    .build(),
            )
            .unwrap();

        let policy = registry
            .build_aggregated_policy(ARTICLE, "read")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(policy.id(), "articles-read");
        assert_eq!(policy.sources(), ["articles-read"]);
        assert_eq!(policy.action(), "read");
        assert_eq!(policy.description(), Some("readers"));
        assert_eq!(described(policy.rules()), ["r1"]);
    }

    #[tokio::test]
    async fn wildcard_policies_and_rules_join_specific_ones() {
        let registry = PolicyRegistry::default();
        registry.register_policy(policy("read-only", "read", "specific")).unwrap();
        registry
            .register_policy(
                Policy::builder(ARTICLE)
                    .id("baseline")
                    .rule(Rule::deny("*").description("any"))
                    .rule(Rule::deny("delete").description("delete-only"))
                    .build(),
            )
            .unwrap();
        registry.register_policy(policy("writers", "update", "other-action")).unwrap();

        let policy = registry
            .build_aggregated_policy(ARTICLE, "read")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(policy.id(), "article-policy");
        assert_eq!(policy.sources(), ["read-only", "baseline"]);
        assert_eq!(described(policy.rules()), ["specific", "any"]);
    }

    #[tokio::test]
    async fn policies_of_other_entities_are_ignored() {
        let registry = PolicyRegistry::default();
        registry
            .register_policy(Policy::builder(COMMENT).rule(Rule::allow("read")).build())
            .unwrap();

        assert!(registry.build_aggregated_policy(ARTICLE, "read").await.unwrap().is_none());
        assert!(registry.build_aggregated_policy(COMMENT, "read").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn subscribers_contribute_after_static_rules_in_priority_order() {
        let registry = PolicyRegistry::default();
        registry.register_policy(policy("static", "read", "static")).unwrap();

        for (name, priority) in [("low", 1), ("high", 10), ("high-later", 10)] {
            registry
                .register_subscriber(
                    SubscriberRegistration::from_fn(name, ARTICLE, move |_| async move {
                        Ok(Some(vec![Rule::allow("read").description(name).build()]))
                    })
                    .priority(priority),
                )
                .unwrap();
        }

        let policy = registry
            .build_aggregated_policy(ARTICLE, "read")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(described(policy.rules()), ["static", "high", "high-later", "low"]);
        assert_eq!(policy.sources(), ["static", "high", "high-later", "low"]);
        assert_eq!(policy.id(), "article-policy");
    }

    #[tokio::test]
    async fn subscriber_without_opinion_contributes_nothing() {
        let registry = PolicyRegistry::default();
        registry
            .register_subscriber(SubscriberRegistration::from_fn("silent", ARTICLE, |_| async {
                Ok(None)
            }))
            .unwrap();

        assert!(registry.build_aggregated_policy(ARTICLE, "read").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn subscriber_sees_action_and_route() {
        let registry = PolicyRegistry::default();
        registry
            .register_subscriber(SubscriberRegistration::from_fn("routes", ARTICLE, |ctx| async move {
                let rules = if ctx.route() == Some("list") {
                    vec![Rule::deny(ctx.action()).description("no-listing").build()]
                } else {
                    Vec::new()
                };
                Ok(Some(rules))
            }))
            .unwrap();

        let ctx = SubscriberContext::new(ARTICLE, "read").with_route("list");
        let policy = registry.build_aggregated_policy_for(&ctx).await.unwrap().unwrap();

        assert_eq!(described(policy.rules()), ["no-listing"]);
        assert_eq!(policy.rules()[0].effect(), Effect::Deny);
    }

    #[tokio::test]
    async fn failing_subscriber_fails_closed() {
        let registry = PolicyRegistry::default();
        registry.register_policy(policy("static", "read", "static")).unwrap();
        registry
            .register_subscriber(SubscriberRegistration::from_fn("broken", ARTICLE, |_| async {
                Err(anyhow::anyhow!("directory unavailable"))
            }))
            .unwrap();

        let err = registry.build_aggregated_policy(ARTICLE, "read").await.unwrap_err();
        match err {
            DomainError::Hook { hook, stage, reason } => {
                assert_eq!(hook, "broken");
                assert_eq!(stage, HookStage::Subscriber);
                assert_eq!(reason, "directory unavailable");
            }
            other => panic!("expected Hook, got: {other:?}"),
        }
    }

    #[tokio::test]
    #[traced_test]
    async fn failing_subscriber_is_skipped_when_fail_open() {
        let registry = PolicyRegistry::new(DuplicatePolicyStrategy::Overwrite, HookFailureMode::FailOpen);
        registry.register_policy(policy("static", "read", "static")).unwrap();
        registry
            .register_subscriber(SubscriberRegistration::from_fn("broken", ARTICLE, |_| async {
                Err(anyhow::anyhow!("directory unavailable"))
            }))
            .unwrap();

        let policy = registry
            .build_aggregated_policy(ARTICLE, "read")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(policy.id(), "static");
        assert_eq!(policy.sources(), ["static"]);
        assert!(logs_contain("skipping it (fail-open)"));
    }

    #[tokio::test]
    async fn subscribers_run_concurrently() {
        let registry = PolicyRegistry::default();
        let started = Arc::new(AtomicUsize::new(0));

        for name in ["a", "b"] {
            let started = Arc::clone(&started);
            registry
                .register_subscriber(SubscriberRegistration::from_fn(name, ARTICLE, move |_| {
                    let started = Arc::clone(&started);
                    async move {
                        started.fetch_add(1, Ordering::SeqCst);
                        // Each hook waits until both have started.
                        while started.load(Ordering::SeqCst) < 2 {
                            tokio::task::yield_now().await;
                        }
                        Ok(Some(vec![Rule::allow("read").build()]))
                    }
                }))
                .unwrap();
        }

        let policy = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            registry.build_aggregated_policy(ARTICLE, "read"),
        )
        .await
        .expect("subscribers must not run one after another")
        .unwrap()
        .unwrap();

        assert_eq!(policy.rules().len(), 2);
    }

    #[tokio::test]
    async fn blank_entity_is_unresolved() {
        let registry = PolicyRegistry::default();
        let blank = ResourceType::new(" ");

        let err = registry
            .register_policy(Policy::builder(blank).build())
            .unwrap_err();
        assert!(matches!(err, DomainError::UnresolvedEntity { .. }));

        let err = registry.build_aggregated_policy(blank, "read").await.unwrap_err();
        assert!(matches!(err, DomainError::UnresolvedEntity { .. }));
    }

    // ── duplicates ───────────────────────────────────────────────────

    #[tokio::test]
    #[traced_test]
    async fn duplicate_id_overwrites_in_place_with_warning() {
        let registry = PolicyRegistry::default();
        registry.register_policy(policy("dup", "read", "first")).unwrap();
        registry.register_policy(policy("other", "read", "other")).unwrap();
        registry.register_policy(policy("dup", "read", "second")).unwrap();

        let policy = registry
            .build_aggregated_policy(ARTICLE, "read")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(registry.policy_count(&ARTICLE), 2);
        assert_eq!(described(policy.rules()), ["second", "other"]);
        assert!(logs_contain("replacing previous registration"));
    }

    #[test]
    fn duplicate_id_is_rejected_when_configured() {
        let registry = reject_registry();
        registry.register_policy(policy("dup", "read", "first")).unwrap();

        let err = registry.register_policy(policy("dup", "read", "second")).unwrap_err();
        match err {
            DomainError::DuplicatePolicyId { policy_id, entity } => {
                assert_eq!(policy_id, "dup");
                assert_eq!(entity, "Article");
            }
            other => panic!("expected DuplicatePolicyId, got: {other:?}"),
        }
        assert_eq!(registry.policy_count(&ARTICLE), 1);
    }

    #[test]
    fn same_id_for_another_action_is_not_a_duplicate() {
        let registry = reject_registry();
        registry.register_policy(policy("shared", "read", "r")).unwrap();
        registry.register_policy(policy("shared", "update", "u")).unwrap();

        assert_eq!(registry.policy_count(&ARTICLE), 2);
    }

    #[tokio::test]
    async fn duplicate_handling_is_deterministic() {
        for _ in 0..3 {
            let registry = PolicyRegistry::default();
            registry.register_policy(policy("dup", "read", "first")).unwrap();
            registry.register_policy(policy("dup", "read", "second")).unwrap();

            let policy = registry
                .build_aggregated_policy(ARTICLE, "read")
                .await
                .unwrap()
                .unwrap();
            assert_eq!(described(policy.rules()), ["second"]);
        }
    }

    // ── cache and clear ──────────────────────────────────────────────

    #[tokio::test]
    async fn registration_invalidates_cached_aggregate() {
        let registry = PolicyRegistry::default();
        registry.register_policy(policy("p1", "read", "first")).unwrap();

        let before = registry
            .build_aggregated_policy(ARTICLE, "read")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(described(before.rules()), ["first"]);

        registry.register_policy(policy("p2", "read", "second")).unwrap();
        let after = registry
            .build_aggregated_policy(ARTICLE, "read")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(described(after.rules()), ["first", "second"]);
        // Policies handed out earlier are never mutated.
        assert_eq!(described(before.rules()), ["first"]);
    }

    #[tokio::test]
    async fn unknown_actions_and_entities_are_not_cached() {
        let registry = PolicyRegistry::default();
        registry
            .register_policy(Policy::builder(ARTICLE).id("any").rule(Rule::allow("*")).build())
            .unwrap();

        for i in 0..100 {
            let policy = registry
                .build_aggregated_policy(ARTICLE, &format!("action-{i}"))
                .await
                .unwrap();
            assert!(policy.is_some());
            assert!(registry.build_aggregated_policy(COMMENT, "read").await.unwrap().is_none());
        }
        assert_eq!(registry.cache.len(), 0);

        registry.register_policy(policy("p1", "read", "first")).unwrap();
        registry.build_aggregated_policy(ARTICLE, "read").await.unwrap();
        registry.build_aggregated_policy(ARTICLE, "read").await.unwrap();
        assert_eq!(registry.cache.len(), 1);
    }

    #[tokio::test]
    async fn clear_resets_policies_subscribers_and_cache() {
        let registry = PolicyRegistry::default();
        registry.register_policy(policy("p1", "read", "first")).unwrap();
        registry
            .register_subscriber(SubscriberRegistration::from_fn("s", ARTICLE, |_| async {
                Ok(Some(vec![Rule::allow("read").build()]))
            }))
            .unwrap();
        assert!(registry.build_aggregated_policy(ARTICLE, "read").await.unwrap().is_some());

        registry.clear();

        assert_eq!(registry.policy_count(&ARTICLE), 0);
        assert_eq!(registry.subscriber_count(&ARTICLE), 0);
        assert!(registry.build_aggregated_policy(ARTICLE, "read").await.unwrap().is_none());

        registry.register_policy(policy("p2", "read", "fresh")).unwrap();
        let policy = registry
            .build_aggregated_policy(ARTICLE, "read")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(described(policy.rules()), ["fresh"]);
    }

    #[tokio::test]
    async fn concurrent_reads_see_whole_registrations() {
        let registry = Arc::new(PolicyRegistry::default());
        let writer = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move {
                for i in 0..50 {
                    let rules: Vec<Rule> = (0..4)
                        .map(|_| Rule::allow("read").description(format!("p{i}")).build())
                        .collect();
                    registry
                        .register_policy(
                            Policy::builder(ARTICLE)
                                .id(format!("p{i}"))
                                .action("read")
                                .rules(rules)
                                .build(),
                        )
                        .unwrap();
                    tokio::task::yield_now().await;
                }
            })
        };

        for _ in 0..50 {
            if let Some(policy) = registry.build_aggregated_policy(ARTICLE, "read").await.unwrap() {
                assert_eq!(policy.rules().len() % 4, 0);
            }
            tokio::task::yield_now().await;
        }
        writer.await.unwrap();

        let policy = registry
            .build_aggregated_policy(ARTICLE, "read")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(policy.rules().len(), 200);
    }
}
