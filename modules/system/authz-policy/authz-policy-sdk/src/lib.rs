#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! `AuthZ` Policy SDK
//!
//! This crate provides the public API for the `authz_policy` module:
//!
//! - [`AuthZPolicyClient`] - Public API trait for consumers
//! - [`Rule`], [`Policy`] - Declarative policy building blocks
//! - [`PolicySubscriber`], [`SubscriberRegistration`] - Dynamic policy contributions
//! - [`Decision`] - Evaluation result plus resource/transform utilities
//! - [`AuthZPolicyError`] - Error types
//! - [`pep`] - PEP helpers ([`PolicyEnforcer`])
//!
//! ## Usage
//!
//! ```ignore
//! use authz_policy_sdk::{Policy, ResourceType, Rule, pep::PolicyEnforcer};
//! use authz_security::ScopeFilter;
//!
//! const ARTICLE: ResourceType = ResourceType {
//!     name: "Article",
//!     supported_properties: &["id", "tenant_id", "author_id"],
//! };
//!
//! // Bootstrap: declare and register policies
//! registry.register_policy(
//!     Policy::builder(ARTICLE)
//!         .action("read")
//!         .rule(Rule::allow("read").scope(|ctx| {
//!             let tenant = ctx.subject().attribute("tenant_id")?.clone();
//!             Some(ScopeFilter::new().with("tenant_id", tenant).into())
//!         }))
//!         .build(),
//! )?;
//!
//! // Request path: guard, then narrow the query, then shape the response
//! let enforcer = PolicyEnforcer::new(authz);
//! let decision = enforcer.authorize(subject, &ARTICLE, "read").await?;
//! let rows = repo.find(decision.scope()).await?;
//! let body = decision.apply_transforms(serde_json::to_value(rows)?).await?;
//! ```

pub mod api;
pub mod decision;
pub mod error;
pub mod models;
pub mod pep;
pub mod policy;
pub mod rule;
pub mod subscriber;

// Re-export main types at crate root
pub use api::AuthZPolicyClient;
pub use decision::{
    AuthzMetadata, DECISION_METADATA_KEY, Decision, attach_resource, resolve_from_extensions,
    resolve_from_request, store_in_request,
};
pub use error::{AuthZPolicyError, HookStage};
pub use models::{ANY_ACTION, Effect, EvaluationRequest, ResourceType, action_matches};
pub use pep::{AccessRequest, EnforcerError, IntoResourceValue, PolicyEnforcer};
pub use policy::{Policy, PolicyBuilder};
pub use rule::{
    Condition, HookFuture, ResultTransform, Rule, RuleBuilder, RuleContext, ScopeResolver,
};
pub use subscriber::{PolicySubscriber, SubscriberContext, SubscriberRegistration};

pub use authz_security::{Scope, ScopeFilter, Subject, merge_scopes};
