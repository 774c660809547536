//! `AuthZ` Policy Module
//!
//! This module hosts the policy registry and the rule evaluation engine.
//! Static policies and subscriber hooks are registered at bootstrap;
//! on each request the registry aggregates one policy per
//! (entity, action) and the engine turns it into a `Decision`.
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod config;
pub mod domain;
pub mod module;

pub use config::{AuthZPolicyConfig, DuplicatePolicyStrategy, HookFailureMode};
pub use domain::{AuthZPolicyLocalClient, PolicyEngine, PolicyRegistry, Service};
pub use module::AuthZPolicyModule;
