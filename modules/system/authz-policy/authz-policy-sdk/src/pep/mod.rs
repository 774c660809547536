//! PEP (Policy Enforcement Point) helpers.
//!
//! - [`PolicyEnforcer`] — PEP object (aggregate → evaluate → allow/deny)
//! - [`AccessRequest`] — per-request resource and route
//! - [`IntoResourceValue`] — Convert typed resources into `serde_json::Value`

use serde::Serialize;
use serde_json::Value;

pub mod enforcer;

pub use enforcer::{AccessRequest, EnforcerError, PolicyEnforcer};

/// Trait for types that can be handed to rules as the loaded resource.
///
/// Rules read resources as JSON so they stay independent of the storage
/// model. Any `Serialize` type converts.
pub trait IntoResourceValue {
    /// Convert into a `serde_json::Value` for rule contexts.
    ///
    /// # Errors
    ///
    /// Returns the serializer's error if the resource cannot be represented
    /// as JSON.
    fn into_resource_value(self) -> Result<Value, serde_json::Error>;
}

impl IntoResourceValue for Value {
    #[inline]
    fn into_resource_value(self) -> Result<Value, serde_json::Error> {
        Ok(self)
    }
}

impl<T: Serialize> IntoResourceValue for &T {
    #[inline]
    fn into_resource_value(self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}
