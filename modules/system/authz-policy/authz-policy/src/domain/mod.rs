//! Domain layer for the `AuthZ` policy engine.

pub mod engine;
pub mod error;
pub mod local_client;
pub mod registry;
pub mod service;

pub use engine::{PolicyEngine, evaluation_order};
pub use error::DomainError;
pub use local_client::AuthZPolicyLocalClient;
pub use registry::PolicyRegistry;
pub use service::Service;
