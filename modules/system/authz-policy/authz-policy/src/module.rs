//! `AuthZ` policy module.

use std::sync::{Arc, OnceLock};

use authz_policy_sdk::AuthZPolicyClient;
use tracing::info;

use crate::config::AuthZPolicyConfig;
use crate::domain::{AuthZPolicyLocalClient, PolicyRegistry, Service};

/// `AuthZ` policy module.
///
/// This module:
/// 1. Reads [`AuthZPolicyConfig`]
/// 2. Creates the policy registry and evaluation engine
/// 3. Hands out the in-process [`AuthZPolicyClient`]
///
/// Policies and subscribers are registered through [`Self::registry`]
/// during bootstrap, after `init` and before serving requests.
#[derive(Default)]
pub struct AuthZPolicyModule {
    service: OnceLock<Arc<Service>>,
}

impl AuthZPolicyModule {
    pub const MODULE_NAME: &'static str = "authz-policy";

    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Initialize from a raw configuration value.
    ///
    /// # Errors
    ///
    /// Fails if the configuration does not parse or the module is already
    /// initialized.
    pub fn init_from_value(
        &self,
        raw: serde_json::Value,
    ) -> anyhow::Result<Arc<dyn AuthZPolicyClient>> {
        let cfg: AuthZPolicyConfig = serde_json::from_value(raw)?;
        self.init(&cfg)
    }

    /// Initialize the module.
    ///
    /// # Errors
    ///
    /// Fails if the module is already initialized.
    #[tracing::instrument(skip_all, fields(default_effect = %cfg.default_effect))]
    pub fn init(&self, cfg: &AuthZPolicyConfig) -> anyhow::Result<Arc<dyn AuthZPolicyClient>> {
        info!("Initializing {} module", Self::MODULE_NAME);

        let svc = Arc::new(Service::from_config(cfg));
        self.service
            .set(Arc::clone(&svc))
            .map_err(|_| anyhow::anyhow!("{} module already initialized", Self::MODULE_NAME))?;

        let api: Arc<dyn AuthZPolicyClient> = Arc::new(AuthZPolicyLocalClient::new(svc));

        info!("{} module initialized successfully", Self::MODULE_NAME);
        Ok(api)
    }

    /// The registry, once initialized.
    #[must_use]
    pub fn registry(&self) -> Option<&Arc<PolicyRegistry>> {
        self.service.get().map(|svc| svc.registry())
    }
}
