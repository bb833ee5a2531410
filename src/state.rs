use std::sync::Arc;

use crate::auth::CredentialVerifier;
use crate::config::RelayConfig;
use crate::registry::Registry;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<RelayConfig>,
    pub verifier: CredentialVerifier,
    /// Live connections; created once and kept for the process lifetime
    pub registry: Registry,
}

impl AppState {
    pub fn new(config: RelayConfig) -> Self {
        let mut verifier = CredentialVerifier::new(&config.jwt_secret);
        if let Some(audience) = &config.jwt_audience {
            verifier = verifier.with_audience(audience);
        }
        Self {
            config: Arc::new(config),
            verifier,
            registry: Registry::new(),
        }
    }
}
