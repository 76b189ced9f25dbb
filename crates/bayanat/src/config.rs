//! Orchestrator configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use bayanat_access::{NetworkConfig, SessionConfig};
use bayanat_core::RetryPolicy;
use bayanat_ledger::Enumeration;

/// Configuration for a [`ResolutionOrchestrator`](crate::ResolutionOrchestrator).
///
/// Each collaborator gets its own retry budget. Predicates are built for
/// `network.chain` against the address the ledger backend reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Retries for ledger reads and writes.
    pub ledger_retry: RetryPolicy,
    /// Retries for connecting to and calling the encryption network.
    pub encryption_retry: RetryPolicy,
    /// Retries across content endpoints. At least one attempt per endpoint
    /// is needed to tolerate any single endpoint being down.
    pub content_retry: RetryPolicy,
    /// Decryption session parameters.
    pub session: SessionConfig,
    /// Encryption network parameters.
    pub network: NetworkConfig,
    /// How resources are enumerated.
    pub enumeration: Enumeration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            ledger_retry: RetryPolicy::exponential(),
            encryption_retry: RetryPolicy::exponential(),
            content_retry: RetryPolicy::exponential()
                .with_max_attempts(6)
                .with_initial_delay(Duration::from_millis(200)),
            session: SessionConfig::default(),
            network: NetworkConfig::default(),
            enumeration: Enumeration::default(),
        }
    }
}

impl ResolverConfig {
    /// Set the ledger retry policy.
    pub fn with_ledger_retry(mut self, retry: RetryPolicy) -> Self {
        self.ledger_retry = retry;
        self
    }

    /// Set the encryption network retry policy.
    pub fn with_encryption_retry(mut self, retry: RetryPolicy) -> Self {
        self.encryption_retry = retry;
        self
    }

    /// Set the content endpoint retry policy.
    pub fn with_content_retry(mut self, retry: RetryPolicy) -> Self {
        self.content_retry = retry;
        self
    }

    /// Use `retry` for every collaborator.
    pub fn with_retry(self, retry: RetryPolicy) -> Self {
        self.with_ledger_retry(retry.clone())
            .with_encryption_retry(retry.clone())
            .with_content_retry(retry)
    }

    /// Set the session parameters.
    pub fn with_session(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }

    /// Set the network parameters.
    pub fn with_network(mut self, network: NetworkConfig) -> Self {
        self.network = network;
        self
    }

    /// Set the enumeration strategy.
    pub fn with_enumeration(mut self, enumeration: Enumeration) -> Self {
        self.enumeration = enumeration;
        self
    }

    /// Chain predicates are built for.
    pub fn chain(&self) -> &str {
        &self.network.chain
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bayanat_ledger::ScanConfig;

    #[test]
    fn test_defaults() {
        let config = ResolverConfig::default();
        assert_eq!(config.chain(), "filecoinCalibrationTestnet");
        assert_eq!(config.network.network_id, "datil-dev");
        assert_eq!(config.session.effective_ttl(), Duration::from_secs(600));
        assert_eq!(config.enumeration, Enumeration::EventIndex);
        assert!(config.content_retry.attempts() >= 3);
    }

    #[test]
    fn test_builder() {
        let scan = ScanConfig {
            start: 1,
            max_id: 50,
            miss_limit: 3,
        };
        let config = ResolverConfig::default()
            .with_retry(RetryPolicy::no_retry())
            .with_enumeration(Enumeration::Scan(scan));

        assert_eq!(config.ledger_retry.attempts(), 1);
        assert_eq!(config.content_retry.attempts(), 1);
        assert_eq!(config.enumeration, Enumeration::Scan(scan));
    }

    #[test]
    fn test_loads_from_json() {
        let config = ResolverConfig::default()
            .with_network(NetworkConfig::default().with_quorum(3, 5))
            .with_enumeration(Enumeration::Scan(ScanConfig::default()));

        let json = serde_json::to_string(&config).unwrap();
        let loaded: ResolverConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.network.effective_threshold(), 3);
    }
}
