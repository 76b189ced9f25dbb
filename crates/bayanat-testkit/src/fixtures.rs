//! Test fixtures and helpers.
//!
//! [`MarketFixture`] wires a complete marketplace in memory: a ledger, an
//! encryption network whose nodes read that ledger, three replicas of a
//! content store, a manual clock and deterministic keypairs.

use std::sync::Arc;
use std::time::Duration;

use bayanat::{ResolutionOrchestrator, ResolverConfig};
use bayanat_access::{LocalNetwork, SessionSigner};
use bayanat_content::{ContentEndpoint, DatasetPayload, GeneratedRow, MemoryEndpoint};
use bayanat_core::{ActorId, Amount, Keypair, LedgerAddress, ManualClock, ResourceId, RetryPolicy};
use bayanat_ledger::{LedgerClient, MemoryLedger, MintParams};

/// Address of the fixture ledger.
pub const LEDGER_ADDRESS: LedgerAddress = LedgerAddress::from_bytes([0x0b; 20]);

/// Initial time of the fixture clock (2025-01-14T16:00:00Z).
pub const START_MILLIS: i64 = 1_736_870_400_000;

/// Network whose nodes evaluate predicates against the fixture ledger.
pub type FixtureNetwork = LocalNetwork<LedgerClient<MemoryLedger>>;

/// Orchestrator over the fixture collaborators.
pub type FixtureOrchestrator = ResolutionOrchestrator<MemoryLedger, FixtureNetwork>;

/// Configuration with millisecond retry delays, so failure paths run fast.
pub fn fast_config() -> ResolverConfig {
    ResolverConfig::default().with_retry(
        RetryPolicy::fixed(Duration::from_millis(1)).with_max_attempts(3),
    )
}

/// A marketplace with one producer and two consumers.
pub struct MarketFixture {
    pub ledger: Arc<MemoryLedger>,
    pub network: Arc<FixtureNetwork>,
    /// Replicas of one content store, in resolver order.
    pub endpoints: Vec<Arc<MemoryEndpoint>>,
    pub clock: ManualClock,
    /// Mints and locks resources.
    pub producer: Keypair,
    /// Purchases access.
    pub buyer: Keypair,
    /// Never granted anything.
    pub stranger: Keypair,
    pub orchestrator: FixtureOrchestrator,
}

impl MarketFixture {
    /// Create a fixture with [`fast_config`].
    pub fn new() -> Self {
        Self::with_config(fast_config())
    }

    /// Create a fixture with the given configuration.
    pub fn with_config(config: ResolverConfig) -> Self {
        let ledger = Arc::new(MemoryLedger::new(LEDGER_ADDRESS));
        let clock = ManualClock::new(START_MILLIS);

        let evaluator = LedgerClient::with_retry(ledger.clone(), config.ledger_retry.clone());
        let network = Arc::new(LocalNetwork::new(
            config.network.clone(),
            Arc::new(evaluator),
            Arc::new(clock.clone()),
        ));

        let primary = MemoryEndpoint::new("primary");
        let endpoints = vec![
            Arc::new(primary.replica("mirror-1")),
            Arc::new(primary.replica("mirror-2")),
            Arc::new(primary),
        ];
        let dyn_endpoints: Vec<Arc<dyn ContentEndpoint>> = endpoints
            .iter()
            .map(|e| e.clone() as Arc<dyn ContentEndpoint>)
            .collect();

        let orchestrator = ResolutionOrchestrator::new(
            ledger.clone(),
            network.clone(),
            dyn_endpoints,
            Arc::new(clock.clone()),
            config,
        );

        Self {
            ledger,
            network,
            endpoints,
            clock,
            producer: Keypair::from_seed(&[0x01; 32]),
            buyer: Keypair::from_seed(&[0x02; 32]),
            stranger: Keypair::from_seed(&[0x03; 32]),
            orchestrator,
        }
    }

    /// Actor id of the producer.
    pub fn producer_id(&self) -> ActorId {
        self.producer.actor()
    }

    /// Mint a public resource owned by the producer.
    pub async fn mint(&self, price: Amount) -> ResourceId {
        self.orchestrator
            .ledger()
            .mint(&self.producer_id(), &MintParams::new("fixture dataset", price))
            .await
            .expect("fixture mint")
    }

    /// Mint until the ledger has assigned id `target`, and return it.
    pub async fn mint_until(&self, target: u64) -> ResourceId {
        loop {
            let id = self.mint(Amount::from_whole(1)).await;
            if id.as_u64() >= Some(target) {
                return id;
            }
        }
    }

    /// Have `buyer` pay the full price of `id`.
    pub async fn purchase(&self, buyer: &Keypair, id: &ResourceId) {
        let ledger = self.orchestrator.ledger();
        let price = ledger.query_price(id).await.expect("fixture price");
        ledger
            .purchase(&buyer.actor(), id, price)
            .await
            .expect("fixture purchase");
    }

    /// Take every content replica offline or bring them back.
    pub fn set_content_online(&self, online: bool) {
        for endpoint in &self.endpoints {
            endpoint.set_online(online);
        }
    }
}

impl Default for MarketFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// `n` generated rows with ten tokens each.
pub fn sample_rows(n: usize) -> Vec<GeneratedRow> {
    (0..n)
        .map(|i| GeneratedRow {
            input: format!("Summarize review #{}", i),
            output: format!("Summary of review #{}", i),
            signature: format!("0x{:0>8x}", i),
            response_hash: format!("0x{:0>8x}", i * 31 + 7),
            total_tokens: 10,
        })
        .collect()
}

/// A payload of `n` sample rows.
pub fn sample_payload(n: usize) -> DatasetPayload {
    DatasetPayload::from_generated(&sample_rows(n), "review").expect("sample rows are valid")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mint_until_reaches_target() {
        let fixture = MarketFixture::new();
        let id = fixture.mint_until(42).await;
        assert_eq!(id.as_str(), "42");
    }

    #[test]
    fn test_keypairs_are_distinct_actors() {
        let fixture = MarketFixture::new();
        assert_ne!(fixture.producer.actor(), fixture.buyer.actor());
        assert_ne!(fixture.buyer.actor(), fixture.stranger.actor());
    }

    #[test]
    fn test_sample_payload_shape() {
        let payload = sample_payload(4);
        assert_eq!(payload.rows.len(), 4);
        assert_eq!(payload.features[0].name, "review");
    }
}
