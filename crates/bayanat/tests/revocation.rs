//! Access revoked while a decryption is in flight.
//!
//! The network below wraps the fixture network and changes ledger state or
//! the returned plaintext around the real decryption, so the orchestrator
//! sees the races a live deployment can produce.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use bayanat::access::{DecryptRequest, EncryptionNetwork, Result as AccessResult};
use bayanat::content::ContentEndpoint;
use bayanat::core::{Amount, ResourceId};
use bayanat::ledger::{LedgerClient, MemoryLedger};
use bayanat::{ErrorKind, ResolutionOrchestrator, SessionSigner};
use bayanat_testkit::{fast_config, sample_payload, FixtureNetwork, MarketFixture};

#[derive(Clone, Copy)]
enum Race {
    /// Revoked before the nodes evaluate the predicate.
    Revoke,
    /// Revoked after the nodes approved, with a damaged result.
    RevokeAndTamper,
    /// Still permitted, but the result is damaged.
    Tamper,
}

struct RacingNetwork {
    inner: Arc<FixtureNetwork>,
    ledger: LedgerClient<MemoryLedger>,
    resource: ResourceId,
    owner: bayanat::ActorId,
    race: Race,
}

impl RacingNetwork {
    async fn revoke(&self, request: &DecryptRequest) {
        self.ledger
            .revoke(&self.owner, &self.resource, request.proof.actor())
            .await
            .unwrap();
    }
}

#[async_trait]
impl EncryptionNetwork for RacingNetwork {
    fn network_id(&self) -> &str {
        self.inner.network_id()
    }

    fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }

    async fn connect(&self) -> AccessResult<()> {
        self.inner.connect().await
    }

    async fn disconnect(&self) -> AccessResult<()> {
        self.inner.disconnect().await
    }

    async fn latest_nonce(&self) -> AccessResult<String> {
        self.inner.latest_nonce().await
    }

    async fn encrypt(&self, plaintext: &[u8], predicate: &[u8]) -> AccessResult<Bytes> {
        self.inner.encrypt(plaintext, predicate).await
    }

    async fn decrypt(&self, request: &DecryptRequest) -> AccessResult<Vec<u8>> {
        match self.race {
            Race::Revoke => {
                self.revoke(request).await;
                self.inner.decrypt(request).await
            }
            Race::RevokeAndTamper => {
                let mut plaintext = self.inner.decrypt(request).await?;
                self.revoke(request).await;
                plaintext.push(b'!');
                Ok(plaintext)
            }
            Race::Tamper => {
                let mut plaintext = self.inner.decrypt(request).await?;
                plaintext.push(b'!');
                Ok(plaintext)
            }
        }
    }
}

/// Lock a resource, sell it to the buyer, then unlock it as the buyer
/// through a network running `race`.
async fn unlock_during(race: Race) -> (MarketFixture, bayanat::Result<bayanat::Resolution>) {
    let fx = MarketFixture::new();
    let id = fx.mint(Amount::from_whole(3)).await;
    fx.orchestrator
        .lock(&fx.producer_id(), id.as_str(), &sample_payload(2))
        .await
        .unwrap();
    fx.purchase(&fx.buyer, &id).await;

    let result = {
        let network = Arc::new(RacingNetwork {
            inner: fx.network.clone(),
            ledger: LedgerClient::new(fx.ledger.clone()),
            resource: id.clone(),
            owner: fx.producer_id(),
            race,
        });
        let endpoints: Vec<Arc<dyn ContentEndpoint>> = fx
            .endpoints
            .iter()
            .map(|e| e.clone() as Arc<dyn ContentEndpoint>)
            .collect();
        let racing = ResolutionOrchestrator::new(
            fx.ledger.clone(),
            network,
            endpoints,
            Arc::new(fx.clock.clone()),
            fast_config(),
        );

        let gateway = racing.decryption_gateway(&fx.buyer);
        let proof = gateway.authenticate().await.unwrap();
        assert_eq!(proof.actor(), &fx.buyer.actor());

        let result = racing
            .unlock_with_session(id.as_str(), &gateway, &proof)
            .await;
        result
    };
    (fx, result)
}

#[tokio::test]
async fn test_revoked_before_evaluation_is_denied() {
    let (fx, result) = unlock_during(Race::Revoke).await;
    let err = result.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);

    let id = ResourceId::parse("1").unwrap();
    assert!(!fx
        .orchestrator
        .ledger()
        .check_permission(&id, &fx.buyer.actor())
        .await
        .unwrap());
}

#[tokio::test]
async fn test_revocation_outranks_integrity_failure() {
    let (_, result) = unlock_during(Race::RevokeAndTamper).await;
    assert_eq!(result.unwrap_err().kind(), ErrorKind::PermissionDenied);
}

#[tokio::test]
async fn test_tampered_result_is_integrity_violation() {
    let (fx, result) = unlock_during(Race::Tamper).await;
    assert_eq!(result.unwrap_err().kind(), ErrorKind::IntegrityViolation);

    // The buyer keeps access; an untampered unlock still succeeds.
    let resolution = fx
        .orchestrator
        .unlock("1", &fx.buyer)
        .await
        .unwrap();
    assert_eq!(resolution.payload.rows.len(), 2);
}
