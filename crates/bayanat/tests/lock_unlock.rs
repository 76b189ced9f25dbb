//! End-to-end lock and unlock workflows over the in-memory marketplace.

use std::time::Duration;

use bayanat::access::EncryptionNetwork;
use bayanat::content::ContentEndpoint;
use bayanat::core::{ActorId, Amount, Blake3Hash, Visibility};
use bayanat::ledger::{LockMetadata, MintParams};
use bayanat::{ContentRef, ErrorKind, LockState, SessionSigner, UnlockState};
use bayanat_testkit::{sample_payload, sample_rows, MarketFixture};
use bytes::Bytes;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn metadata(rows: u64) -> LockMetadata {
    LockMetadata {
        num_rows: rows,
        num_tokens: rows * 10,
    }
}

#[tokio::test]
async fn test_owner_resolves_resource_42() {
    init_tracing();
    let fx = MarketFixture::new();
    let id = fx.mint_until(42).await;
    assert_eq!(id.as_str(), "42");

    let payload = sample_payload(3);
    let reference = ContentRef::parse("cid:bafy123").unwrap();
    fx.orchestrator
        .content()
        .publish_at(&reference, &payload)
        .await
        .unwrap();

    let owner = fx.producer_id();
    let receipt = fx
        .orchestrator
        .lock_reference(&owner, "42", &reference, metadata(3))
        .await
        .unwrap();
    assert_eq!(receipt.hash, Blake3Hash::hash(b"cid:bafy123"));
    assert_eq!(
        receipt.trace.states(),
        [LockState::Unlocked, LockState::Published, LockState::Locked]
    );

    assert!(fx.orchestrator.check_permission("42", &owner).await.unwrap());

    let resolution = fx.orchestrator.unlock("42", &fx.producer).await.unwrap();
    assert_eq!(resolution.reference.as_str(), "cid:bafy123");
    assert_eq!(resolution.payload, payload);
    assert_eq!(resolution.actor, owner);
    assert_eq!(
        resolution.trace.states(),
        [
            UnlockState::PermissionUnknown,
            UnlockState::PermissionGranted,
            UnlockState::Decrypting,
            UnlockState::Decrypted,
            UnlockState::ContentFetched,
        ]
    );
}

#[tokio::test]
async fn test_never_granted_actor_short_circuits() {
    let fx = MarketFixture::new();
    let id = fx.mint(Amount::from_whole(5)).await;
    fx.orchestrator
        .lock(&fx.producer_id(), id.as_str(), &sample_payload(2))
        .await
        .unwrap();

    assert!(!fx
        .orchestrator
        .check_permission(id.as_str(), &fx.stranger.actor())
        .await
        .unwrap());

    let before = fx.ledger.permission_checks();
    let err = fx
        .orchestrator
        .unlock(id.as_str(), &fx.stranger)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    // One check by the orchestrator; the network's nodes were never asked.
    assert_eq!(fx.ledger.permission_checks() - before, 1);
}

#[tokio::test]
async fn test_permission_is_checked_before_the_network() {
    let fx = MarketFixture::new();
    let id = fx.mint(Amount::ZERO).await;
    fx.orchestrator
        .lock(&fx.producer_id(), id.as_str(), &sample_payload(1))
        .await
        .unwrap();

    fx.network.disconnect().await.unwrap();
    fx.network.fail_next_connects(100);

    let err = fx
        .orchestrator
        .unlock(id.as_str(), &fx.stranger)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    assert!(!fx.network.is_connected());

    // A permitted actor does reach the network, and finds it down.
    let err = fx
        .orchestrator
        .unlock(id.as_str(), &fx.producer)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EncryptionUnavailable);

    fx.network.fail_next_connects(0);
    let resolution = fx.orchestrator.unlock(id.as_str(), &fx.producer).await.unwrap();
    assert_eq!(resolution.payload.rows.len(), 1);
}

#[tokio::test]
async fn test_literal_actor_ids() {
    let fx = MarketFixture::new();
    let a = ActorId::parse("0xA").unwrap();
    let b = ActorId::parse("0xB").unwrap();
    let id = fx
        .orchestrator
        .ledger()
        .mint(&a, &MintParams::new("reviews", Amount::ZERO))
        .await
        .unwrap();

    fx.orchestrator
        .lock(&a, id.as_str(), &sample_payload(1))
        .await
        .unwrap();

    assert!(fx.orchestrator.check_permission(id.as_str(), &a).await.unwrap());
    assert!(!fx.orchestrator.check_permission(id.as_str(), &b).await.unwrap());
}

#[tokio::test]
async fn test_buyer_gains_access_by_purchase() {
    let fx = MarketFixture::new();
    let id = fx.mint(Amount::from_whole(5)).await;
    let payload = sample_payload(4);
    fx.orchestrator
        .lock(&fx.producer_id(), id.as_str(), &payload)
        .await
        .unwrap();

    let err = fx.orchestrator.unlock(id.as_str(), &fx.buyer).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);

    fx.purchase(&fx.buyer, &id).await;
    let resolution = fx.orchestrator.unlock(id.as_str(), &fx.buyer).await.unwrap();
    assert_eq!(resolution.payload, payload);
}

#[tokio::test]
async fn test_second_lock_is_refused_and_record_kept() {
    let fx = MarketFixture::new();
    let id = fx.mint(Amount::ZERO).await;
    let owner = fx.producer_id();
    let first = fx
        .orchestrator
        .lock(&owner, id.as_str(), &sample_payload(2))
        .await
        .unwrap();
    let stored = fx.orchestrator.ledger().storage_record(&id).await.unwrap();

    let err = fx
        .orchestrator
        .lock(&owner, id.as_str(), &sample_payload(5))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyLocked);
    assert_eq!(fx.orchestrator.ledger().storage_record(&id).await.unwrap(), stored);

    let resolution = fx.orchestrator.unlock(id.as_str(), &fx.producer).await.unwrap();
    assert_eq!(resolution.reference, first.reference);
    assert_eq!(resolution.payload.rows.len(), 2);
}

#[tokio::test]
async fn test_only_owner_may_lock() {
    let fx = MarketFixture::new();
    let id = fx.mint(Amount::ZERO).await;

    let err = fx
        .orchestrator
        .lock(&fx.buyer.actor(), id.as_str(), &sample_payload(1))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);

    let requests: u64 = fx.endpoints.iter().map(|e| e.requests()).sum();
    assert_eq!(requests, 0, "nothing is published for a refused lock");
}

#[tokio::test]
async fn test_invalid_and_unknown_resources() {
    let fx = MarketFixture::new();
    let owner = fx.producer_id();

    for bad in ["", "abc", "-1", "007", "4 2"] {
        let err = fx
            .orchestrator
            .lock(&owner, bad, &sample_payload(1))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidResourceId, "{:?}", bad);

        let err = fx.orchestrator.unlock(bad, &fx.producer).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidResourceId, "{:?}", bad);
    }

    let err = fx
        .orchestrator
        .lock(&owner, "999", &sample_payload(1))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ResourceNotFound);

    let err = fx.orchestrator.unlock("999", &fx.producer).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ResourceNotFound);
}

#[tokio::test]
async fn test_missing_rows_is_schema_violation() {
    let fx = MarketFixture::new();
    let id = fx.mint(Amount::ZERO).await;

    let reference = ContentRef::parse("cid:bafyrowless").unwrap();
    fx.endpoints[0].corrupt(
        &reference,
        Bytes::from_static(
            br#"{"features":[{"feature_idx":0,"name":"input","type":{"dtype":"string","_type":"Value"}}]}"#,
        ),
    );
    fx.orchestrator
        .lock_reference(&fx.producer_id(), id.as_str(), &reference, metadata(0))
        .await
        .unwrap();

    let err = fx.orchestrator.unlock(id.as_str(), &fx.producer).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SchemaViolation);
}

#[tokio::test]
async fn test_expired_session_requires_fresh_proof() {
    let fx = MarketFixture::new();
    let id = fx.mint(Amount::ZERO).await;
    fx.orchestrator
        .lock(&fx.producer_id(), id.as_str(), &sample_payload(1))
        .await
        .unwrap();

    let gateway = fx.orchestrator.decryption_gateway(&fx.producer);
    let proof = gateway.authenticate().await.unwrap();
    fx.clock.advance(Duration::from_secs(11 * 60).as_millis() as i64);

    let err = fx
        .orchestrator
        .unlock_with_session(id.as_str(), &gateway, &proof)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SessionExpired);

    let fresh = gateway.authenticate().await.unwrap();
    assert!(fx
        .orchestrator
        .unlock_with_session(id.as_str(), &gateway, &fresh)
        .await
        .is_ok());
}

#[tokio::test]
async fn test_one_session_resolves_many_resources() {
    let fx = MarketFixture::new();
    let owner = fx.producer_id();
    let mut ids = Vec::new();
    for rows in 1..=3 {
        let id = fx.mint(Amount::ZERO).await;
        fx.orchestrator
            .lock(&owner, id.as_str(), &sample_payload(rows))
            .await
            .unwrap();
        ids.push((id, rows));
    }

    let gateway = fx.orchestrator.decryption_gateway(&fx.producer);
    let proof = gateway.authenticate().await.unwrap();
    for (id, rows) in ids {
        let resolution = fx
            .orchestrator
            .unlock_with_session(id.as_str(), &gateway, &proof)
            .await
            .unwrap();
        assert_eq!(resolution.payload.rows.len(), rows);
    }
}

#[tokio::test]
async fn test_lock_generated_records_usage() {
    let fx = MarketFixture::new();
    let id = fx.mint(Amount::ZERO).await;

    let receipt = fx
        .orchestrator
        .lock_generated(&fx.producer_id(), id.as_str(), &sample_rows(6), "")
        .await
        .unwrap();
    assert_eq!(
        receipt.metadata,
        LockMetadata {
            num_rows: 6,
            num_tokens: 60,
        }
    );

    let resource = fx.orchestrator.ledger().query_resource(&id).await.unwrap();
    assert_eq!(resource.locked, Some(receipt.metadata));

    let resolution = fx.orchestrator.unlock(id.as_str(), &fx.producer).await.unwrap();
    assert_eq!(resolution.payload.features[0].name, "input");
    assert_eq!(resolution.payload.rows[5].row["input"], "Summarize review #5");
}

#[tokio::test]
async fn test_unavailable_collaborators() {
    let fx = MarketFixture::new();
    let id = fx.mint(Amount::ZERO).await;
    let owner = fx.producer_id();

    fx.network.fail_next_connects(3);
    let err = fx
        .orchestrator
        .lock(&owner, id.as_str(), &sample_payload(1))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EncryptionUnavailable);
    assert!(err.kind().is_transient());

    // Nothing was registered, so the producer can simply try again.
    fx.orchestrator
        .lock(&owner, id.as_str(), &sample_payload(1))
        .await
        .unwrap();

    fx.set_content_online(false);
    let err = fx.orchestrator.unlock(id.as_str(), &fx.producer).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ContentUnavailable);
    fx.set_content_online(true);

    fx.ledger.set_available(false);
    let err = fx
        .orchestrator
        .check_permission(id.as_str(), &owner)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::LedgerUnavailable);
}

#[tokio::test]
async fn test_single_replica_outage_is_tolerated() {
    let fx = MarketFixture::new();
    let id = fx.mint(Amount::ZERO).await;
    fx.orchestrator
        .lock(&fx.producer_id(), id.as_str(), &sample_payload(2))
        .await
        .unwrap();

    fx.endpoints[0].set_online(false);
    assert!(fx.orchestrator.unlock(id.as_str(), &fx.producer).await.is_ok());
}

#[tokio::test]
async fn test_listing_shows_public_locked_resources() {
    let fx = MarketFixture::new();
    let owner = fx.producer_id();
    let listed = fx.mint(Amount::ZERO).await;
    let private = fx.mint(Amount::ZERO).await;
    let _unlocked = fx.mint(Amount::ZERO).await;

    for id in [&listed, &private] {
        fx.orchestrator
            .lock(&owner, id.as_str(), &sample_payload(1))
            .await
            .unwrap();
    }
    fx.orchestrator
        .ledger()
        .set_visibility(&owner, &private, Visibility::Private)
        .await
        .unwrap();

    let index = fx.orchestrator.index();
    let ids: Vec<_> = index.locked().await.unwrap().into_iter().map(|r| r.id).collect();
    assert_eq!(ids, [listed]);
    assert_eq!(index.owned_by(&owner).await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_endpoints_are_shared_replicas() {
    let fx = MarketFixture::new();
    let payload = sample_payload(1);
    let reference = fx.orchestrator.content().publish(&payload).await.unwrap();

    for endpoint in &fx.endpoints {
        assert!(endpoint.get(&reference).await.is_ok(), "{}", endpoint.name());
    }
}
