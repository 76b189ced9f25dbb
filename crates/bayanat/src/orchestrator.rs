//! The resolution orchestrator.
//!
//! Sequences the ledger, the encryption network and the content store into
//! the two public workflows:
//!
//! - **Lock** (producer): publish the payload, seal its reference under the
//!   resource's access predicate, register the sealed reference.
//! - **Unlock** (consumer): check permission, reopen the reference, fetch
//!   and validate the payload.
//!
//! Steps within a workflow are strictly sequential. Workflows share no
//! mutable state, so any number may run concurrently.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{info, warn};

use bayanat_access::{
    AccessError, DecryptionGateway, EncryptionGateway, EncryptionNetwork, SessionProof,
    SessionSigner,
};
use bayanat_content::{ContentEndpoint, ContentRef, ContentResolver, DatasetPayload, GeneratedRow};
use bayanat_core::{ActorId, Blake3Hash, Clock, ConditionEncoder, Predicate, ResourceId};
use bayanat_ledger::{LedgerBackend, LedgerClient, LockMetadata, ResourceIndex, StorageRecord};

use crate::config::ResolverConfig;
use crate::error::{ResolutionError, Result};
use crate::state::{LockState, Trace, UnlockState};

/// Outcome of a successful lock.
#[derive(Debug, Clone)]
pub struct LockReceipt {
    pub resource_id: ResourceId,
    /// Locator of the published payload.
    pub reference: ContentRef,
    /// Predicate the reference is sealed under.
    pub predicate: Predicate,
    /// Sealed reference as registered on the ledger.
    pub ciphertext: Bytes,
    /// BLAKE3 of the reference.
    pub hash: Blake3Hash,
    pub metadata: LockMetadata,
    pub trace: Trace<LockState>,
}

/// Outcome of a successful unlock.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub resource_id: ResourceId,
    pub actor: ActorId,
    pub reference: ContentRef,
    pub payload: DatasetPayload,
    pub trace: Trace<UnlockState>,
}

enum Source<'a> {
    Payload(&'a DatasetPayload),
    Reference(&'a ContentRef),
}

struct Locked {
    resource_id: ResourceId,
    reference: ContentRef,
    predicate: Predicate,
    ciphertext: Bytes,
    hash: Blake3Hash,
}

struct Unlocked {
    resource_id: ResourceId,
    reference: ContentRef,
    payload: DatasetPayload,
}

fn denied(id: &ResourceId, actor: &ActorId) -> ResolutionError {
    ResolutionError::PermissionDenied(format!("{} may not decrypt resource {}", actor, id))
}

/// Runs lock and unlock workflows.
///
/// # Design Notes
///
/// - **No cached permission**: every unlock asks the ledger, and the
///   network's nodes ask again while decrypting.
/// - **Ledger before network**: the encryption network is not contacted,
///   not even to open a session, until the ledger has granted access.
/// - **Permission before integrity**: when decryption fails its integrity
///   check, the ledger is asked once more. If access was revoked in the
///   meantime the failure is reported as `PermissionDenied`.
/// - **Sessions are the caller's**: an expired proof fails the workflow
///   with `SessionExpired`. Nothing is retried with stale credentials.
pub struct ResolutionOrchestrator<B, N> {
    ledger: LedgerClient<B>,
    network: Arc<N>,
    encryption: EncryptionGateway<N>,
    content: ContentResolver,
    encoder: ConditionEncoder,
    clock: Arc<dyn Clock>,
    config: ResolverConfig,
}

impl<B: LedgerBackend, N: EncryptionNetwork> ResolutionOrchestrator<B, N> {
    /// Create an orchestrator over explicitly constructed collaborators.
    pub fn new(
        backend: Arc<B>,
        network: Arc<N>,
        endpoints: Vec<Arc<dyn ContentEndpoint>>,
        clock: Arc<dyn Clock>,
        config: ResolverConfig,
    ) -> Self {
        Self {
            ledger: LedgerClient::with_retry(backend, config.ledger_retry.clone()),
            encryption: EncryptionGateway::new(network.clone(), config.encryption_retry.clone()),
            network,
            content: ContentResolver::new(endpoints, config.content_retry.clone()),
            encoder: ConditionEncoder::new(config.chain()),
            clock,
            config,
        }
    }

    /// The ledger client.
    pub fn ledger(&self) -> &LedgerClient<B> {
        &self.ledger
    }

    /// The content resolver.
    pub fn content(&self) -> &ContentResolver {
        &self.content
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resource listing using the configured enumeration strategy.
    pub fn index(&self) -> ResourceIndex<B> {
        ResourceIndex::new(self.ledger.clone(), self.config.enumeration)
    }

    /// The access predicate guarding `id` on this ledger.
    pub fn predicate_for(&self, id: &ResourceId) -> Result<Predicate> {
        Ok(self.encoder.build_default(id, self.ledger.address())?)
    }

    /// A decryption gateway acting for `signer`.
    ///
    /// Hosts that resolve several resources in a row can authenticate once
    /// and pass the proof to [`unlock_with_session`](Self::unlock_with_session).
    pub fn decryption_gateway<S: SessionSigner>(&self, signer: S) -> DecryptionGateway<N, S> {
        DecryptionGateway::new(
            self.network.clone(),
            signer,
            self.clock.clone(),
            self.config.session.clone(),
            self.config.encryption_retry.clone(),
        )
    }

    /// Close the encryption network session.
    pub async fn disconnect(&self) -> Result<()> {
        Ok(self.encryption.disconnect().await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lock
    // ─────────────────────────────────────────────────────────────────────────

    /// Publish `payload` and lock it under resource `resource_id`.
    pub async fn lock(
        &self,
        caller: &ActorId,
        resource_id: &str,
        payload: &DatasetPayload,
    ) -> Result<LockReceipt> {
        let metadata = LockMetadata {
            num_rows: payload.rows.len() as u64,
            num_tokens: 0,
        };
        self.run_lock(caller, resource_id, Source::Payload(payload), metadata)
            .await
    }

    /// Shape generated rows into a payload, publish it and lock it.
    ///
    /// The recorded token count is the sum over all rows.
    pub async fn lock_generated(
        &self,
        caller: &ActorId,
        resource_id: &str,
        items: &[GeneratedRow],
        input_feature: &str,
    ) -> Result<LockReceipt> {
        let payload = DatasetPayload::from_generated(items, input_feature)?;
        let metadata = LockMetadata {
            num_rows: items.len() as u64,
            num_tokens: items.iter().map(|item| item.total_tokens).sum(),
        };
        self.run_lock(caller, resource_id, Source::Payload(&payload), metadata)
            .await
    }

    /// Lock a payload that is already in the content store.
    pub async fn lock_reference(
        &self,
        caller: &ActorId,
        resource_id: &str,
        reference: &ContentRef,
        metadata: LockMetadata,
    ) -> Result<LockReceipt> {
        self.run_lock(caller, resource_id, Source::Reference(reference), metadata)
            .await
    }

    async fn run_lock(
        &self,
        caller: &ActorId,
        resource_id: &str,
        source: Source<'_>,
        metadata: LockMetadata,
    ) -> Result<LockReceipt> {
        let mut trace = Trace::start(LockState::Unlocked);
        match self.lock_steps(caller, resource_id, source, metadata, &mut trace).await {
            Ok(locked) => {
                info!(resource = %locked.resource_id, owner = %caller, rows = metadata.num_rows, "resource locked");
                Ok(LockReceipt {
                    resource_id: locked.resource_id,
                    reference: locked.reference,
                    predicate: locked.predicate,
                    ciphertext: locked.ciphertext,
                    hash: locked.hash,
                    metadata,
                    trace,
                })
            }
            Err(e) => {
                trace.advance(LockState::Failed(e.kind()));
                warn!(resource = resource_id, owner = %caller, error = %e, "lock failed");
                Err(e)
            }
        }
    }

    async fn lock_steps(
        &self,
        caller: &ActorId,
        resource_id: &str,
        source: Source<'_>,
        metadata: LockMetadata,
        trace: &mut Trace<LockState>,
    ) -> Result<Locked> {
        let id = ResourceId::parse(resource_id)?;

        // Fail before publishing anything the ledger would refuse.
        let resource = self.ledger.query_resource(&id).await?;
        if &resource.owner != caller {
            return Err(ResolutionError::PermissionDenied(format!(
                "{} does not own resource {}",
                caller, id
            )));
        }
        if resource.is_locked() {
            return Err(ResolutionError::AlreadyLocked(format!(
                "resource {} is already locked",
                id
            )));
        }
        let predicate = self.predicate_for(&id)?;

        let reference = match source {
            Source::Payload(payload) => self.content.publish(payload).await?,
            Source::Reference(reference) => reference.clone(),
        };
        trace.advance(LockState::Published);

        let sealed = self.encryption.encrypt(reference.as_str(), &predicate).await?;
        let record = StorageRecord {
            resource_id: id.clone(),
            ciphertext: sealed.ciphertext.clone(),
            hash: sealed.hash,
            metadata,
        };
        self.ledger.register(caller, &record).await?;
        trace.advance(LockState::Locked);

        Ok(Locked {
            resource_id: id,
            reference,
            predicate,
            ciphertext: sealed.ciphertext,
            hash: sealed.hash,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Unlock
    // ─────────────────────────────────────────────────────────────────────────

    /// Whether `actor` may currently unlock `resource_id`.
    pub async fn check_permission(&self, resource_id: &str, actor: &ActorId) -> Result<bool> {
        let id = ResourceId::parse(resource_id)?;
        Ok(self.ledger.check_permission(&id, actor).await?)
    }

    /// Resolve `resource_id` for `signer`.
    ///
    /// The ledger is asked first; a session is opened only once the actor
    /// is known to be permitted.
    pub async fn unlock<S: SessionSigner>(&self, resource_id: &str, signer: S) -> Result<Resolution> {
        let gateway = self.decryption_gateway(signer);
        let actor = gateway.signer().actor();
        self.run_unlock(resource_id, &gateway, actor, None).await
    }

    /// Resolve `resource_id` for the actor `proof` was issued to.
    pub async fn unlock_with_session<S: SessionSigner>(
        &self,
        resource_id: &str,
        gateway: &DecryptionGateway<N, S>,
        proof: &SessionProof,
    ) -> Result<Resolution> {
        self.run_unlock(resource_id, gateway, proof.actor().clone(), Some(proof))
            .await
    }

    async fn run_unlock<S: SessionSigner>(
        &self,
        resource_id: &str,
        gateway: &DecryptionGateway<N, S>,
        actor: ActorId,
        proof: Option<&SessionProof>,
    ) -> Result<Resolution> {
        let mut trace = Trace::start(UnlockState::PermissionUnknown);

        match self
            .unlock_steps(resource_id, gateway, &actor, proof, &mut trace)
            .await
        {
            Ok(unlocked) => {
                info!(resource = %unlocked.resource_id, actor = %actor, rows = unlocked.payload.rows.len(), "resource unlocked");
                Ok(Resolution {
                    resource_id: unlocked.resource_id,
                    actor,
                    reference: unlocked.reference,
                    payload: unlocked.payload,
                    trace,
                })
            }
            Err(e) => {
                if !trace.current().is_terminal() {
                    trace.advance(UnlockState::Failed(e.kind()));
                }
                warn!(resource = resource_id, actor = %actor, error = %e, "unlock failed");
                Err(e)
            }
        }
    }

    async fn unlock_steps<S: SessionSigner>(
        &self,
        resource_id: &str,
        gateway: &DecryptionGateway<N, S>,
        actor: &ActorId,
        proof: Option<&SessionProof>,
        trace: &mut Trace<UnlockState>,
    ) -> Result<Unlocked> {
        let id = ResourceId::parse(resource_id)?;

        if !self.ledger.check_permission(&id, actor).await? {
            trace.advance(UnlockState::PermissionDenied);
            return Err(denied(&id, actor));
        }
        trace.advance(UnlockState::PermissionGranted);

        let opened;
        let proof = match proof {
            Some(proof) => proof,
            None => {
                opened = gateway.authenticate().await?;
                &opened
            }
        };

        let record = self.ledger.storage_record(&id).await?;
        let predicate = self.predicate_for(&id)?;

        trace.advance(UnlockState::Decrypting);
        let plaintext = match gateway
            .decrypt(&record.ciphertext, &record.hash, &predicate, proof)
            .await
        {
            Ok(plaintext) => plaintext,
            Err(AccessError::PermissionDenied { .. }) => {
                trace.advance(UnlockState::PermissionDenied);
                return Err(denied(&id, actor));
            }
            Err(e @ (AccessError::IntegrityViolation { .. } | AccessError::CorruptCiphertext(_))) => {
                if matches!(self.ledger.check_permission(&id, actor).await, Ok(false)) {
                    warn!(resource = %id, actor = %actor, "access revoked during decryption");
                    trace.advance(UnlockState::PermissionDenied);
                    return Err(denied(&id, actor));
                }
                return Err(e.into());
            }
            Err(e) => return Err(e.into()),
        };
        trace.advance(UnlockState::Decrypted);

        let reference = ContentRef::parse(&plaintext)?;
        let payload = self.content.fetch(&reference).await?;
        trace.advance(UnlockState::ContentFetched);

        Ok(Unlocked {
            resource_id: id,
            reference,
            payload,
        })
    }
}
