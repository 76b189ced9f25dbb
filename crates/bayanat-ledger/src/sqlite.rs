//! SQLite implementation of the LedgerBackend trait.
//!
//! A persistent single-node ledger for local deployments and integration
//! tests. Uses rusqlite with bundled SQLite, wrapped in async via
//! tokio::spawn_blocking.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use rusqlite::{params, Connection, OptionalExtension, Transaction};

use bayanat_core::{ActorId, Amount, LedgerAddress, ResourceId, Visibility};

use crate::error::{LedgerError, Result};
use crate::migration::{self, now_millis};
use crate::traits::LedgerBackend;
use crate::types::{
    LockMetadata, MintParams, ModelMetadata, RawStorageInfo, ResourceCore, SourceDataset,
};

/// SQLite-based ledger.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteLedger {
    address: LedgerAddress,
    conn: Arc<Mutex<Connection>>,
}

impl SqliteLedger {
    /// Open a ledger database at the given path, running migrations.
    pub fn open(path: impl AsRef<Path>, address: LedgerAddress) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            address,
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory ledger database.
    pub fn open_memory(address: LedgerAddress) -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            address,
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a blocking closure against the connection on the blocking pool.
    async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| LedgerError::Unavailable(format!("mutex poisoned: {}", e)))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| LedgerError::Unavailable(format!("spawn_blocking failed: {}", e)))?
    }
}

/// Numeric row id for a resource id; `None` if it cannot exist in SQLite.
fn row_id(id: &ResourceId) -> Option<i64> {
    id.as_u64().and_then(|n| i64::try_from(n).ok())
}

fn parse_actor(raw: &str) -> Result<ActorId> {
    ActorId::parse(raw).map_err(|_| LedgerError::InvalidData(format!("bad actor id {:?}", raw)))
}

/// Owner and lock state, the fields every transaction checks.
struct Ownership {
    owner: ActorId,
    visibility: Visibility,
    price: Amount,
    locked: bool,
}

fn load_ownership(tx: &Transaction<'_>, id: &ResourceId) -> Result<Ownership> {
    let not_found = || LedgerError::ResourceNotFound(id.clone());
    let n = row_id(id).ok_or_else(not_found)?;

    let row: Option<(String, i64, i64, bool)> = tx
        .query_row(
            "SELECT owner, visibility, price, encrypted_reference IS NOT NULL
             FROM resources WHERE id = ?1",
            params![n],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )
        .optional()?;
    let (owner, visibility, price, locked) = row.ok_or_else(not_found)?;

    Ok(Ownership {
        owner: parse_actor(&owner)?,
        visibility: decode_visibility(visibility)?,
        price: Amount::from_units(price as u64),
        locked,
    })
}

fn require_owner(tx: &Transaction<'_>, caller: &ActorId, id: &ResourceId) -> Result<Ownership> {
    let ownership = load_ownership(tx, id)?;
    if &ownership.owner != caller {
        return Err(LedgerError::NotOwner {
            resource_id: id.clone(),
            caller: caller.clone(),
        });
    }
    Ok(ownership)
}

fn decode_visibility(raw: i64) -> Result<Visibility> {
    u8::try_from(raw)
        .ok()
        .and_then(Visibility::from_u8)
        .ok_or_else(|| LedgerError::InvalidData(format!("bad visibility {}", raw)))
}

fn is_allowed(conn: &Connection, n: i64, actor: &ActorId) -> Result<bool> {
    let allowed = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM allowlist WHERE resource_id = ?1 AND actor = ?2)",
        params![n, actor.as_str()],
        |row| row.get(0),
    )?;
    Ok(allowed)
}

#[async_trait]
impl LedgerBackend for SqliteLedger {
    fn address(&self) -> LedgerAddress {
        self.address
    }

    async fn get_core(&self, id: &ResourceId) -> Result<ResourceCore> {
        let Some(n) = row_id(id) else {
            return Ok(ResourceCore::empty());
        };

        self.run(move |conn| {
            let row = conn
                .query_row(
                    "SELECT version, owner, price, visibility, balance, downloads, name,
                            description, source_path, source_config, source_split,
                            source_revision, model_name, task_small_id, node_small_id,
                            price_per_million_cu, max_cu
                     FROM resources WHERE id = ?1",
                    params![n],
                    |row| {
                        Ok((
                            row.get::<_, u32>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, i64>(2)?,
                            row.get::<_, i64>(3)?,
                            row.get::<_, i64>(4)?,
                            row.get::<_, i64>(5)?,
                            row.get::<_, String>(6)?,
                            row.get::<_, String>(7)?,
                            SourceDataset {
                                path: row.get(8)?,
                                config: row.get(9)?,
                                split: row.get(10)?,
                                revision: row.get(11)?,
                            },
                            ModelMetadata {
                                name: row.get(12)?,
                                task_small_id: row.get::<_, i64>(13)? as u64,
                                node_small_id: row.get::<_, i64>(14)? as u64,
                                price_per_million_compute_units: row.get::<_, i64>(15)? as u64,
                                max_compute_units: row.get::<_, i64>(16)? as u64,
                            },
                        ))
                    },
                )
                .optional()?;

            let Some((version, owner, price, visibility, balance, downloads, name, description, source, model)) =
                row
            else {
                return Ok(ResourceCore::empty());
            };

            Ok(ResourceCore {
                version,
                owner: parse_actor(&owner)?,
                price: Amount::from_units(price as u64),
                visibility: decode_visibility(visibility)?,
                balance: Amount::from_units(balance as u64),
                downloads: downloads as u64,
                name,
                description,
                source,
                model,
            })
        })
        .await
    }

    async fn get_storage_info(&self, id: &ResourceId) -> Result<RawStorageInfo> {
        let Some(n) = row_id(id) else {
            return Ok(RawStorageInfo::default());
        };

        self.run(move |conn| {
            let row: Option<(Option<Vec<u8>>, Option<Vec<u8>>, i64, i64)> = conn
                .query_row(
                    "SELECT encrypted_reference, data_hash, num_rows, num_tokens
                     FROM resources WHERE id = ?1",
                    params![n],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
                )
                .optional()?;

            match row {
                Some((Some(reference), Some(hash), num_rows, num_tokens)) => Ok(RawStorageInfo {
                    encrypted_reference: Bytes::from(reference),
                    data_hash: Bytes::from(hash),
                    metadata: LockMetadata {
                        num_rows: num_rows as u64,
                        num_tokens: num_tokens as u64,
                    },
                }),
                _ => Ok(RawStorageInfo::default()),
            }
        })
        .await
    }

    async fn can_decrypt(&self, id: &ResourceId, actor: &ActorId) -> Result<bool> {
        let id = id.clone();
        let actor = actor.clone();

        self.run(move |conn| {
            let tx = conn.transaction()?;
            let ownership = load_ownership(&tx, &id)?;
            if !ownership.locked {
                return Ok(false);
            }
            if ownership.owner == actor {
                return Ok(true);
            }
            let n = row_id(&id).ok_or_else(|| LedgerError::ResourceNotFound(id.clone()))?;
            is_allowed(&tx, n, &actor)
        })
        .await
    }

    async fn minted_resources(&self) -> Result<Vec<ResourceId>> {
        self.run(|conn| {
            let mut stmt = conn.prepare("SELECT id FROM resources ORDER BY id")?;
            let ids = stmt
                .query_map([], |row| row.get::<_, i64>(0))?
                .map(|r| r.map(|n| ResourceId::from(n as u64)))
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(ids)
        })
        .await
    }

    async fn mint(&self, caller: &ActorId, params: &MintParams) -> Result<ResourceId> {
        let caller = caller.clone();
        let p = params.clone();

        let n = self
            .run(move |conn| {
                conn.execute(
                    "INSERT INTO resources (
                        owner, price, visibility, name, description,
                        source_path, source_config, source_split, source_revision,
                        model_name, task_small_id, node_small_id, price_per_million_cu, max_cu,
                        created_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                    params![
                        caller.as_str(),
                        p.price.units() as i64,
                        p.visibility.to_u8() as i64,
                        &p.name,
                        &p.description,
                        &p.source.path,
                        &p.source.config,
                        &p.source.split,
                        &p.source.revision,
                        &p.model.name,
                        p.model.task_small_id as i64,
                        p.model.node_small_id as i64,
                        p.model.price_per_million_compute_units as i64,
                        p.model.max_compute_units as i64,
                        now_millis(),
                    ],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await?;

        Ok(ResourceId::from(n as u64))
    }

    async fn lock(
        &self,
        caller: &ActorId,
        id: &ResourceId,
        storage: &RawStorageInfo,
    ) -> Result<()> {
        if storage.is_empty() || storage.data_hash.len() != 32 {
            return Err(LedgerError::InvalidData(
                "storage record needs a ciphertext and a 32-byte hash".into(),
            ));
        }

        let caller = caller.clone();
        let id = id.clone();
        let storage = storage.clone();

        self.run(move |conn| {
            let tx = conn.transaction()?;
            let ownership = require_owner(&tx, &caller, &id)?;
            if ownership.locked {
                return Err(LedgerError::AlreadyLocked(id));
            }

            tx.execute(
                "UPDATE resources SET encrypted_reference = ?1, data_hash = ?2,
                        num_rows = ?3, num_tokens = ?4, locked_at = ?5
                 WHERE id = ?6",
                params![
                    storage.encrypted_reference.as_ref(),
                    storage.data_hash.as_ref(),
                    storage.metadata.num_rows as i64,
                    storage.metadata.num_tokens as i64,
                    now_millis(),
                    row_id(&id),
                ],
            )?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn purchase(&self, caller: &ActorId, id: &ResourceId, payment: Amount) -> Result<()> {
        let caller = caller.clone();
        let id = id.clone();

        self.run(move |conn| {
            let tx = conn.transaction()?;
            let ownership = load_ownership(&tx, &id)?;
            let n = row_id(&id).ok_or_else(|| LedgerError::ResourceNotFound(id.clone()))?;

            if !ownership.locked || ownership.visibility == Visibility::Private {
                return Err(LedgerError::NotForSale(id));
            }
            if ownership.owner == caller || is_allowed(&tx, n, &caller)? {
                return Ok(());
            }
            if payment < ownership.price {
                return Err(LedgerError::InsufficientPayment {
                    resource_id: id,
                    price: ownership.price,
                    offered: payment,
                });
            }

            tx.execute(
                "INSERT INTO allowlist (resource_id, actor, granted_at) VALUES (?1, ?2, ?3)",
                params![n, caller.as_str(), now_millis()],
            )?;
            tx.execute(
                "UPDATE resources SET downloads = downloads + 1, balance = balance + ?1
                 WHERE id = ?2",
                params![ownership.price.units() as i64, n],
            )?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn set_visibility(
        &self,
        caller: &ActorId,
        id: &ResourceId,
        visibility: Visibility,
    ) -> Result<()> {
        let caller = caller.clone();
        let id = id.clone();

        self.run(move |conn| {
            let tx = conn.transaction()?;
            require_owner(&tx, &caller, &id)?;
            tx.execute(
                "UPDATE resources SET visibility = ?1 WHERE id = ?2",
                params![visibility.to_u8() as i64, row_id(&id)],
            )?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn set_price(&self, caller: &ActorId, id: &ResourceId, price: Amount) -> Result<()> {
        let caller = caller.clone();
        let id = id.clone();

        self.run(move |conn| {
            let tx = conn.transaction()?;
            require_owner(&tx, &caller, &id)?;
            tx.execute(
                "UPDATE resources SET price = ?1 WHERE id = ?2",
                params![price.units() as i64, row_id(&id)],
            )?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn revoke(&self, caller: &ActorId, id: &ResourceId, actor: &ActorId) -> Result<()> {
        let caller = caller.clone();
        let id = id.clone();
        let actor = actor.clone();

        self.run(move |conn| {
            let tx = conn.transaction()?;
            require_owner(&tx, &caller, &id)?;
            tx.execute(
                "DELETE FROM allowlist WHERE resource_id = ?1 AND actor = ?2",
                params![row_id(&id), actor.as_str()],
            )?;
            tx.commit()?;
            Ok(())
        })
        .await
    }
}
