//! # PawnDB: Persistent Snapshot Store
//!
//! The persistence layer for a PAWN program instance, built on sled's
//! embedded key-value store.
//!
//! ## Tree Layout
//!
//! | Tree        | Key               | Value               |
//! |-------------|-------------------|---------------------|
//! | `snapshots` | `slot` (8B BE)    | `bincode(snapshot)` |
//! | `metadata`  | key (UTF-8)       | value (bytes)       |
//!
//! Every committed operation produces a new program snapshot under the next
//! slot number. Slots are stored as big-endian u64 so that sled's
//! lexicographic ordering matches numeric ordering, which makes "latest"
//! and range pruning natural.
//!
//! ## Atomicity
//!
//! The snapshot and the `latest_slot` pointer are written in one sled
//! transaction across both trees. A reader either sees the old slot and
//! old snapshot, or the new ones.

use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::{Db, Transactional, Tree};
use std::path::Path;

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

/// Errors that can occur during database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("transaction aborted")]
    Aborted,
}

pub type DbResult<T> = Result<T, DbError>;

// ---------------------------------------------------------------------------
// Metadata Keys
// ---------------------------------------------------------------------------

/// Well-known key in the `metadata` tree for the latest committed slot.
const META_LATEST_SLOT: &[u8] = b"latest_slot";

// ---------------------------------------------------------------------------
// PawnDB
// ---------------------------------------------------------------------------

/// Persistent snapshot storage for a PAWN program.
///
/// Generic over the snapshot type: anything `Serialize` goes in, anything
/// `DeserializeOwned` comes out. The program crate decides what a snapshot
/// contains.
#[derive(Debug, Clone)]
pub struct PawnDB {
    db: Db,
    snapshots: Tree,
    metadata: Tree,
}

impl PawnDB {
    /// Open or create a database at the given filesystem path.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// Create a temporary database removed when the `PawnDB` is dropped.
    pub fn open_temporary() -> DbResult<Self> {
        let config = sled::Config::new().temporary(true);
        let db = config.open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> DbResult<Self> {
        let snapshots = db.open_tree("snapshots")?;
        let metadata = db.open_tree("metadata")?;
        Ok(Self {
            db,
            snapshots,
            metadata,
        })
    }

    // -- Snapshot operations ------------------------------------------------

    /// Persist `snapshot` under the next slot and return that slot.
    ///
    /// The first commit lands in slot 0.
    pub fn commit_snapshot<T: Serialize>(&self, snapshot: &T) -> DbResult<u64> {
        let slot = match self.latest_slot()? {
            Some(latest) => latest + 1,
            None => 0,
        };
        let slot_key = slot.to_be_bytes();
        let bytes =
            bincode::serialize(snapshot).map_err(|e| DbError::Serialization(e.to_string()))?;

        (&self.snapshots, &self.metadata)
            .transaction(|(snapshots, metadata)| {
                snapshots.insert(&slot_key, bytes.as_slice())?;
                metadata.insert(META_LATEST_SLOT, &slot_key)?;
                Ok::<(), ConflictableTransactionError<()>>(())
            })
            .map_err(|e: TransactionError<()>| match e {
                TransactionError::Abort(()) => DbError::Aborted,
                TransactionError::Storage(err) => DbError::Sled(err),
            })?;

        self.db.flush()?;
        tracing::debug!(slot, "snapshot committed");
        Ok(slot)
    }

    /// Load the snapshot stored at `slot`.
    pub fn load_snapshot<T: DeserializeOwned>(&self, slot: u64) -> DbResult<Option<T>> {
        match self.snapshots.get(slot.to_be_bytes())? {
            Some(bytes) => {
                let value: T = bincode::deserialize(&bytes)
                    .map_err(|e| DbError::Serialization(e.to_string()))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Load the most recent snapshot together with its slot.
    pub fn latest_snapshot<T: DeserializeOwned>(&self) -> DbResult<Option<(u64, T)>> {
        match self.latest_slot()? {
            Some(slot) => Ok(self.load_snapshot(slot)?.map(|snapshot| (slot, snapshot))),
            None => Ok(None),
        }
    }

    /// Delete every snapshot older than `keep_from`. Returns how many went.
    pub fn prune_before(&self, keep_from: u64) -> DbResult<usize> {
        let mut removed = 0;
        for entry in self.snapshots.range(..keep_from.to_be_bytes()) {
            let (key, _) = entry?;
            self.snapshots.remove(key)?;
            removed += 1;
        }
        Ok(removed)
    }

    // -- Metadata operations ------------------------------------------------

    /// The latest committed slot, `None` for an empty database.
    pub fn latest_slot(&self) -> DbResult<Option<u64>> {
        match self.metadata.get(META_LATEST_SLOT)? {
            Some(bytes) => {
                let slot = u64::from_be_bytes(
                    bytes
                        .as_ref()
                        .try_into()
                        .map_err(|_| DbError::Serialization("invalid slot bytes".to_string()))?,
                );
                Ok(Some(slot))
            }
            None => Ok(None),
        }
    }

    /// Number of snapshots currently retained.
    pub fn snapshot_count(&self) -> usize {
        self.snapshots.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
