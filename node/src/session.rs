//! # Node Session
//!
//! One invocation of the node: open the snapshot store, resume the program
//! from the latest snapshot, run one operation, and commit the next
//! snapshot if it succeeded.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};

use pawn_contracts::{PawnEvent, PawnProgram, ProgramSnapshot};
use pawn_protocol::clock::{Clock, ManualClock, SystemClock};
use pawn_protocol::config::ProtocolConfig;
use pawn_protocol::identity::Address;
use pawn_protocol::ledger::AssetId;
use pawn_protocol::oracle::SupplyOracle;
use pawn_protocol::storage::PawnDB;

/// File name of the config inside the data directory.
pub const CONFIG_FILE: &str = "config.json";

/// Subdirectory holding the sled database.
const DB_DIR: &str = "db";

/// Where a session finds its config and database.
#[derive(Debug, Clone)]
pub struct Paths {
    pub data_dir: PathBuf,
    pub config: PathBuf,
}

impl Paths {
    pub fn new(data_dir: &Path, config: Option<&Path>) -> Self {
        Self {
            data_dir: data_dir.to_path_buf(),
            config: config
                .map(Path::to_path_buf)
                .unwrap_or_else(|| data_dir.join(CONFIG_FILE)),
        }
    }

    fn db(&self) -> PathBuf {
        self.data_dir.join(DB_DIR)
    }
}

fn clock_for(now: Option<i64>) -> Arc<dyn Clock> {
    match now {
        Some(ts) => Arc::new(ManualClock::new(ts)),
        None => Arc::new(SystemClock),
    }
}

/// Writes `config` and commits an empty program as slot 0.
///
/// Refuses to touch a data directory that already has snapshots.
pub fn initialize(paths: &Paths, config: ProtocolConfig) -> Result<u64> {
    config.validate().context("invalid protocol config")?;
    std::fs::create_dir_all(&paths.data_dir).with_context(|| {
        format!(
            "failed to create data directory: {}",
            paths.data_dir.display()
        )
    })?;

    let db = PawnDB::open(paths.db())
        .with_context(|| format!("failed to open database at {}", paths.db().display()))?;
    if db.latest_slot()?.is_some() {
        bail!(
            "data directory {} is already initialized",
            paths.data_dir.display()
        );
    }

    config
        .save(&paths.config)
        .with_context(|| format!("failed to write config to {}", paths.config.display()))?;

    let program = PawnProgram::new(config, clock_for(None), Arc::new(SupplyOracle))?;
    let slot = db.commit_snapshot(&program.snapshot())?;
    tracing::info!(slot, data_dir = %paths.data_dir.display(), "genesis committed");
    Ok(slot)
}

/// A resumed program plus the store it came from.
pub struct Session {
    db: PawnDB,
    program: PawnProgram,
    slot: u64,
}

impl Session {
    /// Resumes the program from the latest snapshot in `paths`.
    ///
    /// The config file must agree with the snapshot's program id; fee and
    /// rent changes in the file take effect from this session on.
    pub fn open(paths: &Paths, now: Option<i64>) -> Result<Self> {
        let config = ProtocolConfig::load(&paths.config)
            .with_context(|| format!("failed to load config {}", paths.config.display()))?;
        let db = PawnDB::open(paths.db())
            .with_context(|| format!("failed to open database at {}", paths.db().display()))?;

        let (slot, mut snapshot) = db
            .latest_snapshot::<ProgramSnapshot>()?
            .ok_or_else(|| anyhow!("no snapshot found, run `pawn-node init` first"))?;

        if snapshot.config.program_id != config.program_id {
            bail!(
                "config program id {} does not match stored program {}",
                config.program_id,
                snapshot.config.program_id
            );
        }
        snapshot.config = config;

        let program = PawnProgram::restore(snapshot, clock_for(now), Arc::new(SupplyOracle))?;
        tracing::debug!(slot, "session opened");
        Ok(Self { db, program, slot })
    }

    pub fn program(&self) -> &PawnProgram {
        &self.program
    }

    /// Slot the session was resumed from.
    pub fn slot(&self) -> u64 {
        self.slot
    }

    /// Persists the program state as the next slot and returns the slot
    /// with the events committed during this session.
    pub fn commit(self) -> Result<(u64, Vec<PawnEvent>)> {
        let slot = self.db.commit_snapshot(&self.program.snapshot())?;
        let events = self.program.drain_events();
        tracing::info!(slot, events = events.len(), "snapshot committed");
        Ok((slot, events))
    }

    /// Resolves an asset given as a hex id or a registered symbol.
    pub fn resolve_asset(&self, asset: &str) -> Result<AssetId> {
        if let Ok(id) = Address::from_hex(asset) {
            if self.program.asset(&id).is_none() {
                bail!("unknown asset {}", id);
            }
            return Ok(id);
        }
        let matches = self.program.assets_by_symbol(asset);
        match matches.as_slice() {
            [] => bail!("no asset with symbol {}", asset),
            [only] => Ok(only.id),
            many => bail!(
                "symbol {} is ambiguous ({} assets), use the asset id",
                asset,
                many.len()
            ),
        }
    }
}
