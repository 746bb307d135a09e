use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use serde_json::Value;
use tokio::fs;
use tracing::warn;

use crate::{
    error::AppError,
    models::snapshot::{self, IncomingSnapshot, Snapshot},
};

const BOARD_FILE: &str = "current_trips.json";

/// Single-slot local mirror of the board. Every commit overwrites the slot;
/// reads tolerate payloads written by older deployments.
#[derive(Clone)]
pub struct CacheService {
    root: Arc<PathBuf>,
}

impl CacheService {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root: Arc::new(root),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn board_path(&self) -> PathBuf {
        self.root().join(BOARD_FILE)
    }

    pub async fn ensure_structure(&self) -> Result<(), AppError> {
        fs::create_dir_all(self.root()).await?;
        Ok(())
    }

    pub async fn load(&self) -> Result<Option<IncomingSnapshot>, AppError> {
        let path = self.board_path();
        if !fs::try_exists(&path).await? {
            return Ok(None);
        }
        let raw = fs::read(&path).await?;
        if raw.is_empty() {
            return Ok(None);
        }
        let value: Value =
            serde_json::from_slice(&raw).map_err(|err| AppError::Other(err.into()))?;
        Ok(snapshot::decode(&value))
    }

    pub async fn store(&self, snapshot: &Snapshot) -> Result<(), AppError> {
        self.ensure_structure().await?;
        let data =
            serde_json::to_vec_pretty(snapshot).map_err(|err| AppError::Other(err.into()))?;
        fs::write(self.board_path(), data).await?;
        Ok(())
    }

    /// Commit-path variant: a cache that cannot be written must never fail
    /// the mutation that produced the snapshot.
    pub async fn store_best_effort(&self, snapshot: &Snapshot) {
        if let Err(err) = self.store(snapshot).await {
            warn!(revision = %snapshot.revision, "local cache write failed: {err}");
        }
    }
}
