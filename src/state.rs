use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use tokio::sync::{RwLock, RwLockWriteGuard};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    board::Board,
    config::AppConfig,
    events::{BoardEvent, BoardEvents, ChangeOrigin},
    models::snapshot::{IncomingSnapshot, Snapshot},
    services::{cache::CacheService, sync::SyncService},
};

const EVENT_CAPACITY: usize = 64;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub board: Arc<RwLock<Board>>,
    pub cache: CacheService,
    pub sync: SyncService,
    pub events: BoardEvents,
    commit_seq: Arc<AtomicU64>,
}

impl AppState {
    pub fn new(config: AppConfig, cache: CacheService, sync: SyncService) -> Self {
        Self {
            config,
            board: Arc::new(RwLock::new(Board::new())),
            cache,
            sync,
            events: BoardEvents::new(EVENT_CAPACITY),
            commit_seq: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Fills the board at startup: the remote store when it is reachable
    /// and has data, the local cache otherwise. A remote result is mirrored
    /// into the cache so the next offline start sees the same board.
    pub async fn seed(&self) {
        if self.sync.is_active() {
            if let Some(incoming) = self.sync.fetch().await {
                if !incoming.trips.is_empty() {
                    let snapshot = self.install(incoming, ChangeOrigin::Remote).await;
                    info!(trips = snapshot.trips.len(), "board loaded from remote store");
                    return;
                }
            }
        }
        match self.cache.load().await {
            Ok(Some(incoming)) if !incoming.trips.is_empty() => {
                let snapshot = self.install(incoming, ChangeOrigin::Cache).await;
                info!(trips = snapshot.trips.len(), "board restored from local cache");
            }
            Ok(_) => info!("starting with an empty board"),
            Err(err) => warn!("local cache unreadable, starting empty: {err}"),
        }
    }

    /// Commit path for local mutations. Takes the board write lock from
    /// the caller: the snapshot reaches the local cache before the lock is
    /// released, so concurrent commits land in the cache in board order.
    /// The push to the remote store follows in the background, kept in the
    /// same order by its commit number.
    pub async fn publish_local(&self, board: RwLockWriteGuard<'_, Board>) {
        let snapshot = Snapshot::new(board.trips().to_vec());
        self.cache.store_best_effort(&snapshot).await;
        let seq = self.commit_seq.fetch_add(1, Ordering::SeqCst) + 1;
        drop(board);
        self.events
            .emit(BoardEvent::for_snapshot(ChangeOrigin::Local, &snapshot));
        let sync = self.sync.clone();
        tokio::spawn(async move {
            sync.push_ordered(seq, &snapshot).await;
        });
    }

    /// Applies a snapshot arriving over the subscription. Last snapshot
    /// wins; echoes of this session's own pushes are dropped.
    pub async fn apply_remote(&self, incoming: IncomingSnapshot) {
        if let Some(revision) = incoming.revision.as_deref() {
            if self.sync.is_own_revision(revision).await {
                debug!(%revision, "ignoring echo of our own snapshot");
                return;
            }
        }
        let snapshot = self.install(incoming, ChangeOrigin::Remote).await;
        debug!(trips = snapshot.trips.len(), "applied snapshot from remote store");
    }

    /// Replaces the board and mirrors the result into the local cache
    /// while the write lock is still held, same ordering rule as
    /// `publish_local`.
    async fn install(&self, incoming: IncomingSnapshot, origin: ChangeOrigin) -> Snapshot {
        let snapshot = {
            let mut board = self.board.write().await;
            board.replace(incoming.trips);
            let snapshot = Snapshot::with_revision(
                incoming.revision.unwrap_or_else(|| Uuid::new_v4().to_string()),
                board.trips().to_vec(),
            );
            self.cache.store_best_effort(&snapshot).await;
            snapshot
        };
        self.events.emit(BoardEvent::for_snapshot(origin, &snapshot));
        snapshot
    }
}
