//! Remote store synchronization.
//!
//! The remote side is a Firebase-style realtime database spoken over its
//! REST surface: the whole board lives under a single node, written with
//! `PUT {base}/{path}.json` and observed through the `text/event-stream`
//! subscription. `SyncService` wraps a store with a session breaker: after
//! enough consecutive failures the session stops talking to the remote side
//! and keeps running off the local cache alone.

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicBool, AtomicU32, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use reqwest::{header, Client, StatusCode};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, Mutex, RwLock};
use tracing::{debug, warn};
use url::Url;

use crate::{
    config::RemoteConfig,
    error::AppError,
    models::snapshot::{self, IncomingSnapshot, Snapshot},
};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const RETRY_BASE: Duration = Duration::from_secs(1);
const RETRY_CAP: Duration = Duration::from_secs(60);
const REMEMBERED_REVISIONS: usize = 32;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("remote request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("remote returned {0}")]
    Status(StatusCode),
    #[error("remote payload could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("remote stream cancelled: {0}")]
    Cancelled(String),
    #[error("remote stream ended")]
    StreamClosed,
}

/// The board's remote home. `watch` feeds full snapshots into `tx` until
/// the subscription dies (`Err`) or the receiver goes away (`Ok`).
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn fetch(&self) -> Result<Option<IncomingSnapshot>, SyncError>;
    async fn push(&self, snapshot: &Snapshot) -> Result<(), SyncError>;
    async fn watch(&self, tx: mpsc::Sender<IncomingSnapshot>) -> Result<(), SyncError>;
}

pub struct FirebaseStore {
    http: Client,
    endpoint: Url,
}

impl FirebaseStore {
    pub fn new(config: &RemoteConfig) -> Result<Self, AppError> {
        let mut base = config.base_url.clone();
        if !base.path().ends_with('/') {
            base.set_path(&format!("{}/", base.path()));
        }
        let node = config.path.trim_matches('/');
        let mut endpoint = base
            .join(&format!("{node}.json"))
            .map_err(|err| AppError::Config(format!("invalid remote path: {err}")))?;
        if let Some(token) = &config.auth {
            endpoint.query_pairs_mut().append_pair("auth", token);
        }
        let http = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|err| AppError::Other(err.into()))?;
        Ok(Self { http, endpoint })
    }

    async fn snapshot_from_event(&self, data: &str) -> Result<Option<IncomingSnapshot>, SyncError> {
        if data.trim().is_empty() {
            return Ok(None);
        }
        let value: Value = serde_json::from_str(data)?;
        let path = value.get("path").and_then(Value::as_str).unwrap_or("/");
        if path == "/" {
            match value.get("data") {
                Some(data) => Ok(snapshot::decode(data)),
                None => Ok(None),
            }
        } else {
            // a write below the root: re-read the whole node
            self.fetch().await
        }
    }
}

#[async_trait]
impl RemoteStore for FirebaseStore {
    async fn fetch(&self) -> Result<Option<IncomingSnapshot>, SyncError> {
        let response = self
            .http
            .get(self.endpoint.clone())
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(SyncError::Status(response.status()));
        }
        let value: Value = response.json().await?;
        Ok(snapshot::decode(&value))
    }

    async fn push(&self, snapshot: &Snapshot) -> Result<(), SyncError> {
        let response = self
            .http
            .put(self.endpoint.clone())
            .timeout(REQUEST_TIMEOUT)
            .json(snapshot)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(SyncError::Status(response.status()));
        }
        Ok(())
    }

    async fn watch(&self, tx: mpsc::Sender<IncomingSnapshot>) -> Result<(), SyncError> {
        // no request timeout here, the event stream is meant to stay open
        let response = self
            .http
            .get(self.endpoint.clone())
            .header(header::ACCEPT, "text/event-stream")
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(SyncError::Status(response.status()));
        }
        let mut body = response.bytes_stream();
        let mut buffer = String::new();
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            buffer.push_str(&String::from_utf8_lossy(&chunk));
            while let Some(split) = buffer.find("\n\n") {
                let block: String = buffer.drain(..split + 2).collect();
                let Some((event, data)) = parse_event_block(&block) else {
                    continue;
                };
                match event.as_str() {
                    "put" | "patch" => {
                        if let Some(update) = self.snapshot_from_event(&data).await? {
                            if tx.send(update).await.is_err() {
                                return Ok(());
                            }
                        }
                    }
                    "keep-alive" => {}
                    "cancel" | "auth_revoked" => return Err(SyncError::Cancelled(event)),
                    _ => {}
                }
            }
        }
        Err(SyncError::StreamClosed)
    }
}

fn parse_event_block(block: &str) -> Option<(String, String)> {
    let mut event = None;
    let mut data: Vec<&str> = Vec::new();
    for line in block.lines() {
        let line = line.trim_end_matches('\r');
        if let Some(rest) = line.strip_prefix("event:") {
            event = Some(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix("data:") {
            data.push(rest.trim_start());
        }
    }
    Some((event?, data.join("\n")))
}

/// In-memory store for tests and offline development.
pub struct MemoryStore {
    data: RwLock<Option<Value>>,
    notify: broadcast::Sender<Value>,
    failing: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (notify, _) = broadcast::channel(16);
        Self {
            data: RwLock::new(None),
            notify,
            failing: AtomicBool::new(false),
        }
    }

    /// Makes every call fail until cleared, which is how tests exercise the
    /// breaker.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Relaxed);
    }

    /// Plants a payload as if another session had written it.
    pub async fn seed(&self, value: Value) {
        *self.data.write().await = Some(value.clone());
        let _ = self.notify.send(value);
    }

    pub async fn raw(&self) -> Option<Value> {
        self.data.read().await.clone()
    }

    fn check(&self) -> Result<(), SyncError> {
        if self.failing.load(Ordering::Relaxed) {
            Err(SyncError::Status(StatusCode::SERVICE_UNAVAILABLE))
        } else {
            Ok(())
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn fetch(&self) -> Result<Option<IncomingSnapshot>, SyncError> {
        self.check()?;
        Ok(self.data.read().await.as_ref().and_then(snapshot::decode))
    }

    async fn push(&self, snapshot: &Snapshot) -> Result<(), SyncError> {
        self.check()?;
        let value = serde_json::to_value(snapshot)?;
        *self.data.write().await = Some(value.clone());
        let _ = self.notify.send(value);
        Ok(())
    }

    async fn watch(&self, tx: mpsc::Sender<IncomingSnapshot>) -> Result<(), SyncError> {
        self.check()?;
        // subscribe before the initial read so no update slips in between
        let mut updates = self.notify.subscribe();
        if let Some(value) = self.data.read().await.clone() {
            if let Some(update) = snapshot::decode(&value) {
                if tx.send(update).await.is_err() {
                    return Ok(());
                }
            }
        }
        loop {
            match updates.recv().await {
                Ok(value) => {
                    if let Some(update) = snapshot::decode(&value) {
                        if tx.send(update).await.is_err() {
                            return Ok(());
                        }
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return Err(SyncError::StreamClosed),
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub configured: bool,
    pub active: bool,
    pub consecutive_failures: u32,
    pub last_pushed_at: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct SyncService {
    inner: Arc<SyncInner>,
}

struct SyncInner {
    store: Option<Arc<dyn RemoteStore>>,
    failure_limit: u32,
    failures: AtomicU32,
    disabled: AtomicBool,
    recent_revisions: Mutex<VecDeque<String>>,
    last_pushed_at: Mutex<Option<DateTime<Utc>>>,
    // highest commit number sent so far; see push_ordered
    push_gate: Mutex<u64>,
}

impl SyncService {
    pub fn new(store: Option<Arc<dyn RemoteStore>>, failure_limit: u32) -> Self {
        Self {
            inner: Arc::new(SyncInner {
                store,
                failure_limit: failure_limit.max(1),
                failures: AtomicU32::new(0),
                disabled: AtomicBool::new(false),
                recent_revisions: Mutex::new(VecDeque::new()),
                last_pushed_at: Mutex::new(None),
                push_gate: Mutex::new(0),
            }),
        }
    }

    /// A service with no remote side at all; every call is a quiet no-op.
    pub fn offline() -> Self {
        Self::new(None, 1)
    }

    pub fn is_configured(&self) -> bool {
        self.inner.store.is_some()
    }

    pub fn is_active(&self) -> bool {
        self.is_configured() && !self.inner.disabled.load(Ordering::Relaxed)
    }

    pub async fn status(&self) -> SyncStatus {
        SyncStatus {
            configured: self.is_configured(),
            active: self.is_active(),
            consecutive_failures: self.inner.failures.load(Ordering::Relaxed),
            last_pushed_at: *self.inner.last_pushed_at.lock().await,
        }
    }

    /// True when the revision is one this session pushed itself; the
    /// subscription uses it to drop self-echoes.
    pub async fn is_own_revision(&self, revision: &str) -> bool {
        self.inner
            .recent_revisions
            .lock()
            .await
            .iter()
            .any(|remembered| remembered == revision)
    }

    pub async fn fetch(&self) -> Option<IncomingSnapshot> {
        let store = self.inner.store.as_deref()?;
        if !self.is_active() {
            return None;
        }
        match store.fetch().await {
            Ok(found) => {
                self.record_success();
                found
            }
            Err(err) => {
                self.record_failure("read", &err);
                None
            }
        }
    }

    /// Best-effort push; never fails the caller. The revision is remembered
    /// first so its echo over the subscription is recognized.
    pub async fn push(&self, snapshot: &Snapshot) {
        if self.inner.store.is_none() {
            return;
        }
        if !self.is_active() {
            debug!(revision = %snapshot.revision, "remote sync inactive; snapshot stays local");
            return;
        }
        self.remember(&snapshot.revision).await;
        let Some(store) = self.inner.store.as_deref() else {
            return;
        };
        match store.push(snapshot).await {
            Ok(()) => {
                self.record_success();
                *self.inner.last_pushed_at.lock().await = Some(Utc::now());
                debug!(
                    revision = %snapshot.revision,
                    trips = snapshot.trips.len(),
                    "snapshot pushed to remote store"
                );
            }
            Err(err) => self.record_failure("write", &err),
        }
    }

    /// Commit-ordered push for the background half of the local commit
    /// path. `seq` is the commit number assigned under the board write
    /// lock; sends are serialized on the gate and a push overtaken by a
    /// newer commit is dropped rather than rolling the remote store back.
    pub async fn push_ordered(&self, seq: u64, snapshot: &Snapshot) {
        let mut gate = self.inner.push_gate.lock().await;
        if seq <= *gate {
            debug!(seq, revision = %snapshot.revision, "push superseded by a newer commit");
            return;
        }
        *gate = seq;
        self.push(snapshot).await;
    }

    /// Runs the subscription for the life of the session: connects, relays
    /// snapshots into `tx`, reconnects with capped backoff, and stops for
    /// good once the breaker opens or the receiver goes away.
    pub async fn run_watch(&self, tx: mpsc::Sender<IncomingSnapshot>) {
        let Some(store) = self.inner.store.as_deref() else {
            return;
        };
        let mut backoff = RETRY_BASE;
        loop {
            if !self.is_active() || tx.is_closed() {
                return;
            }
            let (relay_tx, mut relay_rx) = mpsc::channel(8);
            let watch = store.watch(relay_tx);
            tokio::pin!(watch);
            let mut relay_open = true;
            let mut delivered = false;
            let outcome = loop {
                tokio::select! {
                    result = &mut watch => break result,
                    received = relay_rx.recv(), if relay_open => match received {
                        Some(update) => {
                            self.record_success();
                            delivered = true;
                            if tx.send(update).await.is_err() {
                                return;
                            }
                        }
                        None => relay_open = false,
                    },
                }
            };
            while let Ok(update) = relay_rx.try_recv() {
                delivered = true;
                if tx.send(update).await.is_err() {
                    return;
                }
            }
            match outcome {
                // the receiving side shut down on purpose
                Ok(()) => return,
                Err(err) => self.record_failure("subscription", &err),
            }
            if !self.is_active() {
                return;
            }
            if delivered {
                backoff = RETRY_BASE;
            }
            tokio::time::sleep(backoff).await;
            backoff = (backoff * 2).min(RETRY_CAP);
        }
    }

    async fn remember(&self, revision: &str) {
        let mut recent = self.inner.recent_revisions.lock().await;
        recent.push_back(revision.to_string());
        while recent.len() > REMEMBERED_REVISIONS {
            recent.pop_front();
        }
    }

    fn record_success(&self) {
        self.inner.failures.store(0, Ordering::Relaxed);
    }

    fn record_failure(&self, action: &str, err: &SyncError) {
        let failures = self.inner.failures.fetch_add(1, Ordering::Relaxed) + 1;
        warn!(failures, "remote {action} failed: {err}");
        if failures >= self.inner.failure_limit
            && !self.inner.disabled.swap(true, Ordering::Relaxed)
        {
            warn!("remote sync disabled for the rest of the session; board continues on the local cache");
        }
    }
}
