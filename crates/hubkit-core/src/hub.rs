// ── Hub ──
//
// Registry of connectors plus the shared event engine and the inbound
// push queue. Cheap to clone; all clones share state.

use std::sync::Arc;

use dashmap::DashMap;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::action::Options;
use crate::connector::Connector;
use crate::context::Context;
use crate::entity::{Entity, Node};
use crate::error::{CoreError, Result};
use crate::event::{CursorKey, CursorStore, EventEngine, EventHandler, HandlerId, SubscriptionState};
use crate::lookup::lookup;
use crate::path::Path;
use crate::reflect::{Reflection, UrlBuilder, reflect};

const PUSH_QUEUE_SIZE: usize = 256;

#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Shared token inbound pushes must present. `None` accepts any.
    pub callback_token: Option<SecretString>,
    pub push_queue_size: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            callback_token: None,
            push_queue_size: PUSH_QUEUE_SIZE,
        }
    }
}

/// An accepted inbound push waiting for the worker.
#[derive(Debug)]
struct PushJob {
    task_id: Uuid,
    connector_id: String,
    event_key: String,
    payload: Value,
}

#[derive(Clone)]
pub struct Hub {
    inner: Arc<HubInner>,
}

struct HubInner {
    connectors: DashMap<String, Arc<dyn Connector>>,
    engine: EventEngine,
    callback_token: Option<SecretString>,
    push_tx: mpsc::Sender<PushJob>,
    push_rx: Mutex<Option<mpsc::Receiver<PushJob>>>,
    cancel: CancellationToken,
}

impl Hub {
    pub fn new(cursors: Arc<dyn CursorStore>, config: HubConfig) -> Self {
        let (push_tx, push_rx) = mpsc::channel(config.push_queue_size.max(1));
        Self {
            inner: Arc::new(HubInner {
                connectors: DashMap::new(),
                engine: EventEngine::new(cursors),
                callback_token: config.callback_token,
                push_tx,
                push_rx: Mutex::new(Some(push_rx)),
                cancel: CancellationToken::new(),
            }),
        }
    }

    pub fn engine(&self) -> &EventEngine {
        &self.inner.engine
    }

    // ── Registry ─────────────────────────────────────────────────────

    /// Register `connector`, replacing any previous one with the same id.
    pub fn register(&self, connector: Arc<dyn Connector>) {
        let id = connector.id().to_owned();
        info!(connector = %id, kind = connector.kind(), "registered connector");
        self.inner.connectors.insert(id, connector);
    }

    pub fn unregister(&self, id: &str) -> bool {
        self.inner.connectors.remove(id).is_some()
    }

    pub fn connector(&self, id: &str) -> Result<Arc<dyn Connector>> {
        self.inner
            .connectors
            .get(id)
            .map(|c| Arc::clone(c.value()))
            .ok_or_else(|| CoreError::ConnectorNotFound { id: id.to_owned() })
    }

    /// Registered connector ids, sorted.
    pub fn connector_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.inner.connectors.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    // ── Addressing ───────────────────────────────────────────────────

    pub async fn lookup(&self, connector_id: &str, path: &Path, ctx: &Context) -> Result<Node> {
        let root: Arc<dyn Entity> = self.connector(connector_id)?;
        lookup(root, path, ctx).await
    }

    pub async fn reflect(
        &self,
        connector_id: &str,
        path: &Path,
        ctx: &Context,
        urls: &dyn UrlBuilder,
    ) -> Result<Reflection> {
        let node = self.lookup(connector_id, path, ctx).await?;
        reflect(&node, ctx, urls).await
    }

    /// Resolve and invoke the action at `path`.
    pub async fn invoke(
        &self,
        connector_id: &str,
        path: &Path,
        options: Options,
        ctx: &Context,
    ) -> Result<Value> {
        let node = self.lookup(connector_id, path, ctx).await?;
        let action = node.as_action().ok_or_else(|| CoreError::Validation {
            message: format!("'{path}' is not an action"),
        })?;
        action.invoke(options, ctx).await
    }

    // ── Events ───────────────────────────────────────────────────────

    async fn event_at(
        &self,
        connector_id: &str,
        path: &Path,
        ctx: &Context,
    ) -> Result<Arc<dyn crate::event::Event>> {
        match self.lookup(connector_id, path, ctx).await? {
            Node::Event(event) => Ok(event),
            other => Err(CoreError::Validation {
                message: format!("'{path}' is a {}, not an event", other.kind()),
            }),
        }
    }

    pub async fn subscribe(
        &self,
        connector_id: &str,
        event_path: &Path,
        handler: Arc<dyn EventHandler>,
        ctx: &Context,
    ) -> Result<HandlerId> {
        let event = self.event_at(connector_id, event_path, ctx).await?;
        let key = CursorKey::new(connector_id, event.path());
        self.inner.engine.subscribe(key, event.as_ref(), handler, ctx).await
    }

    /// Remove handler `id` from the event at `event_path`.
    ///
    /// The path is resolved like in [`Hub::subscribe`], so any spelling
    /// the connector accepts reaches the same cursor. For events that no
    /// longer resolve, use [`EventEngine::unsubscribe`] with the stored key.
    pub async fn unsubscribe(
        &self,
        connector_id: &str,
        event_path: &Path,
        id: HandlerId,
        ctx: &Context,
    ) -> Result<bool> {
        let event = self.event_at(connector_id, event_path, ctx).await?;
        let key = CursorKey::new(connector_id, event.path());
        self.inner.engine.unsubscribe(&key, id).await
    }

    pub async fn subscription_state(
        &self,
        connector_id: &str,
        event_path: &Path,
        ctx: &Context,
    ) -> Result<SubscriptionState> {
        let event = self.event_at(connector_id, event_path, ctx).await?;
        Ok(self
            .inner
            .engine
            .subscription_state(&CursorKey::new(connector_id, event.path())))
    }

    /// Run one poll of the event at `event_path`.
    pub async fn poll(&self, connector_id: &str, event_path: &Path, ctx: &Context) -> Result<Vec<Value>> {
        let event = self.event_at(connector_id, event_path, ctx).await?;
        let key = CursorKey::new(connector_id, event.path());
        self.inner.engine.poll(&key, event.as_ref(), ctx).await
    }

    // ── Inbound push ─────────────────────────────────────────────────

    /// Accept a pushed event for the first push-capable connector of
    /// `connector_kind` and queue it. Returns the task id.
    ///
    /// Never waits for queue space: a full queue is reported as
    /// [`CoreError::Overloaded`] and the caller may retry later.
    pub fn enqueue_event(
        &self,
        connector_kind: &str,
        event_key: &str,
        payload: Value,
        token: Option<&str>,
    ) -> Result<Uuid> {
        if let Some(expected) = &self.inner.callback_token {
            if token != Some(expected.expose_secret()) {
                return Err(CoreError::Authentication {
                    message: "invalid callback token".into(),
                });
            }
        }

        let mut candidates: Vec<Arc<dyn Connector>> = self
            .inner
            .connectors
            .iter()
            .filter(|e| e.kind() == connector_kind && e.accepts_push())
            .map(|e| Arc::clone(e.value()))
            .collect();
        candidates.sort_by(|a, b| a.id().cmp(b.id()));
        let connector = candidates
            .into_iter()
            .next()
            .ok_or_else(|| CoreError::ConnectorNotFound {
                id: connector_kind.to_owned(),
            })?;

        let job = PushJob {
            task_id: Uuid::new_v4(),
            connector_id: connector.id().to_owned(),
            event_key: event_key.to_owned(),
            payload,
        };
        let task_id = job.task_id;
        debug!(task = %task_id, connector = %job.connector_id, event_key, "queued push");
        self.inner.push_tx.try_send(job).map_err(|e| match e {
            mpsc::error::TrySendError::Full(job) => {
                warn!(task = %job.task_id, connector = %job.connector_id, "push queue full");
                CoreError::Overloaded {
                    message: "push queue is full".into(),
                }
            }
            mpsc::error::TrySendError::Closed(_) => CoreError::Internal("push queue closed".into()),
        })?;
        Ok(task_id)
    }

    /// Spawn the push worker. Returns `None` if it is already running.
    pub async fn start(&self) -> Option<JoinHandle<()>> {
        let rx = self.inner.push_rx.lock().await.take()?;
        let hub = self.clone();
        Some(tokio::spawn(push_worker(hub, rx)))
    }

    /// Stop the push worker. Queued jobs are dropped.
    pub fn shutdown(&self) {
        self.inner.cancel.cancel();
    }

    /// Route one pushed payload and deliver it to every subscribed
    /// handler of the resulting event paths. Returns the number of
    /// handlers reached.
    async fn process_push(&self, job: &PushJob) -> Result<usize> {
        let connector = self.connector(&job.connector_id)?;
        let paths = connector
            .route_push(&job.event_key, &job.payload, &Context::anonymous())
            .await?;

        let mut reached = 0;
        for path in paths {
            let key = CursorKey::new(job.connector_id.clone(), path);
            reached += self.inner.engine.deliver(&key, &job.payload).await?;
        }
        Ok(reached)
    }
}

impl std::fmt::Debug for Hub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hub")
            .field("connectors", &self.connector_ids())
            .finish_non_exhaustive()
    }
}

async fn push_worker(hub: Hub, mut rx: mpsc::Receiver<PushJob>) {
    let cancel = hub.inner.cancel.clone();
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            job = rx.recv() => {
                let Some(job) = job else { break };
                match hub.process_push(&job).await {
                    Ok(reached) => debug!(task = %job.task_id, reached, "push delivered"),
                    Err(e) => warn!(task = %job.task_id, connector = %job.connector_id, error = %e, "push failed"),
                }
            }
        }
    }
    debug!("push worker stopped");
}
