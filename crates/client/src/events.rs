//! Wake events forwarded to the hosting application.
//!
//! Nothing here touches the request path or the cache. Delivery is best
//! effort: a client that disconnected misses the message and a dropped
//! notification is lost.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use offgrid_core::Error;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, mpsc};

/// The only sync tag acted on.
pub const SYNC_TAG: &str = "background-sync";
/// The only notification action acted on.
pub const OPEN_APP_ACTION: &str = "open-app";
pub const DISMISS_ACTION: &str = "dismiss";

const NOTIFICATION_TITLE: &str = "Offgrid";
const DEFAULT_BODY: &str = "You have new updates";

pub type ClientId = u64;

/// Message posted to connected clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    /// Connectivity is back; the client reconciles its own data.
    SyncOfflineData,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationAction {
    pub action: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub actions: Vec<NotificationAction>,
}

impl Notification {
    fn from_payload(payload: Option<&str>) -> Self {
        let body = payload.map(str::trim).filter(|p| !p.is_empty()).unwrap_or(DEFAULT_BODY);
        Self {
            title: NOTIFICATION_TITLE.to_string(),
            body: body.to_string(),
            actions: vec![
                NotificationAction { action: OPEN_APP_ACTION.to_string(), title: "Open".to_string() },
                NotificationAction { action: DISMISS_ACTION.to_string(), title: "Dismiss".to_string() },
            ],
        }
    }
}

/// Connected clients as seen by the worker.
#[async_trait]
pub trait ClientHub: Send + Sync {
    async fn clients(&self) -> Vec<ClientId>;

    async fn post(&self, client: ClientId, message: ClientMessage) -> Result<(), Error>;

    /// Open a new window on `url`.
    async fn open_window(&self, url: &str) -> Result<(), Error>;
}

/// User-visible notification display.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn show(&self, notification: &Notification) -> Result<(), Error>;
}

/// In-process hub: one unbounded channel per connected client.
#[derive(Default)]
pub struct ChannelHub {
    next_id: AtomicU64,
    clients: Mutex<BTreeMap<ClientId, mpsc::UnboundedSender<ClientMessage>>>,
    opened: Mutex<Vec<String>>,
}

impl ChannelHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn connect(&self) -> (ClientId, mpsc::UnboundedReceiver<ClientMessage>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let (tx, rx) = mpsc::unbounded_channel();
        self.clients.lock().await.insert(id, tx);
        tracing::debug!(client = id, "client connected");
        (id, rx)
    }

    /// URLs passed to `open_window` since the last call.
    pub async fn take_opened(&self) -> Vec<String> {
        std::mem::take(&mut *self.opened.lock().await)
    }
}

#[async_trait]
impl ClientHub for ChannelHub {
    async fn clients(&self) -> Vec<ClientId> {
        let mut clients = self.clients.lock().await;
        clients.retain(|_, tx| !tx.is_closed());
        clients.keys().copied().collect()
    }

    async fn post(&self, client: ClientId, message: ClientMessage) -> Result<(), Error> {
        let mut clients = self.clients.lock().await;
        let Some(tx) = clients.get(&client) else {
            return Err(Error::ClientGone(format!("client {client}")));
        };
        if tx.send(message).is_err() {
            clients.remove(&client);
            return Err(Error::ClientGone(format!("client {client}")));
        }
        Ok(())
    }

    async fn open_window(&self, url: &str) -> Result<(), Error> {
        self.opened.lock().await.push(url.to_string());
        Ok(())
    }
}

/// Writes notifications to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn show(&self, notification: &Notification) -> Result<(), Error> {
        tracing::info!(title = %notification.title, body = %notification.body, "notification");
        Ok(())
    }
}

pub struct EventBridge {
    hub: Arc<dyn ClientHub>,
    notifier: Arc<dyn Notifier>,
    primary_view_url: String,
}

impl EventBridge {
    pub fn new(hub: Arc<dyn ClientHub>, notifier: Arc<dyn Notifier>, primary_view_url: impl Into<String>) -> Self {
        Self { hub, notifier, primary_view_url: primary_view_url.into() }
    }

    /// `None` when the tag is not ours, otherwise the number of clients reached.
    pub async fn on_sync(&self, tag: &str) -> Option<usize> {
        if tag != SYNC_TAG {
            tracing::debug!(tag, "ignoring sync tag");
            return None;
        }
        Some(self.on_connectivity_restored().await)
    }

    /// Post `SYNC_OFFLINE_DATA` to every connected client. Returns how many received it.
    pub async fn on_connectivity_restored(&self) -> usize {
        let mut delivered = 0;
        for client in self.hub.clients().await {
            match self.hub.post(client, ClientMessage::SyncOfflineData).await {
                Ok(()) => delivered += 1,
                Err(e) => tracing::warn!(client, error = %e, "sync message not delivered"),
            }
        }
        tracing::info!(delivered, "connectivity restored");
        delivered
    }

    /// Show a notification carrying `payload` as its body.
    pub async fn on_external_message(&self, payload: Option<&str>) -> Result<Notification, Error> {
        let notification = Notification::from_payload(payload);
        self.notifier.show(&notification).await?;
        Ok(notification)
    }

    /// Returns whether the primary view was opened.
    pub async fn on_notification_click(&self, action: &str) -> Result<bool, Error> {
        if action != OPEN_APP_ACTION {
            tracing::debug!(action, "notification action ignored");
            return Ok(false);
        }
        self.hub.open_window(&self.primary_view_url).await?;
        Ok(true)
    }
}
