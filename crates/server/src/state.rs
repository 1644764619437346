//! Process-wide worker state, assembled once at startup.

use std::sync::Arc;

use offgrid_client::{
    BackgroundTasks, ChannelHub, ClientId, ClientMessage, EventBridge, LifecycleConfig, LifecycleController,
    LogNotifier, Network, Router,
};
use offgrid_core::{AppConfig, CacheDb, Error, NamespaceManager};
use tokio::sync::{Mutex, mpsc};

/// Everything a tool call can reach.
pub struct Worker {
    pub config: AppConfig,
    pub namespaces: NamespaceManager,
    pub router: Router,
    pub lifecycle: Arc<LifecycleController>,
    pub events: EventBridge,
    pub hub: Arc<ChannelHub>,
    pub tasks: BackgroundTasks,
    /// The host is itself a connected client; messages posted to it queue here.
    host: ClientId,
    inbox: Mutex<mpsc::UnboundedReceiver<ClientMessage>>,
}

impl Worker {
    pub async fn new(config: AppConfig, db: CacheDb, network: Arc<dyn Network>) -> Result<Self, Error> {
        let namespaces = NamespaceManager::new(db, config.version.clone());
        let tasks = BackgroundTasks::new();

        let lifecycle = Arc::new(LifecycleController::new(
            namespaces.clone(),
            Arc::clone(&network),
            LifecycleConfig::from_app_config(&config)?,
        ));
        let router = Router::from_config(&config, namespaces.clone(), network, Arc::clone(&lifecycle), tasks.clone())?;

        let hub = Arc::new(ChannelHub::new());
        let (host, inbox) = hub.connect().await;
        let events = EventBridge::new(hub.clone(), Arc::new(LogNotifier), config.primary_view_url.clone());

        Ok(Self { config, namespaces, router, lifecycle, events, hub, tasks, host, inbox: Mutex::new(inbox) })
    }

    pub fn host_client(&self) -> ClientId {
        self.host
    }

    /// Drain messages posted to the host since the last call.
    pub async fn drain_inbox(&self) -> Vec<ClientMessage> {
        let mut inbox = self.inbox.lock().await;
        let mut messages = Vec::new();
        while let Ok(message) = inbox.try_recv() {
            messages.push(message);
        }
        messages
    }
}
