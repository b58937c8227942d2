use std::sync::Arc;

use futures::Stream;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};

use crate::error::{ClientError, ClientResult};
use crate::events::{EventStream, Subscriber};
use crate::http::api::ApiClient;
use crate::http::routes::{
    notification_read_path, READ_ALL_NOTIFICATIONS_PATH, UNREAD_NOTIFICATIONS_PATH,
};
use crate::notifications::{Notification, NotificationDto};

// Incoming notification stream sizing
const INCOMING_STREAM_CAPACITY: usize = 100;
const INCOMING_BUFFER_SIZE: usize = 50;

/// Hook fired for every incoming notification, e.g. to play a sound.
/// Strictly best-effort: a failing hook is logged and never breaks the
/// delivery pipeline.
pub type NotificationAlert = Arc<dyn Fn(&Notification) -> anyhow::Result<()> + Send + Sync>;

/// Local view of the user's notifications
///
/// Two sinks fed by the realtime channel: a transient incoming stream
/// (toast display) and the unread list (newest-first). Mark-as-read
/// operations mutate the list only after the server confirms.
pub struct NotificationFeed {
    api: Arc<ApiClient>,
    unread: RwLock<Vec<Notification>>,
    incoming: EventStream<Notification>,
    alert: RwLock<Option<NotificationAlert>>,
}

impl NotificationFeed {
    /// Create a new feed
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self {
            api,
            unread: RwLock::new(Vec::new()),
            incoming: EventStream::new(INCOMING_STREAM_CAPACITY, INCOMING_BUFFER_SIZE),
            alert: RwLock::new(None),
        }
    }

    /// Register the best-effort alert hook
    pub async fn set_alert(&self, alert: NotificationAlert) {
        *self.alert.write().await = Some(alert);
    }

    /// Replace the unread list with the server's current snapshot
    ///
    /// On failure the local list is left unchanged.
    pub async fn refresh_unread(&self) -> ClientResult<usize> {
        let response = self.api.get(UNREAD_NOTIFICATIONS_PATH).await?;
        if !response.is_success() {
            return Err(ClientError::api(response.status(), response.body()));
        }

        let snapshot: Vec<NotificationDto> = response.json().map_err(ClientError::decode)?;
        let notifications: Vec<Notification> =
            snapshot.into_iter().map(Notification::from).collect();
        let count = notifications.len();

        *self.unread.write().await = notifications;
        info!(count, "Unread notifications loaded");
        Ok(count)
    }

    /// Snapshot of the unread list, newest first
    pub async fn unread(&self) -> Vec<Notification> {
        self.unread.read().await.clone()
    }

    /// Number of unread notifications
    pub async fn unread_count(&self) -> usize {
        self.unread.read().await.len()
    }

    /// Subscribe to incoming notifications
    pub fn subscribe_incoming(&self) -> Subscriber<Notification> {
        self.incoming.subscribe()
    }

    /// Incoming notifications as a `futures::Stream`
    pub fn incoming_stream(&self) -> impl Stream<Item = Notification> {
        let mut subscriber = self.incoming.subscribe();
        async_stream::stream! {
            loop {
                match subscriber.recv().await {
                    Ok(notification) => yield notification,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Incoming notification stream lagged");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    /// Deliver a notification arriving over the realtime channel
    pub async fn push_incoming(&self, notification: Notification) {
        debug!(id = %notification.id, "Notification received");

        // Both sinks, then the alert hook
        self.incoming.publish(notification.clone()).await;
        self.unread.write().await.insert(0, notification.clone());

        if let Some(alert) = self.alert.read().await.clone() {
            if let Err(e) = alert(&notification) {
                warn!(error = %e, "Notification alert hook failed");
            }
        }
    }

    /// Mark one notification as read
    ///
    /// The local entry is removed only after the server confirms.
    pub async fn mark_read(&self, id: &str) -> ClientResult<()> {
        let response = self.api.patch(&notification_read_path(id), None).await?;
        if !response.is_success() {
            return Err(ClientError::api(response.status(), response.body()));
        }

        self.unread.write().await.retain(|entry| entry.id != id);
        debug!(id, "Notification marked read");
        Ok(())
    }

    /// Mark every notification as read
    pub async fn mark_all_read(&self) -> ClientResult<()> {
        let response = self.api.patch(READ_ALL_NOTIFICATIONS_PATH, None).await?;
        if !response.is_success() {
            return Err(ClientError::api(response.status(), response.body()));
        }

        self.unread.write().await.clear();
        info!("All notifications marked read");
        Ok(())
    }
}
