use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::domain::filter::{NotificationFilter, PageRequest};
use crate::domain::notification::{Notification, NotificationId};
use crate::transport::errors::TransportError;
use crate::usecase::error::NotificationError;

#[derive(Debug, Clone, PartialEq)]
pub struct FetchResult {
    pub items: Vec<Notification>,
    pub has_next: bool,
    pub total_unread: u32,
}

/// Backend boundary for notification history and mutations.
///
/// Every mutation must be idempotent: repeating it against state the server
/// already holds is not an error.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationTransport: Send + Sync {
    async fn fetch(
        &self,
        page: PageRequest,
        filter: &NotificationFilter,
    ) -> Result<FetchResult, TransportError>;
    async fn mark_read(&self, id: &NotificationId) -> Result<(), TransportError>;
    async fn mark_all_read(&self) -> Result<(), TransportError>;
    async fn archive(&self, id: &NotificationId) -> Result<(), TransportError>;
    async fn remove(&self, id: &NotificationId) -> Result<(), TransportError>;
}

#[async_trait]
impl<T> NotificationTransport for Arc<T>
where
    T: NotificationTransport + ?Sized,
{
    async fn fetch(
        &self,
        page: PageRequest,
        filter: &NotificationFilter,
    ) -> Result<FetchResult, TransportError> {
        (**self).fetch(page, filter).await
    }

    async fn mark_read(&self, id: &NotificationId) -> Result<(), TransportError> {
        (**self).mark_read(id).await
    }

    async fn mark_all_read(&self) -> Result<(), TransportError> {
        (**self).mark_all_read().await
    }

    async fn archive(&self, id: &NotificationId) -> Result<(), TransportError> {
        (**self).archive(id).await
    }

    async fn remove(&self, id: &NotificationId) -> Result<(), TransportError> {
        (**self).remove(id).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    pub user_id: String,
    pub display_name: String,
}

/// Session collaborator owned by the host application.
#[cfg_attr(test, mockall::automock)]
pub trait AuthContext: Send + Sync {
    fn current_user(&self) -> Option<UserIdentity>;
    /// Called whenever the backend answers 401. Must not call back into the store synchronously.
    fn session_expired(&self);
}

/// What a live channel delivers to its subscriber.
#[derive(Debug, Clone, PartialEq)]
pub enum LiveEvent {
    Created(Notification),
    /// The channel could not reach the backend. `NotificationError::Auth`
    /// means the session was rejected and the channel has stopped.
    Failed(NotificationError),
}

pub type LiveEventHandler = Box<dyn Fn(LiveEvent) + Send + Sync + 'static>;

/// Source of newly created notifications, delivered at least once.
/// Failures are reported through the same handler.
pub trait LiveChannel: Send + Sync {
    fn subscribe(&self, on_event: LiveEventHandler) -> Result<Subscription, NotificationError>;
}

/// Handle to a running live-update task. Dropping it stops the task.
#[derive(Debug)]
pub struct Subscription {
    id: Uuid,
    task: JoinHandle<()>,
}

impl Subscription {
    pub fn new(task: JoinHandle<()>) -> Self {
        let id = Uuid::new_v4();
        tracing::debug!(subscription_id = %id, "live subscription opened");
        Self { id, task }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }

    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
        tracing::debug!(subscription_id = %self.id, "live subscription released");
    }
}
