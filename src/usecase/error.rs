use std::fmt;

use thiserror::Error;

use crate::domain::notification::NotificationId;
use crate::transport::errors::TransportError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    MarkRead,
    MarkAllRead,
    Archive,
    Delete,
}

impl MutationKind {
    /// Stable label for logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            MutationKind::MarkRead => "mark_read",
            MutationKind::MarkAllRead => "mark_all_read",
            MutationKind::Archive => "archive",
            MutationKind::Delete => "delete",
        }
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            MutationKind::MarkRead => "mark notification as read",
            MutationKind::MarkAllRead => "mark all notifications as read",
            MutationKind::Archive => "archive notification",
            MutationKind::Delete => "delete notification",
        };
        f.write_str(text)
    }
}

/// Errors surfaced to the view through the store's `error` field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotificationError {
    #[error("Failed to load notifications: {0}")]
    Fetch(String),

    #[error("Failed to {op}: {message}")]
    Mutation {
        op: MutationKind,
        id: Option<NotificationId>,
        message: String,
    },

    #[error("Session expired, please sign in again")]
    Auth,

    #[error("Live updates unavailable: {0}")]
    Channel(String),
}

impl NotificationError {
    pub fn mutation(op: MutationKind, id: Option<&NotificationId>, e: TransportError) -> Self {
        match e {
            TransportError::Unauthorized => NotificationError::Auth,
            other => NotificationError::Mutation {
                op,
                id: id.cloned(),
                message: other.to_string(),
            },
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, NotificationError::Auth)
    }

    pub fn is_fetch(&self) -> bool {
        matches!(self, NotificationError::Fetch(_))
    }
}

impl From<TransportError> for NotificationError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Unauthorized => NotificationError::Auth,
            other => NotificationError::Fetch(other.to_string()),
        }
    }
}
