use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque identifier assigned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotificationId(String);

impl NotificationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NotificationId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for NotificationId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    SystemAnnouncement,
    EventCreated,
    EventUpdated,
    EventCancelled,
    EventReminder,
    JobPosted,
    JobApplicationReceived,
    JobApplicationStatus,
    PostComment,
    PostReaction,
    PostMention,
    NewFollower,
    NewMessage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    System,
    Event,
    Job,
    Social,
    Message,
}

impl NotificationType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SystemAnnouncement => "system_announcement",
            Self::EventCreated => "event_created",
            Self::EventUpdated => "event_updated",
            Self::EventCancelled => "event_cancelled",
            Self::EventReminder => "event_reminder",
            Self::JobPosted => "job_posted",
            Self::JobApplicationReceived => "job_application_received",
            Self::JobApplicationStatus => "job_application_status",
            Self::PostComment => "post_comment",
            Self::PostReaction => "post_reaction",
            Self::PostMention => "post_mention",
            Self::NewFollower => "new_follower",
            Self::NewMessage => "new_message",
        }
    }

    pub fn category(self) -> Category {
        match self {
            Self::SystemAnnouncement => Category::System,
            Self::EventCreated | Self::EventUpdated | Self::EventCancelled | Self::EventReminder => {
                Category::Event
            }
            Self::JobPosted | Self::JobApplicationReceived | Self::JobApplicationStatus => {
                Category::Job
            }
            Self::PostComment | Self::PostReaction | Self::PostMention | Self::NewFollower => {
                Category::Social
            }
            Self::NewMessage => Category::Message,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::SystemAnnouncement => "Announcement",
            Self::EventCreated => "New event",
            Self::EventUpdated => "Event updated",
            Self::EventCancelled => "Event cancelled",
            Self::EventReminder => "Event reminder",
            Self::JobPosted => "New job",
            Self::JobApplicationReceived => "Application received",
            Self::JobApplicationStatus => "Application update",
            Self::PostComment => "New comment",
            Self::PostReaction => "New reaction",
            Self::PostMention => "Mention",
            Self::NewFollower => "New follower",
            Self::NewMessage => "New message",
        }
    }

    pub fn icon(self) -> &'static str {
        match self.category() {
            Category::System => "megaphone",
            Category::Event => "calendar",
            Category::Job => "briefcase",
            Category::Social => match self {
                Self::PostReaction => "heart",
                Self::NewFollower => "user-plus",
                _ => "message-circle",
            },
            Category::Message => "mail",
        }
    }

    /// Priority used when the server omits one.
    pub fn default_priority(self) -> Priority {
        match self {
            Self::SystemAnnouncement | Self::EventCancelled => Priority::High,
            Self::PostReaction | Self::NewFollower => Priority::Low,
            _ => Priority::Normal,
        }
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Visual emphasis only. Never affects delivery order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Normal,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: NotificationId,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub archived: bool,
}

impl Notification {
    pub fn new(
        id: impl Into<NotificationId>,
        notification_type: NotificationType,
        title: String,
        content: String,
    ) -> Self {
        Self {
            id: id.into(),
            notification_type,
            title,
            content,
            is_read: false,
            created_at: Utc::now(),
            sender_id: None,
            sender_name: None,
            action_url: None,
            priority: None,
            archived: false,
        }
    }

    /// Server-supplied priority, falling back to the type default.
    pub fn effective_priority(&self) -> Priority {
        self.priority
            .unwrap_or_else(|| self.notification_type.default_priority())
    }

    pub fn is_actionable(&self) -> bool {
        self.action_url.as_deref().is_some_and(|url| !url.is_empty())
    }
}
