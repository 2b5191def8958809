use chrono::{DateTime, Utc};

use crate::domain::notification::{Notification, NotificationId, Priority};

const BADGE_CAP: u32 = 99;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Badge {
    pub count: u32,
}

impl Badge {
    pub fn new(count: u32) -> Self {
        Self { count }
    }

    pub fn is_visible(&self) -> bool {
        self.count > 0
    }

    /// Empty when there is nothing unread, `99+` past the cap.
    pub fn label(&self) -> String {
        match self.count {
            0 => String::new(),
            n if n > BADGE_CAP => format!("{BADGE_CAP}+"),
            n => n.to_string(),
        }
    }
}

/// Display model for one entry of the dropdown or the full page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationRow {
    pub id: NotificationId,
    pub title: String,
    pub content: String,
    pub label: &'static str,
    pub icon: &'static str,
    pub priority: Priority,
    pub is_read: bool,
    pub age: String,
    pub sender: Option<String>,
    pub action_url: Option<String>,
}

impl NotificationRow {
    pub fn from_notification(notification: &Notification, now: DateTime<Utc>) -> Self {
        Self {
            id: notification.id.clone(),
            title: notification.title.clone(),
            content: notification.content.clone(),
            label: notification.notification_type.label(),
            icon: notification.notification_type.icon(),
            priority: notification.effective_priority(),
            is_read: notification.is_read,
            age: relative_time(notification.created_at, now),
            sender: notification.sender_name.clone(),
            action_url: notification
                .is_actionable()
                .then(|| notification.action_url.clone())
                .flatten(),
        }
    }

    pub fn is_clickable(&self) -> bool {
        self.action_url.is_some()
    }

    pub fn is_emphasized(&self) -> bool {
        self.priority >= Priority::High
    }
}

pub fn relative_time(created_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now.signed_duration_since(created_at);

    if elapsed.num_minutes() < 1 {
        "just now".to_string()
    } else if elapsed.num_hours() < 1 {
        format!("{}m ago", elapsed.num_minutes())
    } else if elapsed.num_days() < 1 {
        format!("{}h ago", elapsed.num_hours())
    } else if elapsed.num_days() < 7 {
        format!("{}d ago", elapsed.num_days())
    } else {
        created_at.format("%b %-d, %Y").to_string()
    }
}
