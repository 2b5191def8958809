use validator::Validate;

use crate::domain::notification::{Notification, NotificationType, Priority};

pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadState {
    #[default]
    All,
    Unread,
    Read,
}

/// Server-side filter for the notification list.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NotificationFilter {
    pub notification_type: Option<NotificationType>,
    pub priority: Option<Priority>,
    pub read_state: ReadState,
}

impl NotificationFilter {
    pub fn unread() -> Self {
        Self {
            read_state: ReadState::Unread,
            ..Self::default()
        }
    }

    pub fn of_type(notification_type: NotificationType) -> Self {
        Self {
            notification_type: Some(notification_type),
            ..Self::default()
        }
    }

    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(notification_type) = self.notification_type {
            pairs.push(("type", notification_type.as_str().to_string()));
        }
        if let Some(priority) = self.priority {
            pairs.push(("priority", priority.as_str().to_string()));
        }
        match self.read_state {
            ReadState::All => {}
            ReadState::Unread => pairs.push(("isRead", "false".to_string())),
            ReadState::Read => pairs.push(("isRead", "true".to_string())),
        }
        pairs
    }

    /// Whether a notification belongs in a list fetched with this filter.
    pub fn matches(&self, notification: &Notification) -> bool {
        if notification.archived {
            return false;
        }
        if self
            .notification_type
            .is_some_and(|t| t != notification.notification_type)
        {
            return false;
        }
        if self
            .priority
            .is_some_and(|p| p != notification.effective_priority())
        {
            return false;
        }
        match self.read_state {
            ReadState::All => true,
            ReadState::Unread => !notification.is_read,
            ReadState::Read => notification.is_read,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Validate)]
pub struct PageRequest {
    #[validate(range(min = 1, message = "page numbers start at 1"))]
    pub page: u32,
    #[validate(range(min = 1, max = 100, message = "limit must be between 1 and 100"))]
    pub limit: u32,
}

impl PageRequest {
    pub fn new(page: u32, limit: u32) -> Self {
        Self { page, limit }
    }

    pub fn first(limit: u32) -> Self {
        Self::new(1, limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_has_no_query() {
        assert!(NotificationFilter::default().query_pairs().is_empty());
    }

    #[test]
    fn test_query_pairs() {
        let filter = NotificationFilter {
            notification_type: Some(NotificationType::JobPosted),
            priority: Some(Priority::High),
            read_state: ReadState::Unread,
        };

        assert_eq!(
            filter.query_pairs(),
            vec![
                ("type", "job_posted".to_string()),
                ("priority", "high".to_string()),
                ("isRead", "false".to_string()),
            ]
        );
    }

    #[test]
    fn test_matches() {
        let mut notification = Notification::new(
            "a",
            NotificationType::PostComment,
            "t".to_string(),
            "c".to_string(),
        );

        assert!(NotificationFilter::default().matches(&notification));
        assert!(NotificationFilter::unread().matches(&notification));
        assert!(!NotificationFilter::of_type(NotificationType::NewMessage).matches(&notification));

        notification.is_read = true;
        assert!(!NotificationFilter::unread().matches(&notification));

        notification.archived = true;
        assert!(!NotificationFilter::default().matches(&notification));
    }

    #[test]
    fn test_page_request_validation() {
        assert!(PageRequest::new(1, 20).validate().is_ok());
        assert!(PageRequest::new(0, 20).validate().is_err());
        assert!(PageRequest::new(1, 0).validate().is_err());
        assert!(PageRequest::new(1, MAX_PAGE_SIZE + 1).validate().is_err());
    }
}
