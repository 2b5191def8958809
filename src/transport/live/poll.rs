use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::runtime::Handle;

use crate::domain::filter::{NotificationFilter, PageRequest};
use crate::domain::notification::{Notification, NotificationId};
use crate::transport::errors::TransportError;
use crate::transport::live::ReconnectPolicy;
use crate::usecase::contracts::{
    LiveChannel, LiveEvent, LiveEventHandler, NotificationTransport, Subscription,
};
use crate::usecase::error::NotificationError;

/// Live channel that re-fetches the first page on an interval and emits
/// notifications it has not seen before.
pub struct PollingChannel<T> {
    transport: Arc<T>,
    interval: Duration,
    limit: u32,
    reconnect: ReconnectPolicy,
}

impl<T> PollingChannel<T>
where
    T: NotificationTransport + 'static,
{
    pub fn new(transport: Arc<T>, interval: Duration, limit: u32, reconnect: ReconnectPolicy) -> Self {
        Self {
            transport,
            interval,
            limit,
            reconnect,
        }
    }
}

impl<T> LiveChannel for PollingChannel<T>
where
    T: NotificationTransport + 'static,
{
    fn subscribe(&self, on_event: LiveEventHandler) -> Result<Subscription, NotificationError> {
        let runtime = Handle::try_current().map_err(|e| NotificationError::Channel(e.to_string()))?;
        let poller = Poller {
            transport: Arc::clone(&self.transport),
            interval: self.interval,
            limit: self.limit,
            reconnect: self.reconnect,
            seen: HashSet::new(),
            watermark: None,
        };

        tracing::info!(interval_ms = self.interval.as_millis() as u64, "starting notification polling");
        Ok(Subscription::new(runtime.spawn(poller.run(on_event))))
    }
}

struct Poller<T> {
    transport: Arc<T>,
    interval: Duration,
    limit: u32,
    reconnect: ReconnectPolicy,
    seen: HashSet<NotificationId>,
    watermark: Option<DateTime<Utc>>,
}

impl<T> Poller<T>
where
    T: NotificationTransport,
{
    async fn run(mut self, on_event: LiveEventHandler) {
        let request = PageRequest::first(self.limit);
        let filter = NotificationFilter::default();
        let mut failures: u32 = 0;

        loop {
            match self.transport.fetch(request, &filter).await {
                Ok(result) => {
                    if failures > 0 {
                        tracing::info!(failures, "notification polling recovered");
                    }
                    failures = 0;

                    let fresh = self.diff(result.items);
                    tracing::debug!(count = fresh.len(), "polled notifications");
                    // Oldest first so that prepending leaves the newest on top.
                    for notification in fresh.into_iter().rev() {
                        on_event(LiveEvent::Created(notification));
                    }
                    tokio::time::sleep(self.interval).await;
                }
                Err(TransportError::Unauthorized) => {
                    tracing::warn!("session expired, stopping notification polling");
                    on_event(LiveEvent::Failed(NotificationError::Auth));
                    return;
                }
                Err(e) => {
                    failures += 1;
                    // Reported once per outage.
                    if failures == 1 {
                        on_event(LiveEvent::Failed(NotificationError::Channel(format!(
                            "polling failed: {e}"
                        ))));
                    }
                    let delay = self.reconnect.delay(failures);
                    metrics::counter!("notifications_channel_reconnects_total", "channel" => "poll")
                        .increment(1);
                    tracing::warn!(
                        error = %e,
                        failures,
                        retry_in_ms = delay.as_millis() as u64,
                        "notification poll failed"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Returns unread items newer than the previous poll that were not on
    /// the previous page. The first call only records a baseline.
    fn diff(&mut self, items: Vec<Notification>) -> Vec<Notification> {
        let baseline = self.watermark.is_none();
        let watermark = self.watermark;

        let fresh = if baseline {
            Vec::new()
        } else {
            items
                .iter()
                .filter(|n| !n.is_read && !n.archived)
                .filter(|n| !self.seen.contains(&n.id))
                .filter(|n| watermark.is_none_or(|w| n.created_at >= w))
                .cloned()
                .collect()
        };

        if let Some(newest) = items.iter().map(|n| n.created_at).max() {
            self.watermark = Some(self.watermark.map_or(newest, |w| w.max(newest)));
        } else if baseline {
            self.watermark = Some(DateTime::<Utc>::MIN_UTC);
        }
        self.seen = items.into_iter().map(|n| n.id).collect();

        fresh
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration as ChronoDuration;

    use super::*;
    use crate::domain::notification::NotificationType;
    use crate::usecase::contracts::MockNotificationTransport;

    fn at(id: &str, minutes_ago: i64, is_read: bool) -> Notification {
        let mut n = Notification::new(
            id,
            NotificationType::NewMessage,
            "t".to_string(),
            "c".to_string(),
        );
        n.created_at = Utc::now() - ChronoDuration::minutes(minutes_ago);
        n.is_read = is_read;
        n
    }

    fn poller() -> Poller<MockNotificationTransport> {
        Poller {
            transport: Arc::new(MockNotificationTransport::new()),
            interval: Duration::from_secs(1),
            limit: 20,
            reconnect: ReconnectPolicy::default(),
            seen: HashSet::new(),
            watermark: None,
        }
    }

    fn ids(items: &[Notification]) -> Vec<&str> {
        items.iter().map(|n| n.id.as_str()).collect()
    }

    #[test]
    fn test_first_poll_is_baseline() {
        let mut poller = poller();
        assert!(poller.diff(vec![at("a", 5, false), at("b", 10, false)]).is_empty());
    }

    #[test]
    fn test_emits_new_unread_items() {
        let mut poller = poller();
        poller.diff(vec![at("a", 5, false)]);

        let fresh = poller.diff(vec![at("c", 0, false), at("b", 1, true), at("a", 5, false)]);

        assert_eq!(ids(&fresh), vec!["c"]);
    }

    #[test]
    fn test_older_item_shifted_onto_page_is_not_new() {
        let mut poller = poller();
        poller.diff(vec![at("a", 5, false), at("b", 10, false)]);

        // "a" was deleted elsewhere, so an older item moved onto the page.
        let fresh = poller.diff(vec![at("b", 10, false), at("old", 60, false)]);

        assert!(fresh.is_empty());
    }

    #[test]
    fn test_empty_baseline_then_first_item() {
        let mut poller = poller();
        assert!(poller.diff(Vec::new()).is_empty());

        let fresh = poller.diff(vec![at("a", 0, false)]);

        assert_eq!(ids(&fresh), vec!["a"]);
    }
}
