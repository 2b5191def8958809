use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use validator::Validate;

use crate::domain::filter::{NotificationFilter, PageRequest};
use crate::domain::notification::{Notification, NotificationId};
use crate::usecase::contracts::{AuthContext, NotificationTransport};
use crate::usecase::error::{MutationKind, NotificationError};

pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Result of an optimistic mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome {
    /// Local change made and confirmed by the backend.
    Applied,
    /// Nothing to do: target missing or already in the requested state.
    Unchanged,
    /// Backend rejected the call and the local change was reverted.
    RolledBack(NotificationError),
    /// Backend rejected a bulk call and the store reloaded the first page.
    Resynced(NotificationError),
}

impl MutationOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, MutationOutcome::Applied)
    }

    pub fn error(&self) -> Option<&NotificationError> {
        match self {
            MutationOutcome::RolledBack(e) | MutationOutcome::Resynced(e) => Some(e),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Loaded { received: usize, added: usize },
    /// No further page to load.
    Exhausted,
    /// A newer request superseded this one before it completed.
    Discarded,
    Failed(NotificationError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveOutcome {
    Prepended,
    Duplicate,
    /// Counted as unread but hidden by the active filter.
    Filtered,
    Disposed,
}

/// Read-only copy of the store handed to the view layer.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreSnapshot {
    pub notifications: Vec<Notification>,
    pub unread_count: u32,
    pub page: u32,
    pub has_more: bool,
    pub is_loading: bool,
    pub error: Option<NotificationError>,
    pub filter: NotificationFilter,
}

#[derive(Debug, Default)]
struct StoreState {
    notifications: Vec<Notification>,
    unread_count: u32,
    page: u32,
    has_more: bool,
    in_flight: usize,
    refreshes_in_flight: usize,
    error: Option<NotificationError>,
    filter: NotificationFilter,
    generation: u64,
    // Bumped on every local mutation; a rollback only applies while its version is current.
    versions: HashMap<NotificationId, u64>,
    version_seq: u64,
    live_ids: HashSet<NotificationId>,
    last_failed_fetch: Option<PageRequest>,
    disposed: bool,
}

impl StoreState {
    fn position(&self, id: &NotificationId) -> Option<usize> {
        self.notifications.iter().position(|n| &n.id == id)
    }

    fn contains(&self, id: &NotificationId) -> bool {
        self.position(id).is_some()
    }

    fn touch(&mut self, id: &NotificationId) -> u64 {
        self.version_seq += 1;
        self.versions.insert(id.clone(), self.version_seq);
        self.version_seq
    }

    fn is_current(&self, id: &NotificationId, version: u64) -> bool {
        self.versions.get(id) == Some(&version)
    }

    fn replace(&mut self, items: Vec<Notification>) -> usize {
        self.notifications.clear();
        self.versions.clear();
        self.live_ids.clear();
        self.append(items)
    }

    fn append(&mut self, items: Vec<Notification>) -> usize {
        let mut known: HashSet<NotificationId> =
            self.notifications.iter().map(|n| n.id.clone()).collect();
        let before = self.notifications.len();

        for item in items {
            if item.archived {
                continue;
            }
            if known.insert(item.id.clone()) {
                self.notifications.push(item);
            } else {
                tracing::trace!(notification_id = %item.id, "skipping duplicate notification");
            }
        }

        self.notifications.len() - before
    }

    fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            notifications: self.notifications.clone(),
            unread_count: self.unread_count,
            page: self.page,
            has_more: self.has_more,
            is_loading: self.in_flight > 0,
            error: self.error.clone(),
            filter: self.filter.clone(),
        }
    }
}

struct Removed {
    index: usize,
    notification: Notification,
    decremented: bool,
    version: u64,
}

struct StoreInner<T, A> {
    transport: T,
    auth: A,
    page_size: u32,
    state: Mutex<StoreState>,
}

/// Client-side source of truth for the signed-in user's notifications.
///
/// Mutations are optimistic: local state changes first, the backend call
/// follows, and a failure reverts the local change. The state lock is never
/// held across an await, so intents are applied in dispatch order while
/// network calls overlap.
pub struct NotificationStore<T, A>
where
    T: NotificationTransport,
    A: AuthContext,
{
    inner: Arc<StoreInner<T, A>>,
}

impl<T, A> Clone for NotificationStore<T, A>
where
    T: NotificationTransport,
    A: AuthContext,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T, A> NotificationStore<T, A>
where
    T: NotificationTransport,
    A: AuthContext,
{
    pub fn new(transport: T, auth: A, page_size: u32) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                transport,
                auth,
                page_size,
                state: Mutex::new(StoreState::default()),
            }),
        }
    }

    pub fn transport(&self) -> &T {
        &self.inner.transport
    }

    pub fn page_size(&self) -> u32 {
        self.inner.page_size
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        self.lock().snapshot()
    }

    pub fn unread_count(&self) -> u32 {
        self.lock().unread_count
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.lock().notifications.clone()
    }

    pub fn get(&self, id: &NotificationId) -> Option<Notification> {
        let state = self.lock();
        state.position(id).map(|index| state.notifications[index].clone())
    }

    pub fn error(&self) -> Option<NotificationError> {
        self.lock().error.clone()
    }

    pub fn clear_error(&self) {
        self.lock().error = None;
    }

    pub fn record_error(&self, error: NotificationError) {
        self.lock().error = Some(error);
    }

    /// Records a failure reported by a live channel. A rejected session is
    /// escalated like any other 401.
    pub fn record_channel_error(&self, error: NotificationError) {
        {
            let mut state = self.lock();
            if state.disposed {
                return;
            }
            state.error = Some(error.clone());
        }
        tracing::warn!(error = %error, "live channel failure");
        self.escalate(&error);
    }

    fn escalate(&self, error: &NotificationError) {
        if error.is_auth() {
            tracing::warn!("backend rejected the session");
            self.inner.auth.session_expired();
        }
    }

    fn rolled_back(&self, op: MutationKind, error: NotificationError) -> MutationOutcome {
        metrics::counter!("notifications_rollbacks_total", "op" => op.as_str()).increment(1);
        tracing::warn!(op = op.as_str(), error = %error, "optimistic update rolled back");
        MutationOutcome::RolledBack(error)
    }

    /// Loads one page. Page 1 replaces the list, later pages append.
    pub async fn fetch_page(&self, page: u32, page_size: u32) -> FetchOutcome {
        self.load_page(page, page_size, true).await
    }

    #[tracing::instrument(skip(self, escalate), fields(%page, %page_size))]
    async fn load_page(&self, page: u32, page_size: u32, escalate: bool) -> FetchOutcome {
        tracing::debug!("fetching notifications page");

        let request = PageRequest::new(page, page_size);
        if let Err(e) = request.validate() {
            let error = NotificationError::Fetch(format!("invalid page request: {e}"));
            tracing::warn!(error = %error, "rejected page request");
            self.record_error(error.clone());
            return FetchOutcome::Failed(error);
        }

        let (generation, filter, behind_refresh) = {
            let mut state = self.lock();
            if page == 1 {
                state.generation += 1;
                state.refreshes_in_flight += 1;
            }
            state.in_flight += 1;
            (
                state.generation,
                state.filter.clone(),
                page > 1 && state.refreshes_in_flight > 0,
            )
        };

        let result = self
            .inner
            .transport
            .fetch(request, &filter)
            .await
            .map_err(NotificationError::from);
        if let Err(error) = &result {
            if escalate {
                self.escalate(error);
            }
        }

        let mut state = self.lock();
        state.in_flight = state.in_flight.saturating_sub(1);
        if page == 1 {
            state.refreshes_in_flight = state.refreshes_in_flight.saturating_sub(1);
        }
        if generation != state.generation || state.disposed {
            tracing::debug!(generation, current = state.generation, "discarding stale page response");
            return FetchOutcome::Discarded;
        }
        // A pending page 1 replaces the list and the page counter.
        if page > 1 && (behind_refresh || state.refreshes_in_flight > 0) {
            tracing::debug!("discarding page response overtaken by a refresh");
            return FetchOutcome::Discarded;
        }

        match result {
            Ok(fetched) => {
                let received = fetched.items.len();
                let added = if page == 1 {
                    state.replace(fetched.items)
                } else {
                    state.append(fetched.items)
                };
                state.page = page;
                state.has_more = fetched.has_next;
                state.unread_count = fetched.total_unread;
                state.last_failed_fetch = None;
                if state.error.as_ref().is_some_and(NotificationError::is_fetch) {
                    state.error = None;
                }

                tracing::debug!(
                    received,
                    added,
                    has_more = state.has_more,
                    unread_count = state.unread_count,
                    "page loaded"
                );
                FetchOutcome::Loaded { received, added }
            }
            Err(error) => {
                metrics::counter!("notifications_fetch_errors_total").increment(1);
                tracing::warn!(error = %error, "failed to fetch notifications, keeping existing data");
                state.error = Some(error.clone());
                state.last_failed_fetch = Some(request);
                FetchOutcome::Failed(error)
            }
        }
    }

    pub async fn refresh(&self) -> FetchOutcome {
        self.fetch_page(1, self.inner.page_size).await
    }

    pub async fn load_more(&self) -> FetchOutcome {
        let next = {
            let state = self.lock();
            if state.page == 0 {
                Some(1)
            } else if state.has_more {
                Some(state.page + 1)
            } else {
                None
            }
        };

        match next {
            Some(page) => self.fetch_page(page, self.inner.page_size).await,
            None => {
                tracing::debug!("no more notifications to load");
                FetchOutcome::Exhausted
            }
        }
    }

    /// Repeats the last failed fetch, or refreshes when none failed.
    pub async fn retry(&self) -> FetchOutcome {
        let failed = self.lock().last_failed_fetch;
        match failed {
            Some(request) => self.fetch_page(request.page, request.limit).await,
            None => self.refresh().await,
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn set_filter(&self, filter: NotificationFilter) -> FetchOutcome {
        tracing::debug!("changing notification filter");
        self.lock().filter = filter;
        self.refresh().await
    }

    #[tracing::instrument(skip(self), fields(notification_id = %id))]
    pub async fn mark_as_read(&self, id: &NotificationId) -> MutationOutcome {
        tracing::debug!("marking notification as read");

        let (version, decremented) = {
            let mut state = self.lock();
            let Some(index) = state.position(id) else {
                tracing::debug!("notification not loaded, nothing to mark");
                return MutationOutcome::Unchanged;
            };
            if state.notifications[index].is_read {
                tracing::debug!("notification already read");
                return MutationOutcome::Unchanged;
            }

            state.notifications[index].is_read = true;
            let decremented = state.unread_count > 0;
            if decremented {
                state.unread_count -= 1;
            }
            (state.touch(id), decremented)
        };

        match self.inner.transport.mark_read(id).await {
            Ok(()) => {
                tracing::debug!("notification marked as read");
                MutationOutcome::Applied
            }
            Err(e) => {
                let error = NotificationError::mutation(MutationKind::MarkRead, Some(id), e);
                self.escalate(&error);

                let mut state = self.lock();
                match state.position(id) {
                    Some(index) if state.is_current(id, version) => {
                        state.notifications[index].is_read = false;
                        if decremented {
                            state.unread_count += 1;
                        }
                    }
                    _ => tracing::debug!("notification changed since dispatch, skipping rollback"),
                }
                state.error = Some(error.clone());
                drop(state);

                self.rolled_back(MutationKind::MarkRead, error)
            }
        }
    }

    /// Marks everything read. A failure reloads page 1 instead of guessing
    /// which items the server managed to update.
    #[tracing::instrument(skip(self))]
    pub async fn mark_all_as_read(&self) -> MutationOutcome {
        tracing::debug!("marking all notifications as read");

        {
            let mut state = self.lock();
            if state.unread_count == 0 && state.notifications.iter().all(|n| n.is_read) {
                tracing::debug!("no unread notifications");
                return MutationOutcome::Unchanged;
            }

            let changed: Vec<NotificationId> = state
                .notifications
                .iter_mut()
                .filter(|n| !n.is_read)
                .map(|n| {
                    n.is_read = true;
                    n.id.clone()
                })
                .collect();
            for id in &changed {
                state.touch(id);
            }
            state.unread_count = 0;
        }

        match self.inner.transport.mark_all_read().await {
            Ok(()) => {
                tracing::info!("all notifications marked as read");
                MutationOutcome::Applied
            }
            Err(e) => {
                let error = NotificationError::mutation(MutationKind::MarkAllRead, None, e);
                self.escalate(&error);
                metrics::counter!("notifications_resyncs_total").increment(1);
                tracing::warn!(error = %error, "mark all as read failed, resynchronizing");

                self.record_error(error.clone());
                // Already escalated above if the session was rejected.
                self.load_page(1, self.inner.page_size, false).await;
                MutationOutcome::Resynced(error)
            }
        }
    }

    #[tracing::instrument(skip(self), fields(notification_id = %id))]
    pub async fn delete_notification(&self, id: &NotificationId) -> MutationOutcome {
        tracing::debug!("deleting notification");
        self.remove_optimistically(MutationKind::Delete, id).await
    }

    #[tracing::instrument(skip(self), fields(notification_id = %id))]
    pub async fn archive_notification(&self, id: &NotificationId) -> MutationOutcome {
        tracing::debug!("archiving notification");
        self.remove_optimistically(MutationKind::Archive, id).await
    }

    async fn remove_optimistically(&self, op: MutationKind, id: &NotificationId) -> MutationOutcome {
        let removed = {
            let mut state = self.lock();
            let Some(index) = state.position(id) else {
                tracing::debug!("notification not loaded, nothing to remove");
                return MutationOutcome::Unchanged;
            };

            let notification = state.notifications.remove(index);
            let decremented = !notification.is_read && state.unread_count > 0;
            if decremented {
                state.unread_count -= 1;
            }
            let version = state.touch(id);
            Removed {
                index,
                notification,
                decremented,
                version,
            }
        };

        let result = match op {
            MutationKind::Archive => self.inner.transport.archive(id).await,
            _ => self.inner.transport.remove(id).await,
        };

        match result {
            Ok(()) => {
                self.lock().versions.remove(id);
                tracing::info!(op = op.as_str(), "notification removed");
                MutationOutcome::Applied
            }
            Err(e) => {
                let error = NotificationError::mutation(op, Some(id), e);
                self.escalate(&error);

                let mut state = self.lock();
                if state.is_current(id, removed.version) && !state.contains(id) {
                    let index = removed.index.min(state.notifications.len());
                    state.notifications.insert(index, removed.notification);
                    if removed.decremented {
                        state.unread_count += 1;
                    }
                } else {
                    tracing::debug!("notification changed since dispatch, skipping rollback");
                }
                state.error = Some(error.clone());
                drop(state);

                self.rolled_back(op, error)
            }
        }
    }

    /// Merges a notification pushed by the live channel. Deliveries are
    /// at-least-once, so a known id is ignored.
    #[tracing::instrument(skip(self, notification), fields(notification_id = %notification.id))]
    pub fn apply_live_event(&self, mut notification: Notification) -> LiveOutcome {
        let mut state = self.lock();
        if state.disposed {
            return LiveOutcome::Disposed;
        }
        if notification.archived
            || state.contains(&notification.id)
            || state.live_ids.contains(&notification.id)
        {
            metrics::counter!("notifications_live_events_total", "outcome" => "duplicate").increment(1);
            tracing::debug!("ignoring duplicate live notification");
            return LiveOutcome::Duplicate;
        }

        // A creation event is unread by definition.
        notification.is_read = false;
        state.unread_count += 1;
        state.live_ids.insert(notification.id.clone());

        if !state.filter.matches(&notification) {
            metrics::counter!("notifications_live_events_total", "outcome" => "filtered").increment(1);
            tracing::debug!(unread_count = state.unread_count, "live notification hidden by filter");
            return LiveOutcome::Filtered;
        }

        state.notifications.insert(0, notification);
        metrics::counter!("notifications_live_events_total", "outcome" => "prepended").increment(1);
        tracing::info!(unread_count = state.unread_count, "live notification received");
        LiveOutcome::Prepended
    }

    /// Drops all loaded state. Responses still in flight are discarded.
    pub fn reset(&self) {
        let mut state = self.lock();
        let generation = state.generation + 1;
        let disposed = state.disposed;
        let in_flight = state.in_flight;
        let refreshes_in_flight = state.refreshes_in_flight;
        *state = StoreState {
            generation,
            disposed,
            in_flight,
            refreshes_in_flight,
            ..StoreState::default()
        };
    }

    /// Resets and refuses further live events. Used on logout.
    pub fn close(&self) {
        self.reset();
        self.lock().disposed = true;
        tracing::debug!("notification store closed");
    }

    pub fn is_closed(&self) -> bool {
        self.lock().disposed
    }
}
