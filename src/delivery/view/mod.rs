pub mod row;

use chrono::{DateTime, Utc};

pub use row::{Badge, NotificationRow, relative_time};

use crate::domain::filter::NotificationFilter;
use crate::domain::notification::NotificationId;
use crate::usecase::contracts::{AuthContext, NotificationTransport};
use crate::usecase::error::NotificationError;
use crate::usecase::notifications::{FetchOutcome, MutationOutcome, NotificationStore};

pub const DEFAULT_DROPDOWN_SIZE: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BulkAction {
    MarkRead,
    Archive,
    Delete,
}

impl BulkAction {
    fn as_str(self) -> &'static str {
        match self {
            BulkAction::MarkRead => "mark_read",
            BulkAction::Archive => "archive",
            BulkAction::Delete => "delete",
        }
    }
}

/// Per-id result of a bulk action.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkReport {
    pub applied: Vec<NotificationId>,
    pub unchanged: Vec<NotificationId>,
    pub failed: Vec<(NotificationId, NotificationError)>,
}

impl BulkReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Binds the bell, the dropdown and the notification page to a store.
///
/// Holds only ephemeral UI state. Every data-changing intent is forwarded
/// to exactly one store operation per notification.
pub struct NotificationView<T, A>
where
    T: NotificationTransport,
    A: AuthContext,
{
    store: NotificationStore<T, A>,
    dropdown_open: bool,
    dropdown_size: usize,
    selection: Vec<NotificationId>,
}

impl<T, A> NotificationView<T, A>
where
    T: NotificationTransport,
    A: AuthContext,
{
    pub fn new(store: NotificationStore<T, A>, dropdown_size: usize) -> Self {
        Self {
            store,
            dropdown_open: false,
            dropdown_size,
            selection: Vec::new(),
        }
    }

    pub fn store(&self) -> &NotificationStore<T, A> {
        &self.store
    }

    pub fn badge(&self) -> Badge {
        Badge::new(self.store.unread_count())
    }

    pub fn toggle_dropdown(&mut self) -> bool {
        self.dropdown_open = !self.dropdown_open;
        self.dropdown_open
    }

    pub fn close_dropdown(&mut self) {
        self.dropdown_open = false;
    }

    pub fn is_dropdown_open(&self) -> bool {
        self.dropdown_open
    }

    pub fn dropdown_rows(&self, now: DateTime<Utc>) -> Vec<NotificationRow> {
        self.store
            .notifications()
            .iter()
            .take(self.dropdown_size)
            .map(|n| NotificationRow::from_notification(n, now))
            .collect()
    }

    pub fn page_rows(&self, now: DateTime<Utc>) -> Vec<NotificationRow> {
        self.store
            .notifications()
            .iter()
            .map(|n| NotificationRow::from_notification(n, now))
            .collect()
    }

    pub fn error_banner(&self) -> Option<String> {
        self.store.error().map(|e| e.to_string())
    }

    pub fn dismiss_error(&self) {
        self.store.clear_error();
    }

    pub fn is_loading(&self) -> bool {
        self.store.snapshot().is_loading
    }

    pub fn can_load_more(&self) -> bool {
        self.store.snapshot().has_more
    }

    pub fn filter(&self) -> NotificationFilter {
        self.store.snapshot().filter
    }

    pub fn selection(&self) -> &[NotificationId] {
        &self.selection
    }

    pub fn is_selected(&self, id: &NotificationId) -> bool {
        self.selection.contains(id)
    }

    /// Returns whether the id is selected afterwards.
    pub fn toggle_selected(&mut self, id: &NotificationId) -> bool {
        if let Some(index) = self.selection.iter().position(|s| s == id) {
            self.selection.remove(index);
            false
        } else {
            self.selection.push(id.clone());
            true
        }
    }

    pub fn select_all(&mut self) {
        self.selection = self
            .store
            .notifications()
            .into_iter()
            .map(|n| n.id)
            .collect();
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    /// Click on a row: marks it read and returns where to navigate, if anywhere.
    pub async fn open(&self, id: &NotificationId) -> Option<String> {
        let notification = self.store.get(id)?;
        if !notification.is_read {
            self.store.mark_as_read(id).await;
        }
        if notification.is_actionable() {
            notification.action_url
        } else {
            None
        }
    }

    pub async fn mark_read(&self, id: &NotificationId) -> MutationOutcome {
        self.store.mark_as_read(id).await
    }

    pub async fn mark_all_read(&self) -> MutationOutcome {
        self.store.mark_all_as_read().await
    }

    pub async fn archive(&self, id: &NotificationId) -> MutationOutcome {
        self.store.archive_notification(id).await
    }

    pub async fn delete(&self, id: &NotificationId) -> MutationOutcome {
        self.store.delete_notification(id).await
    }

    pub async fn select_filter(&mut self, filter: NotificationFilter) -> FetchOutcome {
        self.selection.clear();
        self.store.set_filter(filter).await
    }

    pub async fn load_more(&self) -> FetchOutcome {
        self.store.load_more().await
    }

    pub async fn refresh(&self) -> FetchOutcome {
        self.store.refresh().await
    }

    pub async fn retry(&self) -> FetchOutcome {
        self.store.retry().await
    }

    pub async fn bulk_mark_read(&mut self) -> BulkReport {
        self.bulk(BulkAction::MarkRead).await
    }

    pub async fn bulk_archive(&mut self) -> BulkReport {
        self.bulk(BulkAction::Archive).await
    }

    pub async fn bulk_delete(&mut self) -> BulkReport {
        self.bulk(BulkAction::Delete).await
    }

    // Failed ids stay selected so the user can retry them.
    #[tracing::instrument(skip(self), fields(selected = self.selection.len()))]
    async fn bulk(&mut self, action: BulkAction) -> BulkReport {
        let mut report = BulkReport::default();

        for id in self.selection.clone() {
            let outcome = match action {
                BulkAction::MarkRead => self.store.mark_as_read(&id).await,
                BulkAction::Archive => self.store.archive_notification(&id).await,
                BulkAction::Delete => self.store.delete_notification(&id).await,
            };
            match outcome {
                MutationOutcome::Applied => report.applied.push(id),
                MutationOutcome::Unchanged => report.unchanged.push(id),
                MutationOutcome::RolledBack(e) | MutationOutcome::Resynced(e) => {
                    report.failed.push((id, e))
                }
            }
        }

        let remaining = self.store.notifications();
        self.selection.retain(|id| {
            report.failed.iter().any(|(failed, _)| failed == id)
                && remaining.iter().any(|n| &n.id == id)
        });

        tracing::info!(
            action = action.as_str(),
            applied = report.applied.len(),
            unchanged = report.unchanged.len(),
            failed = report.failed.len(),
            "bulk action finished"
        );
        report
    }
}
