use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{COOKIE, HeaderMap, HeaderValue};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;

use crate::domain::filter::{NotificationFilter, PageRequest};
use crate::domain::notification::{Notification, NotificationId};
use crate::transport::errors::TransportError;
use crate::usecase::contracts::{FetchResult, NotificationTransport};

const MAX_ERROR_BODY: usize = 256;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NotificationListResponse {
    notifications: Vec<Notification>,
    #[serde(default)]
    has_next: bool,
    #[serde(default)]
    total_unread: u32,
}

/// REST client for the notification endpoints of the Engage backend.
#[derive(Clone)]
pub struct HttpNotificationTransport {
    client: Client,
    base_url: Url,
}

impl HttpNotificationTransport {
    pub fn new(
        base_url: &str,
        session_cookie: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| TransportError::InvalidRequest(format!("invalid base url: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(TransportError::InvalidRequest(format!(
                "base url cannot carry a path: {base_url}"
            )));
        }

        let mut headers = HeaderMap::new();
        if let Some(cookie) = session_cookie {
            let mut value = HeaderValue::from_str(cookie)
                .map_err(|e| TransportError::InvalidRequest(format!("invalid session cookie: {e}")))?;
            value.set_sensitive(true);
            headers.insert(COOKIE, value);
        }

        let client = Client::builder()
            .user_agent("EngageNotify/1.0")
            .timeout(timeout)
            .default_headers(headers)
            .build()?;

        tracing::info!(%base_url, "notification http transport created");
        Ok(Self { client, base_url })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(["api", "notifications"]).extend(segments);
        }
        url
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, TransportError> {
        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            tracing::warn!("backend answered 401");
            return Err(TransportError::Unauthorized);
        }
        if !status.is_success() {
            let mut message = response.text().await.unwrap_or_default();
            truncate_on_char_boundary(&mut message, MAX_ERROR_BODY);
            return Err(TransportError::Http {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response)
    }

    /// Sends a mutation. A 404 means the entity is already gone, which is
    /// the state the caller asked for when `gone_is_ok` is set.
    async fn mutate(&self, request: RequestBuilder, gone_is_ok: bool) -> Result<(), TransportError> {
        match self.send(request).await {
            Ok(_) => Ok(()),
            Err(TransportError::Http { status: 404, .. }) if gone_is_ok => {
                tracing::debug!("notification already gone on the server");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

fn truncate_on_char_boundary(text: &mut String, max: usize) {
    if text.len() <= max {
        return;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text.truncate(end);
}

#[async_trait]
impl NotificationTransport for HttpNotificationTransport {
    #[tracing::instrument(skip(self, filter), fields(page = page.page, limit = page.limit))]
    async fn fetch(
        &self,
        page: PageRequest,
        filter: &NotificationFilter,
    ) -> Result<FetchResult, TransportError> {
        let mut query = vec![("page", page.page.to_string()), ("limit", page.limit.to_string())];
        query.extend(filter.query_pairs());

        let response = self
            .send(self.client.get(self.endpoint(&[])).query(&query))
            .await?;
        let body: NotificationListResponse = response
            .json()
            .await
            .map_err(|e| TransportError::Decode(e.to_string()))?;

        tracing::debug!(
            count = body.notifications.len(),
            has_next = body.has_next,
            total_unread = body.total_unread,
            "notifications fetched"
        );
        Ok(FetchResult {
            items: body.notifications,
            has_next: body.has_next,
            total_unread: body.total_unread,
        })
    }

    #[tracing::instrument(skip(self), fields(notification_id = %id))]
    async fn mark_read(&self, id: &NotificationId) -> Result<(), TransportError> {
        let url = self.endpoint(&[id.as_str(), "read"]);
        self.mutate(self.client.patch(url), false).await
    }

    #[tracing::instrument(skip(self))]
    async fn mark_all_read(&self) -> Result<(), TransportError> {
        let url = self.endpoint(&["read-all"]);
        self.mutate(self.client.patch(url), false).await
    }

    #[tracing::instrument(skip(self), fields(notification_id = %id))]
    async fn archive(&self, id: &NotificationId) -> Result<(), TransportError> {
        let url = self.endpoint(&[id.as_str(), "archive"]);
        self.mutate(self.client.post(url), true).await
    }

    #[tracing::instrument(skip(self), fields(notification_id = %id))]
    async fn remove(&self, id: &NotificationId) -> Result<(), TransportError> {
        let url = self.endpoint(&[id.as_str()]);
        self.mutate(self.client.delete(url), true).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport(base: &str) -> HttpNotificationTransport {
        HttpNotificationTransport::new(base, None, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_endpoint_paths() {
        let t = transport("http://engage.local");
        assert_eq!(t.endpoint(&[]).as_str(), "http://engage.local/api/notifications");
        assert_eq!(
            t.endpoint(&["n-1", "read"]).as_str(),
            "http://engage.local/api/notifications/n-1/read"
        );
    }

    #[test]
    fn test_endpoint_keeps_base_path_and_escapes_ids() {
        let t = transport("http://engage.local/intranet/");
        assert_eq!(
            t.endpoint(&["a/b"]).as_str(),
            "http://engage.local/intranet/api/notifications/a%2Fb"
        );
    }

    #[test]
    fn test_truncate_keeps_whole_characters() {
        let mut text = format!("{}é tail", "x".repeat(255));
        truncate_on_char_boundary(&mut text, 256);
        assert_eq!(text, "x".repeat(255));

        let mut short = "déjà vu".to_string();
        truncate_on_char_boundary(&mut short, 256);
        assert_eq!(short, "déjà vu");
    }

    #[test]
    fn test_rejects_invalid_base_url() {
        let result = HttpNotificationTransport::new("not a url", None, Duration::from_secs(5));
        assert!(matches!(result, Err(TransportError::InvalidRequest(_))));

        let result = HttpNotificationTransport::new("mailto:ops@engage.local", None, Duration::from_secs(5));
        assert!(matches!(result, Err(TransportError::InvalidRequest(_))));
    }
}
