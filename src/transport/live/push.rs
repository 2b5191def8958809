use futures::StreamExt;
use serde::Deserialize;
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::COOKIE;
use tokio_tungstenite::tungstenite::http::{HeaderValue, StatusCode};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use crate::domain::notification::Notification;
use crate::transport::live::ReconnectPolicy;
use crate::usecase::contracts::{LiveChannel, LiveEvent, LiveEventHandler, Subscription};
use crate::usecase::error::NotificationError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum LiveFrame {
    #[serde(rename = "notification.created")]
    Created { notification: Notification },
    #[serde(other)]
    Other,
}

/// Decodes a text frame. Frames other than `notification.created` yield `None`.
pub fn decode_frame(text: &str) -> Result<Option<Notification>, serde_json::Error> {
    match serde_json::from_str(text)? {
        LiveFrame::Created { notification } => Ok(Some(notification)),
        LiveFrame::Other => Ok(None),
    }
}

/// Live channel over a persistent WebSocket connection.
pub struct PushChannel {
    url: String,
    session_cookie: Option<String>,
    reconnect: ReconnectPolicy,
}

impl PushChannel {
    pub fn new(url: String, session_cookie: Option<String>, reconnect: ReconnectPolicy) -> Self {
        Self {
            url,
            session_cookie,
            reconnect,
        }
    }
}

impl LiveChannel for PushChannel {
    fn subscribe(&self, on_event: LiveEventHandler) -> Result<Subscription, NotificationError> {
        self.url
            .as_str()
            .into_client_request()
            .map_err(|e| NotificationError::Channel(format!("invalid websocket url: {e}")))?;
        let runtime = Handle::try_current().map_err(|e| NotificationError::Channel(e.to_string()))?;

        tracing::info!(url = %self.url, "starting notification push channel");
        let task = runtime.spawn(run(
            self.url.clone(),
            self.session_cookie.clone(),
            self.reconnect,
            on_event,
        ));
        Ok(Subscription::new(task))
    }
}

async fn run(
    url: String,
    session_cookie: Option<String>,
    reconnect: ReconnectPolicy,
    on_event: LiveEventHandler,
) {
    let mut attempt: u32 = 0;
    let mut reported = false;

    loop {
        match connect(&url, session_cookie.as_deref()).await {
            Ok(mut stream) => {
                tracing::info!(%url, reconnect_attempts = attempt, "notification push channel connected");
                attempt = 0;
                reported = false;
                let reason = pump(&mut stream, &on_event).await;
                tracing::warn!(%reason, "notification push channel dropped");
            }
            Err(WsError::Http(response)) if response.status() == StatusCode::UNAUTHORIZED => {
                tracing::warn!("session expired, stopping notification push channel");
                on_event(LiveEvent::Failed(NotificationError::Auth));
                return;
            }
            Err(e) => {
                tracing::warn!(error = %e, %url, "failed to connect notification push channel");
                // Reported once per outage.
                if !reported {
                    on_event(LiveEvent::Failed(NotificationError::Channel(format!(
                        "push connection failed: {e}"
                    ))));
                    reported = true;
                }
            }
        }

        attempt += 1;
        let delay = reconnect.delay(attempt);
        metrics::counter!("notifications_channel_reconnects_total", "channel" => "push").increment(1);
        tracing::debug!(attempt, retry_in_ms = delay.as_millis() as u64, "reconnecting push channel");
        tokio::time::sleep(delay).await;
    }
}

async fn connect(url: &str, session_cookie: Option<&str>) -> Result<WsStream, WsError> {
    let mut request = url.into_client_request()?;
    if let Some(cookie) = session_cookie {
        let value = HeaderValue::from_str(cookie).map_err(|e| WsError::HttpFormat(e.into()))?;
        request.headers_mut().insert(COOKIE, value);
    }

    let (stream, _response) = connect_async(request).await?;
    Ok(stream)
}

/// Forwards frames until the connection ends; returns why it ended.
async fn pump(stream: &mut WsStream, on_event: &LiveEventHandler) -> String {
    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Text(text)) => match decode_frame(&text) {
                Ok(Some(notification)) => {
                    tracing::debug!(notification_id = %notification.id, "push notification received");
                    on_event(LiveEvent::Created(notification));
                }
                Ok(None) => tracing::trace!("ignoring non-notification frame"),
                Err(e) => tracing::warn!(error = %e, "malformed notification frame"),
            },
            Ok(Message::Close(frame)) => return format!("closed by server: {frame:?}"),
            Ok(_) => {}
            Err(e) => return e.to_string(),
        }
    }
    "stream ended".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::notification::NotificationType;

    #[test]
    fn test_decode_created_frame() {
        let text = r#"{
            "type": "notification.created",
            "notification": {
                "id": "n-9",
                "type": "new_message",
                "title": "New message",
                "content": "Lunch?",
                "createdAt": "2026-10-14T12:00:00Z"
            }
        }"#;

        let notification = decode_frame(text).unwrap().unwrap();

        assert_eq!(notification.id.as_str(), "n-9");
        assert_eq!(notification.notification_type, NotificationType::NewMessage);
    }

    #[test]
    fn test_decode_ignores_other_frames() {
        assert!(decode_frame(r#"{"type":"heartbeat"}"#).unwrap().is_none());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_frame("not json").is_err());
        assert!(decode_frame(r#"{"type":"notification.created"}"#).is_err());
    }

    #[test]
    fn test_subscribe_rejects_invalid_url() {
        let channel = PushChannel::new("not a url".to_string(), None, ReconnectPolicy::default());
        let result = channel.subscribe(Box::new(|_| {}));
        assert!(matches!(result, Err(NotificationError::Channel(_))));
    }
}
