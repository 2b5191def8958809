use std::sync::{Arc, Mutex};
use std::time::Duration;

use engage_notify::transport::live::{PushChannel, ReconnectPolicy};
use engage_notify::usecase::contracts::{LiveChannel, LiveEvent};
use engage_notify::usecase::error::NotificationError;
use futures::SinkExt;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;

fn created_frame(id: &str) -> Message {
    Message::Text(
        json!({
            "type": "notification.created",
            "notification": {
                "id": id,
                "type": "job_posted",
                "title": "New opening",
                "content": "Senior Manager, Tax",
                "createdAt": "2026-10-14T12:00:00Z"
            }
        })
        .to_string(),
    )
}

fn reconnect() -> ReconnectPolicy {
    ReconnectPolicy::new(Duration::from_millis(20), Duration::from_millis(100))
}

async fn recv(rx: &mut mpsc::UnboundedReceiver<LiveEvent>) -> LiveEvent {
    tokio::time::timeout(Duration::from_secs(3), rx.recv())
        .await
        .expect("no live event delivered")
        .unwrap()
}

async fn recv_created(rx: &mut mpsc::UnboundedReceiver<LiveEvent>) -> String {
    match recv(rx).await {
        LiveEvent::Created(notification) => notification.id.as_str().to_string(),
        other => panic!("expected a notification, got {other:?}"),
    }
}

#[tokio::test]
async fn test_delivers_frames_and_sends_session_cookie() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}/ws/notifications", listener.local_addr().unwrap());
    let cookie = Arc::new(Mutex::new(None::<String>));

    let seen_cookie = Arc::clone(&cookie);
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let callback = |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
            *seen_cookie.lock().unwrap() = request
                .headers()
                .get("cookie")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            Ok(response)
        };
        let mut ws = accept_hdr_async(stream, callback).await.unwrap();
        ws.send(Message::Text(r#"{"type":"heartbeat"}"#.to_string()))
            .await
            .unwrap();
        ws.send(Message::Text("garbage".to_string())).await.unwrap();
        ws.send(created_frame("n-1")).await.unwrap();
        std::future::pending::<()>().await;
    });

    let (tx, mut rx) = mpsc::unbounded_channel();
    let channel = PushChannel::new(url, Some("sid=abc123".to_string()), reconnect());
    let subscription = channel
        .subscribe(Box::new(move |event| {
            let _ = tx.send(event);
        }))
        .unwrap();

    let delivered = recv_created(&mut rx).await;

    assert_eq!(delivered, "n-1");
    assert_eq!(cookie.lock().unwrap().as_deref(), Some("sid=abc123"));
    assert!(subscription.is_active());
}

#[tokio::test]
async fn test_reconnects_after_server_closes() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}/ws/notifications", listener.local_addr().unwrap());

    tokio::spawn(async move {
        for id in ["first", "second"] {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            ws.send(created_frame(id)).await.unwrap();
            let _ = ws.close(None).await;
        }
    });

    let (tx, mut rx) = mpsc::unbounded_channel();
    let _subscription = PushChannel::new(url, None, reconnect())
        .subscribe(Box::new(move |event| {
            let _ = tx.send(event);
        }))
        .unwrap();

    assert_eq!(recv_created(&mut rx).await, "first");
    assert_eq!(recv_created(&mut rx).await, "second");
}

#[tokio::test]
async fn test_rejected_handshake_reports_expired_session() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}/ws/notifications", listener.local_addr().unwrap());

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let reject = |_: &Request, _: Response| -> Result<Response, ErrorResponse> {
            let mut response = ErrorResponse::new(None);
            *response.status_mut() = StatusCode::UNAUTHORIZED;
            Err(response)
        };
        let _ = accept_hdr_async(stream, reject).await;
    });

    let (tx, mut rx) = mpsc::unbounded_channel();
    let subscription = PushChannel::new(url, None, reconnect())
        .subscribe(Box::new(move |event| {
            let _ = tx.send(event);
        }))
        .unwrap();

    assert_eq!(recv(&mut rx).await, LiveEvent::Failed(NotificationError::Auth));

    tokio::time::timeout(Duration::from_secs(2), async {
        while subscription.is_active() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("push channel kept reconnecting after 401");
}
