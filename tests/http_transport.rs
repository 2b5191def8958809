use std::time::Duration;

use engage_notify::domain::filter::{NotificationFilter, PageRequest};
use engage_notify::domain::notification::{NotificationId, NotificationType};
use engage_notify::transport::errors::TransportError;
use engage_notify::transport::http::HttpNotificationTransport;
use engage_notify::usecase::contracts::NotificationTransport;
use serde_json::json;
use tokio_test::{assert_err, assert_ok};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn transport(server: &MockServer) -> HttpNotificationTransport {
    HttpNotificationTransport::new(&server.uri(), Some("sid=abc123"), Duration::from_secs(5))
        .unwrap()
}

#[tokio::test]
async fn test_fetch_sends_filter_and_decodes_page() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/notifications"))
        .and(query_param("page", "2"))
        .and(query_param("limit", "10"))
        .and(query_param("type", "new_message"))
        .and(query_param("isRead", "false"))
        .and(header("cookie", "sid=abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "notifications": [{
                "id": "n-1",
                "type": "new_message",
                "title": "New message",
                "content": "Are you coming to the offsite?",
                "isRead": false,
                "createdAt": "2026-10-14T09:30:00Z",
                "senderName": "Priya"
            }],
            "hasNext": true,
            "totalUnread": 12
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let filter = NotificationFilter {
        notification_type: Some(NotificationType::NewMessage),
        ..NotificationFilter::unread()
    };
    let result = transport(&mock_server)
        .fetch(PageRequest::new(2, 10), &filter)
        .await
        .unwrap();

    assert!(result.has_next);
    assert_eq!(result.total_unread, 12);
    assert_eq!(result.items.len(), 1);
    assert_eq!(result.items[0].id, NotificationId::from("n-1"));
    assert_eq!(result.items[0].sender_name.as_deref(), Some("Priya"));
}

#[tokio::test]
async fn test_unauthorized_maps_to_auth_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/notifications"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&mock_server)
        .await;

    let result = transport(&mock_server)
        .fetch(PageRequest::first(20), &NotificationFilter::default())
        .await;

    assert!(matches!(result, Err(TransportError::Unauthorized)));
}

#[tokio::test]
async fn test_malformed_body_is_decode_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/notifications"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&mock_server)
        .await;

    let result = transport(&mock_server)
        .fetch(PageRequest::first(20), &NotificationFilter::default())
        .await;

    assert!(matches!(result, Err(TransportError::Decode(_))));
}

#[tokio::test]
async fn test_mark_read_server_error_is_reported() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/api/notifications/n-7/read"))
        .respond_with(ResponseTemplate::new(500).set_body_string("database unavailable"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let result = transport(&mock_server)
        .mark_read(&NotificationId::from("n-7"))
        .await;

    match result {
        Err(TransportError::Http { status, message }) => {
            assert_eq!(status, 500);
            assert_eq!(message, "database unavailable");
        }
        other => panic!("expected http error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_error_body_is_cut_between_characters() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/api/notifications/n-8/read"))
        .respond_with(
            ResponseTemplate::new(500).set_body_string(format!("{}é la suite", "x".repeat(255))),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let error = assert_err!(
        transport(&mock_server)
            .mark_read(&NotificationId::from("n-8"))
            .await
    );

    assert_eq!(
        error,
        TransportError::Http {
            status: 500,
            message: "x".repeat(255),
        }
    );
}

#[tokio::test]
async fn test_mark_all_read() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/api/notifications/read-all"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    assert_ok!(transport(&mock_server).mark_all_read().await);
}

#[tokio::test]
async fn test_remove_and_archive_treat_missing_as_done() {
    let mock_server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/api/notifications/n-3"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/notifications/n-4/archive"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/api/notifications/n-5/read"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    let t = transport(&mock_server);
    assert_ok!(t.remove(&NotificationId::from("n-3")).await);
    assert_ok!(t.archive(&NotificationId::from("n-4")).await);
    let error = assert_err!(t.mark_read(&NotificationId::from("n-5")).await);

    assert!(matches!(error, TransportError::Http { status: 404, .. }));
}

#[tokio::test]
async fn test_unreachable_server_is_network_error() {
    let mock_server = MockServer::start().await;
    let uri = mock_server.uri();
    drop(mock_server);

    let t = HttpNotificationTransport::new(&uri, None, Duration::from_secs(2)).unwrap();
    let result = t.mark_all_read().await;

    assert!(matches!(result, Err(TransportError::Network(_))));
}
