use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tungstenite::handshake::server::Request;
use tungstenite::http::StatusCode;
use tungstenite::protocol::Message as WsMessage;

use crate::config::HubSettings;
use crate::events::{UserEvent, WorkspaceEvent};
use crate::hub::{Hubs, Message, TopicKey, UserEmail, WorkspaceId};
use crate::transport::admission::{Admission, OpenAdmission};
use crate::transport::route::Route;
use crate::transport::websocket::serve;

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start_server(settings: HubSettings, admission: Arc<dyn Admission>) -> (SocketAddr, Hubs) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().unwrap();
    let hubs = Hubs::new(&settings);
    tokio::spawn(serve(listener, hubs.clone(), admission));
    (addr, hubs)
}

async fn open_server() -> (SocketAddr, Hubs) {
    start_server(HubSettings::default(), Arc::new(OpenAdmission)).await
}

async fn connect(addr: SocketAddr, path: &str) -> Client {
    let (ws_stream, _) = connect_async(format!("ws://{addr}{path}"))
        .await
        .expect("WebSocket handshake failed");
    ws_stream
}

async fn connect_status(addr: SocketAddr, path: &str) -> StatusCode {
    match connect_async(format!("ws://{addr}{path}")).await {
        Err(tungstenite::Error::Http(response)) => response.status(),
        Err(e) => panic!("Expected an HTTP rejection, got {e}"),
        Ok(_) => panic!("Expected the handshake for {path} to be rejected"),
    }
}

/// Poll until `condition` holds; registration happens just after the
/// handshake response, so the client can get ahead of the server.
async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met within 2s");
}

async fn next_json(client: &mut Client) -> Value {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(2), client.next())
            .await
            .expect("Timed out waiting for a message")
            .expect("Stream ended")
            .expect("Read failed");
        match frame {
            WsMessage::Text(text) => return serde_json::from_str(text.as_str()).unwrap(),
            WsMessage::Ping(_) | WsMessage::Pong(_) => continue,
            other => panic!("Expected a text message, got {other:?}"),
        }
    }
}

async fn assert_silent(client: &mut Client) {
    let res = tokio::time::timeout(Duration::from_millis(150), client.next()).await;
    assert!(res.is_err(), "Expected no message, got {res:?}");
}

fn ws(id: &str) -> WorkspaceId {
    WorkspaceId::parse(id).unwrap()
}

fn email(address: &str) -> UserEmail {
    UserEmail::parse(address).unwrap()
}

#[tokio::test]
async fn test_subscriber_receives_workspace_event() {
    let (addr, hubs) = open_server().await;
    let mut c1 = connect(addr, "/ws/ws-1").await;
    let mut other = connect(addr, "/ws/ws-9").await;
    wait_until(|| hubs.workspaces.connection_count() == 2).await;

    let event = WorkspaceEvent::TaskCreated {
        task: json!({"id": "t-1", "title": "Plan launch"}),
    };
    let report = hubs.notify_workspace(&ws("ws-1"), &event).unwrap();
    assert_eq!(report.delivered, 1);

    assert_eq!(
        next_json(&mut c1).await,
        json!({"type": "task_created", "task": {"id": "t-1", "title": "Plan launch"}})
    );
    assert_silent(&mut c1).await;
    assert_silent(&mut other).await;
}

#[tokio::test]
async fn test_abrupt_disconnect_is_pruned() {
    let (addr, hubs) = open_server().await;
    let c1 = connect(addr, "/ws/ws-1").await;
    let mut c2 = connect(addr, "/ws/ws-1").await;
    wait_until(|| hubs.workspaces.subscriber_count(&ws("ws-1")) == 2).await;

    // no close handshake, just drop the socket
    drop(c1);
    wait_until(|| hubs.workspaces.subscriber_count(&ws("ws-1")) == 1).await;

    let event = WorkspaceEvent::TaskDeleted {
        task_id: "t-1".to_string(),
    };
    hubs.notify_workspace(&ws("ws-1"), &event).unwrap();
    assert_eq!(
        next_json(&mut c2).await,
        json!({"type": "task_deleted", "task_id": "t-1"})
    );
    assert_eq!(hubs.workspaces.topic_count(), 1);
}

#[tokio::test]
async fn test_clean_close_removes_topic() {
    let (addr, hubs) = open_server().await;
    let mut c1 = connect(addr, "/ws/ws-1").await;
    wait_until(|| hubs.workspaces.connection_count() == 1).await;

    c1.close(None).await.expect("Failed to close WebSocket");
    wait_until(|| hubs.workspaces.topic_count() == 0).await;
}

#[tokio::test]
async fn test_broadcast_without_subscribers() {
    let (_addr, hubs) = open_server().await;
    let report = hubs
        .notify_workspace(
            &ws("ws-2"),
            &WorkspaceEvent::MediaUploaded {
                media: json!({"id": "m-1"}),
            },
        )
        .unwrap();
    assert_eq!(report.delivered, 0);
    assert_eq!(report.failed, 0);
    assert_eq!(hubs.workspaces.topic_count(), 0);
}

#[tokio::test]
async fn test_invitation_hub_is_separate_namespace() {
    let (addr, hubs) = open_server().await;
    let mut c1 = connect(addr, "/ws/invitations/user%40example.com").await;
    wait_until(|| hubs.users.subscriber_count(&email("user@example.com")) == 1).await;

    let event = UserEvent::InvitationCreated {
        invitation: json!({"workspace_id": "ws-1", "role": "viewer"}),
    };
    hubs.notify_user(&email("user@example.com"), &event).unwrap();
    let received = next_json(&mut c1).await;
    assert_eq!(received["type"], "invitation_created");
    assert_eq!(received["invitation"]["role"], "viewer");

    let report = hubs
        .notify_workspace(
            &ws("ws-1"),
            &WorkspaceEvent::MemberAdded {
                user_id: "u-1".to_string(),
            },
        )
        .unwrap();
    assert_eq!(report.delivered, 0);
    assert_silent(&mut c1).await;
}

#[tokio::test]
async fn test_events_arrive_in_order() {
    let (addr, hubs) = open_server().await;
    let mut c1 = connect(addr, "/ws/ws-1").await;
    let mut c2 = connect(addr, "/ws/ws-1").await;
    wait_until(|| hubs.workspaces.subscriber_count(&ws("ws-1")) == 2).await;

    for i in 0..20 {
        let event = WorkspaceEvent::TaskUpdated {
            task_id: format!("t-{i}"),
        };
        hubs.notify_workspace(&ws("ws-1"), &event).unwrap();
    }

    for client in [&mut c1, &mut c2] {
        for i in 0..20 {
            assert_eq!(next_json(client).await["task_id"], format!("t-{i}"));
        }
    }
}

#[tokio::test]
async fn test_client_messages_are_ignored() {
    let (addr, hubs) = open_server().await;
    let mut c1 = connect(addr, "/ws/ws-1").await;
    wait_until(|| hubs.workspaces.connection_count() == 1).await;

    c1.send(WsMessage::Text(r#"{"type":"publish","topic":"ws-2"}"#.into()))
        .await
        .expect("Failed to send");
    c1.send(WsMessage::Binary(vec![1, 2, 3].into()))
        .await
        .expect("Failed to send");
    assert_silent(&mut c1).await;
    assert_eq!(hubs.workspaces.topic_count(), 1);

    hubs.notify_workspace(
        &ws("ws-1"),
        &WorkspaceEvent::DraftPublished {
            draft_id: "d-1".to_string(),
        },
    )
    .unwrap();
    assert_eq!(next_json(&mut c1).await["draftId"], "d-1");
}

#[tokio::test]
async fn test_forced_close_ends_session() {
    let (addr, hubs) = open_server().await;
    let mut c1 = connect(addr, "/ws/ws-1").await;
    wait_until(|| hubs.workspaces.connection_count() == 1).await;

    assert_eq!(hubs.workspaces.close_topic(&ws("ws-1")), 1);

    let ended = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            match c1.next().await {
                Some(Ok(WsMessage::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => continue,
            }
        }
    })
    .await;
    assert!(ended.is_ok(), "Server did not close the connection");
    assert_eq!(hubs.workspaces.connection_count(), 0);
}

#[tokio::test]
async fn test_unknown_path_is_rejected() {
    let (addr, hubs) = open_server().await;
    assert_eq!(connect_status(addr, "/socket").await, StatusCode::NOT_FOUND);
    assert_eq!(connect_status(addr, "/ws/a/b").await, StatusCode::NOT_FOUND);
    assert_eq!(
        connect_status(addr, "/ws/invitations/nobody").await,
        StatusCode::BAD_REQUEST
    );
    assert_eq!(hubs.workspaces.connection_count(), 0);
    assert_eq!(hubs.users.connection_count(), 0);
}

#[tokio::test]
async fn test_full_hub_rejects_upgrade() {
    let settings = HubSettings {
        max_connections: 1,
        ..HubSettings::default()
    };
    let (addr, hubs) = start_server(settings, Arc::new(OpenAdmission)).await;
    let _c1 = connect(addr, "/ws/ws-1").await;
    wait_until(|| hubs.workspaces.connection_count() == 1).await;

    assert_eq!(
        connect_status(addr, "/ws/ws-2").await,
        StatusCode::SERVICE_UNAVAILABLE
    );
    // the user hub has its own budget
    let _c2 = connect(addr, "/ws/invitations/a@example.com").await;
}

struct WorkspaceOnly;

impl Admission for WorkspaceOnly {
    fn admit(&self, route: &Route, _request: &Request) -> bool {
        matches!(route, Route::Workspace(id) if id.as_str() == "ws-allowed")
    }
}

#[tokio::test]
async fn test_admission_refusal_is_forbidden() {
    let (addr, hubs) = start_server(HubSettings::default(), Arc::new(WorkspaceOnly)).await;
    assert_eq!(connect_status(addr, "/ws/ws-denied").await, StatusCode::FORBIDDEN);
    assert_eq!(
        connect_status(addr, "/ws/invitations/a@example.com").await,
        StatusCode::FORBIDDEN
    );

    let _c1 = connect(addr, "/ws/ws-allowed").await;
    wait_until(|| hubs.workspaces.connection_count() == 1).await;
    assert_eq!(hubs.users.connection_count(), 0);
}

#[tokio::test]
async fn test_heartbeat_pings_idle_clients() {
    let settings = HubSettings {
        heartbeat_interval_secs: 1,
        ..HubSettings::default()
    };
    let (addr, hubs) = start_server(settings, Arc::new(OpenAdmission)).await;
    let mut c1 = connect(addr, "/ws/ws-1").await;
    wait_until(|| hubs.workspaces.connection_count() == 1).await;

    let frame = tokio::time::timeout(Duration::from_secs(3), c1.next())
        .await
        .expect("No ping within 3s")
        .expect("Stream ended")
        .expect("Read failed");
    assert!(matches!(frame, WsMessage::Ping(_)), "Expected a ping, got {frame:?}");
    assert_eq!(hubs.workspaces.connection_count(), 1);
}

#[tokio::test]
async fn test_stalled_reader_hits_write_deadline() {
    let settings = HubSettings {
        send_buffer: 1024,
        write_timeout_ms: 100,
        ..HubSettings::default()
    };
    let (addr, hubs) = start_server(settings, Arc::new(OpenAdmission)).await;
    // never polled again, so the socket buffers fill up
    let _stalled = connect(addr, "/ws/ws-1").await;
    wait_until(|| hubs.workspaces.connection_count() == 1).await;

    let bulk = Message::raw("bulk", "x".repeat(256 * 1024));
    let mut sent = 0;
    let mut failed = 0;
    while hubs.workspaces.connection_count() > 0 && sent < 400 {
        failed += hubs.workspaces.broadcast(&ws("ws-1"), &bulk).failed;
        sent += 1;
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    wait_until(|| hubs.workspaces.connection_count() == 0).await;
    // removed by the writer's deadline, not by a full buffer
    assert_eq!(failed, 0);
    assert_eq!(hubs.workspaces.topic_count(), 0);
}
