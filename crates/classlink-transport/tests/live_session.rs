//! End-to-end: a real WebSocket server on loopback, the production connector,
//! a dropped connection, and replay after reconnect.

use std::time::Duration;

use classlink_transport::sink::ChannelSink;
use classlink_transport::{
    ConnectionTarget, LiveSession, ReconnectPolicy, Role, SessionState, TransportConfig,
};
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};

type ServerSocket = WebSocketStream<TcpStream>;

async fn spawn_server() -> (String, mpsc::UnboundedReceiver<(String, ServerSocket)>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();
    let _ = tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let (uri_tx, uri_rx) = std::sync::mpsc::channel();
            let callback = move |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
                let _ = uri_tx.send(req.uri().to_string());
                Ok(resp)
            };
            let Ok(ws) = tokio_tungstenite::accept_hdr_async(stream, callback).await else {
                continue;
            };
            let uri = uri_rx.recv().unwrap_or_default();
            if tx.send((uri, ws)).is_err() {
                break;
            }
        }
    });
    (format!("ws://{addr}"), rx)
}

async fn next_json(ws: &mut ServerSocket) -> Value {
    loop {
        let message = timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("frame within 5s")
            .expect("socket open")
            .expect("read ok");
        if let Message::Text(text) = message {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition within 5s");
}

fn config() -> TransportConfig {
    TransportConfig {
        heartbeat_interval: Duration::from_secs(60),
        reconnect: ReconnectPolicy::new(
            vec![Duration::from_millis(50)],
            Duration::from_millis(100),
            3,
        ),
        connect_timeout: Duration::from_secs(2),
        ..TransportConfig::default()
    }
}

#[tokio::test]
async fn join_ack_drop_reconnect_replay() {
    let (base, mut accepted) = spawn_server().await;
    let target = ConnectionTarget::new("live-42", "s cret")
        .with_participant("t-1", Role::Teacher)
        .with_endpoint_base(base);
    let (sink, mut events) = ChannelSink::new();
    let session = LiveSession::new(target, config(), sink);

    let (uri, mut first) = timeout(Duration::from_secs(5), accepted.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(uri, "/live/live-42/ws?token=s%20cret");

    let join = next_json(&mut first).await;
    assert_eq!(join["type"], "join");
    assert_eq!(join["seq"], 1);
    assert_eq!(join["payload"]["role"], "teacher");
    assert!(join["ts"].as_str().unwrap().ends_with('Z'));

    first
        .send(Message::Text(json!({"type": "joined", "ack_seq": 1}).to_string().into()))
        .await
        .unwrap();
    let joined = timeout(Duration::from_secs(5), events.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(joined.kind, "joined");
    assert_eq!(session.pending_count(), 0);
    assert_eq!(session.current_status(), SessionState::Open);

    let seq = session.send_event("chat", json!({"text": "hi"}));
    assert_eq!(seq, 2);
    let chat = next_json(&mut first).await;
    assert_eq!(chat["seq"], 2);
    assert_eq!(chat["payload"]["text"], "hi");

    drop(first);

    let (_, mut second) = timeout(Duration::from_secs(5), accepted.recv())
        .await
        .unwrap()
        .unwrap();
    let rejoin = next_json(&mut second).await;
    assert_eq!(rejoin["type"], "join");
    assert_eq!(rejoin["seq"], 3);
    let replayed = next_json(&mut second).await;
    assert_eq!(replayed["type"], "chat");
    assert_eq!(replayed["seq"], 2);

    wait_until(|| session.current_status() == SessionState::Open).await;
    assert_eq!(session.reconnect_attempts(), 0);

    session.disconnect();
    let closing = timeout(Duration::from_secs(5), second.next()).await.unwrap();
    assert!(
        matches!(closing, None | Some(Ok(Message::Close(_)) | Err(_))),
        "server should see the client close, got {closing:?}"
    );
}

#[tokio::test]
async fn refused_endpoint_gives_up() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let target = ConnectionTarget::new("live-7", "tok").with_endpoint_base(format!("ws://{addr}"));
    let mut config = config();
    config.reconnect = config.reconnect.with_max_attempts(1);
    let (sink, _events) = ChannelSink::new();
    let session = LiveSession::new(target, config, sink);

    wait_until(|| session.current_status() == SessionState::Closed).await;
    assert_eq!(session.reconnect_attempts(), 2);
}
