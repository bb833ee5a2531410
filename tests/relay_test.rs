//! End-to-end tests: a real relay on a random port, real WebSocket clients.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use futures::{SinkExt, StreamExt};
use jsonwebtoken::{encode, EncodingKey, Header};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::{self, client::IntoClientRequest, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tower::ServiceExt;

use wsrelay::auth::Claims;
use wsrelay::config::RelayConfig;
use wsrelay::liveness;
use wsrelay::routes::build_router;
use wsrelay::state::AppState;

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const SECRET: &str = "integration-secret";
const ORIGIN: &str = "http://localhost:8080";

fn test_config() -> RelayConfig {
    RelayConfig::with_secret(SECRET)
}

fn mint_token(secret: &str, sub: &str) -> String {
    let claims = Claims {
        sub: Some(sub.to_string()),
        exp: Some(chrono::Utc::now().timestamp() as u64 + 600),
        iat: None,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

/// Start the relay on a random port with the liveness monitor running
async fn start_server(config: RelayConfig) -> (SocketAddr, Arc<AppState>) {
    let state = Arc::new(AppState::new(config));
    liveness::spawn_liveness_monitor(state.clone());

    let app = build_router(state.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, state)
}

async fn connect(
    addr: SocketAddr,
    name: &str,
    token: Option<&str>,
    origin: &str,
) -> Result<Client, tungstenite::Error> {
    let mut request = format!("ws://{}/ws?name={}", addr, name)
        .into_client_request()
        .unwrap();
    if let Some(token) = token {
        request.headers_mut().insert(
            header::AUTHORIZATION,
            format!("Bearer {}", token).parse().unwrap(),
        );
    }
    request
        .headers_mut()
        .insert(header::ORIGIN, origin.parse().unwrap());

    let (ws, _) = tokio_tungstenite::connect_async(request).await?;
    Ok(ws)
}

async fn connect_ok(addr: SocketAddr, name: &str) -> Client {
    let token = mint_token(SECRET, name);
    connect(addr, name, Some(&token), ORIGIN)
        .await
        .expect("valid client should connect")
}

/// Wait until the registry holds exactly `n` connections
async fn wait_for_connections(state: &AppState, n: usize) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
    loop {
        let len = state.registry.len().await;
        if len == n {
            return;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "expected {} connections, registry has {}",
            n,
            len
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Next data frame as text, skipping control frames. None on timeout or close.
async fn next_text(client: &mut Client, wait: Duration) -> Option<String> {
    let deadline = tokio::time::Instant::now() + wait;
    loop {
        match tokio::time::timeout_at(deadline, client.next()).await {
            Ok(Some(Ok(Message::Text(t)))) => return Some(t.as_str().to_string()),
            Ok(Some(Ok(Message::Binary(b)))) => {
                return Some(String::from_utf8_lossy(&b).into_owned())
            }
            Ok(Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)))) => continue,
            _ => return None,
        }
    }
}

fn http_status(err: tungstenite::Error) -> StatusCode {
    match err {
        tungstenite::Error::Http(response) => {
            StatusCode::from_u16(response.status().as_u16()).unwrap()
        }
        other => panic!("expected HTTP rejection, got {:?}", other),
    }
}

#[tokio::test]
async fn test_three_clients_hello_scenario() {
    let (addr, state) = start_server(test_config()).await;

    let mut a = connect_ok(addr, "alice").await;
    let mut b = connect_ok(addr, "bob").await;
    let mut c = connect_ok(addr, "carol").await;
    wait_for_connections(&state, 3).await;

    a.send(Message::Text("hello".into())).await.unwrap();

    assert_eq!(
        next_text(&mut b, Duration::from_secs(2)).await.as_deref(),
        Some("hello")
    );
    assert_eq!(
        next_text(&mut c, Duration::from_secs(2)).await.as_deref(),
        Some("hello")
    );

    // Exactly one copy each, nothing echoed to the sender
    assert_eq!(next_text(&mut b, Duration::from_millis(200)).await, None);
    assert_eq!(next_text(&mut c, Duration::from_millis(200)).await, None);
    assert_eq!(next_text(&mut a, Duration::from_millis(200)).await, None);
}

#[tokio::test]
async fn test_binary_frames_are_relayed() {
    let (addr, state) = start_server(test_config()).await;

    let mut a = connect_ok(addr, "alice").await;
    let mut b = connect_ok(addr, "bob").await;
    wait_for_connections(&state, 2).await;

    b.send(Message::Binary(vec![0x68, 0x69].into())).await.unwrap();

    match tokio::time::timeout(Duration::from_secs(2), a.next()).await {
        Ok(Some(Ok(Message::Binary(data)))) => assert_eq!(&data[..], b"hi"),
        other => panic!("expected binary frame, got {:?}", other),
    }
}

#[tokio::test]
async fn test_rejected_auth_does_not_grow_registry() {
    let (addr, state) = start_server(test_config()).await;

    let _existing = connect_ok(addr, "existing").await;
    wait_for_connections(&state, 1).await;

    let err = connect(addr, "nobody", None, ORIGIN).await.unwrap_err();
    assert_eq!(http_status(err), StatusCode::UNAUTHORIZED);

    let forged = mint_token("wrong-secret", "mallory");
    let err = connect(addr, "mallory", Some(&forged), ORIGIN)
        .await
        .unwrap_err();
    assert_eq!(http_status(err), StatusCode::UNAUTHORIZED);

    let err = connect(addr, "garbage", Some("not-a-token"), ORIGIN)
        .await
        .unwrap_err();
    assert_eq!(http_status(err), StatusCode::UNAUTHORIZED);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(state.registry.len().await, 1);
}

#[tokio::test]
async fn test_disallowed_origin_is_refused() {
    let (addr, state) = start_server(test_config()).await;
    let token = mint_token(SECRET, "eve");

    let err = connect(addr, "eve", Some(&token), "https://evil.example")
        .await
        .unwrap_err();
    assert_eq!(http_status(err), StatusCode::FORBIDDEN);

    // Case-insensitive match is accepted
    let _ok = connect(addr, "eve", Some(&token), "HTTP://LOCALHOST:8080")
        .await
        .expect("origin match is case-insensitive");
    wait_for_connections(&state, 1).await;
}

#[tokio::test]
async fn test_disconnect_unregisters_client() {
    let (addr, state) = start_server(test_config()).await;

    let mut a = connect_ok(addr, "alice").await;
    let mut b = connect_ok(addr, "bob").await;
    wait_for_connections(&state, 2).await;

    b.close(None).await.unwrap();
    wait_for_connections(&state, 1).await;

    let remaining = state.registry.snapshot_all().await;
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].name(), "alice");

    // Nobody left to receive, and the sender is unaffected
    a.send(Message::Text("anyone?".into())).await.unwrap();
    assert_eq!(next_text(&mut a, Duration::from_millis(200)).await, None);
}

#[tokio::test]
async fn test_probe_keeps_responsive_client_and_evicts_silent_one() {
    let mut config = test_config();
    config.ping_interval = Duration::from_millis(50);
    config.keepalive_window = Duration::from_millis(300);
    let (addr, state) = start_server(config).await;

    // Reading keeps tungstenite answering pings with pongs
    let mut alive = connect_ok(addr, "alive").await;
    let reader = tokio::spawn(async move {
        while let Some(Ok(_)) = alive.next().await {}
    });

    // Never polled, so its pongs are never sent
    let _silent = connect_ok(addr, "silent").await;
    wait_for_connections(&state, 2).await;

    tokio::time::sleep(Duration::from_millis(1000)).await;

    let remaining = state.registry.snapshot_all().await;
    assert_eq!(remaining.len(), 1, "silent client should be evicted");
    assert_eq!(remaining[0].name(), "alive");

    reader.abort();
}

#[tokio::test]
async fn test_plain_http_request_to_ws_is_rejected() {
    let state = Arc::new(AppState::new(test_config()));
    let app = build_router(state.clone());
    let token = mint_token(SECRET, "curl");

    // Authenticated and allowed, but not a WebSocket handshake
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/ws?name=curl")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .header(header::ORIGIN, ORIGIN)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Credential is checked before anything else
    let response = app
        .oneshot(
            Request::builder()
                .uri("/ws")
                .header(header::ORIGIN, "https://evil.example")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    assert!(state.registry.is_empty().await);
}

#[tokio::test]
async fn test_health_endpoint() {
    let state = Arc::new(AppState::new(test_config()));
    let app = build_router(state);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["connections"], 0);
}
