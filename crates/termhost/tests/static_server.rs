#![expect(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions use unwrap/expect for clarity."
)]

//! Static file server over real sockets.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use termhost::domain::IoEvent;
use termhost::domain::SessionId;
use termhost::infra::IoEventBus;
use termhost::infra::StaticServerToggle;
use termhost::infra::static_server::ToggleOutcome;
use termhost::infra::static_server::ToggleRequest;
use termhost_common::error_codes;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

const HOST: &str = "127.0.0.1";

fn site() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("index.html"), "<h1>home</h1>").unwrap();
    std::fs::write(dir.path().join("app.js"), "console.log(1);").unwrap();
    std::fs::create_dir(dir.path().join("docs")).unwrap();
    std::fs::write(dir.path().join("docs").join("index.html"), "docs").unwrap();
    dir
}

fn request(root: &Path, port: u16) -> ToggleRequest {
    ToggleRequest {
        root_path: root.to_path_buf(),
        port,
        default_file: "index.html".to_string(),
        session_id: SessionId::new(7),
    }
}

async fn start(server: &StaticServerToggle, root: &Path) -> u16 {
    match server.toggle(request(root, 0)).await.unwrap() {
        ToggleOutcome::Started { port } => port,
        other => panic!("expected start, got {other:?}"),
    }
}

struct Reply {
    status: String,
    head: String,
    body: String,
}

/// Raw HTTP/1.1 GET.
async fn fetch(port: u16, path: &str) -> Reply {
    let mut stream = TcpStream::connect((HOST, port)).await.unwrap();
    let request = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut raw = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut raw))
        .await
        .expect("response timed out")
        .unwrap();
    let raw = String::from_utf8_lossy(&raw).into_owned();
    let status = raw.lines().next().unwrap_or_default().to_string();
    let (head, body) = raw.split_once("\r\n\r\n").unwrap_or((raw.as_str(), ""));
    Reply {
        status,
        head: head.to_ascii_lowercase(),
        body: body.to_string(),
    }
}

async fn get(port: u16, path: &str) -> (String, String) {
    let reply = fetch(port, path).await;
    (reply.status, reply.body)
}

#[tokio::test]
async fn serves_files_and_default_document() {
    let dir = site();
    let bus = Arc::new(IoEventBus::new());
    let server = StaticServerToggle::new(HOST, bus.clone());
    let port = start(&server, dir.path()).await;
    assert!(port > 0);
    assert!(server.is_listening().await);

    let reply = fetch(port, "/app.js").await;
    assert!(reply.status.contains("200"), "{}", reply.status);
    assert!(reply.head.contains("content-type: text/javascript"), "{}", reply.head);
    assert_eq!(reply.body, "console.log(1);");

    let reply = fetch(port, "/").await;
    assert!(reply.status.contains("200"), "{}", reply.status);
    assert!(reply.head.contains("content-type: text/html"), "{}", reply.head);
    assert_eq!(reply.body, "<h1>home</h1>");

    let (status, body) = get(port, "/docs/").await;
    assert!(status.contains("200"), "{status}");
    assert_eq!(body, "docs");

    assert_eq!(server.toggle(request(dir.path(), 0)).await.unwrap(), ToggleOutcome::Stopped);
    assert!(!server.is_listening().await);
}

#[tokio::test]
async fn missing_and_escaping_paths_are_refused() {
    let dir = site();
    let bus = Arc::new(IoEventBus::new());
    let server = StaticServerToggle::new(HOST, bus.clone());
    let port = start(&server, dir.path()).await;

    let (status, _) = get(port, "/nope.txt").await;
    assert!(status.contains("404"), "{status}");

    let (status, _) = get(port, "/../secret").await;
    assert!(status.contains("403"), "{status}");

    let (status, _) = get(port, "/%2e%2e/secret").await;
    assert!(status.contains("403"), "{status}");

    assert!(server.shutdown().await);
}

#[tokio::test]
async fn requests_are_logged_to_the_session() {
    let dir = site();
    let bus = Arc::new(IoEventBus::new());
    let mut events = bus.subscribe(SessionId::new(7));
    let server = StaticServerToggle::new(HOST, bus.clone());
    let port = start(&server, dir.path()).await;

    get(port, "/app.js").await;
    get(port, "/missing").await;

    let mut messages = Vec::new();
    while messages.len() < 2 {
        let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("no server log")
            .unwrap();
        if let IoEvent::ServerLog { message, .. } = event {
            messages.push(message);
        }
    }
    assert!(messages[0].starts_with("GET /app.js"), "{}", messages[0]);
    assert!(messages[0].contains("200"));
    assert!(messages[1].starts_with("GET /missing"), "{}", messages[1]);
    assert!(messages[1].contains("404"));

    server.shutdown().await;
}

#[tokio::test]
async fn port_in_use_is_reported_without_starting() {
    let dir = site();
    let occupied = std::net::TcpListener::bind((HOST, 0)).unwrap();
    let port = occupied.local_addr().unwrap().port();
    let server = StaticServerToggle::new(HOST, Arc::new(IoEventBus::new()));

    let outcome = server.toggle(request(dir.path(), port)).await.unwrap();

    assert_eq!(
        outcome,
        ToggleOutcome::Error {
            message: format!("Port {port} is already in use.")
        }
    );
    assert!(!server.is_listening().await);
}

#[tokio::test]
async fn non_directory_root_is_rejected() {
    let dir = site();
    let server = StaticServerToggle::new(HOST, Arc::new(IoEventBus::new()));

    let err = server
        .toggle(request(&dir.path().join("index.html"), 0))
        .await
        .unwrap_err();

    assert_eq!(err.code(), error_codes::INVALID_DIRECTORY);
    assert!(!server.is_listening().await);
}

#[tokio::test]
async fn port_is_free_again_after_stop() {
    let dir = site();
    let server = StaticServerToggle::new(HOST, Arc::new(IoEventBus::new()));
    let port = start(&server, dir.path()).await;

    server.shutdown().await;

    assert!(TcpStream::connect((HOST, port)).await.is_err());
}
