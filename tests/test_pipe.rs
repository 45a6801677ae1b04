#![cfg(unix)]

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use httpipe::client::Client;
use httpipe::config::{ClientConfig, CodecConfig, PipeConfig};
use httpipe::error::Error;
use httpipe::http::connection::serve_connection;
use httpipe::http::request::Request;
use httpipe::http::response::Response;
use httpipe::server::{IncomingRequest, Server};
use httpipe::transport::pipe::socket_path;
use httpipe::transport::{Dial, Listen, PipeDialer, PipeListener, on_connection};

fn unique(name: &str) -> String {
    format!("{name}-{}", std::process::id())
}

fn say_hi(_req: IncomingRequest) -> impl Future<Output = anyhow::Result<Response>> + Send {
    async { Ok(Response::ok("hi")) }
}

#[tokio::test]
async fn test_pipe_round_trip() {
    let name = unique("t1");
    let mut server = Server::new(PipeListener::named(&name), say_hi, CodecConfig::default());
    server.start().await.unwrap();

    let client = Client::with_dialer(PipeDialer::named(&name));
    let response = client.send(Request::get("/x")).await.unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.reason(), "OK");
    assert_eq!(&response.bytes().await.unwrap()[..], b"hi");

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_pipe_raw_request() {
    let name = unique("raw");
    let mut server = Server::new(PipeListener::named(&name), say_hi, CodecConfig::default());
    server.start().await.unwrap();

    let mut conn = PipeDialer::named(&name)
        .dial(&CancellationToken::new())
        .await
        .unwrap();
    conn.write_all(b"GET /x HTTP/1.0\r\n\r\n").await.unwrap();
    let mut response = Vec::new();
    conn.read_to_end(&mut response).await.unwrap();

    assert_eq!(response, b"HTTP/1.0 200 OK\nContent-Length: 2\n\nhi");
    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_pipe_premature_disconnect_keeps_listener_alive() {
    let name = unique("early");
    let (results_tx, mut results) = mpsc::unbounded_channel();
    let handler = Arc::new(say_hi);
    let codec = CodecConfig::default();

    let mut listener = PipeListener::named(&name);
    listener
        .listen(
            on_connection(move |conn| {
                let results = results_tx.clone();
                let handler = Arc::clone(&handler);
                let codec = codec.clone();
                async move {
                    let result = serve_connection(conn, &*handler, &codec).await;
                    let _ = results.send(result);
                }
            }),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let dialer = PipeDialer::named(&name);
    let mut conn = dialer.dial(&CancellationToken::new()).await.unwrap();
    conn.write_all(b"GET /x HTTP/1.0\n").await.unwrap();
    drop(conn);

    let first = tokio::time::timeout(Duration::from_secs(5), results.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(first, Err(Error::UnexpectedEndOfStream)));

    let client = Client::with_dialer(dialer);
    let response = client.send(Request::get("/x")).await.unwrap();
    assert_eq!(response.text().await.unwrap(), "hi");
    assert!(results.recv().await.unwrap().is_ok());

    listener.stop().await.unwrap();
}

#[tokio::test]
async fn test_pipe_accepts_burst_right_after_listen() {
    let name = unique("burst");
    let mut server = Server::new(PipeListener::named(&name), say_hi, CodecConfig::default());
    server.start().await.unwrap();

    let client = Arc::new(Client::new(
        PipeDialer::named(&name),
        CodecConfig::default(),
        ClientConfig {
            request_timeout_ms: Some(5000),
        },
    ));
    let mut tasks = Vec::new();
    for i in 0..50 {
        let client = Arc::clone(&client);
        tasks.push(tokio::spawn(async move {
            let response = client.send(Request::get(format!("/{i}"))).await?;
            response.text().await
        }));
    }

    for task in tasks {
        assert_eq!(task.await.unwrap().unwrap(), "hi");
    }
    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_pipe_dial_fails_after_stop() {
    let name = unique("stopped");
    let mut server = Server::new(PipeListener::named(&name), say_hi, CodecConfig::default());
    server.start().await.unwrap();
    assert!(socket_path(&name).exists());

    server.stop().await.unwrap();

    assert!(!socket_path(&name).exists());
    let result = PipeDialer::named(&name)
        .dial(&CancellationToken::new())
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_pipe_listen_twice_fails() {
    let name = unique("twice");
    let mut listener = PipeListener::named(&name);
    let callback = on_connection(|_conn| async {});

    listener
        .listen(callback.clone(), &CancellationToken::new())
        .await
        .unwrap();
    assert!(listener.is_listening());

    let again = listener.listen(callback, &CancellationToken::new()).await;
    assert!(matches!(again, Err(Error::AlreadyListening)));

    listener.stop().await.unwrap();
    assert!(!listener.is_listening());
}

#[tokio::test]
async fn test_pipe_rejects_invalid_config() {
    let mut listener = PipeListener::new(PipeConfig {
        workers: 0,
        ..PipeConfig::named(unique("invalid"))
    });

    let result = listener
        .listen(on_connection(|_conn| async {}), &CancellationToken::new())
        .await;

    assert!(matches!(result, Err(Error::Config(_))));
}

#[tokio::test]
async fn test_pipe_replaces_stale_socket() {
    let name = unique("stale");
    let path = socket_path(&name);
    // bound and dropped without unlinking, like a crashed server
    drop(std::os::unix::net::UnixListener::bind(&path).unwrap());
    assert!(path.exists());

    let mut server = Server::new(PipeListener::named(&name), say_hi, CodecConfig::default());
    server.start().await.unwrap();

    let client = Client::with_dialer(PipeDialer::named(&name));
    let response = client.send(Request::get("/")).await.unwrap();
    assert_eq!(response.text().await.unwrap(), "hi");

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_pipe_stop_without_listen() {
    let mut listener = PipeListener::named(unique("idle"));

    listener.stop().await.unwrap();
}
