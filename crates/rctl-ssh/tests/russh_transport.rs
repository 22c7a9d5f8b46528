//! RusshConnector against an in-process russh server

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use russh::server::{Auth, Handler};
use russh::Disconnect;
use russh_keys::key::KeyPair;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::time::Instant;

use rctl_core::traits::{Connector, Transport};
use rctl_core::{ConnectionConfig, ConnectionError};
use rctl_ssh::RusshConnector;

const PASSWORD: &str = "raspberry";

/// Server that accepts `PASSWORD`, or never answers when `stall_auth` is set
struct TestServer {
    stall_auth: bool,
}

#[async_trait]
impl Handler for TestServer {
    type Error = russh::Error;

    async fn auth_password(&mut self, _user: &str, password: &str) -> Result<Auth, Self::Error> {
        if self.stall_auth {
            std::future::pending::<()>().await;
        }
        if password == PASSWORD {
            Ok(Auth::Accept)
        } else {
            Ok(Auth::Reject {
                proceed_with_methods: None,
            })
        }
    }
}

/// Serve one connection on a random local port
async fn spawn_server(stall_auth: bool) -> (u16, oneshot::Receiver<russh::server::Handle>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let mut config = russh::server::Config::default();
    config.keys.push(KeyPair::generate_ed25519().unwrap());
    config.auth_rejection_time = Duration::from_millis(10);
    config.auth_rejection_time_initial = Some(Duration::from_secs(0));
    let config = Arc::new(config);

    let (handle_tx, handle_rx) = oneshot::channel();
    tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let running = russh::server::run_stream(config, socket, TestServer { stall_auth })
            .await
            .unwrap();
        let _ = handle_tx.send(running.handle());
        let _ = running.await;
    });

    (port, handle_rx)
}

fn config(port: u16, password: &str) -> ConnectionConfig {
    ConnectionConfig::new("127.0.0.1", port, "pi", password)
}

#[tokio::test]
async fn test_stalled_authentication_times_out() {
    let (port, _server) = spawn_server(true).await;
    let connector = RusshConnector::new(Duration::from_secs(1));

    let started = Instant::now();
    let err = connector.connect(&config(port, PASSWORD)).await.err().unwrap();

    assert!(matches!(err, ConnectionError::Timeout { .. }), "{err:?}");
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_wrong_password_is_authentication_failure() {
    let (port, _server) = spawn_server(false).await;
    let connector = RusshConnector::new(Duration::from_secs(5));

    let err = connector.connect(&config(port, "wrong")).await.err().unwrap();
    assert!(err.is_auth(), "{err:?}");
}

#[tokio::test]
async fn test_server_disconnect_marks_transport_closed() {
    let (port, server) = spawn_server(false).await;
    let connector = RusshConnector::new(Duration::from_secs(5));

    let transport = connector.connect(&config(port, PASSWORD)).await.unwrap();
    assert!(!transport.is_closed());

    let server = server.await.unwrap();
    server
        .disconnect(Disconnect::ByApplication, "bye".into(), "en".into())
        .await
        .unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    while !transport.is_closed() {
        assert!(Instant::now() < deadline, "transport still reports open");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
