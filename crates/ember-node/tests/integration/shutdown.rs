//! Graceful shutdown and listener resilience.

use std::time::Duration;

use tokio::net::TcpStream;

use crate::harness::{test_config, TestClient, TestServer};

#[tokio::test]
async fn test_shutdown_closes_sessions_and_listener() {
    let server = TestServer::start().await.unwrap();
    let addr = server.addr;
    let mut a = TestClient::connect(addr).await.unwrap();
    let mut b = TestClient::connect(addr).await.unwrap();
    server.wait_peer_count(2).await.unwrap();

    let registry = server.registry.clone();
    server.stop().await.unwrap();

    a.expect_closed().await.unwrap();
    b.expect_closed().await.unwrap();
    assert!(registry.is_empty().await);

    // Listening socket is gone
    let result = tokio::time::timeout(Duration::from_secs(2), TcpStream::connect(addr)).await;
    assert!(!matches!(result, Ok(Ok(_))), "listener still accepting");
}

#[tokio::test]
async fn test_shutdown_with_no_sessions() {
    let server = TestServer::start().await.unwrap();
    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_listener_survives_client_churn() {
    let server = TestServer::start().await.unwrap();

    for _ in 0..20 {
        let client = TestClient::connect(server.addr).await.unwrap();
        drop(client);
    }
    // Connect and immediately hang up without reading the welcome
    for _ in 0..20 {
        drop(TcpStream::connect(server.addr).await.unwrap());
    }

    server.wait_peer_count(0).await.unwrap();
    let mut late = TestClient::connect(server.addr).await.unwrap();
    late.send("after the storm").await.unwrap();
    assert_eq!(late.recv().await.unwrap(), "[broadcast] after the storm");

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_custom_server_name_in_welcome() {
    let mut cfg = test_config();
    cfg.server.name = "lighthouse".into();
    let server = TestServer::start_with(cfg).await.unwrap();

    let client = TestClient::connect(server.addr).await.unwrap();
    assert!(client.welcome.starts_with("Welcome to lighthouse, your ID is "));

    server.stop().await.unwrap();
}
