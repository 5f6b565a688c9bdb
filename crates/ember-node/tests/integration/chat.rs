//! Chat routing tests -- broadcast, private messages, notices.

use std::time::Duration;

use crate::harness::{TestClient, TestServer};

const QUIET: Duration = Duration::from_millis(300);

#[tokio::test]
async fn test_welcome_names_server_and_identity() {
    let server = TestServer::start().await.unwrap();
    let client = TestClient::connect(server.addr).await.unwrap();

    assert_eq!(
        client.welcome,
        format!("Welcome to integration relay, your ID is {}", client.id)
    );
    server.wait_peer_count(1).await.unwrap();
    assert!(server.registry.lookup(&client.id).await.is_some());

    server.stop().await.unwrap();
}

/// Three peers: a broadcast reaches all of them, a private message only B.
#[tokio::test]
async fn test_three_peer_broadcast_then_private() {
    let server = TestServer::start().await.unwrap();
    let mut a = TestClient::connect(server.addr).await.unwrap();
    let mut b = TestClient::connect(server.addr).await.unwrap();
    let mut c = TestClient::connect(server.addr).await.unwrap();
    server.wait_peer_count(3).await.unwrap();

    a.send("hello").await.unwrap();
    for peer in [&mut a, &mut b, &mut c] {
        assert_eq!(peer.recv().await.unwrap(), "[broadcast] hello");
    }

    let b_id = b.id;
    a.send(&format!("/{b_id} secret")).await.unwrap();
    assert_eq!(
        b.recv().await.unwrap(),
        format!("[Private from {}] secret", a.id)
    );
    c.expect_silence(QUIET).await.unwrap();
    a.expect_silence(QUIET).await.unwrap();

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_rejection_notices_go_to_sender_only() {
    let server = TestServer::start().await.unwrap();
    let mut a = TestClient::connect(server.addr).await.unwrap();
    let mut b = TestClient::connect(server.addr).await.unwrap();
    server.wait_peer_count(2).await.unwrap();

    a.send(&format!("/{}", b.id)).await.unwrap();
    assert_eq!(a.recv().await.unwrap(), "Invalid destination message");

    a.send("/someone hi").await.unwrap();
    assert_eq!(a.recv().await.unwrap(), "Invalid destination ID");

    let own = a.id;
    a.send(&format!("/{own} hi me")).await.unwrap();
    assert_eq!(a.recv().await.unwrap(), "Cannot send message to yourself");

    b.expect_silence(QUIET).await.unwrap();
    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_unknown_destination_is_dropped_silently() {
    let server = TestServer::start().await.unwrap();
    let mut a = TestClient::connect(server.addr).await.unwrap();

    a.send("/00000000-0000-0000-0000-000000000000 hi")
        .await
        .unwrap();
    a.expect_silence(QUIET).await.unwrap();

    // Session is still alive
    a.send("still here").await.unwrap();
    assert_eq!(a.recv().await.unwrap(), "[broadcast] still here");

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_disconnect_unregisters_peer() {
    let server = TestServer::start().await.unwrap();
    let mut a = TestClient::connect(server.addr).await.unwrap();
    let b = TestClient::connect(server.addr).await.unwrap();
    server.wait_peer_count(2).await.unwrap();

    let b_id = b.id;
    drop(b);
    server.wait_peer_count(1).await.unwrap();
    assert!(server.registry.lookup(&b_id).await.is_none());

    // Messages to the departed peer vanish without a notice
    a.send(&format!("/{b_id} are you there")).await.unwrap();
    a.expect_silence(QUIET).await.unwrap();

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_many_broadcasts_arrive_whole_and_in_order() {
    let server = TestServer::start().await.unwrap();
    let mut a = TestClient::connect(server.addr).await.unwrap();
    let mut b = TestClient::connect(server.addr).await.unwrap();
    server.wait_peer_count(2).await.unwrap();

    for i in 0..50 {
        a.send(&format!("a{i}")).await.unwrap();
        b.send(&format!("b{i}")).await.unwrap();
    }

    // Frames from two senders may interleave, but each arrives intact and
    // each sender's frames keep their order
    for peer in [&mut a, &mut b] {
        let (mut next_a, mut next_b) = (0, 0);
        for _ in 0..100 {
            let text = peer.recv().await.unwrap();
            let body = text.strip_prefix("[broadcast] ").unwrap();
            if let Some(n) = body.strip_prefix('a') {
                assert_eq!(n.parse::<i32>().unwrap(), next_a);
                next_a += 1;
            } else {
                let n = body.strip_prefix('b').unwrap();
                assert_eq!(n.parse::<i32>().unwrap(), next_b);
                next_b += 1;
            }
        }
    }

    server.stop().await.unwrap();
}
