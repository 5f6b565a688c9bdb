//! Stream reassembly tests -- frames split and merged across TCP writes.

use std::time::Duration;

use ember_protocol::encode;

use crate::harness::{TestClient, TestServer};

#[tokio::test]
async fn test_frame_written_one_byte_at_a_time() {
    let server = TestServer::start().await.unwrap();
    let mut a = TestClient::connect(server.addr).await.unwrap();

    let frame = encode(b"drip fed").unwrap();
    for byte in frame.iter() {
        a.send_raw(&[*byte]).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    assert_eq!(a.recv().await.unwrap(), "[broadcast] drip fed");
    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_frames_merged_and_split_across_writes() {
    let server = TestServer::start().await.unwrap();
    let mut a = TestClient::connect(server.addr).await.unwrap();

    let stream = [
        encode(b"first").unwrap(),
        encode(b"second").unwrap(),
        encode(b"third").unwrap(),
    ]
    .concat();

    // Two whole frames and one byte of the third's prefix, then the rest
    let cut = encode(b"first").unwrap().len() + encode(b"second").unwrap().len() + 1;
    a.send_raw(&stream[..cut]).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    a.send_raw(&stream[cut..]).await.unwrap();

    for expected in ["first", "second", "third"] {
        assert_eq!(a.recv().await.unwrap(), format!("[broadcast] {expected}"));
    }
    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_zero_length_frame_is_ignored() {
    let server = TestServer::start().await.unwrap();
    let mut a = TestClient::connect(server.addr).await.unwrap();

    let mut raw = vec![0u8, 0];
    raw.extend_from_slice(&encode(b"after empty").unwrap());
    a.send_raw(&raw).await.unwrap();

    assert_eq!(a.recv().await.unwrap(), "[broadcast] after empty");
    a.expect_silence(Duration::from_millis(200)).await.unwrap();
    server.stop().await.unwrap();
}

/// Length 10 announced, 4 bytes sent, then end-of-stream.
#[tokio::test]
async fn test_partial_frame_then_close_ends_session_cleanly() {
    let server = TestServer::start().await.unwrap();
    let mut a = TestClient::connect(server.addr).await.unwrap();
    let mut b = TestClient::connect(server.addr).await.unwrap();
    server.wait_peer_count(2).await.unwrap();

    a.send_raw(&[10, 0, b'a', b'b', b'c', b'd']).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    // Still waiting for the rest of the frame
    assert!(server.registry.lookup(&a.id).await.is_some());

    a.close_write().await.unwrap();
    a.expect_closed().await.unwrap();
    server.wait_peer_count(1).await.unwrap();

    // Other sessions are unaffected, and nothing from the partial frame leaked
    b.send("still fine").await.unwrap();
    assert_eq!(b.recv().await.unwrap(), "[broadcast] still fine");
    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_max_size_payload_cannot_be_rebroadcast() {
    let server = TestServer::start().await.unwrap();
    let mut a = TestClient::connect(server.addr).await.unwrap();

    let huge = "x".repeat(ember_protocol::MAX_PAYLOAD_SIZE);
    a.send(&huge).await.unwrap();
    a.expect_silence(Duration::from_millis(300)).await.unwrap();

    a.send("small").await.unwrap();
    assert_eq!(a.recv().await.unwrap(), "[broadcast] small");
    server.stop().await.unwrap();
}
