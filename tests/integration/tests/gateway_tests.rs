//! Gateway client integration tests
//!
//! Each test runs the client against a local mock gateway over real
//! WebSockets. Reconnect tests wait out the real 2s backoff.
//!
//! Run with: cargo test -p integration-tests --test gateway_tests

use guildwatch_gateway::{
    ConnectionState, EventSink, GatewayClient, GatewayError, GatewayEvent, GatewayPayload,
    OpCode,
};
use integration_tests::*;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Handshake
// ============================================================================

#[tokio::test]
async fn test_identify_and_ready() {
    let mut gateway = MockGateway::start().await.unwrap();
    let (client, mut events) = connect_client(GatewayClient::new(gateway.config()));

    let mut conn = gateway.accept().await.unwrap();
    let identify = conn.handshake("sess-1", &gateway.resume_url()).await.unwrap();

    assert_eq!(identify.d["token"], "integration-token");
    assert_eq!(identify.d["intents"], 643);
    assert_eq!(identify.d["properties"]["browser"], "guildwatch");

    wait_connected(&mut events).await.unwrap();
    assert_eq!(client.state(), ConnectionState::Connected);

    let session = client.session();
    assert_eq!(session.session_id(), Some("sess-1"));
    assert_eq!(session.sequence, Some(1));
    assert_eq!(session.reconnect_attempts, 0);

    client.disconnect().await;
    assert_eq!(conn.expect_close().await.unwrap(), 1000);
    assert_eq!(client.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_heartbeat_carries_sequence() {
    let mut gateway = MockGateway::start().await.unwrap();
    let (client, mut events) = connect_client(GatewayClient::new(gateway.config()));

    let mut conn = gateway.accept().await.unwrap();
    conn.send(&hello(100)).await.unwrap();
    conn.expect_op(OpCode::Identify).await.unwrap();
    conn.send(&ready("sess-1", &gateway.resume_url(), 1)).await.unwrap();
    wait_connected(&mut events).await.unwrap();

    conn.send(&guild_create(7, "100")).await.unwrap();

    // Keep acking until a beat reports the latest sequence
    let mut last = None;
    for _ in 0..10 {
        let beat = conn.expect_op(OpCode::Heartbeat).await.unwrap();
        conn.send(&GatewayPayload::heartbeat_ack()).await.unwrap();
        last = beat.d.as_u64();
        if last == Some(7) {
            break;
        }
    }
    assert_eq!(last, Some(7));
    assert_eq!(client.state(), ConnectionState::Connected);

    client.disconnect().await;
}

// ============================================================================
// Dispatch fan-out
// ============================================================================

#[tokio::test]
async fn test_dispatches_reach_subscribers_and_sinks() {
    let mut gateway = MockGateway::start().await.unwrap();
    let sink = Arc::new(RecordingSink::default());
    let client = GatewayClient::builder(gateway.config())
        .sink(Arc::clone(&sink) as Arc<dyn EventSink>)
        .build();
    let (client, mut events) = connect_client(client);

    let mut conn = gateway.accept().await.unwrap();
    conn.handshake("sess-1", &gateway.resume_url()).await.unwrap();
    conn.send(&guild_create(2, "100")).await.unwrap();
    conn.send(&message_create(3, "100", "hello")).await.unwrap();

    let event = wait_for_event(&mut events, |e| {
        matches!(e, GatewayEvent::Dispatch { event_name, .. } if event_name == "MESSAGE_CREATE")
    })
    .await
    .unwrap();
    if let GatewayEvent::Dispatch { payload, .. } = event {
        assert_eq!(payload["content"], "hello");
    }

    assert!(sink.wait_for(3, Duration::from_secs(5)).await);
    assert_eq!(sink.names(), vec!["READY", "GUILD_CREATE", "MESSAGE_CREATE"]);
    assert_eq!(client.session().sequence, Some(3));

    client.disconnect().await;
}

#[tokio::test]
async fn test_broken_sink_does_not_affect_connection() {
    let mut gateway = MockGateway::start().await.unwrap();
    let sink = Arc::new(RecordingSink::default());
    let client = GatewayClient::builder(gateway.config())
        .sink(Arc::new(BrokenSink))
        .sink(Arc::clone(&sink) as Arc<dyn EventSink>)
        .build();
    let (client, mut events) = connect_client(client);

    let mut conn = gateway.accept().await.unwrap();
    conn.handshake("sess-1", &gateway.resume_url()).await.unwrap();
    wait_connected(&mut events).await.unwrap();

    conn.send(&message_create(2, "100", "boom")).await.unwrap();
    conn.send(&guild_create(3, "200")).await.unwrap();

    assert!(sink.wait_for(3, Duration::from_secs(5)).await);
    let seen = sink.payloads();
    assert_eq!(seen[1].1["content"], "boom");
    assert_eq!(seen[2].1["id"], "200");
    assert_eq!(client.state(), ConnectionState::Connected);

    client.disconnect().await;
}

#[tokio::test]
async fn test_send_after_ready() {
    let mut gateway = MockGateway::start().await.unwrap();
    let (client, mut events) = connect_client(GatewayClient::new(gateway.config()));

    let mut conn = gateway.accept().await.unwrap();
    conn.handshake("sess-1", &gateway.resume_url()).await.unwrap();
    wait_connected(&mut events).await.unwrap();

    client
        .send(GatewayPayload::new(
            OpCode::VoiceStateUpdate,
            json!({"guild_id": "100", "channel_id": null, "self_mute": false, "self_deaf": false}),
        ))
        .await
        .unwrap();

    let sent = conn.expect_op(OpCode::VoiceStateUpdate).await.unwrap();
    assert_eq!(sent.d["guild_id"], "100");

    client.disconnect().await;
    assert!(matches!(
        client.send(GatewayPayload::heartbeat(None)).await,
        Err(GatewayError::NotConnected)
    ));
}

// ============================================================================
// Reconnect and resume
// ============================================================================

#[tokio::test]
async fn test_resume_after_server_close() {
    let mut gateway = MockGateway::start().await.unwrap();
    let (client, mut events) = connect_client(GatewayClient::new(gateway.config()));

    let mut conn = gateway.accept().await.unwrap();
    conn.handshake("sess-1", &gateway.resume_url()).await.unwrap();
    conn.send(&guild_create(2, "100")).await.unwrap();
    wait_for_event(&mut events, |e| {
        matches!(e, GatewayEvent::Dispatch { event_name, .. } if event_name == "GUILD_CREATE")
    })
    .await
    .unwrap();

    conn.close(4000).await.unwrap();
    wait_for_event(&mut events, |e| {
        matches!(e, GatewayEvent::StateChange { new: ConnectionState::Reconnecting, .. })
    })
    .await
    .unwrap();

    let mut conn = gateway.accept().await.unwrap();
    conn.send(&hello(45_000)).await.unwrap();
    let resume = conn.expect_op(OpCode::Resume).await.unwrap();
    assert_eq!(resume.d["session_id"], "sess-1");
    assert_eq!(resume.d["seq"], 2);

    conn.send(&GatewayPayload::dispatch("RESUMED", 3, json!(null)))
        .await
        .unwrap();
    wait_connected(&mut events).await.unwrap();
    assert_eq!(client.session().reconnect_attempts, 1);

    client.disconnect().await;
}

#[tokio::test]
async fn test_missed_ack_closes_with_4900_and_reconnects() {
    let mut gateway = MockGateway::start().await.unwrap();
    let (client, mut events) = connect_client(GatewayClient::new(gateway.config()));

    let mut conn = gateway.accept().await.unwrap();
    conn.send(&hello(200)).await.unwrap();
    conn.expect_op(OpCode::Identify).await.unwrap();
    conn.send(&ready("sess-1", &gateway.resume_url(), 1)).await.unwrap();

    // Never ack
    assert_eq!(conn.expect_close().await.unwrap(), 4900);

    let err = wait_for_event(&mut events, |e| matches!(e, GatewayEvent::Error(_)))
        .await
        .unwrap();
    assert!(matches!(
        err,
        GatewayEvent::Error(GatewayError::HeartbeatTimeout { interval_ms: 200 })
    ));

    assert!(gateway.accept().await.is_ok());
    client.disconnect().await;
}

// ============================================================================
// Terminal failures
// ============================================================================

#[tokio::test]
async fn test_fatal_close_code_fails() {
    let mut gateway = MockGateway::start().await.unwrap();
    let (client, mut events) = connect_client(GatewayClient::new(gateway.config()));

    let mut conn = gateway.accept().await.unwrap();
    conn.send(&hello(45_000)).await.unwrap();
    conn.expect_op(OpCode::Identify).await.unwrap();
    conn.close(4014).await.unwrap();

    let err = wait_for_event(&mut events, |e| matches!(e, GatewayEvent::Error(_)))
        .await
        .unwrap();
    assert!(matches!(
        err,
        GatewayEvent::Error(GatewayError::FatalSession { code: 4014, .. })
    ));
    wait_for_event(&mut events, |e| {
        matches!(e, GatewayEvent::StateChange { new: ConnectionState::Failed, .. })
    })
    .await
    .unwrap();

    // No reconnect, not even after the first backoff
    assert!(gateway.try_accept(Duration::from_millis(2_500)).await.is_none());
    assert_eq!(client.state(), ConnectionState::Failed);
}

#[tokio::test]
async fn test_unreachable_gateway_keeps_retrying() {
    // Bind and drop to get a port nothing listens on
    let addr = {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };
    let config = guildwatch_gateway::GatewayConfig::new("token")
        .with_gateway_url(format!("ws://{addr}/?v=10&encoding=json"))
        .with_max_reconnects(1);
    let (client, mut events) = connect_client(GatewayClient::new(config));

    let err = wait_for_event(&mut events, |e| matches!(e, GatewayEvent::Error(_)))
        .await
        .unwrap();
    assert!(matches!(err, GatewayEvent::Error(GatewayError::Transport(_))));

    let err = wait_for_event(&mut events, |e| {
        matches!(e, GatewayEvent::Error(GatewayError::MaxReconnect { .. }))
    })
    .await
    .unwrap();
    if let GatewayEvent::Error(e) = err {
        assert_eq!(e.to_string(), "Max reconnect attempts reached");
    }
    assert_eq!(client.state(), ConnectionState::Failed);
}
