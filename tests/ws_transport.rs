//! Transport lifecycle tests against a local gateway: frame delivery, close
//! handling, reconnection, and channel replay.

mod common;

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

use common::*;
use notify_sdk::prelude::*;

async fn next_event(rx: &mut mpsc::Receiver<WsEvent>) -> WsEvent {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("no event within 5s")
        .expect("event channel closed")
}

#[tokio::test]
async fn push_frames_reach_the_event_channel() {
    let (listener, url) = bind_gateway().await;
    let server = tokio::spawn(async move {
        let mut ws = accept(&listener).await;
        send_json(
            &mut ws,
            r#"{"type":"notification","data":{"id":"n1","title":"T","message":"M"}}"#,
        )
        .await;
        // Hold the connection until the client closes it.
        while let Some(Ok(msg)) = ws.next().await {
            if matches!(msg, Message::Close(_)) {
                break;
            }
        }
    });

    let (mut client, mut events) = WsClient::new(fast_ws_config(&url));
    client.connect().unwrap();

    assert!(matches!(next_event(&mut events).await, WsEvent::Connected));
    match next_event(&mut events).await {
        WsEvent::Message(Kind::Notification(w)) => {
            assert_eq!(w.id.unwrap().as_str(), "n1");
        }
        other => panic!("expected a notification frame, got {other:?}"),
    }
    assert!(client.is_connected());

    client.disconnect().await;
    assert_eq!(client.status(), ConnectionStatus::Disconnected);
    server.await.unwrap();
}

#[tokio::test]
async fn server_close_1000_is_not_retried() {
    let (listener, url) = bind_gateway().await;
    let (mut client, mut events) = WsClient::new(fast_ws_config(&url));
    client.connect().unwrap();

    let mut ws = accept(&listener).await;
    assert!(matches!(next_event(&mut events).await, WsEvent::Connected));

    ws.send(Message::Close(Some(CloseFrame {
        code: CloseCode::Normal,
        reason: "done".into(),
    })))
    .await
    .unwrap();

    match next_event(&mut events).await {
        WsEvent::Disconnected { code, .. } => assert_eq!(code, Some(1000)),
        other => panic!("expected Disconnected, got {other:?}"),
    }

    // A reconnect at the fast backoff would land well inside this window.
    let retried = tokio::time::timeout(Duration::from_millis(400), listener.accept()).await;
    assert!(retried.is_err(), "transport reconnected after a normal close");
    assert_eq!(client.status(), ConnectionStatus::Disconnected);
}

#[tokio::test]
async fn refused_connections_exhaust_reconnect_attempts() {
    // Bind then drop: the port refuses connections for the whole test.
    let (listener, url) = bind_gateway().await;
    drop(listener);

    let (mut client, mut events) = WsClient::new(fast_ws_config(&url));
    client.connect().unwrap();

    let mut errors = 0;
    loop {
        match next_event(&mut events).await {
            WsEvent::Error(_) => errors += 1,
            WsEvent::ReconnectsExhausted => break,
            other => panic!("unexpected event: {other:?}"),
        }
    }
    // The initial attempt plus two retries.
    assert_eq!(errors, 3);
    assert_eq!(client.status(), ConnectionStatus::Failed);
}

#[tokio::test]
async fn tracked_channels_replay_after_reconnect() {
    let (listener, url) = bind_gateway().await;
    let (mut client, mut events) = WsClient::new(fast_ws_config(&url));
    client.connect().unwrap();

    let mut conn1 = accept(&listener).await;
    assert!(matches!(next_event(&mut events).await, WsEvent::Connected));

    client
        .subscribe(vec![ChannelName::from("clan:c1:gig_created")])
        .unwrap();
    let frame: serde_json::Value = serde_json::from_str(&read_text(&mut conn1).await).unwrap();
    assert_eq!(frame["type"], "subscribe");

    // Drop without a close frame; an abnormal loss, eligible for reconnect.
    drop(conn1);

    let mut conn2 = accept(&listener).await;
    let replay: serde_json::Value = serde_json::from_str(&read_text(&mut conn2).await).unwrap();
    assert_eq!(replay["type"], "subscribe");
    assert_eq!(replay["channels"][0], "clan:c1:gig_created");

    client.disconnect().await;
}
