use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, connect_async};
use tungstenite::protocol::Message as WsMessage;

use super::{AccountEvent, ClientOptions, ConnectionClient, ConnectionState, EventDisplay, MessageSink};
use crate::broker::{ActionType, Broker};
use crate::config::ClientSettings;
use crate::transport::serve;
use crate::utils::PubSubError;

const DELAY: Duration = Duration::from_millis(200);

async fn setup_server() -> (String, Arc<Broker>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let broker = Arc::new(Broker::new());
    tokio::spawn(serve(listener, "/events".to_string(), broker.clone()));
    (format!("ws://{addr}/events"), broker)
}

fn options(url: &str) -> ClientOptions {
    ClientOptions::new(url)
        .reconnect_delay(DELAY)
        .connect_timeout(Duration::from_millis(1000))
}

/// A listener that accepts TCP connections but never answers the handshake.
async fn silent_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });
    format!("ws://{addr}/events")
}

/// A server that completes every handshake and closes the connection shortly after.
async fn closing_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let Ok(mut ws) = accept_async(stream).await else {
                    return;
                };
                tokio::time::sleep(Duration::from_millis(50)).await;
                let _ = ws.close(None).await;
                while let Some(Ok(_)) = ws.next().await {}
            });
        }
    });
    format!("ws://{addr}/events")
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..150 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition not reached in time");
}

#[test]
fn test_account_event_encode_and_parse() {
    let event = AccountEvent::new("42", "lat=46.05");
    let encoded = event.encode();
    assert!(encoded.starts_with("42;"));
    assert!(encoded.ends_with(";lat=46.05"));
    assert_eq!(AccountEvent::parse(&encoded).unwrap(), event);
}

#[test]
fn test_account_event_parse_rejects_bad_shapes() {
    assert!(matches!(AccountEvent::parse("   "), Err(PubSubError::InvalidEvent(_))));
    let err = AccountEvent::parse("1;2").unwrap_err();
    assert_eq!(err.to_string(), "Message consists of 2 parts. Should consist of 3 parts.");
    assert!(AccountEvent::parse("1;2;3;4").is_err());
}

#[test]
fn test_display_renders_json_line() {
    let display = EventDisplay::default();
    let line = display.render("7;2024-01-01T00:00:00Z;hello").unwrap();
    let value: serde_json::Value = serde_json::from_str(&line).unwrap();
    assert_eq!(
        value,
        json!({ "accountId": "7", "timestamp": "2024-01-01T00:00:00Z", "data": "hello" })
    );
}

#[test]
fn test_display_applies_account_filter() {
    let display = EventDisplay::new(["1".to_string(), "3".to_string()]);
    assert!(display.is_filtering());
    assert!(display.render("1;t;a").is_some());
    assert!(display.render("2;t;b").is_none());
    assert!(display.render("3;t;c").is_some());
    assert!(display.render("not an event").is_none());
    assert!(display.render("").is_none());
}

#[test]
fn test_options_from_settings() {
    let settings = ClientSettings {
        url: "ws://example:1/events".to_string(),
        topic: "accounts".to_string(),
        reconnect_delay_ms: 250,
        connect_timeout_ms: 750,
    };
    let opts = ClientOptions::from(&settings).subscribe_to(settings.topic.clone());
    assert_eq!(opts.url, "ws://example:1/events");
    assert_eq!(opts.subscription_topic.as_deref(), Some("accounts"));
    assert_eq!(opts.reconnect_delay, Duration::from_millis(250));
    assert_eq!(opts.connect_timeout, Duration::from_millis(750));
}

#[tokio::test]
async fn test_client_subscribes_on_open_and_forwards_messages() {
    let (url, broker) = setup_server().await;
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let sink: Arc<dyn MessageSink> = Arc::new(move |payload: &str| {
        let _ = tx.send(payload.to_string());
    });

    let client = ConnectionClient::connect(options(&url).subscribe_to("accounts"), Some(sink));
    wait_until(|| client.is_open()).await;
    wait_until(|| broker.registry().get_subscribers("accounts").len() == 1).await;

    let (mut producer, _) = connect_async(url.as_str()).await.expect("connect");
    producer
        .send(WsMessage::text(
            json!({ "type": "PUBLISH", "topic": "accounts", "message": "1;now;data" }).to_string(),
        ))
        .await
        .expect("send");

    let received = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out")
        .expect("sink closed");
    assert_eq!(received, "1;now;data");

    client.shutdown();
}

#[tokio::test]
async fn test_send_message_publishes_through_broker() {
    let (url, broker) = setup_server().await;

    let (mut consumer, _) = connect_async(url.as_str()).await.expect("connect");
    consumer
        .send(WsMessage::text(
            json!({ "type": "SUBSCRIBE", "topic": "accounts" }).to_string(),
        ))
        .await
        .expect("send");
    wait_until(|| broker.registry().contains_topic("accounts")).await;

    let producer = ConnectionClient::connect(options(&url), None);
    wait_until(|| producer.is_open()).await;
    producer
        .send_message(ActionType::Publish, "accounts", Some("5;now;moved"))
        .expect("send_message");

    match tokio::time::timeout(Duration::from_secs(2), consumer.next()).await {
        Ok(Some(Ok(WsMessage::Text(text)))) => assert_eq!(text.as_str(), "5;now;moved"),
        other => panic!("Expected a text message, got {other:?}"),
    }

    producer.shutdown();
}

#[tokio::test]
async fn test_send_message_without_connection_fails() {
    // nothing listens on this port once the listener is dropped
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);

    let client = ConnectionClient::connect(options(&format!("ws://{addr}/events")), None);
    let result = client.send_message(ActionType::Publish, "accounts", Some("x"));
    assert!(matches!(result, Err(PubSubError::Connection(_))));
    client.shutdown();
}

#[tokio::test]
async fn test_reconnects_after_close() {
    let (url, broker) = setup_server().await;
    let client = ConnectionClient::connect(options(&url).subscribe_to("accounts"), None);
    wait_until(|| client.is_open()).await;
    assert_eq!(client.connections_opened(), 1);

    let closed_at = Instant::now();
    client.close();
    wait_until(|| client.connections_opened() == 2 && client.is_open()).await;

    let elapsed = closed_at.elapsed();
    assert!(elapsed >= DELAY, "reconnected too early: {elapsed:?}");
    assert!(elapsed < DELAY + Duration::from_secs(2), "reconnected too late: {elapsed:?}");

    // the old connection was unsubscribed, the new one subscribed again
    wait_until(|| broker.registry().get_subscribers("accounts").len() == 1).await;

    client.shutdown();
}

#[tokio::test]
async fn test_reconnect_aborted_when_already_open() {
    let (url, _broker) = setup_server().await;
    let client = ConnectionClient::connect(options(&url), None);
    wait_until(|| client.is_open()).await;

    client.schedule_reconnect();
    tokio::time::sleep(DELAY * 3).await;

    assert!(client.is_open());
    assert_eq!(client.connections_opened(), 1);
    assert_eq!(client.attempts(), 1);

    client.shutdown();
}

#[tokio::test]
async fn test_keeps_retrying_unreachable_server() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);

    let client = ConnectionClient::connect(options(&format!("ws://{addr}/events")), None);
    wait_until(|| client.attempts() >= 3).await;
    assert_ne!(client.state(), ConnectionState::Open);
    assert_eq!(client.connections_opened(), 0);

    client.shutdown();
}

#[tokio::test]
async fn test_shutdown_stops_reconnecting() {
    let (url, broker) = setup_server().await;
    let client = ConnectionClient::connect(options(&url).subscribe_to("accounts"), None);
    wait_until(|| client.is_open()).await;

    client.shutdown();
    wait_until(|| client.state() == ConnectionState::Disconnected).await;
    wait_until(|| broker.registry().is_empty()).await;

    tokio::time::sleep(DELAY * 3).await;
    assert_eq!(client.connections_opened(), 1);
    assert_eq!(client.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_connect_timeout_abandons_attempt_and_retries() {
    let url = silent_server().await;
    let opts = ClientOptions::new(url)
        .reconnect_delay(Duration::from_millis(100))
        .connect_timeout(Duration::from_millis(150));

    let client = ConnectionClient::connect(opts, None);
    wait_until(|| client.attempts() >= 3).await;
    assert_eq!(client.connections_opened(), 0);
    assert_ne!(client.state(), ConnectionState::Open);

    client.shutdown();
}

#[tokio::test]
async fn test_reconnects_after_remote_close() {
    let url = closing_server().await;
    let client = ConnectionClient::connect(options(&url), None);

    wait_until(|| client.connections_opened() >= 2).await;
    assert!(client.attempts() >= 2);

    client.shutdown();
}

#[tokio::test]
async fn test_shutdown_during_connect_attempt_disconnects() {
    let url = silent_server().await;
    let client = ConnectionClient::connect(options(&url), None);
    wait_until(|| client.state() == ConnectionState::Connecting).await;

    client.shutdown();
    assert_eq!(client.state(), ConnectionState::Disconnected);

    tokio::time::sleep(DELAY * 3).await;
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert_eq!(client.attempts(), 1);
}
