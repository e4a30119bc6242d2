//! Listener behaviour over the in-memory transport

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use mobius_stream::{
    stop_channel, ListenerExit, MemoryTransport, Notification, NotificationListener,
};
use onem2m_client::SubscriptionConfig;
use serde_json::json;

const TOPIC: &str = "/oneM2M/req/Mobius2/UbicompSub_testcnt1/json";

fn config() -> SubscriptionConfig {
    SubscriptionConfig::builder("cse.example", "SubTest", "testcnt1")
        .identity("UbicompSub")
        .build()
        .unwrap()
}

fn notification_payload(content: &str) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "op": 5,
        "pc": {
            "m2m:sgn": {
                "nev": { "rep": { "m2m:cin": { "con": content } }, "net": 3 },
                "sur": "Mobius/SubTest/testcnt1/UbicompSub"
            }
        }
    }))
    .unwrap()
}

#[tokio::test]
async fn test_subscribes_to_origin_topic() {
    let config = config();
    let (transport, broker) = MemoryTransport::new();
    let (trigger, signal) = stop_channel();

    let listener = NotificationListener::new(transport, &config);
    let run = tokio::spawn(listener.run(|_| {}, signal));

    tokio::time::sleep(Duration::from_millis(20)).await;
    trigger.trigger();
    let exit = run.await.unwrap();

    assert_eq!(exit, ListenerExit::Stopped);
    assert_eq!(broker.subscriptions(), vec!["/oneM2M/req/+/UbicompSub_testcnt1/#"]);
    assert_eq!(broker.disconnects(), 1);
}

#[tokio::test]
async fn test_delivers_messages_in_order_without_overlap() {
    const COUNT: usize = 25;

    let config = config();
    let (transport, broker) = MemoryTransport::new();
    for i in 0..COUNT {
        assert!(broker.publish(TOPIC, notification_payload(&i.to_string())));
    }
    let (trigger, signal) = stop_channel();

    let received = Arc::new(Mutex::new(Vec::new()));
    let in_flight = Arc::new(AtomicBool::new(false));

    let handler = {
        let received = Arc::clone(&received);
        let in_flight = Arc::clone(&in_flight);
        let trigger_after = COUNT;
        move |notification: Notification| {
            assert!(
                !in_flight.swap(true, Ordering::SeqCst),
                "handler invocations overlapped"
            );
            std::thread::sleep(Duration::from_millis(1));
            let mut received = received.lock().unwrap();
            received.push(notification.envelope.content_str().unwrap().to_string());
            if received.len() == trigger_after {
                trigger.trigger();
            }
            in_flight.store(false, Ordering::SeqCst);
        }
    };

    let listener = NotificationListener::new(transport, &config);
    let exit = listener.run(handler, signal).await;

    assert_eq!(exit, ListenerExit::Stopped);
    let received = received.lock().unwrap();
    let expected: Vec<String> = (0..COUNT).map(|i| i.to_string()).collect();
    assert_eq!(*received, expected);
    assert_eq!(broker.disconnects(), 1);
}

#[tokio::test]
async fn test_malformed_payload_is_dropped_and_listener_continues() {
    let config = config();
    let (transport, broker) = MemoryTransport::new();
    broker.publish(TOPIC, "definitely not json");
    broker.publish(TOPIC, notification_payload("after"));
    drop(broker);
    let (_trigger, signal) = stop_channel();

    let mut received = Vec::new();
    let listener = NotificationListener::new(transport, &config);
    let exit = listener
        .run(|n: Notification| received.push(n), signal)
        .await;

    assert_eq!(exit, ListenerExit::Closed);
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].topic, TOPIC);
    assert_eq!(received[0].envelope.content_str(), Some("after"));
}

#[tokio::test]
async fn test_partial_envelope_is_delivered() {
    let config = config();
    let (transport, broker) = MemoryTransport::new();
    broker.publish(TOPIC, r#"{"pc":{"m2m:sgn":{"sur":"Mobius/SubTest/testcnt1/UbicompSub"}}}"#);
    drop(broker);
    let (_trigger, signal) = stop_channel();

    let mut received = Vec::new();
    let listener = NotificationListener::new(transport, &config);
    listener.run(|n: Notification| received.push(n), signal).await;

    assert_eq!(received.len(), 1);
    assert_eq!(received[0].envelope.content, None);
    assert!(received[0].envelope.subscription_resource.is_some());
}

#[tokio::test]
async fn test_handler_panic_does_not_stop_listener() {
    let config = config();
    let (transport, broker) = MemoryTransport::new();
    broker.publish(TOPIC, notification_payload("first"));
    broker.publish(TOPIC, notification_payload("second"));
    drop(broker);
    let (_trigger, signal) = stop_channel();

    let mut seen = Vec::new();
    let listener = NotificationListener::new(transport, &config);
    let exit = listener
        .run(
            |n: Notification| {
                let content = n.envelope.content_str().unwrap_or_default().to_string();
                seen.push(content.clone());
                if content == "first" {
                    panic!("handler failure");
                }
            },
            signal,
        )
        .await;

    assert_eq!(exit, ListenerExit::Closed);
    assert_eq!(seen, vec!["first", "second"]);
}

#[tokio::test]
async fn test_connect_failure_never_invokes_handler() {
    let config = config();
    let (transport, broker) = MemoryTransport::refusing("connection refused");
    broker.publish(TOPIC, notification_payload("ignored"));
    let (_trigger, signal) = stop_channel();

    let mut calls = 0;
    let listener = NotificationListener::new(transport, &config);
    let exit = listener.run(|_| calls += 1, signal).await;

    assert!(matches!(exit, ListenerExit::ConnectFailed(reason) if reason.contains("connection refused")));
    assert_eq!(calls, 0);
    assert_eq!(broker.connect_attempts(), 1);
    assert!(broker.subscriptions().is_empty());
}

#[tokio::test]
async fn test_stop_while_idle() {
    let config = config();
    let (transport, broker) = MemoryTransport::new();
    let (trigger, signal) = stop_channel();

    let listener = NotificationListener::new(transport, &config);
    let run = tokio::spawn(listener.run(|_| {}, signal));

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(trigger.trigger());

    let exit = tokio::time::timeout(Duration::from_secs(2), run)
        .await
        .expect("listener stops promptly")
        .expect("listener task did not panic");

    assert_eq!(exit, ListenerExit::Stopped);
    assert_eq!(broker.disconnects(), 1);
}
