//! End-to-end tests over HTTP

use pbview_core::{PbViewError, ServerId, View, ViewServiceConfig};
use pbview_viewservice::{start_server, ServerHandle, ViewClient};
use std::time::Duration;

async fn start(tick_ms: u64, dead_pings: u32) -> (ServerHandle, ViewClient) {
    let config = ViewServiceConfig {
        listen_addr: "127.0.0.1:0".parse().unwrap(),
        tick_interval: Duration::from_millis(tick_ms),
        dead_pings,
    };
    let handle = start_server(config).await.expect("server should start");
    let client = ViewClient::connect(handle.local_addr()).expect("client should build");
    (handle, client)
}

fn view(viewnum: u64, primary: &str, backup: &str) -> View {
    let role = |s: &str| (!s.is_empty()).then(|| ServerId::new(s));
    View {
        viewnum,
        primary: role(primary),
        backup: role(backup),
    }
}

#[tokio::test]
async fn test_get_before_first_ping() {
    let (handle, client) = start(100, 5).await;

    assert_eq!(client.get().await.unwrap(), view(0, "", ""));
    assert_eq!(client.primary().await, None);
    assert_eq!(handle.rpc_count(), 2);

    handle.kill();
    handle.join().await;
}

#[tokio::test]
async fn test_first_primary_then_backup() {
    let (handle, client) = start(100, 5).await;
    let a = ServerId::new("a");
    let b = ServerId::new("b");

    assert_eq!(client.ping(&a, 0).await.unwrap(), view(1, "a", ""));
    assert_eq!(client.ping(&b, 0).await.unwrap(), view(1, "a", ""));
    let idle = handle.service().inspect(|s| s.idle().ids()).await;
    assert_eq!(idle, vec![b.clone()]);

    assert_eq!(client.ping(&a, 1).await.unwrap(), view(2, "a", "b"));
    let idle = handle.service().inspect(|s| s.idle().is_empty()).await;
    assert!(idle);
    assert_eq!(client.get().await.unwrap(), view(2, "a", "b"));
    assert_eq!(client.primary().await, Some(a));

    handle.kill();
    handle.join().await;
}

#[tokio::test]
async fn test_backup_takes_over_from_silent_primary() {
    let (handle, client) = start(20, 5).await;
    let a = ServerId::new("a");
    let b = ServerId::new("b");

    client.ping(&a, 0).await.unwrap();
    client.ping(&b, 0).await.unwrap();
    client.ping(&a, 1).await.unwrap();
    client.ping(&b, 2).await.unwrap();
    client.ping(&a, 2).await.unwrap();

    let mut current = client.get().await.unwrap();
    for _ in 0..100 {
        current = client.ping(&b, 2).await.unwrap();
        if current.viewnum == 3 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(current, view(3, "b", ""));

    // The new primary confirms the view; the old one rejoins as backup
    client.ping(&b, 3).await.unwrap();
    client.ping(&a, 0).await.unwrap();
    assert_eq!(client.ping(&b, 3).await.unwrap(), view(4, "b", "a"));

    handle.kill();
    handle.join().await;
}

#[tokio::test]
async fn test_raw_json_wire_format() {
    let (handle, _client) = start(100, 5).await;
    let url = format!("http://{}/ping", handle.local_addr());

    let reply: serde_json::Value = reqwest::Client::new()
        .post(&url)
        .json(&serde_json::json!({ "me": "a", "viewnum": 0 }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(reply["view"]["viewnum"], 1);
    assert_eq!(reply["view"]["primary"], "a");
    assert!(reply["view"]["backup"].is_null());

    handle.kill();
    handle.join().await;
}

#[tokio::test]
async fn test_killed_server_is_unreachable() {
    let (handle, client) = start(100, 5).await;
    let addr = handle.local_addr();
    client.ping(&ServerId::new("a"), 0).await.unwrap();

    handle.kill();
    assert!(handle.is_dead());
    handle.join().await;

    let fresh = ViewClient::connect(addr).unwrap();
    let err = fresh.get().await.unwrap_err();
    assert!(err.is_retriable());
    match &err {
        PbViewError::ConnectionFailed(detail) => {
            let addr = addr.to_string();
            assert!(detail.starts_with(&addr));
            assert!(detail.len() > addr.len(), "cause missing: {detail}");
        }
        other => panic!("expected ConnectionFailed, got {other:?}"),
    }
    assert_eq!(fresh.primary().await, None);
}
