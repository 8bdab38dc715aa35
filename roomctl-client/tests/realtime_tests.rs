//! Client cache kept in step with a live roomctl server.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use roomctl_client::{fetch_devices, sync_cache, ClientCache, ClientError, RealtimeClient};
use roomctl_discovery::{LocatorConfig, MacAddr, NetworkLocator};
use roomctl_server::RoomServer;
use roomctl_state::{
    Category, DefaultDriverFactory, DeviceId, DevicePatch, DeviceRecord, DeviceService,
    MemoryRegistry, ServiceConfig,
};

fn record(id: &str, name: &str, last: u8, category: Category) -> DeviceRecord {
    DeviceRecord {
        id: DeviceId::new(id),
        device_name: name.to_string(),
        ip: Ipv4Addr::new(10, 0, 0, last),
        mac: MacAddr::new([0x02, 0, 0, 0, 0, last]),
        username: String::new(),
        password: String::new(),
        category,
    }
}

/// Service over records that never touch the network when listed.
fn service(records: Vec<DeviceRecord>) -> Arc<DeviceService> {
    Arc::new(DeviceService::new(
        Arc::new(MemoryRegistry::with_records(records)),
        Arc::new(NetworkLocator::new(LocatorConfig::default())),
        Arc::new(DefaultDriverFactory::default()),
        ServiceConfig::default(),
    ))
}

fn localhost() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 0))
}

async fn eventually(cache: &ClientCache, check: impl Fn(&ClientCache) -> bool) {
    let mut changes = cache.watch();
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if check(cache) {
                return;
            }
            if changes.changed().await.is_err() {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        }
    })
    .await
    .expect("cache never reached the expected state");
}

#[tokio::test]
async fn test_snapshot_then_live_updates() {
    let server = RoomServer::bind(
        localhost(),
        service(vec![
            record("c1", "Kiosk", 20, Category::Computer),
            record("l1", "Desk Lamp", 30, Category::Light),
        ]),
        16,
    )
    .unwrap();
    let url = format!("ws://{}/ws", server.local_addr());

    let cache = Arc::new(ClientCache::new());
    let client = RealtimeClient::connect_with_delay(url, cache.clone(), Duration::from_millis(50));

    eventually(&cache, |c| c.len() == 2).await;
    assert!(cache.is_connected());

    server
        .service()
        .delete(&DeviceId::new("l1"))
        .await
        .unwrap();
    eventually(&cache, |c| c.get(&DeviceId::new("l1")).is_none()).await;

    server
        .service()
        .update(
            &DeviceId::new("c1"),
            DevicePatch {
                device_name: Some("Reception PC".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    eventually(&cache, |c| {
        c.get(&DeviceId::new("c1"))
            .is_some_and(|d| d.device_name == "Reception PC")
    })
    .await;

    client.shutdown().await;
    assert!(!cache.is_connected());
    server.shutdown().await;
}

#[tokio::test]
async fn test_reconnect_replaces_cache_with_new_snapshot() {
    let first = RoomServer::bind(
        localhost(),
        service(vec![record("c1", "Kiosk", 20, Category::Computer)]),
        16,
    )
    .unwrap();
    let addr = first.local_addr();

    let cache = Arc::new(ClientCache::new());
    let client = RealtimeClient::connect_with_delay(
        format!("ws://{addr}/ws"),
        cache.clone(),
        Duration::from_millis(100),
    );
    eventually(&cache, |c| c.get(&DeviceId::new("c1")).is_some()).await;

    first.shutdown().await;

    let second = RoomServer::bind(
        addr,
        service(vec![
            record("l7", "Floor Lamp", 37, Category::Light),
            record("l8", "Wall Lamp", 38, Category::Light),
        ]),
        16,
    )
    .unwrap();

    eventually(&cache, |c| {
        let ids: Vec<_> = c.devices().into_iter().map(|d| d.id).collect();
        ids == vec![DeviceId::new("l7"), DeviceId::new("l8")]
    })
    .await;

    client.shutdown().await;
    second.shutdown().await;
}

#[tokio::test]
async fn test_unreachable_server_keeps_retrying_until_shutdown() {
    // bind then release a port so nothing is listening on it
    let addr = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap();

    let cache = Arc::new(ClientCache::new());
    let client = RealtimeClient::connect_with_delay(
        format!("ws://{addr}/ws"),
        cache.clone(),
        Duration::from_millis(20),
    );

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(!cache.is_connected());
    assert!(cache.is_empty());

    tokio::time::timeout(Duration::from_secs(1), client.shutdown())
        .await
        .expect("shutdown should not wait for a reconnect");
}

#[tokio::test]
async fn test_pull_path_applies_full_snapshot() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/device")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"[{"_id":"d1","device_name":"Lobby","ip":"10.0.0.10","mac":"02:00:00:00:00:0a","category":"1","state":"Loading…"},
                {"_id":"c1","device_name":"Kiosk","ip":"10.0.0.20","mac":"02:00:00:00:00:14","category":"2"}]"#,
        )
        .create_async()
        .await;

    let cache = ClientCache::new();
    cache.replace_all(vec![record("old", "Stale", 9, Category::Light).view(None)]);

    let http = reqwest::Client::new();
    let count = sync_cache(&http, &format!("{}/", server.url()), &cache)
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(count, 2);
    assert!(cache.get(&DeviceId::new("old")).is_none());
    assert_eq!(cache.get(&DeviceId::new("c1")).unwrap().state, None);
}

#[tokio::test]
async fn test_pull_path_reports_server_errors() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/device")
        .with_status(500)
        .with_body(r#"{"message":"Internal server error"}"#)
        .create_async()
        .await;

    let result = fetch_devices(&reqwest::Client::new(), &server.url()).await;
    assert!(matches!(result, Err(ClientError::InvalidResponse(msg)) if msg.starts_with("500")));
}
