use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::time::timeout;

use cockpit_link::{
    CommunicationManager, ConnectionConfig, DeviceEvent, DeviceServer, LinkError, MockManager,
    TcpConfig, TcpIpManager,
};

async fn next_event(rx: &mut broadcast::Receiver<DeviceEvent>) -> DeviceEvent {
    timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

#[test]
fn test_error_display() {
    let error = LinkError::Config {
        message: "Invalid configuration".to_string(),
    };
    assert!(error.to_string().contains("Configuration error"));
    assert!(error.to_string().contains("Invalid configuration"));
}

#[test]
fn test_config_toml_round_trip() {
    let config = ConnectionConfig::Tcp {
        host: "192.168.1.101".to_string(),
        port: 8080,
        connect_timeout_ms: 3000,
    };
    let toml_str = toml::to_string(&config).expect("Failed to serialize config");
    let deserialized: ConnectionConfig = toml::from_str(&toml_str).expect("Failed to deserialize");
    assert!(deserialized.validate().is_ok());
}

#[tokio::test]
async fn test_device_server_over_mock_manager() {
    let manager = Arc::new(MockManager::new("COM3"));
    let server = DeviceServer::new(Arc::clone(&manager) as Arc<dyn CommunicationManager>);
    let mut rx = server.subscribe();

    assert_eq!(server.id(), "COM3");
    assert!(!server.is_running());

    server.start().await;
    assert!(server.is_running());
    assert_eq!(next_event(&mut rx).await, DeviceEvent::StatusChanged(true));

    manager.inject_line("ALT 3500\r\n");
    assert_eq!(
        next_event(&mut rx).await,
        DeviceEvent::DataReceived("ALT 3500".to_string())
    );

    server.send_data("LED NAV ON").await;
    assert_eq!(manager.sent_data(), vec!["LED NAV ON".to_string()]);

    server.stop().await;
    assert!(!server.is_running());
    assert_eq!(next_event(&mut rx).await, DeviceEvent::StatusChanged(false));
}

#[tokio::test]
async fn test_device_server_over_tcp_end_to_end() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        socket.write_all(b"BTN 12 PRESSED\n").await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
    });

    let manager = TcpIpManager::new(TcpConfig::new("127.0.0.1", port)).unwrap();
    let server = DeviceServer::new(Arc::new(manager));
    let mut rx = server.subscribe();

    server.start().await;
    assert!(server.is_running());
    assert_eq!(next_event(&mut rx).await, DeviceEvent::StatusChanged(true));
    assert_eq!(
        next_event(&mut rx).await,
        DeviceEvent::DataReceived("BTN 12 PRESSED".to_string())
    );

    server.stop().await;
    assert!(!server.is_running());
    assert_eq!(next_event(&mut rx).await, DeviceEvent::StatusChanged(false));
}

#[tokio::test]
async fn test_tcp_connect_to_absent_listener_reports_failure() {
    // Bind then drop so nothing is listening on the port
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let manager = TcpIpManager::new(TcpConfig::new("127.0.0.1", port)).unwrap();
    let mut rx = manager.subscribe();

    manager.connect().await;

    assert_eq!(next_event(&mut rx).await, DeviceEvent::StatusChanged(false));
    assert!(!manager.is_connected());
}

#[tokio::test]
async fn test_two_devices_have_independent_event_streams() {
    let first = Arc::new(MockManager::new("COM3"));
    let second = Arc::new(MockManager::new("COM4"));
    let first_server = DeviceServer::new(Arc::clone(&first) as Arc<dyn CommunicationManager>);
    let second_server = DeviceServer::new(Arc::clone(&second) as Arc<dyn CommunicationManager>);

    let mut first_rx = first_server.subscribe();
    let mut second_rx = second_server.subscribe();

    first_server.start().await;
    assert_eq!(
        next_event(&mut first_rx).await,
        DeviceEvent::StatusChanged(true)
    );

    first.inject_line("ENC 1 +1\n");
    assert_eq!(
        next_event(&mut first_rx).await,
        DeviceEvent::DataReceived("ENC 1 +1".to_string())
    );

    // The second device saw none of it
    assert!(second_rx.try_recv().is_err());
    assert!(!second_server.is_running());
}
