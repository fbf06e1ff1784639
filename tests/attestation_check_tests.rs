//! Live attestation service checks against a local stand-in server

use fasset_flow::{attestation_services, check_attestation_services};
use fasset_flow_config::AppConfig;
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// Answers the status and block-range endpoints with canned JSON
async fn serve(listener: TcpListener) {
    while let Ok((socket, _)) = listener.accept().await {
        tokio::spawn(answer(socket));
    }
}

async fn answer(mut socket: TcpStream) {
    let mut request = Vec::new();
    let mut buf = [0u8; 1024];
    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(n) => request.extend_from_slice(&buf[..n]),
        }
    }
    let request = String::from_utf8_lossy(&request);
    let path = request.split_whitespace().nth(1).unwrap_or_default();
    let (status, body) = match path {
        "/api/v0/fsp/status" => ("200 OK", r#"{"latest_fdc":{"voting_round_id":1042}}"#),
        "/verifier/xrp/api/indexer/block-range" => ("200 OK", r#"{"status":"OK","data":{"first":100,"last":250}}"#),
        _ => ("404 Not Found", "{}"),
    };
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
}

async fn stand_in() -> (SocketAddr, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    (address, tokio::spawn(serve(listener)))
}

fn live_config(address: SocketAddr) -> AppConfig {
    let mut config = AppConfig::default();
    config.attestation.fdc_url = format!("http://{address}/");
    config.attestation.da_url = format!("http://{address}");
    config.attestation.api_key = "test-key".to_string();
    config.attestation.request_timeout_ms = 2_000;
    config.network.verifier_chain = "xrp".to_string();
    config
}

#[tokio::test]
async fn test_check_reads_round_and_block_range() {
    let (address, server) = stand_in().await;
    let services = attestation_services(&live_config(address)).unwrap();

    let (round, range) = check_attestation_services(&services).await.unwrap();
    assert_eq!(round, 1042);
    assert_eq!((range.first, range.last), (100, 250));
    server.abort();
}

#[tokio::test]
async fn test_check_reports_unknown_chain() {
    let (address, server) = stand_in().await;
    let mut config = live_config(address);
    config.network.verifier_chain = "doge".to_string();
    let services = attestation_services(&config).unwrap();

    let err = check_attestation_services(&services).await.unwrap_err();
    assert!(err.to_string().contains("verifier"), "{err:#}");
    server.abort();
}
