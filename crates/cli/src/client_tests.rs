// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use autophone_wire::{read_request, write_response};
use tokio::net::TcpListener;

use super::*;

#[tokio::test]
async fn send_round_trips_a_request_and_response() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);
        let request = read_request(&mut reader).await.unwrap();
        assert_eq!(request, Request::Status);
        write_response(&mut write_half, &Response::OkWithBody(serde_json::json!({"devices": 2}))).await.unwrap();
    });

    let target = ConsoleTarget { host: "127.0.0.1".to_string(), port: addr.port() };
    let response = send(&target, &Request::Status).await.unwrap();
    assert_eq!(response, Response::OkWithBody(serde_json::json!({"devices": 2})));
    server.await.unwrap();
}

#[tokio::test]
async fn send_reports_a_connect_error_when_nothing_is_listening() {
    let target = ConsoleTarget { host: "127.0.0.1".to_string(), port: 1 };
    assert!(matches!(send(&target, &Request::Status).await, Err(ConsoleError::Connect { .. })));
}
