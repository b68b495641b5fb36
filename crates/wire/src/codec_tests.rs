// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::request::Request;
use std::io::Cursor;
use tokio::io::BufReader;

#[tokio::test]
async fn read_request_parses_a_single_line() {
    let mut reader = BufReader::new(Cursor::new(b"autophone-status\n".to_vec()));
    let request = read_request(&mut reader).await.unwrap();
    assert_eq!(request, Request::Status);
}

#[tokio::test]
async fn read_request_on_empty_stream_reports_closed() {
    let mut reader = BufReader::new(Cursor::new(Vec::<u8>::new()));
    assert!(matches!(read_request(&mut reader).await, Err(WireError::Closed)));
}

#[tokio::test]
async fn read_request_propagates_parse_errors() {
    let mut reader = BufReader::new(Cursor::new(b"autophone-frobnicate\n".to_vec()));
    assert!(matches!(read_request(&mut reader).await, Err(WireError::Request(_))));
}

#[tokio::test]
async fn write_response_emits_wire_bytes() {
    let mut buf: Vec<u8> = Vec::new();
    write_response(&mut buf, &Response::Ok).await.unwrap();
    assert_eq!(buf, b"OK\n");
}

#[tokio::test]
async fn write_request_emits_wire_bytes() {
    let mut buf: Vec<u8> = Vec::new();
    write_request(&mut buf, &Request::Status).await.unwrap();
    assert_eq!(buf, b"autophone-status\n");
}

#[tokio::test]
async fn read_response_parses_a_single_line() {
    let mut reader = BufReader::new(Cursor::new(b"OK\n".to_vec()));
    assert_eq!(read_response(&mut reader).await.unwrap(), Response::Ok);
}

#[tokio::test]
async fn read_response_on_empty_stream_reports_closed() {
    let mut reader = BufReader::new(Cursor::new(Vec::<u8>::new()));
    assert!(matches!(read_response(&mut reader).await, Err(WireError::Closed)));
}
