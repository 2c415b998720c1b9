//! Streaming tests
//!
//! These tests verify that:
//! - the head reaches the client before the handler finishes
//! - chunks arrive in order
//! - a disconnecting client is reported to the handler

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::helpers::*;
use http::StatusCode as Code;
use reqwest::StatusCode;
use tokio_relay::{handler, Context, Routes};

#[tokio::test]
async fn test_stream_chunks_arrive_incrementally() {
    let mut engine = test_engine();
    engine
        .get(
            "/ticks",
            [handler(|c: &mut Context| {
                c.set_header("content-type", "text/plain");
                c.status(Code::OK);
                let mut tick = 0;
                c.stream(|w| {
                    tick += 1;
                    let _ = w.write_str(&format!("tick {}\n", tick));
                    std::thread::sleep(Duration::from_millis(300));
                    tick < 3
                })?;
                Ok(())
            })],
        )
        .unwrap();
    let server = TestServer::start(engine).await;

    let start = Instant::now();
    let mut resp = server.get("/ticks").await;
    let head_after = start.elapsed();
    assert_status(&resp, StatusCode::OK);
    assert!(
        head_after < Duration::from_millis(800),
        "head arrived after {:?}",
        head_after
    );

    let mut body = Vec::new();
    while let Some(chunk) = resp.chunk().await.unwrap() {
        body.extend_from_slice(&chunk);
    }
    assert_eq!(String::from_utf8(body).unwrap(), "tick 1\ntick 2\ntick 3\n");
}

#[tokio::test]
async fn test_stream_reports_client_gone() {
    let gone = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&gone);

    let mut engine = test_engine();
    engine
        .get(
            "/forever",
            [handler(move |c: &mut Context| {
                c.status(Code::OK);
                let client_left = c.stream(|w| {
                    let _ = w.write_str("data\n");
                    std::thread::sleep(Duration::from_millis(20));
                    true
                })?;
                flag.store(client_left, Ordering::SeqCst);
                Ok(())
            })],
        )
        .unwrap();
    let server = TestServer::start(engine).await;

    let mut resp = server.get("/forever").await;
    assert_status(&resp, StatusCode::OK);
    assert!(resp.chunk().await.unwrap().is_some());
    drop(resp);

    let deadline = Instant::now() + Duration::from_secs(5);
    while !gone.load(Ordering::SeqCst) && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(gone.load(Ordering::SeqCst), "handler never saw the client leave");
}
