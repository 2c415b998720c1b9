//! Handler chain tests: middleware order, abort, scratch space, recovery.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::helpers::*;
use http::StatusCode as Code;
use reqwest::StatusCode;
use tokio_relay::{handler, Context, Engine, Error, Handler, Routes};

fn trail(step: &'static str) -> Handler {
    handler(move |c: &mut Context| {
        let mut trail = c.get_string_slice("trail");
        trail.push(step.to_string());
        c.set("trail", trail);
        Ok(())
    })
}

fn respond_with_trail() -> Handler {
    handler(|c: &mut Context| {
        let trail = c.get_string_slice("trail").join(",");
        c.string(Code::OK, &trail)
    })
}

#[tokio::test]
async fn test_group_middleware_runs_parent_first() {
    let mut engine = test_engine();
    {
        let mut v1 = engine.group("/v1", [trail("m1")]).unwrap();
        let mut admin = v1.group("admin", [trail("m2")]).unwrap();
        admin
            .get("/stats", [trail("h"), respond_with_trail()])
            .unwrap();
    }
    let server = TestServer::start(engine).await;

    let resp = server.get("/v1/admin/stats").await;
    assert_status(&resp, StatusCode::OK);
    assert_eq!(resp.text().await.unwrap(), "m1,m2,h");
}

#[tokio::test]
async fn test_abort_stops_pending_handlers() {
    let reached = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&reached);

    let mut engine = test_engine();
    engine
        .get(
            "/private",
            [
                handler(|c: &mut Context| {
                    if c.header("x-user").is_none() {
                        return c.abort_with_status_json(
                            Code::UNAUTHORIZED,
                            &serde_json::json!({ "error": "unauthorized" }),
                        );
                    }
                    Ok(())
                }),
                handler(move |c: &mut Context| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    c.string(Code::OK, "secret")
                }),
            ],
        )
        .unwrap();
    let server = TestServer::start(engine).await;

    let resp = server.get("/private").await;
    assert_status(&resp, StatusCode::UNAUTHORIZED);
    assert_header_starts_with(&resp, "content-type", "application/json");
    assert_body_contains(resp, "unauthorized").await;
    assert_eq!(reached.load(Ordering::SeqCst), 0);

    let resp = server.get_with_headers("/private", &[("x-user", "ann")]).await;
    assert_status(&resp, StatusCode::OK);
    assert_eq!(reached.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_wrap_pattern_sees_downstream_status() {
    let mut engine = test_engine();
    engine
        .get(
            "/wrapped",
            [
                handler(|c: &mut Context| {
                    c.set_header("x-before", "1");
                    c.next()?;
                    // head is already out; this header is not sent
                    c.set_header("x-after", "1");
                    Ok(())
                }),
                handler(|c: &mut Context| c.string(Code::CREATED, "made")),
            ],
        )
        .unwrap();
    let server = TestServer::start(engine).await;

    let resp = server.get("/wrapped").await;
    assert_status(&resp, StatusCode::CREATED);
    assert_header(&resp, "x-before", "1");
    assert!(resp.headers().get("x-after").is_none());
}

#[tokio::test]
async fn test_panic_is_recovered() {
    let mut engine = test_engine();
    engine
        .get(
            "/panic",
            [handler(|_c: &mut Context| -> tokio_relay::Result<()> {
                panic!("handler exploded")
            })],
        )
        .unwrap();
    engine
        .get("/ok", [handler(|c: &mut Context| c.string(Code::OK, "still up"))])
        .unwrap();
    let server = TestServer::start(engine).await;

    let resp = server.get("/panic").await;
    assert_status(&resp, StatusCode::INTERNAL_SERVER_ERROR);

    let resp = server.get("/ok").await;
    assert_status(&resp, StatusCode::OK);
    assert_body_contains(resp, "still up").await;
}

#[tokio::test]
async fn test_missing_key_is_recovered() {
    let mut engine = test_engine();
    engine
        .get(
            "/user",
            [handler(|c: &mut Context| {
                let user = c.must_get_as::<String>("user")?.clone();
                c.string(Code::OK, &user)
            })],
        )
        .unwrap();
    let server = TestServer::start(engine).await;

    let resp = server.get("/user").await;
    assert_status(&resp, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_error_without_recovery_answers_500() {
    let mut engine = Engine::default();
    engine
        .get(
            "/fail",
            [handler(|_c: &mut Context| Err(Error::Custom("database down".into())))],
        )
        .unwrap();
    let server = TestServer::start(engine).await;

    let resp = server.get("/fail").await;
    assert_status(&resp, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(resp.bytes().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_scratch_does_not_leak_between_requests() {
    let mut engine = test_engine();
    engine
        .get(
            "/count",
            [handler(|c: &mut Context| {
                let seen = c.get_int("seen");
                c.set("seen", seen + 1);
                let now = c.get_int("seen");
                c.string(Code::OK, &now.to_string())
            })],
        )
        .unwrap();
    let server = TestServer::start(engine).await;

    for _ in 0..3 {
        let resp = server.get("/count").await;
        assert_eq!(resp.text().await.unwrap(), "1");
    }
}

#[tokio::test]
async fn test_concurrent_requests_are_isolated() {
    let mut engine = test_engine();
    engine
        .get(
            "/whoami",
            [
                handler(|c: &mut Context| {
                    let id = c.query("id");
                    c.set("id", id);
                    Ok(())
                }),
                handler(|c: &mut Context| {
                    std::thread::sleep(std::time::Duration::from_millis(10));
                    let id = c.get_string("id");
                    c.string(Code::OK, &id)
                }),
            ],
        )
        .unwrap();
    let server = TestServer::start(engine).await;

    let requests = (0..16).map(|i| {
        let server = &server;
        async move {
            let resp = server.get(&format!("/whoami?id={}", i)).await;
            (i, resp.text().await.unwrap())
        }
    });
    for (i, body) in futures_util::future::join_all(requests).await {
        assert_eq!(body, i.to_string());
    }
}
