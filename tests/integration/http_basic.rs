//! Basic HTTP tests: routing, 404, redirects, HEAD.

use crate::helpers::*;
use http::StatusCode as Code;
use reqwest::{Method, StatusCode};
use tokio_relay::config::EngineConfig;
use tokio_relay::{handler, Context, Engine, Routes};

fn basic_engine() -> Engine {
    let mut engine = test_engine();
    engine
        .get("/ping", [handler(|c: &mut Context| c.string(Code::OK, "pong"))])
        .unwrap();
    engine
        .post(
            "/echo",
            [handler(|c: &mut Context| {
                let body = c.raw_data().clone();
                c.data(Code::OK, "application/json", body)
            })],
        )
        .unwrap();
    engine
        .get(
            "/hello",
            [handler(|c: &mut Context| {
                let name = c.default_query("name", "world");
                c.string(Code::OK, &format!("hello, {}", name))
            })],
        )
        .unwrap();
    engine
}

#[tokio::test]
async fn test_get_route() {
    let server = TestServer::start(basic_engine()).await;
    let resp = server.get("/ping").await;

    assert_status(&resp, StatusCode::OK);
    assert_header_starts_with(&resp, "content-type", "text/plain");
    assert_eq!(resp.text().await.unwrap(), "pong");
}

#[tokio::test]
async fn test_get_with_query_params() {
    let server = TestServer::start(basic_engine()).await;

    let resp = server.get("/hello?name=Test%20User").await;
    assert_status(&resp, StatusCode::OK);
    assert_body_contains(resp, "hello, Test User").await;

    let resp = server.get("/hello").await;
    assert_body_contains(resp, "hello, world").await;
}

#[tokio::test]
async fn test_post_echoes_body() {
    let server = TestServer::start(basic_engine()).await;
    let resp = server
        .post_json("/echo", &serde_json::json!({ "id": 7 }))
        .await;

    assert_status(&resp, StatusCode::OK);
    assert_header(&resp, "content-type", "application/json");
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["id"], 7);
}

#[tokio::test]
async fn test_404_default_body() {
    let server = TestServer::start(basic_engine()).await;
    let resp = server.get("/missing").await;

    assert_status(&resp, StatusCode::NOT_FOUND);
    assert_header_starts_with(&resp, "content-type", "text/plain");
    assert_eq!(resp.text().await.unwrap(), "404 page not found");
}

#[tokio::test]
async fn test_custom_no_route() {
    let mut engine = basic_engine();
    engine
        .no_route([handler(|c: &mut Context| {
            c.json(Code::NOT_FOUND, &serde_json::json!({ "error": "no such page" }))
        })])
        .unwrap();
    let server = TestServer::start(engine).await;

    let resp = server.get("/missing").await;
    assert_status(&resp, StatusCode::NOT_FOUND);
    assert_body_contains(resp, "no such page").await;
}

#[tokio::test]
async fn test_method_mismatch_is_404() {
    let server = TestServer::start(basic_engine()).await;
    let resp = server.request(Method::DELETE, "/ping").await;
    assert_status(&resp, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_redirect_fixed_path() {
    let server = TestServer::start(basic_engine()).await;

    let resp = server.get("//ping?x=1").await;
    assert_status(&resp, StatusCode::MOVED_PERMANENTLY);
    assert_header(&resp, "location", "/ping?x=1");

    let resp = server.request(Method::POST, "//echo").await;
    assert_status(&resp, StatusCode::TEMPORARY_REDIRECT);
    assert_header(&resp, "location", "/echo");
}

#[tokio::test]
async fn test_redirect_fixed_path_disabled() {
    let config = EngineConfig {
        redirect_fixed_path: false,
        ..Default::default()
    };
    let mut engine = Engine::new(&config);
    engine
        .get("/ping", [handler(|c: &mut Context| c.string(Code::OK, "pong"))])
        .unwrap();
    let server = TestServer::start(engine).await;

    let resp = server.get("//ping").await;
    assert_status(&resp, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_head_request_has_no_body() {
    let mut engine = basic_engine();
    engine
        .head("/ping", [handler(|c: &mut Context| c.string(Code::OK, "pong"))])
        .unwrap();
    let server = TestServer::start(engine).await;

    let resp = server.request(Method::HEAD, "/ping").await;
    assert_status(&resp, StatusCode::OK);
    assert!(resp.bytes().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_client_ip_from_forwarded_header() {
    let mut engine = basic_engine();
    engine
        .get(
            "/ip",
            [handler(|c: &mut Context| {
                let ip = c.client_ip();
                c.string(Code::OK, &ip)
            })],
        )
        .unwrap();
    let server = TestServer::start(engine).await;

    let resp = server
        .get_with_headers("/ip", &[("x-forwarded-for", "203.0.113.9, 10.0.0.1")])
        .await;
    assert_eq!(resp.text().await.unwrap(), "203.0.113.9");

    let resp = server.get("/ip").await;
    assert_eq!(resp.text().await.unwrap(), "127.0.0.1");
}
