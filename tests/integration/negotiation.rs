//! Content negotiation tests over the Accept header.

use crate::helpers::*;
use http::StatusCode as Code;
use reqwest::StatusCode;
use serde_json::json;
use tokio_relay::render::{MIME_JSON, MIME_XML, MIME_XML2};
use tokio_relay::{handler, Context, Negotiate, Routes};

async fn report_server() -> TestServer {
    let mut engine = test_engine();
    engine
        .get(
            "/report",
            [handler(|c: &mut Context| {
                let report = Negotiate {
                    offered: vec![MIME_JSON, MIME_XML, MIME_XML2],
                    json_data: Some(json!({ "status": "ok" })),
                    data: Some(json!({ "status": "ok", "items": [1, 2] })),
                    ..Default::default()
                };
                c.negotiate(Code::OK, &report)
            })],
        )
        .unwrap();
    engine
        .get(
            "/empty",
            [handler(|c: &mut Context| {
                let report = Negotiate {
                    offered: vec![MIME_JSON],
                    ..Default::default()
                };
                c.negotiate(Code::OK, &report)
            })],
        )
        .unwrap();
    TestServer::start(engine).await
}

#[tokio::test]
async fn test_negotiate_json() {
    let server = report_server().await;
    let resp = server
        .get_with_headers("/report", &[("accept", "application/json")])
        .await;

    assert_status(&resp, StatusCode::OK);
    assert_header_starts_with(&resp, "content-type", "application/json");
    assert_eq!(resp.text().await.unwrap(), r#"{"status":"ok"}"#);
}

#[tokio::test]
async fn test_negotiate_xml_uses_fallback_data() {
    let server = report_server().await;
    let resp = server
        .get_with_headers("/report", &[("accept", "text/xml;q=0.9, application/json")])
        .await;

    assert_status(&resp, StatusCode::OK);
    assert_header_starts_with(&resp, "content-type", "application/xml");
    let body = resp.text().await.unwrap();
    assert!(body.contains("<map>"), "unexpected body: {}", body);
    assert!(body.contains("<status>ok</status>"));
    assert!(body.contains("<items>1</items><items>2</items>"));
}

#[tokio::test]
async fn test_negotiate_empty_accept_takes_first_offer() {
    let server = report_server().await;
    // reqwest sends "*/*" unless told otherwise
    let resp = server.get_with_headers("/report", &[("accept", "")]).await;

    assert_status(&resp, StatusCode::OK);
    assert_header_starts_with(&resp, "content-type", "application/json");
}

#[tokio::test]
async fn test_negotiate_not_acceptable() {
    let server = report_server().await;
    let resp = server
        .get_with_headers("/report", &[("accept", "image/png")])
        .await;
    assert_status(&resp, StatusCode::NOT_ACCEPTABLE);

    // wildcards are not expanded
    let resp = server.get("/report").await;
    assert_status(&resp, StatusCode::NOT_ACCEPTABLE);
}

#[tokio::test]
async fn test_negotiate_missing_payload_is_500() {
    let server = report_server().await;
    let resp = server
        .get_with_headers("/empty", &[("accept", "application/json")])
        .await;

    assert_status(&resp, StatusCode::INTERNAL_SERVER_ERROR);
}
