//! Shared harness: an in-process server plus response assertions.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{redirect, Client, RequestBuilder, Response, StatusCode};
use tokio::net::TcpListener;

use tokio_relay::config::{EngineConfig, ServerConfig};
use tokio_relay::middleware::{logger, recovery_with_writer};
use tokio_relay::{Engine, Routes, Server};

/// In-process server on an ephemeral port.
pub struct TestServer {
    pub base_url: String,
    pub client: Client,
    server: Arc<Server>,
}

#[allow(dead_code)]
impl TestServer {
    /// Serve `engine` on 127.0.0.1 with a random port.
    pub async fn start(engine: Engine) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("listener address");

        let server = Arc::new(Server::new(ServerConfig::default(), engine).with_stream_buffer(4));
        let running = Arc::clone(&server);
        tokio::spawn(async move {
            if let Err(e) = running.serve(listener).await {
                eprintln!("test server error: {}", e);
            }
        });

        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .redirect(redirect::Policy::none())
            .build()
            .expect("build reqwest client");

        Self {
            base_url: format!("http://{}", addr),
            client,
            server,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(req: RequestBuilder) -> Response {
        req.send().await.expect("request to test server failed")
    }

    pub async fn get(&self, path: &str) -> Response {
        Self::send(self.client.get(self.url(path))).await
    }

    pub async fn get_with_headers(&self, path: &str, headers: &[(&str, &str)]) -> Response {
        let req = headers
            .iter()
            .fold(self.client.get(self.url(path)), |req, (name, value)| {
                req.header(*name, *value)
            });
        Self::send(req).await
    }

    pub async fn post_json<T: serde::Serialize + ?Sized>(&self, path: &str, json: &T) -> Response {
        Self::send(self.client.post(self.url(path)).json(json)).await
    }

    pub async fn request(&self, method: reqwest::Method, path: &str) -> Response {
        Self::send(self.client.request(method, self.url(path))).await
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.server.trigger_shutdown();
    }
}

/// Engine with the access logger and a silent recovery boundary.
pub fn test_engine() -> Engine {
    let mut engine = Engine::new(&EngineConfig::default());
    engine.use_middleware([logger(), recovery_with_writer(None)]);
    engine
}

fn header_value<'a>(response: &'a Response, name: &str) -> &'a str {
    response
        .headers()
        .get(name)
        .unwrap_or_else(|| panic!("missing header {}", name))
        .to_str()
        .expect("header is not ascii")
}

pub fn assert_status(response: &Response, expected: StatusCode) {
    assert_eq!(response.status(), expected, "unexpected status for {}", response.url());
}

pub fn assert_header(response: &Response, name: &str, expected: &str) {
    assert_eq!(header_value(response, name), expected, "header {}", name);
}

pub fn assert_header_starts_with(response: &Response, name: &str, prefix: &str) {
    let value = header_value(response, name);
    assert!(value.starts_with(prefix), "header {} = {:?}, wanted prefix {:?}", name, value, prefix);
}

pub async fn assert_body_contains(response: Response, needle: &str) {
    let body = response.text().await.expect("read body");
    assert!(body.contains(needle), "{:?} not found in body {:?}", needle, body);
}
