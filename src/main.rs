use std::time::Duration;

use http::StatusCode;
use serde_json::json;
use tracing::info;

use tokio_relay::config::Config;
use tokio_relay::render::{MIME_JSON, MIME_XML};
use tokio_relay::server::shutdown_signal;
use tokio_relay::{handler, logging, mode, Context, Engine, Negotiate, Routes, Server};

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = Config::from_env()?;
    logging::init(&config.logging)?;
    mode::set_mode(config.engine.mode);

    info!("Starting tokio_relay {}...", tokio_relay::VERSION);
    config.log_summary();

    // handler chains block; they run on the blocking pool
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async_main(config))
}

async fn async_main(config: Config) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let engine = build_engine(&config)?;
    let server = Server::new(config.server.clone(), engine)
        .with_stream_buffer(config.engine.stream_buffer);

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                eprintln!("Server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Shutting down...");
            server.trigger_shutdown();
            if !server.wait_for_drain(server.drain_timeout()).await {
                info!("Exiting with {} open connections", server.active_connections());
            }
        }
    }

    Ok(())
}

fn build_engine(config: &Config) -> tokio_relay::Result<Engine> {
    let mut engine = Engine::with_default_middleware(&config.engine);

    engine.get(
        "/ping",
        [handler(|c: &mut Context| c.string(StatusCode::OK, "pong"))],
    )?;

    engine.get(
        "/hello",
        [handler(|c: &mut Context| {
            let name = c.default_query("name", "world");
            c.json(StatusCode::OK, &json!({ "message": format!("hello, {}", name) }))
        })],
    )?;

    engine.get(
        "/report",
        [handler(|c: &mut Context| {
            let report = Negotiate {
                offered: vec![MIME_JSON, MIME_XML],
                data: Some(json!({ "status": "ok", "version": tokio_relay::PKG_VERSION })),
                ..Default::default()
            };
            c.negotiate(StatusCode::OK, &report)
        })],
    )?;

    engine.get(
        "/stream",
        [handler(|c: &mut Context| {
            c.set_header("content-type", "text/plain; charset=utf-8");
            c.status(StatusCode::OK);
            let mut tick = 0;
            let gone = c.stream(|w| {
                tick += 1;
                let _ = w.write_str(&format!("tick {}\n", tick));
                std::thread::sleep(Duration::from_millis(100));
                tick < 5
            })?;
            if gone {
                info!("stream client went away after {} ticks", tick);
            }
            Ok(())
        })],
    )?;

    engine.get(
        "/panic",
        [handler(|_c: &mut Context| -> tokio_relay::Result<()> {
            panic!("demo panic")
        })],
    )?;

    let mut api = engine.group(
        "/api",
        [handler(|c: &mut Context| {
            let Some(user) = c.header("x-user").map(str::to_string) else {
                return c.abort_with_status_json(
                    StatusCode::UNAUTHORIZED,
                    &json!({ "error": "missing x-user header" }),
                );
            };
            c.set("user", user);
            c.next()
        })],
    )?;

    api.get(
        "/me",
        [handler(|c: &mut Context| {
            let user = c.get_string("user");
            c.json(StatusCode::OK, &json!({ "user": user }))
        })],
    )?;

    api.post(
        "/audit",
        [handler(|c: &mut Context| {
            // the response may be gone by the time the audit entry is written
            let snapshot = c.copy();
            std::thread::spawn(move || {
                info!(
                    path = snapshot.full_path(),
                    user = snapshot.get_string("user").as_str(),
                    bytes = snapshot.raw_data().len() as u64,
                    "audit"
                );
            });
            c.status(StatusCode::ACCEPTED);
            Ok(())
        })],
    )?;

    engine.validate()?;
    Ok(engine)
}
