//! Recovery boundary.
//!
//! Turns a failed chain into a fixed 500 response. Both kinds of failure are
//! handled: an `Err` returned up through `next()` and a real panic raised by
//! a later handler.

use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::io::{self, Write};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, Once, PoisonError};

use http::StatusCode;
use tracing::{error, warn};

use crate::core::{Context, Error, Handler};
use crate::logging::timestamp;

/// Destination of recovery diagnostics.
pub type DiagnosticSink = Arc<Mutex<dyn Write + Send>>;

struct PanicReport {
    location: String,
    backtrace: String,
}

thread_local! {
    // number of recovery boundaries on this thread's stack
    static DEPTH: Cell<usize> = const { Cell::new(0) };
    static LAST_PANIC: RefCell<Option<PanicReport>> = const { RefCell::new(None) };
}

/// Recovery boundary writing diagnostics to stderr.
pub fn recovery() -> Handler {
    recovery_with_writer(Some(Arc::new(Mutex::new(io::stderr()))))
}

/// Recovery boundary writing diagnostics to `sink`.
///
/// `None` disables diagnostics; failures are still turned into 500.
pub fn recovery_with_writer(sink: Option<DiagnosticSink>) -> Handler {
    install_hook();

    Handler::named("tokio_relay::middleware::recovery", move |c: &mut Context| {
        DEPTH.with(|d| d.set(d.get() + 1));
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| c.next()));
        DEPTH.with(|d| d.set(d.get() - 1));

        let failure = match outcome {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(err)) => Failure::Error(err),
            Err(payload) => Failure::Panic {
                message: panic_message(payload.as_ref()),
                report: LAST_PANIC.with(|slot| slot.borrow_mut().take()),
            },
        };

        if failure.is_connection_lost() || c.client_gone() {
            // nobody is left to read a 500
            warn!(path = c.request().path(), "client connection lost: {}", failure);
            c.error(Error::Custom(failure.to_string()));
            c.abort();
            return Ok(());
        }

        if let Some(sink) = &sink {
            let report = diagnostic_report(c, &failure);
            let mut out = sink.lock().unwrap_or_else(PoisonError::into_inner);
            let _ = out.write_all(report.as_bytes()).and_then(|_| out.flush());
        }

        error!(path = c.request().path(), "panic recovered: {}", failure);
        c.error(Error::Custom(failure.to_string()));
        c.abort_with_status(StatusCode::INTERNAL_SERVER_ERROR);
        Ok(())
    })
}

enum Failure {
    Error(Error),
    Panic {
        message: String,
        report: Option<PanicReport>,
    },
}

impl Failure {
    fn is_connection_lost(&self) -> bool {
        match self {
            Failure::Error(err) => err.is_connection_lost(),
            Failure::Panic { message, .. } => {
                let lower = message.to_ascii_lowercase();
                lower.contains("broken pipe") || lower.contains("connection reset by peer")
            }
        }
    }
}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Failure::Error(err) => write!(f, "{}", err),
            Failure::Panic { message, .. } => write!(f, "{}", message),
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

fn diagnostic_report(c: &Context, failure: &Failure) -> String {
    let mut out = format!("[Recovery] {} panic recovered:\n", timestamp());
    out.push_str(&redacted_head(&c.request().dump_head()));
    out.push_str(&failure.to_string());
    out.push('\n');
    if let Failure::Panic {
        report: Some(report),
        ..
    } = failure
    {
        out.push_str("at ");
        out.push_str(&report.location);
        out.push('\n');
        out.push_str(&report.backtrace);
    }
    out.push('\n');
    out
}

/// Request head with credentials masked.
fn redacted_head(head: &str) -> String {
    head.split_inclusive("\r\n")
        .map(|line| match line.split_once(':') {
            Some((name, _)) if name.eq_ignore_ascii_case("authorization") => {
                format!("{}: *\r\n", name)
            }
            _ => line.to_string(),
        })
        .collect()
}

fn install_hook() {
    static HOOK: Once = Once::new();
    HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if DEPTH.with(Cell::get) == 0 {
                previous(info);
                return;
            }
            let location = info
                .location()
                .map(|l| l.to_string())
                .unwrap_or_default();
            let backtrace = trim_backtrace(&Backtrace::force_capture().to_string());
            LAST_PANIC.with(|slot| {
                *slot.borrow_mut() = Some(PanicReport {
                    location,
                    backtrace,
                })
            });
        }));
    });
}

/// Drop the frames of the panic machinery itself.
fn trim_backtrace(text: &str) -> String {
    const MACHINERY: [&str; 5] = [
        "std::backtrace",
        "std::panicking",
        "core::panicking",
        "rust_begin_unwind",
        "recovery::install_hook",
    ];

    let mut frames: Vec<String> = Vec::new();
    for line in text.lines() {
        let is_frame_start = line
            .trim_start()
            .split_once(':')
            .is_some_and(|(n, _)| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()));
        match frames.last_mut() {
            Some(frame) if !is_frame_start => {
                frame.push('\n');
                frame.push_str(line);
            }
            _ => frames.push(line.to_string()),
        }
    }

    let skip = frames
        .iter()
        .take_while(|frame| MACHINERY.iter().any(|m| frame.contains(m)))
        .count();

    let mut out = String::new();
    for frame in &frames[skip..] {
        out.push_str(frame);
        out.push('\n');
    }
    out
}
