//! The inbound request a chain runs against.

use std::fmt::Write as _;
use std::net::SocketAddr;

use bytes::Bytes;
use http::header;
use http::{HeaderMap, Method, Uri, Version};
use percent_encoding::percent_decode_str;

/// Fully buffered request plus the peer address.
///
/// Contexts hold it behind an `Arc`; `copy()` shares it rather than cloning.
#[derive(Debug)]
pub struct Request {
    method: Method,
    uri: Uri,
    version: Version,
    headers: HeaderMap,
    body: Bytes,
    remote_addr: Option<SocketAddr>,
}

impl Request {
    pub fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    #[inline]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[inline]
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Raw, undecoded path.
    #[inline]
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// Raw query string without the leading `?`.
    #[inline]
    pub fn query(&self) -> Option<&str> {
        self.uri.query()
    }

    #[inline]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    #[inline]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    #[inline]
    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    /// Header value as text. Names are case-insensitive; non-ASCII values
    /// read as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn accept(&self) -> Option<&str> {
        self.header(header::ACCEPT.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header(header::CONTENT_TYPE.as_str())
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.header(header::USER_AGENT.as_str())
    }

    /// Query string split into decoded `(key, value)` pairs, in order.
    ///
    /// `+` means space, a bare key has an empty value and bad UTF-8 is
    /// replaced lossily.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.query()
            .unwrap_or("")
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| {
                let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
                (unescape(key), unescape(value))
            })
            .collect()
    }

    /// Request line and headers in wire form. The body is never included.
    pub fn dump_head(&self) -> String {
        let target = self.uri.path_and_query().map_or("/", |pq| pq.as_str());
        let mut out = format!("{} {} {:?}\r\n", self.method, target, self.version);
        if let (Some(host), false) = (self.uri.host(), self.headers.contains_key(header::HOST)) {
            let _ = write!(out, "Host: {}\r\n", host);
        }
        for (name, value) in &self.headers {
            let _ = write!(out, "{}: {}\r\n", name, String::from_utf8_lossy(value.as_bytes()));
        }
        out.push_str("\r\n");
        out
    }
}

fn unescape(s: &str) -> String {
    let spaced = s.replace('+', " ");
    percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
}

impl<B: Into<Bytes>> From<http::Request<B>> for Request {
    fn from(req: http::Request<B>) -> Self {
        let (parts, body) = req.into_parts();
        Self {
            method: parts.method,
            uri: parts.uri,
            version: parts.version,
            headers: parts.headers,
            body: body.into(),
            remote_addr: None,
        }
    }
}

/// `GET /` with no headers, used for idle pooled contexts.
impl Default for Request {
    fn default() -> Self {
        Self {
            method: Method::GET,
            uri: Uri::from_static("/"),
            version: Version::HTTP_11,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            remote_addr: None,
        }
    }
}
