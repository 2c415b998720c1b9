//! Buffered HTTP response produced by a finished handler chain.

use bytes::Bytes;
use http::header;
use http::{HeaderMap, StatusCode};

/// HTTP response collected from a [`BufferSink`](super::BufferSink).
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl Response {
    /// Assemble a response from its parts.
    #[inline]
    pub fn from_parts(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Get the status code.
    #[inline]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Get the headers.
    #[inline]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Get the response body.
    #[inline]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Body as UTF-8 text, lossily.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Get a header value by string name (case-insensitive).
    #[inline]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Get Content-Type header.
    #[inline]
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }

    /// Split into status, headers and body.
    #[inline]
    pub fn into_parts(self) -> (StatusCode, HeaderMap, Bytes) {
        (self.status, self.headers, self.body)
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::from_parts(StatusCode::OK, HeaderMap::new(), Bytes::new())
    }
}

impl From<Response> for http::Response<Bytes> {
    fn from(res: Response) -> Self {
        let mut http_res = http::Response::new(res.body);
        *http_res.status_mut() = res.status;
        *http_res.headers_mut() = res.headers;
        http_res
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[test]
    fn test_response_accessors() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        headers.insert("x-custom", HeaderValue::from_static("value"));

        let res = Response::from_parts(StatusCode::CREATED, headers, Bytes::from_static(b"Hello"));

        assert_eq!(res.status(), StatusCode::CREATED);
        assert_eq!(res.header("X-Custom"), Some("value"));
        assert_eq!(res.content_type(), Some("text/plain; charset=utf-8"));
        assert_eq!(res.text(), "Hello");
    }

    #[test]
    fn test_response_to_http() {
        let mut headers = HeaderMap::new();
        headers.insert("x-test", HeaderValue::from_static("value"));
        let res = Response::from_parts(StatusCode::ACCEPTED, headers, Bytes::from_static(b"Hi"));

        let http_res: http::Response<Bytes> = res.into();
        assert_eq!(http_res.status(), StatusCode::ACCEPTED);
        assert_eq!(http_res.headers().get("x-test").unwrap(), "value");
        assert_eq!(http_res.body().as_ref(), b"Hi");
    }

    #[test]
    fn test_response_default_is_empty_ok() {
        let res = Response::default();
        assert_eq!(res.status(), StatusCode::OK);
        assert!(res.headers().is_empty());
        assert!(res.body().is_empty());
    }
}
