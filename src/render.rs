//! Response renderers.
//!
//! A renderer receives the [`ResponseWriter`] after the status has been set and
//! is responsible for the content type and the body bytes.

use bytes::Bytes;
use http::header::{self, HeaderValue};
use http::StatusCode;
use serde::Serialize;
use serde_json::Value;

use crate::core::{Error, ResponseWriter, Result};

pub const MIME_JSON: &str = "application/json";
pub const MIME_HTML: &str = "text/html";
pub const MIME_XML: &str = "application/xml";
pub const MIME_XML2: &str = "text/xml";
pub const MIME_PLAIN: &str = "text/plain";

static JSON_CONTENT_TYPE: HeaderValue = HeaderValue::from_static("application/json; charset=utf-8");
static HTML_CONTENT_TYPE: HeaderValue = HeaderValue::from_static("text/html; charset=utf-8");
static XML_CONTENT_TYPE: HeaderValue = HeaderValue::from_static("application/xml; charset=utf-8");
static PLAIN_CONTENT_TYPE: HeaderValue = HeaderValue::from_static("text/plain; charset=utf-8");

/// Serializes a payload into a response.
pub trait Render {
    /// Set the content type, unless a handler already chose one.
    fn write_content_type(&self, w: &mut ResponseWriter);

    /// Write content type and body.
    fn render(&self, w: &mut ResponseWriter) -> Result<()>;
}

/// Template engine seam used by [`Html`] rendering.
pub trait HtmlRender: Send + Sync {
    /// Produce the page for template `name`.
    fn instance(&self, name: &str, data: &Value) -> Result<String>;
}

fn write_content_type(w: &mut ResponseWriter, value: &HeaderValue) {
    w.headers_mut()
        .entry(header::CONTENT_TYPE)
        .or_insert_with(|| value.clone());
}

/// JSON body.
pub struct Json<'a, T: ?Sized>(pub &'a T);

impl<T: Serialize + ?Sized> Render for Json<'_, T> {
    fn write_content_type(&self, w: &mut ResponseWriter) {
        write_content_type(w, &JSON_CONTENT_TYPE);
    }

    fn render(&self, w: &mut ResponseWriter) -> Result<()> {
        self.write_content_type(w);
        let body = serde_json::to_vec(self.0).map_err(|e| Error::Render(e.to_string()))?;
        w.write_bytes(&body)?;
        Ok(())
    }
}

/// Plain text body.
pub struct Text<'a>(pub &'a str);

impl Render for Text<'_> {
    fn write_content_type(&self, w: &mut ResponseWriter) {
        write_content_type(w, &PLAIN_CONTENT_TYPE);
    }

    fn render(&self, w: &mut ResponseWriter) -> Result<()> {
        self.write_content_type(w);
        if !self.0.is_empty() {
            w.write_str(self.0)?;
        }
        Ok(())
    }
}

/// Raw bytes with a caller-chosen content type.
pub struct Data {
    pub content_type: String,
    pub data: Bytes,
}

impl Render for Data {
    fn write_content_type(&self, w: &mut ResponseWriter) {
        if let Ok(value) = HeaderValue::try_from(self.content_type.as_str()) {
            write_content_type(w, &value);
        }
    }

    fn render(&self, w: &mut ResponseWriter) -> Result<()> {
        self.write_content_type(w);
        w.write_bytes(&self.data)?;
        Ok(())
    }
}

/// Pre-rendered HTML page.
pub struct Html(pub String);

impl Render for Html {
    fn write_content_type(&self, w: &mut ResponseWriter) {
        write_content_type(w, &HTML_CONTENT_TYPE);
    }

    fn render(&self, w: &mut ResponseWriter) -> Result<()> {
        self.write_content_type(w);
        w.write_str(&self.0)?;
        Ok(())
    }
}

/// XML body built from a JSON-like value.
pub struct Xml<'a>(pub &'a Value);

impl Render for Xml<'_> {
    fn write_content_type(&self, w: &mut ResponseWriter) {
        write_content_type(w, &XML_CONTENT_TYPE);
    }

    fn render(&self, w: &mut ResponseWriter) -> Result<()> {
        self.write_content_type(w);
        w.write_str(&to_xml(self.0))?;
        Ok(())
    }
}

/// Redirect to `location` with a 3xx (or 201) status.
pub struct Redirect<'a> {
    pub code: StatusCode,
    pub location: &'a str,
}

impl Render for Redirect<'_> {
    fn write_content_type(&self, _: &mut ResponseWriter) {}

    fn render(&self, w: &mut ResponseWriter) -> Result<()> {
        let code = self.code.as_u16();
        if !(300..=308).contains(&code) && self.code != StatusCode::CREATED {
            return Err(Error::Render(format!(
                "cannot redirect with status code {}",
                code
            )));
        }
        let location = HeaderValue::try_from(self.location)
            .map_err(|e| Error::Render(format!("invalid redirect location: {}", e)))?;
        w.headers_mut().insert(header::LOCATION, location);
        w.set_status(self.code);
        w.write_header_now();
        Ok(())
    }
}

/// Encode `value` as XML under a `<map>` root.
///
/// Object keys become elements, arrays repeat their parent element and `null`
/// becomes an empty element.
pub fn to_xml(value: &Value) -> String {
    let mut out = String::with_capacity(64);
    write_element(&mut out, "map", value);
    out
}

fn write_element(out: &mut String, name: &str, value: &Value) {
    if let Value::Array(items) = value {
        for item in items {
            write_element(out, name, item);
        }
        return;
    }
    out.push('<');
    out.push_str(name);
    out.push('>');
    match value {
        Value::Null => {}
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => escape_into(out, s),
        Value::Object(map) => {
            for (key, child) in map {
                write_element(out, key, child);
            }
        }
        Value::Array(_) => {}
    }
    out.push_str("</");
    out.push_str(name);
    out.push('>');
}

fn escape_into(out: &mut String, s: &str) {
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
}
