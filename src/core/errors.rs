//! Errors recorded on a context while a request is processed.
//!
//! Unlike [`Error`](super::Error), recorded errors do not stop the chain.
//! They accumulate so that a later handler (typically the access logger or an
//! error-to-JSON middleware) can inspect them.

use std::fmt;
use std::ops::BitOr;
use std::sync::Arc;

use serde_json::{Map, Value};

use super::Error;

/// Classification bits for a recorded error.
///
/// Kinds are bit flags; [`ErrorKind::ANY`] matches every kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ErrorKind(u64);

impl ErrorKind {
    /// Request decoding failed.
    pub const BIND: Self = Self(1 << 63);
    /// Response encoding failed.
    pub const RENDER: Self = Self(1 << 62);
    /// Internal detail, not for the client.
    pub const PRIVATE: Self = Self(1 << 0);
    /// Safe to surface to the client.
    pub const PUBLIC: Self = Self(1 << 1);
    /// Matches every kind.
    pub const ANY: Self = Self(u64::MAX);

    /// Check whether `self` shares at least one bit with `other`.
    #[inline]
    pub const fn matches(self, other: ErrorKind) -> bool {
        self.0 & other.0 != 0
    }

    /// Raw bit representation.
    #[inline]
    pub const fn bits(self) -> u64 {
        self.0
    }
}

impl BitOr for ErrorKind {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// A failure recorded during request processing.
#[derive(Clone, Debug)]
pub struct RecordedError {
    err: Arc<dyn std::error::Error + Send + Sync>,
    kind: ErrorKind,
    meta: Option<Value>,
}

impl RecordedError {
    /// Wrap an error, inferring its kind.
    ///
    /// [`Error::Bind`] and [`Error::Render`] keep their classification;
    /// everything else starts out private.
    pub fn new(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        let err = err.into();
        let kind = match err.downcast_ref::<Error>() {
            Some(Error::Bind(_)) => ErrorKind::BIND,
            Some(Error::Render(_)) => ErrorKind::RENDER,
            _ => ErrorKind::PRIVATE,
        };
        Self {
            err: Arc::from(err),
            kind,
            meta: None,
        }
    }

    /// Reclassify this error.
    pub fn set_kind(&mut self, kind: ErrorKind) -> &mut Self {
        self.kind = kind;
        self
    }

    /// Attach metadata surfaced by [`RecordedError::to_json`].
    pub fn set_meta(&mut self, meta: Value) -> &mut Self {
        self.meta = Some(meta);
        self
    }

    /// Get the kind.
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Get the metadata.
    #[inline]
    pub fn meta(&self) -> Option<&Value> {
        self.meta.as_ref()
    }

    /// Get the wrapped error.
    #[inline]
    pub fn error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        self.err.as_ref()
    }

    /// Check if this error has been marked public.
    #[inline]
    pub fn is_public(&self) -> bool {
        self.kind.matches(ErrorKind::PUBLIC)
    }

    /// JSON view of the error.
    ///
    /// Object metadata is extended with an `error` field (unless it already has
    /// one); other metadata is returned as-is; without metadata the result is
    /// `{"error": message}`.
    pub fn to_json(&self) -> Value {
        match &self.meta {
            Some(Value::Object(meta)) => {
                let mut object = meta.clone();
                object
                    .entry("error")
                    .or_insert_with(|| Value::String(self.err.to_string()));
                Value::Object(object)
            }
            Some(meta) => meta.clone(),
            None => {
                let mut object = Map::with_capacity(1);
                object.insert("error".into(), Value::String(self.err.to_string()));
                Value::Object(object)
            }
        }
    }
}

impl fmt::Display for RecordedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.err, f)
    }
}

/// Append-only list of errors recorded on one request.
#[derive(Clone, Debug, Default)]
pub struct ErrorList {
    items: Vec<RecordedError>,
}

impl ErrorList {
    #[inline]
    pub(crate) fn push(&mut self, err: RecordedError) -> &mut RecordedError {
        self.items.push(err);
        let last = self.items.len() - 1;
        &mut self.items[last]
    }

    #[inline]
    pub(crate) fn clear(&mut self) {
        self.items.clear();
    }

    /// Number of recorded errors.
    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if nothing has been recorded.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The most recently recorded error.
    #[inline]
    pub fn last(&self) -> Option<&RecordedError> {
        self.items.last()
    }

    /// Iterate in recording order.
    pub fn iter(&self) -> impl Iterator<Item = &RecordedError> {
        self.items.iter()
    }

    /// Errors whose kind matches `kind`, in recording order.
    pub fn by_kind(&self, kind: ErrorKind) -> Vec<&RecordedError> {
        if kind == ErrorKind::ANY {
            return self.items.iter().collect();
        }
        self.items.iter().filter(|e| e.kind.matches(kind)).collect()
    }

    /// Error messages in recording order.
    pub fn messages(&self) -> Vec<String> {
        self.items.iter().map(|e| e.err.to_string()).collect()
    }

    /// JSON view: `null` when empty, a single object for one error, an array otherwise.
    pub fn to_json(&self) -> Value {
        match self.items.as_slice() {
            [] => Value::Null,
            [only] => only.to_json(),
            many => Value::Array(many.iter().map(RecordedError::to_json).collect()),
        }
    }
}

impl fmt::Display for ErrorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.items.iter().enumerate() {
            writeln!(f, "Error #{:02}: {}", i + 1, err)?;
            if let Some(meta) = &err.meta {
                writeln!(f, "     Meta: {}", meta)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_inferred_from_core_error() {
        assert_eq!(
            RecordedError::new(Error::Bind("bad json".into())).kind(),
            ErrorKind::BIND
        );
        assert_eq!(
            RecordedError::new(Error::Render("bad xml".into())).kind(),
            ErrorKind::RENDER
        );
        assert_eq!(RecordedError::new("plain").kind(), ErrorKind::PRIVATE);
    }

    #[test]
    fn test_kind_matching() {
        let combined = ErrorKind::PUBLIC | ErrorKind::BIND;
        assert!(combined.matches(ErrorKind::PUBLIC));
        assert!(combined.matches(ErrorKind::BIND));
        assert!(!combined.matches(ErrorKind::PRIVATE));
        assert!(ErrorKind::ANY.matches(ErrorKind::RENDER));
    }

    #[test]
    fn test_to_json_variants() {
        let mut err = RecordedError::new("boom");
        assert_eq!(err.to_json(), json!({"error": "boom"}));

        err.set_meta(json!({"field": "name"}));
        assert_eq!(err.to_json(), json!({"field": "name", "error": "boom"}));

        err.set_meta(json!({"error": "custom"}));
        assert_eq!(err.to_json(), json!({"error": "custom"}));

        err.set_meta(json!("just a string"));
        assert_eq!(err.to_json(), json!("just a string"));
    }

    #[test]
    fn test_error_list_filters_and_json() {
        let mut list = ErrorList::default();
        assert_eq!(list.to_json(), Value::Null);

        list.push(RecordedError::new("first"));
        list.push(RecordedError::new("second")).set_kind(ErrorKind::PUBLIC);
        list.push(RecordedError::new(Error::Bind("third".into())));

        assert_eq!(list.len(), 3);
        assert_eq!(list.by_kind(ErrorKind::PUBLIC).len(), 1);
        assert_eq!(list.by_kind(ErrorKind::PRIVATE).len(), 1);
        assert_eq!(list.by_kind(ErrorKind::ANY).len(), 3);
        assert_eq!(list.last().map(|e| e.kind()), Some(ErrorKind::BIND));
        assert_eq!(
            list.messages(),
            vec!["first", "second", "bind error: third"]
        );
        assert_eq!(list.to_json().as_array().map(Vec::len), Some(3));
    }

    #[test]
    fn test_error_list_display() {
        let mut list = ErrorList::default();
        list.push(RecordedError::new("first"));
        list.push(RecordedError::new("second"))
            .set_meta(json!({"id": 7}));

        let text = list.to_string();
        assert_eq!(
            text,
            "Error #01: first\nError #02: second\n     Meta: {\"id\":7}\n"
        );
    }
}
