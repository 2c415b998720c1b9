//! Lexical URL path normalization.
//!
//! [`clean_path`] is the URL flavour of a path `Clean`: it never touches the
//! filesystem and only allocates once the output has to differ from the input.

use std::borrow::Cow;

/// Returns the canonical form of the URL path `p`.
///
/// The following rules are applied until nothing changes:
///
/// 1. Multiple slashes collapse into one.
/// 2. `.` segments are removed.
/// 3. `..` segments remove themselves together with the preceding segment.
/// 4. `..` segments at the root are dropped (`/..` becomes `/`).
///
/// A trailing slash survives when the input had one and the result is not the
/// root. The empty string yields `/`.
///
/// The result borrows from `p` whenever `p` is already clean.
pub fn clean_path(p: &str) -> Cow<'_, str> {
    if p.is_empty() {
        return Cow::Borrowed("/");
    }

    let s = p.as_bytes();
    let n = s.len();

    // r: index of the next byte to read; w: index of the next byte to write.
    let mut r = 1;
    let mut buf = LazyBuf::new(s);

    if s[0] != b'/' {
        r = 0;
        buf.force_leading_slash();
    }

    let mut trailing = n > 1 && s[n - 1] == b'/';

    while r < n {
        match s[r] {
            b'/' => {
                // empty segment, trailing slash is re-added at the end
                r += 1;
            }
            b'.' if r + 1 == n => {
                trailing = true;
                r += 1;
            }
            b'.' if s[r + 1] == b'/' => {
                r += 1;
            }
            b'.' if s[r + 1] == b'.' && (r + 2 == n || s[r + 2] == b'/') => {
                r += 2;
                buf.backtrack();
            }
            _ => {
                if buf.w > 1 {
                    buf.append(b'/');
                }
                while r < n && s[r] != b'/' {
                    buf.append(s[r]);
                    r += 1;
                }
            }
        }
    }

    if trailing && buf.w > 1 {
        buf.append(b'/');
    }

    buf.finish(p)
}

/// Joins `relative` onto `absolute` and cleans the result.
///
/// A trailing slash on `relative` is preserved. An empty `relative` returns
/// `absolute` untouched.
pub fn join_paths(absolute: &str, relative: &str) -> String {
    if relative.is_empty() {
        return absolute.to_string();
    }

    let mut joined = String::with_capacity(absolute.len() + relative.len() + 1);
    joined.push_str(absolute);
    joined.push('/');
    joined.push_str(relative);

    let mut final_path = clean_path(&joined).into_owned();
    if final_path.len() > 1 && final_path.ends_with('/') {
        final_path.pop();
    }

    if relative.ends_with('/') && !final_path.ends_with('/') {
        final_path.push('/');
    }
    final_path
}

/// Output buffer that stays a view over the input until the first byte differs.
struct LazyBuf<'a> {
    s: &'a [u8],
    buf: Option<Vec<u8>>,
    w: usize,
}

impl<'a> LazyBuf<'a> {
    #[inline]
    fn new(s: &'a [u8]) -> Self {
        Self { s, buf: None, w: 1 }
    }

    #[inline]
    fn force_leading_slash(&mut self) {
        let mut buf = Vec::with_capacity(self.s.len() + 1);
        buf.push(b'/');
        self.buf = Some(buf);
        self.w = 1;
    }

    #[inline]
    fn byte_at(&self, i: usize) -> u8 {
        match &self.buf {
            Some(buf) => buf[i],
            None => self.s[i],
        }
    }

    #[inline]
    fn append(&mut self, c: u8) {
        let w = self.w;
        match &mut self.buf {
            Some(buf) => {
                buf.truncate(w);
                buf.push(c);
            }
            None => {
                if w < self.s.len() && self.s[w] == c {
                    self.w += 1;
                    return;
                }
                let mut buf = Vec::with_capacity(self.s.len() + 1);
                buf.extend_from_slice(&self.s[..w]);
                buf.push(c);
                self.buf = Some(buf);
            }
        }
        self.w += 1;
    }

    /// Drops the last written segment, never going above the root.
    #[inline]
    fn backtrack(&mut self) {
        if self.w > 1 {
            self.w -= 1;
            while self.w > 1 && self.byte_at(self.w) != b'/' {
                self.w -= 1;
            }
        }
    }

    fn finish(self, p: &'a str) -> Cow<'a, str> {
        match self.buf {
            None => Cow::Borrowed(&p[..self.w]),
            Some(mut buf) => {
                buf.truncate(self.w);
                // Only whole segments are copied, so the bytes stay valid UTF-8.
                match String::from_utf8(buf) {
                    Ok(s) => Cow::Owned(s),
                    Err(e) => Cow::Owned(String::from_utf8_lossy(e.as_bytes()).into_owned()),
                }
            }
        }
    }
}
