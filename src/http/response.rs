//! Response model and head serialization.
//!
//! The response head is formatted straight into the connection's fixed
//! buffer (the same buffer the request head was parsed from). Bodies are
//! never copied: they are written to the socket directly from their source
//! slice.

use crate::{
    http::types::Status,
    limits::{MAX_HEADERS, SEND_CHUNK_SIZE},
};
use thiserror::Error;

// BODY

/// Where a response body lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    /// No body at all.
    Empty,
    /// Borrowed bytes with static lifetime; nothing to free.
    Static(&'static [u8]),
    /// Owned bytes, released by the connection once fully sent.
    Dynamic(Vec<u8>),
}

impl Body {
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.bytes().len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline(always)]
    pub(crate) fn bytes(&self) -> &[u8] {
        match self {
            Body::Empty => b"",
            Body::Static(bytes) => bytes,
            Body::Dynamic(bytes) => bytes,
        }
    }
}

// RESPONSE

/// A handler's answer: a status, a body source, and the send progress the
/// connection tracks while streaming the body out in bounded chunks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    status: Status,
    body: Body,
    sent: usize,
}

impl Response {
    #[inline(always)]
    pub fn new(status: Status, body: Body) -> Self {
        Self {
            status,
            body,
            sent: 0,
        }
    }

    /// A response with no body.
    #[inline(always)]
    pub fn empty(status: Status) -> Self {
        Self::new(status, Body::Empty)
    }

    #[inline(always)]
    pub const fn status(&self) -> Status {
        self.status
    }

    #[inline(always)]
    pub fn body_len(&self) -> usize {
        self.body.len()
    }

    #[inline(always)]
    pub(crate) fn body_bytes(&self) -> &[u8] {
        self.body.bytes()
    }

    /// The next unsent slice of at most [`SEND_CHUNK_SIZE`] bytes, as a
    /// `(start, end)` range into the body, or `None` once fully sent.
    #[inline]
    pub(crate) fn next_chunk_range(&self) -> Option<(usize, usize)> {
        let len = self.body.len();
        (self.sent < len).then(|| (self.sent, len.min(self.sent + SEND_CHUNK_SIZE)))
    }

    #[inline(always)]
    pub(crate) fn advance(&mut self, sent: usize) {
        self.sent = (self.sent + sent).min(self.body.len());
    }
}

// HEADERS

/// A response header value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderValue {
    Number(usize),
    Static(&'static [u8]),
    Dynamic(Vec<u8>),
}

/// Response-side header set, capped at [`MAX_HEADERS`] entries.
///
/// Owned (`Dynamic`) values are released on [`clear`](Headers::clear) or
/// drop. `Content-Length` is appended by the server during head formatting
/// and must not be set here.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(&'static str, HeaderValue)>,
}

impl Headers {
    #[inline(always)]
    pub fn new() -> Self {
        Self {
            entries: Vec::with_capacity(MAX_HEADERS),
        }
    }

    /// Appends an entry. Returns `false` (and drops the value) when the set
    /// is already full.
    #[inline]
    pub fn push(&mut self, name: &'static str, value: HeaderValue) -> bool {
        if self.entries.len() == MAX_HEADERS {
            return false;
        }
        self.entries.push((name, value));
        true
    }

    #[inline(always)]
    pub fn set_static(&mut self, name: &'static str, value: &'static [u8]) -> bool {
        self.push(name, HeaderValue::Static(value))
    }

    #[inline(always)]
    pub fn set_number(&mut self, name: &'static str, value: usize) -> bool {
        self.push(name, HeaderValue::Number(value))
    }

    #[inline(always)]
    pub fn set_dynamic(&mut self, name: &'static str, value: Vec<u8>) -> bool {
        self.push(name, HeaderValue::Dynamic(value))
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Releases every entry, including owned `Dynamic` values.
    #[inline(always)]
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[inline(always)]
    pub(crate) fn iter(&self) -> std::slice::Iter<'_, (&'static str, HeaderValue)> {
        self.entries.iter()
    }
}

// HEAD FORMATTING

/// The formatted response head does not fit the connection buffer. This is
/// a fatal condition: the buffer bounds every head the server may emit.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("formatted response head exceeds the connection buffer")]
pub struct HeadOverflow;

struct HeadWriter<'a> {
    buf: &'a mut [u8],
    len: usize,
}

impl HeadWriter<'_> {
    #[inline]
    fn put(&mut self, bytes: &[u8]) -> Result<(), HeadOverflow> {
        let end = self.len + bytes.len();
        if end > self.buf.len() {
            return Err(HeadOverflow);
        }
        self.buf[self.len..end].copy_from_slice(bytes);
        self.len = end;
        Ok(())
    }

    #[inline]
    fn put_number(&mut self, n: usize) -> Result<(), HeadOverflow> {
        let (digits, start) = usize_to_bytes(n);
        self.put(&digits[start..])
    }
}

#[inline]
const fn usize_to_bytes(mut n: usize) -> ([u8; 20], usize) {
    let mut digits = [b'0'; 20];
    if n == 0 {
        return (digits, 19);
    }

    let mut i = 20;
    while n > 0 {
        i -= 1;
        digits[i] = b'0' + (n % 10) as u8;
        n /= 10;
    }
    (digits, i)
}

/// Serializes a response head into `buf` and returns its length.
///
/// With `payload`, the head is the status line, the handler's headers, a
/// server-computed `Content-Length`, and the terminating empty line. Without
/// it (every error path) the head is the bare status line.
pub(crate) fn format_head(
    buf: &mut [u8],
    status: Status,
    payload: Option<(&Headers, usize)>,
) -> Result<usize, HeadOverflow> {
    let mut writer = HeadWriter { buf, len: 0 };
    writer.put(status.to_first_line())?;

    if let Some((headers, body_len)) = payload {
        for (name, value) in headers.iter() {
            writer.put(name.as_bytes())?;
            writer.put(b": ")?;
            match value {
                HeaderValue::Number(n) => writer.put_number(*n)?,
                HeaderValue::Static(bytes) => writer.put(bytes)?,
                HeaderValue::Dynamic(bytes) => writer.put(bytes)?,
            }
            writer.put(b"\r\n")?;
        }
        writer.put(b"Content-Length: ")?;
        writer.put_number(body_len)?;
        writer.put(b"\r\n\r\n")?;
    }

    Ok(writer.len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{limits::CONN_BUFFER_SIZE, tools::*};

    fn head(status: Status, payload: Option<(&Headers, usize)>) -> String {
        let mut buf = vec![0u8; CONN_BUFFER_SIZE];
        let len = format_head(&mut buf, status, payload).unwrap();
        str_op(&buf[..len]).to_owned()
    }

    #[test]
    fn status_only_head() {
        assert_eq!(head(Status::NotFound, None), "HTTP/1.1 404 Not Found\r\n");
        assert_eq!(
            head(Status::ServiceUnavailable, None),
            "HTTP/1.1 503 Service Unavailable\r\n"
        );
    }

    #[test]
    fn full_head() {
        let mut headers = Headers::new();
        headers.set_static("Content-Type", b"text/html; charset=utf-8");

        assert_eq!(
            head(Status::Ok, Some((&headers, 2))),
            "HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: 2\r\n\r\n"
        );
    }

    #[test]
    fn value_variants() {
        let mut headers = Headers::new();
        headers.set_static("X-Static", b"fixed");
        headers.set_number("X-Number", 12345);
        headers.set_dynamic("X-Dynamic", b"owned".to_vec());

        assert_eq!(
            head(Status::Ok, Some((&headers, 0))),
            "HTTP/1.1 200 OK\r\nX-Static: fixed\r\nX-Number: 12345\r\nX-Dynamic: owned\r\nContent-Length: 0\r\n\r\n"
        );
    }

    #[test]
    fn header_cap() {
        let mut headers = Headers::new();
        for _ in 0..MAX_HEADERS {
            assert!(headers.set_number("X-N", 1));
        }
        assert!(!headers.set_number("X-N", 1));
        assert_eq!(headers.len(), MAX_HEADERS);

        headers.clear();
        assert!(headers.is_empty());
    }

    #[test]
    fn head_overflow() {
        let mut headers = Headers::new();
        headers.set_dynamic("X-Big", vec![b'v'; CONN_BUFFER_SIZE]);

        let mut buf = vec![0u8; CONN_BUFFER_SIZE];
        assert_eq!(
            format_head(&mut buf, Status::Ok, Some((&headers, 0))),
            Err(HeadOverflow)
        );
    }

    #[test]
    fn number_formatting() {
        let max = usize::MAX.to_string();

        #[rustfmt::skip]
        let cases = [
            (0, "0"),
            (7, "7"),
            (42, "42"),
            (1024, "1024"),
            (usize::MAX, max.as_str()),
        ];

        for (n, expected) in cases {
            let (digits, start) = usize_to_bytes(n);
            assert_eq!(str_op(&digits[start..]), expected);
        }
    }

    #[test]
    fn body_chunking() {
        let mut response = Response::new(
            Status::Ok,
            Body::Dynamic(vec![b'x'; SEND_CHUNK_SIZE + 100]),
        );

        let (start, end) = response.next_chunk_range().unwrap();
        assert_eq!((start, end), (0, SEND_CHUNK_SIZE));
        response.advance(end - start);

        let (start, end) = response.next_chunk_range().unwrap();
        assert_eq!((start, end), (SEND_CHUNK_SIZE, SEND_CHUNK_SIZE + 100));
        response.advance(end - start);

        assert_eq!(response.next_chunk_range(), None);
    }

    #[test]
    fn sent_never_exceeds_length() {
        let mut response = Response::new(Status::Ok, Body::Static(b"hi"));
        response.advance(10);
        assert_eq!(response.next_chunk_range(), None);
        assert_eq!(response.body_len(), 2);
    }

    #[test]
    fn empty_body() {
        let response = Response::empty(Status::Found);
        assert_eq!(response.body_len(), 0);
        assert_eq!(response.next_chunk_range(), None);
        assert!(Body::Empty.is_empty());
    }
}
