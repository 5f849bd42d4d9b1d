//! Request representation and the strict HTTP/1.1 head parser.
//!
//! The parser is a pure function over the connection's read buffer. It never
//! allocates: every string field of the produced [`Request`] is a sub-slice
//! of the input buffer, and the fixed-capacity query/header arrays live
//! inline in the struct. The request therefore cannot outlive the buffer it
//! was parsed from, which the borrow on `Request<'b>` enforces.
//!
//! There is no leniency: CRLF line endings only, no folded headers, no
//! percent-decoding, no trailing junk on the request line.

use crate::{
    errors::ParseError,
    http::types::Method,
    limits::{
        MAX_HEADERS, MAX_HEADER_NAME_SIZE, MAX_HEADER_VALUE_SIZE, MAX_QUERY_PAIRS, MAX_TARGET_SIZE,
    },
};
use memchr::memchr;

const EMPTY: &[u8] = b"";

/// A parsed request head.
///
/// Query pairs and header fields sit in parallel fixed-capacity arrays;
/// `q_offset`/`h_offset` count the occupied entries. Entries past the
/// offsets are untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request<'b> {
    pub(crate) method: Method,
    pub(crate) url: &'b [u8],
    pub(crate) q_name: [&'b [u8]; MAX_QUERY_PAIRS],
    pub(crate) q_value: [&'b [u8]; MAX_QUERY_PAIRS],
    pub(crate) h_name: [&'b [u8]; MAX_HEADERS],
    pub(crate) h_value: [&'b [u8]; MAX_HEADERS],
    pub(crate) q_offset: usize,
    pub(crate) h_offset: usize,
}

impl<'b> Request<'b> {
    #[inline(always)]
    fn empty() -> Self {
        Request {
            method: Method::Get,
            url: EMPTY,
            q_name: [EMPTY; MAX_QUERY_PAIRS],
            q_value: [EMPTY; MAX_QUERY_PAIRS],
            h_name: [EMPTY; MAX_HEADERS],
            h_value: [EMPTY; MAX_HEADERS],
            q_offset: 0,
            h_offset: 0,
        }
    }
}

// Public API
impl<'b> Request<'b> {
    #[inline(always)]
    pub const fn method(&self) -> Method {
        self.method
    }

    /// The request path, without the query string. Matched verbatim against
    /// the route table; no decoding is applied.
    #[inline(always)]
    pub const fn url(&self) -> &'b [u8] {
        self.url
    }

    /// Number of occupied query-pair entries.
    #[inline(always)]
    pub const fn q_offset(&self) -> usize {
        self.q_offset
    }

    /// Number of occupied header entries.
    #[inline(always)]
    pub const fn h_offset(&self) -> usize {
        self.h_offset
    }

    /// Query pair at `index`, in request order. Duplicate names are retained.
    #[inline(always)]
    pub fn query_pair(&self, index: usize) -> Option<(&'b [u8], &'b [u8])> {
        (index < self.q_offset).then(|| (self.q_name[index], self.q_value[index]))
    }

    /// First value for the query parameter `key` (case-sensitive).
    #[inline(always)]
    pub fn query(&self, key: &[u8]) -> Option<&'b [u8]> {
        (0..self.q_offset)
            .find(|&i| self.q_name[i] == key)
            .map(|i| self.q_value[i])
    }

    /// Header field at `index`, in request order.
    #[inline(always)]
    pub fn header_pair(&self, index: usize) -> Option<(&'b [u8], &'b [u8])> {
        (index < self.h_offset).then(|| (self.h_name[index], self.h_value[index]))
    }

    /// First value for the header `name`, compared case-insensitively.
    /// Linear search.
    #[inline(always)]
    pub fn header(&self, name: &[u8]) -> Option<&'b [u8]> {
        (0..self.h_offset)
            .find(|&i| self.h_name[i].eq_ignore_ascii_case(name))
            .map(|i| self.h_value[i])
    }
}

/// Parses a request head out of `buf`.
///
/// `buf` must hold the complete head, terminated by an empty `CRLF` line.
/// Deterministic and allocation-free; re-enterable on a fresh buffer.
pub fn parse(buf: &[u8]) -> Result<Request<'_>, ParseError> {
    let mut request = Request::empty();

    // Method token: bytes up to the first SP.
    let sp = memchr(b' ', buf).ok_or(ParseError::MalformedRequest)?;
    request.method = Method::from_token(&buf[..sp])?;
    let mut pos = sp + 1;

    // Target token: bytes up to the next SP, taken verbatim.
    let rest = &buf[pos..];
    let sp = memchr(b' ', rest).ok_or(ParseError::MalformedRequest)?;
    if sp > MAX_TARGET_SIZE {
        return Err(ParseError::UriTooLong);
    }
    let target = &rest[..sp];
    pos += sp + 1;

    // The first `?` separates the path from the query string.
    match memchr(b'?', target) {
        None => request.url = target,
        Some(q) => {
            request.url = &target[..q];
            parse_query(&target[q + 1..], &mut request)?;
        }
    }

    // Version: up to the next LF, the byte before it must be CR, and the
    // enclosed token must be exactly `HTTP/1.1`.
    let tail = &buf[pos..];
    let lf = memchr(b'\n', tail).ok_or(ParseError::MalformedRequest)?;
    if lf == 0 || tail[lf - 1] != b'\r' {
        return Err(ParseError::MalformedRequest);
    }
    if &tail[..lf - 1] != b"HTTP/1.1" {
        return Err(ParseError::Unsupported);
    }
    pos += lf + 1;

    // Header block: CRLF-terminated lines until an empty line.
    loop {
        let tail = &buf[pos..];
        let lf = memchr(b'\n', tail).ok_or(ParseError::MalformedRequest)?;
        if lf == 0 || tail[lf - 1] != b'\r' {
            return Err(ParseError::MalformedRequest);
        }
        let line = &tail[..lf - 1];
        pos += lf + 1;

        if line.is_empty() {
            return Ok(request);
        }
        if request.h_offset == MAX_HEADERS {
            return Err(ParseError::LimitExceeded);
        }

        let colon = memchr(b':', line).ok_or(ParseError::MalformedRequest)?;
        let name = line[..colon].trim_ascii();
        let value = line[colon + 1..].trim_ascii();
        if name.len() > MAX_HEADER_NAME_SIZE || value.len() > MAX_HEADER_VALUE_SIZE {
            return Err(ParseError::HeaderTooLong);
        }

        request.h_name[request.h_offset] = name;
        request.h_value[request.h_offset] = value;
        request.h_offset += 1;
    }
}

/// Splits the query string on `&`, then each pair on its first `=`.
fn parse_query<'b>(query: &'b [u8], request: &mut Request<'b>) -> Result<(), ParseError> {
    if query.is_empty() {
        return Ok(());
    }

    let mut rest = query;
    loop {
        let (pair, next) = match memchr(b'&', rest) {
            Some(amp) => (&rest[..amp], Some(&rest[amp + 1..])),
            None => (rest, None),
        };

        if request.q_offset == MAX_QUERY_PAIRS {
            return Err(ParseError::LimitExceeded);
        }
        let eq = memchr(b'=', pair).ok_or(ParseError::MalformedRequest)?;
        request.q_name[request.q_offset] = &pair[..eq];
        request.q_value[request.q_offset] = &pair[eq + 1..];
        request.q_offset += 1;

        match next {
            Some(following) => rest = following,
            None => return Ok(()),
        }
    }
}
