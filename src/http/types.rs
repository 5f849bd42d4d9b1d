//! Core HTTP protocol types.

use crate::errors::ParseError;

// METHOD

/// Request and route method kinds.
///
/// The wire parser only ever produces [`Get`](Method::Get) or
/// [`Post`](Method::Post); [`Tunnel`](Method::Tunnel) exists for socket-lane
/// routes and never matches a plain HTTP request.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    /// Upgrade-style routes. Not served by this core; matching requests
    /// receive `503`.
    Tunnel,
}

impl Method {
    /// Maps a request-line method token.
    ///
    /// Tokens of real HTTP methods this server does not serve are
    /// distinguished from arbitrary garbage.
    #[inline]
    pub(crate) fn from_token(token: &[u8]) -> Result<Self, ParseError> {
        match token {
            b"GET" => Ok(Method::Get),
            b"POST" => Ok(Method::Post),
            b"HEAD" | b"DELETE" | b"CONNECT" | b"OPTIONS" | b"TRACE" | b"PUT" => {
                Err(ParseError::Unsupported)
            }
            _ => Err(ParseError::InvalidMethodName),
        }
    }
}

// STATUS

macro_rules! set_statuses {
    ($(
        $(#[$docs:meta])*
        $name:ident = ($num:expr, $str:expr);
    )+) => {
        /// The closed set of response statuses this server emits.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Status { $(
            #[doc = concat!(stringify!($num), " ", $str)]
            $(#[$docs])*
            $name = $num,
        )+ }

        impl Status {
            /// Returns the serialized status line, e.g. `b"HTTP/1.1 200 OK\r\n"`.
            #[inline]
            pub const fn to_first_line(self) -> &'static [u8] {
                match self { $(
                    Status::$name => concat!("HTTP/1.1 ", $num, " ", $str, "\r\n").as_bytes(),
                )+ }
            }

            /// Numeric status code.
            #[inline]
            pub const fn code(self) -> u16 {
                self as u16
            }

            /// Reason phrase.
            #[inline]
            pub const fn reason(self) -> &'static str {
                match self { $(
                    Status::$name => $str,
                )+ }
            }
        }
    }
}

set_statuses! {
    Continue = (100, "Continue");
    Ok = (200, "OK");
    Found = (302, "Found");
    BadRequest = (400, "Bad Request");
    NotFound = (404, "Not Found");
    MethodNotAllowed = (405, "Method Not Allowed");
    PayloadTooLarge = (413, "Payload Too Large");
    InternalServerError = (500, "Internal Server Error");
    NotImplemented = (501, "Not Implemented");
    ServiceUnavailable = (503, "Service Unavailable");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::*;

    #[test]
    fn method_tokens() {
        #[rustfmt::skip]
        let cases = [
            ("GET",     Ok(Method::Get)),
            ("POST",    Ok(Method::Post)),

            ("HEAD",    Err(ParseError::Unsupported)),
            ("DELETE",  Err(ParseError::Unsupported)),
            ("CONNECT", Err(ParseError::Unsupported)),
            ("OPTIONS", Err(ParseError::Unsupported)),
            ("TRACE",   Err(ParseError::Unsupported)),
            ("PUT",     Err(ParseError::Unsupported)),

            ("get",     Err(ParseError::InvalidMethodName)),
            ("GETT",    Err(ParseError::InvalidMethodName)),
            ("PATCH",   Err(ParseError::InvalidMethodName)),
            ("",        Err(ParseError::InvalidMethodName)),
        ];

        for (token, expected) in cases {
            assert_eq!(Method::from_token(token.as_bytes()), expected, "{token:?}");
        }
    }

    #[test]
    fn first_lines() {
        let cases = [
            (Status::Ok, "HTTP/1.1 200 OK\r\n"),
            (Status::NotFound, "HTTP/1.1 404 Not Found\r\n"),
            (Status::MethodNotAllowed, "HTTP/1.1 405 Method Not Allowed\r\n"),
            (Status::PayloadTooLarge, "HTTP/1.1 413 Payload Too Large\r\n"),
            (Status::ServiceUnavailable, "HTTP/1.1 503 Service Unavailable\r\n"),
        ];

        for (status, line) in cases {
            assert_eq!(str_op(status.to_first_line()), line);
        }
    }

    #[test]
    fn codes_and_reasons() {
        assert_eq!(Status::Ok.code(), 200);
        assert_eq!(Status::InternalServerError.code(), 500);
        assert_eq!(Status::NotImplemented.reason(), "Not Implemented");
        assert_eq!(Status::Continue.code(), 100);
        assert_eq!(Status::Found.code(), 302);
    }
}
