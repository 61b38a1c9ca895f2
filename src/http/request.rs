//! Request staging into a caller-owned buffer
//!
//! A request is composed in two phases: the head (request line plus
//! headers, each line CRLF-terminated) stays open to additions until the
//! first body byte is appended, which freezes it behind a fixed-width
//! `Content-Length` placeholder. The engine patches the placeholder with
//! the true body length just before transmitting, so the staged bytes can
//! be built incrementally without knowing the final length up front.

use super::HeaderMap;
use crate::error::Error;
use base64ct::{Base64, Encoding};
use core::fmt::Write;
use heapless::{String, Vec};

/// Maximum combined length of basic-auth credentials before encoding.
const CREDENTIALS_MAX: usize = 80;
/// Room for the base64 form of [`CREDENTIALS_MAX`] credential bytes.
const ENCODED_MAX: usize = 120;

/// Placeholder closing the head; the 5-character numeric field is patched
/// in place with the true body length before transmission.
const CONTENT_LENGTH_PLACEHOLDER: &[u8] = b"Content-Length:     0\r\n\r\n";
/// Offset back from the end of the closed head to the numeric field.
const CONTENT_LENGTH_FIELD_BACKSET: usize = 9;
/// Width of the numeric field; bodies above 99999 bytes cannot be staged.
const CONTENT_LENGTH_FIELD_WIDTH: usize = 5;

/// HTTP methods the modem firmware can invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// HTTP GET.
    Get,
    /// HTTP POST.
    Post,
}

impl Method {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }

    pub(crate) fn trailer_prefix(&self) -> &'static str {
        match self {
            Method::Get => "+QHTTPGET: ",
            Method::Post => "+QHTTPPOST: ",
        }
    }
}

/// A request staged into a caller-owned buffer.
///
/// The buffer outlives the request value; its staged bytes are transmitted
/// by the engine as the data-mode payload of a custom GET or POST.
#[derive(Debug)]
pub struct Request<'a> {
    buf: &'a mut [u8],
    len: usize,
    headers_len: usize,
    content_len: usize,
    has_placeholder: bool,
}

impl<'a> Request<'a> {
    /// Start a request: writes the request line and the `Host` header.
    ///
    /// A leading `http://` / `https://` scheme token on `host` is
    /// stripped. Returns [`Error::Overflow`] when `buf` cannot hold the
    /// opening lines.
    pub fn new(
        method: Method,
        host: &str,
        relative_url: &str,
        buf: &'a mut [u8],
    ) -> Result<Request<'a>, Error> {
        let host = strip_scheme(host);
        let mut request = Request {
            buf,
            len: 0,
            headers_len: 0,
            content_len: 0,
            has_placeholder: false,
        };
        request.put(method.as_str().as_bytes())?;
        request.put(b" ")?;
        request.put(relative_url.as_bytes())?;
        request.put(b" HTTP/1.1\r\nHost: ")?;
        request.put(host.as_bytes())?;
        request.put(b"\r\n")?;
        Ok(request)
    }

    /// Append the selected subset of the common headers.
    ///
    /// No deduplication is performed; calling twice appends the set twice.
    pub fn add_common_headers(&mut self, map: HeaderMap) -> Result<(), Error> {
        self.require_open_headers()?;
        if map.contains(HeaderMap::ACCEPT) {
            self.put(b"Accept: */*\r\n")?;
        }
        if map.contains(HeaderMap::USER_AGENT) {
            self.put(b"User-Agent: QUECTEL_MODULE\r\n")?;
        }
        if map.contains(HeaderMap::CONNECTION) {
            self.put(b"Connection: Keep-Alive\r\n")?;
        }
        if map.contains(HeaderMap::CONTENT_TYPE) {
            self.put(b"Content-Type: application/octet-stream\r\n")?;
        }
        Ok(())
    }

    /// Append a basic-authorization header from plain credentials.
    pub fn add_basic_auth(&mut self, user: &str, password: &str) -> Result<(), Error> {
        self.require_open_headers()?;

        let mut credentials: Vec<u8, CREDENTIALS_MAX> = Vec::new();
        credentials
            .extend_from_slice(user.as_bytes())
            .map_err(|_| Error::Overflow)?;
        credentials.push(b':').map_err(|_| Error::Overflow)?;
        credentials
            .extend_from_slice(password.as_bytes())
            .map_err(|_| Error::Overflow)?;

        let mut encoded = [0u8; ENCODED_MAX];
        let b64 = Base64::encode(&credentials, &mut encoded).map_err(|_| Error::Overflow)?;

        if self.len + "Authentication: ".len() + b64.len() + 2 > self.buf.len() {
            return Err(Error::Overflow);
        }
        self.put(b"Authentication: ")?;
        self.put(b64.as_bytes())?;
        self.put(b"\r\n")
    }

    /// Append one `key: val` header line.
    pub fn add_header(&mut self, key: &str, val: &str) -> Result<(), Error> {
        self.require_open_headers()?;

        let line_len = key.len() + 2 + val.len() + 2;
        if self.len + line_len > self.buf.len() {
            return Err(Error::Overflow);
        }
        self.put(key.as_bytes())?;
        self.put(b": ")?;
        self.put(val.as_bytes())?;
        self.put(b"\r\n")
    }

    /// Append body bytes, closing the head on the first call.
    ///
    /// The first call writes the `Content-Length` placeholder and the
    /// blank line, freezing the head against further header additions.
    /// May be called repeatedly to stage a body in pieces.
    pub fn add_post_data(&mut self, data: &[u8]) -> Result<(), Error> {
        if self.headers_len == 0 {
            self.require_crlf_tail()?;
            self.put(CONTENT_LENGTH_PLACEHOLDER)?;
            self.headers_len = self.len;
            self.has_placeholder = true;
        }
        if !self.has_placeholder {
            // head was closed for a header-only transmit; no body fits
            return Err(Error::PreconditionFailed);
        }

        let start = self.headers_len + self.content_len;
        let end = start + data.len();
        if end > self.buf.len() {
            return Err(Error::Overflow);
        }
        self.buf[start..end].copy_from_slice(data);
        self.content_len += data.len();
        self.len = end;
        Ok(())
    }

    /// Close the head for a header-only transmit (custom GET), appending
    /// the blank line. Idempotent once the head is frozen.
    pub(crate) fn close_head(&mut self) -> Result<(), Error> {
        if self.headers_len == 0 {
            self.require_crlf_tail()?;
            self.put(b"\r\n")?;
            self.headers_len = self.len;
        }
        Ok(())
    }

    /// Overwrite the placeholder's numeric field with the staged body
    /// length. The field is exactly five characters wide; longer bodies
    /// cannot be represented and fail with [`Error::Overflow`].
    pub(crate) fn patch_content_length(&mut self) -> Result<(), Error> {
        if self.headers_len == 0 || !self.has_placeholder {
            return Err(Error::PreconditionFailed);
        }
        if self.content_len > 99_999 {
            return Err(Error::Overflow);
        }

        let mut field: String<CONTENT_LENGTH_FIELD_WIDTH> = String::new();
        write!(field, "{:5}", self.content_len).map_err(|_| Error::Overflow)?;
        let at = self.headers_len - CONTENT_LENGTH_FIELD_BACKSET;
        self.buf[at..at + CONTENT_LENGTH_FIELD_WIDTH].copy_from_slice(field.as_bytes());
        Ok(())
    }

    /// The staged bytes so far (head plus any body).
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// Length of the frozen head; zero while headers are still open.
    pub fn headers_len(&self) -> usize {
        self.headers_len
    }

    /// Body bytes staged so far.
    pub fn content_len(&self) -> usize {
        self.content_len
    }

    fn put(&mut self, bytes: &[u8]) -> Result<(), Error> {
        let end = self.len + bytes.len();
        if end > self.buf.len() {
            return Err(Error::Overflow);
        }
        self.buf[self.len..end].copy_from_slice(bytes);
        self.len = end;
        Ok(())
    }

    fn require_open_headers(&self) -> Result<(), Error> {
        if self.headers_len != 0 || self.content_len != 0 {
            return Err(Error::PreconditionFailed);
        }
        self.require_crlf_tail()
    }

    fn require_crlf_tail(&self) -> Result<(), Error> {
        if self.len < 2 || &self.buf[self.len - 2..self.len] != b"\r\n" {
            return Err(Error::PreconditionFailed);
        }
        Ok(())
    }
}

fn strip_scheme(host: &str) -> &str {
    if host.len() >= 4 && host.as_bytes()[..4].eq_ignore_ascii_case(b"http") {
        if let Some(at) = host.find("://") {
            return &host[at + 3..];
        }
    }
    host
}
