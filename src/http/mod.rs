//! HTTP(S) client services over the shared AT-command channel
//!
//! The modem firmware implements the HTTP protocol itself; this module
//! drives it. A request runs as a locked command sequence (configure, set
//! URL, invoke the method), completes asynchronously through a result
//! trailer carrying the HTTP status and page size, and the page body is
//! then streamed out of the shared ring buffer in bounded blocks by a
//! cooperative pump.
//!
//! The firmware holds exactly one URL and one in-flight request at a time;
//! there is no redirect following, chunked transfer decoding or cookie
//! handling at this layer.

use crate::at::DataContext;
use crate::error::Error;
use heapless::String;

mod client;
mod pump;
mod request;
mod response;


pub use client::Client;
pub use request::{Method, Request};

/// Default per-request timeout, matching the modem firmware default.
pub const DEFAULT_TIMEOUT_SECS: u16 = 60;

/// Inclusive range of HTTP statuses treated as a completed transfer.
pub const SUCCESS_RANGE: core::ops::RangeInclusive<u16> = 200..=299;

pub(crate) const HOST_MAX: usize = 128;
pub(crate) const URL_MAX: usize = 240;
pub(crate) const CMD_MAX: usize = 128;
pub(crate) const TRAILER_MAX: usize = 48;
pub(crate) const FILENAME_MAX: usize = 80;

/// Seconds the modem allows for the raw URL bytes to be input.
pub(crate) const URL_INPUT_TIME_SECS: u16 = 5;
/// Seconds the modem allows for the request/body bytes of a POST.
pub(crate) const POST_INPUT_TIME_SECS: u16 = 5;
/// Seconds the modem allows to open the staged file for a file POST.
pub(crate) const POSTFILE_INPUT_TIME_SECS: u16 = 15;
/// Inter-packet timeout for a page read diverted to the modem filesystem.
pub(crate) const READFILE_INTERPACKET_SECS: u16 = 20;
/// Overall trailer timeout for a page read diverted to the modem filesystem.
pub(crate) const READFILE_TIMEOUT_SECS: u16 = 180;

pub(crate) const DATA_PROMPT: &str = "CONNECT";
pub(crate) const PAGE_END_MARKER: &[u8] = b"\r\nOK\r\n\r\n";
pub(crate) const READ_TRAILER_PREFIX: &[u8] = b"+QHTTPREAD: ";

/// Where a control sits between requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    /// No completed request; page reads are rejected.
    Idle,
    /// A request completed with a success-range HTTP status and its page
    /// is ready to be read.
    RequestComplete,
}

#[cfg(feature = "defmt")]
impl defmt::Format for RequestState {
    fn format(&self, f: defmt::Formatter) {
        match self {
            RequestState::Idle => defmt::write!(f, "Idle"),
            RequestState::RequestComplete => defmt::write!(f, "RequestComplete"),
        }
    }
}

/// Bitmap selecting which common headers to append to a staged request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderMap(u8);

impl HeaderMap {
    /// `Accept: */*`
    pub const ACCEPT: HeaderMap = HeaderMap(0x01);
    /// `User-Agent: QUECTEL_MODULE`
    pub const USER_AGENT: HeaderMap = HeaderMap(0x02);
    /// `Connection: Keep-Alive`
    pub const CONNECTION: HeaderMap = HeaderMap(0x04);
    /// `Content-Type: application/octet-stream`
    pub const CONTENT_TYPE: HeaderMap = HeaderMap(0x08);
    /// Every common header.
    pub const ALL: HeaderMap = HeaderMap(0x0F);

    /// Whether any header selected by `other` is selected by `self`.
    pub fn contains(self, other: HeaderMap) -> bool {
        self.0 & other.0 != 0
    }
}

impl core::ops::BitOr for HeaderMap {
    type Output = HeaderMap;

    fn bitor(self, rhs: HeaderMap) -> HeaderMap {
        HeaderMap(self.0 | rhs.0)
    }
}

/// Receives streamed page bytes from a read in progress.
///
/// Invoked synchronously by the receive pump, once per forwarded block;
/// the slice is only valid for the duration of the call. `is_final` is
/// raised on the block that ends exactly at the page's terminal marker
/// (a zero-length page delivers one empty final block).
pub trait PageReceiver {
    /// Handle one block of page body bytes.
    fn on_page_data(&mut self, cntxt: DataContext, data: &[u8], is_final: bool);
}

/// Per-endpoint control state, reused across requests.
///
/// Created by [`Client::new`], mutated only by the engine and the receive
/// pump; the application reads it through the accessors.
#[derive(Debug)]
pub struct Control {
    pub(crate) cntxt: DataContext,
    pub(crate) host: String<HOST_MAX>,
    pub(crate) port: u16,
    pub(crate) use_tls: bool,
    pub(crate) timeout_secs: u16,
    pub(crate) state: RequestState,
    pub(crate) http_status: Option<u16>,
    pub(crate) page_size: u32,
    pub(crate) page_remaining: u32,
    pub(crate) block_size: usize,
}

impl Control {
    pub(crate) fn new(cntxt: DataContext, block_size: usize) -> Self {
        Self {
            cntxt,
            host: String::new(),
            port: 0,
            use_tls: false,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            state: RequestState::Idle,
            http_status: None,
            page_size: 0,
            page_remaining: 0,
            block_size: block_size.max(1),
        }
    }

    /// Set host connection characteristics from a URL.
    ///
    /// `url` must start with a case-insensitive `http`; TLS is inferred
    /// from the fifth character (`s`/`S`). A zero `port` selects 443 (TLS)
    /// or 80 (plain); an explicit port below 80 is rejected. The host is
    /// stored truncated to the control's fixed capacity.
    pub(crate) fn set_connection(&mut self, url: &str, port: u16) -> Result<(), Error> {
        if url.len() < 4 || !url.as_bytes()[..4].eq_ignore_ascii_case(b"http") {
            return Err(Error::InvalidUrl);
        }
        if port != 0 && port < 80 {
            return Err(Error::InvalidUrl);
        }

        self.use_tls = matches!(url.as_bytes().get(4), Some(&b's') | Some(&b'S'));
        self.host.clear();
        for ch in url.chars() {
            if self.host.push(ch).is_err() {
                break;
            }
        }
        self.port = if port == 0 {
            if self.use_tls { 443 } else { 80 }
        } else {
            port
        };
        Ok(())
    }

    /// The data context this control transfers under.
    pub fn context(&self) -> DataContext {
        self.cntxt
    }

    /// The resolved remote port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Whether the connection runs over TLS.
    pub fn use_tls(&self) -> bool {
        self.use_tls
    }

    /// Where the control sits between requests.
    pub fn request_state(&self) -> RequestState {
        self.state
    }

    /// The HTTP status from the last parsed result trailer, if any.
    pub fn http_status(&self) -> Option<u16> {
        self.http_status
    }

    /// Content length reported by the last completed request.
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Page bytes not yet forwarded to the receiver.
    pub fn page_remaining(&self) -> u32 {
        self.page_remaining
    }
}
