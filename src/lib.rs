//! # modem-http - HTTP(S) over cellular modems
//!
//! A Rust library that lets embedded applications perform HTTP and HTTPS
//! requests through a cellular modem whose only control path is a
//! half-duplex AT-command link shared with every other modem feature
//! (sockets, filesystem, positioning). This library is designed for
//! embedded systems and supports `no_std` environments.
//!
//! ## Features
//!
//! - **Request staging**: compose a raw request (request line, headers,
//!   body) into a caller-owned buffer, with common headers, arbitrary
//!   headers and basic-auth credentials
//! - **GET / POST / POST-from-file**: the full command sequence for each
//!   method, run under the device-wide channel lock
//! - **Streamed page reads**: a cooperative receive pump that drains the
//!   shared inbound ring buffer into the application in bounded blocks,
//!   without blocking the rest of the device for the whole page
//! - **Read-to-file**: divert a page into the modem-resident filesystem
//!
//! The modem-side AT dispatcher and the inbound ring buffer are platform
//! concerns; the library talks to them through the [`at::AtChannel`] and
//! [`at::RxBuffer`] traits.
//!
//! ## Usage
//!
//! Add this to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! modem-http = "0.1.0"
//! ```
//!
//! ### Fetching a page
//!
//! ```rust,no_run
//! use modem_http::http::{Client, PageReceiver};
//! # use modem_http::at::{AtChannel, DataContext, RxBuffer};
//! # use modem_http::error::Error;
//! # struct NullRx;
//! # impl RxBuffer for NullRx {
//! #     fn capacity(&self) -> usize { 1024 }
//! #     fn occupied(&self) -> usize { 0 }
//! #     fn find(&self, _pattern: &[u8]) -> Option<usize> { None }
//! #     fn pop(&mut self, _dest: &mut [u8]) -> usize { 0 }
//! #     fn pop_block(&mut self, _max: usize) -> &[u8] { &[] }
//! #     fn commit(&mut self, _len: usize) {}
//! # }
//! # struct NullChannel { rx: NullRx }
//! # impl AtChannel for NullChannel {
//! #     type Rx = NullRx;
//! #     fn lock(&mut self, _timeout_secs: u16) -> Result<(), Error> { Ok(()) }
//! #     fn try_lock(&mut self) -> bool { true }
//! #     fn unlock(&mut self) {}
//! #     fn invoke(&mut self, _cmd: &str) -> Result<(), Error> { Ok(()) }
//! #     fn await_final(&mut self, _timeout_secs: u16) -> Result<(), Error> { Ok(()) }
//! #     fn await_prompt(&mut self, _prompt: &str, _timeout_secs: u16) -> Result<(), Error> { Ok(()) }
//! #     fn send_data(&mut self, _data: &[u8]) -> Result<(), Error> { Ok(()) }
//! #     fn await_trailer<'a>(
//! #         &mut self,
//! #         _prefix: &str,
//! #         _timeout_secs: u16,
//! #         _line: &'a mut [u8],
//! #     ) -> Result<&'a str, Error> { Ok("") }
//! #     fn install_consumer(&mut self, _cntxt: DataContext) {}
//! #     fn remove_consumer(&mut self) {}
//! #     fn await_data(&mut self, _timeout_secs: u16) -> Result<(), Error> { Err(Error::Timeout) }
//! #     fn rx(&mut self) -> &mut NullRx { &mut self.rx }
//! # }
//! # struct Sink;
//! # impl PageReceiver for Sink {
//! #     fn on_page_data(&mut self, _cntxt: DataContext, _data: &[u8], _is_final: bool) {}
//! # }
//! # let channel = NullChannel { rx: NullRx };
//!
//! let mut client = Client::new(channel, 1, Sink);
//! client.set_connection("https://api.example.com", 0)?;
//!
//! let status = client.get("/telemetry", false)?;
//! if (200..=299).contains(&status) {
//!     // body bytes arrive through the PageReceiver, last chunk flagged
//!     client.read_page()?;
//! }
//! # Ok::<(), modem_http::error::Error>(())
//! ```
//!
//! ### Custom requests
//!
//! Headers and body are staged into a buffer the application owns, then
//! handed to the engine:
//!
//! ```rust
//! use modem_http::http::{HeaderMap, Method, Request};
//!
//! let mut buf = [0u8; 512];
//! let mut request = Request::new(Method::Post, "https://api.example.com", "/ingest", &mut buf)?;
//! request.add_common_headers(HeaderMap::ACCEPT | HeaderMap::CONTENT_TYPE)?;
//! request.add_header("X-Device-Serial", "A113-0042")?;
//! request.add_post_data(b"{\"temp\":23.5}")?;
//! # Ok::<(), modem_http::error::Error>(())
//! ```
//!
//! ## Platform support
//!
//! This library is designed to work on:
//! - Embedded microcontrollers (ARM Cortex-M, RISC-V, etc.)
//! - Linux-based IoT devices (Raspberry Pi, etc.)
//! - Any platform supporting Rust's `core` library
//!
//! ## Optional Features
//!
//! - `std`: Enable standard library support (default: disabled)
//! - `defmt`: Enable defmt logging support for embedded debugging

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(missing_docs)]
#![warn(missing_debug_implementations)]

/// Common error type for modem HTTP operations.
pub mod error;

/// Seams to the platform's AT-command dispatcher and inbound ring buffer.
///
/// The modem link is a shared, half-duplex resource; this module defines
/// the traits the HTTP engine uses to lock it, exchange commands, enter
/// data mode and drain received bytes.
pub mod at;

/// The HTTP engine: request staging, command sequencing and page streaming.
pub mod http;
