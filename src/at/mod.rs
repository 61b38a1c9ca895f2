//! Seams to the platform AT-command dispatcher and inbound ring buffer
//!
//! The modem exposes every feature over one serial command/response link.
//! The platform owns that link: it serializes commands, arbitrates the
//! device-wide lock, switches into data mode and fills the inbound ring
//! buffer from the transport interrupt. The HTTP engine only ever talks to
//! it through the traits below.

#![allow(missing_docs)]
#![deny(unsafe_code)]

use crate::error::Error;

/// Small integer identifying which logical feature owns the data-mode
/// channel for a transfer.
pub type DataContext = u8;

/// Re-exports of the channel traits
pub mod prelude {
    pub use super::{AtChannel, DataContext, RxBuffer};
}

/// The shared AT-command channel.
///
/// Exactly one command/data exchange is active on the link at any time;
/// [`lock`](AtChannel::lock) / [`unlock`](AtChannel::unlock) bracket it.
/// Within a locked session the exchange is strictly sequential: a command
/// is sent with [`invoke`](AtChannel::invoke), its immediate result
/// consumed with [`await_final`](AtChannel::await_final), data-mode
/// sub-exchanges run prompt-then-bytes, and long-running commands report
/// their true outcome later through an uncorrelated trailer line.
pub trait AtChannel {
    /// The inbound ring buffer fed by the transport.
    type Rx: RxBuffer;

    /// Block up to `timeout_secs` for exclusive use of the channel.
    fn lock(&mut self, timeout_secs: u16) -> Result<(), Error>;
    /// Non-blocking lock attempt; `true` when the channel was acquired.
    fn try_lock(&mut self) -> bool;
    /// Release the channel lock.
    fn unlock(&mut self);

    /// Send one complete AT command line.
    fn invoke(&mut self, cmd: &str) -> Result<(), Error>;
    /// Wait for the immediate OK/ERROR result of the last command.
    fn await_final(&mut self, timeout_secs: u16) -> Result<(), Error>;
    /// Wait for a data-mode prompt (e.g. `CONNECT`).
    fn await_prompt(&mut self, prompt: &str, timeout_secs: u16) -> Result<(), Error>;
    /// Transmit raw bytes while in data mode.
    fn send_data(&mut self, data: &[u8]) -> Result<(), Error>;
    /// Wait for an asynchronous result trailer starting with `prefix`.
    ///
    /// The line tail following the prefix is copied into `line` and
    /// returned as a `&str` borrowing it.
    fn await_trailer<'a>(
        &mut self,
        prefix: &str,
        timeout_secs: u16,
        line: &'a mut [u8],
    ) -> Result<&'a str, Error>;

    /// Install the active data consumer for `cntxt`.
    ///
    /// Consumer ownership is exclusive: installing while another consumer
    /// is active is a programming error, and implementations should assert
    /// rather than report it.
    fn install_consumer(&mut self, cntxt: DataContext);
    /// Uninstall the active data consumer.
    fn remove_consumer(&mut self);
    /// Block up to `timeout_secs` for the next inbound-data event.
    fn await_data(&mut self, timeout_secs: u16) -> Result<(), Error>;
    /// Access the inbound ring buffer.
    ///
    /// Only the currently installed consumer may drain it.
    fn rx(&mut self) -> &mut Self::Rx;
}

/// The shared inbound ring buffer.
///
/// Single producer (the transport) / single consumer (whoever is
/// installed). `pop_block` / `commit` form a zero-copy pop: the returned
/// slice stays valid until the commit, and committing consumes the bytes.
pub trait RxBuffer {
    /// Total capacity in bytes.
    fn capacity(&self) -> usize;
    /// Bytes currently buffered.
    fn occupied(&self) -> usize;
    /// Index of the first occurrence of `pattern` in the buffered bytes.
    fn find(&self, pattern: &[u8]) -> Option<usize>;
    /// Copy up to `dest.len()` bytes out; returns the count copied.
    fn pop(&mut self, dest: &mut [u8]) -> usize;
    /// Borrow up to `max` contiguous buffered bytes without consuming them.
    ///
    /// The returned run may be shorter than `max` where the buffer wraps.
    fn pop_block(&mut self, max: usize) -> &[u8];
    /// Consume `len` bytes previously returned by `pop_block`.
    fn commit(&mut self, len: usize);
}
