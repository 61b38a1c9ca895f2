//! The streamed page receive pump
//!
//! Once a page read is invoked, the modem switches the channel to data
//! mode and streams the body into the shared ring buffer, closing with the
//! literal terminal marker and a final status line. The pump is the
//! installed data consumer for that stretch: it runs one pass per
//! inbound-data event, forwards body bytes to the application in blocks
//! bounded by the control's block size, and never blocks waiting for more
//! bytes — when it cannot make progress it hands control back until the
//! next event.

use super::{Control, PAGE_END_MARKER, PageReceiver, READ_TRAILER_PREFIX};
use crate::at::RxBuffer;
use crate::error::Error;
use heapless::Vec;

/// Scratch capacity for the terminal marker plus the read status line.
const TRAILER_SCRATCH: usize = 32;

/// Outcome of one pump pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PumpStatus {
    /// Bytes were consumed; invoke again before waiting.
    Progress,
    /// Nothing to do until more bytes arrive.
    Pending,
    /// The terminal status line parsed clean; the stream is done.
    Complete,
}

/// Per-read state of the receive pump.
pub(crate) struct PageStream {
    started: bool,
    final_delivered: bool,
    trailer: Vec<u8, TRAILER_SCRATCH>,
}

impl PageStream {
    pub(crate) fn new() -> Self {
        Self {
            started: false,
            final_delivered: false,
            trailer: Vec::new(),
        }
    }

    /// Run one cooperative pass over the ring buffer.
    pub(crate) fn pass<B: RxBuffer, R: PageReceiver>(
        &mut self,
        rx: &mut B,
        receiver: &mut R,
        ctrl: &mut Control,
    ) -> Result<PumpStatus, Error> {
        if !self.started {
            return self.discard_preamble(rx);
        }
        if !self.final_delivered {
            return self.forward_block(rx, receiver, ctrl);
        }
        self.parse_trailer(rx)
    }

    /// Drop the short preamble line ahead of the raw body bytes.
    fn discard_preamble<B: RxBuffer>(&mut self, rx: &mut B) -> Result<PumpStatus, Error> {
        let Some(eol) = rx.find(b"\r\n") else {
            return Ok(PumpStatus::Pending);
        };
        let mut scratch = [0u8; TRAILER_SCRATCH];
        let mut remaining = eol + 2;
        while remaining > 0 {
            let take = remaining.min(scratch.len());
            let popped = rx.pop(&mut scratch[..take]);
            if popped == 0 {
                return Err(Error::InternalError);
            }
            remaining -= popped;
        }
        self.started = true;
        Ok(PumpStatus::Progress)
    }

    /// Forward at most one block of body bytes to the receiver.
    ///
    /// The block is bounded by both the control's block size and the
    /// terminal marker, so marker bytes never reach the application. The
    /// final flag is raised on the block that ends exactly at the marker.
    fn forward_block<B: RxBuffer, R: PageReceiver>(
        &mut self,
        rx: &mut B,
        receiver: &mut R,
        ctrl: &mut Control,
    ) -> Result<PumpStatus, Error> {
        match rx.find(PAGE_END_MARKER) {
            None => {
                // the last marker_len-1 buffered bytes may be an incomplete
                // marker; they stay buffered until it resolves
                let available = rx.occupied().saturating_sub(PAGE_END_MARKER.len() - 1);
                if available < ctrl.block_size {
                    return Ok(PumpStatus::Pending);
                }
                let block = rx.pop_block(ctrl.block_size);
                let len = block.len();
                if len == 0 {
                    return Ok(PumpStatus::Pending);
                }
                receiver.on_page_data(ctrl.cntxt, block, false);
                rx.commit(len);
                ctrl.page_remaining = ctrl.page_remaining.saturating_sub(len as u32);
                Ok(PumpStatus::Progress)
            }
            Some(marker_at) => {
                let want = marker_at.min(ctrl.block_size);
                let block = rx.pop_block(want);
                let len = block.len();
                if len == 0 && marker_at > 0 {
                    return Ok(PumpStatus::Pending);
                }
                let is_final = len == marker_at;
                receiver.on_page_data(ctrl.cntxt, block, is_final);
                rx.commit(len);
                ctrl.page_remaining = ctrl.page_remaining.saturating_sub(len as u32);
                if is_final {
                    self.final_delivered = true;
                }
                Ok(PumpStatus::Progress)
            }
        }
    }

    /// Accumulate the marker and the trailing status line, then parse the
    /// read result out of it.
    fn parse_trailer<B: RxBuffer>(&mut self, rx: &mut B) -> Result<PumpStatus, Error> {
        let free = TRAILER_SCRATCH - self.trailer.len();
        if free > 0 && rx.occupied() > 0 {
            let mut scratch = [0u8; TRAILER_SCRATCH];
            let take = free.min(rx.occupied());
            let popped = rx.pop(&mut scratch[..take]);
            self.trailer
                .extend_from_slice(&scratch[..popped])
                .map_err(|_| Error::InternalError)?;
        }

        if let Some(at) = find_slice(&self.trailer, READ_TRAILER_PREFIX) {
            let after = &self.trailer[at + READ_TRAILER_PREFIX.len()..];
            if let Some(eol) = after.iter().position(|&b| b == b'\n') {
                let line =
                    core::str::from_utf8(&after[..eol]).map_err(|_| Error::InternalError)?;
                let err = line
                    .trim()
                    .parse::<u16>()
                    .map_err(|_| Error::InternalError)?;
                if err == 0 {
                    return Ok(PumpStatus::Complete);
                }
                return Err(Error::Device(err));
            }
        }

        if self.trailer.len() == TRAILER_SCRATCH {
            // scratch exhausted without a parsable status line
            return Err(Error::InternalError);
        }
        Ok(PumpStatus::Pending)
    }
}

/// Finds the first occurrence of a slice in another slice and returns its
/// starting position.
fn find_slice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
