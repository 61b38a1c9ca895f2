//! The request engine
//!
//! Every operation here runs as a locked sequence on the shared AT
//! channel: acquire the device-wide lock, issue the configuration and URL
//! commands, invoke the method, then wait for the asynchronous result
//! trailer that carries the firmware error code, the remote HTTP status
//! and the page size. Any sub-step failure aborts the whole sequence and
//! surfaces that failure; the engine never retries on its own.

use super::pump::{PageStream, PumpStatus};
use super::request::{Method, Request};
use super::response;
use super::{
    CMD_MAX, Control, DATA_PROMPT, DEFAULT_TIMEOUT_SECS, FILENAME_MAX, PageReceiver,
    POST_INPUT_TIME_SECS, POSTFILE_INPUT_TIME_SECS, READFILE_INTERPACKET_SECS,
    READFILE_TIMEOUT_SECS, RequestState, SUCCESS_RANGE, TRAILER_MAX, URL_INPUT_TIME_SECS, URL_MAX,
};
use crate::at::{AtChannel, DataContext, RxBuffer};
use crate::error::Error;
use core::fmt::Write;
use heapless::String;

/// An HTTP(S) client for one logical endpoint behind the modem.
///
/// The client owns its handle to the shared AT channel and the
/// application's page receiver; request staging buffers stay with the
/// caller. One request is in flight at a time — the modem holds exactly
/// one URL and one pending transfer.
///
/// # Type Parameters
///
/// * `C` - The channel handle implementing [`AtChannel`]
/// * `R` - The application sink implementing [`PageReceiver`]
pub struct Client<C: AtChannel, R: PageReceiver> {
    channel: C,
    receiver: R,
    control: Control,
}

impl<C: AtChannel, R: PageReceiver> Client<C, R> {
    /// Create a client for the data context `cntxt`.
    ///
    /// The streaming block size defaults to a quarter of the inbound ring
    /// buffer, bounding how much of the shared buffer one page read may
    /// hold between handoffs to the receiver.
    pub fn new(mut channel: C, cntxt: DataContext, receiver: R) -> Self {
        let block_size = channel.rx().capacity() / 4;
        Self {
            channel,
            receiver,
            control: Control::new(cntxt, block_size),
        }
    }

    /// Set host connection characteristics.
    ///
    /// See [`Control`] for the validation rules: the URL must carry an
    /// `http`/`https` scheme (TLS is inferred from it), and a zero port
    /// resolves to the scheme default.
    pub fn set_connection(&mut self, url: &str, port: u16) -> Result<(), Error> {
        self.control.set_connection(url, port)
    }

    /// Override the per-request timeout (defaults to
    /// [`DEFAULT_TIMEOUT_SECS`]).
    pub fn set_timeout(&mut self, timeout_secs: u16) {
        self.control.timeout_secs = if timeout_secs == 0 {
            DEFAULT_TIMEOUT_SECS
        } else {
            timeout_secs
        };
    }

    /// The control state shared across this client's requests.
    pub fn control(&self) -> &Control {
        &self.control
    }

    /// Borrow the underlying channel handle.
    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// Borrow the underlying channel handle mutably.
    ///
    /// The handle still arbitrates the device-wide lock itself; holding
    /// this borrow grants no exchange rights.
    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    /// Borrow the application's page receiver.
    pub fn receiver(&self) -> &R {
        &self.receiver
    }

    /// Perform an HTTP GET request.
    ///
    /// Returns the remote HTTP status once the result trailer arrives.
    /// The page body is not transferred yet; a success-range status arms
    /// [`read_page`](Client::read_page).
    pub fn get(&mut self, relative_url: &str, return_response_headers: bool) -> Result<u16, Error> {
        self.request(Method::Get, relative_url, None, &[], return_response_headers)
    }

    /// Perform an HTTP GET request with custom staged headers.
    pub fn get_custom_request(
        &mut self,
        relative_url: &str,
        request: &mut Request<'_>,
        return_response_headers: bool,
    ) -> Result<u16, Error> {
        self.request(
            Method::Get,
            relative_url,
            Some(request),
            &[],
            return_response_headers,
        )
    }

    /// Perform an HTTP POST request with a raw body.
    pub fn post(
        &mut self,
        relative_url: &str,
        body: &[u8],
        return_response_headers: bool,
    ) -> Result<u16, Error> {
        self.request(Method::Post, relative_url, None, body, return_response_headers)
    }

    /// Perform an HTTP POST request from a staged custom request.
    ///
    /// The staged `Content-Length` placeholder is patched in place with
    /// the true body length before the bytes go out.
    pub fn post_custom_request(
        &mut self,
        relative_url: &str,
        request: &mut Request<'_>,
        return_response_headers: bool,
    ) -> Result<u16, Error> {
        self.request(
            Method::Post,
            relative_url,
            Some(request),
            &[],
            return_response_headers,
        )
    }

    /// POST the contents of a modem-resident file to the remote.
    pub fn post_file(
        &mut self,
        relative_url: &str,
        filename: &str,
        return_response_headers: bool,
    ) -> Result<u16, Error> {
        if filename.len() > FILENAME_MAX {
            return Err(Error::Overflow);
        }
        self.control.state = RequestState::Idle;
        self.control.http_status = None;
        self.channel.lock(self.control.timeout_secs)?;
        let outcome = self.run_post_file(relative_url, filename, return_response_headers);
        self.channel.unlock();
        if outcome.is_err() {
            self.control.state = RequestState::Idle;
        }
        outcome
    }

    /// Retrieve the page from the last completed GET or POST, streaming it
    /// through the client's [`PageReceiver`].
    ///
    /// Legal only once a request completed with a success-range status;
    /// otherwise fails without touching the channel or the ring buffer.
    /// The channel must be free — a busy channel reports
    /// [`Error::Conflict`] rather than waiting.
    pub fn read_page(&mut self) -> Result<u16, Error> {
        if self.control.state != RequestState::RequestComplete {
            return Err(Error::PreconditionFailed);
        }
        if !self.channel.try_lock() {
            return Err(Error::Conflict);
        }
        let outcome = self.run_read_page();
        self.channel.unlock();
        outcome
    }

    /// Divert the page from the last completed GET or POST into a
    /// modem-resident file.
    pub fn read_page_to_file(&mut self, filename: &str) -> Result<u16, Error> {
        if filename.len() > FILENAME_MAX {
            return Err(Error::Overflow);
        }
        if self.control.state != RequestState::RequestComplete {
            return Err(Error::PreconditionFailed);
        }
        if !self.channel.try_lock() {
            return Err(Error::Conflict);
        }
        let outcome = self.run_read_page_to_file(filename);
        self.channel.unlock();
        outcome
    }

    /// Abandon a page transfer in progress.
    ///
    /// # Panics
    ///
    /// Always. Mid-transfer cancellation is not supported by this engine;
    /// the entry point exists so a caller reaching for it fails loudly
    /// instead of silently leaving the transfer running.
    pub fn cancel_page(&mut self) -> Result<(), Error> {
        unimplemented!("mid-transfer page cancellation is not supported");
    }

    /// Shared GET/POST skeleton: lock, run the command sequence, settle
    /// the control state, release the lock on every exit path.
    fn request(
        &mut self,
        method: Method,
        relative_url: &str,
        custom: Option<&mut Request<'_>>,
        body: &[u8],
        return_response_headers: bool,
    ) -> Result<u16, Error> {
        self.control.state = RequestState::Idle;
        self.control.http_status = None;
        self.channel.lock(self.control.timeout_secs)?;
        let outcome = self.run_request(method, relative_url, custom, body, return_response_headers);
        self.channel.unlock();
        if outcome.is_err() {
            self.control.state = RequestState::Idle;
        }
        outcome
    }

    fn run_request(
        &mut self,
        method: Method,
        relative_url: &str,
        custom: Option<&mut Request<'_>>,
        body: &[u8],
        return_response_headers: bool,
    ) -> Result<u16, Error> {
        self.configure(return_response_headers)?;
        self.set_url(relative_url)?;
        match method {
            Method::Get => self.invoke_get(custom)?,
            Method::Post => self.invoke_post(custom, body)?,
        }
        self.settle(method.trailer_prefix())
    }

    fn run_post_file(
        &mut self,
        relative_url: &str,
        filename: &str,
        return_response_headers: bool,
    ) -> Result<u16, Error> {
        self.configure(return_response_headers)?;
        self.set_url(relative_url)?;
        // a file POST always carries its own request head
        self.simple_command("AT+QHTTPCFG=\"requestheader\",1")?;

        let mut cmd: String<CMD_MAX> = String::new();
        write!(
            cmd,
            "AT+QHTTPPOSTFILE=\"{}\",{}",
            filename, POSTFILE_INPUT_TIME_SECS
        )
        .map_err(|_| Error::Overflow)?;
        self.channel.invoke(&cmd)?;
        self.channel.await_final(self.control.timeout_secs)?;
        self.settle("+QHTTPPOSTFILE: ")
    }

    /// Optional response-header echo and TLS binding ahead of the URL.
    fn configure(&mut self, return_response_headers: bool) -> Result<(), Error> {
        if return_response_headers {
            self.simple_command("AT+QHTTPCFG=\"responseheader\",1")?;
        }
        if self.control.use_tls {
            let mut cmd: String<CMD_MAX> = String::new();
            write!(cmd, "AT+QHTTPCFG=\"sslctxid\",{}", self.control.cntxt).unwrap();
            self.simple_command(&cmd)?;
        }
        Ok(())
    }

    /// Make the composed URL resident in the modem.
    ///
    /// The firmware holds a single URL device-wide; setting a new one
    /// replaces any prior, whoever set it.
    fn set_url(&mut self, relative_url: &str) -> Result<(), Error> {
        if self.control.host.is_empty() {
            return Err(Error::PreconditionFailed);
        }
        let mut url: String<URL_MAX> = String::new();
        url.push_str(&self.control.host).map_err(|_| Error::Overflow)?;
        if !relative_url.is_empty() {
            url.push_str(relative_url).map_err(|_| Error::Overflow)?;
        }

        let mut cmd: String<CMD_MAX> = String::new();
        write!(cmd, "AT+QHTTPURL={},{}", url.len(), URL_INPUT_TIME_SECS).unwrap();
        self.channel.invoke(&cmd)?;
        self.channel.await_prompt(DATA_PROMPT, URL_INPUT_TIME_SECS)?;
        self.channel.send_data(url.as_bytes())?;
        self.channel.await_final(self.control.timeout_secs)
    }

    fn invoke_get(&mut self, custom: Option<&mut Request<'_>>) -> Result<(), Error> {
        match custom {
            Some(request) => {
                self.simple_command("AT+QHTTPCFG=\"requestheader\",1")?;
                request.close_head()?;
                let head_len = request.headers_len();

                let mut cmd: String<CMD_MAX> = String::new();
                write!(cmd, "AT+QHTTPGET={},{}", self.control.timeout_secs, head_len).unwrap();
                self.channel.invoke(&cmd)?;
                self.channel
                    .await_prompt(DATA_PROMPT, self.control.timeout_secs)?;
                self.channel.send_data(&request.as_bytes()[..head_len])?;
                self.channel.await_final(self.control.timeout_secs)
            }
            None => {
                let mut cmd: String<CMD_MAX> = String::new();
                write!(cmd, "AT+QHTTPGET={}", self.control.timeout_secs).unwrap();
                self.channel.invoke(&cmd)?;
                self.channel.await_final(self.control.timeout_secs)
            }
        }
    }

    fn invoke_post(&mut self, custom: Option<&mut Request<'_>>, body: &[u8]) -> Result<(), Error> {
        match custom {
            Some(request) => {
                self.simple_command("AT+QHTTPCFG=\"requestheader\",1")?;
                request.patch_content_length()?;
                let stage_len = request.headers_len() + request.content_len();

                let mut cmd: String<CMD_MAX> = String::new();
                write!(
                    cmd,
                    "AT+QHTTPPOST={},{},{}",
                    stage_len, POST_INPUT_TIME_SECS, self.control.timeout_secs
                )
                .unwrap();
                self.channel.invoke(&cmd)?;
                self.channel
                    .await_prompt(DATA_PROMPT, self.control.timeout_secs)?;
                self.channel.send_data(&request.as_bytes()[..stage_len])?;
                self.channel.await_final(self.control.timeout_secs)
            }
            None => {
                let mut cmd: String<CMD_MAX> = String::new();
                write!(
                    cmd,
                    "AT+QHTTPPOST={},{},{}",
                    body.len(),
                    POST_INPUT_TIME_SECS,
                    self.control.timeout_secs
                )
                .unwrap();
                self.channel.invoke(&cmd)?;
                self.channel
                    .await_prompt(DATA_PROMPT, self.control.timeout_secs)?;
                self.channel.send_data(body)?;
                self.channel.await_final(self.control.timeout_secs)
            }
        }
    }

    /// Wait out the method's result trailer and settle the control state.
    ///
    /// The HTTP status is recorded whenever it parses; only a
    /// success-range status arms the page read.
    fn settle(&mut self, trailer_prefix: &str) -> Result<u16, Error> {
        let mut line = [0u8; TRAILER_MAX];
        let tail =
            self.channel
                .await_trailer(trailer_prefix, self.control.timeout_secs, &mut line)?;

        let err = response::parse_err(tail)?;
        if err != 0 {
            return Err(Error::Device(err));
        }

        let (status, length) = response::parse_status(tail)?;
        self.control.http_status = Some(status);
        self.control.page_size = length;
        self.control.page_remaining = length;
        if SUCCESS_RANGE.contains(&status) {
            self.control.state = RequestState::RequestComplete;
        }
        Ok(status)
    }

    fn run_read_page(&mut self) -> Result<u16, Error> {
        let mut cmd: String<CMD_MAX> = String::new();
        write!(cmd, "AT+QHTTPREAD={}", self.control.timeout_secs).unwrap();
        self.channel.invoke(&cmd)?;

        self.channel.install_consumer(self.control.cntxt);
        let outcome = self.drive_pump();
        self.channel.remove_consumer();

        outcome?;
        self.control.http_status.ok_or(Error::InternalError)
    }

    /// Run the pump one pass per inbound-data event until it terminates.
    ///
    /// The pump itself never waits; the only blocking point is the
    /// channel's data-event wait, which carries the command-level timeout.
    fn drive_pump(&mut self) -> Result<(), Error> {
        let mut pump = PageStream::new();
        loop {
            match pump.pass(self.channel.rx(), &mut self.receiver, &mut self.control)? {
                PumpStatus::Complete => return Ok(()),
                PumpStatus::Progress => continue,
                PumpStatus::Pending => self.channel.await_data(self.control.timeout_secs)?,
            }
        }
    }

    fn run_read_page_to_file(&mut self, filename: &str) -> Result<u16, Error> {
        let mut cmd: String<CMD_MAX> = String::new();
        write!(
            cmd,
            "AT+QHTTPREADFILE=\"{}\",{}",
            filename, READFILE_INTERPACKET_SECS
        )
        .map_err(|_| Error::Overflow)?;
        self.channel.invoke(&cmd)?;
        self.channel.await_final(self.control.timeout_secs)?;

        let mut line = [0u8; TRAILER_MAX];
        let tail =
            self.channel
                .await_trailer("+QHTTPREADFILE: ", READFILE_TIMEOUT_SECS, &mut line)?;
        let err = response::parse_err(tail)?;
        if err != 0 {
            return Err(Error::Device(err));
        }
        self.control.http_status.ok_or(Error::InternalError)
    }

    /// Issue one command and consume its immediate result.
    fn simple_command(&mut self, cmd: &str) -> Result<(), Error> {
        self.channel.invoke(cmd)?;
        self.channel.await_final(self.control.timeout_secs)
    }
}

impl<C: AtChannel, R: PageReceiver> core::fmt::Debug for Client<C, R> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Client")
            .field("control", &self.control)
            .finish_non_exhaustive()
    }
}
