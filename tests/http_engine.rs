use std::collections::VecDeque;

use modem_http::at::{AtChannel, DataContext, RxBuffer};
use modem_http::error::Error;
use modem_http::http::{Client, HeaderMap, Method, PageReceiver, Request, RequestState};

const RX_CAPACITY: usize = 4096;

#[derive(Default)]
struct MockRx {
    data: Vec<u8>,
}

impl RxBuffer for MockRx {
    fn capacity(&self) -> usize {
        RX_CAPACITY
    }

    fn occupied(&self) -> usize {
        self.data.len()
    }

    fn find(&self, pattern: &[u8]) -> Option<usize> {
        self.data
            .windows(pattern.len())
            .position(|window| window == pattern)
    }

    fn pop(&mut self, dest: &mut [u8]) -> usize {
        let n = dest.len().min(self.data.len());
        dest[..n].copy_from_slice(&self.data[..n]);
        self.data.drain(..n);
        n
    }

    fn pop_block(&mut self, max: usize) -> &[u8] {
        let n = max.min(self.data.len());
        &self.data[..n]
    }

    fn commit(&mut self, len: usize) {
        self.data.drain(..len);
    }
}

/// A scripted AT channel: records every command and data-mode payload,
/// hands out queued trailers and final results, and feeds the ring buffer
/// one queued burst per data event.
struct MockChannel {
    rx: MockRx,
    lock_available: bool,
    locked: bool,
    consumer: Option<DataContext>,
    consumer_installs: usize,
    commands: Vec<String>,
    data_writes: Vec<Vec<u8>>,
    final_results: VecDeque<Result<(), Error>>,
    trailers: VecDeque<(&'static str, &'static str)>,
    data_events: VecDeque<Vec<u8>>,
}

impl MockChannel {
    fn new() -> Self {
        Self {
            rx: MockRx::default(),
            lock_available: true,
            locked: false,
            consumer: None,
            consumer_installs: 0,
            commands: Vec::new(),
            data_writes: Vec::new(),
            final_results: VecDeque::new(),
            trailers: VecDeque::new(),
            data_events: VecDeque::new(),
        }
    }

    fn queue_trailer(&mut self, prefix: &'static str, tail: &'static str) {
        self.trailers.push_back((prefix, tail));
    }

    fn queue_final(&mut self, result: Result<(), Error>) {
        self.final_results.push_back(result);
    }

    fn queue_data_event(&mut self, bytes: &[u8]) {
        self.data_events.push_back(bytes.to_vec());
    }
}

impl AtChannel for MockChannel {
    type Rx = MockRx;

    fn lock(&mut self, _timeout_secs: u16) -> Result<(), Error> {
        if !self.lock_available {
            return Err(Error::Timeout);
        }
        assert!(!self.locked, "lock is not reentrant");
        self.locked = true;
        Ok(())
    }

    fn try_lock(&mut self) -> bool {
        if !self.lock_available || self.locked {
            return false;
        }
        self.locked = true;
        true
    }

    fn unlock(&mut self) {
        assert!(self.locked, "unlock without lock");
        self.locked = false;
    }

    fn invoke(&mut self, cmd: &str) -> Result<(), Error> {
        assert!(self.locked, "command issued outside the channel lock");
        self.commands.push(cmd.to_string());
        Ok(())
    }

    fn await_final(&mut self, _timeout_secs: u16) -> Result<(), Error> {
        self.final_results.pop_front().unwrap_or(Ok(()))
    }

    fn await_prompt(&mut self, prompt: &str, _timeout_secs: u16) -> Result<(), Error> {
        assert_eq!(prompt, "CONNECT");
        Ok(())
    }

    fn send_data(&mut self, data: &[u8]) -> Result<(), Error> {
        assert!(self.locked, "data sent outside the channel lock");
        self.data_writes.push(data.to_vec());
        Ok(())
    }

    fn await_trailer<'a>(
        &mut self,
        prefix: &str,
        _timeout_secs: u16,
        line: &'a mut [u8],
    ) -> Result<&'a str, Error> {
        let (expected, tail) = self.trailers.pop_front().ok_or(Error::Timeout)?;
        assert_eq!(expected, prefix, "trailer awaited for the wrong method");
        line[..tail.len()].copy_from_slice(tail.as_bytes());
        Ok(std::str::from_utf8(&line[..tail.len()]).unwrap())
    }

    fn install_consumer(&mut self, cntxt: DataContext) {
        assert!(self.consumer.is_none(), "consumer already installed");
        self.consumer = Some(cntxt);
        self.consumer_installs += 1;
    }

    fn remove_consumer(&mut self) {
        assert!(self.consumer.is_some(), "no consumer to remove");
        self.consumer = None;
    }

    fn await_data(&mut self, _timeout_secs: u16) -> Result<(), Error> {
        let burst = self.data_events.pop_front().ok_or(Error::Timeout)?;
        self.rx.data.extend_from_slice(&burst);
        Ok(())
    }

    fn rx(&mut self) -> &mut MockRx {
        &mut self.rx
    }
}

#[derive(Default)]
struct Recorder {
    chunks: Vec<(Vec<u8>, bool)>,
    contexts: Vec<DataContext>,
}

impl Recorder {
    fn collected(&self) -> Vec<u8> {
        self.chunks.iter().flat_map(|(c, _)| c.clone()).collect()
    }
}

impl PageReceiver for Recorder {
    fn on_page_data(&mut self, cntxt: DataContext, data: &[u8], is_final: bool) {
        self.contexts.push(cntxt);
        self.chunks.push((data.to_vec(), is_final));
    }
}

fn client_with(channel: MockChannel) -> Client<MockChannel, Recorder> {
    Client::new(channel, 1, Recorder::default())
}

#[test]
fn get_runs_the_full_command_sequence() {
    let mut channel = MockChannel::new();
    channel.queue_trailer("+QHTTPGET: ", "0,200,120");
    let mut client = client_with(channel);
    client.set_connection("http://example.com", 0).unwrap();

    let status = client.get("/data?q=1", false).unwrap();
    assert_eq!(status, 200);
    assert_eq!(client.control().request_state(), RequestState::RequestComplete);
    assert_eq!(client.control().http_status(), Some(200));
    assert_eq!(client.control().page_size(), 120);

    let channel = client.channel();
    assert_eq!(
        channel.commands,
        vec!["AT+QHTTPURL=27,5".to_string(), "AT+QHTTPGET=60".to_string()]
    );
    assert_eq!(channel.data_writes[0], b"http://example.com/data?q=1".to_vec());
    assert!(!channel.locked, "lock must be released after the request");
}

#[test]
fn tls_and_response_header_options_emit_their_config_commands() {
    let mut channel = MockChannel::new();
    channel.queue_trailer("+QHTTPGET: ", "0,200,0");
    let mut client = client_with(channel);
    client.set_connection("https://secure.example.com", 0).unwrap();
    assert_eq!(client.control().port(), 443);

    client.get("/", true).unwrap();
    assert_eq!(
        client.channel().commands,
        vec![
            "AT+QHTTPCFG=\"responseheader\",1".to_string(),
            "AT+QHTTPCFG=\"sslctxid\",1".to_string(),
            "AT+QHTTPURL=27,5".to_string(),
            "AT+QHTTPGET=60".to_string(),
        ]
    );
}

#[test]
fn custom_get_transmits_the_closed_head_in_data_mode() {
    let mut channel = MockChannel::new();
    channel.queue_trailer("+QHTTPGET: ", "0,200,16");
    let mut client = client_with(channel);
    client.set_connection("http://example.com", 0).unwrap();

    let mut buf = [0u8; 256];
    let mut request = Request::new(Method::Get, "http://example.com", "/data", &mut buf).unwrap();
    request.add_common_headers(HeaderMap::ACCEPT).unwrap();

    client.get_custom_request("/data", &mut request, false).unwrap();

    let channel = client.channel();
    assert_eq!(channel.commands[1], "AT+QHTTPCFG=\"requestheader\",1");
    let head = &channel.data_writes[1];
    assert!(head.starts_with(b"GET /data HTTP/1.1\r\n"));
    assert!(head.ends_with(b"\r\n\r\n"));
    let expected = format!("AT+QHTTPGET=60,{}", head.len());
    assert_eq!(channel.commands[2], expected);
}

#[test]
fn post_transmits_the_raw_body() {
    let mut channel = MockChannel::new();
    channel.queue_trailer("+QHTTPPOST: ", "0,201,0");
    let mut client = client_with(channel);
    client.set_connection("http://example.com", 0).unwrap();

    let status = client.post("/ingest", b"temp=23.5", false).unwrap();
    assert_eq!(status, 201);

    let channel = client.channel();
    assert_eq!(channel.commands[1], "AT+QHTTPPOST=9,5,60");
    assert_eq!(channel.data_writes[1], b"temp=23.5".to_vec());
}

#[test]
fn custom_post_patches_content_length_before_transmitting() {
    let mut channel = MockChannel::new();
    channel.queue_trailer("+QHTTPPOST: ", "0,200,0");
    let mut client = client_with(channel);
    client.set_connection("http://example.com", 0).unwrap();

    let mut buf = [0u8; 256];
    let mut request = Request::new(Method::Post, "http://example.com", "/ingest", &mut buf).unwrap();
    request.add_common_headers(HeaderMap::CONTENT_TYPE).unwrap();
    request.add_post_data(b"0123456789").unwrap();

    client.post_custom_request("/ingest", &mut request, false).unwrap();

    let channel = client.channel();
    let staged = &channel.data_writes[1];
    let staged_text = std::str::from_utf8(staged).unwrap();
    assert!(staged_text.contains("Content-Length:    10\r\n\r\n0123456789"));
    let expected = format!("AT+QHTTPPOST={},5,60", staged.len());
    assert_eq!(channel.commands[2], expected);
}

#[test]
fn post_file_names_the_staged_file() {
    let mut channel = MockChannel::new();
    channel.queue_trailer("+QHTTPPOSTFILE: ", "0,200,0");
    let mut client = client_with(channel);
    client.set_connection("http://example.com", 0).unwrap();

    let status = client.post_file("/upload", "report.json", false).unwrap();
    assert_eq!(status, 200);

    let channel = client.channel();
    assert_eq!(channel.commands[1], "AT+QHTTPCFG=\"requestheader\",1");
    assert_eq!(channel.commands[2], "AT+QHTTPPOSTFILE=\"report.json\",15");
}

#[test]
fn lock_timeout_returns_before_any_command() {
    let mut channel = MockChannel::new();
    channel.lock_available = false;
    let mut client = client_with(channel);
    client.set_connection("http://example.com", 0).unwrap();

    assert_eq!(client.get("/", false), Err(Error::Timeout));
    assert!(client.channel().commands.is_empty());
    assert_eq!(client.control().request_state(), RequestState::Idle);
}

#[test]
fn sub_step_failure_aborts_and_releases_the_lock() {
    let mut channel = MockChannel::new();
    // URL set rejected by the firmware
    channel.queue_final(Err(Error::Device(601)));
    let mut client = client_with(channel);
    client.set_connection("http://example.com", 0).unwrap();

    assert_eq!(client.get("/", false), Err(Error::Device(601)));
    let channel = client.channel();
    assert_eq!(channel.commands.len(), 1, "sequence must stop at the failed step");
    assert!(!channel.locked, "lock must be released on the failure path");
    assert_eq!(client.control().request_state(), RequestState::Idle);
}

#[test]
fn device_error_in_trailer_surfaces_verbatim() {
    let mut channel = MockChannel::new();
    channel.queue_trailer("+QHTTPGET: ", "714");
    let mut client = client_with(channel);
    client.set_connection("http://example.com", 0).unwrap();

    assert_eq!(client.get("/", false), Err(Error::Device(714)));
    assert_eq!(client.control().request_state(), RequestState::Idle);
}

#[test]
fn unparsable_trailer_is_a_precondition_failure() {
    let mut channel = MockChannel::new();
    channel.queue_trailer("+QHTTPGET: ", "0");
    let mut client = client_with(channel);
    client.set_connection("http://example.com", 0).unwrap();

    assert_eq!(client.get("/", false), Err(Error::PreconditionFailed));
    assert_eq!(client.control().request_state(), RequestState::Idle);
}

#[test]
fn out_of_range_status_is_recorded_but_does_not_arm_the_read() {
    let mut channel = MockChannel::new();
    channel.queue_trailer("+QHTTPGET: ", "0,404,52");
    let mut client = client_with(channel);
    client.set_connection("http://example.com", 0).unwrap();

    assert_eq!(client.get("/missing", false), Ok(404));
    assert_eq!(client.control().http_status(), Some(404));
    assert_eq!(client.control().request_state(), RequestState::Idle);

    // the page read precondition now holds it back
    assert_eq!(client.read_page(), Err(Error::PreconditionFailed));
    assert_eq!(client.channel().consumer_installs, 0);
}

#[test]
fn read_page_outside_request_complete_touches_nothing() {
    let mut client = client_with(MockChannel::new());
    client.set_connection("http://example.com", 0).unwrap();

    assert_eq!(client.read_page(), Err(Error::PreconditionFailed));
    let channel = client.channel();
    assert!(channel.commands.is_empty());
    assert_eq!(channel.consumer_installs, 0);
    assert_eq!(channel.rx.data.len(), 0);
}

#[test]
fn read_page_on_a_busy_channel_is_a_conflict() {
    let mut channel = MockChannel::new();
    channel.queue_trailer("+QHTTPGET: ", "0,200,4");
    let mut client = client_with(channel);
    client.set_connection("http://example.com", 0).unwrap();
    client.get("/", false).unwrap();

    client.channel_mut().lock_available = false;
    assert_eq!(client.read_page(), Err(Error::Conflict));
    assert_eq!(client.channel().consumer_installs, 0);
}

#[test]
fn full_get_and_read_scenario_delivers_the_page() {
    let mut channel = MockChannel::new();
    channel.queue_trailer("+QHTTPGET: ", "0,200,120");

    let body: Vec<u8> = (0u8..120).collect();
    channel.queue_data_event(b"CONNECT\r\n");
    channel.queue_data_event(&body[..70]);
    channel.queue_data_event(&body[70..]);
    channel.queue_data_event(b"\r\nOK\r\n\r\n+QHTTPREAD: 0\r\n");

    let mut client = client_with(channel);
    client.set_connection("http://example.com", 0).unwrap();

    assert_eq!(client.get("/page", false), Ok(200));
    assert_eq!(client.read_page(), Ok(200));

    let recorder = client.receiver();
    assert_eq!(recorder.collected(), body);
    let (_, finals): (Vec<Vec<u8>>, Vec<bool>) = recorder.chunks.iter().cloned().unzip();
    assert_eq!(finals.iter().filter(|f| **f).count(), 1);
    assert!(*finals.last().unwrap());
    assert!(recorder.contexts.iter().all(|c| *c == 1));
    for (chunk, _) in &recorder.chunks {
        assert!(chunk.len() <= RX_CAPACITY / 4);
    }

    let channel = client.channel();
    assert_eq!(channel.commands.last().unwrap(), "AT+QHTTPREAD=60");
    assert!(channel.consumer.is_none(), "consumer must be uninstalled");
    assert_eq!(channel.consumer_installs, 1);
    assert!(!channel.locked);
    assert_eq!(client.control().page_remaining(), 0);
}

#[test]
fn read_stream_error_code_surfaces_and_uninstalls_the_consumer() {
    let mut channel = MockChannel::new();
    channel.queue_trailer("+QHTTPGET: ", "0,200,2");
    channel.queue_data_event(b"CONNECT\r\nab\r\nOK\r\n\r\n+QHTTPREAD: 552\r\n");
    let mut client = client_with(channel);
    client.set_connection("http://example.com", 0).unwrap();

    client.get("/", false).unwrap();
    assert_eq!(client.read_page(), Err(Error::Device(552)));

    let channel = client.channel();
    assert!(channel.consumer.is_none());
    assert!(!channel.locked);
}

#[test]
fn stalled_read_is_bounded_by_the_data_event_timeout() {
    let mut channel = MockChannel::new();
    channel.queue_trailer("+QHTTPGET: ", "0,200,64");
    channel.queue_data_event(b"CONNECT\r\npartial body without a marker");
    let mut client = client_with(channel);
    client.set_connection("http://example.com", 0).unwrap();

    client.get("/", false).unwrap();
    // the event queue runs dry, so the channel-level wait times out
    assert_eq!(client.read_page(), Err(Error::Timeout));
    assert!(client.channel().consumer.is_none());
    assert!(!client.channel().locked);
}

#[test]
fn read_page_to_file_issues_the_diverted_read() {
    let mut channel = MockChannel::new();
    channel.queue_trailer("+QHTTPGET: ", "0,200,4096");
    channel.queue_trailer("+QHTTPREADFILE: ", "0");
    let mut client = client_with(channel);
    client.set_connection("http://example.com", 0).unwrap();

    client.get("/big", false).unwrap();
    assert_eq!(client.read_page_to_file("page.bin"), Ok(200));
    assert_eq!(
        client.channel().commands.last().unwrap(),
        "AT+QHTTPREADFILE=\"page.bin\",20"
    );
}

#[test]
fn read_page_to_file_maps_firmware_errors() {
    let mut channel = MockChannel::new();
    channel.queue_trailer("+QHTTPGET: ", "0,200,4096");
    channel.queue_trailer("+QHTTPREADFILE: ", "705");
    let mut client = client_with(channel);
    client.set_connection("http://example.com", 0).unwrap();

    client.get("/big", false).unwrap();
    assert_eq!(client.read_page_to_file("page.bin"), Err(Error::Device(705)));
}

#[test]
#[should_panic(expected = "not supported")]
fn cancel_page_fails_loudly() {
    let mut client = client_with(MockChannel::new());
    let _ = client.cancel_page();
}
