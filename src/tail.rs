//! Live tail of a growing file, delivered as server-sent events.
//!
//! There is no file-change notification here. The session polls its own
//! read handle: straight away while data keeps coming, then slower the longer
//! the file stays quiet. A comment line goes out when nothing has been sent
//! for [`KEEP_ALIVE_INTERVAL`] so idle proxies don't drop the connection.
//!
//! A session ends only when a write to the client fails or the watched file
//! can no longer be read.

use std::io::{self, Read, Write};
use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::TailError;
use crate::event::{KEEP_ALIVE, PREFORMATTED_OPEN, UpdateEvent};
use crate::mime::Mime;

/// Silence on the wire after which a keep-alive line is sent.
pub const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// Delay before the next poll, given how long the file has been quiet.
///
/// | idle | delay |
/// |---|---|
/// | < 5s | 500ms |
/// | 5s..30s | 1s |
/// | >= 30s | 2s |
pub fn poll_delay(idle: Duration) -> Duration {
    if idle < Duration::from_secs(5) {
        Duration::from_millis(500)
    } else if idle < Duration::from_secs(30) {
        Duration::from_secs(1)
    } else {
        Duration::from_secs(2)
    }
}

/// Reads whatever has been appended to a source since the previous call.
///
/// The read offset only moves forward. Bytes of a UTF-8 character cut off
/// at the end of a read are held back until the rest of it arrives, so every
/// byte shows up in exactly one returned chunk.
#[derive(Debug)]
pub struct TailReader<R> {
    source: R,
    /// Start of an incomplete UTF-8 sequence from the last read.
    carry: Vec<u8>,
}

impl<R: Read> TailReader<R> {
    pub fn new(source: R) -> Self {
        Self {
            source,
            carry: Vec::new(),
        }
    }

    /// Returns an empty string when nothing new is available. Never waits
    /// for data.
    pub fn read_available(&mut self) -> io::Result<String> {
        let mut bytes = std::mem::take(&mut self.carry);
        let carried = bytes.len();

        if let Err(e) = self.source.read_to_end(&mut bytes) {
            self.carry = bytes;
            return Err(e);
        }

        if bytes.len() == carried {
            self.carry = bytes;
            return Ok(String::new());
        }

        let (text, rest) = decode_utf8(&bytes);
        self.carry = rest;
        Ok(text)
    }
}

/// Splits `bytes` into decoded text and a trailing incomplete sequence.
/// Invalid bytes in the middle become U+FFFD.
fn decode_utf8(bytes: &[u8]) -> (String, Vec<u8>) {
    let mut text = String::with_capacity(bytes.len());
    let mut input = bytes;

    loop {
        match std::str::from_utf8(input) {
            Ok(valid) => {
                text.push_str(valid);
                return (text, Vec::new());
            }
            Err(e) => {
                let (valid, after) = input.split_at(e.valid_up_to());
                text.push_str(&String::from_utf8_lossy(valid));
                match e.error_len() {
                    Some(len) => {
                        text.push(char::REPLACEMENT_CHARACTER);
                        input = &after[len..];
                    }
                    None => return (text, after.to_vec()),
                }
            }
        }
    }
}

/// When data was last read and when anything was last sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTiming {
    last_read: Instant,
    last_send: Instant,
}

impl SessionTiming {
    pub fn new(now: Instant) -> Self {
        Self {
            last_read: now,
            last_send: now,
        }
    }

    /// How long the file has been quiet.
    pub fn idle(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_read)
    }

    pub fn keep_alive_due(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_send) > KEEP_ALIVE_INTERVAL
    }
}

/// What the caller should do after a poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Data was sent; poll again right away.
    Continue,
    /// Nothing new; wait this long before the next poll.
    Sleep(Duration),
}

/// One client watching one file.
#[derive(Debug)]
pub struct TailSession<R, W> {
    reader: TailReader<R>,
    sink: W,
    mime: Mime,
    timing: SessionTiming,
    bytes_sent: u64,
}

impl<R: Read, W: Write> TailSession<R, W> {
    /// Starts a session at offset 0 of `source`. Non-HTML content is opened
    /// with a `<pre>` event first.
    pub fn start(source: R, sink: W, mime: Mime, now: Instant) -> Result<Self, TailError> {
        let mut session = Self {
            reader: TailReader::new(source),
            sink,
            mime,
            timing: SessionTiming::new(now),
            bytes_sent: 0,
        };

        if !mime.is_html() {
            let bootstrap = UpdateEvent::markup(PREFORMATTED_OPEN);
            session.send(bootstrap.to_wire().as_bytes(), now)?;
        }

        Ok(session)
    }

    /// One round of the tail loop.
    pub fn poll_once(&mut self, now: Instant) -> Result<Step, TailError> {
        let text = self.reader.read_available().map_err(TailError::Read)?;

        if !text.is_empty() {
            self.timing.last_read = now;
            let event = if self.mime.is_html() {
                UpdateEvent::markup(text)
            } else {
                UpdateEvent::text(&text)
            };
            debug!(chars = event.payload().len(), "sending update");
            self.send(event.to_wire().as_bytes(), now)?;
            return Ok(Step::Continue);
        }

        if self.timing.keep_alive_due(now) {
            debug!("sending keep alive");
            self.send(KEEP_ALIVE, now)?;
        }

        Ok(Step::Sleep(poll_delay(self.timing.idle(now))))
    }

    /// Polls until the client goes away or the file can't be read. Only
    /// returns with an error.
    pub fn run(&mut self) -> Result<(), TailError> {
        loop {
            match self.poll_once(Instant::now())? {
                Step::Continue => {}
                Step::Sleep(delay) => thread::sleep(delay),
            }
        }
    }

    /// Bytes written to the client so far.
    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    fn send(&mut self, bytes: &[u8], now: Instant) -> Result<(), TailError> {
        self.sink
            .write_all(bytes)
            .and_then(|()| self.sink.flush())
            .map_err(TailError::Disconnected)?;
        self.bytes_sent += bytes.len() as u64;
        self.timing.last_send = now;
        Ok(())
    }
}
