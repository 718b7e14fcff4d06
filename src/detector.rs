//! Incremental prompt detection over the wizard's stdout.
//!
//! Raw bytes arrive in arbitrary chunks. They are decoded, split on `\n`,
//! and every complete line is surfaced as passive output. The unterminated
//! remainder (the carry) is tested against the prompt markers after each
//! chunk; a match means the tool is now blocked waiting for a line of input.
//!
//! ```text
//! read chunk ─► decode ─► split lines ─► emit passive lines
//!                                   └──► carry has marker? ─► return prompt
//! zero-byte read ─► return whatever carry is left (end of stream)
//! ```

use std::io;
use std::sync::mpsc;

use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, trace};

use crate::driver::DriverEvent;
use crate::prompt::{DetectedPrompt, PromptMarkers};

/// Bytes requested per read.
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// Decoded-text accumulator with a carry for the last incomplete line.
#[derive(Debug, Default)]
pub struct OutputBuffer {
    /// Trailing bytes of a UTF-8 sequence split across reads.
    undecoded: Vec<u8>,
    carry: String,
}

impl OutputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return the lines it completed, in arrival order,
    /// without their terminators.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let text = self.decode(chunk);
        self.carry.push_str(&text);

        let mut lines = Vec::new();
        while let Some(pos) = self.carry.find('\n') {
            let mut line: String = self.carry.drain(..=pos).collect();
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
            lines.push(line);
        }
        lines
    }

    /// The current unterminated remainder.
    pub fn carry(&self) -> &str {
        &self.carry
    }

    pub fn take_carry(&mut self) -> String {
        std::mem::take(&mut self.carry)
    }

    /// Flush a dangling partial UTF-8 sequence into the carry. Called once
    /// the stream has ended and no continuation bytes can follow.
    pub fn finish(&mut self) {
        if !self.undecoded.is_empty() {
            let tail = std::mem::take(&mut self.undecoded);
            self.carry.push_str(&String::from_utf8_lossy(&tail));
        }
    }

    fn decode(&mut self, chunk: &[u8]) -> String {
        let mut bytes = std::mem::take(&mut self.undecoded);
        bytes.extend_from_slice(chunk);

        let mut out = String::with_capacity(bytes.len());
        let mut rest: &[u8] = &bytes;
        loop {
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    out.push_str(text);
                    rest = &[];
                    break;
                }
                Err(err) => {
                    let (valid, after) = rest.split_at(err.valid_up_to());
                    out.push_str(&String::from_utf8_lossy(valid));
                    match err.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[len..];
                        }
                        None => {
                            // Incomplete sequence at the end; wait for more bytes.
                            rest = after;
                            break;
                        }
                    }
                }
            }
        }
        self.undecoded = rest.to_vec();
        out
    }
}

/// Reads the wizard's output and surfaces one prompt at a time.
pub struct PromptDetector<R> {
    reader: R,
    buffer: OutputBuffer,
    markers: PromptMarkers,
    chunk: Vec<u8>,
    eof: bool,
    event_tx: Option<mpsc::Sender<DriverEvent>>,
}

impl<R: AsyncRead + Unpin> PromptDetector<R> {
    pub fn new(
        reader: R,
        markers: PromptMarkers,
        chunk_size: usize,
        event_tx: Option<mpsc::Sender<DriverEvent>>,
    ) -> Self {
        Self {
            reader,
            buffer: OutputBuffer::new(),
            markers,
            chunk: vec![0; chunk_size.max(1)],
            eof: false,
            event_tx,
        }
    }

    /// Has the output stream been observed to close?
    pub fn at_eof(&self) -> bool {
        self.eof
    }

    /// Suspend until the tool prints a prompt or closes its output.
    ///
    /// Complete lines seen on the way are emitted as passive output. At end
    /// of stream the leftover carry (possibly empty) is returned with
    /// `at_eof` set; once the stream has ended every later call returns an
    /// empty end-of-stream prompt immediately.
    pub async fn read_next_prompt(&mut self) -> io::Result<DetectedPrompt> {
        if self.eof {
            return Ok(DetectedPrompt::end_of_stream(self.buffer.take_carry()));
        }

        loop {
            let n = self.reader.read(&mut self.chunk).await?;
            if n == 0 {
                self.eof = true;
                self.buffer.finish();
                let rest = self.buffer.take_carry();
                debug!(remaining = rest.len(), "wizard output closed");
                if !rest.is_empty() {
                    self.emit(DriverEvent::Output(rest.clone()));
                }
                return Ok(DetectedPrompt::end_of_stream(rest));
            }
            trace!(bytes = n, "read wizard output");

            for line in self.buffer.push(&self.chunk[..n]) {
                debug!(line = %line, "wizard output");
                self.emit(DriverEvent::Output(line));
            }

            if self.markers.matches(self.buffer.carry()) {
                let text = self.buffer.take_carry();
                debug!(prompt = %text, "prompt detected");
                self.emit(DriverEvent::PromptDetected(text.clone()));
                return Ok(DetectedPrompt::question(text));
            }
        }
    }

    /// Consume output until the stream closes, emitting it as passive lines.
    /// Any trailing fragment, marker or not, is emitted as output too.
    pub async fn drain(&mut self) -> io::Result<()> {
        while !self.eof {
            let prompt = self.read_next_prompt().await?;
            if !prompt.at_eof {
                debug!(prompt = %prompt.text, "unanswered prompt after final answer");
            }
        }
        Ok(())
    }

    fn emit(&self, event: DriverEvent) {
        if let Some(ref tx) = self.event_tx {
            let _ = tx.send(event);
        }
    }
}
