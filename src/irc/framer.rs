//! Line framing.
//!
//! [`LineFramer`] turns a character stream into complete lines, carrying a
//! partial line across reads. [`LineCodec`] wraps it as a tokio-util codec for
//! the transport driver.
//!
//! A line ends at CR, LF or CRLF. A CR that closes one read and an LF that
//! opens the next count as a single terminator. An unterminated fragment is
//! never returned, not even at end of stream.

use std::collections::VecDeque;

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Default cap on buffered, unterminated input (bytes).
pub const DEFAULT_MAX_LINE: usize = 8192;

#[derive(Debug, Default)]
pub struct LineFramer {
    pending: String,
    ready: VecDeque<String>,
    /// The previous chunk ended on CR, so a leading LF is part of that terminator.
    skip_lf: bool,
}

impl LineFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next chunk of characters.
    pub fn push(&mut self, chunk: &str) {
        if chunk.is_empty() {
            return;
        }
        let mut chars = chunk.chars().peekable();
        if std::mem::take(&mut self.skip_lf) && chars.peek() == Some(&'\n') {
            chars.next();
        }

        while let Some(c) = chars.next() {
            match c {
                '\r' => {
                    if chars.peek() == Some(&'\n') {
                        chars.next();
                    } else if chars.peek().is_none() {
                        self.skip_lf = true;
                    }
                    self.finish_line();
                }
                '\n' => self.finish_line(),
                _ => self.pending.push(c),
            }
        }
    }

    /// Next complete line, without its terminator. `None` means no line is
    /// available yet; any partial input stays buffered.
    pub fn next_line(&mut self) -> Option<String> {
        self.ready.pop_front()
    }

    /// Drain every complete line currently buffered.
    pub fn lines(&mut self) -> impl Iterator<Item = String> + '_ {
        std::iter::from_fn(move || self.next_line())
    }

    /// Length of the buffered, unterminated fragment.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Drop the unterminated fragment.
    pub fn discard_pending(&mut self) {
        self.pending.clear();
    }

    fn finish_line(&mut self) {
        // Mixed terminators (e.g. "\n\r") produce empty lines; they carry nothing.
        if !self.pending.is_empty() {
            self.ready.push_back(std::mem::take(&mut self.pending));
        }
    }
}

/// tokio-util codec over [`LineFramer`]. Decodes lossy UTF-8; encodes `line\r\n`.
#[derive(Debug)]
pub struct LineCodec {
    framer: LineFramer,
    max_len: usize,
    /// An over-long line was cut; drop input up to its terminator.
    discarding: bool,
}

impl LineCodec {
    pub fn new() -> Self {
        Self::with_max_len(DEFAULT_MAX_LINE)
    }

    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            framer: LineFramer::new(),
            max_len,
            discarding: false,
        }
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = std::io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>, Self::Error> {
        if let Some(line) = self.framer.next_line() {
            return Ok(Some(line));
        }

        if self.discarding {
            match src.iter().position(|b| *b == b'\r' || *b == b'\n') {
                Some(end) => {
                    src.advance(end + 1);
                    self.discarding = false;
                }
                None => {
                    src.clear();
                    return Ok(None);
                }
            }
        }

        // Terminators are ASCII, so splitting just past the last one never
        // cuts a UTF-8 sequence in half.
        match src.iter().rposition(|b| *b == b'\r' || *b == b'\n') {
            Some(last) => {
                let chunk = src.split_to(last + 1);
                self.framer.push(&String::from_utf8_lossy(&chunk));
            }
            None if src.len() > self.max_len => {
                tracing::warn!(
                    buffered = src.len(),
                    limit = self.max_len,
                    "discarding unterminated input over the line limit"
                );
                src.advance(src.len());
                self.framer.discard_pending();
                self.discarding = true;
            }
            None => {}
        }

        Ok(self.framer.next_line())
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<String>, Self::Error> {
        let line = self.decode(src)?;
        if line.is_none() && !src.is_empty() {
            tracing::debug!(bytes = src.len(), "dropping unterminated fragment at end of stream");
            src.clear();
        }
        Ok(line)
    }
}

impl Encoder<String> for LineCodec {
    type Error = std::io::Error;

    fn encode(&mut self, line: String, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(line.len() + 2);
        dst.put_slice(line.as_bytes());
        dst.put_slice(b"\r\n");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_lines_mixed_terminators() {
        let mut framer = LineFramer::new();
        framer.push("PING :x\r\nPONG :y\n");
        let lines: Vec<_> = framer.lines().collect();
        assert_eq!(lines, vec!["PING :x", "PONG :y"]);
    }

    #[test]
    fn test_trailing_fragment_never_returned() {
        let mut framer = LineFramer::new();
        framer.push("PING :x\r\nPRIVMSG #c :partial");
        assert_eq!(framer.next_line().as_deref(), Some("PING :x"));
        assert_eq!(framer.next_line(), None);
        assert_eq!(framer.pending_len(), "PRIVMSG #c :partial".len());

        framer.push(" text\r\n");
        assert_eq!(framer.next_line().as_deref(), Some("PRIVMSG #c :partial text"));
    }

    #[test]
    fn test_bare_cr_terminates() {
        let mut framer = LineFramer::new();
        framer.push("A\rB\rC");
        let lines: Vec<_> = framer.lines().collect();
        assert_eq!(lines, vec!["A", "B"]);
    }

    #[test]
    fn test_crlf_split_across_reads() {
        let mut framer = LineFramer::new();
        framer.push("ONE\r");
        framer.push("\nTWO\n");
        let lines: Vec<_> = framer.lines().collect();
        assert_eq!(lines, vec!["ONE", "TWO"]);
    }

    #[test]
    fn test_empty_lines_skipped() {
        let mut framer = LineFramer::new();
        framer.push("\n\r\nA\n\r\n\nB\r\n");
        let lines: Vec<_> = framer.lines().collect();
        assert_eq!(lines, vec!["A", "B"]);
    }

    #[test]
    fn test_codec_decodes_and_holds_partial() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from(&b"PING :x\r\nPONG :y\nNICK fo"[..]);
        assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("PING :x"));
        assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("PONG :y"));
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        assert_eq!(&buf[..], b"NICK fo");

        buf.extend_from_slice(b"o\r\n");
        assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("NICK foo"));
    }

    #[test]
    fn test_codec_eof_drops_fragment() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from(&b"unterminated"[..]);
        assert_eq!(codec.decode_eof(&mut buf).unwrap(), None);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_codec_discards_runaway_input() {
        let mut codec = LineCodec::with_max_len(8);
        let mut buf = BytesMut::from(&b"0123456789abcdef"[..]);
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_codec_drops_tail_of_cut_line() {
        let mut codec = LineCodec::with_max_len(8);
        let mut buf = BytesMut::from(&b"0123456789"[..]);
        assert_eq!(codec.decode(&mut buf).unwrap(), None);

        buf.extend_from_slice(b"still the same line");
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        assert!(buf.is_empty());

        buf.extend_from_slice(b" PRIVMSG #x :evil\r\nPING :ok\r\n");
        assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("PING :ok"));
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
    }

    #[test]
    fn test_codec_encodes_crlf() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::new();
        codec.encode("JOIN #rust".to_string(), &mut buf).unwrap();
        assert_eq!(&buf[..], b"JOIN #rust\r\n");
    }
}
