//! Stream decoding and output buffering
//!
//! Pipe reads arrive as arbitrary byte chunks. `StreamDecoder` turns them
//! into text without splitting UTF-8 sequences and, when line-buffered,
//! into complete lines stamped with the arrival time of their first byte.

use std::time::SystemTime;

#[derive(Debug)]
pub(crate) struct StreamDecoder {
    line_buffered: bool,
    /// Bytes of an incomplete UTF-8 sequence
    pending: Vec<u8>,
    pending_at: Option<SystemTime>,
    /// Text of an incomplete line
    fragment: String,
    fragment_at: Option<SystemTime>,
}

impl StreamDecoder {
    pub(crate) fn new(line_buffered: bool) -> Self {
        StreamDecoder {
            line_buffered,
            pending: Vec::new(),
            pending_at: None,
            fragment: String::new(),
            fragment_at: None,
        }
    }

    /// Feed a chunk; returns the pieces ready for dispatch
    pub(crate) fn push(&mut self, bytes: &[u8], at: SystemTime) -> Vec<(String, SystemTime)> {
        // decoded text starts with the oldest pending byte
        let first_at = match self.pending_at {
            Some(pending_at) if !self.pending.is_empty() => pending_at,
            _ => at,
        };
        self.pending.extend_from_slice(bytes);
        let text = self.decode();
        self.pending_at = match (self.pending.is_empty(), text.is_empty()) {
            (true, _) => None,
            (false, true) => Some(first_at),
            (false, false) => Some(at),
        };
        if text.is_empty() {
            return Vec::new();
        }
        if !self.line_buffered {
            return vec![(text, first_at)];
        }

        let mut lines = Vec::new();
        let mut rest = text.as_str();
        let mut piece_at = first_at;
        while let Some(pos) = rest.find('\n') {
            let started = self.fragment_at.take().unwrap_or(piece_at);
            let mut line = std::mem::take(&mut self.fragment);
            line.push_str(&rest[..pos]);
            lines.push((line, started));
            rest = &rest[pos + 1..];
            piece_at = at;
        }
        if !rest.is_empty() {
            if self.fragment.is_empty() {
                self.fragment_at = Some(piece_at);
            }
            self.fragment.push_str(rest);
        }
        lines
    }

    /// Flush whatever is left at end of stream
    pub(crate) fn finish(&mut self, at: SystemTime) -> Option<(String, SystemTime)> {
        if !self.pending.is_empty() {
            let tail = String::from_utf8_lossy(&self.pending).into_owned();
            self.pending.clear();
            let pending_at = self.pending_at.take().unwrap_or(at);
            if self.fragment.is_empty() {
                self.fragment_at = Some(pending_at);
            }
            self.fragment.push_str(&tail);
        }
        if self.fragment.is_empty() {
            return None;
        }
        let started = self.fragment_at.take().unwrap_or(at);
        Some((std::mem::take(&mut self.fragment), started))
    }

    fn decode(&mut self) -> String {
        let mut out = String::new();
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(s) => {
                    out.push_str(s);
                    self.pending.clear();
                    return out;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    // SAFETY: from_utf8 validated the first `valid` bytes.
                    out.push_str(unsafe { std::str::from_utf8_unchecked(&self.pending[..valid]) });
                    match e.error_len() {
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + bad);
                        }
                        None => {
                            self.pending.drain(..valid);
                            return out;
                        }
                    }
                }
            }
        }
    }
}

/// Output accumulated for a stream that has no handler
#[derive(Debug, Default)]
pub(crate) struct OutputBuffer {
    text: String,
}

impl OutputBuffer {
    pub(crate) fn append(&mut self, piece: &str) {
        self.text.push_str(piece);
    }

    /// Final text after the blank-line and trim policies
    pub(crate) fn finish(self, skip_blank_lines: bool, trim: bool) -> String {
        let mut text = self.text;
        if skip_blank_lines {
            let trailing_newline = text.ends_with('\n');
            let kept: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
            let mut joined = kept.join("\n");
            if trailing_newline && !joined.is_empty() {
                joined.push('\n');
            }
            text = joined;
        }
        if trim {
            text = text.trim().to_string();
        }
        text
    }
}
