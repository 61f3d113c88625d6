//! Record framing over a chunked byte stream.

/// Stateful decoder that splits a byte stream into blank-line-delimited
/// records.
///
/// Chunks may end mid-record and mid-UTF-8-sequence; an incomplete trailing
/// multi-byte sequence is carried into the next `push`. Invalid bytes are
/// replaced rather than aborting the stream. CRLF line endings are
/// normalized to LF before framing, so `\r\n\r\n` separators frame records
/// the same as `\n\n`.
#[derive(Debug, Default)]
pub struct RecordDecoder {
    /// Incomplete trailing UTF-8 sequence from the previous chunk.
    carry: Vec<u8>,
    /// Decoded text not yet split into complete records.
    buffer: String,
    /// A `\r` at the end of the previous chunk, held back until we know
    /// whether a `\n` follows.
    pending_cr: bool,
}

impl RecordDecoder {
    /// Create an empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk of bytes, returning every record completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut bytes = std::mem::take(&mut self.carry);
        bytes.extend_from_slice(chunk);
        self.decode(&bytes);
        self.drain_records()
    }

    /// Consume the decoder at stream end.
    ///
    /// Returns a trailing partial record if one is buffered; the normal
    /// case is an explicit terminal event, so callers treat this as
    /// best-effort.
    pub fn finish(&mut self) -> Option<String> {
        if !self.carry.is_empty() {
            let tail = std::mem::take(&mut self.carry);
            let text = String::from_utf8_lossy(&tail).into_owned();
            self.append_normalized(&text);
        }
        if std::mem::take(&mut self.pending_cr) {
            self.buffer.push('\r');
        }
        let rest = std::mem::take(&mut self.buffer);
        let rest = rest.trim();
        if rest.is_empty() {
            None
        } else {
            Some(rest.to_string())
        }
    }

    fn decode(&mut self, mut bytes: &[u8]) {
        loop {
            match std::str::from_utf8(bytes) {
                Ok(text) => {
                    self.append_normalized(text);
                    return;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    let text = String::from_utf8_lossy(&bytes[..valid]).into_owned();
                    self.append_normalized(&text);
                    match e.error_len() {
                        // Incomplete trailing sequence: wait for more bytes.
                        None => {
                            self.carry = bytes[valid..].to_vec();
                            return;
                        }
                        // Genuinely invalid bytes: replace and keep going.
                        Some(len) => {
                            self.append_normalized("\u{FFFD}");
                            bytes = &bytes[valid + len..];
                        }
                    }
                }
            }
        }
    }

    /// Append decoded text with `\r\n` collapsed to `\n`, holding a trailing
    /// `\r` across chunk boundaries.
    fn append_normalized(&mut self, text: &str) {
        for c in text.chars() {
            if self.pending_cr {
                self.pending_cr = false;
                if c == '\n' {
                    self.buffer.push('\n');
                    continue;
                }
                // Lone carriage return, keep it as-is.
                self.buffer.push('\r');
            }
            if c == '\r' {
                self.pending_cr = true;
            } else {
                self.buffer.push(c);
            }
        }
    }

    fn drain_records(&mut self) -> Vec<String> {
        let mut records = Vec::new();
        while let Some(pos) = self.buffer.find("\n\n") {
            let record = self.buffer[..pos].to_string();
            self.buffer.drain(..pos + 2);
            if !record.trim().is_empty() {
                records.push(record);
            }
        }
        records
    }
}
