/// Incremental bytes-to-lines decoder.
///
/// Network chunks may end anywhere: inside a multi-byte UTF-8 sequence, in
/// the middle of a line, or between the `\r` and `\n` of a line ending. The
/// decoder keeps whatever it could not yet resolve and only hands out
/// complete lines, so feeding a body in any partition of chunks yields the
/// same lines as feeding it whole.
#[derive(Debug, Default)]
pub struct LineDecoder {
    /// Trailing bytes of an incomplete UTF-8 sequence.
    carry: Vec<u8>,
    /// Decoded text not yet terminated by `\n`.
    partial: String,
    /// Prefix of `partial` already known to hold no `\n`.
    scanned: usize,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes `chunk` and returns every line it completed, without the line
    /// terminator.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.carry.extend_from_slice(chunk);
        self.decode_carry();

        let mut lines = Vec::new();
        while let Some(offset) = self.partial[self.scanned..].find('\n') {
            let pos = self.scanned + offset;
            let mut line: String = self.partial.drain(..=pos).collect();
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
            lines.push(line);
            self.scanned = 0;
        }
        self.scanned = self.partial.len();
        lines
    }

    /// Flushes the decoder at end of stream. Returns the last line if the
    /// body did not end with a newline.
    pub fn finish(&mut self) -> Option<String> {
        if !self.carry.is_empty() {
            self.carry.clear();
            self.partial.push(char::REPLACEMENT_CHARACTER);
        }
        self.scanned = 0;
        let mut rest = std::mem::take(&mut self.partial);
        if rest.ends_with('\r') {
            rest.pop();
        }
        (!rest.is_empty()).then_some(rest)
    }

    /// Bytes held back waiting for the rest of a UTF-8 sequence.
    pub fn pending_bytes(&self) -> usize {
        self.carry.len()
    }

    fn decode_carry(&mut self) {
        let bytes = std::mem::take(&mut self.carry);
        let mut rest = bytes.as_slice();
        loop {
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    self.partial.push_str(text);
                    return;
                }
                Err(e) => {
                    let (valid, tail) = rest.split_at(e.valid_up_to());
                    if let Ok(text) = std::str::from_utf8(valid) {
                        self.partial.push_str(text);
                    }
                    match e.error_len() {
                        Some(invalid) => {
                            self.partial.push(char::REPLACEMENT_CHARACTER);
                            rest = &tail[invalid..];
                        }
                        None => {
                            self.carry = tail.to_vec();
                            return;
                        }
                    }
                }
            }
        }
    }
}
