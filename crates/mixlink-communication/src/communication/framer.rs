//! Inbound line framing
//!
//! The MASTER writes `\n`-terminated text. Bytes arrive in arbitrary chunks,
//! so the buffer keeps the unterminated tail between reads. Lines are split on
//! the raw byte `\n` before decoding, which keeps multi-byte UTF-8 sequences
//! intact even when a chunk boundary falls inside one.

/// Maximum bytes taken from the transport per read
pub const READ_CHUNK_SIZE: usize = 1024;

const TERMINATOR: u8 = b'\n';

/// Whitespace and control characters stripped from both ends of a line
fn is_padding(c: char) -> bool {
    c <= ' '
}

/// Bytes received but not yet framed into lines
///
/// `consumed` marks the start of the unframed tail; everything before it has
/// already been handed out and is dropped when framing completes. After
/// [`InboundBuffer::push`] returns, the pending bytes contain no terminator.
#[derive(Debug, Default, Clone)]
pub struct InboundBuffer {
    bytes: Vec<u8>,
    consumed: usize,
}

impl InboundBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every completed, non-empty line in order
    ///
    /// Lines are decoded as UTF-8 (invalid sequences replaced) and trimmed of
    /// spaces and control characters, so reset noise such as a lone NUL is
    /// dropped.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.bytes.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(line) = self.next_line() {
            if !line.is_empty() {
                lines.push(line);
            }
        }
        self.compact();
        lines
    }

    /// Take the next terminated line, trimmed, advancing the cursor
    fn next_line(&mut self) -> Option<String> {
        let tail = &self.bytes[self.consumed..];
        let offset = tail.iter().position(|&b| b == TERMINATOR)?;
        let line = String::from_utf8_lossy(&tail[..offset])
            .trim_matches(is_padding)
            .to_string();
        self.consumed += offset + 1;
        Some(line)
    }

    fn compact(&mut self) {
        if self.consumed > 0 {
            self.bytes.drain(..self.consumed);
            self.consumed = 0;
        }
    }

    /// The unterminated tail
    pub fn pending(&self) -> &[u8] {
        &self.bytes[self.consumed..]
    }

    /// Number of pending bytes
    pub fn len(&self) -> usize {
        self.bytes.len() - self.consumed
    }

    /// Whether no bytes are pending
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop everything pending
    pub fn clear(&mut self) {
        self.bytes.clear();
        self.consumed = 0;
    }
}
