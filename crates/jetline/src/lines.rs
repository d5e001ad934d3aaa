use bytes::{Buf, Bytes, BytesMut};

/// Incremental splitter for newline-delimited stream bodies.
///
/// Chunks arrive with no alignment guarantee; a record may span several
/// chunks and a chunk may close several records. A trailing `\r` is stripped
/// so CRLF servers frame the same as LF servers. Blank lines are returned as
/// empty records; the caller decides whether to deliver them.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: BytesMut,
}

impl LineBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and collect every record it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Bytes> {
        self.buf.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let mut line = self.buf.split_to(pos);
            self.buf.advance(1);
            if line.last() == Some(&b'\r') {
                line.truncate(line.len() - 1);
            }
            lines.push(line.freeze());
        }
        lines
    }

    /// Take the trailing record not yet closed by a newline, if any.
    ///
    /// Called at end of stream so a final unterminated line is not lost.
    pub fn take_remainder(&mut self) -> Option<Bytes> {
        if self.buf.is_empty() {
            None
        } else {
            Some(self.buf.split().freeze())
        }
    }
}
