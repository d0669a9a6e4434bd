//! Incremental byte-stream → line splitter.
//!
//! Decoders redraw progress with bare carriage returns, so `\r`, `\n` and
//! `\r\n` all end a line. A `\r\n` pair split across two chunks still counts
//! as one boundary. Bytes are decoded as UTF-8, lossily.
//!
//! A line longer than [`MAX_LINE_BYTES`] is emitted in pieces of that size.

/// Longest pending line kept before it is flushed unterminated.
pub const MAX_LINE_BYTES: usize = 64 * 1024; // 64 KiB

#[derive(Debug, Default)]
pub struct LineSplitter {
    buf: Vec<u8>,
    /// Last byte seen was `\r`; a following `\n` belongs to the same break.
    pending_cr: bool,
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk, returning every line it completes (terminators
    /// removed). Incomplete trailing data is kept for the next call, up to
    /// [`MAX_LINE_BYTES`].
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for &b in chunk {
            if std::mem::take(&mut self.pending_cr) && b == b'\n' {
                continue;
            }
            match b {
                b'\n' => lines.push(self.take_line()),
                b'\r' => {
                    lines.push(self.take_line());
                    self.pending_cr = true;
                }
                _ => {
                    self.buf.push(b);
                    if self.buf.len() >= MAX_LINE_BYTES {
                        lines.push(self.take_line());
                    }
                }
            }
        }
        lines
    }

    /// Flush the unterminated tail at end of stream, if any.
    pub fn finish(&mut self) -> Option<String> {
        self.pending_cr = false;
        if self.buf.is_empty() {
            return None;
        }
        Some(self.take_line())
    }

    fn take_line(&mut self) -> String {
        let line = String::from_utf8_lossy(&self.buf).into_owned();
        self.buf.clear();
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_newline() {
        let mut s = LineSplitter::new();
        assert_eq!(s.push(b"a\nb\n"), vec!["a", "b"]);
        assert_eq!(s.finish(), None);
    }

    #[test]
    fn keeps_partial_line_between_chunks() {
        let mut s = LineSplitter::new();
        assert!(s.push(b"File Fr").is_empty());
        assert_eq!(s.push(b"ame 3: VHS\nne"), vec!["File Frame 3: VHS"]);
        assert_eq!(s.finish().as_deref(), Some("ne"));
    }

    #[test]
    fn carriage_return_ends_a_line() {
        let mut s = LineSplitter::new();
        assert_eq!(s.push(b"10%\r20%\r"), vec!["10%", "20%"]);
    }

    #[test]
    fn crlf_is_one_boundary() {
        let mut s = LineSplitter::new();
        assert_eq!(s.push(b"a\r\nb\r\n"), vec!["a", "b"]);
    }

    #[test]
    fn crlf_split_across_chunks() {
        let mut s = LineSplitter::new();
        assert_eq!(s.push(b"a\r"), vec!["a"]);
        assert_eq!(s.push(b"\nb\n"), vec!["b"]);
    }

    #[test]
    fn blank_lines_are_preserved() {
        let mut s = LineSplitter::new();
        assert_eq!(s.push(b"\n\nx\n"), vec!["", "", "x"]);
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let mut s = LineSplitter::new();
        assert_eq!(s.push(b"ok \xff\n"), vec!["ok \u{fffd}"]);
    }

    #[test]
    fn unterminated_output_is_flushed_at_cap() {
        let mut s = LineSplitter::new();
        let chunk = vec![b'x'; 1000];
        let mut lines = Vec::new();
        for _ in 0..150 {
            lines.extend(s.push(&chunk));
        }
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(|l| l.len() == MAX_LINE_BYTES));
        assert_eq!(
            s.finish().map(|tail| tail.len()),
            Some(150_000 - 2 * MAX_LINE_BYTES)
        );
    }

    #[test]
    fn long_line_continues_after_cap() {
        let mut s = LineSplitter::new();
        let mut chunk = vec![b'y'; MAX_LINE_BYTES];
        chunk.extend_from_slice(b"z\n");
        let lines = s.push(&chunk);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], "z");
    }

    #[test]
    fn escapes_pass_through() {
        let mut s = LineSplitter::new();
        assert_eq!(s.push(b"\x1b[32mOK\x1b[0m\n"), vec!["\x1b[32mOK\x1b[0m"]);
    }
}
