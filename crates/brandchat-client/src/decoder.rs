//! Incremental line splitter for chunked response bodies.
//!
//! Chunks are buffered as raw bytes and cut on `\n`. The newline byte cannot
//! appear inside a multi-byte UTF-8 sequence, so a code point split across two
//! chunks stays in the buffer until its line is complete and is decoded whole.

/// Buffers byte chunks and yields complete, decoded lines.
#[derive(Debug, Default)]
pub struct LineDecoder {
    buf: Vec<u8>,
}

impl LineDecoder {
    /// Appends a chunk and returns every line it completes, in order.
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Vec<String> {
        let scan_from = self.buf.len();
        self.buf.extend_from_slice(chunk);
        let mut lines = Vec::new();
        let mut start = 0;
        let mut search_from = scan_from;
        while let Some(offset) = self.buf[search_from..].iter().position(|b| *b == b'\n') {
            let end = search_from + offset;
            lines.push(decode_line(&self.buf[start..end]));
            start = end + 1;
            search_from = start;
        }
        self.buf.drain(..start);
        lines
    }

    /// Flushes the unterminated remainder at end of stream.
    pub fn finish(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            return None;
        }
        let line = decode_line(&self.buf);
        self.buf.clear();
        Some(line)
    }

    #[cfg(test)]
    fn pending_len(&self) -> usize {
        self.buf.len()
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_multiple_lines_in_one_chunk() {
        let mut decoder = LineDecoder::default();
        let lines = decoder.push_chunk(b"a\nb\n\nc");
        assert_eq!(lines, vec!["a", "b", ""]);
        assert_eq!(decoder.pending_len(), 1);
        assert_eq!(decoder.finish().as_deref(), Some("c"));
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn joins_a_line_spread_over_chunks() {
        let mut decoder = LineDecoder::default();
        assert!(decoder.push_chunk(b"da").is_empty());
        assert!(decoder.push_chunk(b"ta: {\"conten").is_empty());
        let lines = decoder.push_chunk(b"t\":\"Hi\"}\n");
        assert_eq!(lines, vec!["data: {\"content\":\"Hi\"}"]);
        assert_eq!(decoder.pending_len(), 0);
    }

    #[test]
    fn completes_code_points_split_between_chunks() {
        let text = "data: canción ñ\n";
        let bytes = text.as_bytes();
        let split = text.find('ó').expect("accented char") + 1;
        let mut decoder = LineDecoder::default();
        assert!(decoder.push_chunk(&bytes[..split]).is_empty());
        let lines = decoder.push_chunk(&bytes[split..]);
        assert_eq!(lines, vec!["data: canción ñ"]);
    }

    #[test]
    fn strips_carriage_returns() {
        let mut decoder = LineDecoder::default();
        let lines = decoder.push_chunk(b"data: x\r\n");
        assert_eq!(lines, vec!["data: x"]);
    }

    #[test]
    fn invalid_utf8_is_replaced_not_dropped() {
        let mut decoder = LineDecoder::default();
        let lines = decoder.push_chunk(b"a\xffb\n");
        assert_eq!(lines, vec!["a\u{fffd}b"]);
    }
}
