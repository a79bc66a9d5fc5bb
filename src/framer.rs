//! Line framing for the inbound byte stream.

/// Accumulates bytes until a line feed and yields the trimmed line.
///
/// There is no length limit; a sender that never terminates its line grows
/// the buffer indefinitely.
#[derive(Debug, Default)]
pub struct LineFramer {
    buffer: Vec<u8>,
}

impl LineFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consumes one byte. Returns the completed line when `byte` is a line
    /// feed and the line is not blank.
    pub fn push(&mut self, byte: u8) -> Option<String> {
        self.buffer.push(byte);
        if byte != b'\n' {
            return None;
        }

        let raw = std::mem::take(&mut self.buffer);
        let line = String::from_utf8_lossy(&raw);
        let line = line.trim_end_matches(&['\r', '\n'][..]).trim();
        if line.is_empty() {
            None
        } else {
            Some(line.to_string())
        }
    }

    /// Bytes received since the last line feed.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(framer: &mut LineFramer, bytes: &[u8]) -> Vec<String> {
        bytes.iter().filter_map(|&b| framer.push(b)).collect()
    }

    #[test]
    fn strips_terminators_and_whitespace() {
        let mut framer = LineFramer::new();
        assert_eq!(feed(&mut framer, b"  *IDN?  \r\n"), vec!["*IDN?".to_string()]);
        assert_eq!(framer.pending(), 0);
    }

    #[test]
    fn split_delivery_matches_single_chunk() {
        let input = b":CONF:CURR\r\n:READ?\r\n";
        let mut whole = LineFramer::new();
        let expected = feed(&mut whole, input);

        let mut split = LineFramer::new();
        let mut got = Vec::new();
        for chunk in input.chunks(3) {
            got.extend(feed(&mut split, chunk));
        }
        assert_eq!(got, expected);
        assert_eq!(expected, vec![":CONF:CURR".to_string(), ":READ?".to_string()]);
    }

    #[test]
    fn blank_lines_are_dropped() {
        let mut framer = LineFramer::new();
        assert!(feed(&mut framer, b"\r\n\n   \r\n").is_empty());
        assert_eq!(framer.pending(), 0);
    }

    #[test]
    fn bare_line_feed_terminates() {
        let mut framer = LineFramer::new();
        assert_eq!(feed(&mut framer, b":OUTP 1\n"), vec![":OUTP 1".to_string()]);
    }

    #[test]
    fn partial_line_is_held() {
        let mut framer = LineFramer::new();
        assert!(feed(&mut framer, b":SOUR:VO").is_empty());
        assert_eq!(framer.pending(), 8);
        assert_eq!(feed(&mut framer, b"LT 1\r\n"), vec![":SOUR:VOLT 1".to_string()]);
    }
}
