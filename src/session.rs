//! Byte-level protocol session: framer in front of the instrument.

use crate::error::SimResult;
use crate::framer::LineFramer;
use crate::hal::FrontEnd;
use crate::instrument::Instrument;
use log::debug;
use std::io::{self, Read, Write};

/// Terminator appended to every reply.
pub const REPLY_TERMINATOR: &str = "\r\n";

pub struct Session<F: FrontEnd> {
    framer: LineFramer,
    instrument: Instrument<F>,
}

impl<F: FrontEnd> Session<F> {
    pub fn new(instrument: Instrument<F>) -> Self {
        Self {
            framer: LineFramer::new(),
            instrument,
        }
    }

    pub fn instrument(&self) -> &Instrument<F> {
        &self.instrument
    }

    pub fn instrument_mut(&mut self) -> &mut Instrument<F> {
        &mut self.instrument
    }

    /// Feeds received bytes and returns the reply bytes they produced.
    ///
    /// Each completed line is dispatched, corrections included, before the
    /// next byte is consumed.
    pub fn receive(&mut self, bytes: &[u8]) -> Vec<u8> {
        let mut replies = Vec::new();
        for &byte in bytes {
            if let Some(line) = self.framer.push(byte) {
                if let Some(reply) = self.handle_line(&line) {
                    replies.extend_from_slice(reply.as_bytes());
                    replies.extend_from_slice(REPLY_TERMINATOR.as_bytes());
                }
            }
        }
        replies
    }

    /// Performs one read from `port`, dispatches the lines it completes and
    /// writes their replies back. A read timeout counts as no data.
    pub fn pump<P: Read + Write + ?Sized>(
        &mut self,
        port: &mut P,
        buf: &mut [u8],
    ) -> SimResult<Vec<u8>> {
        let bytes_read = match port.read(buf) {
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::TimedOut => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let replies = self.receive(&buf[..bytes_read]);
        if !replies.is_empty() {
            port.write_all(&replies)?;
        }
        Ok(replies)
    }

    /// Dispatches one framed line and returns its reply body.
    pub fn handle_line(&mut self, line: &str) -> Option<String> {
        match self.instrument.process_command(line) {
            Ok(reply) => reply,
            Err(e) => {
                debug!("Dropped '{}': {}", line, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BoardConfig, DEFAULT_IDN};
    use crate::error::SimError;
    use crate::sim::SimulatedBoard;
    use std::collections::VecDeque;

    /// In-memory port: queued reads, recorded writes, then a fixed error.
    struct MemoryPort {
        reads: VecDeque<Vec<u8>>,
        written: Vec<u8>,
        exhausted: io::ErrorKind,
    }

    impl MemoryPort {
        fn new(reads: &[&[u8]], exhausted: io::ErrorKind) -> Self {
            Self {
                reads: reads.iter().map(|r| r.to_vec()).collect(),
                written: Vec::new(),
                exhausted,
            }
        }
    }

    impl Read for MemoryPort {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.reads.pop_front() {
                Some(chunk) => {
                    let n = chunk.len().min(buf.len());
                    buf[..n].copy_from_slice(&chunk[..n]);
                    Ok(n)
                }
                None => Err(io::Error::from(self.exhausted)),
            }
        }
    }

    impl Write for MemoryPort {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn session() -> Session<SimulatedBoard> {
        let board = BoardConfig::default();
        Session::new(Instrument::new(
            SimulatedBoard::new(board, Some(1000.0)),
            board,
            DEFAULT_IDN,
        ))
    }

    #[test]
    fn replies_are_crlf_terminated() {
        let mut s = session();
        assert_eq!(s.receive(b":BOGUS?\r\n"), b"?\r\n".to_vec());
        assert_eq!(s.receive(b":CONF?\n"), b"\"VOLT\"\r\n".to_vec());
    }

    #[test]
    fn actions_produce_no_bytes() {
        let mut s = session();
        assert!(s.receive(b":BOGUS:COMMAND\r\n").is_empty());
        assert!(s.receive(b":SOUR:VOLT\r\n").is_empty());
        assert!(s.receive(b"\r\n\r\n").is_empty());
    }

    #[test]
    fn lines_run_in_arrival_order() {
        let mut s = session();
        let out = s.receive(b":CONF:CURR\r\n:CONF?\r\n:CONF:RES\r\n:CONF?\r\n");
        assert_eq!(out, b"\"CURR\"\r\n\"RES\"\r\n".to_vec());
    }

    #[test]
    fn chunked_delivery_gives_same_replies() {
        let input = b"*IDN?\r\n:CONF:CURR\r\n:CONF?\r\n";
        let whole = session().receive(input);
        let mut s = session();
        let mut chunked = Vec::new();
        for chunk in input.chunks(2) {
            chunked.extend(s.receive(chunk));
        }
        assert_eq!(chunked, whole);
        assert_eq!(whole, format!("{}\r\n\"CURR\"\r\n", DEFAULT_IDN).into_bytes());
    }

    #[test]
    fn pump_writes_replies_to_port() {
        let mut s = session();
        let chunks: [&[u8]; 2] = [b"*ID", b"N?\r\n:CONF:CURR\r\n:CONF?\r\n"];
        let mut port = MemoryPort::new(&chunks, io::ErrorKind::TimedOut);
        let mut buf = [0u8; 64];

        assert!(s.pump(&mut port, &mut buf).unwrap().is_empty());
        assert!(port.written.is_empty());
        let replies = s.pump(&mut port, &mut buf).unwrap();
        let expected = format!("{}\r\n\"CURR\"\r\n", DEFAULT_IDN).into_bytes();
        assert_eq!(replies, expected);
        assert_eq!(port.written, expected);
    }

    #[test]
    fn pump_treats_timeout_as_idle() {
        let mut s = session();
        let mut port = MemoryPort::new(&[], io::ErrorKind::TimedOut);
        let mut buf = [0u8; 16];
        assert!(s.pump(&mut port, &mut buf).unwrap().is_empty());
        assert!(port.written.is_empty());
    }

    #[test]
    fn pump_reports_port_failures() {
        let mut s = session();
        let mut port = MemoryPort::new(&[], io::ErrorKind::BrokenPipe);
        let mut buf = [0u8; 16];
        let err = s.pump(&mut port, &mut buf).unwrap_err();
        assert!(matches!(err, SimError::Io(ref e) if e.kind() == io::ErrorKind::BrokenPipe));
    }

    #[test]
    fn typed_line_matches_direct_dispatch() {
        let mut framed = session();
        let mut direct = session();
        for line in [":CONF:CURR", ":SOUR:VOLT", "  :CONF?  ", "*IDN?", ":BOGUS?"] {
            let via_framer = framed.receive(format!("{}\r\n", line).as_bytes());
            let expected = match direct.handle_line(line.trim()) {
                Some(reply) => format!("{}\r\n", reply).into_bytes(),
                None => Vec::new(),
            };
            assert_eq!(via_framer, expected, "line {:?}", line);
        }
        assert_eq!(framed.instrument().state(), direct.instrument().state());
    }
}
