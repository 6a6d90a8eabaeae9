//! Transport boundary: connected byte-stream sink and the blocking send path.
//!
//! The core never opens or manages connections; the host hands it an
//! already-connected sink. No framing or delimiter is added, so the receiving
//! side must know where a message ends (the deployed protocol uses one
//! connection per message).

use std::io::{self, Write};
use std::net::TcpStream;

use tracing::debug;

use crate::message::PimpMessage;

/// Connected byte-stream sink capability consumed by the send path. Agnostic
/// to the underlying address family.
pub trait MessageSink {
    fn is_connected(&self) -> bool;
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()>;
}

impl MessageSink for TcpStream {
    fn is_connected(&self) -> bool {
        self.peer_addr().is_ok()
    }

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        Write::write_all(self, bytes)
    }
}

impl PimpMessage {
    /// Write the serialized envelope to the sink. A disconnected sink skips
    /// the send (the protocol contract treats that as a no-op); write errors
    /// on a connected sink propagate.
    pub fn send_to<S: MessageSink>(&self, sink: &mut S) -> io::Result<()> {
        if !sink.is_connected() {
            debug!("send skipped: sink not connected");
            return Ok(());
        }
        sink.write_all(self.to_wire().as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubSink {
        connected: bool,
        written: Vec<u8>,
    }

    impl StubSink {
        fn new(connected: bool) -> Self {
            StubSink {
                connected,
                written: Vec::new(),
            }
        }
    }

    impl MessageSink for StubSink {
        fn is_connected(&self) -> bool {
            self.connected
        }

        fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
            self.written.extend_from_slice(bytes);
            Ok(())
        }
    }

    #[test]
    fn send_writes_wire_text_verbatim() {
        let mut msg = PimpMessage::from_source("127.0.0.1".parse().unwrap());
        msg.create_peer_search("ubuntu.iso");

        let mut sink = StubSink::new(true);
        msg.send_to(&mut sink).unwrap();
        assert_eq!(sink.written, msg.to_wire().as_bytes());

        // No framing: the bytes on the wire parse back directly.
        let text = String::from_utf8(sink.written).unwrap();
        let got = PimpMessage::from_wire(&text).unwrap();
        assert!(got.has_search_string());
    }

    #[test]
    fn disconnected_sink_skips_the_send() {
        let mut msg = PimpMessage::from_source("127.0.0.1".parse().unwrap());
        msg.create_peer_sign_out();

        let mut sink = StubSink::new(false);
        msg.send_to(&mut sink).unwrap();
        assert!(sink.written.is_empty());
    }
}
