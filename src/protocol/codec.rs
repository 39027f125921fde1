//! Telnet line codec for the session transport.
//!
//! Wraps the stream filter in a `tokio_util` codec: each arriving chunk is
//! stripped of negotiation sequences, the filtered bytes accumulate across
//! arbitrarily chunked reads, and complete lines are yielded once a newline
//! arrives. Outbound commands are encoded with a trailing CR LF.
//!
//! Negotiation filtering is per-chunk: the codec carries filtered text
//! across reads for line assembly, but an IAC sequence split exactly at a
//! chunk boundary is not reassembled.

use anyhow::Error;
use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{Decoder, Encoder, Framed};

use crate::protocol::telnet;

/// Codec turning a raw telnet byte stream into decoded text lines.
pub struct TelnetCodec {
    /// Filtered bytes waiting for a line terminator.
    pending: Vec<u8>,
}

impl TelnetCodec {
    pub fn new() -> Self {
        Self {
            pending: Vec::new(),
        }
    }

    /// Pop one complete line off the pending buffer, if present.
    fn take_line(&mut self) -> Option<String> {
        let newline = self.pending.iter().position(|&b| b == b'\n')?;
        let mut line: Vec<u8> = self.pending.drain(..=newline).collect();
        line.pop(); // the \n itself
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Some(telnet::decode(&line))
    }
}

impl Default for TelnetCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for TelnetCodec {
    type Item = String;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if !src.is_empty() {
            let chunk = src.split_to(src.len());
            self.pending.extend(telnet::strip_negotiation(&chunk));
        }

        Ok(self.take_line())
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(line) = self.decode(src)? {
            return Ok(Some(line));
        }

        // Flush a trailing unterminated line (typically the final prompt).
        if self.pending.is_empty() {
            Ok(None)
        } else {
            let rest: Vec<u8> = std::mem::take(&mut self.pending);
            Ok(Some(telnet::decode(&rest)))
        }
    }
}

impl Encoder<String> for TelnetCodec {
    type Error = Error;

    fn encode(&mut self, item: String, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(item.len() + 2);
        dst.put_slice(item.as_bytes());
        dst.put_slice(b"\r\n");
        Ok(())
    }
}

/// A framed session transport over any async byte stream.
pub type SessionConnection<S> = Framed<S, TelnetCodec>;

/// Wrap a stream in the telnet line codec.
pub fn new_session_connection<S>(stream: S) -> SessionConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    Framed::new(stream, TelnetCodec::new())
}
