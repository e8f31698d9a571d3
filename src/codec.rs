//! Framed serial protocol: flag-delimited, byte-stuffed packets with a
//! little-endian CRC16 (CCITT) trailer over the unescaped payload.
//!
//! Structurally this mirrors a SLIP-style escaping state machine (`Idle` /
//! `InFrame` / `InFrameEscaped`), but unlike plain SLIP it appends a CRC16
//! that covers the whole payload, so a decoded packet also carries a
//! pass/fail verdict rather than being accepted on framing alone.

use crc16::{State, MCRF4XX};

const FLAG: u8 = 0xC0;
const ESCAPE: u8 = 0xDB;
const ESCAPE_FLAG: u8 = 0xDC;
const ESCAPE_ESCAPE: u8 = 0xDD;

/// Maximum packet size this codec will accumulate before declaring the frame
/// oversized and resynchronizing on the next flag byte.
pub const MAX_PACKET_SIZE: usize = 600;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State_ {
    Idle,
    InFrame,
    InFrameEscaped,
}

/// Incremental decoder: feed it raw bytes off the wire, get back complete,
/// CRC-checked packets.
#[derive(Debug)]
pub struct FramedDecoder {
    state: State_,
    buf: Vec<u8>,
    oversized: bool,
}

impl FramedDecoder {
    pub fn new() -> Self {
        Self {
            state: State_::Idle,
            buf: Vec::with_capacity(MAX_PACKET_SIZE),
            oversized: false,
        }
    }

    /// Feeds `bytes` into the decoder, invoking `on_packet` once per
    /// complete, CRC-valid packet (payload only, CRC trailer stripped).
    /// Frames that fail their CRC are silently dropped, matching the
    /// protocol's tolerance for line noise between packets.
    pub fn push(&mut self, bytes: &[u8], mut on_packet: impl FnMut(&[u8])) {
        for &byte in bytes {
            match self.state {
                State_::Idle => {
                    if byte == FLAG {
                        self.buf.clear();
                        self.oversized = false;
                        self.state = State_::InFrame;
                    }
                }
                State_::InFrame => match byte {
                    FLAG => {
                        self.finish_frame(&mut on_packet);
                    }
                    ESCAPE => {
                        self.state = State_::InFrameEscaped;
                    }
                    _ => self.push_byte(byte),
                },
                State_::InFrameEscaped => {
                    match byte {
                        ESCAPE_FLAG => self.push_byte(FLAG),
                        ESCAPE_ESCAPE => self.push_byte(ESCAPE),
                        FLAG => {
                            // Malformed escape immediately followed by a new
                            // frame start: resynchronize.
                            self.buf.clear();
                            self.oversized = false;
                            self.state = State_::InFrame;
                            continue;
                        }
                        _ => {
                            // Malformed escape sequence; drop the frame and
                            // wait for the next flag.
                            self.state = State_::Idle;
                            continue;
                        }
                    }
                    self.state = State_::InFrame;
                }
            }
        }
    }

    fn push_byte(&mut self, byte: u8) {
        if self.buf.len() >= MAX_PACKET_SIZE {
            self.oversized = true;
            return;
        }
        self.buf.push(byte);
    }

    fn finish_frame(&mut self, on_packet: &mut impl FnMut(&[u8])) {
        self.state = State_::Idle;
        if self.oversized {
            self.oversized = false;
            self.buf.clear();
            return;
        }
        if self.buf.len() < 2 {
            self.buf.clear();
            return;
        }
        let split = self.buf.len() - 2;
        let crc_received = u16::from_le_bytes([self.buf[split], self.buf[split + 1]]);
        let crc_computed = State::<MCRF4XX>::calculate(&self.buf[..split]);
        if crc_received == crc_computed {
            on_packet(&self.buf[..split]);
        }
        self.buf.clear();
    }
}

impl Default for FramedDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Encodes `payload` into a flag-delimited, byte-stuffed frame with a
/// trailing little-endian CRC16, ready to write to the wire.
pub fn encode(payload: &[u8]) -> Vec<u8> {
    let crc = State::<MCRF4XX>::calculate(payload);
    let mut framed = Vec::with_capacity(payload.len() + 4);
    framed.push(FLAG);
    for &byte in payload.iter().chain(crc.to_le_bytes().iter()) {
        match byte {
            FLAG => framed.extend_from_slice(&[ESCAPE, ESCAPE_FLAG]),
            ESCAPE => framed.extend_from_slice(&[ESCAPE, ESCAPE_ESCAPE]),
            _ => framed.push(byte),
        }
    }
    framed.push(FLAG);
    framed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_one(bytes: &[u8]) -> Option<Vec<u8>> {
        let mut decoder = FramedDecoder::new();
        let mut result = None;
        decoder.push(bytes, |p| result = Some(p.to_vec()));
        result
    }

    #[test]
    fn round_trip_simple_payload() {
        let payload = vec![0x81, 0x02, 0x00, 0x01, 0x02, 0x03];
        let framed = encode(&payload);
        assert_eq!(decode_one(&framed).unwrap(), payload);
    }

    #[test]
    fn round_trip_escapes_flag_and_escape_bytes() {
        let payload = vec![FLAG, ESCAPE, 0x00, FLAG, ESCAPE];
        let framed = encode(&payload);
        assert_eq!(decode_one(&framed).unwrap(), payload);
    }

    #[test]
    fn single_bit_flip_fails_crc() {
        let payload = vec![1, 2, 3, 4, 5];
        let mut framed = encode(&payload);
        let mid = framed.len() / 2;
        framed[mid] ^= 0x01;
        assert!(decode_one(&framed).is_none());
    }

    #[test]
    fn multi_part_feed_across_calls() {
        let payload = vec![0xAA; 10];
        let framed = encode(&payload);
        let (first, second) = framed.split_at(framed.len() / 2);
        let mut decoder = FramedDecoder::new();
        let mut result = None;
        decoder.push(first, |p| result = Some(p.to_vec()));
        assert!(result.is_none());
        decoder.push(second, |p| result = Some(p.to_vec()));
        assert_eq!(result.unwrap(), payload);
    }

    #[test]
    fn oversized_frame_is_dropped() {
        let payload = vec![0x55; MAX_PACKET_SIZE + 10];
        let framed = encode(&payload);
        assert!(decode_one(&framed).is_none());
    }
}
