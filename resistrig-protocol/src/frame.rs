//! Frame encoding and decoding for the UI link.
//!
//! Frame format:
//! - START (1 byte): 0x7E synchronization byte
//! - LENGTH (1 byte): payload length (0-250)
//! - TYPE (1 byte): message type identifier
//! - PAYLOAD (0-250 bytes): postcard-encoded message body
//! - CRC (1 byte): CRC-8 (poly 0x07, init 0) over LENGTH, TYPE and PAYLOAD

use heapless::Vec;

/// Frame synchronization byte
pub const FRAME_START: u8 = 0x7E;

/// Maximum payload size in bytes
pub const MAX_PAYLOAD_SIZE: usize = 250;

/// Maximum complete frame size (START + LENGTH + TYPE + MAX_PAYLOAD + CRC)
pub const MAX_FRAME_SIZE: usize = 1 + 1 + 1 + MAX_PAYLOAD_SIZE + 1;

const CRC8_POLY: u8 = 0x07;

/// Errors that can occur during frame parsing or encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// Payload exceeds maximum allowed size
    PayloadTooLarge,
    /// CRC mismatch
    InvalidCrc,
    /// LENGTH byte out of range
    InvalidLength,
    /// Buffer too small for encoding
    BufferTooSmall,
}

fn crc8_update(mut crc: u8, byte: u8) -> u8 {
    crc ^= byte;
    for _ in 0..8 {
        crc = if crc & 0x80 != 0 {
            (crc << 1) ^ CRC8_POLY
        } else {
            crc << 1
        };
    }
    crc
}

/// CRC-8/SMBUS of a byte slice
pub fn crc8(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0, |crc, &b| crc8_update(crc, b))
}

/// A parsed or constructed frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Message type identifier
    pub msg_type: u8,
    /// Payload data
    pub payload: Vec<u8, MAX_PAYLOAD_SIZE>,
}

impl Frame {
    pub fn new(msg_type: u8, payload: &[u8]) -> Result<Self, FrameError> {
        let payload = Vec::from_slice(payload).map_err(|_| FrameError::PayloadTooLarge)?;
        Ok(Self { msg_type, payload })
    }

    /// Frame with no payload
    pub fn empty(msg_type: u8) -> Self {
        Self {
            msg_type,
            payload: Vec::new(),
        }
    }

    fn crc(length: u8, msg_type: u8, payload: &[u8]) -> u8 {
        let crc = crc8_update(crc8_update(0, length), msg_type);
        payload.iter().fold(crc, |crc, &b| crc8_update(crc, b))
    }

    /// Encoded size of this frame
    pub fn encoded_len(&self) -> usize {
        4 + self.payload.len()
    }

    /// Encode this frame into a byte buffer
    ///
    /// Returns the number of bytes written
    pub fn encode(&self, buffer: &mut [u8]) -> Result<usize, FrameError> {
        let len = self.encoded_len();
        if buffer.len() < len {
            return Err(FrameError::BufferTooSmall);
        }

        let length = self.payload.len() as u8;
        let end = 3 + self.payload.len();
        buffer[0] = FRAME_START;
        buffer[1] = length;
        buffer[2] = self.msg_type;
        buffer[3..end].copy_from_slice(&self.payload);
        buffer[end] = Self::crc(length, self.msg_type, &self.payload);
        Ok(len)
    }

    /// Encode this frame into a heapless Vec
    pub fn encode_to_vec(&self) -> Result<Vec<u8, MAX_FRAME_SIZE>, FrameError> {
        let mut buffer = [0u8; MAX_FRAME_SIZE];
        let len = self.encode(&mut buffer)?;
        Vec::from_slice(&buffer[..len]).map_err(|_| FrameError::BufferTooSmall)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    Start,
    Length,
    Type,
    Payload,
    Crc,
}

/// Byte-at-a-time frame parser
///
/// Bytes before a START byte are skipped, so the parser resynchronizes on
/// its own after line noise or a dropped byte.
#[derive(Debug, Clone)]
pub struct FrameParser {
    state: ParseState,
    length: u8,
    msg_type: u8,
    payload: Vec<u8, MAX_PAYLOAD_SIZE>,
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameParser {
    pub fn new() -> Self {
        Self {
            state: ParseState::Start,
            length: 0,
            msg_type: 0,
            payload: Vec::new(),
        }
    }

    /// Drop any partial frame
    pub fn reset(&mut self) {
        self.state = ParseState::Start;
        self.length = 0;
        self.msg_type = 0;
        self.payload.clear();
    }

    /// Feed a single byte to the parser
    ///
    /// Returns `Ok(Some(frame))` when a complete valid frame is parsed,
    /// `Ok(None)` when more bytes are needed, or `Err` on parse error.
    pub fn feed(&mut self, byte: u8) -> Result<Option<Frame>, FrameError> {
        match self.state {
            ParseState::Start => {
                if byte == FRAME_START {
                    self.state = ParseState::Length;
                }
            }
            ParseState::Length => {
                if byte as usize > MAX_PAYLOAD_SIZE {
                    self.reset();
                    return Err(FrameError::InvalidLength);
                }
                self.length = byte;
                self.state = ParseState::Type;
            }
            ParseState::Type => {
                self.msg_type = byte;
                self.payload.clear();
                self.state = if self.length == 0 {
                    ParseState::Crc
                } else {
                    ParseState::Payload
                };
            }
            ParseState::Payload => {
                // Cannot overflow: length was bounded above
                let _ = self.payload.push(byte);
                if self.payload.len() == self.length as usize {
                    self.state = ParseState::Crc;
                }
            }
            ParseState::Crc => {
                let expected = Frame::crc(self.length, self.msg_type, &self.payload);
                let frame = Frame {
                    msg_type: self.msg_type,
                    payload: core::mem::take(&mut self.payload),
                };
                self.reset();
                if byte != expected {
                    return Err(FrameError::InvalidCrc);
                }
                return Ok(Some(frame));
            }
        }
        Ok(None)
    }

    /// Feed bytes until the first complete frame
    ///
    /// Returns the frame and how many bytes were consumed. Bytes after the
    /// frame are left for the next call.
    pub fn feed_bytes(&mut self, bytes: &[u8]) -> Result<(Option<Frame>, usize), FrameError> {
        for (i, &byte) in bytes.iter().enumerate() {
            if let Some(frame) = self.feed(byte)? {
                return Ok((Some(frame), i + 1));
            }
        }
        Ok((None, bytes.len()))
    }
}
