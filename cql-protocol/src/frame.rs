//! `frame` module contains general Frame functionality.
use bitflags::bitflags;
use derive_more::Display;
use std::convert::TryFrom;
use std::io::{Cursor, Read};
use uuid::Uuid;

use crate::error;
use crate::frame::message_request::RequestBody;
use crate::frame::message_response::ResponseBody;
pub use crate::frame::traits::*;
use crate::types::{from_cursor_string_list, UUID_LEN};

/// Number of stream bytes in accordance to protocol.
pub const STREAM_LEN: usize = 2;
/// Number of body length bytes in accordance to protocol.
pub const LENGTH_LEN: usize = 4;
/// Full header length: version, flags, stream, opcode and body length.
pub const HEADER_LEN: usize =
    Version::BYTE_LENGTH + Flags::BYTE_LENGTH + STREAM_LEN + Opcode::BYTE_LENGTH + LENGTH_LEN;
/// Maximum body length accepted by servers.
pub const MAX_BODY_LENGTH: usize = 256 * 1024 * 1024;

pub mod events;
pub mod message_auth_challenge;
pub mod message_auth_response;
pub mod message_auth_success;
pub mod message_authenticate;
pub mod message_error;
pub mod message_event;
pub mod message_execute;
pub mod message_options;
pub mod message_prepare;
pub mod message_query;
pub mod message_ready;
pub mod message_register;
pub mod message_request;
pub mod message_response;
pub mod message_result;
pub mod message_startup;
pub mod message_supported;
pub mod traits;

/// Stream id reserved for server-initiated events.
pub const EVENT_STREAM_ID: StreamId = -1;

pub type StreamId = i16;

/// A single protocol frame. Request frames are built with a placeholder stream id; the connection
/// which sends them assigns the real one with [`Frame::encode_with_stream`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Frame {
    pub version: Version,
    pub direction: Direction,
    pub flags: Flags,
    pub opcode: Opcode,
    pub stream: StreamId,
    pub body: Vec<u8>,
    pub tracing_id: Option<Uuid>,
    pub warnings: Vec<String>,
}

/// Result of parsing a frame from a buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedFrame {
    /// A complete frame and the number of consumed bytes.
    Complete(Frame, usize),
    /// The buffer does not yet contain a whole frame.
    Incomplete,
}

/// Decoded frame header.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct FrameHeader {
    pub version: Version,
    pub direction: Direction,
    pub flags: Flags,
    pub stream: StreamId,
    pub opcode: Opcode,
    pub length: usize,
}

impl FrameHeader {
    pub fn from_bytes(bytes: &[u8; HEADER_LEN]) -> error::Result<Self> {
        let version = Version::try_from(bytes[0])?;
        let direction = Direction::from(bytes[0]);
        let flags = Flags::from_bits_truncate(bytes[1]);
        let stream = StreamId::from_be_bytes([bytes[2], bytes[3]]);
        let opcode = Opcode::try_from(bytes[4])?;
        let length = u32::from_be_bytes([bytes[5], bytes[6], bytes[7], bytes[8]]) as usize;

        if length > MAX_BODY_LENGTH {
            return Err(format!("Frame body too large: {length}").into());
        }

        Ok(FrameHeader {
            version,
            direction,
            flags,
            stream,
            opcode,
            length,
        })
    }
}

impl Frame {
    pub fn new(
        version: Version,
        direction: Direction,
        flags: Flags,
        opcode: Opcode,
        stream: StreamId,
        body: Vec<u8>,
    ) -> Self {
        Frame {
            version,
            direction,
            flags,
            opcode,
            stream,
            body,
            tracing_id: None,
            warnings: vec![],
        }
    }

    /// Creates a request frame. The stream id is assigned when sending.
    #[inline]
    pub fn new_request(version: Version, opcode: Opcode, body: Vec<u8>) -> Self {
        Self::new(
            version,
            Direction::Request,
            Flags::empty(),
            opcode,
            0,
            body,
        )
    }

    #[inline]
    pub fn new_response(version: Version, opcode: Opcode, stream: StreamId, body: Vec<u8>) -> Self {
        Self::new(
            version,
            Direction::Response,
            Flags::empty(),
            opcode,
            stream,
            body,
        )
    }

    /// Parses the body of a response frame.
    pub fn response_body(&self) -> error::Result<ResponseBody> {
        ResponseBody::try_from(self.body.as_slice(), self.opcode, self.version)
    }

    /// Parses the body of a request frame.
    pub fn request_body(&self) -> error::Result<RequestBody> {
        RequestBody::try_from(self.body.as_slice(), self.opcode)
    }

    #[inline]
    pub fn tracing_id(&self) -> &Option<Uuid> {
        &self.tracing_id
    }

    #[inline]
    pub fn warnings(&self) -> &Vec<String> {
        &self.warnings
    }

    #[inline]
    pub fn encode(&self) -> Vec<u8> {
        self.encode_with_stream(self.stream)
    }

    /// Encodes the frame, replacing its stream id with the given one.
    pub fn encode_with_stream(&self, stream: StreamId) -> Vec<u8> {
        let combined_version_byte = u8::from(self.version) | u8::from(self.direction);
        let flag_byte = (self.flags - Flags::TRACING - Flags::WARNING).bits();
        let opcode_byte = u8::from(self.opcode);

        let mut v = Vec::with_capacity(HEADER_LEN + self.body.len());

        v.push(combined_version_byte);
        v.push(flag_byte);
        v.extend_from_slice(&stream.to_be_bytes());
        v.push(opcode_byte);
        v.extend_from_slice(&(self.body.len() as u32).to_be_bytes());
        v.extend_from_slice(&self.body);

        v
    }

    /// Builds a frame from a header and its raw body, splitting off tracing id and warnings.
    pub fn from_header_and_body(header: FrameHeader, full_body: &[u8]) -> error::Result<Self> {
        let mut body_cursor = Cursor::new(full_body);

        let tracing_id = if header.flags.contains(Flags::TRACING) {
            let mut tracing_bytes = [0; UUID_LEN];
            body_cursor.read_exact(&mut tracing_bytes)?;

            Some(Uuid::from_bytes(tracing_bytes))
        } else {
            None
        };

        let warnings = if header.flags.contains(Flags::WARNING) {
            from_cursor_string_list(&mut body_cursor)?
        } else {
            vec![]
        };

        let body = full_body[body_cursor.position() as usize..].to_vec();

        Ok(Frame {
            version: header.version,
            direction: header.direction,
            flags: header.flags,
            opcode: header.opcode,
            stream: header.stream,
            body,
            tracing_id,
            warnings,
        })
    }

    /// Tries to parse a single frame from the beginning of the buffer.
    pub fn from_buffer(buffer: &[u8]) -> error::Result<ParsedFrame> {
        if buffer.len() < HEADER_LEN {
            return Ok(ParsedFrame::Incomplete);
        }

        let mut header_bytes = [0; HEADER_LEN];
        header_bytes.copy_from_slice(&buffer[..HEADER_LEN]);

        let header = FrameHeader::from_bytes(&header_bytes)?;
        let frame_len = HEADER_LEN + header.length;
        if buffer.len() < frame_len {
            return Ok(ParsedFrame::Incomplete);
        }

        Frame::from_header_and_body(header, &buffer[HEADER_LEN..frame_len])
            .map(|frame| ParsedFrame::Complete(frame, frame_len))
    }
}

/// Supported protocol versions.
#[derive(Debug, PartialEq, Copy, Clone, Ord, PartialOrd, Eq, Hash, Display, Default)]
pub enum Version {
    V3,
    #[default]
    V4,
}

impl From<Version> for u8 {
    fn from(value: Version) -> Self {
        match value {
            Version::V3 => 3,
            Version::V4 => 4,
        }
    }
}

impl TryFrom<u8> for Version {
    type Error = error::Error;

    fn try_from(version: u8) -> Result<Self, Self::Error> {
        match version & 0x7F {
            3 => Ok(Version::V3),
            4 => Ok(Version::V4),
            v => Err(error::Error::UnsupportedVersion(v)),
        }
    }
}

impl Version {
    /// Number of bytes that represent frame's version.
    pub const BYTE_LENGTH: usize = 1;

    /// Returns the next lower version to try during negotiation.
    pub fn downgrade(self) -> Option<Version> {
        match self {
            Version::V4 => Some(Version::V3),
            Version::V3 => None,
        }
    }
}

#[derive(Debug, PartialEq, Copy, Clone, Ord, PartialOrd, Eq, Hash, Display)]
pub enum Direction {
    Request,
    Response,
}

impl From<Direction> for u8 {
    fn from(value: Direction) -> u8 {
        match value {
            Direction::Request => 0x00,
            Direction::Response => 0x80,
        }
    }
}

impl From<u8> for Direction {
    fn from(value: u8) -> Self {
        match value & 0x80 {
            0 => Direction::Request,
            _ => Direction::Response,
        }
    }
}

bitflags! {
    /// Frame's flags
    #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct Flags: u8 {
        const COMPRESSION = 0x01;
        const TRACING = 0x02;
        const CUSTOM_PAYLOAD = 0x04;
        const WARNING = 0x08;
        const BETA = 0x10;
    }
}

impl Default for Flags {
    #[inline]
    fn default() -> Self {
        Flags::empty()
    }
}

impl Flags {
    /// Number of flag bytes in accordance to protocol.
    pub const BYTE_LENGTH: usize = 1;
}

#[derive(Debug, PartialEq, Copy, Clone, Ord, PartialOrd, Eq, Hash, Display)]
pub enum Opcode {
    Error,
    Startup,
    Ready,
    Authenticate,
    Options,
    Supported,
    Query,
    Result,
    Prepare,
    Execute,
    Register,
    Event,
    Batch,
    AuthChallenge,
    AuthResponse,
    AuthSuccess,
}

impl Opcode {
    /// Number of opcode bytes in accordance to protocol.
    pub const BYTE_LENGTH: usize = 1;
}

impl From<Opcode> for u8 {
    fn from(value: Opcode) -> Self {
        match value {
            Opcode::Error => 0x00,
            Opcode::Startup => 0x01,
            Opcode::Ready => 0x02,
            Opcode::Authenticate => 0x03,
            Opcode::Options => 0x05,
            Opcode::Supported => 0x06,
            Opcode::Query => 0x07,
            Opcode::Result => 0x08,
            Opcode::Prepare => 0x09,
            Opcode::Execute => 0x0A,
            Opcode::Register => 0x0B,
            Opcode::Event => 0x0C,
            Opcode::Batch => 0x0D,
            Opcode::AuthChallenge => 0x0E,
            Opcode::AuthResponse => 0x0F,
            Opcode::AuthSuccess => 0x10,
        }
    }
}

impl TryFrom<u8> for Opcode {
    type Error = error::Error;

    fn try_from(value: u8) -> Result<Self, <Opcode as TryFrom<u8>>::Error> {
        match value {
            0x00 => Ok(Opcode::Error),
            0x01 => Ok(Opcode::Startup),
            0x02 => Ok(Opcode::Ready),
            0x03 => Ok(Opcode::Authenticate),
            0x05 => Ok(Opcode::Options),
            0x06 => Ok(Opcode::Supported),
            0x07 => Ok(Opcode::Query),
            0x08 => Ok(Opcode::Result),
            0x09 => Ok(Opcode::Prepare),
            0x0A => Ok(Opcode::Execute),
            0x0B => Ok(Opcode::Register),
            0x0C => Ok(Opcode::Event),
            0x0D => Ok(Opcode::Batch),
            0x0E => Ok(Opcode::AuthChallenge),
            0x0F => Ok(Opcode::AuthResponse),
            0x10 => Ok(Opcode::AuthSuccess),
            _ => Err(error::Error::UnknownOpcode(value)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::message_result::ResResultBody;

    #[test]
    fn test_frame_version_as_byte() {
        assert_eq!(u8::from(Version::V3), 0x03);
        assert_eq!(u8::from(Version::V4), 0x04);

        assert_eq!(u8::from(Direction::Request), 0x00);
        assert_eq!(u8::from(Direction::Response), 0x80);
    }

    #[test]
    fn test_frame_version_from() {
        assert_eq!(Version::try_from(0x03).unwrap(), Version::V3);
        assert_eq!(Version::try_from(0x83).unwrap(), Version::V3);
        assert_eq!(Version::try_from(0x04).unwrap(), Version::V4);
        assert_eq!(Version::try_from(0x84).unwrap(), Version::V4);
        assert!(matches!(
            Version::try_from(0x85),
            Err(error::Error::UnsupportedVersion(5))
        ));

        assert_eq!(Direction::from(0x03), Direction::Request);
        assert_eq!(Direction::from(0x84), Direction::Response);
    }

    #[test]
    fn test_version_downgrade() {
        assert_eq!(Version::V4.downgrade(), Some(Version::V3));
        assert_eq!(Version::V3.downgrade(), None);
    }

    #[test]
    fn test_opcode_from() {
        for byte in (0x00..=0x10).filter(|byte| *byte != 0x04) {
            assert_eq!(u8::from(Opcode::try_from(byte).unwrap()), byte);
        }

        assert!(matches!(
            Opcode::try_from(0x04),
            Err(error::Error::UnknownOpcode(0x04))
        ));
    }

    #[test]
    fn test_ready() {
        let bytes = vec![0x84, 0, 0, 5, 2, 0, 0, 0, 0];
        let frame = Frame::new_response(Version::V4, Opcode::Ready, 5, vec![]);

        assert_eq!(frame.encode(), bytes);
        assert_eq!(
            Frame::from_buffer(&bytes).unwrap(),
            ParsedFrame::Complete(frame.clone(), bytes.len())
        );
        assert_eq!(frame.response_body().unwrap(), ResponseBody::Ready);
    }

    #[test]
    fn test_encode_with_stream_replaces_stream() {
        let frame = Frame::new_request(Version::V4, Opcode::Options, vec![]);
        let bytes = frame.encode_with_stream(-2);

        assert_eq!(bytes, vec![0x04, 0, 0xFF, 0xFE, 5, 0, 0, 0, 0]);
    }

    #[test]
    fn test_incomplete_buffer() {
        let frame = Frame::new_response(
            Version::V4,
            Opcode::Result,
            1,
            ResResultBody::Void.serialize_to_vec(),
        );
        let bytes = frame.encode();

        assert_eq!(
            Frame::from_buffer(&bytes[..HEADER_LEN - 1]).unwrap(),
            ParsedFrame::Incomplete
        );
        assert_eq!(
            Frame::from_buffer(&bytes[..bytes.len() - 1]).unwrap(),
            ParsedFrame::Incomplete
        );
    }

    #[test]
    fn test_tracing_and_warnings_are_split_from_body() {
        let tracing_id = Uuid::from_u128(0x1234);
        let mut body = tracing_id.as_bytes().to_vec();
        body.extend_from_slice(&[0, 1, 0, 2, b'o', b'k']);
        body.extend_from_slice(&[0, 0, 0, 1]);

        let mut bytes = vec![0x84, 0x0A, 0, 1, 8];
        bytes.extend_from_slice(&(body.len() as u32).to_be_bytes());
        bytes.extend_from_slice(&body);

        let ParsedFrame::Complete(frame, len) = Frame::from_buffer(&bytes).unwrap() else {
            panic!("expected complete frame");
        };

        assert_eq!(len, bytes.len());
        assert_eq!(frame.tracing_id, Some(tracing_id));
        assert_eq!(frame.warnings, vec!["ok".to_string()]);
        assert_eq!(frame.body, vec![0, 0, 0, 1]);
    }
}
