use crate::error;
use crate::frame::{Frame, FromCursor, Opcode, Serialize, Version};
use std::io::Cursor;

/// The structure which represents a body of a frame of type `options`.
#[derive(Debug, Default, Ord, PartialOrd, Eq, PartialEq, Hash, Copy, Clone)]
pub struct BodyReqOptions;

impl Serialize for BodyReqOptions {
    #[inline(always)]
    fn serialize(&self, _cursor: &mut Cursor<&mut Vec<u8>>) {}
}

impl FromCursor for BodyReqOptions {
    #[inline(always)]
    fn from_cursor(_cursor: &mut Cursor<&[u8]>) -> error::Result<Self> {
        Ok(BodyReqOptions)
    }
}

impl Frame {
    /// Creates new frame of type `options`. Also used as a heartbeat.
    pub fn new_req_options(version: Version) -> Frame {
        let body: BodyReqOptions = Default::default();
        Frame::new_request(version, Opcode::Options, body.serialize_to_vec())
    }
}
