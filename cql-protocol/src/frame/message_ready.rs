use crate::error;
use crate::frame::{Frame, FromCursor, Opcode, Serialize, StreamId, Version};
use std::io::Cursor;

#[derive(Clone, Debug, PartialEq, Default, Ord, PartialOrd, Eq, Hash)]
pub struct BodyResReady;

impl Serialize for BodyResReady {
    #[inline(always)]
    fn serialize(&self, _cursor: &mut Cursor<&mut Vec<u8>>) {}
}

impl FromCursor for BodyResReady {
    #[inline(always)]
    fn from_cursor(_cursor: &mut Cursor<&[u8]>) -> error::Result<Self> {
        Ok(BodyResReady)
    }
}

impl Frame {
    #[inline]
    pub fn new_res_ready(version: Version, stream: StreamId) -> Frame {
        Frame::new_response(version, Opcode::Ready, stream, vec![])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_res_ready_serialize() {
        let body = BodyResReady;
        assert!(body.serialize_to_vec().is_empty());
    }
}
