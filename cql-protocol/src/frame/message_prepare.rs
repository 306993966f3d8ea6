use std::io::Cursor;

use crate::error;
use crate::frame::{Frame, FromCursor, Opcode, Serialize, Version};
use crate::types::{from_cursor_str_long, serialize_str_long};

/// Struct that represents a body of a frame of type `prepare`
#[derive(Debug, Ord, PartialOrd, Eq, PartialEq, Hash, Clone, Default)]
pub struct BodyReqPrepare {
    pub query: String,
}

impl BodyReqPrepare {
    /// Creates new body of a frame of type `prepare` that prepares query `query`.
    #[inline]
    pub fn new(query: String) -> BodyReqPrepare {
        BodyReqPrepare { query }
    }
}

impl Serialize for BodyReqPrepare {
    #[inline]
    fn serialize(&self, cursor: &mut Cursor<&mut Vec<u8>>) {
        serialize_str_long(cursor, &self.query);
    }
}

impl FromCursor for BodyReqPrepare {
    #[inline]
    fn from_cursor(cursor: &mut Cursor<&[u8]>) -> error::Result<BodyReqPrepare> {
        from_cursor_str_long(cursor).map(|query| BodyReqPrepare::new(query.into()))
    }
}

impl Frame {
    pub fn new_req_prepare(query: String, version: Version) -> Frame {
        let body = BodyReqPrepare::new(query);
        Frame::new_request(version, Opcode::Prepare, body.serialize_to_vec())
    }
}
