use std::collections::HashMap;
use std::io::Cursor;

use crate::error;
use crate::frame::{Frame, FromCursor, Opcode, Serialize, StreamId, Version};
use crate::types::{from_cursor_str_multimap, serialize_str_multimap};

#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct BodyResSupported {
    pub data: HashMap<String, Vec<String>>,
}

impl Serialize for BodyResSupported {
    #[inline]
    fn serialize(&self, cursor: &mut Cursor<&mut Vec<u8>>) {
        serialize_str_multimap(cursor, &self.data);
    }
}

impl FromCursor for BodyResSupported {
    #[inline]
    fn from_cursor(cursor: &mut Cursor<&[u8]>) -> error::Result<BodyResSupported> {
        from_cursor_str_multimap(cursor).map(|data| BodyResSupported { data })
    }
}

impl Frame {
    pub fn new_res_supported(version: Version, stream: StreamId, body: &BodyResSupported) -> Frame {
        Frame::new_response(version, Opcode::Supported, stream, body.serialize_to_vec())
    }
}
