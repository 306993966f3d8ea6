use std::io::Cursor;

use crate::error;
use crate::frame::{Frame, FromCursor, Opcode, Serialize, StreamId, Version};
use crate::types::CBytes;

/// Successful end of a SASL exchange, carrying optional final token bytes.
#[derive(Debug, PartialEq, Ord, PartialOrd, Eq, Hash, Clone)]
pub struct BodyResAuthSuccess {
    pub data: CBytes,
}

impl Serialize for BodyResAuthSuccess {
    fn serialize(&self, cursor: &mut Cursor<&mut Vec<u8>>) {
        self.data.serialize(cursor);
    }
}

impl FromCursor for BodyResAuthSuccess {
    fn from_cursor(cursor: &mut Cursor<&[u8]>) -> error::Result<BodyResAuthSuccess> {
        CBytes::from_cursor(cursor).map(|data| BodyResAuthSuccess { data })
    }
}

impl Frame {
    pub fn new_res_auth_success(version: Version, stream: StreamId) -> Frame {
        let body = BodyResAuthSuccess {
            data: CBytes::new_null(),
        };

        Frame::new_response(version, Opcode::AuthSuccess, stream, body.serialize_to_vec())
    }
}
