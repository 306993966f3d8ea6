use derive_more::Constructor;
use std::io::Cursor;

use crate::error;
use crate::frame::{Frame, FromCursor, Opcode, Serialize, Version};
use crate::types::CBytes;

#[derive(Debug, Constructor, Clone, Ord, PartialOrd, Eq, PartialEq, Hash)]
pub struct BodyReqAuthResponse {
    pub data: CBytes,
}

impl Serialize for BodyReqAuthResponse {
    #[inline]
    fn serialize(&self, cursor: &mut Cursor<&mut Vec<u8>>) {
        self.data.serialize(cursor);
    }
}

impl FromCursor for BodyReqAuthResponse {
    fn from_cursor(cursor: &mut Cursor<&[u8]>) -> error::Result<Self> {
        CBytes::from_cursor(cursor).map(BodyReqAuthResponse::new)
    }
}

impl Frame {
    /// Creates new frame of type `AuthResponse`.
    pub fn new_req_auth_response(token_bytes: CBytes, version: Version) -> Frame {
        let body = BodyReqAuthResponse::new(token_bytes);
        Frame::new_request(version, Opcode::AuthResponse, body.serialize_to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_body_req_auth_response() {
        let frame = Frame::new_req_auth_response(CBytes::new(vec![1, 2, 3]), Version::V4);

        assert_eq!(frame.version, Version::V4);
        assert_eq!(frame.opcode, Opcode::AuthResponse);
        assert_eq!(frame.body, &[0, 0, 0, 3, 1, 2, 3]);
        assert_eq!(frame.tracing_id, None);
        assert!(frame.warnings.is_empty());
    }
}
