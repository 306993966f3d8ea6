use std::io::Cursor;

use crate::error;
use crate::frame::{Frame, FromCursor, Opcode, Serialize, StreamId, Version};
use crate::types::CBytes;

/// Server authentication challenge.
#[derive(Debug, PartialEq, Ord, PartialOrd, Eq, Hash, Clone)]
pub struct BodyResAuthChallenge {
    pub data: CBytes,
}

impl Serialize for BodyResAuthChallenge {
    fn serialize(&self, cursor: &mut Cursor<&mut Vec<u8>>) {
        self.data.serialize(cursor);
    }
}

impl FromCursor for BodyResAuthChallenge {
    fn from_cursor(cursor: &mut Cursor<&[u8]>) -> error::Result<BodyResAuthChallenge> {
        CBytes::from_cursor(cursor).map(|data| BodyResAuthChallenge { data })
    }
}

impl Frame {
    pub fn new_res_auth_challenge(version: Version, stream: StreamId, data: CBytes) -> Frame {
        let body = BodyResAuthChallenge { data };
        Frame::new_response(version, Opcode::AuthChallenge, stream, body.serialize_to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_res_auth_challenge() {
        let bytes = [0, 0, 0, 3, 1, 2, 3];
        let mut cursor: Cursor<&[u8]> = Cursor::new(&bytes);
        let body = BodyResAuthChallenge::from_cursor(&mut cursor).unwrap();
        assert_eq!(body.data.into_bytes().unwrap(), vec![1, 2, 3]);
    }
}
