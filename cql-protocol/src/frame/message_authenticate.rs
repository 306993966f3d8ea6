use std::io::Cursor;

use crate::error;
use crate::frame::{Frame, FromCursor, Opcode, Serialize, StreamId, Version};
use crate::types::{from_cursor_str, serialize_str};

/// Authentication request naming the authenticator class the server uses.
#[derive(Debug, PartialEq, Ord, PartialOrd, Eq, Hash, Clone)]
pub struct BodyResAuthenticate {
    pub data: String,
}

impl Serialize for BodyResAuthenticate {
    fn serialize(&self, cursor: &mut Cursor<&mut Vec<u8>>) {
        serialize_str(cursor, &self.data);
    }
}

impl FromCursor for BodyResAuthenticate {
    fn from_cursor(cursor: &mut Cursor<&[u8]>) -> error::Result<BodyResAuthenticate> {
        Ok(BodyResAuthenticate {
            data: from_cursor_str(cursor)?.to_string(),
        })
    }
}

impl Frame {
    pub fn new_res_authenticate(version: Version, stream: StreamId, authenticator: &str) -> Frame {
        let body = BodyResAuthenticate {
            data: authenticator.to_string(),
        };

        Frame::new_response(version, Opcode::Authenticate, stream, body.serialize_to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_res_authenticate() {
        // string "abcde"
        let bytes = [0, 5, 97, 98, 99, 100, 101];
        let expected = BodyResAuthenticate {
            data: "abcde".into(),
        };

        {
            let mut cursor: Cursor<&[u8]> = Cursor::new(&bytes);
            let auth = BodyResAuthenticate::from_cursor(&mut cursor).unwrap();
            assert_eq!(auth, expected);
        }

        assert_eq!(expected.serialize_to_vec(), bytes);
    }
}
