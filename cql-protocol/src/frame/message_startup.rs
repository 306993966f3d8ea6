use std::collections::HashMap;
use std::io::Cursor;

use crate::error;
use crate::frame::{Frame, FromCursor, Opcode, Serialize, Version};
use crate::types::{from_cursor_str_map, serialize_str_map};

const CQL_VERSION: &str = "CQL_VERSION";
const CQL_VERSION_VAL: &str = "3.0.0";

/// The structure which represents a body of a frame of type `startup`.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct BodyReqStartup {
    pub map: HashMap<String, String>,
}

impl Default for BodyReqStartup {
    fn default() -> Self {
        let mut map = HashMap::with_capacity(1);
        map.insert(CQL_VERSION.to_string(), CQL_VERSION_VAL.to_string());

        BodyReqStartup { map }
    }
}

impl BodyReqStartup {
    #[inline]
    pub fn cql_version(&self) -> Option<&str> {
        self.map.get(CQL_VERSION).map(String::as_str)
    }
}

impl Serialize for BodyReqStartup {
    #[inline]
    fn serialize(&self, cursor: &mut Cursor<&mut Vec<u8>>) {
        serialize_str_map(cursor, &self.map);
    }
}

impl FromCursor for BodyReqStartup {
    #[inline]
    fn from_cursor(cursor: &mut Cursor<&[u8]>) -> error::Result<Self> {
        from_cursor_str_map(cursor).map(|map| BodyReqStartup { map })
    }
}

impl Frame {
    /// Creates new frame of type `startup`.
    pub fn new_req_startup(version: Version) -> Frame {
        let body = BodyReqStartup::default();
        Frame::new_request(version, Opcode::Startup, body.serialize_to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_body_req_startup() {
        let body = BodyReqStartup::default();
        assert_eq!(body.cql_version(), Some("3.0.0"));
        assert_eq!(body.map.len(), 1);
    }

    #[test]
    fn new_req_startup() {
        let frame = Frame::new_req_startup(Version::V4);
        assert_eq!(frame.version, Version::V4);
        assert_eq!(frame.opcode, Opcode::Startup);
        assert_eq!(
            frame.body,
            vec![
                0, 1, // one entry
                0, 11, 67, 81, 76, 95, 86, 69, 82, 83, 73, 79, 78, // CQL_VERSION
                0, 5, 51, 46, 48, 46, 48, // 3.0.0
            ]
        );
    }
}
