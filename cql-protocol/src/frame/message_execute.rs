use derive_more::Constructor;
use std::io::Cursor;

use crate::error;
use crate::frame::{Frame, FromCursor, Opcode, Serialize, Version};
use crate::query::QueryParams;
use crate::types::CBytesShort;

/// The structure that represents a body of a frame of type `execute`.
#[derive(Debug, Constructor, Clone, Eq, PartialEq, Default)]
pub struct BodyReqExecute {
    pub id: CBytesShort,
    pub query_parameters: QueryParams,
}

impl Serialize for BodyReqExecute {
    fn serialize(&self, cursor: &mut Cursor<&mut Vec<u8>>) {
        self.id.serialize(cursor);
        self.query_parameters.serialize(cursor);
    }
}

impl FromCursor for BodyReqExecute {
    fn from_cursor(cursor: &mut Cursor<&[u8]>) -> error::Result<Self> {
        let id = CBytesShort::from_cursor(cursor)?;
        let query_parameters = QueryParams::from_cursor(cursor)?;

        Ok(BodyReqExecute::new(id, query_parameters))
    }
}

impl Frame {
    /// Creates new frame of type `execute`.
    pub fn new_req_execute(id: CBytesShort, query_parameters: QueryParams, version: Version) -> Frame {
        let body = BodyReqExecute::new(id, query_parameters);
        Frame::new_request(version, Opcode::Execute, body.serialize_to_vec())
    }
}
