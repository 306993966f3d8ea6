use derive_more::Constructor;
use std::io::Cursor;

use crate::error;
use crate::frame::traits::FromCursor;
use crate::frame::{Frame, Opcode, Serialize, Version};
use crate::query::QueryParams;
use crate::types::{from_cursor_str_long, serialize_str_long, INT_LEN};

/// Structure which represents body of Query request
#[derive(Debug, PartialEq, Eq, Clone, Default, Constructor)]
pub struct BodyReqQuery {
    /// Query string.
    pub query: String,
    /// Query parameters.
    pub query_params: QueryParams,
}

impl FromCursor for BodyReqQuery {
    fn from_cursor(cursor: &mut Cursor<&[u8]>) -> error::Result<BodyReqQuery> {
        let query = from_cursor_str_long(cursor)?.to_string();
        let query_params = QueryParams::from_cursor(cursor)?;

        Ok(BodyReqQuery {
            query,
            query_params,
        })
    }
}

impl Serialize for BodyReqQuery {
    #[inline]
    fn serialize(&self, cursor: &mut Cursor<&mut Vec<u8>>) {
        serialize_str_long(cursor, &self.query);
        self.query_params.serialize(cursor);
    }

    #[inline]
    fn serialize_to_vec(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(INT_LEN + self.query.len());

        self.serialize(&mut Cursor::new(&mut buf));
        buf
    }
}

impl Frame {
    /// Creates new frame of type `query`.
    pub fn new_req_query(query: String, query_params: QueryParams, version: Version) -> Frame {
        let body = BodyReqQuery::new(query, query_params);
        Frame::new_request(version, Opcode::Query, body.serialize_to_vec())
    }

    #[inline]
    pub fn new_query(query: BodyReqQuery, version: Version) -> Frame {
        Frame::new_request(version, Opcode::Query, query.serialize_to_vec())
    }
}
