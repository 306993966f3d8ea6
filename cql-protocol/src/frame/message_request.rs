use std::io::Cursor;

use crate::error;
use crate::frame::message_auth_response::BodyReqAuthResponse;
use crate::frame::message_execute::BodyReqExecute;
use crate::frame::message_options::BodyReqOptions;
use crate::frame::message_prepare::BodyReqPrepare;
use crate::frame::message_query::BodyReqQuery;
use crate::frame::message_register::BodyReqRegister;
use crate::frame::message_startup::BodyReqStartup;
use crate::frame::{FromCursor, Opcode, Serialize};

/// Body of a request frame, as seen by the receiving node.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum RequestBody {
    Startup(BodyReqStartup),
    Options(BodyReqOptions),
    Query(BodyReqQuery),
    Prepare(BodyReqPrepare),
    Execute(BodyReqExecute),
    Register(BodyReqRegister),
    AuthResponse(BodyReqAuthResponse),
}

impl Serialize for RequestBody {
    fn serialize(&self, cursor: &mut Cursor<&mut Vec<u8>>) {
        match self {
            RequestBody::Query(body) => body.serialize(cursor),
            RequestBody::Startup(body) => body.serialize(cursor),
            RequestBody::Options(body) => body.serialize(cursor),
            RequestBody::Prepare(body) => body.serialize(cursor),
            RequestBody::Execute(body) => body.serialize(cursor),
            RequestBody::Register(body) => body.serialize(cursor),
            RequestBody::AuthResponse(body) => body.serialize(cursor),
        }
    }
}

impl RequestBody {
    pub fn try_from(bytes: &[u8], request_type: Opcode) -> error::Result<RequestBody> {
        let mut cursor: Cursor<&[u8]> = Cursor::new(bytes);
        match request_type {
            Opcode::Startup => BodyReqStartup::from_cursor(&mut cursor).map(RequestBody::Startup),
            Opcode::Options => BodyReqOptions::from_cursor(&mut cursor).map(RequestBody::Options),
            Opcode::Query => BodyReqQuery::from_cursor(&mut cursor).map(RequestBody::Query),
            Opcode::Prepare => BodyReqPrepare::from_cursor(&mut cursor).map(RequestBody::Prepare),
            Opcode::Execute => BodyReqExecute::from_cursor(&mut cursor).map(RequestBody::Execute),
            Opcode::Register => {
                BodyReqRegister::from_cursor(&mut cursor).map(RequestBody::Register)
            }
            Opcode::AuthResponse => {
                BodyReqAuthResponse::from_cursor(&mut cursor).map(RequestBody::AuthResponse)
            }
            _ => Err(format!("opcode {request_type} is not a supported request").into()),
        }
    }
}
