use std::io::Cursor;

use crate::frame::events::ServerEvent;
use crate::frame::message_auth_challenge::BodyResAuthChallenge;
use crate::frame::message_auth_success::BodyResAuthSuccess;
use crate::frame::message_authenticate::BodyResAuthenticate;
use crate::frame::message_error::ErrorBody;
use crate::frame::message_event::BodyResEvent;
use crate::frame::message_result::{
    BodyResResultPrepared, BodyResResultRows, BodyResResultSetKeyspace, ResResultBody, RowsMetadata,
};
use crate::frame::message_supported::BodyResSupported;
use crate::frame::{FromCursor, Opcode, Version};
use crate::types::rows::Row;
use crate::{error, Error};

#[derive(Debug, PartialEq, Eq, Clone)]
#[non_exhaustive]
pub enum ResponseBody {
    Error(ErrorBody),
    Ready,
    Authenticate(BodyResAuthenticate),
    Supported(BodyResSupported),
    Result(ResResultBody),
    Event(BodyResEvent),
    AuthChallenge(BodyResAuthChallenge),
    AuthSuccess(BodyResAuthSuccess),
}

impl ResponseBody {
    pub fn try_from(
        bytes: &[u8],
        response_type: Opcode,
        version: Version,
    ) -> error::Result<ResponseBody> {
        let mut cursor: Cursor<&[u8]> = Cursor::new(bytes);
        match response_type {
            Opcode::Error => ErrorBody::from_cursor(&mut cursor).map(ResponseBody::Error),
            Opcode::Ready => Ok(ResponseBody::Ready),
            Opcode::Authenticate => {
                BodyResAuthenticate::from_cursor(&mut cursor).map(ResponseBody::Authenticate)
            }
            Opcode::Supported => {
                BodyResSupported::from_cursor(&mut cursor).map(ResponseBody::Supported)
            }
            Opcode::Result => {
                ResResultBody::from_cursor_versioned(&mut cursor, version).map(ResponseBody::Result)
            }
            Opcode::Event => BodyResEvent::from_cursor(&mut cursor).map(ResponseBody::Event),
            Opcode::AuthChallenge => {
                BodyResAuthChallenge::from_cursor(&mut cursor).map(ResponseBody::AuthChallenge)
            }
            Opcode::AuthSuccess => {
                BodyResAuthSuccess::from_cursor(&mut cursor).map(ResponseBody::AuthSuccess)
            }
            _ => Err(Error::NonResponseOpcode(response_type)),
        }
    }

    pub fn into_rows(self) -> Option<Vec<Row>> {
        match self {
            ResponseBody::Result(res) => res.into_rows(),
            _ => None,
        }
    }

    pub fn as_rows_metadata(&self) -> Option<&RowsMetadata> {
        match self {
            ResponseBody::Result(res) => res.as_rows_metadata(),
            _ => None,
        }
    }

    pub fn as_cols(&self) -> Option<&BodyResResultRows> {
        match self {
            ResponseBody::Result(ResResultBody::Rows(rows)) => Some(rows),
            _ => None,
        }
    }

    /// Unwraps body and returns BodyResResultPrepared which contains an exact result of
    /// PREPARE query.
    pub fn into_prepared(self) -> Option<BodyResResultPrepared> {
        match self {
            ResponseBody::Result(res) => res.into_prepared(),
            _ => None,
        }
    }

    /// Unwraps body and returns BodyResResultSetKeyspace which contains an exact result of
    /// use keyspace query.
    pub fn into_set_keyspace(self) -> Option<BodyResResultSetKeyspace> {
        match self {
            ResponseBody::Result(res) => res.into_set_keyspace(),
            _ => None,
        }
    }

    /// Unwraps body and returns the pushed server event.
    pub fn into_server_event(self) -> Option<ServerEvent> {
        match self {
            ResponseBody::Event(event) => Some(event.event),
            _ => None,
        }
    }

    pub fn authenticator(&self) -> Option<&str> {
        match self {
            ResponseBody::Authenticate(auth) => Some(auth.data.as_str()),
            _ => None,
        }
    }

    pub fn into_error(self) -> Option<ErrorBody> {
        match self {
            ResponseBody::Error(err) => Some(err),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Frame;
    use crate::types::CBytes;

    #[test]
    fn request_opcode_is_rejected() {
        assert!(matches!(
            ResponseBody::try_from(&[], Opcode::Query, Version::V4),
            Err(Error::NonResponseOpcode(Opcode::Query))
        ));
    }

    #[test]
    fn auth_challenge_body() {
        let frame =
            Frame::new_res_auth_challenge(Version::V4, 3, CBytes::new(b"token".to_vec()));
        assert!(matches!(
            frame.response_body().unwrap(),
            ResponseBody::AuthChallenge(_)
        ));
    }

    #[test]
    fn authenticator_name() {
        let frame = Frame::new_res_authenticate(
            Version::V4,
            0,
            "org.apache.cassandra.auth.PasswordAuthenticator",
        );
        let body = frame.response_body().unwrap();
        assert_eq!(
            body.authenticator(),
            Some("org.apache.cassandra.auth.PasswordAuthenticator")
        );
    }
}
