use std::io::Cursor;

use crate::error;
use crate::frame::events::ServerEvent;
use crate::frame::{Frame, FromCursor, Opcode, Serialize, Version, EVENT_STREAM_ID};

#[derive(Debug, Clone, Ord, PartialOrd, Eq, PartialEq, Hash)]
pub struct BodyResEvent {
    pub event: ServerEvent,
}

impl Serialize for BodyResEvent {
    #[inline]
    fn serialize(&self, cursor: &mut Cursor<&mut Vec<u8>>) {
        self.event.serialize(cursor);
    }
}

impl FromCursor for BodyResEvent {
    fn from_cursor(cursor: &mut Cursor<&[u8]>) -> error::Result<BodyResEvent> {
        let event = ServerEvent::from_cursor(cursor)?;
        Ok(BodyResEvent { event })
    }
}

impl Frame {
    /// Creates a server-pushed event frame, always sent on the event stream.
    pub fn new_res_event(version: Version, event: ServerEvent) -> Frame {
        let body = BodyResEvent { event };
        Frame::new_response(version, Opcode::Event, EVENT_STREAM_ID, body.serialize_to_vec())
    }
}
