use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{Error, Result};
use crate::frame::{Flags, Frame, FrameHeader, Opcode, HEADER_LEN};

/// Reads a single frame. Server `ERROR` frames are still returned as frames, since they need to
/// be routed to the request which caused them.
pub async fn parse_frame<T: AsyncRead + Unpin>(reader: &mut T) -> Result<Frame> {
    let mut header_bytes = [0; HEADER_LEN];
    reader.read_exact(&mut header_bytes).await?;

    let header = FrameHeader::from_bytes(&header_bytes)?;

    let mut body_bytes = vec![0; header.length];
    reader.read_exact(&mut body_bytes).await?;

    if header.flags.contains(Flags::COMPRESSION) {
        return Err(Error::General(
            "Received a compressed frame, but compression was never negotiated!".into(),
        ));
    }

    Frame::from_header_and_body(header, &body_bytes)
}

/// Converts `ERROR` frames into [`Error::Server`].
pub fn convert_frame_into_result(frame: Frame, addr: SocketAddr) -> Result<Frame> {
    match frame.opcode {
        Opcode::Error => {
            let body = frame
                .response_body()?
                .into_error()
                .ok_or_else(|| Error::General("Error opcode without an error body!".into()))?;

            Err(Error::Server { body, addr })
        }
        _ => Ok(frame),
    }
}
