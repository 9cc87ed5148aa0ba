//! Control-message envelope.
//!
//! Routing metadata (type, result code, length) travels next to the payload
//! in an explicit value rather than in bytes preceding the payload buffer.
//! Transports that need one flat buffer use [`Envelope::encode_frame`]:
//!
//! ```text
//! type(1) code(4, i32 BE) length(4, i32 BE) payload(length)
//! ```

use std::net::Ipv4Addr;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use vgrid_core::{Handle, MsgType, ResultCode};

use crate::wire::{WireError, need};

/// Size of the frame header written by [`Envelope::encode_frame`].
pub const HEADER_LEN: usize = 9;

/// One control message as handed to a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub msg_type: MsgType,
    pub code: ResultCode,
    pub payload: Bytes,
    /// Connection for responses, caller token for commands.
    pub handle: Option<Handle>,
    /// Destination worker of a command. `None` for responses, which go
    /// back over `handle`.
    pub dnode: Option<Ipv4Addr>,
}

impl Envelope {
    pub fn command(dnode: Ipv4Addr, msg_type: MsgType, payload: Bytes, handle: Option<Handle>) -> Self {
        Self {
            msg_type,
            code: ResultCode::Success,
            payload,
            handle,
            dnode: Some(dnode),
        }
    }

    pub fn response(conn: Handle, msg_type: MsgType, code: ResultCode, payload: Bytes) -> Self {
        Self {
            msg_type,
            code,
            payload,
            handle: Some(conn),
            dnode: None,
        }
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    pub fn is_response(&self) -> bool {
        self.msg_type.is_response()
    }

    /// Flatten into header + payload.
    pub fn encode_frame(&self) -> Result<Bytes, WireError> {
        let len = i32::try_from(self.payload.len()).map_err(|_| WireError::TooLong {
            what: "frame payload",
            len: self.payload.len(),
        })?;
        let mut buf = BytesMut::with_capacity(HEADER_LEN + self.payload.len());
        buf.put_u8(self.msg_type.as_u8());
        buf.put_i32(self.code.as_i32());
        buf.put_i32(len);
        buf.put_slice(&self.payload);
        Ok(buf.freeze())
    }

    /// Parse a flat frame. Handle and destination are not part of the frame
    /// and come back as `None`.
    pub fn decode_frame(frame: &[u8]) -> Result<Self, WireError> {
        need(frame, HEADER_LEN, "frame header")?;
        let mut header = &frame[..HEADER_LEN];
        let raw_type = header.get_u8();
        let raw_code = header.get_i32();
        let declared = header.get_i32();

        let msg_type = MsgType::from_u8(raw_type).ok_or(WireError::UnknownMsgType(raw_type))?;
        let code = ResultCode::from_i32(raw_code).ok_or(WireError::UnknownResultCode(raw_code))?;

        let body = &frame[HEADER_LEN..];
        if declared < 0 || declared as usize != body.len() {
            return Err(WireError::LengthMismatch {
                declared: i64::from(declared),
                actual: body.len(),
            });
        }

        Ok(Self {
            msg_type,
            code,
            payload: Bytes::copy_from_slice(body),
            handle: None,
            dnode: None,
        })
    }
}
