//! Response framing
//!
//! Every request is answered by exactly one frame:
//!
//! ```text
//! frame  := u32 body_len | body
//! body   := 0                                  (done)
//!         | 1 code:u8 message:str              (error)
//!         | 2 ncols:u32 str* nrows:u32 row*    (table)
//! row    := str{ncols}
//! str    := u32 len | utf-8 bytes
//! ```
//!
//! All integers are big-endian.

use std::io::Read;

use byteorder::{BigEndian, ReadBytesExt};
use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{Error, ErrorCode, Result};

const TAG_DONE: u8 = 0;
const TAG_ERROR: u8 = 1;
const TAG_TABLE: u8 = 2;

/// Upper bound on a frame body accepted by [`read_frame`]
pub const MAX_FRAME_BYTES: usize = 64 * 1024 * 1024;

/// Column names and stringified cells of a result table
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// One server reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Done,
    Error { code: ErrorCode, message: String },
    Table(ResultSet),
}

impl From<&Error> for Response {
    fn from(err: &Error) -> Self {
        Response::Error {
            code: err.code(),
            message: err.to_string(),
        }
    }
}

impl From<Error> for Response {
    fn from(err: Error) -> Self {
        Response::from(&err)
    }
}

impl Response {
    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error { .. })
    }

    /// Encode as a complete frame, length prefix included
    pub fn encode(&self) -> Bytes {
        let mut body = BytesMut::new();
        match self {
            Response::Done => body.put_u8(TAG_DONE),
            Response::Error { code, message } => {
                body.put_u8(TAG_ERROR);
                body.put_u8(code.as_u8());
                put_str(&mut body, message);
            }
            Response::Table(set) => {
                body.put_u8(TAG_TABLE);
                body.put_u32(set.columns.len() as u32);
                for column in &set.columns {
                    put_str(&mut body, column);
                }
                body.put_u32(set.rows.len() as u32);
                for row in &set.rows {
                    for cell in row {
                        put_str(&mut body, cell);
                    }
                }
            }
        }

        let mut frame = BytesMut::with_capacity(body.len() + 4);
        frame.put_u32(body.len() as u32);
        frame.extend_from_slice(&body);
        frame.freeze()
    }

    /// Decode a frame body (without its length prefix)
    pub fn decode(mut body: &[u8]) -> Result<Self> {
        let buf = &mut body;
        let tag = get_u8(buf)?;
        let response = match tag {
            TAG_DONE => Response::Done,
            TAG_ERROR => {
                let raw = get_u8(buf)?;
                let code = ErrorCode::from_u8(raw)
                    .ok_or_else(|| Error::Protocol(format!("unknown error code {}", raw)))?;
                Response::Error {
                    code,
                    message: get_str(buf)?,
                }
            }
            TAG_TABLE => {
                let ncols = get_u32(buf)? as usize;
                let mut columns = Vec::with_capacity(ncols.min(1024));
                for _ in 0..ncols {
                    columns.push(get_str(buf)?);
                }
                let nrows = get_u32(buf)? as usize;
                let mut rows = Vec::with_capacity(nrows.min(1024));
                for _ in 0..nrows {
                    let mut row = Vec::with_capacity(ncols);
                    for _ in 0..ncols {
                        row.push(get_str(buf)?);
                    }
                    rows.push(row);
                }
                Response::Table(ResultSet { columns, rows })
            }
            other => return Err(Error::Protocol(format!("unknown response tag {}", other))),
        };

        if buf.has_remaining() {
            return Err(Error::Protocol(format!(
                "{} trailing bytes after response",
                buf.remaining()
            )));
        }
        Ok(response)
    }
}

/// Read one length-prefixed frame from a blocking reader and decode it
pub fn read_frame<R: Read>(reader: &mut R) -> Result<Response> {
    let len = reader.read_u32::<BigEndian>()? as usize;
    if len > MAX_FRAME_BYTES {
        return Err(Error::Protocol(format!(
            "response frame of {} bytes exceeds limit",
            len
        )));
    }
    let mut body = vec![0u8; len];
    reader.read_exact(&mut body)?;
    Response::decode(&body)
}

fn put_str(buf: &mut BytesMut, s: &str) {
    buf.put_u32(s.len() as u32);
    buf.put_slice(s.as_bytes());
}

fn truncated() -> Error {
    Error::Protocol("truncated response frame".to_string())
}

fn get_u8(buf: &mut &[u8]) -> Result<u8> {
    if buf.remaining() < 1 {
        return Err(truncated());
    }
    Ok(buf.get_u8())
}

fn get_u32(buf: &mut &[u8]) -> Result<u32> {
    if buf.remaining() < 4 {
        return Err(truncated());
    }
    Ok(buf.get_u32())
}

fn get_str(buf: &mut &[u8]) -> Result<String> {
    let len = get_u32(buf)? as usize;
    if buf.remaining() < len {
        return Err(truncated());
    }
    let bytes = buf.copy_to_bytes(len);
    String::from_utf8(bytes.to_vec())
        .map_err(|e| Error::Protocol(format!("invalid UTF-8 in response: {}", e)))
}
