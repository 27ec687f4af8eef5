//! NUL-delimited JSON frame codec over any `Read`/`Write` stream.
//!
//! Each frame is: `[0x00][json payload][0x00]`. Consecutive NUL bytes are
//! empty frames and are skipped by the reader.

use std::io::{self, Read, Write};

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Frame delimiter.
const DELIMITER: u8 = 0;

/// Default maximum frame payload (4 MiB).
pub const MAX_FRAME: usize = 4 * 1024 * 1024;

/// Encodes `msg` as a NUL-delimited JSON frame and writes it to `w`.
pub fn encode<W: Write>(w: &mut W, msg: &impl Serialize) -> io::Result<()> {
    let payload =
        serde_json::to_vec(msg).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    w.write_all(&[DELIMITER])?;
    w.write_all(&payload)?;
    w.write_all(&[DELIMITER])?;
    w.flush()
}

/// Reads one frame from `r` and decodes it, using the default [`MAX_FRAME`] limit.
pub fn decode<T: DeserializeOwned>(r: &mut impl Read) -> io::Result<T> {
    decode_with_limit(r, MAX_FRAME)
}

/// Reads one frame of at most `limit` payload bytes from `r` and decodes it.
pub fn decode_with_limit<T: DeserializeOwned>(r: &mut impl Read, limit: usize) -> io::Result<T> {
    let frame = read_frame(r, limit)?;
    serde_json::from_slice(&frame).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Reads bytes up to the next non-empty frame boundary.
fn read_frame(r: &mut impl Read, limit: usize) -> io::Result<Vec<u8>> {
    let mut frame = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        match r.read(&mut byte) {
            Ok(0) => {
                let msg = if frame.is_empty() {
                    "stream closed before a frame arrived"
                } else {
                    "stream closed in the middle of a frame"
                };
                return Err(io::Error::new(io::ErrorKind::UnexpectedEof, msg));
            }
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }

        if byte[0] == DELIMITER {
            if frame.is_empty() {
                continue;
            }
            return Ok(frame);
        }
        if frame.len() >= limit {
            skip_frame(r)?;
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("frame exceeds {limit} byte limit"),
            ));
        }
        frame.push(byte[0]);
    }
}

/// Discards bytes through the next delimiter so the stream stays aligned.
fn skip_frame(r: &mut impl Read) -> io::Result<()> {
    let mut byte = [0u8; 1];
    loop {
        match r.read(&mut byte) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "stream closed in the middle of an oversized frame",
                ));
            }
            Ok(_) if byte[0] == DELIMITER => return Ok(()),
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{InvokeReq, Request, Response};

    #[test]
    fn list_request_is_nul_delimited() {
        let mut buf = Vec::new();
        encode(&mut buf, &Request::List).unwrap();
        assert_eq!(buf, b"\0{\"type\":\"list\"}\0");
    }

    #[test]
    fn invoke_request_wire_shape() {
        let req = Request::Invoke(InvokeReq {
            device_id: "0f1e".into(),
            name: "list".into(),
            parameters: vec![serde_json::json!("left")],
        });

        let mut buf = Vec::new();
        encode(&mut buf, &req).unwrap();
        assert_eq!(buf.first(), Some(&0));
        assert_eq!(buf.last(), Some(&0));

        let json: serde_json::Value = serde_json::from_slice(&buf[1..buf.len() - 1]).unwrap();
        assert_eq!(json["type"], "invoke");
        assert_eq!(json["data"]["deviceId"], "0f1e");
        assert_eq!(json["data"]["name"], "list");
        assert_eq!(json["data"]["parameters"][0], "left");
    }

    #[test]
    fn skips_empty_frames() {
        let wire = b"\0\0\0{\"type\":\"result\",\"data\":7}\0";
        let mut cursor = io::Cursor::new(&wire[..]);
        let resp: Response = decode(&mut cursor).unwrap();
        assert!(matches!(resp, Response::Result(v) if v == 7));
    }

    #[test]
    fn reads_consecutive_frames() {
        let mut buf = Vec::new();
        encode(&mut buf, &Response::Error("first".into())).unwrap();
        encode(&mut buf, &Response::Result(serde_json::Value::Null)).unwrap();

        let mut cursor = io::Cursor::new(&buf);
        let first: Response = decode(&mut cursor).unwrap();
        let second: Response = decode(&mut cursor).unwrap();
        assert!(matches!(first, Response::Error(m) if m == "first"));
        assert!(matches!(second, Response::Result(serde_json::Value::Null)));
    }

    #[test]
    fn eof_reports_unexpected_eof() {
        let mut empty = io::Cursor::new(&b""[..]);
        let err = decode::<Response>(&mut empty).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);

        let mut truncated = io::Cursor::new(&b"\0{\"type\":"[..]);
        let err = decode::<Response>(&mut truncated).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn rejects_oversized_frame() {
        let wire = b"\0{\"type\":\"result\",\"data\":\"0123456789\"}\0";
        let mut cursor = io::Cursor::new(&wire[..]);
        let err = decode_with_limit::<Response>(&mut cursor, 16).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn oversized_frame_is_skipped_whole() {
        let mut buf = Vec::new();
        encode(&mut buf, &Response::Result(serde_json::json!("x".repeat(64)))).unwrap();
        encode(&mut buf, &Response::Result(serde_json::json!("next"))).unwrap();

        let mut cursor = io::Cursor::new(&buf);
        let err = decode_with_limit::<Response>(&mut cursor, 32).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);

        let resp: Response = decode_with_limit(&mut cursor, 32).unwrap();
        assert_eq!(resp, Response::Result(serde_json::json!("next")));
    }

    #[test]
    fn rejects_malformed_json() {
        let mut cursor = io::Cursor::new(&b"\0not json\0"[..]);
        let err = decode::<Response>(&mut cursor).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
