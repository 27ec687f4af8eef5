//! Wire protocol for hlbus host↔bus communication.
//!
//! Messages are JSON documents framed by NUL bytes (`\0{...}\0`), suitable
//! for any reliable byte stream (virtio console, serial line, pipe).

mod codec;
mod message;

pub use codec::{MAX_FRAME, decode, decode_with_limit, encode};
pub use message::{DeviceEntry, InvokeReq, MethodEntry, ParameterEntry, Request, Response};
