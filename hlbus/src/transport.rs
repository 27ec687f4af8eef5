//! Byte-stream transports underneath a [`Bus`](crate::Bus).
//!
//! The bus only needs a reliable, ordered, bidirectional byte stream. On a
//! real machine that is a serial-style character device (see
//! [`SerialTransport`](crate::SerialTransport)); [`MemoryTransport`] stands
//! in for it in tests and simulations.

use std::collections::VecDeque;
use std::fmt;
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use serde::de::DeserializeOwned;

/// A bidirectional byte stream the bus can own.
pub trait Transport: Read + Write + fmt::Debug + Send {}

impl<T: Read + Write + fmt::Debug + Send> Transport for T {}

/// State shared between a [`MemoryTransport`] and its [`MemoryHandle`]s.
#[derive(Debug, Default)]
struct Shared {
    /// Bytes the transport will yield to reads.
    input: VecDeque<u8>,
    /// Bytes written through the transport.
    output: Vec<u8>,
    /// Set once the transport itself has been dropped.
    released: bool,
}

/// In-memory transport with scripted input and captured output.
///
/// Reads drain the scripted input and report end-of-stream once it is
/// empty. Writes are appended to a buffer that a [`MemoryHandle`] can
/// inspect after the transport has been handed to a bus.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    /// Buffers shared with handles.
    shared: Arc<Mutex<Shared>>,
}

/// Inspection and scripting handle for a [`MemoryTransport`].
#[derive(Debug, Clone)]
pub struct MemoryHandle {
    /// Buffers shared with the transport.
    shared: Arc<Mutex<Shared>>,
}

impl MemoryTransport {
    /// Creates an empty transport and a handle to script it.
    pub fn new() -> (Self, MemoryHandle) {
        let transport = Self::default();
        let handle = MemoryHandle {
            shared: Arc::clone(&transport.shared),
        };
        (transport, handle)
    }

    /// Locks the shared buffers.
    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Read for MemoryTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut shared = self.lock();
        let n = buf.len().min(shared.input.len());
        for (dst, src) in buf.iter_mut().zip(shared.input.drain(..n)) {
            *dst = src;
        }
        Ok(n)
    }
}

impl Write for MemoryTransport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.lock().output.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for MemoryTransport {
    fn drop(&mut self) {
        self.lock().released = true;
    }
}

impl MemoryHandle {
    /// Locks the shared buffers.
    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends raw bytes to the transport's input.
    pub fn push_bytes(&self, bytes: &[u8]) {
        self.lock().input.extend(bytes);
    }

    /// Appends one encoded frame to the transport's input.
    pub fn push_frame(&self, msg: &impl Serialize) -> io::Result<()> {
        let mut frame = Vec::new();
        hlbus_proto::encode(&mut frame, msg)?;
        self.push_bytes(&frame);
        Ok(())
    }

    /// Returns a copy of everything written so far.
    pub fn written(&self) -> Vec<u8> {
        self.lock().output.clone()
    }

    /// Decodes every frame written so far.
    pub fn written_frames<T: DeserializeOwned>(&self) -> io::Result<Vec<T>> {
        let output = self.written();
        let mut cursor = io::Cursor::new(output.as_slice());
        let mut frames = Vec::new();
        loop {
            match hlbus_proto::decode(&mut cursor) {
                Ok(frame) => frames.push(frame),
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(frames),
                Err(e) => return Err(e),
            }
        }
    }

    /// Number of scripted input bytes not yet consumed.
    pub fn pending_input(&self) -> usize {
        self.lock().input.len()
    }

    /// Whether the transport has been dropped (closed by its owner).
    pub fn is_released(&self) -> bool {
        self.lock().released
    }
}
