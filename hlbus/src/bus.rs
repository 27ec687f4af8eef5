//! Bus handle lifecycle, device discovery, and command invocation.
//!
//! A [`Bus`] owns one transport and performs blocking request/response
//! exchanges over it, one at a time. Devices found on a bus are tied to the
//! session that found them; a descriptor from a closed or different bus is
//! rejected before any I/O.

use std::io::BufReader;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use hlbus_proto::{DeviceEntry, InvokeReq, MAX_FRAME, MethodEntry, Request, Response};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::transport::Transport;
use crate::value::CommandResult;

/// Default bus address inside a guest machine.
pub const DEFAULT_ADDRESS: &str = "/dev/hvc0";

/// Source of unique session ids.
static NEXT_SESSION: AtomicU64 = AtomicU64::new(1);

/// Builder for opening a [`Bus`].
///
/// Defaults: no read timeout, raw terminal mode, 4 MiB frame limit.
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
///
/// let bus = hlbus::Bus::builder("/dev/hvc0")
///     .read_timeout(Duration::from_secs(2))
///     .open()
///     .expect("bus unavailable");
/// ```
#[derive(Debug, Clone)]
#[must_use = "a BusBuilder does nothing until .open() is called"]
pub struct BusBuilder {
    /// Transport address (device path).
    address: String,
    /// Read timeout applied by the serial line discipline.
    read_timeout: Option<Duration>,
    /// Switch terminal endpoints to raw mode.
    raw_mode: bool,
    /// Largest accepted response frame, in bytes.
    max_frame: usize,
}

impl BusBuilder {
    /// Sets a read timeout for serial endpoints (default: block forever).
    pub const fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    /// Enables or disables raw terminal mode (default: enabled).
    pub const fn raw_mode(mut self, enable: bool) -> Self {
        self.raw_mode = enable;
        self
    }

    /// Sets the largest accepted response frame (default: 4 MiB).
    pub const fn max_frame(mut self, bytes: usize) -> Self {
        self.max_frame = bytes;
        self
    }

    /// Opens the address as a serial-style character device.
    #[cfg(unix)]
    pub fn open(self) -> Result<Bus> {
        match crate::serial::SerialTransport::open(&self.address, self.raw_mode, self.read_timeout)
        {
            Ok(transport) => Ok(self.with_transport(transport)),
            Err(source) => Err(Error::Connection {
                address: self.address,
                source,
            }),
        }
    }

    /// Opens the address as a serial-style character device.
    #[cfg(not(unix))]
    pub fn open(self) -> Result<Bus> {
        Err(Error::Connection {
            address: self.address,
            source: std::io::Error::new(
                std::io::ErrorKind::Unsupported,
                "serial buses require a Unix host",
            ),
        })
    }

    /// Attaches an already opened transport.
    pub fn with_transport(self, transport: impl Transport + 'static) -> Bus {
        let session = NEXT_SESSION.fetch_add(1, Ordering::Relaxed);
        tracing::info!(address = %self.address, session, "bus opened");
        Bus {
            address: self.address,
            session,
            max_frame: self.max_frame,
            conn: Some(BufReader::new(Box::new(transport))),
        }
    }
}

/// An open (or closed) handle to a device bus.
///
/// Every operation except [`close`](Self::close) fails with
/// [`Error::InvalidState`] once the handle is closed. Dropping the handle
/// closes it.
#[derive(Debug)]
pub struct Bus {
    /// Address the bus was opened at.
    address: String,
    /// Unique id of this open session.
    session: u64,
    /// Largest accepted response frame.
    max_frame: usize,
    /// Buffered transport; `None` once closed.
    conn: Option<BufReader<Box<dyn Transport>>>,
}

impl Bus {
    /// Returns a builder for a bus at `address`.
    pub fn builder(address: impl Into<String>) -> BusBuilder {
        BusBuilder {
            address: address.into(),
            read_timeout: None,
            raw_mode: true,
            max_frame: MAX_FRAME,
        }
    }

    /// Opens the bus at `address` with default settings.
    pub fn open(address: impl Into<String>) -> Result<Self> {
        Self::builder(address).open()
    }

    /// Wraps an already opened transport with default settings.
    pub fn with_transport(address: impl Into<String>, transport: impl Transport + 'static) -> Self {
        Self::builder(address).with_transport(transport)
    }

    /// The address this bus was opened at.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Whether the handle is still open.
    pub const fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    /// Releases the transport. Closing twice is a no-op.
    pub fn close(&mut self) {
        if self.conn.take().is_some() {
            tracing::info!(address = %self.address, session = self.session, "bus closed");
        }
    }

    /// Enumerates every device on the bus, in bus order.
    pub fn devices(&mut self) -> Result<Vec<Device>> {
        match self.exchange(&Request::List)? {
            Response::List(entries) => Ok(entries
                .into_iter()
                .map(|entry| Device::from_entry(entry, self.session))
                .collect()),
            other => Err(unexpected("list", &other)),
        }
    }

    /// Looks for the first device, in bus order, advertising `capability`.
    ///
    /// Absence is `Ok(Discovery::NotFound)`; errors mean the bus itself
    /// could not be queried.
    pub fn try_find_device(&mut self, capability: &str) -> Result<Discovery> {
        let found = self
            .devices()?
            .into_iter()
            .find(|device| device.has_capability(capability));

        match found {
            Some(device) => {
                tracing::debug!(capability, device = %device.id, "device found");
                Ok(Discovery::Found(device))
            }
            None => {
                tracing::debug!(capability, "no device advertises capability");
                Ok(Discovery::NotFound)
            }
        }
    }

    /// Looks for the first device advertising `capability`; never fails.
    ///
    /// A closed handle or a failed query is logged and reported as
    /// [`Discovery::NotFound`]. Use [`try_find_device`](Self::try_find_device)
    /// to tell the two apart.
    pub fn find_device(&mut self, capability: &str) -> Discovery {
        self.try_find_device(capability).unwrap_or_else(|e| {
            tracing::warn!(capability, error = %e, "device discovery failed");
            Discovery::NotFound
        })
    }

    /// Lists the methods a device exposes.
    pub fn methods(&mut self, device: &Device) -> Result<Vec<MethodEntry>> {
        self.check_session(device)?;
        match self.exchange(&Request::Methods(device.id.clone()))? {
            Response::Methods(methods) => Ok(methods),
            other => Err(unexpected("methods", &other)),
        }
    }

    /// Invokes `selector` on a discovered device.
    ///
    /// Fails with [`Error::Precondition`] without touching the bus when the
    /// device was not found. `args` becomes the parameter list: an array is
    /// used as is, `null` means no parameters, and any other value is the
    /// single parameter.
    pub fn invoke(
        &mut self,
        target: &Discovery,
        selector: &str,
        args: Value,
    ) -> Result<CommandResult> {
        let device = target.device().ok_or_else(|| {
            Error::Precondition(format!("cannot invoke `{selector}` on an absent device"))
        })?;
        self.call(device, selector, args)
    }

    /// Invokes `selector` on a device found on this bus.
    pub fn call(&mut self, device: &Device, selector: &str, args: Value) -> Result<CommandResult> {
        self.check_session(device)?;

        let req = Request::Invoke(InvokeReq {
            device_id: device.id.clone(),
            name: selector.to_owned(),
            parameters: parameters(args),
        });
        tracing::debug!(device = %device.id, selector, "invoke");

        match self.exchange(&req)? {
            Response::Result(value) => Ok(CommandResult::new(value)),
            other => Err(unexpected("result", &other)),
        }
    }

    /// Rejects descriptors produced by another bus session.
    fn check_session(&self, device: &Device) -> Result<()> {
        if device.session == self.session {
            Ok(())
        } else {
            Err(Error::Precondition(format!(
                "device {} belongs to another bus session",
                device.id
            )))
        }
    }

    /// Sends one request and waits for its response.
    ///
    /// A transport failure can leave part of a reply in flight, so the handle
    /// is closed rather than risk pairing a later request with a stale reply.
    fn exchange(&mut self, req: &Request) -> Result<Response> {
        let max_frame = self.max_frame;
        let conn = self.conn.as_mut().ok_or(Error::InvalidState)?;

        tracing::trace!(?req, "send");
        let outcome: Result<Response> = hlbus_proto::encode(conn.get_mut(), req)
            .map_err(Error::Transport)
            .and_then(|()| {
                hlbus_proto::decode_with_limit(conn, max_frame).map_err(Error::from_exchange)
            });

        match outcome {
            Ok(resp) => {
                tracing::trace!(?resp, "recv");
                Ok(resp)
            }
            Err(e @ Error::Transport(_)) => {
                tracing::warn!(
                    address = %self.address,
                    error = %e,
                    "exchange failed; closing bus"
                );
                self.close();
                Err(e)
            }
            Err(e) => Err(e),
        }
    }
}

impl Drop for Bus {
    fn drop(&mut self) {
        self.close();
    }
}

/// Maps an off-script response to an error.
fn unexpected(expected: &str, resp: &Response) -> Error {
    match resp {
        Response::Error(reason) => Error::Device(reason.clone()),
        other => Error::Protocol(format!(
            "expected {expected} response, got {}",
            response_name(other)
        )),
    }
}

/// Wire name of a response type.
const fn response_name(resp: &Response) -> &'static str {
    match resp {
        Response::List(_) => "list",
        Response::Methods(_) => "methods",
        Response::Result(_) => "result",
        Response::Error(_) => "error",
        _ => "unknown",
    }
}

/// Turns invocation arguments into a positional parameter list.
fn parameters(args: Value) -> Vec<Value> {
    match args {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        other => vec![other],
    }
}

/// A device reachable on an open bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    /// Bus-assigned device id.
    id: String,
    /// Capability names the device advertises.
    capabilities: Vec<String>,
    /// Session of the bus that reported the device.
    session: u64,
}

impl Device {
    /// Builds a descriptor from a list entry.
    fn from_entry(entry: DeviceEntry, session: u64) -> Self {
        Self {
            id: entry.device_id,
            capabilities: entry.type_names,
            session,
        }
    }

    /// The bus-assigned device id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Capability names the device advertises.
    pub fn capabilities(&self) -> &[String] {
        &self.capabilities
    }

    /// Whether the device advertises `name`.
    pub fn has_capability(&self, name: &str) -> bool {
        self.capabilities.iter().any(|c| c == name)
    }
}

/// Result of looking a device up by capability.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(clippy::exhaustive_enums, variant_size_differences)]
pub enum Discovery {
    /// A device advertising the capability.
    Found(Device),
    /// No device on the bus advertises the capability.
    NotFound,
}

impl Discovery {
    /// Whether a device was found.
    pub const fn exists(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    /// Borrows the found device.
    pub const fn device(&self) -> Option<&Device> {
        match self {
            Self::Found(device) => Some(device),
            Self::NotFound => None,
        }
    }

    /// Returns the device, or [`Error::Precondition`] naming `capability`.
    pub fn require(self, capability: &str) -> Result<Device> {
        match self {
            Self::Found(device) => Ok(device),
            Self::NotFound => Err(Error::Precondition(format!(
                "no device advertises `{capability}`"
            ))),
        }
    }
}
