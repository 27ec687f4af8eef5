//! Blocking client for a JSON device bus.
//!
//! `hlbus` opens a bus endpoint (typically a virtio console such as
//! `/dev/hvc0`), discovers devices by the capabilities they advertise, and
//! invokes their methods, decoding each response into a [`Value`] tree owned
//! by a [`CommandResult`].
//!
//! # Quick start
//!
//! ```no_run
//! use hlbus::{Bus, inventory::Inventory};
//!
//! let mut bus = Bus::open("/dev/hvc0").expect("failed to open bus");
//! let mut inv = Inventory::find(&mut bus)
//!     .expect("discovery failed")
//!     .expect("no inventory device");
//!
//! for stack in inv.items("left").expect("listing failed") {
//!     println!("{stack}");
//! }
//! ```

mod bus;
mod error;
pub mod inventory;
#[cfg(unix)]
mod serial;
mod transport;
pub mod value;

pub use bus::{Bus, BusBuilder, DEFAULT_ADDRESS, Device, Discovery};
pub use error::{Error, Result};
pub use hlbus_proto::{MethodEntry, ParameterEntry};
#[cfg(unix)]
pub use serial::SerialTransport;
pub use transport::{MemoryHandle, MemoryTransport, Transport};
pub use value::{CommandResult, Value};
