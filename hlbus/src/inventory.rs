//! Typed access to devices advertising `inventory_operations`.
//!
//! The `list` command returns one entry per inventory slot: `null` for an
//! empty slot, otherwise an object with at least a string `id` and an
//! integer `Count`.

use serde_json::Value;

use crate::bus::{Bus, Device, Discovery};
use crate::error::{Error, Result};
use crate::value::{self, CommandResult};

/// Capability name advertised by inventory devices.
pub const CAPABILITY: &str = "inventory_operations";

/// Selector of the slot listing command.
pub const LIST_SELECTOR: &str = "list";

/// A stack of identical items in one slot.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct ItemStack {
    /// Item identifier (e.g. `minecraft:stone`).
    pub id: String,
    /// Number of items in the stack.
    pub count: i64,
}

impl ItemStack {
    /// Decodes one non-empty slot.
    fn from_value(slot: &Value) -> Result<Self> {
        Ok(Self {
            id: value::require_str(slot, "id")?.to_owned(),
            count: value::require_i64(slot, "Count")?,
        })
    }
}

impl std::fmt::Display for ItemStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}x {})", self.count, self.id)
    }
}

/// An inventory device bound to the bus it was found on.
#[derive(Debug)]
pub struct Inventory<'b> {
    /// Bus used for every call.
    bus: &'b mut Bus,
    /// The inventory device.
    device: Device,
}

impl<'b> Inventory<'b> {
    /// Finds the first inventory device on `bus`.
    ///
    /// Returns `Ok(None)` when no device advertises [`CAPABILITY`].
    pub fn find(bus: &'b mut Bus) -> Result<Option<Self>> {
        match bus.try_find_device(CAPABILITY)? {
            Discovery::Found(device) => Ok(Some(Self { bus, device })),
            Discovery::NotFound => Ok(None),
        }
    }

    /// Binds an already discovered device.
    pub const fn new(bus: &'b mut Bus, device: Device) -> Self {
        Self { bus, device }
    }

    /// The underlying device.
    pub const fn device(&self) -> &Device {
        &self.device
    }

    /// Runs the raw listing command for `side`.
    pub fn list(&mut self, side: &str) -> Result<CommandResult> {
        self.bus
            .call(&self.device, LIST_SELECTOR, Value::String(side.to_owned()))
    }

    /// Lists every slot on `side`; empty slots are `None`.
    pub fn list_items(&mut self, side: &str) -> Result<Vec<Option<ItemStack>>> {
        decode_slots(&self.list(side)?)
    }

    /// Lists the non-empty slots on `side`, in slot order.
    pub fn items(&mut self, side: &str) -> Result<Vec<ItemStack>> {
        Ok(self.list_items(side)?.into_iter().flatten().collect())
    }
}

/// Decodes a listing response into slots.
///
/// A non-array response, or a non-null slot missing `id` or `Count`, is an
/// [`Error::Protocol`].
pub fn decode_slots(result: &CommandResult) -> Result<Vec<Option<ItemStack>>> {
    if !result.value().is_array() {
        return Err(Error::Protocol(format!(
            "listing must be an array, got {}",
            value::kind(result.value())
        )));
    }

    let mut slots = Vec::new();
    let mut failure = None;
    result.for_each(|slot| {
        if failure.is_some() {
            return;
        }
        match slot {
            Value::Null => slots.push(None),
            other => match ItemStack::from_value(other) {
                Ok(stack) => slots.push(Some(stack)),
                Err(e) => failure = Some(e),
            },
        }
    });

    match failure {
        Some(Error::Protocol(msg)) => Err(Error::Protocol(format!("slot {}: {msg}", slots.len()))),
        Some(e) => Err(e),
        None => Ok(slots),
    }
}
