//! Inventory listing and its output formats.

use std::io::Write;

use anyhow::{Context, Result};
use hlbus::Bus;
use hlbus::inventory::{self, Inventory};

/// How a listing is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Format {
    /// One `(<count>x <id>)` line per non-empty slot.
    Lines,
    /// The device's response, pretty-printed.
    Json,
}

/// Writes the usage banner shown when no side is given.
pub(crate) fn usage(out: &mut impl Write) -> Result<()> {
    writeln!(out, "LiSt Items")?;
    writeln!(out, "Usage: lsitems <side>")?;
    Ok(())
}

/// Diagnostic printed when no inventory device is on the bus.
pub(crate) const MISSING_DEVICE: &str = "This program requires a Inventory Operations Module.";

/// Finds the inventory device on `bus` and lists `side`.
pub(crate) fn run(bus: &mut Bus, side: &str, format: Format, out: &mut impl Write) -> Result<()> {
    let device = bus
        .find_device(inventory::CAPABILITY)
        .require(inventory::CAPABILITY)
        .context(MISSING_DEVICE)?;

    tracing::debug!(device = device.id(), side, "listing inventory");
    let mut inv = Inventory::new(bus, device);
    let listing = inv
        .list(side)
        .with_context(|| format!("listing side `{side}` failed"))?;

    match format {
        Format::Json => {
            serde_json::to_writer_pretty(&mut *out, listing.value())?;
            writeln!(out)?;
        }
        Format::Lines => {
            let slots = inventory::decode_slots(&listing)
                .with_context(|| format!("unreadable listing for side `{side}`"))?;
            for stack in slots.iter().flatten() {
                writeln!(out, "{stack}")?;
            }
        }
    }

    listing.release();
    Ok(())
}
