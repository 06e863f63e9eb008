//! Input port capability
//!
//! The engine only talks to MIDI hardware through these two traits, so the
//! driver behind them can deliver by callback or by polling.

use std::fmt;

use crate::error::PortError;

/// Driver-assigned device identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(pub usize);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An enumerated MIDI input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    pub id: DeviceId,
    pub name: String,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

/// A MIDI input subsystem
///
/// Owned by the engine thread for its whole life. Dropping it releases the
/// driver.
pub trait InputBackend: Send {
    /// List the available input devices
    fn enumerate(&mut self) -> Result<Vec<Device>, PortError>;

    /// Open a device for reading
    ///
    /// May fail with [`PortError::AlreadyOpen`] for a device that was closed
    /// earlier; [`InputBackend::reset`] clears that condition.
    fn open(&mut self, id: DeviceId) -> Result<Box<dyn InputHandle>, PortError>;

    /// Tear down and reinitialize the whole subsystem
    fn reset(&mut self) -> Result<(), PortError>;
}

/// An open input stream
pub trait InputHandle {
    fn device(&self) -> &Device;

    /// Next raw message, if one is waiting. Never blocks.
    fn poll(&mut self) -> Option<Vec<u8>>;

    /// Close the stream. Consumes the handle so it cannot be polled again.
    fn close(self: Box<Self>);
}

/// Find a device by index (`"2"`) or by case-insensitive name substring
pub fn find_device<'a>(devices: &'a [Device], selector: &str) -> Option<&'a Device> {
    let selector = selector.trim();
    if let Ok(index) = selector.parse::<usize>() {
        if let Some(device) = devices.iter().find(|d| d.id.0 == index) {
            return Some(device);
        }
    }

    let pattern = selector.to_lowercase();
    devices
        .iter()
        .find(|d| d.name.to_lowercase().contains(&pattern))
}
