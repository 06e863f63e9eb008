//! midir-backed MIDI input
//!
//! midir delivers messages on its own callback thread. Each open port gets a
//! channel the callback pushes into, and `poll` drains it, so the engine sees
//! the same non-blocking interface as any polled driver.
//!
//! midir releases a port as soon as its connection is closed, so it never
//! reports a closed device as still open. `AlreadyOpen` only comes back for
//! a device whose connection is still live, which the engine never asks
//! for; in practice the engine's reset-and-retry path is not taken with this
//! backend, and `reset` just forgets the held set and reconnects to the API.

use std::collections::HashSet;
use std::sync::Arc;

use crossbeam::channel::{unbounded, Receiver};
use midir::{Ignore, MidiInput, MidiInputConnection};
use parking_lot::Mutex;
use tracing::{debug, info, trace};

use crate::error::PortError;
use crate::midi::format_hex;
use crate::port::{Device, DeviceId, InputBackend, InputHandle};

/// Devices the driver believes are open
type HeldSet = Arc<Mutex<HashSet<DeviceId>>>;

/// MIDI input through midir
///
/// A fresh midir client is created for every enumeration and connection, so
/// resetting only has to forget which devices were held.
pub struct MidirBackend {
    client_name: String,
    held: HeldSet,
    resets: usize,
}

impl MidirBackend {
    /// Create a backend, checking that the platform MIDI API is reachable
    pub fn new(client_name: impl Into<String>) -> Result<Self, PortError> {
        let client_name = client_name.into();
        Self::client(&client_name, "Check")?;

        Ok(Self {
            client_name,
            held: Arc::new(Mutex::new(HashSet::new())),
            resets: 0,
        })
    }

    fn client(client_name: &str, role: &str) -> Result<MidiInput, PortError> {
        MidiInput::new(&format!("{}-{}", client_name, role))
            .map_err(|e| PortError::Init(e.to_string()))
    }
}

impl InputBackend for MidirBackend {
    fn enumerate(&mut self) -> Result<Vec<Device>, PortError> {
        let midi_in = Self::client(&self.client_name, "Scanner")?;

        let mut devices = Vec::new();
        for (index, port) in midi_in.ports().iter().enumerate() {
            if let Ok(name) = midi_in.port_name(port) {
                devices.push(Device {
                    id: DeviceId(index),
                    name,
                });
            }
        }

        debug!("Found {} MIDI input ports", devices.len());
        Ok(devices)
    }

    fn open(&mut self, id: DeviceId) -> Result<Box<dyn InputHandle>, PortError> {
        if self.held.lock().contains(&id) {
            return Err(PortError::AlreadyOpen(id));
        }

        let mut midi_in = Self::client(&self.client_name, "Input")?;

        // Real-time bytes carry the alternate-octave buttons
        midi_in.ignore(Ignore::None);

        let port = midi_in
            .ports()
            .into_iter()
            .nth(id.0)
            .ok_or(PortError::NotFound(id))?;
        let name = midi_in
            .port_name(&port)
            .map_err(|_| PortError::NotFound(id))?;

        info!("Connecting to input port: {}", name);

        let (tx, rx) = unbounded();
        let connection = midi_in
            .connect(
                &port,
                &self.client_name,
                move |_timestamp, data, _| {
                    // Receiver gone means the port is being closed
                    let _ = tx.send(data.to_vec());
                },
                (),
            )
            .map_err(|e| PortError::Connect {
                device: id,
                reason: e.to_string(),
            })?;

        self.held.lock().insert(id);

        Ok(Box::new(MidirHandle {
            device: Device { id, name },
            connection,
            rx,
            held: Arc::clone(&self.held),
        }))
    }

    fn reset(&mut self) -> Result<(), PortError> {
        self.held.lock().clear();
        self.resets += 1;

        // Make sure the platform API came back
        Self::client(&self.client_name, "Check")?;
        info!("MIDI subsystem reset (#{})", self.resets);
        Ok(())
    }
}

struct MidirHandle {
    device: Device,
    connection: MidiInputConnection<()>,
    rx: Receiver<Vec<u8>>,
    held: HeldSet,
}

impl InputHandle for MidirHandle {
    fn device(&self) -> &Device {
        &self.device
    }

    fn poll(&mut self) -> Option<Vec<u8>> {
        let data = self.rx.try_recv().ok()?;
        trace!("MIDI RX {} | {}", self.device.name, format_hex(&data));
        Some(data)
    }

    fn close(self: Box<Self>) {
        let MidirHandle {
            device,
            connection,
            held,
            ..
        } = *self;

        let _ = connection.close();
        held.lock().remove(&device.id);
        debug!("Input port closed: {}", device.name);
    }
}
