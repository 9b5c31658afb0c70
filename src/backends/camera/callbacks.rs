// SPDX-License-Identifier: GPL-3.0-only

//! Hardware callbacks
//!
//! Hardware reports asynchronous outcomes through these objects. Each callback
//! turns the outcome into an event on the lifecycle queue, tagged with the
//! generation of the start attempt it belongs to, so the actor can recognise
//! outcomes that arrive after a stop or restart.
//!
//! A [`DeviceStateCallback`] stays valid after the device has opened: the
//! hardware keeps it for the lifetime of the device and reports later
//! disconnections and errors through it.

use super::lifecycle::Event;
use super::{HardwareDevice, HardwareSession};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

/// Receives the state changes of a device passed to `CameraHardware::open_device`
#[derive(Clone)]
pub struct DeviceStateCallback {
    generation: u64,
    events: UnboundedSender<Event>,
}

impl DeviceStateCallback {
    pub(crate) fn new(generation: u64, events: UnboundedSender<Event>) -> Self {
        Self { generation, events }
    }

    /// The device is open and owned by the receiver from now on
    pub fn opened(&self, device: Box<dyn HardwareDevice>) {
        let event = Event::DeviceOpened {
            generation: self.generation,
            device,
        };
        if let Err(err) = self.events.send(event) {
            // Nobody left to own the device
            if let Event::DeviceOpened { mut device, .. } = err.0 {
                debug!(camera = device.id(), "Lifecycle gone, closing late device");
                if let Err(e) = device.close() {
                    warn!(error = %e, "Failed to close orphaned device");
                }
            }
        }
    }

    /// The device went away, before or after it opened
    pub fn disconnected(&self) {
        let _ = self.events.send(Event::DeviceDisconnected {
            generation: self.generation,
        });
    }

    pub fn error(&self, code: i32) {
        let _ = self.events.send(Event::DeviceError {
            generation: self.generation,
            code,
        });
    }
}

/// Receives the outcome of `HardwareDevice::create_capture_session`
pub struct SessionStateCallback {
    generation: u64,
    events: UnboundedSender<Event>,
}

impl SessionStateCallback {
    pub(crate) fn new(generation: u64, events: UnboundedSender<Event>) -> Self {
        Self { generation, events }
    }

    pub fn configured(self, session: Box<dyn HardwareSession>) {
        let event = Event::SessionConfigured {
            generation: self.generation,
            session,
        };
        if let Err(err) = self.events.send(event)
            && let Event::SessionConfigured { mut session, .. } = err.0
        {
            let _ = session.close();
        }
    }

    pub fn configure_failed(self) {
        let _ = self.events.send(Event::SessionConfigureFailed {
            generation: self.generation,
        });
    }
}
