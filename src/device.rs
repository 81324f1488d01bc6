//! Audio input device management
//!
//! Tracks the current snapshot of audio input devices and the user's
//! selection. A refresh replaces the snapshot wholesale; a failed
//! enumeration records a permission error and leaves the previous snapshot
//! untouched, so the UI keeps showing the last known device list.

use crate::{Error, Result};
use std::sync::RwLock;
use tracing::{debug, warn};

/// One enumerated audio input device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioInputDevice {
    /// Stable identifier used to reopen the device
    pub id: String,

    /// Human-readable label; empty when the platform withholds it
    /// (no capture permission yet)
    pub label: String,

    /// Whether this is the system default input
    pub is_default: bool,
}

impl AudioInputDevice {
    /// Devices without a usable label cannot be offered for selection
    pub fn is_selectable(&self) -> bool {
        !self.label.is_empty()
    }
}

/// Current snapshot of input devices and selection
#[derive(Debug, Clone, Default)]
pub struct DeviceSnapshot {
    /// Enumerated input devices
    pub devices: Vec<AudioInputDevice>,

    /// Selected device id, if any
    pub selected: Option<String>,
}

/// Manages audio input device enumeration and selection
#[derive(Debug, Default)]
pub struct DeviceInputManager {
    snapshot: RwLock<DeviceSnapshot>,
    permission_error: RwLock<Option<String>>,
}

impl DeviceInputManager {
    /// Create a manager with an empty snapshot
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-enumerate audio input devices, replacing the snapshot.
    ///
    /// On failure the previous snapshot is kept and a permission error is
    /// recorded; the caller must invoke refresh again to retry.
    pub fn refresh(&self) -> Result<()> {
        let result = enumerate_input_devices();
        self.apply_refresh(result)
    }

    /// Apply an enumeration result to the snapshot
    fn apply_refresh(&self, result: Result<Vec<AudioInputDevice>>) -> Result<()> {
        match result {
            Ok(devices) => {
                let mut snapshot = self.snapshot.write().expect("device lock poisoned");
                // Keep the selection only if the device survived the refresh.
                let selected = snapshot.selected.take().filter(|id| {
                    devices
                        .iter()
                        .any(|d| &d.id == id && d.is_selectable())
                });
                debug!(count = devices.len(), "Refreshed audio input devices");
                *snapshot = DeviceSnapshot { devices, selected };
                *self.permission_error.write().expect("device lock poisoned") = None;
                Ok(())
            }
            Err(err) => {
                warn!("Audio input enumeration failed: {}", err);
                let message = err.user_message();
                *self.permission_error.write().expect("device lock poisoned") =
                    Some(message.clone());
                Err(Error::PermissionDenied(message))
            }
        }
    }

    /// Select a device by id
    ///
    /// # Errors
    ///
    /// Fails if the id is unknown or the device has no usable label
    /// (labels are withheld until capture permission is granted).
    pub fn select(&self, device_id: &str) -> Result<()> {
        let mut snapshot = self.snapshot.write().expect("device lock poisoned");
        let device = snapshot
            .devices
            .iter()
            .find(|d| d.id == device_id)
            .ok_or_else(|| Error::DeviceError(format!("Unknown input device: {}", device_id)))?;

        if !device.is_selectable() {
            return Err(Error::DeviceError(
                "Device has no label yet; grant microphone permission and refresh".to_string(),
            ));
        }

        snapshot.selected = Some(device_id.to_string());
        Ok(())
    }

    /// Clear the selection, falling back to the system default
    pub fn clear_selection(&self) {
        self.snapshot
            .write()
            .expect("device lock poisoned")
            .selected = None;
    }

    /// The currently selected device id
    pub fn selected(&self) -> Option<String> {
        self.snapshot
            .read()
            .expect("device lock poisoned")
            .selected
            .clone()
    }

    /// A copy of the current snapshot
    pub fn snapshot(&self) -> DeviceSnapshot {
        self.snapshot.read().expect("device lock poisoned").clone()
    }

    /// The last recorded permission error, if any
    pub fn permission_error(&self) -> Option<String> {
        self.permission_error
            .read()
            .expect("device lock poisoned")
            .clone()
    }
}

/// Enumerate audio input devices through the platform audio stack
#[cfg(feature = "device-cpal")]
fn enumerate_input_devices() -> Result<Vec<AudioInputDevice>> {
    use cpal::traits::{DeviceTrait, HostTrait};

    let host = cpal::default_host();
    let default_name = host
        .default_input_device()
        .and_then(|d| d.name().ok());

    let devices = host
        .input_devices()
        .map_err(|e| Error::PermissionDenied(format!("Failed to enumerate input devices: {}", e)))?;

    let mut out = Vec::new();
    for (idx, device) in devices.enumerate() {
        let name = device.name().unwrap_or_default();
        out.push(AudioInputDevice {
            id: if name.is_empty() {
                format!("input-{}", idx)
            } else {
                name.clone()
            },
            is_default: default_name.as_deref() == Some(name.as_str()),
            label: name,
        });
    }
    Ok(out)
}

#[cfg(not(feature = "device-cpal"))]
fn enumerate_input_devices() -> Result<Vec<AudioInputDevice>> {
    Err(Error::DeviceError(
        "Built without the device-cpal feature; no audio input backend available".to_string(),
    ))
}
