//! Device change notification model. The notification source hands the listener raw
//! [`InterfaceNotification`] records; the listener filters them down to [`DeviceEvent`]s for the
//! registered callback.

use crate::{guid, util::guid::Guid};
use num_derive::FromPrimitive;
use std::fmt;

/// The device-interface class identifier for USB devices (GUID_DEVINTERFACE_USB_DEVICE). Only
/// notifications whose class matches this value byte-for-byte reach the callback.
pub const USB_DEVICE_INTERFACE: Guid =
    guid!(0xA5DCBF10, 0x6530, 0x11D2, 0x90, 0x1F, 0x00, 0xC0, 0x4F, 0xB9, 0x51, 0xED);

/// The change-kind tag of a device broadcast. The discriminants are the Windows `DBT_DEVICE*`
/// broadcast codes, so the window procedure can decode the wparam directly.
#[derive(FromPrimitive, Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum DeviceEventType {
    Arrival = 0x8000,
    QueryRemove = 0x8001,
    QueryRemoveFailed = 0x8002,
    RemovePending = 0x8003,
    RemoveComplete = 0x8004,
    CustomEvent = 0x8006,
}

impl fmt::Display for DeviceEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Arrival => write!(f, "device arrival"),
            Self::QueryRemove => write!(f, "device query remove"),
            Self::QueryRemoveFailed => write!(f, "device query remove failed"),
            Self::RemovePending => write!(f, "device remove pending"),
            Self::RemoveComplete => write!(f, "device remove complete"),
            Self::CustomEvent => write!(f, "device custom event"),
        }
    }
}

/// A raw device-interface notification as produced by a [`NotificationTransport`].
///
/// [`NotificationTransport`]: crate::transport::NotificationTransport
#[derive(Clone, Debug)]
pub struct InterfaceNotification {
    /// The change-kind tag of the broadcast
    pub kind: DeviceEventType,
    /// The device-interface class of the payload
    pub class: Guid,
    /// The device path. IE: `\\?\USB#VID_0483&PID_5740#...`
    pub name: String,
}

impl InterfaceNotification {
    pub fn new<N>(kind: DeviceEventType, class: Guid, name: N) -> Self
    where
        N: Into<String>,
    {
        Self {
            kind,
            class,
            name: name.into(),
        }
    }
}

/// A USB attach or detach occurrence. Transient, exists for the duration of one callback
/// invocation (or one stream item).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceEvent {
    /// The device path of the interface that changed
    pub name: String,
    /// True when the device arrived, false when removal completed
    pub plug_on: bool,
}

impl fmt::Display for DeviceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.plug_on {
            true => write!(f, "{} arrived", self.name),
            false => write!(f, "{} removed", self.name),
        }
    }
}
