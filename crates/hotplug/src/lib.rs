//! USB device attach/detach detection without polling hardware.
//!
//! The [`listener::UsbListener`] owns a hidden notification receiver, filters incoming
//! device-interface change notifications down to USB arrivals and removals, and re-dispatches
//! each qualifying event to a caller-supplied callback. The listener performs no threading of
//! its own: the caller drives [`listener::UsbListener::pump_one`] from its own loop and the
//! callback runs synchronously on that thread.
//!
//! The OS transport sits behind the [`transport::NotificationTransport`] seam; production code
//! uses the hidden-window transport in [`window`], tests inject a fake.

#[cfg(test)]
mod tests;

pub mod event;
pub mod listener;
pub mod stream;
pub mod transport;
pub mod util;
#[cfg(windows)]
pub mod window;

pub use event::{DeviceEvent, DeviceEventType, InterfaceNotification, USB_DEVICE_INTERFACE};
pub use listener::{DeviceChangeCallback, EventSink, StartError, UsbListener};
pub use stream::DeviceEventStream;
pub use transport::NotificationTransport;
pub use util::vidpid::{extract_vendor_product, UsbVidPid};
#[cfg(windows)]
pub use window::WindowTransport;
