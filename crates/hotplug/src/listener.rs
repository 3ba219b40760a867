//! The hotplug listener: a pollable, callback-driven source of USB attach/detach events.
//!
//! The listener owns a single notification receiver created through a
//! [`NotificationTransport`]. It performs no threading of its own; exactly one caller-owned
//! thread must drive [`UsbListener::pump_one`] in its loop, and the registered callback runs
//! synchronously on that thread. After construction, `start`/`stop`/`pump_one` and callback
//! replacement belong to the pump thread by convention.

use crate::{
    event::{DeviceEvent, DeviceEventType, InterfaceNotification, USB_DEVICE_INTERFACE},
    transport::NotificationTransport,
};
use parking_lot::Mutex;
use std::{io, sync::Arc};
use tracing::{debug, trace};

/// Invoked once per qualifying notification with the device path and the plug direction (true
/// for arrival). Must return quickly; long running work starves the message pump. Must not drive
/// the listener lifecycle or replace the callback from inside the invocation.
pub type DeviceChangeCallback = Box<dyn FnMut(&str, bool) + Send + 'static>;

/// A failed [`UsbListener::start`] attempt. The listener is left uninitialized and may be
/// retried; no partially-created receiver survives a failure.
#[derive(thiserror::Error, Debug)]
pub enum StartError {
    #[error("could not create notification receiver => {0}")]
    ReceiverCreation(#[source] io::Error),
    #[error("could not register for device notifications => {0}")]
    Registration(#[source] io::Error),
}

/// Shared filtering/dispatch state between the listener and the transport's message handler.
///
/// This is the entire protocol logic of the listener: gate on committed change kinds, require an
/// exact USB interface-class match, then hand the event to the callback.
pub struct EventSink {
    callback: Mutex<Option<DeviceChangeCallback>>,
}

impl EventSink {
    fn new() -> Self {
        Self {
            callback: Mutex::new(None),
        }
    }

    fn set(&self, callback: Option<DeviceChangeCallback>) {
        *self.callback.lock() = callback;
    }

    /// Filter a raw notification and invoke the callback for qualifying events.
    ///
    /// Transient sub-kinds (query remove and friends) are not committed changes and are ignored,
    /// as is any payload whose class is not the USB device interface. A qualifying event with no
    /// callback registered is dropped, not queued.
    pub fn dispatch(&self, notification: InterfaceNotification) {
        let plug_on = match notification.kind {
            DeviceEventType::Arrival => true,
            DeviceEventType::RemoveComplete => false,
            kind => {
                trace!(%kind, "ignoring transient device change");
                return;
            }
        };
        if notification.class != USB_DEVICE_INTERFACE {
            trace!(class = %notification.class, "ignoring non-usb interface");
            return;
        }
        let event = DeviceEvent {
            name: notification.name,
            plug_on,
        };
        match self.callback.lock().as_mut() {
            Some(callback) => {
                debug!(%event, "usb device change");
                callback(&event.name, event.plug_on);
            }
            None => trace!(%event, "no callback registered, dropping event"),
        }
    }
}

/// A USB hotplug event source over some [`NotificationTransport`].
///
/// Production code uses the process-wide [`UsbListener::instance`]; tests construct their own
/// over a fake transport via [`UsbListener::with_transport`].
pub struct UsbListener<T: NotificationTransport> {
    transport: T,
    sink: Arc<EventSink>,
    /// The receiver slot doubles as the initialized flag
    receiver: Mutex<Option<T::Receiver>>,
}

impl<T: NotificationTransport> UsbListener<T> {
    /// Create a listener over the given transport. The listener starts without a callback and
    /// without a receiver; call [`set_device_change_callback`] and [`start`].
    ///
    /// [`set_device_change_callback`]: UsbListener::set_device_change_callback
    /// [`start`]: UsbListener::start
    pub fn with_transport(transport: T) -> Self {
        Self {
            transport,
            sink: Arc::new(EventSink::new()),
            receiver: Mutex::new(None),
        }
    }

    /// Replace the current callback. May be called before or after [`UsbListener::start`]; a
    /// callback set after start takes effect for subsequent events only.
    pub fn set_device_change_callback<F>(&self, callback: F)
    where
        F: FnMut(&str, bool) + Send + 'static,
    {
        self.sink.set(Some(Box::new(callback)));
    }

    /// Remove the current callback. Qualifying events are silently dropped until a new callback
    /// is registered.
    pub fn clear_device_change_callback(&self) {
        self.sink.set(None);
    }

    /// Create the notification receiver and subscribe it to device-interface changes.
    ///
    /// Idempotent: returns success immediately when already started. On a registration failure
    /// the partially-created receiver is released before returning, so a failed start leaves
    /// nothing behind and may be retried.
    pub fn start(&self) -> Result<(), StartError> {
        let mut slot = self.receiver.lock();
        if slot.is_some() {
            trace!("listener already started");
            return Ok(());
        }
        let mut receiver = self
            .transport
            .create_receiver(Arc::clone(&self.sink))
            .map_err(StartError::ReceiverCreation)?;
        if let Err(error) = self.transport.register(&mut receiver) {
            self.transport.destroy_receiver(receiver);
            return Err(StartError::Registration(error));
        }
        *slot = Some(receiver);
        debug!("usb hotplug listener started");
        Ok(())
    }

    /// Destroy the receiver, implicitly unsubscribing at the OS level. No-op when never started;
    /// safe to call repeatedly. Teardown errors are swallowed.
    pub fn stop(&self) {
        if let Some(receiver) = self.receiver.lock().take() {
            self.transport.destroy_receiver(receiver);
            debug!("usb hotplug listener stopped");
        }
    }

    /// Retrieve and dispatch at most one pending notification without blocking. Qualifying
    /// notifications invoke the callback synchronously before this call returns. Returns whether
    /// a message was dispatched; never fails (a stopped listener simply does nothing).
    pub fn pump_one(&self) -> bool {
        match self.receiver.lock().as_mut() {
            Some(receiver) => self.transport.pump_one(receiver),
            None => false,
        }
    }
}

impl<T: NotificationTransport> Drop for UsbListener<T> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(windows)]
impl UsbListener<crate::window::WindowTransport> {
    /// The process-wide listener over the hidden-window transport, constructed lazily on first
    /// access. Safe under concurrent first calls; every call returns the same instance. The
    /// instance lives for the process lifetime unless explicitly stopped.
    pub fn instance() -> &'static Self {
        static INSTANCE: std::sync::OnceLock<UsbListener<crate::window::WindowTransport>> =
            std::sync::OnceLock::new();
        INSTANCE.get_or_init(|| UsbListener::with_transport(crate::window::WindowTransport))
    }
}
