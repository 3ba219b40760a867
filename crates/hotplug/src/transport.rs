//! The seam between the hotplug listener and the OS notification facility. The production
//! transport lives in [`crate::window`]; tests inject a fake transport that feeds synthetic
//! notifications through the same seam.

use crate::listener::EventSink;
use std::{io, sync::Arc};

/// Abstraction over the OS device-notification transport.
///
/// A transport creates an opaque receiver bound to an [`EventSink`], subscribes it to
/// device-interface change notifications, and retrieves pending messages one at a time without
/// blocking. Class filtering does NOT happen here; the sink applies the USB interface filter so
/// the contract holds no matter how broad the underlying subscription is.
#[cfg_attr(test, mockall::automock(type Receiver = ();))]
pub trait NotificationTransport {
    /// The opaque OS-level message target notifications are delivered to
    type Receiver;

    /// Create a receiver bound to the given sink. Raw notifications retrieved for this receiver
    /// are handed to [`EventSink::dispatch`].
    fn create_receiver(&self, sink: Arc<EventSink>) -> io::Result<Self::Receiver>;

    /// Subscribe the receiver to device-interface change notifications
    fn register(&self, receiver: &mut Self::Receiver) -> io::Result<()>;

    /// Retrieve and dispatch at most one pending notification without blocking. Returns whether
    /// a message was dispatched.
    fn pump_one(&self, receiver: &mut Self::Receiver) -> bool;

    /// Tear down the receiver, implicitly unsubscribing it
    fn destroy_receiver(&self, receiver: Self::Receiver);
}
