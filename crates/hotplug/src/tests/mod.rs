use crate::{
    event::{DeviceEventType, InterfaceNotification, USB_DEVICE_INTERFACE},
    guid,
    listener::EventSink,
    transport::NotificationTransport,
    util::guid::Guid,
};
use crossbeam::queue::SegQueue;
use std::{
    io,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

mod listener;

/// The serial port interface class, used as a non-USB class in filter tests
pub(crate) const PORTS_INTERFACE: Guid =
    guid!(0x4D36E978, 0xE325, 0x11CE, 0xBF, 0xC1, 0x08, 0x00, 0x2B, 0xE1, 0x03, 0x18);

pub(crate) fn usb(kind: DeviceEventType, name: &str) -> InterfaceNotification {
    InterfaceNotification::new(kind, USB_DEVICE_INTERFACE, name)
}

/// A deterministic notification transport. Tests inject synthetic notifications and each pump
/// feeds exactly one of them to the sink, mirroring the non-blocking peek of the production
/// transport. Clones share the queue and counters so tests keep a handle after handing the
/// transport to the listener.
#[derive(Clone, Default)]
pub(crate) struct FakeTransport {
    pending: Arc<SegQueue<InterfaceNotification>>,
    registrations: Arc<AtomicUsize>,
    destroyed: Arc<AtomicUsize>,
}

pub(crate) struct FakeReceiver {
    sink: Arc<EventSink>,
}

impl FakeTransport {
    pub fn inject(&self, notification: InterfaceNotification) {
        self.pending.push(notification);
    }

    pub fn registrations(&self) -> usize {
        self.registrations.load(Ordering::SeqCst)
    }

    pub fn destroyed(&self) -> usize {
        self.destroyed.load(Ordering::SeqCst)
    }
}

impl NotificationTransport for FakeTransport {
    type Receiver = FakeReceiver;

    fn create_receiver(&self, sink: Arc<EventSink>) -> io::Result<FakeReceiver> {
        Ok(FakeReceiver { sink })
    }

    fn register(&self, _receiver: &mut FakeReceiver) -> io::Result<()> {
        self.registrations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn pump_one(&self, receiver: &mut FakeReceiver) -> bool {
        match self.pending.pop() {
            Some(notification) => {
                receiver.sink.dispatch(notification);
                true
            }
            None => false,
        }
    }

    fn destroy_receiver(&self, receiver: FakeReceiver) {
        self.destroyed.fetch_add(1, Ordering::SeqCst);
        drop(receiver);
    }
}
