//! Stream adapter over the callback contract. [`UsbListener::events`] installs a callback that
//! buffers qualifying events into a lock-free queue and wakes the consumer; the caller still
//! drives the pump, so this is a convenience surface rather than a second delivery path.

use crate::{event::DeviceEvent, listener::UsbListener, transport::NotificationTransport};
use crossbeam::queue::SegQueue;
use futures::Stream;
use parking_lot::Mutex;
use std::{
    pin::Pin,
    sync::Arc,
    task::{Context, Poll, Waker},
};
use tracing::trace;

struct Shared {
    queue: SegQueue<DeviceEvent>,
    waker: Mutex<Option<Waker>>,
}

impl Shared {
    fn new() -> Self {
        Self {
            queue: SegQueue::new(),
            waker: Mutex::new(None),
        }
    }

    fn try_wake(&self) {
        if let Some(waker) = self.waker.lock().as_ref() {
            waker.wake_by_ref()
        }
    }

    fn register(&self, context: &Context<'_>) {
        let new_waker = context.waker();
        let mut waker = self.waker.lock();
        *waker = match waker.take() {
            None => Some(new_waker.clone()),
            Some(old_waker) => {
                if old_waker.will_wake(new_waker) {
                    Some(old_waker)
                } else {
                    Some(new_waker.clone())
                }
            }
        }
    }
}

/// A stream of USB device events, backed by the listener's callback slot. Never terminates; it
/// yields events for as long as the listener is started and pumped.
pub struct DeviceEventStream(Arc<Shared>);

impl Stream for DeviceEventStream {
    type Item = DeviceEvent;
    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.0.register(cx);
        match self.0.queue.pop() {
            Some(event) => {
                trace!(%event, "stream event");
                Poll::Ready(Some(event))
            }
            None => Poll::Pending,
        }
    }
}

impl<T: NotificationTransport> UsbListener<T> {
    /// Expose qualifying events as a [`futures::Stream`]. Replaces any registered callback; the
    /// pump thread pushes events and the consumer is woken per push.
    pub fn events(&self) -> DeviceEventStream {
        let ours = Arc::new(Shared::new());
        let theirs = Arc::clone(&ours);
        self.set_device_change_callback(move |name, plug_on| {
            theirs.queue.push(DeviceEvent {
                name: name.to_owned(),
                plug_on,
            });
            theirs.try_wake();
        });
        DeviceEventStream(ours)
    }
}
