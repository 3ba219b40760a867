use super::{usb, FakeTransport, PORTS_INTERFACE};
use crate::{
    event::{DeviceEventType, InterfaceNotification},
    listener::{StartError, UsbListener},
    transport::MockNotificationTransport,
};
use parking_lot::Mutex;
use std::{io, sync::Arc};

const DEVICE: &str = "USB#VID_0483&PID_5740";

type Events = Arc<Mutex<Vec<(String, bool)>>>;

fn recording_listener(transport: FakeTransport) -> (UsbListener<FakeTransport>, Events) {
    let events: Events = Arc::new(Mutex::new(Vec::new()));
    let listener = UsbListener::with_transport(transport);
    let sink = Arc::clone(&events);
    listener.set_device_change_callback(move |name, plug_on| {
        sink.lock().push((name.to_owned(), plug_on));
    });
    (listener, events)
}

#[test]
fn arrival_then_removal_then_stop() {
    let transport = FakeTransport::default();
    let (listener, events) = recording_listener(transport.clone());
    listener.start().unwrap();

    transport.inject(usb(DeviceEventType::Arrival, DEVICE));
    assert!(listener.pump_one());
    assert_eq!(events.lock().as_slice(), &[(DEVICE.to_owned(), true)]);

    transport.inject(usb(DeviceEventType::RemoveComplete, DEVICE));
    assert!(listener.pump_one());
    assert_eq!(
        events.lock().as_slice(),
        &[(DEVICE.to_owned(), true), (DEVICE.to_owned(), false)]
    );

    // After stop the pump reaches no transport and pending notifications go nowhere
    listener.stop();
    transport.inject(usb(DeviceEventType::Arrival, DEVICE));
    assert!(!listener.pump_one());
    assert_eq!(events.lock().len(), 2);
}

#[test]
fn non_usb_class_never_reaches_callback() {
    let transport = FakeTransport::default();
    let (listener, events) = recording_listener(transport.clone());
    listener.start().unwrap();

    for kind in [
        DeviceEventType::Arrival,
        DeviceEventType::RemoveComplete,
        DeviceEventType::QueryRemove,
    ] {
        transport.inject(InterfaceNotification::new(kind, PORTS_INTERFACE, "COM4"));
        assert!(listener.pump_one());
    }
    assert!(events.lock().is_empty());
}

#[test]
fn transient_kinds_are_ignored() {
    let transport = FakeTransport::default();
    let (listener, events) = recording_listener(transport.clone());
    listener.start().unwrap();

    for kind in [
        DeviceEventType::QueryRemove,
        DeviceEventType::QueryRemoveFailed,
        DeviceEventType::RemovePending,
        DeviceEventType::CustomEvent,
    ] {
        transport.inject(usb(kind, DEVICE));
        assert!(listener.pump_one());
    }
    assert!(events.lock().is_empty());
}

#[test]
fn event_without_callback_is_dropped_not_deferred() {
    let transport = FakeTransport::default();
    let listener = UsbListener::with_transport(transport.clone());
    listener.start().unwrap();

    transport.inject(usb(DeviceEventType::Arrival, DEVICE));
    assert!(listener.pump_one());

    // A callback registered afterwards sees nothing; the event was dropped, not queued
    let events: Events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    listener.set_device_change_callback(move |name, plug_on| {
        sink.lock().push((name.to_owned(), plug_on));
    });
    assert!(!listener.pump_one());
    assert!(events.lock().is_empty());
}

#[test]
fn start_is_idempotent() {
    let transport = FakeTransport::default();
    let listener = UsbListener::with_transport(transport.clone());
    listener.start().unwrap();
    listener.start().unwrap();
    assert_eq!(transport.registrations(), 1);
}

#[test]
fn stop_is_idempotent() {
    let transport = FakeTransport::default();
    let listener = UsbListener::with_transport(transport.clone());

    // Never started
    listener.stop();
    assert_eq!(transport.destroyed(), 0);

    listener.start().unwrap();
    listener.stop();
    listener.stop();
    assert_eq!(transport.destroyed(), 1);

    // Drop is the safety net and must not double-destroy
    drop(listener);
    assert_eq!(transport.destroyed(), 1);
}

#[test]
fn drop_stops_a_started_listener() {
    let transport = FakeTransport::default();
    let listener = UsbListener::with_transport(transport.clone());
    listener.start().unwrap();
    drop(listener);
    assert_eq!(transport.destroyed(), 1);
}

#[test]
fn pump_before_start_does_nothing() {
    let transport = FakeTransport::default();
    let (listener, events) = recording_listener(transport.clone());
    transport.inject(usb(DeviceEventType::Arrival, DEVICE));
    assert!(!listener.pump_one());
    assert!(events.lock().is_empty());
}

#[test]
fn replacing_the_callback_takes_effect_for_subsequent_events() {
    let transport = FakeTransport::default();
    let (listener, first) = recording_listener(transport.clone());
    listener.start().unwrap();

    transport.inject(usb(DeviceEventType::Arrival, DEVICE));
    assert!(listener.pump_one());
    assert_eq!(first.lock().len(), 1);

    let second: Events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&second);
    listener.set_device_change_callback(move |name, plug_on| {
        sink.lock().push((name.to_owned(), plug_on));
    });

    transport.inject(usb(DeviceEventType::RemoveComplete, DEVICE));
    assert!(listener.pump_one());
    assert_eq!(first.lock().len(), 1);
    assert_eq!(second.lock().as_slice(), &[(DEVICE.to_owned(), false)]);
}

#[test]
fn clearing_the_callback_disables_dispatch() {
    let transport = FakeTransport::default();
    let (listener, events) = recording_listener(transport.clone());
    listener.start().unwrap();
    listener.clear_device_change_callback();

    transport.inject(usb(DeviceEventType::Arrival, DEVICE));
    assert!(listener.pump_one());
    assert!(events.lock().is_empty());
}

#[test]
fn receiver_creation_failure_carries_the_os_error() {
    let mut transport = MockNotificationTransport::new();
    transport
        .expect_create_receiver()
        .times(1)
        .returning(|_| Err(io::Error::from_raw_os_error(8)));

    let listener = UsbListener::with_transport(transport);
    match listener.start().unwrap_err() {
        StartError::ReceiverCreation(error) => assert_eq!(error.raw_os_error(), Some(8)),
        other => panic!("unexpected error {other}"),
    }
    // Still uninitialized, nothing to pump or destroy on drop
    assert!(!listener.pump_one());
}

#[test]
fn registration_failure_releases_the_receiver_and_start_is_retryable() {
    let mut transport = MockNotificationTransport::new();
    let mut seq = mockall::Sequence::new();
    transport
        .expect_create_receiver()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(()));
    transport
        .expect_register()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Err(io::Error::from_raw_os_error(1450)));
    transport
        .expect_destroy_receiver()
        .times(1)
        .in_sequence(&mut seq)
        .return_const(());
    transport
        .expect_create_receiver()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(()));
    transport
        .expect_register()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(()));
    // Drop path of the successful retry
    transport
        .expect_destroy_receiver()
        .times(1)
        .in_sequence(&mut seq)
        .return_const(());

    let listener = UsbListener::with_transport(transport);
    let error = listener.start().unwrap_err();
    assert!(matches!(error, StartError::Registration(_)));
    listener.start().unwrap();
}

#[cfg(windows)]
#[test]
fn instance_is_process_wide() {
    use crate::window::WindowTransport;
    let ours = UsbListener::<WindowTransport>::instance() as *const _ as usize;
    let theirs = std::thread::spawn(|| UsbListener::<WindowTransport>::instance() as *const _ as usize)
        .join()
        .unwrap();
    assert_eq!(ours, theirs);
}
