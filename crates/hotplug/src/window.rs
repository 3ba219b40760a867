//! The production notification transport. Device-interface change notifications require a window
//! to deliver to, so this module creates a hidden window and registers it with the
//! [`windows_sys::Win32::UI::WindowsAndMessaging::RegisterDeviceNotificationW`] API.
//!
//! The window lives on whichever thread calls [`UsbListener::start`], and that same thread must
//! drive [`UsbListener::pump_one`]: Win32 message queues are per-thread.
//!
//! [`UsbListener::start`]: crate::listener::UsbListener::start
//! [`UsbListener::pump_one`]: crate::listener::UsbListener::pump_one

use crate::{
    event::{DeviceEventType, InterfaceNotification, USB_DEVICE_INTERFACE},
    listener::EventSink,
    transport::NotificationTransport,
    util::{guid::Guid, wchar::from_wide},
};
use num_traits::FromPrimitive;
use std::{io, sync::Arc, sync::OnceLock};
use tracing::trace;
use windows_sys::Win32::{
    Foundation::*, System::LibraryLoader::GetModuleHandleW, UI::WindowsAndMessaging::*,
};

/// Creating Windows requires the hinstance prop of the WinMain function. To retreive this
/// parameter use [`windows_sys::Win32::System::LibraryLoader::GetModuleHandleW`];
fn hinstance() -> isize {
    // Safety: If the handle is NULL, GetModuleHandle returns a handle to the file used to create
    // the calling process
    unsafe { GetModuleHandleW(std::ptr::null()) }
}

/// The name of our window class.
/// [See also](https://learn.microsoft.com/en-us/windows/win32/winmsg/about-window-classes)
const WINDOW_CLASS_NAME: *const u16 = windows_sys::w!("UsbHotplugListener");

/// Register the window class once per process. A zero atom means registration failed and the
/// subsequent CreateWindowExW reports the OS error.
fn window_class() -> u16 {
    static WINDOW_CLASS_ATOM: OnceLock<u16> = OnceLock::new();
    *WINDOW_CLASS_ATOM.get_or_init(|| {
        let class = WNDCLASSEXW {
            style: 0,
            hIcon: 0,
            cbSize: std::mem::size_of::<WNDCLASSEXW>() as _,
            hIconSm: 0,
            hCursor: 0,
            cbClsExtra: 0,
            cbWndExtra: 0,
            hInstance: hinstance(),
            lpszMenuName: std::ptr::null(),
            lpszClassName: WINDOW_CLASS_NAME,
            lpfnWndProc: Some(hotplug_window_procedure),
            hbrBackground: 0,
        };
        unsafe { RegisterClassExW(&class as *const _) }
    })
}

/// Window procedure for responding to windows messages and listening for device notifications.
/// The window's user data is a pointer to the [`EventSink`] owned by the receiver.
unsafe extern "system" fn hotplug_window_procedure(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    let ptr = GetWindowLongPtrW(hwnd, GWLP_USERDATA) as *const EventSink;
    if ptr.is_null() {
        return DefWindowProcW(hwnd, msg, wparam, lparam);
    }
    match msg {
        // Safety: lparam is a DEV_BROADCAST_HDR when msg is WM_DEVICECHANGE
        WM_DEVICECHANGE => {
            if let Some(notification) = unsafe { parse_device_change(wparam as _, lparam) } {
                (*ptr).dispatch(notification);
            }
            // TRUE grants removal queries; for the committed kinds the return value is ignored
            TRUE as LRESULT
        }
        WM_DESTROY => {
            // The sink is owned by the receiver, not the window; only clear the pointer so a
            // late message cannot reach a dead sink
            SetLastError(0);
            SetWindowLongPtrW(hwnd, GWLP_USERDATA, 0);
            0
        }
        _ => DefWindowProcW(hwnd, msg, wparam, lparam),
    }
}

/// Decode a WM_DEVICECHANGE into a raw notification. Broadcasts without an interface payload
/// (unknown wparam codes, null lparam, non-interface device types) decode to `None` and fall
/// through to default handling.
///
/// Safety: lparam must be null or point to a valid DEV_BROADCAST_HDR.
unsafe fn parse_device_change(event: u32, lparam: LPARAM) -> Option<InterfaceNotification> {
    let kind = DeviceEventType::from_u32(event)?;
    let header = lparam as *const DEV_BROADCAST_HDR;
    if header.is_null() || (*header).dbch_devicetype != DBT_DEVTYP_DEVICEINTERFACE {
        return None;
    }
    let interface = &*(lparam as *const DEV_BROADCAST_DEVICEINTERFACE_W);
    let name = from_wide(interface.dbcc_name.as_ptr());
    Some(InterfaceNotification::new(
        kind,
        Guid::from(interface.dbcc_classguid),
        name.to_string_lossy(),
    ))
}

/// A RAII guard for a window which will destroy the window when dropped
struct Window(HWND);
impl Drop for Window {
    fn drop(&mut self) {
        let _ = unsafe { DestroyWindow(self.0) };
    }
}

/// Device notification handles returned by
/// [`windows_sys::Win32::UI::WindowsAndMessaging::RegisterDeviceNotificationW`] must be closed by
/// calling the [`windows_sys::Win32::UI::WindowsAndMessaging::UnregisterDeviceNotification`]
/// function when they are no longer needed.
///
/// This struct is a RAII guard to ensure notification handles are properly closed
struct RegistrationHandle(HDEVNOTIFY);
impl Drop for RegistrationHandle {
    fn drop(&mut self) {
        let _ = unsafe { UnregisterDeviceNotification(self.0) };
    }
}

// Safety: HDEVNOTIFY is a process-scoped registration handle; the guard only closes it
unsafe impl Send for RegistrationHandle {}

/// The receiver handle of the window transport. Field order matters: the registration must be
/// released before the window is destroyed, and the sink must outlive the window so the pointer
/// stored in the window's user data stays valid.
pub struct WindowReceiver {
    registration: Option<RegistrationHandle>,
    window: Window,
    _sink: Arc<EventSink>,
}

/// Transport over a hidden window and the per-thread Win32 message queue
pub struct WindowTransport;

impl NotificationTransport for WindowTransport {
    type Receiver = WindowReceiver;

    fn create_receiver(&self, sink: Arc<EventSink>) -> io::Result<WindowReceiver> {
        let _atom = window_class();
        let handle = unsafe {
            CreateWindowExW(
                WS_EX_APPWINDOW,                    // styleEx
                WINDOW_CLASS_NAME,                  // class name
                windows_sys::w!("UsbHotplug"),      // window name
                WS_MINIMIZE,                        // style
                0,                                  // x
                0,                                  // y
                CW_USEDEFAULT,                      // width
                CW_USEDEFAULT,                      // height
                0,                                  // parent
                0,                                  // menu
                hinstance(),                        // instance
                std::ptr::null(),                   // data
            )
        };
        let window = match handle {
            0 => return Err(io::Error::last_os_error()),
            handle => Window(handle),
        };
        // NOTE a 0 is returned if there is a failure, or if the previous pointer was NULL. To
        // distinguish if a true error has occured we have to clear any errors and test the
        // last_os_error == 0 or not.
        let prev = unsafe {
            SetLastError(0);
            SetWindowLongPtrW(window.0, GWLP_USERDATA, Arc::as_ptr(&sink) as isize)
        };
        if prev == 0 {
            match unsafe { GetLastError() } {
                0 => {}
                raw => return Err(io::Error::from_raw_os_error(raw as i32)),
            }
        }
        trace!("created hotplug notification window");
        Ok(WindowReceiver {
            registration: None,
            window,
            _sink: sink,
        })
    }

    fn register(&self, receiver: &mut WindowReceiver) -> io::Result<()> {
        // Windows supports class-narrow subscriptions, so subscribe to the USB interface class
        // directly; the sink still enforces the class filter.
        // Safety: We initialize the DEV_BROADCAST_DEVICEINTERFACE_W header correctly before use.
        let handle = unsafe {
            let mut iface = std::mem::zeroed::<DEV_BROADCAST_DEVICEINTERFACE_W>();
            iface.dbcc_size = std::mem::size_of::<DEV_BROADCAST_DEVICEINTERFACE_W>() as _;
            iface.dbcc_devicetype = DBT_DEVTYP_DEVICEINTERFACE;
            iface.dbcc_classguid = USB_DEVICE_INTERFACE.into();
            RegisterDeviceNotificationW(
                receiver.window.0,
                &iface as *const _ as _,
                DEVICE_NOTIFY_WINDOW_HANDLE,
            )
        };
        match handle.is_null() {
            false => {
                receiver.registration = Some(RegistrationHandle(handle));
                trace!("registered for usb device notifications");
                Ok(())
            }
            true => Err(io::Error::last_os_error()),
        }
    }

    fn pump_one(&self, receiver: &mut WindowReceiver) -> bool {
        // Broadcast WM_DEVICECHANGE messages are sent rather than posted, so the OS delivers
        // them to the window procedure during the peek call itself. The return value reports
        // whether a posted message was dispatched.
        let mut msg: MSG = unsafe { std::mem::zeroed() };
        match unsafe { PeekMessageW(&mut msg, receiver.window.0, 0, 0, PM_REMOVE) } {
            0 => false,
            _ => {
                unsafe {
                    TranslateMessage(&msg as *const _);
                    DispatchMessageW(&msg as *const _);
                }
                true
            }
        }
    }

    fn destroy_receiver(&self, receiver: WindowReceiver) {
        // Guard drop order unregisters the notification, destroys the window, then releases the
        // sink reference
        drop(receiver);
    }
}
