//! Watch USB attach/detach events until interrupted

#[cfg(windows)]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    use tracing::info;
    use tracing_subscriber::{filter::LevelFilter, fmt, layer::SubscriberExt, prelude::*};
    use usb_hotplug::{extract_vendor_product, UsbListener};

    // Log to stdout
    let stdout = fmt::layer()
        .compact()
        .with_ansi(true)
        .with_level(true)
        .with_target(true);
    tracing_subscriber::registry()
        .with(stdout)
        .with(LevelFilter::DEBUG)
        .init();

    let listener = UsbListener::instance();
    listener.set_device_change_callback(|name, plug_on| match extract_vendor_product(name) {
        Some(ids) => info!(name, plug_on, ?ids, "usb device change"),
        None => info!(name, plug_on, "usb device change"),
    });
    listener.start()?;
    info!("listening for usb hotplug events, press ctrl-c to exit");

    loop {
        if !listener.pump_one() {
            std::thread::sleep(std::time::Duration::from_millis(20));
        }
    }
}

#[cfg(not(windows))]
fn main() {
    eprintln!("this example only runs on Windows");
}
