//! Best-effort extraction of USB vendor/product ids from a device path.
//!
//! Device interface paths encode the ids in a fixed lexical pattern, IE:
//! `\\?\USB#VID_0483&PID_5740#6D8B6A5&0#{a5dcbf10-...}`. Parsing is a convenience for callback
//! implementors and never sits on the event dispatch path.

use std::fmt;

/// The vendor/product id pair of a USB device
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct UsbVidPid {
    vid: u16,
    pid: u16,
}

impl UsbVidPid {
    pub fn new(vid: u16, pid: u16) -> Self {
        Self { vid, pid }
    }

    pub fn vid(&self) -> u16 {
        self.vid
    }

    pub fn pid(&self) -> u16 {
        self.pid
    }

    pub fn matches(&self, vid: u16, pid: u16) -> bool {
        vid == self.vid && pid == self.pid
    }
}

impl fmt::Debug for UsbVidPid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UsbVidPid")
            .field("vid", &format_args!("{:0>4X}", self.vid))
            .field("pid", &format_args!("{:0>4X}", self.pid))
            .finish()
    }
}

/// Scan a device identifier for the case-insensitive pattern `USB#VID_xxxx&PID_xxxx` (four hex
/// digits per group) and parse the ids. Returns `None` when no full match exists anywhere in the
/// identifier. Pure function, no side effects.
pub fn extract_vendor_product(identifier: &str) -> Option<UsbVidPid> {
    let bytes = identifier.as_bytes();
    let mut offset = 0;
    while let Some(at) = find_ignore_ascii_case(&bytes[offset..], b"USB#VID_") {
        let start = offset + at;
        if let Some(ids) = parse_at(bytes, start) {
            return Some(ids);
        }
        // A prefix without valid groups behind it, keep scanning
        offset = start + 1;
    }
    None
}

fn parse_at(bytes: &[u8], start: usize) -> Option<UsbVidPid> {
    let vid_at = start + b"USB#VID_".len();
    let vid = hex4(bytes.get(vid_at..vid_at + 4)?)?;
    let sep = bytes.get(vid_at + 4..vid_at + 9)?;
    if !sep.eq_ignore_ascii_case(b"&PID_") {
        return None;
    }
    let pid = hex4(bytes.get(vid_at + 9..vid_at + 13)?)?;
    Some(UsbVidPid::new(vid, pid))
}

fn hex4(digits: &[u8]) -> Option<u16> {
    if !digits.iter().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let s = std::str::from_utf8(digits).ok()?;
    u16::from_str_radix(s, 16).ok()
}

fn find_ignore_ascii_case(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window.eq_ignore_ascii_case(needle))
}
