//! wchar
//!
//! Helpers for dealing with Os u16 chars

use std::ffi::OsString;
use std::os::windows::ffi::OsStringExt;

/// Convert a u16 array into an OsString.
///
/// Safety: The u16 array must be null terminated
pub unsafe fn from_wide(ptr: *const u16) -> OsString {
    let mut seek = ptr;
    loop {
        if *seek == 0 {
            break;
        } else {
            seek = seek.add(1);
        }
    }
    let len = (seek as usize - ptr as usize) / std::mem::size_of::<u16>();
    OsString::from_wide(std::slice::from_raw_parts(ptr, len))
}
