//! util

pub mod guid;
pub mod vidpid;
#[cfg(windows)]
pub mod wchar;
