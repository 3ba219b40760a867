//! guid

use std::fmt;

/// A 16-byte globally unique identifier, laid out like the Win32 `GUID` but usable on any
/// platform so the notification filter can be tested without the OS transport.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct Guid {
    pub data1: u32,
    pub data2: u16,
    pub data3: u16,
    pub data4: [u8; 8],
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let d = &self.data4;
        write!(
            f,
            "{:08X}-{:04X}-{:04X}-{:02X}{:02X}-{:02X}{:02X}{:02X}{:02X}{:02X}{:02X}",
            self.data1, self.data2, self.data3, d[0], d[1], d[2], d[3], d[4], d[5], d[6], d[7]
        )
    }
}

impl fmt::Debug for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

#[cfg(windows)]
impl From<windows_sys::core::GUID> for Guid {
    fn from(value: windows_sys::core::GUID) -> Self {
        Self {
            data1: value.data1,
            data2: value.data2,
            data3: value.data3,
            data4: value.data4,
        }
    }
}

#[cfg(windows)]
impl From<Guid> for windows_sys::core::GUID {
    fn from(value: Guid) -> Self {
        windows_sys::core::GUID {
            data1: value.data1,
            data2: value.data2,
            data3: value.data3,
            data4: value.data4,
        }
    }
}

/// Initializes a [`Guid`] from literal values.
#[macro_export]
macro_rules! guid {
    (
        $a:expr,
        $b:expr,
        $c:expr,
        $d0:expr,
        $d1:expr,
        $d2:expr,
        $d3:expr,
        $d4:expr,
        $d5:expr,
        $d6:expr,
        $d7:expr
    ) => {
        $crate::util::guid::Guid {
            data1: $a,
            data2: $b,
            data3: $c,
            data4: [$d0, $d1, $d2, $d3, $d4, $d5, $d6, $d7],
        }
    };
}
