mod xkb;

pub use xkb::XkbResolver;

use std::ffi::CStr;

/// The offset between evdev scan codes and xkb keycodes.
pub const EVDEV_OFFSET: u32 = 8;

/// The size of the buffer symbol names are rendered into (including the NUL terminator).
pub const SYMBOL_NAME_MAX_LEN: usize = 64;

/// Translate raw hardware key codes into symbolic key names (e.g. `q`, `Shift_L`).
pub trait SymbolResolver: Send {
    fn resolve(&self, code: u16) -> String;
}

impl<F> SymbolResolver for F
where
    F: Fn(u16) -> String + Send,
{
    fn resolve(&self, code: u16) -> String {
        self(code)
    }
}

/// Read the NUL-terminated name written into `buf`.
///
/// If the name fills the whole buffer without a terminator, the entire buffer is used.
pub(crate) fn name_from_buffer(buf: &[u8]) -> String {
    match CStr::from_bytes_until_nul(buf) {
        Ok(name) => name.to_string_lossy().into_owned(),
        Err(_) => String::from_utf8_lossy(buf).into_owned(),
    }
}
