use std::os::raw::c_char;
use std::ptr::{self, NonNull};

use tracing::debug;
use xkbcommon_dl::{
    xkb_context, xkb_context_flags, xkb_keymap, xkb_keymap_compile_flags, xkb_state,
    xkbcommon_option, XkbCommon,
};

use super::{name_from_buffer, SymbolResolver, EVDEV_OFFSET, SYMBOL_NAME_MAX_LEN};
use crate::error::{LayoutStep, TrackerError};
use crate::TrackerResult;

/// A symbol resolver backed by the system keyboard layout.
///
/// libxkbcommon is loaded at runtime. The keymap is compiled from the default rules, model,
/// layout, variant and options (honouring the `XKB_DEFAULT_*` variables).
pub struct XkbResolver {
    // Fields are dropped in declaration order: state, then keymap, then context.
    state: State,
    _keymap: Keymap,
    _context: Context,
}

// The xkb objects are exclusively owned by the resolver and never shared, so moving them to
// the capture task is sound.
unsafe impl Send for XkbResolver {}

impl XkbResolver {
    pub fn new() -> TrackerResult<Self> {
        let api = xkbcommon_option().ok_or(TrackerError::LayoutUnavailable)?;

        // If a later step fails, the objects created so far are released on return.
        let context = Context::new(api)?;
        let keymap = Keymap::new(api, &context)?;
        let state = State::new(api, &keymap)?;

        debug!("compiled the default keymap");

        Ok(Self {
            state,
            _keymap: keymap,
            _context: context,
        })
    }
}

impl SymbolResolver for XkbResolver {
    fn resolve(&self, code: u16) -> String {
        let api = self.state.api;
        let keycode = u32::from(code) + EVDEV_OFFSET;
        let keysym = unsafe { (api.xkb_state_key_get_one_sym)(self.state.ptr.as_ptr(), keycode) };

        let mut buf = [0u8; SYMBOL_NAME_MAX_LEN];
        let len =
            unsafe { (api.xkb_keysym_get_name)(keysym, buf.as_mut_ptr() as *mut c_char, buf.len()) };

        if len < 0 {
            return format!("{:#010x}", keysym);
        }

        name_from_buffer(&buf)
    }
}

struct Context {
    api: &'static XkbCommon,
    ptr: NonNull<xkb_context>,
}

impl Context {
    fn new(api: &'static XkbCommon) -> TrackerResult<Self> {
        let ptr = unsafe { (api.xkb_context_new)(xkb_context_flags::XKB_CONTEXT_NO_FLAGS) };

        NonNull::new(ptr)
            .map(|ptr| Self { api, ptr })
            .ok_or(TrackerError::Layout(LayoutStep::Context))
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        unsafe { (self.api.xkb_context_unref)(self.ptr.as_ptr()) }
    }
}

struct Keymap {
    api: &'static XkbCommon,
    ptr: NonNull<xkb_keymap>,
}

impl Keymap {
    fn new(api: &'static XkbCommon, context: &Context) -> TrackerResult<Self> {
        let ptr = unsafe {
            (api.xkb_keymap_new_from_names)(
                context.ptr.as_ptr(),
                ptr::null(),
                xkb_keymap_compile_flags::XKB_KEYMAP_COMPILE_NO_FLAGS,
            )
        };

        NonNull::new(ptr)
            .map(|ptr| Self { api, ptr })
            .ok_or(TrackerError::Layout(LayoutStep::Keymap))
    }
}

impl Drop for Keymap {
    fn drop(&mut self) {
        unsafe { (self.api.xkb_keymap_unref)(self.ptr.as_ptr()) }
    }
}

struct State {
    api: &'static XkbCommon,
    ptr: NonNull<xkb_state>,
}

impl State {
    fn new(api: &'static XkbCommon, keymap: &Keymap) -> TrackerResult<Self> {
        let ptr = unsafe { (api.xkb_state_new)(keymap.ptr.as_ptr()) };

        NonNull::new(ptr)
            .map(|ptr| Self { api, ptr })
            .ok_or(TrackerError::Layout(LayoutStep::State))
    }
}

impl Drop for State {
    fn drop(&mut self) {
        unsafe { (self.api.xkb_state_unref)(self.ptr.as_ptr()) }
    }
}
