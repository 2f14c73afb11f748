// src/platform/wayland/ffi.rs

//! libwayland-client entry points, resolved from the shared library at
//! start-up. The C types come from `wayland-sys`.

use crate::platform::error::PlatformError;
use crate::platform::symbols::SymbolLoader;
use libc::{c_char, c_int, c_void};

pub use wayland_sys::client::{wl_display, wl_proxy};
pub use wayland_sys::common::{
    wl_argument, wl_array, wl_dispatcher_func_t, wl_interface, wl_message,
};

const LIBWAYLAND_SONAMES: &[&str] = &["libwayland-client.so.0", "libwayland-client.so"];

/// Passed to `wl_proxy_marshal_array_flags` to destroy the proxy after sending.
pub const WL_MARSHAL_FLAG_DESTROY: u32 = 1 << 0;

/// Entry points and interface descriptors from libwayland-client.
pub struct WaylandLib {
    pub wl_display_connect: unsafe extern "C" fn(*const c_char) -> *mut wl_display,
    pub wl_display_disconnect: unsafe extern "C" fn(*mut wl_display),
    pub wl_display_get_fd: unsafe extern "C" fn(*mut wl_display) -> c_int,
    pub wl_display_roundtrip: unsafe extern "C" fn(*mut wl_display) -> c_int,
    pub wl_display_dispatch_pending: unsafe extern "C" fn(*mut wl_display) -> c_int,
    pub wl_display_flush: unsafe extern "C" fn(*mut wl_display) -> c_int,
    pub wl_display_prepare_read: unsafe extern "C" fn(*mut wl_display) -> c_int,
    pub wl_display_cancel_read: unsafe extern "C" fn(*mut wl_display),
    pub wl_display_read_events: unsafe extern "C" fn(*mut wl_display) -> c_int,
    pub wl_display_get_error: unsafe extern "C" fn(*mut wl_display) -> c_int,
    pub wl_proxy_marshal_array_flags: unsafe extern "C" fn(
        *mut wl_proxy,
        u32,
        *const wl_interface,
        u32,
        u32,
        *mut wl_argument,
    ) -> *mut wl_proxy,
    pub wl_proxy_add_dispatcher: unsafe extern "C" fn(
        *mut wl_proxy,
        wl_dispatcher_func_t,
        *const c_void,
        *mut c_void,
    ) -> c_int,
    pub wl_proxy_destroy: unsafe extern "C" fn(*mut wl_proxy),
    pub wl_proxy_get_version: unsafe extern "C" fn(*mut wl_proxy) -> u32,
    /// Only used for log output.
    pub wl_proxy_get_id: Option<unsafe extern "C" fn(*mut wl_proxy) -> u32>,

    pub wl_registry_interface: *const wl_interface,
    pub wl_callback_interface: *const wl_interface,
    pub wl_compositor_interface: *const wl_interface,
    pub wl_shm_interface: *const wl_interface,
    pub wl_shm_pool_interface: *const wl_interface,
    pub wl_buffer_interface: *const wl_interface,
    pub wl_surface_interface: *const wl_interface,
    pub wl_seat_interface: *const wl_interface,
    pub wl_pointer_interface: *const wl_interface,
    pub wl_keyboard_interface: *const wl_interface,

    _loader: SymbolLoader,
}

impl WaylandLib {
    pub fn load() -> Result<Self, PlatformError> {
        let l = SymbolLoader::open(LIBWAYLAND_SONAMES)?;
        // SAFETY: every field type matches the C declaration of its symbol;
        // `*_interface` symbols are data, resolved to their addresses.
        unsafe {
            Ok(WaylandLib {
                wl_display_connect: l.required(b"wl_display_connect\0", "1.0")?,
                wl_display_disconnect: l.required(b"wl_display_disconnect\0", "1.0")?,
                wl_display_get_fd: l.required(b"wl_display_get_fd\0", "1.0")?,
                wl_display_roundtrip: l.required(b"wl_display_roundtrip\0", "1.0")?,
                wl_display_dispatch_pending: l.required(b"wl_display_dispatch_pending\0", "1.0")?,
                wl_display_flush: l.required(b"wl_display_flush\0", "1.0")?,
                wl_display_prepare_read: l.required(b"wl_display_prepare_read\0", "1.2")?,
                wl_display_cancel_read: l.required(b"wl_display_cancel_read\0", "1.2")?,
                wl_display_read_events: l.required(b"wl_display_read_events\0", "1.2")?,
                wl_display_get_error: l.required(b"wl_display_get_error\0", "1.0")?,
                wl_proxy_marshal_array_flags: l
                    .required(b"wl_proxy_marshal_array_flags\0", "1.20")?,
                wl_proxy_add_dispatcher: l.required(b"wl_proxy_add_dispatcher\0", "1.0")?,
                wl_proxy_destroy: l.required(b"wl_proxy_destroy\0", "1.0")?,
                wl_proxy_get_version: l.required(b"wl_proxy_get_version\0", "1.10")?,
                wl_proxy_get_id: l.optional(b"wl_proxy_get_id\0"),

                wl_registry_interface: l.required(b"wl_registry_interface\0", "1.0")?,
                wl_callback_interface: l.required(b"wl_callback_interface\0", "1.0")?,
                wl_compositor_interface: l.required(b"wl_compositor_interface\0", "1.0")?,
                wl_shm_interface: l.required(b"wl_shm_interface\0", "1.0")?,
                wl_shm_pool_interface: l.required(b"wl_shm_pool_interface\0", "1.0")?,
                wl_buffer_interface: l.required(b"wl_buffer_interface\0", "1.0")?,
                wl_surface_interface: l.required(b"wl_surface_interface\0", "1.0")?,
                wl_seat_interface: l.required(b"wl_seat_interface\0", "1.0")?,
                wl_pointer_interface: l.required(b"wl_pointer_interface\0", "1.0")?,
                wl_keyboard_interface: l.required(b"wl_keyboard_interface\0", "1.0")?,
                _loader: l,
            })
        }
    }
}
