// src/platform/x11/xlib.rs
#![allow(non_snake_case)] // Field names mirror the Xlib entry points

//! Xlib entry points, resolved from libX11 at runtime.
//!
//! Types, constants and keysyms come from the `x11` crate; only the
//! functions are looked up here, once per connection.

use crate::platform::error::PlatformError;
use crate::platform::symbols::SymbolLoader;
use libc::{c_char, c_int, c_long, c_uint, c_ulong, c_void};
use x11::xlib::{
    Atom, Bool, Display, Drawable, Status, Visual, XComposeStatus, XEvent, XGCValues, XImage,
    XKeyEvent, GC,
};

const LIBX11_SONAMES: &[&str] = &["libX11.so.6", "libX11.so"];

pub struct XlibSymbols {
    pub XOpenDisplay: unsafe extern "C" fn(*const c_char) -> *mut Display,
    pub XCloseDisplay: unsafe extern "C" fn(*mut Display) -> c_int,
    pub XDefaultScreen: unsafe extern "C" fn(*mut Display) -> c_int,
    pub XRootWindow: unsafe extern "C" fn(*mut Display, c_int) -> x11::xlib::Window,
    pub XDefaultVisual: unsafe extern "C" fn(*mut Display, c_int) -> *mut Visual,
    pub XDefaultDepth: unsafe extern "C" fn(*mut Display, c_int) -> c_int,
    pub XBlackPixel: unsafe extern "C" fn(*mut Display, c_int) -> c_ulong,
    pub XCreateSimpleWindow: unsafe extern "C" fn(
        *mut Display,
        x11::xlib::Window,
        c_int,
        c_int,
        c_uint,
        c_uint,
        c_uint,
        c_ulong,
        c_ulong,
    ) -> x11::xlib::Window,
    pub XDestroyWindow: unsafe extern "C" fn(*mut Display, x11::xlib::Window) -> c_int,
    pub XStoreName: unsafe extern "C" fn(*mut Display, x11::xlib::Window, *const c_char) -> c_int,
    pub XSelectInput: unsafe extern "C" fn(*mut Display, x11::xlib::Window, c_long) -> c_int,
    pub XInternAtom: unsafe extern "C" fn(*mut Display, *const c_char, Bool) -> Atom,
    pub XSetWMProtocols:
        unsafe extern "C" fn(*mut Display, x11::xlib::Window, *mut Atom, c_int) -> Status,
    pub XMapWindow: unsafe extern "C" fn(*mut Display, x11::xlib::Window) -> c_int,
    pub XUnmapWindow: unsafe extern "C" fn(*mut Display, x11::xlib::Window) -> c_int,
    pub XResizeWindow:
        unsafe extern "C" fn(*mut Display, x11::xlib::Window, c_uint, c_uint) -> c_int,
    pub XFlush: unsafe extern "C" fn(*mut Display) -> c_int,
    pub XPending: unsafe extern "C" fn(*mut Display) -> c_int,
    pub XNextEvent: unsafe extern "C" fn(*mut Display, *mut XEvent) -> c_int,
    pub XLookupString: unsafe extern "C" fn(
        *mut XKeyEvent,
        *mut c_char,
        c_int,
        *mut x11::xlib::KeySym,
        *mut XComposeStatus,
    ) -> c_int,
    pub XCreateGC: unsafe extern "C" fn(*mut Display, Drawable, c_ulong, *mut XGCValues) -> GC,
    pub XFreeGC: unsafe extern "C" fn(*mut Display, GC) -> c_int,
    pub XCreateImage: unsafe extern "C" fn(
        *mut Display,
        *mut Visual,
        c_uint,
        c_int,
        c_int,
        *mut c_char,
        c_uint,
        c_uint,
        c_int,
        c_int,
    ) -> *mut XImage,
    pub XPutImage: unsafe extern "C" fn(
        *mut Display,
        Drawable,
        GC,
        *mut XImage,
        c_int,
        c_int,
        c_int,
        c_int,
        c_uint,
        c_uint,
    ) -> c_int,
    pub XFree: unsafe extern "C" fn(*mut c_void) -> c_int,
    /// Suppresses synthetic KeyRelease events on autorepeat.
    pub XkbSetDetectableAutoRepeat:
        Option<unsafe extern "C" fn(*mut Display, Bool, *mut Bool) -> Bool>,
    _loader: SymbolLoader,
}

impl XlibSymbols {
    pub fn load() -> Result<Self, PlatformError> {
        let l = SymbolLoader::open(LIBX11_SONAMES)?;
        // SAFETY: every field type matches the Xlib prototype of its symbol.
        unsafe {
            Ok(XlibSymbols {
                XOpenDisplay: l.required(b"XOpenDisplay\0", "X11R6")?,
                XCloseDisplay: l.required(b"XCloseDisplay\0", "X11R6")?,
                XDefaultScreen: l.required(b"XDefaultScreen\0", "X11R6")?,
                XRootWindow: l.required(b"XRootWindow\0", "X11R6")?,
                XDefaultVisual: l.required(b"XDefaultVisual\0", "X11R6")?,
                XDefaultDepth: l.required(b"XDefaultDepth\0", "X11R6")?,
                XBlackPixel: l.required(b"XBlackPixel\0", "X11R6")?,
                XCreateSimpleWindow: l.required(b"XCreateSimpleWindow\0", "X11R6")?,
                XDestroyWindow: l.required(b"XDestroyWindow\0", "X11R6")?,
                XStoreName: l.required(b"XStoreName\0", "X11R6")?,
                XSelectInput: l.required(b"XSelectInput\0", "X11R6")?,
                XInternAtom: l.required(b"XInternAtom\0", "X11R6")?,
                XSetWMProtocols: l.required(b"XSetWMProtocols\0", "X11R6")?,
                XMapWindow: l.required(b"XMapWindow\0", "X11R6")?,
                XUnmapWindow: l.required(b"XUnmapWindow\0", "X11R6")?,
                XResizeWindow: l.required(b"XResizeWindow\0", "X11R6")?,
                XFlush: l.required(b"XFlush\0", "X11R6")?,
                XPending: l.required(b"XPending\0", "X11R6")?,
                XNextEvent: l.required(b"XNextEvent\0", "X11R6")?,
                XLookupString: l.required(b"XLookupString\0", "X11R6")?,
                XCreateGC: l.required(b"XCreateGC\0", "X11R6")?,
                XFreeGC: l.required(b"XFreeGC\0", "X11R6")?,
                XCreateImage: l.required(b"XCreateImage\0", "X11R6")?,
                XPutImage: l.required(b"XPutImage\0", "X11R6")?,
                XFree: l.required(b"XFree\0", "X11R6")?,
                XkbSetDetectableAutoRepeat: l.optional(b"XkbSetDetectableAutoRepeat\0"),
                _loader: l,
            })
        }
    }
}
