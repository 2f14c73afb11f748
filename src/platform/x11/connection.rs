// src/platform/x11/connection.rs
#![allow(non_snake_case)]

use super::xlib::XlibSymbols;
use crate::platform::error::PlatformError;
use libc::c_int;
use log::{debug, info, warn};
use std::ptr;
use x11::xlib;

/// Owns the raw `Display` pointer and closes it on drop.
struct ManagedDisplay {
    ptr: *mut xlib::Display,
    close: unsafe extern "C" fn(*mut xlib::Display) -> c_int,
}

impl ManagedDisplay {
    fn open(funcs: &XlibSymbols) -> Result<Self, PlatformError> {
        // NULL means "use $DISPLAY".
        // SAFETY: XOpenDisplay accepts a null name.
        let display_ptr = unsafe { (funcs.XOpenDisplay)(ptr::null()) };
        if display_ptr.is_null() {
            return Err(PlatformError::DisplayOpen { server: "X11" });
        }
        debug!("X display opened: {:p}", display_ptr);
        Ok(ManagedDisplay {
            ptr: display_ptr,
            close: funcs.XCloseDisplay,
        })
    }
}

impl Drop for ManagedDisplay {
    fn drop(&mut self) {
        info!("Closing X11 display connection: {:p}", self.ptr);
        // SAFETY: ptr came from XOpenDisplay and is closed exactly once.
        let status = unsafe { (self.close)(self.ptr) };
        if status != 0 {
            warn!("XCloseDisplay returned non-zero status: {}", status);
        }
    }
}

/// A connection to the X server plus the default screen's visual.
///
/// Field order matters: the display must close before the library that
/// provides `XCloseDisplay` is unloaded.
pub struct Connection {
    managed_display: ManagedDisplay,
    screen: c_int,
    root: xlib::Window,
    visual: *mut xlib::Visual,
    depth: c_int,
    funcs: XlibSymbols,
}

impl Connection {
    pub fn new() -> Result<Self, PlatformError> {
        info!("Establishing X11 server connection.");
        let funcs = XlibSymbols::load()?;
        let managed_display = ManagedDisplay::open(&funcs)?;
        let display = managed_display.ptr;

        // SAFETY: display is a live connection.
        let screen = unsafe { (funcs.XDefaultScreen)(display) };
        let root = unsafe { (funcs.XRootWindow)(display, screen) };
        let visual = unsafe { (funcs.XDefaultVisual)(display, screen) };
        let depth = unsafe { (funcs.XDefaultDepth)(display, screen) };
        if visual.is_null() {
            return Err(PlatformError::Protocol(format!(
                "no default visual for screen {}",
                screen
            )));
        }
        debug!("Screen {}: root {}, depth {}", screen, root, depth);

        if let Some(set_detectable) = funcs.XkbSetDetectableAutoRepeat {
            let mut supported: xlib::Bool = 0;
            // SAFETY: display is live; supported is a valid out pointer.
            unsafe { set_detectable(display, xlib::True, &mut supported) };
            debug!("Detectable autorepeat supported: {}", supported != 0);
        }

        info!("X11 server connection established successfully.");
        Ok(Connection {
            managed_display,
            screen,
            root,
            visual,
            depth,
            funcs,
        })
    }

    #[inline]
    pub fn display(&self) -> *mut xlib::Display {
        self.managed_display.ptr
    }

    pub fn funcs(&self) -> &XlibSymbols {
        &self.funcs
    }

    pub fn screen(&self) -> c_int {
        self.screen
    }

    pub fn root(&self) -> xlib::Window {
        self.root
    }

    pub fn visual(&self) -> *mut xlib::Visual {
        self.visual
    }

    pub fn depth(&self) -> c_int {
        self.depth
    }

    /// Flushes the request buffer.
    pub fn flush(&self) {
        // SAFETY: display is live.
        unsafe { (self.funcs.XFlush)(self.display()) };
    }
}
