// src/platform/x11/mod.rs

//! Xlib backend.
//!
//! State machine: `Disconnected -> Connected -> Mapped -> Closing ->
//! Disconnected`. Pixels live in a client-owned heap buffer and are copied
//! to the window with `XPutImage` on present.

pub mod connection;
pub mod event;
pub mod xlib;

use crate::config::Config;
use crate::platform::detect::DisplayServer;
use crate::platform::error::PlatformError;
use crate::platform::framebuffer::{FrameStorage, FramebufferSlot, HeapBuffer, RenderTarget};
use crate::platform::{Window, WindowEvent};
use anyhow::{Context, Result};
use connection::Connection;
use event::{Atoms, XInput};
use libc::{c_char, c_int, c_long, c_void};
use log::{debug, info, trace, warn};
use std::ffi::CString;
use std::mem;
use std::ptr;
use x11::xlib as x;

/// Buffer size for text obtained from `XLookupString`.
const KEY_TEXT_BUFFER_SIZE: usize = 32;

const EVENT_MASK: c_long = x::KeyPressMask
    | x::KeyReleaseMask
    | x::ButtonPressMask
    | x::ButtonReleaseMask
    | x::PointerMotionMask
    | x::StructureNotifyMask
    | x::ExposureMask
    | x::FocusChangeMask;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum X11State {
    Disconnected,
    Connected,
    Mapped,
    Closing,
}

pub struct X11Window {
    window: x::Window,
    gc: x::GC,
    atoms: Atoms,
    framebuffer: FramebufferSlot<HeapBuffer>,
    width: u32,
    height: u32,
    state: X11State,
    running: bool,
    /// Events produced outside the event pump (application-driven resize).
    pending: Vec<WindowEvent>,
    connection: Connection,
}

fn c_string(text: &str) -> CString {
    // Interior NULs cannot cross the C boundary; drop them.
    CString::new(text.replace('\0', "")).unwrap_or_default()
}

impl X11Window {
    pub fn new(config: &Config) -> Result<Self> {
        let connection = Connection::new()?;
        let funcs = connection.funcs();
        let display = connection.display();
        let width = config.window.width.max(1);
        let height = config.window.height.max(1);

        // SAFETY: display and root are live.
        let window = unsafe {
            let black = (funcs.XBlackPixel)(display, connection.screen());
            (funcs.XCreateSimpleWindow)(
                display,
                connection.root(),
                0,
                0,
                width,
                height,
                0,
                black,
                black,
            )
        };
        if window == 0 {
            return Err(PlatformError::Protocol("XCreateSimpleWindow failed".into()).into());
        }
        info!("Created X11 window {} ({}x{})", window, width, height);

        let mut this = X11Window {
            window,
            gc: ptr::null_mut(),
            atoms: Atoms::default(),
            framebuffer: FramebufferSlot::new(),
            width,
            height,
            state: X11State::Connected,
            running: true,
            pending: Vec::new(),
            connection,
        };
        this.init_window(&config.window.title)?;
        this.framebuffer
            .ensure_size(width, height)
            .context("Failed to allocate X11 framebuffer")?;
        Ok(this)
    }

    fn init_window(&mut self, title: &str) -> Result<()> {
        let funcs = self.connection.funcs();
        let display = self.connection.display();

        // SAFETY: display and window are live; strings outlive the calls.
        unsafe {
            (funcs.XSelectInput)(display, self.window, EVENT_MASK);

            let protocols = c_string("WM_PROTOCOLS");
            let delete = c_string("WM_DELETE_WINDOW");
            self.atoms.wm_protocols = (funcs.XInternAtom)(display, protocols.as_ptr(), x::False);
            self.atoms.wm_delete_window = (funcs.XInternAtom)(display, delete.as_ptr(), x::False);
            let mut protocols_list = [self.atoms.wm_delete_window];
            let status = (funcs.XSetWMProtocols)(
                display,
                self.window,
                protocols_list.as_mut_ptr(),
                protocols_list.len() as c_int,
            );
            if status == 0 {
                // Without it close requests are silently dropped by the WM.
                warn!("XSetWMProtocols failed; window manager close will not be reported");
            }

            self.gc = (funcs.XCreateGC)(display, self.window, 0, ptr::null_mut());
            if self.gc.is_null() {
                return Err(PlatformError::Protocol("XCreateGC failed".into()).into());
            }
        }
        self.store_title(title);
        self.connection.flush();
        debug!(
            "X11 window {} initialised (WM_DELETE_WINDOW atom {})",
            self.window, self.atoms.wm_delete_window
        );
        Ok(())
    }

    pub fn state(&self) -> X11State {
        self.state
    }

    fn store_title(&self, title: &str) {
        let title = c_string(title);
        // SAFETY: display and window are live; title outlives the call.
        unsafe {
            (self.connection.funcs().XStoreName)(
                self.connection.display(),
                self.window,
                title.as_ptr(),
            )
        };
    }

    /// The single reallocation routine for server- and app-driven resizes.
    /// Returns whether the size changed.
    fn apply_size(&mut self, width: u32, height: u32) -> bool {
        if (width, height) == (self.width, self.height) {
            return false;
        }
        debug!(
            "X11 resize {}x{} -> {}x{}",
            self.width, self.height, width, height
        );
        if let Err(e) = self.framebuffer.ensure_size(width, height) {
            warn!("Failed to reallocate framebuffer for {}x{}: {:#}", width, height, e);
        }
        self.width = width;
        self.height = height;
        self.pending.push(WindowEvent::Resized { width, height });
        true
    }

    fn accepts(&self, event: &WindowEvent) -> bool {
        !(event.is_pointer() && self.state != X11State::Mapped)
    }
}

impl Window for X11Window {
    fn server(&self) -> DisplayServer {
        DisplayServer::X11
    }

    fn show(&mut self) {
        if self.state != X11State::Connected {
            trace!("show() ignored in state {:?}", self.state);
            return;
        }
        // SAFETY: display and window are live.
        unsafe { (self.connection.funcs().XMapWindow)(self.connection.display(), self.window) };
        self.connection.flush();
        self.state = X11State::Mapped;
        info!("X11 window {} mapped", self.window);
    }

    fn hide(&mut self) {
        if self.state != X11State::Mapped {
            trace!("hide() ignored in state {:?}", self.state);
            return;
        }
        // SAFETY: display and window are live.
        unsafe { (self.connection.funcs().XUnmapWindow)(self.connection.display(), self.window) };
        self.connection.flush();
        self.state = X11State::Connected;
        debug!("X11 window {} unmapped", self.window);
    }

    fn set_title(&mut self, title: &str) {
        self.store_title(title);
        self.connection.flush();
    }

    fn resize(&mut self, width: u32, height: u32) {
        let (width, height) = (width.max(1), height.max(1));
        if !self.apply_size(width, height) {
            trace!("resize({}x{}) is a no-op", width, height);
            return;
        }
        // SAFETY: display and window are live.
        unsafe {
            (self.connection.funcs().XResizeWindow)(
                self.connection.display(),
                self.window,
                width,
                height,
            )
        };
        self.connection.flush();
    }

    fn process_events(&mut self) -> Result<Vec<WindowEvent>> {
        let mut events = mem::take(&mut self.pending);
        let display = self.connection.display();
        let pending_fn = self.connection.funcs().XPending;
        let next_fn = self.connection.funcs().XNextEvent;
        let lookup_fn = self.connection.funcs().XLookupString;

        let mut lookup = |key_event: &mut x::XKeyEvent| -> (u32, String) {
            let mut keysym: x::KeySym = 0;
            let mut buffer = [0u8; KEY_TEXT_BUFFER_SIZE];
            // SAFETY: key_event is a live XKeyEvent; buffer and keysym are
            // valid out pointers; no compose status is requested.
            let count = unsafe {
                lookup_fn(
                    key_event,
                    buffer.as_mut_ptr() as *mut c_char,
                    buffer.len() as c_int,
                    &mut keysym,
                    ptr::null_mut(),
                )
            };
            let text = if count > 0 {
                String::from_utf8_lossy(&buffer[..count as usize]).into_owned()
            } else {
                String::new()
            };
            (keysym as u32, text)
        };

        let mut translated = Vec::new();
        // SAFETY: guarded by XPending, so XNextEvent never blocks.
        while unsafe { pending_fn(display) } > 0 {
            let mut xevent: x::XEvent = unsafe { mem::zeroed() };
            unsafe { next_fn(display, &mut xevent) };
            event::translate(&mut xevent, &self.atoms, &mut lookup, &mut translated);
        }

        for input in translated {
            match input {
                XInput::Configure { width, height } => {
                    if self.apply_size(width, height) {
                        events.append(&mut self.pending);
                    }
                }
                XInput::Event(event) => {
                    if self.accepts(&event) {
                        events.push(event);
                    } else {
                        trace!("Dropping {:?} while {:?}", event, self.state);
                    }
                }
            }
        }
        Ok(events)
    }

    fn stop(&mut self) {
        if self.running {
            info!("X11 window {} stopping", self.window);
        }
        self.running = false;
        self.state = X11State::Closing;
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn frame(&mut self) -> Option<RenderTarget<'_>> {
        self.framebuffer.target()
    }

    fn present(&mut self) {
        if self.state != X11State::Mapped {
            return;
        }
        let funcs = self.connection.funcs();
        let display = self.connection.display();
        let Some(buffer) = self.framebuffer.buffer_mut() else {
            return;
        };
        let (width, height) = buffer.size();
        let stride = buffer.stride();
        let data = buffer.pixels_mut().as_mut_ptr();

        // SAFETY: the image borrows `data` for the duration of XPutImage only;
        // its data pointer is cleared before the header is freed so Xlib never
        // frees our heap buffer.
        unsafe {
            let image = (funcs.XCreateImage)(
                display,
                self.connection.visual(),
                self.connection.depth() as u32,
                x::ZPixmap,
                0,
                data as *mut c_char,
                width,
                height,
                32,
                stride as c_int,
            );
            if image.is_null() {
                warn!("XCreateImage failed for {}x{} frame", width, height);
                return;
            }
            (funcs.XPutImage)(display, self.window, self.gc, image, 0, 0, 0, 0, width, height);
            (*image).data = ptr::null_mut();
            (funcs.XFree)(image as *mut c_void);
            (funcs.XFlush)(display);
        }
    }
}

impl Drop for X11Window {
    fn drop(&mut self) {
        let funcs = self.connection.funcs();
        let display = self.connection.display();
        self.framebuffer.release();
        // SAFETY: gc and window belong to this live display and are freed once.
        unsafe {
            if !self.gc.is_null() {
                (funcs.XFreeGC)(display, self.gc);
            }
            (funcs.XDestroyWindow)(display, self.window);
            (funcs.XFlush)(display);
        }
        self.state = X11State::Disconnected;
        info!("X11 window {} destroyed", self.window);
        // `connection` drops after this, closing the display.
    }
}
