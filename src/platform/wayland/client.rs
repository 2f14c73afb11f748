// src/platform/wayland/client.rs

//! xdg-shell toplevel on top of a [`Wire`].
//!
//! The surface is only ever attached after the compositor's first
//! `xdg_surface.configure` has been acknowledged. Buffers come from a
//! `wl_shm` pool over the framebuffer's memfd; a new size destroys the
//! `wl_buffer` and pool before the backing memory is reallocated.

use super::input;
use super::native::NativeWire;
use super::protocol::{
    Interface, SEAT_CAPABILITY_KEYBOARD, SEAT_CAPABILITY_POINTER, SHM_FORMAT_XRGB8888,
};
use super::wire::{Arg, ObjectId, ProtocolEvent, Wire};
use crate::config::Config;
use crate::geometry::Point;
use crate::keys::Modifiers;
use crate::platform::detect::DisplayServer;
use crate::platform::error::PlatformError;
use crate::platform::framebuffer::{FrameStorage, FramebufferSlot, RenderTarget};
use crate::platform::shm::ShmBuffer;
use crate::platform::{Window, WindowEvent};
use anyhow::{Context, Result};
use log::{debug, info, trace, warn};
use std::mem;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};

/// Roundtrips to wait for the initial configure before giving up.
const MAX_CONFIGURE_ROUNDTRIPS: usize = 8;

/// A global announced by the registry.
#[derive(Debug, Clone, Copy)]
struct Announced {
    name: u32,
    interface: Interface,
    version: u32,
}

/// Bound globals.
struct Globals {
    registry: ObjectId,
    compositor: ObjectId,
    shm: ObjectId,
    wm_base: ObjectId,
    seat: Option<ObjectId>,
}

pub struct WaylandClient<W: Wire> {
    wire: W,
    globals: Globals,
    surface: ObjectId,
    xdg_surface: ObjectId,
    toplevel: ObjectId,
    pool: Option<ObjectId>,
    buffer: Option<ObjectId>,
    pointer: Option<ObjectId>,
    keyboard: Option<ObjectId>,
    framebuffer: FramebufferSlot<ShmBuffer>,
    width: u32,
    height: u32,
    /// Size from the latest `xdg_toplevel.configure`, applied on the
    /// matching `xdg_surface.configure`.
    pending_size: Option<(u32, u32)>,
    configured: bool,
    visible: bool,
    /// Set between attach and `wl_buffer.release`. Advisory only.
    buffer_busy: bool,
    running: bool,
    modifiers: Modifiers,
    pointer_position: Point,
    pending: Vec<WindowEvent>,
}

/// The libwayland-backed window.
pub type WaylandWindow = WaylandClient<NativeWire>;

impl WaylandClient<NativeWire> {
    pub fn new(config: &Config) -> Result<Self> {
        let wire = NativeWire::connect()?;
        Self::with_wire(wire, config)
    }
}

fn bind_global(
    wire: &mut impl Wire,
    registry: ObjectId,
    announced: &[Announced],
    interface: Interface,
) -> Result<Option<ObjectId>, PlatformError> {
    let Some(global) = announced.iter().find(|g| g.interface == interface) else {
        return Ok(None);
    };
    let version = global.version.min(interface.supported_version());
    let id = wire.bind(registry, global.name, interface, version)?;
    debug!(
        "Bound {} (global {}) at v{} (server v{})",
        interface.name(),
        global.name,
        version,
        global.version
    );
    Ok(Some(id))
}

fn required(object: Option<ObjectId>, interface: Interface) -> Result<ObjectId, PlatformError> {
    object.ok_or(PlatformError::MissingGlobal(interface.name()))
}

fn created(object: Option<ObjectId>, request: &str) -> Result<ObjectId, PlatformError> {
    object.ok_or_else(|| PlatformError::Protocol(format!("{} created no object", request)))
}

/// Pool sizes and strides travel as signed 32-bit integers.
fn wire_size(value: usize, what: &str) -> Result<i32, PlatformError> {
    i32::try_from(value)
        .map_err(|_| PlatformError::Shm(format!("{} of {} bytes does not fit wl_shm", what, value)))
}

impl<W: Wire> WaylandClient<W> {
    /// Binds globals, creates the toplevel, and blocks until the first
    /// configure has been acknowledged.
    pub fn with_wire(mut wire: W, config: &Config) -> Result<Self> {
        let display = wire.display();
        let registry = created(
            wire.send(display, "get_registry", &[Arg::NewId])?,
            "wl_display.get_registry",
        )?;
        wire.roundtrip().context("Initial registry roundtrip failed")?;

        let announced: Vec<Announced> = wire
            .take_events()
            .into_iter()
            .filter(|ev| ev.object == registry && ev.event == "global")
            .filter_map(|ev| {
                let name = ev.uint(0)?;
                let interface = Interface::from_global(ev.string(1)?)?;
                let version = ev.uint(2)?;
                Some(Announced {
                    name,
                    interface,
                    version,
                })
            })
            .collect();
        trace!("Registry announced {:?}", announced);

        let compositor = required(
            bind_global(&mut wire, registry, &announced, Interface::Compositor)?,
            Interface::Compositor,
        )?;
        let shm = required(
            bind_global(&mut wire, registry, &announced, Interface::Shm)?,
            Interface::Shm,
        )?;
        let wm_base = required(
            bind_global(&mut wire, registry, &announced, Interface::XdgWmBase)?,
            Interface::XdgWmBase,
        )?;
        let seat = bind_global(&mut wire, registry, &announced, Interface::Seat)?;
        if seat.is_none() {
            warn!("No wl_seat advertised; the window will receive no input");
        }

        let surface = created(
            wire.send(compositor, "create_surface", &[Arg::NewId])?,
            "wl_compositor.create_surface",
        )?;
        let xdg_surface = created(
            wire.send(
                wm_base,
                "get_xdg_surface",
                &[Arg::NewId, Arg::Object(Some(surface))],
            )?,
            "xdg_wm_base.get_xdg_surface",
        )?;
        let toplevel = created(
            wire.send(xdg_surface, "get_toplevel", &[Arg::NewId])?,
            "xdg_surface.get_toplevel",
        )?;
        wire.send(toplevel, "set_title", &[Arg::Str(config.window.title.clone())])?;
        wire.send(toplevel, "set_app_id", &[Arg::Str(config.window.app_id.clone())])?;
        // The initial empty commit asks the compositor for a configure.
        wire.send(surface, "commit", &[])?;

        let mut this = WaylandClient {
            wire,
            globals: Globals {
                registry,
                compositor,
                shm,
                wm_base,
                seat,
            },
            surface,
            xdg_surface,
            toplevel,
            pool: None,
            buffer: None,
            pointer: None,
            keyboard: None,
            framebuffer: FramebufferSlot::new(),
            width: config.window.width.max(1),
            height: config.window.height.max(1),
            pending_size: None,
            configured: false,
            visible: false,
            buffer_busy: false,
            running: true,
            modifiers: Modifiers::empty(),
            pointer_position: Point::default(),
            pending: Vec::new(),
        };

        for _ in 0..MAX_CONFIGURE_ROUNDTRIPS {
            this.wire.roundtrip().context("Waiting for configure failed")?;
            this.dispatch_all()?;
            if this.configured {
                break;
            }
        }
        if !this.configured {
            return Err(PlatformError::Protocol(
                "compositor never configured the toplevel".into(),
            )
            .into());
        }
        // Size changes during the handshake are not news to the caller.
        this.pending
            .retain(|e| !matches!(e, WindowEvent::Resized { .. }));
        info!(
            "Created Wayland toplevel {}x{} (surface {:?})",
            this.width, this.height, this.surface
        );
        Ok(this)
    }

    pub fn is_configured(&self) -> bool {
        self.configured
    }

    pub fn is_buffer_busy(&self) -> bool {
        self.buffer_busy
    }

    fn dispatch_all(&mut self) -> Result<()> {
        for event in self.wire.take_events() {
            self.handle(event)?;
        }
        Ok(())
    }

    fn handle(&mut self, ev: ProtocolEvent) -> Result<()> {
        trace!("<- {}@{}.{}", ev.interface.name(), ev.object.0, ev.event);
        match (ev.interface, ev.event) {
            (Interface::XdgWmBase, "ping") => {
                let serial = ev.uint(0).unwrap_or(0);
                self.wire
                    .send(self.globals.wm_base, "pong", &[Arg::Uint(serial)])?;
                self.wire.flush()?;
            }
            (Interface::XdgToplevel, "configure") => {
                let width = ev.int(0).unwrap_or(0);
                let height = ev.int(1).unwrap_or(0);
                // Zero means "client decides": keep the current size.
                if width > 0 && height > 0 {
                    self.pending_size = Some((width as u32, height as u32));
                }
            }
            (Interface::XdgToplevel, "close") => {
                info!("Compositor requested close");
                self.pending.push(WindowEvent::CloseRequested);
            }
            (Interface::XdgSurface, "configure") => {
                let serial = ev.uint(0).unwrap_or(0);
                self.on_surface_configure(serial)?;
            }
            (Interface::Buffer, "release") => {
                self.buffer_busy = false;
            }
            (Interface::Seat, "capabilities") => {
                self.on_capabilities(ev.uint(0).unwrap_or(0))?;
            }
            (Interface::Pointer, _) => self.on_pointer(&ev),
            (Interface::Keyboard, _) => self.on_keyboard(&ev),
            (Interface::Registry, "global_remove") => {
                debug!("Global {:?} removed", ev.uint(0));
            }
            _ => trace!("Unhandled {}.{}", ev.interface.name(), ev.event),
        }
        Ok(())
    }

    fn on_surface_configure(&mut self, serial: u32) -> Result<()> {
        self.wire
            .send(self.xdg_surface, "ack_configure", &[Arg::Uint(serial)])?;
        let (width, height) = self.pending_size.take().unwrap_or((self.width, self.height));
        let first = !self.configured;
        self.configured = true;
        let changed = (width, height) != (self.width, self.height);
        if first || changed {
            self.reallocate(width, height)?;
        }
        if changed {
            self.width = width;
            self.height = height;
            self.pending.push(WindowEvent::Resized { width, height });
        }
        debug!(
            "Acked configure {} ({}x{}, first: {})",
            serial, width, height, first
        );
        Ok(())
    }

    /// Destroys the `wl_buffer` and pool, reallocates the shared memory,
    /// and wraps it in a fresh pool and buffer.
    fn reallocate(&mut self, width: u32, height: u32) -> Result<()> {
        if self.buffer.is_some()
            && self.framebuffer.buffer().map(|b| b.size()) == Some((width, height))
        {
            return Ok(());
        }
        self.destroy_buffer();
        self.framebuffer
            .ensure_size(width, height)
            .context("Failed to allocate shared-memory framebuffer")?;
        let Some(storage) = self.framebuffer.buffer() else {
            return Ok(());
        };
        let fd = storage
            .fd()
            .ok_or_else(|| PlatformError::Shm("framebuffer has no descriptor".into()))?
            .as_raw_fd();
        let len = wire_size(storage.len(), "pool size")?;
        let stride = wire_size(storage.stride(), "stride")?;

        let pool = created(
            self.wire.send(
                self.globals.shm,
                "create_pool",
                &[Arg::NewId, Arg::Fd(fd), Arg::Int(len)],
            )?,
            "wl_shm.create_pool",
        )?;
        let buffer = created(
            self.wire.send(
                pool,
                "create_buffer",
                &[
                    Arg::NewId,
                    Arg::Int(0),
                    Arg::Int(width as i32),
                    Arg::Int(height as i32),
                    Arg::Int(stride),
                    Arg::Uint(SHM_FORMAT_XRGB8888),
                ],
            )?,
            "wl_shm_pool.create_buffer",
        )?;
        self.pool = Some(pool);
        self.buffer = Some(buffer);
        self.buffer_busy = false;
        Ok(())
    }

    fn destroy_buffer(&mut self) {
        if let Some(buffer) = self.buffer.take() {
            if let Err(e) = self.wire.send(buffer, "destroy", &[]) {
                warn!("wl_buffer.destroy failed: {}", e);
            }
        }
        if let Some(pool) = self.pool.take() {
            if let Err(e) = self.wire.send(pool, "destroy", &[]) {
                warn!("wl_shm_pool.destroy failed: {}", e);
            }
        }
    }

    fn on_capabilities(&mut self, caps: u32) -> Result<()> {
        let Some(seat) = self.globals.seat else {
            return Ok(());
        };
        debug!("Seat capabilities {:#x}", caps);
        let has_pointer = caps & SEAT_CAPABILITY_POINTER != 0;
        let has_keyboard = caps & SEAT_CAPABILITY_KEYBOARD != 0;

        match (has_pointer, self.pointer) {
            (true, None) => {
                self.pointer = self.wire.send(seat, "get_pointer", &[Arg::NewId])?;
            }
            (false, Some(pointer)) => {
                self.release_device(pointer);
                self.pointer = None;
            }
            _ => {}
        }
        match (has_keyboard, self.keyboard) {
            (true, None) => {
                self.keyboard = self.wire.send(seat, "get_keyboard", &[Arg::NewId])?;
            }
            (false, Some(keyboard)) => {
                self.release_device(keyboard);
                self.keyboard = None;
            }
            _ => {}
        }
        Ok(())
    }

    /// `release` exists from v3; older devices can only be forgotten.
    fn release_device(&mut self, device: ObjectId) {
        if self.wire.version(device) >= 3 {
            if let Err(e) = self.wire.send(device, "release", &[]) {
                warn!("Failed to release input device {:?}: {}", device, e);
            }
        } else {
            self.wire.forget(device);
        }
    }

    fn accepts_pointer(&self) -> bool {
        self.visible && self.configured
    }

    fn push_pointer(&mut self, event: WindowEvent) {
        if self.accepts_pointer() {
            self.pending.push(event);
        } else {
            trace!("Dropping {:?} while hidden", event);
        }
    }

    fn on_pointer(&mut self, ev: &ProtocolEvent) {
        match ev.event {
            "enter" | "motion" => {
                // enter: serial, surface, x, y. motion: time, x, y.
                let base = if ev.event == "enter" { 2 } else { 1 };
                let (Some(sx), Some(sy)) = (ev.fixed(base), ev.fixed(base + 1)) else {
                    return;
                };
                self.pointer_position = input::surface_point(sx, sy);
                self.push_pointer(WindowEvent::PointerMoved {
                    position: self.pointer_position,
                    modifiers: self.modifiers,
                });
            }
            "button" => {
                let (Some(button), Some(state)) = (ev.uint(2), ev.uint(3)) else {
                    return;
                };
                let event =
                    input::button_event(self.pointer_position, button, state, self.modifiers);
                self.push_pointer(event);
            }
            "axis" => {
                let (Some(axis), Some(value)) = (ev.uint(1), ev.fixed(2)) else {
                    return;
                };
                let event = input::axis_event(self.pointer_position, axis, value, self.modifiers);
                self.push_pointer(event);
            }
            _ => {}
        }
    }

    fn on_keyboard(&mut self, ev: &ProtocolEvent) {
        match ev.event {
            "keymap" => {
                // Layout is fixed to US; the keymap is not parsed.
                if let Some(fd) = ev.fd(1).filter(|fd| *fd >= 0) {
                    // SAFETY: the descriptor was handed to us by the
                    // compositor and nothing else owns it.
                    drop(unsafe { OwnedFd::from_raw_fd(fd) });
                }
            }
            "enter" => self.pending.push(WindowEvent::FocusIn),
            "leave" => self.pending.push(WindowEvent::FocusOut),
            "key" => {
                let (Some(key), Some(state)) = (ev.uint(2), ev.uint(3)) else {
                    return;
                };
                let events = input::key_events(key, state, self.modifiers);
                self.pending.extend(events);
            }
            "modifiers" => {
                let depressed = ev.uint(1).unwrap_or(0);
                let latched = ev.uint(2).unwrap_or(0);
                let locked = ev.uint(3).unwrap_or(0);
                self.modifiers = input::modifiers_from_xkb(depressed, latched, locked);
            }
            "repeat_info" => {
                debug!("Ignoring key repeat info {:?}", ev.args);
            }
            _ => {}
        }
    }

    fn commit(&mut self) -> Result<(), PlatformError> {
        self.wire.send(self.surface, "commit", &[])?;
        self.wire.flush()
    }

    fn try_present(&mut self) -> Result<(), PlatformError> {
        let Some(buffer) = self.buffer else {
            return Ok(());
        };
        if self.buffer_busy {
            trace!("Presenting while the previous buffer is still held");
        }
        self.wire.send(
            self.surface,
            "attach",
            &[Arg::Object(Some(buffer)), Arg::Int(0), Arg::Int(0)],
        )?;
        let damage = [
            Arg::Int(0),
            Arg::Int(0),
            Arg::Int(self.width as i32),
            Arg::Int(self.height as i32),
        ];
        if self.wire.version(self.surface) >= 4 {
            self.wire.send(self.surface, "damage_buffer", &damage)?;
        } else {
            self.wire.send(self.surface, "damage", &damage)?;
        }
        self.buffer_busy = true;
        self.commit()
    }
}

impl<W: Wire> Window for WaylandClient<W> {
    fn server(&self) -> DisplayServer {
        DisplayServer::Wayland
    }

    fn show(&mut self) {
        if self.visible {
            return;
        }
        self.visible = true;
        if !self.configured {
            if let Err(e) = self.commit() {
                warn!("Failed to request configure on show: {}", e);
            }
        }
        info!("Wayland toplevel shown");
    }

    fn hide(&mut self) {
        if !self.visible {
            return;
        }
        let unmapped = self
            .wire
            .send(
                self.surface,
                "attach",
                &[Arg::Object(None), Arg::Int(0), Arg::Int(0)],
            )
            .and_then(|_| self.commit());
        if let Err(e) = unmapped {
            warn!("Failed to unmap surface: {}", e);
        }
        self.visible = false;
        // A null attach unmaps the surface; it must be configured again.
        self.configured = false;
        debug!("Wayland toplevel hidden");
    }

    fn set_title(&mut self, title: &str) {
        let sent = self
            .wire
            .send(self.toplevel, "set_title", &[Arg::Str(title.to_string())])
            .and_then(|_| self.wire.flush());
        if let Err(e) = sent {
            warn!("Failed to set title: {}", e);
        }
    }

    fn resize(&mut self, width: u32, height: u32) {
        let (width, height) = (width.max(1), height.max(1));
        if (width, height) == (self.width, self.height) {
            trace!("resize({}x{}) is a no-op", width, height);
            return;
        }
        if let Err(e) = self.reallocate(width, height) {
            warn!("Failed to resize to {}x{}: {:#}", width, height, e);
            return;
        }
        self.width = width;
        self.height = height;
        self.pending.push(WindowEvent::Resized { width, height });
    }

    fn process_events(&mut self) -> Result<Vec<WindowEvent>> {
        self.wire.pump().context("Wayland event pump failed")?;
        self.dispatch_all()?;
        Ok(mem::take(&mut self.pending))
    }

    fn stop(&mut self) {
        if self.running {
            info!("Wayland window stopping");
        }
        self.running = false;
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
        if !(self.configured && self.visible) {
            return;
        }
        if let Err(e) = self.try_present() {
            warn!("Failed to present frame: {}", e);
        }
    }
}

impl<W: Wire> Drop for WaylandClient<W> {
    fn drop(&mut self) {
        self.destroy_buffer();
        self.framebuffer.release();
        if let Some(pointer) = self.pointer.take() {
            self.release_device(pointer);
        }
        if let Some(keyboard) = self.keyboard.take() {
            self.release_device(keyboard);
        }
        for (object, what) in [
            (self.toplevel, "xdg_toplevel"),
            (self.xdg_surface, "xdg_surface"),
            (self.surface, "wl_surface"),
            (self.globals.wm_base, "xdg_wm_base"),
        ] {
            if let Err(e) = self.wire.send(object, "destroy", &[]) {
                warn!("Failed to destroy {}: {}", what, e);
            }
        }
        if let Some(seat) = self.globals.seat.take() {
            if self.wire.version(seat) >= 5 {
                if let Err(e) = self.wire.send(seat, "release", &[]) {
                    warn!("Failed to release wl_seat: {}", e);
                }
            } else {
                self.wire.forget(seat);
            }
        }
        self.wire.forget(self.globals.shm);
        self.wire.forget(self.globals.compositor);
        self.wire.forget(self.globals.registry);
        if let Err(e) = self.wire.flush() {
            debug!("Final flush failed: {}", e);
        }
        info!("Wayland window destroyed");
    }
}

#[cfg(test)]
mod tests;
