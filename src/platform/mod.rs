// src/platform/mod.rs

//! Display-server abstraction.
//!
//! Both backends implement [`Window`] and emit the same normalized
//! [`WindowEvent`]s, so the router above them never sees protocol details.

pub mod detect;
pub mod error;
pub mod framebuffer;
#[cfg(test)]
pub mod mock;
pub mod shm;
pub mod symbols;
pub mod wayland;
pub mod x11;

use crate::app::AppContext;
use crate::config::{BackendPreference, Config};
use crate::geometry::Point;
use crate::keys::{KeySymbol, Modifiers};
use anyhow::{Context, Result};
use detect::{DisplayServer, SessionEnv};
use error::PlatformError;
use framebuffer::RenderTarget;
use log::{debug, error, info, warn};

/// Environment override naming the backend explicitly (`x11` or `wayland`).
pub const BACKEND_OVERRIDE_ENV: &str = "CORE_WINDOW_BACKEND";

/// Represents mouse buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
    Back,
    Forward,
    Other(u32),
}

/// Input and lifecycle events, independent of the backend that produced them.
#[derive(Debug, Clone, PartialEq)]
pub enum WindowEvent {
    KeyDown {
        symbol: KeySymbol,
        modifiers: Modifiers,
    },
    KeyUp {
        symbol: KeySymbol,
        modifiers: Modifiers,
    },
    /// Printable text produced by a key press. Never contains control
    /// characters.
    TextInput { text: String },
    PointerMoved {
        position: Point,
        modifiers: Modifiers,
    },
    PointerPressed {
        position: Point,
        button: MouseButton,
        modifiers: Modifiers,
    },
    PointerReleased {
        position: Point,
        button: MouseButton,
        modifiers: Modifiers,
    },
    /// Deltas are in lines; positive scrolls towards the bottom/right.
    Scroll {
        position: Point,
        delta_x: f64,
        delta_y: f64,
        modifiers: Modifiers,
    },
    Exposed,
    Resized { width: u32, height: u32 },
    CloseRequested,
    FocusIn,
    FocusOut,
}

impl WindowEvent {
    pub fn is_pointer(&self) -> bool {
        matches!(
            self,
            WindowEvent::PointerMoved { .. }
                | WindowEvent::PointerPressed { .. }
                | WindowEvent::PointerReleased { .. }
                | WindowEvent::Scroll { .. }
        )
    }
}

/// A native top-level window with a CPU framebuffer.
///
/// Implementations guarantee that `Resized` is never emitted for the
/// current size and that pointer events are never emitted before `show`.
pub trait Window {
    fn server(&self) -> DisplayServer;

    /// Maps the window. Idempotent.
    fn show(&mut self);

    /// Unmaps the window. Idempotent.
    fn hide(&mut self);

    fn set_title(&mut self, title: &str);

    /// Requests a new size. A no-op when the size is unchanged.
    fn resize(&mut self, width: u32, height: u32);

    /// Drains pending protocol messages once, without blocking.
    fn process_events(&mut self) -> Result<Vec<WindowEvent>>;

    /// Marks the loop for termination. Teardown happens on drop.
    fn stop(&mut self);

    fn is_running(&self) -> bool;

    fn size(&self) -> (u32, u32);

    /// The framebuffer to draw the next frame into.
    fn frame(&mut self) -> Option<RenderTarget<'_>>;

    /// Shows the framebuffer contents on screen.
    fn present(&mut self);
}

/// Decides which backend to build: `CORE_WINDOW_BACKEND`, then the config
/// file, then environment detection.
pub fn choose_backend(config: &Config) -> DisplayServer {
    if let Some(server) = std::env::var(BACKEND_OVERRIDE_ENV)
        .ok()
        .and_then(|v| parse_backend(&v))
    {
        info!("Backend forced by {}: {}", BACKEND_OVERRIDE_ENV, server);
        return server;
    }
    match config.display.backend {
        BackendPreference::X11 => DisplayServer::X11,
        BackendPreference::Wayland => DisplayServer::Wayland,
        BackendPreference::Auto => detect::detect(),
    }
}

fn parse_backend(value: &str) -> Option<DisplayServer> {
    match value.trim().to_ascii_lowercase().as_str() {
        "x11" | "xlib" => Some(DisplayServer::X11),
        "wayland" => Some(DisplayServer::Wayland),
        "" => None,
        other => {
            warn!("Ignoring unknown {} value '{}'", BACKEND_OVERRIDE_ENV, other);
            None
        }
    }
}

/// Whether a failed Wayland construction should be retried under X11.
///
/// Any construction failure qualifies once an X11 session is present.
fn should_fall_back(err: &anyhow::Error, env: &SessionEnv) -> bool {
    if !env.x11 {
        return false;
    }
    if let Some(platform_err) = err.downcast_ref::<PlatformError>() {
        debug!("Wayland failure eligible for X11 fallback: {:?}", platform_err);
    }
    true
}

/// Instantiates the backend chosen in `ctx`, substituting X11 when Wayland
/// fails and an X11 session is available.
pub fn create_window(ctx: &AppContext) -> Result<Box<dyn Window>> {
    match ctx.server {
        DisplayServer::X11 => Ok(Box::new(
            x11::X11Window::new(&ctx.config).context("Failed to create X11 window")?,
        )),
        DisplayServer::Wayland => match wayland::WaylandWindow::new(&ctx.config) {
            Ok(window) => Ok(Box::new(window)),
            Err(e) if should_fall_back(&e, &SessionEnv::from_env()) => {
                warn!("Wayland backend failed ({:#}); falling back to X11", e);
                Ok(Box::new(
                    x11::X11Window::new(&ctx.config)
                        .context("Failed to create X11 window after Wayland fallback")?,
                ))
            }
            Err(e) => {
                error!("Wayland backend failed: {:#}", e);
                Err(e.context("Failed to create Wayland window"))
            }
        },
    }
}

#[cfg(test)]
mod tests;
