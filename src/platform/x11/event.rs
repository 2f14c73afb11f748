// src/platform/x11/event.rs
#![allow(non_upper_case_globals)]

//! Translation of raw `XEvent`s into normalized window events.
//!
//! Key lookup is injected so translation runs without a server in tests.

use crate::geometry::Point;
use crate::keys::{self, Modifiers};
use crate::platform::{MouseButton, WindowEvent};
use log::{debug, info, trace};
use x11::xlib::{self, XEvent, XKeyEvent};

/// Atoms the translator compares client messages against.
#[derive(Debug, Clone, Copy, Default)]
pub struct Atoms {
    pub wm_protocols: xlib::Atom,
    pub wm_delete_window: xlib::Atom,
}

/// Result of translating one `XEvent`.
#[derive(Debug, Clone, PartialEq)]
pub enum XInput {
    Event(WindowEvent),
    /// The server reports the window's current geometry. The backend decides
    /// whether it is a resize.
    Configure { width: u32, height: u32 },
}

/// Resolves a key event to `(keysym, text)`.
pub type KeyLookup<'a> = dyn FnMut(&mut XKeyEvent) -> (u32, String) + 'a;

fn scroll_delta(button: u32) -> Option<(f64, f64)> {
    match button {
        xlib::Button4 => Some((0.0, -1.0)),
        xlib::Button5 => Some((0.0, 1.0)),
        6 => Some((-1.0, 0.0)),
        7 => Some((1.0, 0.0)),
        _ => None,
    }
}

fn mouse_button(button: u32) -> MouseButton {
    match button {
        xlib::Button1 => MouseButton::Left,
        xlib::Button2 => MouseButton::Middle,
        xlib::Button3 => MouseButton::Right,
        8 => MouseButton::Back,
        9 => MouseButton::Forward,
        other => MouseButton::Other(other),
    }
}

/// Translates one event, appending zero or more results to `out`.
pub fn translate(
    xevent: &mut XEvent,
    atoms: &Atoms,
    lookup: &mut KeyLookup<'_>,
    out: &mut Vec<XInput>,
) {
    let event_type = xevent.get_type();
    match event_type {
        xlib::KeyPress => {
            // SAFETY: type is KeyPress, so `key` is the active member.
            let key_event = unsafe { &mut xevent.key };
            let modifiers = Modifiers::from_x_state(key_event.state);
            let (keysym, text) = lookup(key_event);
            let symbol = keys::keysym_to_symbol(keysym);
            debug!(
                "XEvent: KeyPress (symbol: {:?}, keysym: {:X}, modifiers: {:?}, text: {:?})",
                symbol, keysym, modifiers, text
            );
            out.push(XInput::Event(WindowEvent::KeyDown { symbol, modifiers }));
            if let Some(text) = keys::printable_text(&text, modifiers) {
                out.push(XInput::Event(WindowEvent::TextInput { text }));
            }
        }
        xlib::KeyRelease => {
            // SAFETY: type is KeyRelease, so `key` is the active member.
            let key_event = unsafe { &mut xevent.key };
            let modifiers = Modifiers::from_x_state(key_event.state);
            let (keysym, _) = lookup(key_event);
            let symbol = keys::keysym_to_symbol(keysym);
            trace!("XEvent: KeyRelease (symbol: {:?})", symbol);
            out.push(XInput::Event(WindowEvent::KeyUp { symbol, modifiers }));
        }
        xlib::ButtonPress => {
            // SAFETY: type is ButtonPress.
            let button_event = unsafe { xevent.button };
            let position = Point::new(button_event.x as f64, button_event.y as f64);
            let modifiers = Modifiers::from_x_state(button_event.state);
            if let Some((delta_x, delta_y)) = scroll_delta(button_event.button) {
                trace!("XEvent: scroll button {} at {:?}", button_event.button, position);
                out.push(XInput::Event(WindowEvent::Scroll {
                    position,
                    delta_x,
                    delta_y,
                    modifiers,
                }));
            } else {
                let button = mouse_button(button_event.button);
                debug!("XEvent: ButtonPress ({:?} at {:?})", button, position);
                out.push(XInput::Event(WindowEvent::PointerPressed {
                    position,
                    button,
                    modifiers,
                }));
            }
        }
        xlib::ButtonRelease => {
            // SAFETY: type is ButtonRelease.
            let button_event = unsafe { xevent.button };
            // Wheel "buttons" release immediately after their press.
            if scroll_delta(button_event.button).is_some() {
                return;
            }
            let button = mouse_button(button_event.button);
            debug!(
                "XEvent: ButtonRelease ({:?} at {},{})",
                button, button_event.x, button_event.y
            );
            out.push(XInput::Event(WindowEvent::PointerReleased {
                position: Point::new(button_event.x as f64, button_event.y as f64),
                button,
                modifiers: Modifiers::from_x_state(button_event.state),
            }));
        }
        xlib::MotionNotify => {
            // SAFETY: type is MotionNotify.
            let motion_event = unsafe { xevent.motion };
            trace!("XEvent: MotionNotify ({}, {})", motion_event.x, motion_event.y);
            out.push(XInput::Event(WindowEvent::PointerMoved {
                position: Point::new(motion_event.x as f64, motion_event.y as f64),
                modifiers: Modifiers::from_x_state(motion_event.state),
            }));
        }
        xlib::ConfigureNotify => {
            // SAFETY: type is ConfigureNotify.
            let configure_event = unsafe { xevent.configure };
            trace!(
                "XEvent: ConfigureNotify ({}x{})",
                configure_event.width,
                configure_event.height
            );
            out.push(XInput::Configure {
                width: configure_event.width.max(0) as u32,
                height: configure_event.height.max(0) as u32,
            });
        }
        xlib::Expose => {
            // SAFETY: type is Expose.
            let expose_event = unsafe { xevent.expose };
            // Only the last Expose of a series matters; everything is repainted.
            if expose_event.count == 0 {
                out.push(XInput::Event(WindowEvent::Exposed));
            }
        }
        xlib::ClientMessage => {
            // SAFETY: type is ClientMessage.
            let client_message_event = unsafe { xevent.client_message };
            if client_message_event.message_type == atoms.wm_protocols
                && client_message_event.data.as_longs()[0] as xlib::Atom == atoms.wm_delete_window
            {
                info!("XEvent: WM_DELETE_WINDOW received from window manager");
                out.push(XInput::Event(WindowEvent::CloseRequested));
            } else {
                trace!(
                    "XEvent: Ignored ClientMessage (type: {})",
                    client_message_event.message_type
                );
            }
        }
        xlib::FocusIn => {
            debug!("XEvent: FocusIn");
            out.push(XInput::Event(WindowEvent::FocusIn));
        }
        xlib::FocusOut => {
            debug!("XEvent: FocusOut");
            out.push(XInput::Event(WindowEvent::FocusOut));
        }
        xlib::MapNotify | xlib::UnmapNotify | xlib::ReparentNotify => {
            trace!("XEvent: structure event {}", event_type);
        }
        other => trace!("XEvent: unhandled type {}", other),
    }
}
