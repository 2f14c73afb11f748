// src/platform/wayland/protocol.rs

//! Protocol description table.
//!
//! Every interface the client speaks is described once here: its wire name,
//! the highest version the client implements, and its requests and events
//! in opcode order. The native wire synthesizes `xdg-shell` descriptors
//! from this table, and both wires validate outgoing arguments against it.

use super::wire::{Arg, ObjectId};
use crate::platform::error::PlatformError;

/// A message: name, argument signature, and the interface created by its
/// `new_id` argument (if any). Opcode is the index in its table.
#[derive(Debug, Clone, Copy)]
pub struct MessageSpec {
    pub name: &'static str,
    /// libwayland signature characters, without the version prefix.
    pub signature: &'static str,
    /// First interface version carrying this message.
    pub since: u32,
    pub new_interface: Option<Interface>,
    pub destructor: bool,
    /// Holds an opcode slot for a request this client never sends.
    pub reserved: bool,
}

const fn msg(name: &'static str, signature: &'static str) -> MessageSpec {
    MessageSpec {
        name,
        signature,
        since: 1,
        new_interface: None,
        destructor: false,
        reserved: false,
    }
}

const fn since(mut m: MessageSpec, version: u32) -> MessageSpec {
    m.since = version;
    m
}

const fn creates(mut m: MessageSpec, interface: Interface) -> MessageSpec {
    m.new_interface = Some(interface);
    m
}

const fn destructor(mut m: MessageSpec) -> MessageSpec {
    m.destructor = true;
    m
}

const fn reserved(mut m: MessageSpec) -> MessageSpec {
    m.reserved = true;
    m
}

impl MessageSpec {
    /// Argument type characters (`?` nullability markers removed).
    pub fn arg_types(&self) -> impl Iterator<Item = (char, bool)> + '_ {
        let mut nullable = false;
        self.signature.chars().filter_map(move |c| {
            if c == '?' {
                nullable = true;
                None
            } else {
                let item = (c, nullable);
                nullable = false;
                Some(item)
            }
        })
    }

    pub fn arg_count(&self) -> usize {
        self.arg_types().count()
    }

    /// The signature as libwayland expects it, with the version prefix.
    pub fn wire_signature(&self) -> String {
        if self.since > 1 {
            format!("{}{}", self.since, self.signature)
        } else {
            self.signature.to_string()
        }
    }

    /// Checks `args` against the signature.
    pub fn check_args(&self, interface: Interface, args: &[Arg]) -> Result<(), PlatformError> {
        let expected = self.arg_count();
        if args.len() != expected {
            return Err(PlatformError::Protocol(format!(
                "{}.{} takes {} arguments, got {}",
                interface.name(),
                self.name,
                expected,
                args.len()
            )));
        }
        for (i, ((ty, nullable), arg)) in self.arg_types().zip(args).enumerate() {
            let ok = matches!(
                (ty, arg),
                ('i', Arg::Int(_))
                    | ('u', Arg::Uint(_))
                    | ('f', Arg::Fixed(_))
                    | ('s', Arg::Str(_))
                    | ('o', Arg::Object(Some(_)))
                    | ('n', Arg::NewId)
                    | ('h', Arg::Fd(_))
            ) || (nullable && ty == 'o' && matches!(arg, Arg::Object(None)));
            if !ok {
                return Err(PlatformError::Protocol(format!(
                    "{}.{} argument {} should be '{}', got {:?}",
                    interface.name(),
                    self.name,
                    i,
                    ty,
                    arg
                )));
            }
        }
        Ok(())
    }
}

/// Interfaces used by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interface {
    Display,
    Registry,
    Callback,
    Compositor,
    Shm,
    ShmPool,
    Buffer,
    Surface,
    Seat,
    Pointer,
    Keyboard,
    XdgWmBase,
    XdgSurface,
    XdgToplevel,
}

const DISPLAY_REQUESTS: &[MessageSpec] = &[
    creates(msg("sync", "n"), Interface::Callback),
    creates(msg("get_registry", "n"), Interface::Registry),
];
const DISPLAY_EVENTS: &[MessageSpec] = &[msg("error", "ous"), msg("delete_id", "u")];

// bind's new_id is untyped ("sun"); the wire handles it specially.
const REGISTRY_REQUESTS: &[MessageSpec] = &[msg("bind", "usun")];
const REGISTRY_EVENTS: &[MessageSpec] = &[msg("global", "usu"), msg("global_remove", "u")];

const CALLBACK_EVENTS: &[MessageSpec] = &[msg("done", "u")];

const COMPOSITOR_REQUESTS: &[MessageSpec] = &[
    creates(msg("create_surface", "n"), Interface::Surface),
    reserved(msg("create_region", "n")),
];

const SHM_REQUESTS: &[MessageSpec] = &[creates(msg("create_pool", "nhi"), Interface::ShmPool)];
const SHM_EVENTS: &[MessageSpec] = &[msg("format", "u")];

const SHM_POOL_REQUESTS: &[MessageSpec] = &[
    creates(msg("create_buffer", "niiiiu"), Interface::Buffer),
    destructor(msg("destroy", "")),
    msg("resize", "i"),
];

const BUFFER_REQUESTS: &[MessageSpec] = &[destructor(msg("destroy", ""))];
const BUFFER_EVENTS: &[MessageSpec] = &[msg("release", "")];

const SURFACE_REQUESTS: &[MessageSpec] = &[
    destructor(msg("destroy", "")),
    msg("attach", "?oii"),
    msg("damage", "iiii"),
    creates(msg("frame", "n"), Interface::Callback),
    msg("set_opaque_region", "?o"),
    msg("set_input_region", "?o"),
    msg("commit", ""),
    since(msg("set_buffer_transform", "i"), 2),
    since(msg("set_buffer_scale", "i"), 3),
    since(msg("damage_buffer", "iiii"), 4),
];
const SURFACE_EVENTS: &[MessageSpec] = &[msg("enter", "o"), msg("leave", "o")];

const SEAT_REQUESTS: &[MessageSpec] = &[
    creates(msg("get_pointer", "n"), Interface::Pointer),
    creates(msg("get_keyboard", "n"), Interface::Keyboard),
    reserved(msg("get_touch", "n")),
    destructor(since(msg("release", ""), 5)),
];
const SEAT_EVENTS: &[MessageSpec] = &[msg("capabilities", "u"), since(msg("name", "s"), 2)];

const POINTER_REQUESTS: &[MessageSpec] = &[
    msg("set_cursor", "u?oii"),
    destructor(since(msg("release", ""), 3)),
];
const POINTER_EVENTS: &[MessageSpec] = &[
    msg("enter", "uoff"),
    msg("leave", "uo"),
    msg("motion", "uff"),
    msg("button", "uuuu"),
    msg("axis", "uuf"),
    since(msg("frame", ""), 5),
    since(msg("axis_source", "u"), 5),
    since(msg("axis_stop", "uu"), 5),
    since(msg("axis_discrete", "ui"), 5),
];

const KEYBOARD_REQUESTS: &[MessageSpec] = &[destructor(since(msg("release", ""), 3))];
const KEYBOARD_EVENTS: &[MessageSpec] = &[
    msg("keymap", "uhu"),
    msg("enter", "uoa"),
    msg("leave", "uo"),
    msg("key", "uuuu"),
    msg("modifiers", "uuuuu"),
    since(msg("repeat_info", "ii"), 4),
];

const XDG_WM_BASE_REQUESTS: &[MessageSpec] = &[
    destructor(msg("destroy", "")),
    reserved(msg("create_positioner", "n")),
    creates(msg("get_xdg_surface", "no"), Interface::XdgSurface),
    msg("pong", "u"),
];
const XDG_WM_BASE_EVENTS: &[MessageSpec] = &[msg("ping", "u")];

const XDG_SURFACE_REQUESTS: &[MessageSpec] = &[
    destructor(msg("destroy", "")),
    creates(msg("get_toplevel", "n"), Interface::XdgToplevel),
    reserved(msg("get_popup", "n?oo")),
    msg("set_window_geometry", "iiii"),
    msg("ack_configure", "u"),
];
const XDG_SURFACE_EVENTS: &[MessageSpec] = &[msg("configure", "u")];

const XDG_TOPLEVEL_REQUESTS: &[MessageSpec] = &[
    destructor(msg("destroy", "")),
    msg("set_parent", "?o"),
    msg("set_title", "s"),
    msg("set_app_id", "s"),
    msg("show_window_menu", "ouii"),
    msg("move", "ou"),
    msg("resize", "ouu"),
    msg("set_max_size", "ii"),
    msg("set_min_size", "ii"),
    msg("set_maximized", ""),
    msg("unset_maximized", ""),
    msg("set_fullscreen", "?o"),
    msg("unset_fullscreen", ""),
    msg("set_minimized", ""),
];
const XDG_TOPLEVEL_EVENTS: &[MessageSpec] = &[msg("configure", "iia"), msg("close", "")];

impl Interface {
    /// Protocol name, as announced by `wl_registry.global`.
    pub fn name(self) -> &'static str {
        match self {
            Interface::Display => "wl_display",
            Interface::Registry => "wl_registry",
            Interface::Callback => "wl_callback",
            Interface::Compositor => "wl_compositor",
            Interface::Shm => "wl_shm",
            Interface::ShmPool => "wl_shm_pool",
            Interface::Buffer => "wl_buffer",
            Interface::Surface => "wl_surface",
            Interface::Seat => "wl_seat",
            Interface::Pointer => "wl_pointer",
            Interface::Keyboard => "wl_keyboard",
            Interface::XdgWmBase => "xdg_wm_base",
            Interface::XdgSurface => "xdg_surface",
            Interface::XdgToplevel => "xdg_toplevel",
        }
    }

    /// Highest version this client implements.
    pub fn supported_version(self) -> u32 {
        match self {
            Interface::Compositor | Interface::Surface => 4,
            Interface::Seat | Interface::Pointer | Interface::Keyboard => 5,
            _ => 1,
        }
    }

    pub fn requests(self) -> &'static [MessageSpec] {
        match self {
            Interface::Display => DISPLAY_REQUESTS,
            Interface::Registry => REGISTRY_REQUESTS,
            Interface::Compositor => COMPOSITOR_REQUESTS,
            Interface::Shm => SHM_REQUESTS,
            Interface::ShmPool => SHM_POOL_REQUESTS,
            Interface::Buffer => BUFFER_REQUESTS,
            Interface::Surface => SURFACE_REQUESTS,
            Interface::Seat => SEAT_REQUESTS,
            Interface::Pointer => POINTER_REQUESTS,
            Interface::Keyboard => KEYBOARD_REQUESTS,
            Interface::XdgWmBase => XDG_WM_BASE_REQUESTS,
            Interface::XdgSurface => XDG_SURFACE_REQUESTS,
            Interface::XdgToplevel => XDG_TOPLEVEL_REQUESTS,
            Interface::Callback => &[],
        }
    }

    pub fn events(self) -> &'static [MessageSpec] {
        match self {
            Interface::Display => DISPLAY_EVENTS,
            Interface::Registry => REGISTRY_EVENTS,
            Interface::Callback => CALLBACK_EVENTS,
            Interface::Shm => SHM_EVENTS,
            Interface::Buffer => BUFFER_EVENTS,
            Interface::Surface => SURFACE_EVENTS,
            Interface::Seat => SEAT_EVENTS,
            Interface::Pointer => POINTER_EVENTS,
            Interface::Keyboard => KEYBOARD_EVENTS,
            Interface::XdgWmBase => XDG_WM_BASE_EVENTS,
            Interface::XdgSurface => XDG_SURFACE_EVENTS,
            Interface::XdgToplevel => XDG_TOPLEVEL_EVENTS,
            _ => &[],
        }
    }

    /// Looks up a request by name, returning its opcode and description.
    pub fn request(self, name: &str) -> Result<(u32, &'static MessageSpec), PlatformError> {
        self.requests()
            .iter()
            .enumerate()
            .find(|(_, m)| m.name == name && !m.reserved)
            .map(|(opcode, m)| (opcode as u32, m))
            .ok_or_else(|| {
                PlatformError::Protocol(format!("{} has no request '{}'", self.name(), name))
            })
    }

    pub fn event(self, opcode: u32) -> Option<&'static MessageSpec> {
        self.events().get(opcode as usize)
    }

    /// Maps an advertised global name to an interface this client binds.
    pub fn from_global(name: &str) -> Option<Interface> {
        match name {
            "wl_compositor" => Some(Interface::Compositor),
            "wl_shm" => Some(Interface::Shm),
            "wl_seat" => Some(Interface::Seat),
            "xdg_wm_base" => Some(Interface::XdgWmBase),
            _ => None,
        }
    }
}

/// `wl_shm` pixel format for XRGB8888.
pub const SHM_FORMAT_XRGB8888: u32 = 1;

/// `wl_seat.capabilities` bits.
pub const SEAT_CAPABILITY_POINTER: u32 = 1;
pub const SEAT_CAPABILITY_KEYBOARD: u32 = 2;

/// A request about to be sent, as both wires see it.
pub fn resolve_request(
    interface: Interface,
    object: ObjectId,
    name: &str,
    args: &[Arg],
) -> Result<(u32, &'static MessageSpec), PlatformError> {
    let (opcode, spec) = interface.request(name)?;
    spec.check_args(interface, args).map_err(|e| match e {
        PlatformError::Protocol(m) => PlatformError::Protocol(format!("{} ({:?})", m, object)),
        other => other,
    })?;
    Ok((opcode, spec))
}
