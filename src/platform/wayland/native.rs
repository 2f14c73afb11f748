// src/platform/wayland/native.rs

//! `Wire` over libwayland-client, loaded at runtime.
//!
//! All requests go through `wl_proxy_marshal_array_flags`. All events come
//! back through a single dispatcher: each proxy's "implementation" pointer
//! carries a context id, and the dispatcher resolves it through a
//! thread-local registration table, decodes the arguments according to the
//! protocol table and queues a `ProtocolEvent`. No Rust object is pinned
//! behind a C pointer.

use super::ffi::{
    wl_argument, wl_array, wl_display, wl_interface, wl_message, wl_proxy, WaylandLib,
    WL_MARSHAL_FLAG_DESTROY,
};
use super::protocol::{resolve_request, Interface, MessageSpec};
use super::wire::{Arg, EventArg, ObjectId, ProtocolEvent, Wire};
use crate::platform::error::PlatformError;
use libc::{c_char, c_int, c_void};
use log::{debug, error, info, trace, warn};
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use std::cell::RefCell;
use std::collections::HashMap;
use std::ffi::{CStr, CString};
use std::os::fd::BorrowedFd;
use std::ptr;
use std::rc::Rc;
use std::sync::atomic::{AtomicU32, Ordering};

type EventQueue = Rc<RefCell<Vec<ProtocolEvent>>>;

struct Registration {
    object: ObjectId,
    interface: Interface,
    queue: EventQueue,
}

thread_local! {
    // Context id -> owner. Looked up by the dispatcher.
    static REGISTRATIONS: RefCell<HashMap<u32, Registration>> = RefCell::new(HashMap::new());
    // Proxy address -> client handle, for decoding object arguments.
    static PROXY_IDS: RefCell<HashMap<usize, ObjectId>> = RefCell::new(HashMap::new());
}

static NEXT_CONTEXT_ID: AtomicU32 = AtomicU32::new(1);

fn next_object_id() -> ObjectId {
    ObjectId(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed))
}

fn register(proxy: *mut wl_proxy, object: ObjectId, interface: Interface, queue: &EventQueue) {
    REGISTRATIONS.with(|r| {
        r.borrow_mut().insert(
            object.0,
            Registration {
                object,
                interface,
                queue: Rc::clone(queue),
            },
        )
    });
    PROXY_IDS.with(|p| p.borrow_mut().insert(proxy as usize, object));
}

fn unregister(proxy: *mut wl_proxy, object: ObjectId) {
    REGISTRATIONS.with(|r| r.borrow_mut().remove(&object.0));
    PROXY_IDS.with(|p| p.borrow_mut().remove(&(proxy as usize)));
}

unsafe fn decode_args(
    spec_args: impl Iterator<Item = (char, bool)>,
    args: *const wl_argument,
) -> Vec<EventArg> {
    let mut decoded = Vec::new();
    for (i, (ty, _)) in spec_args.enumerate() {
        let arg = &*args.add(i);
        decoded.push(match ty {
            'i' => EventArg::Int(arg.i),
            'u' => EventArg::Uint(arg.u),
            'f' => EventArg::Fixed(arg.f),
            's' => EventArg::Str(if arg.s.is_null() {
                None
            } else {
                Some(CStr::from_ptr(arg.s).to_string_lossy().into_owned())
            }),
            'o' => EventArg::Object(if arg.o.is_null() {
                None
            } else {
                PROXY_IDS.with(|p| p.borrow().get(&(arg.o as usize)).copied())
            }),
            'n' => EventArg::NewId(0),
            'a' => EventArg::Array(if arg.a.is_null() || (*arg.a).data.is_null() {
                Vec::new()
            } else {
                let array: &wl_array = &*arg.a;
                std::slice::from_raw_parts(array.data as *const u8, array.size).to_vec()
            }),
            'h' => EventArg::Fd(arg.h),
            other => {
                warn!("Unknown signature character '{}'", other);
                break;
            }
        });
    }
    decoded
}

unsafe fn dispatch_inner(context: u32, opcode: u32, args: *const wl_argument) {
    let target = REGISTRATIONS.with(|r| {
        r.try_borrow().ok().and_then(|r| {
            r.get(&context)
                .map(|reg| (reg.object, reg.interface, Rc::clone(&reg.queue)))
        })
    });
    let Some((object, interface, queue)) = target else {
        warn!("Event opcode {} for unknown context {}", opcode, context);
        return;
    };
    let Some(spec) = interface.event(opcode) else {
        warn!("{} has no event with opcode {}", interface.name(), opcode);
        return;
    };
    let args = decode_args(spec.arg_types(), args);
    trace!("<- {}@{}.{}({:?})", interface.name(), object.0, spec.name, args);
    match queue.try_borrow_mut() {
        Ok(mut q) => q.push(ProtocolEvent {
            object,
            interface,
            event: spec.name,
            args,
        }),
        Err(_) => error!("Event queue busy; dropped {}.{}", interface.name(), spec.name),
    };
}

/// The one dispatcher installed on every proxy.
unsafe extern "C" fn dispatch(
    implementation: *const c_void,
    _target: *mut c_void,
    opcode: u32,
    _msg: *const wl_message,
    args: *const wl_argument,
) -> c_int {
    let context = implementation as usize as u32;
    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        dispatch_inner(context, opcode, args)
    }));
    if outcome.is_err() {
        error!("Panic while dispatching Wayland event; event dropped");
    }
    0
}

/// `xdg-shell` descriptors, synthesized from the protocol table because
/// libwayland-client does not ship them.
struct XdgDescriptors {
    _strings: Vec<CString>,
    _messages: Vec<Box<[wl_message]>>,
    _null_types: Box<[*const wl_interface; 8]>,
    interfaces: Box<[wl_interface; 3]>,
}

const XDG_INTERFACES: [Interface; 3] = [
    Interface::XdgWmBase,
    Interface::XdgSurface,
    Interface::XdgToplevel,
];

fn intern(strings: &mut Vec<CString>, s: &str) -> Result<*const c_char, PlatformError> {
    let c = CString::new(s).map_err(|e| PlatformError::Protocol(e.to_string()))?;
    let p = c.as_ptr();
    strings.push(c);
    Ok(p)
}

fn message_table(
    specs: &[MessageSpec],
    strings: &mut Vec<CString>,
    types: *const *const wl_interface,
) -> Result<Box<[wl_message]>, PlatformError> {
    let mut table = Vec::with_capacity(specs.len());
    for m in specs {
        table.push(wl_message {
            name: intern(strings, m.name)?,
            signature: intern(strings, &m.wire_signature())?,
            types,
        });
    }
    Ok(table.into_boxed_slice())
}

impl XdgDescriptors {
    fn build() -> Result<Self, PlatformError> {
        // xdg events carry no object arguments, so no message needs real types.
        let null_types: Box<[*const wl_interface; 8]> = Box::new([ptr::null(); 8]);
        let mut strings = Vec::new();
        let mut messages = Vec::new();
        let mut built = Vec::with_capacity(XDG_INTERFACES.len());

        for iface in XDG_INTERFACES {
            let methods = message_table(iface.requests(), &mut strings, null_types.as_ptr())?;
            let events = message_table(iface.events(), &mut strings, null_types.as_ptr())?;
            built.push(wl_interface {
                name: intern(&mut strings, iface.name())?,
                version: iface.supported_version() as c_int,
                request_count: methods.len() as c_int,
                requests: methods.as_ptr(),
                event_count: events.len() as c_int,
                events: events.as_ptr(),
            });
            messages.push(methods);
            messages.push(events);
        }

        let interfaces: Box<[wl_interface; 3]> = built
            .into_boxed_slice()
            .try_into()
            .map_err(|_| PlatformError::Protocol("xdg descriptor count".into()))?;
        Ok(XdgDescriptors {
            _strings: strings,
            _messages: messages,
            _null_types: null_types,
            interfaces,
        })
    }

    fn get(&self, interface: Interface) -> Option<*const wl_interface> {
        XDG_INTERFACES
            .iter()
            .position(|i| *i == interface)
            .map(|idx| &self.interfaces[idx] as *const wl_interface)
    }
}

struct Proxy {
    ptr: *mut wl_proxy,
    interface: Interface,
    version: u32,
}

pub struct NativeWire {
    display: *mut wl_display,
    display_id: ObjectId,
    proxies: HashMap<ObjectId, Proxy>,
    queue: EventQueue,
    xdg: XdgDescriptors,
    // Dropped last: every pointer above comes from this library.
    lib: WaylandLib,
}

impl NativeWire {
    /// Loads libwayland-client and connects to `$WAYLAND_DISPLAY`.
    pub fn connect() -> Result<Self, PlatformError> {
        let lib = WaylandLib::load()?;
        let xdg = XdgDescriptors::build()?;
        // SAFETY: a null name means "use $WAYLAND_DISPLAY".
        let display = unsafe { (lib.wl_display_connect)(ptr::null()) };
        if display.is_null() {
            return Err(PlatformError::DisplayOpen { server: "Wayland" });
        }
        info!("Connected to Wayland display {:p}", display);

        let display_id = next_object_id();
        let mut proxies = HashMap::new();
        proxies.insert(
            display_id,
            Proxy {
                ptr: display as *mut wl_proxy,
                interface: Interface::Display,
                version: 1,
            },
        );
        Ok(NativeWire {
            display,
            display_id,
            proxies,
            queue: Rc::new(RefCell::new(Vec::new())),
            xdg,
            lib,
        })
    }

    fn interface_ptr(&self, interface: Interface) -> Result<*const wl_interface, PlatformError> {
        let lib = &self.lib;
        let ptr = match interface {
            Interface::Registry => lib.wl_registry_interface,
            Interface::Callback => lib.wl_callback_interface,
            Interface::Compositor => lib.wl_compositor_interface,
            Interface::Shm => lib.wl_shm_interface,
            Interface::ShmPool => lib.wl_shm_pool_interface,
            Interface::Buffer => lib.wl_buffer_interface,
            Interface::Surface => lib.wl_surface_interface,
            Interface::Seat => lib.wl_seat_interface,
            Interface::Pointer => lib.wl_pointer_interface,
            Interface::Keyboard => lib.wl_keyboard_interface,
            other => self.xdg.get(other).ok_or_else(|| {
                PlatformError::Protocol(format!("no descriptor for {}", other.name()))
            })?,
        };
        Ok(ptr)
    }

    /// Takes ownership of a freshly created proxy and installs the dispatcher.
    fn adopt(
        &mut self,
        proxy: *mut wl_proxy,
        interface: Interface,
        version: u32,
    ) -> Result<ObjectId, PlatformError> {
        if proxy.is_null() {
            return Err(PlatformError::Protocol(format!(
                "failed to create {}",
                interface.name()
            )));
        }
        let object = next_object_id();
        // SAFETY: proxy is live; the implementation pointer is an opaque id
        // that is never dereferenced.
        let rc = unsafe {
            (self.lib.wl_proxy_add_dispatcher)(
                proxy,
                dispatch,
                object.0 as usize as *const c_void,
                ptr::null_mut(),
            )
        };
        if rc != 0 {
            // SAFETY: proxy is live and not yet shared.
            unsafe { (self.lib.wl_proxy_destroy)(proxy) };
            return Err(PlatformError::Protocol(format!(
                "wl_proxy_add_dispatcher failed for {}",
                interface.name()
            )));
        }
        register(proxy, object, interface, &self.queue);
        let protocol_id = self
            .lib
            .wl_proxy_get_id
            // SAFETY: proxy is live.
            .map(|get_id| unsafe { get_id(proxy) })
            .unwrap_or(0);
        debug!(
            "New {} v{} (handle {}, protocol id {})",
            interface.name(),
            version,
            object.0,
            protocol_id
        );
        self.proxies.insert(
            object,
            Proxy {
                ptr: proxy,
                interface,
                version,
            },
        );
        Ok(object)
    }

    fn protocol_error(&self, what: &str) -> PlatformError {
        // SAFETY: display is live.
        let errno = unsafe { (self.lib.wl_display_get_error)(self.display) };
        PlatformError::Protocol(format!(
            "{} failed: {}",
            what,
            std::io::Error::from_raw_os_error(errno)
        ))
    }
}

impl Wire for NativeWire {
    fn display(&self) -> ObjectId {
        self.display_id
    }

    fn send(
        &mut self,
        object: ObjectId,
        request: &'static str,
        args: &[Arg],
    ) -> Result<Option<ObjectId>, PlatformError> {
        let (proxy_ptr, interface, version) = match self.proxies.get(&object) {
            Some(p) => (p.ptr, p.interface, p.version),
            None => {
                return Err(PlatformError::Protocol(format!(
                    "{} on dead object {:?}",
                    request, object
                )))
            }
        };
        let (opcode, spec) = resolve_request(interface, object, request, args)?;
        if version < spec.since {
            return Err(PlatformError::Protocol(format!(
                "{}.{} needs v{}, object is v{}",
                interface.name(),
                request,
                spec.since,
                version
            )));
        }

        let mut strings = Vec::new();
        let mut wire_args = Vec::with_capacity(args.len());
        for arg in args {
            wire_args.push(match arg {
                Arg::Int(v) => wl_argument { i: *v },
                Arg::Uint(v) => wl_argument { u: *v },
                Arg::Fixed(v) => wl_argument { f: *v },
                Arg::Str(s) => {
                    let c = CString::new(s.replace('\0', ""))
                        .map_err(|e| PlatformError::Protocol(e.to_string()))?;
                    let p = c.as_ptr();
                    strings.push(c);
                    wl_argument { s: p }
                }
                Arg::Object(Some(id)) => match self.proxies.get(id) {
                    Some(p) => wl_argument {
                        o: p.ptr as *const c_void,
                    },
                    None => {
                        return Err(PlatformError::Protocol(format!(
                            "{}.{} references dead object {:?}",
                            interface.name(),
                            request,
                            id
                        )))
                    }
                },
                Arg::Object(None) => wl_argument { o: ptr::null() },
                Arg::NewId => wl_argument { n: 0 },
                Arg::Fd(fd) => wl_argument { h: *fd },
            });
        }

        let new_interface = match spec.new_interface {
            Some(ni) => Some((ni, self.interface_ptr(ni)?)),
            None => None,
        };
        let flags = if spec.destructor {
            WL_MARSHAL_FLAG_DESTROY
        } else {
            0
        };
        trace!("-> {}@{}.{}({:?})", interface.name(), object.0, request, args);
        // SAFETY: proxy is live, arguments match the message signature
        // (checked above), and strings outlive the call.
        let created = unsafe {
            (self.lib.wl_proxy_marshal_array_flags)(
                proxy_ptr,
                opcode,
                new_interface.map(|(_, p)| p).unwrap_or(ptr::null()),
                version,
                flags,
                wire_args.as_mut_ptr(),
            )
        };
        drop(strings);

        if spec.destructor {
            unregister(proxy_ptr, object);
            self.proxies.remove(&object);
        }
        match new_interface {
            Some((ni, _)) => self.adopt(created, ni, version).map(Some),
            None => Ok(None),
        }
    }

    fn bind(
        &mut self,
        registry: ObjectId,
        name: u32,
        interface: Interface,
        version: u32,
    ) -> Result<ObjectId, PlatformError> {
        let registry_ptr = self
            .proxies
            .get(&registry)
            .filter(|p| p.interface == Interface::Registry)
            .map(|p| p.ptr)
            .ok_or_else(|| PlatformError::Protocol("bind without a registry".into()))?;
        let iface_ptr = self.interface_ptr(interface)?;
        let iface_name =
            CString::new(interface.name()).map_err(|e| PlatformError::Protocol(e.to_string()))?;
        let mut wire_args = [
            wl_argument { u: name },
            wl_argument {
                s: iface_name.as_ptr(),
            },
            wl_argument { u: version },
            wl_argument { n: 0 },
        ];
        trace!("-> wl_registry.bind({}, {}, v{})", name, interface.name(), version);
        // SAFETY: registry is live; the argument array matches "usun".
        let created = unsafe {
            (self.lib.wl_proxy_marshal_array_flags)(
                registry_ptr,
                0,
                iface_ptr,
                version,
                0,
                wire_args.as_mut_ptr(),
            )
        };
        self.adopt(created, interface, version)
    }

    fn forget(&mut self, object: ObjectId) {
        if object == self.display_id {
            return;
        }
        if let Some(proxy) = self.proxies.remove(&object) {
            unregister(proxy.ptr, object);
            // SAFETY: proxy is live and removed from every table.
            unsafe { (self.lib.wl_proxy_destroy)(proxy.ptr) };
        }
    }

    fn version(&self, object: ObjectId) -> u32 {
        self.proxies.get(&object).map(|p| p.version).unwrap_or(0)
    }

    fn roundtrip(&mut self) -> Result<(), PlatformError> {
        // SAFETY: display is live.
        if unsafe { (self.lib.wl_display_roundtrip)(self.display) } < 0 {
            return Err(self.protocol_error("wl_display_roundtrip"));
        }
        Ok(())
    }

    fn pump(&mut self) -> Result<(), PlatformError> {
        self.flush()?;
        let display = self.display;
        let lib = &self.lib;

        // SAFETY: display is live for every call below.
        unsafe {
            while (lib.wl_display_prepare_read)(display) != 0 {
                if (lib.wl_display_dispatch_pending)(display) < 0 {
                    return Err(self.protocol_error("wl_display_dispatch_pending"));
                }
            }

            let fd = (lib.wl_display_get_fd)(display);
            let readable = {
                let mut fds = [PollFd::new(BorrowedFd::borrow_raw(fd), PollFlags::POLLIN)];
                match poll(&mut fds, PollTimeout::ZERO) {
                    Ok(n) if n > 0 => fds[0]
                        .revents()
                        .map(|r| r.intersects(PollFlags::POLLIN | PollFlags::POLLHUP | PollFlags::POLLERR))
                        .unwrap_or(false),
                    Ok(_) => false,
                    Err(e) => {
                        (lib.wl_display_cancel_read)(display);
                        return Err(PlatformError::Protocol(format!("poll failed: {}", e)));
                    }
                }
            };

            if readable {
                if (lib.wl_display_read_events)(display) < 0 {
                    return Err(self.protocol_error("wl_display_read_events"));
                }
            } else {
                (lib.wl_display_cancel_read)(display);
            }

            if (lib.wl_display_dispatch_pending)(display) < 0 {
                return Err(self.protocol_error("wl_display_dispatch_pending"));
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), PlatformError> {
        // SAFETY: display is live.
        if unsafe { (self.lib.wl_display_flush)(self.display) } < 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == std::io::ErrorKind::WouldBlock {
                trace!("wl_display_flush: socket full, retrying next iteration");
                return Ok(());
            }
            return Err(PlatformError::Protocol(format!("wl_display_flush failed: {}", err)));
        }
        Ok(())
    }

    fn take_events(&mut self) -> Vec<ProtocolEvent> {
        std::mem::take(&mut *self.queue.borrow_mut())
    }
}

impl Drop for NativeWire {
    fn drop(&mut self) {
        let display_id = self.display_id;
        for (object, proxy) in self.proxies.drain() {
            if object == display_id {
                continue;
            }
            unregister(proxy.ptr, object);
            trace!("Destroying leftover {} proxy", proxy.interface.name());
            // SAFETY: proxy is live and owned by this wire.
            unsafe { (self.lib.wl_proxy_destroy)(proxy.ptr) };
        }
        info!("Disconnecting from Wayland display {:p}", self.display);
        // SAFETY: display is live; all proxies are gone.
        unsafe { (self.lib.wl_display_disconnect)(self.display) };
    }
}
