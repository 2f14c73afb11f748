// src/platform/wayland/client/tests.rs

use super::*;
use crate::keys::KeySymbol;
use crate::platform::wayland::protocol::resolve_request;
use crate::platform::wayland::wire::EventArg;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// One request as the compositor would have seen it.
#[derive(Debug, Clone)]
struct Call {
    interface: Interface,
    object: ObjectId,
    request: &'static str,
    args: Vec<Arg>,
}

impl Call {
    fn name(&self) -> String {
        format!("{}.{}", self.interface.name(), self.request)
    }
}

/// A fake compositor: records requests, announces globals on
/// `get_registry`, and configures the toplevel on the first commit (and
/// on the first commit after a null attach). Events queued by the fake
/// are delivered on the next roundtrip or pump.
struct RecordingWire {
    next_id: u32,
    objects: HashMap<ObjectId, (Interface, u32)>,
    calls: Vec<Call>,
    outbox: Vec<ProtocolEvent>,
    inbox: Vec<ProtocolEvent>,
    globals: Vec<(u32, &'static str, u32)>,
    seat_capabilities: u32,
    initial_size: (i32, i32),
    awaiting_configure: bool,
    /// A null attach is pending; the next commit unmaps.
    unmapping: bool,
    serial: u32,
    /// Request names, shared so they outlive the client.
    journal: Rc<RefCell<Vec<String>>>,
}

const DISPLAY: ObjectId = ObjectId(1);

impl RecordingWire {
    fn new() -> Self {
        let mut objects = HashMap::new();
        objects.insert(DISPLAY, (Interface::Display, 1));
        RecordingWire {
            next_id: 2,
            objects,
            calls: Vec::new(),
            outbox: Vec::new(),
            inbox: Vec::new(),
            globals: vec![
                (1, "wl_compositor", 5),
                (2, "wl_shm", 1),
                (3, "xdg_wm_base", 3),
                (4, "wl_seat", 7),
                (5, "wl_output", 3),
            ],
            seat_capabilities: SEAT_CAPABILITY_POINTER | SEAT_CAPABILITY_KEYBOARD,
            initial_size: (0, 0),
            awaiting_configure: true,
            unmapping: false,
            serial: 100,
            journal: Rc::new(RefCell::new(Vec::new())),
        }
    }

    fn without_global(mut self, name: &str) -> Self {
        self.globals.retain(|(_, n, _)| *n != name);
        self
    }

    fn allocate(&mut self, interface: Interface, version: u32) -> ObjectId {
        let id = ObjectId(self.next_id);
        self.next_id += 1;
        self.objects.insert(id, (interface, version));
        id
    }

    fn find(&self, interface: Interface) -> Option<ObjectId> {
        let mut ids: Vec<_> = self
            .objects
            .iter()
            .filter(|(_, (i, _))| *i == interface)
            .map(|(id, _)| *id)
            .collect();
        ids.sort();
        ids.last().copied()
    }

    fn emit(&mut self, object: ObjectId, interface: Interface, event: &'static str, args: Vec<EventArg>) {
        self.outbox.push(ProtocolEvent {
            object,
            interface,
            event,
            args,
        });
    }

    fn configure(&mut self, width: i32, height: i32) -> u32 {
        self.serial += 1;
        let serial = self.serial;
        if let Some(toplevel) = self.find(Interface::XdgToplevel) {
            self.emit(
                toplevel,
                Interface::XdgToplevel,
                "configure",
                vec![EventArg::Int(width), EventArg::Int(height), EventArg::Array(Vec::new())],
            );
        }
        if let Some(xdg_surface) = self.find(Interface::XdgSurface) {
            self.emit(
                xdg_surface,
                Interface::XdgSurface,
                "configure",
                vec![EventArg::Uint(serial)],
            );
        }
        serial
    }

    fn names(&self) -> Vec<String> {
        self.calls.iter().map(Call::name).collect()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.names().iter().position(|n| n == name)
    }

    fn count(&self, name: &str) -> usize {
        self.names().iter().filter(|n| *n == name).count()
    }

    fn last(&self, name: &str) -> Option<&Call> {
        self.calls.iter().rev().find(|c| c.name() == name)
    }
}

impl Wire for RecordingWire {
    fn display(&self) -> ObjectId {
        DISPLAY
    }

    fn send(
        &mut self,
        object: ObjectId,
        request: &'static str,
        args: &[Arg],
    ) -> Result<Option<ObjectId>, PlatformError> {
        let (interface, version) = *self
            .objects
            .get(&object)
            .ok_or_else(|| PlatformError::Protocol(format!("{} on dead {:?}", request, object)))?;
        let (_, spec) = resolve_request(interface, object, request, args)?;
        if version < spec.since {
            return Err(PlatformError::Protocol(format!(
                "{}.{} needs v{}",
                interface.name(),
                request,
                spec.since
            )));
        }
        for arg in args {
            if let Arg::Object(Some(id)) = arg {
                if !self.objects.contains_key(id) {
                    return Err(PlatformError::Protocol(format!("dead argument {:?}", id)));
                }
            }
        }
        let call = Call {
            interface,
            object,
            request,
            args: args.to_vec(),
        };
        self.journal.borrow_mut().push(call.name());
        self.calls.push(call);
        if spec.destructor {
            self.objects.remove(&object);
        }
        let created = spec.new_interface.map(|ni| self.allocate(ni, version));

        match (interface, request) {
            (Interface::Display, "get_registry") => {
                if let Some(registry) = created {
                    for (name, iface, version) in self.globals.clone() {
                        self.emit(
                            registry,
                            Interface::Registry,
                            "global",
                            vec![
                                EventArg::Uint(name),
                                EventArg::Str(Some(iface.to_string())),
                                EventArg::Uint(version),
                            ],
                        );
                    }
                }
            }
            (Interface::Surface, "attach") if args.first() == Some(&Arg::Object(None)) => {
                self.unmapping = true;
            }
            (Interface::Surface, "commit") if self.unmapping => {
                self.unmapping = false;
                self.awaiting_configure = true;
            }
            (Interface::Surface, "commit") if self.awaiting_configure => {
                self.awaiting_configure = false;
                let (w, h) = self.initial_size;
                self.configure(w, h);
            }
            _ => {}
        }
        Ok(created)
    }

    fn bind(
        &mut self,
        registry: ObjectId,
        name: u32,
        interface: Interface,
        version: u32,
    ) -> Result<ObjectId, PlatformError> {
        self.calls.push(Call {
            interface: Interface::Registry,
            object: registry,
            request: "bind",
            args: vec![Arg::Uint(name), Arg::Str(interface.name().into()), Arg::Uint(version)],
        });
        let id = self.allocate(interface, version);
        if interface == Interface::Seat {
            let caps = self.seat_capabilities;
            self.emit(id, Interface::Seat, "capabilities", vec![EventArg::Uint(caps)]);
        }
        Ok(id)
    }

    fn forget(&mut self, object: ObjectId) {
        self.objects.remove(&object);
    }

    fn version(&self, object: ObjectId) -> u32 {
        self.objects.get(&object).map(|(_, v)| *v).unwrap_or(0)
    }

    fn roundtrip(&mut self) -> Result<(), PlatformError> {
        self.inbox.append(&mut self.outbox);
        Ok(())
    }

    fn pump(&mut self) -> Result<(), PlatformError> {
        self.inbox.append(&mut self.outbox);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), PlatformError> {
        Ok(())
    }

    fn take_events(&mut self) -> Vec<ProtocolEvent> {
        mem::take(&mut self.inbox)
    }
}

fn client_with(wire: RecordingWire) -> WaylandClient<RecordingWire> {
    WaylandClient::with_wire(wire, &Config::default()).expect("client should come up")
}

fn fixed(v: f64) -> EventArg {
    EventArg::Fixed((v * 256.0) as i32)
}

#[test_log::test]
fn it_should_ack_the_first_configure_before_attaching() {
    let mut client = client_with(RecordingWire::new());
    assert!(client.is_configured());
    client.show();
    client.present();

    let wire = &client.wire;
    let ack = wire.position("xdg_surface.ack_configure").expect("acked");
    let attach = wire.position("wl_surface.attach").expect("attached");
    assert!(ack < attach, "calls: {:?}", wire.names());
    assert!(wire.position("wl_shm.create_pool").unwrap() < attach);
    assert_eq!(
        wire.last("xdg_surface.ack_configure").unwrap().args,
        vec![Arg::Uint(101)]
    );
    // Surface v4 (min of server 5 and client 4) damages in buffer space.
    assert_eq!(wire.count("wl_surface.damage_buffer"), 1);
    assert_eq!(wire.count("wl_surface.damage"), 0);
}

#[test_log::test]
fn it_should_not_attach_before_show() {
    let mut client = client_with(RecordingWire::new());
    client.present();
    assert_eq!(client.wire.count("wl_surface.attach"), 0);
}

#[test_log::test]
fn it_should_bind_at_the_lower_of_both_versions() {
    let client = client_with(RecordingWire::new());
    let binds: Vec<_> = client
        .wire
        .calls
        .iter()
        .filter(|c| c.request == "bind")
        .map(|c| c.args.clone())
        .collect();
    assert!(binds.contains(&vec![
        Arg::Uint(1),
        Arg::Str("wl_compositor".into()),
        Arg::Uint(4)
    ]));
    assert!(binds.contains(&vec![Arg::Uint(4), Arg::Str("wl_seat".into()), Arg::Uint(5)]));
    // wl_output is not used.
    assert_eq!(binds.len(), 4);
}

#[test_log::test]
fn it_should_fail_when_a_required_global_is_missing() {
    let wire = RecordingWire::new().without_global("xdg_wm_base");
    let err = match WaylandClient::with_wire(wire, &Config::default()) {
        Ok(_) => panic!("should not come up without xdg_wm_base"),
        Err(e) => e,
    };
    match err.downcast_ref::<PlatformError>() {
        Some(PlatformError::MissingGlobal(name)) => assert_eq!(*name, "xdg_wm_base"),
        other => panic!("unexpected error {:?}", other),
    }
}

#[test_log::test]
fn it_should_start_at_the_configured_size_when_the_compositor_defers() {
    let client = client_with(RecordingWire::new());
    assert_eq!(client.size(), (800, 600));
    let storage = client.framebuffer.buffer().unwrap();
    assert_eq!(storage.size(), (800, 600));
    assert_eq!(storage.stride(), 800 * 4);
}

#[test_log::test]
fn it_should_reallocate_on_a_new_configure_size() {
    let mut client = client_with(RecordingWire::new());
    client.show();
    client.process_events().unwrap();
    let serial = client.wire.configure(1024, 768);

    let events = client.process_events().unwrap();
    assert_eq!(
        events,
        vec![WindowEvent::Resized {
            width: 1024,
            height: 768
        }]
    );
    assert_eq!(client.size(), (1024, 768));
    assert_eq!(client.framebuffer.allocations(), 2);
    assert_eq!(client.framebuffer.buffer().unwrap().stride(), 4096);

    let wire = &client.wire;
    assert_eq!(
        wire.last("xdg_surface.ack_configure").unwrap().args,
        vec![Arg::Uint(serial)]
    );
    let names = wire.names();
    let destroy_buffer = names.iter().rposition(|n| n == "wl_buffer.destroy").unwrap();
    let destroy_pool = names.iter().rposition(|n| n == "wl_shm_pool.destroy").unwrap();
    let create_pool = names.iter().rposition(|n| n == "wl_shm.create_pool").unwrap();
    assert!(destroy_buffer < destroy_pool && destroy_pool < create_pool);
    assert_eq!(
        wire.last("wl_shm_pool.create_buffer").unwrap().args[1..],
        [
            Arg::Int(0),
            Arg::Int(1024),
            Arg::Int(768),
            Arg::Int(4096),
            Arg::Uint(SHM_FORMAT_XRGB8888)
        ]
    );
}

#[test_log::test]
fn it_should_refuse_pool_sizes_beyond_the_wire_range() {
    assert_eq!(wire_size(800 * 600 * 4, "pool size").unwrap(), 1_920_000);
    assert_eq!(wire_size(i32::MAX as usize, "pool size").unwrap(), i32::MAX);
    assert!(matches!(
        wire_size(1 << 31, "pool size"),
        Err(PlatformError::Shm(_))
    ));
}

#[test_log::test]
fn it_should_keep_the_size_on_a_zero_or_repeated_configure() {
    let mut client = client_with(RecordingWire::new());
    client.wire.configure(0, 0);
    client.wire.configure(800, 600);
    let events = client.process_events().unwrap();
    assert!(events.is_empty(), "{:?}", events);
    assert_eq!(client.framebuffer.allocations(), 1);
    assert_eq!(client.wire.count("xdg_surface.ack_configure"), 3);
}

#[test_log::test]
fn it_should_answer_ping_with_pong() {
    let mut client = client_with(RecordingWire::new());
    let wm_base = client.wire.find(Interface::XdgWmBase).unwrap();
    client
        .wire
        .emit(wm_base, Interface::XdgWmBase, "ping", vec![EventArg::Uint(42)]);
    client.process_events().unwrap();
    assert_eq!(
        client.wire.last("xdg_wm_base.pong").unwrap().args,
        vec![Arg::Uint(42)]
    );
}

#[test_log::test]
fn it_should_report_close_requests() {
    let mut client = client_with(RecordingWire::new());
    let toplevel = client.wire.find(Interface::XdgToplevel).unwrap();
    client
        .wire
        .emit(toplevel, Interface::XdgToplevel, "close", Vec::new());
    assert_eq!(
        client.process_events().unwrap(),
        vec![WindowEvent::CloseRequested]
    );
}

#[test_log::test]
fn it_should_drop_pointer_events_until_shown() {
    let mut client = client_with(RecordingWire::new());
    let pointer = client.wire.find(Interface::Pointer).unwrap();
    let motion = vec![EventArg::Uint(0), fixed(10.0), fixed(20.5)];

    client
        .wire
        .emit(pointer, Interface::Pointer, "motion", motion.clone());
    assert!(client.process_events().unwrap().is_empty());

    client.show();
    client
        .wire
        .emit(pointer, Interface::Pointer, "motion", motion);
    client.wire.emit(
        pointer,
        Interface::Pointer,
        "button",
        vec![
            EventArg::Uint(1),
            EventArg::Uint(0),
            EventArg::Uint(0x110),
            EventArg::Uint(1),
        ],
    );
    let events = client.process_events().unwrap();
    assert_eq!(
        events,
        vec![
            WindowEvent::PointerMoved {
                position: Point::new(10.0, 20.5),
                modifiers: Modifiers::empty(),
            },
            WindowEvent::PointerPressed {
                position: Point::new(10.0, 20.5),
                button: crate::platform::MouseButton::Left,
                modifiers: Modifiers::empty(),
            },
        ]
    );
}

#[test_log::test]
fn it_should_translate_keyboard_focus_and_keys() {
    let mut client = client_with(RecordingWire::new());
    let keyboard = client.wire.find(Interface::Keyboard).unwrap();
    let wire = &mut client.wire;
    wire.emit(
        keyboard,
        Interface::Keyboard,
        "enter",
        vec![EventArg::Uint(1), EventArg::Object(None), EventArg::Array(Vec::new())],
    );
    wire.emit(
        keyboard,
        Interface::Keyboard,
        "modifiers",
        vec![
            EventArg::Uint(2),
            EventArg::Uint(1),
            EventArg::Uint(0),
            EventArg::Uint(0),
            EventArg::Uint(0),
        ],
    );
    // evdev KEY_A
    wire.emit(
        keyboard,
        Interface::Keyboard,
        "key",
        vec![
            EventArg::Uint(3),
            EventArg::Uint(0),
            EventArg::Uint(30),
            EventArg::Uint(1),
        ],
    );
    wire.emit(
        keyboard,
        Interface::Keyboard,
        "leave",
        vec![EventArg::Uint(4), EventArg::Object(None)],
    );

    let events = client.process_events().unwrap();
    assert_eq!(
        events,
        vec![
            WindowEvent::FocusIn,
            WindowEvent::KeyDown {
                symbol: KeySymbol::Char('A'),
                modifiers: Modifiers::SHIFT,
            },
            WindowEvent::TextInput { text: "A".into() },
            WindowEvent::FocusOut,
        ]
    );
}

#[test_log::test]
fn it_should_release_devices_the_seat_loses() {
    let mut client = client_with(RecordingWire::new());
    assert_eq!(client.wire.count("wl_seat.get_pointer"), 1);
    assert_eq!(client.wire.count("wl_seat.get_keyboard"), 1);

    let seat = client.wire.find(Interface::Seat).unwrap();
    client.wire.emit(
        seat,
        Interface::Seat,
        "capabilities",
        vec![EventArg::Uint(SEAT_CAPABILITY_KEYBOARD)],
    );
    client.process_events().unwrap();
    assert_eq!(client.wire.count("wl_pointer.release"), 1);
    assert_eq!(client.wire.count("wl_keyboard.release"), 0);
    assert!(client.pointer.is_none());
}

#[test_log::test]
fn it_should_unmap_on_hide_and_wait_for_configure_on_show() {
    let mut client = client_with(RecordingWire::new());
    client.show();
    client.present();
    client.hide();

    let null_attach = client.wire.last("wl_surface.attach").unwrap();
    assert_eq!(null_attach.args[0], Arg::Object(None));
    assert!(!client.is_configured());

    // Hidden and unconfigured: nothing is attached.
    let attaches = client.wire.count("wl_surface.attach");
    client.present();
    assert_eq!(client.wire.count("wl_surface.attach"), attaches);

    client.show();
    client.process_events().unwrap();
    assert!(client.is_configured());
    client.present();
    assert_eq!(client.wire.count("wl_surface.attach"), attaches + 1);
}

#[test_log::test]
fn it_should_resize_on_request_without_duplicate_events() {
    let mut client = client_with(RecordingWire::new());
    client.resize(800, 600);
    assert!(client.process_events().unwrap().is_empty());

    client.resize(640, 480);
    assert_eq!(
        client.process_events().unwrap(),
        vec![WindowEvent::Resized {
            width: 640,
            height: 480
        }]
    );
    assert_eq!(client.framebuffer.allocations(), 2);
}

#[test_log::test]
fn it_should_tear_down_in_reverse_creation_order() {
    let client = client_with(RecordingWire::new());
    let journal = Rc::clone(&client.wire.journal);
    drop(client);

    let names = journal.borrow();
    let at = |n: &str| names.iter().rposition(|x| x == n).unwrap();
    assert!(at("wl_buffer.destroy") < at("wl_shm_pool.destroy"));
    assert!(at("wl_shm_pool.destroy") < at("xdg_toplevel.destroy"));
    assert!(at("xdg_toplevel.destroy") < at("xdg_surface.destroy"));
    assert!(at("xdg_surface.destroy") < at("wl_surface.destroy"));
    assert!(at("wl_surface.destroy") < at("xdg_wm_base.destroy"));
    assert_eq!(at("wl_seat.release"), names.len() - 1);
}
