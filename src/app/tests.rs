// src/app/tests.rs

use super::*;
use crate::geometry::Point;
use crate::keys::Modifiers;
use crate::platform::framebuffer::RenderTarget;
use crate::platform::mock::{MockRemote, MockWindow};
use crate::platform::MouseButton;
use crate::ui::view::{DrawContext, View, ViewContext, ViewEvent, ViewId};
use crate::ui::widgets::Panel;
use std::cell::RefCell;
use std::rc::Rc;

type Log = Rc<RefCell<Vec<(&'static str, ViewEvent)>>>;

const BACKGROUND: u32 = 0xFF10_1010;

struct Recorder {
    name: &'static str,
    log: Log,
    color: u32,
}

impl View for Recorder {
    fn focusable(&self) -> bool {
        true
    }

    fn handle(&mut self, event: &ViewEvent, _cx: &mut ViewContext) -> bool {
        self.log.borrow_mut().push((self.name, event.clone()));
        false
    }

    fn draw(&self, cx: &DrawContext, target: &mut RenderTarget<'_>) {
        let b = cx.bounds;
        target.fill_rect(b.x as i64, b.y as i64, b.width as u32, b.height as u32, self.color);
    }
}

struct Harness {
    app: Application,
    remote: MockRemote,
    log: Log,
    x: ViewId,
    y: ViewId,
}

fn harness() -> Harness {
    let mut window = MockWindow::new(800, 600);
    window.show();
    let remote = window.remote();

    let log: Log = Rc::new(RefCell::new(Vec::new()));
    let mut tree = ViewTree::new(
        Box::new(Panel::background(BACKGROUND)),
        Rect::new(0.0, 0.0, 800.0, 600.0),
    );
    let root = tree.root();
    let x = tree
        .add_child(
            root,
            Box::new(Recorder {
                name: "x",
                log: Rc::clone(&log),
                color: 0xFFFF_0000,
            }),
            Rect::new(0.0, 0.0, 100.0, 100.0),
        )
        .unwrap();
    let y = tree
        .add_child(
            root,
            Box::new(Recorder {
                name: "y",
                log: Rc::clone(&log),
                color: 0xFF00_FF00,
            }),
            Rect::new(400.0, 450.0, 200.0, 100.0),
        )
        .unwrap();

    let mut config = Config::default();
    config.appearance.background = BACKGROUND;
    let ctx = AppContext {
        config,
        server: DisplayServer::X11,
    };
    Harness {
        app: Application::new(ctx, Box::new(window), tree),
        remote,
        log,
        x,
        y,
    }
}

fn at(x: f64, y: f64) -> Point {
    Point::new(x, y)
}

fn moved(x: f64, y: f64) -> WindowEvent {
    WindowEvent::PointerMoved {
        position: at(x, y),
        modifiers: Modifiers::empty(),
    }
}

fn pressed(x: f64, y: f64) -> WindowEvent {
    WindowEvent::PointerPressed {
        position: at(x, y),
        button: MouseButton::Left,
        modifiers: Modifiers::empty(),
    }
}

fn released(x: f64, y: f64) -> WindowEvent {
    WindowEvent::PointerReleased {
        position: at(x, y),
        button: MouseButton::Left,
        modifiers: Modifiers::empty(),
    }
}

/// Pointer events (moves, presses, releases) delivered to `name`, in order.
fn pointer_events(log: &Log, name: &str) -> Vec<ViewEvent> {
    log.borrow()
        .iter()
        .filter(|(n, e)| {
            *n == name
                && matches!(
                    e,
                    ViewEvent::PointerMoved { .. }
                        | ViewEvent::PointerPressed { .. }
                        | ViewEvent::PointerReleased { .. }
                )
        })
        .map(|(_, e)| e.clone())
        .collect()
}

#[test_log::test]
fn it_should_reallocate_once_and_follow_capture_through_a_drag() {
    let mut h = harness();
    assert_eq!(h.remote.state().allocations, 1);

    h.remote.push_batch(vec![WindowEvent::Resized {
        width: 1024,
        height: 768,
    }]);
    assert_eq!(h.app.step_with(Duration::ZERO).unwrap(), AppStatus::Running);
    {
        let state = h.remote.state();
        assert_eq!(state.allocations, 2);
        assert_eq!(state.stride, 1024 * 4);
        assert_eq!(state.presents, 1);
        assert_eq!(state.last_center_pixel, Some(BACKGROUND));
    }
    assert_eq!(
        h.app.tree().bounds(h.app.tree().root()),
        Some(Rect::new(0.0, 0.0, 1024.0, 768.0))
    );

    // Same size again: no new allocation, no second Resized.
    h.remote.push_batch(vec![WindowEvent::Resized {
        width: 1024,
        height: 768,
    }]);
    h.app.step_with(Duration::ZERO).unwrap();
    assert_eq!(h.remote.state().allocations, 2);

    h.remote.push_batch(vec![
        pressed(10.0, 10.0),
        moved(200.0, 200.0),
        moved(500.0, 500.0),
    ]);
    h.app.step_with(Duration::ZERO).unwrap();
    assert_eq!(h.app.router().captured(), Some(h.x));
    assert_eq!(
        pointer_events(&h.log, "x"),
        vec![
            ViewEvent::PointerPressed {
                position: at(10.0, 10.0),
                button: MouseButton::Left,
                modifiers: Modifiers::empty(),
            },
            ViewEvent::PointerMoved {
                position: at(200.0, 200.0),
                modifiers: Modifiers::empty(),
            },
            ViewEvent::PointerMoved {
                position: at(500.0, 500.0),
                modifiers: Modifiers::empty(),
            },
        ]
    );
    assert!(pointer_events(&h.log, "y").is_empty());

    h.remote
        .push_batch(vec![released(500.0, 500.0), moved(500.0, 500.0)]);
    h.app.step_with(Duration::ZERO).unwrap();
    assert_eq!(h.app.router().captured(), None);
    assert_eq!(
        pointer_events(&h.log, "x").last(),
        Some(&ViewEvent::PointerReleased {
            position: at(500.0, 500.0),
            button: MouseButton::Left,
            modifiers: Modifiers::empty(),
        })
    );
    assert_eq!(
        pointer_events(&h.log, "y"),
        vec![ViewEvent::PointerMoved {
            position: at(500.0, 500.0),
            modifiers: Modifiers::empty(),
        }]
    );
    assert_eq!(h.app.router().hovered(), Some(h.y));
    assert_eq!(h.app.router().focused(), Some(h.x));
}

#[test_log::test]
fn it_should_apply_commands_posted_through_the_proxy() {
    let mut h = harness();
    let proxy = h.app.proxy();
    let sender = std::thread::spawn({
        let proxy = proxy.clone();
        move || proxy.send(AppCommand::SetTitle("renamed".to_string()))
    });
    sender.join().unwrap().unwrap();
    proxy.send(AppCommand::Resize(640, 480)).unwrap();

    assert_eq!(h.app.step_with(Duration::ZERO).unwrap(), AppStatus::Running);
    assert_eq!(h.remote.state().titles, vec!["renamed".to_string()]);
    assert_eq!(h.app.window().size(), (640, 480));
    assert_eq!(
        h.app.tree().bounds(h.app.tree().root()),
        Some(Rect::new(0.0, 0.0, 640.0, 480.0))
    );

    proxy.send(AppCommand::Stop).unwrap();
    assert_eq!(h.app.step_with(Duration::ZERO).unwrap(), AppStatus::Shutdown);
    assert!(!h.app.window().is_running());
}

#[test_log::test]
fn it_should_stop_on_close_request_without_presenting() {
    let mut h = harness();
    h.remote.push_batch(vec![WindowEvent::CloseRequested]);
    assert_eq!(h.app.step_with(Duration::ZERO).unwrap(), AppStatus::Shutdown);
    assert_eq!(h.remote.state().presents, 0);
    // run() returns immediately once the window has stopped.
    h.app.run().unwrap();
}

#[test_log::test]
fn it_should_route_keys_to_the_focused_view_and_track_window_focus() {
    let mut h = harness();
    h.remote.push_batch(vec![
        pressed(450.0, 500.0),
        released(450.0, 500.0),
        WindowEvent::TextInput {
            text: "q".to_string(),
        },
        WindowEvent::FocusOut,
    ]);
    h.app.step_with(Duration::from_millis(16)).unwrap();

    assert_eq!(h.app.router().focused(), Some(h.y));
    assert!(!h.app.router().window_focused());
    assert!(h.log.borrow().contains(&(
        "y",
        ViewEvent::TextInput {
            text: "q".to_string()
        }
    )));

    h.remote.push_batch(vec![WindowEvent::FocusIn]);
    h.app.step_with(Duration::from_millis(16)).unwrap();
    assert!(h.app.router().window_focused());
}

#[test_log::test]
fn it_should_ignore_pointer_input_before_the_window_is_shown() {
    let log: Log = Rc::new(RefCell::new(Vec::new()));
    let window = MockWindow::new(200, 200);
    let remote = window.remote();
    let mut tree = ViewTree::new(
        Box::new(Recorder {
            name: "root",
            log: Rc::clone(&log),
            color: 0,
        }),
        Rect::new(0.0, 0.0, 200.0, 200.0),
    );
    tree.add_child(
        tree.root(),
        Box::new(Panel::background(0)),
        Rect::new(0.0, 0.0, 10.0, 10.0),
    );
    let ctx = AppContext {
        config: Config::default(),
        server: DisplayServer::X11,
    };
    let mut app = Application::new(ctx, Box::new(window), tree);

    remote.push_batch(vec![moved(50.0, 50.0), pressed(50.0, 50.0)]);
    app.step_with(Duration::ZERO).unwrap();
    assert!(log.borrow().is_empty());
    assert_eq!(app.router().hovered(), None);
}
