// src/platform/tests.rs

use super::*;

#[test_log::test]
fn it_should_parse_backend_overrides() {
    assert_eq!(parse_backend("wayland"), Some(DisplayServer::Wayland));
    assert_eq!(parse_backend(" X11 "), Some(DisplayServer::X11));
    assert_eq!(parse_backend(""), None);
    assert_eq!(parse_backend("vulkan"), None);
}

#[test_log::test]
fn it_should_fall_back_only_with_an_x11_session() {
    let err: anyhow::Error = PlatformError::MissingGlobal("xdg_wm_base").into();
    let with_x = SessionEnv {
        wayland: true,
        x11: true,
        prefer_x11: false,
    };
    let without_x = SessionEnv {
        x11: false,
        ..with_x
    };
    assert!(should_fall_back(&err, &with_x));
    assert!(!should_fall_back(&err, &without_x));
}

#[test_log::test]
fn it_should_fall_back_on_shared_memory_failures() {
    let env = SessionEnv {
        wayland: true,
        x11: true,
        prefer_x11: false,
    };
    let memfd = anyhow::Error::from(PlatformError::Shm("memfd_create failed".into()))
        .context("Failed to allocate Wayland framebuffer");
    assert!(should_fall_back(&memfd, &env));

    let untyped = anyhow::anyhow!("wl_display_roundtrip failed").context("Wayland init");
    assert!(should_fall_back(&untyped, &env));
    assert!(!should_fall_back(&untyped, &SessionEnv { x11: false, ..env }));
}

#[test_log::test]
fn it_should_classify_pointer_events() {
    let moved = WindowEvent::PointerMoved {
        position: Point::new(1.0, 2.0),
        modifiers: Modifiers::empty(),
    };
    assert!(moved.is_pointer());
    assert!(!WindowEvent::Exposed.is_pointer());
}
