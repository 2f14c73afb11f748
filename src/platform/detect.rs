// src/platform/detect.rs

//! Chooses between the X11 and Wayland backends from the session
//! environment. Pure environment inspection; the answer is memoized
//! because the display server cannot change within a process lifetime.

use log::{debug, info};
use once_cell::sync::{Lazy, OnceCell};
use std::fmt;

pub const WAYLAND_SESSION_ENV: &str = "WAYLAND_DISPLAY";
pub const X11_SESSION_ENV: &str = "DISPLAY";
/// Prefer X11 when both sessions are present (Wayland running XWayland).
pub const PREFER_X11_ENV: &str = "CORE_WINDOW_PREFER_X11";

/// The display server a backend talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayServer {
    X11,
    Wayland,
}

impl fmt::Display for DisplayServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayServer::X11 => write!(f, "X11"),
            DisplayServer::Wayland => write!(f, "Wayland"),
        }
    }
}

/// The three environment signals detection looks at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionEnv {
    pub wayland: bool,
    pub x11: bool,
    pub prefer_x11: bool,
}

fn is_set(value: Option<std::ffi::OsString>) -> bool {
    value.map(|v| !v.is_empty()).unwrap_or(false)
}

impl SessionEnv {
    pub fn from_env() -> Self {
        let prefer_x11 = std::env::var_os(PREFER_X11_ENV)
            .map(|v| !v.is_empty() && v != "0")
            .unwrap_or(false);
        SessionEnv {
            wayland: is_set(std::env::var_os(WAYLAND_SESSION_ENV)),
            x11: is_set(std::env::var_os(X11_SESSION_ENV)),
            prefer_x11,
        }
    }
}

/// Applies the precedence table. First match wins.
pub fn resolve(env: &SessionEnv) -> DisplayServer {
    match (env.wayland, env.x11, env.prefer_x11) {
        (true, true, true) => DisplayServer::X11,
        (true, _, _) => DisplayServer::Wayland,
        (false, true, _) => DisplayServer::X11,
        // Let the connection failure surface the real error.
        (false, false, _) => DisplayServer::X11,
    }
}

/// Memoizing detector over an environment source.
pub struct Detector<F = fn() -> SessionEnv> {
    read_env: F,
    memo: OnceCell<DisplayServer>,
}

impl<F: Fn() -> SessionEnv> Detector<F> {
    pub fn new(read_env: F) -> Self {
        Detector {
            read_env,
            memo: OnceCell::new(),
        }
    }

    /// Returns the memoized choice, reading the environment on first use only.
    pub fn detect(&self) -> DisplayServer {
        *self.memo.get_or_init(|| {
            let env = (self.read_env)();
            let server = resolve(&env);
            debug!("Session environment: {:?}", env);
            info!("Detected display server: {}", server);
            server
        })
    }
}

static DETECTOR: Lazy<Detector> = Lazy::new(|| Detector::new(SessionEnv::from_env));

/// Process-wide display server detection.
pub fn detect() -> DisplayServer {
    DETECTOR.detect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test_log::test]
    fn it_should_follow_the_precedence_table_for_every_combination() {
        for bits in 0..8u8 {
            let env = SessionEnv {
                wayland: bits & 1 != 0,
                x11: bits & 2 != 0,
                prefer_x11: bits & 4 != 0,
            };
            let expected = if env.wayland && env.x11 && env.prefer_x11 {
                DisplayServer::X11
            } else if env.wayland {
                DisplayServer::Wayland
            } else {
                DisplayServer::X11
            };
            assert_eq!(resolve(&env), expected, "combination {:?}", env);
        }
    }

    #[test_log::test]
    fn it_should_ignore_the_override_without_both_sessions() {
        let env = SessionEnv {
            wayland: true,
            x11: false,
            prefer_x11: true,
        };
        assert_eq!(resolve(&env), DisplayServer::Wayland);
    }

    #[test_log::test]
    fn it_should_read_the_environment_only_once() {
        let reads = Cell::new(0);
        let detector = Detector::new(|| {
            reads.set(reads.get() + 1);
            SessionEnv {
                wayland: true,
                ..Default::default()
            }
        });

        assert_eq!(detector.detect(), DisplayServer::Wayland);
        assert_eq!(detector.detect(), DisplayServer::Wayland);
        assert_eq!(reads.get(), 1);
    }
}
