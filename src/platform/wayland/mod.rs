// src/platform/wayland/mod.rs

//! Wayland backend.
//!
//! `libwayland-client` is opened at runtime and driven through a generic
//! marshal/dispatch pair (`native`), with `xdg-shell` described in
//! `protocol`. The window logic in `client` only sees the `Wire` trait.

pub mod client;
pub mod ffi;
pub mod input;
pub mod native;
pub mod protocol;
pub mod wire;

pub use client::{WaylandClient, WaylandWindow};
