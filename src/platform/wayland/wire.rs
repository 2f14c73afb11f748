// src/platform/wayland/wire.rs

//! The seam between the protocol client and the transport.
//!
//! `WaylandClient` only ever talks to a `Wire`: the native implementation
//! drives libwayland-client, and tests substitute a recording double.

use super::protocol::Interface;
use crate::platform::error::PlatformError;
use std::os::fd::RawFd;

/// Client-side handle for a protocol object. Not the protocol object id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u32);

/// An outgoing request argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Int(i32),
    Uint(u32),
    /// 24.8 fixed point, already encoded.
    Fixed(i32),
    Str(String),
    Object(Option<ObjectId>),
    /// Placeholder for the object the request creates.
    NewId,
    /// Borrowed for the duration of the send; the wire never closes it.
    Fd(RawFd),
}

/// A decoded incoming event argument.
#[derive(Debug, Clone, PartialEq)]
pub enum EventArg {
    Int(i32),
    Uint(u32),
    Fixed(i32),
    Str(Option<String>),
    Object(Option<ObjectId>),
    NewId(u32),
    Array(Vec<u8>),
    /// Ownership passes to the receiver, which must close it.
    Fd(RawFd),
}

/// One event, addressed to a client object.
#[derive(Debug, Clone, PartialEq)]
pub struct ProtocolEvent {
    pub object: ObjectId,
    pub interface: Interface,
    pub event: &'static str,
    pub args: Vec<EventArg>,
}

impl ProtocolEvent {
    pub fn uint(&self, index: usize) -> Option<u32> {
        match self.args.get(index)? {
            EventArg::Uint(v) => Some(*v),
            _ => None,
        }
    }

    pub fn int(&self, index: usize) -> Option<i32> {
        match self.args.get(index)? {
            EventArg::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// A fixed-point argument as its raw 24.8 value.
    pub fn fixed(&self, index: usize) -> Option<i32> {
        match self.args.get(index)? {
            EventArg::Fixed(v) => Some(*v),
            _ => None,
        }
    }

    pub fn string(&self, index: usize) -> Option<&str> {
        match self.args.get(index)? {
            EventArg::Str(Some(s)) => Some(s),
            _ => None,
        }
    }

    pub fn fd(&self, index: usize) -> Option<RawFd> {
        match self.args.get(index)? {
            EventArg::Fd(fd) => Some(*fd),
            _ => None,
        }
    }
}

/// Transport for the Wayland client.
pub trait Wire {
    /// The `wl_display` object.
    fn display(&self) -> ObjectId;

    /// Sends `request` on `object`. Returns the created object when the
    /// request has a `new_id` argument. Destructor requests retire `object`.
    fn send(
        &mut self,
        object: ObjectId,
        request: &'static str,
        args: &[Arg],
    ) -> Result<Option<ObjectId>, PlatformError>;

    /// `wl_registry.bind` (its `new_id` is untyped, so it gets its own entry).
    fn bind(
        &mut self,
        registry: ObjectId,
        name: u32,
        interface: Interface,
        version: u32,
    ) -> Result<ObjectId, PlatformError>;

    /// Destroys the client-side proxy of an object that has no destructor
    /// request (e.g. `wl_registry`).
    fn forget(&mut self, object: ObjectId);

    /// The version `object` was created with.
    fn version(&self, object: ObjectId) -> u32;

    /// Blocks until the server has processed every request sent so far,
    /// dispatching the events it produced.
    fn roundtrip(&mut self) -> Result<(), PlatformError>;

    /// Flushes, reads whatever is readable right now, and dispatches.
    /// Never blocks.
    fn pump(&mut self) -> Result<(), PlatformError>;

    fn flush(&mut self) -> Result<(), PlatformError>;

    /// Events dispatched since the last call, in arrival order.
    fn take_events(&mut self) -> Vec<ProtocolEvent>;
}
