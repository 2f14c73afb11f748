// src/ui/mod.rs

//! View tree, event routing and the demo widgets.

pub mod router;
pub mod view;
pub mod widgets;

pub use router::EventRouter;
pub use view::{View, ViewContext, ViewEvent, ViewId, ViewTree};
