// src/platform/mock.rs

use crate::platform::detect::DisplayServer;
use crate::platform::framebuffer::{FrameStorage, FramebufferSlot, HeapBuffer, RenderTarget};
use crate::platform::{Window, WindowEvent};
use anyhow::Result;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// What a test can observe and drive while the window is owned elsewhere.
#[derive(Debug, Default)]
pub struct MockState {
    /// One batch per `process_events` call.
    pub batches: VecDeque<Vec<WindowEvent>>,
    pub shown: bool,
    pub presents: usize,
    pub titles: Vec<String>,
    pub allocations: usize,
    pub stride: usize,
    pub size: (u32, u32),
    /// Colour at the centre of the last presented frame.
    pub last_center_pixel: Option<u32>,
}

#[derive(Clone)]
pub struct MockRemote(Rc<RefCell<MockState>>);

impl MockRemote {
    pub fn push_batch(&self, events: Vec<WindowEvent>) {
        self.0.borrow_mut().batches.push_back(events);
    }

    pub fn state(&self) -> std::cell::Ref<'_, MockState> {
        self.0.borrow()
    }
}

/// In-memory window. `Resized` entries in a batch play the role of a
/// server-driven configure: the framebuffer is reallocated and the event is
/// only forwarded when the size actually changed.
pub struct MockWindow {
    state: Rc<RefCell<MockState>>,
    framebuffer: FramebufferSlot<HeapBuffer>,
    width: u32,
    height: u32,
    running: bool,
    pending: Vec<WindowEvent>,
}

impl MockWindow {
    pub fn new(width: u32, height: u32) -> Self {
        let mut window = Self {
            state: Rc::new(RefCell::new(MockState::default())),
            framebuffer: FramebufferSlot::new(),
            width: 0,
            height: 0,
            running: true,
            pending: Vec::new(),
        };
        window.apply_size(width, height);
        window.pending.clear();
        window
    }

    pub fn remote(&self) -> MockRemote {
        MockRemote(Rc::clone(&self.state))
    }

    fn apply_size(&mut self, width: u32, height: u32) -> bool {
        if (width, height) == (self.width, self.height) {
            return false;
        }
        if let Err(e) = self.framebuffer.ensure_size(width, height) {
            log::warn!("Mock framebuffer allocation failed: {:#}", e);
        }
        self.width = width;
        self.height = height;
        let mut state = self.state.borrow_mut();
        state.allocations = self.framebuffer.allocations();
        state.stride = self.framebuffer.buffer().map(|b| b.stride()).unwrap_or(0);
        state.size = (width, height);
        drop(state);
        self.pending.push(WindowEvent::Resized { width, height });
        true
    }
}

impl Window for MockWindow {
    fn server(&self) -> DisplayServer {
        DisplayServer::X11
    }

    fn show(&mut self) {
        self.state.borrow_mut().shown = true;
    }

    fn hide(&mut self) {
        self.state.borrow_mut().shown = false;
    }

    fn set_title(&mut self, title: &str) {
        self.state.borrow_mut().titles.push(title.to_string());
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.apply_size(width.max(1), height.max(1));
    }

    fn process_events(&mut self) -> Result<Vec<WindowEvent>> {
        let mut events = std::mem::take(&mut self.pending);
        let batch = self.state.borrow_mut().batches.pop_front().unwrap_or_default();
        let shown = self.state.borrow().shown;
        for event in batch {
            match event {
                WindowEvent::Resized { width, height } => {
                    if self.apply_size(width, height) {
                        events.append(&mut self.pending);
                    }
                }
                e if e.is_pointer() && !shown => {}
                e => events.push(e),
            }
        }
        Ok(events)
    }

    fn stop(&mut self) {
        self.running = false;
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn frame(&mut self) -> Option<RenderTarget<'_>> {
        self.framebuffer.target()
    }

    fn present(&mut self) {
        let (cx, cy) = (self.width / 2, self.height / 2);
        let center = self.framebuffer.target().and_then(|t| t.pixel(cx, cy));
        let mut state = self.state.borrow_mut();
        state.presents += 1;
        state.last_center_pixel = center;
    }
}
