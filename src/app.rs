// src/app.rs

//! The application loop: pumps the window, routes its events through the
//! view tree and repaints every iteration.
//!
//! Everything here runs on one thread. Other threads reach the loop only
//! through an [`AppProxy`], whose commands are drained at the start of
//! each iteration.

use crate::config::Config;
use crate::geometry::Rect;
use crate::platform::detect::DisplayServer;
use crate::platform::{self, Window, WindowEvent};
use crate::ui::{EventRouter, ViewTree};
use anyhow::{Context, Result};
use log::{debug, info, trace};
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::{Duration, Instant};

/// Start-up state shared by the backends and the loop.
#[derive(Debug, Clone)]
pub struct AppContext {
    pub config: Config,
    pub server: DisplayServer,
}

impl AppContext {
    /// Picks the backend for `config` and captures both.
    pub fn new(config: Config) -> Self {
        let server = platform::choose_backend(&config);
        info!("Using {} backend", server);
        AppContext { config, server }
    }
}

/// Requests another thread can post to the loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    Stop,
    SetTitle(String),
    Resize(u32, u32),
}

/// Cloneable, `Send` handle to a running [`Application`].
#[derive(Debug, Clone)]
pub struct AppProxy {
    tx: Sender<AppCommand>,
}

impl AppProxy {
    pub fn send(&self, command: AppCommand) -> Result<()> {
        self.tx
            .send(command)
            .context("Application loop is no longer running")
    }
}

/// Outcome of one loop iteration.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum AppStatus {
    Running,
    Shutdown,
}

pub struct Application {
    ctx: AppContext,
    window: Box<dyn Window>,
    tree: ViewTree,
    router: EventRouter,
    commands: Receiver<AppCommand>,
    tx: Sender<AppCommand>,
    last_tick: Instant,
}

impl Application {
    pub fn new(ctx: AppContext, window: Box<dyn Window>, tree: ViewTree) -> Self {
        let (tx, commands) = mpsc::channel();
        Application {
            ctx,
            window,
            tree,
            router: EventRouter::new(),
            commands,
            tx,
            last_tick: Instant::now(),
        }
    }

    pub fn proxy(&self) -> AppProxy {
        AppProxy {
            tx: self.tx.clone(),
        }
    }

    pub fn window(&self) -> &dyn Window {
        self.window.as_ref()
    }

    pub fn tree(&self) -> &ViewTree {
        &self.tree
    }

    pub fn router(&self) -> &EventRouter {
        &self.router
    }

    /// Runs until the window stops, sleeping `frame_interval_ms` between
    /// iterations.
    pub fn run(&mut self) -> Result<()> {
        let interval = Duration::from_millis(self.ctx.config.performance.frame_interval_ms);
        info!("Starting main event loop...");
        loop {
            match self.step().context("Event loop iteration failed")? {
                AppStatus::Running => std::thread::sleep(interval),
                AppStatus::Shutdown => {
                    info!("Shutdown requested. Exiting main loop.");
                    return Ok(());
                }
            }
        }
    }

    /// One iteration, timing the tick from the previous iteration.
    pub fn step(&mut self) -> Result<AppStatus> {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_tick);
        self.last_tick = now;
        self.step_with(elapsed)
    }

    /// One iteration with an explicit tick duration: commands, window
    /// events, timers, then a full repaint.
    pub fn step_with(&mut self, elapsed: Duration) -> Result<AppStatus> {
        self.drain_commands();

        let events = self.window.process_events()?;
        for event in events {
            self.handle_event(event);
        }
        if !self.window.is_running() {
            return Ok(AppStatus::Shutdown);
        }

        self.router.tick(&mut self.tree, elapsed);
        self.render();
        Ok(AppStatus::Running)
    }

    fn drain_commands(&mut self) {
        while let Ok(command) = self.commands.try_recv() {
            debug!("Applying command {:?}", command);
            match command {
                AppCommand::Stop => self.window.stop(),
                AppCommand::SetTitle(title) => self.window.set_title(&title),
                AppCommand::Resize(width, height) => self.window.resize(width, height),
            }
        }
    }

    fn handle_event(&mut self, event: WindowEvent) {
        trace!("Window event: {:?}", event);
        match event {
            WindowEvent::Resized { width, height } => {
                debug!("Window resized to {}x{}", width, height);
                let root = self.tree.root();
                self.tree
                    .set_bounds(root, Rect::new(0.0, 0.0, width as f64, height as f64));
            }
            WindowEvent::CloseRequested => {
                info!("Close requested by the window manager");
                self.window.stop();
            }
            WindowEvent::Exposed => {}
            other => {
                self.router.route(&mut self.tree, &other);
            }
        }
    }

    fn render(&mut self) {
        let background = self.ctx.config.appearance.background;
        match self.window.frame() {
            Some(mut target) => {
                target.clear(background);
                self.router.draw(&self.tree, &mut target);
            }
            None => {
                trace!("No framebuffer yet; skipping frame");
                return;
            }
        }
        self.window.present();
    }
}

#[cfg(test)]
mod tests;
