// src/main.rs

pub mod app;
pub mod config;
pub mod geometry;
pub mod keys;
pub mod platform;
pub mod ui;

use crate::{
    app::{AppContext, Application},
    config::{CliArgs, Config},
};
use anyhow::Context;
use log::info;

/// Main entry point for `core-window`.
fn main() -> anyhow::Result<()> {
    // Default filter is "info" if RUST_LOG is not set.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_micros()
        .init();

    info!("Starting core-window...");

    let cli = CliArgs::from_args(std::env::args_os());
    let config = Config::load(&cli);
    info!(
        "Configuration loaded: {}x{} '{}'",
        config.window.width, config.window.height, config.window.title
    );

    let ctx = AppContext::new(config);
    let mut window = platform::create_window(&ctx).context("Failed to create window")?;
    info!("{} window created", window.server());
    window.show();

    let (width, height) = window.size();
    let tree = ui::widgets::demo_tree(width, height, &ctx.config.appearance);

    let mut app = Application::new(ctx, window, tree);
    app.run()?;

    // Dropping the application tears the window down.
    drop(app);
    info!("core-window exited successfully.");
    Ok(())
}
