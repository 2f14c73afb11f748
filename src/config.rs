// src/config.rs

//! Configuration for the window runtime.
//!
//! Settings come from three layers, later layers winning: built-in
//! defaults, an optional JSON file, and the process arguments
//! (`--title`, `--width`, `--height`).

use clap::Parser;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "CORE_WINDOW_CONFIG";
/// Directory name used under `$XDG_CONFIG_HOME` / `~/.config`.
const CONFIG_DIR_NAME: &str = "core-window";
const CONFIG_FILE_NAME: &str = "config.json";

/// Root of the configuration tree.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub window: WindowConfig,
    pub display: DisplayConfig,
    pub performance: PerformanceConfig,
    pub appearance: AppearanceConfig,
}

/// Initial window geometry and identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    /// Wayland app-id (`xdg_toplevel.set_app_id`). Ignored on X11.
    pub app_id: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        WindowConfig {
            title: "core-window".to_string(),
            app_id: "core-window".to_string(),
            width: 800,
            height: 600,
        }
    }
}

/// Which display server backend to instantiate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendPreference {
    /// Defer to environment detection.
    #[default]
    Auto,
    X11,
    Wayland,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct DisplayConfig {
    pub backend: BackendPreference,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PerformanceConfig {
    /// Sleep between loop iterations. Caps CPU usage of the render loop.
    pub frame_interval_ms: u64,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        PerformanceConfig {
            frame_interval_ms: 16,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppearanceConfig {
    /// Window background, 0xAARRGGBB.
    pub background: u32,
    /// Caret blink half-period in milliseconds. 0 disables blinking.
    pub caret_blink_ms: u64,
}

impl Default for AppearanceConfig {
    fn default() -> Self {
        AppearanceConfig {
            background: 0xFF20_2020,
            caret_blink_ms: 530,
        }
    }
}

/// Command-line overrides.
///
/// Integers are taken as strings so a malformed value can be ignored
/// instead of aborting start-up.
#[derive(Debug, Default, Parser)]
#[command(name = "core-window", args_override_self = true)]
pub struct CliArgs {
    /// Window title.
    #[arg(long, allow_hyphen_values = true)]
    pub title: Option<String>,
    /// Initial window width in pixels.
    #[arg(long, allow_hyphen_values = true)]
    pub width: Option<String>,
    /// Initial window height in pixels.
    #[arg(long, allow_hyphen_values = true)]
    pub height: Option<String>,
}

const KNOWN_FLAGS: [&str; 3] = ["--title", "--width", "--height"];

/// Keeps the program name and the known flags with their values, in order.
/// Accepts both `--flag value` and `--flag=value`; anything else is dropped.
fn known_args(args: Vec<OsString>) -> Vec<OsString> {
    let mut args = args.into_iter();
    let mut kept: Vec<OsString> = args.next().into_iter().collect();
    while let Some(arg) = args.next() {
        let text = arg.to_string_lossy().into_owned();
        if KNOWN_FLAGS.contains(&text.as_str()) {
            match args.next() {
                Some(value) => {
                    kept.push(arg);
                    kept.push(value);
                }
                None => warn!("Ignoring {} without a value", text),
            }
        } else if KNOWN_FLAGS
            .iter()
            .any(|flag| text.starts_with(&format!("{}=", flag)))
        {
            kept.push(arg);
        } else {
            warn!("Ignoring unknown argument '{}'", text);
        }
    }
    kept
}

impl CliArgs {
    /// Parses process arguments. Never fails; unknown arguments are ignored.
    pub fn from_args<I, T>(args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let args = known_args(args.into_iter().map(Into::into).collect());
        match CliArgs::try_parse_from(args) {
            Ok(cli) => cli,
            Err(e) => {
                warn!("Ignoring unparsable command line: {}", e);
                CliArgs::default()
            }
        }
    }
}

fn parse_dimension(flag: &str, raw: &str) -> Option<u32> {
    match raw.trim().parse::<u32>() {
        Ok(0) => {
            warn!("Ignoring {} 0: dimensions must be positive", flag);
            None
        }
        Ok(v) => Some(v),
        Err(e) => {
            warn!("Ignoring malformed {} '{}': {}", flag, raw, e);
            None
        }
    }
}

impl Config {
    /// Loads the config file (if any) and applies the command-line overrides.
    pub fn load(cli: &CliArgs) -> Self {
        let mut config = match config_file_path() {
            Some(path) => Config::from_file(&path),
            None => Config::default(),
        };
        config.apply_cli(cli);
        config
    }

    /// Reads a JSON config file. Missing or malformed files yield defaults.
    pub fn from_file(path: &Path) -> Self {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No config file at {}, using defaults", path.display());
                return Config::default();
            }
            Err(e) => {
                warn!("Failed to read config {}: {}. Using defaults.", path.display(), e);
                return Config::default();
            }
        };
        match serde_json::from_str::<Config>(&contents) {
            Ok(config) => {
                info!("Loaded configuration from {}", path.display());
                config
            }
            Err(e) => {
                warn!("Malformed config {}: {}. Using defaults.", path.display(), e);
                Config::default()
            }
        }
    }

    /// Applies `--title/--width/--height` on top of this config.
    pub fn apply_cli(&mut self, cli: &CliArgs) {
        if let Some(title) = &cli.title {
            self.window.title = title.clone();
        }
        if let Some(width) = cli.width.as_deref().and_then(|w| parse_dimension("--width", w)) {
            self.window.width = width;
        }
        if let Some(height) = cli
            .height
            .as_deref()
            .and_then(|h| parse_dimension("--height", h))
        {
            self.window.height = height;
        }
    }
}

fn config_file_path() -> Option<PathBuf> {
    if let Some(explicit) = std::env::var_os(CONFIG_PATH_ENV).filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(explicit));
    }
    let base = std::env::var_os("XDG_CONFIG_HOME")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))?;
    Some(base.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}
