// src/ui/widgets.rs

//! The demonstration widgets the binary routes to and draws.

use super::view::{DrawContext, View, ViewContext, ViewEvent, ViewId, ViewTree};
use crate::config::AppearanceConfig;
use crate::geometry::Rect;
use crate::keys::KeySymbol;
use crate::platform::framebuffer::RenderTarget;
use std::time::Duration;

const CARET_WIDTH: u32 = 2;
const GLYPH_ADVANCE: f64 = 8.0;
const FOCUS_BORDER: u32 = 2;
const FOCUS_COLOR: u32 = 0xFFE0_E0E0;

fn fill(target: &mut RenderTarget<'_>, bounds: Rect, argb: u32) {
    target.fill_rect(
        bounds.x as i64,
        bounds.y as i64,
        bounds.width.max(0.0) as u32,
        bounds.height.max(0.0) as u32,
        argb,
    );
}

fn outline(target: &mut RenderTarget<'_>, b: Rect, thickness: u32, argb: u32) {
    let t = thickness as f64;
    fill(target, Rect::new(b.x, b.y, b.width, t), argb);
    fill(target, Rect::new(b.x, b.bottom() - t, b.width, t), argb);
    fill(target, Rect::new(b.x, b.y, t, b.height), argb);
    fill(target, Rect::new(b.right() - t, b.y, t, b.height), argb);
}

/// Brightens each channel by a fixed amount, for hover feedback.
fn lighten(argb: u32) -> u32 {
    let channel = |shift: u32| (((argb >> shift) & 0xFF) + 0x20).min(0xFF) << shift;
    (argb & 0xFF00_0000) | channel(16) | channel(8) | channel(0)
}

/// A solid background. Never a hit-test target.
pub struct Panel {
    color: u32,
}

impl Panel {
    pub fn background(color: u32) -> Self {
        Panel { color }
    }
}

impl View for Panel {
    fn interactive(&self) -> bool {
        false
    }

    fn handle(&mut self, _event: &ViewEvent, _cx: &mut ViewContext) -> bool {
        false
    }

    fn draw(&self, cx: &DrawContext, target: &mut RenderTarget<'_>) {
        fill(target, cx.bounds, self.color);
    }
}

/// A focusable colour block with a blinking caret that tracks typed text.
pub struct Swatch {
    color: u32,
    blink: Duration,
    since_toggle: Duration,
    caret_visible: bool,
    text: String,
}

impl Swatch {
    pub fn new(color: u32, blink: Duration) -> Self {
        Swatch {
            color,
            blink,
            since_toggle: Duration::ZERO,
            caret_visible: false,
            text: String::new(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn caret_visible(&self) -> bool {
        self.caret_visible
    }

    fn reset_caret(&mut self, visible: bool) {
        self.caret_visible = visible;
        self.since_toggle = Duration::ZERO;
    }
}

impl View for Swatch {
    fn focusable(&self) -> bool {
        true
    }

    fn handle(&mut self, event: &ViewEvent, _cx: &mut ViewContext) -> bool {
        match event {
            ViewEvent::FocusGained => self.reset_caret(true),
            ViewEvent::FocusLost => self.reset_caret(false),
            ViewEvent::TextInput { text } => {
                self.text.push_str(text);
                self.reset_caret(true);
            }
            ViewEvent::KeyDown {
                symbol: KeySymbol::Backspace,
                ..
            } => {
                self.text.pop();
                self.reset_caret(true);
            }
            ViewEvent::Scroll { .. } => return false,
            _ => {}
        }
        true
    }

    fn tick(&mut self, elapsed: Duration) {
        if self.blink.is_zero() {
            self.caret_visible = true;
            return;
        }
        self.since_toggle += elapsed;
        while self.since_toggle >= self.blink {
            self.since_toggle -= self.blink;
            self.caret_visible = !self.caret_visible;
        }
    }

    fn draw(&self, cx: &DrawContext, target: &mut RenderTarget<'_>) {
        let b = cx.bounds;
        let color = if cx.hovered {
            lighten(self.color)
        } else {
            self.color
        };
        fill(target, b, color);
        if !cx.focused {
            return;
        }
        outline(target, b, FOCUS_BORDER, FOCUS_COLOR);
        if self.caret_visible {
            let inset = (FOCUS_BORDER * 3) as f64;
            let advance = self.text.chars().count() as f64 * GLYPH_ADVANCE;
            let x = (b.x + inset + advance).min(b.right() - inset);
            fill(
                target,
                Rect::new(x, b.y + inset, CARET_WIDTH as f64, b.height - 2.0 * inset),
                FOCUS_COLOR,
            );
        }
    }
}

/// A list of striped rows that consumes scroll events.
pub struct ScrollList {
    rows: usize,
    row_height: f64,
    offset: f64,
    colors: [u32; 2],
}

impl ScrollList {
    pub fn new(rows: usize, row_height: f64, colors: [u32; 2]) -> Self {
        ScrollList {
            rows,
            row_height,
            offset: 0.0,
            colors,
        }
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    fn max_offset(&self, viewport: f64) -> f64 {
        (self.rows as f64 * self.row_height - viewport).max(0.0)
    }
}

impl View for ScrollList {
    fn handle(&mut self, event: &ViewEvent, cx: &mut ViewContext) -> bool {
        match event {
            ViewEvent::Scroll { delta_y, .. } => {
                let max = self.max_offset(cx.bounds().height);
                self.offset = (self.offset + delta_y * self.row_height).clamp(0.0, max);
                true
            }
            _ => false,
        }
    }

    fn draw(&self, cx: &DrawContext, target: &mut RenderTarget<'_>) {
        let b = cx.bounds;
        if self.row_height <= 0.0 {
            return;
        }
        let first = (self.offset / self.row_height).floor() as usize;
        let mut index = first;
        let mut y = b.y + first as f64 * self.row_height - self.offset;
        while index < self.rows && y < b.bottom() {
            let top = y.max(b.y);
            let bottom = (y + self.row_height).min(b.bottom());
            fill(
                target,
                Rect::new(b.x, top, b.width, bottom - top),
                self.colors[index % 2],
            );
            y += self.row_height;
            index += 1;
        }
    }
}

/// Opens a detached popup subtree on press; closing it from anywhere
/// comes back as `PopupClosed`.
pub struct Dropdown {
    color: u32,
    popup: ViewId,
    open: bool,
}

impl Dropdown {
    pub fn new(color: u32, popup: ViewId) -> Self {
        Dropdown {
            color,
            popup,
            open: false,
        }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }
}

impl View for Dropdown {
    fn focusable(&self) -> bool {
        true
    }

    fn handle(&mut self, event: &ViewEvent, cx: &mut ViewContext) -> bool {
        match event {
            ViewEvent::PointerPressed { .. } => {
                if self.open {
                    cx.close_popup();
                } else {
                    self.open = true;
                    cx.open_popup(self.popup);
                }
            }
            ViewEvent::KeyDown {
                symbol: KeySymbol::Escape,
                ..
            } if self.open => cx.close_popup(),
            ViewEvent::PopupClosed => self.open = false,
            ViewEvent::Scroll { .. } => return false,
            _ => {}
        }
        true
    }

    fn draw(&self, cx: &DrawContext, target: &mut RenderTarget<'_>) {
        let color = if cx.hovered || self.open {
            lighten(self.color)
        } else {
            self.color
        };
        fill(target, cx.bounds, color);
        if cx.focused {
            outline(target, cx.bounds, FOCUS_BORDER, FOCUS_COLOR);
        }
    }
}

/// A popup entry; choosing it dismisses every open popup.
pub struct MenuItem {
    color: u32,
}

impl MenuItem {
    pub fn new(color: u32) -> Self {
        MenuItem { color }
    }
}

impl View for MenuItem {
    fn handle(&mut self, event: &ViewEvent, cx: &mut ViewContext) -> bool {
        if let ViewEvent::PointerReleased { .. } = event {
            cx.close_all_popups();
        }
        !matches!(event, ViewEvent::Scroll { .. })
    }

    fn draw(&self, cx: &DrawContext, target: &mut RenderTarget<'_>) {
        let color = if cx.hovered {
            lighten(self.color)
        } else {
            self.color
        };
        fill(target, cx.bounds, color);
    }
}

const SWATCH_COLORS: [u32; 3] = [0xFFB0_4040, 0xFF40_A050, 0xFF40_60C0];
const LIST_COLORS: [u32; 2] = [0xFF30_3038, 0xFF38_3840];
const DROPDOWN_COLOR: u32 = 0xFF50_5060;
const POPUP_COLOR: u32 = 0xFF28_2830;
const MENU_COLORS: [u32; 3] = [0xFF60_4070, 0xFF40_6070, 0xFF70_6040];

/// Builds the demonstration tree for a `width` x `height` window.
pub fn demo_tree(width: u32, height: u32, appearance: &AppearanceConfig) -> ViewTree {
    let blink = Duration::from_millis(appearance.caret_blink_ms);
    let mut tree = ViewTree::new(
        Box::new(Panel::background(appearance.background)),
        Rect::new(0.0, 0.0, width as f64, height as f64),
    );
    let root = tree.root();

    for (i, color) in SWATCH_COLORS.iter().enumerate() {
        let x = 24.0 + i as f64 * 136.0;
        tree.add_child(
            root,
            Box::new(Swatch::new(*color, blink)),
            Rect::new(x, 24.0, 120.0, 80.0),
        );
    }

    tree.add_child(
        root,
        Box::new(ScrollList::new(40, 24.0, LIST_COLORS)),
        Rect::new(24.0, 128.0, 240.0, 200.0),
    );

    let popup_bounds = Rect::new(288.0, 160.0, 160.0, 96.0);
    let popup = tree.add_detached(Box::new(Panel::background(POPUP_COLOR)), popup_bounds);
    for (i, color) in MENU_COLORS.iter().enumerate() {
        tree.add_child(
            popup,
            Box::new(MenuItem::new(*color)),
            Rect::new(
                popup_bounds.x,
                popup_bounds.y + i as f64 * 32.0,
                popup_bounds.width,
                32.0,
            ),
        );
    }
    tree.add_child(
        root,
        Box::new(Dropdown::new(DROPDOWN_COLOR, popup)),
        Rect::new(288.0, 128.0, 160.0, 32.0),
    );
    tree
}
