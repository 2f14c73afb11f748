// src/ui/router.rs

//! Routes normalized window events to views.
//!
//! Precedence for pointer events, highest first: the top modal dialog, an
//! active pointer capture, open popups, then the main tree. Keyboard and
//! text events skip hit-testing and go to the focused view (or the dialog).
//! All routing state is owned here and only changes on the loop thread.

use super::view::{RouterRequest, ViewContext, ViewEvent, ViewId, ViewTree};
use crate::geometry::Point;
use crate::keys::Modifiers;
use crate::platform::framebuffer::RenderTarget;
use crate::platform::{MouseButton, WindowEvent};
use log::{debug, trace, warn};
use std::time::Duration;

/// An open popup: the view that opened it and the detached subtree shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Popup {
    pub owner: ViewId,
    pub root: ViewId,
}

pub struct EventRouter {
    focused: Option<ViewId>,
    /// Captured view and the button whose release ends the capture.
    captured: Option<(ViewId, MouseButton)>,
    hovered: Option<ViewId>,
    popups: Vec<Popup>,
    dialogs: Vec<ViewId>,
    window_focused: bool,
}

impl Default for EventRouter {
    fn default() -> Self {
        EventRouter {
            focused: None,
            captured: None,
            hovered: None,
            popups: Vec::new(),
            dialogs: Vec::new(),
            window_focused: true,
        }
    }
}

impl EventRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn focused(&self) -> Option<ViewId> {
        self.focused
    }

    pub fn captured(&self) -> Option<ViewId> {
        self.captured.map(|(id, _)| id)
    }

    pub fn hovered(&self) -> Option<ViewId> {
        self.hovered
    }

    pub fn popups(&self) -> &[Popup] {
        &self.popups
    }

    pub fn dialogs(&self) -> &[ViewId] {
        &self.dialogs
    }

    pub fn window_focused(&self) -> bool {
        self.window_focused
    }

    /// Routes one input event. Returns the view that received it (for
    /// scroll, the view that consumed it).
    ///
    /// Lifecycle events (`Resized`, `Exposed`, `CloseRequested`) are left
    /// to the caller.
    pub fn route(&mut self, tree: &mut ViewTree, event: &WindowEvent) -> Option<ViewId> {
        match event {
            WindowEvent::PointerMoved {
                position,
                modifiers,
            } => self.pointer_moved(tree, *position, *modifiers),
            WindowEvent::PointerPressed {
                position,
                button,
                modifiers,
            } => self.pointer_pressed(tree, *position, *button, *modifiers),
            WindowEvent::PointerReleased {
                position,
                button,
                modifiers,
            } => self.pointer_released(tree, *position, *button, *modifiers),
            WindowEvent::Scroll {
                position,
                delta_x,
                delta_y,
                ..
            } => self.scroll(tree, *position, *delta_x, *delta_y),
            WindowEvent::KeyDown { symbol, modifiers } => self.keyboard(
                tree,
                ViewEvent::KeyDown {
                    symbol: *symbol,
                    modifiers: *modifiers,
                },
            ),
            WindowEvent::KeyUp { symbol, modifiers } => self.keyboard(
                tree,
                ViewEvent::KeyUp {
                    symbol: *symbol,
                    modifiers: *modifiers,
                },
            ),
            WindowEvent::TextInput { text } => {
                self.keyboard(tree, ViewEvent::TextInput { text: text.clone() })
            }
            WindowEvent::FocusIn => {
                self.set_window_focused(true);
                None
            }
            WindowEvent::FocusOut => {
                self.set_window_focused(false);
                None
            }
            WindowEvent::Exposed | WindowEvent::Resized { .. } | WindowEvent::CloseRequested => {
                None
            }
        }
    }

    /// Window-level focus. Ticking pauses while the window is unfocused.
    pub fn set_window_focused(&mut self, focused: bool) {
        if self.window_focused != focused {
            debug!("Window focus {}", if focused { "gained" } else { "lost" });
        }
        self.window_focused = focused;
    }

    /// Advances the focused view's timers.
    pub fn tick(&mut self, tree: &mut ViewTree, elapsed: Duration) {
        if !self.window_focused {
            return;
        }
        if let Some(view) = self.focused.and_then(|id| tree.view_mut(id)) {
            view.tick(elapsed);
        }
    }

    /// Draws the main tree, then popups, then dialogs, bottom to top.
    pub fn draw(&self, tree: &ViewTree, target: &mut RenderTarget<'_>) {
        let layers = std::iter::once(tree.root())
            .chain(self.popups.iter().map(|p| p.root))
            .chain(self.dialogs.iter().copied());
        for layer in layers {
            tree.draw_subtree(layer, target, self.focused, self.hovered);
        }
    }

    fn dialog(&self, tree: &ViewTree) -> Option<ViewId> {
        self.dialogs.last().copied().filter(|d| tree.contains(*d))
    }

    /// Popups reachable while the current dialog (if any) is on top.
    fn visible_popups<'a>(&'a self, tree: &'a ViewTree) -> impl Iterator<Item = &'a Popup> + 'a {
        let dialog = self.dialog(tree);
        self.popups
            .iter()
            .rev()
            .filter(move |p| dialog.map_or(true, |d| tree.is_within(p.owner, d)))
    }

    fn in_scope(&self, tree: &ViewTree, id: ViewId) -> bool {
        match self.dialog(tree) {
            None => true,
            Some(d) => {
                tree.is_within(id, d)
                    || self.visible_popups(tree).any(|p| tree.is_within(id, p.root))
            }
        }
    }

    fn popup_at(&self, tree: &ViewTree, point: Point) -> Option<Popup> {
        self.visible_popups(tree)
            .find(|p| tree.bounds(p.root).is_some_and(|b| b.contains(point)))
            .copied()
    }

    /// The view under `point`, ignoring capture.
    fn resolve(&self, tree: &ViewTree, point: Point) -> Option<ViewId> {
        if let Some(popup) = self.popup_at(tree, point) {
            return tree.hit_test(popup.root, point).or(Some(popup.root));
        }
        if let Some(dialog) = self.dialog(tree) {
            return tree.hit_test(dialog, point).or(Some(dialog));
        }
        tree.hit_test(tree.root(), point)
    }

    fn capture_target(&self, tree: &ViewTree) -> Option<ViewId> {
        self.captured
            .map(|(id, _)| id)
            .filter(|id| tree.contains(*id) && self.in_scope(tree, *id))
    }

    fn pointer_moved(
        &mut self,
        tree: &mut ViewTree,
        position: Point,
        modifiers: Modifiers,
    ) -> Option<ViewId> {
        let target = self
            .capture_target(tree)
            .or_else(|| self.resolve(tree, position));
        self.update_hover(tree, target);
        let target = target.filter(|t| tree.contains(*t))?;
        self.deliver(
            tree,
            target,
            ViewEvent::PointerMoved {
                position,
                modifiers,
            },
        );
        Some(target)
    }

    fn update_hover(&mut self, tree: &mut ViewTree, target: Option<ViewId>) {
        if self.hovered == target {
            return;
        }
        let old = self.hovered.take();
        if let Some(old) = old.filter(|o| tree.contains(*o)) {
            self.deliver(tree, old, ViewEvent::PointerExited);
        }
        self.hovered = target;
        if let Some(new) = target {
            self.deliver(tree, new, ViewEvent::PointerEntered);
        }
        trace!("Hover {:?} -> {:?}", old, target);
    }

    fn pointer_pressed(
        &mut self,
        tree: &mut ViewTree,
        position: Point,
        button: MouseButton,
        modifiers: Modifiers,
    ) -> Option<ViewId> {
        let event = ViewEvent::PointerPressed {
            position,
            button,
            modifiers,
        };
        if let Some(captured) = self.capture_target(tree) {
            // A second button during a drag stays with the captured view.
            self.deliver(tree, captured, event);
            return Some(captured);
        }

        let mut target = self.resolve(tree, position);
        let on_owner = target.is_some_and(|t| self.popups.iter().any(|p| p.owner == t));
        if !self.popups.is_empty() && self.popup_at(tree, position).is_none() && !on_owner {
            debug!("Press outside popups; closing {}", self.popups.len());
            self.close_all_popups(tree);
            target = self.resolve(tree, position);
        }

        self.focus_on_press(tree, target);
        let target = target.filter(|t| tree.contains(*t))?;
        self.captured = Some((target, button));
        debug!("Pointer captured by {:?} ({:?})", target, button);
        self.deliver(tree, target, event);
        Some(target)
    }

    fn focus_on_press(&mut self, tree: &mut ViewTree, target: Option<ViewId>) {
        match target {
            Some(t) if tree.view(t).is_some_and(|v| v.focusable()) => {
                self.set_focus(tree, Some(t))
            }
            Some(_) => {}
            None => self.set_focus(tree, None),
        }
    }

    fn pointer_released(
        &mut self,
        tree: &mut ViewTree,
        position: Point,
        button: MouseButton,
        modifiers: Modifiers,
    ) -> Option<ViewId> {
        let captured = self.capture_target(tree);
        if captured.is_none() && self.captured.is_some() {
            // The captured view went away or fell out of scope.
            self.captured = None;
        }
        let target = captured.or_else(|| self.resolve(tree, position));
        if let Some((id, b)) = self.captured {
            if b == button {
                self.captured = None;
                debug!("Pointer capture by {:?} released", id);
            }
        }
        let target = target?;
        self.deliver(
            tree,
            target,
            ViewEvent::PointerReleased {
                position,
                button,
                modifiers,
            },
        );
        Some(target)
    }

    /// Delivers to the view under the pointer, then to its ancestors, until
    /// one consumes the event.
    fn scroll(
        &mut self,
        tree: &mut ViewTree,
        position: Point,
        delta_x: f64,
        delta_y: f64,
    ) -> Option<ViewId> {
        let mut cursor = self.resolve(tree, position);
        while let Some(id) = cursor {
            let event = ViewEvent::Scroll {
                position,
                delta_x,
                delta_y,
            };
            if self.deliver(tree, id, event) {
                trace!("Scroll consumed by {:?}", id);
                return Some(id);
            }
            cursor = tree.parent(id);
        }
        None
    }

    fn keyboard(&mut self, tree: &mut ViewTree, event: ViewEvent) -> Option<ViewId> {
        let target = self
            .focused
            .filter(|f| tree.contains(*f) && self.in_scope(tree, *f))
            .or_else(|| self.dialog(tree))?;
        self.deliver(tree, target, event);
        Some(target)
    }

    /// Hands `event` to one view and applies whatever it requested.
    fn deliver(&mut self, tree: &mut ViewTree, id: ViewId, event: ViewEvent) -> bool {
        let Some(bounds) = tree.bounds(id) else {
            return false;
        };
        let mut cx = ViewContext::new(id, bounds);
        let handled = match tree.view_mut(id) {
            Some(view) => view.handle(&event, &mut cx),
            None => false,
        };
        trace!("{:?} -> {:?} (handled: {})", event, id, handled);
        for request in cx.take_requests() {
            self.apply(tree, request);
        }
        handled
    }

    fn apply(&mut self, tree: &mut ViewTree, request: RouterRequest) {
        match request {
            RouterRequest::Focus(id) => self.set_focus(tree, id),
            RouterRequest::OpenPopup { owner, root } => self.open_popup(tree, owner, root),
            RouterRequest::ClosePopup { owner } => self.close_popup(tree, owner),
            RouterRequest::CloseAllPopups => self.close_all_popups(tree),
            RouterRequest::PushDialog(root) => self.push_dialog(tree, root),
            RouterRequest::PopDialog => {
                self.pop_dialog(tree);
            }
        }
    }

    /// Moves keyboard focus. `None` clears it. Non-focusable or missing
    /// views are refused.
    pub fn set_focus(&mut self, tree: &mut ViewTree, id: Option<ViewId>) {
        if self.focused == id {
            return;
        }
        if let Some(new) = id {
            if !tree.view(new).is_some_and(|v| v.focusable()) {
                warn!("Refusing focus for non-focusable view {:?}", new);
                return;
            }
        }
        let old = self.focused.take();
        debug!("Focus {:?} -> {:?}", old, id);
        if let Some(old) = old.filter(|o| tree.contains(*o)) {
            self.deliver(tree, old, ViewEvent::FocusLost);
        }
        self.focused = id;
        if let Some(new) = id {
            self.deliver(tree, new, ViewEvent::FocusGained);
        }
    }

    /// Shows the detached subtree `root` on behalf of `owner`.
    pub fn open_popup(&mut self, tree: &mut ViewTree, owner: ViewId, root: ViewId) {
        if !tree.contains(root) || !tree.contains(owner) {
            warn!("Ignoring popup {:?} for {:?}: view missing", root, owner);
            return;
        }
        if self.popups.iter().any(|p| p.owner == owner) {
            return;
        }
        debug!("Popup {:?} opened by {:?}", root, owner);
        self.popups.push(Popup { owner, root });
    }

    /// Closes `owner`'s popup and every popup opened after it.
    pub fn close_popup(&mut self, tree: &mut ViewTree, owner: ViewId) {
        if let Some(index) = self.popups.iter().position(|p| p.owner == owner) {
            while self.popups.len() > index {
                self.close_top_popup(tree);
            }
        }
    }

    pub fn close_all_popups(&mut self, tree: &mut ViewTree) {
        while !self.popups.is_empty() {
            self.close_top_popup(tree);
        }
    }

    fn close_top_popup(&mut self, tree: &mut ViewTree) {
        let Some(popup) = self.popups.pop() else {
            return;
        };
        debug!("Popup {:?} of {:?} closed", popup.root, popup.owner);
        self.forget_subtree(tree, popup.root);
        if tree.contains(popup.owner) {
            self.deliver(tree, popup.owner, ViewEvent::PopupClosed);
        }
    }

    /// Makes the detached subtree `root` modal.
    pub fn push_dialog(&mut self, tree: &mut ViewTree, root: ViewId) {
        if !tree.contains(root) {
            warn!("Ignoring missing dialog {:?}", root);
            return;
        }
        debug!("Dialog {:?} pushed", root);
        self.dialogs.push(root);
        if let Some(captured) = self.captured() {
            if !tree.is_within(captured, root) {
                self.captured = None;
            }
        }
        if let Some(hovered) = self.hovered.filter(|h| !tree.is_within(*h, root)) {
            self.hovered = None;
            self.deliver(tree, hovered, ViewEvent::PointerExited);
        }
    }

    /// Removes the top dialog, returning its root.
    pub fn pop_dialog(&mut self, tree: &mut ViewTree) -> Option<ViewId> {
        let root = self.dialogs.pop()?;
        debug!("Dialog {:?} popped", root);
        self.forget_subtree(tree, root);
        Some(root)
    }

    /// Clears focus, hover and capture held inside `root`'s subtree
    /// (notifying the views involved) and closes popups owned inside it.
    pub fn forget_subtree(&mut self, tree: &mut ViewTree, root: ViewId) {
        let owned: Vec<ViewId> = self
            .popups
            .iter()
            .filter(|p| tree.is_within(p.owner, root))
            .map(|p| p.owner)
            .collect();
        for owner in owned {
            self.close_popup(tree, owner);
        }
        if let Some(focused) = self.focused.filter(|f| tree.is_within(*f, root)) {
            self.focused = None;
            debug!("Focus cleared with subtree {:?}", root);
            self.deliver(tree, focused, ViewEvent::FocusLost);
        }
        if let Some(hovered) = self.hovered.filter(|h| tree.is_within(*h, root)) {
            self.hovered = None;
            self.deliver(tree, hovered, ViewEvent::PointerExited);
        }
        if self.captured().is_some_and(|c| tree.is_within(c, root)) {
            debug!("Capture cleared with subtree {:?}", root);
            self.captured = None;
        }
    }

    /// Removes a subtree from `tree` after releasing the state it holds.
    pub fn remove_view(&mut self, tree: &mut ViewTree, id: ViewId) {
        self.forget_subtree(tree, id);
        self.popups.retain(|p| !tree.is_within(p.root, id));
        self.dialogs.retain(|d| !tree.is_within(*d, id));
        tree.remove(id);
    }
}
