// src/ui/view.rs

//! Views and the arena that owns them.
//!
//! Bounds are absolute window coordinates. Popup and dialog contents are
//! detached subtrees: they live in the same arena but have no parent, so
//! they never take part in the main tree's layout or hit-testing.

use crate::geometry::{Point, Rect};
use crate::keys::{KeySymbol, Modifiers};
use crate::platform::framebuffer::RenderTarget;
use crate::platform::MouseButton;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewId(usize);

/// What a view receives from the router.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewEvent {
    PointerEntered,
    PointerExited,
    PointerMoved {
        position: Point,
        modifiers: Modifiers,
    },
    PointerPressed {
        position: Point,
        button: MouseButton,
        modifiers: Modifiers,
    },
    PointerReleased {
        position: Point,
        button: MouseButton,
        modifiers: Modifiers,
    },
    Scroll {
        position: Point,
        delta_x: f64,
        delta_y: f64,
    },
    KeyDown {
        symbol: KeySymbol,
        modifiers: Modifiers,
    },
    KeyUp {
        symbol: KeySymbol,
        modifiers: Modifiers,
    },
    TextInput {
        text: String,
    },
    FocusGained,
    FocusLost,
    /// The popup this view opened was closed by the router.
    PopupClosed,
}

/// Changes a view asks the router to make once the current delivery
/// returns.
#[derive(Debug, Clone, PartialEq)]
pub enum RouterRequest {
    Focus(Option<ViewId>),
    OpenPopup { owner: ViewId, root: ViewId },
    ClosePopup { owner: ViewId },
    CloseAllPopups,
    PushDialog(ViewId),
    PopDialog,
}

/// Passed to [`View::handle`].
pub struct ViewContext {
    id: ViewId,
    bounds: Rect,
    requests: Vec<RouterRequest>,
}

impl ViewContext {
    pub fn new(id: ViewId, bounds: Rect) -> Self {
        ViewContext {
            id,
            bounds,
            requests: Vec::new(),
        }
    }

    pub fn id(&self) -> ViewId {
        self.id
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    pub fn request_focus(&mut self) {
        self.requests.push(RouterRequest::Focus(Some(self.id)));
    }

    pub fn open_popup(&mut self, root: ViewId) {
        self.requests.push(RouterRequest::OpenPopup {
            owner: self.id,
            root,
        });
    }

    pub fn close_popup(&mut self) {
        self.requests
            .push(RouterRequest::ClosePopup { owner: self.id });
    }

    pub fn close_all_popups(&mut self) {
        self.requests.push(RouterRequest::CloseAllPopups);
    }

    pub fn push_dialog(&mut self, root: ViewId) {
        self.requests.push(RouterRequest::PushDialog(root));
    }

    pub fn pop_dialog(&mut self) {
        self.requests.push(RouterRequest::PopDialog);
    }

    pub fn take_requests(&mut self) -> Vec<RouterRequest> {
        std::mem::take(&mut self.requests)
    }
}

/// Per-view drawing state.
#[derive(Debug, Clone, Copy)]
pub struct DrawContext {
    pub bounds: Rect,
    pub focused: bool,
    pub hovered: bool,
}

pub trait View {
    /// Whether the view can hold keyboard focus.
    fn focusable(&self) -> bool {
        false
    }

    /// Whether hit-testing can land on this view. Non-interactive views
    /// (backgrounds) count as empty space.
    fn interactive(&self) -> bool {
        true
    }

    /// Returns `true` when the event was consumed. Only scroll events look
    /// at the result (they bubble until consumed).
    fn handle(&mut self, event: &ViewEvent, cx: &mut ViewContext) -> bool;

    /// Advances caret/animation timers. Only called on the focused view.
    fn tick(&mut self, _elapsed: Duration) {}

    fn draw(&self, _cx: &DrawContext, _target: &mut RenderTarget<'_>) {}
}

struct Node {
    view: Box<dyn View>,
    bounds: Rect,
    parent: Option<ViewId>,
    children: Vec<ViewId>,
}

/// Arena of views. Slots of removed views are never reused, so a stale
/// `ViewId` can only miss, never alias.
pub struct ViewTree {
    nodes: Vec<Option<Node>>,
    root: ViewId,
}

impl ViewTree {
    pub fn new(root: Box<dyn View>, bounds: Rect) -> Self {
        ViewTree {
            nodes: vec![Some(Node {
                view: root,
                bounds,
                parent: None,
                children: Vec::new(),
            })],
            root: ViewId(0),
        }
    }

    pub fn root(&self) -> ViewId {
        self.root
    }

    fn node(&self, id: ViewId) -> Option<&Node> {
        self.nodes.get(id.0)?.as_ref()
    }

    fn node_mut(&mut self, id: ViewId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0)?.as_mut()
    }

    fn insert(&mut self, view: Box<dyn View>, bounds: Rect, parent: Option<ViewId>) -> ViewId {
        let id = ViewId(self.nodes.len());
        self.nodes.push(Some(Node {
            view,
            bounds,
            parent,
            children: Vec::new(),
        }));
        id
    }

    /// Adds `view` as the topmost child of `parent`. Returns `None` when
    /// the parent does not exist.
    pub fn add_child(
        &mut self,
        parent: ViewId,
        view: Box<dyn View>,
        bounds: Rect,
    ) -> Option<ViewId> {
        self.node(parent)?;
        let id = self.insert(view, bounds, Some(parent));
        self.node_mut(parent)?.children.push(id);
        Some(id)
    }

    /// Adds a parentless subtree root, for popup and dialog contents.
    pub fn add_detached(&mut self, view: Box<dyn View>, bounds: Rect) -> ViewId {
        self.insert(view, bounds, None)
    }

    /// Removes `id` and its descendants, returning every removed id.
    /// The root cannot be removed.
    pub fn remove(&mut self, id: ViewId) -> Vec<ViewId> {
        if id == self.root || !self.contains(id) {
            return Vec::new();
        }
        let removed = self.subtree(id);
        if let Some(parent) = self.parent(id) {
            if let Some(p) = self.node_mut(parent) {
                p.children.retain(|c| *c != id);
            }
        }
        for r in &removed {
            self.nodes[r.0] = None;
        }
        removed
    }

    pub fn contains(&self, id: ViewId) -> bool {
        self.node(id).is_some()
    }

    pub fn bounds(&self, id: ViewId) -> Option<Rect> {
        self.node(id).map(|n| n.bounds)
    }

    pub fn set_bounds(&mut self, id: ViewId, bounds: Rect) {
        if let Some(node) = self.node_mut(id) {
            node.bounds = bounds;
        }
    }

    pub fn parent(&self, id: ViewId) -> Option<ViewId> {
        self.node(id)?.parent
    }

    pub fn children(&self, id: ViewId) -> &[ViewId] {
        self.node(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    pub fn view(&self, id: ViewId) -> Option<&dyn View> {
        self.node(id).map(|n| n.view.as_ref())
    }

    pub fn view_mut(&mut self, id: ViewId) -> Option<&mut (dyn View + 'static)> {
        self.node_mut(id).map(|n| n.view.as_mut())
    }

    /// `id` and all its descendants, parents before children.
    pub fn subtree(&self, id: ViewId) -> Vec<ViewId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            if !self.contains(next) {
                continue;
            }
            out.push(next);
            stack.extend(self.children(next).iter().rev());
        }
        out
    }

    /// Whether `id` is `ancestor` or lies below it.
    pub fn is_within(&self, id: ViewId, ancestor: ViewId) -> bool {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.parent(current);
        }
        false
    }

    /// Deepest interactive view under `point`, searching the subtree at
    /// `from`. Later children are on top of earlier ones.
    pub fn hit_test(&self, from: ViewId, point: Point) -> Option<ViewId> {
        let node = self.node(from)?;
        if !node.bounds.contains(point) {
            return None;
        }
        for child in node.children.iter().rev() {
            if let Some(hit) = self.hit_test(*child, point) {
                return Some(hit);
            }
        }
        node.view.interactive().then_some(from)
    }

    /// Draws the subtree at `id`, parents under children.
    pub fn draw_subtree(
        &self,
        id: ViewId,
        target: &mut RenderTarget<'_>,
        focused: Option<ViewId>,
        hovered: Option<ViewId>,
    ) {
        for view_id in self.subtree(id) {
            if let Some(node) = self.node(view_id) {
                let cx = DrawContext {
                    bounds: node.bounds,
                    focused: focused == Some(view_id),
                    hovered: hovered == Some(view_id),
                };
                node.view.draw(&cx, target);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Block {
        interactive: bool,
    }

    impl View for Block {
        fn interactive(&self) -> bool {
            self.interactive
        }

        fn handle(&mut self, _event: &ViewEvent, _cx: &mut ViewContext) -> bool {
            false
        }
    }

    fn block(interactive: bool) -> Box<dyn View> {
        Box::new(Block { interactive })
    }

    #[test_log::test]
    fn it_should_hit_the_deepest_topmost_interactive_view() {
        let mut tree = ViewTree::new(block(false), Rect::new(0.0, 0.0, 100.0, 100.0));
        let root = tree.root();
        let a = tree.add_child(root, block(true), Rect::new(0.0, 0.0, 50.0, 50.0)).unwrap();
        let a1 = tree.add_child(a, block(true), Rect::new(10.0, 10.0, 10.0, 10.0)).unwrap();
        let over = tree.add_child(root, block(true), Rect::new(40.0, 40.0, 20.0, 20.0)).unwrap();

        assert_eq!(tree.hit_test(root, Point::new(15.0, 15.0)), Some(a1));
        assert_eq!(tree.hit_test(root, Point::new(5.0, 5.0)), Some(a));
        assert_eq!(tree.hit_test(root, Point::new(45.0, 45.0)), Some(over));
        assert_eq!(tree.hit_test(root, Point::new(90.0, 90.0)), None);
    }

    #[test_log::test]
    fn it_should_remove_whole_subtrees_without_reusing_ids() {
        let mut tree = ViewTree::new(block(false), Rect::new(0.0, 0.0, 100.0, 100.0));
        let root = tree.root();
        let a = tree.add_child(root, block(true), Rect::new(0.0, 0.0, 50.0, 50.0)).unwrap();
        let a1 = tree.add_child(a, block(true), Rect::new(0.0, 0.0, 5.0, 5.0)).unwrap();

        assert_eq!(tree.remove(a), vec![a, a1]);
        assert!(!tree.contains(a1));
        assert!(tree.children(root).is_empty());
        let b = tree.add_child(root, block(true), Rect::default()).unwrap();
        assert_ne!(b, a);
        assert!(tree.remove(root).is_empty());
    }

    #[test_log::test]
    fn it_should_keep_detached_subtrees_out_of_the_main_tree() {
        let mut tree = ViewTree::new(block(false), Rect::new(0.0, 0.0, 100.0, 100.0));
        let popup = tree.add_detached(block(true), Rect::new(0.0, 0.0, 10.0, 10.0));
        assert_eq!(tree.hit_test(tree.root(), Point::new(5.0, 5.0)), None);
        assert_eq!(tree.hit_test(popup, Point::new(5.0, 5.0)), Some(popup));
        assert!(!tree.is_within(popup, tree.root()));
    }
}
