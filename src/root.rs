//! The surface root: compositing and frame scheduling.
//!
//! A [`Root`] owns the top of a component tree, a composition buffer, and
//! one pending [`RegionSet`] per physical frame buffer the platform swaps
//! between. Damage reported by components lands in *every* pending set;
//! rendering into buffer `i` consumes only set `i`, so a region repainted
//! into one buffer stays dirty for the others until they catch up.
//!
//! Rendering is region-scoped: for each dirty rect the composition buffer
//! is clipped to the rect, cleared to the background, and every visible
//! component intersecting it is composited in ascending z order, each
//! under its own clip. Only the dirty rects are copied out to the target.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use log::debug;

use crate::component::Component;
use crate::input::InputDispatcher;
use crate::raster::Raster;
use crate::reactive::Dynamic;
use crate::region::RegionSet;
use crate::types::{BlitMode, Key, MouseButton, Point2, Rect, Rgba, Vec2};
use crate::Error;

// =============================================================================
// RootRef
// =============================================================================

/// A weak reference to a root, stored in each component's reactive `root`
/// cell. Equality is identity; all detached refs compare equal.
#[derive(Clone)]
pub struct RootRef(Weak<RootInner>);

impl RootRef {
    pub fn none() -> Self {
        Self(Weak::new())
    }

    pub fn is_none(&self) -> bool {
        self.0.strong_count() == 0
    }

    pub fn upgrade(&self) -> Option<Root> {
        self.0.upgrade().map(Root)
    }
}

impl PartialEq for RootRef {
    fn eq(&self, other: &Self) -> bool {
        match (self.0.strong_count(), other.0.strong_count()) {
            (0, 0) => true,
            (0, _) | (_, 0) => false,
            _ => self.0.as_ptr() == other.0.as_ptr(),
        }
    }
}

impl std::fmt::Debug for RootRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_none() {
            f.write_str("RootRef(none)")
        } else {
            f.write_str("RootRef(..)")
        }
    }
}

// =============================================================================
// Root
// =============================================================================

pub(crate) struct RootInner {
    component: Component,
    compose: RefCell<Raster>,
    /// One dirty set per physical frame buffer.
    pending: RefCell<Vec<RegionSet>>,
    background: Dynamic<Rgba>,
    dispatcher: InputDispatcher,
}

/// A render surface with its component tree and input dispatcher.
#[derive(Clone)]
pub struct Root(pub(crate) Rc<RootInner>);

impl Root {
    /// A root covering `width` x `height`, rendering into `buffer_count`
    /// swapped frame buffers (2 for double buffering, 3 for triple).
    pub fn new(width: i32, height: i32, buffer_count: usize) -> Result<Self, Error> {
        if buffer_count == 0 {
            return Err(Error::NoBuffers);
        }
        let bounds = Rect::from_xywh(0, 0, width.max(0), height.max(0));

        let component = Component::new();
        component.position().set(Vec2::ZERO);
        component
            .size()
            .set(Vec2::new(width.max(1) as f64, height.max(1) as f64));
        component.z().set(0.0);
        component.clip().set(bounds);

        // Every buffer starts fully dirty.
        let mut full = RegionSet::new();
        full.add(bounds);
        let pending = vec![full; buffer_count];

        let root = Root(Rc::new(RootInner {
            component,
            compose: RefCell::new(Raster::new(width, height)),
            pending: RefCell::new(pending),
            background: Dynamic::new(Rgba::BLACK),
            dispatcher: InputDispatcher::new(),
        }));
        root.0.component.root().set(RootRef(Rc::downgrade(&root.0)));

        {
            let weak = Rc::downgrade(&root.0);
            root.0.background.subscribe(move |_| {
                if let Some(inner) = weak.upgrade() {
                    Root(inner).mark_all_dirty();
                }
            });
        }
        Ok(root)
    }

    /// The component covering the whole surface. Attach the tree here.
    pub fn component(&self) -> &Component {
        &self.0.component
    }

    pub fn dispatcher(&self) -> &InputDispatcher {
        &self.0.dispatcher
    }

    /// Surface background, painted under everything. Changing it repaints
    /// every buffer in full.
    pub fn background(&self) -> &Dynamic<Rgba> {
        &self.0.background
    }

    pub fn downgrade(&self) -> RootRef {
        RootRef(Rc::downgrade(&self.0))
    }

    pub fn surface_bounds(&self) -> Rect {
        self.0.compose.borrow().bounds()
    }

    pub fn buffer_count(&self) -> usize {
        self.0.pending.borrow().len()
    }

    // -------------------------------------------------------------------------
    // Damage
    // -------------------------------------------------------------------------

    /// Report a damaged surface rect to every pending set.
    pub fn mark_dirty(&self, rect: Rect) {
        let rect = rect.intersect(&self.surface_bounds());
        if rect.is_empty() {
            return;
        }
        for set in self.0.pending.borrow_mut().iter_mut() {
            set.add(rect);
        }
    }

    pub fn mark_all_dirty(&self) {
        let bounds = self.surface_bounds();
        for set in self.0.pending.borrow_mut().iter_mut() {
            set.clear();
            set.add(bounds);
        }
    }

    /// Resize the surface. Everything repaints.
    pub fn resize(&self, width: i32, height: i32) {
        let bounds = Rect::from_xywh(0, 0, width.max(0), height.max(0));
        self.0.compose.borrow_mut().resize(width, height);
        self.0.component.clip().set(bounds);
        self.0
            .component
            .size()
            .set(Vec2::new(width.max(1) as f64, height.max(1) as f64));
        self.mark_all_dirty();
    }

    // -------------------------------------------------------------------------
    // Rendering
    // -------------------------------------------------------------------------

    /// Every visible, non-hidden component overlapping `rect`, topmost
    /// (highest z) first. A hidden component is skipped but its children
    /// are not.
    pub fn find_all(&self, rect: &Rect) -> Vec<Component> {
        let mut hits = Vec::new();
        self.0.component.visit_visible(&mut |c| {
            if !c.hidden().peek() && c.visible_rect().overlaps(rect) {
                hits.push(c.clone());
            }
        });
        hits.sort_by(|a, b| b.z().peek().total_cmp(&a.z().peek()));
        hits
    }

    /// Repaint the dirty regions of frame buffer `buffer_index` into
    /// `target`, consuming that buffer's pending set. Returns the list of
    /// surface rects that were repainted (empty when nothing was dirty).
    ///
    /// Panics if `buffer_index` does not name a configured buffer; that
    /// is a bookkeeping error in the caller's swap chain, not a state a
    /// frame can be rendered from.
    pub fn render(&self, target: &mut Raster, buffer_index: usize) -> Vec<Rect> {
        let regions = {
            let mut pending = self.0.pending.borrow_mut();
            let count = pending.len();
            match pending.get_mut(buffer_index) {
                Some(set) => set.consume(),
                None => panic!("frame buffer {buffer_index} out of range ({count} configured)"),
            }
        };
        if regions.is_empty() {
            return regions;
        }
        debug!("rendering {} dirty regions into buffer {buffer_index}", regions.len());

        let background = self.0.background.peek();
        let mut compose = self.0.compose.borrow_mut();
        for region in &regions {
            // Brings private buffers up to date, resizing where geometry
            // changed since the last frame.
            let stack = self.find_all(region);
            for c in &stack {
                c.ensure_painted();
            }
            compose.push_clip(*region);
            compose.fill(*region, background, BlitMode::Replace);
            for c in stack.iter().rev() {
                compose.push_clip(c.clip().peek());
                let origin = c.screen_rect().min;
                // Solid visuals mask-copy; everything else alpha-blends.
                let mode = if c.solid().peek() {
                    BlitMode::Mask
                } else {
                    BlitMode::Blend
                };
                c.with_buffer(|buf| compose.blit(buf, origin, mode));
                compose.pop_clip();
            }
            compose.pop_clip();
        }
        for region in &regions {
            target.blit_rect(&compose, Point2::ZERO, *region, BlitMode::Replace);
        }
        regions
    }

    // -------------------------------------------------------------------------
    // Input plumbing
    // -------------------------------------------------------------------------

    pub fn pointer_moved(&self, to: Point2) {
        self.0.dispatcher.pointer_moved(&self.0.component, to);
    }

    pub fn button_pressed(&self, button: MouseButton) {
        self.0.dispatcher.button_pressed(&self.0.component, button);
    }

    /// Returns whether a drop zone accepted a dragged payload.
    pub fn button_released(&self, button: MouseButton) -> bool {
        self.0.dispatcher.button_released(&self.0.component, button)
    }

    pub fn key_pressed(&self, key: Key) {
        self.0.dispatcher.key_pressed(&self.0.component, key);
    }

    pub fn key_released(&self, key: Key) {
        self.0.dispatcher.key_released(&self.0.component, key);
    }

    pub fn char_typed(&self, ch: char) {
        self.0.dispatcher.char_typed(&self.0.component, ch);
    }

    pub fn scrolled(&self, delta: Vec2) {
        self.0.dispatcher.scrolled(&self.0.component, delta);
    }
}

// =============================================================================
// Tests
// =============================================================================
