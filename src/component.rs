//! The component tree.
//!
//! A [`Component`] is a rectangle in the tree with reactive geometry. Its
//! parent is itself a reactive cell, and the default geometry expressions
//! read *through* that cell: position mirrors the parent's position, size
//! mirrors the parent's size (clamped to at least 1x1), z sits one layer
//! above the parent, and the clip rect is inherited. Reparenting a
//! component therefore re-derives every default automatically, while any
//! geometry the caller overrode stays overridden.
//!
//! Detached components are never parented to a real null: they reference a
//! thread-local sentinel component with neutral geometry, so the default
//! expressions always have something to read.
//!
//! Ownership runs one way. A parent holds its children strongly; the
//! parent cell, the root cell, and every dispatcher reference hold weak
//! handles. Dropping the last strong handle to a subtree tears it down.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::input::Handlers;
use crate::raster::Raster;
use crate::reactive::Dynamic;
use crate::root::RootRef;
use crate::types::{Cursor, Rect, Rgba, Vec2};
use crate::Error;

// =============================================================================
// Visual strategy
// =============================================================================

/// How a component paints itself. Implementations draw into the
/// component's private buffer; the buffer is sized to the component and
/// its origin is the component's top-left.
///
/// Capabilities compose by swapping strategies rather than subclassing:
/// a component is "a panel" or "a label" purely by the visual it carries.
pub trait Visual {
    fn paint(&self, component: &Component, target: &mut Raster);
}

/// Paints nothing. The default for structural components.
pub struct NoVisual;

impl Visual for NoVisual {
    fn paint(&self, _component: &Component, _target: &mut Raster) {}
}

// =============================================================================
// Parent reference
// =============================================================================

thread_local! {
    static NULL_PARENT: Component = Component::sentinel();
}

/// A weak reference to a component's parent, stored in a reactive cell.
/// Equality is identity: two refs are equal when they point at the same
/// component.
#[derive(Clone)]
pub struct ParentRef(Weak<ComponentInner>);

impl ParentRef {
    /// The detached state: points at the thread-local sentinel.
    pub fn none() -> Self {
        NULL_PARENT.with(|c| Self(Rc::downgrade(&c.0)))
    }

    pub fn of(component: &Component) -> Self {
        Self(Rc::downgrade(&component.0))
    }

    /// True for the sentinel and for parents that have been dropped.
    pub fn is_none(&self) -> bool {
        self.0.strong_count() == 0
            || NULL_PARENT.with(|c| self.0.as_ptr() == Rc::as_ptr(&c.0))
    }

    /// The referenced component, falling back to the sentinel when the
    /// parent has been dropped.
    pub fn component(&self) -> Component {
        match self.0.upgrade() {
            Some(inner) => Component(inner),
            None => NULL_PARENT.with(|c| c.clone()),
        }
    }
}

impl PartialEq for ParentRef {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_ptr() == other.0.as_ptr()
    }
}

impl std::fmt::Debug for ParentRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_none() {
            f.write_str("ParentRef(none)")
        } else {
            f.write_str("ParentRef(..)")
        }
    }
}

// =============================================================================
// Component
// =============================================================================

pub(crate) struct ComponentInner {
    parent: Dynamic<ParentRef>,
    children: RefCell<Vec<Component>>,
    position: Dynamic<Vec2>,
    size: Dynamic<Vec2>,
    z: Dynamic<f64>,
    clip: Dynamic<Rect>,
    visible: Dynamic<bool>,
    /// Hides this component only; children stay rendered and hit-testable.
    hidden: Dynamic<bool>,
    /// Whether this component consumes input that hits it. Transparent
    /// components see events and let them continue downward.
    opaque: Dynamic<bool>,
    /// Whether the visual fully covers every pixel it draws. Solid buffers
    /// composite with a mask copy instead of an alpha blend.
    solid: Dynamic<bool>,
    cursor: Dynamic<Cursor>,
    root: Dynamic<RootRef>,
    /// Where incoming children actually attach. Containers point this at
    /// an internal content component.
    adopt_target: RefCell<Option<WeakComponent>>,
    visual: RefCell<Rc<dyn Visual>>,
    buffer: RefCell<Raster>,
    needs_paint: Cell<bool>,
    pub(crate) handlers: Handlers,
}

/// A strong handle to a tree node. Cloning is cheap and refers to the
/// same component.
#[derive(Clone)]
pub struct Component(pub(crate) Rc<ComponentInner>);

/// A weak component handle, used everywhere a back-reference must not
/// keep the component alive.
#[derive(Clone)]
pub struct WeakComponent(pub(crate) Weak<ComponentInner>);

impl WeakComponent {
    pub fn upgrade(&self) -> Option<Component> {
        self.0.upgrade().map(Component)
    }

    pub fn ptr_eq(&self, other: &WeakComponent) -> bool {
        self.0.as_ptr() == other.0.as_ptr()
    }
}

impl Component {
    /// A detached component with default (parent-derived) geometry.
    pub fn new() -> Self {
        let parent = Dynamic::new(ParentRef::none());

        let position = {
            let parent = parent.clone();
            Dynamic::computed(move || parent.get().component().position().get())
        };
        let size = {
            let parent = parent.clone();
            Dynamic::computed(move || parent.get().component().size().get())
        };
        size.add_filter(|v: Vec2| v.max(Vec2::ONE));
        let z = {
            let parent = parent.clone();
            Dynamic::computed(move || parent.get().component().z().get() + 1.0)
        };
        let clip = {
            let parent = parent.clone();
            Dynamic::computed(move || parent.get().component().clip().get())
        };
        let root = {
            let parent = parent.clone();
            Dynamic::computed(move || parent.get().component().root().get())
        };

        let component = Component(Rc::new(ComponentInner {
            parent,
            children: RefCell::new(Vec::new()),
            position,
            size,
            z,
            clip,
            visible: Dynamic::new(true),
            hidden: Dynamic::new(false),
            opaque: Dynamic::new(true),
            solid: Dynamic::new(true),
            cursor: Dynamic::new(Cursor::Unspecified),
            root,
            adopt_target: RefCell::new(None),
            visual: RefCell::new(Rc::new(NoVisual)),
            buffer: RefCell::new(Raster::new(0, 0)),
            needs_paint: Cell::new(true),
            handlers: Handlers::default(),
        }));
        component.install_damage_hooks();
        component
    }

    /// The sentinel every detached component points at. Plain cells,
    /// neutral values, never rendered.
    fn sentinel() -> Self {
        Component(Rc::new(ComponentInner {
            parent: Dynamic::new(ParentRef(Weak::new())),
            children: RefCell::new(Vec::new()),
            position: Dynamic::new(Vec2::ZERO),
            size: Dynamic::new(Vec2::ONE),
            // Children of the sentinel land on layer zero.
            z: Dynamic::new(-1.0),
            clip: Dynamic::new(Rect::INFINITE),
            visible: Dynamic::new(false),
            hidden: Dynamic::new(false),
            opaque: Dynamic::new(false),
            solid: Dynamic::new(false),
            cursor: Dynamic::new(Cursor::Unspecified),
            root: Dynamic::new(RootRef::none()),
            adopt_target: RefCell::new(None),
            visual: RefCell::new(Rc::new(NoVisual)),
            buffer: RefCell::new(Raster::new(0, 0)),
            needs_paint: Cell::new(false),
            handlers: Handlers::default(),
        }))
    }

    /// Wire geometry changes into the root's dirty regions. Each hook
    /// holds a weak handle; a dropped component stops reporting damage.
    fn install_damage_hooks(&self) {
        let weak = self.downgrade();
        self.position().before_update({
            let weak = weak.clone();
            move |old: &Vec2, new: &Vec2| {
                if let Some(c) = weak.upgrade() {
                    let size = c.size().peek();
                    c.submit_damage(Rect::from_pos_size(*old, size));
                    c.submit_damage(Rect::from_pos_size(*new, size));
                }
            }
        });
        self.size().before_update({
            let weak = weak.clone();
            move |old: &Vec2, new: &Vec2| {
                if let Some(c) = weak.upgrade() {
                    let pos = c.position().peek();
                    c.submit_damage(Rect::from_pos_size(pos, *old));
                    c.submit_damage(Rect::from_pos_size(pos, *new));
                }
            }
        });
        self.z().subscribe({
            let weak = weak.clone();
            move |_| {
                if let Some(c) = weak.upgrade() {
                    c.submit_damage(c.screen_rect());
                }
            }
        });
        self.clip().before_update({
            let weak = weak.clone();
            move |old: &Rect, new: &Rect| {
                if let Some(c) = weak.upgrade() {
                    let rect = Rect::from_pos_size(c.position().peek(), c.size().peek());
                    c.submit_raw_damage(rect.intersect(old));
                    c.submit_raw_damage(rect.intersect(new));
                }
            }
        });
        // By the time these fire, the flag already holds the new value,
        // so damage must be submitted unconditionally.
        for toggle in [self.visible(), self.hidden(), self.solid()] {
            toggle.subscribe({
                let weak = weak.clone();
                move |_| {
                    if let Some(c) = weak.upgrade() {
                        c.submit_raw_damage(c.screen_rect().intersect(&c.clip().peek()));
                    }
                }
            });
        }
    }

    pub fn downgrade(&self) -> WeakComponent {
        WeakComponent(Rc::downgrade(&self.0))
    }

    pub fn ptr_eq(&self, other: &Component) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    // -------------------------------------------------------------------------
    // Cells
    // -------------------------------------------------------------------------

    pub fn parent(&self) -> &Dynamic<ParentRef> {
        &self.0.parent
    }

    pub fn position(&self) -> &Dynamic<Vec2> {
        &self.0.position
    }

    pub fn size(&self) -> &Dynamic<Vec2> {
        &self.0.size
    }

    pub fn z(&self) -> &Dynamic<f64> {
        &self.0.z
    }

    pub fn clip(&self) -> &Dynamic<Rect> {
        &self.0.clip
    }

    pub fn visible(&self) -> &Dynamic<bool> {
        &self.0.visible
    }

    /// Hides this component's own pixels and input without touching its
    /// children, unlike `visible` which gates the whole subtree.
    pub fn hidden(&self) -> &Dynamic<bool> {
        &self.0.hidden
    }

    pub fn opaque(&self) -> &Dynamic<bool> {
        &self.0.opaque
    }

    /// True when the visual covers every pixel of its buffer, letting the
    /// renderer mask-copy instead of alpha-blend. Visuals that draw with
    /// partial alpha must clear this.
    pub fn solid(&self) -> &Dynamic<bool> {
        &self.0.solid
    }

    pub fn cursor(&self) -> &Dynamic<Cursor> {
        &self.0.cursor
    }

    pub fn root(&self) -> &Dynamic<RootRef> {
        &self.0.root
    }

    // -------------------------------------------------------------------------
    // Tree structure
    // -------------------------------------------------------------------------

    /// Attach `child` under this component, routed through the adoption
    /// target if one is set. The child is removed from its previous parent
    /// first; its default geometry re-derives from the new parent through
    /// the parent cell.
    ///
    /// Fails if the attachment would make the tree cyclic.
    pub fn add_child(&self, child: &Component) -> Result<(), Error> {
        let target = self
            .0
            .adopt_target
            .borrow()
            .as_ref()
            .and_then(WeakComponent::upgrade);
        match target {
            Some(t) if !t.ptr_eq(self) => t.add_child_direct(child),
            _ => self.add_child_direct(child),
        }
    }

    /// Attach `child` directly, bypassing any adoption target. Containers
    /// use this to wire their own internals.
    pub fn add_child_direct(&self, child: &Component) -> Result<(), Error> {
        if child.ptr_eq(self) || self.has_ancestor(child) {
            return Err(Error::TreeCycle);
        }
        child.detach_from_parent();
        self.0.children.borrow_mut().push(child.clone());
        child.parent().set(ParentRef::of(self));
        Ok(())
    }

    /// Redirect future `add_child` calls into `target`, the way a button
    /// hands incoming children to its content panel. `None` restores
    /// direct attachment.
    pub fn set_adopt_target(&self, target: Option<&Component>) {
        *self.0.adopt_target.borrow_mut() = target.map(Component::downgrade);
    }

    /// Detach `child`, leaving it parented to the sentinel.
    pub fn remove_child(&self, child: &Component) {
        let mut children = self.0.children.borrow_mut();
        let before = children.len();
        children.retain(|c| !c.ptr_eq(child));
        drop(children);
        if before != self.0.children.borrow().len() {
            child.parent().set(ParentRef::none());
        }
    }

    pub fn children(&self) -> Vec<Component> {
        self.0.children.borrow().clone()
    }

    fn detach_from_parent(&self) {
        let parent = self.parent().peek();
        if !parent.is_none() {
            parent
                .component()
                .0
                .children
                .borrow_mut()
                .retain(|c| !c.ptr_eq(self));
        }
    }

    /// True if `candidate` appears on this component's parent chain.
    pub fn has_ancestor(&self, candidate: &Component) -> bool {
        let mut cursor = self.parent().peek();
        while !cursor.is_none() {
            let parent = cursor.component();
            if parent.ptr_eq(candidate) {
                return true;
            }
            cursor = parent.parent().peek();
        }
        false
    }

    /// Visit this component and every visible descendant. Invisible
    /// components prune their whole subtree.
    pub(crate) fn visit_visible(&self, f: &mut impl FnMut(&Component)) {
        if !self.visible().peek() {
            return;
        }
        f(self);
        for child in self.0.children.borrow().iter() {
            child.visit_visible(f);
        }
    }

    // -------------------------------------------------------------------------
    // Geometry and damage
    // -------------------------------------------------------------------------

    /// The component's rect in surface space.
    pub fn screen_rect(&self) -> Rect {
        Rect::from_pos_size(self.position().peek(), self.size().peek())
    }

    /// The screen rect restricted by the clip cell. Hit testing and
    /// damage both use this.
    pub fn visible_rect(&self) -> Rect {
        self.screen_rect().intersect(&self.clip().peek())
    }

    /// Report damage for `rect` if this component currently shows pixels.
    fn submit_damage(&self, rect: Rect) {
        if self.visible().peek() && !self.hidden().peek() {
            self.submit_raw_damage(rect.intersect(&self.clip().peek()));
        }
    }

    /// Report damage regardless of visibility.
    fn submit_raw_damage(&self, rect: Rect) {
        if rect.is_empty() {
            return;
        }
        if let Some(root) = self.root().peek().upgrade() {
            root.mark_dirty(rect);
        }
    }

    // -------------------------------------------------------------------------
    // Painting
    // -------------------------------------------------------------------------

    /// Swap the paint strategy and schedule a repaint.
    pub fn set_visual(&self, visual: Rc<dyn Visual>) {
        *self.0.visual.borrow_mut() = visual;
        self.request_paint();
    }

    /// Mark the private buffer stale and report the covered area dirty.
    /// Widgets call this when their content (not geometry) changes.
    pub fn request_paint(&self) {
        self.0.needs_paint.set(true);
        self.submit_damage(self.screen_rect());
    }

    /// Bring the private buffer up to date: resize it to the current
    /// size (which forces a repaint) and re-run the visual if stale.
    pub(crate) fn ensure_painted(&self) {
        let size = self.size().peek().round();
        {
            let mut buffer = self.0.buffer.borrow_mut();
            if buffer.width() != size.x || buffer.height() != size.y {
                buffer.resize(size.x, size.y);
                self.0.needs_paint.set(true);
            }
        }
        if self.0.needs_paint.get() {
            let visual = self.0.visual.borrow().clone();
            let mut buffer = self.0.buffer.borrow_mut();
            buffer.clear(Rgba::TRANSPARENT);
            visual.paint(self, &mut buffer);
            self.0.needs_paint.set(false);
        }
    }

    /// Borrow the painted buffer for compositing.
    pub(crate) fn with_buffer<R>(&self, f: impl FnOnce(&Raster) -> R) -> R {
        f(&self.0.buffer.borrow())
    }
}

impl Default for Component {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Component")
            .field("rect", &self.screen_rect())
            .field("z", &self.z().peek())
            .field("visible", &self.visible().peek())
            .field("children", &self.0.children.borrow().len())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
