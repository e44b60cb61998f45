//! Input events and dispatch.
//!
//! The dispatcher hit-tests the component tree in descending z order and
//! delivers events downward until an input-opaque component consumes
//! them. Components that received a press are "waiters" for that button:
//! the matching release is delivered to every waiter no matter where the
//! pointer has gone, so press/release always pair up. The same pairing
//! applies to keys. Key and char events are hit-tested at the pointer
//! like mouse events; unconsumed ones fall through to the focused
//! component.
//!
//! Handler registration returns a cleanup closure; call it to detach the
//! handler. Handlers hold no strong component references.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use bitflags::bitflags;
use log::debug;

use crate::component::{Component, WeakComponent};
use crate::types::{Cursor, Key, MouseButton, Point2, Rect, Vec2};
use crate::Error;

// =============================================================================
// Events
// =============================================================================

bitflags! {
    /// Modifier keys held during an event.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Modifiers: u8 {
        const SHIFT = 1;
        const CONTROL = 1 << 1;
        const ALT = 1 << 2;
        const SUPER = 1 << 3;
    }
}

#[derive(Debug, Clone)]
pub struct MouseEvent {
    /// Pointer position in surface space.
    pub pos: Point2,
    /// The button involved, `None` for pure motion.
    pub button: Option<MouseButton>,
    pub modifiers: Modifiers,
}

#[derive(Debug, Clone)]
pub struct ScrollEvent {
    pub pos: Point2,
    pub delta: Vec2,
    pub modifiers: Modifiers,
}

#[derive(Debug, Clone)]
pub struct KeyEvent {
    pub key: Key,
    pub modifiers: Modifiers,
}

/// A typed character, separate from the raw key press that produced it.
#[derive(Debug, Clone)]
pub struct CharEvent {
    pub ch: char,
    pub modifiers: Modifiers,
}

/// Delivered to a drop zone while a drag passes over it and when it ends
/// there.
#[derive(Clone)]
pub struct DropEvent {
    pub pos: Point2,
    pub payload: Rc<dyn Any>,
    pub source: WeakComponent,
}

// =============================================================================
// Per-component handler registry
// =============================================================================

type Listener<E> = Rc<dyn Fn(&Component, &E)>;
type ListenerList<E> = RefCell<Vec<(u64, Listener<E>)>>;

#[derive(Default)]
pub(crate) struct Handlers {
    next_id: Cell<u64>,
    mouse_press: ListenerList<MouseEvent>,
    mouse_release: ListenerList<MouseEvent>,
    mouse_move: ListenerList<MouseEvent>,
    mouse_enter: ListenerList<MouseEvent>,
    mouse_exit: ListenerList<MouseEvent>,
    scroll: ListenerList<ScrollEvent>,
    key_press: ListenerList<KeyEvent>,
    key_release: ListenerList<KeyEvent>,
    char_typed: ListenerList<CharEvent>,
    focus_gained: ListenerList<()>,
    focus_lost: ListenerList<()>,
    drag_enter: ListenerList<DropEvent>,
    drag_exit: ListenerList<DropEvent>,
    drop: ListenerList<DropEvent>,
}

impl Handlers {
    fn alloc_id(&self) -> u64 {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        id
    }

    fn emit<E>(list: &ListenerList<E>, component: &Component, event: &E) {
        let listeners: Vec<_> = list.borrow().iter().map(|(_, f)| f.clone()).collect();
        for f in listeners {
            f(component, event);
        }
    }

    fn has_drop(&self) -> bool {
        !self.drop.borrow().is_empty()
    }

    /// Keyboard-focus eligibility: any key or char handler counts.
    fn has_key_listeners(&self) -> bool {
        !self.key_press.borrow().is_empty()
            || !self.key_release.borrow().is_empty()
            || !self.char_typed.borrow().is_empty()
    }
}

/// Register into `list`, returning a cleanup closure that detaches the
/// handler without keeping the component alive.
fn register<E: 'static>(
    component: &Component,
    pick: fn(&Handlers) -> &ListenerList<E>,
    f: impl Fn(&Component, &E) + 'static,
) -> impl FnOnce() {
    let handlers = &component.0.handlers;
    let id = handlers.alloc_id();
    pick(handlers).borrow_mut().push((id, Rc::new(f)));
    let weak = component.downgrade();
    move || {
        if let Some(c) = weak.upgrade() {
            pick(&c.0.handlers).borrow_mut().retain(|(i, _)| *i != id);
        }
    }
}

impl Component {
    pub fn on_mouse_press(&self, f: impl Fn(&Component, &MouseEvent) + 'static) -> impl FnOnce() {
        register(self, |h| &h.mouse_press, f)
    }

    pub fn on_mouse_release(&self, f: impl Fn(&Component, &MouseEvent) + 'static) -> impl FnOnce() {
        register(self, |h| &h.mouse_release, f)
    }

    pub fn on_mouse_move(&self, f: impl Fn(&Component, &MouseEvent) + 'static) -> impl FnOnce() {
        register(self, |h| &h.mouse_move, f)
    }

    pub fn on_mouse_enter(&self, f: impl Fn(&Component, &MouseEvent) + 'static) -> impl FnOnce() {
        register(self, |h| &h.mouse_enter, f)
    }

    pub fn on_mouse_exit(&self, f: impl Fn(&Component, &MouseEvent) + 'static) -> impl FnOnce() {
        register(self, |h| &h.mouse_exit, f)
    }

    pub fn on_scroll(&self, f: impl Fn(&Component, &ScrollEvent) + 'static) -> impl FnOnce() {
        register(self, |h| &h.scroll, f)
    }

    pub fn on_key_press(&self, f: impl Fn(&Component, &KeyEvent) + 'static) -> impl FnOnce() {
        register(self, |h| &h.key_press, f)
    }

    pub fn on_key_release(&self, f: impl Fn(&Component, &KeyEvent) + 'static) -> impl FnOnce() {
        register(self, |h| &h.key_release, f)
    }

    pub fn on_char(&self, f: impl Fn(&Component, &CharEvent) + 'static) -> impl FnOnce() {
        register(self, |h| &h.char_typed, f)
    }

    pub fn on_focus_gained(&self, f: impl Fn(&Component, &()) + 'static) -> impl FnOnce() {
        register(self, |h| &h.focus_gained, f)
    }

    pub fn on_focus_lost(&self, f: impl Fn(&Component, &()) + 'static) -> impl FnOnce() {
        register(self, |h| &h.focus_lost, f)
    }

    /// Fired when an active drag crosses into this drop zone.
    pub fn on_drag_enter(&self, f: impl Fn(&Component, &DropEvent) + 'static) -> impl FnOnce() {
        register(self, |h| &h.drag_enter, f)
    }

    /// Fired when an active drag leaves this drop zone without dropping.
    pub fn on_drag_exit(&self, f: impl Fn(&Component, &DropEvent) + 'static) -> impl FnOnce() {
        register(self, |h| &h.drag_exit, f)
    }

    /// Mark this component as a drop zone.
    pub fn on_drop(&self, f: impl Fn(&Component, &DropEvent) + 'static) -> impl FnOnce() {
        register(self, |h| &h.drop, f)
    }
}

// =============================================================================
// Dispatcher
// =============================================================================

struct DragState {
    source: WeakComponent,
    payload: Rc<dyn Any>,
    /// The drop zone the drag is currently over, if any.
    zone: Option<WeakComponent>,
}

/// Routes surface-space input into the component tree. One per root.
#[derive(Default)]
pub struct InputDispatcher {
    pointer: Cell<Point2>,
    modifiers: Cell<Modifiers>,
    /// The stack of components currently under the pointer, topmost
    /// first, cut off below the first opaque one.
    hovered: RefCell<Vec<WeakComponent>>,
    button_waiters: RefCell<HashMap<MouseButton, Vec<WeakComponent>>>,
    key_waiters: RefCell<HashMap<Key, Vec<WeakComponent>>>,
    focus: RefCell<Option<WeakComponent>>,
    drag: RefCell<Option<DragState>>,
    cursor: Cell<Cursor>,
}

/// All visible, non-hidden components under `p`, topmost (highest z)
/// first, cut off after the first input-opaque one.
fn hit_stack(tree: &Component, p: Point2) -> Vec<Component> {
    let mut hits = Vec::new();
    tree.visit_visible(&mut |c| {
        if !c.hidden().peek() && c.visible_rect().contains(p) {
            hits.push(c.clone());
        }
    });
    hits.sort_by(|a, b| b.z().peek().total_cmp(&a.z().peek()));
    truncate_at_opaque(&mut hits);
    hits
}

/// The topmost drop zone under `p`. Opacity is irrelevant here: a
/// transparent drop zone is still a valid target.
fn drop_zone_at(tree: &Component, p: Point2) -> Option<Component> {
    let mut zones = Vec::new();
    tree.visit_visible(&mut |c| {
        if !c.hidden().peek() && c.visible_rect().contains(p) && c.0.handlers.has_drop() {
            zones.push(c.clone());
        }
    });
    zones
        .into_iter()
        .max_by(|a, b| a.z().peek().total_cmp(&b.z().peek()))
}

/// Keep everything above and including the first opaque component.
fn truncate_at_opaque(hits: &mut Vec<Component>) {
    if let Some(i) = hits.iter().position(|c| c.opaque().peek()) {
        hits.truncate(i + 1);
    }
}

impl InputDispatcher {
    pub fn new() -> Self {
        Self {
            cursor: Cell::new(Cursor::Arrow),
            ..Self::default()
        }
    }

    pub fn pointer(&self) -> Point2 {
        self.pointer.get()
    }

    /// The cursor the platform should currently show: the topmost hovered
    /// component with a preference, or the arrow.
    pub fn cursor(&self) -> Cursor {
        self.cursor.get()
    }

    pub fn focus(&self) -> Option<Component> {
        self.focus.borrow().as_ref().and_then(|w| w.upgrade())
    }

    /// Move keyboard focus, firing lost/gained hooks. `None` clears it.
    pub fn set_focus(&self, target: Option<&Component>) {
        let old = self.focus();
        let same = match (&old, target) {
            (Some(a), Some(b)) => a.ptr_eq(b),
            (None, None) => true,
            _ => false,
        };
        if same {
            return;
        }
        *self.focus.borrow_mut() = target.map(Component::downgrade);
        if let Some(old) = old {
            Handlers::emit(&old.0.handlers.focus_lost, &old, &());
        }
        if let Some(new) = target {
            Handlers::emit(&new.0.handlers.focus_gained, new, &());
        }
    }

    /// Start dragging `payload` from `source`. The drag ends on the next
    /// left-button release, delivered to the topmost drop zone under the
    /// pointer.
    pub fn begin_drag(&self, source: &Component, payload: Rc<dyn Any>) -> Result<(), Error> {
        let mut drag = self.drag.borrow_mut();
        if drag.is_some() {
            return Err(Error::DragInProgress);
        }
        *drag = Some(DragState {
            source: source.downgrade(),
            payload,
            zone: None,
        });
        Ok(())
    }

    pub fn drag_active(&self) -> bool {
        self.drag.borrow().is_some()
    }

    /// Pointer motion. Move events go to every component whose visible
    /// rect meets the rect spanning the old and new pointer positions, so
    /// a fast sweep cannot skip over a component. Active button waiters
    /// receive the move even when occluded. Enter/exit fire from the
    /// symmetric difference of the old and new hover stacks.
    pub fn pointer_moved(&self, tree: &Component, to: Point2) {
        let from = self.pointer.get();
        self.pointer.set(to);
        let event = MouseEvent {
            pos: to,
            button: None,
            modifiers: self.modifiers.get(),
        };

        // Sweep rect between the two positions, at least one pixel wide.
        let span = Rect::new(
            Point2::new(from.x.min(to.x), from.y.min(to.y)),
            Point2::new(from.x.max(to.x) + 1, from.y.max(to.y) + 1),
        );
        let mut swept = Vec::new();
        tree.visit_visible(&mut |c| {
            if !c.hidden().peek() && c.visible_rect().overlaps(&span) {
                swept.push(c.clone());
            }
        });
        swept.sort_by(|a, b| b.z().peek().total_cmp(&a.z().peek()));
        truncate_at_opaque(&mut swept);

        let mut delivered: Vec<WeakComponent> = Vec::new();
        for c in &swept {
            Handlers::emit(&c.0.handlers.mouse_move, c, &event);
            delivered.push(c.downgrade());
        }
        // Waiters track the pointer past opaque occluders.
        let waiters: Vec<WeakComponent> = self
            .button_waiters
            .borrow()
            .values()
            .flatten()
            .cloned()
            .collect();
        for w in waiters {
            if delivered.iter().any(|d| d.ptr_eq(&w)) {
                continue;
            }
            if let Some(c) = w.upgrade() {
                Handlers::emit(&c.0.handlers.mouse_move, &c, &event);
                delivered.push(w);
            }
        }

        self.update_hover(tree, to, &event);
        self.update_drop_zone(tree, to);
    }

    /// Track the drop zone under an active drag, firing zone enter/exit
    /// as it changes.
    fn update_drop_zone(&self, tree: &Component, at: Point2) {
        let (exited, entered, event) = {
            let mut drag = self.drag.borrow_mut();
            let Some(drag) = drag.as_mut() else {
                return;
            };
            let next = drop_zone_at(tree, at);
            let same = match (&drag.zone, &next) {
                (Some(a), Some(b)) => a.ptr_eq(&b.downgrade()),
                (None, None) => true,
                _ => false,
            };
            if same {
                return;
            }
            let exited = drag.zone.take().and_then(|w| w.upgrade());
            drag.zone = next.as_ref().map(Component::downgrade);
            let event = DropEvent {
                pos: at,
                payload: drag.payload.clone(),
                source: drag.source.clone(),
            };
            (exited, next, event)
        };
        // Borrow released: handlers are free to inspect the drag.
        if let Some(zone) = exited {
            Handlers::emit(&zone.0.handlers.drag_exit, &zone, &event);
        }
        if let Some(zone) = entered {
            Handlers::emit(&zone.0.handlers.drag_enter, &zone, &event);
        }
    }

    fn update_hover(&self, tree: &Component, at: Point2, event: &MouseEvent) {
        let new_stack = hit_stack(tree, at);
        let old_stack: Vec<WeakComponent> = self.hovered.borrow().clone();

        for old in &old_stack {
            let still = new_stack.iter().any(|c| old.ptr_eq(&c.downgrade()));
            if !still
                && let Some(c) = old.upgrade()
            {
                Handlers::emit(&c.0.handlers.mouse_exit, &c, event);
            }
        }
        for new in &new_stack {
            let was = old_stack.iter().any(|w| w.ptr_eq(&new.downgrade()));
            if !was {
                Handlers::emit(&new.0.handlers.mouse_enter, new, event);
            }
        }
        *self.hovered.borrow_mut() = new_stack.iter().map(Component::downgrade).collect();

        // Topmost hovered preference wins; leaving it restores the arrow.
        let cursor = new_stack
            .iter()
            .map(|c| c.cursor().peek())
            .find(|c| *c != Cursor::Unspecified)
            .unwrap_or(Cursor::Arrow);
        self.cursor.set(cursor);
    }

    /// Button press at the current pointer position. Every component that
    /// receives it becomes a waiter for the paired release; the consuming
    /// component takes keyboard focus.
    pub fn button_pressed(&self, tree: &Component, button: MouseButton) {
        let pos = self.pointer.get();
        let event = MouseEvent {
            pos,
            button: Some(button),
            modifiers: self.modifiers.get(),
        };
        let stack = hit_stack(tree, pos);
        debug!("press {button:?} at {pos:?}: {} hit", stack.len());
        {
            let mut waiters = self.button_waiters.borrow_mut();
            let entry = waiters.entry(button).or_default();
            for c in &stack {
                entry.push(c.downgrade());
            }
        }
        for c in &stack {
            Handlers::emit(&c.0.handlers.mouse_press, c, &event);
        }
        // The consumer (bottom of the truncated stack) takes focus, but
        // only if it listens for keyboard input; a press on empty space
        // clears focus.
        match stack.last() {
            Some(c) if c.opaque().peek() => {
                if c.0.handlers.has_key_listeners() {
                    self.set_focus(Some(c));
                }
            }
            _ => self.set_focus(None),
        }
    }

    /// Button release. Delivered to every waiter for this button
    /// regardless of where the pointer is now, then ends any active drag.
    /// Returns whether a drop zone accepted a dragged payload.
    pub fn button_released(&self, tree: &Component, button: MouseButton) -> bool {
        let pos = self.pointer.get();
        let event = MouseEvent {
            pos,
            button: Some(button),
            modifiers: self.modifiers.get(),
        };
        let waiters = self.button_waiters.borrow_mut().remove(&button);
        for w in waiters.unwrap_or_default() {
            if let Some(c) = w.upgrade() {
                Handlers::emit(&c.0.handlers.mouse_release, &c, &event);
            }
        }
        if button == MouseButton::Left {
            self.finish_drag(tree, pos)
        } else {
            false
        }
    }

    /// End an active drag, delivering the payload to the topmost drop
    /// zone under the pointer. Returns whether a zone accepted it.
    fn finish_drag(&self, tree: &Component, pos: Point2) -> bool {
        let Some(drag) = self.drag.borrow_mut().take() else {
            return false;
        };
        let event = DropEvent {
            pos,
            payload: drag.payload,
            source: drag.source,
        };
        match drop_zone_at(tree, pos) {
            Some(zone) => {
                Handlers::emit(&zone.0.handlers.drop, &zone, &event);
                true
            }
            None => false,
        }
    }

    /// Key press, hit-tested under the pointer like a mouse press. An
    /// opaque hit that listens for keyboard input consumes the event and
    /// takes focus; unconsumed presses fall through to the focused
    /// component. Every recipient is a waiter for the paired release.
    pub fn key_pressed(&self, tree: &Component, key: Key) {
        self.modifiers
            .set(self.modifiers.get() | modifier_bit(key));
        let event = KeyEvent {
            key,
            modifiers: self.modifiers.get(),
        };
        let stack = hit_stack(tree, self.pointer.get());
        let mut delivered: Vec<WeakComponent> = Vec::new();
        for c in &stack {
            Handlers::emit(&c.0.handlers.key_press, c, &event);
            delivered.push(c.downgrade());
        }
        if !self.consume_keyboard(&stack)
            && let Some(f) = self.focus()
            && !delivered.iter().any(|d| d.ptr_eq(&f.downgrade()))
        {
            Handlers::emit(&f.0.handlers.key_press, &f, &event);
            delivered.push(f.downgrade());
        }
        self.key_waiters
            .borrow_mut()
            .entry(key)
            .or_default()
            .extend(delivered);
    }

    /// Key release: top-down pass at the pointer, focus fall-through,
    /// then every still-waiting component from the press is satisfied.
    pub fn key_released(&self, tree: &Component, key: Key) {
        self.modifiers
            .set(self.modifiers.get() - modifier_bit(key));
        let event = KeyEvent {
            key,
            modifiers: self.modifiers.get(),
        };
        let stack = hit_stack(tree, self.pointer.get());
        let mut satisfied: Vec<WeakComponent> = Vec::new();
        for c in &stack {
            Handlers::emit(&c.0.handlers.key_release, c, &event);
            satisfied.push(c.downgrade());
        }
        if !self.consume_keyboard(&stack)
            && let Some(f) = self.focus()
            && !satisfied.iter().any(|s| s.ptr_eq(&f.downgrade()))
        {
            Handlers::emit(&f.0.handlers.key_release, &f, &event);
            satisfied.push(f.downgrade());
        }
        let waiters = self.key_waiters.borrow_mut().remove(&key);
        for w in waiters.unwrap_or_default() {
            if satisfied.iter().any(|s| s.ptr_eq(&w)) {
                continue;
            }
            if let Some(c) = w.upgrade() {
                Handlers::emit(&c.0.handlers.key_release, &c, &event);
            }
        }
    }

    /// A typed character, delivered like a key press but without waiter
    /// pairing.
    pub fn char_typed(&self, tree: &Component, ch: char) {
        let event = CharEvent {
            ch,
            modifiers: self.modifiers.get(),
        };
        let stack = hit_stack(tree, self.pointer.get());
        for c in &stack {
            Handlers::emit(&c.0.handlers.char_typed, c, &event);
        }
        if !self.consume_keyboard(&stack)
            && let Some(f) = self.focus()
            && !stack.iter().any(|c| c.ptr_eq(&f))
        {
            Handlers::emit(&f.0.handlers.char_typed, &f, &event);
        }
    }

    /// Keyboard consumption rule shared by key and char events: the event
    /// is consumed when the opaque hit listens for keyboard input, which
    /// also grants it focus.
    fn consume_keyboard(&self, stack: &[Component]) -> bool {
        match stack.last() {
            Some(c) if c.opaque().peek() && c.0.handlers.has_key_listeners() => {
                self.set_focus(Some(c));
                true
            }
            _ => false,
        }
    }

    /// Scroll at the current pointer position, consumed like a press.
    pub fn scrolled(&self, tree: &Component, delta: Vec2) {
        let pos = self.pointer.get();
        let event = ScrollEvent {
            pos,
            delta,
            modifiers: self.modifiers.get(),
        };
        for c in hit_stack(tree, pos) {
            Handlers::emit(&c.0.handlers.scroll, &c, &event);
        }
    }
}

fn modifier_bit(key: Key) -> Modifiers {
    match key {
        Key::Shift => Modifiers::SHIFT,
        Key::Control => Modifiers::CONTROL,
        Key::Alt => Modifiers::ALT,
        _ => Modifiers::empty(),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn placed(parent: &Component, x: f64, y: f64, w: f64, h: f64, z: f64) -> Component {
        let c = Component::new();
        parent.add_child(&c).unwrap();
        c.position().set(Vec2::new(x, y));
        c.size().set(Vec2::new(w, h));
        c.z().set(z);
        c
    }

    fn tree() -> Component {
        let root = Component::new();
        root.position().set(Vec2::ZERO);
        root.size().set(Vec2::new(100.0, 100.0));
        root.z().set(0.0);
        root.opaque().set(false);
        root
    }

    #[test]
    fn test_press_hits_topmost_and_consumes() {
        let root = tree();
        let below = placed(&root, 0.0, 0.0, 50.0, 50.0, 1.0);
        let above = placed(&root, 0.0, 0.0, 50.0, 50.0, 2.0);

        let log: Rc<RefCell<Vec<&str>>> = Rc::new(RefCell::new(Vec::new()));
        let _a = {
            let log = log.clone();
            above.on_mouse_press(move |_, _| log.borrow_mut().push("above"))
        };
        let _b = {
            let log = log.clone();
            below.on_mouse_press(move |_, _| log.borrow_mut().push("below"))
        };

        let d = InputDispatcher::new();
        d.pointer_moved(&root, Point2::new(10, 10));
        d.button_pressed(&root, MouseButton::Left);
        // `above` is opaque: it consumes, `below` never sees the press.
        assert_eq!(*log.borrow(), vec!["above"]);
    }

    #[test]
    fn test_transparent_component_passes_through() {
        let root = tree();
        let below = placed(&root, 0.0, 0.0, 50.0, 50.0, 1.0);
        let overlay = placed(&root, 0.0, 0.0, 50.0, 50.0, 2.0);
        overlay.opaque().set(false);

        let log: Rc<RefCell<Vec<&str>>> = Rc::new(RefCell::new(Vec::new()));
        let _a = {
            let log = log.clone();
            overlay.on_mouse_press(move |_, _| log.borrow_mut().push("overlay"))
        };
        let _b = {
            let log = log.clone();
            below.on_mouse_press(move |_, _| log.borrow_mut().push("below"))
        };

        let d = InputDispatcher::new();
        d.pointer_moved(&root, Point2::new(10, 10));
        d.button_pressed(&root, MouseButton::Left);
        assert_eq!(*log.borrow(), vec!["overlay", "below"]);
    }

    #[test]
    fn test_release_pairs_even_after_pointer_leaves() {
        let root = tree();
        let target = placed(&root, 0.0, 0.0, 20.0, 20.0, 1.0);
        let released = Rc::new(Cell::new(0));
        let _h = {
            let released = released.clone();
            target.on_mouse_release(move |_, _| released.set(released.get() + 1))
        };

        let d = InputDispatcher::new();
        d.pointer_moved(&root, Point2::new(5, 5));
        d.button_pressed(&root, MouseButton::Left);
        d.pointer_moved(&root, Point2::new(90, 90));
        d.button_released(&root, MouseButton::Left);
        assert_eq!(released.get(), 1);
        // And the waiter set is gone: a second release delivers nothing.
        d.button_released(&root, MouseButton::Left);
        assert_eq!(released.get(), 1);
    }

    #[test]
    fn test_enter_and_exit_fire_symmetrically() {
        let root = tree();
        let a = placed(&root, 0.0, 0.0, 20.0, 20.0, 1.0);
        let b = placed(&root, 50.0, 0.0, 20.0, 20.0, 1.0);

        let log: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));
        for (c, name) in [(&a, "a"), (&b, "b")] {
            let log1 = log.clone();
            std::mem::forget(c.on_mouse_enter(move |_, _| {
                log1.borrow_mut().push(format!("enter {name}"));
            }));
            let log2 = log.clone();
            std::mem::forget(c.on_mouse_exit(move |_, _| {
                log2.borrow_mut().push(format!("exit {name}"));
            }));
        }

        let d = InputDispatcher::new();
        d.pointer_moved(&root, Point2::new(5, 5));
        d.pointer_moved(&root, Point2::new(55, 5));
        d.pointer_moved(&root, Point2::new(90, 90));
        assert_eq!(
            *log.borrow(),
            vec!["enter a", "exit a", "enter b", "exit b"]
        );
    }

    #[test]
    fn test_waiter_receives_moves_while_occluded() {
        let root = tree();
        let target = placed(&root, 0.0, 0.0, 20.0, 20.0, 1.0);
        let _blocker = placed(&root, 40.0, 40.0, 30.0, 30.0, 5.0);

        let moves = Rc::new(Cell::new(0));
        let _h = {
            let moves = moves.clone();
            target.on_mouse_move(move |_, _| moves.set(moves.get() + 1))
        };

        let d = InputDispatcher::new();
        d.pointer_moved(&root, Point2::new(5, 5));
        d.button_pressed(&root, MouseButton::Left);
        moves.set(0);
        // Pointer now over the opaque blocker, far from the target, but
        // the target holds a press and keeps tracking.
        d.pointer_moved(&root, Point2::new(50, 50));
        assert_eq!(moves.get(), 1);
    }

    #[test]
    fn test_sweep_covers_skipped_components() {
        let root = tree();
        let mid = placed(&root, 40.0, 0.0, 10.0, 100.0, 1.0);
        let moves = Rc::new(Cell::new(0));
        let _h = {
            let moves = moves.clone();
            mid.on_mouse_move(move |_, _| moves.set(moves.get() + 1))
        };

        let d = InputDispatcher::new();
        d.pointer_moved(&root, Point2::new(5, 50));
        moves.set(0);
        // Jump clean across `mid`; the spanning rect still touches it.
        d.pointer_moved(&root, Point2::new(95, 50));
        assert_eq!(moves.get(), 1);
    }

    #[test]
    fn test_focus_follows_press_and_falls_through() {
        let root = tree();
        let field = placed(&root, 0.0, 0.0, 20.0, 20.0, 1.0);
        let keys = Rc::new(Cell::new(0));
        let _h = {
            let keys = keys.clone();
            field.on_key_press(move |_, _| keys.set(keys.get() + 1))
        };

        let d = InputDispatcher::new();
        d.pointer_moved(&root, Point2::new(90, 90));
        d.key_pressed(&root, Key::Char('x'));
        assert_eq!(keys.get(), 0);

        d.pointer_moved(&root, Point2::new(5, 5));
        d.button_pressed(&root, MouseButton::Left);
        assert!(d.focus().is_some_and(|c| c.ptr_eq(&field)));
        // Pointer off the field: the press reaches it through focus.
        d.pointer_moved(&root, Point2::new(90, 90));
        d.key_pressed(&root, Key::Char('x'));
        assert_eq!(keys.get(), 1);

        // Press on empty space clears focus.
        d.button_pressed(&root, MouseButton::Left);
        assert!(d.focus().is_none());
    }

    #[test]
    fn test_key_press_hit_tests_under_pointer() {
        let root = tree();
        let field = placed(&root, 0.0, 0.0, 20.0, 20.0, 1.0);
        let keys = Rc::new(Cell::new(0));
        let _h = {
            let keys = keys.clone();
            field.on_key_press(move |_, _| keys.set(keys.get() + 1))
        };

        // Nothing focused, nothing pressed: the pointer alone routes it.
        let d = InputDispatcher::new();
        d.pointer_moved(&root, Point2::new(5, 5));
        d.key_pressed(&root, Key::Space);
        assert_eq!(keys.get(), 1);
        // And consuming it granted focus.
        assert!(d.focus().is_some_and(|c| c.ptr_eq(&field)));
    }

    #[test]
    fn test_press_on_deaf_component_leaves_focus() {
        let root = tree();
        let field = placed(&root, 0.0, 0.0, 20.0, 20.0, 1.0);
        let _h = field.on_key_press(|_, _| {});
        let _deaf = placed(&root, 50.0, 50.0, 20.0, 20.0, 1.0);

        let d = InputDispatcher::new();
        d.pointer_moved(&root, Point2::new(5, 5));
        d.button_pressed(&root, MouseButton::Left);
        assert!(d.focus().is_some_and(|c| c.ptr_eq(&field)));

        // `deaf` consumes the press but has no keyboard listeners, so
        // focus stays where it was.
        d.pointer_moved(&root, Point2::new(55, 55));
        d.button_pressed(&root, MouseButton::Left);
        assert!(d.focus().is_some_and(|c| c.ptr_eq(&field)));
    }

    #[test]
    fn test_key_release_pairs_after_focus_change() {
        let root = tree();
        let field = placed(&root, 0.0, 0.0, 20.0, 20.0, 1.0);
        let releases = Rc::new(Cell::new(0));
        let _h = {
            let releases = releases.clone();
            field.on_key_release(move |_, _| releases.set(releases.get() + 1))
        };

        let d = InputDispatcher::new();
        d.pointer_moved(&root, Point2::new(5, 5));
        d.button_pressed(&root, MouseButton::Left);
        d.key_pressed(&root, Key::Enter);
        d.set_focus(None);
        // Pointer gone elsewhere too: only the waiter pairing delivers.
        d.pointer_moved(&root, Point2::new(90, 90));
        d.key_released(&root, Key::Enter);
        assert_eq!(releases.get(), 1);
    }

    #[test]
    fn test_char_typed_consumed_and_falls_through() {
        let root = tree();
        let field = placed(&root, 0.0, 0.0, 20.0, 20.0, 1.0);
        let typed: Rc<RefCell<String>> = Rc::new(RefCell::new(String::new()));
        let _h = {
            let typed = typed.clone();
            field.on_char(move |_, e| typed.borrow_mut().push(e.ch))
        };

        let d = InputDispatcher::new();
        // Under the pointer: consumed there, and focus granted.
        d.pointer_moved(&root, Point2::new(5, 5));
        d.char_typed(&root, 'h');
        assert!(d.focus().is_some_and(|c| c.ptr_eq(&field)));
        // Pointer elsewhere: reaches the field through focus.
        d.pointer_moved(&root, Point2::new(90, 90));
        d.char_typed(&root, 'i');
        assert_eq!(*typed.borrow(), "hi");
    }

    #[test]
    fn test_hidden_component_skips_input_but_not_children() {
        let root = tree();
        let group = placed(&root, 0.0, 0.0, 50.0, 50.0, 1.0);
        let inner = placed(&group, 0.0, 0.0, 50.0, 50.0, 2.0);
        group.hidden().set(true);

        let log: Rc<RefCell<Vec<&str>>> = Rc::new(RefCell::new(Vec::new()));
        let _g = {
            let log = log.clone();
            group.on_mouse_press(move |_, _| log.borrow_mut().push("group"))
        };
        let _i = {
            let log = log.clone();
            inner.on_mouse_press(move |_, _| log.borrow_mut().push("inner"))
        };

        let d = InputDispatcher::new();
        d.pointer_moved(&root, Point2::new(10, 10));
        d.button_pressed(&root, MouseButton::Left);
        // Hidden hides self only: the child still receives input.
        assert_eq!(*log.borrow(), vec!["inner"]);
    }

    #[test]
    fn test_modifiers_tracked() {
        let root = tree();
        let d = InputDispatcher::new();
        d.key_pressed(&root, Key::Shift);
        d.key_pressed(&root, Key::Control);
        assert_eq!(d.modifiers.get(), Modifiers::SHIFT | Modifiers::CONTROL);
        d.key_released(&root, Key::Shift);
        assert_eq!(d.modifiers.get(), Modifiers::CONTROL);
    }

    #[test]
    fn test_cursor_set_and_restored() {
        let root = tree();
        let grip = placed(&root, 0.0, 0.0, 20.0, 20.0, 1.0);
        grip.cursor().set(Cursor::Hand);

        let d = InputDispatcher::new();
        assert_eq!(d.cursor(), Cursor::Arrow);
        d.pointer_moved(&root, Point2::new(5, 5));
        assert_eq!(d.cursor(), Cursor::Hand);
        d.pointer_moved(&root, Point2::new(90, 90));
        assert_eq!(d.cursor(), Cursor::Arrow);
    }

    #[test]
    fn test_drag_and_drop() {
        let root = tree();
        let source = placed(&root, 0.0, 0.0, 20.0, 20.0, 1.0);
        let zone = placed(&root, 50.0, 50.0, 30.0, 30.0, 1.0);

        let dropped: Rc<RefCell<Option<String>>> = Rc::new(RefCell::new(None));
        let _h = {
            let dropped = dropped.clone();
            zone.on_drop(move |_, e| {
                if let Some(s) = e.payload.downcast_ref::<String>() {
                    *dropped.borrow_mut() = Some(s.clone());
                }
            })
        };

        let d = InputDispatcher::new();
        d.pointer_moved(&root, Point2::new(5, 5));
        d.button_pressed(&root, MouseButton::Left);
        d.begin_drag(&source, Rc::new(String::from("cargo"))).unwrap();
        assert!(matches!(
            d.begin_drag(&source, Rc::new(0u8)),
            Err(Error::DragInProgress)
        ));
        d.pointer_moved(&root, Point2::new(60, 60));
        assert!(d.button_released(&root, MouseButton::Left));
        assert_eq!(dropped.borrow().as_deref(), Some("cargo"));
        assert!(!d.drag_active());
    }

    #[test]
    fn test_drop_without_zone_is_not_accepted() {
        let root = tree();
        let source = placed(&root, 0.0, 0.0, 20.0, 20.0, 1.0);

        let d = InputDispatcher::new();
        d.pointer_moved(&root, Point2::new(5, 5));
        d.button_pressed(&root, MouseButton::Left);
        d.begin_drag(&source, Rc::new(7i32)).unwrap();
        d.pointer_moved(&root, Point2::new(90, 90));
        assert!(!d.button_released(&root, MouseButton::Left));
        assert!(!d.drag_active());
    }

    #[test]
    fn test_drag_over_zone_fires_enter_and_exit() {
        let root = tree();
        let source = placed(&root, 0.0, 0.0, 20.0, 20.0, 1.0);
        let zone = placed(&root, 50.0, 50.0, 30.0, 30.0, 1.0);

        let log: Rc<RefCell<Vec<&str>>> = Rc::new(RefCell::new(Vec::new()));
        let _e = {
            let log = log.clone();
            zone.on_drag_enter(move |_, _| log.borrow_mut().push("enter"))
        };
        let _x = {
            let log = log.clone();
            zone.on_drag_exit(move |_, _| log.borrow_mut().push("exit"))
        };
        let _d = zone.on_drop(|_, _| {});

        let d = InputDispatcher::new();
        d.pointer_moved(&root, Point2::new(5, 5));
        d.button_pressed(&root, MouseButton::Left);
        d.begin_drag(&source, Rc::new(1u8)).unwrap();

        // Hovering without a drag fired nothing so far.
        assert!(log.borrow().is_empty());
        d.pointer_moved(&root, Point2::new(60, 60));
        assert_eq!(*log.borrow(), vec!["enter"]);
        // Wandering inside the zone stays quiet.
        d.pointer_moved(&root, Point2::new(70, 70));
        assert_eq!(*log.borrow(), vec!["enter"]);
        d.pointer_moved(&root, Point2::new(10, 10));
        assert_eq!(*log.borrow(), vec!["enter", "exit"]);

        // Dropping inside the zone does not re-fire exit.
        d.pointer_moved(&root, Point2::new(60, 60));
        assert!(d.button_released(&root, MouseButton::Left));
        assert_eq!(*log.borrow(), vec!["enter", "exit", "enter"]);
    }

    #[test]
    fn test_cleanup_closure_detaches_handler() {
        let root = tree();
        let c = placed(&root, 0.0, 0.0, 20.0, 20.0, 1.0);
        let hits = Rc::new(Cell::new(0));
        let cleanup = {
            let hits = hits.clone();
            c.on_mouse_press(move |_, _| hits.set(hits.get() + 1))
        };

        let d = InputDispatcher::new();
        d.pointer_moved(&root, Point2::new(5, 5));
        d.button_pressed(&root, MouseButton::Left);
        d.button_released(&root, MouseButton::Left);
        cleanup();
        d.button_pressed(&root, MouseButton::Left);
        assert_eq!(hits.get(), 1);
    }
}
