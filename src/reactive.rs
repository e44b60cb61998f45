//! Reactive cells with automatic dependency tracking.
//!
//! A [`Dynamic<T>`] holds either a plain value or an expression. While an
//! expression evaluates, every cell it reads through [`Dynamic::get`] is
//! recorded as a dependency, so the graph rebuilds itself on each
//! evaluation with no explicit wiring. Updates are eager: assigning a new
//! value recomputes every reachable dependent exactly once, in dependency
//! order, so an expression never observes a stale input mid-pass.
//!
//! Cells are single-thread: handles are `Rc`-backed and the tracking stack
//! lives in a thread local. Dependents are held weakly, so dropping every
//! handle to a cell detaches it from the graph.

use std::cell::RefCell;
use std::collections::{HashSet, VecDeque};
use std::rc::{Rc, Weak};

use log::trace;

// =============================================================================
// Identity and the evaluation stack
// =============================================================================

type CellId = u64;

/// Opaque handle returned by [`Dynamic::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

thread_local! {
    static NEXT_ID: RefCell<u64> = const { RefCell::new(1) };
    static EVAL_STACK: RefCell<Vec<Frame>> = const { RefCell::new(Vec::new()) };
}

fn next_id() -> u64 {
    NEXT_ID.with(|n| {
        let mut n = n.borrow_mut();
        let id = *n;
        *n += 1;
        id
    })
}

/// One in-flight expression evaluation. Reads land in `reads`.
struct Frame {
    id: CellId,
    reads: Vec<Rc<dyn AnyCell>>,
}

/// Run `f` with a tracking frame for cell `id`, returning the result and
/// the cells it read.
fn run_tracked<T>(id: CellId, f: impl FnOnce() -> T) -> (T, Vec<Rc<dyn AnyCell>>) {
    EVAL_STACK.with(|s| s.borrow_mut().push(Frame { id, reads: Vec::new() }));
    let value = f();
    let frame = EVAL_STACK.with(|s| s.borrow_mut().pop());
    match frame {
        Some(frame) => (value, frame.reads),
        None => unreachable!("evaluation frame missing"),
    }
}

// =============================================================================
// Type-erased cell
// =============================================================================

/// The type-erased face of a cell, enough for graph edges and propagation.
trait AnyCell {
    fn cell_id(&self) -> CellId;
    /// Re-evaluate the stored expression, rewire dependencies, and store
    /// the result. Returns whether the value changed.
    fn recompute(&self) -> bool;
    /// Live dependents, pruning dead weak edges.
    fn dependents(&self) -> Vec<Rc<dyn AnyCell>>;
    /// Ids of the cells this cell currently reads.
    fn dep_ids(&self) -> Vec<CellId>;
    fn add_dependent(&self, dep: Weak<dyn AnyCell>);
    fn remove_dependent(&self, id: CellId);
}

struct Inner<T> {
    id: CellId,
    this: Weak<Inner<T>>,
    value: RefCell<T>,
    expr: RefCell<Option<Box<dyn Fn() -> T>>>,
    /// Cells this cell reads. Weak: the dep owns nothing about us.
    deps: RefCell<Vec<Weak<dyn AnyCell>>>,
    /// Cells that read this cell.
    dependents: RefCell<Vec<Weak<dyn AnyCell>>>,
    filters: RefCell<Vec<Rc<dyn Fn(T) -> T>>>,
    before_update: RefCell<Vec<Rc<dyn Fn(&T, &T)>>>,
    after_update: RefCell<Vec<Rc<dyn Fn(&T)>>>,
    subscribers: RefCell<Vec<(SubscriptionId, Rc<dyn Fn(&T)>)>>,
}

impl<T: Clone + PartialEq + 'static> Inner<T> {
    /// Pass `new` through the filter chain, then store it if it differs
    /// from the current value, firing hooks and subscribers. Returns
    /// whether the value changed.
    fn store(&self, mut new: T) -> bool {
        let filters: Vec<_> = self.filters.borrow().clone();
        for f in filters {
            new = f(new);
        }
        let old = self.value.borrow().clone();
        if new == old {
            return false;
        }
        let before: Vec<_> = self.before_update.borrow().clone();
        for h in before {
            h(&old, &new);
        }
        *self.value.borrow_mut() = new.clone();
        let after: Vec<_> = self.after_update.borrow().clone();
        for h in after {
            h(&new);
        }
        let subs: Vec<_> = self
            .subscribers
            .borrow()
            .iter()
            .map(|(_, f)| f.clone())
            .collect();
        for s in subs {
            s(&new);
        }
        true
    }

    /// Replace the dependency edges with `reads`, keeping both sides of
    /// the graph consistent.
    fn adopt_deps(&self, reads: Vec<Rc<dyn AnyCell>>) {
        for dep in self.deps.borrow_mut().drain(..) {
            if let Some(dep) = dep.upgrade() {
                dep.remove_dependent(self.id);
            }
        }
        let this: Weak<dyn AnyCell> = self.this.clone();
        let mut seen = HashSet::new();
        let mut deps = self.deps.borrow_mut();
        for dep in reads {
            if dep.cell_id() != self.id && seen.insert(dep.cell_id()) {
                dep.add_dependent(this.clone());
                deps.push(Rc::downgrade(&dep));
            }
        }
    }

    /// Drop the expression and every dependency edge, leaving a plain
    /// value cell.
    fn detach_expr(&self) {
        *self.expr.borrow_mut() = None;
        for dep in self.deps.borrow_mut().drain(..) {
            if let Some(dep) = dep.upgrade() {
                dep.remove_dependent(self.id);
            }
        }
    }
}

impl<T: Clone + PartialEq + 'static> AnyCell for Inner<T> {
    fn cell_id(&self) -> CellId {
        self.id
    }

    fn recompute(&self) -> bool {
        let Some(expr) = self.expr.borrow_mut().take() else {
            return false;
        };
        let (new, reads) = run_tracked(self.id, || expr());
        // The expression slot may have been reassigned by a hook fired
        // during evaluation; only restore when it is still empty.
        let mut slot = self.expr.borrow_mut();
        if slot.is_none() {
            *slot = Some(expr);
        }
        drop(slot);
        self.adopt_deps(reads);
        self.store(new)
    }

    fn dependents(&self) -> Vec<Rc<dyn AnyCell>> {
        let mut list = self.dependents.borrow_mut();
        list.retain(|w| w.strong_count() > 0);
        list.iter().filter_map(|w| w.upgrade()).collect()
    }

    fn dep_ids(&self) -> Vec<CellId> {
        self.deps
            .borrow()
            .iter()
            .filter_map(|w| w.upgrade())
            .map(|d| d.cell_id())
            .collect()
    }

    fn add_dependent(&self, dep: Weak<dyn AnyCell>) {
        self.dependents.borrow_mut().push(dep);
    }

    fn remove_dependent(&self, id: CellId) {
        self.dependents
            .borrow_mut()
            .retain(|w| w.upgrade().is_none_or(|d| d.cell_id() != id));
    }
}

impl<T> Drop for Inner<T> {
    fn drop(&mut self) {
        for dep in self.deps.borrow_mut().drain(..) {
            if let Some(dep) = dep.upgrade() {
                dep.remove_dependent(self.id);
            }
        }
    }
}

// =============================================================================
// Propagation
// =============================================================================

/// Push a change outward from `origin`: discover every reachable dependent
/// breadth-first, then recompute each exactly once in dependency order.
///
/// Panics if `origin` is reachable from its own dependents, or if the
/// ordering pass stalls; both mean a dependency cycle.
fn propagate(origin: &Rc<dyn AnyCell>) {
    let origin_id = origin.cell_id();
    let mut order: Vec<Rc<dyn AnyCell>> = Vec::new();
    let mut seen: HashSet<CellId> = HashSet::new();
    seen.insert(origin_id);
    let mut queue: VecDeque<Rc<dyn AnyCell>> = origin.dependents().into();
    while let Some(cell) = queue.pop_front() {
        if cell.cell_id() == origin_id {
            panic!("dependency cycle: cell {origin_id} is a dependent of itself");
        }
        if seen.insert(cell.cell_id()) {
            queue.extend(cell.dependents());
            order.push(cell);
        }
    }
    if order.is_empty() {
        return;
    }
    trace!("propagating from cell {origin_id}: {} dependents", order.len());

    let in_pass: HashSet<CellId> = order.iter().map(|c| c.cell_id()).collect();
    let mut done: HashSet<CellId> = HashSet::new();
    done.insert(origin_id);
    let mut remaining = order;
    while !remaining.is_empty() {
        let mut progressed = false;
        let mut deferred = Vec::new();
        for cell in remaining {
            let ready = cell
                .dep_ids()
                .iter()
                .all(|d| !in_pass.contains(d) || done.contains(d));
            if ready {
                done.insert(cell.cell_id());
                cell.recompute();
                progressed = true;
            } else {
                deferred.push(cell);
            }
        }
        if !progressed {
            panic!("dependency cycle detected while propagating from cell {origin_id}");
        }
        remaining = deferred;
    }
}

// =============================================================================
// Dynamic<T>
// =============================================================================

/// A reactive cell. Cloning the handle clones a reference to the same
/// cell; the cell itself lives until the last handle (and the last strong
/// graph reference) drops.
pub struct Dynamic<T>(Rc<Inner<T>>);

impl<T> Clone for Dynamic<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T: Clone + PartialEq + 'static> Dynamic<T> {
    /// A cell holding a plain value.
    pub fn new(value: T) -> Self {
        Self(Rc::new_cyclic(|this| Inner {
            id: next_id(),
            this: this.clone(),
            value: RefCell::new(value),
            expr: RefCell::new(None),
            deps: RefCell::new(Vec::new()),
            dependents: RefCell::new(Vec::new()),
            filters: RefCell::new(Vec::new()),
            before_update: RefCell::new(Vec::new()),
            after_update: RefCell::new(Vec::new()),
            subscribers: RefCell::new(Vec::new()),
        }))
    }

    /// A cell computed from an expression. The expression runs once
    /// immediately; the cells it reads become its dependencies.
    pub fn computed(expr: impl Fn() -> T + 'static) -> Self {
        let id = next_id();
        let (value, reads) = run_tracked(id, &expr);
        let inner = Rc::new_cyclic(|this| Inner {
            id,
            this: this.clone(),
            value: RefCell::new(value),
            expr: RefCell::new(Some(Box::new(expr) as Box<dyn Fn() -> T>)),
            deps: RefCell::new(Vec::new()),
            dependents: RefCell::new(Vec::new()),
            filters: RefCell::new(Vec::new()),
            before_update: RefCell::new(Vec::new()),
            after_update: RefCell::new(Vec::new()),
            subscribers: RefCell::new(Vec::new()),
        });
        inner.adopt_deps(reads);
        Self(inner)
    }

    /// Read the current value. Inside an evaluating expression this also
    /// records the cell as a dependency of the evaluator.
    ///
    /// Panics if called from this cell's own expression (direct or through
    /// a chain of nested evaluations): that is a dependency cycle.
    pub fn get(&self) -> T {
        let id = self.0.id;
        EVAL_STACK.with(|s| {
            let mut stack = s.borrow_mut();
            if stack.iter().any(|f| f.id == id) {
                panic!("dependency cycle: cell {id} read during its own evaluation");
            }
            if let Some(frame) = stack.last_mut() {
                frame.reads.push(self.0.clone() as Rc<dyn AnyCell>);
            }
        });
        self.0.value.borrow().clone()
    }

    /// Read the current value without recording a dependency.
    pub fn peek(&self) -> T {
        self.0.value.borrow().clone()
    }

    /// Assign a plain value. If the cell held an expression it is detached
    /// along with its dependencies. Filters apply first; an assignment
    /// that leaves the (filtered) value equal to the current one is
    /// suppressed entirely.
    pub fn set(&self, value: T) {
        self.0.detach_expr();
        if self.0.store(value) {
            let origin = self.0.clone() as Rc<dyn AnyCell>;
            propagate(&origin);
        }
    }

    /// Replace the expression. It is evaluated immediately, and the change
    /// propagates if the resulting (filtered) value differs.
    pub fn set_expr(&self, expr: impl Fn() -> T + 'static) {
        self.0.detach_expr();
        *self.0.expr.borrow_mut() = Some(Box::new(expr));
        if self.0.recompute() {
            let origin = self.0.clone() as Rc<dyn AnyCell>;
            propagate(&origin);
        }
    }

    /// Register a callback invoked after each change, with the new value.
    pub fn subscribe(&self, f: impl Fn(&T) + 'static) -> SubscriptionId {
        let id = SubscriptionId(next_id());
        self.0.subscribers.borrow_mut().push((id, Rc::new(f)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.0.subscribers.borrow_mut().retain(|(s, _)| *s != id);
    }

    /// Append a filter to the chain. The current value is passed through
    /// the full chain immediately, so an out-of-range value is corrected
    /// at registration, not on the next write.
    pub fn add_filter(&self, f: impl Fn(T) -> T + 'static) {
        self.0.filters.borrow_mut().push(Rc::new(f));
        let current = self.0.value.borrow().clone();
        if self.0.store(current) {
            let origin = self.0.clone() as Rc<dyn AnyCell>;
            propagate(&origin);
        }
    }

    /// Register a hook fired before the stored value is replaced, with
    /// `(old, new)`. Fires only when the value actually changes.
    pub fn before_update(&self, f: impl Fn(&T, &T) + 'static) {
        self.0.before_update.borrow_mut().push(Rc::new(f));
    }

    /// Register a hook fired right after the stored value is replaced,
    /// before subscribers run.
    pub fn after_update(&self, f: impl Fn(&T) + 'static) {
        self.0.after_update.borrow_mut().push(Rc::new(f));
    }

    /// Identity comparison: do two handles refer to the same cell?
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl<T: Clone + PartialEq + std::fmt::Debug + 'static> std::fmt::Debug for Dynamic<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dynamic")
            .field("id", &self.0.id)
            .field("value", &*self.0.value.borrow())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_plain_value_set_get() {
        let a = Dynamic::new(1);
        assert_eq!(a.get(), 1);
        a.set(5);
        assert_eq!(a.get(), 5);
    }

    #[test]
    fn test_computed_tracks_dependency() {
        let a = Dynamic::new(2);
        let b = {
            let a = a.clone();
            Dynamic::computed(move || a.get() * 10)
        };
        assert_eq!(b.get(), 20);
        a.set(3);
        assert_eq!(b.get(), 30);
    }

    #[test]
    fn test_chain_propagates_in_order() {
        let a = Dynamic::new(1);
        let b = {
            let a = a.clone();
            Dynamic::computed(move || a.get() + 1)
        };
        let c = {
            let b = b.clone();
            Dynamic::computed(move || b.get() + 1)
        };
        a.set(10);
        assert_eq!(b.get(), 11);
        assert_eq!(c.get(), 12);
    }

    #[test]
    fn test_diamond_recomputes_once() {
        let a = Dynamic::new(1);
        let b = {
            let a = a.clone();
            Dynamic::computed(move || a.get() + 1)
        };
        let c = {
            let a = a.clone();
            Dynamic::computed(move || a.get() * 2)
        };
        let evals = Rc::new(Cell::new(0));
        let d = {
            let (b, c, evals) = (b.clone(), c.clone(), evals.clone());
            Dynamic::computed(move || {
                evals.set(evals.get() + 1);
                b.get() + c.get()
            })
        };
        evals.set(0);
        a.set(5);
        // One recompute per pass, and it saw both updated inputs.
        assert_eq!(evals.get(), 1);
        assert_eq!(d.get(), 6 + 10);
    }

    #[test]
    fn test_equal_value_suppressed() {
        let a = Dynamic::new(7);
        let fired = Rc::new(Cell::new(0));
        {
            let fired = fired.clone();
            a.subscribe(move |_| fired.set(fired.get() + 1));
        }
        a.set(7);
        assert_eq!(fired.get(), 0);
        a.set(8);
        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn test_set_detaches_expression() {
        let a = Dynamic::new(1);
        let b = {
            let a = a.clone();
            Dynamic::computed(move || a.get() * 2)
        };
        b.set(100);
        a.set(50);
        // The expression is gone; b keeps its plain value.
        assert_eq!(b.get(), 100);
    }

    #[test]
    fn test_set_expr_rewires() {
        let a = Dynamic::new(1);
        let b = Dynamic::new(2);
        let c = {
            let a = a.clone();
            Dynamic::computed(move || a.get())
        };
        {
            let b = b.clone();
            c.set_expr(move || b.get() * 10);
        }
        assert_eq!(c.get(), 20);
        a.set(99);
        assert_eq!(c.get(), 20);
        b.set(3);
        assert_eq!(c.get(), 30);
    }

    #[test]
    fn test_conditional_dependency_switches() {
        let flag = Dynamic::new(true);
        let x = Dynamic::new(1);
        let y = Dynamic::new(100);
        let evals = Rc::new(Cell::new(0));
        let out = {
            let (flag, x, y, evals) = (flag.clone(), x.clone(), y.clone(), evals.clone());
            Dynamic::computed(move || {
                evals.set(evals.get() + 1);
                if flag.get() { x.get() } else { y.get() }
            })
        };
        assert_eq!(out.get(), 1);
        evals.set(0);
        // y was not read, so changing it must not recompute `out`.
        y.set(200);
        assert_eq!(evals.get(), 0);
        flag.set(false);
        assert_eq!(out.get(), 200);
        evals.set(0);
        // Dependencies swapped: now x is stale.
        x.set(42);
        assert_eq!(evals.get(), 0);
        y.set(300);
        assert_eq!(out.get(), 300);
    }

    #[test]
    fn test_filter_applies_and_refilters_current() {
        let a = Dynamic::new(5);
        a.add_filter(|v: i32| v.clamp(0, 10));
        a.set(50);
        assert_eq!(a.get(), 10);
        // Adding a tighter filter corrects the held value immediately.
        a.add_filter(|v: i32| v.min(8));
        assert_eq!(a.get(), 8);
    }

    #[test]
    fn test_filtered_assignment_can_suppress() {
        let a = Dynamic::new(10);
        a.add_filter(|v: i32| v.clamp(0, 10));
        let fired = Rc::new(Cell::new(0));
        {
            let fired = fired.clone();
            a.subscribe(move |_| fired.set(fired.get() + 1));
        }
        // Filters to 10, equal to current: fully suppressed.
        a.set(25);
        assert_eq!(fired.get(), 0);
        assert_eq!(a.get(), 10);
    }

    #[test]
    fn test_hooks_fire_in_order() {
        let log: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));
        let a = Dynamic::new(1);
        {
            let log = log.clone();
            a.before_update(move |old, new| log.borrow_mut().push(format!("before {old}->{new}")));
        }
        {
            let log = log.clone();
            a.after_update(move |v| log.borrow_mut().push(format!("after {v}")));
        }
        {
            let log = log.clone();
            a.subscribe(move |v| log.borrow_mut().push(format!("sub {v}")));
        }
        a.set(2);
        assert_eq!(
            *log.borrow(),
            vec!["before 1->2", "after 2", "sub 2"]
        );
    }

    #[test]
    fn test_unsubscribe() {
        let a = Dynamic::new(0);
        let fired = Rc::new(Cell::new(0));
        let sub = {
            let fired = fired.clone();
            a.subscribe(move |_| fired.set(fired.get() + 1))
        };
        a.set(1);
        a.unsubscribe(sub);
        a.set(2);
        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn test_dropped_dependent_detaches() {
        let a = Dynamic::new(1);
        let evals = Rc::new(Cell::new(0));
        {
            let (a2, evals) = (a.clone(), evals.clone());
            let _b = Dynamic::computed(move || {
                evals.set(evals.get() + 1);
                a2.get()
            });
        }
        evals.set(0);
        a.set(2);
        assert_eq!(evals.get(), 0);
    }

    #[test]
    #[should_panic(expected = "dependency cycle")]
    fn test_direct_self_read_panics() {
        let a = Dynamic::new(1);
        let a2 = a.clone();
        a.set_expr(move || a2.get() + 1);
    }

    #[test]
    #[should_panic(expected = "dependency cycle")]
    fn test_indirect_cycle_panics() {
        let a = Dynamic::new(1);
        let b = {
            let a = a.clone();
            Dynamic::computed(move || a.get() + 1)
        };
        let a2 = a.clone();
        a2.set_expr(move || b.get() + 1);
        a.set(10);
    }

    #[test]
    fn test_peek_does_not_track() {
        let a = Dynamic::new(1);
        let evals = Rc::new(Cell::new(0));
        let _b = {
            let (a2, evals) = (a.clone(), evals.clone());
            Dynamic::computed(move || {
                evals.set(evals.get() + 1);
                a2.peek()
            })
        };
        evals.set(0);
        a.set(2);
        assert_eq!(evals.get(), 0);
    }
}
