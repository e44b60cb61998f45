//! Time-driven animation of reactive cells.
//!
//! A [`SmoothAnimator`] owns a progress cell `mu` in `0..=1` (enforced by
//! a filter on the cell itself) and writes a cosine-eased interpolation
//! of its endpoints into the target cell whenever `mu` moves. The caller
//! advances `mu` from its frame loop with [`SmoothAnimator::tick`]; the
//! animated cell updates through the ordinary propagation path, so
//! geometry driven this way damages the screen exactly like a manual set.

use std::cell::{Cell, RefCell};
use std::f64::consts::PI;
use std::rc::Rc;

use crate::reactive::Dynamic;
use crate::types::{Rgba, Vec2};

/// Values an animator can move between.
pub trait Interpolate: Clone + PartialEq + 'static {
    fn lerp(from: &Self, to: &Self, t: f64) -> Self;
}

impl Interpolate for f64 {
    fn lerp(from: &Self, to: &Self, t: f64) -> Self {
        from + (to - from) * t
    }
}

impl Interpolate for Vec2 {
    fn lerp(from: &Self, to: &Self, t: f64) -> Self {
        *from + (*to - *from) * t
    }
}

impl Interpolate for Rgba {
    fn lerp(from: &Self, to: &Self, t: f64) -> Self {
        let ch = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
        Rgba::new(
            ch(from.r, to.r),
            ch(from.g, to.g),
            ch(from.b, to.b),
            ch(from.a, to.a),
        )
    }
}

/// Eased progress: slow in, slow out.
fn ease(mu: f64) -> f64 {
    (1.0 - (PI * mu).cos()) / 2.0
}

struct AnimatorInner<T> {
    cell: Dynamic<T>,
    from: RefCell<T>,
    to: RefCell<T>,
    mu: Dynamic<f64>,
    duration: Cell<f64>,
}

/// Drives one cell from its current value to a target over a duration.
pub struct SmoothAnimator<T: Interpolate> {
    inner: Rc<AnimatorInner<T>>,
}

impl<T: Interpolate> SmoothAnimator<T> {
    /// An animator for `cell`, initially idle. `duration` is in the same
    /// unit the caller passes to [`SmoothAnimator::tick`].
    pub fn new(cell: &Dynamic<T>, duration: f64) -> Self {
        let mu = Dynamic::new(1.0);
        mu.add_filter(|v: f64| v.clamp(0.0, 1.0));
        let initial = cell.peek();
        let inner = Rc::new(AnimatorInner {
            cell: cell.clone(),
            from: RefCell::new(initial.clone()),
            to: RefCell::new(initial),
            mu: mu.clone(),
            duration: Cell::new(duration.max(0.0)),
        });
        {
            let weak = Rc::downgrade(&inner);
            mu.subscribe(move |mu: &f64| {
                if let Some(inner) = weak.upgrade() {
                    let value = T::lerp(&inner.from.borrow(), &inner.to.borrow(), ease(*mu));
                    inner.cell.set(value);
                }
            });
        }
        Self { inner }
    }

    /// Begin animating from the cell's current value toward `to`. A zero
    /// duration jumps straight to the target.
    pub fn start(&self, to: T) {
        *self.inner.from.borrow_mut() = self.inner.cell.peek();
        *self.inner.to.borrow_mut() = to;
        if self.inner.duration.get() == 0.0 {
            self.inner.mu.set(0.0);
            self.inner.mu.set(1.0);
        } else {
            self.inner.mu.set(0.0);
        }
    }

    /// Advance by `dt`. No-op once the animation has completed.
    pub fn tick(&self, dt: f64) {
        if self.done() {
            return;
        }
        let step = dt / self.inner.duration.get();
        self.inner.mu.set(self.inner.mu.peek() + step);
    }

    pub fn done(&self) -> bool {
        self.inner.mu.peek() >= 1.0
    }

    pub fn set_duration(&self, duration: f64) {
        self.inner.duration.set(duration.max(0.0));
    }

    /// Current progress in `0..=1`.
    pub fn progress(&self) -> f64 {
        self.inner.mu.peek()
    }
}
