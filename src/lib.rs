//! ember-ui: a retained-mode GUI component toolkit.
//!
//! Three layers, each usable on its own:
//!
//! - **Reactive cells** ([`reactive::Dynamic`]): values or expressions
//!   with automatic dependency tracking. Updates are eager and
//!   glitch-free: each reachable dependent recomputes exactly once per
//!   change, in dependency order.
//! - **Component tree** ([`component::Component`]): rectangles whose
//!   geometry defaults are expressions over their (reactive) parent, so
//!   reparenting re-derives position, size, z and clip automatically.
//!   Painting is strategy-based via [`component::Visual`].
//! - **Root** ([`root::Root`]): dirty-region compositing into one or more
//!   swapped frame buffers, plus z-ordered consumable input dispatch
//!   ([`input::InputDispatcher`]).
//!
//! Everything is single-threaded: handles are `Rc`-backed and state lives
//! on the thread that built the tree. The platform layer feeds input in
//! and presents [`raster::Raster`] buffers out; this crate does neither.
//!
//! ```
//! use ember_ui::root::Root;
//! use ember_ui::raster::Raster;
//! use ember_ui::types::{Rgba, Vec2};
//! use ember_ui::widgets::Button;
//!
//! let root = Root::new(320, 200, 2).unwrap();
//! let button = Button::new("Start").unwrap();
//! root.component().add_child(button.component()).unwrap();
//! button.component().position().set(Vec2::new(110.0, 80.0));
//! button.component().size().set(Vec2::new(100.0, 40.0));
//!
//! let mut frame = Raster::new(320, 200);
//! let repainted = root.render(&mut frame, 0);
//! assert!(!repainted.is_empty());
//! ```

use thiserror::Error as ThisError;

pub mod animate;
pub mod component;
pub mod glyph;
pub mod input;
pub mod raster;
pub mod reactive;
pub mod region;
pub mod root;
pub mod types;
pub mod widgets;

pub use component::{Component, ParentRef, Visual, WeakComponent};
pub use raster::Raster;
pub use reactive::{Dynamic, SubscriptionId};
pub use region::RegionSet;
pub use root::{Root, RootRef};
pub use types::{BlitMode, Cursor, Key, MouseButton, Point2, Rect, Rgba, Vec2};

/// Errors from fallible toolkit operations. Contract violations that
/// leave state unrecoverable (dependency cycles, frame-buffer bookkeeping
/// corruption) panic instead.
#[derive(Debug, ThisError)]
pub enum Error {
    /// Attaching a component under its own descendant.
    #[error("component cannot be reparented under its own descendant")]
    TreeCycle,
    /// A second drag was started before the first one finished.
    #[error("a drag is already in progress")]
    DragInProgress,
    /// A root needs at least one frame buffer to render into.
    #[error("root requires at least one frame buffer")]
    NoBuffers,
}
