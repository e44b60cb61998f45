//! Ready-made components.
//!
//! Widgets are plain [`Component`](crate::component::Component)s bundled
//! with a visual strategy and the reactive cells that drive it. They add
//! no new machinery: everything here could be built from the public API.

mod button;
mod label;
mod panel;

pub use button::Button;
pub use label::Label;
pub use panel::Panel;
