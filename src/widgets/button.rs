//! A clickable button: border frame, content face, centered caption.
//!
//! The button is three components. The outer frame paints the border
//! color; the content face is inset by a border that defaults to 5% of
//! the frame size and re-derives whenever the frame resizes; the caption
//! label fills the face. Face and caption sit a fractional z step above
//! the frame so they never interleave with sibling components on
//! neighboring integer layers.

use std::cell::RefCell;
use std::rc::Rc;

use crate::component::Component;
use crate::reactive::Dynamic;
use crate::types::{Cursor, MouseButton, Rect, Rgba, Vec2};
use crate::widgets::{Label, Panel};
use crate::Error;

/// Fractional z offset for the pieces stacked inside one button.
const LAYER_STEP: f64 = 0.001;

fn shade(c: Rgba, factor: f64) -> Rgba {
    let ch = |v: u8| ((v as f64 * factor).round() as u32).min(255) as u8;
    Rgba::new(ch(c.r), ch(c.g), ch(c.b), c.a)
}

type ClickList = Rc<RefCell<Vec<(u64, Rc<dyn Fn()>)>>>;

pub struct Button {
    frame: Panel,
    face: Panel,
    label: Label,
    border: Dynamic<Vec2>,
    color: Dynamic<Rgba>,
    hovered: Dynamic<bool>,
    pressed: Dynamic<bool>,
    clicks: ClickList,
    next_click_id: std::cell::Cell<u64>,
}

impl Button {
    pub fn new(caption: impl Into<String>) -> Result<Self, Error> {
        let frame = Panel::new(Rgba::rgb(40, 40, 40));
        frame.component().cursor().set(Cursor::Hand);

        let border = {
            let size = frame.component().size().clone();
            Dynamic::computed(move || size.get() * 0.05)
        };

        let color = Dynamic::new(Rgba::rgb(90, 90, 200));
        let hovered = Dynamic::new(false);
        let pressed = Dynamic::new(false);

        let face = Panel::new(color.peek());
        frame.component().add_child(face.component())?;
        face.component().opaque().set(false);
        {
            let (pos, b) = (frame.component().position().clone(), border.clone());
            face.component().position().set_expr(move || pos.get() + b.get());
        }
        {
            let (size, b) = (frame.component().size().clone(), border.clone());
            face.component().size().set_expr(move || size.get() - b.get() * 2.0);
        }
        {
            let z = frame.component().z().clone();
            face.component().z().set_expr(move || z.get() + LAYER_STEP);
        }
        {
            // The face clips its caption to its own rect.
            let clip = frame.component().clip().clone();
            let (pos, size) = (
                face.component().position().clone(),
                face.component().size().clone(),
            );
            face.component().clip().set_expr(move || {
                Rect::from_pos_size(pos.get(), size.get()).intersect(&clip.get())
            });
        }
        {
            let (base, hovered, pressed) = (color.clone(), hovered.clone(), pressed.clone());
            face.color().set_expr(move || {
                let c = base.get();
                if pressed.get() {
                    shade(c, 0.75)
                } else if hovered.get() {
                    shade(c, 1.25)
                } else {
                    c
                }
            });
        }

        let label = Label::new(caption);
        face.component().add_child(label.component())?;
        {
            let z = face.component().z().clone();
            label.component().z().set_expr(move || z.get() + LAYER_STEP);
        }

        let clicks: ClickList = Rc::new(RefCell::new(Vec::new()));
        {
            let hovered = hovered.clone();
            let _ = frame.component().on_mouse_enter(move |_, _| hovered.set(true));
        }
        {
            let hovered = hovered.clone();
            let _ = frame.component().on_mouse_exit(move |_, _| hovered.set(false));
        }
        {
            let pressed = pressed.clone();
            let _ = frame.component().on_mouse_press(move |_, e| {
                if e.button == Some(MouseButton::Left) {
                    pressed.set(true);
                }
            });
        }
        {
            let pressed = pressed.clone();
            let clicks = clicks.clone();
            let _ = frame.component().on_mouse_release(move |c, e| {
                if e.button != Some(MouseButton::Left) {
                    return;
                }
                let was = pressed.peek();
                pressed.set(false);
                // A click is a paired release that lands back on the button.
                if was && c.visible_rect().contains(e.pos) {
                    let fire: Vec<_> =
                        clicks.borrow().iter().map(|(_, f)| f.clone()).collect();
                    for f in fire {
                        f();
                    }
                }
            });
        }

        // Children attached via `component()` land on the face, inside
        // the border.
        frame.component().set_adopt_target(Some(face.component()));

        Ok(Self {
            frame,
            face,
            label,
            border,
            color,
            hovered,
            pressed,
            clicks,
            next_click_id: std::cell::Cell::new(0),
        })
    }

    /// The outer component; attach this to the tree.
    pub fn component(&self) -> &Component {
        self.frame.component()
    }

    /// Base face color. Hover and press shades derive from it.
    pub fn color(&self) -> &Dynamic<Rgba> {
        &self.color
    }

    pub fn border_color(&self) -> &Dynamic<Rgba> {
        self.frame.color()
    }

    /// Border thickness per axis. Defaults to 5% of the frame size.
    pub fn border(&self) -> &Dynamic<Vec2> {
        &self.border
    }

    pub fn caption(&self) -> &Dynamic<String> {
        self.label.text()
    }

    pub fn hovered(&self) -> &Dynamic<bool> {
        &self.hovered
    }

    pub fn pressed(&self) -> &Dynamic<bool> {
        &self.pressed
    }

    pub(crate) fn face(&self) -> &Panel {
        &self.face
    }

    /// Run `f` on every completed click. Returns a cleanup closure.
    pub fn on_click(&self, f: impl Fn() + 'static) -> impl FnOnce() {
        let id = self.next_click_id.get();
        self.next_click_id.set(id + 1);
        self.clicks.borrow_mut().push((id, Rc::new(f)));
        let clicks = Rc::downgrade(&self.clicks);
        move || {
            if let Some(clicks) = clicks.upgrade() {
                clicks.borrow_mut().retain(|(i, _)| *i != id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::InputDispatcher;
    use crate::types::Point2;
    use std::cell::Cell;

    fn scaffold() -> (Component, Button) {
        let tree = Component::new();
        tree.position().set(Vec2::ZERO);
        tree.size().set(Vec2::new(200.0, 100.0));
        tree.z().set(0.0);
        tree.opaque().set(false);
        let button = Button::new("Ok").unwrap();
        tree.add_child(button.component()).unwrap();
        button.component().position().set(Vec2::new(0.0, 0.0));
        button.component().size().set(Vec2::new(100.0, 40.0));
        (tree, button)
    }

    #[test]
    fn test_border_and_face_derive_from_size() {
        let (_tree, button) = scaffold();
        assert_eq!(button.border().get(), Vec2::new(5.0, 2.0));
        assert_eq!(button.face().component().position().get(), Vec2::new(5.0, 2.0));
        assert_eq!(button.face().component().size().get(), Vec2::new(90.0, 36.0));

        button.component().size().set(Vec2::new(40.0, 20.0));
        assert_eq!(button.border().get(), Vec2::new(2.0, 1.0));
        assert_eq!(button.face().component().size().get(), Vec2::new(36.0, 18.0));
    }

    #[test]
    fn test_face_and_caption_use_fractional_layers() {
        let (_tree, button) = scaffold();
        let z = button.component().z().get();
        assert_eq!(button.face().component().z().get(), z + LAYER_STEP);
        let label_z = button.face().component().z().get() + LAYER_STEP;
        let children = button.face().component().children();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].z().get(), label_z);
    }

    #[test]
    fn test_click_fires_on_paired_release_inside() {
        let (tree, button) = scaffold();
        let clicked = Rc::new(Cell::new(0));
        let _h = {
            let clicked = clicked.clone();
            button.on_click(move || clicked.set(clicked.get() + 1))
        };

        let d = InputDispatcher::new();
        d.pointer_moved(&tree, Point2::new(50, 20));
        d.button_pressed(&tree, MouseButton::Left);
        assert!(button.pressed().get());
        d.button_released(&tree, MouseButton::Left);
        assert_eq!(clicked.get(), 1);
        assert!(!button.pressed().get());
    }

    #[test]
    fn test_release_outside_cancels_click() {
        let (tree, button) = scaffold();
        let clicked = Rc::new(Cell::new(0));
        let _h = {
            let clicked = clicked.clone();
            button.on_click(move || clicked.set(clicked.get() + 1))
        };

        let d = InputDispatcher::new();
        d.pointer_moved(&tree, Point2::new(50, 20));
        d.button_pressed(&tree, MouseButton::Left);
        d.pointer_moved(&tree, Point2::new(150, 90));
        d.button_released(&tree, MouseButton::Left);
        assert_eq!(clicked.get(), 0);
        // The paired release still reset the pressed state.
        assert!(!button.pressed().get());
    }

    #[test]
    fn test_hover_and_press_shade_the_face() {
        let (tree, button) = scaffold();
        let base = button.color().get();

        let d = InputDispatcher::new();
        d.pointer_moved(&tree, Point2::new(50, 20));
        assert!(button.hovered().get());
        let hover_color = button.face().color().get();
        assert!(hover_color.r > base.r);

        d.button_pressed(&tree, MouseButton::Left);
        let pressed_color = button.face().color().get();
        assert!(pressed_color.r < base.r);

        d.button_released(&tree, MouseButton::Left);
        d.pointer_moved(&tree, Point2::new(150, 90));
        assert!(!button.hovered().get());
        assert_eq!(button.face().color().get(), base);
    }

    #[test]
    fn test_children_attach_to_the_face() {
        let (_tree, button) = scaffold();
        let badge = Component::new();
        button.component().add_child(&badge).unwrap();
        assert!(badge.parent().get().component().ptr_eq(button.face().component()));
        assert!(button
            .face()
            .component()
            .children()
            .iter()
            .any(|c| c.ptr_eq(&badge)));
    }

    #[test]
    fn test_base_color_change_flows_to_face() {
        let (_tree, button) = scaffold();
        button.color().set(Rgba::rgb(10, 200, 10));
        assert_eq!(button.face().color().get(), Rgba::rgb(10, 200, 10));
    }
}
