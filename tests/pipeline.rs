//! End-to-end pipeline tests: reactive geometry through compositing and
//! input dispatch on a live root.

use std::cell::Cell;
use std::rc::Rc;

use ember_ui::root::Root;
use ember_ui::widgets::{Button, Panel};
use ember_ui::{Component, MouseButton, Point2, Raster, Rect, Rgba, Vec2};

fn place(c: &Component, x: f64, y: f64, w: f64, h: f64) {
    c.position().set(Vec2::new(x, y));
    c.size().set(Vec2::new(w, h));
}

#[test]
fn geometry_defaults_follow_surface_resize() {
    let root = Root::new(800, 600, 1).unwrap();
    let window = Component::new();
    root.component().add_child(&window).unwrap();
    // Untouched geometry mirrors the surface.
    assert_eq!(window.size().get(), Vec2::new(800.0, 600.0));
    assert_eq!(window.position().get(), Vec2::ZERO);

    root.resize(400, 300);
    assert_eq!(window.size().get(), Vec2::new(400.0, 300.0));
}

#[test]
fn degenerate_size_clamps_to_one_pixel() {
    let c = Component::new();
    c.size().set(Vec2::new(0.0, -5.0));
    assert_eq!(c.size().get(), Vec2::ONE);
}

#[test]
fn button_layout_derives_border_and_face() {
    let root = Root::new(800, 600, 1).unwrap();
    let button = Button::new("Go").unwrap();
    root.component().add_child(button.component()).unwrap();
    place(button.component(), 0.0, 0.0, 100.0, 40.0);

    assert_eq!(button.border().get(), Vec2::new(5.0, 2.0));

    // Render and check pixels: border color at the rim, face inside.
    let border_color = button.border_color().get();
    let mut frame = Raster::new(800, 600);
    root.render(&mut frame, 0);
    assert_eq!(frame.pixel(Point2::new(1, 1)), border_color);
    let center = frame.pixel(Point2::new(50, 20));
    assert_ne!(center, border_color);
    assert_ne!(center, Rgba::BLACK);
}

#[test]
fn repaints_are_scoped_to_damage() {
    let root = Root::new(100, 100, 1).unwrap();
    let left = Panel::new(Rgba::RED);
    root.component().add_child(left.component()).unwrap();
    place(left.component(), 0.0, 0.0, 10.0, 10.0);
    let right = Panel::new(Rgba::BLUE);
    root.component().add_child(right.component()).unwrap();
    place(right.component(), 80.0, 80.0, 10.0, 10.0);

    let mut frame = Raster::new(100, 100);
    root.render(&mut frame, 0);

    // Touch only the left panel; the right one's area must not repaint.
    left.color().set(Rgba::GREEN);
    let mut second = Raster::new(100, 100);
    let painted = root.render(&mut second, 0);
    assert!(!painted.is_empty());
    assert!(painted
        .iter()
        .all(|r| !r.overlaps(&Rect::from_xywh(80, 80, 10, 10))));
    assert_eq!(second.pixel(Point2::new(5, 5)), Rgba::GREEN);
    assert_eq!(second.pixel(Point2::new(85, 85)), Rgba::TRANSPARENT);
}

#[test]
fn swap_chain_buffers_catch_up_independently() {
    let root = Root::new(50, 50, 2).unwrap();
    let panel = Panel::new(Rgba::WHITE);
    root.component().add_child(panel.component()).unwrap();
    place(panel.component(), 10.0, 10.0, 10.0, 10.0);

    let mut a = Raster::new(50, 50);
    let mut b = Raster::new(50, 50);
    root.render(&mut a, 0);
    root.render(&mut b, 1);

    panel.color().set(Rgba::RED);
    // The change lands in both pending sets, each drained once.
    assert!(!root.render(&mut a, 0).is_empty());
    assert!(!root.render(&mut b, 1).is_empty());
    assert!(root.render(&mut a, 0).is_empty());
    assert_eq!(a.pixel(Point2::new(15, 15)), Rgba::RED);
    assert_eq!(b.pixel(Point2::new(15, 15)), Rgba::RED);
}

#[test]
fn opaque_overlay_consumes_clicks() {
    let root = Root::new(100, 100, 1).unwrap();
    let button = Button::new("Hit").unwrap();
    root.component().add_child(button.component()).unwrap();
    place(button.component(), 10.0, 10.0, 40.0, 20.0);

    let overlay = Panel::new(Rgba::new(0, 0, 0, 128));
    root.component().add_child(overlay.component()).unwrap();
    place(overlay.component(), 0.0, 0.0, 100.0, 100.0);
    overlay.component().z().set(50.0);

    let clicks = Rc::new(Cell::new(0));
    let _h = {
        let clicks = clicks.clone();
        button.on_click(move || clicks.set(clicks.get() + 1))
    };

    root.pointer_moved(Point2::new(20, 15));
    root.button_pressed(MouseButton::Left);
    root.button_released(MouseButton::Left);
    assert_eq!(clicks.get(), 0);

    // Drop the modal shield and the same gesture lands.
    overlay.component().visible().set(false);
    root.pointer_moved(Point2::new(21, 15));
    root.button_pressed(MouseButton::Left);
    root.button_released(MouseButton::Left);
    assert_eq!(clicks.get(), 1);
}

#[test]
fn press_release_pairing_survives_occlusion() {
    let root = Root::new(100, 100, 1).unwrap();
    let target = Component::new();
    root.component().add_child(&target).unwrap();
    place(&target, 0.0, 0.0, 30.0, 30.0);

    let presses = Rc::new(Cell::new(0));
    let releases = Rc::new(Cell::new(0));
    let _p = {
        let presses = presses.clone();
        target.on_mouse_press(move |_, _| presses.set(presses.get() + 1))
    };
    let _r = {
        let releases = releases.clone();
        target.on_mouse_release(move |_, _| releases.set(releases.get() + 1))
    };

    root.pointer_moved(Point2::new(5, 5));
    root.button_pressed(MouseButton::Left);

    // A popup appears over everything before the release.
    let popup = Panel::new(Rgba::GRAY);
    root.component().add_child(popup.component()).unwrap();
    place(popup.component(), 0.0, 0.0, 100.0, 100.0);
    popup.component().z().set(99.0);

    root.pointer_moved(Point2::new(60, 60));
    root.button_released(MouseButton::Left);
    assert_eq!(presses.get(), 1);
    assert_eq!(releases.get(), 1);
}

#[test]
fn reparenting_rederives_geometry_and_repaints() {
    let root = Root::new(100, 100, 1).unwrap();
    let left = Component::new();
    root.component().add_child(&left).unwrap();
    place(&left, 0.0, 0.0, 40.0, 100.0);
    let right = Component::new();
    root.component().add_child(&right).unwrap();
    place(&right, 60.0, 0.0, 40.0, 100.0);

    let badge = Panel::new(Rgba::RED);
    left.add_child(badge.component()).unwrap();
    assert_eq!(badge.component().position().get(), Vec2::ZERO);
    assert_eq!(badge.component().size().get(), Vec2::new(40.0, 100.0));

    let mut frame = Raster::new(100, 100);
    root.render(&mut frame, 0);
    assert_eq!(frame.pixel(Point2::new(5, 5)), Rgba::RED);
    assert_eq!(frame.pixel(Point2::new(65, 5)), Rgba::BLACK);

    right.add_child(badge.component()).unwrap();
    assert_eq!(badge.component().position().get(), Vec2::new(60.0, 0.0));
    root.render(&mut frame, 0);
    assert_eq!(frame.pixel(Point2::new(5, 5)), Rgba::BLACK);
    assert_eq!(frame.pixel(Point2::new(65, 5)), Rgba::RED);
}

#[test]
fn invisible_subtree_neither_renders_nor_receives_input() {
    let root = Root::new(100, 100, 1).unwrap();
    let group = Component::new();
    root.component().add_child(&group).unwrap();
    place(&group, 0.0, 0.0, 50.0, 50.0);
    let inner = Panel::new(Rgba::WHITE);
    group.add_child(inner.component()).unwrap();
    place(inner.component(), 10.0, 10.0, 10.0, 10.0);

    let presses = Rc::new(Cell::new(0));
    let _h = {
        let presses = presses.clone();
        inner.component().on_mouse_press(move |_, _| presses.set(presses.get() + 1))
    };

    group.visible().set(false);
    let mut frame = Raster::new(100, 100);
    root.render(&mut frame, 0);
    assert_eq!(frame.pixel(Point2::new(15, 15)), Rgba::BLACK);

    root.pointer_moved(Point2::new(15, 15));
    root.button_pressed(MouseButton::Left);
    assert_eq!(presses.get(), 0);
}
