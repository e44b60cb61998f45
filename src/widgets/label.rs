//! A single line of text.

use std::rc::Rc;

use crate::component::{Component, Visual};
use crate::glyph::{self, draw_text};
use crate::raster::Raster;
use crate::reactive::Dynamic;
use crate::types::{Point2, Rgba};
use crate::widgets::panel::wire_repaint;

struct LabelVisual {
    text: Dynamic<String>,
    color: Dynamic<Rgba>,
}

impl Visual for LabelVisual {
    fn paint(&self, _component: &Component, target: &mut Raster) {
        let text = self.text.peek();
        let chars = text.chars().count() as i32;
        if chars == 0 || target.bounds().is_empty() {
            return;
        }
        // Largest square glyph height that still fits the width, centered.
        let height = target.height().min(target.width() / chars).max(1);
        let extent = glyph::measure(&text, height);
        let at = Point2::new(
            (target.width() - extent.x) / 2,
            (target.height() - extent.y) / 2,
        );
        draw_text(target, &text, at, height, self.color.peek());
    }
}

/// A component whose visual renders its reactive text, centered.
pub struct Label {
    component: Component,
    text: Dynamic<String>,
    color: Dynamic<Rgba>,
}

impl Label {
    pub fn new(text: impl Into<String>) -> Self {
        let component = Component::new();
        let text = Dynamic::new(text.into());
        let color = Dynamic::new(Rgba::WHITE);
        component.set_visual(Rc::new(LabelVisual {
            text: text.clone(),
            color: color.clone(),
        }));
        // Text can't block clicks on whatever it sits on, and its glyph
        // pixels blend over it rather than stamping their rectangle.
        component.opaque().set(false);
        component.solid().set(false);
        wire_repaint(&text, component.downgrade());
        wire_repaint(&color, component.downgrade());
        Self {
            component,
            text,
            color,
        }
    }

    pub fn component(&self) -> &Component {
        &self.component
    }

    pub fn text(&self) -> &Dynamic<String> {
        &self.text
    }

    pub fn color(&self) -> &Dynamic<Rgba> {
        &self.color
    }
}
