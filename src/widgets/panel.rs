//! A solid-colored rectangle.

use std::rc::Rc;

use crate::component::{Component, Visual, WeakComponent};
use crate::raster::Raster;
use crate::reactive::Dynamic;
use crate::types::{BlitMode, Rgba};

struct PanelVisual {
    color: Dynamic<Rgba>,
}

impl Visual for PanelVisual {
    fn paint(&self, _component: &Component, target: &mut Raster) {
        target.fill(target.bounds(), self.color.peek(), BlitMode::Replace);
    }
}

/// A component filled with a reactive color.
pub struct Panel {
    component: Component,
    color: Dynamic<Rgba>,
}

impl Panel {
    pub fn new(color: Rgba) -> Self {
        let component = Component::new();
        let color = Dynamic::new(color);
        component.set_visual(Rc::new(PanelVisual {
            color: color.clone(),
        }));
        wire_repaint(&color, component.downgrade());
        Self { component, color }
    }

    pub fn component(&self) -> &Component {
        &self.component
    }

    pub fn color(&self) -> &Dynamic<Rgba> {
        &self.color
    }
}

/// Repaint the component whenever `cell` changes.
pub(crate) fn wire_repaint<T: Clone + PartialEq + 'static>(
    cell: &Dynamic<T>,
    component: WeakComponent,
) {
    cell.subscribe(move |_| {
        if let Some(c) = component.upgrade() {
            c.request_paint();
        }
    });
}
