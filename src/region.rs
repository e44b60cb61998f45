//! Dirty-region bookkeeping.
//!
//! A [`RegionSet`] accumulates damaged rectangles between frames. Rects
//! that overlap, contain each other, or butt up flush along a shared edge
//! are merged into their bounding rect, and merging cascades: a merge can
//! make the grown rect mergeable with rects that were previously disjoint,
//! so the set re-scans until it stabilizes. The renderer drains the set
//! with [`RegionSet::consume`], leaving it empty for the next frame.

use std::mem;

use crate::types::Rect;

/// A set of pairwise non-mergeable dirty rectangles.
#[derive(Debug, Default, Clone)]
pub struct RegionSet {
    regions: Vec<Rect>,
}

/// True when merging the two rects into their bounding box loses nothing:
/// they overlap, one contains the other, or they are adjacent along a
/// full shared edge.
fn mergeable(a: &Rect, b: &Rect) -> bool {
    if a.overlaps(b) || a.contains_rect(b) || b.contains_rect(a) {
        return true;
    }
    // Flush horizontal neighbors with identical vertical extent.
    if a.min.y == b.min.y && a.max.y == b.max.y && (a.max.x == b.min.x || b.max.x == a.min.x) {
        return true;
    }
    // Flush vertical neighbors with identical horizontal extent.
    a.min.x == b.min.x && a.max.x == b.max.x && (a.max.y == b.min.y || b.max.y == a.min.y)
}

impl RegionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rect> {
        self.regions.iter()
    }

    /// Add a damaged rect, merging until the set is stable again. Empty
    /// rects are ignored.
    pub fn add(&mut self, rect: Rect) {
        if rect.is_empty() {
            return;
        }
        let mut incoming = rect;
        // Each merge can unlock further merges, so re-scan with the grown
        // rect until nothing absorbs it.
        loop {
            match self.regions.iter().position(|r| mergeable(r, &incoming)) {
                Some(i) => {
                    let existing = self.regions.swap_remove(i);
                    incoming = existing.encompass(&incoming);
                }
                None => {
                    self.regions.push(incoming);
                    return;
                }
            }
        }
    }

    /// Absorb another set.
    pub fn add_all(&mut self, other: &RegionSet) {
        for r in &other.regions {
            self.add(*r);
        }
    }

    /// Take every accumulated rect, leaving the set empty.
    pub fn consume(&mut self) -> Vec<Rect> {
        mem::take(&mut self.regions)
    }

    pub fn clear(&mut self) {
        self.regions.clear();
    }

    /// True if any accumulated region touches `rect`.
    pub fn intersects(&self, rect: &Rect) -> bool {
        self.regions.iter().any(|r| r.overlaps(rect))
    }
}
