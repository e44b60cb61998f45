//! Pixel buffers.
//!
//! [`Raster`] is a flat row-major RGBA buffer with a clip stack. Everything
//! the toolkit draws, it draws into a `Raster`: components render into
//! private buffers, the renderer composites those into per-frame
//! composition buffers, and the platform layer presents the result.

use crate::types::{BlitMode, Point2, Rect, Rgba};

fn composite(mode: BlitMode, src: Rgba, dst: Rgba) -> Rgba {
    match mode {
        BlitMode::Replace => src,
        BlitMode::Mask if src.a == 0 => dst,
        BlitMode::Mask => src,
        BlitMode::Blend => Rgba::blend(src, dst),
    }
}

/// A row-major RGBA pixel buffer with clipped drawing operations.
///
/// All drawing respects the top of the clip stack; with an empty stack the
/// clip is the full buffer. Coordinates outside the buffer are silently
/// skipped.
#[derive(Debug, Clone)]
pub struct Raster {
    width: i32,
    height: i32,
    pixels: Vec<Rgba>,
    clip_stack: Vec<Rect>,
}

impl Raster {
    /// A transparent buffer of the given size. Degenerate sizes clamp to
    /// zero.
    pub fn new(width: i32, height: i32) -> Self {
        let width = width.max(0);
        let height = height.max(0);
        Self {
            width,
            height,
            pixels: vec![Rgba::TRANSPARENT; (width * height) as usize],
            clip_stack: Vec::new(),
        }
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn bounds(&self) -> Rect {
        Rect::from_xywh(0, 0, self.width, self.height)
    }

    /// Resize the buffer, discarding its contents.
    pub fn resize(&mut self, width: i32, height: i32) {
        let width = width.max(0);
        let height = height.max(0);
        self.width = width;
        self.height = height;
        self.pixels.clear();
        self.pixels
            .resize((width * height) as usize, Rgba::TRANSPARENT);
    }

    /// The active clip rect.
    pub fn clip(&self) -> Rect {
        self.clip_stack.last().copied().unwrap_or_else(|| self.bounds())
    }

    /// Push a clip rect, intersected with the active one.
    pub fn push_clip(&mut self, rect: Rect) {
        let next = self.clip().intersect(&rect);
        self.clip_stack.push(next);
    }

    /// Pop the most recent clip rect.
    ///
    /// Panics on an empty stack: a mismatched pop means the render pass
    /// corrupted its own bookkeeping.
    pub fn pop_clip(&mut self) {
        if self.clip_stack.pop().is_none() {
            panic!("clip stack underflow");
        }
    }

    pub fn pixel(&self, p: Point2) -> Rgba {
        if !self.bounds().contains(p) {
            return Rgba::TRANSPARENT;
        }
        self.pixels[(p.y * self.width + p.x) as usize]
    }

    pub fn set_pixel(&mut self, p: Point2, color: Rgba, mode: BlitMode) {
        if !self.clip().contains(p) || !self.bounds().contains(p) {
            return;
        }
        let idx = (p.y * self.width + p.x) as usize;
        self.pixels[idx] = composite(mode, color, self.pixels[idx]);
    }

    /// Fill a rect with a color.
    pub fn fill(&mut self, rect: Rect, color: Rgba, mode: BlitMode) {
        let area = rect.intersect(&self.clip()).intersect(&self.bounds());
        if area.is_empty() {
            return;
        }
        for y in area.min.y..area.max.y {
            let row = (y * self.width) as usize;
            for x in area.min.x..area.max.x {
                let idx = row + x as usize;
                self.pixels[idx] = composite(mode, color, self.pixels[idx]);
            }
        }
    }

    /// Clear the whole buffer to a color, ignoring the clip stack.
    pub fn clear(&mut self, color: Rgba) {
        self.pixels.fill(color);
    }

    /// Copy `src` onto this buffer with its top-left at `at`.
    pub fn blit(&mut self, src: &Raster, at: Point2, mode: BlitMode) {
        let dst_rect = src
            .bounds()
            .translate(at)
            .intersect(&self.clip())
            .intersect(&self.bounds());
        if dst_rect.is_empty() {
            return;
        }
        for y in dst_rect.min.y..dst_rect.max.y {
            let src_row = ((y - at.y) * src.width) as usize;
            let dst_row = (y * self.width) as usize;
            for x in dst_rect.min.x..dst_rect.max.x {
                let s = src.pixels[src_row + (x - at.x) as usize];
                let idx = dst_row + x as usize;
                self.pixels[idx] = composite(mode, s, self.pixels[idx]);
            }
        }
    }

    /// Copy only `src_rect` of `src`, placing it so that `src`'s origin
    /// would land at `at`. The renderer uses this to repaint a dirty
    /// region without touching surrounding pixels.
    pub fn blit_rect(&mut self, src: &Raster, at: Point2, src_rect: Rect, mode: BlitMode) {
        let src_rect = src_rect.intersect(&src.bounds());
        let dst_rect = src_rect
            .translate(at)
            .intersect(&self.clip())
            .intersect(&self.bounds());
        if dst_rect.is_empty() {
            return;
        }
        for y in dst_rect.min.y..dst_rect.max.y {
            let src_row = ((y - at.y) * src.width) as usize;
            let dst_row = (y * self.width) as usize;
            for x in dst_rect.min.x..dst_rect.max.x {
                let s = src.pixels[src_row + (x - at.x) as usize];
                let idx = dst_row + x as usize;
                self.pixels[idx] = composite(mode, s, self.pixels[idx]);
            }
        }
    }

    /// Composite an alpha coverage mask tinted with `color`. `mask` is
    /// row-major `mask_width` wide; rows are implied by length.
    pub fn blit_mask(&mut self, mask: &[u8], mask_width: i32, at: Point2, color: Rgba) {
        if mask_width <= 0 {
            return;
        }
        let mask_height = mask.len() as i32 / mask_width;
        let dst_rect = Rect::from_xywh(at.x, at.y, mask_width, mask_height)
            .intersect(&self.clip())
            .intersect(&self.bounds());
        if dst_rect.is_empty() {
            return;
        }
        for y in dst_rect.min.y..dst_rect.max.y {
            let mask_row = ((y - at.y) * mask_width) as usize;
            let dst_row = (y * self.width) as usize;
            for x in dst_rect.min.x..dst_rect.max.x {
                let coverage = mask[mask_row + (x - at.x) as usize];
                if coverage == 0 {
                    continue;
                }
                let idx = dst_row + x as usize;
                self.pixels[idx] = Rgba::blend(Rgba::cover(color, coverage), self.pixels[idx]);
            }
        }
    }
}
