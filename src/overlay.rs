// ============================================================================
// OVERLAY MODEL — sticker transforms and the paint-ordered overlay stack
// ============================================================================

use std::sync::Arc;

use image::RgbaImage;
use uuid::Uuid;

/// Smallest width an overlay can be resized to, in editor pixels.
pub const MIN_WIDTH: f32 = 30.0;

/// Width of a freshly added overlay, in editor pixels.
pub const DEFAULT_WIDTH: f32 = 100.0;

/// Top-left of the first overlay in a session.
pub const CASCADE_ORIGIN: f32 = 50.0;

/// Each additional overlay is offset this much from the previous one.
pub const CASCADE_STEP: f32 = 20.0;

// ---------------------------------------------------------------------------
//  Sticker source image
// ---------------------------------------------------------------------------

/// A decoded sticker image plus its natural aspect ratio.
///
/// The aspect ratio is fixed at decode time and drives the aspect lock on
/// every overlay created from this sticker.
#[derive(Clone, Debug)]
pub struct StickerImage {
    pub name: String,
    pub pixels: Arc<RgbaImage>,
}

impl StickerImage {
    pub fn new(name: impl Into<String>, pixels: RgbaImage) -> Self {
        Self {
            name: name.into(),
            pixels: Arc::new(pixels),
        }
    }

    /// Natural width / height. Degenerate images fall back to 1.0 so the
    /// aspect lock never divides by zero.
    pub fn aspect_ratio(&self) -> f32 {
        let w = self.pixels.width() as f32;
        let h = self.pixels.height() as f32;
        if h > 0.0 && w > 0.0 { w / h } else { 1.0 }
    }
}

// ---------------------------------------------------------------------------
//  Transform model
// ---------------------------------------------------------------------------

/// Placement of one overlay in editor-space.
///
/// Width is the only free size variable: height is always re-derived from the
/// sticker's natural aspect ratio, so `height == width / aspect` holds after
/// every mutation. Position is unbounded — an overlay may be dragged fully
/// outside the viewport. Rotation accumulates raw radians and is deliberately
/// never normalised into `[0, 2π)`: flip is applied inside the rotated frame
/// at render time, so the exact accumulated value matters.
#[derive(Clone, Debug)]
pub struct OverlayTransform {
    pub x: f32,
    pub y: f32,
    width: f32,
    height: f32,
    aspect: f32,
    pub rotation: f32,
    pub flipped: bool,
}

impl OverlayTransform {
    /// New transform at `(x, y)` with the default width; height derived.
    pub fn new(aspect: f32, x: f32, y: f32) -> Self {
        let aspect = if aspect.is_finite() && aspect > 0.0 { aspect } else { 1.0 };
        let mut t = Self {
            x,
            y,
            width: 0.0,
            height: 0.0,
            aspect,
            rotation: 0.0,
            flipped: false,
        };
        t.set_width(DEFAULT_WIDTH);
        t
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    /// Clamp to [`MIN_WIDTH`] and re-derive height. Inputs are sanitised,
    /// never rejected.
    pub fn set_width(&mut self, w: f32) {
        self.width = w.max(MIN_WIDTH);
        self.height = self.width / self.aspect;
    }

    pub fn set_position(&mut self, x: f32, y: f32) {
        self.x = x;
        self.y = y;
    }

    /// Raw radians, no wraparound.
    pub fn set_rotation(&mut self, theta: f32) {
        self.rotation = theta;
    }

    pub fn toggle_flip(&mut self) {
        self.flipped = !self.flipped;
    }

    /// Center of the overlay in editor-space.
    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width * 0.5, self.y + self.height * 0.5)
    }
}

// ---------------------------------------------------------------------------
//  Overlay stack (paint order = insertion order)
// ---------------------------------------------------------------------------

/// Opaque handle identifying one overlay for removal and controller binding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct OverlayId(Uuid);

impl OverlayId {
    fn fresh() -> Self {
        Self(Uuid::new_v4())
    }
}

/// One overlay entry: its transform plus the sticker it draws.
pub struct OverlayEntry {
    pub id: OverlayId,
    pub transform: OverlayTransform,
    pub sticker: Arc<StickerImage>,
}

/// Ordered set of overlays for one session. First inserted paints first
/// (bottom-most); a new overlay always lands on top.
#[derive(Default)]
pub struct OverlayStack {
    entries: Vec<OverlayEntry>,
}

impl OverlayStack {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Append a new overlay with the default cascading placement and return
    /// its handle.
    pub fn add(&mut self, sticker: Arc<StickerImage>) -> OverlayId {
        let offset = CASCADE_ORIGIN + self.entries.len() as f32 * CASCADE_STEP;
        let transform = OverlayTransform::new(sticker.aspect_ratio(), offset, offset);
        let id = OverlayId::fresh();
        self.entries.push(OverlayEntry {
            id,
            transform,
            sticker,
        });
        id
    }

    /// Remove by handle. Removing an absent handle is a no-op; the paint
    /// order of the remaining entries is untouched either way.
    pub fn remove(&mut self, id: OverlayId) {
        self.entries.retain(|e| e.id != id);
    }

    /// Entries in paint order, bottom to top.
    pub fn iter(&self) -> impl Iterator<Item = &OverlayEntry> {
        self.entries.iter()
    }

    pub fn get_mut(&mut self, id: OverlayId) -> Option<&mut OverlayEntry> {
        self.entries.iter_mut().find(|e| e.id == id)
    }

    pub fn get(&self, id: OverlayId) -> Option<&OverlayEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ids(&self) -> Vec<OverlayId> {
        self.entries.iter().map(|e| e.id).collect()
    }
}
