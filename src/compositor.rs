// ============================================================================
// COMPOSITOR — flatten base image + overlay stack at native resolution
// ============================================================================
//
// The editor displays everything in editor-space; the composite is rendered
// in surface-space, i.e. the base image's native pixel grid. Overlay
// placement is mapped between the two with the per-axis viewport scale, and
// each overlay is drawn by inverse mapping: for every surface pixel inside
// the overlay's rotated bounding box, un-rotate (and un-flip) into the
// overlay's local frame and bilinear-sample the sticker. Rows run in
// parallel with rayon.

use std::io::Cursor;

use image::RgbaImage;
use rayon::prelude::*;

use crate::error::{EditorError, Result};
use crate::overlay::{OverlayEntry, OverlayStack};

// ---------------------------------------------------------------------------
//  Viewport geometry
// ---------------------------------------------------------------------------

/// Displayed size of the editor surface. Never persisted — the session
/// recomputes it from the live UI at every export.
#[derive(Clone, Copy, Debug)]
pub struct Viewport {
    pub display_width: f32,
    pub display_height: f32,
}

impl Viewport {
    pub fn new(display_width: f32, display_height: f32) -> Self {
        Self {
            display_width,
            display_height,
        }
    }

    /// Editor surface that fits a base image inside a square box of
    /// `max_edge` display pixels, preserving aspect ratio: landscape images
    /// take the full width, portrait images the full height.
    pub fn fit(native_w: u32, native_h: u32, max_edge: f32) -> Self {
        let aspect = if native_h > 0 && native_w > 0 {
            native_w as f32 / native_h as f32
        } else {
            1.0
        };
        if aspect > 1.0 {
            Self::new(max_edge, max_edge / aspect)
        } else {
            Self::new(max_edge * aspect, max_edge)
        }
    }

    /// Per-axis editor→surface scale for a base image of the given native
    /// size.
    pub fn scale_to(&self, native_w: u32, native_h: u32) -> (f32, f32) {
        (
            native_w as f32 / self.display_width,
            native_h as f32 / self.display_height,
        )
    }
}

// ---------------------------------------------------------------------------
//  Render
// ---------------------------------------------------------------------------

/// Flatten `base` and every overlay into a fresh surface at the base image's
/// native resolution. Overlays paint bottom to top in stack order.
///
/// Fails with [`EditorError::ImageNotReady`] if the base image has no pixels
/// yet (zero natural dimensions) or the viewport has not been laid out.
pub fn render(base: &RgbaImage, viewport: Viewport, overlays: &OverlayStack) -> Result<RgbaImage> {
    if base.width() == 0 || base.height() == 0 {
        return Err(EditorError::ImageNotReady);
    }
    if viewport.display_width <= 0.0 || viewport.display_height <= 0.0 {
        return Err(EditorError::ImageNotReady);
    }

    // Step 1+2: the surface starts as the base image, drawn 1:1.
    let mut surface = base.clone();
    let (scale_x, scale_y) = viewport.scale_to(base.width(), base.height());

    for entry in overlays.iter() {
        draw_overlay(&mut surface, entry, scale_x, scale_y);
    }
    Ok(surface)
}

/// Encode a rendered surface as PNG bytes (the lossless export payload).
pub fn encode_png(surface: &RgbaImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    surface
        .write_to(&mut Cursor::new(&mut bytes), image::ImageOutputFormat::Png)
        .map_err(|e| EditorError::RenderFailed(e.to_string()))?;
    if bytes.is_empty() {
        return Err(EditorError::RenderFailed("encoder produced no bytes".into()));
    }
    Ok(bytes)
}

/// Draw one overlay into the surface.
///
/// Editor x/width scale by `scale_x` and y by `scale_y`; surface-space height
/// is re-derived from the sticker's own aspect ratio rather than scaled, so
/// rounding never compounds. Flip is applied inside the rotated frame: the
/// local x axis is mirrored after un-rotating, which makes a flipped+rotated
/// overlay look mirrored relative to its own orientation, not the canvas.
fn draw_overlay(surface: &mut RgbaImage, entry: &OverlayEntry, scale_x: f32, scale_y: f32) {
    let t = &entry.transform;
    let sticker = &*entry.sticker.pixels;
    let src_w = sticker.width() as i32;
    let src_h = sticker.height() as i32;
    if src_w == 0 || src_h == 0 {
        return;
    }

    let w = t.width() * scale_x;
    let h = w / entry.sticker.aspect_ratio();
    if w < 0.5 || h < 0.5 {
        return;
    }
    let cx = t.x * scale_x + w * 0.5;
    let cy = t.y * scale_y + h * 0.5;

    let (sin, cos) = t.rotation.sin_cos();
    let flipped = t.flipped;

    // Axis-aligned bounds of the rotated overlay, clamped to the surface.
    let half_bw = (w * cos.abs() + h * sin.abs()) * 0.5 + 1.0;
    let half_bh = (w * sin.abs() + h * cos.abs()) * 0.5 + 1.0;
    let out_w = surface.width() as i32;
    let out_h = surface.height() as i32;
    let x0 = ((cx - half_bw).floor() as i32).max(0);
    let y0 = ((cy - half_bh).floor() as i32).max(0);
    let x1 = ((cx + half_bw).ceil() as i32).min(out_w);
    let y1 = ((cy + half_bh).ceil() as i32).min(out_h);
    if x0 >= x1 || y0 >= y1 {
        return;
    }

    let half_w = w * 0.5;
    let half_h = h * 0.5;
    let src_raw = sticker.as_raw();
    let src_stride = src_w as usize * 4;
    let row_bytes = out_w as usize * 4;

    surface
        .as_mut()
        .par_chunks_mut(row_bytes)
        .enumerate()
        .skip(y0 as usize)
        .take((y1 - y0) as usize)
        .for_each(|(sy, row)| {
            let dy = sy as f32 + 0.5 - cy;
            for sx in x0..x1 {
                let dx = sx as f32 + 0.5 - cx;

                // Un-rotate into the overlay's local frame, then un-flip.
                let mut lx = cos * dx + sin * dy;
                let ly = -sin * dx + cos * dy;
                if flipped {
                    lx = -lx;
                }
                if lx < -half_w || lx > half_w || ly < -half_h || ly > half_h {
                    continue;
                }

                let u = (lx + half_w) / w * src_w as f32 - 0.5;
                let v = (ly + half_h) / h * src_h as f32 - 0.5;

                let ux0 = u.floor() as i32;
                let vy0 = v.floor() as i32;
                if ux0 < -1 || vy0 < -1 || ux0 >= src_w || vy0 >= src_h {
                    continue;
                }
                let fx = u - ux0 as f32;
                let fy = v - vy0 as f32;

                let sample = |px: i32, py: i32| -> [f32; 4] {
                    if px < 0 || py < 0 || px >= src_w || py >= src_h {
                        [0.0; 4]
                    } else {
                        let idx = py as usize * src_stride + px as usize * 4;
                        [
                            src_raw[idx] as f32,
                            src_raw[idx + 1] as f32,
                            src_raw[idx + 2] as f32,
                            src_raw[idx + 3] as f32,
                        ]
                    }
                };

                let tl = sample(ux0, vy0);
                let tr = sample(ux0 + 1, vy0);
                let bl = sample(ux0, vy0 + 1);
                let br = sample(ux0 + 1, vy0 + 1);

                let mut src_px = [0.0f32; 4];
                for c in 0..4 {
                    let top = tl[c] + (tr[c] - tl[c]) * fx;
                    let bot = bl[c] + (br[c] - bl[c]) * fx;
                    src_px[c] = top + (bot - top) * fy;
                }

                let sa = src_px[3] / 255.0;
                if sa <= 0.0 {
                    continue;
                }

                // Source-over blend into the surface row.
                let o = sx as usize * 4;
                let da = row[o + 3] as f32 / 255.0;
                let out_a = sa + da * (1.0 - sa);
                if out_a > 0.0 {
                    for c in 0..3 {
                        let dc = row[o + c] as f32;
                        let blended = (src_px[c] * sa + dc * da * (1.0 - sa)) / out_a;
                        row[o + c] = blended.round().clamp(0.0, 255.0) as u8;
                    }
                    row[o + 3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
                }
            }
        });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::StickerImage;
    use image::{Rgba, RgbaImage};
    use std::sync::Arc;

    fn solid(w: u32, h: u32, px: Rgba<u8>) -> RgbaImage {
        RgbaImage::from_pixel(w, h, px)
    }

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
    const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);
    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

    /// Sticker whose left half is red and right half is blue.
    fn half_and_half(w: u32, h: u32) -> Arc<StickerImage> {
        let mut img = solid(w, h, BLUE);
        for y in 0..h {
            for x in 0..w / 2 {
                img.put_pixel(x, y, RED);
            }
        }
        Arc::new(StickerImage::new("halves", img))
    }

    fn is_red(p: &Rgba<u8>) -> bool {
        p[0] > 200 && p[2] < 60 && p[3] > 128
    }

    fn is_blue(p: &Rgba<u8>) -> bool {
        p[2] > 200 && p[0] < 60 && p[3] > 128
    }

    #[test]
    fn test_viewport_fit_respects_orientation() {
        let landscape = Viewport::fit(1000, 500, 500.0);
        assert_eq!(landscape.display_width, 500.0);
        assert_eq!(landscape.display_height, 250.0);

        let portrait = Viewport::fit(400, 800, 500.0);
        assert_eq!(portrait.display_width, 250.0);
        assert_eq!(portrait.display_height, 500.0);

        let square = Viewport::fit(300, 300, 500.0);
        assert_eq!(square.display_width, 500.0);
        assert_eq!(square.display_height, 500.0);
    }

    #[test]
    fn test_zero_overlays_reproduces_base_exactly() {
        let base = solid(1000, 800, Rgba([17, 130, 201, 255]));
        let out = render(&base, Viewport::new(500.0, 400.0), &OverlayStack::new()).unwrap();
        assert_eq!(out.dimensions(), (1000, 800));
        assert_eq!(out.as_raw(), base.as_raw());
    }

    #[test]
    fn test_unloaded_base_fails_image_not_ready() {
        let base = RgbaImage::new(0, 0);
        let err = render(&base, Viewport::new(500.0, 400.0), &OverlayStack::new()).unwrap_err();
        assert!(matches!(err, EditorError::ImageNotReady));
    }

    #[test]
    fn test_unlaid_out_viewport_fails_image_not_ready() {
        let base = solid(100, 100, WHITE);
        let err = render(&base, Viewport::new(0.0, 0.0), &OverlayStack::new()).unwrap_err();
        assert!(matches!(err, EditorError::ImageNotReady));
    }

    /// Editor (50,50) size 100 in a 500x400 viewport over a 1000x800 base
    /// (scale 2 on both axes) must land centered at surface (200,200) with a
    /// drawn extent of about 200px.
    #[test]
    fn test_overlay_scales_into_surface_space() {
        let base = solid(1000, 800, WHITE);
        let sticker = Arc::new(StickerImage::new("red", solid(80, 80, RED)));
        let mut overlays = OverlayStack::new();
        let id = overlays.add(sticker); // cascade puts it at (50,50), width 100
        assert_eq!(overlays.get(id).unwrap().transform.width(), 100.0);

        let out = render(&base, Viewport::new(500.0, 400.0), &overlays).unwrap();

        let (mut min_x, mut min_y, mut max_x, mut max_y) = (i64::MAX, i64::MAX, i64::MIN, i64::MIN);
        for (x, y, p) in out.enumerate_pixels() {
            if is_red(p) {
                min_x = min_x.min(x as i64);
                min_y = min_y.min(y as i64);
                max_x = max_x.max(x as i64);
                max_y = max_y.max(y as i64);
            }
        }
        let center = ((min_x + max_x) as f64 / 2.0, (min_y + max_y) as f64 / 2.0);
        assert!((center.0 - 200.0).abs() <= 1.0, "center x = {}", center.0);
        assert!((center.1 - 200.0).abs() <= 1.0, "center y = {}", center.1);
        // The strict colour predicate excludes the antialiased rim, so allow
        // a few pixels of slack on the measured extent.
        let extent = ((max_x - min_x) as f64, (max_y - min_y) as f64);
        assert!((extent.0 - 200.0).abs() <= 4.0, "extent x = {}", extent.0);
        assert!((extent.1 - 200.0).abs() <= 4.0, "extent y = {}", extent.1);
    }

    #[test]
    fn test_flip_mirrors_horizontally() {
        let base = solid(400, 400, WHITE);
        let mut overlays = OverlayStack::new();
        let id = overlays.add(half_and_half(80, 80));
        {
            let t = &mut overlays.get_mut(id).unwrap().transform;
            t.set_position(150.0, 150.0);
            t.set_width(100.0);
        }
        let vp = Viewport::new(400.0, 400.0); // identity scale

        let out = render(&base, vp, &overlays).unwrap();
        assert!(is_red(out.get_pixel(170, 200)));
        assert!(is_blue(out.get_pixel(230, 200)));

        overlays.get_mut(id).unwrap().transform.toggle_flip();
        let out = render(&base, vp, &overlays).unwrap();
        assert!(is_blue(out.get_pixel(170, 200)));
        assert!(is_red(out.get_pixel(230, 200)));
    }

    #[test]
    fn test_half_turn_swaps_halves() {
        let base = solid(400, 400, WHITE);
        let mut overlays = OverlayStack::new();
        let id = overlays.add(half_and_half(80, 80));
        {
            let t = &mut overlays.get_mut(id).unwrap().transform;
            t.set_position(150.0, 150.0);
            t.set_width(100.0);
            t.set_rotation(std::f32::consts::PI);
        }
        let out = render(&base, Viewport::new(400.0, 400.0), &overlays).unwrap();
        assert!(is_blue(out.get_pixel(170, 200)));
        assert!(is_red(out.get_pixel(230, 200)));
    }

    /// Flip composes inside the rotated frame: mirroring then rotating a half
    /// turn puts the red half back on the canvas-left side.
    #[test]
    fn test_flip_applies_in_rotated_frame() {
        let base = solid(400, 400, WHITE);
        let mut overlays = OverlayStack::new();
        let id = overlays.add(half_and_half(80, 80));
        {
            let t = &mut overlays.get_mut(id).unwrap().transform;
            t.set_position(150.0, 150.0);
            t.set_width(100.0);
            t.set_rotation(std::f32::consts::PI);
            t.toggle_flip();
        }
        let out = render(&base, Viewport::new(400.0, 400.0), &overlays).unwrap();
        assert!(is_red(out.get_pixel(170, 200)));
        assert!(is_blue(out.get_pixel(230, 200)));
    }

    #[test]
    fn test_later_overlays_paint_on_top() {
        let base = solid(300, 300, WHITE);
        let mut overlays = OverlayStack::new();
        let a = overlays.add(Arc::new(StickerImage::new("red", solid(40, 40, RED))));
        let b = overlays.add(Arc::new(StickerImage::new("blue", solid(40, 40, BLUE))));
        // Stack both overlays on the same spot.
        for id in [a, b] {
            let t = &mut overlays.get_mut(id).unwrap().transform;
            t.set_position(100.0, 100.0);
            t.set_width(100.0);
        }
        let out = render(&base, Viewport::new(300.0, 300.0), &overlays).unwrap();
        assert!(is_blue(out.get_pixel(150, 150)));
    }

    #[test]
    fn test_offscreen_overlay_is_harmless() {
        let base = solid(200, 200, WHITE);
        let mut overlays = OverlayStack::new();
        let id = overlays.add(Arc::new(StickerImage::new("red", solid(40, 40, RED))));
        overlays
            .get_mut(id)
            .unwrap()
            .transform
            .set_position(-5000.0, -5000.0);
        let out = render(&base, Viewport::new(200.0, 200.0), &overlays).unwrap();
        assert_eq!(out.as_raw(), base.as_raw());
    }

    #[test]
    fn test_png_encode_produces_signature() {
        let surface = solid(8, 8, RED);
        let bytes = encode_png(&surface).unwrap();
        assert_eq!(&bytes[..8], &[0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n']);
    }
}
