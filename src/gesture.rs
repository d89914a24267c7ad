// ============================================================================
// GESTURE CONTROLLER — pointer gestures onto one overlay's transform
// ============================================================================
//
// One controller per overlay. A controller is a small state machine:
//
//   Idle → Dragging | Resizing | Rotating → Idle
//
// entered on pointer press, exited on release, with the grabbed corner (for
// resize) carried as transition data. Flip is a plain click, not a gesture —
// it takes effect immediately and is independent of any in-progress drag.
// Controllers on different overlays never interact: each one mutates only
// the transform it is handed.

use crate::overlay::{MIN_WIDTH, OverlayTransform};

/// The four corner resize handles.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Corner {
    Nw,
    Ne,
    Sw,
    Se,
}

impl Corner {
    pub fn all() -> [Corner; 4] {
        [Corner::Nw, Corner::Ne, Corner::Sw, Corner::Se]
    }

    /// Left-edge corners move the left edge during resize.
    fn is_west(self) -> bool {
        matches!(self, Corner::Nw | Corner::Sw)
    }

    /// Top-edge corners keep the bottom edge fixed during resize.
    fn is_north(self) -> bool {
        matches!(self, Corner::Nw | Corner::Ne)
    }
}

/// Current gesture, with the press-time snapshot it needs.
#[derive(Clone, Copy, Debug, Default)]
enum Gesture {
    #[default]
    Idle,
    /// Cursor-to-top-left offset recorded at press.
    Dragging { grab_dx: f32, grab_dy: f32 },
    Resizing {
        corner: Corner,
        press_x: f32,
        start_left: f32,
        start_top: f32,
        start_width: f32,
        start_height: f32,
    },
    Rotating {
        center_x: f32,
        center_y: f32,
        initial_angle: f32,
        start_mouse_angle: f32,
    },
}

/// Per-overlay gesture state machine.
#[derive(Default)]
pub struct OverlayController {
    gesture: Gesture,
}

impl OverlayController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.gesture, Gesture::Idle)
    }

    /// Press inside the overlay body (not on a handle).
    pub fn begin_drag(&mut self, t: &OverlayTransform, cursor: (f32, f32)) {
        self.gesture = Gesture::Dragging {
            grab_dx: cursor.0 - t.x,
            grab_dy: cursor.1 - t.y,
        };
    }

    /// Press on one of the four corner handles.
    pub fn begin_resize(&mut self, t: &OverlayTransform, corner: Corner, cursor: (f32, f32)) {
        self.gesture = Gesture::Resizing {
            corner,
            press_x: cursor.0,
            start_left: t.x,
            start_top: t.y,
            start_width: t.width(),
            start_height: t.height(),
        };
    }

    /// Press on the rotate handle. Captures the overlay center, its angle at
    /// press time, and the center-to-cursor angle, so rotation is relative
    /// and accumulates smoothly across gestures.
    pub fn begin_rotate(&mut self, t: &OverlayTransform, cursor: (f32, f32)) {
        let (cx, cy) = t.center();
        self.gesture = Gesture::Rotating {
            center_x: cx,
            center_y: cy,
            initial_angle: t.rotation,
            start_mouse_angle: (cursor.1 - cy).atan2(cursor.0 - cx),
        };
    }

    /// Pointer moved while pressed. No-op when idle.
    pub fn update(&mut self, t: &mut OverlayTransform, cursor: (f32, f32)) {
        match self.gesture {
            Gesture::Idle => {}
            Gesture::Dragging { grab_dx, grab_dy } => {
                // Unclamped: the overlay may leave the viewport entirely.
                t.set_position(cursor.0 - grab_dx, cursor.1 - grab_dy);
            }
            Gesture::Resizing {
                corner,
                press_x,
                start_left,
                start_top,
                start_width,
                start_height,
            } => {
                // Width-driven, aspect-locked: dy is ignored entirely.
                let dx = cursor.0 - press_x;
                let (new_width, new_left) = if corner.is_west() {
                    let w = (start_width - dx).max(MIN_WIDTH);
                    (w, start_left + (start_width - w))
                } else {
                    ((start_width + dx).max(MIN_WIDTH), start_left)
                };
                t.set_width(new_width);
                t.x = new_left;
                // Top handles keep the bottom edge fixed.
                t.y = if corner.is_north() {
                    start_top + (start_height - t.height())
                } else {
                    start_top
                };
            }
            Gesture::Rotating {
                center_x,
                center_y,
                initial_angle,
                start_mouse_angle,
            } => {
                let now = (cursor.1 - center_y).atan2(cursor.0 - center_x);
                t.set_rotation(initial_angle + (now - start_mouse_angle));
            }
        }
    }

    /// Pointer released — back to idle. Gestures have no timeout; this is
    /// the only way out.
    pub fn end(&mut self) {
        self.gesture = Gesture::Idle;
    }

    /// Click on the flip handle. Works regardless of gesture state.
    pub fn flip(&self, t: &mut OverlayTransform) {
        t.toggle_flip();
    }
}
