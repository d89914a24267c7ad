// ============================================================================
// EDITOR UI — egui projection of the session model + pointer routing
// ============================================================================
//
// The UI never owns transform state: it projects the session's overlay
// transforms into screen shapes each frame and feeds pointer events into the
// per-overlay gesture controllers. Handles sit on the unrotated bounding box
// (only the sticker pixels rotate), so hit testing and resize math stay
// axis-aligned.

use std::collections::HashMap;

use eframe::egui;
use egui::{
    Align2, CentralPanel, Color32, ColorImage, Context, FontId, Pos2, Rect, Sense, Shape, Stroke,
    TextureHandle, TextureOptions, TopBottomPanel, pos2, vec2,
};

use crate::assets::{ALT_STICKER, DEFAULT_STICKER, EmbeddedAssets, StickerAssets};
use crate::compositor::Viewport;
use crate::gesture::Corner;
use crate::io::{self, SourceRef, SystemClipboard};
use crate::log_err;
use crate::overlay::OverlayId;
use crate::session::{ExportAction, SessionController};

/// Longest display edge of the editing surface.
const DISPLAY_EDGE: f32 = 500.0;

/// Hit radius of the round handles, in display pixels.
const HANDLE_RADIUS: f32 = 7.0;

/// Distance of the flip/rotate handles from the overlay's top/bottom edge.
const HANDLE_STALK: f32 = 22.0;

const HANDLE_FILL: Color32 = Color32::from_rgb(0xff, 0xd1, 0x66);
const STALK_FILL: Color32 = Color32::from_rgb(0xff, 0xa6, 0x00);

/// Deferred UI actions, applied after the frame's borrows are released.
enum UiAction {
    OpenFile,
    PasteBase,
    AddSticker(&'static str),
    RemoveOverlay(OverlayId),
    ToggleFlip(OverlayId),
    Export(ExportAction, Viewport),
    CloseSession,
}

/// Per-overlay snapshot taken once per frame so painting and hit testing
/// never hold a session borrow.
struct OverlayDraw {
    id: OverlayId,
    sticker_name: String,
    rect: Rect,
    rotation: f32,
    flipped: bool,
}

pub struct StickerApp {
    controller: SessionController,
    assets: EmbeddedAssets,
    /// Base texture cache, keyed by session id so a new session re-uploads.
    base_texture: Option<(uuid::Uuid, TextureHandle)>,
    /// Sticker textures by logical asset name.
    sticker_textures: HashMap<String, TextureHandle>,
    /// Overlay currently owning the pointer, if any.
    active_gesture: Option<OverlayId>,
    status: String,
}

impl StickerApp {
    pub fn new(_cc: &eframe::CreationContext<'_>) -> Self {
        Self {
            controller: SessionController::new(),
            assets: EmbeddedAssets,
            base_texture: None,
            sticker_textures: HashMap::new(),
            active_gesture: None,
            status: "Open an image to start.".to_string(),
        }
    }

    fn sticker_texture(&mut self, ctx: &Context, name: &str) -> Option<TextureHandle> {
        if let Some(tex) = self.sticker_textures.get(name) {
            return Some(tex.clone());
        }
        let sticker = self.assets.resolve(name).ok()?;
        let img = &*sticker.pixels;
        let color = ColorImage::from_rgba_unmultiplied(
            [img.width() as usize, img.height() as usize],
            img.as_raw(),
        );
        let tex = ctx.load_texture(format!("sticker-{}", name), color, TextureOptions::LINEAR);
        self.sticker_textures.insert(name.to_string(), tex.clone());
        Some(tex)
    }

    fn apply(&mut self, action: UiAction) {
        match action {
            UiAction::OpenFile => {
                let picked = rfd::FileDialog::new()
                    .add_filter("Images", &["png", "jpg", "jpeg", "webp", "bmp"])
                    .pick_file();
                if let Some(path) = picked {
                    match self.controller.open(SourceRef::Path(path), &self.assets) {
                        Ok(_) => self.status = "Loading image…".to_string(),
                        Err(e) => self.status = e.to_string(),
                    }
                }
            }
            UiAction::PasteBase => match io::image_from_system_clipboard() {
                Some(img) => match self.controller.open_with_image(img, &self.assets) {
                    Ok(_) => self.status = "Pasted image from clipboard.".to_string(),
                    Err(e) => self.status = e.to_string(),
                },
                None => self.status = "No image found on the clipboard.".to_string(),
            },
            UiAction::AddSticker(name) => {
                if let Err(e) = self.controller.add_overlay(name, &self.assets) {
                    log_err!("add overlay: {}", e);
                    self.status = e.to_string();
                }
            }
            UiAction::RemoveOverlay(id) => {
                self.controller.remove_overlay(id);
                if self.active_gesture == Some(id) {
                    self.active_gesture = None;
                }
            }
            UiAction::ToggleFlip(id) => {
                if let Some(session) = self.controller.session_mut()
                    && let Some(entry) = session.overlays.get_mut(id)
                {
                    entry.transform.toggle_flip();
                }
            }
            UiAction::Export(export_action, viewport) => {
                let result = match export_action {
                    ExportAction::Copy => self.controller.export(
                        ExportAction::Copy,
                        viewport,
                        &mut SystemClipboard,
                        None,
                    ),
                    ExportAction::Insert => {
                        let Some(path) = rfd::FileDialog::new()
                            .add_filter("PNG image", &["png"])
                            .set_file_name("composite.png")
                            .save_file()
                        else {
                            return;
                        };
                        let mut sink = io::FileSink { path };
                        self.controller.export(
                            ExportAction::Insert,
                            viewport,
                            &mut SystemClipboard,
                            Some(&mut sink),
                        )
                    }
                };
                match result {
                    Ok(()) => {
                        self.status = match export_action {
                            ExportAction::Copy => "Copied to clipboard.".to_string(),
                            ExportAction::Insert => "Saved composite.".to_string(),
                        };
                        self.base_texture = None;
                        self.active_gesture = None;
                    }
                    // Session stays open; the message invites a retry.
                    Err(e) => self.status = e.to_string(),
                }
            }
            UiAction::CloseSession => {
                self.controller.close();
                self.base_texture = None;
                self.active_gesture = None;
                self.status = "Session closed.".to_string();
            }
        }
    }
}

impl eframe::App for StickerApp {
    fn update(&mut self, ctx: &Context, _frame: &mut eframe::Frame) {
        let mut pending: Vec<UiAction> = Vec::new();

        if let Some(session) = self.controller.session_mut() {
            session.poll_base();
            if let Some(msg) = session.base_error() {
                self.status = format!("Could not load image: {}", msg);
            }
        }

        TopBottomPanel::top("toolbar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if ui.button("Open Image…").clicked() {
                    pending.push(UiAction::OpenFile);
                }
                if ui.button("Paste Image").clicked() {
                    pending.push(UiAction::PasteBase);
                }
                ui.separator();

                let has_session = self.controller.session().is_some();
                ui.add_enabled_ui(has_session, |ui| {
                    if ui.button("Add Sticker").clicked() {
                        pending.push(UiAction::AddSticker(DEFAULT_STICKER));
                    }
                    if ui.button("Add Leg").clicked() {
                        pending.push(UiAction::AddSticker(ALT_STICKER));
                    }
                    ui.separator();
                    if ui.button("Close").clicked() {
                        pending.push(UiAction::CloseSession);
                    }
                });
            });
        });

        TopBottomPanel::bottom("status").show(ctx, |ui| {
            ui.label(&self.status);
        });

        CentralPanel::default().show(ctx, |ui| {
            if self.controller.session().is_none() {
                ui.centered_and_justified(|ui| {
                    ui.label("No image. Use Open Image… or Paste Image.");
                });
                return;
            }

            // Snapshot what the painter needs, then drop the session borrow
            // so texture caching below can take `&mut self`.
            let Some((session_id, base)) = self
                .controller
                .session()
                .and_then(|s| s.base_image().cloned().map(|base| (s.id, base)))
            else {
                ui.centered_and_justified(|ui| {
                    ui.spinner();
                });
                ctx.request_repaint();
                return;
            };

            let viewport = Viewport::fit(base.width(), base.height(), DISPLAY_EDGE);
            let size = vec2(viewport.display_width, viewport.display_height);
            let (surface_rect, _response) = ui.allocate_exact_size(size, Sense::click_and_drag());
            let origin = surface_rect.min;

            let draws: Vec<OverlayDraw> = self
                .controller
                .session()
                .map(|session| {
                    session
                        .overlays
                        .iter()
                        .map(|entry| {
                            let t = &entry.transform;
                            OverlayDraw {
                                id: entry.id,
                                sticker_name: entry.sticker.name.clone(),
                                rect: Rect::from_min_size(
                                    pos2(origin.x + t.x, origin.y + t.y),
                                    vec2(t.width(), t.height()),
                                ),
                                rotation: t.rotation,
                                flipped: t.flipped,
                            }
                        })
                        .collect()
                })
                .unwrap_or_default();

            // Upload the base texture once per session.
            let needs_upload = !matches!(&self.base_texture, Some((id, _)) if *id == session_id);
            if needs_upload {
                let color = ColorImage::from_rgba_unmultiplied(
                    [base.width() as usize, base.height() as usize],
                    base.as_raw(),
                );
                let tex = ctx.load_texture("base-image", color, TextureOptions::LINEAR);
                self.base_texture = Some((session_id, tex));
            }

            let painter = ui.painter_at(ui.max_rect());
            if let Some((_, tex)) = &self.base_texture {
                let mut mesh = egui::Mesh::with_texture(tex.id());
                mesh.add_rect_with_uv(
                    surface_rect,
                    Rect::from_min_max(pos2(0.0, 0.0), pos2(1.0, 1.0)),
                    Color32::WHITE,
                );
                painter.add(Shape::mesh(mesh));
            }

            // Overlays paint bottom to top. A horizontal flip is a swapped
            // U coordinate inside the already-rotated quad.
            let mut handle_sets: Vec<(OverlayId, HandleSet)> = Vec::new();
            for draw in &draws {
                if let Some(tex) = self.sticker_texture(ctx, &draw.sticker_name) {
                    let uv = if draw.flipped {
                        Rect::from_min_max(pos2(1.0, 0.0), pos2(0.0, 1.0))
                    } else {
                        Rect::from_min_max(pos2(0.0, 0.0), pos2(1.0, 1.0))
                    };
                    let mut mesh = egui::Mesh::with_texture(tex.id());
                    mesh.add_rect_with_uv(draw.rect, uv, Color32::WHITE);
                    mesh.rotate(
                        egui::emath::Rot2::from_angle(draw.rotation),
                        draw.rect.center(),
                    );
                    painter.add(Shape::mesh(mesh));
                }
                handle_sets.push((draw.id, HandleSet::for_rect(draw.rect)));
            }
            for (_, handles) in &handle_sets {
                handles.paint(&painter);
            }

            ui.add_space(6.0);
            ui.horizontal(|ui| {
                if ui.button("Copy").clicked() {
                    pending.push(UiAction::Export(ExportAction::Copy, viewport));
                }
                if ui.button("Save As…").clicked() {
                    pending.push(UiAction::Export(ExportAction::Insert, viewport));
                }
            });

            // ---- pointer routing ----------------------------------------
            let (pressed, released, pointer) = ctx.input(|i| {
                (
                    i.pointer.primary_pressed(),
                    i.pointer.primary_released(),
                    i.pointer.interact_pos(),
                )
            });
            let Some(pointer) = pointer else { return };
            let cursor = (pointer.x - origin.x, pointer.y - origin.y);

            if pressed && self.active_gesture.is_none() {
                // Topmost overlay wins the press.
                for (id, handles) in handle_sets.iter().rev() {
                    let Some(hit) = handles.hit(pointer) else {
                        continue;
                    };
                    match hit {
                        HandleHit::Flip => pending.push(UiAction::ToggleFlip(*id)),
                        HandleHit::Remove => pending.push(UiAction::RemoveOverlay(*id)),
                        HandleHit::Rotate | HandleHit::Resize(_) | HandleHit::Body => {
                            if let Some(session) = self.controller.session_mut() {
                                let transform =
                                    session.overlays.get(*id).map(|e| e.transform.clone());
                                if let Some(t) = transform
                                    && let Some(c) = session.controller_mut(*id)
                                {
                                    match hit {
                                        HandleHit::Rotate => c.begin_rotate(&t, cursor),
                                        HandleHit::Resize(corner) => {
                                            c.begin_resize(&t, corner, cursor)
                                        }
                                        _ => c.begin_drag(&t, cursor),
                                    }
                                    self.active_gesture = Some(*id);
                                }
                            }
                        }
                    }
                    break;
                }
            }

            if let Some(id) = self.active_gesture
                && let Some(session) = self.controller.session_mut()
            {
                session.update_gesture(id, cursor);
                if released {
                    session.end_gesture(id);
                    self.active_gesture = None;
                }
                ctx.request_repaint();
            }
        });

        for action in pending {
            self.apply(action);
        }
    }
}

// ---------------------------------------------------------------------------
//  Handle geometry
// ---------------------------------------------------------------------------

enum HandleHit {
    Resize(Corner),
    Rotate,
    Flip,
    Remove,
    Body,
}

/// Screen positions of one overlay's handles, on its unrotated bounds.
struct HandleSet {
    rect: Rect,
    corners: [(Corner, Pos2); 4],
    flip: Pos2,
    rotate: Pos2,
    remove: Pos2,
}

impl HandleSet {
    fn for_rect(rect: Rect) -> Self {
        Self {
            rect,
            corners: [
                (Corner::Nw, rect.left_top()),
                (Corner::Ne, rect.right_top()),
                (Corner::Sw, rect.left_bottom()),
                (Corner::Se, rect.right_bottom()),
            ],
            flip: pos2(rect.center().x, rect.top() - HANDLE_STALK),
            rotate: pos2(rect.center().x, rect.bottom() + HANDLE_STALK),
            remove: pos2(rect.right(), rect.center().y),
        }
    }

    fn paint(&self, painter: &egui::Painter) {
        let outline = Stroke::new(1.0, Color32::from_white_alpha(160));
        painter.rect_stroke(self.rect, 0.0, outline);
        for (_, pos) in self.corners {
            painter.circle(
                pos,
                HANDLE_RADIUS - 1.0,
                HANDLE_FILL,
                Stroke::new(2.0, Color32::WHITE),
            );
        }
        for (pos, glyph) in [(self.flip, "⇄"), (self.rotate, "↻")] {
            painter.circle(
                pos,
                HANDLE_RADIUS + 1.0,
                STALK_FILL,
                Stroke::new(2.0, Color32::WHITE),
            );
            painter.text(
                pos,
                Align2::CENTER_CENTER,
                glyph,
                FontId::proportional(11.0),
                Color32::WHITE,
            );
        }
        painter.text(
            self.remove,
            Align2::CENTER_CENTER,
            "✕",
            FontId::proportional(12.0),
            Color32::from_white_alpha(220),
        );
    }

    fn hit(&self, pointer: Pos2) -> Option<HandleHit> {
        let near = |p: Pos2, r: f32| pointer.distance(p) <= r;
        for (corner, pos) in self.corners {
            if near(pos, HANDLE_RADIUS + 2.0) {
                return Some(HandleHit::Resize(corner));
            }
        }
        if near(self.flip, HANDLE_RADIUS + 3.0) {
            return Some(HandleHit::Flip);
        }
        if near(self.rotate, HANDLE_RADIUS + 3.0) {
            return Some(HandleHit::Rotate);
        }
        if near(self.remove, HANDLE_RADIUS + 2.0) {
            return Some(HandleHit::Remove);
        }
        if self.rect.contains(pointer) {
            return Some(HandleHit::Body);
        }
        None
    }
}
