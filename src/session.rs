// ============================================================================
// SESSION — one edit interaction from open to export/close
// ============================================================================
//
// At most one session is live per process. The controller owns it outright:
// opening a new session drops the previous one, and every mutation funnels
// through here or through the per-overlay gesture controllers, so there is
// exactly one writer and no locking.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::mpsc::{Receiver, TryRecvError};

use image::RgbaImage;
use uuid::Uuid;

use crate::assets::{DEFAULT_STICKER, StickerAssets};
use crate::compositor::{self, Viewport};
use crate::error::{EditorError, Result};
use crate::gesture::OverlayController;
use crate::io::{ClipboardSink, InsertionSink, SourceRef, load_source_async};
use crate::log_info;
use crate::overlay::{OverlayId, OverlayStack, StickerImage};

/// What to do with the flattened composite.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportAction {
    /// Hand the pixels to the clipboard sink.
    Copy,
    /// Hand the encoded PNG to the insertion sink.
    Insert,
}

/// Load state of the session's base image. Size-dependent work is deferred
/// until the decode thread delivers `Ready`.
pub enum BaseImage {
    Loading(Receiver<Result<RgbaImage>>),
    Ready(Arc<RgbaImage>),
    Failed(String),
}

/// One live editing session: base image, overlay stack, and one gesture
/// controller per overlay.
pub struct Session {
    pub id: Uuid,
    base: BaseImage,
    pub overlays: OverlayStack,
    controllers: HashMap<OverlayId, OverlayController>,
    export_in_flight: bool,
}

impl Session {
    fn new(base: BaseImage) -> Self {
        Self {
            id: Uuid::new_v4(),
            base,
            overlays: OverlayStack::new(),
            controllers: HashMap::new(),
            export_in_flight: false,
        }
    }

    /// Drain the loader channel. Call once per frame; cheap when nothing
    /// is pending.
    pub fn poll_base(&mut self) {
        if let BaseImage::Loading(rx) = &self.base {
            match rx.try_recv() {
                Ok(Ok(img)) => {
                    log_info!("base image ready: {}x{}", img.width(), img.height());
                    self.base = BaseImage::Ready(Arc::new(img));
                }
                Ok(Err(e)) => self.base = BaseImage::Failed(e.to_string()),
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => {
                    self.base = BaseImage::Failed("image loader thread died".into());
                }
            }
        }
    }

    /// The decoded base image, once loading has finished.
    pub fn base_image(&self) -> Option<&Arc<RgbaImage>> {
        match &self.base {
            BaseImage::Ready(img) => Some(img),
            _ => None,
        }
    }

    /// Load failure message, if the base image could not be decoded.
    pub fn base_error(&self) -> Option<&str> {
        match &self.base {
            BaseImage::Failed(msg) => Some(msg),
            _ => None,
        }
    }

    /// Append an overlay and bind a fresh gesture controller to it.
    pub fn add_overlay(&mut self, sticker: Arc<StickerImage>) -> OverlayId {
        let id = self.overlays.add(sticker);
        self.controllers.insert(id, OverlayController::new());
        id
    }

    /// Remove an overlay and its controller. Absent handles are a no-op.
    pub fn remove_overlay(&mut self, id: OverlayId) {
        self.overlays.remove(id);
        self.controllers.remove(&id);
    }

    pub fn controller_mut(&mut self, id: OverlayId) -> Option<&mut OverlayController> {
        self.controllers.get_mut(&id)
    }

    /// Route a pointer position into the overlay's gesture controller,
    /// mutating its transform in place. Unknown handles are ignored.
    pub fn update_gesture(&mut self, id: OverlayId, cursor: (f32, f32)) {
        if let Some(controller) = self.controllers.get_mut(&id)
            && let Some(entry) = self.overlays.get_mut(id)
        {
            controller.update(&mut entry.transform, cursor);
        }
    }

    /// End the overlay's active gesture, if any.
    pub fn end_gesture(&mut self, id: OverlayId) {
        if let Some(controller) = self.controllers.get_mut(&id) {
            controller.end();
        }
    }

    /// Mark an export as outstanding. A session allows at most one.
    pub fn try_begin_export(&mut self) -> Result<()> {
        if self.export_in_flight {
            return Err(EditorError::ExportInFlight);
        }
        self.export_in_flight = true;
        Ok(())
    }

    pub fn finish_export(&mut self) {
        self.export_in_flight = false;
    }
}

/// Owns the (at most one) live session and orchestrates open, overlay
/// add/remove, export, and close.
#[derive(Default)]
pub struct SessionController {
    session: Option<Session>,
}

impl SessionController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn session_mut(&mut self) -> Option<&mut Session> {
        self.session.as_mut()
    }

    /// Open a session on a located source image, replacing any live session,
    /// and seed it with one default sticker. The base decodes on a worker
    /// thread.
    pub fn open(&mut self, source: SourceRef, assets: &dyn StickerAssets) -> Result<&mut Session> {
        let sticker = assets.resolve(DEFAULT_STICKER)?;
        let mut session = Session::new(BaseImage::Loading(load_source_async(source)));
        session.add_overlay(sticker);
        log_info!("session {} opened", session.id);
        Ok(self.session.insert(session))
    }

    /// Open a session on an already decoded image (e.g. pasted from the
    /// clipboard). Same seeding as [`SessionController::open`].
    pub fn open_with_image(
        &mut self,
        image: RgbaImage,
        assets: &dyn StickerAssets,
    ) -> Result<&mut Session> {
        let sticker = assets.resolve(DEFAULT_STICKER)?;
        let mut session = Session::new(BaseImage::Ready(Arc::new(image)));
        session.add_overlay(sticker);
        log_info!("session {} opened (preloaded image)", session.id);
        Ok(self.session.insert(session))
    }

    /// Add one overlay by sticker name. Asset resolution failure is fatal to
    /// the add, not to the session.
    pub fn add_overlay(&mut self, name: &str, assets: &dyn StickerAssets) -> Result<OverlayId> {
        let sticker = assets.resolve(name)?;
        let session = self.session.as_mut().ok_or(EditorError::NoSession)?;
        Ok(session.add_overlay(sticker))
    }

    pub fn remove_overlay(&mut self, id: OverlayId) {
        if let Some(session) = self.session.as_mut() {
            session.remove_overlay(id);
        }
    }

    /// Flatten and deliver. On success the session closes; on any failure it
    /// stays open so the user can retry or pick the other action.
    pub fn export(
        &mut self,
        action: ExportAction,
        viewport: Viewport,
        clipboard: &mut dyn ClipboardSink,
        mut insertion: Option<&mut dyn InsertionSink>,
    ) -> Result<()> {
        let session = self.session.as_mut().ok_or(EditorError::NoSession)?;
        let session_id = session.id;
        session.poll_base();

        let base = match &session.base {
            BaseImage::Ready(img) => img.clone(),
            BaseImage::Loading(_) => return Err(EditorError::ImageNotReady),
            BaseImage::Failed(_) => return Err(EditorError::SourceNotFound),
        };

        session.try_begin_export()?;
        let result = (|| {
            let surface = compositor::render(&base, viewport, &session.overlays)?;
            let png = compositor::encode_png(&surface)?;
            match action {
                ExportAction::Copy => clipboard.write_image(&surface)?,
                ExportAction::Insert => {
                    let sink = insertion.as_mut().ok_or_else(|| {
                        EditorError::SinkUnavailable("no insertion target".into())
                    })?;
                    sink.insert_png(&png)?;
                }
            }
            Ok(())
        })();
        session.finish_export();

        match result {
            Ok(()) => {
                log_info!("session {} exported ({:?}) and closed", session_id, action);
                self.session = None;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Release the session without exporting.
    pub fn close(&mut self) {
        if let Some(session) = self.session.take() {
            log_info!("session {} closed", session.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{ALT_STICKER, EmbeddedAssets};
    use image::Rgba;
    use std::sync::mpsc::channel;

    struct MemClipboard {
        written: Option<RgbaImage>,
    }

    impl ClipboardSink for MemClipboard {
        fn write_image(&mut self, image: &RgbaImage) -> Result<()> {
            self.written = Some(image.clone());
            Ok(())
        }
    }

    struct FailingClipboard;

    impl ClipboardSink for FailingClipboard {
        fn write_image(&mut self, _image: &RgbaImage) -> Result<()> {
            Err(EditorError::SinkUnavailable("clipboard rejected payload".into()))
        }
    }

    struct MemSink {
        bytes: Vec<u8>,
    }

    impl InsertionSink for MemSink {
        fn insert_png(&mut self, png: &[u8]) -> Result<()> {
            self.bytes = png.to_vec();
            Ok(())
        }
    }

    fn base(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba([255, 255, 255, 255]))
    }

    #[test]
    fn test_open_seeds_one_overlay() {
        let mut ctl = SessionController::new();
        let session = ctl.open_with_image(base(100, 100), &EmbeddedAssets).unwrap();
        assert_eq!(session.overlays.len(), 1);
    }

    #[test]
    fn test_open_replaces_live_session() {
        let mut ctl = SessionController::new();
        let first = ctl.open_with_image(base(100, 100), &EmbeddedAssets).unwrap().id;
        let second = ctl.open_with_image(base(50, 50), &EmbeddedAssets).unwrap().id;
        assert_ne!(first, second);
        assert_eq!(ctl.session().unwrap().id, second);
    }

    #[test]
    fn test_add_and_remove_overlay_keeps_controllers_in_step() {
        let mut ctl = SessionController::new();
        ctl.open_with_image(base(100, 100), &EmbeddedAssets).unwrap();
        let id = ctl.add_overlay(ALT_STICKER, &EmbeddedAssets).unwrap();

        let session = ctl.session_mut().unwrap();
        assert!(session.controller_mut(id).is_some());

        ctl.remove_overlay(id);
        let session = ctl.session_mut().unwrap();
        assert!(session.controller_mut(id).is_none());
        assert_eq!(session.overlays.len(), 1);
    }

    #[test]
    fn test_add_overlay_with_unknown_sticker_fails() {
        let mut ctl = SessionController::new();
        ctl.open_with_image(base(100, 100), &EmbeddedAssets).unwrap();
        let err = ctl.add_overlay("mystery", &EmbeddedAssets).unwrap_err();
        assert!(matches!(err, EditorError::StickerNotFound(_)));
        // The failed add must not have touched the stack.
        assert_eq!(ctl.session().unwrap().overlays.len(), 1);
    }

    #[test]
    fn test_export_before_base_ready_keeps_session_open() {
        // A loader channel that never delivers keeps the base in Loading.
        let (_tx, rx) = channel();
        let mut ctl = SessionController::new();
        ctl.session = Some(Session::new(BaseImage::Loading(rx)));

        let mut clip = MemClipboard { written: None };
        let err = ctl
            .export(ExportAction::Copy, Viewport::new(500.0, 400.0), &mut clip, None)
            .unwrap_err();
        assert!(matches!(err, EditorError::ImageNotReady));
        assert!(ctl.session().is_some());
        assert!(clip.written.is_none());
    }

    #[test]
    fn test_export_copy_delivers_native_resolution_and_closes() {
        let mut ctl = SessionController::new();
        ctl.open_with_image(base(640, 480), &EmbeddedAssets).unwrap();

        let mut clip = MemClipboard { written: None };
        ctl.export(ExportAction::Copy, Viewport::new(320.0, 240.0), &mut clip, None)
            .unwrap();

        assert_eq!(clip.written.unwrap().dimensions(), (640, 480));
        assert!(ctl.session().is_none());
    }

    #[test]
    fn test_export_insert_delivers_png() {
        let mut ctl = SessionController::new();
        ctl.open_with_image(base(64, 48), &EmbeddedAssets).unwrap();

        let mut clip = MemClipboard { written: None };
        let mut sink = MemSink { bytes: Vec::new() };
        ctl.export(
            ExportAction::Insert,
            Viewport::new(64.0, 48.0),
            &mut clip,
            Some(&mut sink),
        )
        .unwrap();

        let decoded = image::load_from_memory(&sink.bytes).unwrap();
        assert_eq!(decoded.to_rgba8().dimensions(), (64, 48));
        assert!(clip.written.is_none());
        assert!(ctl.session().is_none());
    }

    #[test]
    fn test_export_insert_without_sink_fails_open() {
        let mut ctl = SessionController::new();
        ctl.open_with_image(base(64, 48), &EmbeddedAssets).unwrap();

        let mut clip = MemClipboard { written: None };
        let err = ctl
            .export(ExportAction::Insert, Viewport::new(64.0, 48.0), &mut clip, None)
            .unwrap_err();
        assert!(matches!(err, EditorError::SinkUnavailable(_)));
        assert!(ctl.session().is_some());
    }

    #[test]
    fn test_export_failure_keeps_session_open_for_retry() {
        let mut ctl = SessionController::new();
        ctl.open_with_image(base(64, 48), &EmbeddedAssets).unwrap();

        let err = ctl
            .export(
                ExportAction::Copy,
                Viewport::new(64.0, 48.0),
                &mut FailingClipboard,
                None,
            )
            .unwrap_err();
        assert!(matches!(err, EditorError::SinkUnavailable(_)));

        // Retry with a working sink succeeds and closes the session.
        let mut clip = MemClipboard { written: None };
        ctl.export(ExportAction::Copy, Viewport::new(64.0, 48.0), &mut clip, None)
            .unwrap();
        assert!(ctl.session().is_none());
    }

    #[test]
    fn test_at_most_one_export_in_flight() {
        let mut ctl = SessionController::new();
        let session = ctl.open_with_image(base(64, 48), &EmbeddedAssets).unwrap();

        session.try_begin_export().unwrap();
        let err = session.try_begin_export().unwrap_err();
        assert!(matches!(err, EditorError::ExportInFlight));

        session.finish_export();
        assert!(session.try_begin_export().is_ok());
    }

    #[test]
    fn test_close_without_export() {
        let mut ctl = SessionController::new();
        ctl.open_with_image(base(64, 48), &EmbeddedAssets).unwrap();
        ctl.close();
        assert!(ctl.session().is_none());
        // Closing again is harmless.
        ctl.close();
    }
}
