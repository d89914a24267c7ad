// ============================================================================
// IMAGE I/O AND SINKS — source loading, clipboard delivery, file delivery
// ============================================================================

use std::path::{Path, PathBuf};
use std::sync::mpsc::{Receiver, channel};

use image::RgbaImage;

use crate::error::{EditorError, Result};
use crate::log_warn;

// ---------------------------------------------------------------------------
//  Source image loading
// ---------------------------------------------------------------------------

/// Where a session's base image comes from. The locator that produced the
/// reference is an external collaborator; by the time a session opens, the
/// subject has already been found (or `SourceNotFound` was raised upstream).
#[derive(Clone, Debug)]
pub enum SourceRef {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

/// Decode a source reference on the current thread.
pub fn load_source(source: &SourceRef) -> Result<RgbaImage> {
    match source {
        SourceRef::Path(path) => {
            if !path.is_file() {
                return Err(EditorError::SourceNotFound);
            }
            Ok(image::open(path)?.to_rgba8())
        }
        SourceRef::Bytes(bytes) => Ok(image::load_from_memory(bytes)?.to_rgba8()),
    }
}

/// Decode a source reference on a worker thread. The GUI polls the returned
/// channel each frame; until a result arrives the session's base image is
/// still loading and exports fail with `ImageNotReady`.
pub fn load_source_async(source: SourceRef) -> Receiver<Result<RgbaImage>> {
    let (tx, rx) = channel();
    std::thread::spawn(move || {
        let _ = tx.send(load_source(&source));
    });
    rx
}

/// Write PNG bytes to disk.
pub fn write_png_file(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, bytes)?;
    Ok(())
}

// ---------------------------------------------------------------------------
//  Sinks
// ---------------------------------------------------------------------------

/// Writes the final composite to the system clipboard as an image payload.
pub trait ClipboardSink {
    fn write_image(&mut self, image: &RgbaImage) -> Result<()>;
}

/// Delivers the encoded composite to a host compose surface (upload control,
/// file drop target, ...). The sink decides what "insertion" means.
pub trait InsertionSink {
    fn insert_png(&mut self, png: &[u8]) -> Result<()>;
}

/// System clipboard sink backed by arboard.
pub struct SystemClipboard;

impl ClipboardSink for SystemClipboard {
    fn write_image(&mut self, image: &RgbaImage) -> Result<()> {
        // arboard wants ImageData { width, height, bytes } in RGBA order.
        let mut clip = arboard::Clipboard::new()
            .map_err(|e| EditorError::SinkUnavailable(e.to_string()))?;
        let data = arboard::ImageData {
            width: image.width() as usize,
            height: image.height() as usize,
            bytes: std::borrow::Cow::Borrowed(image.as_raw()),
        };
        clip.set_image(data)
            .map_err(|e| EditorError::SinkUnavailable(e.to_string()))
    }
}

/// Read an image off the system clipboard, used to replace the base image.
/// Tries raw image data first, then text content that happens to be a valid
/// image file path. Returns `None` when the clipboard has neither.
pub fn image_from_system_clipboard() -> Option<RgbaImage> {
    let mut clip = match arboard::Clipboard::new() {
        Ok(c) => c,
        Err(e) => {
            log_warn!("clipboard unavailable: {}", e);
            return None;
        }
    };

    if let Ok(data) = clip.get_image()
        && let Some(img) = RgbaImage::from_raw(
            data.width as u32,
            data.height as u32,
            data.bytes.into_owned(),
        )
    {
        return Some(img);
    }

    if let Ok(text) = clip.get_text() {
        let path = Path::new(text.trim());
        if path.is_file()
            && let Ok(img) = image::open(path)
        {
            return Some(img.to_rgba8());
        }
    }

    None
}

/// Insertion sink that writes the PNG next to wherever the host asked.
/// Used by the CLI and by the GUI's "insert to file" action.
pub struct FileSink {
    pub path: PathBuf,
}

impl InsertionSink for FileSink {
    fn insert_png(&mut self, png: &[u8]) -> Result<()> {
        write_png_file(&self.path, png)
            .map_err(|e| EditorError::SinkUnavailable(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_missing_source_path_is_source_not_found() {
        let src = SourceRef::Path(PathBuf::from("/definitely/not/here.png"));
        assert!(matches!(load_source(&src), Err(EditorError::SourceNotFound)));
    }

    #[test]
    fn test_source_bytes_round_trip() {
        let img = RgbaImage::from_pixel(5, 7, Rgba([1, 2, 3, 255]));
        let png = crate::compositor::encode_png(&img).unwrap();
        let loaded = load_source(&SourceRef::Bytes(png)).unwrap();
        assert_eq!(loaded.dimensions(), (5, 7));
        assert_eq!(loaded.get_pixel(4, 6), img.get_pixel(4, 6));
    }

    #[test]
    fn test_async_load_delivers_result() {
        let img = RgbaImage::from_pixel(3, 3, Rgba([9, 9, 9, 255]));
        let png = crate::compositor::encode_png(&img).unwrap();
        let rx = load_source_async(SourceRef::Bytes(png));
        let loaded = rx.recv().unwrap().unwrap();
        assert_eq!(loaded.dimensions(), (3, 3));
    }

    #[test]
    fn test_file_sink_writes_bytes() {
        let dir = std::env::temp_dir().join("stickerfe-test-sink");
        let path = dir.join("out.png");
        let _ = std::fs::remove_file(&path);

        let img = RgbaImage::from_pixel(4, 4, Rgba([200, 10, 10, 255]));
        let png = crate::compositor::encode_png(&img).unwrap();
        let mut sink = FileSink { path: path.clone() };
        sink.insert_png(&png).unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), png);
        let _ = std::fs::remove_file(&path);
    }
}
