// ============================================================================
// STICKER ASSETS — embedded overlay source images, resolved by logical name
// ============================================================================

use std::sync::{Arc, OnceLock};

use crate::error::{EditorError, Result};
use crate::overlay::StickerImage;

/// Logical name of the sticker seeded into every new session.
pub const DEFAULT_STICKER: &str = "chomp";

/// Logical name of the alternate variant.
pub const ALT_STICKER: &str = "chomp-leg";

/// Supplies overlay source images by logical name. Resolution failure is
/// fatal to `add_overlay`, never silently substituted.
pub trait StickerAssets {
    fn resolve(&self, name: &str) -> Result<Arc<StickerImage>>;

    /// Names this source can resolve, in menu order.
    fn names(&self) -> &[&'static str];
}

/// The built-in sticker set, compiled into the binary. Each image is decoded
/// once on first use and shared from then on.
pub struct EmbeddedAssets;

static CHOMP: OnceLock<Arc<StickerImage>> = OnceLock::new();
static CHOMP_LEG: OnceLock<Arc<StickerImage>> = OnceLock::new();

fn decode(name: &'static str, bytes: &[u8]) -> Arc<StickerImage> {
    // A decode failure of an embedded asset yields a 1x1 blank sticker
    // instead of failing every add_overlay.
    let pixels = image::load_from_memory(bytes)
        .map(|img| img.to_rgba8())
        .unwrap_or_else(|_| image::RgbaImage::new(1, 1));
    Arc::new(StickerImage::new(name, pixels))
}

impl StickerAssets for EmbeddedAssets {
    fn resolve(&self, name: &str) -> Result<Arc<StickerImage>> {
        match name {
            DEFAULT_STICKER => Ok(CHOMP
                .get_or_init(|| {
                    decode(DEFAULT_STICKER, include_bytes!("../assets/stickers/chomp.png"))
                })
                .clone()),
            ALT_STICKER => Ok(CHOMP_LEG
                .get_or_init(|| {
                    decode(ALT_STICKER, include_bytes!("../assets/stickers/chomp-leg.png"))
                })
                .clone()),
            other => Err(EditorError::StickerNotFound(other.to_string())),
        }
    }

    fn names(&self) -> &[&'static str] {
        &[DEFAULT_STICKER, ALT_STICKER]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_listed_name_resolves() {
        let assets = EmbeddedAssets;
        for name in assets.names() {
            let sticker = assets.resolve(name).unwrap();
            assert!(sticker.pixels.width() > 1);
            assert!(sticker.aspect_ratio() > 0.0);
        }
    }

    #[test]
    fn test_unknown_name_is_fatal() {
        let assets = EmbeddedAssets;
        let err = assets.resolve("no-such-sticker").unwrap_err();
        assert!(matches!(err, EditorError::StickerNotFound(_)));
    }

    #[test]
    fn test_resolve_is_cached() {
        let assets = EmbeddedAssets;
        let a = assets.resolve(DEFAULT_STICKER).unwrap();
        let b = assets.resolve(DEFAULT_STICKER).unwrap();
        assert!(Arc::ptr_eq(&a.pixels, &b.pixels));
    }
}
