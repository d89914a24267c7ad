// ============================================================================
// StickerFE — sticker overlay compositor
// ============================================================================
//
// Edits happen in a fitted editor viewport; export re-renders every overlay
// against the base image at its native resolution. The modules split along
// that line: `overlay`/`gesture`/`session` hold editor-space state, and
// `compositor` owns the surface-space render.

pub mod app;
pub mod assets;
pub mod cli;
pub mod compositor;
pub mod error;
pub mod gesture;
pub mod io;
pub mod logger;
pub mod overlay;
pub mod session;
