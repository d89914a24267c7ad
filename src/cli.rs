// ============================================================================
// StickerFE CLI — headless sticker compositing via command-line arguments
// ============================================================================
//
// Usage examples:
//   stickerfe --input photo.png --output out.png
//   stickerfe -i photo.jpg -o out.png --sticker chomp:40,60:150
//   stickerfe -i photo.png -o out.png \
//       --sticker chomp:50,50:120:0.78 --sticker chomp-leg:200,80:90:0:flip
//
// No GUI is opened in CLI mode. Placements are given in editor-space
// coordinates against the same fitted viewport the GUI would show (500px
// longest edge by default), so a placement tried interactively reproduces
// identically from the command line.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;

use crate::assets::{DEFAULT_STICKER, EmbeddedAssets, StickerAssets};
use crate::compositor::Viewport;
use crate::io::{FileSink, SourceRef, load_source};
use crate::session::{ExportAction, SessionController};

/// StickerFE headless compositor.
///
/// Place stickers on a base image and write the flattened PNG without
/// opening the editor window.
#[derive(Parser, Debug)]
#[command(
    name = "stickerfe",
    about = "StickerFE headless sticker compositor",
    long_about = "Flatten sticker overlays onto a base image without opening the GUI.\n\n\
                  Sticker placement syntax:\n  \
                  NAME[:X,Y[:WIDTH[:ROTATION[:flip]]]]\n\n\
                  X,Y is the overlay's top-left corner and WIDTH its size in\n\
                  editor-space pixels (the fitted viewport, 500px longest edge);\n\
                  height always follows from the sticker's aspect ratio.\n\
                  ROTATION is in radians about the sticker's center.\n\n\
                  Example:\n  \
                  stickerfe -i photo.png -o out.png --sticker chomp:50,50:120:0.78:flip"
)]
pub struct CliArgs {
    /// Base image file (PNG, JPEG, WEBP, BMP).
    #[arg(short, long, value_name = "FILE")]
    pub input: PathBuf,

    /// Output PNG path.
    #[arg(short, long, value_name = "FILE")]
    pub output: PathBuf,

    /// Sticker placement, repeatable. When omitted entirely, one default
    /// sticker is placed at the standard position.
    #[arg(short, long, value_name = "SPEC")]
    pub sticker: Vec<String>,

    /// Longest edge of the editor-space viewport placements refer to.
    #[arg(long, default_value_t = 500.0, value_name = "PIXELS")]
    pub display_edge: f32,

    /// Print placement details and timing.
    #[arg(short, long)]
    pub verbose: bool,
}

impl CliArgs {
    /// Returns `true` when any CLI-mode flag is present in the real process
    /// arguments. Used by `main()` to route before creating an eframe window.
    pub fn is_cli_mode() -> bool {
        std::env::args().any(|a| a == "--input" || a == "-i")
    }
}

/// One parsed `--sticker` value.
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    pub name: String,
    pub position: Option<(f32, f32)>,
    pub width: Option<f32>,
    pub rotation: f32,
    pub flipped: bool,
}

/// Parse `NAME[:X,Y[:WIDTH[:ROTATION[:flip]]]]`.
pub fn parse_placement(spec: &str) -> Result<Placement, String> {
    let mut parts = spec.split(':');
    let name = parts
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("empty sticker spec '{}'", spec))?
        .to_string();

    let mut placement = Placement {
        name,
        position: None,
        width: None,
        rotation: 0.0,
        flipped: false,
    };

    if let Some(pos) = parts.next() {
        let (x, y) = pos
            .split_once(',')
            .ok_or_else(|| format!("expected X,Y in sticker spec '{}'", spec))?;
        let x: f32 = x.trim().parse().map_err(|_| format!("bad X '{}'", x))?;
        let y: f32 = y.trim().parse().map_err(|_| format!("bad Y '{}'", y))?;
        placement.position = Some((x, y));
    }
    if let Some(w) = parts.next() {
        placement.width = Some(w.trim().parse().map_err(|_| format!("bad width '{}'", w))?);
    }
    if let Some(r) = parts.next() {
        placement.rotation = r
            .trim()
            .parse()
            .map_err(|_| format!("bad rotation '{}'", r))?;
    }
    if let Some(f) = parts.next() {
        match f.trim() {
            "flip" => placement.flipped = true,
            "" => {}
            other => return Err(format!("expected 'flip', got '{}'", other)),
        }
    }
    if parts.next().is_some() {
        return Err(format!("too many fields in sticker spec '{}'", spec));
    }
    Ok(placement)
}

/// Run all CLI processing and return an OS exit code.
/// `0` = composite written, `1` = any failure.
pub fn run(args: CliArgs) -> ExitCode {
    match execute(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// The whole compose pipeline: parse placements, load, place, flatten, write.
fn execute(args: &CliArgs) -> Result<(), String> {
    let start = Instant::now();

    let placements: Vec<Placement> = args
        .sticker
        .iter()
        .map(|spec| parse_placement(spec))
        .collect::<Result<_, _>>()?;

    let base = load_source(&SourceRef::Path(args.input.clone()))
        .map_err(|e| format!("could not load '{}': {}", args.input.display(), e))?;
    let viewport = Viewport::fit(base.width(), base.height(), args.display_edge);
    if args.verbose {
        println!(
            "base {}x{} → viewport {:.0}x{:.0}",
            base.width(),
            base.height(),
            viewport.display_width,
            viewport.display_height
        );
    }

    let assets = EmbeddedAssets;
    let mut controller = SessionController::new();
    let session = controller
        .open_with_image(base, &assets)
        .map_err(|e| e.to_string())?;

    // The session seeds one default sticker; explicit placements replace it.
    if !placements.is_empty() {
        for id in session.overlays.ids() {
            session.remove_overlay(id);
        }
        for p in &placements {
            let sticker = assets.resolve(&p.name).map_err(|e| e.to_string())?;
            let id = session.add_overlay(sticker);
            if let Some(entry) = session.overlays.get_mut(id) {
                let t = &mut entry.transform;
                if let Some((x, y)) = p.position {
                    t.set_position(x, y);
                }
                if let Some(w) = p.width {
                    t.set_width(w);
                }
                t.set_rotation(p.rotation);
                if p.flipped {
                    t.toggle_flip();
                }
                if args.verbose {
                    println!(
                        "  {} at ({:.0},{:.0}) {}x{:.0} rot {:.3} flip {}",
                        p.name,
                        t.x,
                        t.y,
                        t.width(),
                        t.height(),
                        t.rotation,
                        t.flipped
                    );
                }
            }
        }
    } else if args.verbose {
        println!("  no --sticker given; placing one '{}'", DEFAULT_STICKER);
    }

    let mut clipboard = NullClipboard;
    let mut sink = FileSink {
        path: args.output.clone(),
    };
    controller
        .export(ExportAction::Insert, viewport, &mut clipboard, Some(&mut sink))
        .map_err(|e| e.to_string())?;

    if args.verbose {
        println!(
            "→ {} ({:.0}ms)",
            args.output.display(),
            start.elapsed().as_secs_f64() * 1000.0
        );
    }
    Ok(())
}

/// The CLI never touches the system clipboard.
struct NullClipboard;

impl crate::io::ClipboardSink for NullClipboard {
    fn write_image(&mut self, _image: &image::RgbaImage) -> crate::error::Result<()> {
        Ok(())
    }
}
