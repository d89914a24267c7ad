use std::process::ExitCode;

use eframe::egui;
use stickerfe::app::StickerApp;
use stickerfe::{cli, log_err, logger};

fn main() -> ExitCode {
    // -- CLI / headless mode -------------------------------------------
    // Any --input/-i flag means compose-and-exit, no window.
    if cli::CliArgs::is_cli_mode() {
        use clap::Parser;
        let args = cli::CliArgs::parse();
        return cli::run(args);
    }

    // -- GUI mode ------------------------------------------------------

    // Initialize session log (overwrites previous session log)
    logger::init();

    let options = eframe::NativeOptions {
        viewport: {
            let mut vp = egui::ViewportBuilder::default()
                .with_inner_size([820.0, 700.0])
                .with_title("StickerFE");
            if let Some(icon) = load_app_icon() {
                vp = vp.with_icon(std::sync::Arc::new(icon));
            }
            vp
        },
        ..Default::default()
    };

    let outcome = eframe::run_native(
        "StickerFE",
        options,
        Box::new(|cc| Box::new(StickerApp::new(cc))),
    );
    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log_err!("eframe failed to start: {}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Decode the default sticker into raw RGBA for the window icon.
fn load_app_icon() -> Option<egui::viewport::IconData> {
    let png_bytes = include_bytes!("../assets/stickers/chomp.png");
    let img = image::load_from_memory(png_bytes).ok()?.into_rgba8();
    let (w, h) = img.dimensions();
    Some(egui::viewport::IconData {
        rgba: img.into_raw(),
        width: w,
        height: h,
    })
}
