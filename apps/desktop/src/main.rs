use eframe::{egui, NativeOptions};
use project::ProjectStore;
use tracing_subscriber::EnvFilter;

mod app;
mod audio_decode;
mod audio_engine;
mod media_cache;
mod presentation_ui;
mod waveform;

use app::StoryboardApp;

fn main() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();

    // Ensure the store exists before the UI comes up
    let data_dir = project::app_data_dir();
    if let Err(err) = std::fs::create_dir_all(&data_dir) {
        eprintln!("cannot create data dir {}: {err}", data_dir.display());
        std::process::exit(1);
    }
    let store = match ProjectStore::open_default() {
        Ok(store) => store,
        Err(err) => {
            eprintln!("cannot open project store: {err}");
            std::process::exit(1);
        }
    };

    let options = NativeOptions {
        viewport: egui::ViewportBuilder::default().with_title("Storyboard Studio"),
        ..NativeOptions::default()
    };
    let _ = eframe::run_native(
        "Storyboard Studio",
        options,
        Box::new(move |_cc| Ok(Box::new(StoryboardApp::new(store)))),
    );
}
