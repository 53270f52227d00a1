#![warn(clippy::all, rust_2018_idioms)]

mod app;
mod edit;

fn main() -> eframe::Result<()> {
    env_logger::init(); // Log to stderr (if you run with `RUST_LOG=debug`).

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1100.0, 860.0])
            .with_min_inner_size([400.0, 300.0]),
        ..Default::default()
    };
    eframe::run_native(
        "A* Pathfinder",
        native_options,
        Box::new(|cc| Box::new(app::App::new(cc))),
    )
}
