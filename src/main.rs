use eframe::egui;

use story_loom::gui::frontend::StoryApp;

fn main() -> eframe::Result {
    env_logger::init();
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1300.0, 760.0])
            // Keep the three-panel layout usable on small screens
            .with_min_inner_size([820.0, 480.0])
            .with_resizable(true),
        ..Default::default()
    };
    eframe::run_native(
        "Story-Loom",
        options,
        Box::new(|_cc| Ok(Box::new(StoryApp::new()) as Box<dyn eframe::App>)),
    )
}
