pub mod canvas;
pub mod windows;

pub use canvas::{CanvasView, KEY_ZOOM_STEP, MAX_SCALE, MIN_SCALE, WHEEL_ZOOM_STEP};
pub use windows::{
    NoticeKind, ResizeDir, SaveKind, SearchHit, WindowState, Workspace, AUTOSAVE_DELAY,
    DEFAULT_WINDOW_HEIGHT, DEFAULT_WINDOW_WIDTH, MIN_WINDOW_HEIGHT, MIN_WINDOW_WIDTH,
};
