use std::collections::HashMap;
use std::time::{Duration, Instant};

use eframe::egui::{pos2, vec2, Pos2, Rect, Vec2};

use crate::persistence::settings::EditorSettings;
use crate::stats::TextStats;
use crate::store::records::{FileId, FileKind, ProjectId, WindowGeometry};
use crate::store::StoryStore;

use super::canvas::CanvasView;

pub const DEFAULT_WINDOW_WIDTH: f32 = 520.0;
pub const DEFAULT_WINDOW_HEIGHT: f32 = 400.0;
pub const MIN_WINDOW_WIDTH: f32 = 360.0;
pub const MIN_WINDOW_HEIGHT: f32 = 280.0;

const CASCADE_STEP: i64 = 32;
const CASCADE_WRAP_X: i64 = 200;
const CASCADE_WRAP_Y: i64 = 150;

pub const AUTOSAVE_DELAY: Duration = Duration::from_secs(3);
const SAVED_INDICATOR_TTL: Duration = Duration::from_secs(2);
const NOTICE_TTL: Duration = Duration::from_secs(3);
const ZOOM_HUD_TTL: Duration = Duration::from_millis(1000);
const MAXIMIZE_MARGIN: f32 = 8.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SaveKind {
    Automatic,
    Manual,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResizeDir {
    N,
    S,
    E,
    W,
    Ne,
    Nw,
    Se,
    Sw,
}

impl ResizeDir {
    pub const ALL: [ResizeDir; 8] = [
        ResizeDir::N,
        ResizeDir::S,
        ResizeDir::E,
        ResizeDir::W,
        ResizeDir::Ne,
        ResizeDir::Nw,
        ResizeDir::Se,
        ResizeDir::Sw,
    ];

    fn has_north(self) -> bool {
        matches!(self, ResizeDir::N | ResizeDir::Ne | ResizeDir::Nw)
    }

    fn has_south(self) -> bool {
        matches!(self, ResizeDir::S | ResizeDir::Se | ResizeDir::Sw)
    }

    fn has_east(self) -> bool {
        matches!(self, ResizeDir::E | ResizeDir::Ne | ResizeDir::Se)
    }

    fn has_west(self) -> bool {
        matches!(self, ResizeDir::W | ResizeDir::Nw | ResizeDir::Sw)
    }
}

/// Runtime projection of an open file as a floating window. The buffer is the
/// authoritative copy of the text while the window lives; the stored record
/// only catches up on save.
pub struct WindowState {
    pub file_id: FileId,
    pub title: String,
    pub buffer: String,
    pub dirty: bool,
    // Canvas-space placement
    pub rect: Rect,
    pub z: u64,
    pub stats: TextStats,
    opened_seq: u64,
    autosave_due: Option<Instant>,
    saved_at: Option<(SaveKind, Instant)>,
    restore_rect: Option<Rect>,
}

impl WindowState {
    /// The transient "saved"/"auto-saved" tag in the status bar.
    pub fn saved_indicator(&self, now: Instant) -> Option<SaveKind> {
        match self.saved_at {
            Some((kind, at)) if now.duration_since(at) <= SAVED_INDICATOR_TTL => Some(kind),
            _ => None,
        }
    }

    pub fn is_maximized(&self) -> bool {
        self.restore_rect.is_some()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Error,
}

pub struct Notice {
    pub message: String,
    pub kind: NoticeKind,
    since: Instant,
}

/// One matching line from a project-wide text search.
pub struct SearchHit {
    pub file_id: FileId,
    pub file_name: String,
    pub line_no: usize,
    pub line: String,
}

struct DragState {
    file_id: FileId,
    start: Pos2,
    orig: Pos2,
}

struct ResizeState {
    file_id: FileId,
    dir: ResizeDir,
    start: Pos2,
    orig: Rect,
}

struct PanState {
    start: Pos2,
    orig_pan: Vec2,
}

/// The floating-window manager: one registry entry per open file, a shared
/// canvas view, and the pointer-interaction state machines. At most one of
/// drag/resize/pan is live at a time.
pub struct Workspace {
    pub view: CanvasView,
    windows: HashMap<FileId, WindowState>,
    active: Option<FileId>,
    project_id: Option<ProjectId>,
    // Monotonic, never reused
    z_counter: u64,
    open_counter: u64,
    cascade_count: i64,
    drag: Option<DragState>,
    resize: Option<ResizeState>,
    pan_drag: Option<PanState>,
    zoom_hud_until: Option<Instant>,
    notice: Option<Notice>,
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new()
    }
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            view: CanvasView::default(),
            windows: HashMap::new(),
            active: None,
            project_id: None,
            z_counter: 0,
            open_counter: 0,
            cascade_count: 0,
            drag: None,
            resize: None,
            pan_drag: None,
            zoom_hud_until: None,
            notice: None,
        }
    }

    // Session

    /// Apply the project's persisted canvas view and re-open every window the
    /// last session left open, using its persisted geometry.
    pub fn open_project(&mut self, store: &mut StoryStore, project_id: ProjectId, viewport: Vec2, now: Instant) {
        self.project_id = Some(project_id);
        self.view = store
            .db
            .project(project_id)
            .and_then(|p| p.canvas)
            .map(CanvasView::from_state)
            .unwrap_or_default();

        let mut to_restore: Vec<FileId> = store
            .db
            .files_for_project(project_id)
            .iter()
            .filter(|f| f.window.is_some_and(|w| w.is_open))
            .map(|f| f.id)
            .collect();
        // v7 ids order by creation time, which keeps restores deterministic
        to_restore.sort();
        for id in to_restore {
            self.spawn_window(store, id, viewport, now, true);
        }
    }

    pub fn project_id(&self) -> Option<ProjectId> {
        self.project_id
    }

    /// Flush everything and drop all runtime state (project switch or back to
    /// the project screen).
    pub fn clear_all(&mut self, store: &mut StoryStore, now: Instant) {
        self.save_all_windows(store, now);
        self.windows.clear();
        self.active = None;
        self.project_id = None;
        self.cascade_count = 0;
        self.drag = None;
        self.resize = None;
        self.pan_drag = None;
        self.view.reset();
    }

    // Windows

    pub fn open_window(&mut self, store: &mut StoryStore, id: FileId, viewport: Vec2, now: Instant) {
        self.spawn_window(store, id, viewport, now, false);
    }

    fn spawn_window(&mut self, store: &mut StoryStore, id: FileId, viewport: Vec2, now: Instant, restoring: bool) {
        if self.windows.contains_key(&id) {
            self.focus_window(id);
            return;
        }
        let Some(file) = store.db.file(id) else { return };
        if file.is_folder() {
            return;
        }

        let rect = match file.window {
            Some(g) => Rect::from_min_size(
                pos2(g.x, g.y),
                vec2(g.width.max(MIN_WINDOW_WIDTH), g.height.max(MIN_WINDOW_HEIGHT)),
            ),
            None => {
                let center = self.view.viewport_center_canvas(viewport);
                let n = self.cascade_count;
                self.cascade_count += 1;
                let x = center.x - DEFAULT_WINDOW_WIDTH / 2.0 + ((n * CASCADE_STEP) % CASCADE_WRAP_X) as f32;
                let y = center.y - DEFAULT_WINDOW_HEIGHT / 2.0 + ((n * CASCADE_STEP) % CASCADE_WRAP_Y) as f32;
                Rect::from_min_size(pos2(x, y), vec2(DEFAULT_WINDOW_WIDTH, DEFAULT_WINDOW_HEIGHT))
            }
        };

        self.open_counter += 1;
        let state = WindowState {
            file_id: id,
            title: file.name.clone(),
            buffer: file.content.clone(),
            dirty: false,
            rect,
            z: 0,
            stats: TextStats::of(&file.content),
            opened_seq: self.open_counter,
            autosave_due: None,
            saved_at: None,
            restore_rect: None,
        };
        self.windows.insert(id, state);
        self.focus_window(id);

        if !restoring {
            store.db.set_file_window(
                id,
                WindowGeometry {
                    is_open: true,
                    x: rect.min.x,
                    y: rect.min.y,
                    width: rect.width(),
                    height: rect.height(),
                },
            );
            self.persist_quiet(store, now);
        }
    }

    /// Flush-if-dirty, persist `is_open: false`, discard the runtime state and
    /// hand focus to the most recently opened survivor. A failing flush keeps
    /// the window (and its buffer) alive so nothing is silently lost.
    pub fn close_window(&mut self, store: &mut StoryStore, id: FileId, now: Instant) {
        let Some(win) = self.windows.get(&id) else { return };
        let dirty = win.dirty;
        if dirty {
            store.db.set_file_content(id, win.buffer.clone());
            if let Some(pid) = self.project_id {
                store.db.touch_project(pid);
            }
        }
        store.db.set_window_open(id, false);
        if let Err(e) = store.flush() {
            log::warn!("flush on close of {id} failed: {e}");
            if dirty {
                store.db.set_window_open(id, true);
                self.notify(format!("Save failed, window kept open: {e}"), NoticeKind::Error, now);
                return;
            }
            self.notify(format!("Could not record window state: {e}"), NoticeKind::Error, now);
        }

        self.windows.remove(&id);
        if self.active == Some(id) {
            self.active = None;
            let next = self.windows.values().max_by_key(|w| w.opened_seq).map(|w| w.file_id);
            if let Some(next) = next {
                self.focus_window(next);
            }
        }
    }

    /// Drop windows whose records were deleted elsewhere. No save: there is
    /// nothing left to save into.
    pub fn discard_windows_under(&mut self, ids: &[FileId]) {
        for id in ids {
            self.windows.remove(id);
        }
        if let Some(active) = self.active {
            if !self.windows.contains_key(&active) {
                self.active = self.windows.values().max_by_key(|w| w.opened_seq).map(|w| w.file_id);
            }
        }
    }

    pub fn focus_window(&mut self, id: FileId) -> bool {
        let Some(w) = self.windows.get_mut(&id) else { return false };
        self.z_counter += 1;
        w.z = self.z_counter;
        self.active = Some(id);
        true
    }

    /// Canvas-background click: clear focus, z order untouched.
    pub fn unfocus_all(&mut self) {
        self.active = None;
    }

    // Editing and saving

    /// Every content change lands here: replace the buffer, refresh the live
    /// counts, and re-arm this window's own autosave deadline. Re-arming on
    /// each edit is the whole debounce.
    pub fn edit(&mut self, id: FileId, text: String, settings: &EditorSettings, now: Instant) {
        let Some(w) = self.windows.get_mut(&id) else { return };
        w.buffer = text;
        w.dirty = true;
        w.stats = TextStats::of(&w.buffer);
        w.autosave_due = settings.auto_save.then(|| now + AUTOSAVE_DELAY);
    }

    /// Fire due autosaves and expire transient indicators.
    pub fn tick(&mut self, store: &mut StoryStore, settings: &EditorSettings, now: Instant) {
        let due: Vec<FileId> = self
            .windows
            .iter()
            .filter(|(_, w)| w.autosave_due.is_some_and(|t| t <= now))
            .map(|(id, _)| *id)
            .collect();
        for id in due {
            if let Some(w) = self.windows.get_mut(&id) {
                w.autosave_due = None;
            }
            self.save_window(store, id, SaveKind::Automatic, settings, now);
        }

        if self.notice.as_ref().is_some_and(|n| now.duration_since(n.since) > NOTICE_TTL) {
            self.notice = None;
        }
        if self.zoom_hud_until.is_some_and(|t| t <= now) {
            self.zoom_hud_until = None;
        }
    }

    pub fn save_window(
        &mut self,
        store: &mut StoryStore,
        id: FileId,
        kind: SaveKind,
        settings: &EditorSettings,
        now: Instant,
    ) {
        if kind == SaveKind::Automatic && !settings.auto_save {
            return;
        }
        self.flush_window(store, id, kind, now);
    }

    pub fn save_active_window(&mut self, store: &mut StoryStore, now: Instant) {
        if let Some(id) = self.active {
            self.flush_window(store, id, SaveKind::Manual, now);
        }
    }

    /// Project-switch guard: every open window is written through before the
    /// caller proceeds, whatever the autosave setting says.
    pub fn save_all_windows(&mut self, store: &mut StoryStore, now: Instant) {
        let ids: Vec<FileId> = self.windows.keys().copied().collect();
        for id in ids {
            self.flush_window(store, id, SaveKind::Automatic, now);
        }
    }

    fn flush_window(&mut self, store: &mut StoryStore, id: FileId, kind: SaveKind, now: Instant) {
        let Some(content) = self.windows.get(&id).map(|w| w.buffer.clone()) else {
            return;
        };
        if !store.db.set_file_content(id, content) {
            // The record raced away (deleted elsewhere); drop the write
            return;
        }
        if let Some(pid) = self.project_id {
            store.db.touch_project(pid);
        }
        match store.flush() {
            Ok(()) => {
                if let Some(w) = self.windows.get_mut(&id) {
                    w.dirty = false;
                    w.autosave_due = None;
                    w.saved_at = Some((kind, now));
                }
                if kind == SaveKind::Manual {
                    self.notify("Saved.", NoticeKind::Info, now);
                }
            }
            Err(e) => {
                // Dirty stays set; the next manual save or autosave tick retries
                log::warn!("saving {id} failed: {e}");
                self.notify(format!("Save failed: {e}"), NoticeKind::Error, now);
            }
        }
    }

    // Pointer interactions

    pub fn interaction_active(&self) -> bool {
        self.drag.is_some() || self.resize.is_some() || self.pan_drag.is_some()
    }

    /// Title-bar drag. `pointer` is in viewport-local screen pixels.
    pub fn begin_window_drag(&mut self, id: FileId, pointer: Pos2) {
        if self.interaction_active() {
            return;
        }
        let Some(w) = self.windows.get(&id) else { return };
        self.drag = Some(DragState { file_id: id, start: pointer, orig: w.rect.min });
        self.focus_window(id);
    }

    pub fn begin_window_resize(&mut self, id: FileId, dir: ResizeDir, pointer: Pos2) {
        if self.interaction_active() {
            return;
        }
        let Some(w) = self.windows.get(&id) else { return };
        self.resize = Some(ResizeState { file_id: id, dir, start: pointer, orig: w.rect });
        self.focus_window(id);
    }

    /// Secondary-button drag on empty canvas.
    pub fn begin_pan(&mut self, pointer: Pos2) {
        if self.interaction_active() {
            return;
        }
        self.pan_drag = Some(PanState { start: pointer, orig_pan: self.view.pan });
    }

    pub fn pointer_moved(&mut self, pointer: Pos2) {
        if let Some(d) = &self.drag {
            // Inverse-zoom scaling keeps the drag 1:1 under the pointer
            let delta = (pointer - d.start) / self.view.scale;
            let (file_id, origin) = (d.file_id, d.orig);
            if let Some(w) = self.windows.get_mut(&file_id) {
                w.rect = Rect::from_min_size(origin + delta, w.rect.size());
            }
        } else if let Some(r) = &self.resize {
            let delta = (pointer - r.start) / self.view.scale;
            let rect = resize_rect(r.orig, r.dir, delta);
            let file_id = r.file_id;
            if let Some(w) = self.windows.get_mut(&file_id) {
                w.rect = rect;
            }
        } else if let Some(p) = &self.pan_drag {
            self.view.pan = p.orig_pan + (pointer - p.start);
        }
    }

    /// Pointer release: persist whatever the interaction produced.
    pub fn end_interaction(&mut self, store: &mut StoryStore, now: Instant) {
        if let Some(d) = self.drag.take() {
            self.persist_geometry(store, d.file_id, now);
        } else if let Some(r) = self.resize.take() {
            self.persist_geometry(store, r.file_id, now);
        } else if self.pan_drag.take().is_some() {
            self.persist_canvas(store, now);
        }
    }

    // Canvas view

    pub fn zoom_at(&mut self, store: &mut StoryStore, pointer: Pos2, delta: f32, now: Instant) {
        if self.view.zoom_at(pointer, delta) {
            self.zoom_hud_until = Some(now + ZOOM_HUD_TTL);
            self.persist_canvas(store, now);
        }
    }

    pub fn reset_view(&mut self, store: &mut StoryStore, now: Instant) {
        self.view.reset();
        self.zoom_hud_until = Some(now + ZOOM_HUD_TTL);
        self.persist_canvas(store, now);
    }

    pub fn zoom_hud_visible(&self, now: Instant) -> bool {
        self.zoom_hud_until.is_some_and(|t| now < t)
    }

    /// One-level maximize toggle. `container` is the visible canvas area in
    /// canvas coordinates.
    pub fn toggle_maximize(&mut self, id: FileId, container: Rect) {
        let Some(w) = self.windows.get_mut(&id) else { return };
        match w.restore_rect.take() {
            Some(prev) => w.rect = prev,
            None => {
                w.restore_rect = Some(w.rect);
                w.rect = container.shrink(MAXIMIZE_MARGIN);
            }
        }
    }

    // Notices

    pub fn notify(&mut self, message: impl Into<String>, kind: NoticeKind, now: Instant) {
        self.notice = Some(Notice { message: message.into(), kind, since: now });
    }

    pub fn notice(&self, now: Instant) -> Option<&Notice> {
        self.notice
            .as_ref()
            .filter(|n| now.duration_since(n.since) <= NOTICE_TTL)
    }

    // Accessors

    pub fn window(&self, id: FileId) -> Option<&WindowState> {
        self.windows.get(&id)
    }

    pub fn is_open(&self, id: FileId) -> bool {
        self.windows.contains_key(&id)
    }

    pub fn open_count(&self) -> usize {
        self.windows.len()
    }

    /// Back-to-front paint order.
    pub fn windows_by_z(&self) -> Vec<&WindowState> {
        let mut all: Vec<&WindowState> = self.windows.values().collect();
        all.sort_by_key(|w| w.z);
        all
    }

    pub fn active_id(&self) -> Option<FileId> {
        self.active
    }

    pub fn active_window(&self) -> Option<&WindowState> {
        self.active.and_then(|id| self.windows.get(&id))
    }

    /// Live buffer of the focused window, for the stats panel.
    pub fn active_text(&self) -> Option<&str> {
        self.active_window().map(|w| w.buffer.as_str())
    }

    pub fn live_text(&self, id: FileId) -> Option<&str> {
        self.windows.get(&id).map(|w| w.buffer.as_str())
    }

    /// Case-sensitive substring search across a project's files. Open windows
    /// are searched through their live buffers, closed files through their
    /// stored content, so unsaved edits still show up.
    pub fn search_project(
        &self,
        store: &StoryStore,
        project_id: ProjectId,
        query: &str,
    ) -> Vec<SearchHit> {
        let mut hits = Vec::new();
        if query.is_empty() {
            return hits;
        }
        for f in store.db.files_for_project(project_id) {
            if f.kind != FileKind::File {
                continue;
            }
            let text = self.live_text(f.id).unwrap_or(&f.content);
            for (i, line) in text.lines().enumerate() {
                if line.contains(query) {
                    hits.push(SearchHit {
                        file_id: f.id,
                        file_name: f.name.clone(),
                        line_no: i + 1,
                        line: line.to_string(),
                    });
                }
            }
        }
        hits.sort_by(|a, b| a.file_name.cmp(&b.file_name).then(a.line_no.cmp(&b.line_no)));
        hits
    }

    fn persist_geometry(&mut self, store: &mut StoryStore, id: FileId, now: Instant) {
        let Some(w) = self.windows.get(&id) else { return };
        let r = w.rect;
        if store.db.set_file_window(
            id,
            WindowGeometry {
                is_open: true,
                x: r.min.x,
                y: r.min.y,
                width: r.width(),
                height: r.height(),
            },
        ) {
            self.persist_quiet(store, now);
        }
    }

    fn persist_canvas(&mut self, store: &mut StoryStore, now: Instant) {
        if let Some(pid) = self.project_id {
            if store.db.set_project_canvas(pid, self.view.state()) {
                self.persist_quiet(store, now);
            }
        }
    }

    fn persist_quiet(&mut self, store: &StoryStore, now: Instant) {
        if let Err(e) = store.flush() {
            log::warn!("state flush failed: {e}");
            self.notify(format!("Could not write state: {e}"), NoticeKind::Error, now);
        }
    }
}

fn resize_rect(orig: Rect, dir: ResizeDir, delta: Vec2) -> Rect {
    let mut x = orig.min.x;
    let mut y = orig.min.y;
    let mut w = orig.width();
    let mut h = orig.height();
    if dir.has_east() {
        w = (orig.width() + delta.x).max(MIN_WINDOW_WIDTH);
    }
    if dir.has_west() {
        w = (orig.width() - delta.x).max(MIN_WINDOW_WIDTH);
        x = orig.min.x + (orig.width() - w);
    }
    if dir.has_south() {
        h = (orig.height() + delta.y).max(MIN_WINDOW_HEIGHT);
    }
    if dir.has_north() {
        h = (orig.height() - delta.y).max(MIN_WINDOW_HEIGHT);
        y = orig.min.y + (orig.height() - h);
    }
    Rect::from_min_size(pos2(x, y), vec2(w, h))
}
