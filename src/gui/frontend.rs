#![allow(clippy::collapsible_if)]
#![allow(clippy::too_many_arguments)]
use std::collections::HashSet;
use std::time::{Duration, Instant};

use eframe::egui::{self, Color32, CursorIcon, FontId, Pos2, Rect, Sense, Stroke, Vec2};

use crate::outline::{self, DropZone, OutlineView};
use crate::persistence::settings::{EditorSettings, FontChoice};
use crate::stats::manuscript_paragraphs;
use crate::store::records::{FileId, FileKind, MemoId, ProjectId, TemplateId, TemplateRef};
use crate::store::StoryStore;
use crate::timer::{format_hms, TimerEvent, TimerMode, WritingTimer};
use crate::workspace::{
    NoticeKind, ResizeDir, SaveKind, SearchHit, Workspace, KEY_ZOOM_STEP, WHEEL_ZOOM_STEP,
};

const TITLEBAR_HEIGHT: f32 = 30.0;
const STATUSBAR_HEIGHT: f32 = 22.0;
const RESIZE_HANDLE: f32 = 6.0;

const FILE_GLYPH: &str = "\u{1F4C4}";
const FOLDER_GLYPH: &str = "\u{1F4C1}";
const FOLDER_OPEN_GLYPH: &str = "\u{1F4C2}";
const PROJECT_GLYPH: &str = "\u{1F4DA}";

#[derive(Clone, Copy, PartialEq, Eq)]
enum Screen {
    Projects,
    Editor,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum ToolsTab {
    Stats,
    Timer,
    Memos,
    Search,
    Settings,
}

struct NewItemModal {
    kind: FileKind,
    parent: Option<FileId>,
    name: String,
    template: Option<TemplateRef>,
    error: Option<String>,
}

struct RenameItemModal {
    id: FileId,
    kind: FileKind,
    name: String,
    template: Option<TemplateRef>,
    error: Option<String>,
}

struct MemoModal {
    id: Option<MemoId>,
    content: String,
    error: Option<String>,
}

#[derive(Default)]
struct TemplateEditor {
    selected: Option<TemplateId>,
    editing: bool,
    name: String,
    icon: String,
    content: String,
    error: Option<String>,
}

/// Deferred mutations collected while painting windows, applied after the
/// iteration so the registry is never mutated mid-borrow.
enum WindowAction {
    Focus(FileId),
    Close(FileId),
    ToggleMax(FileId),
    Edited(FileId, String),
    BeginDrag(FileId, Pos2),
    BeginResize(FileId, ResizeDir, Pos2),
}

/// A flattened tree row, precomputed so rendering never borrows the database.
struct TreeRow {
    id: FileId,
    name: String,
    kind: FileKind,
    depth: usize,
    has_children: bool,
    expanded: bool,
}

enum TreeAction {
    Toggle(FileId),
    OpenFile(FileId),
    NewChild(FileId, FileKind),
    Rename(FileId),
    Delete(FileId),
    Drop(FileId, FileId, DropZone),
    DropToRoot(FileId),
}

pub struct StoryApp {
    store: StoryStore,
    // Committed settings drive behavior; the working copy drives visuals so
    // the settings tab can live-preview before an explicit save
    settings: EditorSettings,
    temp_settings: EditorSettings,
    workspace: Workspace,
    outline: OutlineView,
    screen: Screen,
    current_project: Option<ProjectId>,
    timer: WritingTimer,
    tools_tab: ToolsTab,
    last_canvas_size: Vec2,

    // Modal state
    new_project: Option<(String, Option<String>)>,
    edit_project: Option<(ProjectId, String, Option<String>)>,
    confirm_delete_project: Option<ProjectId>,
    new_item: Option<NewItemModal>,
    rename_item: Option<RenameItemModal>,
    confirm_delete_item: Option<FileId>,
    memo_modal: Option<MemoModal>,
    memo_manage: bool,
    memo_selection: HashSet<MemoId>,
    template_editor: TemplateEditor,
    show_templates: bool,
    search_query: String,
    search_results: Vec<SearchHit>,
    searched: bool,
}

impl Default for StoryApp {
    fn default() -> Self {
        Self::new()
    }
}

impl StoryApp {
    pub fn new() -> Self {
        Self::with_store(StoryStore::open_default())
    }

    /// Entry point with an explicit state file location.
    pub fn with_store(store: StoryStore) -> Self {
        let settings = EditorSettings::load().unwrap_or_else(|e| {
            log::warn!("could not load settings: {e}");
            EditorSettings::default()
        });
        Self {
            store,
            temp_settings: settings.clone(),
            settings,
            workspace: Workspace::new(),
            outline: OutlineView::default(),
            screen: Screen::Projects,
            current_project: None,
            timer: WritingTimer::default(),
            tools_tab: ToolsTab::Stats,
            last_canvas_size: Vec2::new(1040.0, 680.0),
            new_project: None,
            edit_project: None,
            confirm_delete_project: None,
            new_item: None,
            rename_item: None,
            confirm_delete_item: None,
            memo_modal: None,
            memo_manage: false,
            memo_selection: HashSet::new(),
            template_editor: TemplateEditor::default(),
            show_templates: false,
            search_query: String::new(),
            search_results: Vec::new(),
            searched: false,
        }
    }

    fn flush_notify(&mut self, now: Instant) {
        if let Err(e) = self.store.flush() {
            log::warn!("state flush failed: {e}");
            self.workspace
                .notify(format!("Could not write state: {e}"), NoticeKind::Error, now);
        }
    }

    fn enter_project(&mut self, id: ProjectId, now: Instant) {
        self.current_project = Some(id);
        self.outline.clear();
        self.search_query.clear();
        self.search_results.clear();
        self.searched = false;
        self.memo_selection.clear();
        self.memo_manage = false;
        self.workspace.open_project(&mut self.store, id, self.last_canvas_size, now);
        self.screen = Screen::Editor;
    }

    fn back_to_projects(&mut self, now: Instant) {
        self.workspace.clear_all(&mut self.store, now);
        self.current_project = None;
        self.outline.clear();
        self.screen = Screen::Projects;
    }

    fn settings_in_effect(&self) -> &EditorSettings {
        if self.tools_tab == ToolsTab::Settings {
            &self.temp_settings
        } else {
            &self.settings
        }
    }
}

impl eframe::App for StoryApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now = Instant::now();
        if self.screen == Screen::Editor {
            self.workspace.tick(&mut self.store, &self.settings, now);
            if let Some(TimerEvent::Finished) = self.timer.tick(now) {
                self.workspace.notify("Time is up!", NoticeKind::Info, now);
            }
            // Debounce deadlines and indicator expiries need the loop alive
            ctx.request_repaint_after(Duration::from_millis(200));
        }

        match self.screen {
            Screen::Projects => self.ui_projects(ctx, now),
            Screen::Editor => self.ui_editor(ctx, now),
        }

        self.ui_modals(ctx, now);
        self.ui_toast(ctx, now);
    }
}

// Project screen

impl StoryApp {
    fn ui_projects(&mut self, ctx: &egui::Context, now: Instant) {
        egui::TopBottomPanel::top("projects_top").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label("Story-Loom");
                ui.separator();
                ui.label("Your projects");
            });
        });

        let mut open_request: Option<ProjectId> = None;
        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| {
                ui.add_space(8.0);
                let cards: Vec<(ProjectId, String, i64)> = self
                    .store
                    .db
                    .projects_by_recency()
                    .iter()
                    .map(|p| (p.id, p.name.clone(), p.updated_at))
                    .collect();
                ui.horizontal_wrapped(|ui| {
                    for (id, name, updated_at) in &cards {
                        let (rect, resp) =
                            ui.allocate_exact_size(Vec2::new(190.0, 150.0), Sense::click());
                        let painter = ui.painter_at(rect.expand(2.0));
                        let fill = if resp.hovered() {
                            ui.visuals().widgets.hovered.bg_fill
                        } else {
                            ui.visuals().extreme_bg_color
                        };
                        painter.rect_filled(rect, 8.0, fill);
                        painter.text(
                            rect.center_top() + Vec2::new(0.0, 40.0),
                            egui::Align2::CENTER_CENTER,
                            PROJECT_GLYPH,
                            FontId::proportional(32.0),
                            ui.visuals().text_color(),
                        );
                        painter.text(
                            rect.center_bottom() + Vec2::new(0.0, -38.0),
                            egui::Align2::CENTER_CENTER,
                            name,
                            FontId::proportional(15.0),
                            ui.visuals().strong_text_color(),
                        );
                        painter.text(
                            rect.center_bottom() + Vec2::new(0.0, -18.0),
                            egui::Align2::CENTER_CENTER,
                            format_date(*updated_at),
                            FontId::proportional(11.0),
                            ui.visuals().weak_text_color(),
                        );
                        if resp.clicked() {
                            open_request = Some(*id);
                        }
                        resp.context_menu(|ui| {
                            if ui.button("Rename").clicked() {
                                self.edit_project = Some((*id, name.clone(), None));
                                ui.close();
                            }
                            if ui.button("Delete").clicked() {
                                self.confirm_delete_project = Some(*id);
                                ui.close();
                            }
                        });
                    }

                    // Trailing "new project" card
                    let (rect, resp) =
                        ui.allocate_exact_size(Vec2::new(190.0, 150.0), Sense::click());
                    let painter = ui.painter_at(rect.expand(2.0));
                    painter.rect_stroke(
                        rect,
                        8.0,
                        Stroke::new(1.0, ui.visuals().weak_text_color()),
                        egui::StrokeKind::Inside,
                    );
                    painter.text(
                        rect.center() - Vec2::new(0.0, 10.0),
                        egui::Align2::CENTER_CENTER,
                        "+",
                        FontId::proportional(30.0),
                        ui.visuals().text_color(),
                    );
                    painter.text(
                        rect.center() + Vec2::new(0.0, 22.0),
                        egui::Align2::CENTER_CENTER,
                        "New project",
                        FontId::proportional(13.0),
                        ui.visuals().weak_text_color(),
                    );
                    if resp.clicked() {
                        self.new_project = Some((String::new(), None));
                    }
                });
            });
        });

        if let Some(id) = open_request {
            self.enter_project(id, now);
        }
    }
}

// Editor screen

impl StoryApp {
    fn ui_editor(&mut self, ctx: &egui::Context, now: Instant) {
        let Some(project_id) = self.current_project else {
            self.screen = Screen::Projects;
            return;
        };

        egui::TopBottomPanel::top("editor_top").show(ctx, |ui| {
            if ctx.input_mut(|i| {
                i.consume_shortcut(&egui::KeyboardShortcut::new(egui::Modifiers::COMMAND, egui::Key::S))
            }) {
                self.workspace.save_active_window(&mut self.store, now);
            }
            if ctx.input_mut(|i| {
                i.consume_shortcut(&egui::KeyboardShortcut::new(egui::Modifiers::COMMAND, egui::Key::Num0))
            }) {
                self.workspace.reset_view(&mut self.store, now);
            }

            ui.horizontal(|ui| {
                if ui.button("\u{2190} Projects").clicked() {
                    self.back_to_projects(now);
                    return;
                }
                let name = self
                    .store
                    .db
                    .project(project_id)
                    .map(|p| p.name.clone())
                    .unwrap_or_default();
                ui.label(egui::RichText::new(name).strong());
                ui.separator();
                if ui
                    .add(egui::Button::new("Save").shortcut_text(ctx.format_shortcut(
                        &egui::KeyboardShortcut::new(egui::Modifiers::COMMAND, egui::Key::S),
                    )))
                    .clicked()
                {
                    self.workspace.save_active_window(&mut self.store, now);
                }
                if ui.button("Save all").clicked() {
                    self.workspace.save_all_windows(&mut self.store, now);
                }
                ui.separator();
                ui.small(format!("{:.0}%", self.workspace.view.scale * 100.0));
                if ui.small_button("Reset view").clicked() {
                    self.workspace.reset_view(&mut self.store, now);
                }
            });
        });

        if self.screen != Screen::Editor {
            return;
        }

        self.ui_tree_panel(ctx, project_id, now);
        self.ui_tools_panel(ctx, project_id, now);
        self.ui_canvas(ctx, now);
    }

    // File tree (left panel)

    fn ui_tree_panel(&mut self, ctx: &egui::Context, project_id: ProjectId, now: Instant) {
        let mut actions: Vec<TreeAction> = Vec::new();

        egui::SidePanel::left("file_tree")
            .resizable(true)
            .default_width(230.0)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.label("Files");
                    if ui.small_button("+ File").clicked() {
                        self.new_item = Some(NewItemModal {
                            kind: FileKind::File,
                            parent: None,
                            name: String::new(),
                            template: None,
                            error: None,
                        });
                    }
                    if ui.small_button("+ Folder").clicked() {
                        self.new_item = Some(NewItemModal {
                            kind: FileKind::Folder,
                            parent: None,
                            name: String::new(),
                            template: None,
                            error: None,
                        });
                    }
                });
                ui.separator();

                let rows = self.tree_rows(project_id);
                let released = ui.input(|i| i.pointer.any_released());

                egui::ScrollArea::vertical().show(ui, |ui| {
                    if rows.is_empty() {
                        ui.weak("No files yet.");
                    }
                    for row in &rows {
                        self.ui_tree_row(ui, row, released, &mut actions);
                    }

                    // Remaining panel space doubles as the root drop target
                    let leftover = ui.available_rect_before_wrap();
                    if leftover.height() > 4.0 {
                        let resp = ui.allocate_rect(leftover, Sense::hover());
                        if let Some(dragged) = self.outline.dragged {
                            if resp.hovered() && released {
                                actions.push(TreeAction::DropToRoot(dragged));
                            }
                        }
                    }
                });

                if released {
                    self.outline.dragged = None;
                }
            });

        for action in actions {
            self.apply_tree_action(action, project_id, now);
        }
    }

    fn tree_rows(&self, project_id: ProjectId) -> Vec<TreeRow> {
        fn push_children(
            db: &crate::store::StoryDatabase,
            outline: &OutlineView,
            project_id: ProjectId,
            parent: Option<FileId>,
            depth: usize,
            rows: &mut Vec<TreeRow>,
        ) {
            for f in db.ordered_children(project_id, parent) {
                let has_children =
                    f.is_folder() && !db.ordered_children(project_id, Some(f.id)).is_empty();
                let expanded = outline.expanded.contains(&f.id);
                rows.push(TreeRow {
                    id: f.id,
                    name: f.name.clone(),
                    kind: f.kind,
                    depth,
                    has_children,
                    expanded,
                });
                if f.is_folder() && expanded {
                    push_children(db, outline, project_id, Some(f.id), depth + 1, rows);
                }
            }
        }
        let mut rows = Vec::new();
        push_children(&self.store.db, &self.outline, project_id, None, 0, &mut rows);
        rows
    }

    fn ui_tree_row(
        &mut self,
        ui: &mut egui::Ui,
        row: &TreeRow,
        released: bool,
        actions: &mut Vec<TreeAction>,
    ) {
        let row_height = 22.0;
        let full_width = ui.available_width();
        let (rect, resp) =
            ui.allocate_exact_size(Vec2::new(full_width, row_height), Sense::click_and_drag());
        let painter = ui.painter_at(rect);

        let selected = self.workspace.active_id() == Some(row.id);
        if selected {
            painter.rect_filled(rect, 4.0, ui.visuals().selection.bg_fill.linear_multiply(0.4));
        } else if resp.hovered() {
            painter.rect_filled(rect, 4.0, ui.visuals().widgets.hovered.weak_bg_fill);
        }

        let indent = 14.0 * row.depth as f32 + 6.0;
        let mut x = rect.min.x + indent;
        if row.has_children {
            let chevron = if row.expanded { "\u{25BC}" } else { "\u{25B6}" };
            painter.text(
                Pos2::new(x, rect.center().y),
                egui::Align2::LEFT_CENTER,
                chevron,
                FontId::proportional(9.0),
                ui.visuals().weak_text_color(),
            );
        }
        x += 14.0;
        let glyph = match row.kind {
            FileKind::Folder if row.expanded && row.has_children => FOLDER_OPEN_GLYPH,
            FileKind::Folder => FOLDER_GLYPH,
            FileKind::File => FILE_GLYPH,
        };
        painter.text(
            Pos2::new(x, rect.center().y),
            egui::Align2::LEFT_CENTER,
            glyph,
            FontId::proportional(13.0),
            ui.visuals().text_color(),
        );
        x += 20.0;
        painter.text(
            Pos2::new(x, rect.center().y),
            egui::Align2::LEFT_CENTER,
            &row.name,
            FontId::proportional(13.0),
            ui.visuals().text_color(),
        );

        // Drag source
        if resp.drag_started() {
            self.outline.dragged = Some(row.id);
        }

        // Drop target classification while something else is being dragged
        if let Some(dragged) = self.outline.dragged {
            if dragged != row.id && resp.hovered() {
                if let Some(ptr) = ui.ctx().pointer_hover_pos() {
                    let zone = outline::drop_zone(
                        row.kind == FileKind::Folder,
                        ptr.y - rect.min.y,
                        rect.height(),
                    );
                    let accent = ui.visuals().selection.stroke.color;
                    match zone {
                        DropZone::Into => {
                            painter.rect_stroke(
                                rect,
                                4.0,
                                Stroke::new(1.5, accent),
                                egui::StrokeKind::Inside,
                            );
                        }
                        DropZone::Before => {
                            painter.hline(rect.x_range(), rect.min.y, Stroke::new(2.0, accent));
                        }
                        DropZone::After => {
                            painter.hline(rect.x_range(), rect.max.y, Stroke::new(2.0, accent));
                        }
                    }
                    if released {
                        actions.push(TreeAction::Drop(dragged, row.id, zone));
                    }
                }
            }
        }

        if resp.clicked() {
            match row.kind {
                FileKind::Folder => {
                    if row.has_children {
                        actions.push(TreeAction::Toggle(row.id));
                    }
                }
                FileKind::File => actions.push(TreeAction::OpenFile(row.id)),
            }
        }

        resp.context_menu(|ui| {
            if row.kind == FileKind::Folder {
                if ui.button("New file").clicked() {
                    actions.push(TreeAction::NewChild(row.id, FileKind::File));
                    ui.close();
                }
                if ui.button("New folder").clicked() {
                    actions.push(TreeAction::NewChild(row.id, FileKind::Folder));
                    ui.close();
                }
                ui.separator();
            }
            if ui.button("Rename").clicked() {
                actions.push(TreeAction::Rename(row.id));
                ui.close();
            }
            ui.separator();
            if ui.button("Delete").clicked() {
                actions.push(TreeAction::Delete(row.id));
                ui.close();
            }
        });
    }

    fn apply_tree_action(&mut self, action: TreeAction, project_id: ProjectId, now: Instant) {
        match action {
            TreeAction::Toggle(id) => self.outline.toggle(id),
            TreeAction::OpenFile(id) => {
                self.workspace
                    .open_window(&mut self.store, id, self.last_canvas_size, now);
            }
            TreeAction::NewChild(parent, kind) => {
                // Inherit the folder's default template for new files
                let template = self.store.db.file(parent).and_then(|f| f.default_template);
                self.new_item = Some(NewItemModal {
                    kind,
                    parent: Some(parent),
                    name: String::new(),
                    template,
                    error: None,
                });
            }
            TreeAction::Rename(id) => {
                if let Some(f) = self.store.db.file(id) {
                    self.rename_item = Some(RenameItemModal {
                        id,
                        kind: f.kind,
                        name: f.name.clone(),
                        template: f.default_template,
                        error: None,
                    });
                }
            }
            TreeAction::Delete(id) => {
                self.confirm_delete_item = Some(id);
            }
            TreeAction::Drop(dragged, target, zone) => {
                match outline::reparent(&mut self.store.db, dragged, target, zone) {
                    Ok(()) => {
                        if zone == DropZone::Into {
                            self.outline.expanded.insert(target);
                        }
                        self.store.db.touch_project(project_id);
                        self.flush_notify(now);
                    }
                    Err(e) => {
                        self.workspace.notify(e.to_string(), NoticeKind::Error, now);
                    }
                }
            }
            TreeAction::DropToRoot(dragged) => {
                outline::move_to_root_end(&mut self.store.db, dragged);
                self.store.db.touch_project(project_id);
                self.flush_notify(now);
            }
        }
    }

    // Tools (right panel)

    fn ui_tools_panel(&mut self, ctx: &egui::Context, project_id: ProjectId, now: Instant) {
        egui::SidePanel::right("tools_panel")
            .resizable(true)
            .default_width(260.0)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    for (tab, label) in [
                        (ToolsTab::Stats, "Stats"),
                        (ToolsTab::Timer, "Timer"),
                        (ToolsTab::Memos, "Memos"),
                        (ToolsTab::Search, "Search"),
                        (ToolsTab::Settings, "Settings"),
                    ] {
                        if ui.selectable_label(self.tools_tab == tab, label).clicked() {
                            self.tools_tab = tab;
                        }
                    }
                });
                ui.separator();
                egui::ScrollArea::vertical().show(ui, |ui| match self.tools_tab {
                    ToolsTab::Stats => self.ui_stats_tab(ui, project_id),
                    ToolsTab::Timer => self.ui_timer_tab(ui, now),
                    ToolsTab::Memos => self.ui_memos_tab(ui, project_id, now),
                    ToolsTab::Search => self.ui_search_tab(ui, project_id, now),
                    ToolsTab::Settings => self.ui_settings_tab(ui, now),
                });
            });
    }

    fn ui_stats_tab(&mut self, ui: &mut egui::Ui, project_id: ProjectId) {
        // Open windows contribute their live buffers; closed files their
        // stored content
        let mut total = String::new();
        for f in self.store.db.files_for_project(project_id) {
            if f.kind != FileKind::File {
                continue;
            }
            let text = self.workspace.live_text(f.id).unwrap_or(&f.content);
            if !text.is_empty() {
                total.push_str(text);
                total.push('\n');
            }
        }
        let chars = total.chars().count();
        let no_space = total.chars().filter(|c| !c.is_whitespace()).count();
        let words = total.split_whitespace().count();
        let paragraphs = manuscript_paragraphs(&total);

        ui.heading("Project");
        egui::Grid::new("project_stats").num_columns(2).show(ui, |ui| {
            ui.label("Characters");
            ui.label(chars.to_string());
            ui.end_row();
            ui.label("Without spaces");
            ui.label(no_space.to_string());
            ui.end_row();
            ui.label("Words");
            ui.label(words.to_string());
            ui.end_row();
            ui.label("Paragraphs");
            ui.label(paragraphs.to_string());
            ui.end_row();
        });

        if let Some(w) = self.workspace.active_window() {
            ui.separator();
            ui.heading("Focused window");
            egui::Grid::new("window_stats").num_columns(2).show(ui, |ui| {
                ui.label("Characters");
                ui.label(w.stats.chars.to_string());
                ui.end_row();
                ui.label("Words");
                ui.label(w.stats.words.to_string());
                ui.end_row();
                ui.label("Sentences");
                ui.label(w.stats.sentences.to_string());
                ui.end_row();
                ui.label("Paragraphs");
                ui.label(w.stats.paragraphs.to_string());
                ui.end_row();
            });
        }
    }

    fn ui_timer_tab(&mut self, ui: &mut egui::Ui, now: Instant) {
        ui.horizontal(|ui| {
            for (mode, label) in [
                (TimerMode::Stopwatch, "Stopwatch"),
                (TimerMode::Pomodoro, "Pomodoro"),
                (TimerMode::Custom, "Timer"),
            ] {
                if ui.selectable_label(self.timer.mode() == mode, label).clicked()
                    && self.timer.mode() != mode
                {
                    self.timer.set_mode(mode);
                }
            }
        });
        ui.add_space(6.0);

        if self.timer.mode() == TimerMode::Custom && !self.timer.is_running() {
            let mut minutes = self.timer.custom_minutes;
            ui.horizontal(|ui| {
                ui.label("Minutes:");
                if ui.add(egui::DragValue::new(&mut minutes).range(1..=999)).changed() {
                    self.timer.set_custom_minutes(minutes);
                }
            });
        }

        ui.vertical_centered(|ui| {
            ui.label(
                egui::RichText::new(format_hms(self.timer.display(now)))
                    .font(FontId::monospace(30.0)),
            );
        });
        ui.add_space(6.0);
        ui.horizontal(|ui| {
            let toggle = if self.timer.is_running() { "Pause" } else { "Start" };
            if ui.button(toggle).clicked() {
                if self.timer.is_running() {
                    self.timer.pause(now);
                } else {
                    self.timer.start(now);
                }
            }
            if ui.button("Reset").clicked() {
                self.timer.reset();
            }
        });
        if self.timer.is_running() {
            ui.ctx().request_repaint_after(Duration::from_millis(100));
        }
        ui.add_space(8.0);
        ui.weak(match self.timer.mode() {
            TimerMode::Pomodoro => "25 minutes on, then take five.",
            _ => "Track the time you spend in the story.",
        });
    }

    fn ui_memos_tab(&mut self, ui: &mut egui::Ui, project_id: ProjectId, now: Instant) {
        let memos: Vec<(MemoId, String, i64)> = self
            .store
            .db
            .memos_for_project(project_id)
            .iter()
            .map(|m| (m.id, m.content.clone(), m.updated_at))
            .collect();

        ui.horizontal(|ui| {
            if ui.button("+ New memo").clicked() {
                self.memo_modal = Some(MemoModal { id: None, content: String::new(), error: None });
            }
            if !memos.is_empty() {
                let label = if self.memo_manage { "Done" } else { "Manage" };
                if ui.button(label).clicked() {
                    self.memo_manage = !self.memo_manage;
                    self.memo_selection.clear();
                }
            }
        });

        if self.memo_manage && !self.memo_selection.is_empty() {
            if ui
                .button(format!("Delete {} selected", self.memo_selection.len()))
                .clicked()
            {
                let ids: Vec<MemoId> = self.memo_selection.drain().collect();
                let removed = self.store.db.delete_memos(&ids);
                self.flush_notify(now);
                self.workspace
                    .notify(format!("Deleted {removed} memos."), NoticeKind::Info, now);
            }
        }
        ui.add_space(4.0);

        if memos.is_empty() {
            ui.weak("No memos yet.");
        }
        for (id, content, updated_at) in &memos {
            let preview: String = content.lines().take(4).collect::<Vec<_>>().join("\n");
            ui.horizontal(|ui| {
                if self.memo_manage {
                    let mut checked = self.memo_selection.contains(id);
                    if ui.checkbox(&mut checked, "").changed() {
                        if checked {
                            self.memo_selection.insert(*id);
                        } else {
                            self.memo_selection.remove(id);
                        }
                    }
                }
                ui.vertical(|ui| {
                    ui.small(format_date(*updated_at));
                    if ui.link(preview).clicked() && !self.memo_manage {
                        self.memo_modal = Some(MemoModal {
                            id: Some(*id),
                            content: content.clone(),
                            error: None,
                        });
                    }
                });
            });
            ui.separator();
        }
    }

    fn ui_search_tab(&mut self, ui: &mut egui::Ui, project_id: ProjectId, now: Instant) {
        let mut run_search = false;
        ui.horizontal(|ui| {
            let resp = ui.text_edit_singleline(&mut self.search_query);
            if resp.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
                run_search = true;
            }
            if ui.button("Search").clicked() {
                run_search = true;
            }
        });
        if run_search && !self.search_query.trim().is_empty() {
            self.search_results =
                self.workspace
                    .search_project(&self.store, project_id, &self.search_query);
            self.searched = true;
        }

        ui.add_space(4.0);
        if self.searched && self.search_results.is_empty() {
            ui.weak("No matches.");
        }
        let mut open_hit: Option<FileId> = None;
        for hit in &self.search_results {
            ui.small(format!("{}:{}", hit.file_name, hit.line_no));
            if ui.link(hit.line.trim()).clicked() {
                open_hit = Some(hit.file_id);
            }
            ui.separator();
        }
        if let Some(id) = open_hit {
            self.workspace
                .open_window(&mut self.store, id, self.last_canvas_size, now);
        }
    }

    fn ui_settings_tab(&mut self, ui: &mut egui::Ui, now: Instant) {
        {
            let s = &mut self.temp_settings;
            ui.heading("Text");
            ui.horizontal(|ui| {
                ui.label("Typeface");
                ui.selectable_value(&mut s.font_family, FontChoice::Proportional, "Serif");
                ui.selectable_value(&mut s.font_family, FontChoice::Monospace, "Mono");
            });
            ui.add(egui::Slider::new(&mut s.font_size, 12.0..=48.0).text("Font size"));
            ui.add(egui::Slider::new(&mut s.line_height, 1.0..=3.0).text("Line height"));
            ui.add(egui::Slider::new(&mut s.letter_spacing, 0.0..=5.0).text("Letter spacing"));

            ui.add_space(6.0);
            ui.heading("Colors");
            ui.horizontal(|ui| {
                ui.label("Background");
                ui.text_edit_singleline(&mut s.background_color);
            });
            ui.horizontal(|ui| {
                ui.label("Text");
                ui.text_edit_singleline(&mut s.text_color);
            });
            ui.horizontal(|ui| {
                ui.label("Highlight");
                ui.text_edit_singleline(&mut s.highlight_color);
            });

            ui.add_space(6.0);
            ui.heading("Behavior");
            ui.checkbox(&mut s.auto_save, "Auto-save while writing");
            ui.checkbox(&mut s.auto_close_quotes, "Auto-close quotes");
            ui.add(egui::Slider::new(&mut s.editor_width, 400.0..=2000.0).text("Editor width"));
        }

        ui.add_space(6.0);
        if ui.button("\u{2728} Manage templates").clicked() {
            self.show_templates = true;
        }

        ui.add_space(10.0);
        ui.horizontal(|ui| {
            if ui.button("Save settings").clicked() {
                self.settings = self.temp_settings.clone();
                match self.settings.save() {
                    Ok(()) => self.workspace.notify("Settings saved.", NoticeKind::Info, now),
                    Err(e) => {
                        log::warn!("could not save settings: {e}");
                        self.workspace.notify(
                            format!("Could not save settings: {e}"),
                            NoticeKind::Error,
                            now,
                        );
                    }
                }
            }
            if ui.button("Reset").clicked() {
                self.temp_settings = EditorSettings::default();
            }
        });
    }

    // Canvas and floating windows

    fn ui_canvas(&mut self, ctx: &egui::Context, now: Instant) {
        let settings = self.settings_in_effect().clone();
        egui::CentralPanel::default().show(ctx, |ui| {
            let available = ui.available_rect_before_wrap();
            self.last_canvas_size = available.size();
            let origin = available.min;
            let local = |p: Pos2| -> Pos2 { (p - origin).to_pos2() };

            let bg_resp = ui.allocate_rect(available, Sense::click_and_drag());

            // Keyboard zoom, anchored at the viewport center
            let center_local = (available.size() / 2.0).to_pos2();
            if ctx.input_mut(|i| {
                i.consume_shortcut(&egui::KeyboardShortcut::new(egui::Modifiers::COMMAND, egui::Key::Equals))
            }) {
                self.workspace.zoom_at(&mut self.store, center_local, KEY_ZOOM_STEP, now);
            }
            if ctx.input_mut(|i| {
                i.consume_shortcut(&egui::KeyboardShortcut::new(egui::Modifiers::COMMAND, egui::Key::Minus))
            }) {
                self.workspace.zoom_at(&mut self.store, center_local, -KEY_ZOOM_STEP, now);
            }

            // Wheel zoom toward the pointer, except over a window where the
            // wheel belongs to the text area
            if bg_resp.hovered() && !self.pointer_over_window(ui, available) {
                let scroll = ui.input(|i| i.raw_scroll_delta.y);
                if scroll != 0.0 && !self.workspace.interaction_active() {
                    if let Some(ptr) = ui.ctx().pointer_hover_pos() {
                        let step = if scroll > 0.0 { WHEEL_ZOOM_STEP } else { -WHEEL_ZOOM_STEP };
                        self.workspace.zoom_at(&mut self.store, local(ptr), step, now);
                    }
                }
            }

            // Secondary-button pan on empty canvas
            if bg_resp.drag_started_by(egui::PointerButton::Secondary) {
                if let Some(ptr) = bg_resp.interact_pointer_pos() {
                    self.workspace.begin_pan(local(ptr));
                }
            }
            if bg_resp.clicked() {
                self.workspace.unfocus_all();
            }

            // Live interaction updates, single writer at a time
            if self.workspace.interaction_active() {
                if ui.input(|i| i.pointer.any_released()) {
                    self.workspace.end_interaction(&mut self.store, now);
                } else if let Some(ptr) = ui.input(|i| i.pointer.latest_pos()) {
                    self.workspace.pointer_moved(local(ptr));
                    ctx.request_repaint_after(Duration::from_millis(16));
                }
            }

            // Dot grid backdrop
            let painter = ui.painter_at(available);
            paint_dot_grid(&painter, available, &self.workspace.view);

            let mut actions: Vec<WindowAction> = Vec::new();
            let focused = self.workspace.active_id();
            let view = self.workspace.view;
            let windows: Vec<(FileId, Rect)> = self
                .workspace
                .windows_by_z()
                .iter()
                .map(|w| (w.file_id, w.rect))
                .collect();
            for (id, rect) in windows {
                let screen_rect = Rect::from_min_size(
                    origin + view.to_screen(rect.min).to_vec2(),
                    rect.size() * view.scale,
                );
                if !screen_rect.intersects(available) {
                    continue;
                }
                self.ui_window(
                    ui,
                    id,
                    screen_rect,
                    available,
                    focused == Some(id),
                    &settings,
                    now,
                    &mut actions,
                );
            }

            for action in actions {
                self.apply_window_action(action, origin, available, now);
            }

            // Transient zoom HUD, bottom right
            if self.workspace.zoom_hud_visible(now) {
                let text = format!("{:.0}%", self.workspace.view.scale * 100.0);
                let font = FontId::proportional(14.0);
                let galley = ui.painter().layout_no_wrap(text, font, Color32::WHITE);
                let pad = Vec2::new(8.0, 4.0);
                let size = galley.size() + pad * 2.0;
                let pos = Pos2::new(available.max.x - size.x - 16.0, available.max.y - size.y - 16.0);
                let rect = Rect::from_min_size(pos, size);
                painter.rect_filled(rect, 8.0, Color32::from_rgba_premultiplied(20, 20, 20, 200));
                painter.galley(pos + pad, galley, Color32::WHITE);
                ctx.request_repaint_after(Duration::from_millis(100));
            }
        });
    }

    fn pointer_over_window(&self, ui: &egui::Ui, available: Rect) -> bool {
        let Some(ptr) = ui.ctx().pointer_hover_pos() else { return false };
        if !available.contains(ptr) {
            return false;
        }
        let origin = available.min;
        self.workspace.windows_by_z().iter().any(|w| {
            let screen = Rect::from_min_size(
                origin + self.workspace.view.to_screen(w.rect.min).to_vec2(),
                w.rect.size() * self.workspace.view.scale,
            );
            screen.contains(ptr)
        })
    }

    fn ui_window(
        &self,
        ui: &mut egui::Ui,
        id: FileId,
        screen_rect: Rect,
        available: Rect,
        focused: bool,
        settings: &EditorSettings,
        now: Instant,
        actions: &mut Vec<WindowAction>,
    ) {
        let Some(win) = self.workspace.window(id) else { return };
        let scale = self.workspace.view.scale;
        let origin = available.min;
        let local = |p: Pos2| -> Pos2 { (p - origin).to_pos2() };

        let clip = screen_rect.intersect(available);
        let painter = ui.painter_at(clip.expand(2.0));

        let visuals = ui.visuals().clone();
        let bg = color_from_hex(&settings.background_color).unwrap_or(visuals.extreme_bg_color);
        let text_color = color_from_hex(&settings.text_color).unwrap_or_else(|| visuals.text_color());
        let border = if focused {
            Stroke::new(1.5, visuals.selection.stroke.color)
        } else {
            Stroke::new(1.0, visuals.widgets.noninteractive.bg_stroke.color)
        };

        let tb_h = TITLEBAR_HEIGHT * scale;
        let sb_h = STATUSBAR_HEIGHT * scale;
        let title_rect = Rect::from_min_max(
            screen_rect.min,
            Pos2::new(screen_rect.max.x, screen_rect.min.y + tb_h),
        );
        let status_rect = Rect::from_min_max(
            Pos2::new(screen_rect.min.x, screen_rect.max.y - sb_h),
            screen_rect.max,
        );
        let body_rect = Rect::from_min_max(
            Pos2::new(screen_rect.min.x, title_rect.max.y),
            Pos2::new(screen_rect.max.x, status_rect.min.y),
        );

        painter.rect_filled(screen_rect, 6.0, bg);
        painter.rect_filled(title_rect, 6.0, visuals.faint_bg_color);
        painter.rect_stroke(screen_rect, 6.0, border, egui::StrokeKind::Inside);

        // Frame click focuses; later widgets still win their own clicks
        let frame_resp = ui.interact(clip, egui::Id::new(("win_frame", id)), Sense::click());
        if frame_resp.clicked() {
            actions.push(WindowAction::Focus(id));
        }

        // Title-bar controls, right to left
        let btn_size = (tb_h - 8.0 * scale).max(10.0);
        let close_rect = Rect::from_center_size(
            Pos2::new(title_rect.max.x - btn_size, title_rect.center().y),
            Vec2::splat(btn_size),
        );
        let max_rect = close_rect.translate(Vec2::new(-(btn_size + 6.0 * scale), 0.0));
        for (rect, glyph, is_close) in
            [(close_rect, "\u{2715}", true), (max_rect, "\u{25A1}", false)]
        {
            let resp = ui.interact(rect, egui::Id::new(("win_btn", id, glyph)), Sense::click());
            let color = if resp.hovered() {
                visuals.strong_text_color()
            } else {
                visuals.weak_text_color()
            };
            painter.text(
                rect.center(),
                egui::Align2::CENTER_CENTER,
                glyph,
                FontId::proportional((12.0 * scale).max(8.0)),
                color,
            );
            if resp.clicked() {
                actions.push(if is_close {
                    WindowAction::Close(id)
                } else {
                    WindowAction::ToggleMax(id)
                });
            }
        }

        // Title text plus the unsaved marker
        let title = if win.dirty {
            format!("{FILE_GLYPH} {} \u{25CF}", win.title)
        } else {
            format!("{FILE_GLYPH} {}", win.title)
        };
        painter.text(
            Pos2::new(title_rect.min.x + 8.0 * scale, title_rect.center().y),
            egui::Align2::LEFT_CENTER,
            title,
            FontId::proportional((13.0 * scale).max(8.0)),
            visuals.strong_text_color(),
        );

        // Drag region: the title bar minus its buttons
        let drag_rect = Rect::from_min_max(
            title_rect.min,
            Pos2::new(max_rect.min.x - 4.0, title_rect.max.y),
        );
        let drag_resp = ui.interact(
            drag_rect.intersect(available),
            egui::Id::new(("win_drag", id)),
            Sense::click_and_drag(),
        );
        if drag_resp.drag_started() {
            if let Some(ptr) = drag_resp.interact_pointer_pos() {
                actions.push(WindowAction::BeginDrag(id, local(ptr)));
            }
        } else if drag_resp.clicked() {
            actions.push(WindowAction::Focus(id));
        }
        drag_resp.on_hover_cursor(CursorIcon::Grab);

        // Text body
        let inner = body_rect.shrink(6.0 * scale);
        if inner.is_positive() {
            let mut text = win.buffer.clone();
            let font_id = match settings.font_family {
                FontChoice::Proportional => FontId::proportional(settings.font_size * scale),
                FontChoice::Monospace => FontId::monospace(settings.font_size * scale),
            };
            let highlight = color_from_hex(&settings.highlight_color)
                .unwrap_or(visuals.selection.stroke.color);
            let line_height = settings.line_height;
            let letter_spacing = settings.letter_spacing * scale;
            let min_rows = (inner.height() / (font_id.size * line_height)).max(1.0) as usize;
            let mut layouter = move |ui: &egui::Ui, buf: &dyn egui::TextBuffer, wrap_width: f32| {
                let job = highlight_layout(
                    buf.as_str(),
                    font_id.clone(),
                    text_color,
                    highlight,
                    line_height,
                    letter_spacing,
                    wrap_width,
                );
                ui.fonts_mut(|f| f.layout_job(job))
            };

            let mut body_ui = ui.new_child(
                egui::UiBuilder::new()
                    .max_rect(inner)
                    .layout(egui::Layout::top_down(egui::Align::Min)),
            );
            body_ui.set_clip_rect(inner.intersect(available));
            let edit_resp = egui::ScrollArea::vertical()
                .id_salt(("window_editor", id))
                .auto_shrink([false, false])
                .show(&mut body_ui, |ui| {
                    ui.add(
                        egui::TextEdit::multiline(&mut text)
                            .id(egui::Id::new(("window_text", id)))
                            .frame(false)
                            .desired_width(inner.width() - 8.0)
                            .desired_rows(min_rows)
                            .text_color(text_color)
                            .layouter(&mut layouter)
                            .hint_text("Write your story here..."),
                    )
                })
                .inner;
            if edit_resp.clicked() || edit_resp.gained_focus() {
                actions.push(WindowAction::Focus(id));
            }
            if edit_resp.changed() {
                if settings.auto_close_quotes {
                    if let Some(closed) = auto_close_quotes(&win.buffer, &text) {
                        text = closed;
                    }
                }
                actions.push(WindowAction::Edited(id, text));
            }
        }

        // Status bar: live counts left, transient saved tag right
        let st = &win.stats;
        painter.text(
            Pos2::new(status_rect.min.x + 8.0 * scale, status_rect.center().y),
            egui::Align2::LEFT_CENTER,
            format!(
                "{} chars ({} no spaces) \u{00B7} {} sentences \u{00B7} {} paragraphs",
                st.chars, st.chars_no_space, st.sentences, st.paragraphs
            ),
            FontId::proportional((10.5 * scale).max(7.0)),
            visuals.weak_text_color(),
        );
        if let Some(kind) = win.saved_indicator(now) {
            let tag = match kind {
                SaveKind::Automatic => "auto-saved",
                SaveKind::Manual => "saved",
            };
            painter.text(
                Pos2::new(status_rect.max.x - 8.0 * scale, status_rect.center().y),
                egui::Align2::RIGHT_CENTER,
                tag,
                FontId::proportional((10.5 * scale).max(7.0)),
                Color32::from_rgb(60, 160, 90),
            );
        }

        // Eight resize handles around the border
        for dir in ResizeDir::ALL {
            let rect = handle_rect(screen_rect, dir);
            let resp = ui.interact(
                rect.intersect(available),
                egui::Id::new(("win_edge", id, dir as u8)),
                Sense::drag(),
            );
            if resp.drag_started() {
                if let Some(ptr) = resp.interact_pointer_pos() {
                    actions.push(WindowAction::BeginResize(id, dir, local(ptr)));
                }
            }
            resp.on_hover_cursor(handle_cursor(dir));
        }
    }

    fn apply_window_action(
        &mut self,
        action: WindowAction,
        origin: Pos2,
        available: Rect,
        now: Instant,
    ) {
        match action {
            WindowAction::Focus(id) => {
                self.workspace.focus_window(id);
            }
            WindowAction::Close(id) => {
                self.workspace.close_window(&mut self.store, id, now);
            }
            WindowAction::ToggleMax(id) => {
                // Visible canvas area, expressed in canvas coordinates
                let view = self.workspace.view;
                let min = view.to_canvas((available.min - origin).to_pos2());
                let max = view.to_canvas((available.max - origin).to_pos2());
                self.workspace.toggle_maximize(id, Rect::from_min_max(min, max));
            }
            WindowAction::Edited(id, text) => {
                self.workspace.edit(id, text, &self.settings, now);
            }
            WindowAction::BeginDrag(id, ptr) => {
                self.workspace.begin_window_drag(id, ptr);
            }
            WindowAction::BeginResize(id, dir, ptr) => {
                self.workspace.begin_window_resize(id, dir, ptr);
            }
        }
    }

    // Modals

    fn ui_modals(&mut self, ctx: &egui::Context, now: Instant) {
        self.ui_project_modals(ctx, now);
        self.ui_item_modals(ctx, now);
        self.ui_memo_modal(ctx, now);
        self.ui_template_modal(ctx, now);
    }

    fn ui_project_modals(&mut self, ctx: &egui::Context, now: Instant) {
        if let Some((mut name, mut error)) = self.new_project.take() {
            let mut keep = true;
            egui::Window::new("New project")
                .collapsible(false)
                .resizable(false)
                .anchor(egui::Align2::CENTER_CENTER, Vec2::ZERO)
                .show(ctx, |ui| {
                    ui.label("Name");
                    ui.text_edit_singleline(&mut name);
                    if let Some(err) = &error {
                        ui.colored_label(Color32::RED, err);
                    }
                    ui.horizontal(|ui| {
                        if ui.button("Create").clicked() {
                            if name.trim().is_empty() {
                                error = Some("Enter a project name.".to_string());
                            } else {
                                let pid =
                                    self.store.db.create_project(name.trim().to_string(), None);
                                // Seed a first folder so the tree is not empty
                                let _ = outline::create_item(
                                    &mut self.store.db,
                                    outline::NewItem {
                                        project_id: pid,
                                        parent: None,
                                        name: "Chapter 1",
                                        kind: FileKind::Folder,
                                        template: None,
                                    },
                                );
                                self.flush_notify(now);
                                keep = false;
                            }
                        }
                        if ui.button("Cancel").clicked() {
                            keep = false;
                        }
                    });
                });
            if keep {
                self.new_project = Some((name, error));
            }
        }

        if let Some((id, mut name, mut error)) = self.edit_project.take() {
            let mut keep = true;
            egui::Window::new("Rename project")
                .collapsible(false)
                .resizable(false)
                .anchor(egui::Align2::CENTER_CENTER, Vec2::ZERO)
                .show(ctx, |ui| {
                    ui.label("Name");
                    ui.text_edit_singleline(&mut name);
                    if let Some(err) = &error {
                        ui.colored_label(Color32::RED, err);
                    }
                    ui.horizontal(|ui| {
                        if ui.button("Save").clicked() {
                            if name.trim().is_empty() {
                                error = Some("Enter a project name.".to_string());
                            } else {
                                self.store.db.rename_project(id, name.trim().to_string());
                                self.flush_notify(now);
                                keep = false;
                            }
                        }
                        if ui.button("Cancel").clicked() {
                            keep = false;
                        }
                    });
                });
            if keep {
                self.edit_project = Some((id, name, error));
            }
        }

        if let Some(id) = self.confirm_delete_project {
            let name = self
                .store
                .db
                .project(id)
                .map(|p| p.name.clone())
                .unwrap_or_default();
            let mut keep = true;
            egui::Window::new("Delete project")
                .collapsible(false)
                .resizable(false)
                .anchor(egui::Align2::CENTER_CENTER, Vec2::ZERO)
                .show(ctx, |ui| {
                    ui.label(format!("Delete \"{name}\" and everything it contains?"));
                    ui.horizontal(|ui| {
                        if ui.button("Delete").clicked() {
                            self.store.db.delete_project(id);
                            self.flush_notify(now);
                            keep = false;
                        }
                        if ui.button("Cancel").clicked() {
                            keep = false;
                        }
                    });
                });
            if !keep {
                self.confirm_delete_project = None;
            }
        }
    }

    fn ui_item_modals(&mut self, ctx: &egui::Context, now: Instant) {
        let Some(project_id) = self.current_project else {
            return;
        };

        if let Some(mut modal) = self.new_item.take() {
            let mut keep = true;
            let title = match modal.kind {
                FileKind::File => "New file",
                FileKind::Folder => "New folder",
            };
            egui::Window::new(title)
                .collapsible(false)
                .resizable(false)
                .anchor(egui::Align2::CENTER_CENTER, Vec2::ZERO)
                .show(ctx, |ui| {
                    ui.label("Name");
                    ui.text_edit_singleline(&mut modal.name);
                    let tpl_label = match modal.kind {
                        FileKind::File => "Template",
                        FileKind::Folder => "Default template for new files inside",
                    };
                    ui.label(tpl_label);
                    self.template_picker(ui, "new_item_tpl", &mut modal.template);
                    if let Some(err) = &modal.error {
                        ui.colored_label(Color32::RED, err);
                    }
                    ui.horizontal(|ui| {
                        if ui.button("Create").clicked() {
                            match outline::create_item(
                                &mut self.store.db,
                                outline::NewItem {
                                    project_id,
                                    parent: modal.parent,
                                    name: &modal.name,
                                    kind: modal.kind,
                                    template: modal.template,
                                },
                            ) {
                                Ok(_) => {
                                    if let Some(parent) = modal.parent {
                                        self.outline.expanded.insert(parent);
                                    }
                                    self.store.db.touch_project(project_id);
                                    self.flush_notify(now);
                                    keep = false;
                                }
                                Err(e) => modal.error = Some(e.to_string()),
                            }
                        }
                        if ui.button("Cancel").clicked() {
                            keep = false;
                        }
                    });
                });
            if keep {
                self.new_item = Some(modal);
            }
        }

        if let Some(mut modal) = self.rename_item.take() {
            let mut keep = true;
            let title = match modal.kind {
                FileKind::File => "Rename file",
                FileKind::Folder => "Edit folder",
            };
            egui::Window::new(title)
                .collapsible(false)
                .resizable(false)
                .anchor(egui::Align2::CENTER_CENTER, Vec2::ZERO)
                .show(ctx, |ui| {
                    ui.label("Name");
                    ui.text_edit_singleline(&mut modal.name);
                    if modal.kind == FileKind::Folder {
                        ui.label("Default template for new files inside");
                        self.template_picker(ui, "rename_item_tpl", &mut modal.template);
                    }
                    if let Some(err) = &modal.error {
                        ui.colored_label(Color32::RED, err);
                    }
                    ui.horizontal(|ui| {
                        if ui.button("Save").clicked() {
                            match outline::rename_item(&mut self.store.db, modal.id, &modal.name) {
                                Ok(()) => {
                                    if modal.kind == FileKind::Folder {
                                        self.store
                                            .db
                                            .set_folder_default_template(modal.id, modal.template);
                                    }
                                    self.store.db.touch_project(project_id);
                                    self.flush_notify(now);
                                    keep = false;
                                }
                                Err(e) => modal.error = Some(e.to_string()),
                            }
                        }
                        if ui.button("Cancel").clicked() {
                            keep = false;
                        }
                    });
                });
            if keep {
                self.rename_item = Some(modal);
            }
        }

        if let Some(id) = self.confirm_delete_item {
            let Some((name, is_folder)) =
                self.store.db.file(id).map(|f| (f.name.clone(), f.is_folder()))
            else {
                self.confirm_delete_item = None;
                return;
            };
            let mut keep = true;
            egui::Window::new("Delete")
                .collapsible(false)
                .resizable(false)
                .anchor(egui::Align2::CENTER_CENTER, Vec2::ZERO)
                .show(ctx, |ui| {
                    if is_folder {
                        ui.label(format!(
                            "Delete the folder \"{name}\" and everything inside it?"
                        ));
                    } else {
                        ui.label(format!("Delete \"{name}\"?"));
                    }
                    ui.horizontal(|ui| {
                        if ui.button("Delete").clicked() {
                            let deleted = outline::delete_item(&mut self.store.db, id);
                            self.workspace.discard_windows_under(&deleted);
                            self.store.db.touch_project(project_id);
                            self.flush_notify(now);
                            keep = false;
                        }
                        if ui.button("Cancel").clicked() {
                            keep = false;
                        }
                    });
                });
            if !keep {
                self.confirm_delete_item = None;
            }
        }
    }

    fn template_picker(&self, ui: &mut egui::Ui, salt: &str, selection: &mut Option<TemplateRef>) {
        let label = match selection {
            None => "Blank".to_string(),
            Some(TemplateRef::Item) => "\u{1F4E6} Item sheet".to_string(),
            Some(TemplateRef::Place) => "\u{1F5FA} Place sheet".to_string(),
            Some(TemplateRef::Custom(id)) => self
                .store
                .db
                .templates
                .get(id)
                .map(|t| format!("{} {}", t.icon, t.name))
                .unwrap_or_else(|| "(deleted template)".to_string()),
        };
        egui::ComboBox::from_id_salt(salt)
            .selected_text(label)
            .show_ui(ui, |ui| {
                ui.selectable_value(selection, None, "Blank");
                ui.selectable_value(selection, Some(TemplateRef::Item), "\u{1F4E6} Item sheet");
                ui.selectable_value(selection, Some(TemplateRef::Place), "\u{1F5FA} Place sheet");
                for t in self.store.db.templates_by_name() {
                    ui.selectable_value(
                        selection,
                        Some(TemplateRef::Custom(t.id)),
                        format!("{} {}", t.icon, t.name),
                    );
                }
            });
    }

    fn ui_memo_modal(&mut self, ctx: &egui::Context, now: Instant) {
        let Some(project_id) = self.current_project else {
            return;
        };
        if let Some(mut modal) = self.memo_modal.take() {
            let mut keep = true;
            let title = if modal.id.is_some() { "Edit memo" } else { "New memo" };
            egui::Window::new(title)
                .collapsible(false)
                .resizable(true)
                .anchor(egui::Align2::CENTER_CENTER, Vec2::ZERO)
                .show(ctx, |ui| {
                    ui.add(
                        egui::TextEdit::multiline(&mut modal.content)
                            .desired_rows(8)
                            .desired_width(320.0),
                    );
                    if let Some(err) = &modal.error {
                        ui.colored_label(Color32::RED, err);
                    }
                    ui.horizontal(|ui| {
                        if ui.button("Save").clicked() {
                            if modal.content.trim().is_empty() {
                                modal.error = Some("Enter some text first.".to_string());
                            } else {
                                match modal.id {
                                    Some(id) => {
                                        self.store.db.update_memo(id, modal.content.clone());
                                    }
                                    None => {
                                        self.store
                                            .db
                                            .create_memo(project_id, modal.content.clone());
                                    }
                                }
                                self.flush_notify(now);
                                self.workspace.notify("Memo saved.", NoticeKind::Info, now);
                                keep = false;
                            }
                        }
                        if let Some(id) = modal.id {
                            if ui.button("Delete").clicked() {
                                self.store.db.delete_memo(id);
                                self.flush_notify(now);
                                keep = false;
                            }
                        }
                        if ui.button("Cancel").clicked() {
                            keep = false;
                        }
                    });
                });
            if keep {
                self.memo_modal = Some(modal);
            }
        }
    }

    fn ui_template_modal(&mut self, ctx: &egui::Context, now: Instant) {
        if !self.show_templates {
            return;
        }
        let mut open = true;
        egui::Window::new("Templates")
            .collapsible(false)
            .resizable(true)
            .default_width(480.0)
            .open(&mut open)
            .show(ctx, |ui| {
                ui.horizontal_top(|ui| {
                    ui.vertical(|ui| {
                        ui.set_width(160.0);
                        if ui.button("+ New template").clicked() {
                            self.template_editor = TemplateEditor {
                                selected: None,
                                editing: true,
                                name: String::new(),
                                icon: FILE_GLYPH.to_string(),
                                content: String::new(),
                                error: None,
                            };
                        }
                        ui.separator();
                        let templates: Vec<(TemplateId, String, String, String)> = self
                            .store
                            .db
                            .templates_by_name()
                            .iter()
                            .map(|t| (t.id, t.name.clone(), t.icon.clone(), t.content.clone()))
                            .collect();
                        for (id, name, icon, content) in templates {
                            let active = self.template_editor.selected == Some(id);
                            if ui
                                .selectable_label(active, format!("{icon} {name}"))
                                .clicked()
                            {
                                self.template_editor = TemplateEditor {
                                    selected: Some(id),
                                    editing: true,
                                    name,
                                    icon,
                                    content,
                                    error: None,
                                };
                            }
                        }
                    });
                    ui.separator();
                    ui.vertical(|ui| {
                        if !self.template_editor.editing {
                            ui.weak("Pick a template or create a new one.");
                            return;
                        }
                        ui.horizontal(|ui| {
                            ui.label("Icon");
                            ui.add(
                                egui::TextEdit::singleline(&mut self.template_editor.icon)
                                    .desired_width(40.0),
                            );
                            ui.label("Name");
                            ui.text_edit_singleline(&mut self.template_editor.name);
                        });
                        ui.add(
                            egui::TextEdit::multiline(&mut self.template_editor.content)
                                .desired_rows(10)
                                .desired_width(f32::INFINITY),
                        );
                        if let Some(err) = &self.template_editor.error {
                            ui.colored_label(Color32::RED, err);
                        }
                        ui.horizontal(|ui| {
                            if ui.button("Save").clicked() {
                                let name = self.template_editor.name.trim().to_string();
                                if name.is_empty() {
                                    self.template_editor.error =
                                        Some("Enter a template name.".to_string());
                                } else {
                                    let icon = if self.template_editor.icon.trim().is_empty() {
                                        FILE_GLYPH.to_string()
                                    } else {
                                        self.template_editor.icon.trim().to_string()
                                    };
                                    let content = self.template_editor.content.clone();
                                    match self.template_editor.selected {
                                        Some(id) => {
                                            self.store.db.update_template(id, name, icon, content);
                                        }
                                        None => {
                                            let id =
                                                self.store.db.create_template(name, icon, content);
                                            self.template_editor.selected = Some(id);
                                        }
                                    }
                                    self.flush_notify(now);
                                    self.workspace.notify("Template saved.", NoticeKind::Info, now);
                                    self.template_editor.error = None;
                                }
                            }
                            if let Some(id) = self.template_editor.selected {
                                if ui.button("Delete").clicked() {
                                    self.store.db.delete_template(id);
                                    self.flush_notify(now);
                                    self.template_editor = TemplateEditor::default();
                                }
                            }
                        });
                    });
                });
            });
        self.show_templates = open;
    }

    // Bottom-right transient notice toast

    fn ui_toast(&mut self, ctx: &egui::Context, now: Instant) {
        if let Some(notice) = self.workspace.notice(now) {
            let margin = Vec2::new(12.0, 12.0);
            let (fill, text_col) = match notice.kind {
                NoticeKind::Info => (
                    Color32::from_rgba_premultiplied(30, 30, 30, 230),
                    Color32::LIGHT_GREEN,
                ),
                NoticeKind::Error => (
                    Color32::from_rgba_premultiplied(40, 20, 20, 230),
                    Color32::from_rgb(240, 140, 130),
                ),
            };
            let message = notice.message.clone();
            egui::Area::new("notice_toast".into())
                .anchor(egui::Align2::RIGHT_BOTTOM, -margin)
                .interactable(false)
                .show(ctx, |ui| {
                    egui::Frame::popup(ui.style())
                        .corner_radius(egui::CornerRadius::same(8))
                        .stroke(Stroke { width: 1.0, color: Color32::from_gray(100) })
                        .fill(fill)
                        .inner_margin(egui::Margin::symmetric(12, 8))
                        .show(ui, |ui| {
                            ui.colored_label(text_col, message);
                        });
                });
            ctx.request_repaint_after(Duration::from_millis(200));
        }
    }
}

// Drawing helpers

fn paint_dot_grid(painter: &egui::Painter, area: Rect, view: &crate::workspace::CanvasView) {
    // Dots fade out once the view is far enough zoomed out
    let alpha = if view.scale < 0.5 {
        (((view.scale - 0.3) / 0.2).clamp(0.0, 1.0) * 70.0) as u8
    } else {
        70
    };
    if alpha == 0 {
        return;
    }
    let color = Color32::from_rgba_premultiplied(alpha, alpha, alpha, alpha);
    let spacing = 28.0 * view.scale;
    if spacing < 6.0 {
        return;
    }
    let offset_x = area.min.x + view.pan.x.rem_euclid(spacing);
    let offset_y = area.min.y + view.pan.y.rem_euclid(spacing);
    let mut y = offset_y - spacing;
    while y < area.max.y {
        let mut x = offset_x - spacing;
        while x < area.max.x {
            painter.circle_filled(Pos2::new(x, y), 1.0, color);
            x += spacing;
        }
        y += spacing;
    }
}

fn handle_rect(window: Rect, dir: ResizeDir) -> Rect {
    let h = RESIZE_HANDLE;
    let (min, max) = (window.min, window.max);
    match dir {
        ResizeDir::N => Rect::from_min_max(
            Pos2::new(min.x + h, min.y - h / 2.0),
            Pos2::new(max.x - h, min.y + h / 2.0),
        ),
        ResizeDir::S => Rect::from_min_max(
            Pos2::new(min.x + h, max.y - h / 2.0),
            Pos2::new(max.x - h, max.y + h / 2.0),
        ),
        ResizeDir::W => Rect::from_min_max(
            Pos2::new(min.x - h / 2.0, min.y + h),
            Pos2::new(min.x + h / 2.0, max.y - h),
        ),
        ResizeDir::E => Rect::from_min_max(
            Pos2::new(max.x - h / 2.0, min.y + h),
            Pos2::new(max.x + h / 2.0, max.y - h),
        ),
        ResizeDir::Nw => Rect::from_center_size(min, Vec2::splat(h * 2.0)),
        ResizeDir::Ne => Rect::from_center_size(Pos2::new(max.x, min.y), Vec2::splat(h * 2.0)),
        ResizeDir::Sw => Rect::from_center_size(Pos2::new(min.x, max.y), Vec2::splat(h * 2.0)),
        ResizeDir::Se => Rect::from_center_size(max, Vec2::splat(h * 2.0)),
    }
}

fn handle_cursor(dir: ResizeDir) -> CursorIcon {
    match dir {
        ResizeDir::N | ResizeDir::S => CursorIcon::ResizeVertical,
        ResizeDir::E | ResizeDir::W => CursorIcon::ResizeHorizontal,
        ResizeDir::Ne | ResizeDir::Sw => CursorIcon::ResizeNeSw,
        ResizeDir::Nw | ResizeDir::Se => CursorIcon::ResizeNwSe,
    }
}

/// Dialogue between double quotes takes the highlight color; parentheticals
/// render dimmed. Everything else keeps the body color.
fn highlight_layout(
    text: &str,
    font_id: FontId,
    body: Color32,
    highlight: Color32,
    line_height: f32,
    letter_spacing: f32,
    wrap_width: f32,
) -> egui::text::LayoutJob {
    let mut job = egui::text::LayoutJob::default();
    job.wrap.max_width = wrap_width;
    let base_format = |color: Color32| {
        let mut fmt = egui::TextFormat::simple(font_id.clone(), color);
        fmt.line_height = Some(font_id.size * line_height);
        fmt.extra_letter_spacing = letter_spacing;
        fmt
    };
    let dim = body.linear_multiply(0.55);

    let bytes = text.as_bytes();
    let mut plain_start = 0;
    let mut i = 0;
    while i < bytes.len() {
        let (close, color) = match bytes[i] {
            b'"' => (b'"', highlight),
            b'(' => (b')', dim),
            _ => {
                i += 1;
                continue;
            }
        };
        // Find the closing mark; an unterminated span stays plain
        if let Some(rel) = bytes[i + 1..].iter().position(|&b| b == close) {
            let end = i + 1 + rel + 1;
            if plain_start < i {
                job.append(&text[plain_start..i], 0.0, base_format(body));
            }
            job.append(&text[i..end], 0.0, base_format(color));
            plain_start = end;
            i = end;
        } else {
            i += 1;
        }
    }
    if plain_start < text.len() {
        job.append(&text[plain_start..], 0.0, base_format(body));
    }
    if job.sections.is_empty() {
        job.append(text, 0.0, base_format(body));
    }
    job
}

/// When exactly one `"` was just typed at the end of the buffer, append its
/// partner so the caret lands between the pair.
fn auto_close_quotes(prev: &str, next: &str) -> Option<String> {
    if next.len() == prev.len() + 1 && next.ends_with('"') && next[..next.len() - 1] == *prev {
        let mut closed = next.to_string();
        closed.push('"');
        return Some(closed);
    }
    None
}

fn color_from_hex(hex: &str) -> Option<Color32> {
    let hex = hex.trim().strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some(Color32::from_rgb(r, g, b))
}

fn format_date(ts: i64) -> String {
    let fmt = time::macros::format_description!("[year]-[month]-[day]");
    time::OffsetDateTime::from_unix_timestamp(ts)
        .ok()
        .and_then(|t| t.format(&fmt).ok())
        .unwrap_or_else(|| "-".to_string())
}
