use std::time::{Duration, Instant};

use eframe::egui::{pos2, vec2, Pos2, Vec2};
use tempfile::TempDir;

use story_loom::outline::{self, DropZone, NewItem, OutlineError};
use story_loom::persistence::settings::EditorSettings;
use story_loom::stats::{manuscript_paragraphs, TextStats};
use story_loom::store::records::{FileKind, TemplateRef};
use story_loom::store::{FileId, ProjectId, StoryStore};
use story_loom::timer::{format_hms, TimerEvent, TimerMode, WritingTimer};
use story_loom::workspace::{
    CanvasView, ResizeDir, SaveKind, Workspace, DEFAULT_WINDOW_HEIGHT, DEFAULT_WINDOW_WIDTH,
    MIN_WINDOW_HEIGHT, MIN_WINDOW_WIDTH,
};

const VIEWPORT: Vec2 = Vec2::new(1000.0, 700.0);

fn temp_store() -> (TempDir, StoryStore) {
    let dir = tempfile::tempdir().expect("temp dir");
    let store = StoryStore::at_path(dir.path().join("state.ron"));
    (dir, store)
}

fn store_with_file() -> (TempDir, StoryStore, ProjectId, FileId) {
    let (dir, mut store) = temp_store();
    let pid = store.db.create_project("Draft".to_string(), None);
    let fid = outline::create_item(
        &mut store.db,
        NewItem {
            project_id: pid,
            parent: None,
            name: "Scene 1",
            kind: FileKind::File,
            template: None,
        },
    )
    .expect("file created");
    (dir, store, pid, fid)
}

fn open_workspace(store: &mut StoryStore, pid: ProjectId, now: Instant) -> Workspace {
    let mut ws = Workspace::new();
    ws.open_project(store, pid, VIEWPORT, now);
    ws
}

// Store

#[test]
fn store_delete_folder_cascades_to_descendants() {
    let (_dir, mut store) = temp_store();
    let pid = store.db.create_project("P".to_string(), None);
    let mk = |db: &mut story_loom::store::StoryDatabase, name: &str, kind, parent| {
        outline::create_item(
            db,
            NewItem { project_id: pid, parent, name, kind, template: None },
        )
        .unwrap()
    };
    let top = mk(&mut store.db, "Part 1", FileKind::Folder, None);
    let sub = mk(&mut store.db, "Ch 1", FileKind::Folder, Some(top));
    let leaf = mk(&mut store.db, "Scene", FileKind::File, Some(sub));
    let sibling = mk(&mut store.db, "Notes", FileKind::File, None);

    let deleted = outline::delete_item(&mut store.db, top);
    assert_eq!(deleted.len(), 3);
    assert!(deleted.contains(&top) && deleted.contains(&sub) && deleted.contains(&leaf));
    assert!(store.db.file(leaf).is_none());
    assert!(store.db.file(sibling).is_some());
    // The surviving root run is dense again
    assert_eq!(store.db.file(sibling).unwrap().order, 0);
}

#[test]
fn store_delete_project_cascades_to_files_and_memos() {
    let (_dir, mut store, pid, fid) = store_with_file();
    store.db.create_memo(pid, "remember".to_string());
    assert!(store.db.delete_project(pid));
    assert!(store.db.project(pid).is_none());
    assert!(store.db.file(fid).is_none());
    assert!(store.db.memos_for_project(pid).is_empty());
}

#[test]
fn store_sibling_order_breaks_ties_by_name() {
    let (_dir, mut store) = temp_store();
    let pid = store.db.create_project("P".to_string(), None);
    for name in ["banana", "apple", "cherry"] {
        let id = outline::create_item(
            &mut store.db,
            NewItem {
                project_id: pid,
                parent: None,
                name,
                kind: FileKind::File,
                template: None,
            },
        )
        .unwrap();
        // Force an order collision
        store.db.set_file_order(id, 7);
    }
    let names: Vec<&str> = store
        .db
        .ordered_children(pid, None)
        .iter()
        .map(|f| f.name.as_str())
        .collect();
    assert_eq!(names, ["apple", "banana", "cherry"]);
}

#[test]
fn store_round_trips_through_state_file() {
    let (dir, mut store, pid, fid) = store_with_file();
    store.db.set_file_content(fid, "Across the river.".to_string());
    store.db.create_memo(pid, "a memo".to_string());
    store.db.set_project_thumbnail(pid, Some("covers/draft.png".to_string()));
    store.flush().expect("flush");

    let reloaded = StoryStore::at_path(dir.path().join("state.ron"));
    assert_eq!(reloaded.db.file(fid).unwrap().content, "Across the river.");
    assert_eq!(reloaded.db.project(pid).unwrap().name, "Draft");
    assert_eq!(
        reloaded.db.project(pid).unwrap().thumbnail.as_deref(),
        Some("covers/draft.png")
    );
    assert_eq!(reloaded.db.memos_for_project(pid).len(), 1);
}

#[test]
fn template_content_is_copied_by_value() {
    let (_dir, mut store) = temp_store();
    let pid = store.db.create_project("P".to_string(), None);
    let tpl = store
        .db
        .create_template("Villain".to_string(), "X".to_string(), "# Villain sheet".to_string());
    let fid = outline::create_item(
        &mut store.db,
        NewItem {
            project_id: pid,
            parent: None,
            name: "Antagonist",
            kind: FileKind::File,
            template: Some(TemplateRef::Custom(tpl)),
        },
    )
    .unwrap();
    assert_eq!(store.db.file(fid).unwrap().content, "# Villain sheet");

    // Later template edits must not bleed into the file
    store
        .db
        .update_template(tpl, "Villain".to_string(), "X".to_string(), "changed".to_string());
    assert_eq!(store.db.file(fid).unwrap().content, "# Villain sheet");
}

#[test]
fn deleted_custom_template_degrades_gracefully() {
    let (_dir, mut store) = temp_store();
    let tpl = store
        .db
        .create_template("Beast".to_string(), "B".to_string(), "# Beast".to_string());
    let r = TemplateRef::Custom(tpl);
    assert_eq!(r.body(&store.db.templates), "# Beast");
    assert_eq!(r.icon(&store.db.templates), "B");

    // A folder can still point at the template after it is deleted; new files
    // just come out blank with the stock glyph
    assert!(store.db.delete_template(tpl));
    assert_eq!(r.body(&store.db.templates), "");
    assert_eq!(r.icon(&store.db.templates), "\u{1F4C4}");
}

#[test]
fn memo_batch_delete() {
    let (_dir, mut store) = temp_store();
    let pid = store.db.create_project("P".to_string(), None);
    let a = store.db.create_memo(pid, "a".to_string());
    let b = store.db.create_memo(pid, "b".to_string());
    let _c = store.db.create_memo(pid, "c".to_string());
    assert_eq!(store.db.delete_memos(&[a, b]), 2);
    assert_eq!(store.db.memos_for_project(pid).len(), 1);
}

// Hierarchy

#[test]
fn create_item_rejects_empty_name() {
    let (_dir, mut store) = temp_store();
    let pid = store.db.create_project("P".to_string(), None);
    let err = outline::create_item(
        &mut store.db,
        NewItem {
            project_id: pid,
            parent: None,
            name: "   ",
            kind: FileKind::File,
            template: None,
        },
    )
    .unwrap_err();
    assert_eq!(err, OutlineError::EmptyName);
    assert!(store.db.files_for_project(pid).is_empty());
}

#[test]
fn reparent_into_own_subtree_is_rejected_without_changes() {
    let (_dir, mut store) = temp_store();
    let pid = store.db.create_project("P".to_string(), None);
    let mk = |db: &mut story_loom::store::StoryDatabase, name: &str, parent| {
        outline::create_item(
            db,
            NewItem { project_id: pid, parent, name, kind: FileKind::Folder, template: None },
        )
        .unwrap()
    };
    let a = mk(&mut store.db, "A", None);
    let b = mk(&mut store.db, "B", Some(a));
    let c = mk(&mut store.db, "C", Some(b));

    let err = outline::reparent(&mut store.db, a, c, DropZone::Into).unwrap_err();
    assert_eq!(err, OutlineError::IntoOwnSubtree);
    assert_eq!(store.db.file(a).unwrap().parent_id, None);
    assert_eq!(store.db.file(b).unwrap().parent_id, Some(a));
    assert_eq!(store.db.file(c).unwrap().parent_id, Some(b));
}

#[test]
fn reparent_before_resequences_densely() {
    let (_dir, mut store) = temp_store();
    let pid = store.db.create_project("P".to_string(), None);
    let mk = |db: &mut story_loom::store::StoryDatabase, name: &str| {
        outline::create_item(
            db,
            NewItem {
                project_id: pid,
                parent: None,
                name,
                kind: FileKind::File,
                template: None,
            },
        )
        .unwrap()
    };
    let a = mk(&mut store.db, "a");
    let b = mk(&mut store.db, "b");
    let c = mk(&mut store.db, "c");

    outline::reparent(&mut store.db, c, a, DropZone::Before).unwrap();
    let ordered: Vec<(FileId, i64)> = store
        .db
        .ordered_children(pid, None)
        .iter()
        .map(|f| (f.id, f.order))
        .collect();
    assert_eq!(ordered, vec![(c, 0), (a, 1), (b, 2)]);
}

#[test]
fn reparent_into_folder_appends_last_and_empties_old_run() {
    let (_dir, mut store) = temp_store();
    let pid = store.db.create_project("P".to_string(), None);
    let folder = outline::create_item(
        &mut store.db,
        NewItem {
            project_id: pid,
            parent: None,
            name: "Folder",
            kind: FileKind::Folder,
            template: None,
        },
    )
    .unwrap();
    let x = outline::create_item(
        &mut store.db,
        NewItem {
            project_id: pid,
            parent: Some(folder),
            name: "x",
            kind: FileKind::File,
            template: None,
        },
    )
    .unwrap();
    let y = outline::create_item(
        &mut store.db,
        NewItem {
            project_id: pid,
            parent: None,
            name: "y",
            kind: FileKind::File,
            template: None,
        },
    )
    .unwrap();

    outline::reparent(&mut store.db, y, folder, DropZone::Into).unwrap();
    let children: Vec<FileId> = store
        .db
        .ordered_children(pid, Some(folder))
        .iter()
        .map(|f| f.id)
        .collect();
    assert_eq!(children, vec![x, y]);
    // Root now holds only the folder, re-sequenced to 0
    assert_eq!(store.db.file(folder).unwrap().order, 0);
}

#[test]
fn drop_on_empty_space_moves_to_root_end() {
    let (_dir, mut store) = temp_store();
    let pid = store.db.create_project("P".to_string(), None);
    let folder = outline::create_item(
        &mut store.db,
        NewItem {
            project_id: pid,
            parent: None,
            name: "Folder",
            kind: FileKind::Folder,
            template: None,
        },
    )
    .unwrap();
    let inner = outline::create_item(
        &mut store.db,
        NewItem {
            project_id: pid,
            parent: Some(folder),
            name: "inner",
            kind: FileKind::File,
            template: None,
        },
    )
    .unwrap();

    outline::move_to_root_end(&mut store.db, inner);
    let root: Vec<FileId> = store
        .db
        .ordered_children(pid, None)
        .iter()
        .map(|f| f.id)
        .collect();
    assert_eq!(root, vec![folder, inner]);
    assert!(store.db.ordered_children(pid, Some(folder)).is_empty());
    // Already-root items stay put
    outline::move_to_root_end(&mut store.db, folder);
    assert_eq!(store.db.file(folder).unwrap().order, 0);
}

#[test]
fn drop_zone_classification() {
    // Folder rows: middle half is "into"
    assert_eq!(outline::drop_zone(true, 15.0, 30.0), DropZone::Into);
    assert_eq!(outline::drop_zone(true, 5.0, 30.0), DropZone::Before);
    assert_eq!(outline::drop_zone(true, 27.0, 30.0), DropZone::After);
    // File rows split at the midpoint
    assert_eq!(outline::drop_zone(false, 14.0, 30.0), DropZone::Before);
    assert_eq!(outline::drop_zone(false, 16.0, 30.0), DropZone::After);
}

// Canvas view

#[test]
fn zoom_keeps_anchor_point_stationary_across_scales() {
    let anchor = pos2(345.0, 210.0);
    let mut scale = 0.25;
    while scale <= 3.0 {
        let mut view = CanvasView { scale, pan: vec2(-120.0, 45.0) };
        let before = view.to_canvas(anchor);
        if view.zoom_at(anchor, 0.08) {
            let after = view.to_screen(before);
            assert!(
                (after.x - anchor.x).abs() < 1e-3 && (after.y - anchor.y).abs() < 1e-3,
                "anchor drifted at scale {scale}"
            );
        }
        scale += 0.25;
    }
}

#[test]
fn zoom_is_clamped_to_bounds() {
    let mut view = CanvasView { scale: 2.95, pan: vec2(0.0, 0.0) };
    assert!(view.zoom_at(pos2(10.0, 10.0), 0.2));
    assert_eq!(view.scale, 3.0);
    // At the bound a further step is a no-op
    assert!(!view.zoom_at(pos2(10.0, 10.0), 0.2));

    let mut view = CanvasView { scale: 0.3, pan: vec2(0.0, 0.0) };
    assert!(view.zoom_at(pos2(10.0, 10.0), -0.2));
    assert_eq!(view.scale, 0.25);
}

#[test]
fn pan_uses_raw_screen_delta() {
    let mut view = CanvasView { scale: 0.5, pan: vec2(10.0, 20.0) };
    view.pan_by(vec2(30.0, -5.0));
    assert_eq!(view.pan, vec2(40.0, 15.0));
    view.reset();
    assert_eq!(view.scale, 1.0);
    assert_eq!(view.pan, Vec2::ZERO);
}

// Window manager

#[test]
fn open_is_idempotent_per_file() {
    let (_dir, mut store, pid, fid) = store_with_file();
    let now = Instant::now();
    let mut ws = open_workspace(&mut store, pid, now);

    ws.open_window(&mut store, fid, VIEWPORT, now);
    ws.open_window(&mut store, fid, VIEWPORT, now);
    assert_eq!(ws.open_count(), 1);
    ws.close_window(&mut store, fid, now);
    assert_eq!(ws.open_count(), 0);
    ws.open_window(&mut store, fid, VIEWPORT, now);
    assert_eq!(ws.open_count(), 1);
}

#[test]
fn opening_folder_or_missing_record_is_a_noop() {
    let (_dir, mut store, pid, _fid) = store_with_file();
    let folder = outline::create_item(
        &mut store.db,
        NewItem {
            project_id: pid,
            parent: None,
            name: "Folder",
            kind: FileKind::Folder,
            template: None,
        },
    )
    .unwrap();
    let now = Instant::now();
    let mut ws = open_workspace(&mut store, pid, now);

    ws.open_window(&mut store, folder, VIEWPORT, now);
    ws.open_window(&mut store, uuid::Uuid::now_v7(), VIEWPORT, now);
    assert_eq!(ws.open_count(), 0);
}

#[test]
fn cascade_offsets_step_and_wrap() {
    let (_dir, mut store, pid, _fid) = store_with_file();
    let now = Instant::now();
    let mut ws = open_workspace(&mut store, pid, now);

    let mut xs = Vec::new();
    let mut ys = Vec::new();
    for i in 0..8 {
        let fid = outline::create_item(
            &mut store.db,
            NewItem {
                project_id: pid,
                parent: None,
                name: &format!("scene {i}"),
                kind: FileKind::File,
                template: None,
            },
        )
        .unwrap();
        ws.open_window(&mut store, fid, VIEWPORT, now);
        let rect = ws.window(fid).unwrap().rect;
        assert_eq!(rect.width(), DEFAULT_WINDOW_WIDTH);
        assert_eq!(rect.height(), DEFAULT_WINDOW_HEIGHT);
        xs.push(rect.min.x);
        ys.push(rect.min.y);
    }
    let base_x = VIEWPORT.x / 2.0 - DEFAULT_WINDOW_WIDTH / 2.0;
    let base_y = VIEWPORT.y / 2.0 - DEFAULT_WINDOW_HEIGHT / 2.0;
    let expect_x: Vec<f32> = [0, 32, 64, 96, 128, 160, 192, 24]
        .iter()
        .map(|o| base_x + *o as f32)
        .collect();
    let expect_y: Vec<f32> = [0, 32, 64, 96, 128, 10, 42, 74]
        .iter()
        .map(|o| base_y + *o as f32)
        .collect();
    assert_eq!(xs, expect_x);
    assert_eq!(ys, expect_y);
    // Strictly increasing until the horizontal wrap bound
    for pair in xs[..7].windows(2) {
        assert!(pair[1] > pair[0]);
    }
}

#[test]
fn focus_is_exclusive_and_z_strictly_increases() {
    let (_dir, mut store, pid, a) = store_with_file();
    let b = outline::create_item(
        &mut store.db,
        NewItem {
            project_id: pid,
            parent: None,
            name: "Scene 2",
            kind: FileKind::File,
            template: None,
        },
    )
    .unwrap();
    let now = Instant::now();
    let mut ws = open_workspace(&mut store, pid, now);

    ws.open_window(&mut store, a, VIEWPORT, now);
    ws.open_window(&mut store, b, VIEWPORT, now);
    assert_eq!(ws.active_id(), Some(b));

    ws.focus_window(a);
    assert_eq!(ws.active_id(), Some(a));
    let za = ws.window(a).unwrap().z;
    let zb = ws.window(b).unwrap().z;
    assert!(za > zb);

    ws.focus_window(b);
    let zb2 = ws.window(b).unwrap().z;
    assert!(zb2 > za);

    ws.unfocus_all();
    assert_eq!(ws.active_id(), None);
    // z order is untouched by unfocus
    assert_eq!(ws.window(b).unwrap().z, zb2);
    assert_eq!(ws.active_text(), None);

    ws.focus_window(a);
    ws.edit(a, "alpha draft".to_string(), &EditorSettings::default(), now);
    assert_eq!(ws.active_text(), Some("alpha draft"));
}

#[test]
fn closing_focused_window_hands_focus_to_most_recently_opened() {
    let (_dir, mut store, pid, a) = store_with_file();
    let mk = |db: &mut story_loom::store::StoryDatabase, name: &str| {
        outline::create_item(
            db,
            NewItem {
                project_id: pid,
                parent: None,
                name,
                kind: FileKind::File,
                template: None,
            },
        )
        .unwrap()
    };
    let b = mk(&mut store.db, "b");
    let c = mk(&mut store.db, "c");
    let now = Instant::now();
    let mut ws = open_workspace(&mut store, pid, now);

    ws.open_window(&mut store, a, VIEWPORT, now);
    ws.open_window(&mut store, b, VIEWPORT, now);
    ws.open_window(&mut store, c, VIEWPORT, now);
    ws.focus_window(a);
    ws.close_window(&mut store, a, now);
    assert_eq!(ws.active_id(), Some(c));
}

#[test]
fn drag_scales_with_inverse_zoom_and_persists_on_release() {
    let (_dir, mut store, pid, fid) = store_with_file();
    let now = Instant::now();
    let mut ws = open_workspace(&mut store, pid, now);
    ws.open_window(&mut store, fid, VIEWPORT, now);
    let start = ws.window(fid).unwrap().rect.min;

    ws.view.scale = 2.0;
    ws.begin_window_drag(fid, pos2(100.0, 100.0));
    ws.pointer_moved(pos2(180.0, 160.0));
    ws.end_interaction(&mut store, now);

    let rect = ws.window(fid).unwrap().rect;
    assert_eq!(rect.min, start + vec2(40.0, 30.0));
    let persisted = store.db.file(fid).unwrap().window.unwrap();
    assert_eq!(persisted.x, rect.min.x);
    assert_eq!(persisted.y, rect.min.y);
    assert!(persisted.is_open);
}

#[test]
fn resize_se_keeps_origin_and_nw_keeps_bottom_right() {
    let (_dir, mut store, pid, fid) = store_with_file();
    let now = Instant::now();
    let mut ws = open_workspace(&mut store, pid, now);
    ws.open_window(&mut store, fid, VIEWPORT, now);
    let orig = ws.window(fid).unwrap().rect;

    ws.begin_window_resize(fid, ResizeDir::Se, pos2(0.0, 0.0));
    ws.pointer_moved(pos2(60.0, 35.0));
    ws.end_interaction(&mut store, now);
    let grown = ws.window(fid).unwrap().rect;
    assert_eq!(grown.min, orig.min);
    assert_eq!(grown.width(), orig.width() + 60.0);
    assert_eq!(grown.height(), orig.height() + 35.0);

    ws.begin_window_resize(fid, ResizeDir::Nw, pos2(0.0, 0.0));
    ws.pointer_moved(pos2(-25.0, -15.0));
    ws.end_interaction(&mut store, now);
    let moved = ws.window(fid).unwrap().rect;
    assert_eq!(moved.max, grown.max);
    assert_eq!(moved.width(), grown.width() + 25.0);
    assert_eq!(moved.height(), grown.height() + 15.0);
}

#[test]
fn resize_never_drops_below_minimum_size() {
    let (_dir, mut store, pid, fid) = store_with_file();
    let now = Instant::now();
    let mut ws = open_workspace(&mut store, pid, now);
    ws.open_window(&mut store, fid, VIEWPORT, now);
    let orig = ws.window(fid).unwrap().rect;

    ws.begin_window_resize(fid, ResizeDir::Se, pos2(0.0, 0.0));
    ws.pointer_moved(pos2(-5000.0, -5000.0));
    ws.end_interaction(&mut store, now);
    let rect = ws.window(fid).unwrap().rect;
    assert_eq!(rect.width(), MIN_WINDOW_WIDTH);
    assert_eq!(rect.height(), MIN_WINDOW_HEIGHT);
    // se shrinking keeps the origin fixed even at the floor
    assert_eq!(rect.min, orig.min);
}

#[test]
fn only_one_pointer_interaction_at_a_time() {
    let (_dir, mut store, pid, fid) = store_with_file();
    let now = Instant::now();
    let mut ws = open_workspace(&mut store, pid, now);
    ws.open_window(&mut store, fid, VIEWPORT, now);

    ws.begin_window_drag(fid, pos2(0.0, 0.0));
    assert!(ws.interaction_active());
    let pan_before = ws.view.pan;
    ws.begin_pan(pos2(5.0, 5.0));
    ws.pointer_moved(pos2(50.0, 50.0));
    // The pan request was ignored while the drag was live
    assert_eq!(ws.view.pan, pan_before);
    ws.end_interaction(&mut store, now);
    assert!(!ws.interaction_active());
}

#[test]
fn autosave_debounce_fires_once_for_rapid_edits() {
    let (_dir, mut store, pid, fid) = store_with_file();
    let settings = EditorSettings::default();
    let t0 = Instant::now();
    let mut ws = open_workspace(&mut store, pid, t0);
    ws.open_window(&mut store, fid, VIEWPORT, t0);

    ws.edit(fid, "H".to_string(), &settings, t0);
    ws.edit(fid, "He".to_string(), &settings, t0 + Duration::from_secs(1));
    ws.edit(fid, "Hello".to_string(), &settings, t0 + Duration::from_secs(2));

    // The deadline tracks the last edit, so nothing fires before it
    ws.tick(&mut store, &settings, t0 + Duration::from_millis(4500));
    assert_eq!(store.db.file(fid).unwrap().content, "");
    assert!(ws.window(fid).unwrap().dirty);

    ws.tick(&mut store, &settings, t0 + Duration::from_secs(5));
    assert_eq!(store.db.file(fid).unwrap().content, "Hello");
    assert!(!ws.window(fid).unwrap().dirty);

    // Spaced edits each get their own save
    let t1 = t0 + Duration::from_secs(10);
    ws.edit(fid, "Hello,".to_string(), &settings, t1);
    ws.tick(&mut store, &settings, t1 + Duration::from_secs(3));
    assert_eq!(store.db.file(fid).unwrap().content, "Hello,");
    let t2 = t1 + Duration::from_secs(10);
    ws.edit(fid, "Hello, world".to_string(), &settings, t2);
    ws.tick(&mut store, &settings, t2 + Duration::from_secs(3));
    assert_eq!(store.db.file(fid).unwrap().content, "Hello, world");
}

#[test]
fn autosave_respects_disabled_setting_but_manual_save_works() {
    let (_dir, mut store, pid, fid) = store_with_file();
    let settings = EditorSettings { auto_save: false, ..EditorSettings::default() };
    let t0 = Instant::now();
    let mut ws = open_workspace(&mut store, pid, t0);
    ws.open_window(&mut store, fid, VIEWPORT, t0);

    ws.edit(fid, "quiet".to_string(), &settings, t0);
    ws.tick(&mut store, &settings, t0 + Duration::from_secs(60));
    assert_eq!(store.db.file(fid).unwrap().content, "");
    assert!(ws.window(fid).unwrap().dirty);

    // An automatic save request is also gated off
    ws.save_window(&mut store, fid, SaveKind::Automatic, &settings, t0);
    assert_eq!(store.db.file(fid).unwrap().content, "");

    ws.save_window(&mut store, fid, SaveKind::Manual, &settings, t0);
    assert_eq!(store.db.file(fid).unwrap().content, "quiet");
    assert!(!ws.window(fid).unwrap().dirty);
}

#[test]
fn save_and_reopen_round_trips_unicode_text() {
    let (dir, mut store, pid, fid) = store_with_file();
    let settings = EditorSettings::default();
    let now = Instant::now();
    let mut ws = open_workspace(&mut store, pid, now);
    ws.open_window(&mut store, fid, VIEWPORT, now);

    let text = "She said, \"stay\".\n'why?'\n(a thought)\n소설 테스트 \u{1F58B}\nfin\n";
    ws.edit(fid, text.to_string(), &settings, now);
    ws.save_window(&mut store, fid, SaveKind::Manual, &settings, now);
    ws.close_window(&mut store, fid, now);

    ws.open_window(&mut store, fid, VIEWPORT, now);
    assert_eq!(ws.window(fid).unwrap().buffer, text);

    // And through the on-disk state file
    let reloaded = StoryStore::at_path(dir.path().join("state.ron"));
    assert_eq!(reloaded.db.file(fid).unwrap().content, text);
}

#[test]
fn close_flushes_dirty_content_and_marks_closed() {
    let (_dir, mut store, pid, fid) = store_with_file();
    let settings = EditorSettings::default();
    let now = Instant::now();
    let mut ws = open_workspace(&mut store, pid, now);
    ws.open_window(&mut store, fid, VIEWPORT, now);

    ws.edit(fid, "unsaved words".to_string(), &settings, now);
    ws.close_window(&mut store, fid, now);

    let file = store.db.file(fid).unwrap();
    assert_eq!(file.content, "unsaved words");
    let geo = file.window.unwrap();
    assert!(!geo.is_open);
}

#[test]
fn failed_flush_keeps_dirty_state_for_retry() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, "not a directory").unwrap();
    // The state file's parent is a regular file, so every flush fails
    let mut store = StoryStore::at_path(blocker.join("sub").join("state.ron"));
    let pid = store.db.create_project("P".to_string(), None);
    let fid = outline::create_item(
        &mut store.db,
        NewItem {
            project_id: pid,
            parent: None,
            name: "Scene",
            kind: FileKind::File,
            template: None,
        },
    )
    .unwrap();
    let settings = EditorSettings::default();
    let now = Instant::now();
    let mut ws = open_workspace(&mut store, pid, now);
    ws.open_window(&mut store, fid, VIEWPORT, now);

    ws.edit(fid, "fragile".to_string(), &settings, now);
    ws.save_window(&mut store, fid, SaveKind::Manual, &settings, now);

    let win = ws.window(fid).unwrap();
    assert!(win.dirty, "dirty must survive a failed flush");
    let notice = ws.notice(now).expect("failure surfaced");
    assert_eq!(notice.kind, story_loom::workspace::NoticeKind::Error);
}

#[test]
fn session_restore_reopens_windows_with_persisted_geometry() {
    let (_dir, mut store, pid, a) = store_with_file();
    let b = outline::create_item(
        &mut store.db,
        NewItem {
            project_id: pid,
            parent: None,
            name: "Scene 2",
            kind: FileKind::File,
            template: None,
        },
    )
    .unwrap();
    let now = Instant::now();
    let mut ws = open_workspace(&mut store, pid, now);
    ws.open_window(&mut store, a, VIEWPORT, now);
    ws.open_window(&mut store, b, VIEWPORT, now);

    // Move one window and the shared view, then leave the project
    ws.begin_window_drag(b, pos2(0.0, 0.0));
    ws.pointer_moved(pos2(111.0, 57.0));
    ws.end_interaction(&mut store, now);
    let moved_rect = ws.window(b).unwrap().rect;
    ws.begin_pan(pos2(0.0, 0.0));
    ws.pointer_moved(pos2(-40.0, 25.0));
    ws.end_interaction(&mut store, now);
    let view = ws.view;
    ws.clear_all(&mut store, now);
    assert_eq!(ws.open_count(), 0);
    assert_eq!(ws.view.scale, 1.0);

    ws.open_project(&mut store, pid, VIEWPORT, now);
    assert_eq!(ws.open_count(), 2);
    assert_eq!(ws.window(b).unwrap().rect, moved_rect);
    assert_eq!(ws.view.pan, view.pan);
}

#[test]
fn closed_windows_are_not_restored_but_keep_their_geometry() {
    // The "Draft / Ch1 / Scene1" walkthrough
    let (_dir, mut store) = temp_store();
    let settings = EditorSettings::default();
    let pid = store.db.create_project("Draft".to_string(), None);
    let ch1 = outline::create_item(
        &mut store.db,
        NewItem {
            project_id: pid,
            parent: None,
            name: "Ch1",
            kind: FileKind::Folder,
            template: None,
        },
    )
    .unwrap();
    let scene = outline::create_item(
        &mut store.db,
        NewItem {
            project_id: pid,
            parent: Some(ch1),
            name: "Scene1",
            kind: FileKind::File,
            template: None,
        },
    )
    .unwrap();
    assert_eq!(store.db.file(ch1).unwrap().order, 0);
    assert_eq!(store.db.file(scene).unwrap().order, 0);

    let t0 = Instant::now();
    let mut ws = open_workspace(&mut store, pid, t0);
    ws.open_window(&mut store, scene, VIEWPORT, t0);
    let opened_rect = ws.window(scene).unwrap().rect;
    assert_eq!(opened_rect.size(), vec2(DEFAULT_WINDOW_WIDTH, DEFAULT_WINDOW_HEIGHT));

    ws.edit(scene, "Hello".to_string(), &settings, t0);
    ws.tick(&mut store, &settings, t0 + Duration::from_secs(3));
    assert_eq!(store.db.file(scene).unwrap().content, "Hello");

    ws.close_window(&mut store, scene, t0 + Duration::from_secs(4));
    assert!(!store.db.file(scene).unwrap().window.unwrap().is_open);

    // Reopening the project does not auto-restore the closed window
    ws.clear_all(&mut store, t0 + Duration::from_secs(5));
    ws.open_project(&mut store, pid, VIEWPORT, t0 + Duration::from_secs(5));
    assert_eq!(ws.open_count(), 0);

    // A direct open recalls the geometry recorded when it was first opened
    ws.open_window(&mut store, scene, VIEWPORT, t0 + Duration::from_secs(6));
    assert_eq!(ws.window(scene).unwrap().rect, opened_rect);
}

#[test]
fn maximize_toggles_and_restores_verbatim() {
    let (_dir, mut store, pid, fid) = store_with_file();
    let now = Instant::now();
    let mut ws = open_workspace(&mut store, pid, now);
    ws.open_window(&mut store, fid, VIEWPORT, now);
    let orig = ws.window(fid).unwrap().rect;

    let container = eframe::egui::Rect::from_min_size(Pos2::ZERO, VIEWPORT);
    ws.toggle_maximize(fid, container);
    let maxed = ws.window(fid).unwrap().rect;
    assert!(ws.window(fid).unwrap().is_maximized());
    assert!(maxed.width() > orig.width());
    assert_eq!(maxed, container.shrink(8.0));

    ws.toggle_maximize(fid, container);
    assert_eq!(ws.window(fid).unwrap().rect, orig);
    assert!(!ws.window(fid).unwrap().is_maximized());
}

#[test]
fn deleting_a_subtree_discards_its_open_windows() {
    let (_dir, mut store, pid, _fid) = store_with_file();
    let folder = outline::create_item(
        &mut store.db,
        NewItem {
            project_id: pid,
            parent: None,
            name: "Arc",
            kind: FileKind::Folder,
            template: None,
        },
    )
    .unwrap();
    let inner = outline::create_item(
        &mut store.db,
        NewItem {
            project_id: pid,
            parent: Some(folder),
            name: "Inner",
            kind: FileKind::File,
            template: None,
        },
    )
    .unwrap();
    let now = Instant::now();
    let mut ws = open_workspace(&mut store, pid, now);
    ws.open_window(&mut store, inner, VIEWPORT, now);
    assert!(ws.is_open(inner));

    let deleted = outline::delete_item(&mut store.db, folder);
    ws.discard_windows_under(&deleted);
    assert!(!ws.is_open(inner));
    assert_eq!(ws.active_id(), None);
}

#[test]
fn save_all_windows_writes_every_open_buffer() {
    let (_dir, mut store, pid, a) = store_with_file();
    let b = outline::create_item(
        &mut store.db,
        NewItem {
            project_id: pid,
            parent: None,
            name: "Scene 2",
            kind: FileKind::File,
            template: None,
        },
    )
    .unwrap();
    // Even with autosave off, the project-switch guard must not drop text
    let settings = EditorSettings { auto_save: false, ..EditorSettings::default() };
    let now = Instant::now();
    let mut ws = open_workspace(&mut store, pid, now);
    ws.open_window(&mut store, a, VIEWPORT, now);
    ws.open_window(&mut store, b, VIEWPORT, now);
    ws.edit(a, "alpha".to_string(), &settings, now);
    ws.edit(b, "beta".to_string(), &settings, now);

    ws.clear_all(&mut store, now);
    assert_eq!(store.db.file(a).unwrap().content, "alpha");
    assert_eq!(store.db.file(b).unwrap().content, "beta");
}

#[test]
fn search_sees_unsaved_buffers_and_stored_content() {
    let (_dir, mut store, pid, a) = store_with_file();
    let b = outline::create_item(
        &mut store.db,
        NewItem {
            project_id: pid,
            parent: None,
            name: "Closed scene",
            kind: FileKind::File,
            template: None,
        },
    )
    .unwrap();
    store
        .db
        .set_file_content(b, "The harbor at dusk.\nNothing else.".to_string());
    let settings = EditorSettings::default();
    let now = Instant::now();
    let mut ws = open_workspace(&mut store, pid, now);
    ws.open_window(&mut store, a, VIEWPORT, now);
    // Unsaved edit in the open window must still be searchable
    ws.edit(a, "No harbor here?\nYes, harbor.".to_string(), &settings, now);

    let hits = ws.search_project(&store, pid, "harbor");
    let found: Vec<(&str, usize)> = hits
        .iter()
        .map(|h| (h.file_name.as_str(), h.line_no))
        .collect();
    assert_eq!(
        found,
        vec![("Closed scene", 1), ("Scene 1", 1), ("Scene 1", 2)]
    );

    assert!(ws.search_project(&store, pid, "kraken").is_empty());
    // Case sensitive by design
    assert!(ws.search_project(&store, pid, "Harbor").len() < hits.len());
}

// Statistics

#[test]
fn text_stats_counts() {
    let s = TextStats::of("One. Two! Three?\nFour");
    assert_eq!(s.words, 4);
    assert_eq!(s.sentences, 4);
    assert_eq!(s.paragraphs, 2);
    assert_eq!(s.chars, "One. Two! Three?\nFour".chars().count());
    assert_eq!(s.chars_no_space, 18);

    let unicode = TextStats::of("한국어 소설");
    assert_eq!(unicode.chars, 6);
    assert_eq!(unicode.chars_no_space, 5);
    assert_eq!(unicode.words, 2);

    assert_eq!(TextStats::of(""), TextStats::default());
}

#[test]
fn manuscript_paragraphs_split_on_blank_lines() {
    assert_eq!(manuscript_paragraphs("a\n\nb\n\n\nc"), 3);
    assert_eq!(manuscript_paragraphs("single line\nsame paragraph"), 1);
    assert_eq!(manuscript_paragraphs("\n\n\n"), 0);
}

// Timer

#[test]
fn stopwatch_accumulates_across_pauses() {
    let t0 = Instant::now();
    let mut timer = WritingTimer::default();
    timer.start(t0);
    timer.pause(t0 + Duration::from_secs(5));
    assert_eq!(timer.display(t0 + Duration::from_secs(60)), Duration::from_secs(5));
    let t1 = t0 + Duration::from_secs(100);
    timer.start(t1);
    assert_eq!(timer.display(t1 + Duration::from_secs(3)), Duration::from_secs(8));
}

#[test]
fn countdown_finishes_exactly_once() {
    let t0 = Instant::now();
    let mut timer = WritingTimer::default();
    timer.set_mode(TimerMode::Custom);
    timer.set_custom_minutes(1);
    timer.start(t0);
    assert_eq!(timer.tick(t0 + Duration::from_secs(30)), None);
    assert_eq!(
        timer.tick(t0 + Duration::from_secs(61)),
        Some(TimerEvent::Finished)
    );
    assert!(!timer.is_running());
    assert_eq!(timer.tick(t0 + Duration::from_secs(120)), None);
    assert_eq!(timer.display(t0 + Duration::from_secs(120)), Duration::ZERO);
}

#[test]
fn pomodoro_counts_down_from_25_minutes() {
    let t0 = Instant::now();
    let mut timer = WritingTimer::default();
    timer.set_mode(TimerMode::Pomodoro);
    assert_eq!(format_hms(timer.display(t0)), "00:25:00");
    timer.start(t0);
    assert_eq!(
        timer.display(t0 + Duration::from_secs(60)),
        Duration::from_secs(24 * 60)
    );
}
