//! Hierarchy operations over a project's file tree: ordering, creation,
//! renaming, deletion, and drag-and-drop reparenting. Structure invariants
//! (no cycles, dense sibling order) are enforced here; persistence is the
//! caller's flush.

use std::collections::HashSet;

use thiserror::Error;

use crate::store::records::{FileId, FileKind, ProjectId, TemplateRef};
use crate::store::{NewFile, StoryDatabase};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OutlineError {
    #[error("name cannot be empty")]
    EmptyName,
    #[error("an item cannot be moved into its own subtree")]
    IntoOwnSubtree,
}

/// Where a dragged row would land relative to the row under the pointer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropZone {
    Into,
    Before,
    After,
}

/// Classify the pointer's vertical position within a candidate row. The
/// middle 50% of a folder row means "into"; everything else splits into
/// before/after at the midpoint.
pub fn drop_zone(target_is_folder: bool, pointer_y: f32, row_height: f32) -> DropZone {
    if row_height <= 0.0 {
        return DropZone::After;
    }
    let frac = pointer_y / row_height;
    if target_is_folder && frac > 0.25 && frac < 0.75 {
        DropZone::Into
    } else if frac < 0.5 {
        DropZone::Before
    } else {
        DropZone::After
    }
}

pub struct NewItem<'a> {
    pub project_id: ProjectId,
    pub parent: Option<FileId>,
    pub name: &'a str,
    pub kind: FileKind,
    pub template: Option<TemplateRef>,
}

/// Create a file or folder at the end of its sibling run. File content is
/// copied by value from the chosen template; a folder records the template as
/// its default for future children.
pub fn create_item(db: &mut StoryDatabase, item: NewItem<'_>) -> Result<FileId, OutlineError> {
    let name = item.name.trim();
    if name.is_empty() {
        return Err(OutlineError::EmptyName);
    }
    let content = match item.kind {
        FileKind::File => item
            .template
            .map(|t| t.body(&db.templates))
            .unwrap_or_default(),
        FileKind::Folder => String::new(),
    };
    let default_template = match item.kind {
        FileKind::Folder => item.template,
        FileKind::File => None,
    };
    let order = db
        .ordered_children(item.project_id, item.parent)
        .last()
        .map(|f| f.order + 1)
        .unwrap_or(0);
    let id = db.create_file(NewFile {
        project_id: item.project_id,
        name,
        kind: item.kind,
        parent_id: item.parent,
        content,
        default_template,
        order,
    });
    resequence(db, item.project_id, item.parent);
    Ok(id)
}

pub fn rename_item(db: &mut StoryDatabase, id: FileId, name: &str) -> Result<(), OutlineError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(OutlineError::EmptyName);
    }
    db.rename_file(id, name.to_string());
    Ok(())
}

/// Delete a file or a whole folder subtree and keep the source sibling run
/// dense. Returns the deleted ids so open windows can be discarded.
pub fn delete_item(db: &mut StoryDatabase, id: FileId) -> Vec<FileId> {
    let Some(file) = db.file(id) else { return Vec::new() };
    let project = file.project_id;
    let parent = file.parent_id;
    let deleted = db.delete_file_tree(id);
    resequence(db, project, parent);
    deleted
}

/// True when `node` sits somewhere below `ancestor`.
pub fn is_descendant(db: &StoryDatabase, node: FileId, ancestor: FileId) -> bool {
    let mut current = db.file(node).and_then(|f| f.parent_id);
    while let Some(pid) = current {
        if pid == ancestor {
            return true;
        }
        current = db.file(pid).and_then(|f| f.parent_id);
    }
    false
}

/// Move `dragged` relative to `target`. A move that would make a node its own
/// descendant is rejected with no state change; missing records degrade to a
/// no-op. Both the old and the new sibling runs are re-sequenced densely.
pub fn reparent(
    db: &mut StoryDatabase,
    dragged: FileId,
    target: FileId,
    zone: DropZone,
) -> Result<(), OutlineError> {
    if dragged == target {
        return Ok(());
    }
    let Some(src) = db.file(dragged) else { return Ok(()) };
    let project = src.project_id;
    let old_parent = src.parent_id;
    let Some(tgt) = db.file(target) else { return Ok(()) };
    let tgt_parent = tgt.parent_id;
    let tgt_is_folder = tgt.is_folder();

    if is_descendant(db, target, dragged) {
        return Err(OutlineError::IntoOwnSubtree);
    }

    // Non-folders cannot receive children; fall back to dropping after them
    let zone = if zone == DropZone::Into && !tgt_is_folder { DropZone::After } else { zone };

    match zone {
        DropZone::Into => {
            let order = db.ordered_children(project, Some(target)).len() as i64;
            db.move_file(dragged, Some(target), order);
            resequence(db, project, Some(target));
        }
        DropZone::Before | DropZone::After => {
            let mut seq: Vec<FileId> = db
                .ordered_children(project, tgt_parent)
                .iter()
                .filter(|f| f.id != dragged)
                .map(|f| f.id)
                .collect();
            let idx = seq.iter().position(|&s| s == target).unwrap_or(seq.len());
            let insert_at = if zone == DropZone::Before { idx } else { idx + 1 };
            seq.insert(insert_at.min(seq.len()), dragged);
            db.move_file(dragged, tgt_parent, insert_at as i64);
            for (i, fid) in seq.iter().enumerate() {
                db.set_file_order(*fid, i as i64);
            }
        }
    }

    let new_parent = db.file(dragged).and_then(|f| f.parent_id);
    if old_parent != new_parent {
        resequence(db, project, old_parent);
    }
    Ok(())
}

/// Drop on empty tree space: re-home at the end of the root run.
pub fn move_to_root_end(db: &mut StoryDatabase, id: FileId) {
    let Some(file) = db.file(id) else { return };
    let project = file.project_id;
    let old_parent = file.parent_id;
    if old_parent.is_none() {
        return;
    }
    let order = db.ordered_children(project, None).len() as i64;
    db.move_file(id, None, order);
    resequence(db, project, None);
    resequence(db, project, old_parent);
}

fn resequence(db: &mut StoryDatabase, project: ProjectId, parent: Option<FileId>) {
    let ids: Vec<FileId> = db
        .ordered_children(project, parent)
        .iter()
        .map(|f| f.id)
        .collect();
    for (i, id) in ids.iter().enumerate() {
        db.set_file_order(*id, i as i64);
    }
}

/// Tree-panel view state: which folders are unfolded and what is being
/// dragged. Lives outside the database because it is per-session.
#[derive(Default)]
pub struct OutlineView {
    pub expanded: HashSet<FileId>,
    pub dragged: Option<FileId>,
}

impl OutlineView {
    pub fn toggle(&mut self, id: FileId) {
        if !self.expanded.remove(&id) {
            self.expanded.insert(id);
        }
    }

    pub fn clear(&mut self) {
        self.expanded.clear();
        self.dragged = None;
    }
}
