use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::records::{
    now_ts, CanvasState, FileId, FileKind, FileRecord, Memo, MemoId, Project, ProjectId, Template,
    TemplateId, TemplateRef, WindowGeometry,
};

/// Everything a user has written, indexed by record id. Projects own their
/// files and memos by `project_id`; files form per-project trees by
/// `parent_id`. Templates are global.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StoryDatabase {
    pub projects: HashMap<ProjectId, Project>,
    pub files: HashMap<FileId, FileRecord>,
    pub memos: HashMap<MemoId, Memo>,
    pub templates: HashMap<TemplateId, Template>,
}

pub struct NewFile<'a> {
    pub project_id: ProjectId,
    pub name: &'a str,
    pub kind: FileKind,
    pub parent_id: Option<FileId>,
    pub content: String,
    pub default_template: Option<TemplateRef>,
    pub order: i64,
}

impl StoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    // Projects

    pub fn create_project(&mut self, name: String, thumbnail: Option<String>) -> ProjectId {
        let id = Uuid::now_v7();
        let ts = now_ts();
        let project = Project {
            id,
            name,
            thumbnail,
            canvas: None,
            created_at: ts,
            updated_at: ts,
        };
        self.projects.insert(id, project);
        id
    }

    pub fn project(&self, id: ProjectId) -> Option<&Project> {
        self.projects.get(&id)
    }

    /// Projects sorted most-recently-updated first, for the project screen.
    pub fn projects_by_recency(&self) -> Vec<&Project> {
        let mut all: Vec<&Project> = self.projects.values().collect();
        all.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.name.cmp(&b.name)));
        all
    }

    pub fn rename_project(&mut self, id: ProjectId, name: String) -> bool {
        if let Some(p) = self.projects.get_mut(&id) {
            p.name = name;
            p.updated_at = now_ts();
            true
        } else {
            false
        }
    }

    pub fn set_project_thumbnail(&mut self, id: ProjectId, thumbnail: Option<String>) -> bool {
        if let Some(p) = self.projects.get_mut(&id) {
            p.thumbnail = thumbnail;
            p.updated_at = now_ts();
            true
        } else {
            false
        }
    }

    pub fn set_project_canvas(&mut self, id: ProjectId, canvas: CanvasState) -> bool {
        if let Some(p) = self.projects.get_mut(&id) {
            p.canvas = Some(canvas);
            p.updated_at = now_ts();
            true
        } else {
            false
        }
    }

    /// Timestamp bump on any contained-file change.
    pub fn touch_project(&mut self, id: ProjectId) -> bool {
        if let Some(p) = self.projects.get_mut(&id) {
            p.updated_at = now_ts();
            true
        } else {
            false
        }
    }

    /// Cascade delete: the project plus every owned file and memo, in one unit.
    pub fn delete_project(&mut self, id: ProjectId) -> bool {
        if self.projects.remove(&id).is_none() {
            return false;
        }
        self.files.retain(|_, f| f.project_id != id);
        self.memos.retain(|_, m| m.project_id != id);
        true
    }

    // Files

    pub fn create_file(&mut self, new: NewFile<'_>) -> FileId {
        let id = Uuid::now_v7();
        let ts = now_ts();
        let file = FileRecord {
            id,
            project_id: new.project_id,
            name: new.name.to_string(),
            kind: new.kind,
            parent_id: new.parent_id,
            content: new.content,
            default_template: new.default_template,
            order: new.order,
            window: None,
            created_at: ts,
            updated_at: ts,
        };
        self.files.insert(id, file);
        id
    }

    pub fn file(&self, id: FileId) -> Option<&FileRecord> {
        self.files.get(&id)
    }

    pub fn files_for_project(&self, project_id: ProjectId) -> Vec<&FileRecord> {
        self.files.values().filter(|f| f.project_id == project_id).collect()
    }

    /// Siblings under `parent` (None = project root), ordered by `order` with
    /// name as tie-break.
    pub fn ordered_children(&self, project_id: ProjectId, parent: Option<FileId>) -> Vec<&FileRecord> {
        let mut children: Vec<&FileRecord> = self
            .files
            .values()
            .filter(|f| f.project_id == project_id && f.parent_id == parent)
            .collect();
        children.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.name.cmp(&b.name)));
        children
    }

    pub fn rename_file(&mut self, id: FileId, name: String) -> bool {
        if let Some(f) = self.files.get_mut(&id) {
            f.name = name;
            f.updated_at = now_ts();
            true
        } else {
            false
        }
    }

    pub fn set_file_content(&mut self, id: FileId, content: String) -> bool {
        if let Some(f) = self.files.get_mut(&id) {
            f.content = content;
            f.updated_at = now_ts();
            true
        } else {
            false
        }
    }

    pub fn set_folder_default_template(&mut self, id: FileId, template: Option<TemplateRef>) -> bool {
        if let Some(f) = self.files.get_mut(&id) {
            f.default_template = template;
            f.updated_at = now_ts();
            true
        } else {
            false
        }
    }

    pub fn set_file_window(&mut self, id: FileId, window: WindowGeometry) -> bool {
        if let Some(f) = self.files.get_mut(&id) {
            f.window = Some(window);
            f.updated_at = now_ts();
            true
        } else {
            false
        }
    }

    /// Flip the open flag while keeping the last geometry.
    pub fn set_window_open(&mut self, id: FileId, open: bool) -> bool {
        if let Some(f) = self.files.get_mut(&id) {
            if let Some(w) = f.window.as_mut() {
                w.is_open = open;
            } else if open {
                return false;
            }
            f.updated_at = now_ts();
            true
        } else {
            false
        }
    }

    pub fn move_file(&mut self, id: FileId, parent: Option<FileId>, order: i64) -> bool {
        if let Some(f) = self.files.get_mut(&id) {
            f.parent_id = parent;
            f.order = order;
            f.updated_at = now_ts();
            true
        } else {
            false
        }
    }

    pub fn set_file_order(&mut self, id: FileId, order: i64) -> bool {
        if let Some(f) = self.files.get_mut(&id) {
            if f.order != order {
                f.order = order;
                f.updated_at = now_ts();
            }
            true
        } else {
            false
        }
    }

    /// Delete a file or a whole folder subtree, walking the parent index
    /// breadth-first so every reachable descendant goes in the same unit of
    /// work. Returns the ids actually removed (empty if `id` was absent).
    pub fn delete_file_tree(&mut self, id: FileId) -> Vec<FileId> {
        if !self.files.contains_key(&id) {
            return Vec::new();
        }
        let mut doomed = vec![id];
        let mut cursor = 0;
        while cursor < doomed.len() {
            let parent = doomed[cursor];
            cursor += 1;
            for f in self.files.values() {
                if f.parent_id == Some(parent) {
                    doomed.push(f.id);
                }
            }
        }
        for fid in &doomed {
            self.files.remove(fid);
        }
        doomed
    }

    // Memos

    pub fn create_memo(&mut self, project_id: ProjectId, content: String) -> MemoId {
        let id = Uuid::now_v7();
        let ts = now_ts();
        let memo = Memo { id, project_id, content, created_at: ts, updated_at: ts };
        self.memos.insert(id, memo);
        id
    }

    /// Memos for the panel, newest first.
    pub fn memos_for_project(&self, project_id: ProjectId) -> Vec<&Memo> {
        let mut memos: Vec<&Memo> = self
            .memos
            .values()
            .filter(|m| m.project_id == project_id)
            .collect();
        memos.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        memos
    }

    pub fn update_memo(&mut self, id: MemoId, content: String) -> bool {
        if let Some(m) = self.memos.get_mut(&id) {
            m.content = content;
            m.updated_at = now_ts();
            true
        } else {
            false
        }
    }

    pub fn delete_memo(&mut self, id: MemoId) -> bool {
        self.memos.remove(&id).is_some()
    }

    pub fn delete_memos(&mut self, ids: &[MemoId]) -> usize {
        let mut removed = 0;
        for id in ids {
            if self.memos.remove(id).is_some() {
                removed += 1;
            }
        }
        removed
    }

    // Templates

    pub fn create_template(&mut self, name: String, icon: String, content: String) -> TemplateId {
        let id = Uuid::now_v7();
        let template = Template { id, name, icon, content, created_at: now_ts() };
        self.templates.insert(id, template);
        id
    }

    pub fn templates_by_name(&self) -> Vec<&Template> {
        let mut all: Vec<&Template> = self.templates.values().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    pub fn update_template(&mut self, id: TemplateId, name: String, icon: String, content: String) -> bool {
        if let Some(t) = self.templates.get_mut(&id) {
            t.name = name;
            t.icon = icon;
            t.content = content;
            true
        } else {
            false
        }
    }

    pub fn delete_template(&mut self, id: TemplateId) -> bool {
        self.templates.remove(&id).is_some()
    }
}
