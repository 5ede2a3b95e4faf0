use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

// Basic type aliases for clarity
pub type ProjectId = Uuid;
pub type FileId = Uuid;
pub type MemoId = Uuid;
pub type TemplateId = Uuid;

/// Unix-second timestamp used on every stored record.
pub fn now_ts() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileKind {
    File,
    Folder,
}

/// Per-file floating-window placement, persisted so a session can be restored.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WindowGeometry {
    pub is_open: bool,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Per-project canvas view, persisted on zoom/pan changes.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CanvasState {
    pub scale: f32,
    pub pan_x: f32,
    pub pan_y: f32,
}

impl Default for CanvasState {
    fn default() -> Self {
        Self { scale: 1.0, pan_x: 0.0, pan_y: 0.0 }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    // Opaque image reference (data URI or path); never interpreted here
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub canvas: Option<CanvasState>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Which writing template seeds a new file's content. Built-ins are copied
/// from fixed bodies; custom templates are copied from the template store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TemplateRef {
    Item,
    Place,
    Custom(TemplateId),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: FileId,
    pub project_id: ProjectId,
    pub name: String,
    pub kind: FileKind,
    // None = root of the project's tree
    pub parent_id: Option<FileId>,
    pub content: String,
    // Folders only: preselected template for files created inside
    pub default_template: Option<TemplateRef>,
    pub order: i64,
    #[serde(default)]
    pub window: Option<WindowGeometry>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl FileRecord {
    pub fn is_folder(&self) -> bool {
        self.kind == FileKind::Folder
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Memo {
    pub id: MemoId,
    pub project_id: ProjectId,
    pub content: String,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Template {
    pub id: TemplateId,
    pub name: String,
    pub icon: String,
    pub content: String,
    pub created_at: i64,
}

const ITEM_TEMPLATE: &str = "# Item name: \n\n## 1. Overview\n- Category: \n- Current owner: \n\n## 2. Traits\n- Form: \n- Powers/function: \n- Rarity: \n\n## 3. History\n- Maker: \n- Where found: \n- Related legends: \n\n## 4. Notes\n- ";

const PLACE_TEMPLATE: &str = "# Place name: \n\n## 1. Overview\n- Region: \n- Terrain: \n\n## 2. Mood\n- Climate: \n- Visual signature: \n- Sounds: \n\n## 3. History\n- Founded: \n- Notable events: \n\n## 4. Factions and figures\n- Ruling power: \n- Notable residents: \n\n## 5. Notes\n- ";

impl TemplateRef {
    /// Body text copied by value into a new file. Custom templates that were
    /// deleted since the folder default was set degrade to empty content.
    pub fn body(&self, templates: &std::collections::HashMap<TemplateId, Template>) -> String {
        match self {
            TemplateRef::Item => ITEM_TEMPLATE.to_string(),
            TemplateRef::Place => PLACE_TEMPLATE.to_string(),
            TemplateRef::Custom(id) => templates.get(id).map(|t| t.content.clone()).unwrap_or_default(),
        }
    }

    pub fn icon(&self, templates: &std::collections::HashMap<TemplateId, Template>) -> String {
        match self {
            TemplateRef::Item => "\u{1F4E6}".to_string(),
            TemplateRef::Place => "\u{1F5FA}".to_string(),
            TemplateRef::Custom(id) => templates
                .get(id)
                .map(|t| t.icon.clone())
                .unwrap_or_else(|| "\u{1F4C4}".to_string()),
        }
    }
}
