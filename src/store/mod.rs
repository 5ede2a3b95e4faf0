pub mod database;
pub mod records;

use std::path::PathBuf;

use crate::persistence::persist;

pub use database::{NewFile, StoryDatabase};
pub use records::{
    CanvasState, FileId, FileKind, FileRecord, Memo, MemoId, Project, ProjectId, Template,
    TemplateId, TemplateRef, WindowGeometry,
};

/// The in-memory database plus the state file it flushes to. All record
/// mutation happens in memory; `flush` is the only fallible step, and callers
/// keep their dirty flags when it fails so a later retry can succeed.
pub struct StoryStore {
    pub db: StoryDatabase,
    state_path: PathBuf,
}

impl StoryStore {
    /// Load from the per-user state directory, or start empty.
    pub fn open_default() -> Self {
        Self::at_path(persist::active_state_path())
    }

    pub fn at_path(state_path: PathBuf) -> Self {
        let db = persist::load_or_default(&state_path);
        Self { db, state_path }
    }

    pub fn state_path(&self) -> &std::path::Path {
        &self.state_path
    }

    pub fn flush(&self) -> anyhow::Result<()> {
        persist::save_database(&self.db, &self.state_path)
    }
}
