use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use ron::ser::PrettyConfig;

use crate::store::database::StoryDatabase;

fn state_dir() -> PathBuf {
    // Cross-platform user-writable state dir
    #[cfg(target_os = "macos")]
    {
        // ~/Library/Application Support/Story-Loom
        let home = std::env::var_os("HOME").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("~"));
        return home.join("Library").join("Application Support").join("Story-Loom");
    }
    #[cfg(target_os = "windows")]
    {
        // %LOCALAPPDATA%\Story-Loom else TEMP
        if let Ok(local) = std::env::var("LOCALAPPDATA") {
            return PathBuf::from(local).join("Story-Loom");
        }
        if let Ok(temp) = std::env::var("TEMP") {
            return PathBuf::from(temp).join("Story-Loom");
        }
        return PathBuf::from("Story-Loom");
    }
    #[cfg(all(unix, not(target_os = "macos")))]
    {
        // $XDG_STATE_HOME/story-loom or ~/.local/state/story-loom, else /tmp
        if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
            return PathBuf::from(xdg).join("story-loom");
        }
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(".local").join("state").join("story-loom");
        }
        return PathBuf::from("/tmp").join("Story-Loom");
    }
}

pub fn active_state_path() -> PathBuf {
    state_dir().join("library.ron")
}

fn atomic_write(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let tmp_path = path.with_extension("ron.tmp");
    {
        let mut f = File::create(&tmp_path)?;
        f.write_all(data)?;
        f.flush()?;
    }
    fs::rename(tmp_path, path)?;
    Ok(())
}

pub fn save_database(db: &StoryDatabase, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let pretty = PrettyConfig::new()
        .separate_tuple_members(true)
        .enumerate_arrays(true);
    let s = ron::ser::to_string_pretty(db, pretty)?;
    atomic_write(path, s.as_bytes())?;
    Ok(())
}

pub fn load_database(path: &Path) -> anyhow::Result<StoryDatabase> {
    let mut f = File::open(path)?;
    let mut buf = String::new();
    f.read_to_string(&mut buf)?;
    let db: StoryDatabase = ron::from_str(&buf)?;
    Ok(db)
}

/// Missing file means a fresh install; an unreadable one is logged and left
/// on disk untouched while the session starts empty.
pub fn load_or_default(path: &Path) -> StoryDatabase {
    if !path.exists() {
        return StoryDatabase::new();
    }
    match load_database(path) {
        Ok(db) => db,
        Err(e) => {
            log::warn!("could not read state file {}: {e}", path.display());
            StoryDatabase::new()
        }
    }
}
