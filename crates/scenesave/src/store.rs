//! File-backed save collaborators.
//!
//! The engine's seams ([`SceneStore`], [`PersistentStore`],
//! [`NotificationBus`]) implemented over the local filesystem: the live
//! scene is a JSON document on disk, snapshots land in the scenes
//! directory, and notifications become log lines.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::info;

use scenesave_core::{NotificationBus, PersistentStore, SaveError, SaveEvent, SceneSnapshot, SceneStore};

/// The live scene document plus the snapshot directory.
pub struct FileSceneStore {
    source: PathBuf,
    scenes_dir: PathBuf,
}

impl FileSceneStore {
    pub fn new(source: impl Into<PathBuf>, scenes_dir: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            scenes_dir: scenes_dir.into(),
        }
    }
}

#[async_trait]
impl SceneStore for FileSceneStore {
    fn scene_name(&self) -> String {
        self.source
            .file_stem()
            .map_or_else(|| "scene".to_owned(), |s| s.to_string_lossy().into_owned())
    }

    fn serialize(&self) -> Result<SceneSnapshot, SaveError> {
        let raw = std::fs::read_to_string(&self.source)?;
        let data = serde_json::from_str(&raw)?;
        Ok(SceneSnapshot {
            name: self.scene_name(),
            data,
        })
    }

    async fn save(&self, name: &str) -> Result<(), SaveError> {
        let raw = tokio::fs::read_to_string(&self.source).await?;
        // validate before writing so a half-written source never
        // clobbers a good snapshot
        let _: serde_json::Value = serde_json::from_str(&raw)?;

        tokio::fs::create_dir_all(&self.scenes_dir).await?;
        let dest = self.scenes_dir.join(format!("{name}.json"));
        tokio::fs::write(&dest, raw).await?;

        info!(scene = %name, path = %dest.display(), "scene saved");
        Ok(())
    }
}

/// Raw file writes rooted at a base directory, for the quiet save path.
pub struct FilePersistentStore {
    root: PathBuf,
}

impl FilePersistentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl PersistentStore for FilePersistentStore {
    async fn write_file(&self, path: &str, contents: String) -> Result<(), SaveError> {
        let dest = self.root.join(path);
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&dest, contents).await?;
        Ok(())
    }
}

/// Notification sink that turns save events into log lines.
pub struct LogBus;

impl NotificationBus for LogBus {
    fn publish(&self, event: SaveEvent) {
        match event {
            SaveEvent::SceneSaved { scene } => info!(scene = %scene, "scene saved"),
            SaveEvent::AutosaveCompleted { scene } => {
                info!(scene = %scene, "autosave completed");
            }
        }
    }
}

/// Absolute base for the quiet save path: next to the scene document.
pub fn persistence_root(scene: &Path) -> PathBuf {
    scene
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}

// ── Tests ───────────────────────────────────────────────────────────
