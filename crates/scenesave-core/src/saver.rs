//! Save collaborators and the spawned save task.
//!
//! The engine never touches scene serialization or file I/O itself; the
//! host supplies [`SceneStore`], [`PersistentStore`], and
//! [`NotificationBus`] implementations. A save runs as a spawned task —
//! fire-and-forget from the tick loop's perspective — with the node
//! holding an in-progress guard so overlapping firings are skipped
//! rather than stacked.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Failure reported by a save collaborator.
///
/// Never retried early: the next regular tick attempts again after the
/// normal interval, with no backoff.
#[derive(Debug, Error)]
pub enum SaveError {
    #[error("scene store failure: {0}")]
    Store(String),

    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization failure: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A serialized scene snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneSnapshot {
    pub name: String,
    pub data: serde_json::Value,
}

/// The scene being autosaved.
#[async_trait]
pub trait SceneStore: Send + Sync {
    /// Name of the currently opened scene.
    fn scene_name(&self) -> String;

    /// Snapshot the current scene state.
    fn serialize(&self) -> Result<SceneSnapshot, SaveError>;

    /// Save the scene through the normal pipeline (including whatever
    /// user-facing notification that pipeline produces).
    async fn save(&self, name: &str) -> Result<(), SaveError>;
}

/// Raw file persistence, used by the quiet save path that bypasses the
/// normal pipeline.
#[async_trait]
pub trait PersistentStore: Send + Sync {
    async fn write_file(&self, path: &str, contents: String) -> Result<(), SaveError>;
}

/// Events published around a completed save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveEvent {
    /// A scene was written through the quiet path.
    SceneSaved { scene: String },
    /// An autosave cycle finished (published after either save path).
    AutosaveCompleted { scene: String },
}

/// Downstream notification sink. Publishing must not block.
pub trait NotificationBus: Send + Sync {
    fn publish(&self, event: SaveEvent);
}

// ── Save task ───────────────────────────────────────────────────────

/// Everything one save task needs, captured at firing time.
pub(crate) struct SaveContext {
    pub scene: Arc<dyn SceneStore>,
    pub persistent: Arc<dyn PersistentStore>,
    pub bus: Arc<dyn NotificationBus>,
    pub quiet_save: bool,
    pub guard: Arc<AtomicBool>,
}

/// Run one save to completion and release the in-progress guard.
pub(crate) async fn run_save(ctx: SaveContext) {
    let name = ctx.scene.scene_name();

    let result = if ctx.quiet_save {
        quiet_save(&ctx, &name).await
    } else {
        ctx.scene.save(&name).await
    };

    match result {
        Ok(()) => {
            debug!(scene = %name, quiet = ctx.quiet_save, "autosave complete");
            ctx.bus.publish(SaveEvent::AutosaveCompleted { scene: name });
        }
        Err(e) => {
            // next eligible tick retries after the normal interval
            warn!(scene = %name, error = %e, "autosave failed");
        }
    }

    ctx.guard.store(false, Ordering::Release);
}

/// Serialize the scene and write it directly, then publish the save
/// event the bypassed pipeline would have produced.
async fn quiet_save(ctx: &SaveContext, name: &str) -> Result<(), SaveError> {
    let mut snapshot = ctx.scene.serialize()?;
    snapshot.name = name.to_owned();

    let path = format!("Scenes/{name}.json");
    let contents = serde_json::to_string(&snapshot)?;
    ctx.persistent.write_file(&path, contents).await?;

    ctx.bus.publish(SaveEvent::SceneSaved {
        scene: name.to_owned(),
    });
    Ok(())
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct FakeScene {
        fail: bool,
        saves: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl SceneStore for FakeScene {
        fn scene_name(&self) -> String {
            "Stage".into()
        }

        fn serialize(&self) -> Result<SceneSnapshot, SaveError> {
            Ok(SceneSnapshot {
                name: String::new(),
                data: serde_json::json!({"assets": []}),
            })
        }

        async fn save(&self, name: &str) -> Result<(), SaveError> {
            if self.fail {
                return Err(SaveError::Store("disk full".into()));
            }
            self.saves.lock().unwrap().push(name.to_owned());
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeFiles {
        writes: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl PersistentStore for FakeFiles {
        async fn write_file(&self, path: &str, contents: String) -> Result<(), SaveError> {
            self.writes.lock().unwrap().push((path.into(), contents));
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeBus {
        events: Mutex<Vec<SaveEvent>>,
    }

    impl NotificationBus for FakeBus {
        fn publish(&self, event: SaveEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    fn context(
        scene: Arc<FakeScene>,
        files: Arc<FakeFiles>,
        bus: Arc<FakeBus>,
        quiet_save: bool,
    ) -> SaveContext {
        SaveContext {
            scene,
            persistent: files,
            bus,
            quiet_save,
            guard: Arc::new(AtomicBool::new(true)),
        }
    }

    #[tokio::test]
    async fn normal_save_goes_through_the_pipeline() {
        let scene = Arc::new(FakeScene {
            fail: false,
            saves: Mutex::new(Vec::new()),
        });
        let files = Arc::new(FakeFiles::default());
        let bus = Arc::new(FakeBus::default());

        let ctx = context(scene.clone(), files.clone(), bus.clone(), false);
        let guard = Arc::clone(&ctx.guard);
        run_save(ctx).await;

        assert_eq!(*scene.saves.lock().unwrap(), vec!["Stage".to_owned()]);
        assert!(files.writes.lock().unwrap().is_empty());
        assert_eq!(
            *bus.events.lock().unwrap(),
            vec![SaveEvent::AutosaveCompleted {
                scene: "Stage".into()
            }]
        );
        assert!(!guard.load(Ordering::Acquire));
    }

    #[tokio::test]
    async fn quiet_save_bypasses_the_pipeline() {
        let scene = Arc::new(FakeScene {
            fail: false,
            saves: Mutex::new(Vec::new()),
        });
        let files = Arc::new(FakeFiles::default());
        let bus = Arc::new(FakeBus::default());

        run_save(context(scene.clone(), files.clone(), bus.clone(), true)).await;

        // pipeline untouched, file written with the scene name injected
        assert!(scene.saves.lock().unwrap().is_empty());
        let writes = files.writes.lock().unwrap();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].0, "Scenes/Stage.json");
        let snapshot: SceneSnapshot = serde_json::from_str(&writes[0].1).unwrap();
        assert_eq!(snapshot.name, "Stage");

        assert_eq!(
            *bus.events.lock().unwrap(),
            vec![
                SaveEvent::SceneSaved {
                    scene: "Stage".into()
                },
                SaveEvent::AutosaveCompleted {
                    scene: "Stage".into()
                },
            ]
        );
    }

    #[tokio::test]
    async fn failed_save_releases_the_guard_without_publishing() {
        let scene = Arc::new(FakeScene {
            fail: true,
            saves: Mutex::new(Vec::new()),
        });
        let files = Arc::new(FakeFiles::default());
        let bus = Arc::new(FakeBus::default());

        let ctx = context(scene, files, bus.clone(), false);
        let guard = Arc::clone(&ctx.guard);
        run_save(ctx).await;

        assert!(bus.events.lock().unwrap().is_empty());
        assert!(!guard.load(Ordering::Acquire));
    }
}
