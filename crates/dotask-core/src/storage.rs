use std::cell::RefCell;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use tempfile::NamedTempFile;
use tracing::{debug, error, info};

use crate::task::Task;

/// A single named slot holding the serialized task array.
pub trait FallbackStore {
    fn read_slot(&self) -> anyhow::Result<Option<String>>;

    fn write_slot(&self, raw: &str) -> anyhow::Result<()>;

    fn describe(&self) -> String;
}

#[derive(Debug)]
pub struct SlotFile {
    pub slot_path: PathBuf,
}

impl SlotFile {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path, slot: &str) -> anyhow::Result<Self> {
        if slot.trim().is_empty() || slot.contains(['/', '\\']) {
            return Err(anyhow!("invalid storage slot name: {slot:?}"));
        }

        fs::create_dir_all(data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let slot_path = data_dir.join(format!("{slot}.json"));

        info!(
            data_dir = %data_dir.display(),
            slot = %slot_path.display(),
            "opened fallback slot"
        );

        Ok(Self { slot_path })
    }
}

impl FallbackStore for SlotFile {
    fn read_slot(&self) -> anyhow::Result<Option<String>> {
        match fs::read_to_string(&self.slot_path) {
            Ok(raw) => Ok(Some(raw)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => {
                Err(err).with_context(|| format!("failed reading {}", self.slot_path.display()))
            }
        }
    }

    fn write_slot(&self, raw: &str) -> anyhow::Result<()> {
        let dir = self
            .slot_path
            .parent()
            .unwrap_or_else(|| Path::new("."));
        let mut temp = NamedTempFile::new_in(dir)?;
        temp.write_all(raw.as_bytes())?;
        temp.flush()?;
        temp.persist(&self.slot_path)
            .map_err(|err| anyhow!("failed to persist {}: {}", self.slot_path.display(), err))?;
        Ok(())
    }

    fn describe(&self) -> String {
        self.slot_path.display().to_string()
    }
}

/// In-process slot, for embedding and tests.
#[derive(Debug, Default)]
pub struct MemorySlot {
    raw: RefCell<Option<String>>,
}

impl MemorySlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self {
            raw: RefCell::new(Some(raw.into())),
        }
    }

    pub fn raw(&self) -> Option<String> {
        self.raw.borrow().clone()
    }
}

impl FallbackStore for MemorySlot {
    fn read_slot(&self) -> anyhow::Result<Option<String>> {
        Ok(self.raw.borrow().clone())
    }

    fn write_slot(&self, raw: &str) -> anyhow::Result<()> {
        *self.raw.borrow_mut() = Some(raw.to_string());
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

/// Reads the task array out of the slot. Unreadable or corrupt slots
/// are logged and read as empty.
#[tracing::instrument(skip(store))]
pub fn load_tasks<S: FallbackStore + ?Sized>(store: &S) -> Vec<Task> {
    let raw = match store.read_slot() {
        Ok(Some(raw)) => raw,
        Ok(None) => {
            debug!(slot = %store.describe(), "fallback slot is empty");
            return Vec::new();
        }
        Err(err) => {
            error!(slot = %store.describe(), error = %format!("{err:#}"), "failed reading fallback slot");
            return Vec::new();
        }
    };

    if raw.trim().is_empty() {
        return Vec::new();
    }

    match serde_json::from_str::<Vec<Task>>(&raw) {
        Ok(tasks) => {
            debug!(count = tasks.len(), "loaded tasks from fallback slot");
            tasks
        }
        Err(err) => {
            error!(slot = %store.describe(), error = %err, "failed parsing fallback slot");
            Vec::new()
        }
    }
}

/// Writes the task array into the slot. Failures are logged, never raised.
#[tracing::instrument(skip(store, tasks), fields(count = tasks.len()))]
pub fn save_tasks<S: FallbackStore + ?Sized>(store: &S, tasks: &[Task]) {
    let raw = match serde_json::to_string(tasks) {
        Ok(raw) => raw,
        Err(err) => {
            error!(error = %err, "failed serializing tasks for fallback slot");
            return;
        }
    };

    if let Err(err) = store.write_slot(&raw) {
        error!(slot = %store.describe(), error = %format!("{err:#}"), "failed writing fallback slot");
    }
}
