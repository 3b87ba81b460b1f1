#![allow(dead_code)]

use std::cell::{Cell, RefCell};

use anyhow::bail;
use chrono::Utc;
use dotask_core::remote::TodoApi;
use dotask_core::storage::FallbackStore;
use dotask_core::task::{Filter, NewTask, Task, TaskPatch};

/// In-memory stand-in for the to-do API. Flip `down` to make every call
/// fail the way an unreachable server would.
#[derive(Debug, Default)]
pub struct FakeApi {
    pub tasks: RefCell<Vec<Task>>,
    pub down: Cell<bool>,
    pub calls: RefCell<Vec<&'static str>>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls_to(&self, what: &str) -> usize {
        self.calls.borrow().iter().filter(|c| **c == what).count()
    }

    fn reach(&self, what: &'static str) -> anyhow::Result<()> {
        self.calls.borrow_mut().push(what);
        if self.down.get() {
            bail!("{what}: connection refused");
        }
        Ok(())
    }
}

impl TodoApi for FakeApi {
    async fn list(&self, filter: Filter) -> anyhow::Result<Vec<Task>> {
        self.reach("list")?;
        let mut tasks: Vec<Task> = self
            .tasks
            .borrow()
            .iter()
            .filter(|task| filter.matches(task))
            .cloned()
            .collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tasks)
    }

    async fn create(&self, task: &NewTask) -> anyhow::Result<Task> {
        self.reach("create")?;
        if task.title.trim().is_empty() {
            bail!("create failed: 400 Bad Request");
        }
        let created = Task::from_new(task.clone(), Utc::now());
        self.tasks.borrow_mut().insert(0, created.clone());
        Ok(created)
    }

    async fn update(&self, id: &str, patch: &TaskPatch) -> anyhow::Result<Task> {
        self.reach("update")?;
        let mut tasks = self.tasks.borrow_mut();
        let Some(task) = tasks.iter_mut().find(|task| task.id == id) else {
            bail!("update failed: 404 Not Found");
        };
        patch.apply(task);
        task.title = task.title.trim().to_string();
        Ok(task.clone())
    }

    async fn delete(&self, id: &str) -> anyhow::Result<()> {
        self.reach("delete")?;
        let mut tasks = self.tasks.borrow_mut();
        let Some(idx) = tasks.iter().position(|task| task.id == id) else {
            bail!("delete failed: 404 Not Found");
        };
        tasks.remove(idx);
        Ok(())
    }

    async fn clear_completed(&self) -> anyhow::Result<Option<u64>> {
        self.reach("clear_completed")?;
        let mut tasks = self.tasks.borrow_mut();
        let before = tasks.len();
        tasks.retain(|task| !task.completed);
        Ok(Some((before - tasks.len()) as u64))
    }

    async fn health(&self) -> anyhow::Result<()> {
        self.reach("health")
    }

    fn endpoint(&self) -> String {
        "fake://todos".to_string()
    }
}

/// A slot whose reads and writes always fail, like an unreadable disk.
#[derive(Debug, Default)]
pub struct BrokenSlot {
    pub writes: Cell<usize>,
}

impl FallbackStore for BrokenSlot {
    fn read_slot(&self) -> anyhow::Result<Option<String>> {
        bail!("slot: permission denied")
    }

    fn write_slot(&self, _raw: &str) -> anyhow::Result<()> {
        self.writes.set(self.writes.get() + 1);
        bail!("slot: no space left on device")
    }

    fn describe(&self) -> String {
        "broken".to_string()
    }
}
