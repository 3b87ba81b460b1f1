//! Reconciliation between the remote API and the local fallback slot.
//!
//! Every mutation is tried remotely once. When that fails the same
//! mutation is applied to the slot instead, and in both cases the list is
//! reloaded from whichever source answers, so the view only ever shows the
//! last successful load.

use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use crate::remote::TodoApi;
use crate::storage::{FallbackStore, load_tasks, save_tasks};
use crate::task::{Filter, NewTask, Task, TaskPatch};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Remote,
    Fallback,
}

impl Source {
    pub fn is_degraded(self) -> bool {
        self == Source::Fallback
    }
}

/// Where a mutation landed and where the reloaded list came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settled {
    /// Which side the mutation was attempted against; `None` when it was
    /// skipped (e.g. an empty rename). A fallback write that failed to
    /// persist is logged and still reported here.
    pub write: Option<Source>,
    pub read: Source,
}

impl Settled {
    pub fn is_degraded(&self) -> bool {
        self.write.is_some_and(Source::is_degraded) || self.read.is_degraded()
    }
}

#[derive(Debug, Clone, Default)]
pub struct AppState {
    pub tasks: Vec<Task>,
    pub filter: Filter,
    pub source: Option<Source>,
}

impl AppState {
    pub fn find(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }
}

pub struct App<A, S> {
    api: A,
    store: S,
    state: AppState,
}

impl<A: TodoApi, S: FallbackStore> App<A, S> {
    pub fn new(api: A, store: S, filter: Filter) -> Self {
        Self {
            api,
            store,
            state: AppState {
                tasks: Vec::new(),
                filter,
                source: None,
            },
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Tasks of the last load that pass the current filter, in order.
    pub fn visible(&self) -> Vec<&Task> {
        let filter = self.state.filter;
        self.state
            .tasks
            .iter()
            .filter(|task| filter.matches(task))
            .collect()
    }

    #[instrument(skip(self), fields(filter = %self.state.filter))]
    pub async fn load(&mut self) -> Source {
        let source = match self.api.list(self.state.filter).await {
            Ok(tasks) => {
                debug!(count = tasks.len(), "loaded tasks from API");
                self.state.tasks = tasks;
                Source::Remote
            }
            Err(err) => {
                warn!(
                    endpoint = %self.api.endpoint(),
                    error = %format!("{err:#}"),
                    "API not available, falling back to local slot"
                );
                self.state.tasks = load_tasks(&self.store);
                Source::Fallback
            }
        };
        self.state.source = Some(source);
        source
    }

    /// Reload without mutating, e.g. when the user comes back to the list.
    pub async fn refresh(&mut self) -> Source {
        self.load().await
    }

    #[instrument(skip(self))]
    pub async fn set_filter(&mut self, filter: Filter) -> Source {
        self.state.filter = filter;
        self.load().await
    }

    /// Returns `None` when the trimmed title is empty; nothing is sent.
    #[instrument(skip(self))]
    pub async fn create(&mut self, title: &str) -> Option<Settled> {
        let title = title.trim();
        if title.is_empty() {
            debug!("ignoring create with empty title");
            return None;
        }

        let new = NewTask::pending(title);
        let write = match self.api.create(&new).await {
            Ok(created) => {
                info!(id = %created.id, "task created remotely");
                Source::Remote
            }
            Err(err) => {
                warn!(error = %format!("{err:#}"), "create failed remotely, adding to local slot");
                let mut tasks = load_tasks(&self.store);
                if !tasks.iter().any(|task| task.id == new.id) {
                    tasks.insert(0, Task::from_new(new, Utc::now()));
                }
                save_tasks(&self.store, &tasks);
                Source::Fallback
            }
        };

        Some(self.settle(Some(write)).await)
    }

    /// Flips completion of a task from the last load. Returns `None` when
    /// the id is not part of it.
    #[instrument(skip(self))]
    pub async fn toggle(&mut self, id: &str) -> Option<Settled> {
        let current = self.state.find(id)?.clone();
        let patch = TaskPatch::completed(!current.completed);
        let write = self.patch(current, patch).await;
        Some(self.settle(Some(write)).await)
    }

    /// Commits an edited title. Empty or unchanged titles skip the write;
    /// the list is still reloaded.
    #[instrument(skip(self))]
    pub async fn rename(&mut self, id: &str, title: &str) -> Settled {
        let title = title.trim();
        let write = match self.state.find(id).cloned() {
            Some(current) if !title.is_empty() && current.title != title => {
                Some(self.patch(current, TaskPatch::title(title)).await)
            }
            Some(_) => {
                debug!("title edit is empty or unchanged, keeping original");
                None
            }
            None => {
                debug!("task not in current list, nothing to rename");
                None
            }
        };
        self.settle(write).await
    }

    #[instrument(skip(self))]
    pub async fn delete(&mut self, id: &str) -> Settled {
        let write = match self.api.delete(id).await {
            Ok(()) => Source::Remote,
            Err(err) => {
                warn!(error = %format!("{err:#}"), "delete failed remotely, removing from local slot");
                let mut tasks = load_tasks(&self.store);
                tasks.retain(|task| task.id != id);
                save_tasks(&self.store, &tasks);
                Source::Fallback
            }
        };
        self.settle(Some(write)).await
    }

    #[instrument(skip(self))]
    pub async fn clear_completed(&mut self) -> Settled {
        let write = match self.api.clear_completed().await {
            Ok(deleted) => {
                info!(?deleted, "cleared completed tasks remotely");
                Source::Remote
            }
            Err(err) => {
                warn!(error = %format!("{err:#}"), "clear completed failed remotely, clearing local slot");
                let mut tasks = load_tasks(&self.store);
                let before = tasks.len();
                tasks.retain(|task| !task.completed);
                info!(removed = before - tasks.len(), "cleared completed tasks locally");
                save_tasks(&self.store, &tasks);
                Source::Fallback
            }
        };
        self.settle(Some(write)).await
    }

    /// Whether the API answers its health check right now.
    pub async fn reachable(&self) -> bool {
        match self.api.health().await {
            Ok(()) => true,
            Err(err) => {
                debug!(error = %format!("{err:#}"), "health check failed");
                false
            }
        }
    }

    async fn patch(&mut self, current: Task, patch: TaskPatch) -> Source {
        match self.api.update(&current.id, &patch).await {
            Ok(updated) => {
                debug!(id = %updated.id, "task updated remotely");
                Source::Remote
            }
            Err(err) => {
                warn!(
                    id = %current.id,
                    error = %format!("{err:#}"),
                    "update failed remotely, saving to local slot"
                );
                let mut tasks = load_tasks(&self.store);
                match tasks.iter_mut().find(|task| task.id == current.id) {
                    Some(task) => patch.apply(task),
                    None => {
                        let mut task = current;
                        patch.apply(&mut task);
                        tasks.insert(0, task);
                    }
                }
                save_tasks(&self.store, &tasks);
                Source::Fallback
            }
        }
    }

    async fn settle(&mut self, write: Option<Source>) -> Settled {
        let read = self.load().await;
        Settled { write, read }
    }
}
