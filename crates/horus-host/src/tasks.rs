//! Background task registry behind the 202-and-poll web API.
//!
//! Each submitted future runs on the tokio runtime. Its result is handed
//! out exactly once: after a successful poll of a finished task the id is
//! forgotten and later polls fail with [`HorusError::UnknownTask`].

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use serde_json::{Value, json};
use tokio::task::JoinHandle;

use crate::error::{HorusError, HorusResult};

pub type TaskId = u64;

/// Final state of a task. Failures are normalized records, never panics.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaskOutcome {
    Succeeded { result: Value },
    Failed { kind: String, error: String },
    Cancelled,
}

impl TaskOutcome {
    /// Failed outright, or succeeded with a result record flagged `error`.
    pub fn is_error(&self) -> bool {
        match self {
            TaskOutcome::Succeeded { result } => {
                result.get("error").and_then(Value::as_bool).unwrap_or(false)
            }
            TaskOutcome::Failed { .. } | TaskOutcome::Cancelled => true,
        }
    }

    /// Response body for pollers.
    pub fn body(&self) -> Value {
        match self {
            TaskOutcome::Succeeded { result } => result.clone(),
            TaskOutcome::Failed { kind, error } => {
                json!({ "error": true, "type": kind, "error_msg": error })
            }
            TaskOutcome::Cancelled => {
                json!({ "error": true, "type": "cancelled", "error_msg": "task was cancelled" })
            }
        }
    }
}

#[derive(Debug)]
pub enum TaskPoll {
    Pending,
    Done(TaskOutcome),
}

#[derive(Default)]
struct TaskTable {
    next_id: TaskId,
    tasks: HashMap<TaskId, JoinHandle<TaskOutcome>>,
}

impl Drop for TaskTable {
    fn drop(&mut self) {
        for handle in self.tasks.values() {
            handle.abort();
        }
    }
}

#[derive(Clone, Default)]
pub struct TaskRegistry {
    inner: Arc<Mutex<TaskTable>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self) -> MutexGuard<'_, TaskTable> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Spawn `work` and return its id. Must be called within a tokio runtime.
    pub fn submit<F, T>(&self, label: &str, work: F) -> TaskId
    where
        F: Future<Output = HorusResult<T>> + Send + 'static,
        T: Serialize + Send + 'static,
    {
        let mut table = self.table();
        table.next_id += 1;
        let id = table.next_id;
        let label = label.to_string();
        let handle = tokio::spawn(async move {
            let outcome = match work.await {
                Ok(value) => match serde_json::to_value(&value) {
                    Ok(result) => TaskOutcome::Succeeded { result },
                    Err(err) => TaskOutcome::Failed {
                        kind: "encode_error".into(),
                        error: err.to_string(),
                    },
                },
                Err(err) => TaskOutcome::Failed {
                    kind: err.kind().into(),
                    error: err.to_string(),
                },
            };
            tracing::debug!(task = id, %label, error = outcome.is_error(), "task finished");
            outcome
        });
        table.tasks.insert(id, handle);
        tracing::debug!(task = id, "task submitted");
        id
    }

    pub async fn poll(&self, id: TaskId) -> HorusResult<TaskPoll> {
        let handle = {
            let mut table = self.table();
            let finished = match table.tasks.get(&id) {
                Some(handle) => handle.is_finished(),
                None => return Err(HorusError::UnknownTask(id)),
            };
            if !finished {
                return Ok(TaskPoll::Pending);
            }
            table.tasks.remove(&id)
        };
        let Some(handle) = handle else {
            return Err(HorusError::UnknownTask(id));
        };
        let outcome = match handle.await {
            Ok(outcome) => outcome,
            Err(err) if err.is_cancelled() => TaskOutcome::Cancelled,
            Err(err) => TaskOutcome::Failed {
                kind: "panic".into(),
                error: err.to_string(),
            },
        };
        Ok(TaskPoll::Done(outcome))
    }

    /// Abort the task; its next poll reports [`TaskOutcome::Cancelled`].
    /// Subprocesses it started are killed when their handles drop.
    pub fn cancel(&self, id: TaskId) -> HorusResult<()> {
        let table = self.table();
        let handle = table.tasks.get(&id).ok_or(HorusError::UnknownTask(id))?;
        handle.abort();
        tracing::debug!(task = id, "task cancelled");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.table().tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
