//! In-memory execution store (§5 "The in-memory execution store is
//! guarded by a reader-writer lock"), used by `GET /v1/executions/{id}`
//! and by `Resume`/`Abort` to look an execution back up by id. A
//! deployment wanting durability wires its own store behind the same
//! trait (§1 "durable stores are opaque").

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::execution::WorkflowExecution;

#[async_trait]
pub trait ExecutionStore: Send + Sync {
    async fn put(&self, execution: WorkflowExecution);
    async fn get(&self, id: &str) -> Result<WorkflowExecution>;
}

#[derive(Default)]
pub struct InMemoryExecutionStore {
    executions: RwLock<HashMap<String, WorkflowExecution>>,
}

impl InMemoryExecutionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ExecutionStore for InMemoryExecutionStore {
    async fn put(&self, execution: WorkflowExecution) {
        self.executions.write().insert(execution.id.clone(), execution);
    }

    async fn get(&self, id: &str) -> Result<WorkflowExecution> {
        self.executions.read().get(id).cloned().ok_or(Error::NotFound)
    }
}
