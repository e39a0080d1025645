//! Persistence seam for programs and their history.
//!
//! The real data store lives outside this crate. [`InMemoryProgramStore`]
//! backs tests and demo mode.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::audit::{AuditTrail, ValidationHistoryEvent};
use crate::program::Program;

/// Error types for store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Record does not exist
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Store is not reachable
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Store refused the write (row-level security, constraint)
    #[error("Write rejected: {0}")]
    Rejected(String),
}

/// Trait for loading and persisting programs and their validation history.
///
/// Both writes are fire-and-confirm: they either succeed entirely or return
/// an error.
#[async_trait]
pub trait ProgramStore: Send + Sync {
    /// Load a program by id.
    async fn load(&self, program_id: &str) -> Result<Option<Program>, StoreError>;

    /// Insert or replace a program (last write wins).
    async fn save(&self, program: &Program) -> Result<(), StoreError>;

    /// Append a history event.
    async fn append_event(&self, event: &ValidationHistoryEvent) -> Result<(), StoreError>;

    /// History of a program, oldest first.
    async fn history(&self, program_id: &str) -> Result<Vec<ValidationHistoryEvent>, StoreError>;
}

/// Program store held in memory.
#[derive(Clone, Default)]
pub struct InMemoryProgramStore {
    programs: Arc<RwLock<HashMap<String, Program>>>,
    trail: AuditTrail,
}

impl InMemoryProgramStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// The underlying audit trail.
    pub fn trail(&self) -> &AuditTrail {
        &self.trail
    }

    /// Number of stored programs.
    pub async fn len(&self) -> usize {
        self.programs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.programs.read().await.is_empty()
    }
}

#[async_trait]
impl ProgramStore for InMemoryProgramStore {
    async fn load(&self, program_id: &str) -> Result<Option<Program>, StoreError> {
        let programs = self.programs.read().await;
        Ok(programs.get(program_id).cloned())
    }

    async fn save(&self, program: &Program) -> Result<(), StoreError> {
        let mut programs = self.programs.write().await;
        programs.insert(program.id.clone(), program.clone());
        Ok(())
    }

    async fn append_event(&self, event: &ValidationHistoryEvent) -> Result<(), StoreError> {
        if !self.programs.read().await.contains_key(&event.program_id) {
            return Err(StoreError::NotFound(event.program_id.clone()));
        }
        self.trail.append(event.clone()).await;
        Ok(())
    }

    async fn history(&self, program_id: &str) -> Result<Vec<ValidationHistoryEvent>, StoreError> {
        Ok(self.trail.history(program_id).await)
    }
}
