//! Unlock requests.
//!
//! Users who cannot unlock a VERROUILLE program themselves file a request; an
//! admin approves (which performs the unlock) or rejects it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use territory::User;

use crate::audit::Performer;
use crate::program::Program;
use crate::status::ValidationStatus;
use crate::types::{Result, WorkflowError};

#[cfg(feature = "typescript")]
use ts_rs::TS;

/// Lifecycle of an unlock request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnlockRequestStatus {
    Pending,
    Approved,
    Rejected,
}

/// A request to unlock a program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct UnlockRequest {
    pub id: String,
    pub program_id: String,
    /// Program title at submission time
    pub program_title: String,
    pub requester: Performer,
    /// Program status at submission time
    pub current_status: ValidationStatus,
    /// Trimmed justification
    pub reason: String,
    pub status: UnlockRequestStatus,
    pub created_at: DateTime<Utc>,
    pub handled_by: Option<Performer>,
    pub handled_at: Option<DateTime<Utc>>,
    pub admin_comment: Option<String>,
}

impl UnlockRequest {
    pub fn is_pending(&self) -> bool {
        self.status == UnlockRequestStatus::Pending
    }
}

/// In-memory register of unlock requests (newest last).
#[derive(Clone, Default)]
pub struct UnlockRequestBook {
    requests: Arc<RwLock<Vec<UnlockRequest>>>,
}

impl UnlockRequestBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new pending request. At most one pending request per program.
    pub(crate) async fn submit(
        &self,
        program: &Program,
        reason: &str,
        requester: &User,
    ) -> Result<UnlockRequest> {
        let mut requests = self.requests.write().await;
        if requests
            .iter()
            .any(|r| r.program_id == program.id && r.is_pending())
        {
            return Err(WorkflowError::UnlockRequestPending(program.id.clone()));
        }

        let request = UnlockRequest {
            id: uuid::Uuid::new_v4().to_string(),
            program_id: program.id.clone(),
            program_title: program.title.clone(),
            requester: Performer::from(requester),
            current_status: program.validation_status(),
            reason: reason.to_string(),
            status: UnlockRequestStatus::Pending,
            created_at: Utc::now(),
            handled_by: None,
            handled_at: None,
            admin_comment: None,
        };
        requests.push(request.clone());
        Ok(request)
    }

    /// Fetch a request that is still pending.
    pub async fn pending(&self, request_id: &str) -> Result<UnlockRequest> {
        let request = self
            .get(request_id)
            .await
            .ok_or_else(|| WorkflowError::UnlockRequestNotFound(request_id.to_string()))?;
        if !request.is_pending() {
            return Err(WorkflowError::UnlockRequestHandled(request_id.to_string()));
        }
        Ok(request)
    }

    /// Close a pending request.
    pub(crate) async fn close(
        &self,
        request_id: &str,
        outcome: UnlockRequestStatus,
        admin: &User,
        comment: Option<String>,
    ) -> Result<UnlockRequest> {
        let mut requests = self.requests.write().await;
        let request = requests
            .iter_mut()
            .find(|r| r.id == request_id)
            .ok_or_else(|| WorkflowError::UnlockRequestNotFound(request_id.to_string()))?;
        if !request.is_pending() {
            return Err(WorkflowError::UnlockRequestHandled(request_id.to_string()));
        }

        request.status = outcome;
        request.handled_by = Some(Performer::from(admin));
        request.handled_at = Some(Utc::now());
        request.admin_comment = comment;
        Ok(request.clone())
    }

    /// Put a closed request back to pending, undoing [`close`](Self::close).
    pub(crate) async fn reopen(&self, request_id: &str) {
        let mut requests = self.requests.write().await;
        if let Some(request) = requests.iter_mut().find(|r| r.id == request_id) {
            request.status = UnlockRequestStatus::Pending;
            request.handled_by = None;
            request.handled_at = None;
            request.admin_comment = None;
        }
    }

    /// Approve every pending request of a program unlocked outside the
    /// request flow. Returns the requests closed.
    pub(crate) async fn settle_for_program(
        &self,
        program_id: &str,
        admin: &User,
        comment: &str,
    ) -> Vec<UnlockRequest> {
        let mut requests = self.requests.write().await;
        let now = Utc::now();
        requests
            .iter_mut()
            .filter(|r| r.program_id == program_id && r.is_pending())
            .map(|request| {
                request.status = UnlockRequestStatus::Approved;
                request.handled_by = Some(Performer::from(admin));
                request.handled_at = Some(now);
                request.admin_comment = Some(comment.to_string());
                request.clone()
            })
            .collect()
    }

    /// Get a request by id.
    pub async fn get(&self, request_id: &str) -> Option<UnlockRequest> {
        let requests = self.requests.read().await;
        requests.iter().find(|r| r.id == request_id).cloned()
    }

    /// All pending requests, oldest first.
    pub async fn list_pending(&self) -> Vec<UnlockRequest> {
        let requests = self.requests.read().await;
        requests.iter().filter(|r| r.is_pending()).cloned().collect()
    }

    /// All requests for a program, oldest first.
    pub async fn for_program(&self, program_id: &str) -> Vec<UnlockRequest> {
        let requests = self.requests.read().await;
        requests
            .iter()
            .filter(|r| r.program_id == program_id)
            .cloned()
            .collect()
    }

    /// Whether a program has a pending request.
    pub async fn has_pending(&self, program_id: &str) -> bool {
        let requests = self.requests.read().await;
        requests
            .iter()
            .any(|r| r.program_id == program_id && r.is_pending())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::tests::program_at;
    use territory::ScopeLevel;

    #[tokio::test]
    async fn test_one_pending_request_per_program() {
        let book = UnlockRequestBook::new();
        let program = program_at(ValidationStatus::Verrouille);
        let requester = User::new("dr-1", "Sara", ScopeLevel::Regional);

        let request = book
            .submit(&program, "Erreur de saisie sur le budget", &requester)
            .await
            .unwrap();
        assert!(request.is_pending());
        assert!(book.has_pending(&program.id).await);

        let err = book
            .submit(&program, "Deuxième demande identique", &requester)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::UnlockRequestPending(_)));
    }

    #[tokio::test]
    async fn test_close_only_once() {
        let book = UnlockRequestBook::new();
        let program = program_at(ValidationStatus::Verrouille);
        let requester = User::new("dr-1", "Sara", ScopeLevel::Regional);
        let admin = User::new("admin-1", "Admin", ScopeLevel::Admin);

        let request = book
            .submit(&program, "Erreur de saisie sur le budget", &requester)
            .await
            .unwrap();
        let closed = book
            .close(
                &request.id,
                UnlockRequestStatus::Rejected,
                &admin,
                Some("Pas justifié".to_string()),
            )
            .await
            .unwrap();
        assert_eq!(closed.status, UnlockRequestStatus::Rejected);
        assert_eq!(closed.handled_by.as_ref().map(|p| p.id.as_str()), Some("admin-1"));

        let err = book
            .close(&request.id, UnlockRequestStatus::Approved, &admin, None)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::UnlockRequestHandled(_)));
        assert!(book.list_pending().await.is_empty());
        assert_eq!(book.for_program(&program.id).await.len(), 1);

        assert!(matches!(
            book.pending("nope").await,
            Err(WorkflowError::UnlockRequestNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_reopen_restores_pending() {
        let book = UnlockRequestBook::new();
        let program = program_at(ValidationStatus::Verrouille);
        let requester = User::new("dr-1", "Sara", ScopeLevel::Regional);
        let admin = User::new("admin-1", "Admin", ScopeLevel::Admin);

        let request = book
            .submit(&program, "Erreur de saisie sur le budget", &requester)
            .await
            .unwrap();
        book.close(&request.id, UnlockRequestStatus::Approved, &admin, None)
            .await
            .unwrap();
        book.reopen(&request.id).await;

        let reopened = book.pending(&request.id).await.unwrap();
        assert!(reopened.handled_by.is_none());
        assert!(reopened.handled_at.is_none());
    }

    #[tokio::test]
    async fn test_settle_for_program() {
        let book = UnlockRequestBook::new();
        let program = program_at(ValidationStatus::Verrouille);
        let other = program_at(ValidationStatus::Verrouille);
        let requester = User::new("dr-1", "Sara", ScopeLevel::Regional);
        let admin = User::new("admin-1", "Admin", ScopeLevel::Admin);

        book.submit(&program, "Erreur de saisie sur le budget", &requester)
            .await
            .unwrap();
        book.submit(&other, "Commune mal rattachée au plan", &requester)
            .await
            .unwrap();

        let settled = book
            .settle_for_program(&program.id, &admin, "Déverrouillé directement")
            .await;
        assert_eq!(settled.len(), 1);
        assert_eq!(settled[0].status, UnlockRequestStatus::Approved);
        assert!(!book.has_pending(&program.id).await);
        assert!(book.has_pending(&other.id).await);
    }
}
