//! WorkflowService - main entry point for PDFCP validation actions.
//!
//! Every accepted action follows apply → save → append-event and yields
//! exactly one history event. Every rejection happens before any store call.
//! The acting user is always an explicit parameter.

use std::sync::Arc;
use tracing::{info, warn};

use territory::{
    filter_by_scope, is_visible, EntityKind, HierarchyError, HierarchyIndex, HierarchySnapshot,
    ScopeLevel, ScopedRecord, TerritorialTags, User,
};

use crate::audit::{HistoryAction, ValidationHistoryEvent};
use crate::config::WorkflowConfig;
use crate::program::{Program, ProgramDraft, ProgramEdit};
use crate::status::{self, AvailableAction, ValidationStatus};
use crate::store::ProgramStore;
use crate::types::{Result, WorkflowError};
use crate::unlock::{UnlockRequest, UnlockRequestBook, UnlockRequestStatus};

/// Orchestrates validation transitions, cancellations and unlocks.
pub struct WorkflowService {
    /// Configuration
    config: WorkflowConfig,
    /// Program and history persistence
    store: Arc<dyn ProgramStore>,
    /// Territorial lookups for scope checks
    index: Arc<HierarchyIndex>,
    /// Pending and handled unlock requests
    unlock_requests: UnlockRequestBook,
}

impl WorkflowService {
    /// Create a service over a store and a prebuilt hierarchy index.
    pub fn new(store: Arc<dyn ProgramStore>, index: Arc<HierarchyIndex>) -> Self {
        Self {
            config: WorkflowConfig::default(),
            store,
            index,
            unlock_requests: UnlockRequestBook::new(),
        }
    }

    /// Create a service, building the index from a hierarchy snapshot.
    pub fn from_snapshot(
        store: Arc<dyn ProgramStore>,
        snapshot: &HierarchySnapshot,
    ) -> std::result::Result<Self, HierarchyError> {
        let index = HierarchyIndex::build(snapshot)?;
        Ok(Self::new(store, Arc::new(index)))
    }

    /// Create with configuration.
    pub fn with_config(mut self, config: WorkflowConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    pub fn index(&self) -> &HierarchyIndex {
        &self.index
    }

    pub fn unlock_requests(&self) -> &UnlockRequestBook {
        &self.unlock_requests
    }

    /// Rebuild the index if the snapshot changed. Returns whether it was rebuilt.
    pub fn refresh_hierarchy(
        &mut self,
        snapshot: &HierarchySnapshot,
    ) -> std::result::Result<bool, HierarchyError> {
        if self.index.is_built_from(snapshot) {
            return Ok(false);
        }
        self.index = Arc::new(HierarchyIndex::build(snapshot)?);
        info!(fingerprint = %self.index.fingerprint(), "Territorial hierarchy refreshed");
        Ok(true)
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Records of one kind visible to `user`, in input order.
    pub fn filter_by_scope<R, I>(&self, user: &User, kind: EntityKind, records: I) -> Vec<R>
    where
        R: ScopedRecord,
        I: IntoIterator<Item = R>,
    {
        filter_by_scope(user, kind, records, &self.index)
    }

    /// Whether `user` may act on `program` territorially.
    pub fn is_in_scope(&self, program: &Program, user: &User) -> bool {
        !self.config.enforce_territorial_scope || is_visible(user, program, &self.index)
    }

    /// Forward actions `user` may take on `program` right now.
    ///
    /// Locked programs offer none; they are reopened through unlock only.
    pub fn available_actions(&self, program: &Program, user: &User) -> Vec<AvailableAction> {
        if program.is_locked() || !self.is_in_scope(program, user) {
            return Vec::new();
        }
        status::available_actions(program.validation_status(), user.scope_level)
    }

    pub fn can_cancel(&self, program: &Program, user: &User) -> bool {
        self.is_in_scope(program, user)
            && status::can_cancel(program.validation_status(), user.scope_level)
    }

    pub fn can_unlock(&self, program: &Program, user: &User) -> bool {
        self.is_in_scope(program, user)
            && status::can_unlock(program.validation_status(), user.scope_level)
    }

    pub fn can_edit(&self, program: &Program, user: &User) -> bool {
        !program.is_locked() && self.is_in_scope(program, user)
    }

    pub fn is_locked(program: &Program) -> bool {
        program.is_locked()
    }

    /// Load a program from the store.
    pub async fn load_program(&self, program_id: &str) -> Result<Program> {
        self.store
            .load(program_id)
            .await?
            .ok_or_else(|| WorkflowError::ProgramNotFound(program_id.to_string()))
    }

    /// Validation history of a program, oldest first.
    pub async fn history(&self, program_id: &str) -> Result<Vec<ValidationHistoryEvent>> {
        Ok(self.store.history(program_id).await?)
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    /// Create a draft program and record its creation.
    pub async fn create_program(&self, draft: ProgramDraft, user: &User) -> Result<Program> {
        self.authorize_creation(&draft, user)
            .map_err(|e| rejected("create", &draft.code, user, e))?;

        let program = Program::from_draft(draft, user);
        let event = ValidationHistoryEvent::new(
            &program.id,
            HistoryAction::Created,
            None,
            Some(ValidationStatus::Brouillon),
            user,
        );
        let program = self.commit(program, event).await?;

        info!(
            program_id = %program.id,
            code = %program.code,
            performed_by = %user.id,
            "Program created"
        );
        Ok(program)
    }

    /// Apply field edits. Does not touch the status nor the history.
    pub async fn update_program(
        &self,
        program: &Program,
        edit: &ProgramEdit,
        user: &User,
    ) -> Result<Program> {
        let updated = self
            .authorize_scope(program, user)
            .and_then(|_| ensure_unlocked(program))
            .and_then(|_| self.authorize_edit(program, edit, user))
            .and_then(|_| edit.apply(program, user))
            .map_err(|e| rejected("update", &program.id, user, e))?;

        self.store.save(&updated).await?;
        info!(program_id = %updated.id, performed_by = %user.id, "Program updated");
        Ok(updated)
    }

    /// Move a program forward (or, for ADMIN, force it back to draft).
    pub async fn request_transition(
        &self,
        program: &Program,
        target: ValidationStatus,
        user: &User,
        note: Option<&str>,
    ) -> Result<Program> {
        let note = self
            .authorize_transition(program, target, user, note)
            .map_err(|e| rejected("transition", &program.id, user, e))?;

        let from = program.validation_status();
        let updated = program.with_status(target, user);
        let mut event = ValidationHistoryEvent::new(
            &program.id,
            HistoryAction::StatusChange(target),
            Some(from),
            Some(target),
            user,
        );
        if let Some(note) = note {
            event = event.with_note(note);
        }
        let updated = self.commit(updated, event).await?;

        info!(
            program_id = %updated.id,
            from = %from,
            to = %target,
            performed_by = %user.id,
            "Validation status changed"
        );
        Ok(updated)
    }

    /// Revert a program to BROUILLON with a mandatory justification.
    pub async fn request_cancellation(
        &self,
        program: &Program,
        reason: &str,
        user: &User,
    ) -> Result<Program> {
        let reason = self
            .authorize_cancellation(program, reason, user)
            .map_err(|e| rejected("cancellation", &program.id, user, e))?;

        let from = program.validation_status();
        let mut updated = program.with_status(ValidationStatus::Brouillon, user);
        updated.cancellation_reason = Some(reason.to_string());
        let event = ValidationHistoryEvent::new(
            &program.id,
            HistoryAction::Cancellation(from),
            Some(from),
            Some(ValidationStatus::Brouillon),
            user,
        )
        .with_note(format!("Annulation motivée: {reason}"));
        let updated = self.commit(updated, event).await?;

        info!(
            program_id = %updated.id,
            cancelled = %from,
            performed_by = %user.id,
            "Validation cancelled"
        );
        Ok(updated)
    }

    /// Unlock a VERROUILLE program back to VALIDE_CENTRAL (ADMIN only).
    pub async fn request_unlock(&self, program: &Program, motif: &str, user: &User) -> Result<Program> {
        let motif = self
            .authorize_unlock(program, motif, user)
            .map_err(|e| rejected("unlock", &program.id, user, e))?;

        let mut updated = program.with_status(ValidationStatus::ValideCentral, user);
        updated.unlock_motif = Some(motif.to_string());
        let event = ValidationHistoryEvent::new(
            &program.id,
            HistoryAction::Unlocked,
            Some(ValidationStatus::Verrouille),
            Some(ValidationStatus::ValideCentral),
            user,
        )
        .with_note(format!("Déverrouillage: {motif}"));
        let updated = self.commit(updated, event).await?;

        let settled = self
            .unlock_requests
            .settle_for_program(&updated.id, user, "Déverrouillé directement")
            .await;
        info!(
            program_id = %updated.id,
            performed_by = %user.id,
            settled_requests = settled.len(),
            "Program unlocked"
        );
        Ok(updated)
    }

    /// Ask an administrator to unlock a program.
    pub async fn submit_unlock_request(
        &self,
        program: &Program,
        reason: &str,
        user: &User,
    ) -> Result<UnlockRequest> {
        let reason = self
            .config
            .justification
            .validate("reason", reason)
            .and_then(|reason| self.authorize_scope(program, user).map(|_| reason))
            .and_then(|reason| {
                if program.is_locked() {
                    Ok(reason)
                } else {
                    Err(WorkflowError::InvalidTransition {
                        from: program.validation_status(),
                        to: ValidationStatus::ValideCentral,
                    })
                }
            })
            .map_err(|e| rejected("unlock_request", &program.id, user, e))?;

        let request = self
            .unlock_requests
            .submit(program, reason, user)
            .await
            .map_err(|e| rejected("unlock_request", &program.id, user, e))?;

        info!(
            request_id = %request.id,
            program_id = %program.id,
            requested_by = %user.id,
            "Unlock request submitted"
        );
        Ok(request)
    }

    /// Approve a pending unlock request, unlocking the program.
    pub async fn approve_unlock_request(
        &self,
        request_id: &str,
        admin: &User,
        comment: Option<&str>,
    ) -> Result<(UnlockRequest, Program)> {
        ensure_admin(admin, "approve unlock requests")
            .map_err(|e| rejected("approve_unlock_request", request_id, admin, e))?;

        let comment = comment
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string);
        // Claimed before the unlock, reopened if the unlock fails.
        let closed = self
            .unlock_requests
            .close(request_id, UnlockRequestStatus::Approved, admin, comment)
            .await?;

        let unlocked = match self.unlock_for_request(&closed, admin).await {
            Ok(program) => program,
            Err(err) => {
                self.unlock_requests.reopen(request_id).await;
                return Err(err);
            }
        };

        info!(request_id = %request_id, program_id = %unlocked.id, "Unlock request approved");
        Ok((closed, unlocked))
    }

    /// Reject a pending unlock request. The program is left untouched.
    pub async fn reject_unlock_request(
        &self,
        request_id: &str,
        admin: &User,
        comment: &str,
    ) -> Result<UnlockRequest> {
        let comment = ensure_admin(admin, "reject unlock requests")
            .and_then(|_| match comment.trim() {
                "" => Err(WorkflowError::InvalidInput(
                    "a rejection comment is required".to_string(),
                )),
                comment => Ok(comment),
            })
            .map_err(|e| rejected("reject_unlock_request", request_id, admin, e))?;

        let closed = self
            .unlock_requests
            .close(
                request_id,
                UnlockRequestStatus::Rejected,
                admin,
                Some(comment.to_string()),
            )
            .await?;

        info!(request_id = %request_id, program_id = %closed.program_id, "Unlock request rejected");
        Ok(closed)
    }

    async fn unlock_for_request(&self, request: &UnlockRequest, admin: &User) -> Result<Program> {
        let program = self.load_program(&request.program_id).await?;
        self.request_unlock(&program, &request.reason, admin).await
    }

    // ------------------------------------------------------------------
    // Guards
    // ------------------------------------------------------------------

    fn authorize_scope(&self, program: &Program, user: &User) -> Result<()> {
        if self.is_in_scope(program, user) {
            Ok(())
        } else {
            Err(WorkflowError::NotAuthorized(format!(
                "program {} is outside the territorial scope of user {}",
                program.id, user.id
            )))
        }
    }

    /// The commune must lie under the given provincial office.
    fn check_commune(&self, commune_id: &str, provincial_office_id: &str) -> Result<()> {
        match self.index.provincial_office_of_commune(commune_id) {
            Some(parent) if parent == provincial_office_id => Ok(()),
            Some(parent) => Err(WorkflowError::InvalidInput(format!(
                "commune {commune_id} belongs to provincial office {parent}, not {provincial_office_id}"
            ))),
            None => Err(WorkflowError::InvalidInput(format!(
                "unknown commune {commune_id}"
            ))),
        }
    }

    fn authorize_edit(&self, program: &Program, edit: &ProgramEdit, user: &User) -> Result<()> {
        let Some(commune_id) = edit.commune_id.as_deref() else {
            return Ok(());
        };
        self.check_commune(commune_id, &program.provincial_office_id)?;

        if self.config.enforce_territorial_scope
            && user.scope_level == ScopeLevel::Local
            && !user.is_assigned_to_commune(commune_id)
        {
            return Err(WorkflowError::NotAuthorized(format!(
                "commune {commune_id} is not assigned to user {}",
                user.id
            )));
        }
        Ok(())
    }

    fn authorize_creation(&self, draft: &ProgramDraft, user: &User) -> Result<()> {
        draft.validate()?;

        let regional = self
            .index
            .regional_office_of_provincial(&draft.provincial_office_id);
        if regional != Some(draft.regional_office_id.as_str()) {
            return Err(WorkflowError::InvalidInput(format!(
                "provincial office {} is not under regional office {}",
                draft.provincial_office_id, draft.regional_office_id
            )));
        }
        if let Some(commune_id) = draft.commune_id.as_deref() {
            self.check_commune(commune_id, &draft.provincial_office_id)?;
        }

        // Ownership grants visibility, so creation is checked on territory alone.
        let mut tags = TerritorialTags::default()
            .with_regional_office(draft.regional_office_id.as_str())
            .with_provincial_office(draft.provincial_office_id.as_str());
        tags.commune_id = draft.commune_id.clone();

        if self.config.enforce_territorial_scope && !is_visible(user, &tags, &self.index) {
            return Err(WorkflowError::NotAuthorized(format!(
                "user {} cannot create programs outside their territory",
                user.id
            )));
        }
        Ok(())
    }

    fn authorize_transition<'a>(
        &self,
        program: &Program,
        target: ValidationStatus,
        user: &User,
        note: Option<&'a str>,
    ) -> Result<Option<&'a str>> {
        self.authorize_scope(program, user)?;
        ensure_unlocked(program)?;

        let from = program.validation_status();
        if !from.can_reach(target) {
            return Err(WorkflowError::InvalidTransition { from, to: target });
        }
        if !status::can_advance(from, target, user.scope_level) {
            return Err(WorkflowError::NotAuthorized(format!(
                "{} cannot move a program to {target}",
                user.scope_level
            )));
        }

        match note.map(str::trim).filter(|n| !n.is_empty()) {
            Some(note) if note.chars().count() > self.config.justification.max_chars => {
                Err(WorkflowError::InvalidInput(format!(
                    "note must be at most {} characters",
                    self.config.justification.max_chars
                )))
            }
            note => Ok(note),
        }
    }

    fn authorize_cancellation<'a>(
        &self,
        program: &Program,
        reason: &'a str,
        user: &User,
    ) -> Result<&'a str> {
        let reason = self.config.justification.validate("reason", reason)?;
        self.authorize_scope(program, user)?;
        ensure_unlocked(program)?;

        let from = program.validation_status();
        if from == ValidationStatus::Brouillon {
            return Err(WorkflowError::InvalidTransition {
                from,
                to: ValidationStatus::Brouillon,
            });
        }
        if !status::can_cancel(from, user.scope_level) {
            return Err(WorkflowError::NotAuthorized(format!(
                "{} cannot cancel {from}",
                user.scope_level
            )));
        }
        Ok(reason)
    }

    fn authorize_unlock<'a>(&self, program: &Program, motif: &'a str, user: &User) -> Result<&'a str> {
        let motif = self.config.justification.validate("motif", motif)?;
        self.authorize_scope(program, user)?;
        ensure_admin(user, "unlock programs")?;

        let from = program.validation_status();
        if !status::can_unlock(from, user.scope_level) {
            return Err(WorkflowError::InvalidTransition {
                from,
                to: ValidationStatus::ValideCentral,
            });
        }
        Ok(motif)
    }

    async fn commit(&self, program: Program, event: ValidationHistoryEvent) -> Result<Program> {
        self.store.save(&program).await?;
        self.store.append_event(&event).await?;
        Ok(program)
    }
}

fn ensure_unlocked(program: &Program) -> Result<()> {
    if program.is_locked() {
        Err(WorkflowError::RecordLocked(program.id.clone()))
    } else {
        Ok(())
    }
}

fn ensure_admin(user: &User, action: &str) -> Result<()> {
    if user.scope_level == ScopeLevel::Admin {
        Ok(())
    } else {
        Err(WorkflowError::NotAuthorized(format!(
            "only administrators can {action}"
        )))
    }
}

/// Log a rejected request and pass the error through.
fn rejected(operation: &str, target_id: &str, user: &User, err: WorkflowError) -> WorkflowError {
    warn!(
        operation,
        target_id,
        user_id = %user.id,
        scope = %user.scope_level,
        kind = err.kind(),
        error = %err,
        "Workflow request rejected"
    );
    err
}
