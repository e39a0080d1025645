//! The PDFCP program record under workflow control.
//!
//! `locked` is not a field: it is always derived from the validation status.
//! The status itself can only change through the workflow service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use territory::{ScopedRecord, User};

use crate::status::ValidationStatus;
use crate::types::{Result, WorkflowError};

#[cfg(feature = "typescript")]
use ts_rs::TS;

/// A multi-year forestry development program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct Program {
    /// Unique identifier
    pub id: String,
    /// Administrative code
    pub code: String,
    /// Title
    pub title: String,
    /// Free-text description
    pub description: Option<String>,
    /// First year covered
    pub start_year: Option<i32>,
    /// Last year covered
    pub end_year: Option<i32>,
    /// Total planned budget in dirhams
    pub total_budget_dh: Option<f64>,
    /// Regional office (DRANEF)
    pub regional_office_id: String,
    /// Provincial office (DPANEF)
    pub provincial_office_id: String,
    /// Commune, when the program is commune-specific
    pub commune_id: Option<String>,
    /// Field agent responsible for the program
    pub responsible_agent_id: Option<String>,
    /// Workflow status; rows stored before the workflow existed are drafts
    #[serde(default)]
    validation_status: ValidationStatus,
    /// Justification of the last cancellation
    pub cancellation_reason: Option<String>,
    /// Justification of the last unlock
    pub unlock_motif: Option<String>,
    /// Creator
    pub created_by: String,
    /// Last user to modify the record
    pub updated_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Program {
    /// Create a draft program from user input.
    pub fn from_draft(draft: ProgramDraft, creator: &User) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            code: draft.code,
            title: draft.title,
            description: draft.description,
            start_year: draft.start_year,
            end_year: draft.end_year,
            total_budget_dh: draft.total_budget_dh,
            regional_office_id: draft.regional_office_id,
            provincial_office_id: draft.provincial_office_id,
            commune_id: draft.commune_id,
            responsible_agent_id: draft.responsible_agent_id,
            validation_status: ValidationStatus::Brouillon,
            cancellation_reason: None,
            unlock_motif: None,
            created_by: creator.id.clone(),
            updated_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Current workflow status.
    pub fn validation_status(&self) -> ValidationStatus {
        self.validation_status
    }

    /// Whether the program is read-only. Derived, never stored.
    pub fn is_locked(&self) -> bool {
        self.validation_status.is_locked()
    }

    /// Copy of this program moved to `status` by `actor`.
    pub(crate) fn with_status(&self, status: ValidationStatus, actor: &User) -> Self {
        let mut next = self.clone();
        next.validation_status = status;
        next.touch(actor);
        next
    }

    fn touch(&mut self, actor: &User) {
        self.updated_by = Some(actor.id.clone());
        self.updated_at = Utc::now();
    }
}

impl ScopedRecord for Program {
    fn regional_office_id(&self) -> Option<&str> {
        Some(&self.regional_office_id)
    }

    fn provincial_office_id(&self) -> Option<&str> {
        Some(&self.provincial_office_id)
    }

    fn commune_id(&self) -> Option<&str> {
        self.commune_id.as_deref()
    }

    fn owner_id(&self) -> Option<&str> {
        Some(&self.created_by)
    }

    fn assignee_id(&self) -> Option<&str> {
        self.responsible_agent_id.as_deref()
    }
}

/// User input for a new program.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct ProgramDraft {
    pub code: String,
    pub title: String,
    pub description: Option<String>,
    pub start_year: Option<i32>,
    pub end_year: Option<i32>,
    pub total_budget_dh: Option<f64>,
    pub regional_office_id: String,
    pub provincial_office_id: String,
    pub commune_id: Option<String>,
    pub responsible_agent_id: Option<String>,
}

impl ProgramDraft {
    /// Check required fields and year ordering.
    pub fn validate(&self) -> Result<()> {
        if self.code.trim().is_empty() {
            return Err(WorkflowError::InvalidInput("code is required".to_string()));
        }
        if self.title.trim().is_empty() {
            return Err(WorkflowError::InvalidInput("title is required".to_string()));
        }
        check_years(self.start_year, self.end_year)?;
        check_budget(self.total_budget_dh)
    }
}

/// Field edits on an existing program. `None` leaves a field unchanged.
///
/// Territorial reassignment above the commune and the status are not editable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct ProgramEdit {
    pub title: Option<String>,
    pub description: Option<String>,
    pub start_year: Option<i32>,
    pub end_year: Option<i32>,
    pub total_budget_dh: Option<f64>,
    pub commune_id: Option<String>,
}

impl ProgramEdit {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.start_year.is_none()
            && self.end_year.is_none()
            && self.total_budget_dh.is_none()
            && self.commune_id.is_none()
    }

    /// Apply to a copy of `program`, validating the result.
    pub(crate) fn apply(&self, program: &Program, actor: &User) -> Result<Program> {
        if self.is_empty() {
            return Err(WorkflowError::InvalidInput("nothing to update".to_string()));
        }
        if matches!(&self.title, Some(title) if title.trim().is_empty()) {
            return Err(WorkflowError::InvalidInput("title cannot be empty".to_string()));
        }

        let mut next = program.clone();
        if let Some(title) = &self.title {
            next.title = title.clone();
        }
        if let Some(description) = &self.description {
            next.description = Some(description.clone());
        }
        if let Some(start_year) = self.start_year {
            next.start_year = Some(start_year);
        }
        if let Some(end_year) = self.end_year {
            next.end_year = Some(end_year);
        }
        if let Some(budget) = self.total_budget_dh {
            next.total_budget_dh = Some(budget);
        }
        if let Some(commune_id) = &self.commune_id {
            next.commune_id = Some(commune_id.clone());
        }

        check_years(next.start_year, next.end_year)?;
        check_budget(next.total_budget_dh)?;
        next.touch(actor);
        Ok(next)
    }
}

fn check_years(start: Option<i32>, end: Option<i32>) -> Result<()> {
    match (start, end) {
        (Some(start), Some(end)) if end < start => Err(WorkflowError::InvalidInput(format!(
            "end year {end} is before start year {start}"
        ))),
        _ => Ok(()),
    }
}

fn check_budget(budget: Option<f64>) -> Result<()> {
    match budget {
        Some(value) if !value.is_finite() || value < 0.0 => Err(WorkflowError::InvalidInput(
            "budget must be a non-negative amount".to_string(),
        )),
        _ => Ok(()),
    }
}
