//! Cancellation notices.
//!
//! Builds the notification payload sent when a validation step is cancelled.
//! Delivery is handled by the notification service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use territory::User;

use crate::audit::{HistoryAction, Performer};
use crate::program::Program;
use crate::status::ValidationStatus;

#[cfg(feature = "typescript")]
use ts_rs::TS;

/// Notification severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum NoticeSeverity {
    Info,
    Warning,
    Critical,
}

/// Users concerned by a program's validation chain.
#[derive(Debug, Clone, Default)]
pub struct NoticeRecipients {
    /// Field agent responsible for the program
    pub agent_id: Option<String>,
    /// Users of the provincial office
    pub provincial_user_ids: Vec<String>,
    /// Users of the regional office
    pub regional_user_ids: Vec<String>,
}

/// Notification payload for a cancelled validation step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct CancellationNotice {
    pub title: String,
    pub message: String,
    /// Same tag as the history action (`cancellation_valide_dpanef`)
    pub notification_type: String,
    pub severity: NoticeSeverity,
    pub program_id: String,
    pub cancellation_reason: String,
    pub cancelled_by: Performer,
    pub cancelled_at: DateTime<Utc>,
    /// Distinct recipients, the actor excluded
    pub recipient_user_ids: Vec<String>,
}

impl CancellationNotice {
    /// Build the notice for `actor` cancelling `cancelled_status` on `program`.
    pub fn build(
        program: &Program,
        cancelled_status: ValidationStatus,
        reason: &str,
        actor: &User,
        recipients: &NoticeRecipients,
    ) -> Self {
        let step = cancelled_status.step_label();

        let mut recipient_user_ids: Vec<String> = Vec::new();
        let candidates = recipients
            .agent_id
            .iter()
            .chain(&recipients.provincial_user_ids)
            .chain(&recipients.regional_user_ids);
        for id in candidates {
            if id != &actor.id && !recipient_user_ids.contains(id) {
                recipient_user_ids.push(id.clone());
            }
        }

        Self {
            title: format!("Annulation validation {step}"),
            message: format!(
                "La validation \"{step}\" du PDFCP \"{}\" a été annulée par {} ({}).",
                program.title, actor.name, actor.role_label
            ),
            notification_type: HistoryAction::Cancellation(cancelled_status).tag(),
            severity: NoticeSeverity::Critical,
            program_id: program.id.clone(),
            cancellation_reason: reason.trim().to_string(),
            cancelled_by: Performer::from(actor),
            cancelled_at: Utc::now(),
            recipient_user_ids,
        }
    }

    /// Whether anyone needs to be notified.
    pub fn has_recipients(&self) -> bool {
        !self.recipient_user_ids.is_empty()
    }
}
