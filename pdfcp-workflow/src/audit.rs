//! Validation history of PDFCP programs.
//!
//! Append-only: one event per accepted workflow action, never edited or
//! removed. Ordering by timestamp is the canonical history view.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use territory::{ScopeLevel, User};

use crate::status::ValidationStatus;

#[cfg(feature = "typescript")]
use ts_rs::TS;

/// What happened to the program.
///
/// Serialized as the historical action tag (`created`,
/// `status_change_valide_dpanef`, `cancellation_concerte_adp`, `unlocked`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum HistoryAction {
    /// Program created as a draft
    Created,
    /// Forward move to the given status
    StatusChange(ValidationStatus),
    /// The given status was cancelled back to draft
    Cancellation(ValidationStatus),
    /// Admin unlock, back to VALIDE_CENTRAL
    Unlocked,
    /// Cancellation of a step that no longer exists in the workflow
    RetiredCancellation(RetiredStep),
}

/// Workflow steps dropped from the status set but still present in stored
/// history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RetiredStep {
    /// Contrat de partenariat
    Cp,
    /// Exécuté
    Execute,
}

impl RetiredStep {
    fn key(&self) -> &'static str {
        match self {
            Self::Cp => "cp",
            Self::Execute => "execute",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Cp => "CP",
            Self::Execute => "Exécuté",
        }
    }
}

/// Tags written by earlier versions of the workflow.
const LEGACY_TAGS: &[(&str, HistoryAction)] = &[
    (
        "status_change_validated_adp",
        HistoryAction::StatusChange(ValidationStatus::ConcerteAdp),
    ),
    (
        "status_change_validated_dpanef",
        HistoryAction::StatusChange(ValidationStatus::ValideDpanef),
    ),
    (
        "status_change_visa_dranef",
        HistoryAction::StatusChange(ValidationStatus::ValideCentral),
    ),
    (
        "cancellation_concerte",
        HistoryAction::Cancellation(ValidationStatus::ConcerteAdp),
    ),
    (
        "cancellation_cp",
        HistoryAction::RetiredCancellation(RetiredStep::Cp),
    ),
    (
        "cancellation_execute",
        HistoryAction::RetiredCancellation(RetiredStep::Execute),
    ),
];

impl HistoryAction {
    /// Storage tag.
    pub fn tag(&self) -> String {
        match self {
            Self::Created => "created".to_string(),
            Self::StatusChange(status) => {
                format!("status_change_{}", status.as_str().to_lowercase())
            }
            Self::Cancellation(status) => {
                format!("cancellation_{}", status.as_str().to_lowercase())
            }
            Self::Unlocked => "unlocked".to_string(),
            Self::RetiredCancellation(step) => format!("cancellation_{}", step.key()),
        }
    }

    /// Parse a storage tag, including legacy ones.
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "created" => return Some(Self::Created),
            "unlocked" => return Some(Self::Unlocked),
            _ => {}
        }

        if let Some((_, action)) = LEGACY_TAGS.iter().find(|(legacy, _)| *legacy == tag) {
            return Some(*action);
        }

        let status_of = |suffix: &str| ValidationStatus::parse(&suffix.to_uppercase());
        if let Some(suffix) = tag.strip_prefix("status_change_") {
            return status_of(suffix).map(Self::StatusChange);
        }
        if let Some(suffix) = tag.strip_prefix("cancellation_") {
            return status_of(suffix).map(Self::Cancellation);
        }
        None
    }

    /// Timeline label.
    pub fn label(&self) -> String {
        match self {
            Self::Created => "Création".to_string(),
            Self::StatusChange(status) => status.step_label().to_string(),
            Self::Cancellation(status) => format!("Annulation {}", status.step_label()),
            Self::Unlocked => "Déverrouillé".to_string(),
            Self::RetiredCancellation(step) => format!("Annulation {}", step.label()),
        }
    }
}

impl std::fmt::Display for HistoryAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.tag())
    }
}

impl From<HistoryAction> for String {
    fn from(action: HistoryAction) -> Self {
        action.tag()
    }
}

impl TryFrom<String> for HistoryAction {
    type Error = String;

    fn try_from(tag: String) -> Result<Self, Self::Error> {
        Self::parse(&tag).ok_or_else(|| format!("unknown history action: {tag}"))
    }
}

/// Snapshot of the acting user at the time of the event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct Performer {
    pub id: String,
    pub name: String,
    pub role_label: String,
    pub scope_level: ScopeLevel,
}

impl From<&User> for Performer {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            role_label: user.role_label.clone(),
            scope_level: user.scope_level,
        }
    }
}

/// One entry of a program's validation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct ValidationHistoryEvent {
    /// Unique event ID
    pub id: String,
    /// Program the event belongs to
    pub program_id: String,
    /// What happened
    #[cfg_attr(feature = "typescript", ts(type = "string"))]
    pub action: HistoryAction,
    /// Status before the action (absent for creation)
    pub from_status: Option<ValidationStatus>,
    /// Status after the action
    pub to_status: Option<ValidationStatus>,
    /// Free-text note (justification, comment)
    pub note: Option<String>,
    /// Who performed it
    pub performed_by: Performer,
    /// When it was recorded
    pub created_at: DateTime<Utc>,
}

impl ValidationHistoryEvent {
    /// Create an event performed by `actor` now.
    pub fn new(
        program_id: impl Into<String>,
        action: HistoryAction,
        from_status: Option<ValidationStatus>,
        to_status: Option<ValidationStatus>,
        actor: &User,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            program_id: program_id.into(),
            action,
            from_status,
            to_status,
            note: None,
            performed_by: Performer::from(actor),
            created_at: Utc::now(),
        }
    }

    /// Attach a note.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// In-memory append-only audit trail, keyed by program.
#[derive(Clone, Default)]
pub struct AuditTrail {
    entries: Arc<RwLock<HashMap<String, Vec<ValidationHistoryEvent>>>>,
}

impl AuditTrail {
    /// Create an empty trail.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event. Events are never modified afterwards.
    pub async fn append(&self, event: ValidationHistoryEvent) {
        let mut entries = self.entries.write().await;
        entries
            .entry(event.program_id.clone())
            .or_default()
            .push(event);
    }

    /// History of a program, oldest first.
    ///
    /// Events with equal timestamps keep their insertion order.
    pub async fn history(&self, program_id: &str) -> Vec<ValidationHistoryEvent> {
        let entries = self.entries.read().await;
        let mut history = entries.get(program_id).cloned().unwrap_or_default();
        history.sort_by_key(|e| e.created_at);
        history
    }

    /// Most recent event of a program.
    pub async fn latest(&self, program_id: &str) -> Option<ValidationHistoryEvent> {
        self.history(program_id).await.pop()
    }

    /// Number of events recorded for a program.
    pub async fn count(&self, program_id: &str) -> usize {
        let entries = self.entries.read().await;
        entries.get(program_id).map_or(0, Vec::len)
    }

    /// Events performed by a user across all programs, oldest first.
    pub async fn by_performer(&self, user_id: &str) -> Vec<ValidationHistoryEvent> {
        let entries = self.entries.read().await;
        let mut events: Vec<ValidationHistoryEvent> = entries
            .values()
            .flatten()
            .filter(|e| e.performed_by.id == user_id)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.created_at);
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admin() -> User {
        User::new("admin-1", "Admin", ScopeLevel::Admin)
    }

    #[test]
    fn test_action_tags() {
        assert_eq!(HistoryAction::Created.tag(), "created");
        assert_eq!(
            HistoryAction::StatusChange(ValidationStatus::ValideDpanef).tag(),
            "status_change_valide_dpanef"
        );
        assert_eq!(
            HistoryAction::Cancellation(ValidationStatus::ValideCentral).tag(),
            "cancellation_valide_central"
        );
        assert_eq!(HistoryAction::Unlocked.tag(), "unlocked");
    }

    #[test]
    fn test_parse_tags() {
        assert_eq!(
            HistoryAction::parse("cancellation_concerte_adp"),
            Some(HistoryAction::Cancellation(ValidationStatus::ConcerteAdp))
        );
        assert_eq!(
            HistoryAction::parse("status_change_visa_dranef"),
            Some(HistoryAction::StatusChange(ValidationStatus::ValideCentral))
        );
        assert_eq!(HistoryAction::parse("status_change_archived"), None);
        assert_eq!(HistoryAction::parse("status_change_cp"), None);
        assert_eq!(HistoryAction::parse("deleted"), None);
    }

    #[test]
    fn test_action_serde_as_tag() {
        let action = HistoryAction::StatusChange(ValidationStatus::ConcerteAdp);
        let json = serde_json::to_string(&action).unwrap();
        assert_eq!(json, "\"status_change_concerte_adp\"");

        let back: HistoryAction = serde_json::from_str(&json).unwrap();
        assert_eq!(back, action);
        assert!(serde_json::from_str::<HistoryAction>("\"bogus\"").is_err());
    }

    #[test]
    fn test_legacy_cancellation_tags() {
        assert_eq!(
            HistoryAction::parse("cancellation_concerte"),
            Some(HistoryAction::Cancellation(ValidationStatus::ConcerteAdp))
        );

        let cp: HistoryAction = serde_json::from_str("\"cancellation_cp\"").unwrap();
        assert_eq!(cp, HistoryAction::RetiredCancellation(RetiredStep::Cp));
        assert_eq!(cp.tag(), "cancellation_cp");
        assert_eq!(cp.label(), "Annulation CP");

        let executed: HistoryAction = serde_json::from_str("\"cancellation_execute\"").unwrap();
        assert_eq!(executed, HistoryAction::RetiredCancellation(RetiredStep::Execute));
        assert_eq!(serde_json::to_string(&executed).unwrap(), "\"cancellation_execute\"");
        assert_eq!(executed.label(), "Annulation Exécuté");
    }

    #[test]
    fn test_stored_history_with_legacy_rows() {
        let actor = admin();
        let mut json = serde_json::to_value(ValidationHistoryEvent::new(
            "p-1",
            HistoryAction::Created,
            None,
            Some(ValidationStatus::Brouillon),
            &actor,
        ))
        .unwrap();
        let legacy = ["created", "cancellation_concerte", "cancellation_cp", "cancellation_execute"];
        let rows: Vec<serde_json::Value> = legacy
            .iter()
            .map(|tag| {
                json["action"] = serde_json::Value::from(*tag);
                json.clone()
            })
            .collect();

        let events: Vec<ValidationHistoryEvent> =
            serde_json::from_value(serde_json::Value::Array(rows)).unwrap();
        assert_eq!(events.len(), 4);
        assert_eq!(
            events[1].action,
            HistoryAction::Cancellation(ValidationStatus::ConcerteAdp)
        );
    }

    #[test]
    fn test_labels() {
        assert_eq!(HistoryAction::Created.label(), "Création");
        assert_eq!(
            HistoryAction::Cancellation(ValidationStatus::ValideDpanef).label(),
            "Annulation Validé DPANEF"
        );
    }

    #[tokio::test]
    async fn test_trail_is_per_program_and_ordered() {
        let trail = AuditTrail::new();
        let actor = admin();

        trail
            .append(ValidationHistoryEvent::new(
                "p-1",
                HistoryAction::Created,
                None,
                Some(ValidationStatus::Brouillon),
                &actor,
            ))
            .await;
        trail
            .append(ValidationHistoryEvent::new(
                "p-2",
                HistoryAction::Created,
                None,
                Some(ValidationStatus::Brouillon),
                &actor,
            ))
            .await;
        trail
            .append(
                ValidationHistoryEvent::new(
                    "p-1",
                    HistoryAction::StatusChange(ValidationStatus::ConcerteAdp),
                    Some(ValidationStatus::Brouillon),
                    Some(ValidationStatus::ConcerteAdp),
                    &actor,
                )
                .with_note("Plan concerté avec les usagers"),
            )
            .await;

        let history = trail.history("p-1").await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].action, HistoryAction::Created);
        assert_eq!(history[1].to_status, Some(ValidationStatus::ConcerteAdp));
        assert_eq!(trail.count("p-2").await, 1);
        assert_eq!(trail.count("p-3").await, 0);

        let latest = trail.latest("p-1").await.unwrap();
        assert_eq!(latest.note.as_deref(), Some("Plan concerté avec les usagers"));
        assert_eq!(trail.by_performer("admin-1").await.len(), 3);
    }
}
