//! PDFCP validation state machine.
//!
//! States: BROUILLON → CONCERTE_ADP → VALIDE_DPANEF → VALIDE_CENTRAL → VERROUILLE
//!
//! - ADP (LOCAL) submits the concerted plan
//! - DPANEF (PROVINCIAL) validates and forwards to the DRANEF
//! - DRANEF (REGIONAL) or central (NATIONAL) gives the visa
//! - ADMIN alone locks and unlocks
//!
//! Role requirements and cancellation rights are static tables, so adding a
//! state or a role is a data change. Everything here is pure.

use serde::{Deserialize, Serialize};
use territory::ScopeLevel;

#[cfg(feature = "typescript")]
use ts_rs::TS;

/// Validation status of a program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationStatus {
    /// Draft, freely editable
    #[default]
    Brouillon,
    /// Concerted plan submitted by the field agent
    ConcerteAdp,
    /// Validated by the provincial office, sent to the regional office
    ValideDpanef,
    /// Visa from the regional office or central administration
    ValideCentral,
    /// Locked, read-only until an admin unlocks it
    Verrouille,
}

use ScopeLevel::{Admin, Local, National, Provincial, Regional};
use ValidationStatus::{Brouillon, ConcerteAdp, ValideCentral, ValideDpanef, Verrouille};

/// from → legal targets. VERROUILLE only leads back to VALIDE_CENTRAL (unlock).
const TRANSITIONS: &[(ValidationStatus, &[ValidationStatus])] = &[
    (Brouillon, &[ConcerteAdp]),
    (ConcerteAdp, &[ValideDpanef, Brouillon]),
    (ValideDpanef, &[ValideCentral, Brouillon]),
    (ValideCentral, &[Verrouille, Brouillon]),
    (Verrouille, &[ValideCentral]),
];

/// target → scopes allowed to reach it as a forward action.
const ROLES_FOR_TARGET: &[(ValidationStatus, &[ScopeLevel])] = &[
    (Brouillon, &[Admin]),
    (ConcerteAdp, &[Local, Admin]),
    (ValideDpanef, &[Provincial, Admin]),
    (ValideCentral, &[National, Regional, Admin]),
    (Verrouille, &[Admin]),
];

/// current → scopes allowed to revert it to BROUILLON.
///
/// PROVINCIAL and REGIONAL may both walk back either office step; kept as-is
/// pending product confirmation.
const CANCELLATION_RIGHTS: &[(ValidationStatus, &[ScopeLevel])] = &[
    (ConcerteAdp, &[Admin, Local]),
    (ValideDpanef, &[Admin, Provincial, Regional]),
    (ValideCentral, &[Admin, Provincial, Regional]),
];

fn lookup<T: 'static>(
    table: &'static [(ValidationStatus, &'static [T])],
    status: ValidationStatus,
) -> &'static [T] {
    table
        .iter()
        .find(|(key, _)| *key == status)
        .map(|(_, values)| *values)
        .unwrap_or(&[])
}

impl ValidationStatus {
    /// Wire tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Brouillon => "BROUILLON",
            Self::ConcerteAdp => "CONCERTE_ADP",
            Self::ValideDpanef => "VALIDE_DPANEF",
            Self::ValideCentral => "VALIDE_CENTRAL",
            Self::Verrouille => "VERROUILLE",
        }
    }

    /// Display label for badges.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Brouillon => "Brouillon",
            Self::ConcerteAdp => "Concerté ADP",
            Self::ValideDpanef => "Validé DPANEF (envoyé au DRANEF)",
            Self::ValideCentral => "Validé DRANEF / Central",
            Self::Verrouille => "Verrouillé",
        }
    }

    /// Short label for timelines and notifications.
    pub fn step_label(&self) -> &'static str {
        match self {
            Self::Brouillon => "Brouillon",
            Self::ConcerteAdp => "Concerté ADP",
            Self::ValideDpanef => "Validé DPANEF",
            Self::ValideCentral => "Validé Central",
            Self::Verrouille => "Verrouillé",
        }
    }

    /// Parse a wire tag.
    pub fn parse(tag: &str) -> Option<Self> {
        Self::all().into_iter().find(|s| s.as_str() == tag)
    }

    /// Parse a possibly-missing stored status; a missing status is a draft.
    pub fn from_optional(tag: Option<&str>) -> Option<Self> {
        match tag {
            None | Some("") => Some(Self::Brouillon),
            Some(tag) => Self::parse(tag),
        }
    }

    /// Happy-path order.
    pub fn all() -> [Self; 5] {
        [Brouillon, ConcerteAdp, ValideDpanef, ValideCentral, Verrouille]
    }

    /// Position on the happy path (0 = draft).
    pub fn rank(&self) -> u8 {
        *self as u8
    }

    /// Legal targets from this status, regardless of role.
    pub fn allowed_targets(&self) -> &'static [ValidationStatus] {
        lookup(TRANSITIONS, *self)
    }

    /// Whether `target` is reachable from this status, regardless of role.
    pub fn can_reach(&self, target: ValidationStatus) -> bool {
        self.allowed_targets().contains(&target)
    }

    /// Scopes allowed to move a program into this status.
    pub fn required_scopes(&self) -> &'static [ScopeLevel] {
        lookup(ROLES_FOR_TARGET, *self)
    }

    /// Scopes allowed to revert this status to BROUILLON.
    pub fn cancellable_by(&self) -> &'static [ScopeLevel] {
        lookup(CANCELLATION_RIGHTS, *self)
    }

    /// Locked programs reject every mutation except the admin unlock.
    pub fn is_locked(&self) -> bool {
        matches!(self, Self::Verrouille)
    }
}

impl std::fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether `scope` may move a program from `current` to `target`.
pub fn can_advance(current: ValidationStatus, target: ValidationStatus, scope: ScopeLevel) -> bool {
    current.can_reach(target) && target.required_scopes().contains(&scope)
}

/// Whether `scope` may revert `current` to BROUILLON.
///
/// Never from BROUILLON (nothing to cancel) nor VERROUILLE (unlock first).
pub fn can_cancel(current: ValidationStatus, scope: ScopeLevel) -> bool {
    current.cancellable_by().contains(&scope)
}

/// Whether `scope` may unlock a program in `current`.
pub fn can_unlock(current: ValidationStatus, scope: ScopeLevel) -> bool {
    current == Verrouille && scope == Admin
}

/// A forward action offered to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct AvailableAction {
    /// Status the action moves the program to
    pub target_status: ValidationStatus,
    /// Button label
    pub label: String,
    /// Rendered as a destructive action
    pub destructive: bool,
}

/// Forward actions `scope` may take from `current`.
///
/// Reverting to BROUILLON is never listed here; it goes through cancellation.
pub fn available_actions(current: ValidationStatus, scope: ScopeLevel) -> Vec<AvailableAction> {
    current
        .allowed_targets()
        .iter()
        .copied()
        .filter(|target| *target != Brouillon)
        .filter(|target| can_advance(current, *target, scope))
        .map(|target| AvailableAction {
            target_status: target,
            label: action_label(target, scope),
            destructive: target == Verrouille,
        })
        .collect()
}

fn action_label(target: ValidationStatus, scope: ScopeLevel) -> String {
    match (target, scope) {
        (Verrouille, _) => "Verrouiller".to_string(),
        (ValideDpanef, Provincial) => "Valider le CP et envoyer au DRANEF".to_string(),
        (ValideCentral, Regional) => "Donner le visa DRANEF (validation central)".to_string(),
        (target, _) => format!("Valider → {}", target.label()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_table() {
        assert_eq!(Brouillon.allowed_targets(), &[ConcerteAdp]);
        assert_eq!(Verrouille.allowed_targets(), &[ValideCentral]);
        assert!(ValideCentral.can_reach(Brouillon));
        assert!(!Brouillon.can_reach(ValideDpanef));
        assert!(!ConcerteAdp.can_reach(ConcerteAdp));
    }

    #[test]
    fn test_happy_path_roles() {
        assert!(can_advance(Brouillon, ConcerteAdp, Local));
        assert!(can_advance(ConcerteAdp, ValideDpanef, Provincial));
        assert!(can_advance(ValideDpanef, ValideCentral, Regional));
        assert!(can_advance(ValideDpanef, ValideCentral, National));
        assert!(can_advance(ValideCentral, Verrouille, Admin));
    }

    #[test]
    fn test_wrong_roles_are_denied() {
        assert!(!can_advance(Brouillon, ConcerteAdp, Provincial));
        assert!(!can_advance(ConcerteAdp, ValideDpanef, Local));
        assert!(!can_advance(ConcerteAdp, ValideDpanef, Regional));
        assert!(!can_advance(ValideDpanef, ValideCentral, Provincial));
        assert!(!can_advance(ValideCentral, Verrouille, National));
    }

    #[test]
    fn test_admin_can_do_every_legal_step() {
        for from in ValidationStatus::all() {
            for to in from.allowed_targets() {
                assert!(can_advance(from, *to, Admin), "{from} → {to}");
            }
        }
    }

    #[test]
    fn test_only_admin_forces_draft() {
        for scope in ScopeLevel::all() {
            assert_eq!(can_advance(ValideDpanef, Brouillon, scope), scope == Admin);
        }
    }

    #[test]
    fn test_cancellation_matrix() {
        for scope in ScopeLevel::all() {
            assert!(!can_cancel(Brouillon, scope));
            assert!(!can_cancel(Verrouille, scope));
        }

        assert!(can_cancel(ConcerteAdp, Local));
        assert!(can_cancel(ConcerteAdp, Admin));
        assert!(!can_cancel(ConcerteAdp, Provincial));
        assert!(!can_cancel(ConcerteAdp, National));

        for status in [ValideDpanef, ValideCentral] {
            assert!(can_cancel(status, Provincial));
            assert!(can_cancel(status, Regional));
            assert!(can_cancel(status, Admin));
            assert!(!can_cancel(status, Local));
            assert!(!can_cancel(status, National));
        }
    }

    #[test]
    fn test_unlock_rule() {
        assert!(can_unlock(Verrouille, Admin));
        for scope in [National, Regional, Provincial, Local] {
            assert!(!can_unlock(Verrouille, scope));
        }
        for status in [Brouillon, ConcerteAdp, ValideDpanef, ValideCentral] {
            assert!(!can_unlock(status, Admin));
        }
    }

    #[test]
    fn test_predicates_are_stable() {
        for from in ValidationStatus::all() {
            for to in ValidationStatus::all() {
                for scope in ScopeLevel::all() {
                    assert_eq!(can_advance(from, to, scope), can_advance(from, to, scope));
                }
            }
        }
    }

    #[test]
    fn test_available_actions() {
        let actions = available_actions(ConcerteAdp, Provincial);
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].target_status, ValideDpanef);
        assert_eq!(actions[0].label, "Valider le CP et envoyer au DRANEF");
        assert!(!actions[0].destructive);

        let actions = available_actions(ValideDpanef, Regional);
        assert_eq!(actions[0].label, "Donner le visa DRANEF (validation central)");

        let actions = available_actions(ValideDpanef, National);
        assert_eq!(actions[0].label, "Valider → Validé DRANEF / Central");

        let actions = available_actions(ValideCentral, Admin);
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].target_status, Verrouille);
        assert_eq!(actions[0].label, "Verrouiller");
        assert!(actions[0].destructive);
    }

    #[test]
    fn test_available_actions_never_offer_draft() {
        for from in ValidationStatus::all() {
            for scope in ScopeLevel::all() {
                assert!(available_actions(from, scope)
                    .iter()
                    .all(|a| a.target_status != Brouillon));
            }
        }
        assert!(available_actions(ConcerteAdp, Local).is_empty());
    }

    #[test]
    fn test_status_tags() {
        assert_eq!(ValidationStatus::parse("VALIDE_DPANEF"), Some(ValideDpanef));
        assert_eq!(ValidationStatus::parse("VALIDATED"), None);
        assert_eq!(ValidationStatus::from_optional(None), Some(Brouillon));
        assert_eq!(ValidationStatus::from_optional(Some("VERROUILLE")), Some(Verrouille));
        assert_eq!(
            serde_json::to_string(&ConcerteAdp).unwrap(),
            "\"CONCERTE_ADP\""
        );
        assert!(Verrouille.is_locked());
        assert!(!ValideCentral.is_locked());
        assert!(ValideCentral.rank() > ValideDpanef.rank());
    }
}
