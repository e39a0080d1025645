//! Core identity types for territorial authorization.
//!
//! Users are created and updated by the identity provider; this crate only
//! reads them. The acting user is always passed explicitly.
//!
//! With the `typescript` feature enabled, these types can be exported to TypeScript
//! using ts-rs for consistency with the React frontend.

use serde::{Deserialize, Serialize};

#[cfg(feature = "typescript")]
use ts_rs::TS;

/// Five-tier authorization rank.
///
/// Levels are mutually exclusive. ADMIN and NATIONAL carry no territorial
/// restriction; the three lower levels are bound to an assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScopeLevel {
    /// Platform administrator, full control including lock/unlock
    Admin,
    /// Central administration (DG, central directors)
    National,
    /// Regional office (DRANEF)
    Regional,
    /// Provincial office (DPANEF)
    Provincial,
    /// Field agent (ADP), bound to a set of communes
    Local,
}

impl ScopeLevel {
    /// Wire tag, as stored in user profiles.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::National => "NATIONAL",
            Self::Regional => "REGIONAL",
            Self::Provincial => "PROVINCIAL",
            Self::Local => "LOCAL",
        }
    }

    /// Display label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Admin => "Administrateur",
            Self::National => "National",
            Self::Regional => "Régional",
            Self::Provincial => "Provincial",
            Self::Local => "Local (ADP)",
        }
    }

    /// Parse a wire tag. Unknown tags yield `None`.
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "ADMIN" => Some(Self::Admin),
            "NATIONAL" => Some(Self::National),
            "REGIONAL" => Some(Self::Regional),
            "PROVINCIAL" => Some(Self::Provincial),
            "LOCAL" => Some(Self::Local),
            _ => None,
        }
    }

    /// Whether this level sees every record regardless of territory.
    pub fn is_unrestricted(&self) -> bool {
        matches!(self, Self::Admin | Self::National)
    }

    /// All levels, broadest first.
    pub fn all() -> [Self; 5] {
        [
            Self::Admin,
            Self::National,
            Self::Regional,
            Self::Provincial,
            Self::Local,
        ]
    }
}

impl std::fmt::Display for ScopeLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An authenticated user and their territorial assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct User {
    /// Stable user id
    pub id: String,
    /// Display name, snapshotted into audit events
    pub name: String,
    /// Role title (e.g. "DPANEF", "Chef service central")
    pub role_label: String,
    /// Authorization rank
    pub scope_level: ScopeLevel,
    /// Regional office (DRANEF) assignment
    pub regional_office_id: Option<String>,
    /// Provincial office (DPANEF) assignment
    pub provincial_office_id: Option<String>,
    /// Communes assigned to a field agent
    #[serde(default)]
    pub commune_ids: Vec<String>,
}

impl User {
    /// Create a user with no territorial assignment.
    pub fn new(id: impl Into<String>, name: impl Into<String>, scope_level: ScopeLevel) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role_label: scope_level.label().to_string(),
            scope_level,
            regional_office_id: None,
            provincial_office_id: None,
            commune_ids: Vec::new(),
        }
    }

    /// Builder: set role label.
    pub fn with_role_label(mut self, role_label: impl Into<String>) -> Self {
        self.role_label = role_label.into();
        self
    }

    /// Builder: set regional office.
    pub fn with_regional_office(mut self, regional_office_id: impl Into<String>) -> Self {
        self.regional_office_id = Some(regional_office_id.into());
        self
    }

    /// Builder: set provincial office.
    pub fn with_provincial_office(mut self, provincial_office_id: impl Into<String>) -> Self {
        self.provincial_office_id = Some(provincial_office_id.into());
        self
    }

    /// Builder: set assigned communes.
    pub fn with_communes<I, S>(mut self, commune_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.commune_ids = commune_ids.into_iter().map(Into::into).collect();
        self
    }

    /// Check whether a commune is in this user's assignment.
    pub fn is_assigned_to_commune(&self, commune_id: &str) -> bool {
        self.commune_ids.iter().any(|c| c == commune_id)
    }
}

/// Entity families subject to scope filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// PDFCP development program
    Program,
    /// Field activity
    Activity,
    /// Conflict or opposition
    Conflict,
    /// Field agent profile
    Agent,
    /// Structural organization
    Organization,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Program => "program",
            Self::Activity => "activity",
            Self::Conflict => "conflict",
            Self::Agent => "agent",
            Self::Organization => "organization",
        }
    }
}
