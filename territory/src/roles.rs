//! Role title to scope level mapping.
//!
//! Profiles carry a human role title; authorization works on scope levels.

use crate::types::ScopeLevel;

/// Role titles known to the administration, with the scope they grant.
const ROLE_SCOPES: &[(&str, ScopeLevel)] = &[
    ("admin", ScopeLevel::Admin),
    ("DG", ScopeLevel::National),
    ("Secrétaire général", ScopeLevel::National),
    ("Directeur central", ScopeLevel::National),
    ("Chef département central", ScopeLevel::National),
    ("Chef service central", ScopeLevel::National),
    ("DRANEF", ScopeLevel::Regional),
    ("Chef service régional SAP", ScopeLevel::Regional),
    ("DPANEF", ScopeLevel::Provincial),
    ("ADP", ScopeLevel::Local),
    ("adp", ScopeLevel::Local),
];

impl ScopeLevel {
    /// Look up the scope granted by a role title.
    pub fn for_role_label(label: &str) -> Option<Self> {
        ROLE_SCOPES
            .iter()
            .find(|(known, _)| *known == label)
            .map(|(_, scope)| *scope)
    }

    /// Derive a scope from a role title, falling back to LOCAL.
    pub fn from_role_label(label: &str) -> Self {
        Self::for_role_label(label).unwrap_or(Self::Local)
    }

    /// Derive a scope from the coarse role and the optional role title.
    ///
    /// The title wins when it is recognized.
    pub fn derive(role: &str, role_label: Option<&str>) -> Self {
        role_label
            .and_then(Self::for_role_label)
            .unwrap_or_else(|| Self::from_role_label(role))
    }
}
