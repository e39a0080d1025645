//! Territorial scope filtering.
//!
//! Decides which records a user may see, based on their scope level and
//! assignment. Resolution is fail-closed: a record whose territory cannot be
//! traced through the [`HierarchyIndex`] is excluded.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::hierarchy::HierarchyIndex;
use crate::types::{EntityKind, ScopeLevel, User};

#[cfg(feature = "typescript")]
use ts_rs::TS;

/// A record carrying territorial tags.
///
/// Entity kinds populate different subsets of these fields. Empty strings are
/// treated as absent.
pub trait ScopedRecord {
    /// Regional office (DRANEF) id
    fn regional_office_id(&self) -> Option<&str> {
        None
    }

    /// Provincial office (DPANEF) id
    fn provincial_office_id(&self) -> Option<&str> {
        None
    }

    /// Commune id
    fn commune_id(&self) -> Option<&str> {
        None
    }

    /// Creator or submitting agent
    fn owner_id(&self) -> Option<&str> {
        None
    }

    /// Agent currently responsible for the record (handler, ADP responsable)
    fn assignee_id(&self) -> Option<&str> {
        None
    }
}

impl<T: ScopedRecord + ?Sized> ScopedRecord for &T {
    fn regional_office_id(&self) -> Option<&str> {
        (**self).regional_office_id()
    }

    fn provincial_office_id(&self) -> Option<&str> {
        (**self).provincial_office_id()
    }

    fn commune_id(&self) -> Option<&str> {
        (**self).commune_id()
    }

    fn owner_id(&self) -> Option<&str> {
        (**self).owner_id()
    }

    fn assignee_id(&self) -> Option<&str> {
        (**self).assignee_id()
    }
}

/// Plain territorial tags, for records that have no richer type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct TerritorialTags {
    pub id: Option<String>,
    pub regional_office_id: Option<String>,
    pub provincial_office_id: Option<String>,
    pub commune_id: Option<String>,
    pub owner_id: Option<String>,
    pub assignee_id: Option<String>,
}

impl TerritorialTags {
    /// Tags for a record known only by its commune.
    pub fn commune(commune_id: impl Into<String>) -> Self {
        Self {
            commune_id: Some(commune_id.into()),
            ..Default::default()
        }
    }

    /// Builder: set record id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Builder: set regional office.
    pub fn with_regional_office(mut self, id: impl Into<String>) -> Self {
        self.regional_office_id = Some(id.into());
        self
    }

    /// Builder: set provincial office.
    pub fn with_provincial_office(mut self, id: impl Into<String>) -> Self {
        self.provincial_office_id = Some(id.into());
        self
    }

    /// Builder: set owner.
    pub fn with_owner(mut self, id: impl Into<String>) -> Self {
        self.owner_id = Some(id.into());
        self
    }

    /// Builder: set assignee.
    pub fn with_assignee(mut self, id: impl Into<String>) -> Self {
        self.assignee_id = Some(id.into());
        self
    }
}

impl ScopedRecord for TerritorialTags {
    fn regional_office_id(&self) -> Option<&str> {
        self.regional_office_id.as_deref()
    }

    fn provincial_office_id(&self) -> Option<&str> {
        self.provincial_office_id.as_deref()
    }

    fn commune_id(&self) -> Option<&str> {
        self.commune_id.as_deref()
    }

    fn owner_id(&self) -> Option<&str> {
        self.owner_id.as_deref()
    }

    fn assignee_id(&self) -> Option<&str> {
        self.assignee_id.as_deref()
    }
}

/// Outcome of checking one record against one user's scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeDecision {
    /// Record is within the user's territory
    Visible,
    /// Record resolves to a territory outside the user's assignment
    OutOfScope,
    /// Record's territory could not be resolved (excluded, fail-closed)
    Unresolved,
}

impl ScopeDecision {
    pub fn is_visible(&self) -> bool {
        matches!(self, Self::Visible)
    }
}

/// Check a single record against a user's scope.
pub fn check<R: ScopedRecord + ?Sized>(
    user: &User,
    record: &R,
    index: &HierarchyIndex,
) -> ScopeDecision {
    match user.scope_level {
        ScopeLevel::Admin | ScopeLevel::National => ScopeDecision::Visible,
        ScopeLevel::Regional => check_regional(user, record, index),
        ScopeLevel::Provincial => check_provincial(user, record, index),
        ScopeLevel::Local => check_local(user, record),
    }
}

/// Whether a single record is visible to a user.
pub fn is_visible<R: ScopedRecord + ?Sized>(user: &User, record: &R, index: &HierarchyIndex) -> bool {
    check(user, record, index).is_visible()
}

/// Keep the records visible to `user`, preserving input order.
pub fn filter_by_scope<R, I>(user: &User, kind: EntityKind, records: I, index: &HierarchyIndex) -> Vec<R>
where
    R: ScopedRecord,
    I: IntoIterator<Item = R>,
{
    if user.scope_level.is_unrestricted() {
        return records.into_iter().collect();
    }

    let mut unresolved = 0usize;
    let visible: Vec<R> = records
        .into_iter()
        .filter(|record| match check(user, record, index) {
            ScopeDecision::Visible => true,
            ScopeDecision::OutOfScope => false,
            ScopeDecision::Unresolved => {
                unresolved += 1;
                false
            }
        })
        .collect();

    if unresolved > 0 {
        debug!(
            user_id = %user.id,
            scope = %user.scope_level,
            kind = kind.as_str(),
            unresolved,
            "Excluded records with unresolvable territory"
        );
    }

    visible
}

fn present(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Compare a resolved id against the user's assignment.
fn decide(resolved: Option<&str>, assigned: &str) -> ScopeDecision {
    match resolved {
        Some(id) if id == assigned => ScopeDecision::Visible,
        Some(_) => ScopeDecision::OutOfScope,
        None => ScopeDecision::Unresolved,
    }
}

fn check_regional<R: ScopedRecord + ?Sized>(
    user: &User,
    record: &R,
    index: &HierarchyIndex,
) -> ScopeDecision {
    let Some(assigned) = present(user.regional_office_id.as_deref()) else {
        return ScopeDecision::OutOfScope;
    };

    // The highest-rank tag present decides; lower tags are only consulted
    // when the higher ones are missing.
    if let Some(regional) = present(record.regional_office_id()) {
        return decide(Some(regional), assigned);
    }
    if let Some(provincial) = present(record.provincial_office_id()) {
        return decide(index.regional_office_of_provincial(provincial), assigned);
    }
    if let Some(commune) = present(record.commune_id()) {
        return decide(index.regional_office_of_commune(commune), assigned);
    }
    ScopeDecision::Unresolved
}

fn check_provincial<R: ScopedRecord + ?Sized>(
    user: &User,
    record: &R,
    index: &HierarchyIndex,
) -> ScopeDecision {
    let Some(assigned) = present(user.provincial_office_id.as_deref()) else {
        return ScopeDecision::OutOfScope;
    };

    if let Some(provincial) = present(record.provincial_office_id()) {
        return decide(Some(provincial), assigned);
    }
    if let Some(commune) = present(record.commune_id()) {
        return decide(index.provincial_office_of_commune(commune), assigned);
    }
    ScopeDecision::Unresolved
}

fn check_local<R: ScopedRecord + ?Sized>(user: &User, record: &R) -> ScopeDecision {
    let is_own = [record.owner_id(), record.assignee_id()]
        .into_iter()
        .flatten()
        .any(|id| !id.is_empty() && id == user.id);
    if is_own {
        return ScopeDecision::Visible;
    }

    match present(record.commune_id()) {
        Some(commune) if user.is_assigned_to_commune(commune) => ScopeDecision::Visible,
        Some(_) => ScopeDecision::OutOfScope,
        None => ScopeDecision::Unresolved,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::tests::sample_snapshot;

    fn index() -> HierarchyIndex {
        HierarchyIndex::build(&sample_snapshot()).unwrap()
    }

    fn ids(records: &[TerritorialTags]) -> Vec<&str> {
        records.iter().filter_map(|r| r.id.as_deref()).collect()
    }

    fn mixed_records() -> Vec<TerritorialTags> {
        vec![
            TerritorialTags::commune("C1").with_id("a"),
            TerritorialTags::default().with_provincial_office("P2").with_id("b"),
            TerritorialTags::default().with_regional_office("DR2").with_id("c"),
            TerritorialTags::commune("C4").with_id("d"),
            TerritorialTags::commune("C9").with_id("e"),
            TerritorialTags::default().with_owner("agent-7").with_id("f"),
        ]
    }

    #[test]
    fn test_unrestricted_levels_see_everything() {
        let index = index();
        for level in [ScopeLevel::Admin, ScopeLevel::National] {
            let user = User::new("u", "U", level);
            let result = filter_by_scope(&user, EntityKind::Activity, mixed_records(), &index);
            assert_eq!(result, mixed_records());
        }
    }

    #[test]
    fn test_regional_filter_resolves_through_index() {
        let user = User::new("u", "U", ScopeLevel::Regional).with_regional_office("DR1");
        let result = filter_by_scope(&user, EntityKind::Activity, mixed_records(), &index());
        assert_eq!(ids(&result), vec!["a", "b"]);
    }

    #[test]
    fn test_regional_unknown_commune_is_excluded() {
        // C1 → P1 → DR1; C9 is unknown to the hierarchy.
        let user = User::new("u", "U", ScopeLevel::Regional).with_regional_office("DR1");
        let records = vec![TerritorialTags::commune("C1"), TerritorialTags::commune("C9")];

        let result = filter_by_scope(&user, EntityKind::Conflict, records, &index());
        assert_eq!(result, vec![TerritorialTags::commune("C1")]);
    }

    #[test]
    fn test_direct_tag_takes_precedence() {
        // The regional tag says DR2 even though the commune lies under DR1.
        let user = User::new("u", "U", ScopeLevel::Regional).with_regional_office("DR1");
        let record = TerritorialTags::commune("C1").with_regional_office("DR2");
        assert_eq!(check(&user, &record, &index()), ScopeDecision::OutOfScope);
    }

    #[test]
    fn test_provincial_filter() {
        let user = User::new("u", "U", ScopeLevel::Provincial).with_provincial_office("P1");
        let records = vec![
            TerritorialTags::commune("C2").with_id("in-commune"),
            TerritorialTags::default().with_provincial_office("P1").with_id("direct"),
            TerritorialTags::commune("C3").with_id("other-province"),
            TerritorialTags::default().with_regional_office("DR1").with_id("region-only"),
            TerritorialTags::commune("C9").with_id("unknown"),
        ];

        let result = filter_by_scope(&user, EntityKind::Program, records, &index());
        assert_eq!(ids(&result), vec!["in-commune", "direct"]);
    }

    #[test]
    fn test_local_filter_by_commune_and_ownership() {
        let user = User::new("agent-7", "Hiba", ScopeLevel::Local).with_communes(["C3"]);
        let records = vec![
            TerritorialTags::commune("C3").with_id("assigned"),
            TerritorialTags::commune("C4").with_owner("agent-7").with_id("own-elsewhere"),
            TerritorialTags::commune("C4").with_assignee("agent-7").with_id("handled"),
            TerritorialTags::commune("C1").with_id("not-mine"),
            TerritorialTags::default().with_id("untagged"),
        ];

        let result = filter_by_scope(&user, EntityKind::Activity, records, &index());
        assert_eq!(ids(&result), vec!["assigned", "own-elsewhere", "handled"]);
    }

    #[test]
    fn test_local_without_communes_sees_only_own() {
        let user = User::new("agent-7", "Hiba", ScopeLevel::Local);
        let records = vec![
            TerritorialTags::commune("C3").with_id("x"),
            TerritorialTags::commune("C3").with_owner("agent-7").with_id("y"),
        ];
        let result = filter_by_scope(&user, EntityKind::Activity, records, &index());
        assert_eq!(ids(&result), vec!["y"]);
    }

    #[test]
    fn test_unassigned_restricted_user_sees_nothing() {
        let index = index();
        let regional = User::new("u", "U", ScopeLevel::Regional);
        let provincial = User::new("u", "U", ScopeLevel::Provincial);

        assert!(filter_by_scope(&regional, EntityKind::Program, mixed_records(), &index).is_empty());
        assert!(filter_by_scope(&provincial, EntityKind::Program, mixed_records(), &index).is_empty());
    }

    #[test]
    fn test_empty_tags_are_absent() {
        let user = User::new("u", "U", ScopeLevel::Regional).with_regional_office("DR1");
        let record = TerritorialTags::commune("C2").with_regional_office("");
        assert_eq!(check(&user, &record, &index()), ScopeDecision::Visible);

        let empty = User::new("", "anon", ScopeLevel::Local);
        let orphan = TerritorialTags::default().with_owner("");
        assert!(!is_visible(&empty, &orphan, &index()));
    }

    #[test]
    fn test_filter_accepts_references() {
        let records = mixed_records();
        let user = User::new("u", "U", ScopeLevel::Regional).with_regional_office("DR2");

        let result: Vec<&TerritorialTags> =
            filter_by_scope(&user, EntityKind::Activity, records.iter(), &index());
        let result_ids: Vec<&str> = result.iter().filter_map(|r| r.id.as_deref()).collect();
        assert_eq!(result_ids, vec!["c", "d"]);
    }

    #[test]
    fn test_filter_is_deterministic() {
        let index = index();
        let user = User::new("u", "U", ScopeLevel::Provincial).with_provincial_office("P1");
        let first = filter_by_scope(&user, EntityKind::Activity, mixed_records(), &index);
        let second = filter_by_scope(&user, EntityKind::Activity, mixed_records(), &index);
        assert_eq!(first, second);
    }
}
