//! Territorial Scope Authorization for ANEF field reporting
//!
//! Records roll up through the administrative hierarchy:
//!
//! - **Region**: administrative region
//! - **Regional office (DRANEF)**: one level below region
//! - **Provincial office (DPANEF)**: parent of communes
//! - **Commune**: where field agents (ADP) work
//!
//! # Key Components
//!
//! - [`HierarchyIndex`]: O(1) upward lookups built once per [`HierarchySnapshot`]
//! - [`filter_by_scope`]: the subset of a record collection a [`User`] may see
//! - [`ScopedRecord`]: territorial tags any entity kind can expose
//!
//! # Example
//!
//! ```ignore
//! use territory::{filter_by_scope, EntityKind, HierarchyIndex, ScopeLevel, User};
//!
//! let index = HierarchyIndex::build(&snapshot)?;
//! let user = User::new("u-42", "Sara", ScopeLevel::Regional).with_regional_office("DR1");
//! let visible = filter_by_scope(&user, EntityKind::Activity, activities, &index);
//! ```

pub mod hierarchy;
pub mod roles;
pub mod scope;
pub mod types;

// Re-export main types
pub use hierarchy::{
    Commune, HierarchyError, HierarchyIndex, HierarchySnapshot, ProvincialOffice, Rank, Region,
    RegionalOffice,
};
pub use scope::{check, filter_by_scope, is_visible, ScopeDecision, ScopedRecord, TerritorialTags};
pub use types::*;
