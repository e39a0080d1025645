//! Territorial hierarchy snapshot and lookup index.
//!
//! The administration is organized as Region ⊃ RegionalOffice (DRANEF) ⊃
//! ProvincialOffice (DPANEF) ⊃ Commune. Records often carry only their lowest
//! territorial id; the index resolves it upward in O(1).
//!
//! The index is built once per snapshot. A missing entry means "cannot
//! verify", never "visible".

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tracing::debug;

#[cfg(feature = "typescript")]
use ts_rs::TS;

/// Error types for hierarchy construction.
///
/// These indicate a contract violation by the data provider, not a user error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HierarchyError {
    /// A unit has an empty id
    #[error("Empty {rank} id under parent '{parent}'")]
    EmptyId { rank: Rank, parent: String },

    /// A unit appears under two different parents
    #[error("{rank} '{id}' appears under both '{first_parent}' and '{second_parent}'")]
    ConflictingParent {
        rank: Rank,
        id: String,
        first_parent: String,
        second_parent: String,
    },
}

/// Rank of a territorial unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum Rank {
    Commune,
    ProvincialOffice,
    RegionalOffice,
    Region,
}

impl std::fmt::Display for Rank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Commune => "commune",
            Self::ProvincialOffice => "provincial office",
            Self::RegionalOffice => "regional office",
            Self::Region => "region",
        };
        f.write_str(name)
    }
}

/// A commune, the lowest territorial unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct Commune {
    pub id: String,
    pub name: String,
}

/// A provincial office (DPANEF) and its communes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct ProvincialOffice {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub communes: Vec<Commune>,
}

/// A regional office (DRANEF) and its provincial offices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct RegionalOffice {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub provincial_offices: Vec<ProvincialOffice>,
}

/// An administrative region and its regional offices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct Region {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub regional_offices: Vec<RegionalOffice>,
}

/// Full territorial tree as delivered by the data provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct HierarchySnapshot {
    #[serde(default)]
    pub regions: Vec<Region>,
}

impl HierarchySnapshot {
    /// Parse a snapshot from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// SHA-256 hex digest of the canonical JSON form.
    pub fn fingerprint(&self) -> String {
        let json = serde_json::to_vec(self).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(&json);
        hex::encode(hasher.finalize())
    }
}

/// Upward lookup tables over one hierarchy snapshot.
#[derive(Debug, Clone, Default)]
pub struct HierarchyIndex {
    commune_to_provincial: HashMap<String, String>,
    commune_to_regional: HashMap<String, String>,
    provincial_to_regional: HashMap<String, String>,
    regional_to_region: HashMap<String, String>,
    fingerprint: String,
}

impl HierarchyIndex {
    /// Build the index in one pass over the snapshot.
    ///
    /// Fails if any unit is listed under two different parents or has an
    /// empty id. Listing a unit twice under the same parent is tolerated.
    pub fn build(snapshot: &HierarchySnapshot) -> Result<Self, HierarchyError> {
        let mut index = Self {
            fingerprint: snapshot.fingerprint(),
            ..Default::default()
        };

        for region in &snapshot.regions {
            for regional in &region.regional_offices {
                link(
                    &mut index.regional_to_region,
                    Rank::RegionalOffice,
                    &regional.id,
                    &region.id,
                )?;

                for provincial in &regional.provincial_offices {
                    link(
                        &mut index.provincial_to_regional,
                        Rank::ProvincialOffice,
                        &provincial.id,
                        &regional.id,
                    )?;

                    for commune in &provincial.communes {
                        link(
                            &mut index.commune_to_provincial,
                            Rank::Commune,
                            &commune.id,
                            &provincial.id,
                        )?;
                        index
                            .commune_to_regional
                            .insert(commune.id.clone(), regional.id.clone());
                    }
                }
            }
        }

        debug!(
            communes = index.commune_to_provincial.len(),
            provincial_offices = index.provincial_to_regional.len(),
            regional_offices = index.regional_to_region.len(),
            fingerprint = %index.fingerprint,
            "Built territorial hierarchy index"
        );

        Ok(index)
    }

    /// Provincial office that contains a commune.
    pub fn provincial_office_of_commune(&self, commune_id: &str) -> Option<&str> {
        self.commune_to_provincial.get(commune_id).map(String::as_str)
    }

    /// Regional office that contains a commune.
    pub fn regional_office_of_commune(&self, commune_id: &str) -> Option<&str> {
        self.commune_to_regional.get(commune_id).map(String::as_str)
    }

    /// Regional office that contains a provincial office.
    pub fn regional_office_of_provincial(&self, provincial_office_id: &str) -> Option<&str> {
        self.provincial_to_regional
            .get(provincial_office_id)
            .map(String::as_str)
    }

    /// Region that contains a regional office.
    pub fn region_of(&self, regional_office_id: &str) -> Option<&str> {
        self.regional_to_region
            .get(regional_office_id)
            .map(String::as_str)
    }

    /// Fingerprint of the snapshot this index was built from.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Whether this index is current for the given snapshot.
    pub fn is_built_from(&self, snapshot: &HierarchySnapshot) -> bool {
        self.fingerprint == snapshot.fingerprint()
    }

    /// Number of indexed units at a rank (regions are counted through their offices).
    pub fn unit_count(&self, rank: Rank) -> usize {
        match rank {
            Rank::Commune => self.commune_to_provincial.len(),
            Rank::ProvincialOffice => self.provincial_to_regional.len(),
            Rank::RegionalOffice => self.regional_to_region.len(),
            Rank::Region => {
                let mut regions: Vec<&String> = self.regional_to_region.values().collect();
                regions.sort();
                regions.dedup();
                regions.len()
            }
        }
    }
}

/// Record `child → parent`, rejecting a second, different parent.
fn link(
    table: &mut HashMap<String, String>,
    rank: Rank,
    child: &str,
    parent: &str,
) -> Result<(), HierarchyError> {
    if child.is_empty() {
        return Err(HierarchyError::EmptyId {
            rank,
            parent: parent.to_string(),
        });
    }

    match table.get(child) {
        Some(existing) if existing != parent => Err(HierarchyError::ConflictingParent {
            rank,
            id: child.to_string(),
            first_parent: existing.clone(),
            second_parent: parent.to_string(),
        }),
        Some(_) => Ok(()),
        None => {
            table.insert(child.to_string(), parent.to_string());
            Ok(())
        }
    }
}
