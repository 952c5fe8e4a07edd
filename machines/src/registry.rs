//! Scenario registry for discovery by name.
//!
//! Each traffic scenario registers itself via [`inventory::submit!`] with a
//! [`ScenarioEntry`] holding its CLI name, a one-line description, and a
//! builder. The front end lists and looks up scenarios at runtime without a
//! central table.

use thiserror::Error;

use crate::scenarios::{ScenarioParams, Workload};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScenarioError {
    #[error("unknown scenario {name:?} (available: {})", .available.join(", "))]
    Unknown {
        name: String,
        available: Vec<&'static str>,
    },
}

/// A named traffic pattern for the two-slot rig.
pub struct ScenarioEntry {
    /// CLI name used to select this scenario (e.g., "contention").
    pub name: &'static str,
    pub description: &'static str,
    /// Builder: the operations to submit for the given parameters.
    pub build: fn(&ScenarioParams) -> Workload,
}

impl ScenarioEntry {
    pub const fn new(
        name: &'static str,
        description: &'static str,
        build: fn(&ScenarioParams) -> Workload,
    ) -> Self {
        Self {
            name,
            description,
            build,
        }
    }
}

inventory::collect!(ScenarioEntry);

/// All registered scenarios, sorted by name.
pub fn all() -> Vec<&'static ScenarioEntry> {
    let mut entries: Vec<_> = inventory::iter::<ScenarioEntry>.into_iter().collect();
    entries.sort_by_key(|e| e.name);
    entries
}

/// Look up a scenario by its CLI name.
pub fn find(name: &str) -> Option<&'static ScenarioEntry> {
    inventory::iter::<ScenarioEntry>
        .into_iter()
        .find(|e| e.name == name)
}

/// Like [`find`], with the registered names in the error.
pub fn lookup(name: &str) -> Result<&'static ScenarioEntry, ScenarioError> {
    find(name).ok_or_else(|| ScenarioError::Unknown {
        name: name.to_string(),
        available: all().iter().map(|e| e.name).collect(),
    })
}
