//! Slave registry entities.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use netrender_core::types::SlaveId;

/// Capability tag advertised by slaves that accept regular renders.
pub const TAG_RENDER: &str = "rendering";
/// Capability tag advertised by slaves that accept baking jobs.
pub const TAG_BAKING: &str = "baking";

/// Registration payload a slave POSTs to `/slave` on first contact.
/// The master answers with the assigned id in the `slave-id` header.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlaveRegistration {
    /// Hostname of the worker machine.
    pub name: String,
    /// Free-form OS/hardware stats string.
    pub stats: String,
    /// Capability tags (`rendering`, `baking`, plus user tags).
    pub tags: BTreeSet<String>,
}

impl SlaveRegistration {
    /// Build a registration from a hostname and capability flags.
    pub fn new(name: impl Into<String>, rendering: bool, baking: bool, extra: &[String]) -> Self {
        let mut tags: BTreeSet<String> = extra.iter().cloned().collect();
        if rendering {
            tags.insert(TAG_RENDER.to_string());
        }
        if baking {
            tags.insert(TAG_BAKING.to_string());
        }
        Self {
            name: name.into(),
            stats: format!("{} {}", std::env::consts::OS, std::env::consts::ARCH),
            tags,
        }
    }
}

/// A worker known to the master, as returned by `GET /slaves`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderSlave {
    /// Master-assigned identifier.
    pub id: SlaveId,
    /// Hostname of the worker machine.
    pub name: String,
    /// Network address the master sees the slave at.
    #[serde(default)]
    pub address: Option<String>,
    /// Free-form OS/hardware stats string.
    #[serde(default)]
    pub stats: String,
    /// Capability tags.
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

impl RenderSlave {
    /// Whether the slave advertises the baking capability.
    pub fn can_bake(&self) -> bool {
        self.tags.contains(TAG_BAKING)
    }
}
