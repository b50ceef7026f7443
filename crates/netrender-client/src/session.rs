//! Client-side session state.
//!
//! The session owns the job, slave, and blacklist collections that the
//! original kept as module globals; every command handler receives it by
//! reference. The CLI persists it to a JSON file between invocations.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use netrender_core::error::{ErrorKind, NetError};
use netrender_core::result::NetResult;
use netrender_core::types::{JobId, SlaveId};
use netrender_model::RenderSlave;

/// A job this client has submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmittedJob {
    /// Master-assigned identifier.
    pub id: JobId,
    /// Job name at submission time.
    pub name: String,
    /// When the job was submitted.
    pub submitted_at: DateTime<Utc>,
}

/// Local client state: submitted jobs and the slave classification lists.
///
/// Slaves are never deleted by blacklisting — they are moved between the
/// active and blacklist groups, and listing reconciles fresh master data
/// into whichever group a slave currently belongs to.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientSession {
    /// Jobs submitted from this session.
    #[serde(default)]
    pub jobs: Vec<SubmittedJob>,
    /// Active slaves.
    #[serde(default)]
    pub slaves: Vec<RenderSlave>,
    /// Blacklisted slaves.
    #[serde(default)]
    pub blacklist: Vec<RenderSlave>,
}

impl ClientSession {
    /// Load a session from disk; a missing file yields an empty session.
    pub fn load(path: &Path) -> NetResult<Self> {
        match std::fs::read(path) {
            Ok(bytes) => {
                let session = serde_json::from_slice(&bytes).map_err(|e| {
                    NetError::with_source(
                        ErrorKind::Serialization,
                        format!("Corrupt session file '{}'", path.display()),
                        e,
                    )
                })?;
                Ok(session)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(NetError::with_source(
                ErrorKind::Storage,
                format!("Failed to read session file '{}'", path.display()),
                e,
            )),
        }
    }

    /// Persist the session to disk, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> NetResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_vec_pretty(self)?;
        std::fs::write(path, json)?;
        debug!(path = %path.display(), "Saved client session");
        Ok(())
    }

    /// Record a freshly submitted job.
    pub fn record_job(&mut self, id: JobId, name: impl Into<String>) {
        self.jobs.push(SubmittedJob {
            id,
            name: name.into(),
            submitted_at: Utc::now(),
        });
    }

    /// Forget a job (after a successful cancel). Returns whether it was known.
    pub fn remove_job(&mut self, id: &JobId) -> bool {
        let before = self.jobs.len();
        self.jobs.retain(|j| &j.id != id);
        self.jobs.len() != before
    }

    /// Forget every job (after cancel-all).
    pub fn clear_jobs(&mut self) {
        self.jobs.clear();
    }

    /// Move a slave from the active group to the blacklist.
    /// Purely local; no network call is involved.
    pub fn blacklist_slave(&mut self, id: &SlaveId) -> bool {
        if let Some(pos) = self.slaves.iter().position(|s| &s.id == id) {
            let slave = self.slaves.remove(pos);
            self.blacklist.push(slave);
            true
        } else {
            false
        }
    }

    /// Move a slave from the blacklist back to the active group.
    pub fn whitelist_slave(&mut self, id: &SlaveId) -> bool {
        if let Some(pos) = self.blacklist.iter().position(|s| &s.id == id) {
            let slave = self.blacklist.remove(pos);
            self.slaves.push(slave);
            true
        } else {
            false
        }
    }

    /// Replace the slave groups with fresh master data, keeping each
    /// slave in the group it currently belongs to: a fetched slave whose
    /// id is on the blacklist refreshes that blacklist entry, everything
    /// else lands in the active group. Slaves the master no longer knows
    /// drop out of the active group only; blacklist membership is sticky,
    /// so a blacklisted slave absent from one listing stays excluded.
    pub fn reconcile_slaves(&mut self, fetched: Vec<RenderSlave>) {
        let mut blacklist = std::mem::take(&mut self.blacklist);
        self.slaves.clear();
        for slave in fetched {
            if let Some(entry) = blacklist.iter_mut().find(|b| b.id == slave.id) {
                *entry = slave;
            } else {
                self.slaves.push(slave);
            }
        }
        self.blacklist = blacklist;
    }
}
