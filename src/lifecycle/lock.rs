//! Serialization of concurrent deployments.
//!
//! Overlapping reconciliations of the same `(model_name, endpoint_name)`
//! pair interleave create/delete calls against the same names and produce
//! undefined control-plane state, so they are rejected outright rather than
//! queued. Deployments with different names are fully independent.

use crate::error::{Result, SlipwayError};
use crate::types::DeploymentSpec;
use parking_lot::Mutex;
use std::collections::HashSet;

/// In-process registry of deployments currently being reconciled.
#[derive(Debug, Default)]
pub struct DeploymentLocks {
    held: Mutex<HashSet<String>>,
}

impl DeploymentLocks {
    /// Create an empty lock registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the exclusive lock for a spec's name pair.
    ///
    /// Fails with a conflict when another reconciliation already holds the
    /// same names. The lock releases when the guard drops.
    pub fn acquire(&self, spec: &DeploymentSpec) -> Result<DeploymentGuard<'_>> {
        let key = spec.lock_key();
        let mut held = self.held.lock();
        if !held.insert(key.clone()) {
            return Err(SlipwayError::DeploymentInProgress(key));
        }
        Ok(DeploymentGuard { locks: self, key })
    }

    /// Whether a name pair is currently locked.
    pub fn is_held(&self, spec: &DeploymentSpec) -> bool {
        self.held.lock().contains(&spec.lock_key())
    }
}

/// Guard releasing the deployment lock on drop.
#[derive(Debug)]
pub struct DeploymentGuard<'a> {
    locks: &'a DeploymentLocks,
    key: String,
}

impl Drop for DeploymentGuard<'_> {
    fn drop(&mut self) {
        self.locks.held.lock().remove(&self.key);
    }
}
