//! Instance registry and the dedup gate.
//!
//! The check for a running instance and the insertion of a new one happen
//! under a single write guard, so two concurrent submissions for the same
//! identity can never both start.

use std::collections::HashMap;
use std::sync::Arc;

use tabrun_core::job::{InstanceId, JobDescriptor};
use tabrun_core::runtime_status::RuntimeStatus;
use tokio::sync::{watch, RwLock};

use crate::error::PipelineError;
use crate::instance::{InstanceStatus, OrchestrationInstance};

// ---------------------------------------------------------------------------
// InstanceHandle
// ---------------------------------------------------------------------------

/// Shared handle to one instance's state.
///
/// Mutations go through [`update`](Self::update), which also publishes the
/// runtime status on a watch channel so callers can await completion.
#[derive(Clone)]
pub struct InstanceHandle {
    id: InstanceId,
    state: Arc<RwLock<OrchestrationInstance>>,
    status_tx: Arc<watch::Sender<RuntimeStatus>>,
}

impl InstanceHandle {
    fn new(instance: OrchestrationInstance) -> Self {
        let (status_tx, _) = watch::channel(instance.runtime_status);
        Self {
            id: instance.instance_id.clone(),
            state: Arc::new(RwLock::new(instance)),
            status_tx: Arc::new(status_tx),
        }
    }

    pub fn id(&self) -> &InstanceId {
        &self.id
    }

    pub fn runtime_status(&self) -> RuntimeStatus {
        *self.status_tx.borrow()
    }

    pub async fn status(&self) -> InstanceStatus {
        self.state.read().await.status()
    }

    pub async fn descriptor(&self) -> JobDescriptor {
        self.state.read().await.descriptor.clone()
    }

    /// Apply `f` to the instance under its write lock.
    pub async fn update<R>(&self, f: impl FnOnce(&mut OrchestrationInstance) -> R) -> R {
        let mut guard = self.state.write().await;
        let result = f(&mut guard);
        self.status_tx.send_replace(guard.runtime_status);
        result
    }

    /// Wait until the instance reaches a terminal status.
    pub async fn wait_terminal(&self) -> RuntimeStatus {
        let mut rx = self.status_tx.subscribe();
        let status = match rx.wait_for(|s| s.is_terminal()).await {
            Ok(status) => *status,
            // The sender lives as long as this handle, so this is unreachable
            // in practice; report the last known value.
            Err(_) => self.runtime_status(),
        };
        status
    }
}

impl std::fmt::Debug for InstanceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceHandle")
            .field("id", &self.id)
            .field("runtime_status", &self.runtime_status())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// InstanceRegistry
// ---------------------------------------------------------------------------

/// All known instances keyed by identity. Terminal instances stay queryable
/// until a new submission for the same identity replaces them.
#[derive(Default)]
pub struct InstanceRegistry {
    instances: RwLock<HashMap<InstanceId, InstanceHandle>>,
}

impl InstanceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new running instance for the descriptor's identity.
    ///
    /// Fails with [`PipelineError::Conflict`] if an instance with the same
    /// identity is still running; the existing instance is left untouched.
    pub async fn submit(&self, descriptor: JobDescriptor) -> Result<InstanceHandle, PipelineError> {
        let instance_id = descriptor.instance_id();
        let mut instances = self.instances.write().await;

        if let Some(existing) = instances.get(&instance_id) {
            if !existing.runtime_status().is_terminal() {
                return Err(PipelineError::Conflict { instance_id });
            }
        }

        let handle = InstanceHandle::new(OrchestrationInstance::new(descriptor));
        instances.insert(instance_id, handle.clone());
        Ok(handle)
    }

    pub async fn get(&self, id: &InstanceId) -> Option<InstanceHandle> {
        self.instances.read().await.get(id).cloned()
    }

    pub async fn status(&self, id: &InstanceId) -> Option<InstanceStatus> {
        let handle = self.get(id).await?;
        Some(handle.status().await)
    }

    /// Snapshots of every known instance, ordered by id.
    pub async fn list(&self) -> Vec<InstanceStatus> {
        let handles: Vec<InstanceHandle> = self.instances.read().await.values().cloned().collect();
        let mut statuses = Vec::with_capacity(handles.len());
        for handle in handles {
            statuses.push(handle.status().await);
        }
        statuses.sort_by(|a, b| a.instance_id.as_str().cmp(b.instance_id.as_str()));
        statuses
    }

    pub async fn running_count(&self) -> usize {
        self.instances
            .read()
            .await
            .values()
            .filter(|h| h.runtime_status() == RuntimeStatus::Running)
            .count()
    }

}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
