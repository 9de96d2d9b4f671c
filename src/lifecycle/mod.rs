//! Idempotent resource-lifecycle manager.
//!
//! Reconciles desired deployment state (one model, one endpoint
//! configuration, one endpoint, by name) against whatever already exists on
//! the control plane. A reconciliation pass is: existence checks →
//! conditional teardown in reverse dependency order → provisioning in
//! forward dependency order → bounded readiness poll. Re-running after an
//! interruption converges because every pass re-derives current state from
//! scratch rather than trusting prior in-memory state.
//!
//! The manager is the sole writer of deployment resources for a given
//! `(model_name, endpoint_name)` pair; overlapping reconciliations of the
//! same pair are rejected via [`lock::DeploymentLocks`].

pub mod lock;

use crate::config::LifecycleConfig;
use crate::controlplane::ControlPlane;
use crate::error::{Result, SlipwayError};
use crate::resilience::{RetryConfig, RetryExecutor};
use crate::types::{
    DeploymentContext, DeploymentSpec, EndpointState, EndpointStatus, ReplacePolicy,
    ResourceExistence, ResourceKind,
};
use lock::DeploymentLocks;
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Lifecycle manager for a single control plane.
pub struct LifecycleManager {
    plane: Arc<dyn ControlPlane>,
    context: DeploymentContext,
    config: LifecycleConfig,
    retry: RetryExecutor,
    locks: DeploymentLocks,
}

impl LifecycleManager {
    /// Create a manager over a control plane.
    pub fn new(
        plane: Arc<dyn ControlPlane>,
        context: DeploymentContext,
        config: LifecycleConfig,
    ) -> Self {
        Self {
            plane,
            context,
            config,
            retry: RetryExecutor::new(RetryConfig::default()),
            locks: DeploymentLocks::new(),
        }
    }

    /// Override the transient-failure retry configuration.
    pub fn with_retry(mut self, config: RetryConfig) -> Self {
        self.retry = RetryExecutor::new(config);
        self
    }

    /// Query existence of the three named resources.
    ///
    /// All three checks complete before any mutation is considered.
    pub async fn check_existing(&self, spec: &DeploymentSpec) -> Result<ResourceExistence> {
        let model = self
            .retry
            .execute(|| self.plane.model_exists(&spec.model_name))
            .await?;
        let endpoint_config = self
            .retry
            .execute(|| self.plane.endpoint_config_exists(&spec.endpoint_name))
            .await?;
        let endpoint = self
            .retry
            .execute(|| self.plane.endpoint_exists(&spec.endpoint_name))
            .await?;

        Ok(ResourceExistence {
            model,
            endpoint_config,
            endpoint,
        })
    }

    /// Reconcile the control plane to the spec and wait for a servable
    /// endpoint.
    ///
    /// Under [`ReplacePolicy::Replace`] (the default) any existing resources
    /// are torn down and recreated, matching the original delete-then-recreate
    /// behavior at the cost of downtime during re-deploys. Under
    /// [`ReplacePolicy::Reuse`] resources that match the spec exactly are kept
    /// and a name held by an incompatible configuration is a conflict.
    pub async fn reconcile(&self, spec: &DeploymentSpec) -> Result<EndpointStatus> {
        let _guard = self.locks.acquire(spec)?;

        info!(
            model = %spec.model_name,
            endpoint = %spec.endpoint_name,
            image = %spec.image_reference,
            policy = ?self.config.replace_policy,
            region = %self.context.region,
            "Reconciling deployment"
        );

        let existing = self.check_existing(spec).await?;
        debug!(
            model = existing.model,
            endpoint_config = existing.endpoint_config,
            endpoint = existing.endpoint,
            "Existence check complete"
        );

        match self.config.replace_policy {
            ReplacePolicy::Replace => {
                if existing.any() {
                    self.teardown_existing(spec, existing).await?;
                }
                self.provision_all(spec).await?;
            }
            ReplacePolicy::Reuse => {
                self.converge_reuse(spec, existing).await?;
            }
        }

        self.await_in_service(&spec.endpoint_name).await
    }

    /// Tear down the spec's resources without recreating them.
    pub async fn teardown(&self, spec: &DeploymentSpec) -> Result<()> {
        let _guard = self.locks.acquire(spec)?;
        let existing = self.check_existing(spec).await?;
        if !existing.any() {
            info!(
                model = %spec.model_name,
                endpoint = %spec.endpoint_name,
                "Nothing to tear down"
            );
            return Ok(());
        }
        self.teardown_existing(spec, existing).await
    }

    /// Observe the current endpoint status.
    pub async fn status(&self, endpoint_name: &str) -> Result<EndpointStatus> {
        self.retry
            .execute(|| self.plane.endpoint_state(endpoint_name))
            .await
    }

    // ========================================================================
    // Teardown (reverse dependency order)
    // ========================================================================

    /// Delete whatever exists: endpoint first, then endpoint-config, then
    /// model. The control plane forbids deleting a referenced resource, so
    /// each deletion is confirmed complete before the next begins.
    async fn teardown_existing(
        &self,
        spec: &DeploymentSpec,
        existing: ResourceExistence,
    ) -> Result<()> {
        if existing.endpoint {
            self.delete_and_confirm(ResourceKind::Endpoint, &spec.endpoint_name)
                .await?;
        }
        if existing.endpoint_config {
            self.delete_and_confirm(ResourceKind::EndpointConfig, &spec.endpoint_name)
                .await?;
        }
        if existing.model {
            self.delete_and_confirm(ResourceKind::Model, &spec.model_name)
                .await?;
        }
        Ok(())
    }

    /// Delete a named resource and poll until it is gone.
    async fn delete_and_confirm(&self, kind: ResourceKind, name: &str) -> Result<()> {
        let handle = self
            .retry
            .execute(|| self.plane.resource_handle(kind, name))
            .await?;

        let Some(handle) = handle else {
            // Disappeared between the existence check and now; nothing to do.
            debug!(kind = %kind, name = %name, "Resource already absent");
            return Ok(());
        };

        info!(kind = %kind, name = %name, "Deleting resource");
        self.retry
            .execute(|| self.plane.delete_resource(&handle))
            .await?;

        self.await_deleted(kind, name).await
    }

    /// Poll until the named resource reaches NotFound, bounded by the
    /// deletion attempt budget.
    async fn await_deleted(&self, kind: ResourceKind, name: &str) -> Result<()> {
        for attempt in 1..=self.config.max_deletion_attempts {
            let gone = match kind {
                ResourceKind::Endpoint => {
                    let status = self
                        .retry
                        .execute(|| self.plane.endpoint_state(name))
                        .await?;
                    status.state == EndpointState::NotFound
                }
                ResourceKind::EndpointConfig => {
                    !self
                        .retry
                        .execute(|| self.plane.endpoint_config_exists(name))
                        .await?
                }
                ResourceKind::Model => {
                    !self
                        .retry
                        .execute(|| self.plane.model_exists(name))
                        .await?
                }
            };

            if gone {
                debug!(kind = %kind, name = %name, attempt = attempt, "Deletion confirmed");
                return Ok(());
            }

            if attempt < self.config.max_deletion_attempts {
                sleep(self.config.deletion_poll_interval).await;
            }
        }

        Err(SlipwayError::DeletionTimeout {
            kind,
            name: name.to_string(),
            attempts: self.config.max_deletion_attempts,
        })
    }

    // ========================================================================
    // Provisioning (forward dependency order)
    // ========================================================================

    /// Create model, endpoint-config, and endpoint from scratch.
    ///
    /// No rollback on failure: a failed endpoint creation leaves the model
    /// and config in place for the next reconciliation pass to find.
    async fn provision_all(&self, spec: &DeploymentSpec) -> Result<()> {
        info!(model = %spec.model_name, "Creating model");
        self.retry
            .execute(|| self.plane.create_model(spec, &self.context))
            .await?;

        info!(endpoint_config = %spec.endpoint_name, "Creating endpoint configuration");
        self.retry
            .execute(|| self.plane.create_endpoint_config(spec))
            .await?;

        info!(endpoint = %spec.endpoint_name, "Creating endpoint");
        self.retry
            .execute(|| self.plane.create_or_update_endpoint(spec))
            .await?;

        Ok(())
    }

    /// Keep matching resources, create missing ones, and surface a conflict
    /// for any name held by an incompatible configuration.
    async fn converge_reuse(
        &self,
        spec: &DeploymentSpec,
        existing: ResourceExistence,
    ) -> Result<()> {
        if existing.model {
            self.require_match(ResourceKind::Model, spec).await?;
            debug!(model = %spec.model_name, "Reusing existing model");
        } else {
            info!(model = %spec.model_name, "Creating model");
            self.retry
                .execute(|| self.plane.create_model(spec, &self.context))
                .await?;
        }

        if existing.endpoint_config {
            self.require_match(ResourceKind::EndpointConfig, spec).await?;
            debug!(endpoint_config = %spec.endpoint_name, "Reusing existing endpoint configuration");
        } else {
            info!(endpoint_config = %spec.endpoint_name, "Creating endpoint configuration");
            self.retry
                .execute(|| self.plane.create_endpoint_config(spec))
                .await?;
        }

        if existing.endpoint {
            self.require_match(ResourceKind::Endpoint, spec).await?;
            debug!(endpoint = %spec.endpoint_name, "Reusing existing endpoint");
        } else {
            info!(endpoint = %spec.endpoint_name, "Creating endpoint");
            self.retry
                .execute(|| self.plane.create_or_update_endpoint(spec))
                .await?;
        }

        Ok(())
    }

    /// Fail with a conflict unless the existing resource matches the spec.
    async fn require_match(&self, kind: ResourceKind, spec: &DeploymentSpec) -> Result<()> {
        let matches = self
            .retry
            .execute(|| self.plane.resource_matches(kind, spec))
            .await?;

        if matches {
            Ok(())
        } else {
            let name = match kind {
                ResourceKind::Model => &spec.model_name,
                _ => &spec.endpoint_name,
            };
            Err(SlipwayError::Conflict(format!(
                "{} '{}' exists with an incompatible configuration; re-run with the replace policy to overwrite it",
                kind, name
            )))
        }
    }

    // ========================================================================
    // Readiness poll
    // ========================================================================

    /// Poll endpoint state until `InService`, bounded by the poll budget.
    ///
    /// `Failed` is fatal and carries the control plane's last status reason;
    /// exhausting the budget is an ambiguous, incomplete deployment and is
    /// surfaced for operator intervention rather than auto-rolled-back.
    pub async fn await_in_service(&self, endpoint_name: &str) -> Result<EndpointStatus> {
        let mut last_state = EndpointState::NotFound;

        for attempt in 1..=self.config.max_poll_attempts {
            let status = self
                .retry
                .execute(|| self.plane.endpoint_state(endpoint_name))
                .await?;
            last_state = status.state;

            match status.state {
                EndpointState::InService => {
                    info!(
                        endpoint = %endpoint_name,
                        attempts = attempt,
                        "Endpoint is in service"
                    );
                    return Ok(status);
                }
                EndpointState::Failed => {
                    warn!(endpoint = %endpoint_name, reason = ?status.reason, "Endpoint failed");
                    return Err(SlipwayError::EndpointFailed {
                        name: endpoint_name.to_string(),
                        reason: status
                            .reason
                            .unwrap_or_else(|| "no status reason reported".to_string()),
                    });
                }
                state => {
                    debug!(
                        endpoint = %endpoint_name,
                        state = %state,
                        attempt = attempt,
                        "Endpoint not yet in service"
                    );
                    if attempt < self.config.max_poll_attempts {
                        sleep(self.config.poll_interval).await;
                    }
                }
            }
        }

        Err(SlipwayError::DeadlineExceeded {
            what: format!("endpoint '{}'", endpoint_name),
            attempts: self.config.max_poll_attempts,
            last_state: last_state.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controlplane::memory::MemoryControlPlane;
    use std::time::Duration;

    fn fast_config() -> LifecycleConfig {
        LifecycleConfig {
            poll_interval: Duration::from_millis(1),
            max_poll_attempts: 20,
            deletion_poll_interval: Duration::from_millis(1),
            max_deletion_attempts: 20,
            replace_policy: ReplacePolicy::Replace,
        }
    }

    fn sample_spec() -> DeploymentSpec {
        DeploymentSpec::new("m1", "e1", "img:latest", "ml.g5.xlarge").with_env("KEY", "v")
    }

    fn manager(plane: Arc<MemoryControlPlane>, config: LifecycleConfig) -> LifecycleManager {
        LifecycleManager::new(
            plane,
            DeploymentContext::new("123456789012", "us-east-1"),
            config,
        )
    }

    #[tokio::test]
    async fn fresh_deploy_reaches_in_service() {
        let plane = Arc::new(MemoryControlPlane::new());
        let mgr = manager(Arc::clone(&plane), fast_config());

        let status = mgr.reconcile(&sample_spec()).await.unwrap();
        assert_eq!(status.state, EndpointState::InService);
        assert_eq!(plane.model_count(), 1);
        assert_eq!(plane.config_count(), 1);
        assert_eq!(plane.endpoint_count(), 1);
    }

    #[tokio::test]
    async fn failed_endpoint_is_fatal_and_leaves_resources() {
        let plane = Arc::new(MemoryControlPlane::new().with_endpoint_failure("crash loop"));
        let mgr = manager(Arc::clone(&plane), fast_config());

        let err = mgr.reconcile(&sample_spec()).await.unwrap_err();
        match err {
            SlipwayError::EndpointFailed { name, reason } => {
                assert_eq!(name, "e1");
                assert_eq!(reason, "crash loop");
            }
            other => panic!("expected EndpointFailed, got {:?}", other),
        }

        // Model and config remain for inspection; no rollback.
        assert_eq!(plane.model_count(), 1);
        assert_eq!(plane.config_count(), 1);
    }

    #[tokio::test]
    async fn poll_budget_exhaustion_is_a_deadline_error() {
        let plane = Arc::new(MemoryControlPlane::new().with_readiness_polls(100));
        let mut config = fast_config();
        config.max_poll_attempts = 3;
        let mgr = manager(plane, config);

        let err = mgr.reconcile(&sample_spec()).await.unwrap_err();
        match err {
            SlipwayError::DeadlineExceeded {
                attempts,
                last_state,
                ..
            } => {
                assert_eq!(attempts, 3);
                assert_eq!(last_state, "Creating");
            }
            other => panic!("expected DeadlineExceeded, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn teardown_of_absent_resources_is_a_no_op() {
        let plane = Arc::new(MemoryControlPlane::new());
        let mgr = manager(Arc::clone(&plane), fast_config());

        mgr.teardown(&sample_spec()).await.unwrap();
        assert!(plane.deletions().is_empty());
    }

    #[tokio::test]
    async fn status_reports_not_found_for_unknown_endpoint() {
        let plane = Arc::new(MemoryControlPlane::new());
        let mgr = manager(plane, fast_config());

        let status = mgr.status("missing").await.unwrap();
        assert_eq!(status.state, EndpointState::NotFound);
    }
}
