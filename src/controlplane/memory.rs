//! In-process control plane for tests and dry runs.
//!
//! A *strict* collaborator: create calls fail on occupied names, deletes fail
//! while a dependent resource still references the target, and endpoint state
//! transitions take a configurable number of observations to resolve. This
//! mirrors the referential rules real endpoint services enforce, so ordering
//! bugs in the lifecycle manager surface as errors instead of passing
//! silently.

use super::{ControlPlane, CredentialProvider};
use crate::error::{Result, SlipwayError};
use crate::types::{
    DeploymentContext, DeploymentSpec, EndpointState, EndpointStatus, ResourceHandle,
    ResourceKind,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone)]
struct ModelRecord {
    handle: ResourceHandle,
    image_reference: String,
    environment: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
struct ConfigRecord {
    handle: ResourceHandle,
    model_name: String,
    instance_type: String,
}

#[derive(Debug, Clone)]
struct EndpointRecord {
    handle: ResourceHandle,
    config_name: String,
    state: EndpointState,
    polls_remaining: u32,
    reason: Option<String>,
}

#[derive(Debug, Default)]
struct PlaneState {
    models: HashMap<String, ModelRecord>,
    configs: HashMap<String, ConfigRecord>,
    endpoints: HashMap<String, EndpointRecord>,
    deletions: Vec<(ResourceKind, String)>,
}

/// Strict in-memory control plane.
pub struct MemoryControlPlane {
    state: Mutex<PlaneState>,
    /// Observations a Creating/Updating endpoint takes to resolve.
    readiness_polls: u32,
    /// Observations a Deleting endpoint takes to reach NotFound.
    deletion_polls: u32,
    /// When set, endpoints resolve to Failed with this reason.
    endpoint_failure: Option<String>,
    credentials: Option<Arc<dyn CredentialProvider>>,
}

impl MemoryControlPlane {
    /// Create an empty control plane with fast state transitions.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(PlaneState::default()),
            readiness_polls: 2,
            deletion_polls: 1,
            endpoint_failure: None,
            credentials: None,
        }
    }

    /// Set how many observations a creating endpoint takes to come up.
    pub fn with_readiness_polls(mut self, polls: u32) -> Self {
        self.readiness_polls = polls;
        self
    }

    /// Set how many observations a deleting endpoint takes to disappear.
    pub fn with_deletion_polls(mut self, polls: u32) -> Self {
        self.deletion_polls = polls;
        self
    }

    /// Make endpoints resolve to `Failed` with the given status reason.
    pub fn with_endpoint_failure(mut self, reason: impl Into<String>) -> Self {
        self.endpoint_failure = Some(reason.into());
        self
    }

    /// Attach a credential provider, consumed on model creation.
    pub fn with_credential_provider(mut self, provider: Arc<dyn CredentialProvider>) -> Self {
        self.credentials = Some(provider);
        self
    }

    /// Number of live models.
    pub fn model_count(&self) -> usize {
        self.state.lock().models.len()
    }

    /// Number of live endpoint configurations.
    pub fn config_count(&self) -> usize {
        self.state.lock().configs.len()
    }

    /// Number of live endpoints (including ones still deleting).
    pub fn endpoint_count(&self) -> usize {
        self.state.lock().endpoints.len()
    }

    /// Completed deletions in the order they were accepted.
    pub fn deletions(&self) -> Vec<(ResourceKind, String)> {
        self.state.lock().deletions.clone()
    }

    /// The configuration name an endpoint currently references.
    pub fn endpoint_config_reference(&self, endpoint_name: &str) -> Option<String> {
        self.state
            .lock()
            .endpoints
            .get(endpoint_name)
            .map(|e| e.config_name.clone())
    }

    /// The model name a configuration currently references.
    pub fn config_model_reference(&self, config_name: &str) -> Option<String> {
        self.state
            .lock()
            .configs
            .get(config_name)
            .map(|c| c.model_name.clone())
    }
}

impl Default for MemoryControlPlane {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ControlPlane for MemoryControlPlane {
    async fn model_exists(&self, name: &str) -> Result<bool> {
        Ok(self.state.lock().models.contains_key(name))
    }

    async fn endpoint_config_exists(&self, name: &str) -> Result<bool> {
        Ok(self.state.lock().configs.contains_key(name))
    }

    async fn endpoint_exists(&self, name: &str) -> Result<bool> {
        Ok(self.state.lock().endpoints.contains_key(name))
    }

    async fn create_model(
        &self,
        spec: &DeploymentSpec,
        context: &DeploymentContext,
    ) -> Result<ResourceHandle> {
        // Credentials are fetched before taking the lock; the lock is never
        // held across an await point.
        if let Some(provider) = &self.credentials {
            let creds = provider.credentials().await?;
            if creds.access_key.is_empty() {
                return Err(SlipwayError::Credential(
                    "provider returned empty access key".to_string(),
                ));
            }
        }

        let mut state = self.state.lock();
        if state.models.contains_key(&spec.model_name) {
            return Err(SlipwayError::AlreadyExists {
                kind: ResourceKind::Model,
                name: spec.model_name.clone(),
            });
        }

        let handle = ResourceHandle::new(ResourceKind::Model, &spec.model_name);
        debug!(
            model = %spec.model_name,
            image = %spec.image_reference,
            region = %context.region,
            "Model created"
        );
        state.models.insert(
            spec.model_name.clone(),
            ModelRecord {
                handle: handle.clone(),
                image_reference: spec.image_reference.clone(),
                environment: spec.environment.clone(),
            },
        );
        Ok(handle)
    }

    async fn create_endpoint_config(&self, spec: &DeploymentSpec) -> Result<ResourceHandle> {
        let mut state = self.state.lock();
        if !state.models.contains_key(&spec.model_name) {
            return Err(SlipwayError::NotFound {
                kind: ResourceKind::Model,
                name: spec.model_name.clone(),
            });
        }
        if state.configs.contains_key(&spec.endpoint_name) {
            return Err(SlipwayError::AlreadyExists {
                kind: ResourceKind::EndpointConfig,
                name: spec.endpoint_name.clone(),
            });
        }

        let handle = ResourceHandle::new(ResourceKind::EndpointConfig, &spec.endpoint_name);
        state.configs.insert(
            spec.endpoint_name.clone(),
            ConfigRecord {
                handle: handle.clone(),
                model_name: spec.model_name.clone(),
                instance_type: spec.instance_type.clone(),
            },
        );
        Ok(handle)
    }

    async fn create_or_update_endpoint(&self, spec: &DeploymentSpec) -> Result<ResourceHandle> {
        let mut state = self.state.lock();
        if !state.configs.contains_key(&spec.endpoint_name) {
            return Err(SlipwayError::NotFound {
                kind: ResourceKind::EndpointConfig,
                name: spec.endpoint_name.clone(),
            });
        }

        if let Some(endpoint) = state.endpoints.get_mut(&spec.endpoint_name) {
            endpoint.state = EndpointState::Updating;
            endpoint.polls_remaining = self.readiness_polls;
            endpoint.config_name = spec.endpoint_name.clone();
            endpoint.reason = None;
            return Ok(endpoint.handle.clone());
        }

        let handle = ResourceHandle::new(ResourceKind::Endpoint, &spec.endpoint_name);
        state.endpoints.insert(
            spec.endpoint_name.clone(),
            EndpointRecord {
                handle: handle.clone(),
                config_name: spec.endpoint_name.clone(),
                state: EndpointState::Creating,
                polls_remaining: self.readiness_polls,
                reason: None,
            },
        );
        Ok(handle)
    }

    async fn delete_resource(&self, handle: &ResourceHandle) -> Result<()> {
        let mut state = self.state.lock();

        match handle.kind {
            ResourceKind::Endpoint => {
                let Some(endpoint) = state.endpoints.get_mut(&handle.name) else {
                    return Err(SlipwayError::NotFound {
                        kind: ResourceKind::Endpoint,
                        name: handle.name.clone(),
                    });
                };
                endpoint.state = EndpointState::Deleting;
                endpoint.polls_remaining = self.deletion_polls;
                state
                    .deletions
                    .push((ResourceKind::Endpoint, handle.name.clone()));
            }
            ResourceKind::EndpointConfig => {
                if let Some(endpoint_name) = state
                    .endpoints
                    .values()
                    .find(|e| e.config_name == handle.name)
                    .map(|e| e.handle.name.clone())
                {
                    return Err(SlipwayError::ResourceInUse {
                        kind: ResourceKind::EndpointConfig,
                        name: handle.name.clone(),
                        reason: format!("referenced by endpoint '{}'", endpoint_name),
                    });
                }
                if state.configs.remove(&handle.name).is_none() {
                    return Err(SlipwayError::NotFound {
                        kind: ResourceKind::EndpointConfig,
                        name: handle.name.clone(),
                    });
                }
                state
                    .deletions
                    .push((ResourceKind::EndpointConfig, handle.name.clone()));
            }
            ResourceKind::Model => {
                if let Some(config_name) = state
                    .configs
                    .values()
                    .find(|c| c.model_name == handle.name)
                    .map(|c| c.handle.name.clone())
                {
                    return Err(SlipwayError::ResourceInUse {
                        kind: ResourceKind::Model,
                        name: handle.name.clone(),
                        reason: format!("referenced by endpoint-config '{}'", config_name),
                    });
                }
                if state.models.remove(&handle.name).is_none() {
                    return Err(SlipwayError::NotFound {
                        kind: ResourceKind::Model,
                        name: handle.name.clone(),
                    });
                }
                state
                    .deletions
                    .push((ResourceKind::Model, handle.name.clone()));
            }
        }

        Ok(())
    }

    async fn resource_handle(
        &self,
        kind: ResourceKind,
        name: &str,
    ) -> Result<Option<ResourceHandle>> {
        let state = self.state.lock();
        let handle = match kind {
            ResourceKind::Model => state.models.get(name).map(|r| r.handle.clone()),
            ResourceKind::EndpointConfig => state.configs.get(name).map(|r| r.handle.clone()),
            ResourceKind::Endpoint => state.endpoints.get(name).map(|r| r.handle.clone()),
        };
        Ok(handle)
    }

    async fn resource_matches(
        &self,
        kind: ResourceKind,
        spec: &DeploymentSpec,
    ) -> Result<bool> {
        let state = self.state.lock();
        let matches = match kind {
            ResourceKind::Model => state.models.get(&spec.model_name).map(|m| {
                m.image_reference == spec.image_reference && m.environment == spec.environment
            }),
            ResourceKind::EndpointConfig => state.configs.get(&spec.endpoint_name).map(|c| {
                c.model_name == spec.model_name && c.instance_type == spec.instance_type
            }),
            ResourceKind::Endpoint => state
                .endpoints
                .get(&spec.endpoint_name)
                .map(|e| e.config_name == spec.endpoint_name),
        };

        matches.ok_or_else(|| SlipwayError::NotFound {
            kind,
            name: match kind {
                ResourceKind::Model => spec.model_name.clone(),
                _ => spec.endpoint_name.clone(),
            },
        })
    }

    async fn endpoint_state(&self, name: &str) -> Result<EndpointStatus> {
        let mut state = self.state.lock();

        let Some(endpoint) = state.endpoints.get_mut(name) else {
            return Ok(EndpointStatus::observed(EndpointState::NotFound, None));
        };

        match endpoint.state {
            EndpointState::Creating | EndpointState::Updating => {
                if endpoint.polls_remaining > 0 {
                    endpoint.polls_remaining -= 1;
                } else if let Some(reason) = &self.endpoint_failure {
                    endpoint.state = EndpointState::Failed;
                    endpoint.reason = Some(reason.clone());
                } else {
                    endpoint.state = EndpointState::InService;
                }
            }
            EndpointState::Deleting => {
                if endpoint.polls_remaining > 0 {
                    endpoint.polls_remaining -= 1;
                } else {
                    state.endpoints.remove(name);
                    return Ok(EndpointStatus::observed(EndpointState::NotFound, None));
                }
            }
            _ => {}
        }

        let endpoint = state.endpoints.get(name).expect("present above");
        Ok(EndpointStatus::observed(
            endpoint.state,
            endpoint.reason.clone(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controlplane::{Credentials, StaticCredentialProvider};

    fn sample_spec() -> DeploymentSpec {
        DeploymentSpec::new("m1", "e1", "img:latest", "ml.g5.xlarge").with_env("KEY", "v")
    }

    fn sample_context() -> DeploymentContext {
        DeploymentContext::new("123456789012", "us-east-1")
    }

    #[tokio::test]
    async fn create_on_occupied_name_is_a_conflict() {
        let plane = MemoryControlPlane::new();
        let spec = sample_spec();
        plane.create_model(&spec, &sample_context()).await.unwrap();

        let err = plane
            .create_model(&spec, &sample_context())
            .await
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn config_requires_model() {
        let plane = MemoryControlPlane::new();
        let err = plane.create_endpoint_config(&sample_spec()).await.unwrap_err();
        assert!(matches!(
            err,
            SlipwayError::NotFound {
                kind: ResourceKind::Model,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn wrong_order_delete_is_rejected() {
        let plane = MemoryControlPlane::new();
        let spec = sample_spec();
        let model = plane.create_model(&spec, &sample_context()).await.unwrap();
        let config = plane.create_endpoint_config(&spec).await.unwrap();
        plane.create_or_update_endpoint(&spec).await.unwrap();

        // Model before config: rejected.
        let err = plane.delete_resource(&model).await.unwrap_err();
        assert!(matches!(err, SlipwayError::ResourceInUse { .. }));

        // Config while the endpoint references it: rejected.
        let err = plane.delete_resource(&config).await.unwrap_err();
        assert!(matches!(err, SlipwayError::ResourceInUse { .. }));
    }

    #[tokio::test]
    async fn endpoint_reaches_in_service_after_polls() {
        let plane = MemoryControlPlane::new().with_readiness_polls(2);
        let spec = sample_spec();
        plane.create_model(&spec, &sample_context()).await.unwrap();
        plane.create_endpoint_config(&spec).await.unwrap();
        plane.create_or_update_endpoint(&spec).await.unwrap();

        assert_eq!(
            plane.endpoint_state("e1").await.unwrap().state,
            EndpointState::Creating
        );
        assert_eq!(
            plane.endpoint_state("e1").await.unwrap().state,
            EndpointState::Creating
        );
        assert_eq!(
            plane.endpoint_state("e1").await.unwrap().state,
            EndpointState::InService
        );
    }

    #[tokio::test]
    async fn configured_failure_surfaces_reason() {
        let plane = MemoryControlPlane::new()
            .with_readiness_polls(0)
            .with_endpoint_failure("image pull failure");
        let spec = sample_spec();
        plane.create_model(&spec, &sample_context()).await.unwrap();
        plane.create_endpoint_config(&spec).await.unwrap();
        plane.create_or_update_endpoint(&spec).await.unwrap();

        let status = plane.endpoint_state("e1").await.unwrap();
        assert_eq!(status.state, EndpointState::Failed);
        assert_eq!(status.reason.as_deref(), Some("image pull failure"));
    }

    #[tokio::test]
    async fn deleting_endpoint_reaches_not_found() {
        let plane = MemoryControlPlane::new().with_deletion_polls(1);
        let spec = sample_spec();
        plane.create_model(&spec, &sample_context()).await.unwrap();
        plane.create_endpoint_config(&spec).await.unwrap();
        let endpoint = plane.create_or_update_endpoint(&spec).await.unwrap();

        plane.delete_resource(&endpoint).await.unwrap();
        assert_eq!(
            plane.endpoint_state("e1").await.unwrap().state,
            EndpointState::Deleting
        );
        assert_eq!(
            plane.endpoint_state("e1").await.unwrap().state,
            EndpointState::NotFound
        );
        assert_eq!(plane.endpoint_count(), 0);
    }

    #[tokio::test]
    async fn credentials_are_consumed_on_model_creation() {
        let provider = Arc::new(StaticCredentialProvider::new(Credentials {
            access_key: String::new(),
            secret_key: "secret".to_string(),
            session_token: None,
        }));
        let plane = MemoryControlPlane::new().with_credential_provider(provider);

        let err = plane
            .create_model(&sample_spec(), &sample_context())
            .await
            .unwrap_err();
        assert!(matches!(err, SlipwayError::Credential(_)));
    }

    #[tokio::test]
    async fn resource_matches_compares_configuration() {
        let plane = MemoryControlPlane::new();
        let spec = sample_spec();
        plane.create_model(&spec, &sample_context()).await.unwrap();

        assert!(plane
            .resource_matches(ResourceKind::Model, &spec)
            .await
            .unwrap());

        let changed = DeploymentSpec::new("m1", "e1", "img:v2", "ml.g5.xlarge");
        assert!(!plane
            .resource_matches(ResourceKind::Model, &changed)
            .await
            .unwrap());
    }
}
