//! Control-plane collaborator interface.
//!
//! The lifecycle manager depends only on the narrow [`ControlPlane`] trait,
//! never on a specific control-plane implementation. Real implementations
//! wrap a cloud SDK; [`memory::MemoryControlPlane`] is a strict in-process
//! implementation used by tests and dry runs.

pub mod memory;

use crate::error::Result;
use crate::types::{
    DeploymentContext, DeploymentSpec, EndpointStatus, ResourceHandle, ResourceKind,
};
use async_trait::async_trait;

/// Credentials retrieved from an external provider.
///
/// Opaque to the orchestration core: consumed by control-plane
/// implementations, never parsed or validated here.
#[derive(Debug, Clone)]
pub struct Credentials {
    /// Access key id.
    pub access_key: String,
    /// Secret access key.
    pub secret_key: String,
    /// Session token for temporary credentials, if any.
    pub session_token: Option<String>,
}

/// Capability for retrieving credentials (e.g. from instance metadata).
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Retrieve current credentials.
    async fn credentials(&self) -> Result<Credentials>;
}

/// Provider returning a fixed set of credentials.
pub struct StaticCredentialProvider {
    credentials: Credentials,
}

impl StaticCredentialProvider {
    /// Create a provider around fixed credentials.
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentialProvider {
    async fn credentials(&self) -> Result<Credentials> {
        Ok(self.credentials.clone())
    }
}

/// Narrow interface over the managed endpoint service.
///
/// All calls are blocking network operations with implementation-owned
/// timeouts. Create calls fail on occupied names; delete calls fail while a
/// dependent resource still references the target.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Whether a model exists under the name.
    async fn model_exists(&self, name: &str) -> Result<bool>;

    /// Whether an endpoint configuration exists under the name.
    async fn endpoint_config_exists(&self, name: &str) -> Result<bool>;

    /// Whether an endpoint exists under the name.
    async fn endpoint_exists(&self, name: &str) -> Result<bool>;

    /// Create the model resource: image reference plus environment.
    async fn create_model(
        &self,
        spec: &DeploymentSpec,
        context: &DeploymentContext,
    ) -> Result<ResourceHandle>;

    /// Create the endpoint configuration referencing the spec's model.
    async fn create_endpoint_config(&self, spec: &DeploymentSpec) -> Result<ResourceHandle>;

    /// Create the endpoint referencing the spec's configuration, or update
    /// it in place when one already exists under the name.
    async fn create_or_update_endpoint(&self, spec: &DeploymentSpec) -> Result<ResourceHandle>;

    /// Delete a resource by handle.
    async fn delete_resource(&self, handle: &ResourceHandle) -> Result<()>;

    /// Look up the handle of an existing named resource.
    async fn resource_handle(
        &self,
        kind: ResourceKind,
        name: &str,
    ) -> Result<Option<ResourceHandle>>;

    /// Whether the existing named resource matches the spec's configuration.
    ///
    /// Used by the reuse policy to distinguish a reusable resource from a
    /// name collision that must surface as a conflict.
    async fn resource_matches(
        &self,
        kind: ResourceKind,
        spec: &DeploymentSpec,
    ) -> Result<bool>;

    /// Observe the endpoint's state and last status reason.
    async fn endpoint_state(&self, name: &str) -> Result<EndpointStatus>;
}
