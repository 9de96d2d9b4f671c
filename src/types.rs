//! Core data model for deployment orchestration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Immutable descriptor of desired deployment state.
///
/// Created by the operator before each deployment invocation and never
/// mutated. The `model_name` and `endpoint_name` fields are the unique keys
/// the lifecycle manager reconciles against; everything else is opaque
/// pass-through configuration for the control plane and the container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentSpec {
    /// Unique key for the model resource.
    pub model_name: String,
    /// Unique key for the endpoint (and its configuration).
    pub endpoint_name: String,
    /// Container image reference (opaque, e.g. a registry URI).
    pub image_reference: String,
    /// Environment passed verbatim to the running container.
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
    /// Instance type the endpoint configuration binds (opaque).
    pub instance_type: String,
}

impl DeploymentSpec {
    /// Create a new deployment spec with an empty environment.
    pub fn new(
        model_name: impl Into<String>,
        endpoint_name: impl Into<String>,
        image_reference: impl Into<String>,
        instance_type: impl Into<String>,
    ) -> Self {
        Self {
            model_name: model_name.into(),
            endpoint_name: endpoint_name.into(),
            image_reference: image_reference.into(),
            environment: BTreeMap::new(),
            instance_type: instance_type.into(),
        }
    }

    /// Add an environment variable.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }

    /// Key identifying the deployment for serialization of concurrent runs.
    pub fn lock_key(&self) -> String {
        format!("{}/{}", self.model_name, self.endpoint_name)
    }
}

/// Kinds of control-plane resources the lifecycle manager owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Named descriptor binding an image and runtime environment.
    Model,
    /// Immutable descriptor binding a model and instance type.
    EndpointConfig,
    /// Externally reachable serving resource.
    Endpoint,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Model => write!(f, "model"),
            ResourceKind::EndpointConfig => write!(f, "endpoint-config"),
            ResourceKind::Endpoint => write!(f, "endpoint"),
        }
    }
}

/// Opaque handle to a created control-plane resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceHandle {
    /// Control-plane assigned identifier.
    pub id: String,
    /// Resource kind.
    pub kind: ResourceKind,
    /// Resource name.
    pub name: String,
}

impl ResourceHandle {
    /// Create a handle with a fresh identifier.
    pub fn new(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            name: name.into(),
        }
    }
}

/// Transient result of the three independent existence checks.
///
/// Recomputed on every reconciliation pass, never persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceExistence {
    /// Model exists under the spec's `model_name`.
    pub model: bool,
    /// Endpoint configuration exists under the spec's `endpoint_name`.
    pub endpoint_config: bool,
    /// Endpoint exists under the spec's `endpoint_name`.
    pub endpoint: bool,
}

impl ResourceExistence {
    /// True if any of the three resources exists.
    pub fn any(&self) -> bool {
        self.model || self.endpoint_config || self.endpoint
    }

    /// True if all three resources exist.
    pub fn all(&self) -> bool {
        self.model && self.endpoint_config && self.endpoint
    }
}

/// Endpoint lifecycle state, owned exclusively by the control plane.
///
/// The lifecycle manager only observes this via polling; state transitions
/// are side effects of create/update/delete calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointState {
    /// Endpoint is being created.
    Creating,
    /// Endpoint is serving traffic.
    InService,
    /// Endpoint reached a terminal failure.
    Failed,
    /// Endpoint is applying an updated configuration.
    Updating,
    /// Endpoint is being deleted.
    Deleting,
    /// No endpoint exists under the name.
    NotFound,
}

impl EndpointState {
    /// True if the endpoint can serve invocation traffic.
    pub fn is_servable(&self) -> bool {
        matches!(self, EndpointState::InService)
    }

    /// True if polling can no longer make progress.
    pub fn is_terminal(&self) -> bool {
        matches!(self, EndpointState::InService | EndpointState::Failed)
    }
}

impl fmt::Display for EndpointState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndpointState::Creating => write!(f, "Creating"),
            EndpointState::InService => write!(f, "InService"),
            EndpointState::Failed => write!(f, "Failed"),
            EndpointState::Updating => write!(f, "Updating"),
            EndpointState::Deleting => write!(f, "Deleting"),
            EndpointState::NotFound => write!(f, "NotFound"),
        }
    }
}

/// Observed endpoint status: state plus the control plane's last reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointStatus {
    /// Observed state.
    pub state: EndpointState,
    /// Last status reason reported by the control plane, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// When the observation was made.
    pub observed_at: String,
}

impl EndpointStatus {
    /// Create a status observation stamped with the current time.
    pub fn observed(state: EndpointState, reason: Option<String>) -> Self {
        Self {
            state,
            reason,
            observed_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Explicit deployment context, replacing ambient process-wide globals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentContext {
    /// Account owning the control-plane resources.
    pub account_id: String,
    /// Region the endpoint is provisioned in.
    pub region: String,
    /// Artifact bucket for model data, if the control plane needs one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_bucket: Option<String>,
}

impl DeploymentContext {
    /// Create a context for an account and region.
    pub fn new(account_id: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            region: region.into(),
            artifact_bucket: None,
        }
    }

    /// Set the artifact bucket.
    pub fn with_artifact_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.artifact_bucket = Some(bucket.into());
        self
    }
}

/// Policy applied when named resources already exist at reconcile time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplacePolicy {
    /// Tear down whatever exists and recreate from scratch (the default).
    /// Causes downtime on re-deploys but never leaves stale configuration.
    #[default]
    Replace,
    /// Keep existing resources that match the spec exactly; report a
    /// conflict when a name is held by an incompatible configuration.
    Reuse,
}

impl std::str::FromStr for ReplacePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "replace" => Ok(ReplacePolicy::Replace),
            "reuse" => Ok(ReplacePolicy::Reuse),
            other => Err(format!("unknown replace policy '{}'", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_builder_and_lock_key() {
        let spec = DeploymentSpec::new("m1", "e1", "img:latest", "ml.g5.xlarge")
            .with_env("KEY", "v")
            .with_env("MODEL_ID", "qwen-7b");

        assert_eq!(spec.lock_key(), "m1/e1");
        assert_eq!(spec.environment.get("KEY").map(String::as_str), Some("v"));
        assert_eq!(spec.environment.len(), 2);
    }

    #[test]
    fn spec_round_trips_through_json() {
        let spec = DeploymentSpec::new("m1", "e1", "img:latest", "ml.g5.xlarge")
            .with_env("KEY", "v");
        let json = serde_json::to_string(&spec).unwrap();
        let back: DeploymentSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(spec, back);
    }

    #[test]
    fn existence_helpers() {
        let none = ResourceExistence::default();
        assert!(!none.any());
        assert!(!none.all());

        let partial = ResourceExistence {
            model: true,
            ..Default::default()
        };
        assert!(partial.any());
        assert!(!partial.all());

        let full = ResourceExistence {
            model: true,
            endpoint_config: true,
            endpoint: true,
        };
        assert!(full.all());
    }

    #[test]
    fn endpoint_state_predicates() {
        assert!(EndpointState::InService.is_servable());
        assert!(EndpointState::InService.is_terminal());
        assert!(EndpointState::Failed.is_terminal());
        assert!(!EndpointState::Creating.is_terminal());
        assert!(!EndpointState::Deleting.is_servable());
    }

    #[test]
    fn replace_policy_parses() {
        assert_eq!("replace".parse::<ReplacePolicy>(), Ok(ReplacePolicy::Replace));
        assert_eq!("reuse".parse::<ReplacePolicy>(), Ok(ReplacePolicy::Reuse));
        assert!("canary".parse::<ReplacePolicy>().is_err());
    }

    #[test]
    fn resource_handles_are_unique() {
        let a = ResourceHandle::new(ResourceKind::Model, "m1");
        let b = ResourceHandle::new(ResourceKind::Model, "m1");
        assert_ne!(a.id, b.id);
        assert_eq!(a.kind, ResourceKind::Model);
    }
}
