//! Slipway - deployment orchestration for containerized inference endpoints.
//!
//! Slipway takes a generic OpenAI-style inference server and makes it
//! deployable on a managed hosting platform, in two parts:
//!
//! - **Contract adapter** ([`adapter`]): rewrites the server's route table to
//!   the platform's hosting contract (`/ping` plus `/invocations*`), serves
//!   it through a thin forwarding gateway, and gates startup on a bounded
//!   readiness probe.
//! - **Lifecycle manager** ([`lifecycle`]): idempotently reconciles the three
//!   named control-plane resources a deployment owns (model, endpoint
//!   configuration, endpoint), tearing down in reverse dependency order,
//!   provisioning in forward order, and polling the endpoint to `InService`
//!   under a bounded deadline.
//!
//! The control plane itself is behind the [`controlplane::ControlPlane`]
//! trait; [`controlplane::memory::MemoryControlPlane`] is the strict
//! in-process implementation used by tests and dry runs.

pub mod adapter;
pub mod cli;
pub mod config;
pub mod controlplane;
pub mod error;
pub mod lifecycle;
pub mod resilience;
pub mod types;

pub use error::{Result, SlipwayError};
