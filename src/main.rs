//! Slipway binary entry point.

use anyhow::Context;
use slipway::adapter::gateway::run_gateway;
use slipway::adapter::probe::ReadinessProbe;
use slipway::adapter::{hosting_route_table, RouteMethod};
use slipway::cli::{parse_args, Commands};
use slipway::config::SlipwayConfig;
use slipway::controlplane::memory::MemoryControlPlane;
use slipway::lifecycle::LifecycleManager;
use slipway::types::{DeploymentContext, DeploymentSpec};
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = parse_args();
    let config_from_file = cli.config.is_some();

    let mut config = match &cli.config {
        Some(path) => SlipwayConfig::from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => SlipwayConfig::default(),
    };
    if let Some(level) = &cli.log_level {
        config.observability.log_level = level.clone();
    }

    init_tracing(&config.observability.log_level);

    match cli.command {
        Commands::Serve {
            bind_addr,
            upstream,
            no_wait,
        } => {
            if let Some(addr) = bind_addr {
                config.gateway.bind_addr = addr.parse().context("invalid --bind-addr")?;
            }
            if let Some(upstream) = upstream {
                config.gateway.upstream_addr = upstream;
            }
            config.validate()?;

            let table = hosting_route_table();

            if !no_wait {
                // The gateway's probe path forwards to an upstream path;
                // probe that upstream path directly before serving.
                let upstream_path = table
                    .find(RouteMethod::Get, &config.probe.path)
                    .map(|r| r.upstream_path.clone())
                    .unwrap_or_else(|| config.probe.path.clone());
                let probe = ReadinessProbe::new(
                    format!(
                        "{}{}",
                        config.gateway.upstream_addr.trim_end_matches('/'),
                        upstream_path
                    ),
                    config.probe.interval,
                    config.probe.max_attempts,
                );
                let attempts = probe.await_ready().await?;
                info!(attempts = attempts, "Upstream server is ready");
            }

            run_gateway(&config.gateway, table).await?;
        }

        Commands::Deploy {
            spec,
            policy,
            dry_run,
        } => {
            let spec = load_spec(&spec)?;
            if let Some(policy) = &policy {
                config.lifecycle.replace_policy = policy
                    .parse()
                    .map_err(|e: String| anyhow::anyhow!(e))
                    .context("invalid --policy")?;
            }
            if !dry_run {
                anyhow::bail!(
                    "no control-plane backend configured; re-run with --dry-run to \
                     reconcile against the in-process control plane"
                );
            }

            // Dry runs use short poll intervals unless a config file pinned
            // its own.
            if !config_from_file {
                let policy = config.lifecycle.replace_policy;
                config.lifecycle = SlipwayConfig::development().lifecycle;
                config.lifecycle.replace_policy = policy;
            }

            let plane = Arc::new(MemoryControlPlane::new());
            let manager = LifecycleManager::new(
                plane,
                DeploymentContext::default(),
                config.lifecycle.clone(),
            );
            let status = manager.reconcile(&spec).await?;
            info!(
                endpoint = %spec.endpoint_name,
                state = %status.state,
                "Deployment reconciled"
            );
            println!("{}", serde_json::to_string_pretty(&status)?);
        }

        Commands::Teardown { spec, dry_run } => {
            let spec = load_spec(&spec)?;
            if !dry_run {
                anyhow::bail!(
                    "no control-plane backend configured; re-run with --dry-run to \
                     tear down against the in-process control plane"
                );
            }
            let plane = Arc::new(MemoryControlPlane::new());
            let manager = LifecycleManager::new(
                plane,
                DeploymentContext::default(),
                config.lifecycle.clone(),
            );
            manager.teardown(&spec).await?;
            info!(endpoint = %spec.endpoint_name, "Teardown complete");
        }

        Commands::Status { endpoint } => {
            anyhow::bail!(
                "no control-plane backend configured; endpoint '{}' cannot be queried",
                endpoint
            );
        }
    }

    Ok(())
}

fn load_spec(path: &Path) -> anyhow::Result<DeploymentSpec> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading deployment spec {}", path.display()))?;
    let spec: DeploymentSpec = serde_json::from_str(&content)
        .with_context(|| format!("parsing deployment spec {}", path.display()))?;
    Ok(spec)
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
