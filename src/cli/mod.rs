//! Command-line interface.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Deployment orchestration for containerized inference endpoints.
#[derive(Parser, Debug)]
#[command(name = "slipway")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to the configuration file (JSON)
    #[arg(short, long, env = "SLIPWAY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level filter (overrides configuration)
    #[arg(long, env = "SLIPWAY_LOG")]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the hosting-contract gateway in front of an upstream server
    Serve {
        /// Address to bind the gateway on
        #[arg(long)]
        bind_addr: Option<String>,

        /// Upstream server base URL
        #[arg(long)]
        upstream: Option<String>,

        /// Skip the upstream readiness probe before serving
        #[arg(long, default_value_t = false)]
        no_wait: bool,
    },

    /// Reconcile a deployment spec against the control plane
    Deploy {
        /// Path to the deployment spec (JSON)
        spec: PathBuf,

        /// Replace policy: "replace" or "reuse"
        #[arg(long)]
        policy: Option<String>,

        /// Run against an in-process control plane instead of a real one
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },

    /// Tear down a deployment's resources
    Teardown {
        /// Path to the deployment spec (JSON)
        spec: PathBuf,

        /// Run against an in-process control plane instead of a real one
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },

    /// Show the current state of an endpoint
    Status {
        /// Endpoint name
        endpoint: String,
    },
}

/// Parse command-line arguments.
pub fn parse_args() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_serve_with_overrides() {
        let cli = Cli::parse_from([
            "slipway",
            "serve",
            "--bind-addr",
            "127.0.0.1:9000",
            "--upstream",
            "http://127.0.0.1:8000",
        ]);
        match cli.command {
            Commands::Serve {
                bind_addr,
                upstream,
                no_wait,
            } => {
                assert_eq!(bind_addr.as_deref(), Some("127.0.0.1:9000"));
                assert_eq!(upstream.as_deref(), Some("http://127.0.0.1:8000"));
                assert!(!no_wait);
            }
            other => panic!("expected serve, got {:?}", other),
        }
    }

    #[test]
    fn parses_deploy_dry_run() {
        let cli = Cli::parse_from(["slipway", "deploy", "spec.json", "--dry-run"]);
        match cli.command {
            Commands::Deploy { spec, dry_run, .. } => {
                assert_eq!(spec, PathBuf::from("spec.json"));
                assert!(dry_run);
            }
            other => panic!("expected deploy, got {:?}", other),
        }
    }
}
