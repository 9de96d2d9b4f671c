//! Contract adapter: conform an inference server's HTTP surface to the
//! two-endpoint hosting contract a managed serving platform requires.
//!
//! The adapter is a declarative route-table transformation applied once at
//! bootstrap, never at runtime. The wrapped server keeps its own OpenAI-style
//! paths; the adapter exposes the platform's probe and invocation paths and
//! forwards to the originals:
//!
//! - `/v1/models` → `/ping` (liveness/readiness probe)
//! - `/v1/chat/completions` → `/invocations` (primary inference path)
//! - `/v1/completions` → `/invocations/completions` (secondary inference path)

pub mod gateway;
pub mod probe;

use serde::{Deserialize, Serialize};

/// HTTP method of a route registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RouteMethod {
    /// GET request.
    Get,
    /// POST request.
    Post,
}

/// A single route registration.
///
/// `exposed_path` is what the container serves; `upstream_path` is where the
/// wrapped inference server answers. Before the mapping is applied the two
/// are identical.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    /// HTTP method.
    pub method: RouteMethod,
    /// Path exposed by the container.
    pub exposed_path: String,
    /// Path on the wrapped inference server.
    pub upstream_path: String,
}

impl Route {
    /// Register a route where the exposed path equals the upstream path.
    pub fn new(method: RouteMethod, path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            method,
            exposed_path: path.clone(),
            upstream_path: path,
        }
    }
}

/// The server's route registrations, rewritten once at bootstrap.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    /// Create an empty route table.
    pub fn new() -> Self {
        Self::default()
    }

    /// The OpenAI-style surface a generic inference server exposes.
    pub fn openai_defaults() -> Self {
        let mut table = Self::new();
        table.register(Route::new(RouteMethod::Get, "/v1/models"));
        table.register(Route::new(RouteMethod::Post, "/v1/chat/completions"));
        table.register(Route::new(RouteMethod::Post, "/v1/completions"));
        table
    }

    /// Add a route registration.
    pub fn register(&mut self, route: Route) {
        self.routes.push(route);
    }

    /// All registered routes.
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Look up a route by method and exposed path.
    pub fn find(&self, method: RouteMethod, exposed_path: &str) -> Option<&Route> {
        self.routes
            .iter()
            .find(|r| r.method == method && r.exposed_path == exposed_path)
    }
}

/// Fixed table of (source path → target path) rewrites.
#[derive(Debug, Clone, Copy)]
pub struct RouteMapping {
    entries: &'static [(&'static str, &'static str)],
}

/// The hosting contract: probe path plus the two invocation paths.
pub const HOSTING_CONTRACT: RouteMapping = RouteMapping {
    entries: &[
        ("/v1/models", "/ping"),
        ("/v1/chat/completions", "/invocations"),
        ("/v1/completions", "/invocations/completions"),
    ],
};

impl RouteMapping {
    /// Target path for a source path, if mapped.
    pub fn target(&self, source: &str) -> Option<&'static str> {
        self.entries
            .iter()
            .find(|(from, _)| *from == source)
            .map(|(_, to)| *to)
    }

    /// The (source, target) pairs in this mapping.
    pub fn entries(&self) -> &'static [(&'static str, &'static str)] {
        self.entries
    }
}

/// Rewrite exposed paths in place per the mapping.
///
/// Exact and total over the mapped sources: a route whose exposed path
/// matches a source is rewritten to the target; every other route is left
/// untouched. Applied exactly once at build/bootstrap time.
pub fn apply_route_mapping(table: &mut RouteTable, mapping: &RouteMapping) {
    for route in &mut table.routes {
        if let Some(target) = mapping.target(&route.exposed_path) {
            route.exposed_path = target.to_string();
        }
    }
}

/// The route table a conforming container serves: OpenAI defaults rewritten
/// under the hosting contract.
pub fn hosting_route_table() -> RouteTable {
    let mut table = RouteTable::openai_defaults();
    apply_route_mapping(&mut table, &HOSTING_CONTRACT);
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapping_rewrites_exactly_the_three_paths() {
        let table = hosting_route_table();

        let ping = table.find(RouteMethod::Get, "/ping").unwrap();
        assert_eq!(ping.upstream_path, "/v1/models");

        let invocations = table.find(RouteMethod::Post, "/invocations").unwrap();
        assert_eq!(invocations.upstream_path, "/v1/chat/completions");

        let completions = table
            .find(RouteMethod::Post, "/invocations/completions")
            .unwrap();
        assert_eq!(completions.upstream_path, "/v1/completions");

        assert_eq!(table.routes().len(), 3);
    }

    #[test]
    fn unmapped_routes_are_untouched() {
        let mut table = RouteTable::openai_defaults();
        table.register(Route::new(RouteMethod::Get, "/v1/metrics"));

        apply_route_mapping(&mut table, &HOSTING_CONTRACT);

        let metrics = table.find(RouteMethod::Get, "/v1/metrics").unwrap();
        assert_eq!(metrics.upstream_path, "/v1/metrics");
        assert!(table.find(RouteMethod::Get, "/v1/models").is_none());
    }

    #[test]
    fn mapping_is_not_reapplied_at_runtime() {
        // Applying twice must not produce new rewrites: none of the targets
        // appear as sources in the fixed table.
        let mut table = hosting_route_table();
        let before = table.clone();
        apply_route_mapping(&mut table, &HOSTING_CONTRACT);
        assert_eq!(table, before);
    }

    #[test]
    fn mapping_lookup() {
        assert_eq!(HOSTING_CONTRACT.target("/v1/models"), Some("/ping"));
        assert_eq!(HOSTING_CONTRACT.target("/ping"), None);
        assert_eq!(HOSTING_CONTRACT.entries().len(), 3);
    }
}
