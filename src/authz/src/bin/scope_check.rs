//! # Scope Check
//!
//! Resolves and evaluates a permission requirement described by a JSON
//! scenario file, printing the decision and the resolved evaluator.
//!
//! ## Scenario format
//!
//! ```json
//! {
//!   "user": { "user_id": 2, "org_id": 1, "login": "alice" },
//!   "granted": { "datasources:query": ["datasources:id:7"] },
//!   "evaluator": { "permission": { "action": "datasources:query", "scope": "datasources:name:prod" } },
//!   "resolvers": [ { "resource": "datasources", "attribute": "name" } ],
//!   "entities": [ { "org_id": 1, "resource": "datasources", "id": "7", "attributes": { "name": "prod" } } ]
//! }
//! ```
//!
//! Environment variables:
//! - `SCOPE_CHECK_CONFIG` - Resolution configuration (TOML)
//! - `RUST_LOG` - Log level (default: info)

use anyhow::{Context as _, Result};
use clap::Parser;
use scopekit_authz::{
    AccessControl, AttributeScopeResolver, Context, Entity, Evaluator, GrantedPermissions,
    InMemoryEntityStore, OrgId, ResolutionConfig, ScopeResolvers, SignedInUser,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Scope resolution checker
#[derive(Parser)]
#[command(name = "scope-check")]
#[command(about = "Resolve scopes and evaluate a permission requirement")]
#[command(version)]
struct Cli {
    /// Scenario file (JSON)
    #[arg(short, long)]
    scenario: PathBuf,

    /// Resolution configuration file (TOML)
    #[arg(short, long, env = "SCOPE_CHECK_CONFIG")]
    config: Option<PathBuf>,

    /// Overall deadline for the check, in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Deserialize)]
struct Scenario {
    user: SignedInUser,
    #[serde(default)]
    granted: GrantedPermissions,
    evaluator: Evaluator,
    #[serde(default)]
    resolvers: Vec<ResolverEntry>,
    #[serde(default)]
    entities: Vec<StoredEntity>,
}

#[derive(Debug, Deserialize)]
struct ResolverEntry {
    resource: String,
    attribute: String,
}

#[derive(Debug, Deserialize)]
struct StoredEntity {
    org_id: OrgId,
    resource: String,
    #[serde(flatten)]
    entity: Entity,
}

#[derive(Debug, Serialize)]
struct Outcome {
    allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    resolved: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{},scopekit_authz={}", log_level, log_level).into()),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let config = match &cli.config {
        Some(path) => {
            let config = ResolutionConfig::load(path)?;
            info!("Loaded configuration from {:?}", path);
            config
        }
        None => ResolutionConfig::default(),
    };

    let raw = std::fs::read_to_string(&cli.scenario)
        .with_context(|| format!("failed to read scenario {:?}", cli.scenario))?;
    let scenario: Scenario = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse scenario {:?}", cli.scenario))?;

    let access = build_access_control(config, &scenario)?;
    info!(
        "Registered {} resolver(s): {:?}",
        access.resolvers().resolver_count(),
        access.resolvers().prefixes()
    );

    let ctx = match cli.timeout_ms {
        Some(ms) => Context::background().with_timeout(Duration::from_millis(ms)),
        None => Context::background(),
    };

    let outcome = check(&access, &ctx, &scenario).await;
    println!("{}", serde_json::to_string_pretty(&outcome)?);

    Ok(())
}

fn build_access_control(config: ResolutionConfig, scenario: &Scenario) -> Result<AccessControl> {
    let store = Arc::new(InMemoryEntityStore::new());
    for stored in &scenario.entities {
        store.insert(stored.org_id, stored.resource.clone(), stored.entity.clone());
    }

    let resolvers = ScopeResolvers::with_config(config);
    for entry in &scenario.resolvers {
        resolvers.register_attribute_resolver(AttributeScopeResolver::new(
            entry.resource.clone(),
            entry.attribute.clone(),
            Arc::clone(&store),
        ))?;
    }

    Ok(AccessControl::new(resolvers))
}

async fn check(access: &AccessControl, ctx: &Context, scenario: &Scenario) -> Outcome {
    match access.resolve(ctx, &scenario.user, &scenario.evaluator).await {
        Ok(resolved) => Outcome {
            allowed: access.evaluate(&resolved, &scenario.granted),
            resolved: Some(resolved.to_string()),
            error: None,
        },
        Err(e) => Outcome {
            allowed: false,
            resolved: None,
            error: Some(e.to_string()),
        },
    }
}
