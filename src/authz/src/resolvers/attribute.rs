//! Attribute scope resolution with a per-pass cache
//!
//! A [`ScopeAttributeMutator`] is handed out by the registry for one request
//! and one organization. It remembers every scope it resolved, so a scope
//! repeated across the leaves of a tree costs a single resolver call.

use async_trait::async_trait;
use dashmap::DashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

use super::ScopeResolvers;
use crate::context::Context;
use crate::error::{AuthzError, Result};
use crate::evaluator::ScopeMutator;
use crate::scope;
use crate::types::OrgId;

/// Translates an attribute scope into canonical scopes
///
/// Implementations may perform I/O and may return zero, one or many scopes.
/// Errors are handed back to the caller untouched.
#[async_trait]
pub trait ScopeAttributeResolver: Send + Sync {
    /// Resolve `scope` within `org_id`
    async fn resolve(&self, ctx: &Context, org_id: OrgId, scope: &str) -> Result<Vec<String>>;
}

/// Adapter turning an async closure into a [`ScopeAttributeResolver`]
pub struct FnResolver<F> {
    f: F,
}

/// Wrap `f` as a resolver
///
/// The closure receives an owned copy of the context, the organization and
/// the scope being resolved.
pub fn resolver_fn<F, Fut>(f: F) -> FnResolver<F>
where
    F: Fn(Context, OrgId, String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Vec<String>>> + Send + 'static,
{
    FnResolver { f }
}

#[async_trait]
impl<F, Fut> ScopeAttributeResolver for FnResolver<F>
where
    F: Fn(Context, OrgId, String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Vec<String>>> + Send + 'static,
{
    async fn resolve(&self, ctx: &Context, org_id: OrgId, scope: &str) -> Result<Vec<String>> {
        (self.f)(ctx.clone(), org_id, scope.to_string()).await
    }
}

/// Statistics about one resolution pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionStats {
    /// Scopes answered from the pass cache
    pub hits: usize,
    /// Scopes that needed a resolver lookup
    pub misses: usize,
    /// Distinct scopes cached
    pub entries: usize,
}

impl ResolutionStats {
    /// Calculates the cache hit rate
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Attribute mutator for one resolution pass
///
/// Bound to a single organization. The cache lives and dies with the mutator.
pub struct ScopeAttributeMutator {
    resolvers: ScopeResolvers,
    org_id: OrgId,
    cache: DashMap<(OrgId, String), Vec<String>>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl ScopeAttributeMutator {
    pub(crate) fn new(resolvers: ScopeResolvers, org_id: OrgId) -> Self {
        Self {
            resolvers,
            org_id,
            cache: DashMap::new(),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }

    /// Organization this pass resolves for
    pub fn org_id(&self) -> OrgId {
        self.org_id
    }

    /// Resolve an attribute scope
    ///
    /// # Pipeline
    ///
    /// 1. Return the cached result for `(org_id, scope)` if present
    /// 2. Find the resolver owning the scope's prefix, or fail with
    ///    [`AuthzError::ResolverNotFound`]
    /// 3. Call it under the request context and the configured timeout
    /// 4. Cache successful results; errors are returned unchanged and not cached
    pub async fn resolve(&self, ctx: &Context, scope: &str) -> Result<Vec<String>> {
        let key = (self.org_id, scope.to_string());

        if let Some(cached) = self.cache.get(&key).map(|entry| entry.value().clone()) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!("Scope cache hit: org={}, scope={}", self.org_id, scope);
            return Ok(cached);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let Some((prefix, resolver)) = self.resolvers.find_resolver(scope) else {
            debug!(
                "No scope attribute resolver for prefix={}, scope={}",
                scope::scope_prefix(scope),
                scope
            );
            return Err(AuthzError::resolver_not_found(scope));
        };

        let config = self.resolvers.config();
        let call_ctx = match config.resolver_timeout() {
            Some(timeout) => ctx.with_timeout(timeout),
            None => ctx.clone(),
        };

        let resolved = call_ctx
            .run(resolver.resolve(&call_ctx, self.org_id, scope))
            .await?;

        if let Some(limit) = config.max_fan_out {
            if resolved.len() > limit {
                return Err(AuthzError::FanOutExceeded {
                    scope: scope.to_string(),
                    count: resolved.len(),
                    limit,
                });
            }
        }

        debug!(
            "Resolved scope: org={}, prefix={}, scope={}, resolved={:?}",
            self.org_id, prefix, scope, resolved
        );

        self.cache.insert(key, resolved.clone());
        Ok(resolved)
    }

    /// Cache statistics for this pass
    pub fn stats(&self) -> ResolutionStats {
        ResolutionStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.cache.len(),
        }
    }
}

#[async_trait]
impl ScopeMutator for ScopeAttributeMutator {
    async fn mutate(&self, ctx: &Context, scope: &str) -> Result<Vec<String>> {
        self.resolve(ctx, scope).await
    }
}
