//! Access control orchestration
//!
//! Composes keyword resolution, attribute resolution and evaluation into the
//! operations used when authorizing a request.
//!
//! ```text
//! Evaluator ─→ keyword mutator ─→ attribute mutator ─→ evaluate(granted)
//!               (users:self)       (datasources:name:x)
//! ```

use async_trait::async_trait;
use std::time::Instant;
use tracing::{debug, warn};

use crate::config::ResolutionConfig;
use crate::context::Context;
use crate::error::Result;
use crate::evaluator::{Evaluator, ScopeMutator};
use crate::resolvers::{ScopeAttributeMutator, ScopeResolvers};
use crate::types::{GrantedPermissions, OrgId, SignedInUser};

/// Resolves and evaluates permission requirements for signed-in users
///
/// Cheap to clone; clones share the resolver registry.
#[derive(Clone)]
pub struct AccessControl {
    resolvers: ScopeResolvers,
}

impl AccessControl {
    /// Create an access control service over a resolver registry
    pub fn new(resolvers: ScopeResolvers) -> Self {
        Self { resolvers }
    }

    /// Create a service with an empty registry
    pub fn with_config(config: ResolutionConfig) -> Self {
        Self::new(ScopeResolvers::with_config(config))
    }

    /// The resolver registry, for registering attribute resolvers
    pub fn resolvers(&self) -> &ScopeResolvers {
        &self.resolvers
    }

    /// Configuration in effect
    pub fn config(&self) -> &ResolutionConfig {
        self.resolvers.config()
    }

    /// Substitute keyword scopes (`users:self`) for `user`
    pub async fn resolve_keywords(
        &self,
        ctx: &Context,
        user: &SignedInUser,
        evaluator: &Evaluator,
    ) -> Result<Evaluator> {
        let mutator = self.resolvers.get_scope_keyword_mutator(user);
        evaluator.mutate_scopes(ctx, &mutator).await
    }

    /// Translate attribute scopes into id scopes within `org_id`
    ///
    /// Fails with [`AuthzError::ResolverNotFound`](crate::AuthzError::ResolverNotFound)
    /// if any scoped leaf has no registered resolver.
    pub async fn resolve_attributes(
        &self,
        ctx: &Context,
        org_id: OrgId,
        evaluator: &Evaluator,
    ) -> Result<Evaluator> {
        let mutator = self.resolvers.get_scope_attribute_mutator(org_id);
        let resolved = evaluator.mutate_scopes(ctx, &mutator).await;

        let stats = mutator.stats();
        debug!(
            "Attribute resolution pass: org={}, hits={}, misses={}, ok={}",
            org_id,
            stats.hits,
            stats.misses,
            resolved.is_ok()
        );

        resolved
    }

    /// Check a resolved evaluator against granted permissions
    pub fn evaluate(&self, evaluator: &Evaluator, granted: &GrantedPermissions) -> bool {
        evaluator.evaluate(granted)
    }

    /// Resolve keyword and attribute scopes in `evaluator` for `user`
    ///
    /// # Pipeline
    ///
    /// 1. Substitute keyword scopes
    /// 2. Translate attribute scopes, if enabled. With
    ///    `fallback_on_missing_resolver` set, a leaf whose scope has no
    ///    resolver keeps its scope as already canonical while the other
    ///    leaves are still resolved
    ///
    /// Any other resolution error is returned.
    pub async fn resolve(
        &self,
        ctx: &Context,
        user: &SignedInUser,
        evaluator: &Evaluator,
    ) -> Result<Evaluator> {
        let resolved = self.resolve_keywords(ctx, user, evaluator).await?;

        if !self.config().attribute_resolution || !resolved.has_scopes() {
            return Ok(resolved);
        }

        if !self.config().fallback_on_missing_resolver {
            return self.resolve_attributes(ctx, user.org_id, &resolved).await;
        }

        let mutator = CanonicalFallback {
            inner: self.resolvers.get_scope_attribute_mutator(user.org_id),
        };
        let attributes_resolved = resolved.mutate_scopes(ctx, &mutator).await;

        let stats = mutator.inner.stats();
        debug!(
            "Attribute resolution pass: org={}, hits={}, misses={}, ok={}",
            user.org_id,
            stats.hits,
            stats.misses,
            attributes_resolved.is_ok()
        );

        attributes_resolved
    }

    /// Resolve `evaluator` for `user` and check it against `granted`
    ///
    /// Resolution follows [`resolve`](Self::resolve). Errors are returned;
    /// they never grant access.
    pub async fn authorize(
        &self,
        ctx: &Context,
        user: &SignedInUser,
        granted: &GrantedPermissions,
        evaluator: &Evaluator,
    ) -> Result<bool> {
        let start = Instant::now();

        let resolved = self.resolve(ctx, user, evaluator).await?;
        let allowed = resolved.evaluate(granted);

        debug!(
            "Access check: user={}, org={}, evaluator={}, allowed={}, elapsed={:?}",
            user.user_id,
            user.org_id,
            resolved,
            allowed,
            start.elapsed()
        );

        Ok(allowed)
    }

    /// Like [`authorize`](Self::authorize), denying on any resolution error
    pub async fn has_access(
        &self,
        ctx: &Context,
        user: &SignedInUser,
        granted: &GrantedPermissions,
        evaluator: &Evaluator,
    ) -> bool {
        match self.authorize(ctx, user, granted, evaluator).await {
            Ok(allowed) => allowed,
            Err(e) => {
                warn!(
                    "Denying access for user={}, org={}: {} (evaluator={})",
                    user.user_id, user.org_id, e, evaluator
                );
                false
            }
        }
    }
}

/// Attribute mutator that keeps scopes no resolver owns
struct CanonicalFallback {
    inner: ScopeAttributeMutator,
}

#[async_trait]
impl ScopeMutator for CanonicalFallback {
    async fn mutate(&self, ctx: &Context, scope: &str) -> Result<Vec<String>> {
        match self.inner.resolve(ctx, scope).await {
            Err(e) if e.is_resolver_not_found() => {
                debug!("{}; keeping scope as canonical", e);
                Ok(vec![scope.to_string()])
            }
            resolved => resolved,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuthzError;
    use crate::resolvers::{AttributeScopeResolver, Entity, InMemoryEntityStore};
    use crate::types::Permission;
    use std::sync::Arc;

    fn service(config: ResolutionConfig) -> AccessControl {
        let store = InMemoryEntityStore::new();
        store.insert(3, "datasources", Entity::new("1").with_attribute("name", "prod"));
        store.insert(3, "datasources", Entity::new("2").with_attribute("name", "staging"));

        let service = AccessControl::with_config(config);
        service
            .resolvers()
            .register_attribute_resolver(AttributeScopeResolver::new(
                "datasources",
                "name",
                Arc::new(store),
            ))
            .unwrap();
        service
    }

    fn user() -> SignedInUser {
        SignedInUser::new(2, 3, "testUser")
    }

    fn granted(permissions: &[(&str, &str)]) -> GrantedPermissions {
        permissions
            .iter()
            .map(|(action, scope)| Permission::new(*action, *scope))
            .collect()
    }

    #[tokio::test]
    async fn test_authorize_resolves_keywords_and_attributes() {
        let service = service(ResolutionConfig::default());
        let grants = granted(&[("users:read", "users:id:2"), ("datasources:query", "datasources:id:1")]);

        let required = Evaluator::all(vec![
            Evaluator::scoped("users:read", "users:self"),
            Evaluator::scoped("datasources:query", "datasources:name:prod"),
        ]);

        let allowed = service
            .authorize(&Context::background(), &user(), &grants, &required)
            .await
            .unwrap();
        assert!(allowed);
    }

    #[tokio::test]
    async fn test_resolve_keeps_unowned_leaves_and_resolves_the_rest() {
        let service = service(ResolutionConfig::default());
        let required = Evaluator::any(vec![
            Evaluator::scoped("users:read", "users:self"),
            Evaluator::all(vec![
                Evaluator::scoped("datasources:query", "datasources:name:staging"),
                Evaluator::scoped("dashboards:read", "dashboards:uid:abc"),
            ]),
        ]);

        let resolved = service
            .resolve(&Context::background(), &user(), &required)
            .await
            .unwrap();
        assert_eq!(
            resolved,
            Evaluator::any(vec![
                Evaluator::scoped("users:read", "users:id:2"),
                Evaluator::all(vec![
                    Evaluator::scoped("datasources:query", "datasources:id:2"),
                    Evaluator::scoped("dashboards:read", "dashboards:uid:abc"),
                ]),
            ])
        );
    }

    #[tokio::test]
    async fn test_resolve_fallback_still_reports_lookup_errors() {
        let service = service(ResolutionConfig::default());
        let required = Evaluator::all(vec![
            Evaluator::scoped("users:read", "users:self"),
            Evaluator::scoped("datasources:query", "datasources:name:missing"),
        ]);

        let err = service
            .resolve(&Context::background(), &user(), &required)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_authorize_falls_back_for_canonical_scopes() {
        let service = service(ResolutionConfig::default());
        let grants = granted(&[("users:read", "users:id:2")]);
        let required = Evaluator::scoped("users:read", "users:self");

        // users:id:2 has no attribute resolver; it is already canonical
        assert!(service
            .authorize(&Context::background(), &user(), &grants, &required)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_authorize_strict_without_fallback() {
        let service = service(ResolutionConfig {
            fallback_on_missing_resolver: false,
            ..Default::default()
        });
        let grants = granted(&[("users:read", "users:id:2")]);
        let required = Evaluator::scoped("users:read", "users:self");

        let err = service
            .authorize(&Context::background(), &user(), &grants, &required)
            .await
            .unwrap_err();
        assert_eq!(err, AuthzError::resolver_not_found("users:id:2"));
        assert!(!service.has_access(&Context::background(), &user(), &grants, &required).await);
    }

    #[tokio::test]
    async fn test_attribute_resolution_disabled() {
        let service = service(ResolutionConfig {
            attribute_resolution: false,
            ..Default::default()
        });
        let grants = granted(&[("datasources:query", "datasources:id:1")]);
        let required = Evaluator::scoped("datasources:query", "datasources:name:prod");

        assert!(!service
            .authorize(&Context::background(), &user(), &grants, &required)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_lookup_failure_denies() {
        let service = service(ResolutionConfig::default());
        let grants = granted(&[("datasources:query", "*")]);
        let required = Evaluator::scoped("datasources:query", "datasources:name:unknown");

        let err = service
            .authorize(&Context::background(), &user(), &grants, &required)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(!service.has_access(&Context::background(), &user(), &grants, &required).await);
    }

    #[tokio::test]
    async fn test_unscoped_requirement_skips_resolution() {
        let service = service(ResolutionConfig {
            fallback_on_missing_resolver: false,
            ..Default::default()
        });
        let grants = granted(&[("users:read", "")]);
        let required = Evaluator::permission("users:read");

        assert!(service
            .authorize(&Context::background(), &user(), &grants, &required)
            .await
            .unwrap());
    }
}
