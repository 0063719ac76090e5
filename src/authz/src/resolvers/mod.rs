//! Scope resolvers
//!
//! [`ScopeResolvers`] is the registry consulted while rewriting an
//! [`Evaluator`](crate::Evaluator) before it is checked:
//!
//! - **Keyword mutators** substitute `users:self` / `orgs:current` for the
//!   signed-in user
//! - **Attribute mutators** translate scopes such as `datasources:name:prod`
//!   into id scopes through resolvers registered by prefix
//!
//! The registry is cheap to clone and safe to share between requests. Every
//! attribute mutator it hands out owns a fresh cache, so resolved scopes
//! never leak from one request or organization to another.
//!
//! # Example
//!
//! ```rust
//! use scopekit_authz::{resolver_fn, scope, AuthzError, Context, Evaluator, ScopeResolvers};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let resolvers = ScopeResolvers::new();
//! resolvers.add_scope_attribute_resolver(
//!     "datasources:name:",
//!     resolver_fn(|_ctx, _org_id, _scope| async move {
//!         Ok::<_, AuthzError>(vec![scope("datasources", "id", "1")])
//!     }),
//! )?;
//!
//! let mutator = resolvers.get_scope_attribute_mutator(1);
//! let resolved = Evaluator::scoped("datasources:read", "datasources:name:testds")
//!     .mutate_scopes(&Context::background(), &mutator)
//!     .await?;
//!
//! assert_eq!(resolved, Evaluator::scoped("datasources:read", "datasources:id:1"));
//! # Ok(())
//! # }
//! ```

pub mod attribute;
pub mod keyword;
pub mod store;

pub use attribute::{
    resolver_fn, FnResolver, ResolutionStats, ScopeAttributeMutator, ScopeAttributeResolver,
};
pub use keyword::ScopeKeywordMutator;
pub use store::{AttributeQuery, AttributeScopeResolver, Entity, EntityStore, InMemoryEntityStore};

use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;

use crate::config::{PrefixPrecedence, ResolutionConfig};
use crate::error::{AuthzError, Result};
use crate::types::{OrgId, SignedInUser};

/// A resolver registered for a literal scope prefix
struct Registration {
    prefix: String,
    resolver: Arc<dyn ScopeAttributeResolver>,
}

/// Prefix-keyed registry of scope attribute resolvers
///
/// # Thread Safety
///
/// Registrations sit behind an `Arc<RwLock<..>>`. Lookups take the read lock
/// only long enough to clone the matching resolver, never across an await.
#[derive(Clone)]
pub struct ScopeResolvers {
    registrations: Arc<RwLock<Vec<Registration>>>,
    config: ResolutionConfig,
}

impl ScopeResolvers {
    /// Create an empty registry with default configuration
    pub fn new() -> Self {
        Self::with_config(ResolutionConfig::default())
    }

    /// Create an empty registry
    pub fn with_config(config: ResolutionConfig) -> Self {
        Self {
            registrations: Arc::new(RwLock::new(Vec::new())),
            config,
        }
    }

    /// Registry configuration
    pub fn config(&self) -> &ResolutionConfig {
        &self.config
    }

    /// Register `resolver` for every scope starting with `prefix`
    ///
    /// Registering a prefix again replaces the earlier resolver and keeps its
    /// position in the table.
    pub fn add_scope_attribute_resolver<R>(&self, prefix: impl Into<String>, resolver: R) -> Result<()>
    where
        R: ScopeAttributeResolver + 'static,
    {
        self.add_shared_resolver(prefix, Arc::new(resolver))
    }

    /// Register an already shared resolver
    pub fn add_shared_resolver(
        &self,
        prefix: impl Into<String>,
        resolver: Arc<dyn ScopeAttributeResolver>,
    ) -> Result<()> {
        let prefix = prefix.into();
        if prefix.is_empty() {
            return Err(AuthzError::invalid_scope(
                prefix,
                "resolver prefix cannot be empty",
            ));
        }

        let mut registrations = self.registrations.write();
        match registrations.iter_mut().find(|r| r.prefix == prefix) {
            Some(existing) => {
                debug!("Replacing scope attribute resolver for prefix '{}'", prefix);
                existing.resolver = resolver;
            }
            None => {
                debug!("Registered scope attribute resolver for prefix '{}'", prefix);
                registrations.push(Registration { prefix, resolver });
            }
        }

        Ok(())
    }

    /// Register a datastore-backed resolver under its own prefix
    pub fn register_attribute_resolver<S>(&self, resolver: AttributeScopeResolver<S>) -> Result<()>
    where
        S: EntityStore + 'static,
    {
        let prefix = resolver.prefix().to_string();
        self.add_scope_attribute_resolver(prefix, resolver)
    }

    /// Finds the resolver owning `scope`, with the prefix it was registered under
    pub fn find_resolver(&self, scope: &str) -> Option<(String, Arc<dyn ScopeAttributeResolver>)> {
        let registrations = self.registrations.read();
        let mut candidates = registrations
            .iter()
            .filter(|r| scope.starts_with(r.prefix.as_str()));

        let owner = match self.config.prefix_precedence {
            PrefixPrecedence::FirstRegistered => candidates.next(),
            PrefixPrecedence::LongestMatch => candidates.fold(None, |best: Option<&Registration>, r| {
                match best {
                    Some(b) if b.prefix.len() >= r.prefix.len() => Some(b),
                    _ => Some(r),
                }
            }),
        };

        owner.map(|r| (r.prefix.clone(), Arc::clone(&r.resolver)))
    }

    /// Keyword mutator for `user`
    pub fn get_scope_keyword_mutator(&self, user: &SignedInUser) -> ScopeKeywordMutator {
        ScopeKeywordMutator::new(user)
    }

    /// Attribute mutator for one resolution pass in `org_id`
    ///
    /// The returned mutator carries its own cache; create one per request.
    pub fn get_scope_attribute_mutator(&self, org_id: OrgId) -> ScopeAttributeMutator {
        ScopeAttributeMutator::new(self.clone(), org_id)
    }

    /// Number of registered resolvers
    pub fn resolver_count(&self) -> usize {
        self.registrations.read().len()
    }

    /// Registered prefixes in registration order
    pub fn prefixes(&self) -> Vec<String> {
        self.registrations
            .read()
            .iter()
            .map(|r| r.prefix.clone())
            .collect()
    }
}

impl Default for ScopeResolvers {
    fn default() -> Self {
        Self::new()
    }
}
