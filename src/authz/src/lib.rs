//! # Scopekit Authorization
//!
//! Request-time scope resolution and permission evaluation.
//!
//! ## Features
//!
//! - **Evaluator trees** combining required permissions with `all` / `any`
//! - **Keyword scopes** (`users:self`, `orgs:current`) bound to the signed-in user
//! - **Attribute scopes** (`datasources:name:prod`) translated into id scopes by
//!   resolvers registered per prefix
//! - **Per-request caching** so repeated scopes are resolved once
//! - **Cancellation and deadlines** carried through every resolver call
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use scopekit_authz::{
//!     AccessControl, AttributeScopeResolver, Context, Entity, Evaluator, GrantedPermissions,
//!     InMemoryEntityStore, Permission, SignedInUser,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = InMemoryEntityStore::new();
//!     store.insert(1, "datasources", Entity::new("7").with_attribute("name", "prod"));
//!
//!     let access = AccessControl::new(Default::default());
//!     access
//!         .resolvers()
//!         .register_attribute_resolver(AttributeScopeResolver::new("datasources", "name", Arc::new(store)))?;
//!
//!     let user = SignedInUser::new(2, 1, "alice");
//!     let granted: GrantedPermissions =
//!         vec![Permission::new("datasources:query", "datasources:id:7")].into_iter().collect();
//!
//!     let required = Evaluator::scoped("datasources:query", "datasources:name:prod");
//!     let allowed = access.authorize(&Context::background(), &user, &granted, &required).await?;
//!
//!     if allowed {
//!         println!("Access granted!");
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod evaluator;
pub mod resolvers;
pub mod scope;
pub mod service;
pub mod types;

// Re-export commonly used types
pub use config::{PrefixPrecedence, ResolutionConfig};
pub use context::Context;
pub use error::{AuthzError, LookupError, Result};
pub use evaluator::{evaluate, Evaluator, ScopeMutator};
pub use resolvers::{
    resolver_fn, AttributeQuery, AttributeScopeResolver, Entity, EntityStore, FnResolver,
    InMemoryEntityStore, ResolutionStats, ScopeAttributeMutator, ScopeAttributeResolver,
    ScopeKeywordMutator, ScopeResolvers,
};
pub use scope::scope;
pub use service::AccessControl;
pub use types::{GrantedPermissions, OrgId, Permission, SignedInUser, UserId};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
