//! Permission requirement trees
//!
//! An [`Evaluator`] is an immutable expression over required permissions:
//! single permission leaves combined with `all` and `any`. It can be checked
//! against a user's granted permissions, and its scopes can be rewritten by a
//! [`ScopeMutator`] before that check.
//!
//! # Example
//!
//! ```rust
//! use scopekit_authz::{Evaluator, GrantedPermissions, Permission};
//!
//! let required = Evaluator::all(vec![
//!     Evaluator::scoped("datasources:read", "datasources:id:1"),
//!     Evaluator::any(vec![
//!         Evaluator::permission("users:read"),
//!         Evaluator::permission("orgs:read"),
//!     ]),
//! ]);
//!
//! let granted: GrantedPermissions = vec![
//!     Permission::new("datasources:read", "datasources:*"),
//!     Permission::unscoped("users:read"),
//! ]
//! .into_iter()
//! .collect();
//!
//! assert!(required.evaluate(&granted));
//! ```

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::context::Context;
use crate::error::Result;
use crate::scope;
use crate::types::{GrantedPermissions, Permission};

/// Rewrites one scope into one or more equivalent scopes
///
/// Returning a single scope replaces the scope in place. Returning several
/// scopes fans the permission out into an `any` over each of them.
#[async_trait]
pub trait ScopeMutator: Send + Sync {
    /// Resolve `scope` for the request described by `ctx`
    async fn mutate(&self, ctx: &Context, scope: &str) -> Result<Vec<String>>;
}

/// A permission requirement expression
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Evaluator {
    /// A single required permission
    Permission(Permission),
    /// Satisfied when every child is satisfied
    All(Vec<Evaluator>),
    /// Satisfied when at least one child is satisfied
    Any(Vec<Evaluator>),
}

impl Evaluator {
    /// Require an action without a scope
    pub fn permission(action: impl Into<String>) -> Self {
        Self::Permission(Permission::unscoped(action))
    }

    /// Require an action on a scope
    pub fn scoped(action: impl Into<String>, scope: impl Into<String>) -> Self {
        Self::Permission(Permission::new(action, scope))
    }

    /// Require every child
    pub fn all(children: Vec<Evaluator>) -> Self {
        Self::All(children)
    }

    /// Require at least one child
    pub fn any(children: Vec<Evaluator>) -> Self {
        Self::Any(children)
    }

    /// Checks the requirement against granted permissions
    ///
    /// An empty `all` is satisfied and an empty `any` is not.
    pub fn evaluate(&self, granted: &GrantedPermissions) -> bool {
        match self {
            Self::Permission(required) => permission_granted(required, granted),
            Self::All(children) => children.iter().all(|child| child.evaluate(granted)),
            Self::Any(children) => children.iter().any(|child| child.evaluate(granted)),
        }
    }

    /// Rewrites every scoped leaf through `mutator`
    ///
    /// Children are visited depth first in order. The first error aborts the
    /// traversal and is returned as is; no partially rewritten tree escapes.
    /// Unscoped leaves are never passed to the mutator.
    pub fn mutate_scopes<'a, M>(
        &'a self,
        ctx: &'a Context,
        mutator: &'a M,
    ) -> BoxFuture<'a, Result<Evaluator>>
    where
        M: ScopeMutator + ?Sized,
    {
        async move {
            match self {
                Self::Permission(permission) => {
                    if !permission.is_scoped() {
                        return Ok(self.clone());
                    }

                    ctx.check()?;
                    let mut scopes = mutator.mutate(ctx, &permission.scope).await?;

                    if scopes.len() == 1 {
                        Ok(Self::Permission(permission.with_scope(scopes.swap_remove(0))))
                    } else {
                        Ok(Self::Any(
                            scopes
                                .into_iter()
                                .map(|scope| Self::Permission(permission.with_scope(scope)))
                                .collect(),
                        ))
                    }
                }
                Self::All(children) => Ok(Self::All(mutate_children(children, ctx, mutator).await?)),
                Self::Any(children) => Ok(Self::Any(mutate_children(children, ctx, mutator).await?)),
            }
        }
        .boxed()
    }

    /// Every leaf scope, in traversal order
    pub fn scopes(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_scopes(&mut out);
        out
    }

    fn collect_scopes<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::Permission(permission) => {
                if permission.is_scoped() {
                    out.push(&permission.scope);
                }
            }
            Self::All(children) | Self::Any(children) => {
                for child in children {
                    child.collect_scopes(out);
                }
            }
        }
    }

    /// Whether any leaf carries a scope
    pub fn has_scopes(&self) -> bool {
        match self {
            Self::Permission(permission) => permission.is_scoped(),
            Self::All(children) | Self::Any(children) => children.iter().any(Self::has_scopes),
        }
    }
}

async fn mutate_children<M>(
    children: &[Evaluator],
    ctx: &Context,
    mutator: &M,
) -> Result<Vec<Evaluator>>
where
    M: ScopeMutator + ?Sized,
{
    let mut mutated = Vec::with_capacity(children.len());
    for child in children {
        mutated.push(child.mutate_scopes(ctx, mutator).await?);
    }
    Ok(mutated)
}

fn permission_granted(required: &Permission, granted: &GrantedPermissions) -> bool {
    let Some(scopes) = granted.scopes(&required.action) else {
        return false;
    };

    if !required.is_scoped() {
        return true;
    }

    scopes
        .iter()
        .any(|granted_scope| scope::matches(granted_scope, &required.scope))
}

/// Checks `evaluator` against granted permissions
pub fn evaluate(evaluator: &Evaluator, granted: &GrantedPermissions) -> bool {
    evaluator.evaluate(granted)
}

impl fmt::Display for Evaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Permission(permission) if permission.is_scoped() => {
                write!(f, "{}[{}]", permission.action, permission.scope)
            }
            Self::Permission(permission) => write!(f, "{}", permission.action),
            Self::All(children) => write_combinator(f, "all", children),
            Self::Any(children) => write_combinator(f, "any", children),
        }
    }
}

fn write_combinator(f: &mut fmt::Formatter<'_>, name: &str, children: &[Evaluator]) -> fmt::Result {
    write!(f, "{}(", name)?;
    for (idx, child) in children.iter().enumerate() {
        if idx > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", child)?;
    }
    write!(f, ")")
}
