//! Keyword scope substitution

use async_trait::async_trait;

use crate::context::Context;
use crate::error::{AuthzError, Result};
use crate::evaluator::ScopeMutator;
use crate::scope::{self, Keyword, ID_ATTRIBUTE};
use crate::types::{OrgId, SignedInUser, UserId};

/// Substitutes keyword scopes for one signed-in user
///
/// - `<resource>:self` becomes `<resource>:id:<user_id>`
/// - `<resource>:current` becomes `<resource>:id:<org_id>`
///
/// Every other scope is returned unchanged. No I/O is performed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeKeywordMutator {
    user_id: UserId,
    org_id: OrgId,
}

impl ScopeKeywordMutator {
    /// Create a mutator bound to `user`
    pub fn new(user: &SignedInUser) -> Self {
        Self {
            user_id: user.user_id,
            org_id: user.org_id,
        }
    }

    /// Resolve a single scope
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::MalformedKeyword`] when a keyword has no resource
    /// or the identity it refers to is missing.
    pub fn resolve(&self, scope: &str) -> Result<String> {
        let Some((resource, keyword)) = scope::parse_keyword(scope) else {
            return Ok(scope.to_string());
        };

        if resource.is_empty() {
            return Err(AuthzError::MalformedKeyword {
                scope: scope.to_string(),
                reason: "keyword scope has no resource".to_string(),
            });
        }

        let (id, subject) = match keyword {
            Keyword::SignedInUser => (self.user_id, "signed-in user"),
            Keyword::CurrentOrg => (self.org_id, "current organization"),
        };

        if id <= 0 {
            return Err(AuthzError::MalformedKeyword {
                scope: scope.to_string(),
                reason: format!("no {} to substitute for '{}'", subject, keyword.token()),
            });
        }

        Ok(scope::scope(resource, ID_ATTRIBUTE, &id.to_string()))
    }
}

#[async_trait]
impl ScopeMutator for ScopeKeywordMutator {
    async fn mutate(&self, _ctx: &Context, scope: &str) -> Result<Vec<String>> {
        Ok(vec![self.resolve(scope)?])
    }
}
