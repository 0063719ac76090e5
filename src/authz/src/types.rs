//! Core authorization types

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Numeric user identifier
pub type UserId = i64;

/// Numeric organization identifier
pub type OrgId = i64;

/// A single permission: an action, optionally restricted to a scope
///
/// An empty scope means the permission carries no resource restriction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Permission {
    /// Action name (e.g., "datasources:read")
    pub action: String,

    /// Scope string (e.g., "datasources:id:1"), empty when unscoped
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub scope: String,
}

impl Permission {
    /// Create a scoped permission
    pub fn new(action: impl Into<String>, scope: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            scope: scope.into(),
        }
    }

    /// Create a permission without a scope
    pub fn unscoped(action: impl Into<String>) -> Self {
        Self::new(action, String::new())
    }

    /// Copy of this permission with another scope
    pub fn with_scope(&self, scope: impl Into<String>) -> Self {
        Self {
            action: self.action.clone(),
            scope: scope.into(),
        }
    }

    /// Whether the permission is restricted to a scope
    pub fn is_scoped(&self) -> bool {
        !self.scope.is_empty()
    }
}

/// The signed-in identity a request is evaluated for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedInUser {
    /// User identifier
    pub user_id: UserId,

    /// Organization the user is acting in
    pub org_id: OrgId,

    /// Login name
    #[serde(default)]
    pub login: String,

    /// Display name
    #[serde(default)]
    pub name: String,
}

impl SignedInUser {
    /// Create a new signed-in user
    pub fn new(user_id: UserId, org_id: OrgId, login: impl Into<String>) -> Self {
        Self {
            user_id,
            org_id,
            login: login.into(),
            name: String::new(),
        }
    }

    /// Set the display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// Permissions granted to a user, grouped by action
///
/// Scopes keep the order they were granted in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GrantedPermissions {
    by_action: HashMap<String, Vec<String>>,
}

impl GrantedPermissions {
    /// Create an empty grant set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a granted permission
    pub fn grant(&mut self, permission: Permission) {
        let scopes = self.by_action.entry(permission.action).or_default();
        if !scopes.contains(&permission.scope) {
            scopes.push(permission.scope);
        }
    }

    /// Scopes granted for an action, `None` if the action is not granted
    pub fn scopes(&self, action: &str) -> Option<&[String]> {
        self.by_action.get(action).map(Vec::as_slice)
    }

    /// Whether the action is granted with any scope
    pub fn has_action(&self, action: &str) -> bool {
        self.by_action.contains_key(action)
    }

    /// Number of distinct granted actions
    pub fn len(&self) -> usize {
        self.by_action.len()
    }

    /// Whether nothing is granted
    pub fn is_empty(&self) -> bool {
        self.by_action.is_empty()
    }
}

impl FromIterator<Permission> for GrantedPermissions {
    fn from_iter<I: IntoIterator<Item = Permission>>(iter: I) -> Self {
        let mut granted = Self::new();
        for permission in iter {
            granted.grant(permission);
        }
        granted
    }
}

impl Extend<Permission> for GrantedPermissions {
    fn extend<I: IntoIterator<Item = Permission>>(&mut self, iter: I) {
        for permission in iter {
            self.grant(permission);
        }
    }
}
