//! Datastore-backed attribute resolvers
//!
//! [`AttributeScopeResolver`] turns `<resource>:<attribute>:<value>` into
//! `<resource>:id:<id>` by asking an [`EntityStore`]. A value ending in `*`
//! becomes a prefix lookup and may fan out to many ids.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use super::attribute::ScopeAttributeResolver;
use crate::context::Context;
use crate::error::{AuthzError, LookupError, Result};
use crate::scope::{self, ScopeParts, ID_ATTRIBUTE, WILDCARD};
use crate::types::OrgId;

/// How an entity is looked up by attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeQuery<'a> {
    /// Attribute equal to `value`
    Exact { attribute: &'a str, value: &'a str },
    /// Attribute starting with `prefix`
    Prefix { attribute: &'a str, prefix: &'a str },
}

impl AttributeQuery<'_> {
    /// The attribute being queried
    pub fn attribute(&self) -> &str {
        match self {
            Self::Exact { attribute, .. } | Self::Prefix { attribute, .. } => *attribute,
        }
    }
}

/// Lookup capability used by attribute resolvers
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Ids of the `resource` entities in `org_id` matching `query`
    ///
    /// Exact queries with no match fail with [`LookupError::NotFound`].
    /// Prefix queries with no match return an empty list.
    async fn find_ids(
        &self,
        org_id: OrgId,
        resource: &str,
        query: AttributeQuery<'_>,
    ) -> std::result::Result<Vec<String>, LookupError>;
}

/// Resolver for `<resource>:<attribute>:` scopes backed by an [`EntityStore`]
pub struct AttributeScopeResolver<S> {
    resource: String,
    attribute: String,
    prefix: String,
    store: Arc<S>,
}

impl<S: EntityStore> AttributeScopeResolver<S> {
    /// Create a resolver for `resource` entities identified by `attribute`
    pub fn new(resource: impl Into<String>, attribute: impl Into<String>, store: Arc<S>) -> Self {
        let resource = resource.into();
        let attribute = attribute.into();
        let prefix = scope::scope(&resource, &attribute, "");

        Self {
            resource,
            attribute,
            prefix,
            store,
        }
    }

    /// The prefix this resolver owns (e.g., "datasources:name:")
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn id_scope(&self, id: &str) -> String {
        scope::scope(&self.resource, ID_ATTRIBUTE, id)
    }
}

#[async_trait]
impl<S: EntityStore + 'static> ScopeAttributeResolver for AttributeScopeResolver<S> {
    async fn resolve(&self, _ctx: &Context, org_id: OrgId, scope: &str) -> Result<Vec<String>> {
        let parts = match ScopeParts::parse(scope) {
            Some(parts) if parts.resource == self.resource && parts.attribute == self.attribute => parts,
            _ => {
                return Err(AuthzError::invalid_scope(
                    scope,
                    format!("expected prefix '{}'", self.prefix),
                ))
            }
        };

        if parts.value.is_empty() {
            return Err(AuthzError::invalid_scope(scope, "missing attribute value"));
        }

        if parts.value == "*" {
            return Ok(vec![self.id_scope("*")]);
        }

        let query = if parts.is_wildcard() {
            AttributeQuery::Prefix {
                attribute: &self.attribute,
                prefix: &parts.value[..parts.value.len() - WILDCARD.len_utf8()],
            }
        } else {
            AttributeQuery::Exact {
                attribute: &self.attribute,
                value: parts.value,
            }
        };

        let ids = self.store.find_ids(org_id, &self.resource, query).await?;
        debug!(
            "Looked up {} by {}: org={}, scope={}, matches={}",
            self.resource,
            self.attribute,
            org_id,
            scope,
            ids.len()
        );

        Ok(ids.iter().map(|id| self.id_scope(id)).collect())
    }
}

/// A stored entity with identifying attributes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// Canonical identifier used in id scopes
    pub id: String,

    /// Other identifying attributes (e.g., name, uid)
    #[serde(default)]
    pub attributes: HashMap<String, String>,
}

impl Entity {
    /// Create an entity with an id
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            attributes: HashMap::new(),
        }
    }

    /// Add an attribute
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    fn attribute(&self, key: &str) -> Option<&str> {
        if key == ID_ATTRIBUTE {
            return Some(self.id.as_str());
        }
        self.attributes.get(key).map(String::as_str)
    }
}

/// In-memory [`EntityStore`], partitioned by organization
///
/// Lookups return ids in insertion order.
#[derive(Debug, Default)]
pub struct InMemoryEntityStore {
    entities: RwLock<HashMap<(OrgId, String), Vec<Entity>>>,
}

impl InMemoryEntityStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entity of kind `resource` to `org_id`
    ///
    /// An entity with the same id is replaced.
    pub fn insert(&self, org_id: OrgId, resource: impl Into<String>, entity: Entity) {
        let mut entities = self.entities.write();
        let bucket = entities.entry((org_id, resource.into())).or_default();
        match bucket.iter_mut().find(|e| e.id == entity.id) {
            Some(existing) => *existing = entity,
            None => bucket.push(entity),
        }
    }

    /// Number of entities across all organizations
    pub fn len(&self) -> usize {
        self.entities.read().values().map(Vec::len).sum()
    }

    /// Whether the store holds no entities
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lookup(
        &self,
        org_id: OrgId,
        resource: &str,
        query: AttributeQuery<'_>,
    ) -> std::result::Result<Vec<String>, LookupError> {
        let entities = self.entities.read();
        let candidates = entities
            .get(&(org_id, resource.to_string()))
            .map(Vec::as_slice)
            .unwrap_or(&[]);

        match query {
            AttributeQuery::Exact { attribute, value } => {
                let ids: Vec<String> = candidates
                    .iter()
                    .filter(|e| e.attribute(attribute) == Some(value))
                    .map(|e| e.id.clone())
                    .collect();

                if ids.is_empty() {
                    Err(LookupError::not_found(resource, attribute, value))
                } else {
                    Ok(ids)
                }
            }
            AttributeQuery::Prefix { attribute, prefix } => Ok(candidates
                .iter()
                .filter(|e| e.attribute(attribute).is_some_and(|v| v.starts_with(prefix)))
                .map(|e| e.id.clone())
                .collect()),
        }
    }
}

#[async_trait]
impl EntityStore for InMemoryEntityStore {
    async fn find_ids(
        &self,
        org_id: OrgId,
        resource: &str,
        query: AttributeQuery<'_>,
    ) -> std::result::Result<Vec<String>, LookupError> {
        self.lookup(org_id, resource, query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn datasource_store() -> Arc<InMemoryEntityStore> {
        let store = InMemoryEntityStore::new();
        store.insert(1, "datasources", Entity::new("1").with_attribute("name", "testds"));
        store.insert(1, "datasources", Entity::new("4").with_attribute("name", "test:ds4"));
        store.insert(1, "datasources", Entity::new("5").with_attribute("name", "testds5-a"));
        store.insert(1, "datasources", Entity::new("6").with_attribute("name", "testds5-b"));
        store.insert(2, "datasources", Entity::new("9").with_attribute("name", "testds"));
        Arc::new(store)
    }

    fn name_resolver() -> AttributeScopeResolver<InMemoryEntityStore> {
        AttributeScopeResolver::new("datasources", "name", datasource_store())
    }

    async fn resolve(scope: &str, org_id: OrgId) -> Result<Vec<String>> {
        name_resolver()
            .resolve(&Context::background(), org_id, scope)
            .await
    }

    #[test]
    fn test_prefix() {
        assert_eq!(name_resolver().prefix(), "datasources:name:");
    }

    #[tokio::test]
    async fn test_exact_lookup() {
        assert_eq!(resolve("datasources:name:testds", 1).await.unwrap(), vec!["datasources:id:1"]);
        assert_eq!(resolve("datasources:name:testds", 2).await.unwrap(), vec!["datasources:id:9"]);
    }

    #[tokio::test]
    async fn test_value_with_colon() {
        assert_eq!(
            resolve("datasources:name:test:ds4", 1).await.unwrap(),
            vec!["datasources:id:4"]
        );
    }

    #[tokio::test]
    async fn test_prefix_lookup_fans_out_in_order() {
        assert_eq!(
            resolve("datasources:name:testds5*", 1).await.unwrap(),
            vec!["datasources:id:5", "datasources:id:6"]
        );
        assert!(resolve("datasources:name:nothing*", 1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_bare_wildcard_needs_no_lookup() {
        assert_eq!(resolve("datasources:name:*", 42).await.unwrap(), vec!["datasources:id:*"]);
    }

    #[tokio::test]
    async fn test_missing_entity() {
        let err = resolve("datasources:name:testds3", 1).await.unwrap_err();
        assert_eq!(
            err,
            AuthzError::LookupFailed(LookupError::not_found("datasources", "name", "testds3"))
        );
    }

    #[tokio::test]
    async fn test_org_isolation() {
        let err = resolve("datasources:name:test:ds4", 2).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_invalid_scopes() {
        let err = resolve("datasources:name:", 1).await.unwrap_err();
        assert!(matches!(err, AuthzError::InvalidScope { .. }));

        let err = resolve("dashboards:name:x", 1).await.unwrap_err();
        assert!(matches!(err, AuthzError::InvalidScope { .. }));

        let err = resolve("datasources:name", 1).await.unwrap_err();
        assert!(matches!(err, AuthzError::InvalidScope { .. }));

        let err = resolve("datasources:uid:x", 1).await.unwrap_err();
        assert!(matches!(err, AuthzError::InvalidScope { .. }));
    }

    #[tokio::test]
    async fn test_lookup_by_id_attribute() {
        let store = datasource_store();
        let ids = store
            .find_ids(1, "datasources", AttributeQuery::Exact { attribute: "id", value: "4" })
            .await
            .unwrap();
        assert_eq!(ids, vec!["4"]);
    }

    #[test]
    fn test_insert_replaces_same_id() {
        let store = InMemoryEntityStore::new();
        store.insert(1, "teams", Entity::new("1").with_attribute("name", "old"));
        store.insert(1, "teams", Entity::new("1").with_attribute("name", "new"));
        assert_eq!(store.len(), 1);
        assert!(!store.is_empty());
    }

    #[test]
    fn test_query_attribute() {
        let query = AttributeQuery::Prefix { attribute: "uid", prefix: "ab" };
        assert_eq!(query.attribute(), "uid");
    }
}
