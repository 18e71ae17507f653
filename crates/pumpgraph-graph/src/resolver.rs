//! UID resolution: map a (node type, logical id) pair to the identifier a
//! mutation should use for it.

use std::collections::HashMap;
use std::fmt;

use uuid::Uuid;

use crate::error::{GraphError, Result};
use crate::query::{Filter, Projection, QueryRequest, UID};
use crate::store::GraphStore;

/// Identifier of a node inside a mutation payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GraphIdentifier {
    /// A uid the store already assigned.
    Existing(String),
    /// A `_:`-prefixed placeholder for a node the mutation will create.
    Blank(String),
}

impl GraphIdentifier {
    pub fn as_str(&self) -> &str {
        match self {
            GraphIdentifier::Existing(uid) | GraphIdentifier::Blank(uid) => uid,
        }
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, GraphIdentifier::Blank(_))
    }

    /// The key the store uses for this placeholder in its mutation response.
    pub fn blank_name(&self) -> Option<&str> {
        match self {
            GraphIdentifier::Blank(token) => token.strip_prefix("_:"),
            GraphIdentifier::Existing(_) => None,
        }
    }
}

impl fmt::Display for GraphIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolver for one mutation-building pass.
///
/// Placeholders are `_:<type>_<pass>_<n>`: `<pass>` is drawn fresh for every
/// resolver so tokens never repeat across requests, and `<n>` counts up
/// within the pass. Results are memoised per (type, logical id), so a node
/// that appears twice in one entity tree maps to a single identifier.
pub struct UidResolver<'a, S: GraphStore + ?Sized> {
    store: &'a S,
    pass: String,
    counter: usize,
    resolved: HashMap<(String, String), GraphIdentifier>,
}

impl<'a, S: GraphStore + ?Sized> UidResolver<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            pass: Uuid::new_v4().simple().to_string(),
            counter: 0,
            resolved: HashMap::new(),
        }
    }

    /// Look up `node_type` nodes with `id_field == id_value`.
    ///
    /// Returns the existing uid when one matches, otherwise a fresh blank
    /// placeholder. Only reads; the node is created when the payload is
    /// submitted.
    pub async fn resolve(
        &mut self,
        node_type: &str,
        id_field: &str,
        id_value: &str,
    ) -> Result<GraphIdentifier> {
        let key = (node_type.to_string(), id_value.to_string());
        if let Some(known) = self.resolved.get(&key) {
            return Ok(known.clone());
        }

        let filter = Filter::eq(id_field, id_value)?.and(Filter::of_type(node_type)?);
        let request = QueryRequest::new(filter, Projection::new().uid()).first(1);
        let rows = self.store.query(&request).await?;

        let identifier = match rows.first() {
            Some(row) => {
                let uid = row.get(UID).and_then(|v| v.as_str()).ok_or_else(|| {
                    GraphError::Deserialization(format!(
                        "existence query for {node_type} returned a row without a uid"
                    ))
                })?;
                tracing::debug!(node_type, id_value, uid, "Resolved existing node");
                GraphIdentifier::Existing(uid.to_string())
            }
            None => {
                self.counter += 1;
                let token = format!("_:{node_type}_{}_{}", self.pass, self.counter);
                tracing::debug!(node_type, id_value, %token, "Allocated blank node");
                GraphIdentifier::Blank(token)
            }
        };

        self.resolved.insert(key, identifier.clone());
        Ok(identifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use serde_json::json;

    #[tokio::test]
    async fn test_resolves_existing_node() {
        let store = MemoryStore::new();
        let uids = store
            .mutate(&json!({
                "uid": "_:s",
                "dgraph.type": "PumpingStation",
                "PumpingStation.id": "ps-1",
            }))
            .await
            .unwrap();

        let mut resolver = UidResolver::new(&store);
        let id = resolver
            .resolve("PumpingStation", "PumpingStation.id", "ps-1")
            .await
            .unwrap();

        assert_eq!(id, GraphIdentifier::Existing(uids["s"].clone()));
    }

    #[tokio::test]
    async fn test_allocates_distinct_blank_nodes() {
        let store = MemoryStore::new();
        let mut resolver = UidResolver::new(&store);

        let a = resolver.resolve("Profile", "Profile.id", "p-1").await.unwrap();
        let b = resolver.resolve("Profile", "Profile.id", "p-2").await.unwrap();

        assert!(a.is_blank() && b.is_blank());
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("_:Profile_"));
        assert!(a.as_str().ends_with("_1"));
        assert!(b.as_str().ends_with("_2"));

        let pass = a
            .as_str()
            .strip_prefix("_:Profile_")
            .and_then(|rest| rest.strip_suffix("_1"))
            .unwrap();
        assert_eq!(pass.len(), 32);
        assert!(pass.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn test_same_logical_id_is_memoised() {
        let store = MemoryStore::new();
        let mut resolver = UidResolver::new(&store);

        let first = resolver.resolve("Profile", "Profile.id", "p-1").await.unwrap();
        let again = resolver.resolve("Profile", "Profile.id", "p-1").await.unwrap();

        assert_eq!(first, again);
        assert_eq!(store.query_count(), 1);
    }

    #[tokio::test]
    async fn test_type_restricts_match() {
        let store = MemoryStore::new();
        store
            .mutate(&json!({
                "uid": "_:x",
                "dgraph.type": "Project",
                "PumpingStation.id": "ps-1",
            }))
            .await
            .unwrap();

        let mut resolver = UidResolver::new(&store);
        let id = resolver
            .resolve("PumpingStation", "PumpingStation.id", "ps-1")
            .await
            .unwrap();
        assert!(id.is_blank());
    }

    #[tokio::test]
    async fn test_passes_never_share_tokens() {
        let store = MemoryStore::new();
        let a = UidResolver::new(&store)
            .resolve("Profile", "Profile.id", "p-1")
            .await
            .unwrap();
        let b = UidResolver::new(&store)
            .resolve("Profile", "Profile.id", "p-1")
            .await
            .unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let store = MemoryStore::new();
        store.set_unavailable(true);

        let mut resolver = UidResolver::new(&store);
        let err = resolver
            .resolve("Profile", "Profile.id", "p-1")
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::StoreUnavailable(_)));
    }

    #[test]
    fn test_blank_name_strips_prefix() {
        let id = GraphIdentifier::Blank("_:Profile_abc_1".to_string());
        assert_eq!(id.blank_name(), Some("Profile_abc_1"));
        assert_eq!(GraphIdentifier::Existing("0x1".into()).blank_name(), None);
    }
}
