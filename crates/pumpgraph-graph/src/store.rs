//! The seam between the graph access layer and a concrete graph store.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::Result;
use crate::query::{DeleteRequest, QueryRequest};

/// Blank-node names (without the `_:` prefix) mapped to the uids the store
/// assigned them.
pub type Uids = BTreeMap<String, String>;

/// The three request shapes the access layer issues against a store.
///
/// Every call is a single attempt: implementations surface transport
/// failures as [`GraphError::StoreUnavailable`](crate::GraphError) and never
/// retry.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Run a read and return the rows of its result block, in store order.
    async fn query(&self, request: &QueryRequest) -> Result<Vec<serde_json::Value>>;

    /// Apply a set-mutation and commit it.
    async fn mutate(&self, payload: &serde_json::Value) -> Result<Uids>;

    /// Remove the listed predicates from every node matching the filter.
    async fn delete_predicates(&self, request: &DeleteRequest) -> Result<()>;
}
