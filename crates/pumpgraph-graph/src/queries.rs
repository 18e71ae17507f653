//! Read operations: fetch by logical id and vector similarity search.

use serde::de::DeserializeOwned;

use crate::error::{GraphError, Result};
use crate::query::{validate_vector, Filter, Predicate, Projection, QueryRequest};
use crate::store::GraphStore;

/// Fetch the first node whose `id_field` equals `id_value`.
///
/// Returns `Ok(None)` when nothing matches. A row that does not fit `T` is a
/// [`GraphError::Deserialization`], never a silently defaulted value.
pub async fn fetch_by_id<T, S>(
    store: &S,
    id_field: &str,
    id_value: &str,
    projection: &Projection,
) -> Result<Option<T>>
where
    T: DeserializeOwned,
    S: GraphStore + ?Sized,
{
    let request = QueryRequest::new(Filter::eq(id_field, id_value)?, projection.clone()).first(1);
    let rows = store.query(&request).await?;

    match rows.into_iter().next() {
        Some(row) => {
            let entity = serde_json::from_value(row).map_err(|e| {
                GraphError::Deserialization(format!("Failed to deserialize {id_field} = {id_value}: {e}"))
            })?;
            Ok(Some(entity))
        }
        None => {
            tracing::debug!(id_field, id_value, "No entity matched");
            Ok(None)
        }
    }
}

/// Fetch the `top_k` nodes nearest to `query_vector` on the vector index of
/// `predicate`, nearest first.
///
/// Ranking is the store's; results keep the order the store returns them
/// in. `top_k` must be positive and is checked before any request is made.
pub async fn search_by_similarity<T, S>(
    store: &S,
    query_vector: &[f32],
    predicate: &str,
    projection: &Projection,
    top_k: usize,
) -> Result<Vec<T>>
where
    T: DeserializeOwned,
    S: GraphStore + ?Sized,
{
    if top_k == 0 {
        return Err(GraphError::InvalidArgument(
            "top_k must be a positive integer".to_string(),
        ));
    }
    validate_vector(query_vector)?;
    let predicate = Predicate::new(predicate)?;

    let filter = Filter::similar_to(predicate, top_k, query_vector.to_vec());
    let rows = store
        .query(&QueryRequest::new(filter, projection.clone()))
        .await?;
    tracing::debug!(top_k, returned = rows.len(), "Similarity search completed");

    rows.into_iter()
        .enumerate()
        .map(|(rank, row)| {
            serde_json::from_value(row).map_err(|e| {
                GraphError::Deserialization(format!("Failed to deserialize result {rank}: {e}"))
            })
        })
        .collect()
}
