//! Write operations for the graph.
//!
//! Payloads are built by walking an entity along the relationships declared
//! in a [`SchemaRegistry`]. Every node object gets the identifier the
//! [`UidResolver`] picked for it, so re-submitting an entity updates the
//! nodes it created the first time instead of duplicating them.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{GraphError, Result};
use crate::query::{
    validate_vector, vector_literal, DeleteRequest, Filter, Predicate, TYPE_PREDICATE, UID,
};
use crate::resolver::{GraphIdentifier, UidResolver};
use crate::schema::{Cardinality, NodeTypeDescriptor, SchemaRegistry};
use crate::store::{GraphStore, Uids};

/// A vector to attach to the root node of a payload.
#[derive(Debug, Clone, Copy)]
pub struct Embedding<'a> {
    pub predicate: &'a str,
    pub vector: &'a [f32],
}

type NodeKey = (String, String);

// ── Mutation building ────────────────────────────────────────────

/// Serialize `entity` as a `node_type` node and build its mutation payload.
pub async fn build_mutation<S, T>(
    store: &S,
    schema: &SchemaRegistry,
    entity: &T,
    node_type: &str,
) -> Result<Value>
where
    S: GraphStore + ?Sized,
    T: Serialize + ?Sized,
{
    let value =
        serde_json::to_value(entity).map_err(|e| GraphError::InvalidPayload(e.to_string()))?;
    build_mutation_value(store, schema, value, node_type).await
}

/// Build a mutation payload from an already-serialized entity tree.
///
/// Node keys are collected in document order and resolved one read at a
/// time; the tree is then rewritten with the resolved identifiers. Only
/// relationships declared for a node's type are treated as nodes; any other
/// field is copied through untouched.
pub async fn build_mutation_value<S>(
    store: &S,
    schema: &SchemaRegistry,
    entity: Value,
    node_type: &str,
) -> Result<Value>
where
    S: GraphStore + ?Sized,
{
    let mut keys = Vec::new();
    collect_nodes(schema, &entity, node_type, &mut keys)?;

    let mut resolver = UidResolver::new(store);
    let mut resolved: HashMap<NodeKey, GraphIdentifier> = HashMap::with_capacity(keys.len());
    for (node_type, id_field, id_value) in keys {
        let identifier = resolver.resolve(&node_type, &id_field, &id_value).await?;
        resolved.insert((node_type, id_value), identifier);
    }

    rewrite(schema, entity, node_type, &resolved)
}

fn logical_id<'v>(obj: &'v Map<String, Value>, descriptor: &NodeTypeDescriptor) -> Result<&'v str> {
    match obj.get(descriptor.id_field()) {
        Some(Value::String(id)) if id.trim().is_empty() => {
            Err(GraphError::InvalidPayload(format!(
                "{} node has an empty logical id {}",
                descriptor.name(),
                descriptor.id_field()
            )))
        }
        Some(Value::String(id)) => Ok(id),
        Some(other) => Err(GraphError::InvalidPayload(format!(
            "{} must be a string, got {other}",
            descriptor.id_field()
        ))),
        None => Err(GraphError::InvalidPayload(format!(
            "{} node is missing its logical id {}",
            descriptor.name(),
            descriptor.id_field()
        ))),
    }
}

fn as_node<'v>(value: &'v Value, node_type: &str) -> Result<&'v Map<String, Value>> {
    value.as_object().ok_or_else(|| {
        GraphError::InvalidPayload(format!("{node_type} node must be a JSON object, got {value}"))
    })
}

fn collect_nodes(
    schema: &SchemaRegistry,
    value: &Value,
    node_type: &str,
    out: &mut Vec<(String, String, String)>,
) -> Result<()> {
    let descriptor = schema.lookup(node_type)?;
    let obj = as_node(value, node_type)?;
    let id = logical_id(obj, descriptor)?;
    out.push((
        node_type.to_string(),
        descriptor.id_field().to_string(),
        id.to_string(),
    ));

    for rel in descriptor.relationships() {
        match (rel.cardinality, obj.get(&rel.predicate)) {
            (_, None) | (_, Some(Value::Null)) => {}
            (Cardinality::One, Some(child)) => {
                collect_nodes(schema, child, &rel.target_type, out)?;
            }
            (Cardinality::Many, Some(Value::Array(items))) => {
                for item in items {
                    collect_nodes(schema, item, &rel.target_type, out)?;
                }
            }
            (Cardinality::Many, Some(other)) => {
                return Err(GraphError::InvalidPayload(format!(
                    "{} must be a list of {} nodes, got {other}",
                    rel.predicate, rel.target_type
                )));
            }
        }
    }
    Ok(())
}

fn rewrite(
    schema: &SchemaRegistry,
    value: Value,
    node_type: &str,
    resolved: &HashMap<NodeKey, GraphIdentifier>,
) -> Result<Value> {
    let descriptor = schema.lookup(node_type)?;
    let Value::Object(mut obj) = value else {
        return Err(GraphError::InvalidPayload(format!(
            "{node_type} node must be a JSON object"
        )));
    };

    let key = (node_type.to_string(), logical_id(&obj, descriptor)?.to_string());
    let identifier = resolved.get(&key).ok_or_else(|| {
        GraphError::InvalidPayload(format!("{node_type} {} was not resolved", key.1))
    })?;
    obj.insert(UID.to_string(), Value::String(identifier.to_string()));
    obj.insert(
        TYPE_PREDICATE.to_string(),
        Value::String(node_type.to_string()),
    );

    for rel in descriptor.relationships() {
        let Some(field) = obj.remove(&rel.predicate) else {
            continue;
        };
        let rewritten = match (rel.cardinality, field) {
            (Cardinality::One, Value::Null) => continue,
            (Cardinality::One, child) => rewrite(schema, child, &rel.target_type, resolved)?,
            (Cardinality::Many, Value::Null) => Value::Array(Vec::new()),
            (Cardinality::Many, Value::Array(items)) => Value::Array(
                items
                    .into_iter()
                    .map(|item| rewrite(schema, item, &rel.target_type, resolved))
                    .collect::<Result<Vec<_>>>()?,
            ),
            (Cardinality::Many, other) => {
                return Err(GraphError::InvalidPayload(format!(
                    "{} must be a list, got {other}",
                    rel.predicate
                )))
            }
        };
        obj.insert(rel.predicate.clone(), rewritten);
    }

    Ok(Value::Object(obj))
}

// ── Embedding injection ──────────────────────────────────────────

/// Attach `predicate: vector` to the root node of `payload`.
///
/// Nested nodes are left alone. The vector is written as a
/// `float32vector` literal string.
pub fn inject_embedding(payload: Value, predicate: &str, vector: &[f32]) -> Result<Value> {
    let Value::Object(mut obj) = payload else {
        return Err(GraphError::InvalidPayload(
            "payload is not a JSON object".to_string(),
        ));
    };
    let predicate = Predicate::new(predicate)?;
    validate_vector(vector)?;

    obj.insert(
        predicate.to_string(),
        Value::String(vector_literal(vector)),
    );
    Ok(Value::Object(obj))
}

/// [`inject_embedding`] over JSON text.
pub fn inject_embedding_str(payload: &str, predicate: &str, vector: &[f32]) -> Result<String> {
    let value: Value =
        serde_json::from_str(payload).map_err(|e| GraphError::InvalidPayload(e.to_string()))?;
    let injected = inject_embedding(value, predicate, vector)?;
    serde_json::to_string(&injected).map_err(|e| GraphError::InvalidPayload(e.to_string()))
}

// ── Upsert ───────────────────────────────────────────────────────

/// Build, optionally embed, and submit `entity` as one set-mutation.
///
/// Returns the uids the store assigned to newly created nodes.
pub async fn upsert<S, T>(
    store: &S,
    schema: &SchemaRegistry,
    entity: &T,
    node_type: &str,
    embedding: Option<Embedding<'_>>,
) -> Result<Uids>
where
    S: GraphStore + ?Sized,
    T: Serialize + ?Sized,
{
    let mut payload = build_mutation(store, schema, entity, node_type).await?;
    if let Some(embedding) = embedding {
        payload = inject_embedding(payload, embedding.predicate, embedding.vector)?;
    }

    let root = root_identifier(&payload);
    let uids = store.mutate(&payload).await?;

    let root_uid = match root.as_ref().and_then(GraphIdentifier::blank_name) {
        Some(name) => uids.get(name).map(String::as_str),
        None => root.as_ref().map(GraphIdentifier::as_str),
    };
    tracing::info!(
        node_type,
        uid = root_uid.unwrap_or_default(),
        created = uids.len(),
        "Upserted entity"
    );
    Ok(uids)
}

fn root_identifier(payload: &Value) -> Option<GraphIdentifier> {
    let token = payload.get(UID)?.as_str()?;
    Some(if token.starts_with("_:") {
        GraphIdentifier::Blank(token.to_string())
    } else {
        GraphIdentifier::Existing(token.to_string())
    })
}

// ── Deletion ─────────────────────────────────────────────────────

/// Remove `predicates` from every node matching `filter`.
///
/// Deleting predicates that are already absent is not an error. The node's
/// logical id is only removed if its id predicate is listed.
pub async fn delete_predicates<S>(store: &S, filter: &Filter, predicates: &[&str]) -> Result<()>
where
    S: GraphStore + ?Sized,
{
    let predicates = predicates
        .iter()
        .map(|p| Predicate::new(*p))
        .collect::<Result<Vec<_>>>()?;
    let request = DeleteRequest::new(filter.clone(), predicates)?;

    store.delete_predicates(&request).await?;
    tracing::debug!(
        predicates = request.predicates().len(),
        "Deleted predicates"
    );
    Ok(())
}
