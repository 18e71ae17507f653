//! In-process [`GraphStore`] for tests and offline runs.
//!
//! Interprets the typed requests directly instead of parsing DQL, following
//! the Dgraph semantics the access layer depends on:
//! - `_:name` blank nodes are allocated once per mutation and reported back
//!   without their prefix; nested objects without a `uid` become new nodes
//! - nested objects are uid edges; lists of objects are `[uid]` edges whose
//!   targets are set-unioned with existing ones
//! - `null` values and empty lists in a set-mutation are ignored
//! - `similar_to` ranks by euclidean distance, nearest first
//! - a node left without predicates no longer exists

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use crate::error::{GraphError, Result};
use crate::query::{
    parse_vector_literal, DeleteRequest, Field, Func, Projection, QueryRequest, TYPE_PREDICATE,
    UID,
};
use crate::store::{GraphStore, Uids};

type Node = Map<String, Value>;

#[derive(Default, Clone)]
struct State {
    next_uid: u64,
    nodes: BTreeMap<u64, Node>,
}

impl State {
    fn allocate(&mut self) -> u64 {
        self.next_uid += 1;
        self.nodes.insert(self.next_uid, Node::new());
        self.next_uid
    }
}

/// In-memory graph store.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
    queries: AtomicUsize,
    mutations: AtomicUsize,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent request fail as if the transport were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of read queries served so far.
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    /// Number of set and delete mutations applied so far.
    pub fn mutation_count(&self) -> usize {
        self.mutations.load(Ordering::SeqCst)
    }

    /// Number of live nodes.
    pub async fn node_count(&self) -> usize {
        self.state.read().await.nodes.len()
    }

    /// Number of live nodes carrying `dgraph.type == node_type`.
    pub async fn count_type(&self, node_type: &str) -> usize {
        let state = self.state.read().await;
        state
            .nodes
            .values()
            .filter(|n| has_type(n, node_type))
            .count()
    }

    /// Raw predicates of one node, by uid (`0x..`).
    pub async fn node(&self, uid: &str) -> Option<Map<String, Value>> {
        let uid = parse_uid(uid)?;
        self.state.read().await.nodes.get(&uid).cloned()
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(GraphError::StoreUnavailable(
                "in-memory store marked unavailable".to_string(),
            ))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl GraphStore for MemoryStore {
    async fn query(&self, request: &QueryRequest) -> Result<Vec<Value>> {
        self.check_available()?;
        self.queries.fetch_add(1, Ordering::SeqCst);

        let state = self.state.read().await;
        let mut matched = select(&state, request.filter().root(), request.filter().conjuncts());
        if let Some(n) = request.limit() {
            matched.truncate(n);
        }

        Ok(matched
            .into_iter()
            .filter_map(|uid| state.nodes.get(&uid).map(|node| (uid, node)))
            .map(|(uid, node)| project(&state, uid, node, request.projection()))
            .collect())
    }

    async fn mutate(&self, payload: &Value) -> Result<Uids> {
        self.check_available()?;

        let mut state = self.state.write().await;
        // Applied to a copy so a rejected mutation leaves no partial writes.
        let mut staged = state.clone();
        let mut blanks = HashMap::new();
        match payload {
            Value::Object(obj) => {
                apply_node(&mut staged, obj, &mut blanks)?;
            }
            Value::Array(items) => {
                for item in items {
                    let obj = item.as_object().ok_or_else(|| {
                        GraphError::Store("mutation list entries must be objects".to_string())
                    })?;
                    apply_node(&mut staged, obj, &mut blanks)?;
                }
            }
            other => {
                return Err(GraphError::Store(format!(
                    "mutation payload must be an object or list, got {other}"
                )))
            }
        }
        *state = staged;
        self.mutations.fetch_add(1, Ordering::SeqCst);

        Ok(blanks
            .into_iter()
            .map(|(name, uid)| (name, format_uid(uid)))
            .collect())
    }

    async fn delete_predicates(&self, request: &DeleteRequest) -> Result<()> {
        self.check_available()?;

        let mut state = self.state.write().await;
        let targets = select(&state, request.filter().root(), request.filter().conjuncts());
        for uid in targets {
            let emptied = match state.nodes.get_mut(&uid) {
                Some(node) => {
                    for predicate in request.predicates() {
                        node.remove(predicate.as_str());
                    }
                    node.is_empty()
                }
                None => false,
            };
            if emptied {
                state.nodes.remove(&uid);
            }
        }
        self.mutations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ── Mutation ─────────────────────────────────────────────────────

fn apply_node(state: &mut State, obj: &Node, blanks: &mut HashMap<String, u64>) -> Result<u64> {
    let uid = match obj.get(UID) {
        Some(Value::String(token)) => match token.strip_prefix("_:") {
            Some(name) => match blanks.get(name) {
                Some(uid) => *uid,
                None => {
                    let uid = state.allocate();
                    blanks.insert(name.to_string(), uid);
                    uid
                }
            },
            None => {
                let uid = parse_uid(token)
                    .ok_or_else(|| GraphError::Store(format!("malformed uid {token:?}")))?;
                if !state.nodes.contains_key(&uid) {
                    if uid > state.next_uid {
                        return Err(GraphError::Store(format!("uid {token} was never allocated")));
                    }
                    state.nodes.insert(uid, Node::new());
                }
                uid
            }
        },
        Some(other) => return Err(GraphError::Store(format!("uid must be a string, got {other}"))),
        None => state.allocate(),
    };

    let mut updates: Vec<(String, Value)> = Vec::new();
    let mut edge_lists: Vec<(String, Vec<u64>)> = Vec::new();
    for (key, value) in obj {
        if key == UID {
            continue;
        }
        match value {
            Value::Null => {}
            Value::Object(child) => {
                let child_uid = apply_node(state, child, blanks)?;
                updates.push((key.clone(), edge(child_uid)));
            }
            Value::Array(items) if items.is_empty() => {}
            Value::Array(items) if items.iter().all(Value::is_object) => {
                let mut targets = Vec::with_capacity(items.len());
                for item in items {
                    if let Value::Object(child) = item {
                        targets.push(apply_node(state, child, blanks)?);
                    }
                }
                edge_lists.push((key.clone(), targets));
            }
            scalar => updates.push((key.clone(), scalar.clone())),
        }
    }

    let node = state.nodes.entry(uid).or_default();
    for (key, value) in updates {
        node.insert(key, value);
    }
    for (key, targets) in edge_lists {
        let mut existing: Vec<u64> = match node.get(&key) {
            Some(Value::Array(items)) => items.iter().filter_map(edge_target).collect(),
            _ => Vec::new(),
        };
        for target in targets {
            if !existing.contains(&target) {
                existing.push(target);
            }
        }
        node.insert(key, Value::Array(existing.into_iter().map(edge).collect()));
    }
    Ok(uid)
}

// ── Query evaluation ─────────────────────────────────────────────

fn select(state: &State, root: &Func, conjuncts: &[Func]) -> Vec<u64> {
    let passes = |node: &Node| conjuncts.iter().all(|f| satisfies(node, f));

    match root {
        Func::SimilarTo {
            predicate,
            top_k,
            vector,
        } => {
            let mut ranked: Vec<(f32, u64)> = state
                .nodes
                .iter()
                .filter(|&(_, node)| passes(node))
                .filter_map(|(uid, node)| {
                    let stored = stored_vector(node.get(predicate.as_str())?)?;
                    if stored.len() != vector.len() {
                        return None;
                    }
                    Some((euclidean(&stored, vector), *uid))
                })
                .collect();
            ranked.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
            ranked.truncate(*top_k);
            ranked.into_iter().map(|(_, uid)| uid).collect()
        }
        _ => state
            .nodes
            .iter()
            .filter(|&(_, node)| satisfies(node, root) && passes(node))
            .map(|(uid, _)| *uid)
            .collect(),
    }
}

fn satisfies(node: &Node, func: &Func) -> bool {
    match func {
        Func::Eq { predicate, value } => node
            .get(predicate.as_str())
            .is_some_and(|stored| scalar_eq(stored, value)),
        Func::Has(predicate) => node.contains_key(predicate.as_str()),
        Func::Type(name) => has_type(node, name.as_str()),
        Func::SimilarTo { predicate, .. } => node.contains_key(predicate.as_str()),
    }
}

fn scalar_eq(stored: &Value, value: &str) -> bool {
    match stored {
        Value::String(s) => s == value,
        Value::Number(n) => n.to_string() == value,
        Value::Bool(b) => b.to_string() == value,
        Value::Array(items) => items.iter().any(|item| scalar_eq(item, value)),
        _ => false,
    }
}

fn has_type(node: &Node, node_type: &str) -> bool {
    node.get(TYPE_PREDICATE)
        .is_some_and(|t| scalar_eq(t, node_type))
}

fn stored_vector(value: &Value) -> Option<Vec<f32>> {
    match value {
        Value::String(literal) => parse_vector_literal(literal),
        Value::Array(items) => items
            .iter()
            .map(|v| v.as_f64().map(|f| f as f32))
            .collect(),
        _ => None,
    }
}

fn euclidean(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

fn project(state: &State, uid: u64, node: &Node, projection: &Projection) -> Value {
    let mut out = Map::new();
    for field in projection.entries() {
        match field {
            Field::Uid => {
                out.insert(UID.to_string(), Value::String(format_uid(uid)));
            }
            Field::Scalar(predicate) => {
                if let Some(value) = node.get(predicate.as_str()) {
                    if !is_edge_value(value) {
                        out.insert(predicate.to_string(), value.clone());
                    }
                }
            }
            Field::Nested(predicate, inner) => {
                let projected = match node.get(predicate.as_str()) {
                    Some(value @ Value::Object(_)) => edge_target(value)
                        .and_then(|t| state.nodes.get(&t).map(|n| project(state, t, n, inner))),
                    Some(Value::Array(items)) => {
                        let children: Vec<Value> = items
                            .iter()
                            .filter_map(edge_target)
                            .filter_map(|t| state.nodes.get(&t).map(|n| project(state, t, n, inner)))
                            .collect();
                        (!children.is_empty()).then_some(Value::Array(children))
                    }
                    _ => None,
                };
                if let Some(value) = projected {
                    out.insert(predicate.to_string(), value);
                }
            }
        }
    }
    Value::Object(out)
}

// ── Helpers ──────────────────────────────────────────────────────

fn edge(target: u64) -> Value {
    let mut obj = Map::new();
    obj.insert(UID.to_string(), Value::String(format_uid(target)));
    Value::Object(obj)
}

fn edge_target(value: &Value) -> Option<u64> {
    value.get(UID).and_then(Value::as_str).and_then(parse_uid)
}

fn is_edge_value(value: &Value) -> bool {
    match value {
        Value::Object(_) => true,
        Value::Array(items) => !items.is_empty() && items.iter().all(Value::is_object),
        _ => false,
    }
}

fn format_uid(uid: u64) -> String {
    format!("{uid:#x}")
}

fn parse_uid(uid: &str) -> Option<u64> {
    u64::from_str_radix(uid.strip_prefix("0x")?, 16).ok()
}
