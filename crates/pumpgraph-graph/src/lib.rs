//! pumpgraph-graph: typed access to a Dgraph knowledge graph.
//!
//! Callers describe their node types once in a [`SchemaRegistry`] and then
//! write whole entity trees with [`mutations::upsert`]. Existing nodes are
//! found by logical id and reused, new ones get blank-node placeholders, and
//! vectors can be attached to the root for similarity search. Reads go
//! through [`queries`], deletes through [`mutations::delete_predicates`].
//!
//! All store traffic flows through the [`GraphStore`] trait: [`DgraphClient`]
//! talks HTTP to a Dgraph alpha, [`MemoryStore`] keeps everything in process.

pub mod client;
pub mod error;
pub mod memory;
pub mod mutations;
pub mod queries;
pub mod query;
pub mod resolver;
pub mod schema;
pub mod store;

pub use client::{ConnectionConfig, DgraphClient, GraphConfig, DEFAULT_CONNECTION};
pub use error::{GraphError, Result};
pub use memory::MemoryStore;
pub use mutations::{build_mutation, delete_predicates, inject_embedding, upsert, Embedding};
pub use queries::{fetch_by_id, search_by_similarity};
pub use query::{DeleteRequest, Filter, Predicate, Projection, QueryRequest};
pub use resolver::{GraphIdentifier, UidResolver};
pub use schema::{Cardinality, NodeTypeDescriptor, Relationship, SchemaBuilder, SchemaRegistry};
pub use store::{GraphStore, Uids};
