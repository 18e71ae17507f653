//! Schema registry: node types, their logical-id predicate, and the
//! relationships the mutation builder is allowed to follow.
//!
//! A registry is assembled once through [`SchemaBuilder`] and is read-only
//! afterwards. Several registries may coexist, each describing the subgraph
//! reachable from one root type.

use std::collections::HashMap;

use crate::error::{GraphError, Result};
use crate::query::Predicate;

/// Whether a relationship points at a single node or a list of nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    One,
    Many,
}

/// A predicate on one node type whose value is another node (or nodes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub predicate: String,
    pub target_type: String,
    pub cardinality: Cardinality,
}

impl Relationship {
    pub fn one(predicate: impl Into<String>, target_type: impl Into<String>) -> Self {
        Self {
            predicate: predicate.into(),
            target_type: target_type.into(),
            cardinality: Cardinality::One,
        }
    }

    pub fn many(predicate: impl Into<String>, target_type: impl Into<String>) -> Self {
        Self {
            predicate: predicate.into(),
            target_type: target_type.into(),
            cardinality: Cardinality::Many,
        }
    }
}

/// Registered description of one node type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeTypeDescriptor {
    name: String,
    id_field: String,
    relationships: Vec<Relationship>,
}

impl NodeTypeDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Predicate holding the logical id.
    pub fn id_field(&self) -> &str {
        &self.id_field
    }

    /// Declared relationships, in registration order.
    pub fn relationships(&self) -> &[Relationship] {
        &self.relationships
    }

    pub fn relationship(&self, predicate: &str) -> Option<&Relationship> {
        self.relationships.iter().find(|r| r.predicate == predicate)
    }
}

/// Immutable set of node type descriptors.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    node_types: HashMap<String, NodeTypeDescriptor>,
}

impl SchemaRegistry {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    pub fn lookup(&self, type_name: &str) -> Result<&NodeTypeDescriptor> {
        self.node_types
            .get(type_name)
            .ok_or_else(|| GraphError::NotFound {
                node_type: type_name.to_string(),
            })
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.node_types.contains_key(type_name)
    }

    pub fn len(&self) -> usize {
        self.node_types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.node_types.is_empty()
    }
}

/// Collects node type registrations; [`build`](Self::build) freezes them.
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    node_types: HashMap<String, NodeTypeDescriptor>,
}

impl SchemaBuilder {
    /// Add one node type.
    ///
    /// Fails with `DuplicateRelationship` when two relationships share a
    /// predicate, `DuplicateNodeType` when `type_name` is already present,
    /// and `InvalidArgument` for names that are not valid predicates.
    pub fn register(
        mut self,
        type_name: &str,
        id_field: &str,
        relationships: Vec<Relationship>,
    ) -> Result<Self> {
        Predicate::new(type_name)?;
        Predicate::new(id_field)?;

        if self.node_types.contains_key(type_name) {
            return Err(GraphError::DuplicateNodeType {
                node_type: type_name.to_string(),
            });
        }

        for (i, rel) in relationships.iter().enumerate() {
            Predicate::new(rel.predicate.as_str())?;
            Predicate::new(rel.target_type.as_str())?;
            if rel.predicate == id_field
                || relationships[..i].iter().any(|r| r.predicate == rel.predicate)
            {
                return Err(GraphError::DuplicateRelationship {
                    node_type: type_name.to_string(),
                    predicate: rel.predicate.clone(),
                });
            }
        }

        tracing::debug!(
            node_type = type_name,
            id_field,
            relationships = relationships.len(),
            "Registered node type"
        );

        self.node_types.insert(
            type_name.to_string(),
            NodeTypeDescriptor {
                name: type_name.to_string(),
                id_field: id_field.to_string(),
                relationships,
            },
        );
        Ok(self)
    }

    pub fn build(self) -> SchemaRegistry {
        SchemaRegistry {
            node_types: self.node_types,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn station_registry() -> SchemaRegistry {
        SchemaRegistry::builder()
            .register(
                "PumpingStation",
                "PumpingStation.id",
                vec![Relationship::many("PumpingStation.profiles", "Profile")],
            )
            .unwrap()
            .register("Profile", "Profile.id", vec![])
            .unwrap()
            .build()
    }

    #[test]
    fn test_lookup_registered_type() {
        let registry = station_registry();
        let station = registry.lookup("PumpingStation").unwrap();

        assert_eq!(station.id_field(), "PumpingStation.id");
        assert_eq!(station.relationships().len(), 1);
        assert_eq!(
            station.relationship("PumpingStation.profiles").unwrap().cardinality,
            Cardinality::Many
        );
        assert!(station.relationship("PumpingStation.name").is_none());
    }

    #[test]
    fn test_lookup_missing_type() {
        let registry = station_registry();
        assert!(matches!(
            registry.lookup("HourRate"),
            Err(GraphError::NotFound { node_type }) if node_type == "HourRate"
        ));
    }

    #[test]
    fn test_duplicate_relationship_rejected() {
        let result = SchemaRegistry::builder().register(
            "Profile",
            "Profile.id",
            vec![
                Relationship::one("Profile.flow_per_hour", "HourRate"),
                Relationship::one("Profile.flow_per_hour", "HourRate"),
            ],
        );
        assert!(matches!(
            result,
            Err(GraphError::DuplicateRelationship { predicate, .. })
                if predicate == "Profile.flow_per_hour"
        ));
    }

    #[test]
    fn test_relationship_cannot_shadow_id_field() {
        let result = SchemaRegistry::builder().register(
            "Profile",
            "Profile.id",
            vec![Relationship::one("Profile.id", "HourRate")],
        );
        assert!(matches!(
            result,
            Err(GraphError::DuplicateRelationship { .. })
        ));
    }

    #[test]
    fn test_duplicate_node_type_rejected() {
        let result = SchemaRegistry::builder()
            .register("Profile", "Profile.id", vec![])
            .unwrap()
            .register("Profile", "Profile.xid", vec![]);
        assert!(matches!(result, Err(GraphError::DuplicateNodeType { .. })));
    }

    #[test]
    fn test_invalid_names_rejected() {
        assert!(matches!(
            SchemaRegistry::builder().register("Bad Type", "x.id", vec![]),
            Err(GraphError::InvalidArgument(_))
        ));
        assert!(matches!(
            SchemaRegistry::builder().register(
                "Station",
                "Station.id",
                vec![Relationship::one("Station.link", "")]
            ),
            Err(GraphError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_registries_are_independent() {
        let a = station_registry();
        let b = SchemaRegistry::builder()
            .register("Project", "Project.id", vec![])
            .unwrap()
            .build();

        assert!(a.contains("PumpingStation"));
        assert!(!a.contains("Project"));
        assert!(b.contains("Project"));
        assert_eq!(b.len(), 1);
    }
}
