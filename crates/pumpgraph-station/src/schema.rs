//! Station graph schema: registry, DQL definition and read projections.

use pumpgraph_core::types::HOURS_PER_DAY;
use pumpgraph_core::{HourRate, NodeEntity, Profile, PumpingStation};
use pumpgraph_graph::{Projection, Relationship, Result, SchemaRegistry};

/// Rate predicates on a profile, each pointing at one `HourRate` node.
pub const RATE_PREDICATES: [&str; 3] = [
    "Profile.flow_per_hour",
    "Profile.price_per_hour",
    "Profile.action_per_hour",
];

/// Build the registry describing station trees.
pub fn station_schema() -> Result<SchemaRegistry> {
    let builder = SchemaRegistry::builder()
        .register(
            PumpingStation::NODE_TYPE,
            PumpingStation::ID_FIELD,
            vec![Relationship::many("PumpingStation.profiles", Profile::NODE_TYPE)],
        )?
        .register(
            Profile::NODE_TYPE,
            Profile::ID_FIELD,
            RATE_PREDICATES
                .iter()
                .map(|p| Relationship::one(*p, HourRate::NODE_TYPE))
                .collect(),
        )?
        .register(HourRate::NODE_TYPE, HourRate::ID_FIELD, vec![])?;
    Ok(builder.build())
}

/// DQL schema for station data. `@upsert` on the id predicates makes
/// concurrent creation of the same logical id abort instead of duplicating.
pub fn station_dql(embedding_predicate: &str) -> String {
    let mut dql = String::new();
    dql.push_str("PumpingStation.id: string @index(exact) @upsert .\n");
    dql.push_str("PumpingStation.name: string @index(term) .\n");
    dql.push_str("PumpingStation.profiles: [uid] .\n");
    dql.push_str(&format!(
        "{embedding_predicate}: float32vector @index(hnsw(metric: \"euclidean\")) .\n"
    ));
    dql.push_str("Profile.id: string @index(exact) @upsert .\n");
    dql.push_str("Profile.datestring: string .\n");
    for predicate in RATE_PREDICATES {
        dql.push_str(&format!("{predicate}: uid .\n"));
    }
    dql.push_str("HourRate.id: string @index(exact) @upsert .\n");
    for hour in 0..HOURS_PER_DAY {
        dql.push_str(&format!("HourRate.h{hour}: float .\n"));
    }

    dql.push_str(&format!(
        "\ntype PumpingStation {{\n  PumpingStation.id\n  PumpingStation.name\n  PumpingStation.profiles\n  {embedding_predicate}\n}}\n"
    ));
    dql.push_str("\ntype Profile {\n  Profile.id\n  Profile.datestring\n");
    for predicate in RATE_PREDICATES {
        dql.push_str(&format!("  {predicate}\n"));
    }
    dql.push_str("}\n\ntype HourRate {\n  HourRate.id\n");
    for hour in 0..HOURS_PER_DAY {
        dql.push_str(&format!("  HourRate.h{hour}\n"));
    }
    dql.push_str("}\n");
    dql
}

fn hour_rate_projection() -> Result<Projection> {
    let mut projection = Projection::new().uid().field(HourRate::ID_FIELD)?;
    for hour in 0..HOURS_PER_DAY {
        projection = projection.field(&format!("HourRate.h{hour}"))?;
    }
    Ok(projection)
}

/// Full station tree: station, profiles, and each profile's hourly rates.
pub fn station_projection() -> Result<Projection> {
    let mut profile = Projection::new()
        .uid()
        .fields([Profile::ID_FIELD, "Profile.datestring"])?;
    for predicate in RATE_PREDICATES {
        profile = profile.nested(predicate, hour_rate_projection()?)?;
    }

    Projection::new()
        .uid()
        .fields([PumpingStation::ID_FIELD, "PumpingStation.name"])?
        .nested("PumpingStation.profiles", profile)
}

/// Station header only, used for search results.
pub fn summary_projection() -> Result<Projection> {
    Projection::new()
        .uid()
        .fields([PumpingStation::ID_FIELD, "PumpingStation.name"])
}

#[cfg(test)]
mod tests {
    use super::*;
    use pumpgraph_graph::Cardinality;

    #[test]
    fn test_station_schema_wiring() {
        let schema = station_schema().unwrap();
        assert_eq!(schema.len(), 3);

        let station = schema.lookup("PumpingStation").unwrap();
        let profiles = station.relationship("PumpingStation.profiles").unwrap();
        assert_eq!(profiles.cardinality, Cardinality::Many);
        assert_eq!(profiles.target_type, "Profile");

        let profile = schema.lookup("Profile").unwrap();
        for predicate in RATE_PREDICATES {
            let rel = profile.relationship(predicate).unwrap();
            assert_eq!(rel.cardinality, Cardinality::One);
            assert_eq!(rel.target_type, "HourRate");
        }
    }

    #[test]
    fn test_dql_declares_upsert_and_vector_index() {
        let dql = station_dql("PumpingStation.embedding");
        assert!(dql.contains("PumpingStation.id: string @index(exact) @upsert ."));
        assert!(dql.contains("PumpingStation.embedding: float32vector @index(hnsw"));
        assert!(dql.contains("HourRate.h23: float ."));
        assert!(dql.contains("type HourRate {"));
    }

    #[test]
    fn test_station_projection_nests_rates() {
        let projection = station_projection().unwrap();
        assert_eq!(projection.entries().len(), 4);
        assert!(!summary_projection().unwrap().is_empty());
    }
}
