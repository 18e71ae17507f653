//! Station handlers: write, read, search and remove pumping stations.

use pumpgraph_core::{NodeEntity, PumpingStation};
use pumpgraph_graph::query::TYPE_PREDICATE;
use pumpgraph_graph::{
    delete_predicates, fetch_by_id, search_by_similarity, upsert, Embedding, Filter, GraphStore,
    SchemaRegistry, Uids,
};

use crate::config::StationConfig;
use crate::embed::Embedder;
use crate::error::{Result, StationError};
use crate::schema::{station_projection, station_schema, summary_projection};

/// Station operations bound to one graph store and one embedder.
pub struct StationService<S, E> {
    store: S,
    embedder: E,
    schema: SchemaRegistry,
    config: StationConfig,
}

impl<S, E> StationService<S, E>
where
    S: GraphStore,
    E: Embedder,
{
    pub fn new(store: S, embedder: E, config: StationConfig) -> Result<Self> {
        Ok(Self {
            store,
            embedder,
            schema: station_schema()?,
            config,
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Write `station` with its profiles and rates, embedding the station
    /// name for similarity search. Returns uids of newly created nodes.
    pub async fn upsert_station(&self, station: &PumpingStation) -> Result<Uids> {
        if station.logical_id().trim().is_empty() {
            return Err(StationError::InvalidInput(
                "station id must not be empty".to_string(),
            ));
        }

        let vector = self.embedder.embed_one(&station.name).await?;
        let embedding = Embedding {
            predicate: &self.config.embedding_predicate,
            vector: &vector,
        };
        let uids = upsert(
            &self.store,
            &self.schema,
            station,
            PumpingStation::NODE_TYPE,
            Some(embedding),
        )
        .await?;

        tracing::info!(station_id = %station.logical_id(), created = uids.len(), "Station upserted");
        Ok(uids)
    }

    /// Fetch a station tree by its logical id.
    pub async fn get_station(&self, id: &str) -> Result<Option<PumpingStation>> {
        let station = fetch_by_id(
            &self.store,
            PumpingStation::ID_FIELD,
            id,
            &station_projection()?,
        )
        .await?;
        Ok(station)
    }

    /// Stations whose name embeds nearest to `text`, nearest first.
    ///
    /// `top_k` defaults to the configured `search_top_k`.
    pub async fn search_stations(
        &self,
        text: &str,
        top_k: Option<usize>,
    ) -> Result<Vec<PumpingStation>> {
        let top_k = top_k.unwrap_or(self.config.search_top_k);
        if top_k == 0 {
            return Err(StationError::InvalidInput(
                "top_k must be a positive integer".to_string(),
            ));
        }

        let vector = self.embedder.embed_one(text).await?;
        let stations = search_by_similarity(
            &self.store,
            &vector,
            &self.config.embedding_predicate,
            &summary_projection()?,
            top_k,
        )
        .await?;
        Ok(stations)
    }

    /// Remove a station node's own predicates. Profiles it pointed at are
    /// left in place.
    pub async fn delete_station(&self, id: &str) -> Result<()> {
        let filter = Filter::eq(PumpingStation::ID_FIELD, id)?
            .and(Filter::of_type(PumpingStation::NODE_TYPE)?);
        delete_predicates(
            &self.store,
            &filter,
            &[
                PumpingStation::ID_FIELD,
                "PumpingStation.name",
                "PumpingStation.profiles",
                self.config.embedding_predicate.as_str(),
                TYPE_PREDICATE,
            ],
        )
        .await?;

        tracing::info!(station_id = %id, "Station deleted");
        Ok(())
    }
}
