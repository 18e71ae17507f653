//! Dgraph connection management and the HTTP-backed graph store.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::error::{GraphError, Result};
use crate::query::{DeleteRequest, QueryRequest, RESULT_BLOCK, UID};
use crate::store::{GraphStore, Uids};

/// Name of the connection used when none is configured explicitly.
pub const DEFAULT_CONNECTION: &str = "dgraph";

/// Endpoint settings for one Dgraph connection.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionConfig {
    /// Base URL of the Dgraph alpha HTTP endpoint.
    #[serde(default = "default_url")]
    pub url: String,

    /// Per-request transport timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Named graph connections, loaded from the `[graph]` config section.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphConfig {
    #[serde(default = "default_connections")]
    pub connections: BTreeMap<String, ConnectionConfig>,
}

fn default_connections() -> BTreeMap<String, ConnectionConfig> {
    BTreeMap::from([(DEFAULT_CONNECTION.to_string(), ConnectionConfig::default())])
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            connections: default_connections(),
        }
    }
}

impl GraphConfig {
    pub fn connection(&self, name: &str) -> Result<&ConnectionConfig> {
        self.connections
            .get(name)
            .ok_or_else(|| GraphError::UnknownConnection {
                name: name.to_string(),
            })
    }
}

#[derive(Debug, Deserialize)]
struct DgraphResponse {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<DgraphErrorBody>,
    #[serde(default)]
    extensions: Option<Extensions>,
}

#[derive(Debug, Deserialize)]
struct DgraphErrorBody {
    message: String,
}

#[derive(Debug, Deserialize)]
struct Extensions {
    #[serde(default)]
    txn: Option<TxnContext>,
}

#[derive(Debug, Deserialize)]
struct TxnContext {
    #[serde(default)]
    start_ts: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct MutationData {
    #[serde(default)]
    uids: Option<Uids>,
}

/// Dgraph client speaking the alpha HTTP API.
///
/// Clone is cheap (inner Arc). Every request is a single attempt with the
/// configured timeout; nothing is retried here.
#[derive(Clone)]
pub struct DgraphClient {
    http: reqwest::Client,
    base_url: String,
}

impl DgraphClient {
    /// Connect to Dgraph and verify the alpha answers its health check.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GraphError::StoreUnavailable(e.to_string()))?;
        let client = Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
        };

        let response = client
            .http
            .get(format!("{}/health", client.base_url))
            .send()
            .await
            .map_err(|e| GraphError::StoreUnavailable(e.to_string()))?;
        if !response.status().is_success() {
            return Err(GraphError::StoreUnavailable(format!(
                "health check returned {}",
                response.status()
            )));
        }

        tracing::info!(url = %client.base_url, "Connected to Dgraph");
        Ok(client)
    }

    /// Connect using the connection `name` from `config`.
    pub async fn connect_named(config: &GraphConfig, name: &str) -> Result<Self> {
        Self::connect(config.connection(name)?).await
    }

    /// Apply DQL schema text (predicate types, indexes and type definitions).
    pub async fn alter(&self, schema: &str) -> Result<()> {
        let response = self
            .http
            .post(format!("{}/alter", self.base_url))
            .body(schema.to_string())
            .send()
            .await?;
        let status = response.status();
        let body: Value = response.json().await?;
        if let Some(errors) = body.get("errors").and_then(Value::as_array) {
            let message = errors
                .iter()
                .filter_map(|e| e.get("message").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("; ");
            return Err(GraphError::Store(message));
        }
        if !status.is_success() {
            return Err(GraphError::Store(format!("alter returned {status}")));
        }
        tracing::info!(url = %self.base_url, "Applied graph schema");
        Ok(())
    }

    async fn post(&self, path: &str, body: &Value) -> Result<DgraphResponse> {
        let response = self
            .http
            .post(format!("{}{path}", self.base_url))
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(if status.is_server_error() {
                GraphError::StoreUnavailable(format!("{status}: {text}"))
            } else {
                GraphError::Store(format!("{status}: {text}"))
            });
        }

        let parsed: DgraphResponse = response.json().await?;
        if !parsed.errors.is_empty() {
            let message = parsed
                .errors
                .iter()
                .map(|e| e.message.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            tracing::warn!(path, error = %message, "Dgraph rejected request");
            return Err(GraphError::Store(message));
        }
        Ok(parsed)
    }

    /// Run a read and return its rows plus the transaction start timestamp.
    async fn run_query(&self, request: &QueryRequest) -> Result<(Vec<Value>, Option<u64>)> {
        let rendered = request.render();
        tracing::debug!(query = %rendered.text, "Running DQL query");

        let response = self
            .post(
                "/query",
                &json!({ "query": rendered.text, "variables": rendered.variables }),
            )
            .await?;
        let start_ts = response
            .extensions
            .and_then(|e| e.txn)
            .and_then(|t| t.start_ts);

        let rows = match response.data.as_ref().and_then(|d| d.get(RESULT_BLOCK)) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(rows)) => rows.clone(),
            Some(other) => {
                return Err(GraphError::Deserialization(format!(
                    "expected a list under {RESULT_BLOCK}, got {other}"
                )))
            }
        };
        Ok((rows, start_ts))
    }
}

#[async_trait]
impl GraphStore for DgraphClient {
    async fn query(&self, request: &QueryRequest) -> Result<Vec<Value>> {
        let (rows, _) = self.run_query(request).await?;
        Ok(rows)
    }

    async fn mutate(&self, payload: &Value) -> Result<Uids> {
        let response = self
            .post("/mutate?commitNow=true", &json!({ "set": payload }))
            .await?;
        let data: MutationData = match response.data {
            Some(data) => serde_json::from_value(data)
                .map_err(|e| GraphError::Deserialization(e.to_string()))?,
            None => MutationData { uids: None },
        };
        Ok(data.uids.unwrap_or_default())
    }

    async fn delete_predicates(&self, request: &DeleteRequest) -> Result<()> {
        let (rows, start_ts) = self.run_query(&request.target_query()).await?;
        let uids: Vec<&str> = rows
            .iter()
            .filter_map(|row| row.get(UID).and_then(Value::as_str))
            .collect();
        if uids.is_empty() {
            tracing::debug!("No nodes matched deletion filter");
            return Ok(());
        }

        let deletions: Vec<Value> = uids
            .iter()
            .map(|uid| {
                let mut obj = Map::new();
                obj.insert(UID.to_string(), Value::String((*uid).to_string()));
                for predicate in request.predicates() {
                    obj.insert(predicate.to_string(), Value::Null);
                }
                Value::Object(obj)
            })
            .collect();

        // Commit in the transaction the lookup ran in.
        let path = match start_ts {
            Some(ts) => format!("/mutate?commitNow=true&startTs={ts}"),
            None => "/mutate?commitNow=true".to_string(),
        };
        self.post(&path, &json!({ "delete": deletions })).await?;
        tracing::debug!(nodes = uids.len(), "Deleted predicates from nodes");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_has_dgraph_connection() {
        let config = GraphConfig::default();
        let conn = config.connection(DEFAULT_CONNECTION).unwrap();
        assert_eq!(conn.url, "http://localhost:8080");
        assert_eq!(conn.timeout_secs, 30);
    }

    #[test]
    fn test_unknown_connection() {
        let config = GraphConfig::default();
        assert!(matches!(
            config.connection("analytics"),
            Err(GraphError::UnknownConnection { name }) if name == "analytics"
        ));
    }

    #[test]
    fn test_parse_mutation_response() {
        let body = json!({
            "data": {
                "code": "Success",
                "message": "Done",
                "queries": null,
                "uids": { "PumpingStation_ab12cd34_1": "0x4e21" }
            },
            "extensions": { "txn": { "start_ts": 12, "commit_ts": 13 } }
        });
        let response: DgraphResponse = serde_json::from_value(body).unwrap();
        let data: MutationData = serde_json::from_value(response.data.unwrap()).unwrap();

        assert_eq!(data.uids.unwrap()["PumpingStation_ab12cd34_1"], "0x4e21");
        assert_eq!(response.extensions.unwrap().txn.unwrap().start_ts, Some(12));
    }

    #[test]
    fn test_parse_error_response() {
        let body = json!({
            "errors": [{ "message": "line 1 column 4: Unrecognized character", "extensions": { "code": "ErrorInvalidRequest" } }],
            "data": null
        });
        let response: DgraphResponse = serde_json::from_value(body).unwrap();
        assert_eq!(response.errors.len(), 1);
        assert!(response.data.is_none());
    }

    #[tokio::test]
    async fn test_connect_to_closed_port_is_unavailable() {
        let config = ConnectionConfig {
            url: "http://127.0.0.1:9".to_string(),
            timeout_secs: 2,
        };
        assert!(matches!(
            DgraphClient::connect(&config).await,
            Err(GraphError::StoreUnavailable(_))
        ));
    }
}
